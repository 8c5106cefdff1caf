//! Release planning and execution.
//!
//! All orchestration logic lives here. The CLI is purely a display layer.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_release`]) — read the current version, collect the
//!    commits since the last tag, and compute the next version (or gather
//!    what an interactive picker needs).
//! 2. **Execute** ([`ReadyRelease::execute`]) — write version files,
//!    regenerate the changelog, commit, tag, push.
//!
//! If the plan comes back as [`ReleasePlan::NeedsInteraction`], the CLI
//! prompts the user and calls [`resolve_interactive`] to get a
//! [`ReadyRelease`].
//!
//! Past releases are read back from tags by [`history`].

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::changelog::{self, ChangelogError};
use crate::commits::{self, ParsedCommit};
use crate::config::Config;
use crate::files::{HandlerRegistry, WriteResult};
use crate::git::{self, GitError, RawCommit};
use crate::provider::ProviderInfo;
use crate::version::{self, BumpOption, BumpType, Channel, Version, VersionError, VersionResult};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from release operations.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// A git command failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// A version string was rejected.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The changelog could not be written.
    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    /// The repository has no commits yet.
    #[error("no commits found in repository")]
    NoCommits,

    /// The release tag is already taken.
    #[error("tag {0} already exists")]
    TagExists(String),
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Current version
// ──────────────────────────────────────────────

/// Where the current version was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    /// A configured version file.
    Files,
    /// The latest git tag.
    Tag,
    /// Nothing found; starting from `0.0.0`.
    Default,
}

/// The version a release starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentVersion {
    /// Parsed version.
    pub version: Version,
    /// Where it came from.
    pub source: VersionSource,
}

/// Current version: the primary version of the configured files, else the
/// latest tag (without the tag prefix), else `0.0.0`.
#[instrument(skip(config, registry))]
pub fn current_version(
    root: &Utf8Path,
    config: &Config,
    registry: &HandlerRegistry,
) -> ReleaseResult<CurrentVersion> {
    if let Some(primary) = registry
        .read_version_from_files(root, &config.version.files)
        .primary
    {
        return Ok(CurrentVersion {
            version: Version::parse(&primary)?,
            source: VersionSource::Files,
        });
    }

    if git::is_inside_repo(root)?
        && let Some(tag) = git::latest_tag(root)?
    {
        let raw = tag
            .strip_prefix(config.version.tag_prefix.as_str())
            .unwrap_or(&tag);
        return Ok(CurrentVersion {
            version: Version::parse(raw)?,
            source: VersionSource::Tag,
        });
    }

    Ok(CurrentVersion {
        version: Version::new(0, 0, 0),
        source: VersionSource::Default,
    })
}

// ──────────────────────────────────────────────
// Plan types
// ──────────────────────────────────────────────

/// How the next version should be chosen.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Exact version to release.
    pub explicit_version: Option<String>,
    /// Bump to apply to the current version.
    pub bump: Option<BumpType>,
    /// Channel for prerelease bumps.
    pub channel: Channel,
}

/// Everything known about the pending release before a version is chosen.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseContext {
    /// Version the release starts from.
    pub current: CurrentVersion,
    /// Most recent tag, if any.
    pub latest_tag: Option<String>,
    /// Commits since that tag, newest first.
    pub commits: Vec<ParsedCommit>,
    /// Bump implied by the commits.
    pub suggested: BumpType,
    /// Candidate versions for a picker.
    pub options: Vec<BumpOption>,
    /// Web URL of the `origin` remote.
    pub repo_url: Option<String>,
    /// Channel used for prerelease candidates.
    #[serde(skip)]
    pub channel: Channel,
}

/// The result of planning a release: either ready or needing user input.
#[derive(Debug)]
pub enum ReleasePlan {
    /// Version fully determined (explicit or bump type).
    Ready(ReadyRelease),
    /// The CLI must prompt the user and call [`resolve_interactive`].
    NeedsInteraction(InteractiveRelease),
}

/// A release plan that is ready to execute.
#[derive(Debug, Clone, Serialize)]
pub struct ReadyRelease {
    /// Gathered context.
    pub context: ReleaseContext,
    /// Version being released.
    pub next: Version,
    /// Tag that will be created.
    pub tag: String,
}

/// A release plan waiting for the user to pick a version.
#[derive(Debug, Clone)]
pub struct InteractiveRelease {
    /// Gathered context, including the candidates.
    pub context: ReleaseContext,
}

impl InteractiveRelease {
    /// Next version according to the commit history.
    pub fn suggested_version(&self) -> VersionResult<Version> {
        self.context
            .current
            .version
            .bump(self.context.suggested, self.context.channel)
    }
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// Plan a release.
///
/// Fails when `root` is not a repository or has no commits. An explicit
/// version wins over a bump type; with neither, the plan needs interaction.
#[instrument(skip(config, registry, options), fields(%root))]
pub fn plan_release(
    root: &Utf8Path,
    config: &Config,
    registry: &HandlerRegistry,
    options: &ReleaseOptions,
) -> ReleaseResult<ReleasePlan> {
    git::ensure_repo(root)?;
    if !git::has_commits(root)? {
        return Err(ReleaseError::NoCommits);
    }

    let current = current_version(root, config, registry)?;
    let latest_tag = git::latest_tag(root)?;
    let raw = git::parse_log_output(&git::log(root, latest_tag.as_deref(), "HEAD")?);
    let commits = commits::parse_commits_with(raw, &config.commits);
    let suggested = commits::suggest_bump(&commits);
    let repo_url = git::remote_url(root)?.map(|url| changelog::normalize_repo_url(&url));
    debug!(
        current = %current.version,
        ?latest_tag,
        commits = commits.len(),
        %suggested,
        "gathered release context"
    );

    let context = ReleaseContext {
        options: version::bump_options(&current.version, options.channel),
        current,
        latest_tag,
        commits,
        suggested,
        repo_url,
        channel: options.channel,
    };

    let next = if let Some(explicit) = options.explicit_version.as_deref() {
        Version::parse(version::clean(explicit))?
    } else if let Some(kind) = options.bump {
        context.current.version.bump(kind, options.channel)?
    } else {
        return Ok(ReleasePlan::NeedsInteraction(InteractiveRelease { context }));
    };

    Ok(ReleasePlan::Ready(ready(context, next, config)))
}

/// Finalize an interactive plan with the user's chosen version.
pub fn resolve_interactive(
    plan: InteractiveRelease,
    chosen: Version,
    config: &Config,
) -> ReadyRelease {
    ready(plan.context, chosen, config)
}

fn ready(context: ReleaseContext, next: Version, config: &Config) -> ReadyRelease {
    let tag = config.version.tag_name(&next.to_string());
    ReadyRelease { context, next, tag }
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

/// Steps to run during [`ReadyRelease::execute`].
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Regenerate the changelog.
    pub changelog: bool,
    /// Create the release tag.
    pub tag: bool,
    /// Push commit and tag (still subject to `git.push`).
    pub push: bool,
    /// Create a hosted release through the provider CLI.
    pub provider_release: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            changelog: true,
            tag: true,
            push: true,
            provider_release: false,
        }
    }
}

/// What a release did.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// Version released from.
    pub previous: Version,
    /// Version released.
    pub version: Version,
    /// Per-file version writes.
    pub files: Vec<WriteResult>,
    /// Changelog written, if any.
    pub changelog: Option<Utf8PathBuf>,
    /// Whether a release commit was created.
    pub committed: bool,
    /// Tag created, if any.
    pub tag: Option<String>,
    /// Whether anything was pushed.
    pub pushed: bool,
    /// Output of the provider CLI, or why it did not run.
    pub provider_release: Option<Result<String, String>>,
}

impl ReadyRelease {
    /// Execute the release.
    ///
    /// Version file failures are reported per file and do not stop the
    /// release; git failures do.
    #[instrument(skip(self, config, registry), fields(next = %self.next))]
    pub fn execute(
        &self,
        root: &Utf8Path,
        config: &Config,
        registry: &HandlerRegistry,
        options: ExecuteOptions,
    ) -> ReleaseResult<ReleaseOutcome> {
        if options.tag && git::tag_exists(root, &self.tag)? {
            return Err(ReleaseError::TagExists(self.tag.clone()));
        }

        let version = self.next.to_string();
        let files = registry.write_version_to_files(root, &config.version.files, &version);
        for failed in files.iter().filter(|r| !r.success) {
            warn!(path = %failed.path, error = ?failed.error, "version file not updated");
        }

        let entry = changelog::render_entry(
            &version,
            &changelog::today(),
            &self.context.commits,
            &config.changelog,
            self.context.repo_url.as_deref(),
        );
        let changelog = if options.changelog {
            Some(changelog::write_entry(
                root,
                &config.changelog.file,
                &entry,
                &version,
            )?)
        } else {
            None
        };

        let committed = if git::is_clean(root)? {
            debug!("nothing to commit");
            false
        } else {
            git::stage_all(root)?;
            git::commit(
                root,
                &config.version.commit_message_for(&version),
                config.git.sign_commits,
            )?;
            true
        };

        let tag = if options.tag {
            git::create_tag(
                root,
                &self.tag,
                &config.version.tag_message_for(&version),
                config.git.sign_tags,
            )?;
            Some(self.tag.clone())
        } else {
            None
        };

        let pushed = if options.push && config.git.push && git::has_remote(root)? {
            git::push(root, config.git.push_tags && tag.is_some())?;
            true
        } else {
            false
        };

        let provider_release = match (&tag, options.provider_release) {
            (Some(tag), true) => {
                let remote = git::remote_url(root)?;
                let info = ProviderInfo::for_remote(remote.as_deref(), tag);
                Some(
                    info.create_release(root, tag, &entry)
                        .map_err(|e| e.to_string()),
                )
            }
            _ => None,
        };

        info!(
            previous = %self.context.current.version,
            new = %self.next,
            committed,
            pushed,
            "release complete"
        );

        Ok(ReleaseOutcome {
            previous: self.context.current.version.clone(),
            version: self.next.clone(),
            files,
            changelog,
            committed,
            tag,
            pushed,
            provider_release,
        })
    }
}

// ──────────────────────────────────────────────
// History
// ──────────────────────────────────────────────

/// A past release, as recorded by its tag.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseRecord {
    /// Tag name.
    pub tag: String,
    /// Tag name without the configured prefix.
    pub version: String,
    /// Tag creation date, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Commits since the next older release, newest first.
    pub commits: Vec<RawCommit>,
}

/// Every tagged release, newest first.
///
/// Tags are ordered by creation date; tags made on the same day keep
/// descending version order, undated tags come last.
#[instrument(skip(config), fields(%root))]
pub fn history(root: &Utf8Path, config: &Config) -> ReleaseResult<Vec<ReleaseRecord>> {
    git::ensure_repo(root)?;

    let mut dated = Vec::new();
    for tag in git::tags(root)? {
        dated.push((git::tag_date(root, &tag)?, tag));
    }
    dated.sort_by(|(a, _), (b, _)| b.cmp(a));

    let mut records = Vec::with_capacity(dated.len());
    for (i, (date, tag)) in dated.iter().enumerate() {
        let previous = dated.get(i + 1).map(|(_, older)| older.as_str());
        let commits = git::commits_between(root, previous, tag)?;
        let version = tag
            .strip_prefix(config.version.tag_prefix.as_str())
            .unwrap_or(tag)
            .to_string();
        records.push(ReleaseRecord {
            tag: tag.clone(),
            version,
            date: date.clone(),
            commits,
        });
    }
    debug!(releases = records.len(), "collected release history");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::VersionFileEntry;
    use crate::git::tests::{commit_file, init_repo};
    use std::fs;

    fn package(version: &str) -> String {
        format!("{{\n  \"name\": \"demo\",\n  \"version\": \"{version}\"\n}}\n")
    }

    fn no_push() -> ExecuteOptions {
        ExecuteOptions {
            push: false,
            ..ExecuteOptions::default()
        }
    }

    fn ready_plan(plan: ReleasePlan) -> ReadyRelease {
        match plan {
            ReleasePlan::Ready(ready) => ready,
            ReleasePlan::NeedsInteraction(_) => panic!("expected a ready plan"),
        }
    }

    // ===== Current version =====

    #[test]
    fn current_version_prefers_files_then_tag_then_zero() {
        let (_tmp, root) = init_repo();
        let registry = HandlerRegistry::with_builtins();
        let config = Config::default();

        let current = current_version(&root, &config, &registry).unwrap();
        assert_eq!(current.source, VersionSource::Default);
        assert_eq!(current.version, Version::new(0, 0, 0));

        commit_file(&root, "a.txt", "feat: start");
        git::create_tag(&root, "v0.3.0", "Release 0.3.0", false).unwrap();
        let current = current_version(&root, &config, &registry).unwrap();
        assert_eq!(current.source, VersionSource::Tag);
        assert_eq!(current.version.to_string(), "0.3.0");

        fs::write(root.join("package.json"), package("0.4.0")).unwrap();
        let current = current_version(&root, &config, &registry).unwrap();
        assert_eq!(current.source, VersionSource::Files);
        assert_eq!(current.version.to_string(), "0.4.0");
    }

    #[test]
    fn invalid_file_version_is_an_error() {
        let (_tmp, root) = init_repo();
        fs::write(root.join("package.json"), package("not-a-version")).unwrap();
        let err = current_version(&root, &Config::default(), &HandlerRegistry::with_builtins())
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Version(_)));
    }

    // ===== Plan =====

    #[test]
    fn plan_requires_commits() {
        let (_tmp, root) = init_repo();
        let err = plan_release(
            &root,
            &Config::default(),
            &HandlerRegistry::with_builtins(),
            &ReleaseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReleaseError::NoCommits));
    }

    #[test]
    fn plan_without_choice_needs_interaction() {
        let (_tmp, root) = init_repo();
        fs::write(root.join("package.json"), package("1.2.3")).unwrap();
        commit_file(&root, "a.txt", "fix: first");
        commit_file(&root, "b.txt", "feat: second");

        let plan = plan_release(
            &root,
            &Config::default(),
            &HandlerRegistry::with_builtins(),
            &ReleaseOptions::default(),
        )
        .unwrap();
        let ReleasePlan::NeedsInteraction(pending) = plan else {
            panic!("expected interaction");
        };
        assert_eq!(pending.context.commits.len(), 2);
        assert_eq!(pending.context.suggested, BumpType::Minor);
        assert_eq!(pending.suggested_version().unwrap().to_string(), "1.3.0");
        assert_eq!(pending.context.options.len(), 6);

        let ready = resolve_interactive(pending, Version::new(2, 0, 0), &Config::default());
        assert_eq!(ready.tag, "v2.0.0");
    }

    #[test]
    fn explicit_version_wins_over_bump() {
        let (_tmp, root) = init_repo();
        commit_file(&root, "a.txt", "fix: first");
        let options = ReleaseOptions {
            explicit_version: Some("v5.0.0-rc.1".to_string()),
            bump: Some(BumpType::Patch),
            channel: Channel::Alpha,
        };
        let ready = ready_plan(
            plan_release(&root, &Config::default(), &HandlerRegistry::with_builtins(), &options)
                .unwrap(),
        );
        assert_eq!(ready.next.to_string(), "5.0.0-rc.1");
        assert_eq!(ready.tag, "v5.0.0-rc.1");
    }

    #[test]
    fn only_commits_since_latest_tag_are_collected() {
        let (_tmp, root) = init_repo();
        commit_file(&root, "a.txt", "feat: old");
        git::create_tag(&root, "v1.0.0", "Release 1.0.0", false).unwrap();
        commit_file(&root, "b.txt", "fix: new");

        let options = ReleaseOptions {
            bump: Some(BumpType::Prepatch),
            channel: Channel::Beta,
            ..ReleaseOptions::default()
        };
        let ready = ready_plan(
            plan_release(&root, &Config::default(), &HandlerRegistry::with_builtins(), &options)
                .unwrap(),
        );
        assert_eq!(ready.context.current.source, VersionSource::Tag);
        assert_eq!(ready.context.commits.len(), 1);
        assert_eq!(ready.context.commits[0].subject, "new");
        assert_eq!(ready.next.to_string(), "1.0.1-beta.1");
    }

    // ===== Execute =====

    #[test]
    fn execute_writes_files_changelog_commit_and_tag() {
        let (_tmp, root) = init_repo();
        fs::write(root.join("package.json"), package("1.0.0")).unwrap();
        fs::write(root.join("Chart.yaml"), "name: demo\nappVersion: 1.0.0\n").unwrap();
        commit_file(&root, "a.txt", "chore: init");
        git::create_tag(&root, "v1.0.0", "Release 1.0.0", false).unwrap();
        commit_file(&root, "b.txt", "feat(api): add search");

        let mut config = Config::default();
        config.version.files = vec![
            VersionFileEntry::from("package.json"),
            crate::files::VersionFile::new("Chart.yaml")
                .with_key("appVersion")
                .into(),
            VersionFileEntry::from("missing/package.json"),
        ];
        let registry = HandlerRegistry::with_builtins();
        let options = ReleaseOptions {
            bump: Some(BumpType::Minor),
            ..ReleaseOptions::default()
        };
        let ready = ready_plan(plan_release(&root, &config, &registry, &options).unwrap());
        let outcome = ready.execute(&root, &config, &registry, no_push()).unwrap();

        assert_eq!(outcome.version.to_string(), "1.1.0");
        assert_eq!(outcome.files.iter().filter(|r| r.success).count(), 2);
        assert!(!outcome.files[2].success);
        assert!(outcome.committed);
        assert!(!outcome.pushed);
        assert_eq!(outcome.tag.as_deref(), Some("v1.1.0"));

        assert_eq!(fs::read_to_string(root.join("package.json")).unwrap(), package("1.1.0"));
        assert_eq!(
            fs::read_to_string(root.join("Chart.yaml")).unwrap(),
            "name: demo\nappVersion: 1.1.0\n"
        );
        let changelog = fs::read_to_string(root.join("CHANGELOG.md")).unwrap();
        assert!(changelog.starts_with(changelog::PREAMBLE));
        assert!(changelog.contains("### Features\n\n- **api:** add search ("));

        assert!(git::tag_exists(&root, "v1.1.0").unwrap());
        assert!(git::is_clean(&root).unwrap());
        let head = git::parse_log_output(&git::log(&root, Some("v1.0.0"), "HEAD").unwrap());
        assert_eq!(head[0].subject, "chore(release): 1.1.0");
    }

    #[test]
    fn execute_refuses_existing_tag() {
        let (_tmp, root) = init_repo();
        commit_file(&root, "a.txt", "feat: one");
        git::create_tag(&root, "v0.1.0", "Release", false).unwrap();

        let options = ReleaseOptions {
            explicit_version: Some("0.1.0".to_string()),
            ..ReleaseOptions::default()
        };
        let config = Config::default();
        let registry = HandlerRegistry::with_builtins();
        let ready = ready_plan(plan_release(&root, &config, &registry, &options).unwrap());
        let err = ready.execute(&root, &config, &registry, no_push()).unwrap_err();
        assert!(matches!(err, ReleaseError::TagExists(ref tag) if tag == "v0.1.0"));
    }

    #[test]
    fn skipped_steps_leave_no_trace() {
        let (_tmp, root) = init_repo();
        commit_file(&root, "a.txt", "fix: one");

        let options = ReleaseOptions {
            bump: Some(BumpType::Patch),
            ..ReleaseOptions::default()
        };
        let config = Config::default();
        let registry = HandlerRegistry::with_builtins();
        let ready = ready_plan(plan_release(&root, &config, &registry, &options).unwrap());
        let outcome = ready
            .execute(
                &root,
                &config,
                &registry,
                ExecuteOptions {
                    changelog: false,
                    tag: false,
                    push: false,
                    provider_release: true,
                },
            )
            .unwrap();

        // package.json is missing, so nothing changed on disk
        assert!(!outcome.committed);
        assert!(outcome.changelog.is_none());
        assert!(outcome.tag.is_none());
        assert!(outcome.provider_release.is_none());
        assert!(!root.join("CHANGELOG.md").exists());
        assert!(git::tags(&root).unwrap().is_empty());
    }

    // ===== History =====

    #[test]
    fn history_lists_releases_newest_first_with_their_commits() {
        let (_tmp, root) = init_repo();
        commit_file(&root, "a.txt", "feat: first");
        git::create_tag(&root, "v1.0.0", "Release 1.0.0", false).unwrap();
        commit_file(&root, "b.txt", "fix: second");
        commit_file(&root, "c.txt", "feat: third");
        git::create_tag(&root, "v1.1.0", "Release 1.1.0", false).unwrap();
        commit_file(&root, "d.txt", "chore: unreleased");

        let records = history(&root, &Config::default()).unwrap();
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.tag.as_str(), r.version.as_str(), r.commits.len()))
            .collect();
        assert_eq!(summary, [("v1.1.0", "1.1.0", 2), ("v1.0.0", "1.0.0", 1)]);
        assert_eq!(records[0].commits[0].subject, "feat: third");
        assert!(records.iter().all(|r| r.date.is_some()));
    }

    #[test]
    fn history_without_tags_is_empty() {
        let (_tmp, root) = init_repo();
        commit_file(&root, "a.txt", "feat: first");
        assert!(history(&root, &Config::default()).unwrap().is_empty());
    }
}

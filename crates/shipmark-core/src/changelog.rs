//! Changelog rendering and splicing.
//!
//! An entry is a `## version (date)` section with one `###` subsection per
//! commit group. [`splice`] puts a fresh entry into an existing changelog,
//! replacing the section for the same version when one is already there.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::commits::{self, ParsedCommit, TYPE_ORDER};
use crate::config::ChangelogConfig;

/// Preamble written at the top of a new changelog.
pub const PREAMBLE: &str =
    "# Changelog\n\nAll notable changes to this project will be documented in this file.\n\n";

/// Errors from reading or writing the changelog file.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// Reading or writing the file failed.
    #[error("failed to update changelog {path}: {source}")]
    Io {
        /// Changelog path.
        path: Utf8PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

/// Result alias for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// Today's date as `YYYY-MM-DD`, local time.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Render one release section.
///
/// With a repository URL the version links to its release page and hashes
/// link to their commits.
pub fn render_entry(
    version: &str,
    date: &str,
    commits: &[ParsedCommit],
    config: &ChangelogConfig,
    repo_url: Option<&str>,
) -> String {
    let title = repo_url.map_or_else(
        || version.to_string(),
        |repo| format!("[{version}]({repo}/releases/tag/v{version})"),
    );
    let mut out = if config.include_date {
        format!("## {title} ({date})\n\n")
    } else {
        format!("## {title}\n\n")
    };

    let labels = config.labels();
    let groups = commits::sort_groups(commits::group_by_type(commits, &labels), &TYPE_ORDER);
    for (kind, group) in &groups {
        out.push_str(&format!("### {}\n\n", commits::group_title(kind, &labels)));
        for commit in group {
            out.push_str(&entry_line(commit, config, repo_url));
            out.push('\n');
        }
        out.push('\n');
    }

    debug!(%version, sections = groups.len(), "rendered changelog entry");
    format!("{}\n", out.trim_end())
}

fn entry_line(commit: &ParsedCommit, config: &ChangelogConfig, repo_url: Option<&str>) -> String {
    let mut line = String::from("- ");
    if let Some(scope) = &commit.scope {
        line.push_str(&format!("**{scope}:** "));
    }
    line.push_str(&commit.subject);

    if config.include_hash {
        match repo_url {
            Some(repo) => line.push_str(&format!(
                " ([{}]({repo}/commit/{}))",
                commit.short_hash, commit.hash
            )),
            None => line.push_str(&format!(" ({})", commit.short_hash)),
        }
    }
    if config.include_author && !commit.author.is_empty() {
        line.push_str(&format!(" by {}", commit.author));
    }
    if commit.breaking
        && let Some(note) = &commit.breaking_note
    {
        line.push_str(&format!("\n  - {note}"));
    }
    line
}

/// Merge `entry` for `version` into an existing changelog.
///
/// - A section for the same version is replaced, up to the next
///   `## x.y.z` header.
/// - Otherwise the entry goes right after the `# Changelog` preamble.
/// - Otherwise a preamble is added and existing text follows the entry.
pub fn splice(existing: &str, entry: &str, version: &str) -> String {
    let same = Regex::new(&format!(r"(?m)^## \[?{}(?:\]|\s|$)", regex::escape(version))).ok();
    let any = Regex::new(r"(?m)^## \[?\d+\.\d+\.\d+").ok();

    if let Some(found) = same.as_ref().and_then(|re| re.find(existing)) {
        let start = found.start();
        let after = found.end();
        let next = any
            .as_ref()
            .and_then(|re| re.find_at(existing, after))
            .map(|m| m.start());
        debug!(%version, replaced = true, "splicing changelog");
        return match next {
            Some(next) => format!("{}{entry}\n{}", &existing[..start], &existing[next..]),
            None => format!("{}{entry}", &existing[..start]),
        };
    }

    if existing.starts_with("# Changelog") {
        let body_start = existing.find('\n').map_or(existing.len(), |i| i + 1);
        if let Some(gap) = existing[body_start..].find("\n\n") {
            let cut = body_start + gap + 2;
            let rest = &existing[cut..];
            return if rest.trim().is_empty() {
                format!("{}{entry}", &existing[..cut])
            } else {
                format!("{}{entry}\n{rest}", &existing[..cut])
            };
        }
    }

    if existing.trim().is_empty() {
        format!("{PREAMBLE}{entry}")
    } else {
        format!("{PREAMBLE}{entry}\n{existing}")
    }
}

/// Render `entry` into the changelog file under `root`.
#[instrument(skip(entry))]
pub fn write_entry(
    root: &Utf8Path,
    file: &str,
    entry: &str,
    version: &str,
) -> ChangelogResult<Utf8PathBuf> {
    let path = root.join(file);
    let io_err = |source: io::Error| ChangelogError::Io {
        path: path.clone(),
        source,
    };
    let existing = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_err(e)),
    };
    fs::write(&path, splice(&existing, entry, version)).map_err(io_err)?;
    info!(%path, %version, "updated changelog");
    Ok(path)
}

/// Compact listing of what an entry would contain.
pub fn preview(commits: &[ParsedCommit], labels: &IndexMap<String, String>) -> Vec<String> {
    let groups = commits::sort_groups(commits::group_by_type(commits, labels), &TYPE_ORDER);
    let mut lines = Vec::new();
    for (kind, group) in &groups {
        lines.push(format!("{}:", commits::group_title(kind, labels)));
        for commit in group {
            let scope = commit
                .scope
                .as_ref()
                .map(|s| format!("({s}) "))
                .unwrap_or_default();
            lines.push(format!("  - {scope}{}", commit.subject));
        }
    }
    lines
}

/// Web URL for a git remote: `.git` stripped and SSH forms mapped to
/// `https://`.
pub fn normalize_repo_url(remote: &str) -> String {
    let remote = remote.trim();
    let url = if let Some(rest) = remote.strip_prefix("ssh://") {
        let rest = rest.split_once('@').map_or(rest, |(_, host)| host);
        format!("https://{rest}")
    } else if let Some((host, path)) = remote
        .strip_prefix("git@")
        .and_then(|rest| rest.split_once(':'))
    {
        format!("https://{host}/{path}")
    } else {
        remote.to_string()
    };
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url).to_string()
}

//! Git operations for release workflows.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! SSH keys, GPG signing, hooks, and other configuration. Every function runs
//! in the given repository directory rather than the process working
//! directory.

use std::process::Command;

use camino::Utf8Path;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Field separator in `git log` output (ASCII unit separator).
const FIELD_SEP: char = '\u{1f}';
/// Record separator in `git log` output (ASCII record separator).
const RECORD_SEP: char = '\u{1e}';
/// `--pretty` format matching [`parse_log_output`].
const LOG_FORMAT: &str = "--pretty=format:%H%x1f%h%x1f%s%x1f%b%x1f%an%x1f%ad%x1e";

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "status").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// One commit as read from `git log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCommit {
    /// Full hash.
    pub hash: String,
    /// Abbreviated hash.
    pub short_hash: String,
    /// First line of the message.
    pub subject: String,
    /// Remaining message text, trimmed.
    pub body: String,
    /// Author name.
    pub author: String,
    /// Author date, `YYYY-MM-DD`.
    pub date: String,
}

// ──── Repository state ────

/// Check if `root` is inside a git work tree.
#[instrument]
pub fn is_inside_repo(root: &Utf8Path) -> GitResult<bool> {
    match git(root, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Fail with [`GitError::NotARepo`] unless `root` is inside a work tree.
pub fn ensure_repo(root: &Utf8Path) -> GitResult<()> {
    if is_inside_repo(root)? {
        Ok(())
    } else {
        Err(GitError::NotARepo)
    }
}

/// Whether `HEAD` points at a commit.
#[instrument]
pub fn has_commits(root: &Utf8Path) -> GitResult<bool> {
    match git(root, &["rev-parse", "--verify", "--quiet", "HEAD"]) {
        Ok(_) => Ok(true),
        Err(GitError::Command { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether any remote is configured.
#[instrument]
pub fn has_remote(root: &Utf8Path) -> GitResult<bool> {
    let output = git(root, &["remote"])?;
    Ok(!output.trim().is_empty())
}

/// Get the current branch name.
///
/// Returns `None` if in a detached HEAD state.
#[instrument]
pub fn current_branch(root: &Utf8Path) -> GitResult<Option<String>> {
    let output = git(root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let branch = output.trim().to_string();
    if branch == "HEAD" {
        debug!("detached HEAD");
        Ok(None)
    } else {
        debug!(%branch, "current branch");
        Ok(Some(branch))
    }
}

/// URL of the `origin` remote, if configured.
#[instrument]
pub fn remote_url(root: &Utf8Path) -> GitResult<Option<String>> {
    match git(root, &["remote", "get-url", "origin"]) {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check whether the working tree is clean (no uncommitted changes).
#[instrument]
pub fn is_clean(root: &Utf8Path) -> GitResult<bool> {
    let output = git(root, &["status", "--porcelain"])?;
    let clean = output.trim().is_empty();
    debug!(clean, "working tree status");
    Ok(clean)
}

// ──── Tags ────

/// All tags, highest version first.
#[instrument]
pub fn tags(root: &Utf8Path) -> GitResult<Vec<String>> {
    let output = git(root, &["tag", "--sort=-v:refname"])?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Most recent tag reachable from `HEAD`.
#[instrument]
pub fn latest_tag(root: &Utf8Path) -> GitResult<Option<String>> {
    match git(root, &["describe", "--tags", "--abbrev=0"]) {
        Ok(output) => {
            let tag = output.trim().to_string();
            debug!(%tag, "latest tag");
            Ok(Some(tag).filter(|t| !t.is_empty()))
        }
        Err(GitError::Command { .. }) => {
            debug!("no tags");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Number of commits after `tag` (or in total) up to `HEAD`.
#[instrument]
pub fn commits_since(root: &Utf8Path, tag: Option<&str>) -> GitResult<usize> {
    let range = tag.map_or_else(|| "HEAD".to_string(), |tag| format!("{tag}..HEAD"));
    match git(root, &["rev-list", "--count", &range]) {
        Ok(output) => Ok(output.trim().parse().unwrap_or(0)),
        Err(GitError::Command { .. }) => Ok(0),
        Err(e) => Err(e),
    }
}

/// Creation date of `tag` as `YYYY-MM-DD`: the tagger date of an annotated
/// tag, the commit date of a lightweight one. `None` when the tag is unknown.
#[instrument]
pub fn tag_date(root: &Utf8Path, tag: &str) -> GitResult<Option<String>> {
    let refname = format!("refs/tags/{tag}");
    let output = git(
        root,
        &["for-each-ref", "--format=%(creatordate:short)", &refname],
    )?;
    Ok(Some(output.trim().to_string()).filter(|date| !date.is_empty()))
}

/// Whether a tag named `name` exists locally.
#[instrument]
pub fn tag_exists(root: &Utf8Path, name: &str) -> GitResult<bool> {
    let refname = format!("refs/tags/{name}");
    match git(root, &["rev-parse", "--verify", "--quiet", &refname]) {
        Ok(_) => Ok(true),
        Err(GitError::Command { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create an annotated tag, or a signed one when `sign` is set.
#[instrument]
pub fn create_tag(root: &Utf8Path, name: &str, message: &str, sign: bool) -> GitResult<()> {
    let flag = if sign { "-s" } else { "-a" };
    git(root, &["tag", flag, name, "-m", message])?;
    info!(%name, sign, "created tag");
    Ok(())
}

/// Delete a local tag.
#[instrument]
pub fn delete_tag(root: &Utf8Path, name: &str) -> GitResult<()> {
    git(root, &["tag", "-d", name])?;
    info!(%name, "deleted tag");
    Ok(())
}

/// Delete a tag on `origin`.
#[instrument]
pub fn delete_remote_tag(root: &Utf8Path, name: &str) -> GitResult<()> {
    let refspec = format!("refs/tags/{name}");
    git(root, &["push", "origin", "--delete", &refspec])?;
    info!(%name, "deleted remote tag");
    Ok(())
}

// ──── Commits ────

/// Stage every change in the work tree.
#[instrument]
pub fn stage_all(root: &Utf8Path) -> GitResult<()> {
    git(root, &["add", "-A"])?;
    Ok(())
}

/// Commit staged changes, GPG-signed when `sign` is set.
#[instrument]
pub fn commit(root: &Utf8Path, message: &str, sign: bool) -> GitResult<()> {
    let mut args = vec!["commit", "-m", message];
    if sign {
        args.push("-S");
    }
    git(root, &args)?;
    info!(%message, "committed");
    Ok(())
}

/// Push the current branch, then tags when `include_tags` is set.
#[instrument]
pub fn push(root: &Utf8Path, include_tags: bool) -> GitResult<()> {
    git(root, &["push"])?;
    if include_tags {
        git(root, &["push", "--tags"])?;
    }
    info!(include_tags, "pushed");
    Ok(())
}

/// Raw `git log` text for `from..to` (or everything up to `to`).
///
/// Dates are short (`YYYY-MM-DD`). Feed the result to [`parse_log_output`].
#[instrument]
pub fn log(root: &Utf8Path, from: Option<&str>, to: &str) -> GitResult<String> {
    let range = from.map_or_else(|| to.to_string(), |from| format!("{from}..{to}"));
    git(root, &["log", &range, LOG_FORMAT, "--date=short"])
}

/// Commits reachable from `to` but not from `from`, newest first.
#[instrument]
pub fn commits_between(
    root: &Utf8Path,
    from: Option<&str>,
    to: &str,
) -> GitResult<Vec<RawCommit>> {
    Ok(parse_log_output(&log(root, from, to)?))
}

/// Split `git log` output produced with the separator format into commits.
///
/// Records without a hash are dropped.
pub fn parse_log_output(output: &str) -> Vec<RawCommit> {
    output
        .split(RECORD_SEP)
        .map(|record| record.trim_start_matches(['\n', '\r']))
        .filter(|record| !record.trim().is_empty())
        .map(|record| {
            let mut fields = record.split(FIELD_SEP);
            let mut next = || fields.next().unwrap_or_default().trim().to_string();
            RawCommit {
                hash: next(),
                short_hash: next(),
                subject: next(),
                body: next(),
                author: next(),
                date: next(),
            }
        })
        .filter(|commit| !commit.hash.is_empty())
        .collect()
}

/// Run a git command in `root` and return its stdout.
fn git(root: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git").current_dir(root).args(args).output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}

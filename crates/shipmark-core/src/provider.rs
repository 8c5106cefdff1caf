//! Hosted release providers.
//!
//! The provider is inferred from the `origin` URL. GitHub and GitLab
//! releases are created through their CLIs (`gh`, `glab`) when installed;
//! otherwise callers can point the user at the web form.

use std::fmt;
use std::io::Write;
use std::process::Command;

use camino::Utf8Path;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::changelog::normalize_repo_url;

/// Errors from creating a hosted release.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The host has no release command.
    #[error("no release command available for provider: {0}")]
    Unsupported(Provider),

    /// The provider CLI is not on `PATH`.
    #[error("CLI '{0}' not found; install it or create the release manually")]
    CliMissing(&'static str),

    /// Writing the notes file or spawning the CLI failed.
    #[error("failed to run release command: {0}")]
    Io(#[from] std::io::Error),

    /// The CLI exited with an error.
    #[error("release command failed: {0}")]
    Failed(String),
}

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Hosting service behind a remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// github.com
    GitHub,
    /// gitlab.com
    GitLab,
    /// bitbucket.org
    Bitbucket,
    /// Anything else.
    Unknown,
}

impl Provider {
    /// Detect the provider from a remote URL.
    pub fn detect(remote_url: &str) -> Self {
        let url = remote_url.to_lowercase();
        if url.contains("github.com") {
            Self::GitHub
        } else if url.contains("gitlab.com") {
            Self::GitLab
        } else if url.contains("bitbucket.org") {
            Self::Bitbucket
        } else {
            Self::Unknown
        }
    }

    /// CLI that can create releases on this host.
    pub const fn cli(self) -> Option<&'static str> {
        match self {
            Self::GitHub => Some("gh"),
            Self::GitLab => Some("glab"),
            Self::Bitbucket | Self::Unknown => None,
        }
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Bitbucket => "bitbucket",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What can be done for a release on the remote's host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    /// Detected host.
    pub provider: Provider,
    /// CLI name, when the host has one.
    pub cli: Option<&'static str>,
    /// Whether that CLI is on `PATH`.
    pub cli_available: bool,
    /// Web page for creating the release by hand.
    pub release_url: Option<String>,
}

impl ProviderInfo {
    /// Inspect `remote_url` (if any) for the release of `tag`.
    #[instrument]
    pub fn for_remote(remote_url: Option<&str>, tag: &str) -> Self {
        let Some(remote_url) = remote_url else {
            return Self {
                provider: Provider::Unknown,
                cli: None,
                cli_available: false,
                release_url: None,
            };
        };

        let provider = Provider::detect(remote_url);
        let cli = provider.cli();
        let cli_available = cli.is_some_and(|cli| which::which(cli).is_ok());
        let release_url = web_release_url(remote_url, provider, tag);
        debug!(%provider, ?cli, cli_available, "release provider");
        Self {
            provider,
            cli,
            cli_available,
            release_url,
        }
    }

    /// Whether [`ProviderInfo::create_release`] can run.
    pub const fn can_create(&self) -> bool {
        self.cli.is_some() && self.cli_available
    }

    /// Run `<cli> release create <tag> --notes-file <tmp>` in `root`.
    #[instrument(skip(self, notes), fields(provider = %self.provider))]
    pub fn create_release(&self, root: &Utf8Path, tag: &str, notes: &str) -> ProviderResult<String> {
        let Some(cli) = self.cli else {
            return Err(ProviderError::Unsupported(self.provider));
        };
        if !self.cli_available {
            return Err(ProviderError::CliMissing(cli));
        }

        let mut notes_file = tempfile::Builder::new()
            .prefix("shipmark-notes-")
            .suffix(".md")
            .tempfile()?;
        notes_file.write_all(notes.as_bytes())?;
        notes_file.flush()?;

        let output = Command::new(cli)
            .current_dir(root)
            .args(["release", "create", tag, "--notes-file"])
            .arg(notes_file.path())
            .output()?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            info!(%tag, "created hosted release");
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ProviderError::Failed(stderr))
        }
    }
}

/// Web form for a new release, pre-filled with `tag`.
pub fn web_release_url(remote_url: &str, provider: Provider, tag: &str) -> Option<String> {
    let base = normalize_repo_url(remote_url);
    match provider {
        Provider::GitHub => Some(format!("{base}/releases/new?tag={tag}")),
        Provider::GitLab => Some(format!("{base}/-/releases/new?tag_name={tag}")),
        Provider::Bitbucket | Provider::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_hosts_case_insensitively() {
        assert_eq!(Provider::detect("git@github.com:acme/w.git"), Provider::GitHub);
        assert_eq!(Provider::detect("https://GitLab.com/acme/w"), Provider::GitLab);
        assert_eq!(Provider::detect("https://bitbucket.org/acme/w"), Provider::Bitbucket);
        assert_eq!(Provider::detect("https://git.example.com/w"), Provider::Unknown);
    }

    #[test]
    fn only_github_and_gitlab_have_clis() {
        assert_eq!(Provider::GitHub.cli(), Some("gh"));
        assert_eq!(Provider::GitLab.cli(), Some("glab"));
        assert_eq!(Provider::Bitbucket.cli(), None);
        assert_eq!(Provider::Unknown.cli(), None);
    }

    #[test]
    fn web_urls_per_provider() {
        assert_eq!(
            web_release_url("git@github.com:acme/widget.git", Provider::GitHub, "v1.0.0").as_deref(),
            Some("https://github.com/acme/widget/releases/new?tag=v1.0.0")
        );
        assert_eq!(
            web_release_url("https://gitlab.com/acme/widget.git", Provider::GitLab, "v1.0.0")
                .as_deref(),
            Some("https://gitlab.com/acme/widget/-/releases/new?tag_name=v1.0.0")
        );
        assert_eq!(
            web_release_url("https://bitbucket.org/acme/widget", Provider::Bitbucket, "v1"),
            None
        );
    }

    #[test]
    fn no_remote_means_nothing_to_do() {
        let info = ProviderInfo::for_remote(None, "v1.0.0");
        assert_eq!(info.provider, Provider::Unknown);
        assert!(!info.can_create());
        assert_eq!(info.release_url, None);
    }

    #[test]
    fn unsupported_provider_refuses_to_create() {
        let info = ProviderInfo::for_remote(Some("https://bitbucket.org/acme/widget"), "v1.0.0");
        let tmp = tempfile::TempDir::new().unwrap();
        let root = Utf8Path::from_path(tmp.path()).unwrap();
        let err = info.create_release(root, "v1.0.0", "notes").unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(Provider::Bitbucket)));
        assert!(err.to_string().contains("bitbucket"));
    }
}

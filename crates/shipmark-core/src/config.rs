//! Layered configuration for shipmark.
//!
//! Sources are merged lowest to highest:
//!
//! 1. built-in defaults (`#[serde(default)]` on every section)
//! 2. the user file, `config.<ext>` in the platform config dir
//! 3. the nearest project file, found by walking up from the working directory
//! 4. files passed explicitly (`--config`)
//!
//! Within one directory the project file is the first of `.shipmark.<ext>`,
//! `shipmark.<ext>` (for `<ext>` in `toml`, `yaml`, `yml`, `json`), then the
//! older `.shipmarkrc.{yml,yaml,json}` names. The walk stops at the directory
//! holding `.git`.
//!
//! Keys are `snake_case`; `camelCase` spellings such as `includeHash` are
//! accepted too.
//!
//! ```no_run
//! use camino::Utf8Path;
//! use shipmark_core::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_project_search(Utf8Path::new("."))
//!     .load()
//!     .unwrap();
//! println!("tag prefix: {}", config.version.tag_prefix);
//! ```

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Toml, Yaml};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::commits;
use crate::error::{ConfigError, ConfigResult};
use crate::files::VersionFileEntry;

/// The configuration for shipmark.
///
/// Deserialized from config files found during discovery (TOML, YAML, or JSON).
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    #[serde(alias = "logLevel")]
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    #[serde(alias = "logDir", skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<Utf8PathBuf>,
    /// Changelog generation.
    pub changelog: ChangelogConfig,
    /// Version files, tag and commit naming.
    pub version: VersionConfig,
    /// Commit message conventions.
    pub commits: CommitsConfig,
    /// Git behavior during releases.
    pub git: GitConfig,
}

/// Changelog generation settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChangelogConfig {
    /// Changelog path relative to the project root.
    pub file: String,
    /// Section title per commit type.
    ///
    /// Entries here are layered over the built-in titles, so a config only
    /// needs to list the types it adds or renames.
    pub types: IndexMap<String, String>,
    /// Append the short hash to each entry.
    #[serde(alias = "includeHash")]
    pub include_hash: bool,
    /// Put the release date in the section header.
    #[serde(alias = "includeDate")]
    pub include_date: bool,
    /// Append the commit author to each entry.
    #[serde(alias = "includeAuthor")]
    pub include_author: bool,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            file: "CHANGELOG.md".to_string(),
            types: commits::default_labels(),
            include_hash: true,
            include_date: true,
            include_author: false,
        }
    }
}

impl ChangelogConfig {
    /// Built-in section titles overridden by the configured ones.
    pub fn labels(&self) -> IndexMap<String, String> {
        let mut labels = commits::default_labels();
        labels.extend(self.types.clone());
        labels
    }
}

/// Version file and naming settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct VersionConfig {
    /// Manifests whose version is kept in step, in priority order.
    pub files: Vec<VersionFileEntry>,
    /// Text in front of the version in tag names.
    #[serde(alias = "tagPrefix")]
    pub tag_prefix: String,
    /// Annotated tag message; `{version}` is replaced.
    #[serde(alias = "tagMessage")]
    pub tag_message: String,
    /// Release commit message; `{version}` is replaced.
    #[serde(alias = "commitMessage")]
    pub commit_message: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            files: vec![VersionFileEntry::from("package.json")],
            tag_prefix: "v".to_string(),
            tag_message: "Release {version}".to_string(),
            commit_message: "chore(release): {version}".to_string(),
        }
    }
}

impl VersionConfig {
    /// Tag name for `version`.
    pub fn tag_name(&self, version: &str) -> String {
        format!("{}{version}", self.tag_prefix)
    }

    /// Tag message for `version`.
    pub fn tag_message_for(&self, version: &str) -> String {
        self.tag_message.replace("{version}", version)
    }

    /// Commit message for `version`.
    pub fn commit_message_for(&self, version: &str) -> String {
        self.commit_message.replace("{version}", version)
    }
}

/// Commit convention settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommitsConfig {
    /// Parse commits as conventional commits.
    pub conventional: bool,
    /// Accept types outside the built-in set.
    #[serde(alias = "allowCustomTypes")]
    pub allow_custom_types: bool,
}

impl Default for CommitsConfig {
    fn default() -> Self {
        Self {
            conventional: true,
            allow_custom_types: true,
        }
    }
}

/// Git behavior during releases.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    /// Push the release commit.
    pub push: bool,
    /// Push tags along with the commit.
    #[serde(alias = "pushTags")]
    pub push_tags: bool,
    /// Create signed tags.
    #[serde(alias = "signTags")]
    pub sign_tags: bool,
    /// Create signed commits.
    #[serde(alias = "signCommits")]
    pub sign_commits: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            push: true,
            push_tags: true,
            sign_tags: false,
            sign_commits: false,
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Extensions tried for each config name, in order.
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Older project config names, checked after the current ones.
const LEGACY_CONFIG_FILES: &[&str] = &[".shipmarkrc.yml", ".shipmarkrc.yaml", ".shipmarkrc.json"];

/// File written by [`write_default_config`].
pub const DEFAULT_CONFIG_FILE: &str = ".shipmark.yml";


const APP_NAME: &str = "shipmark";

/// Builder that discovers and merges configuration files.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    /// Directory entry that ends the upward walk.
    boundary_marker: Option<String>,
    /// Merged last, in order.
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// A loader that reads the user file and stops project search at `.git`.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Look for a project file in `path` and its ancestors.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/shipmark/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Stop the upward walk at the first directory containing `marker`.
    ///
    /// A project file next to the marker is still found.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Walk all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Merge `path` on top of everything discovered; later files win.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Merge user, project and explicit files over the defaults.
    ///
    /// Fails when a file exists but cannot be parsed or holds a value of the
    /// wrong shape.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        // No defaults provider: an aliased key must never meet its
        // snake_case default in the same dict.
        let mut figment = Figment::new();

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            tracing::debug!(path = %project_config, "found project config");
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            version_files = config.version.files.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            if let Some(ref marker) = self.boundary_marker {
                let marker_path = dir.join(marker);
                if marker_path.exists() && dir != start {
                    break;
                }
            }

            if let Some(found) = config_in_dir(&dir) {
                return Some(found);
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Unknown extensions are read as TOML.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("toml") => figment.merge(Toml::file_exact(path.as_str())),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// First config file present directly in `dir`.
fn config_in_dir(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let current = CONFIG_EXTENSIONS.iter().flat_map(|ext| {
        [
            dir.join(format!(".{APP_NAME}.{ext}")),
            dir.join(format!("{APP_NAME}.{ext}")),
        ]
    });
    let legacy = LEGACY_CONFIG_FILES.iter().map(|name| dir.join(name));
    current.chain(legacy).find(|path| path.is_file())
}

/// Path of the project file that [`ConfigLoader`] would pick for `start`.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .find_project_config(start.as_ref())
}

/// Write the default configuration to `dir/.shipmark.yml`.
///
/// Refuses to replace an existing file unless `force` is set.
#[tracing::instrument]
pub fn write_default_config(dir: &Utf8Path, force: bool) -> ConfigResult<Utf8PathBuf> {
    let path = dir.join(DEFAULT_CONFIG_FILE);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path));
    }

    let body = serde_yaml::to_string(&Config::default())?;
    let content = format!("# shipmark configuration\n{body}");
    fs::write(&path, content).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::info!(%path, "wrote default configuration");
    Ok(path)
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/shipmark/` on Linux, `~/Library/Application Support/shipmark/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the user data directory path.
///
/// Returns `~/.local/share/shipmark/` on Linux, `~/Library/Application Support/shipmark/`
/// on macOS, and equivalent on other platforms.
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_dir().to_path_buf()).ok()
}

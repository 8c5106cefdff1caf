//! Version files: the manifests whose version field is kept in step.
//!
//! Each supported format implements [`VersionHandler`]. The
//! [`HandlerRegistry`] picks a handler per [`VersionFile`], runs it, and
//! turns failures into per-file results so one bad manifest never stops a
//! batch.
//!
//! | Handler          | Claims                                   |
//! |------------------|------------------------------------------|
//! | `package.json`   | files named exactly `package.json`       |
//! | `pyproject.toml` | files named exactly `pyproject.toml`     |
//! | `yaml`           | `.yaml` / `.yml` files that carry a `key` |

pub mod package_json;
pub mod pyproject;
pub mod registry;
pub mod yaml;

pub use package_json::PackageJsonHandler;
pub use pyproject::PyprojectHandler;
pub use registry::{
    HandlerRegistry, NO_HANDLER, ReadResult, SyncReport, VersionReadout, WriteResult, get_version,
    set_version,
};
pub use yaml::YamlHandler;

use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::DocumentError;

/// Errors raised by a single handler operation.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The file does not exist.
    #[error("file not found: {0}")]
    NotFound(Utf8PathBuf),

    /// Reading or writing the file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: Utf8PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The file content could not be parsed or serialized.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Parser message.
        message: String,
    },

    /// The manifest declares its version as computed at build time.
    #[error("version is dynamic in {0} (listed in project.dynamic); refusing to write a static version")]
    DynamicVersion(Utf8PathBuf),

    /// A YAML entry was written without a key path.
    #[error("YAML handler requires a key path for {0}")]
    MissingKey(Utf8PathBuf),

    /// Navigating or editing the document failed.
    #[error("{path}: {source}")]
    Document {
        /// File being edited.
        path: Utf8PathBuf,
        /// Navigation or edit error.
        source: DocumentError,
    },

    /// The edited file did not read back with the written version.
    #[error("{path}: wrote {expected:?} but the file now reads {found:?}")]
    Verify {
        /// File being edited.
        path: Utf8PathBuf,
        /// Version that was written.
        expected: String,
        /// Version read back.
        found: Option<String>,
    },
}

/// Result type alias using [`HandlerError`].
pub type HandlerResult<T> = Result<T, HandlerError>;

/// One manifest to keep in step, in normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFile {
    /// Path relative to the project root.
    pub path: String,
    /// Dotted key path into a YAML document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Text written in front of the version (`"v"` stores `v2.0.0`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl VersionFile {
    /// An entry with only a path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: None,
            prefix: None,
        }
    }

    /// Set the YAML key path.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the written prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// File name component of the path.
    pub fn file_name(&self) -> Option<&str> {
        Utf8Path::new(&self.path).file_name()
    }

    /// Absolute location under `root`.
    pub fn resolve(&self, root: &Utf8Path) -> Utf8PathBuf {
        root.join(&self.path)
    }
}

/// A configured version file: either a bare path or a detailed entry.
///
/// ```
/// use shipmark_core::files::{VersionFile, VersionFileEntry};
///
/// let entry: VersionFileEntry = serde_json::from_str(r#""package.json""#).unwrap();
/// assert_eq!(entry.normalize(), VersionFile::new("package.json"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionFileEntry {
    /// Shorthand for `{ path }`.
    Path(String),
    /// Full form.
    File(VersionFile),
}

impl VersionFileEntry {
    /// The object form of this entry.
    pub fn normalize(&self) -> VersionFile {
        match self {
            Self::Path(path) => VersionFile::new(path.clone()),
            Self::File(file) => file.clone(),
        }
    }
}

impl From<&str> for VersionFileEntry {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<VersionFile> for VersionFileEntry {
    fn from(file: VersionFile) -> Self {
        Self::File(file)
    }
}

/// A file format that stores a version string.
///
/// Handlers are stateless and shared; `root` is the directory that entry
/// paths are relative to.
pub trait VersionHandler: Send + Sync {
    /// Short name reported in results.
    fn name(&self) -> &'static str;

    /// Whether this handler owns `file`.
    fn can_handle(&self, file: &VersionFile) -> bool;

    /// Current version, or `None` when the file has none.
    fn read(&self, root: &Utf8Path, file: &VersionFile) -> HandlerResult<Option<String>>;

    /// Store `version` in the file.
    fn write(&self, root: &Utf8Path, file: &VersionFile, version: &str) -> HandlerResult<()>;
}

/// Read a file, mapping absence to `None`.
fn read_optional(path: &Utf8Path) -> HandlerResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(HandlerError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read a file that must exist.
fn read_required(path: &Utf8Path) -> HandlerResult<String> {
    read_optional(path)?.ok_or_else(|| HandlerError::NotFound(path.to_path_buf()))
}

/// Replace a file's content through a temporary sibling, keeping its
/// permissions.
fn write_atomic(path: &Utf8Path, content: &str) -> HandlerResult<()> {
    let io_err = |source: io::Error| HandlerError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(io_err)?;
    }
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_deserialize_from_both_shapes() {
        let entries: Vec<VersionFileEntry> = serde_json::from_str(
            r#"["package.json", {"path": "Chart.yaml", "key": "appVersion", "prefix": "v"}]"#,
        )
        .unwrap();
        assert_eq!(entries[0].normalize(), VersionFile::new("package.json"));
        assert_eq!(
            entries[1].normalize(),
            VersionFile::new("Chart.yaml")
                .with_key("appVersion")
                .with_prefix("v")
        );
    }

    #[test]
    fn file_name_ignores_directories() {
        let file = VersionFile::new("web/client/package.json");
        assert_eq!(file.file_name(), Some("package.json"));
    }

    #[test]
    fn write_atomic_replaces_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("out.txt")).unwrap();
        fs::write(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn read_required_reports_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("absent.json")).unwrap();
        let err = read_required(&path).unwrap_err();
        assert!(err.to_string().contains("file not found"));
        assert!(read_optional(&path).unwrap().is_none());
    }
}

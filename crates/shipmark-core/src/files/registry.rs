//! Handler registry and multi-file operations.
//!
//! The registry is an ordered list of handlers; the most recently
//! registered one is asked first. It is built once by the caller and passed
//! by reference wherever versions are read or written.
//!
//! Single-file operations never return errors: a missing handler or a
//! failing handler becomes a [`ReadResult`] / [`WriteResult`] carrying the
//! message, so batch operations always visit every entry, in order.

use std::fmt;

use camino::Utf8Path;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{
    PackageJsonHandler, PyprojectHandler, VersionFile, VersionFileEntry, VersionHandler,
    YamlHandler,
};

/// Handler name reported when no handler claims a file.
pub const NO_HANDLER: &str = "none";

/// Outcome of reading one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadResult {
    /// Entry path as configured.
    pub path: String,
    /// Version found, if any.
    pub version: Option<String>,
    /// Handler that processed the file, or [`NO_HANDLER`].
    pub handler: String,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of writing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    /// Entry path as configured.
    pub path: String,
    /// Whether the file now holds the new version.
    pub success: bool,
    /// Handler that processed the file, or [`NO_HANDLER`].
    pub handler: String,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Versions read from every configured file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReadout {
    /// Version of the first entry that has one.
    pub primary: Option<String>,
    /// Per-file results, in entry order.
    pub results: Vec<ReadResult>,
}

/// Whether configured files agree on the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// `true` when there are no mismatches.
    pub synced: bool,
    /// Raw version per path, for files that have one, in entry order.
    pub versions: IndexMap<String, String>,
    /// Paths whose version differs from the first one read.
    pub mismatches: Vec<String>,
}

/// Ordered collection of [`VersionHandler`]s.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn VersionHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl HandlerRegistry {
    /// A registry with no handlers.
    pub const fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// A registry with the JSON, TOML and YAML handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(PackageJsonHandler);
        registry.register(PyprojectHandler);
        registry.register(YamlHandler);
        registry
    }

    /// Add a handler ahead of every handler already registered.
    pub fn register(&mut self, handler: impl VersionHandler + 'static) {
        debug!(handler = handler.name(), "registering version handler");
        self.handlers.insert(0, Box::new(handler));
    }

    /// Handler names in lookup order.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// First handler that claims `file`.
    pub fn find_handler(&self, file: &VersionFile) -> Option<&dyn VersionHandler> {
        self.handlers
            .iter()
            .map(AsRef::as_ref)
            .find(|handler| handler.can_handle(file))
    }

    /// Read one file.
    ///
    /// Empty version strings count as no version.
    #[instrument(skip(self, root), fields(path = %file.path))]
    pub fn read_version(&self, root: &Utf8Path, file: &VersionFile) -> ReadResult {
        let Some(handler) = self.find_handler(file) else {
            warn!("no handler for file");
            return ReadResult {
                path: file.path.clone(),
                version: None,
                handler: NO_HANDLER.to_string(),
                error: Some(no_handler_message(file)),
            };
        };

        let (version, error) = match handler.read(root, file) {
            Ok(version) => (version.filter(|v| !v.is_empty()), None),
            Err(err) => {
                warn!(handler = handler.name(), error = %err, "failed to read version");
                (None, Some(err.to_string()))
            }
        };
        ReadResult {
            path: file.path.clone(),
            version,
            handler: handler.name().to_string(),
            error,
        }
    }

    /// Write `version` to one file, verbatim.
    #[instrument(skip(self, root), fields(path = %file.path))]
    pub fn write_version(&self, root: &Utf8Path, file: &VersionFile, version: &str) -> WriteResult {
        let Some(handler) = self.find_handler(file) else {
            warn!("no handler for file");
            return WriteResult {
                path: file.path.clone(),
                success: false,
                handler: NO_HANDLER.to_string(),
                error: Some(no_handler_message(file)),
            };
        };

        let error = match handler.write(root, file, version) {
            Ok(()) => None,
            Err(err) => {
                warn!(handler = handler.name(), error = %err, "failed to write version");
                Some(err.to_string())
            }
        };
        WriteResult {
            path: file.path.clone(),
            success: error.is_none(),
            handler: handler.name().to_string(),
            error,
        }
    }

    /// Read every entry. The primary version is the first one found.
    pub fn read_version_from_files(
        &self,
        root: &Utf8Path,
        entries: &[VersionFileEntry],
    ) -> VersionReadout {
        let results: Vec<ReadResult> = entries
            .iter()
            .map(|entry| self.read_version(root, &entry.normalize()))
            .collect();
        let primary = results.iter().find_map(|r| r.version.clone());
        debug!(?primary, files = results.len(), "read versions");
        VersionReadout { primary, results }
    }

    /// Write `version` to every entry, continuing past failures.
    ///
    /// An entry with a `prefix` receives `prefix` followed by the version
    /// without its leading `v`; other entries receive `version` as given.
    pub fn write_version_to_files(
        &self,
        root: &Utf8Path,
        entries: &[VersionFileEntry],
        version: &str,
    ) -> Vec<WriteResult> {
        let results: Vec<WriteResult> = entries
            .iter()
            .map(|entry| {
                let file = entry.normalize();
                let value = file.prefix.as_ref().map_or_else(
                    || version.to_string(),
                    |prefix| format!("{prefix}{}", strip_v(version)),
                );
                self.write_version(root, &file, &value)
            })
            .collect();

        let written = results.iter().filter(|r| r.success).count();
        info!(%version, written, total = results.len(), "wrote versions");
        results
    }

    /// Compare every file's version (leading `v` ignored) with the first
    /// one found.
    pub fn validate_version_sync(
        &self,
        root: &Utf8Path,
        entries: &[VersionFileEntry],
    ) -> SyncReport {
        let mut versions = IndexMap::new();
        let mut mismatches = Vec::new();
        let mut baseline: Option<String> = None;

        for result in self.read_version_from_files(root, entries).results {
            let Some(raw) = result.version else {
                continue;
            };
            let normalized = strip_v(&raw).to_string();
            match &baseline {
                None => baseline = Some(normalized),
                Some(first) if *first != normalized => mismatches.push(result.path.clone()),
                Some(_) => {}
            }
            versions.insert(result.path, raw);
        }

        debug!(mismatches = mismatches.len(), "checked version sync");
        SyncReport {
            synced: mismatches.is_empty(),
            versions,
            mismatches,
        }
    }
}

/// Drop one lowercase `v`; `V1.0.0` is kept as written.
fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

fn no_handler_message(file: &VersionFile) -> String {
    format!("No handler found for file: {}", file.path)
}

/// Primary version across `entries`.
pub fn get_version(
    registry: &HandlerRegistry,
    entries: &[VersionFileEntry],
    root: &Utf8Path,
) -> Option<String> {
    registry.read_version_from_files(root, entries).primary
}

/// Write `version` to every entry.
pub fn set_version(
    registry: &HandlerRegistry,
    entries: &[VersionFileEntry],
    version: &str,
    root: &Utf8Path,
) -> Vec<WriteResult> {
    registry.write_version_to_files(root, entries, version)
}

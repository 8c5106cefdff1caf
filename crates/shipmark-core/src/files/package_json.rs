//! `package.json` handler.
//!
//! The manifest is rewritten through `serde_json` with key order preserved
//! and the file's own indentation (tabs or N spaces, detected from the first
//! indented line).

use camino::Utf8Path;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, instrument};

use super::{
    HandlerError, HandlerResult, VersionFile, VersionHandler, read_optional, read_required,
    write_atomic,
};

const MANIFEST: &str = "package.json";
const DEFAULT_INDENT: &str = "  ";

/// Reads and writes the `version` field of `package.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageJsonHandler;

impl VersionHandler for PackageJsonHandler {
    fn name(&self) -> &'static str {
        MANIFEST
    }

    fn can_handle(&self, file: &VersionFile) -> bool {
        file.file_name() == Some(MANIFEST)
    }

    #[instrument(skip(self, root), fields(path = %file.path))]
    fn read(&self, root: &Utf8Path, file: &VersionFile) -> HandlerResult<Option<String>> {
        let path = file.resolve(root);
        let Some(content) = read_optional(&path)? else {
            return Ok(None);
        };
        let data = parse(&path, &content)?;
        let version = data
            .get("version")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        debug!(?version, "read package.json");
        Ok(version)
    }

    #[instrument(skip(self, root), fields(path = %file.path))]
    fn write(&self, root: &Utf8Path, file: &VersionFile, version: &str) -> HandlerResult<()> {
        let path = file.resolve(root);
        let content = read_required(&path)?;
        let mut data = parse(&path, &content)?;

        let Some(object) = data.as_object_mut() else {
            return Err(HandlerError::Parse {
                path,
                message: "top-level value is not an object".to_string(),
            });
        };
        object.insert("version".to_string(), Value::String(version.to_string()));

        let indent = detect_indent(&content);
        let mut out = Vec::with_capacity(content.len() + 16);
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        data.serialize(&mut serializer)
            .map_err(|e| HandlerError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
        out.push(b'\n');

        let text = String::from_utf8_lossy(&out);
        write_atomic(&path, &text)?;
        debug!(%version, indent = indent.len(), "wrote package.json");
        Ok(())
    }
}

fn parse(path: &Utf8Path, content: &str) -> HandlerResult<Value> {
    serde_json::from_str(content).map_err(|e| HandlerError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Indentation unit of the first indented line: a tab, or that line's run
/// of leading spaces. Two spaces when nothing is indented.
fn detect_indent(content: &str) -> String {
    content
        .lines()
        .find(|line| line.starts_with([' ', '\t']))
        .map_or_else(
            || DEFAULT_INDENT.to_string(),
            |line| {
                if line.starts_with('\t') {
                    "\t".to_string()
                } else {
                    " ".repeat(line.len() - line.trim_start_matches(' ').len())
                }
            },
        )
}

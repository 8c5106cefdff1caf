//! `pyproject.toml` handler.
//!
//! Python packaging keeps the version in one of three places, checked in
//! this order:
//!
//! 1. `project.version` (PEP 621)
//! 2. `tool.poetry.version`
//! 3. `tool.setuptools.version`
//!
//! When `project.dynamic` lists `"version"`, the version comes from build
//! tooling: reads report nothing and writes are refused. Edits go through
//! `toml_edit`, so comments, ordering and formatting of everything else in
//! the file survive.

use camino::Utf8Path;
use toml_edit::{DocumentMut, Item, Table, Value};
use tracing::{debug, info, instrument};

use super::{
    HandlerError, HandlerResult, VersionFile, VersionHandler, read_optional, read_required,
    write_atomic,
};

const MANIFEST: &str = "pyproject.toml";

/// Version locations in priority order.
const VERSION_LOCATIONS: [&[&str]; 3] = [
    &["project", "version"],
    &["tool", "poetry", "version"],
    &["tool", "setuptools", "version"],
];

/// Reads and writes the version of a `pyproject.toml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PyprojectHandler;

impl VersionHandler for PyprojectHandler {
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
        let doc = parse(&path, &content)?;

        if is_dynamic(&doc) {
            debug!("version is dynamic");
            return Ok(None);
        }

        let found = VERSION_LOCATIONS.iter().find_map(|location| {
            lookup(&doc, location)
                .and_then(Item::as_str)
                .map(|version| (location.join("."), version.to_string()))
        });
        debug!(location = ?found.as_ref().map(|(loc, _)| loc), "read pyproject.toml");
        Ok(found.map(|(_, version)| version))
    }

    #[instrument(skip(self, root), fields(path = %file.path))]
    fn write(&self, root: &Utf8Path, file: &VersionFile, version: &str) -> HandlerResult<()> {
        let path = file.resolve(root);
        let content = read_required(&path)?;
        let mut doc = parse(&path, &content)?;

        if is_dynamic(&doc) {
            return Err(HandlerError::DynamicVersion(path));
        }

        let existing = VERSION_LOCATIONS
            .into_iter()
            .find(|location| lookup(&doc, location).and_then(Item::as_str).is_some());

        match existing {
            Some(location) => {
                if let Some(item) = lookup_mut(&mut doc, location) {
                    replace_string(item, version);
                }
                info!(location = %location.join("."), %version, "updated pyproject.toml");
            }
            None => {
                if !doc.contains_key("project") {
                    doc.insert("project", Item::Table(Table::new()));
                }
                let project = doc
                    .get_mut("project")
                    .and_then(Item::as_table_like_mut)
                    .ok_or_else(|| HandlerError::Parse {
                        path: path.clone(),
                        message: "`project` is not a table".to_string(),
                    })?;
                project.insert("version", toml_edit::value(version));
                info!(location = "project.version", %version, "created version in pyproject.toml");
            }
        }

        write_atomic(&path, &doc.to_string())
    }
}

fn parse(path: &Utf8Path, content: &str) -> HandlerResult<DocumentMut> {
    content.parse::<DocumentMut>().map_err(|e| HandlerError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn is_dynamic(doc: &DocumentMut) -> bool {
    lookup(doc, &["project", "dynamic"])
        .and_then(Item::as_array)
        .is_some_and(|fields| fields.iter().any(|field| field.as_str() == Some("version")))
}

fn lookup<'a>(doc: &'a DocumentMut, location: &[&str]) -> Option<&'a Item> {
    let (first, rest) = location.split_first()?;
    rest.iter()
        .try_fold(doc.get(first)?, |item, key| item.get(*key))
}

fn lookup_mut<'a>(doc: &'a mut DocumentMut, location: &[&str]) -> Option<&'a mut Item> {
    let (first, rest) = location.split_first()?;
    let mut item = doc.get_mut(first)?;
    for key in rest {
        item = item.get_mut(*key)?;
    }
    Some(item)
}

/// Swap the string value, keeping surrounding whitespace and comments.
fn replace_string(item: &mut Item, version: &str) {
    let mut value = Value::from(version);
    if let Some(existing) = item.as_value() {
        *value.decor_mut() = existing.decor().clone();
    }
    *item = Item::Value(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::TempDir;

    fn project(content: &str) -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(root.join(MANIFEST), content).unwrap();
        (tmp, root)
    }

    fn entry() -> VersionFile {
        VersionFile::new(MANIFEST)
    }

    fn read(root: &Utf8Path) -> Option<String> {
        PyprojectHandler.read(root, &entry()).unwrap()
    }

    fn contents(root: &Utf8Path) -> String {
        fs::read_to_string(root.join(MANIFEST)).unwrap()
    }

    #[test]
    fn claims_exact_basename_only() {
        assert!(PyprojectHandler.can_handle(&VersionFile::new("pkg/pyproject.toml")));
        assert!(!PyprojectHandler.can_handle(&VersionFile::new("Cargo.toml")));
    }

    #[test]
    fn project_version_wins_over_poetry() {
        let (_tmp, root) = project(
            r#"[project]
name = "demo"
version = "1.0.0"

[tool.poetry]
version = "2.0.0"
"#,
        );
        assert_eq!(read(&root).as_deref(), Some("1.0.0"));
    }

    #[test]
    fn falls_back_to_poetry_then_setuptools() {
        let (_tmp, root) = project("[tool.poetry]\nname = \"demo\"\nversion = \"0.3.0\"\n");
        assert_eq!(read(&root).as_deref(), Some("0.3.0"));

        let (_tmp, root) = project("[tool.setuptools]\nversion = \"0.4.0\"\n");
        assert_eq!(read(&root).as_deref(), Some("0.4.0"));
    }

    #[test]
    fn nothing_found_is_none_not_error() {
        let (_tmp, root) = project("[build-system]\nrequires = [\"hatchling\"]\n");
        assert_eq!(read(&root), None);

        let tmp = TempDir::new().unwrap();
        let empty = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        assert_eq!(read(&empty), None);
    }

    #[test]
    fn dynamic_version_blocks_read_and_write() {
        let original = r#"[project]
name = "demo"
version = "1.0.0"
dynamic = ["version", "readme"]
"#;
        let (_tmp, root) = project(original);
        assert_eq!(read(&root), None);

        let err = PyprojectHandler.write(&root, &entry(), "2.0.0").unwrap_err();
        assert!(matches!(err, HandlerError::DynamicVersion(_)));
        assert!(err.to_string().contains("dynamic"));
        assert_eq!(contents(&root), original);
    }

    #[test]
    fn write_preserves_comments_and_siblings() {
        let original = r#"# Build metadata
[project]
name = "demo"  # distribution name
version = "1.0.0"  # bumped by shipmark
dependencies = [
    "requests>=2",
]

[tool.ruff]
line-length = 100
"#;
        let (_tmp, root) = project(original);
        PyprojectHandler.write(&root, &entry(), "1.1.0").unwrap();
        assert_eq!(contents(&root), original.replace("\"1.0.0\"", "\"1.1.0\""));
    }

    #[test]
    fn write_targets_the_location_read_uses() {
        let original = r#"[tool.poetry]
version = "0.1.0"

[tool.setuptools]
version = "0.1.0"
"#;
        let (_tmp, root) = project(original);
        PyprojectHandler.write(&root, &entry(), "0.2.0").unwrap();
        let written = contents(&root);
        assert_eq!(
            written,
            "[tool.poetry]\nversion = \"0.2.0\"\n\n[tool.setuptools]\nversion = \"0.1.0\"\n"
        );
        assert_eq!(read(&root).as_deref(), Some("0.2.0"));
    }

    #[test]
    fn write_creates_project_version_when_absent() {
        let (_tmp, root) = project("[project]\nname = \"demo\"\n");
        PyprojectHandler.write(&root, &entry(), "0.1.0").unwrap();
        assert_eq!(contents(&root), "[project]\nname = \"demo\"\nversion = \"0.1.0\"\n");
    }

    #[test]
    fn write_creates_project_table_when_absent() {
        let (_tmp, root) = project("[tool.black]\nline-length = 88\n");
        PyprojectHandler.write(&root, &entry(), "0.1.0").unwrap();
        let written = contents(&root);
        assert!(written.contains("[tool.black]\nline-length = 88\n"));
        assert!(written.contains("[project]\nversion = \"0.1.0\"\n"));
        assert_eq!(read(&root).as_deref(), Some("0.1.0"));
    }

    #[test]
    fn write_fails_for_missing_file() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let err = PyprojectHandler.write(&root, &entry(), "1.0.0").unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }
}

//! YAML handler for arbitrary documents addressed by a dotted key path.
//!
//! Helm charts, Kubernetes manifests, CI files: anything YAML can carry a
//! version, so the handler only claims entries that say where it lives
//! (`key: appVersion`, `key: image.tag`). Writes edit the one scalar in
//! place and verify the result reads back before touching the file.

use camino::Utf8Path;
use tracing::{debug, info, instrument};

use super::{
    HandlerError, HandlerResult, VersionFile, VersionHandler, read_optional, read_required,
    write_atomic,
};
use crate::document::{self, DocumentError, DocumentResult, YamlDocument, parse_path, yaml};

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Reads and writes a version stored under a configured key path.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlHandler;

impl YamlHandler {
    fn lookup(source: &str, key: &str) -> DocumentResult<Option<String>> {
        let data = yaml::load(source)?;
        Ok(document::get(&data, &parse_path(key)).and_then(yaml::scalar_text))
    }
}

impl VersionHandler for YamlHandler {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn can_handle(&self, file: &VersionFile) -> bool {
        let yaml_file = Utf8Path::new(&file.path)
            .extension()
            .is_some_and(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)));
        yaml_file && file.key.is_some()
    }

    /// Never fails: unreadable files, bad YAML and missing keys all read as
    /// `None`.
    #[instrument(skip(self, root), fields(path = %file.path))]
    fn read(&self, root: &Utf8Path, file: &VersionFile) -> HandlerResult<Option<String>> {
        let Some(key) = file.key.as_deref() else {
            return Ok(None);
        };
        let path = file.resolve(root);
        let version = match read_optional(&path) {
            Ok(Some(source)) => Self::lookup(&source, key).unwrap_or_else(|err| {
                debug!(error = %err, "ignoring unreadable YAML");
                None
            }),
            Ok(None) => None,
            Err(err) => {
                debug!(error = %err, "ignoring unreadable YAML");
                None
            }
        };
        debug!(%key, ?version, "read YAML version");
        Ok(version)
    }

    #[instrument(skip(self, root), fields(path = %file.path))]
    fn write(&self, root: &Utf8Path, file: &VersionFile, version: &str) -> HandlerResult<()> {
        let path = file.resolve(root);
        let source = read_required(&path)?;
        let key = file
            .key
            .as_deref()
            .ok_or_else(|| HandlerError::MissingKey(path.clone()))?;
        let doc_err = |source: DocumentError| HandlerError::Document {
            path: path.clone(),
            source,
        };

        let mut doc = YamlDocument::parse(source).map_err(doc_err)?;
        document::set(&mut doc, &parse_path(key), version).map_err(doc_err)?;

        let found = Self::lookup(doc.as_str(), key).map_err(doc_err)?;
        if found.as_deref() != Some(version) {
            return Err(HandlerError::Verify {
                path,
                expected: version.to_string(),
                found,
            });
        }

        write_atomic(&path, doc.as_str())?;
        info!(%key, %version, "updated YAML version");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::TempDir;

    const CHART: &str = "\
apiVersion: v2
name: demo
version: 0.1.0
appVersion: \"1.0.0\"
";

    fn project(name: &str, content: &str) -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(root.join(name), content).unwrap();
        (tmp, root)
    }

    #[test]
    fn needs_extension_and_key() {
        let handler = YamlHandler;
        assert!(handler.can_handle(&VersionFile::new("Chart.yaml").with_key("version")));
        assert!(handler.can_handle(&VersionFile::new("ci/build.YML").with_key("version")));
        assert!(!handler.can_handle(&VersionFile::new("Chart.yaml")));
        assert!(!handler.can_handle(&VersionFile::new("Chart.json").with_key("version")));
    }

    #[test]
    fn reads_string_and_numeric_leaves() {
        let (_tmp, root) = project("Chart.yaml", CHART);
        let read = |key: &str| {
            YamlHandler
                .read(&root, &VersionFile::new("Chart.yaml").with_key(key))
                .unwrap()
        };
        assert_eq!(read("appVersion").as_deref(), Some("1.0.0"));
        assert_eq!(read("version").as_deref(), Some("0.1.0"));
        assert_eq!(read("missing"), None);
        assert_eq!(read("name.first"), None);
    }

    #[test]
    fn read_swallows_bad_yaml_and_missing_files() {
        let (_tmp, root) = project("broken.yaml", "a: [unclosed\n");
        let file = VersionFile::new("broken.yaml").with_key("a");
        assert_eq!(YamlHandler.read(&root, &file).unwrap(), None);

        let file = VersionFile::new("absent.yaml").with_key("a");
        assert_eq!(YamlHandler.read(&root, &file).unwrap(), None);
    }

    #[test]
    fn nested_write_keeps_comment_line() {
        let values = "\
image:
  repository: nginx
  # Docker image tag
  tag: 1.0.0
";
        let (_tmp, root) = project("values.yaml", values);
        let file = VersionFile::new("values.yaml").with_key("image.tag");
        YamlHandler.write(&root, &file, "2.0.0").unwrap();

        let written = fs::read_to_string(root.join("values.yaml")).unwrap();
        assert!(written.contains("  # Docker image tag\n"));
        assert_eq!(written, values.replace("tag: 1.0.0", "tag: 2.0.0"));
        assert_eq!(YamlHandler.read(&root, &file).unwrap().as_deref(), Some("2.0.0"));
    }

    #[test]
    fn flow_map_value_reads_and_writes() {
        let values = "image: {repository: nginx, tag: 1.0.0}\n";
        let (_tmp, root) = project("values.yaml", values);
        let file = VersionFile::new("values.yaml").with_key("image.tag");
        assert_eq!(YamlHandler.read(&root, &file).unwrap().as_deref(), Some("1.0.0"));

        YamlHandler.write(&root, &file, "2.0.0").unwrap();
        let written = fs::read_to_string(root.join("values.yaml")).unwrap();
        assert_eq!(written, "image: {repository: nginx, tag: 2.0.0}\n");
        assert_eq!(YamlHandler.read(&root, &file).unwrap().as_deref(), Some("2.0.0"));
    }

    #[test]
    fn multi_line_flow_map_write_names_the_reason() {
        let values = "image: {\n  repository: nginx,\n  tag: 1.0.0\n}\n";
        let (_tmp, root) = project("values.yaml", values);
        let file = VersionFile::new("values.yaml").with_key("image.tag");
        let err = YamlHandler.write(&root, &file, "2.0.0").unwrap_err();
        assert!(err.to_string().contains("flow collection"), "{err}");
        assert_eq!(fs::read_to_string(root.join("values.yaml")).unwrap(), values);
    }

    #[test]
    fn write_requires_existing_file() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let file = VersionFile::new("Chart.yaml").with_key("version");
        let err = YamlHandler.write(&root, &file, "1.0.0").unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn write_requires_key_path() {
        let (_tmp, root) = project("Chart.yaml", CHART);
        let err = YamlHandler
            .write(&root, &VersionFile::new("Chart.yaml"), "1.0.0")
            .unwrap_err();
        assert!(err.to_string().contains("key path"));
    }

    #[test]
    fn unresolvable_parent_is_reported_and_file_untouched() {
        let (_tmp, root) = project("Chart.yaml", CHART);
        let file = VersionFile::new("Chart.yaml").with_key("dependencies.app.version");
        let err = YamlHandler.write(&root, &file, "1.0.0").unwrap_err();
        assert!(err.to_string().contains("dependencies"));
        assert_eq!(fs::read_to_string(root.join("Chart.yaml")).unwrap(), CHART);
    }
}

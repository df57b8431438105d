//! Manifest export to loose files or a tar.gz archive
//!
//! Layout inside the export root (or the archive):
//! - namespaced kinds: `<kind>/<namespace>/<name>.<ext>`
//! - cluster-scoped kinds: `<kind>/<name>.<ext>`

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::{Builder, Header};

use crate::error::{CoreError, Result};
use crate::hash::sorted;

/// File name of the archive written in archive mode
pub const ARCHIVE_FILE_NAME: &str = "manifests.tar.gz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Yaml => "yaml",
        }
    }
}

/// Destination for manifests fetched during a sync
pub trait ManifestSink: Send {
    /// Write every item of one kind; returns the number written
    fn export_kind(&mut self, kind: &str, items: &[Value], namespaced: bool) -> Result<usize>;

    /// Whether manifests of `kind` were exported by an earlier run
    fn has_existing(&self, kind: &str) -> bool;

    /// Flush and close any open output
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Filesystem exporter
pub struct ManifestExporter {
    base_dir: PathBuf,
    enabled: bool,
    skip_if_exists: bool,
    format: ExportFormat,
    archive_path: Option<PathBuf>,
    archive: Option<Builder<GzEncoder<File>>>,
}

impl ManifestExporter {
    /// Exporter writing loose files under `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            base_dir: base_dir.into(),
            enabled: true,
            skip_if_exists: false,
            format,
            archive_path: None,
            archive: None,
        }
    }

    /// Exporter that does nothing (manifest files disabled)
    pub fn disabled(base_dir: impl Into<PathBuf>) -> Self {
        let mut exporter = Self::new(base_dir, ExportFormat::Json);
        exporter.enabled = false;
        exporter
    }

    /// Write into a tar.gz archive instead of loose files
    pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    /// Leave existing loose files untouched
    pub fn skip_if_exists(mut self, skip: bool) -> Self {
        self.skip_if_exists = skip;
        self
    }

    fn serialize(&self, item: &Value) -> Result<Vec<u8>> {
        let item = sorted(item);
        match self.format {
            ExportFormat::Json => Ok(serde_json::to_vec_pretty(&item)?),
            ExportFormat::Yaml => Ok(serde_yaml::to_string(&item)?.into_bytes()),
        }
    }

    fn archive_builder(&mut self) -> Result<&mut Builder<GzEncoder<File>>> {
        if self.archive.is_none() {
            let path = self.archive_path.as_ref().ok_or_else(|| CoreError::Export {
                message: "no archive path configured".to_string(),
            })?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            self.archive = Some(Builder::new(GzEncoder::new(file, Compression::default())));
        }
        // Set just above
        self.archive.as_mut().ok_or_else(|| CoreError::Export {
            message: "archive not open".to_string(),
        })
    }

    fn write_file(&self, rel_path: &Path, data: &[u8]) -> Result<bool> {
        let full_path = self.base_dir.join(rel_path);
        if self.skip_if_exists && full_path.exists() {
            return Ok(false);
        }
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full_path, data)?;
        Ok(true)
    }
}

impl ManifestSink for ManifestExporter {
    fn export_kind(&mut self, kind: &str, items: &[Value], namespaced: bool) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }

        let ext = self.format.extension();
        let mut count = 0;

        for item in items {
            let metadata = item.get("metadata");
            let Some(name) = metadata
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str)
            else {
                continue;
            };

            let mut rel_path = PathBuf::from(kind);
            if namespaced {
                let ns = metadata
                    .and_then(|m| m.get("namespace"))
                    .and_then(Value::as_str)
                    .unwrap_or("default");
                rel_path.push(ns);
            }
            rel_path.push(format!("{}.{}", name, ext));

            let data = self.serialize(item)?;

            if self.archive_path.is_some() {
                let mut header = Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                self.archive_builder()?
                    .append_data(&mut header, &rel_path, data.as_slice())?;
            } else if !self.write_file(&rel_path, &data)? {
                continue;
            }
            count += 1;
        }

        Ok(count)
    }

    fn has_existing(&self, kind: &str) -> bool {
        std::fs::read_dir(self.base_dir.join(kind))
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(builder) = self.archive.take() {
            let encoder = builder.into_inner()?;
            encoder.finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;
    use tar::Archive;

    fn sample_items() -> Vec<Value> {
        vec![
            json!({"metadata": {"name": "alpha", "namespace": "default"}, "spec": {"x": 1}}),
            json!({"metadata": {"name": "beta", "namespace": "other"}, "spec": {"y": 2}}),
            json!({"metadata": {"namespace": "other"}, "spec": {"nameless": true}}),
        ]
    }

    #[test]
    fn test_export_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = ManifestExporter::new(dir.path(), ExportFormat::Json);

        let written = exporter.export_kind("Deployment", &sample_items(), true).unwrap();
        assert_eq!(written, 2);

        let path = dir.path().join("Deployment/default/alpha.json");
        let data: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(data["spec"]["x"], 1);
        assert!(exporter.has_existing("Deployment"));
        assert!(!exporter.has_existing("StatefulSet"));
    }

    #[test]
    fn test_export_yaml_cluster_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = ManifestExporter::new(dir.path(), ExportFormat::Yaml);

        let nodes = vec![json!({
            "metadata": {"name": "worker-0"},
            "spec": {"podCIDR": "10.0.0.0/24"}
        })];
        exporter.export_kind("Node", &nodes, false).unwrap();

        let text = std::fs::read_to_string(dir.path().join("Node/worker-0.yaml")).unwrap();
        let loaded: Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(loaded["spec"]["podCIDR"], "10.0.0.0/24");
    }

    #[test]
    fn test_skip_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter =
            ManifestExporter::new(dir.path(), ExportFormat::Json).skip_if_exists(true);
        assert_eq!(exporter.export_kind("Deployment", &sample_items(), true).unwrap(), 2);
        assert_eq!(exporter.export_kind("Deployment", &sample_items(), true).unwrap(), 0);
    }

    #[test]
    fn test_export_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("out").join(ARCHIVE_FILE_NAME);
        let mut exporter = ManifestExporter::new(dir.path().join("ignored"), ExportFormat::Json)
            .with_archive(&archive_path);

        exporter.export_kind("Deployment", &sample_items(), true).unwrap();
        exporter.finish().unwrap();

        assert!(!dir.path().join("ignored").exists());
        let mut archive = Archive::new(GzDecoder::new(File::open(&archive_path).unwrap()));
        let mut found = None;
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().to_string();
            if path.ends_with("alpha.json") {
                let mut content = String::new();
                entry.read_to_string(&mut content).unwrap();
                found = Some((path, content));
            }
        }
        let (path, content) = found.expect("alpha.json in archive");
        assert_eq!(path, "Deployment/default/alpha.json");
        let data: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(data["spec"]["x"], 1);
    }

    #[test]
    fn test_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = ManifestExporter::disabled(dir.path().join("m"));
        assert_eq!(exporter.export_kind("Deployment", &sample_items(), true).unwrap(), 0);
        assert!(!dir.path().join("m").exists());
    }
}

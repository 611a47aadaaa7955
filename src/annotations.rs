use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::FileRecord;
use crate::config::Config;

/// Eye centres of one frame, each as `(y, x)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeCenters {
    pub leye: (f64, f64),
    pub reye: (f64, f64),
}

/// Per-frame annotations keyed by frame index.
pub type Annotations = BTreeMap<u32, EyeCenters>;

/// Read-only view of an external annotation directory holding one JSON
/// document per recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationStore {
    dir: Option<PathBuf>,
    extension: String,
}

impl AnnotationStore {
    pub fn new(dir: Option<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir,
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.annotation_dir.clone(), config.annotation_extension.clone())
    }

    /// Annotation file of `file`: the catalog path without its media
    /// extension, under the store directory.
    pub fn path_for(&self, file: &FileRecord) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let stem = Path::new(&file.path).with_extension("");
        Some(dir.join(format!("{}{}", stem.display(), self.extension)))
    }

    /// `Ok(None)` when no directory is configured or the file has no annotations.
    pub fn annotations(&self, file: &FileRecord) -> Result<Option<Annotations>> {
        let Some(path) = self.path_for(file) else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No annotation file");
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read annotations {}", path.display()))?;
        let annotations: Annotations = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse annotations {}", path.display()))?;
        Ok(Some(annotations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::materialize::tests::idiap_voice_catalog;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_unconfigured_store() {
        let catalog = idiap_voice_catalog(1..2);
        let store = AnnotationStore::new(None, ".json");
        assert_eq!(store.annotations(&catalog.files()[0]).unwrap(), None);
    }

    #[test]
    fn test_load_annotations() {
        let dir = tempdir().unwrap();
        let catalog = idiap_voice_catalog(1..2);
        let file = &catalog.files()[0];
        let store = AnnotationStore::new(Some(dir.path().to_path_buf()), ".json");

        // Missing file
        assert_eq!(store.annotations(file).unwrap(), None);

        let path = store.path_for(file).unwrap();
        assert!(path.to_string_lossy().ends_with("_p_2.json"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{"0": {"leye": [410.5, 250.0], "reye": [412.0, 470.25], "topleft": [1, 2]},
                "10": {"leye": [400.0, 251.0], "reye": [401.0, 468.0]}}"#,
        )
        .unwrap();

        let annotations = store.annotations(file).unwrap().unwrap();
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[&0].leye, (410.5, 250.0));
        assert_eq!(annotations[&10].reye, (401.0, 468.0));
        assert_eq!(annotations.keys().copied().collect::<Vec<_>>(), vec![0, 10]);
    }

    #[test]
    fn test_corrupt_annotations_fail() {
        let dir = tempdir().unwrap();
        let catalog = idiap_voice_catalog(1..2);
        let file = &catalog.files()[0];
        let store = AnnotationStore::new(Some(dir.path().to_path_buf()), ".json");
        let path = store.path_for(file).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        assert!(store.annotations(file).is_err());
    }
}

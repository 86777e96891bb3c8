//! Application configuration, read from `<config_dir>/dicom-roi/config.json`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::consts::{
    DEFAULT_MAX_ANNOTATIONS_PER_SLICE, DEFAULT_REFRESH_DEBOUNCE_MS, DEFAULT_WINDOW_LEVEL,
    DEFAULT_WINDOW_WIDTH,
};

pub const APP_DIR: &str = "dicom-roi";
const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DicomConfig {
    pub default_window_width: f64,
    pub default_window_level: f64,
}

impl Default for DicomConfig {
    fn default() -> Self {
        Self {
            default_window_width: DEFAULT_WINDOW_WIDTH,
            default_window_level: DEFAULT_WINDOW_LEVEL,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Persist after every mutation; otherwise only on explicit save.
    pub enable_auto_save: bool,
    pub max_annotations_per_slice: usize,
    pub refresh_debounce_ms: u64,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            enable_auto_save: true,
            max_annotations_per_slice: DEFAULT_MAX_ANNOTATIONS_PER_SLICE,
            refresh_debounce_ms: DEFAULT_REFRESH_DEBOUNCE_MS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dicom: DicomConfig,
    pub annotations: AnnotationConfig,
    pub debug: DebugConfig,
    /// Where annotation and viewport data live; defaults to `<data_dir>/dicom-roi`.
    pub storage_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR)))
    }

    pub fn refresh_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.annotations.refresh_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"annotations":{"max_annotations_per_slice":3},"storage_dir":"/tmp/roi"}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.annotations.max_annotations_per_slice, 3);
        assert!(config.annotations.enable_auto_save);
        assert_eq!(config.annotations.refresh_debounce_ms, 50);
        assert_eq!(config.dicom, DicomConfig::default());
        assert_eq!(config.storage_dir(), Some(PathBuf::from("/tmp/roi")));
    }

    #[test]
    fn broken_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::GroupBands;
use crate::metadata::{Dialect, RecordingKind};
use crate::protocol::ProtocolConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root of the raw corpus (`<root>/<SITE>/session_NN/...`).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding per-file eye-centre annotations.
    #[serde(default)]
    pub annotation_dir: Option<PathBuf>,

    #[serde(default = "default_annotation_extension")]
    pub annotation_extension: String,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub bands: GroupBands,

    #[serde(default)]
    pub pad: PadConfig,

    /// Protocols added on top of the built-in table.
    #[serde(default)]
    pub protocols: Vec<ProtocolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub dialect: Dialect,

    #[serde(default = "default_video_extension")]
    pub video_extension: String,

    #[serde(default = "default_photo_extension")]
    pub photo_extension: String,

    /// Parse and classify files on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_video_extension() -> String {
    "mp4".to_string()
}

fn default_photo_extension() -> String {
    "png".to_string()
}

fn default_parallel() -> bool {
    true
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            video_extension: default_video_extension(),
            photo_extension: default_photo_extension(),
            parallel: default_parallel(),
        }
    }
}

impl ScannerConfig {
    pub fn extensions(&self) -> Vec<String> {
        vec![self.video_extension.clone(), self.photo_extension.clone()]
    }

    pub fn recording_kind(&self, extension: &str) -> Option<RecordingKind> {
        if extension.eq_ignore_ascii_case(&self.video_extension) {
            Some(RecordingKind::Video)
        } else if extension.eq_ignore_ascii_case(&self.photo_extension) {
            Some(RecordingKind::Photo)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadConfig {
    #[serde(default)]
    pub seed: u64,

    /// Independent resampled repetitions per protocol.
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,

    #[serde(default = "default_pad_output_dir")]
    pub output_dir: PathBuf,

    /// Directory under the corpus root holding attack recordings.
    #[serde(default = "default_attack_dir")]
    pub attack_dir: String,
}

fn default_repetitions() -> usize {
    10
}

fn default_pad_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_attack_dir() -> String {
    "pa-database".to_string()
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            repetitions: default_repetitions(),
            output_dir: default_pad_output_dir(),
            attack_dir: default_attack_dir(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("swan-db")
        .join("swan.db")
}

fn default_annotation_extension() -> String {
    ".json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            data_dir: None,
            annotation_dir: None,
            annotation_extension: default_annotation_extension(),
            log_dir: None,
            scanner: ScannerConfig::default(),
            bands: GroupBands::default(),
            pad: PadConfig::default(),
            protocols: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swan-db")
    }

    fn config_path() -> PathBuf {
        match std::env::var_os("SWAN_DB_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => Self::config_dir().join("config.toml"),
        }
    }
}

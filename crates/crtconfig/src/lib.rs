//! CRT post-processing parameters and the TOML preset files they are loaded from.

mod pipeline;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use pipeline::PipelineConfig;

pub const PRESET_FILE_VERSION: u32 = 1;

/// Preset name that always resolves, even when a file does not define it.
pub const NEUTRAL_PRESET: &str = "neutral";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresetFile {
    pub version: u32,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub presets: BTreeMap<String, PipelineConfig>,
}

impl Default for PresetFile {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PresetFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = Self::from_toml_str(&input)?;
        debug!(
            path = %path.display(),
            presets = file.presets.len(),
            "loaded preset file"
        );
        Ok(file)
    }

    /// Presets available without any file on disk.
    pub fn builtin() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert(NEUTRAL_PRESET.to_string(), PipelineConfig::default());
        presets.insert(
            "arcade".to_string(),
            PipelineConfig {
                curve: true,
                rounded_corners: true,
                scanlines: true,
                mask: true,
                phosphor: true,
                black_level: 0.04,
                sharpness: 1.0,
                ..PipelineConfig::default()
            },
        );
        presets.insert(
            "broadcast".to_string(),
            PipelineConfig {
                interference: true,
                noise: true,
                fringing: true,
                ghosting: true,
                phosphor: true,
                phosphor_bloom: 0.6,
                sharpness: 2.0,
                ..PipelineConfig::default()
            },
        );
        Self {
            version: PRESET_FILE_VERSION,
            default: Some("arcade".to_string()),
            presets,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != PRESET_FILE_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported preset file version {}; expected {PRESET_FILE_VERSION}",
                self.version
            )));
        }

        for (name, preset) in &self.presets {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("preset name may not be empty".into()));
            }
            if let Some((field, value, range)) = preset.out_of_range() {
                return Err(ConfigError::Invalid(format!(
                    "preset '{name}' {field} = {value} is outside {}..={}",
                    range.start(),
                    range.end()
                )));
            }
        }

        if let Some(default) = &self.default {
            if !self.presets.contains_key(default) && default != NEUTRAL_PRESET {
                return Err(ConfigError::Invalid(format!(
                    "default references unknown preset '{default}'"
                )));
            }
        }

        Ok(())
    }

    pub fn preset(&self, name: &str) -> Option<&PipelineConfig> {
        self.presets.get(name)
    }

    pub fn default_preset(&self) -> &str {
        self.default.as_deref().unwrap_or(NEUTRAL_PRESET)
    }

    /// Looks up `name`, or the file's default preset when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<PipelineConfig, ConfigError> {
        let name = name.unwrap_or_else(|| self.default_preset());
        match self.presets.get(name) {
            Some(config) => Ok(*config),
            None if name == NEUTRAL_PRESET => Ok(PipelineConfig::default()),
            None => Err(ConfigError::UnknownPreset(name.to_string())),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the build pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub paths: PathConfig,
}

impl BuildConfig {
    /// Reads a JSON config file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Song timing parameters shared by the tick and frame compilers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    pub beats_per_measure: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            beats_per_measure: 4,
        }
    }
}

/// Locations of the inputs that are not part of the build request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Directory holding the base asset template. When unset an empty
    /// template with the required containers is used.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: BuildConfig =
            serde_json::from_str(r#"{ "paths": { "template_dir": "base" } }"#).unwrap();
        assert_eq!(config.timing.beats_per_measure, 4);
        assert_eq!(config.paths.template_dir, Some(PathBuf::from("base")));
    }
}

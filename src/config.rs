use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Run configuration consumed by the pipeline core. Supplied by the config
/// file / CLI layer, not owned by the pipeline itself.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub clean_before_run: bool,
    pub max_files: Option<usize>,
    pub file_pattern: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            batch_size: 100,
            clean_before_run: false,
            max_files: None,
            file_pattern: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EtlConfig {
    pub data_dir: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub clean_before_run: Option<bool>,
    pub max_files: Option<usize>,
    pub file_pattern: Option<String>,
}

impl EtlConfig {
    /// Loads `etl.toml` from the working directory if present. A missing
    /// file is not an error; every field has a default.
    pub fn load() -> Result<Self> {
        let config_path = "etl.toml";
        if !std::path::Path::new(config_path).exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(config_path)?;
        let config: EtlConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Merges file values over the built-in defaults into a `RunConfig`.
    pub fn into_run_config(self) -> RunConfig {
        let defaults = RunConfig::default();
        RunConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            clean_before_run: self.clean_before_run.unwrap_or(defaults.clean_before_run),
            max_files: self.max_files,
            file_pattern: self.file_pattern,
        }
    }
}

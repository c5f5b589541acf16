//! Compiler configuration — loads optional ~/.jackc/config.yaml.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Output settings for a compile run. Every field has a default, so a
/// partial (or absent) config file is fine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Extension of the VM file written next to each source.
    #[serde(default = "default_extension")]
    pub output_extension: String,
    /// Also write an `XxxT.xml` token listing per source.
    #[serde(default)]
    pub emit_tokens: bool,
    /// Also write an `Xxx.xml` parse tree per source.
    #[serde(default)]
    pub emit_tree: bool,
    /// Write outputs here instead of beside the sources.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_extension() -> String {
    "vm".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_extension: default_extension(),
            emit_tokens: false,
            emit_tree: false,
            output_dir: None,
        }
    }
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".jackc").join("config.yaml"))
}

/// Load configuration from a YAML file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, io::Error> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

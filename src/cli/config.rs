use crate::error::{CompilerError, Result};
use crate::CssOutputMode;
use serde::{Deserialize, Serialize};
use std::fs;

/// Project configuration; every field is optional and CLI flags win
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub class_prefix: Option<String>,
    /// browserslist queries
    pub targets: Option<Vec<String>>,
    /// `false` turns vendor prefixing off
    pub vendor_prefixes: Option<bool>,
    pub css_output: Option<CssOutputMode>,
    pub dev_mode: Option<bool>,
    pub minify: Option<bool>,
    pub module_sources: Option<Vec<String>>,
    pub runtime_module: Option<String>,
    pub root: Option<String>,
    pub output_directory: Option<String>,
    pub source_maps: Option<bool>,
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| {
        CompilerError::FileNotFound {
            path: format!("Config file {}: {}", config_path, e),
        }
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?
    } else {
        return Err(CompilerError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        });
    };

    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

//! Config file loading.

use std::path::{Path, PathBuf};

use fw_domain::config::Config;
use fw_domain::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "farewatch.toml";

/// Load the config file, or defaults when no file exists at the default
/// path. An explicitly passed path must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, PathBuf)> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if !path.exists() {
        if explicit.is_some() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok((Config::default(), path));
    }

    let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
    let config: Config =
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    Ok((config, path))
}

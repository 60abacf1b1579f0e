// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawSiteConfig, SiteConfig};
use crate::errors::{Result, SitepipeError};

/// Load a configuration file and return the raw `RawSiteConfig`.
///
/// The format is picked from the extension: `.toml` is parsed as TOML,
/// anything else as YAML. This only performs deserialization; missing
/// required sections already fail here, but semantic checks live in
/// [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSiteConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|err| {
        SitepipeError::ConfigError(format!("cannot read config file {}: {err}", path.display()))
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config: RawSiteConfig = if is_toml {
        toml::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads YAML (or TOML).
/// - Applies defaults (handled by `serde` default functions).
/// - Checks globs, destinations, the server port and watch settings.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SiteConfig> {
    let raw_config = load_from_path(&path)?;
    let config = SiteConfig::try_from(raw_config)?;
    Ok(config)
}

/// Parse and validate YAML configuration text.
pub fn from_yaml_str(contents: &str) -> Result<SiteConfig> {
    let raw: RawSiteConfig = serde_yaml::from_str(contents)?;
    SiteConfig::try_from(raw)
}

// src/config/validate.rs

use std::path::{Component, Path};

use globset::GlobBuilder;

use crate::config::model::{Globs, RawSiteConfig, SiteConfig};
use crate::errors::{Result, SitepipeError};

impl TryFrom<RawSiteConfig> for SiteConfig {
    type Error = SitepipeError;

    fn try_from(raw: RawSiteConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(SiteConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawSiteConfig) -> Result<()> {
    validate_output_root(cfg)?;
    validate_globs(cfg)?;
    validate_destinations(cfg)?;
    validate_server(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

/// `clean_dist` deletes the output root, so it must stay inside the project.
fn validate_output_root(cfg: &RawSiteConfig) -> Result<()> {
    if !is_contained_relative(&cfg.dist) {
        return Err(SitepipeError::ConfigError(format!(
            "dist must be a non-empty relative path inside the project (got {:?})",
            cfg.dist
        )));
    }
    Ok(())
}

fn validate_globs(cfg: &RawSiteConfig) -> Result<()> {
    let sets: [(&str, &Globs); 12] = [
        ("sass.src", &cfg.sass.src),
        ("js.src", &cfg.js.src),
        ("image.src", &cfg.image.src),
        ("image.webp", &cfg.image.webp),
        ("fonts.src", &cfg.fonts.src),
        ("copy.html.src", &cfg.copy.html.src),
        ("copy.vendors.src", &cfg.copy.vendors.src),
        ("watch.scss", &cfg.watch.scss),
        ("watch.js", &cfg.watch.js),
        ("watch.html", &cfg.watch.html),
        ("watch.fonts", &cfg.watch.fonts),
        ("watch.images", &cfg.watch.images),
    ];

    for (key, globs) in sets {
        for pattern in globs.patterns() {
            let pattern = pattern.strip_prefix('!').unwrap_or(pattern);
            if pattern.trim().is_empty() {
                return Err(SitepipeError::ConfigError(format!(
                    "{key} contains an empty glob pattern"
                )));
            }
            GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    SitepipeError::ConfigError(format!(
                        "{key} has an invalid glob pattern '{pattern}': {e}"
                    ))
                })?;
        }
    }

    Ok(())
}

fn validate_destinations(cfg: &RawSiteConfig) -> Result<()> {
    let mut dests: Vec<(&str, &Path)> = vec![
        ("sass.dest", &cfg.sass.dest),
        ("js.dest", &cfg.js.dest),
        ("image.dest", &cfg.image.dest),
        ("fonts.dest", &cfg.fonts.dest),
        ("copy.html.dest", &cfg.copy.html.dest),
        ("copy.vendors.dest", &cfg.copy.vendors.dest),
        ("vendors.dest", &cfg.vendors.dest),
        ("cache.dir", &cfg.cache.dir),
    ];
    if let Some(css) = &cfg.copy.vendors.css {
        dests.push(("copy.vendors.css", css));
    }
    if let Some(js) = &cfg.copy.vendors.js {
        dests.push(("copy.vendors.js", js));
    }

    for (key, dest) in dests {
        if dest.as_os_str().is_empty() {
            return Err(SitepipeError::ConfigError(format!(
                "{key} must not be empty"
            )));
        }
    }

    // The image cache is wiped by `clean_cache`.
    if !is_contained_relative(&cfg.cache.dir) {
        return Err(SitepipeError::ConfigError(format!(
            "cache.dir must be a relative path inside the project (got {:?})",
            cfg.cache.dir
        )));
    }

    Ok(())
}

fn validate_server(cfg: &RawSiteConfig) -> Result<()> {
    if cfg.browsersync.port == 0 {
        return Err(SitepipeError::ConfigError(
            "browsersync.port must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawSiteConfig) -> Result<()> {
    if cfg.watch.queue_length == 0 {
        return Err(SitepipeError::ConfigError(
            "watch.queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.watch.debounce_ms == 0 {
        return Err(SitepipeError::ConfigError(
            "watch.debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn is_contained_relative(path: &Path) -> bool {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return false;
    }
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    has_normal
}

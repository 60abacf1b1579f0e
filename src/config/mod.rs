// src/config/mod.rs

//! Build configuration loading and validation.
//!
//! Responsibilities:
//! - Define the YAML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate globs, destinations and watch settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{from_yaml_str, load_and_validate, load_from_path};
pub use model::{
    CacheSection, CopySection, DeploySection, GhostPreferences, Globs, ImageSection, PathPair,
    RawSiteConfig, ScriptsSection, ServerSection, SiteConfig, VendorCopy, VendorsSection,
    WatchSection,
};

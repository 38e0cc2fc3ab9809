// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** check that edges
/// reference declared nodes or that the graph is acyclic. Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    debug!(
        path = %path.display(),
        nodes = config.node.len(),
        edges = config.edge.len(),
        "loaded raw config"
    );
    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - zero `max_concurrent` / `max_attempts`,
///   - edges referencing unknown nodes, self edges,
///   - ids colliding with the seeded pipeline flow,
///   - cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Default config location: `Storydag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Storydag.toml")
}

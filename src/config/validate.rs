// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::{DependencyGraph, pipeline_node_ids};
use crate::errors::{Result, StorydagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StorydagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let cfg = ConfigFile::new_unchecked(raw.config, raw.node, raw.edge);
        validate_graph(&cfg)?;
        Ok(cfg)
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_node_ids(cfg)?;
    validate_edges(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_concurrent == 0 {
        return Err(StorydagError::ConfigError(
            "[config].max_concurrent must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.max_attempts == 0 {
        return Err(StorydagError::ConfigError(
            "[config].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_node_ids(cfg: &RawConfigFile) -> Result<()> {
    if !cfg.config.seed_pipeline_flow {
        return Ok(());
    }
    let reserved: HashSet<String> = pipeline_node_ids().into_iter().collect();
    for id in cfg.node.keys() {
        if reserved.contains(id) {
            return Err(StorydagError::ConfigError(format!(
                "node '{id}' collides with a pipeline flow node (set seed_pipeline_flow = false to declare it yourself)"
            )));
        }
    }
    Ok(())
}

fn validate_edges(cfg: &RawConfigFile) -> Result<()> {
    let mut known: HashSet<String> = cfg.node.keys().cloned().collect();
    if cfg.config.seed_pipeline_flow {
        known.extend(pipeline_node_ids());
    }

    for edge in cfg.edge.iter() {
        for endpoint in [&edge.source, &edge.target] {
            if !known.contains(endpoint) {
                return Err(StorydagError::ConfigError(format!(
                    "edge '{}' -> '{}' references unknown node '{}'",
                    edge.source, edge.target, endpoint
                )));
            }
        }
        if edge.source == edge.target {
            return Err(StorydagError::ConfigError(format!(
                "node '{}' cannot depend on itself",
                edge.source
            )));
        }
    }
    Ok(())
}

/// Build the graph once to prove the declared edges are acyclic.
fn validate_graph(cfg: &ConfigFile) -> Result<()> {
    DependencyGraph::from_config(cfg).map(|_| ())
}

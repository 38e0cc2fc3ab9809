// src/engine/selection.rs

//! Glob-based node selection for the selective strategy.

use std::collections::HashSet;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{Result, StorydagError};
use crate::types::NodeId;

/// Compiled set of node-id patterns such as `output_*` or `scene_1?`.
#[derive(Debug, Clone)]
pub struct Selection {
    patterns: Vec<String>,
    set: GlobSet,
}

impl Selection {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref()).map_err(|e| {
                StorydagError::ConfigError(format!(
                    "invalid selection pattern '{}': {e}",
                    pattern.as_ref()
                ))
            })?;
            builder.add(glob);
        }

        let set = builder
            .build()
            .map_err(|e| StorydagError::ConfigError(format!("building selection: {e}")))?;

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            set,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, node_id: &str) -> bool {
        self.set.is_match(node_id)
    }

    /// The subset of `candidates` matched by any pattern.
    pub fn select<'a, I>(&self, candidates: I) -> HashSet<NodeId>
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        candidates
            .into_iter()
            .filter(|id| self.matches(id))
            .cloned()
            .collect()
    }
}

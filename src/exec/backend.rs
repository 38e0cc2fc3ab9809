// src/exec/backend.rs

//! Pluggable regenerator abstraction.
//!
//! The queue and the worker pool talk to a `Regenerator` instead of a concrete
//! content generator. Production wires in whatever produces scripts or
//! storyboard prompts; tests provide fakes that record calls and decide the
//! outcome.

use std::future::Future;
use std::pin::Pin;

use crate::types::Metadata;

/// Boxed future returned by [`Regenerator::regenerate`].
pub type RegenerateFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + 'a>>;

/// Re-executes whatever process produces a node's content.
///
/// `Ok(true)` is a success; `Ok(false)` and `Err` are failures and count
/// against the task's attempts.
pub trait Regenerator: Send + Sync {
    fn regenerate<'a>(&'a self, node_id: &'a str, metadata: &'a Metadata) -> RegenerateFuture<'a>;
}

/// Adapter turning a synchronous closure into a [`Regenerator`].
pub struct FnRegenerator<F> {
    f: F,
}

impl<F> FnRegenerator<F>
where
    F: Fn(&str, &Metadata) -> anyhow::Result<bool> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Regenerator for FnRegenerator<F>
where
    F: Fn(&str, &Metadata) -> anyhow::Result<bool> + Send + Sync,
{
    fn regenerate<'a>(&'a self, node_id: &'a str, metadata: &'a Metadata) -> RegenerateFuture<'a> {
        Box::pin(async move { (self.f)(node_id, metadata) })
    }
}

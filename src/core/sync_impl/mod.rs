//! Synchronous execution over registered callables.
//!
//! This module contains everything that runs on the caller's thread:
//! - [`registry`]: the function graph, its nodes and validated edges
//! - [`chain_executor`]: depth-first traversal of the graph, recording every invocation
//! - [`task`]: flat, ordered pipelines of callables and converters
//! - [`NodeValue`] type alias for the JSON values crossing every callable boundary

pub mod chain_executor;
pub mod registry;
pub mod task;

/// The Alias for serde_json::Value since every erased request and response is one
pub type NodeValue = serde_json::Value;

use std::any::Any;

/// A helper trait that just provides the `as_any` method.
/// Needed to recover the concrete callable behind an erased graph node.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! # Funcflow
//!
//! A typed function-composition and orchestration runtime: wrap plain functions in
//! decoration pipelines, wire them into a type-checked graph, and execute chains,
//! pipelines or concurrent fan-outs over them.
//!
//! ## Features
//!
//! - **Decorated Callables**: request, response and exception decorators around a core
//!   function, with optional containment of panics
//! - **Checked Composition**: edges are validated against declared type descriptors
//!   when they are connected, with adapter chains bridging mismatched types
//! - **Traced Execution**: every invocation in a chain is recorded with its flow-trace
//! - **Fan-out**: independent tasks run concurrently on one input and are joined
//!
//! ## Quick Start
//!
//! ```rust
//! use funcflow::prelude::*;
//! use serde_json::json;
//!
//! let mut graph = FunctionGraph::new();
//! graph.register_function("add", callable(|_ctx: &Context, (a, b): (i64, i64)| Ok(a + b)));
//! graph.register_function("square", callable(|_ctx: &Context, n: i64| Ok(n * n)));
//! graph.connect_function_node("add", "square", vec![]).unwrap();
//!
//! let executor = FunctionChainExecutor::new(&graph);
//! let results = executor.execute("add", &Context::new(), json!([10, 20])).unwrap();
//! assert_eq!(results.slice().last().unwrap().response, Some(json!(900)));
//! ```
//!
//! ## Module Organization
//!
//! - [`sync_prelude`]: graph, chain executor and sequential tasks
//! - [`async_prelude`]: the concurrent fan-out stage
//! - [`prelude`]: everything (import with `use funcflow::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Contract and descriptors
pub use crate::core::callable::{callable, dynamic, AnyCallable, Callable, FnCallable};
pub use crate::core::context::Context;
pub use crate::core::descriptor::{compatible, Indirection, Signature, TypeDescriptor};
pub use crate::core::error::{BoxError, ChainError, Error, ExecutionError, GraphError};

// Decoration
pub use crate::core::builder::DecoratedCallableBuilder;
pub use crate::core::decorated::{DecoratedCallable, Decorator, ExceptionDecorator};

// Synchronous execution
pub use crate::core::sync_impl::chain_executor::{
    ExecutionRecord, ExecutionResults, FunctionChainExecutor, RecordKind,
};
pub use crate::core::sync_impl::registry::{Edge, FunctionGraph, FunctionNode, FunctionRegistry};
pub use crate::core::sync_impl::task::{
    CompositeTask, Task, TaskBuilder, TaskConverterBuilder, TaskType,
};
pub use crate::core::sync_impl::{AsAny, NodeValue};

// Asynchronous execution
pub use crate::core::async_impl::stage::{ConcurrentStage, Stage};

// Telemetry
pub use crate::core::telemetry::{MemoryTelemetry, Telemetry};

// ============================================================================
// Prelude Modules - Convenient Bulk Imports
// ============================================================================

/// The main prelude: imports everything you need to build and run callables.
///
/// # Example
/// ```rust
/// use funcflow::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        callable, compatible, dynamic, AnyCallable, Callable, ChainError, CompositeTask,
        ConcurrentStage, Context, DecoratedCallable, DecoratedCallableBuilder, Decorator, Error,
        ExceptionDecorator, ExecutionError, ExecutionRecord, ExecutionResults, FnCallable,
        FunctionChainExecutor, FunctionGraph, FunctionNode, FunctionRegistry, GraphError,
        MemoryTelemetry, NodeValue, RecordKind, Signature, Stage, Task, TaskBuilder, TaskType,
        Telemetry, TypeDescriptor,
    };
}

/// Prelude for synchronous-only use.
///
/// # Example
/// ```rust
/// use funcflow::sync_prelude::*;
/// ```
pub mod sync_prelude {
    pub use super::{
        callable, dynamic, AnyCallable, Callable, Context, DecoratedCallableBuilder, Decorator,
        Error, ExceptionDecorator, ExecutionError, FunctionChainExecutor, FunctionGraph,
        FunctionRegistry, NodeValue, Task, TaskBuilder, TaskType, TypeDescriptor,
    };
}

/// Prelude for the concurrent fan-out stage.
///
/// # Example
/// ```rust
/// use funcflow::async_prelude::*;
/// ```
pub mod async_prelude {
    pub use super::{ConcurrentStage, Context, ExecutionError, NodeValue, Stage, Task};
}

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");

use crate::core::descriptor::TypeDescriptor;
use crate::core::sync_impl::chain_executor::ExecutionResults;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by user code that does not speak [`ExecutionError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while composing callables: building, registering and connecting.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("type mismatch: position {from_index} ({from}) is not assignable to position {to_index} ({to})")]
    TypeMismatch {
        from_index: usize,
        from: TypeDescriptor,
        to_index: usize,
        to: TypeDescriptor,
    },

    #[error("type mismatch: {list}[{index}] is declared for {found}, expected {expected}")]
    DecoratorTypeMismatch {
        list: &'static str,
        index: usize,
        expected: TypeDescriptor,
        found: TypeDescriptor,
    },

    #[error("response type {from} is not assignable to request type {to} and no adapters were given")]
    TypeMismatchNoAdapter {
        from: TypeDescriptor,
        to: TypeDescriptor,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Structural violations detected when connecting two nodes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("function node '{0}' does not exist")]
    NodeNotFound(String),

    #[error("cannot connect function node '{0}' to itself")]
    SelfConnection(String),

    #[error("connection '{from}' -> '{to}' is already defined")]
    DuplicateConnection { from: String, to: String },

    #[error("connection '{from}' -> '{to}' would close a cycle: '{to}' already points to '{from}'")]
    ReverseCycle { from: String, to: String },
}

/// Errors raised while calling a callable.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Source(#[from] BoxError),

    /// A panic caught at a fault boundary. Displays as the panic message alone.
    #[error("{0}")]
    ContainedFault(String),

    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<ExecutionError>,
    },

    #[error("{}", join_messages(.0))]
    Joined(Vec<ExecutionError>),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("function node not found: {0}")]
    NodeNotFound(String),

    #[error("traversal exceeded the maximum depth of {0}")]
    DepthExceeded(usize),

    #[error("task {index} panicked: {message}")]
    TaskPanicked { index: usize, message: String },
}

fn join_messages(errors: &[ExecutionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl ExecutionError {
    /// A plain failure carrying `message`.
    pub fn msg(message: impl Into<String>) -> Self {
        ExecutionError::Failed(message.into())
    }

    /// Wraps this error with a leading context message.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        ExecutionError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Joins this error with `other`, flattening nested joins.
    pub fn join(self, other: ExecutionError) -> Self {
        let mut errors = match self {
            ExecutionError::Joined(errors) => errors,
            err => vec![err],
        };
        match other {
            ExecutionError::Joined(more) => errors.extend(more),
            err => errors.push(err),
        }
        ExecutionError::Joined(errors)
    }

    pub fn is_contained_fault(&self) -> bool {
        matches!(self, ExecutionError::ContainedFault(_))
    }
}

/// The error returned by a chain execution, carrying the records appended before it stopped.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ChainError {
    pub results: Arc<ExecutionResults>,
    #[source]
    pub source: ExecutionError,
}

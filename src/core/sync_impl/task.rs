use crate::core::callable::AnyCallable;
use crate::core::context::Context;
use crate::core::descriptor::compatible;
use crate::core::error::ExecutionError;
use crate::core::sync_impl::NodeValue;
use std::sync::Arc;

/// A unit of work taking one input and producing one output.
pub trait Task: Send + Sync {
    fn execute(&self, ctx: &Context, input: NodeValue) -> Result<NodeValue, ExecutionError>;
}

/// The kinds of task a [`TaskBuilder`] can assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskType {
    #[default]
    Composite,
}

/// Runs its callables strictly in order on one carried value.
#[derive(Clone, Default)]
pub struct CompositeTask {
    functions: Vec<AnyCallable>,
}

impl CompositeTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: AnyCallable) {
        self.functions.push(function);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Task for CompositeTask {
    fn execute(&self, ctx: &Context, input: NodeValue) -> Result<NodeValue, ExecutionError> {
        self.functions
            .iter()
            .enumerate()
            .try_fold(input, |current, (step, function)| {
                function.call(ctx, current).inspect_err(|err| {
                    log::debug!("Composite task stopped at step {}: {}", step, err);
                })
            })
    }
}

/// Assembles a task from primary functions, each followed by a converter that
/// reshapes its output for the next one.
///
/// ```text
/// TaskBuilder::new(TaskType::Composite)
///     .add_function(add)          // -> TaskConverterBuilder
///     .attach_converter(convert)  // -> TaskBuilder
///     .add_last_function(multiply)
///     .build()
/// ```
pub struct TaskBuilder {
    task_type: TaskType,
    steps: Vec<AnyCallable>,
}

/// A [`TaskBuilder`] waiting for the converter of the function just added.
pub struct TaskConverterBuilder {
    builder: TaskBuilder,
}

impl TaskBuilder {
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            steps: Vec::new(),
        }
    }

    pub fn add_function(mut self, function: AnyCallable) -> TaskConverterBuilder {
        self.steps.push(function);
        TaskConverterBuilder { builder: self }
    }

    pub fn add_last_function(mut self, function: AnyCallable) -> TaskBuilder {
        self.steps.push(function);
        self
    }

    pub fn build(self) -> Arc<dyn Task> {
        for (step, pair) in self.steps.windows(2).enumerate() {
            let (produced, expected) = (pair[0].response_type(), pair[1].request_type());
            if !compatible(&produced, &expected) {
                log::warn!(
                    "Task step {} produces {} but step {} expects {}",
                    step,
                    produced,
                    step + 1,
                    expected
                );
            }
        }

        match self.task_type {
            TaskType::Composite => {
                let mut task = CompositeTask::new();
                for function in self.steps {
                    task.add_function(function);
                }
                Arc::new(task)
            }
        }
    }
}

impl TaskConverterBuilder {
    pub fn attach_converter(mut self, converter: AnyCallable) -> TaskBuilder {
        self.builder.steps.push(converter);
        self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::callable::{callable, dynamic};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_composite_runs_in_order() {
        let task = TaskBuilder::new(TaskType::Composite)
            .add_function(callable(|_ctx: &Context, n: i64| Ok(n + 1)))
            .attach_converter(callable(|_ctx: &Context, n: i64| Ok(n.to_string())))
            .add_last_function(callable(|_ctx: &Context, s: String| Ok(format!("<{s}>"))))
            .build();

        assert_eq!(task.execute(&Context::new(), json!(41)).unwrap(), json!("<42>"));
    }

    #[test]
    fn test_composite_short_circuits_on_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let task = TaskBuilder::new(TaskType::Composite)
            .add_function(dynamic(|_ctx, _v| Err(ExecutionError::msg("first step failed"))))
            .attach_converter(dynamic(move |_ctx, v| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            }))
            .build();

        let err = task.execute(&Context::new(), json!(null)).unwrap_err();
        assert_eq!(err.to_string(), "first step failed");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_task_is_identity() {
        let task = TaskBuilder::new(TaskType::default()).build();
        assert_eq!(task.execute(&Context::new(), json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_composite_task_direct_use() {
        let mut task = CompositeTask::new();
        assert!(task.is_empty());
        task.add_function(callable(|_ctx: &Context, n: i64| Ok(n * 3)));
        task.add_function(callable(|_ctx: &Context, n: i64| Ok(n - 1)));
        assert_eq!(task.len(), 2);
        assert_eq!(task.execute(&Context::new(), json!(5)).unwrap(), json!(14));
    }
}

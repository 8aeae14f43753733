use crate::core::context::Context;
use crate::core::decorated::fault_message;
use crate::core::error::ExecutionError;
use crate::core::sync_impl::task::Task;
use crate::core::sync_impl::NodeValue;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::task::JoinError;

const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// A step that turns one input into several outputs.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, ctx: &Context, input: NodeValue) -> Result<Vec<NodeValue>, ExecutionError>;
}

/// Fan-out: every task receives the same input and runs on its own blocking worker.
///
/// All tasks run to completion, even after one has failed. Results are then scanned
/// in task order: the first error wins and every result is discarded, otherwise the
/// outputs are returned in task order.
#[derive(Clone)]
pub struct ConcurrentStage {
    tasks: Vec<Arc<dyn Task>>,
    max_concurrency: usize,
}

impl ConcurrentStage {
    pub fn new(tasks: Vec<Arc<dyn Task>>) -> Self {
        ConcurrentStage {
            tasks,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_concurrency(self, max_concurrency: usize) -> Self {
        assert!(
            max_concurrency > 0,
            "Max concurrency must be greater than 0"
        );
        ConcurrentStage {
            tasks: self.tasks,
            max_concurrency,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl Stage for ConcurrentStage {
    async fn run(&self, ctx: &Context, input: NodeValue) -> Result<Vec<NodeValue>, ExecutionError> {
        let ctx = ctx.clone();
        let outcomes: Vec<Result<Result<NodeValue, ExecutionError>, JoinError>> =
            stream::iter(0..self.tasks.len())
                .map({
                    let tasks = self.tasks.clone();
                    move |index: usize| {
                        let task = Arc::clone(&tasks[index]);
                        let ctx = ctx.clone();
                        let input = input.clone();
                        tokio::task::spawn_blocking(move || task.execute(&ctx, input))
                    }
                })
                .buffered(self.max_concurrency)
                .collect()
                .await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let outcome = outcome.map_err(|join_error| ExecutionError::TaskPanicked {
                index,
                message: join_message(join_error),
            });
            match outcome.and_then(|result| result) {
                Ok(value) => results.push(value),
                Err(err) => {
                    log::error!("Stage task {} failed: {}", index, err);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

fn join_message(join_error: JoinError) -> String {
    match join_error.try_into_panic() {
        Ok(payload) => fault_message(payload.as_ref()),
        Err(join_error) => join_error.to_string(),
    }
}

use crate::core::callable::AnyCallable;
use crate::core::context::Context;
use crate::core::error::{ChainError, ExecutionError};
use crate::core::sync_impl::registry::{FunctionGraph, FunctionRegistry};
use crate::core::sync_impl::NodeValue;
use crate::core::telemetry::Telemetry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// What produced an [`ExecutionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordKind {
    /// The adapters of the incoming edge, applied before the node ran.
    Adapter,
    /// The node's own callable.
    Function,
}

/// One invocation observed during a chain execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub sequence: u64,
    pub kind: RecordKind,
    /// Flow-trace of the context the invocation ran with.
    pub node_flow: String,
    pub node_id: String,
    pub request: NodeValue,
    pub response: Option<NodeValue>,
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Records of every invocation, keyed by a monotonically increasing sequence number.
///
/// Each insert is atomic on its own; a chain as a whole is not. Records of
/// concurrent executions interleave and are told apart by `execution_id`.
#[derive(Debug, Default)]
pub struct ExecutionResults {
    sequence: AtomicU64,
    records: Mutex<BTreeMap<u64, ExecutionRecord>>,
}

impl ExecutionResults {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_result(&self, mut record: ExecutionRecord) -> ExecutionRecord {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        record.sequence = sequence;
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sequence, record.clone());
        record
    }

    /// A snapshot of every record, ordered by sequence number.
    pub fn slice(&self) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Records produced by one `execute` call.
    pub fn for_execution(&self, execution_id: Uuid) -> Vec<ExecutionRecord> {
        self.slice()
            .into_iter()
            .filter(|record| record.execution_id == execution_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs a node and, depth-first, every node reachable from it.
///
/// The executor borrows the registry, so the graph cannot be mutated while an
/// executor over it is alive. The results collection is shared by every `execute`
/// call on the same executor.
pub struct FunctionChainExecutor<'a, R: FunctionRegistry + ?Sized = FunctionGraph> {
    registry: &'a R,
    results: Arc<ExecutionResults>,
    telemetry: Option<Arc<dyn Telemetry>>,
    max_depth: Option<usize>,
}

impl<'a, R: FunctionRegistry + ?Sized> FunctionChainExecutor<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            results: Arc::new(ExecutionResults::new()),
            telemetry: None,
            max_depth: None,
        }
    }

    /// Stops traversal with [`ExecutionError::DepthExceeded`] past `max_depth` edges.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Forwards every record to `telemetry` as it is appended.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn results(&self) -> Arc<ExecutionResults> {
        Arc::clone(&self.results)
    }

    /// Executes `start_id` with `req`, then every successor with the response it produced.
    ///
    /// The first error stops the whole traversal; the records appended so far travel
    /// with it in the returned [`ChainError`].
    pub fn execute(
        &self,
        start_id: &str,
        ctx: &Context,
        req: NodeValue,
    ) -> Result<Arc<ExecutionResults>, ChainError> {
        let execution_id = Uuid::new_v4();
        log::debug!("Starting execution {} at '{}'", execution_id, start_id);

        let outcome = self.visit(execution_id, start_id, ctx, req, &[], 0);
        if let Some(telemetry) = &self.telemetry {
            telemetry.flush();
        }

        match outcome {
            Ok(()) => Ok(self.results()),
            Err(source) => {
                log::debug!("Execution {} stopped: {}", execution_id, source);
                Err(ChainError {
                    results: self.results(),
                    source,
                })
            }
        }
    }

    fn visit(
        &self,
        execution_id: Uuid,
        node_id: &str,
        ctx: &Context,
        req: NodeValue,
        adapters: &[AnyCallable],
        depth: usize,
    ) -> Result<(), ExecutionError> {
        if let Some(max_depth) = self.max_depth {
            if depth > max_depth {
                return Err(ExecutionError::DepthExceeded(max_depth));
            }
        }

        let node = self.registry.get_function_node(node_id).ok_or_else(|| {
            log::warn!("Function node '{}' not found, the edge to it is dangling.", node_id);
            ExecutionError::NodeNotFound(node_id.to_string())
        })?;

        let req = if adapters.is_empty() {
            req
        } else {
            let adapted = adapt(ctx, adapters, req.clone());
            self.record(execution_id, RecordKind::Adapter, ctx, node_id, req, &adapted);
            adapted?
        };

        let result = node.callable().call(ctx, req.clone());
        self.record(execution_id, RecordKind::Function, ctx, node_id, req, &result);
        let res = result?;

        for edge in node.successors() {
            let next_ctx = ctx.with_flow(node_id);
            self.visit(
                execution_id,
                edge.to(),
                &next_ctx,
                res.clone(),
                edge.adapters(),
                depth + 1,
            )?;
        }
        Ok(())
    }

    fn record(
        &self,
        execution_id: Uuid,
        kind: RecordKind,
        ctx: &Context,
        node_id: &str,
        request: NodeValue,
        result: &Result<NodeValue, ExecutionError>,
    ) {
        let (response, error) = match result {
            Ok(res) => (Some(res.clone()), None),
            Err(err) => (None, Some(err.to_string())),
        };
        let record = self.results.add_result(ExecutionRecord {
            execution_id,
            sequence: 0,
            kind,
            node_flow: ctx.flow().to_string(),
            node_id: node_id.to_string(),
            request,
            response,
            error,
        });
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(record);
        }
    }
}

fn adapt(
    ctx: &Context,
    adapters: &[AnyCallable],
    value: NodeValue,
) -> Result<NodeValue, ExecutionError> {
    adapters
        .iter()
        .try_fold(value, |value, adapter| adapter.call(ctx, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::callable::callable;
    use crate::core::telemetry::MemoryTelemetry;
    use serde_json::json;

    fn square() -> AnyCallable {
        callable(|_ctx: &Context, n: i64| Ok(n * n))
    }

    fn add() -> AnyCallable {
        callable(|_ctx: &Context, (a, b): (i64, i64)| Ok(a + b))
    }

    #[test]
    fn test_execute_linear_chain() {
        let mut graph = FunctionGraph::new();
        graph.register_function("add", add());
        graph.register_function("square", square());
        graph.connect_function_node("add", "square", vec![]).unwrap();

        let executor = FunctionChainExecutor::new(&graph);
        let results = executor
            .execute("add", &Context::new(), json!([10, 20]))
            .unwrap();

        let records = results.slice();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].node_id, "add");
        assert_eq!(records[0].node_flow, "");
        assert_eq!(records[0].response, Some(json!(30)));
        assert_eq!(records[1].node_id, "square");
        assert_eq!(records[1].node_flow, "add");
        assert_eq!(records[1].request, json!(30));
        assert_eq!(records[1].response, Some(json!(900)));
        assert!(records.iter().all(|r| r.kind == RecordKind::Function));
    }

    #[test]
    fn test_unknown_start_node() {
        let graph = FunctionGraph::new();
        let executor = FunctionChainExecutor::new(&graph);
        let err = executor
            .execute("missing", &Context::new(), json!(1))
            .unwrap_err();

        assert!(matches!(err.source, ExecutionError::NodeNotFound(ref id) if id == "missing"));
        assert!(err.results.is_empty());
    }

    #[test]
    fn test_error_stops_traversal_and_is_recorded() {
        let mut graph = FunctionGraph::new();
        graph.register_function(
            "fail",
            callable(|_ctx: &Context, _n: i64| -> Result<i64, ExecutionError> {
                Err(ExecutionError::msg("nope"))
            }),
        );
        graph.register_function("square", square());
        graph.connect_function_node("fail", "square", vec![]).unwrap();

        let executor = FunctionChainExecutor::new(&graph);
        let err = executor.execute("fail", &Context::new(), json!(3)).unwrap_err();

        assert_eq!(err.to_string(), "nope");
        let records = err.results.slice();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error.as_deref(), Some("nope"));
        assert!(records[0].response.is_none());
    }

    #[test]
    fn test_flow_trace_extends_per_level() {
        let mut graph = FunctionGraph::new();
        for id in ["a", "b", "c", "d"] {
            graph.register_function(id, square());
        }
        graph.connect_function_node("a", "b", vec![]).unwrap();
        graph.connect_function_node("b", "c", vec![]).unwrap();
        graph.connect_function_node("a", "d", vec![]).unwrap();

        let executor = FunctionChainExecutor::new(&graph);
        let records = executor
            .execute("a", &Context::new(), json!(2))
            .unwrap()
            .slice();

        let visited: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.node_id.as_str(), r.node_flow.as_str()))
            .collect();
        assert_eq!(
            visited,
            vec![("a", ""), ("b", "a"), ("c", "a/b"), ("d", "a")]
        );
        assert_eq!(records[2].response, Some(json!(256)));
    }

    #[test]
    fn test_edge_adapters_are_applied_and_recorded() {
        let mut graph = FunctionGraph::new();
        graph.register_function("intToStr", callable(|_ctx: &Context, n: i64| Ok(n.to_string())));
        graph.register_function("square", square());
        let str_to_int = callable(|_ctx: &Context, s: String| {
            s.parse::<i64>().map_err(|e| ExecutionError::Source(Box::new(e)))
        });
        graph
            .connect_function_node("intToStr", "square", vec![str_to_int])
            .unwrap();

        let executor = FunctionChainExecutor::new(&graph);
        let records = executor
            .execute("intToStr", &Context::new(), json!(7))
            .unwrap()
            .slice();

        assert_eq!(records.len(), 3);
        assert_eq!(records[1].kind, RecordKind::Adapter);
        assert_eq!(records[1].request, json!("7"));
        assert_eq!(records[1].response, Some(json!(7)));
        assert_eq!(records[2].response, Some(json!(49)));
    }

    #[test]
    fn test_dangling_edge_is_not_found() {
        let mut graph = FunctionGraph::new();
        graph.register_function("a", square());
        graph.register_function("b", square());
        graph.connect_function_node("a", "b", vec![]).unwrap();
        graph.deregister_function("b");

        let executor = FunctionChainExecutor::new(&graph);
        let err = executor.execute("a", &Context::new(), json!(2)).unwrap_err();
        assert!(matches!(err.source, ExecutionError::NodeNotFound(ref id) if id == "b"));
        assert_eq!(err.results.len(), 1);
    }

    #[test]
    fn test_max_depth_bounds_cycles() {
        let mut graph = FunctionGraph::new();
        for id in ["a", "b", "c"] {
            graph.register_function(id, callable(|_ctx: &Context, n: i64| Ok(n + 1)));
        }
        graph.connect_function_node("a", "b", vec![]).unwrap();
        graph.connect_function_node("b", "c", vec![]).unwrap();
        graph.connect_function_node("c", "a", vec![]).unwrap();

        let executor = FunctionChainExecutor::new(&graph).with_max_depth(4);
        let err = executor.execute("a", &Context::new(), json!(0)).unwrap_err();

        assert!(matches!(err.source, ExecutionError::DepthExceeded(4)));
        assert_eq!(err.results.len(), 5);
    }

    #[test]
    fn test_results_accumulate_across_calls_with_distinct_ids() {
        let mut graph = FunctionGraph::new();
        graph.register_function("square", square());

        let telemetry = Arc::new(MemoryTelemetry::new());
        let executor = FunctionChainExecutor::new(&graph).with_telemetry(telemetry.clone());
        executor.execute("square", &Context::new(), json!(2)).unwrap();
        let results = executor.execute("square", &Context::new(), json!(3)).unwrap();

        let records = results.slice();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[1].sequence, 2);
        assert_ne!(records[0].execution_id, records[1].execution_id);
        assert_eq!(results.for_execution(records[1].execution_id).len(), 1);
        assert_eq!(telemetry.get_records().len(), 2);
    }

    #[test]
    fn test_concurrent_executions_share_results() {
        let mut graph = FunctionGraph::new();
        graph.register_function("square", square());
        let executor = FunctionChainExecutor::new(&graph);

        std::thread::scope(|scope| {
            for n in 0..8 {
                let executor = &executor;
                scope.spawn(move || {
                    executor
                        .execute("square", &Context::new(), json!(n))
                        .unwrap();
                });
            }
        });

        let records = executor.results().slice();
        assert_eq!(records.len(), 8);
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, (1..=8).collect::<Vec<u64>>());
    }
}

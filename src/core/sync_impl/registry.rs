use crate::core::callable::AnyCallable;
use crate::core::descriptor::{compatible, TypeDescriptor};
use crate::core::error::{Error, GraphError};
use std::collections::{HashMap, HashSet};

/// A directed connection to another node, optionally bridged by adapters.
#[derive(Clone)]
pub struct Edge {
    to: String,
    adapters: Vec<AnyCallable>,
}

impl Edge {
    pub fn to(&self) -> &str {
        &self.to
    }

    /// Adapters applied, in order, to the source's response before the destination runs.
    pub fn adapters(&self) -> &[AnyCallable] {
        &self.adapters
    }
}

/// Outgoing edges in insertion order, with a membership index.
#[derive(Clone, Default)]
struct Successors {
    edges: Vec<Edge>,
    index: HashSet<String>,
}

impl Successors {
    fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    fn push(&mut self, edge: Edge) {
        self.index.insert(edge.to.clone());
        self.edges.push(edge);
    }
}

/// A registered callable and its outgoing edges.
#[derive(Clone)]
pub struct FunctionNode {
    id: String,
    callable: AnyCallable,
    next: Successors,
}

impl FunctionNode {
    pub fn new(id: impl Into<String>, callable: AnyCallable) -> Self {
        Self {
            id: id.into(),
            callable,
            next: Successors::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn callable(&self) -> &AnyCallable {
        &self.callable
    }

    pub fn request_type(&self) -> TypeDescriptor {
        self.callable.request_type()
    }

    pub fn response_type(&self) -> TypeDescriptor {
        self.callable.response_type()
    }

    /// Outgoing edges, in the order they were connected.
    pub fn successors(&self) -> &[Edge] {
        &self.next.edges
    }

    pub fn is_connected_to(&self, id: &str) -> bool {
        self.next.contains(id)
    }

    /// Recovers the concrete callable type behind this node.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.callable.as_ref().as_any().downcast_ref::<T>()
    }
}

/// Stores callables as nodes and validates the edges between them.
pub trait FunctionRegistry: Send + Sync {
    /// Inserts a node under `id`, replacing any node (and its edges) already there.
    fn register_function(&mut self, id: &str, callable: AnyCallable);

    fn get_function_node(&self, id: &str) -> Option<&FunctionNode>;

    /// Removes the node. Edges pointing at it are left dangling.
    fn deregister_function(&mut self, id: &str);

    fn connect_function_node(
        &mut self,
        from_id: &str,
        to_id: &str,
        adapters: Vec<AnyCallable>,
    ) -> Result<(), Error>;
}

/// The default in-memory [`FunctionRegistry`].
///
/// The node table has no internal lock: mutation takes `&mut self`, so it cannot
/// overlap with a traversal borrowing the graph.
#[derive(Clone, Default)]
pub struct FunctionGraph {
    nodes: HashMap<String, FunctionNode>,
}

impl FunctionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }
}

impl FunctionRegistry for FunctionGraph {
    fn register_function(&mut self, id: &str, callable: AnyCallable) {
        log::debug!(
            "Registering function node '{}' ({} -> {})",
            id,
            callable.request_type(),
            callable.response_type()
        );
        if self
            .nodes
            .insert(id.to_string(), FunctionNode::new(id, callable))
            .is_some()
        {
            log::warn!(
                "Function node '{}' was already registered, overwriting it and its connections.",
                id
            );
        }
    }

    fn get_function_node(&self, id: &str) -> Option<&FunctionNode> {
        self.nodes.get(id)
    }

    fn deregister_function(&mut self, id: &str) {
        if self.nodes.remove(id).is_some() {
            log::debug!("Deregistered function node '{}'", id);
        }
    }

    fn connect_function_node(
        &mut self,
        from_id: &str,
        to_id: &str,
        adapters: Vec<AnyCallable>,
    ) -> Result<(), Error> {
        let from = self
            .nodes
            .get(from_id)
            .ok_or_else(|| GraphError::NodeNotFound(from_id.to_string()))?;
        let to = self
            .nodes
            .get(to_id)
            .ok_or_else(|| GraphError::NodeNotFound(to_id.to_string()))?;

        let adapters = validate_connection(from, to, adapters)?;

        log::debug!(
            "Connected '{}' -> '{}' with {} adapter(s)",
            from_id,
            to_id,
            adapters.len()
        );
        if let Some(from) = self.nodes.get_mut(from_id) {
            from.next.push(Edge {
                to: to_id.to_string(),
                adapters,
            });
        }
        Ok(())
    }
}

/// Checks the structural rules and the type chain of a prospective edge, returning
/// the adapters the edge has to carry.
///
/// Only direct two-node cycles are rejected; longer cycles are not detected.
fn validate_connection(
    from: &FunctionNode,
    to: &FunctionNode,
    adapters: Vec<AnyCallable>,
) -> Result<Vec<AnyCallable>, Error> {
    if from.id == to.id {
        return Err(GraphError::SelfConnection(from.id.clone()).into());
    }
    if from.is_connected_to(&to.id) {
        return Err(GraphError::DuplicateConnection {
            from: from.id.clone(),
            to: to.id.clone(),
        }
        .into());
    }
    if to.is_connected_to(&from.id) {
        return Err(GraphError::ReverseCycle {
            from: from.id.clone(),
            to: to.id.clone(),
        }
        .into());
    }

    if compatible(&from.response_type(), &to.request_type()) {
        if !adapters.is_empty() {
            log::debug!(
                "'{}' -> '{}' is directly compatible, ignoring {} adapter(s)",
                from.id,
                to.id,
                adapters.len()
            );
        }
        return Ok(Vec::new());
    }

    if adapters.is_empty() {
        return Err(Error::TypeMismatchNoAdapter {
            from: from.response_type(),
            to: to.request_type(),
        });
    }

    let mut check_list = Vec::with_capacity(adapters.len() * 2 + 2);
    check_list.push(from.response_type());
    for adapter in &adapters {
        check_list.push(adapter.request_type());
        check_list.push(adapter.response_type());
    }
    check_list.push(to.request_type());

    for (pair, types) in check_list.chunks_exact(2).enumerate() {
        if !compatible(&types[0], &types[1]) {
            return Err(Error::TypeMismatch {
                from_index: pair * 2,
                from: types[0],
                to_index: pair * 2 + 1,
                to: types[1],
            });
        }
    }
    Ok(adapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::callable::{callable, Callable};
    use crate::core::context::Context;
    use crate::core::error::ExecutionError;
    use crate::core::sync_impl::NodeValue;
    use std::sync::Arc;

    fn int_to_str() -> AnyCallable {
        callable(|_ctx: &Context, n: i64| Ok(n.to_string()))
    }

    fn str_to_int() -> AnyCallable {
        callable(|_ctx: &Context, s: String| {
            s.parse::<i64>()
                .map_err(|e| ExecutionError::Source(Box::new(e)))
        })
    }

    fn int_to_int() -> AnyCallable {
        callable(|_ctx: &Context, n: i64| Ok(n))
    }

    fn graph() -> FunctionGraph {
        let mut graph = FunctionGraph::new();
        graph.register_function("func1", int_to_str());
        graph.register_function("func2", str_to_int());
        graph.register_function("func3", int_to_int());
        graph
    }

    #[test]
    fn test_register_get_deregister() {
        let mut graph = graph();
        assert_eq!(graph.len(), 3);

        let node = graph.get_function_node("func1").unwrap();
        assert_eq!(node.id(), "func1");
        assert_eq!(node.request_type(), TypeDescriptor::of::<i64>());
        assert_eq!(node.response_type(), TypeDescriptor::of::<String>());

        graph.deregister_function("func1");
        assert!(graph.get_function_node("func1").is_none());
        graph.deregister_function("func1");
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_register_overwrites_node_and_edges() {
        let mut graph = graph();
        graph.connect_function_node("func1", "func2", vec![]).unwrap();

        graph.register_function("func1", int_to_str());
        assert!(graph.get_function_node("func1").unwrap().successors().is_empty());
    }

    #[test]
    fn test_connect_compatible_nodes() {
        let mut graph = graph();
        graph.connect_function_node("func1", "func2", vec![]).unwrap();

        let node = graph.get_function_node("func1").unwrap();
        assert_eq!(node.successors().len(), 1);
        assert_eq!(node.successors()[0].to(), "func2");
        assert!(node.successors()[0].adapters().is_empty());
    }

    #[test]
    fn test_connect_missing_node() {
        let mut graph = graph();
        let err = graph.connect_function_node("func1", "func4", vec![]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::NodeNotFound(id)) if id == "func4"));

        let err = graph.connect_function_node("func0", "func1", vec![]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::NodeNotFound(id)) if id == "func0"));
    }

    #[test]
    fn test_connect_self_is_rejected() {
        let mut graph = graph();
        for id in ["func1", "func2", "func3"] {
            let err = graph.connect_function_node(id, id, vec![]).unwrap_err();
            assert!(matches!(err, Error::Graph(GraphError::SelfConnection(_))));
        }
    }

    #[test]
    fn test_connect_duplicate_is_rejected() {
        let mut graph = graph();
        graph.connect_function_node("func1", "func2", vec![]).unwrap();
        let err = graph.connect_function_node("func1", "func2", vec![]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::DuplicateConnection { .. })));
    }

    #[test]
    fn test_connect_reverse_is_rejected() {
        let mut graph = graph();
        graph.connect_function_node("func1", "func2", vec![]).unwrap();
        let err = graph.connect_function_node("func2", "func1", vec![]).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::ReverseCycle { .. })));
    }

    #[test]
    fn test_longer_cycles_are_not_detected() {
        let mut graph = FunctionGraph::new();
        for id in ["a", "b", "c"] {
            graph.register_function(id, int_to_int());
        }
        graph.connect_function_node("a", "b", vec![]).unwrap();
        graph.connect_function_node("b", "c", vec![]).unwrap();
        assert!(graph.connect_function_node("c", "a", vec![]).is_ok());
    }

    #[test]
    fn test_type_mismatch_requires_adapter() {
        let mut graph = graph();
        let err = graph.connect_function_node("func1", "func3", vec![]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatchNoAdapter { .. }));

        graph
            .connect_function_node("func1", "func3", vec![str_to_int()])
            .unwrap();
        let edge = &graph.get_function_node("func1").unwrap().successors()[0];
        assert_eq!(edge.adapters().len(), 1);
    }

    #[test]
    fn test_adapter_chain_mismatch_names_positions() {
        let mut graph = graph();
        let err = graph
            .connect_function_node("func1", "func3", vec![int_to_str()])
            .unwrap_err();

        match err {
            Error::TypeMismatch { from_index, to_index, from, to } => {
                assert_eq!((from_index, to_index), (0, 1));
                assert_eq!(from, TypeDescriptor::of::<String>());
                assert_eq!(to, TypeDescriptor::of::<i64>());
            }
            other => panic!("expected a type mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_adapter_chain() {
        let mut graph = graph();
        // String -> i64 -> String -> i64
        graph
            .connect_function_node("func1", "func3", vec![str_to_int(), int_to_str(), str_to_int()])
            .unwrap();

        // i64 -> i64 is directly compatible, so the adapter is dropped
        graph
            .connect_function_node("func2", "func1", vec![str_to_int()])
            .unwrap();
        let edge = &graph.get_function_node("func2").unwrap().successors()[0];
        assert!(edge.adapters().is_empty());
    }

    #[test]
    fn test_successors_keep_insertion_order() {
        let mut graph = FunctionGraph::new();
        for id in ["root", "z", "a", "m"] {
            graph.register_function(id, int_to_int());
        }
        for id in ["z", "a", "m"] {
            graph.connect_function_node("root", id, vec![]).unwrap();
        }

        let order: Vec<_> = graph
            .get_function_node("root")
            .unwrap()
            .successors()
            .iter()
            .map(|edge| edge.to().to_string())
            .collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_downcast_recovers_concrete_callable() {
        let node = FunctionNode::new("marker", Arc::new(Marker) as AnyCallable);

        assert!(node.downcast_ref::<Marker>().is_some());
        assert!(node.downcast_ref::<AnyCallable>().is_none());
        assert!(node.downcast_ref::<FunctionGraph>().is_none());
    }

    #[test]
    fn test_json_value_sink_accepts_any_response() {
        let mut graph = FunctionGraph::new();
        graph.register_function("num", callable(|_ctx: &Context, n: i64| Ok(n)));
        graph.register_function("sink", callable(|_ctx: &Context, v: NodeValue| Ok(v)));

        assert!(graph.connect_function_node("num", "sink", vec![]).is_ok());
        assert!(graph.get_function_node("num").unwrap().is_connected_to("sink"));
    }

    struct Marker;

    impl Callable for Marker {
        fn call(&self, _ctx: &Context, req: NodeValue) -> Result<NodeValue, ExecutionError> {
            Ok(req)
        }

        fn request_type(&self) -> TypeDescriptor {
            TypeDescriptor::any()
        }

        fn response_type(&self) -> TypeDescriptor {
            TypeDescriptor::any()
        }
    }
}

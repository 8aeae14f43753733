use crate::core::sync_impl::NodeValue;
use std::collections::HashMap;
use std::sync::Arc;

const FLOW_SEPARATOR: char = '/';

/// Carrier threaded through every call.
///
/// A `Context` is immutable: `with_flow` and `with_value` return a new context and
/// leave the original untouched, so sibling branches never observe each other's trace.
/// Nothing in this crate reads deadlines or cancellation from it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    flow: Arc<str>,
    values: Arc<HashMap<String, NodeValue>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated flow-trace, `""` when nothing has been visited.
    pub fn flow(&self) -> &str {
        &self.flow
    }

    /// Returns a context whose flow-trace has `id` appended.
    pub fn with_flow(&self, id: &str) -> Self {
        let flow = if self.flow.is_empty() {
            id.to_string()
        } else {
            format!("{}{}{}", self.flow, FLOW_SEPARATOR, id)
        };
        Self {
            flow: flow.into(),
            values: Arc::clone(&self.values),
        }
    }

    /// Returns a context carrying `value` under `key`.
    pub fn with_value(&self, key: impl Into<String>, value: NodeValue) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value);
        Self {
            flow: Arc::clone(&self.flow),
            values: Arc::new(values),
        }
    }

    pub fn value(&self, key: &str) -> Option<&NodeValue> {
        self.values.get(key)
    }
}

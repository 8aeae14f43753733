use crate::core::sync_impl::chain_executor::ExecutionRecord;
use std::sync::{Mutex, PoisonError};

/// Trait for receiving execution records as a chain runs.
pub trait Telemetry: Send + Sync {
    fn record(&self, record: ExecutionRecord);
    fn flush(&self);
}

/// Simple in-memory collector for execution records.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_records(&self) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Telemetry for MemoryTelemetry {
    fn record(&self, record: ExecutionRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    fn flush(&self) {
        // No-op for memory collector
    }
}

//! Identifier generation port
//!
//! A generator hands out unique raw values per category. The engine pads
//! them to the configured width (see [`EngineConfig`](crate::EngineConfig)).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{StoreError, StoreResult};

pub trait IdGenerator: Send + Sync {
    /// Next unique value for `category`
    fn next_id(&self, category: &str) -> StoreResult<String>;
}

/// Monotonic counter per category, starting at 1
#[derive(Debug, Default)]
pub struct SequenceIdGenerator {
    counters: Mutex<HashMap<String, u64>>,
}

impl SequenceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&self, category: &str) -> StoreResult<String> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::Backend("id counters lock poisoned".to_string()))?;
        let counter = counters.entry(category.to_string()).or_insert(0);
        *counter += 1;
        Ok(counter.to_string())
    }
}

/// Random v4 UUIDs in simple (hyphen-free) form
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, _category: &str) -> StoreResult<String> {
        Ok(uuid::Uuid::new_v4().simple().to_string())
    }
}

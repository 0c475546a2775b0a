//! Sequence flows: directed, optionally conditioned edges
//!
//! A flow without a condition is always passable. Conditions are only
//! consulted when leaving a gateway.

use crate::{FlowCondition, FlowId, NodeId, Parameters};
use std::sync::Arc;

/// A directed edge between two flow nodes
#[derive(Clone, Debug)]
pub struct SequenceFlow {
    pub id: FlowId,
    pub name: String,
    pub source_id: NodeId,
    pub target_id: NodeId,
    condition: Option<Arc<dyn FlowCondition>>,
}

impl SequenceFlow {
    /// Create an unconditional flow
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: FlowId::new(id),
            name: String::new(),
            source_id: NodeId::new(source_id),
            target_id: NodeId::new(target_id),
            condition: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_condition(mut self, condition: Arc<dyn FlowCondition>) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn condition(&self) -> Option<&dyn FlowCondition> {
        self.condition.as_deref()
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Whether this flow may be taken with the given runtime parameters
    pub fn accepts(&self, params: &Parameters) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.accepts(params))
    }
}

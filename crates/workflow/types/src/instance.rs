//! Workflow instances: persisted executions of a definition
//!
//! An instance row exists only while the instance is live. Reaching a
//! terminate event deletes it, so "not found" reads as "completed".

use crate::{NodeId, WorkflowId};
use serde::{Deserialize, Serialize};

// ── Instance Identifier ──────────────────────────────────────────────

/// Unique identifier for a workflow instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowInstanceId(pub String);

impl WorkflowInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Instance Record ──────────────────────────────────────────────────

/// The persisted row of a live instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: WorkflowInstanceId,
    pub workflow_id: WorkflowId,
    /// Version the instance was started on; never changes afterwards
    pub version: u32,
    /// The node currently awaiting action. Never a gateway.
    pub active_node: Option<NodeId>,
}

impl InstanceRecord {
    pub fn new(
        instance_id: WorkflowInstanceId,
        workflow_id: WorkflowId,
        version: u32,
        active_node: NodeId,
    ) -> Self {
        Self {
            instance_id,
            workflow_id,
            version,
            active_node: Some(active_node),
        }
    }
}

/// An instance whose active roster lists a given participant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub instance_id: WorkflowInstanceId,
    pub workflow_id: WorkflowId,
    pub version: u32,
    pub node_id: NodeId,
    pub execution_order: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_starts_with_active_node() {
        let record = InstanceRecord::new(
            WorkflowInstanceId::new("WFI000000000001"),
            WorkflowId::new("WF"),
            2,
            NodeId::new("start"),
        );
        assert_eq!(record.active_node, Some(NodeId::new("start")));
        assert_eq!(record.instance_id.as_str(), "WFI000000000001");
    }

    #[test]
    fn test_record_serde() {
        let record = InstanceRecord::new(
            WorkflowInstanceId::new("i1"),
            WorkflowId::new("WF"),
            1,
            NodeId::new("t1"),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: InstanceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}

//! Error types for the process graph layer
//!
//! Everything here is a configuration error: a defect in how a process
//! was authored, surfaced at load time or on first traversal.

use crate::{FlowId, NodeId, WorkflowId};

/// Errors raised while building, validating or traversing a process graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("No start event defined in workflow '{0}'")]
    NoStartEvent(WorkflowId),

    #[error("Workflow '{workflow_id}' defines {count} start events, exactly one is required")]
    MultipleStartEvents { workflow_id: WorkflowId, count: usize },

    #[error("Duplicate flow node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Duplicate sequence flow id: {0}")]
    DuplicateFlowId(FlowId),

    #[error("Flow node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Sequence flow not found: {0}")]
    FlowNotFound(FlowId),

    #[error("Task not found: {0}")]
    TaskNotFound(NodeId),

    #[error("Node '{node_id}' has {count} outgoing flows, exactly one is required")]
    InvalidFlowCount { node_id: NodeId, count: usize },

    #[error("No outgoing flow of gateway '{gateway_id}' accepted the parameters")]
    NoMatchingFlow { gateway_id: NodeId },

    #[error("Gateway cycle detected at '{0}'")]
    GatewayCycle(NodeId),

    #[error("Node '{0}' cannot be the target of a sequence flow")]
    IncomingFlowNotAllowed(NodeId),

    #[error("Boundary event '{boundary_id}' is attached to unknown task '{task_id}'")]
    BoundaryTaskNotFound { boundary_id: NodeId, task_id: NodeId },

    #[error("Unknown condition strategy: '{0}'")]
    UnknownCondition(String),

    #[error("Malformed condition strategy '{0}'")]
    InvalidConditionSpec(String),

    #[error("Invalid arguments for condition '{name}': {reason}")]
    InvalidConditionArgs { name: String, reason: String },

    #[error("Task '{0}' is not multi-instance and cannot carry a completion condition")]
    CompletionConditionNotAllowed(NodeId),

    #[error("Workflow '{workflow_id}' version {version} is already registered")]
    DuplicateDefinition { workflow_id: WorkflowId, version: u32 },

    #[error("Workflow definition not found: {workflow_id}{}", .version.map(|v| format!(" (version {v})")).unwrap_or_default())]
    DefinitionNotFound {
        workflow_id: WorkflowId,
        version: Option<u32>,
    },

    #[error("Workflow validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for process graph operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

//! Engine error types
//!
//! Configuration defects surface as [`EngineError::Workflow`]. Every other
//! variant is an operation-precondition failure carrying the identifiers
//! needed to diagnose it.

use laneflow_types::{NodeId, TriggerId, WorkflowError, WorkflowInstanceId};

use crate::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Workflow instance '{0}' is already completed")]
    AlreadyCompleted(WorkflowInstanceId),

    #[error("Operation '{operation}' is not supported on completed instance '{instance_id}'")]
    Unsupported {
        instance_id: WorkflowInstanceId,
        operation: &'static str,
    },

    #[error("Workflow instance '{0}' has no active flow node")]
    NoActiveNode(WorkflowInstanceId),

    #[error("No active entry for '{executor}' on node '{node_id}' of instance '{instance_id}'")]
    ActiveEntryNotFound {
        instance_id: WorkflowInstanceId,
        node_id: NodeId,
        executor: String,
    },

    #[error("'{assignee}' is not assigned to task '{task_id}' of instance '{instance_id}'")]
    AssigneeNotFound {
        instance_id: WorkflowInstanceId,
        task_id: NodeId,
        assignee: String,
    },

    #[error("Task '{task_id}' accepts a single assignee, got {count}")]
    TooManyAssignees { task_id: NodeId, count: usize },

    #[error("Active node '{node_id}' of instance '{instance_id}' is not a task")]
    NotATask {
        instance_id: WorkflowInstanceId,
        node_id: NodeId,
    },

    #[error("No boundary event for trigger '{trigger_id}' on node '{node_id}' of instance '{instance_id}'")]
    BoundaryEventNotFound {
        instance_id: WorkflowInstanceId,
        node_id: NodeId,
        trigger_id: TriggerId,
    },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether this is a defect in process authoring or engine setup
    /// rather than a caller/state mismatch
    pub fn is_configuration(&self) -> bool {
        match self {
            // unknown ids are caller mistakes
            EngineError::Workflow(
                WorkflowError::TaskNotFound(_) | WorkflowError::DefinitionNotFound { .. },
            ) => false,
            EngineError::Workflow(_)
            | EngineError::InvalidConfig(_)
            | EngineError::Io(_)
            | EngineError::Json(_) => true,
            _ => false,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

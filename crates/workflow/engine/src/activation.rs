//! Node activation and roster materialization
//!
//! Landing on a task makes it the sole active node and rebuilds its
//! active roster from the assigned roster. Landing on a terminate event
//! deletes the instance.

use laneflow_types::{
    EventType, FlowNode, NodeId, RosterEntry, Task, WorkflowError, WorkflowInstanceId,
};
use serde::{Deserialize, Serialize};

use crate::{EngineResult, WorkflowStore};

/// Outcome of an operation that may move an instance forward
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// The active node is unchanged
    Stayed,
    /// A new node became active
    Advanced { node_id: NodeId },
    /// A terminate event was reached and the instance deleted
    Completed,
}

impl Transition {
    pub fn is_completed(&self) -> bool {
        matches!(self, Transition::Completed)
    }
}

/// Activate the landing node of a traversal.
///
/// `None` means traversal started from a terminal node and nothing follows.
pub(crate) fn advance(
    store: &dyn WorkflowStore,
    instance_id: &WorkflowInstanceId,
    landing: Option<&FlowNode>,
) -> EngineResult<Transition> {
    match landing {
        Some(node) => activate(store, instance_id, node),
        None => Ok(Transition::Completed),
    }
}

pub(crate) fn activate(
    store: &dyn WorkflowStore,
    instance_id: &WorkflowInstanceId,
    node: &FlowNode,
) -> EngineResult<Transition> {
    match node {
        FlowNode::Task(task) => {
            store.replace_active_node(instance_id, task.id())?;
            materialize_active(store, instance_id, task)?;
            tracing::debug!(instance_id = %instance_id, node_id = %task.id(), "Task activated");
            Ok(Transition::Advanced {
                node_id: task.id().clone(),
            })
        }
        FlowNode::Event(event) if event.event_type == EventType::Terminate => {
            store.delete_instance(instance_id)?;
            tracing::info!(
                instance_id = %instance_id,
                node_id = %event.header.id,
                "Workflow instance completed"
            );
            Ok(Transition::Completed)
        }
        FlowNode::Event(event) => {
            store.replace_active_node(instance_id, &event.header.id)?;
            Ok(Transition::Advanced {
                node_id: event.header.id.clone(),
            })
        }
        // Boundary events only take part in traversal
        FlowNode::BoundaryEvent(_) => Ok(Transition::Stayed),
        FlowNode::Gateway(gateway) => Err(WorkflowError::ValidationError(format!(
            "Gateway '{}' cannot be activated",
            gateway.header.id
        ))
        .into()),
    }
}

/// Rebuild the active roster of `task` from its assigned roster.
///
/// Users win over groups. Sequential tasks activate only the first entry
/// by execution order; other tasks activate everyone.
pub(crate) fn materialize_active(
    store: &dyn WorkflowStore,
    instance_id: &WorkflowInstanceId,
    task: &Task,
) -> EngineResult<()> {
    let assigned = store.find_assigned(instance_id, task.id())?;
    let (users, groups): (Vec<RosterEntry>, Vec<RosterEntry>) = assigned
        .into_iter()
        .partition(|entry| entry.participant.is_user());
    let pool = if users.is_empty() { groups } else { users };

    let roster: Vec<RosterEntry> = if task.is_sequential() {
        pool.into_iter().take(1).collect()
    } else {
        pool
    };

    tracing::debug!(
        instance_id = %instance_id,
        node_id = %task.id(),
        active = roster.len(),
        "Active roster materialized"
    );
    store.replace_active_roster(instance_id, task.id(), roster)?;
    Ok(())
}

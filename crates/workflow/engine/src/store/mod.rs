//! Persistence port
//!
//! Three store families, bundled as [`WorkflowStore`]:
//! - [`InstanceStore`]: instance rows; deleting one cascades to its rosters
//! - [`AssignmentStore`]: assigned rosters per instance and task
//! - [`ActivityStore`]: the active flow node and active rosters
//! - [`UnitOfWork`]: groups several calls into one all-or-nothing commit
//!
//! Every method is one atomic unit. Roster refreshes are single
//! replace-all calls, never a delete followed by an insert. Engine
//! operations that touch several rows run inside [`UnitOfWork::atomically`].

mod memory;

pub use memory::InMemoryWorkflowStore;

use laneflow_types::{InstanceRecord, NodeId, Participant, RosterEntry, WorkflowInstanceId};
use thiserror::Error;

use crate::EngineResult;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// An active roster entry located by participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEntry {
    pub instance_id: WorkflowInstanceId,
    pub node_id: NodeId,
    pub execution_order: u32,
}

/// Storage interface for instance rows.
pub trait InstanceStore: Send + Sync {
    /// Insert a new instance. Fails with `Conflict` if the id is taken.
    fn create_instance(&self, record: InstanceRecord) -> StoreResult<()>;

    fn find_instance(&self, instance_id: &WorkflowInstanceId)
        -> StoreResult<Option<InstanceRecord>>;

    /// Delete an instance and every assigned/active row it owns.
    fn delete_instance(&self, instance_id: &WorkflowInstanceId) -> StoreResult<()>;

    fn list_instances(&self) -> StoreResult<Vec<InstanceRecord>>;
}

/// Storage interface for assigned rosters.
pub trait AssignmentStore: Send + Sync {
    /// Replace the whole assigned roster of a task, clearing both users
    /// and groups before writing `roster`.
    fn replace_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        roster: Vec<RosterEntry>,
    ) -> StoreResult<()>;

    /// Assigned roster of a task, sorted by execution order.
    fn find_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
    ) -> StoreResult<Vec<RosterEntry>>;

    /// Swap `old` for `new` keeping its execution order.
    /// Returns `false` when `old` is not assigned.
    fn update_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        old: &Participant,
        new: Participant,
    ) -> StoreResult<bool>;

    /// Delete assigned rows of one task, or of every task when `task_id` is `None`.
    fn delete_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: Option<&NodeId>,
    ) -> StoreResult<()>;

    fn count_assigned(&self, instance_id: &WorkflowInstanceId, task_id: &NodeId)
        -> StoreResult<usize>;
}

/// Storage interface for the active node and active rosters.
pub trait ActivityStore: Send + Sync {
    /// Make `node_id` the sole active node, clearing every active roster
    /// of the instance first.
    fn replace_active_node(
        &self,
        instance_id: &WorkflowInstanceId,
        node_id: &NodeId,
    ) -> StoreResult<()>;

    fn find_active_node(&self, instance_id: &WorkflowInstanceId) -> StoreResult<Option<NodeId>>;

    /// Replace the active roster of a task.
    fn replace_active_roster(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        roster: Vec<RosterEntry>,
    ) -> StoreResult<()>;

    /// Active roster of a task, sorted by execution order.
    fn find_active(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
    ) -> StoreResult<Vec<RosterEntry>>;

    /// Remove one participant from an active roster, returning its entry.
    fn remove_active(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        participant: &Participant,
    ) -> StoreResult<Option<RosterEntry>>;

    /// Swap `old` for `new` in an active roster.
    /// Returns `false` when `old` is not active.
    fn update_active(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        old: &Participant,
        new: Participant,
    ) -> StoreResult<bool>;

    fn count_active(&self, instance_id: &WorkflowInstanceId, task_id: &NodeId)
        -> StoreResult<usize>;

    /// Every active entry of `participant` across all instances.
    fn find_active_by_participant(&self, participant: &Participant)
        -> StoreResult<Vec<ActiveEntry>>;
}

/// Transaction boundary of a store.
pub trait UnitOfWork: Send + Sync {
    /// Run `op` against a transactional view of the store.
    ///
    /// Writes made through the view become visible to other callers only
    /// when `op` returns `Ok`; on `Err` none of them are applied and the
    /// error is returned unchanged.
    fn atomically(
        &self,
        op: &mut dyn FnMut(&dyn WorkflowStore) -> EngineResult<()>,
    ) -> EngineResult<()>;
}

/// Unified storage bundle consumed by the engine.
pub trait WorkflowStore:
    InstanceStore + AssignmentStore + ActivityStore + UnitOfWork + Send + Sync
{
}

impl<T> WorkflowStore for T where
    T: InstanceStore + AssignmentStore + ActivityStore + UnitOfWork + Send + Sync
{
}

/// Run `op` in one unit of work and hand back its output.
pub(crate) fn transaction<T>(
    store: &dyn WorkflowStore,
    op: impl FnOnce(&dyn WorkflowStore) -> EngineResult<T>,
) -> EngineResult<T> {
    let mut op = Some(op);
    let mut output = None;
    store.atomically(&mut |tx: &dyn WorkflowStore| {
        let op = op
            .take()
            .ok_or_else(|| StoreError::Backend("unit of work ran twice".to_string()))?;
        output = Some(op(tx)?);
        Ok(())
    })?;
    output.ok_or_else(|| StoreError::Backend("unit of work produced no result".to_string()).into())
}

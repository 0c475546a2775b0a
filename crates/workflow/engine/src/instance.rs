//! Instance facade
//!
//! [`InstanceHandle`] is what callers hold. A live handle is bound to the
//! definition version the instance started on. A completed handle is what
//! a lookup returns once the instance's rows are gone: reaching a terminate
//! event deletes them, so "not found" and "finished" are the same case.
//!
//! On a completed handle, reads degrade to `false`/empty, mutators fail
//! with [`EngineError::AlreadyCompleted`], and `workflow_id`/`version`
//! fail with [`EngineError::Unsupported`].

use std::sync::{Arc, MutexGuard};

use laneflow_types::{
    groups_of, roster_of, users_of, CompletionState, GroupId, LaneId, NodeId, Parameters,
    Participant, RosterEntry, Task, TriggerId, UserId, WorkflowDefinition, WorkflowId,
    WorkflowInstanceId,
};

use crate::activation::{self, Transition};
use crate::store::transaction;
use crate::{traversal, EngineError, EngineResult, StoreError, WorkflowEngine, WorkflowStore};

// ── Handle ───────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum InstanceHandle<'e> {
    Live(LiveInstance<'e>),
    Completed(CompletedInstance),
}

impl<'e> InstanceHandle<'e> {
    pub fn instance_id(&self) -> &WorkflowInstanceId {
        match self {
            InstanceHandle::Live(live) => live.instance_id(),
            InstanceHandle::Completed(done) => done.instance_id(),
        }
    }

    pub fn as_live(&self) -> Option<&LiveInstance<'e>> {
        match self {
            InstanceHandle::Live(live) => Some(live),
            InstanceHandle::Completed(_) => None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Whether the instance no longer has stored state
    pub fn is_completed(&self) -> EngineResult<bool> {
        match self {
            InstanceHandle::Live(live) => live.is_completed(),
            InstanceHandle::Completed(_) => Ok(true),
        }
    }

    pub fn is_active(&self, node_id: &NodeId) -> EngineResult<bool> {
        match self {
            InstanceHandle::Live(live) => live.is_active(node_id),
            InstanceHandle::Completed(_) => Ok(false),
        }
    }

    pub fn active_node_id(&self) -> EngineResult<Option<NodeId>> {
        match self {
            InstanceHandle::Live(live) => live.active_node_id(),
            InstanceHandle::Completed(_) => Ok(None),
        }
    }

    pub fn has_active_user_task(&self, task_id: &NodeId, user: &UserId) -> EngineResult<bool> {
        match self {
            InstanceHandle::Live(live) => live.has_active(task_id, &Participant::User(user.clone())),
            InstanceHandle::Completed(_) => Ok(false),
        }
    }

    pub fn has_active_group_task(&self, task_id: &NodeId, group: &GroupId) -> EngineResult<bool> {
        match self {
            InstanceHandle::Live(live) => {
                live.has_active(task_id, &Participant::Group(group.clone()))
            }
            InstanceHandle::Completed(_) => Ok(false),
        }
    }

    /// Assigned users of a task, in execution order
    pub fn assigned_users(&self, task_id: &NodeId) -> EngineResult<Vec<UserId>> {
        match self {
            InstanceHandle::Live(live) => Ok(users_of(&live.assigned(task_id)?)),
            InstanceHandle::Completed(_) => Ok(Vec::new()),
        }
    }

    pub fn assigned_groups(&self, task_id: &NodeId) -> EngineResult<Vec<GroupId>> {
        match self {
            InstanceHandle::Live(live) => Ok(groups_of(&live.assigned(task_id)?)),
            InstanceHandle::Completed(_) => Ok(Vec::new()),
        }
    }

    /// Users currently expected to act on a task
    pub fn active_users(&self, task_id: &NodeId) -> EngineResult<Vec<UserId>> {
        match self {
            InstanceHandle::Live(live) => Ok(users_of(&live.active(task_id)?)),
            InstanceHandle::Completed(_) => Ok(Vec::new()),
        }
    }

    pub fn active_groups(&self, task_id: &NodeId) -> EngineResult<Vec<GroupId>> {
        match self {
            InstanceHandle::Live(live) => Ok(groups_of(&live.active(task_id)?)),
            InstanceHandle::Completed(_) => Ok(Vec::new()),
        }
    }

    pub fn workflow_id(&self) -> EngineResult<&WorkflowId> {
        match self {
            InstanceHandle::Live(live) => Ok(live.definition().workflow_id()),
            InstanceHandle::Completed(done) => Err(done.unsupported("workflow_id")),
        }
    }

    pub fn version(&self) -> EngineResult<u32> {
        match self {
            InstanceHandle::Live(live) => Ok(live.definition().version()),
            InstanceHandle::Completed(done) => Err(done.unsupported("version")),
        }
    }

    // ── Progression ──────────────────────────────────────────────────

    /// Complete the active task as `executor`, or as the first active user
    /// when `executor` is `None`
    pub fn complete_user_task(
        &self,
        params: &Parameters,
        executor: Option<&UserId>,
    ) -> EngineResult<Transition> {
        let live = self.live()?;
        live.complete(params, Executor::User(executor.cloned()))
    }

    pub fn complete_group_task(
        &self,
        params: &Parameters,
        executor: Option<&GroupId>,
    ) -> EngineResult<Transition> {
        let live = self.live()?;
        live.complete(params, Executor::Group(executor.cloned()))
    }

    /// Fire the boundary event listening for `trigger_id` on the active node
    pub fn trigger_event(
        &self,
        trigger_id: &TriggerId,
        params: &Parameters,
    ) -> EngineResult<Transition> {
        self.live()?.trigger_event(trigger_id, params)
    }

    // ── Assignment ───────────────────────────────────────────────────

    pub fn assign_users(&self, task_id: &NodeId, users: Vec<UserId>) -> EngineResult<()> {
        self.live()?.assign(task_id, into_participants(users))
    }

    pub fn assign_groups(&self, task_id: &NodeId, groups: Vec<GroupId>) -> EngineResult<()> {
        self.live()?.assign(task_id, into_participants(groups))
    }

    pub fn assign_user_to_lane(&self, lane_id: &LaneId, user: UserId) -> EngineResult<()> {
        self.assign_users_to_lane(lane_id, vec![user])
    }

    pub fn assign_users_to_lane(&self, lane_id: &LaneId, users: Vec<UserId>) -> EngineResult<()> {
        self.live()?.assign_lane(lane_id, into_participants(users))
    }

    pub fn assign_groups_to_lane(
        &self,
        lane_id: &LaneId,
        groups: Vec<GroupId>,
    ) -> EngineResult<()> {
        self.live()?.assign_lane(lane_id, into_participants(groups))
    }

    /// Replace `old` with `new` in the assigned roster. Fails if `old` is
    /// not assigned. The active roster follows when `old` is active there.
    pub fn change_assigned_user(
        &self,
        task_id: &NodeId,
        old: &UserId,
        new: UserId,
    ) -> EngineResult<()> {
        self.live()?.change_assigned(
            task_id,
            &Participant::User(old.clone()),
            Participant::User(new),
        )
    }

    pub fn change_assigned_group(
        &self,
        task_id: &NodeId,
        old: &GroupId,
        new: GroupId,
    ) -> EngineResult<()> {
        self.live()?.change_assigned(
            task_id,
            &Participant::Group(old.clone()),
            Participant::Group(new),
        )
    }

    /// Replace `old` with `new` in the active roster if present there;
    /// does nothing otherwise
    pub fn change_active_user_task(
        &self,
        task_id: &NodeId,
        old: &UserId,
        new: UserId,
    ) -> EngineResult<()> {
        match self {
            InstanceHandle::Live(live) => live.change_active(
                task_id,
                &Participant::User(old.clone()),
                Participant::User(new),
            ),
            InstanceHandle::Completed(_) => Ok(()),
        }
    }

    pub fn change_active_group_task(
        &self,
        task_id: &NodeId,
        old: &GroupId,
        new: GroupId,
    ) -> EngineResult<()> {
        match self {
            InstanceHandle::Live(live) => live.change_active(
                task_id,
                &Participant::Group(old.clone()),
                Participant::Group(new),
            ),
            InstanceHandle::Completed(_) => Ok(()),
        }
    }

    fn live(&self) -> EngineResult<&LiveInstance<'e>> {
        match self {
            InstanceHandle::Live(live) => Ok(live),
            InstanceHandle::Completed(done) => {
                Err(EngineError::AlreadyCompleted(done.instance_id.clone()))
            }
        }
    }
}

fn into_participants<P: Into<Participant>>(members: Vec<P>) -> Vec<Participant> {
    members.into_iter().map(Into::into).collect()
}

// ── Completed ────────────────────────────────────────────────────────

/// An instance with no stored state left
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedInstance {
    instance_id: WorkflowInstanceId,
}

impl CompletedInstance {
    pub fn new(instance_id: WorkflowInstanceId) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &WorkflowInstanceId {
        &self.instance_id
    }

    fn unsupported(&self, operation: &'static str) -> EngineError {
        EngineError::Unsupported {
            instance_id: self.instance_id.clone(),
            operation,
        }
    }
}

// ── Live ─────────────────────────────────────────────────────────────

enum Executor {
    User(Option<UserId>),
    Group(Option<GroupId>),
}

impl Executor {
    fn participant(&self) -> Option<Participant> {
        match self {
            Executor::User(user) => user.clone().map(Participant::User),
            Executor::Group(group) => group.clone().map(Participant::Group),
        }
    }

    fn matches_kind(&self, participant: &Participant) -> bool {
        match self {
            Executor::User(_) => participant.is_user(),
            Executor::Group(_) => participant.is_group(),
        }
    }

    fn describe(&self) -> String {
        match self.participant() {
            Some(participant) => participant.to_string(),
            None => match self {
                Executor::User(_) => "<first active user>".to_string(),
                Executor::Group(_) => "<first active group>".to_string(),
            },
        }
    }
}

/// A running instance bound to its pinned definition version
pub struct LiveInstance<'e> {
    engine: &'e WorkflowEngine,
    definition: Arc<WorkflowDefinition>,
    instance_id: WorkflowInstanceId,
}

impl<'e> LiveInstance<'e> {
    pub(crate) fn new(
        engine: &'e WorkflowEngine,
        definition: Arc<WorkflowDefinition>,
        instance_id: WorkflowInstanceId,
    ) -> Self {
        Self {
            engine,
            definition,
            instance_id,
        }
    }

    pub fn instance_id(&self) -> &WorkflowInstanceId {
        &self.instance_id
    }

    /// The definition version this instance runs on
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    fn store(&self) -> &'e dyn WorkflowStore {
        self.engine.store()
    }

    /// Run `op` as one unit of work while holding this instance's lock.
    ///
    /// The lock entry is dropped once the instance is gone, either because
    /// `op` completed it or because it had already been deleted.
    fn exclusive<T>(
        &self,
        op: impl FnOnce(&dyn WorkflowStore) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let lock = self.engine.locks().get(&self.instance_id)?;
        let guard: MutexGuard<'_, ()> = lock
            .lock()
            .map_err(|_| StoreError::Backend("instance lock poisoned".to_string()))?;
        let result = transaction(self.store(), op);
        drop(guard);
        if matches!(result, Err(EngineError::NoActiveNode(_))) {
            self.engine.locks().release(&self.instance_id);
        }
        result
    }

    fn finish(&self, transition: Transition) -> Transition {
        if transition.is_completed() {
            self.engine.locks().release(&self.instance_id);
        }
        transition
    }

    fn require_active_node(&self, store: &dyn WorkflowStore) -> EngineResult<NodeId> {
        store
            .find_active_node(&self.instance_id)?
            .ok_or_else(|| EngineError::NoActiveNode(self.instance_id.clone()))
    }

    // ── Queries ──────────────────────────────────────────────────────

    fn is_completed(&self) -> EngineResult<bool> {
        Ok(self.store().find_instance(&self.instance_id)?.is_none())
    }

    fn is_active(&self, node_id: &NodeId) -> EngineResult<bool> {
        Ok(self.active_node_id()?.as_ref() == Some(node_id))
    }

    fn active_node_id(&self) -> EngineResult<Option<NodeId>> {
        Ok(self.store().find_active_node(&self.instance_id)?)
    }

    fn has_active(&self, task_id: &NodeId, participant: &Participant) -> EngineResult<bool> {
        Ok(self
            .active(task_id)?
            .iter()
            .any(|entry| &entry.participant == participant))
    }

    fn assigned(&self, task_id: &NodeId) -> EngineResult<Vec<RosterEntry>> {
        Ok(self.store().find_assigned(&self.instance_id, task_id)?)
    }

    fn active(&self, task_id: &NodeId) -> EngineResult<Vec<RosterEntry>> {
        Ok(self.store().find_active(&self.instance_id, task_id)?)
    }

    // ── Progression ──────────────────────────────────────────────────

    fn complete(&self, params: &Parameters, executor: Executor) -> EngineResult<Transition> {
        self.exclusive(|store| {
            let node_id = self.require_active_node(store)?;
            let task = self
                .definition
                .node(&node_id)?
                .as_task()
                .ok_or_else(|| EngineError::NotATask {
                    instance_id: self.instance_id.clone(),
                    node_id: node_id.clone(),
                })?;

            let active = store.find_active(&self.instance_id, &node_id)?;
            let wanted = executor.participant();
            let entry = active
                .iter()
                .find(|entry| match &wanted {
                    Some(participant) => &entry.participant == participant,
                    None => executor.matches_kind(&entry.participant),
                })
                .cloned()
                .ok_or_else(|| EngineError::ActiveEntryNotFound {
                    instance_id: self.instance_id.clone(),
                    node_id: node_id.clone(),
                    executor: executor.describe(),
                })?;

            let assigned = store.find_assigned(&self.instance_id, &node_id)?;
            let next_in_sequence = if task.is_sequential() {
                assigned
                    .iter()
                    .filter(|e| e.execution_order > entry.execution_order)
                    .min_by_key(|e| e.execution_order)
                    .cloned()
            } else {
                None
            };

            let state = completion_state(
                task,
                &assigned,
                &active,
                &entry,
                next_in_sequence.is_some(),
            );
            let complete = task.completion_condition().is_complete(&state);
            tracing::debug!(
                instance_id = %self.instance_id,
                node_id = %node_id,
                executor = %entry.participant,
                assigned = state.assigned,
                remaining = state.active_remaining,
                completed = state.completed,
                complete,
                "Evaluated completion condition"
            );

            // Resolve the path before the first write
            let landing = if complete {
                Some(traversal::find_landing(&self.definition, &node_id, params)?)
            } else {
                None
            };

            store.remove_active(&self.instance_id, &node_id, &entry.participant)?;
            if let Some(next) = next_in_sequence {
                store.replace_active_roster(&self.instance_id, &node_id, vec![next])?;
            }

            match landing {
                Some(landing) => activation::advance(store, &self.instance_id, landing),
                None => Ok(Transition::Stayed),
            }
        })
        .map(|transition| self.finish(transition))
    }

    fn trigger_event(
        &self,
        trigger_id: &TriggerId,
        params: &Parameters,
    ) -> EngineResult<Transition> {
        self.exclusive(|store| {
            let node_id = self.require_active_node(store)?;
            let boundary = self
                .definition
                .boundary_event_for_trigger(&node_id, trigger_id)
                .ok_or_else(|| EngineError::BoundaryEventNotFound {
                    instance_id: self.instance_id.clone(),
                    node_id: node_id.clone(),
                    trigger_id: trigger_id.clone(),
                })?;

            tracing::info!(
                instance_id = %self.instance_id,
                node_id = %node_id,
                boundary_id = %boundary.header.id,
                trigger_id = %trigger_id,
                "Boundary event triggered"
            );
            let landing = traversal::find_landing(&self.definition, &boundary.header.id, params)?;
            activation::advance(store, &self.instance_id, landing)
        })
        .map(|transition| self.finish(transition))
    }

    // ── Assignment ───────────────────────────────────────────────────

    fn assign(&self, task_id: &NodeId, participants: Vec<Participant>) -> EngineResult<()> {
        self.exclusive(|store| {
            let active_node = self.require_active_node(store)?;
            let task = self.definition.task(task_id)?;
            check_assignee_count(task, participants.len())?;
            self.write_assignment(store, task, participants, &active_node)
        })
    }

    fn assign_lane(&self, lane_id: &LaneId, participants: Vec<Participant>) -> EngineResult<()> {
        self.exclusive(|store| {
            let active_node = self.require_active_node(store)?;
            let tasks: Vec<&Task> = self.definition.tasks_in_lane(lane_id).collect();
            for task in &tasks {
                check_assignee_count(task, participants.len())?;
            }
            for task in tasks {
                self.write_assignment(store, task, participants.clone(), &active_node)?;
            }
            Ok(())
        })
    }

    fn write_assignment(
        &self,
        store: &dyn WorkflowStore,
        task: &Task,
        participants: Vec<Participant>,
        active_node: &NodeId,
    ) -> EngineResult<()> {
        let count = participants.len();
        if participants.is_empty() {
            store.delete_assigned(&self.instance_id, Some(task.id()))?;
        } else {
            let roster = roster_of(participants, task.is_sequential());
            store.replace_assigned(&self.instance_id, task.id(), roster)?;
        }
        tracing::debug!(
            instance_id = %self.instance_id,
            task_id = %task.id(),
            count,
            "Assigned roster replaced"
        );

        if task.id() == active_node {
            activation::materialize_active(store, &self.instance_id, task)?;
        }
        Ok(())
    }

    fn change_assigned(
        &self,
        task_id: &NodeId,
        old: &Participant,
        new: Participant,
    ) -> EngineResult<()> {
        self.exclusive(|store| {
            self.require_active_node(store)?;
            self.definition.task(task_id)?;

            if !store.update_assigned(&self.instance_id, task_id, old, new.clone())? {
                return Err(EngineError::AssigneeNotFound {
                    instance_id: self.instance_id.clone(),
                    task_id: task_id.clone(),
                    assignee: old.to_string(),
                });
            }
            let was_active = store.update_active(&self.instance_id, task_id, old, new)?;
            tracing::debug!(
                instance_id = %self.instance_id,
                task_id = %task_id,
                old = %old,
                was_active,
                "Assignee changed"
            );
            Ok(())
        })
    }

    fn change_active(
        &self,
        task_id: &NodeId,
        old: &Participant,
        new: Participant,
    ) -> EngineResult<()> {
        self.exclusive(|store| {
            self.require_active_node(store)?;
            self.definition.task(task_id)?;

            if !store
                .update_active(&self.instance_id, task_id, old, new)?
            {
                tracing::warn!(
                    instance_id = %self.instance_id,
                    task_id = %task_id,
                    old = %old,
                    "Active entry not found, nothing changed"
                );
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for LiveInstance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveInstance")
            .field("instance_id", &self.instance_id)
            .field("workflow_id", self.definition.workflow_id())
            .field("version", &self.definition.version())
            .finish()
    }
}

fn check_assignee_count(task: &Task, count: usize) -> EngineResult<()> {
    if !task.multi_instance.is_multi_instance() && count > 1 {
        return Err(EngineError::TooManyAssignees {
            task_id: task.id().clone(),
            count,
        });
    }
    Ok(())
}

/// Roster state right after `done` acts.
///
/// Sequential tasks count every assigned entry up to and including
/// `done`'s position; other tasks count assigned entries no longer active.
fn completion_state(
    task: &Task,
    assigned: &[RosterEntry],
    active: &[RosterEntry],
    done: &RosterEntry,
    advances_sequence: bool,
) -> CompletionState {
    let active_remaining = active.len().saturating_sub(1) + usize::from(advances_sequence);
    let completed = if task.is_sequential() {
        assigned
            .iter()
            .filter(|e| e.execution_order <= done.execution_order)
            .count()
    } else {
        assigned.len().saturating_sub(active_remaining)
    };
    CompletionState {
        assigned: assigned.len(),
        active_remaining,
        completed,
    }
}

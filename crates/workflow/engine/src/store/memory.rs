//! In-memory reference implementation of the workflow store traits.
//!
//! All rows live behind one lock, so every trait method is atomic.
//! A unit of work holds the write lock for its whole run and works on a
//! staged copy of the rows, swapped in only on success. Readers see the
//! state before or after it, never in between.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use laneflow_types::{InstanceRecord, NodeId, Participant, RosterEntry, WorkflowInstanceId};

use super::{
    ActiveEntry, ActivityStore, AssignmentStore, InstanceStore, StoreError, StoreResult,
    UnitOfWork, WorkflowStore,
};
use crate::EngineResult;

type Rows = HashMap<WorkflowInstanceId, InstanceRows>;

#[derive(Debug, Clone)]
struct InstanceRows {
    record: InstanceRecord,
    assigned: HashMap<NodeId, Vec<RosterEntry>>,
    active: HashMap<NodeId, Vec<RosterEntry>>,
}

impl InstanceRows {
    fn new(record: InstanceRecord) -> Self {
        Self {
            record,
            assigned: HashMap::new(),
            active: HashMap::new(),
        }
    }
}

/// In-memory workflow store.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    instances: RwLock<HashMap<WorkflowInstanceId, InstanceRows>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Rows>> {
        self.instances
            .read()
            .map_err(|_| StoreError::Backend("instances lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Rows>> {
        self.instances
            .write()
            .map_err(|_| StoreError::Backend("instances lock poisoned".to_string()))
    }

    fn staged(rows: &Rows) -> Self {
        Self {
            instances: RwLock::new(rows.clone()),
        }
    }

    fn into_rows(self) -> StoreResult<Rows> {
        self.instances
            .into_inner()
            .map_err(|_| StoreError::Backend("staged rows lock poisoned".to_string()))
    }
}

fn not_found(instance_id: &WorkflowInstanceId) -> StoreError {
    StoreError::NotFound(format!("instance {} not found", instance_id))
}

fn sorted(mut roster: Vec<RosterEntry>) -> Vec<RosterEntry> {
    roster.sort_by_key(|e| e.execution_order);
    roster
}

fn swap_participant(roster: &mut [RosterEntry], old: &Participant, new: Participant) -> bool {
    match roster.iter_mut().find(|e| &e.participant == old) {
        Some(entry) => {
            entry.participant = new;
            true
        }
        None => false,
    }
}

impl UnitOfWork for InMemoryWorkflowStore {
    fn atomically(
        &self,
        op: &mut dyn FnMut(&dyn WorkflowStore) -> EngineResult<()>,
    ) -> EngineResult<()> {
        let mut guard = self.write()?;
        let staging = Self::staged(&guard);
        op(&staging)?;
        *guard = staging.into_rows()?;
        Ok(())
    }
}

impl InstanceStore for InMemoryWorkflowStore {
    fn create_instance(&self, record: InstanceRecord) -> StoreResult<()> {
        let mut guard = self.write()?;
        if guard.contains_key(&record.instance_id) {
            return Err(StoreError::Conflict(format!(
                "instance {} already exists",
                record.instance_id
            )));
        }
        guard.insert(record.instance_id.clone(), InstanceRows::new(record));
        Ok(())
    }

    fn find_instance(
        &self,
        instance_id: &WorkflowInstanceId,
    ) -> StoreResult<Option<InstanceRecord>> {
        Ok(self.read()?.get(instance_id).map(|rows| rows.record.clone()))
    }

    fn delete_instance(&self, instance_id: &WorkflowInstanceId) -> StoreResult<()> {
        self.write()?.remove(instance_id);
        Ok(())
    }

    fn list_instances(&self) -> StoreResult<Vec<InstanceRecord>> {
        let mut records: Vec<_> = self.read()?.values().map(|r| r.record.clone()).collect();
        records.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        Ok(records)
    }
}

impl AssignmentStore for InMemoryWorkflowStore {
    fn replace_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        roster: Vec<RosterEntry>,
    ) -> StoreResult<()> {
        let mut guard = self.write()?;
        let rows = guard.get_mut(instance_id).ok_or_else(|| not_found(instance_id))?;
        rows.assigned.insert(task_id.clone(), roster);
        Ok(())
    }

    fn find_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
    ) -> StoreResult<Vec<RosterEntry>> {
        let guard = self.read()?;
        let roster = guard
            .get(instance_id)
            .and_then(|rows| rows.assigned.get(task_id))
            .cloned()
            .unwrap_or_default();
        Ok(sorted(roster))
    }

    fn update_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        old: &Participant,
        new: Participant,
    ) -> StoreResult<bool> {
        let mut guard = self.write()?;
        let rows = guard.get_mut(instance_id).ok_or_else(|| not_found(instance_id))?;
        Ok(rows
            .assigned
            .get_mut(task_id)
            .is_some_and(|roster| swap_participant(roster, old, new)))
    }

    fn delete_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: Option<&NodeId>,
    ) -> StoreResult<()> {
        let mut guard = self.write()?;
        if let Some(rows) = guard.get_mut(instance_id) {
            match task_id {
                Some(task_id) => {
                    rows.assigned.remove(task_id);
                }
                None => rows.assigned.clear(),
            }
        }
        Ok(())
    }

    fn count_assigned(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
    ) -> StoreResult<usize> {
        let guard = self.read()?;
        Ok(guard
            .get(instance_id)
            .and_then(|rows| rows.assigned.get(task_id))
            .map_or(0, Vec::len))
    }
}

impl ActivityStore for InMemoryWorkflowStore {
    fn replace_active_node(
        &self,
        instance_id: &WorkflowInstanceId,
        node_id: &NodeId,
    ) -> StoreResult<()> {
        let mut guard = self.write()?;
        let rows = guard.get_mut(instance_id).ok_or_else(|| not_found(instance_id))?;
        rows.active.clear();
        rows.record.active_node = Some(node_id.clone());
        Ok(())
    }

    fn find_active_node(&self, instance_id: &WorkflowInstanceId) -> StoreResult<Option<NodeId>> {
        Ok(self
            .read()?
            .get(instance_id)
            .and_then(|rows| rows.record.active_node.clone()))
    }

    fn replace_active_roster(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        roster: Vec<RosterEntry>,
    ) -> StoreResult<()> {
        let mut guard = self.write()?;
        let rows = guard.get_mut(instance_id).ok_or_else(|| not_found(instance_id))?;
        rows.active.insert(task_id.clone(), roster);
        Ok(())
    }

    fn find_active(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
    ) -> StoreResult<Vec<RosterEntry>> {
        let guard = self.read()?;
        let roster = guard
            .get(instance_id)
            .and_then(|rows| rows.active.get(task_id))
            .cloned()
            .unwrap_or_default();
        Ok(sorted(roster))
    }

    fn remove_active(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        participant: &Participant,
    ) -> StoreResult<Option<RosterEntry>> {
        let mut guard = self.write()?;
        let rows = guard.get_mut(instance_id).ok_or_else(|| not_found(instance_id))?;
        let Some(roster) = rows.active.get_mut(task_id) else {
            return Ok(None);
        };
        Ok(roster
            .iter()
            .position(|e| &e.participant == participant)
            .map(|idx| roster.remove(idx)))
    }

    fn update_active(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
        old: &Participant,
        new: Participant,
    ) -> StoreResult<bool> {
        let mut guard = self.write()?;
        let rows = guard.get_mut(instance_id).ok_or_else(|| not_found(instance_id))?;
        Ok(rows
            .active
            .get_mut(task_id)
            .is_some_and(|roster| swap_participant(roster, old, new)))
    }

    fn count_active(
        &self,
        instance_id: &WorkflowInstanceId,
        task_id: &NodeId,
    ) -> StoreResult<usize> {
        let guard = self.read()?;
        Ok(guard
            .get(instance_id)
            .and_then(|rows| rows.active.get(task_id))
            .map_or(0, Vec::len))
    }

    fn find_active_by_participant(
        &self,
        participant: &Participant,
    ) -> StoreResult<Vec<ActiveEntry>> {
        let guard = self.read()?;
        let mut entries: Vec<ActiveEntry> = guard
            .values()
            .flat_map(|rows| {
                rows.active.iter().flat_map(move |(node_id, roster)| {
                    roster
                        .iter()
                        .filter(move |e| &e.participant == participant)
                        .map(move |e| ActiveEntry {
                            instance_id: rows.record.instance_id.clone(),
                            node_id: node_id.clone(),
                            execution_order: e.execution_order,
                        })
                })
            })
            .collect();
        entries.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineError;
    use laneflow_types::{roster_of, GroupId, UserId, WorkflowId};

    fn store_with_instance(id: &str) -> (InMemoryWorkflowStore, WorkflowInstanceId) {
        let store = InMemoryWorkflowStore::new();
        let instance_id = WorkflowInstanceId::new(id);
        store
            .create_instance(InstanceRecord::new(
                instance_id.clone(),
                WorkflowId::new("WF"),
                1,
                NodeId::new("start"),
            ))
            .unwrap();
        (store, instance_id)
    }

    fn users(names: &[&str]) -> Vec<UserId> {
        names.iter().map(|n| UserId::new(*n)).collect()
    }

    #[test]
    fn test_create_conflict() {
        let (store, id) = store_with_instance("i1");
        let err = store
            .create_instance(InstanceRecord::new(
                id,
                WorkflowId::new("WF"),
                1,
                NodeId::new("start"),
            ))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_delete_cascades() {
        let (store, id) = store_with_instance("i1");
        let task = NodeId::new("t1");
        store
            .replace_assigned(&id, &task, roster_of(users(&["a"]), false))
            .unwrap();
        store
            .replace_active_roster(&id, &task, roster_of(users(&["a"]), false))
            .unwrap();

        store.delete_instance(&id).unwrap();
        assert!(store.find_instance(&id).unwrap().is_none());
        assert_eq!(store.count_assigned(&id, &task).unwrap(), 0);
        assert_eq!(store.count_active(&id, &task).unwrap(), 0);
        assert!(store.find_active_node(&id).unwrap().is_none());
    }

    #[test]
    fn test_replace_assigned_clears_other_kind() {
        let (store, id) = store_with_instance("i1");
        let task = NodeId::new("t1");
        store
            .replace_assigned(&id, &task, roster_of(users(&["a", "b"]), false))
            .unwrap();
        store
            .replace_assigned(&id, &task, roster_of([GroupId::new("g")], false))
            .unwrap();
        let roster = store.find_assigned(&id, &task).unwrap();
        assert_eq!(roster.len(), 1);
        assert!(roster[0].participant.is_group());
    }

    #[test]
    fn test_replace_active_node_clears_rosters() {
        let (store, id) = store_with_instance("i1");
        let t1 = NodeId::new("t1");
        store.replace_active_node(&id, &t1).unwrap();
        store
            .replace_active_roster(&id, &t1, roster_of(users(&["a"]), false))
            .unwrap();

        store.replace_active_node(&id, &NodeId::new("t2")).unwrap();
        assert_eq!(store.count_active(&id, &t1).unwrap(), 0);
        assert_eq!(
            store.find_active_node(&id).unwrap(),
            Some(NodeId::new("t2"))
        );
    }

    #[test]
    fn test_update_keeps_order() {
        let (store, id) = store_with_instance("i1");
        let task = NodeId::new("t1");
        store
            .replace_assigned(&id, &task, roster_of(users(&["a", "b", "c"]), true))
            .unwrap();

        let old = Participant::from(UserId::new("b"));
        assert!(store
            .update_assigned(&id, &task, &old, UserId::new("x").into())
            .unwrap());
        assert!(!store
            .update_assigned(&id, &task, &old, UserId::new("y").into())
            .unwrap());

        let roster = store.find_assigned(&id, &task).unwrap();
        assert_eq!(roster[1], RosterEntry::new(UserId::new("x"), 2));
    }

    #[test]
    fn test_remove_and_find_by_participant() {
        let (store, id) = store_with_instance("i1");
        let task = NodeId::new("t1");
        store
            .replace_active_roster(&id, &task, roster_of(users(&["a", "b"]), false))
            .unwrap();

        let a = Participant::from(UserId::new("a"));
        let found = store.find_active_by_participant(&a).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_id, task);

        let removed = store.remove_active(&id, &task, &a).unwrap();
        assert_eq!(removed, Some(RosterEntry::unordered(UserId::new("a"))));
        assert!(store.remove_active(&id, &task, &a).unwrap().is_none());
        assert_eq!(store.count_active(&id, &task).unwrap(), 1);
    }

    #[test]
    fn test_writes_to_missing_instance_fail() {
        let store = InMemoryWorkflowStore::new();
        let id = WorkflowInstanceId::new("missing");
        let err = store
            .replace_active_node(&id, &NodeId::new("t1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.find_assigned(&id, &NodeId::new("t1")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_assigned_by_task_and_all() {
        let (store, id) = store_with_instance("i1");
        let t1 = NodeId::new("t1");
        let t2 = NodeId::new("t2");
        store
            .replace_assigned(&id, &t1, roster_of(users(&["a"]), false))
            .unwrap();
        store
            .replace_assigned(&id, &t2, roster_of(users(&["b", "c"]), true))
            .unwrap();

        store.delete_assigned(&id, Some(&t1)).unwrap();
        assert_eq!(store.count_assigned(&id, &t1).unwrap(), 0);
        assert_eq!(store.count_assigned(&id, &t2).unwrap(), 2);

        store.delete_assigned(&id, None).unwrap();
        assert_eq!(store.count_assigned(&id, &t2).unwrap(), 0);
        assert!(store.find_instance(&id).unwrap().is_some());
    }

    #[test]
    fn test_unit_of_work_commits() {
        let (store, id) = store_with_instance("i1");
        let task = NodeId::new("t1");
        store
            .atomically(&mut |tx: &dyn WorkflowStore| {
                tx.replace_active_node(&id, &task)?;
                tx.replace_active_roster(&id, &task, roster_of(users(&["a"]), false))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.find_active_node(&id).unwrap(), Some(task.clone()));
        assert_eq!(store.count_active(&id, &task).unwrap(), 1);
    }

    #[test]
    fn test_unit_of_work_rolls_back() {
        let (store, id) = store_with_instance("i1");
        let task = NodeId::new("t1");
        store
            .replace_active_roster(&id, &task, roster_of(users(&["a", "b"]), false))
            .unwrap();

        let a = Participant::from(UserId::new("a"));
        let err = store
            .atomically(&mut |tx: &dyn WorkflowStore| {
                tx.remove_active(&id, &task, &a)?;
                tx.replace_active_node(&id, &NodeId::new("t2"))?;
                Err(StoreError::Backend("boom".to_string()).into())
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Backend(_))));

        assert_eq!(store.count_active(&id, &task).unwrap(), 2);
        assert_eq!(
            store.find_active_node(&id).unwrap(),
            Some(NodeId::new("start"))
        );
    }
}

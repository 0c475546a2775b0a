//! Workflow engine: the entry point for starting and finding instances
//!
//! The engine owns the definition registry and receives its ports (store,
//! id generator, clock) at construction. It holds no instance state of its
//! own; every instance lives in the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use laneflow_types::{
    GroupId, InstanceRecord, Parameters, Participant, UserId, WorkItem, WorkflowDefinition,
    WorkflowId, WorkflowInstanceId,
};

use crate::activation::{self, Transition};
use crate::instance::{CompletedInstance, InstanceHandle, LiveInstance};
use crate::store::transaction;
use crate::{
    traversal, Clock, DefinitionRegistry, EngineConfig, EngineResult, IdGenerator,
    SequenceIdGenerator, StoreError, SystemClock, WorkflowStore,
};

/// Serializes operations on one instance; different instances never contend
#[derive(Debug, Default)]
pub(crate) struct InstanceLocks {
    locks: Mutex<HashMap<WorkflowInstanceId, Arc<Mutex<()>>>>,
}

impl InstanceLocks {
    pub(crate) fn get(&self, instance_id: &WorkflowInstanceId) -> EngineResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Backend("instance lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(instance_id.clone()).or_default()))
    }

    pub(crate) fn release(&self, instance_id: &WorkflowInstanceId) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(instance_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().map_or(0, |locks| locks.len())
    }
}

/// The workflow execution engine
pub struct WorkflowEngine {
    registry: RwLock<DefinitionRegistry>,
    store: Arc<dyn WorkflowStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    locks: InstanceLocks,
}

impl WorkflowEngine {
    /// Create an engine with default configuration, a sequence id
    /// generator and the system clock
    pub fn new(store: Arc<dyn WorkflowStore>, registry: DefinitionRegistry) -> Self {
        Self {
            registry: RwLock::new(registry),
            store,
            ids: Arc::new(SequenceIdGenerator::new()),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
            locks: InstanceLocks::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn WorkflowStore {
        self.store.as_ref()
    }

    // ── Definitions ──────────────────────────────────────────────────

    /// Register a new definition version at run time
    pub fn publish(&self, definition: WorkflowDefinition) -> EngineResult<Arc<WorkflowDefinition>> {
        let mut registry = self
            .registry
            .write()
            .map_err(|_| StoreError::Backend("definition registry lock poisoned".to_string()))?;
        Ok(registry.publish(definition)?)
    }

    /// Latest definition of `workflow_id` effective now
    pub fn resolve(&self, workflow_id: &WorkflowId) -> EngineResult<Arc<WorkflowDefinition>> {
        let now = self.clock.now();
        Ok(self.read_registry()?.resolve(workflow_id, now)?)
    }

    pub fn resolve_version(
        &self,
        workflow_id: &WorkflowId,
        version: u32,
    ) -> EngineResult<Arc<WorkflowDefinition>> {
        Ok(self.read_registry()?.resolve_version(workflow_id, version)?)
    }

    fn read_registry(&self) -> EngineResult<std::sync::RwLockReadGuard<'_, DefinitionRegistry>> {
        Ok(self
            .registry
            .read()
            .map_err(|_| StoreError::Backend("definition registry lock poisoned".to_string()))?)
    }

    // ── Instance lifecycle ───────────────────────────────────────────

    /// Start an instance of the latest effective version of `workflow_id`
    pub fn start(
        &self,
        workflow_id: &WorkflowId,
        params: &Parameters,
    ) -> EngineResult<InstanceHandle<'_>> {
        let definition = self.resolve(workflow_id)?;
        self.start_definition(definition, params)
    }

    /// Start an instance pinned to an exact version
    pub fn start_version(
        &self,
        workflow_id: &WorkflowId,
        version: u32,
        params: &Parameters,
    ) -> EngineResult<InstanceHandle<'_>> {
        let definition = self.resolve_version(workflow_id, version)?;
        self.start_definition(definition, params)
    }

    fn start_definition(
        &self,
        definition: Arc<WorkflowDefinition>,
        params: &Parameters,
    ) -> EngineResult<InstanceHandle<'_>> {
        let start_id = definition.start_event()?.header.id.clone();
        // Resolve the whole path before writing anything
        let landing = traversal::find_landing(&definition, &start_id, params)?;

        let raw_id = self.ids.next_id(&self.config.instance_id_category)?;
        let instance_id = WorkflowInstanceId::new(self.config.pad_instance_id(&raw_id));

        let lock = self.locks.get(&instance_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| StoreError::Backend("instance lock poisoned".to_string()))?;

        let record = InstanceRecord::new(
            instance_id.clone(),
            definition.workflow_id().clone(),
            definition.version(),
            start_id,
        );
        let transition = match transaction(self.store.as_ref(), |tx| {
            tx.create_instance(record)?;
            activation::advance(tx, &instance_id, landing)
        }) {
            Ok(transition) => transition,
            Err(e) => {
                self.locks.release(&instance_id);
                return Err(e);
            }
        };
        tracing::info!(
            instance_id = %instance_id,
            workflow_id = %definition.workflow_id(),
            version = definition.version(),
            "Workflow instance started"
        );

        match transition {
            Transition::Completed => {
                self.locks.release(&instance_id);
                Ok(InstanceHandle::Completed(CompletedInstance::new(instance_id)))
            }
            _ => Ok(InstanceHandle::Live(LiveInstance::new(
                self,
                definition,
                instance_id,
            ))),
        }
    }

    /// Look up an instance. An id with no stored state is a completed instance.
    pub fn find(&self, instance_id: &WorkflowInstanceId) -> EngineResult<InstanceHandle<'_>> {
        match self.store.find_instance(instance_id)? {
            None => Ok(InstanceHandle::Completed(CompletedInstance::new(
                instance_id.clone(),
            ))),
            Some(record) => {
                // Instances stay on the version they started with
                let definition = self.resolve_version(&record.workflow_id, record.version)?;
                Ok(InstanceHandle::Live(LiveInstance::new(
                    self,
                    definition,
                    record.instance_id,
                )))
            }
        }
    }

    // ── Worklists ────────────────────────────────────────────────────

    /// Active work items of a user across all live instances
    pub fn work_items_for_user(&self, user: &UserId) -> EngineResult<Vec<WorkItem>> {
        self.work_items_for(&Participant::User(user.clone()))
    }

    /// Active work items of a group across all live instances
    pub fn work_items_for_group(&self, group: &GroupId) -> EngineResult<Vec<WorkItem>> {
        self.work_items_for(&Participant::Group(group.clone()))
    }

    fn work_items_for(&self, participant: &Participant) -> EngineResult<Vec<WorkItem>> {
        let mut items = Vec::new();
        for entry in self.store.find_active_by_participant(participant)? {
            let Some(record) = self.store.find_instance(&entry.instance_id)? else {
                continue;
            };
            items.push(WorkItem {
                instance_id: entry.instance_id,
                workflow_id: record.workflow_id,
                version: record.version,
                node_id: entry.node_id,
                execution_order: entry.execution_order,
            });
        }
        Ok(items)
    }

    // ── Internals used by live handles ───────────────────────────────

    pub(crate) fn locks(&self) -> &InstanceLocks {
        &self.locks
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

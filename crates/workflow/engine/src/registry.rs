//! Definition registry: resolves which definition snapshot applies
//!
//! Definitions are immutable once registered. To change a process,
//! publish a new version. Lookups either pin an exact version or pick the
//! latest version whose effective date has arrived.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use laneflow_types::{WorkflowDefinition, WorkflowError, WorkflowId, WorkflowResult};

use crate::{DefinitionLoader, EngineResult};

/// Registry of workflow definitions, indexed by id then version
#[derive(Clone, Debug, Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<WorkflowId, BTreeMap<u32, Arc<WorkflowDefinition>>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from everything a loader returns
    pub fn from_loader(loader: &dyn DefinitionLoader) -> EngineResult<Self> {
        let mut registry = Self::new();
        for definition in loader.load()? {
            registry.publish(definition)?;
        }
        Ok(registry)
    }

    /// Register a definition. A `(workflow_id, version)` pair can only be
    /// registered once.
    pub fn publish(
        &mut self,
        definition: WorkflowDefinition,
    ) -> WorkflowResult<Arc<WorkflowDefinition>> {
        let workflow_id = definition.workflow_id().clone();
        let version = definition.version();
        let versions = self.definitions.entry(workflow_id.clone()).or_default();
        if versions.contains_key(&version) {
            return Err(WorkflowError::DuplicateDefinition {
                workflow_id,
                version,
            });
        }

        let definition = Arc::new(definition);
        versions.insert(version, Arc::clone(&definition));
        tracing::info!(
            workflow_id = %workflow_id,
            version,
            effective_date = %definition.effective_date(),
            "Workflow definition registered"
        );
        Ok(definition)
    }

    /// Latest version of `workflow_id` effective at `reference_date`.
    ///
    /// Versions effective only in the future are ignored.
    pub fn resolve(
        &self,
        workflow_id: &WorkflowId,
        reference_date: DateTime<Utc>,
    ) -> WorkflowResult<Arc<WorkflowDefinition>> {
        self.definitions
            .get(workflow_id)
            .and_then(|versions| {
                versions
                    .values()
                    .rev()
                    .find(|def| def.effective_date() <= reference_date)
            })
            .cloned()
            .ok_or_else(|| WorkflowError::DefinitionNotFound {
                workflow_id: workflow_id.clone(),
                version: None,
            })
    }

    /// Exact version lookup, regardless of effective date
    pub fn resolve_version(
        &self,
        workflow_id: &WorkflowId,
        version: u32,
    ) -> WorkflowResult<Arc<WorkflowDefinition>> {
        self.definitions
            .get(workflow_id)
            .and_then(|versions| versions.get(&version))
            .cloned()
            .ok_or_else(|| WorkflowError::DefinitionNotFound {
                workflow_id: workflow_id.clone(),
                version: Some(version),
            })
    }

    /// Registered versions of a workflow, ascending
    pub fn versions(&self, workflow_id: &WorkflowId) -> Vec<u32> {
        self.definitions
            .get(workflow_id)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn workflow_ids(&self) -> Vec<&WorkflowId> {
        let mut ids: Vec<_> = self.definitions.keys().collect();
        ids.sort();
        ids
    }

    /// Total number of registered definitions
    pub fn count(&self) -> usize {
        self.definitions.values().map(BTreeMap::len).sum()
    }
}

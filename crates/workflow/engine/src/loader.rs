//! Definition loader port
//!
//! A loader materializes every stored definition with its condition
//! strategies already resolved. The registry is built from whatever a
//! loader returns.

use std::fs;
use std::path::PathBuf;

use laneflow_types::{ConditionRegistry, DefinitionDocument, WorkflowDefinition};

use crate::EngineResult;

pub trait DefinitionLoader: Send + Sync {
    fn load(&self) -> EngineResult<Vec<WorkflowDefinition>>;
}

/// Serves a fixed list of already-built definitions
#[derive(Debug, Clone, Default)]
pub struct StaticDefinitionLoader {
    definitions: Vec<WorkflowDefinition>,
}

impl StaticDefinitionLoader {
    pub fn new(definitions: Vec<WorkflowDefinition>) -> Self {
        Self { definitions }
    }

    pub fn with_definition(mut self, definition: WorkflowDefinition) -> Self {
        self.definitions.push(definition);
        self
    }
}

impl DefinitionLoader for StaticDefinitionLoader {
    fn load(&self) -> EngineResult<Vec<WorkflowDefinition>> {
        Ok(self.definitions.clone())
    }
}

#[derive(Debug, Clone)]
enum JsonSource {
    Inline(String),
    Directory(PathBuf),
}

/// Compiles JSON [`DefinitionDocument`]s through a [`ConditionRegistry`].
///
/// Sources are inline strings or directories; a directory contributes
/// every `*.json` file in it, in file-name order.
#[derive(Debug, Clone, Default)]
pub struct JsonDefinitionLoader {
    conditions: ConditionRegistry,
    sources: Vec<JsonSource>,
}

impl JsonDefinitionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom condition registry instead of the builtins
    pub fn with_conditions(mut self, conditions: ConditionRegistry) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_document(mut self, json: impl Into<String>) -> Self {
        self.sources.push(JsonSource::Inline(json.into()));
        self
    }

    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sources.push(JsonSource::Directory(dir.into()));
        self
    }

    fn compile(&self, json: &str) -> EngineResult<WorkflowDefinition> {
        let document = DefinitionDocument::from_json(json)?;
        Ok(document.compile(&self.conditions)?)
    }
}

impl DefinitionLoader for JsonDefinitionLoader {
    fn load(&self) -> EngineResult<Vec<WorkflowDefinition>> {
        let mut definitions = Vec::new();
        for source in &self.sources {
            match source {
                JsonSource::Inline(json) => definitions.push(self.compile(json)?),
                JsonSource::Directory(dir) => {
                    let mut paths = Vec::new();
                    for entry in fs::read_dir(dir)? {
                        let path = entry?.path();
                        if path.extension().is_some_and(|ext| ext == "json") {
                            paths.push(path);
                        }
                    }
                    paths.sort();
                    for path in paths {
                        tracing::debug!(path = %path.display(), "Loading workflow definition");
                        let json = fs::read_to_string(&path)?;
                        definitions.push(self.compile(&json)?);
                    }
                }
            }
        }
        Ok(definitions)
    }
}

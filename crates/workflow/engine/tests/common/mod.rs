//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use laneflow_engine::{DefinitionRegistry, InMemoryWorkflowStore, WorkflowEngine};
use laneflow_types::{
    BoundaryEvent, CompletionCondition, Event, Gateway, Lane, MultiInstanceType, ParamEquals,
    Parameters, SequenceFlow, Task, UserId, WorkflowDefinition,
};

pub fn params(pairs: &[(&str, &str)]) -> Parameters {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn users(names: &[&str]) -> Vec<UserId> {
    names.iter().map(|n| UserId::new(*n)).collect()
}

pub fn single_task(id: &str) -> Task {
    Task::new(id, id, MultiInstanceType::None, None).unwrap()
}

/// `WF`: start -> t1 -> g1 -(p=1)-> t2 -> end, g1 -(else)-> end
pub fn scenario_definition(version: u32) -> WorkflowDefinition {
    WorkflowDefinition::builder("WF", version)
        .lane(Lane::new("clerks", "Clerks"))
        .node(Event::start("start"))
        .node(single_task("t1").in_lane("clerks"))
        .node(Gateway::exclusive("g1", "Route"))
        .node(single_task("t2").in_lane("clerks"))
        .node(Event::terminate("end"))
        .flow(SequenceFlow::new("f1", "start", "t1"))
        .flow(SequenceFlow::new("f2", "t1", "g1"))
        .flow(
            SequenceFlow::new("f3", "g1", "t2")
                .with_condition(Arc::new(ParamEquals::new("p", "1"))),
        )
        .flow(SequenceFlow::new("f4", "g1", "end"))
        .flow(SequenceFlow::new("f5", "t2", "end"))
        .build()
        .unwrap()
}

/// `MULTI`: start -> vote (multi-instance) -> review -> end, with a
/// `cancel` boundary event on vote leading to end
pub fn multi_definition(
    multi_instance: MultiInstanceType,
    completion: Option<Arc<dyn CompletionCondition>>,
) -> WorkflowDefinition {
    WorkflowDefinition::builder("MULTI", 1)
        .lane(Lane::new("board", "Board"))
        .lane(Lane::new("office", "Office"))
        .lane(Lane::new("empty", "Nobody"))
        .node(Event::start("start"))
        .node(
            Task::new("vote", "Vote", multi_instance, completion)
                .unwrap()
                .in_lane("board"),
        )
        .node(single_task("review").in_lane("office"))
        .node(BoundaryEvent::new("b_cancel", "Cancelled", "cancel", "Cancel vote", "vote"))
        .node(Event::terminate("end"))
        .flow(SequenceFlow::new("f1", "start", "vote"))
        .flow(SequenceFlow::new("f2", "vote", "review"))
        .flow(SequenceFlow::new("f3", "review", "end"))
        .flow(SequenceFlow::new("f4", "b_cancel", "end"))
        .build()
        .unwrap()
}

pub fn engine_with(definitions: Vec<WorkflowDefinition>) -> WorkflowEngine {
    let mut registry = DefinitionRegistry::new();
    for definition in definitions {
        registry.publish(definition).unwrap();
    }
    WorkflowEngine::new(Arc::new(InMemoryWorkflowStore::new()), registry)
}

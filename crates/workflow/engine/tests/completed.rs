//! A finished instance has no rows left; lookups return the completed
//! handle and every operation follows its fixed table

mod common;

use common::{engine_with, params, scenario_definition, users};
use laneflow_engine::{EngineError, InstanceHandle};
use laneflow_types::{GroupId, LaneId, NodeId, Parameters, TriggerId, UserId, WorkflowId};

fn completed_instance(engine: &laneflow_engine::WorkflowEngine) -> InstanceHandle<'_> {
    let instance = engine.start(&WorkflowId::new("WF"), &Parameters::new()).unwrap();
    instance
        .assign_users(&NodeId::new("t1"), users(&["u1"]))
        .unwrap();
    instance
        .complete_user_task(&params(&[("p", "2")]), None)
        .unwrap();
    engine.find(instance.instance_id()).unwrap()
}

fn assert_already_completed<T: std::fmt::Debug>(result: Result<T, EngineError>) {
    match result {
        Err(EngineError::AlreadyCompleted(_)) => {}
        other => panic!("expected AlreadyCompleted, got {other:?}"),
    }
}

#[test]
fn test_reads_degrade_gracefully() {
    let engine = engine_with(vec![scenario_definition(1)]);
    let handle = completed_instance(&engine);
    let t1 = NodeId::new("t1");

    assert!(matches!(handle, InstanceHandle::Completed(_)));
    assert!(handle.is_completed().unwrap());
    assert!(!handle.is_active(&t1).unwrap());
    assert!(!handle.is_active(&NodeId::new("end")).unwrap());
    assert_eq!(handle.active_node_id().unwrap(), None);
    assert!(!handle.has_active_user_task(&t1, &UserId::new("u1")).unwrap());
    assert!(!handle.has_active_group_task(&t1, &GroupId::new("g")).unwrap());
    assert_eq!(handle.assigned_users(&NodeId::new("x")).unwrap(), vec![]);
    assert!(handle.assigned_groups(&t1).unwrap().is_empty());
    assert!(handle.active_users(&t1).unwrap().is_empty());
}

#[test]
fn test_mutators_fail_already_completed() {
    let engine = engine_with(vec![scenario_definition(1)]);
    let handle = completed_instance(&engine);
    let t1 = NodeId::new("t1");
    let lane = LaneId::new("clerks");
    let u = UserId::new("u1");
    let g = GroupId::new("g1");
    let p = Parameters::new();

    assert_already_completed(handle.complete_user_task(&p, None));
    assert_already_completed(handle.complete_group_task(&p, None));
    assert_already_completed(handle.trigger_event(&TriggerId::new("t"), &p));
    assert_already_completed(handle.assign_users(&t1, vec![u.clone()]));
    assert_already_completed(handle.assign_groups(&t1, vec![g.clone()]));
    assert_already_completed(handle.assign_users_to_lane(&lane, vec![u.clone()]));
    assert_already_completed(handle.assign_user_to_lane(&lane, u.clone()));
    assert_already_completed(handle.assign_groups_to_lane(&lane, vec![g.clone()]));
    assert_already_completed(handle.change_assigned_user(&t1, &u, UserId::new("v")));
    assert_already_completed(handle.change_assigned_group(&t1, &g, GroupId::new("h")));
}

#[test]
fn test_definition_queries_unsupported() {
    let engine = engine_with(vec![scenario_definition(1)]);
    let handle = completed_instance(&engine);

    let err = handle.version().unwrap_err();
    assert!(matches!(err, EngineError::Unsupported { operation: "version", .. }));
    let err = handle.workflow_id().unwrap_err();
    assert!(matches!(err, EngineError::Unsupported { operation: "workflow_id", .. }));

    let mutator_err = handle.complete_user_task(&Parameters::new(), None).unwrap_err();
    assert_ne!(err.to_string(), mutator_err.to_string());
}

#[test]
fn test_unknown_id_is_completed() {
    let engine = engine_with(vec![scenario_definition(1)]);
    let handle = engine
        .find(&laneflow_types::WorkflowInstanceId::new("never-existed"))
        .unwrap();
    assert!(handle.is_completed().unwrap());
    assert_eq!(handle.instance_id().as_str(), "never-existed");
}

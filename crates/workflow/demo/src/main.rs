#![deny(unsafe_code)]
//! Laneflow demo binary.
//!
//! Loads a document review process from JSON and walks two instances
//! through it against the in-memory store:
//! 1. draft, board vote (two of three), sequential sign-off
//! 2. draft, board vote, then the author withdraws
//!
//! Set `RUST_LOG=laneflow_engine=debug` to watch traversal hops.

use std::sync::Arc;

use laneflow_engine::{
    DefinitionRegistry, InMemoryWorkflowStore, InstanceHandle, JsonDefinitionLoader, Transition,
    WorkflowEngine,
};
use laneflow_types::{LaneId, NodeId, Parameters, TriggerId, UserId, WorkflowId};
use tracing_subscriber::EnvFilter;

const REVIEW_DEFINITION: &str = include_str!("../definitions/review.json");

// ── Formatting Helpers ──────────────────────────────────────────────

fn section(title: &str) {
    println!();
    println!(" ── {} {}", title, "─".repeat(56usize.saturating_sub(title.len())));
}

fn ok(msg: &str) {
    println!("   [OK]  {}", msg);
}

fn info(msg: &str) {
    println!("   [--]  {}", msg);
}

fn describe(transition: &Transition) -> String {
    match transition {
        Transition::Stayed => "stayed on current task".to_string(),
        Transition::Advanced { node_id } => format!("advanced to '{}'", node_id),
        Transition::Completed => "instance completed".to_string(),
    }
}

fn users(names: &[&str]) -> Vec<UserId> {
    names.iter().map(|n| UserId::new(*n)).collect()
}

fn params(pairs: &[(&str, &str)]) -> Parameters {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ── Main ────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run_demo() {
        eprintln!();
        eprintln!("   [FATAL]  Demo failed: {}", e);
        std::process::exit(1);
    }

    println!();
    println!("  Demo complete.");
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    section("Loading definitions");
    let loader = JsonDefinitionLoader::new().with_document(REVIEW_DEFINITION);
    let registry = DefinitionRegistry::from_loader(&loader)?;
    ok(&format!("{} definition(s) registered", registry.count()));

    let engine = WorkflowEngine::new(Arc::new(InMemoryWorkflowStore::new()), registry);
    let review = WorkflowId::new("REVIEW");

    section("Instance 1: vote and sign");
    let instance = engine.start(&review, &Parameters::new())?;
    ok(&format!("started {}", instance.instance_id()));
    run_to_completion(&engine, &instance)?;

    section("Instance 2: withdrawn during vote");
    let instance = engine.start(&review, &Parameters::new())?;
    ok(&format!("started {}", instance.instance_id()));
    instance.assign_user_to_lane(&LaneId::new("authors"), UserId::new("ada"))?;
    instance.assign_users_to_lane(&LaneId::new("board"), users(&["bo", "cy", "di"]))?;

    let step = instance.complete_user_task(&params(&[("board", "yes")]), None)?;
    info(&format!("draft: {}", describe(&step)));
    let step = instance.trigger_event(&TriggerId::new("WITHDRAW"), &Parameters::new())?;
    info(&format!("withdraw: {}", describe(&step)));

    let found = engine.find(instance.instance_id())?;
    ok(&format!("completed = {}", found.is_completed()?));
    Ok(())
}

fn run_to_completion(
    engine: &WorkflowEngine,
    instance: &InstanceHandle<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    instance.assign_user_to_lane(&LaneId::new("authors"), UserId::new("ada"))?;
    instance.assign_users_to_lane(&LaneId::new("board"), users(&["bo", "cy", "di"]))?;
    instance.assign_users(&NodeId::new("sign"), users(&["ed", "fay"]))?;

    let ada = UserId::new("ada");
    let step = instance.complete_user_task(&params(&[("board", "yes")]), Some(&ada))?;
    info(&format!("draft by ada: {}", describe(&step)));

    for voter in ["bo", "cy"] {
        let voter = UserId::new(voter);
        let step = instance.complete_user_task(&Parameters::new(), Some(&voter))?;
        info(&format!("vote by {}: {}", voter, describe(&step)));
    }

    for signer in ["ed", "fay"] {
        let active = instance.active_users(&NodeId::new("sign"))?;
        info(&format!("active signers: {:?}", active));
        let signer = UserId::new(signer);
        let step = instance.complete_user_task(&Parameters::new(), Some(&signer))?;
        info(&format!("sign by {}: {}", signer, describe(&step)));
    }

    let found = engine.find(instance.instance_id())?;
    ok(&format!("completed = {}", found.is_completed()?));
    Ok(())
}

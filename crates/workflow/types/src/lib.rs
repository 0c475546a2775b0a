//! Process graph types for Laneflow
//!
//! Laneflow runs BPM-style processes: static graphs of tasks, exclusive
//! gateways, start/terminate events and interrupting boundary events.
//! This crate holds the immutable side of that model. The engine crate
//! holds everything that changes at run time.
//!
//! # Key Concepts
//!
//! - **WorkflowDefinition**: one validated `(workflow_id, version)` snapshot
//!   of lanes, flow nodes and sequence flows.
//! - **FlowNode**: a closed union of Task, Gateway, Event and BoundaryEvent.
//! - **SequenceFlow**: a directed edge, optionally guarded by a
//!   [`FlowCondition`].
//! - **CompletionCondition**: decides when a multi-instance task is done.
//! - **ConditionRegistry**: maps strategy names such as
//!   `OrCompletionCondition(2)` to factories, resolved at load time.
//! - **RosterEntry**: a user or group with its execution order.
//! - **DefinitionDocument**: the serde form of a definition.

#![deny(unsafe_code)]

mod condition;
mod definition;
mod document;
mod edge;
mod errors;
mod instance;
mod node;
mod participant;

pub use condition::*;
pub use definition::*;
pub use document::*;
pub use edge::*;
pub use errors::*;
pub use instance::*;
pub use node::*;
pub use participant::*;

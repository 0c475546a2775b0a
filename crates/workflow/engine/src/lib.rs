//! Laneflow execution engine
//!
//! Advances persisted workflow instances one step at a time: a participant
//! completes a task, an external trigger fires a boundary event, or a
//! roster changes. All instance state lives behind the [`WorkflowStore`]
//! port; the engine itself only holds immutable definitions.
//!
//! # Architecture
//!
//! - [`DefinitionRegistry`]: resolves a definition by exact version or by
//!   latest effective version
//! - [`traversal`]: walks through gateways to the next Task or Event
//! - [`WorkflowEngine`]: starts and finds instances, worklists
//! - [`InstanceHandle`]: the Live / Completed instance facade
//! - Ports: [`WorkflowStore`] (with its [`UnitOfWork`] boundary),
//!   [`DefinitionLoader`], [`IdGenerator`], [`Clock`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use laneflow_engine::{DefinitionRegistry, InMemoryWorkflowStore, Transition, WorkflowEngine};
//! use laneflow_types::*;
//!
//! let definition = WorkflowDefinition::builder("Review", 1)
//!     .node(Event::start("start"))
//!     .node(Task::new("review", "Review", MultiInstanceType::None, None).unwrap())
//!     .node(Event::terminate("end"))
//!     .flow(SequenceFlow::new("f1", "start", "review"))
//!     .flow(SequenceFlow::new("f2", "review", "end"))
//!     .build()
//!     .unwrap();
//!
//! let mut registry = DefinitionRegistry::new();
//! registry.publish(definition).unwrap();
//! let engine = WorkflowEngine::new(Arc::new(InMemoryWorkflowStore::new()), registry);
//!
//! let params = Parameters::new();
//! let instance = engine.start(&WorkflowId::new("Review"), &params).unwrap();
//! instance
//!     .assign_users(&NodeId::new("review"), vec![UserId::new("alice")])
//!     .unwrap();
//!
//! let alice = UserId::new("alice");
//! let transition = instance.complete_user_task(&params, Some(&alice)).unwrap();
//! assert_eq!(transition, Transition::Completed);
//! assert!(engine.find(instance.instance_id()).unwrap().is_completed().unwrap());
//! ```

#![deny(unsafe_code)]

mod activation;
mod clock;
mod config;
mod engine;
mod error;
mod id_generator;
mod instance;
mod loader;
mod registry;
mod store;
pub mod traversal;

pub use activation::Transition;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::WorkflowEngine;
pub use error::{EngineError, EngineResult};
pub use id_generator::{IdGenerator, SequenceIdGenerator, UuidIdGenerator};
pub use instance::{CompletedInstance, InstanceHandle, LiveInstance};
pub use loader::{DefinitionLoader, JsonDefinitionLoader, StaticDefinitionLoader};
pub use registry::DefinitionRegistry;
pub use store::{
    ActiveEntry, ActivityStore, AssignmentStore, InMemoryWorkflowStore, InstanceStore,
    StoreError, StoreResult, UnitOfWork, WorkflowStore,
};

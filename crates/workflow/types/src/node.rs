//! Flow nodes: the vertices of a process graph
//!
//! A flow node is one of four closed variants. Traversal dispatches on the
//! variant instead of on overridden behaviour, so the rule "gateways are
//! transparent, everything else is a landing point" lives in one place.

use crate::{
    AllCompletionCondition, CompletionCondition, LaneId, NodeId, SingleCompletionCondition,
    WorkflowError, WorkflowResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of an external trigger a boundary event listens for
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub String);

impl TriggerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Shared header ────────────────────────────────────────────────────

/// Fields every flow node carries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeHeader {
    pub id: NodeId,
    pub name: String,
    pub lane_id: Option<LaneId>,
}

impl NodeHeader {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.into(),
            lane_id: None,
        }
    }
}

// ── Flow node ────────────────────────────────────────────────────────

/// A vertex of the process graph
#[derive(Clone, Debug)]
pub enum FlowNode {
    Task(Task),
    Gateway(Gateway),
    Event(Event),
    BoundaryEvent(BoundaryEvent),
}

impl FlowNode {
    pub fn header(&self) -> &NodeHeader {
        match self {
            FlowNode::Task(t) => &t.header,
            FlowNode::Gateway(g) => &g.header,
            FlowNode::Event(e) => &e.header,
            FlowNode::BoundaryEvent(b) => &b.header,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.header().id
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            FlowNode::Task(t) => Some(t),
            _ => None,
        }
    }

    /// Gateways are never persisted as the active node
    pub fn is_gateway(&self) -> bool {
        matches!(self, FlowNode::Gateway(_))
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, FlowNode::Event(e) if e.event_type == EventType::Terminate)
    }

    /// Short variant label used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            FlowNode::Task(_) => "task",
            FlowNode::Gateway(_) => "gateway",
            FlowNode::Event(e) => match e.event_type {
                EventType::Start => "start event",
                EventType::Terminate => "terminate event",
            },
            FlowNode::BoundaryEvent(_) => "boundary event",
        }
    }
}

impl From<Task> for FlowNode {
    fn from(task: Task) -> Self {
        FlowNode::Task(task)
    }
}

impl From<Gateway> for FlowNode {
    fn from(gateway: Gateway) -> Self {
        FlowNode::Gateway(gateway)
    }
}

impl From<Event> for FlowNode {
    fn from(event: Event) -> Self {
        FlowNode::Event(event)
    }
}

impl From<BoundaryEvent> for FlowNode {
    fn from(event: BoundaryEvent) -> Self {
        FlowNode::BoundaryEvent(event)
    }
}

// ── Task ─────────────────────────────────────────────────────────────

/// How many participants a task runs with, and in which order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultiInstanceType {
    /// A single participant
    #[default]
    None,
    /// Participants act one after another, in execution order
    Sequential,
    /// All participants are active at once
    Parallel,
}

impl MultiInstanceType {
    pub fn is_multi_instance(self) -> bool {
        !matches!(self, MultiInstanceType::None)
    }
}

/// An interactive node worked by users or groups
#[derive(Clone, Debug)]
pub struct Task {
    pub header: NodeHeader,
    pub multi_instance: MultiInstanceType,
    completion: Arc<dyn CompletionCondition>,
}

impl Task {
    /// Create a task.
    ///
    /// Non-multi-instance tasks always complete once their participant acts
    /// and reject an explicit completion condition. Multi-instance tasks
    /// default to [`AllCompletionCondition`].
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        multi_instance: MultiInstanceType,
        completion: Option<Arc<dyn CompletionCondition>>,
    ) -> WorkflowResult<Self> {
        let header = NodeHeader::new(id, name);
        let completion: Arc<dyn CompletionCondition> = match (multi_instance, completion) {
            (MultiInstanceType::None, Some(_)) => {
                return Err(WorkflowError::CompletionConditionNotAllowed(header.id));
            }
            (MultiInstanceType::None, None) => Arc::new(SingleCompletionCondition),
            (_, Some(condition)) => condition,
            (_, None) => Arc::new(AllCompletionCondition),
        };
        Ok(Self {
            header,
            multi_instance,
            completion,
        })
    }

    pub fn in_lane(mut self, lane_id: impl Into<String>) -> Self {
        self.header.lane_id = Some(LaneId::new(lane_id));
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.header.id
    }

    pub fn completion_condition(&self) -> &dyn CompletionCondition {
        self.completion.as_ref()
    }

    pub fn is_sequential(&self) -> bool {
        self.multi_instance == MultiInstanceType::Sequential
    }
}

// ── Gateway ──────────────────────────────────────────────────────────

/// Gateway routing semantics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayType {
    /// First outgoing flow (in load order) whose condition accepts wins
    #[default]
    Exclusive,
}

/// A non-interactive branching node
#[derive(Clone, Debug)]
pub struct Gateway {
    pub header: NodeHeader,
    pub gateway_type: GatewayType,
}

impl Gateway {
    pub fn exclusive(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            header: NodeHeader::new(id, name),
            gateway_type: GatewayType::Exclusive,
        }
    }

    pub fn in_lane(mut self, lane_id: impl Into<String>) -> Self {
        self.header.lane_id = Some(LaneId::new(lane_id));
        self
    }
}

// ── Event ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Start,
    /// Activating a terminate event finishes (deletes) the instance
    Terminate,
}

#[derive(Clone, Debug)]
pub struct Event {
    pub header: NodeHeader,
    pub event_type: EventType,
}

impl Event {
    pub fn new(id: impl Into<String>, name: impl Into<String>, event_type: EventType) -> Self {
        Self {
            header: NodeHeader::new(id, name),
            event_type,
        }
    }

    pub fn start(id: impl Into<String>) -> Self {
        Self::new(id, "Start", EventType::Start)
    }

    pub fn terminate(id: impl Into<String>) -> Self {
        Self::new(id, "End", EventType::Terminate)
    }

    pub fn in_lane(mut self, lane_id: impl Into<String>) -> Self {
        self.header.lane_id = Some(LaneId::new(lane_id));
        self
    }
}

// ── Boundary event ───────────────────────────────────────────────────

/// An externally triggerable event attached to a task.
///
/// Reachable only while its task is the active node. Triggering it
/// abandons the task's remaining work and continues along the boundary
/// event's own outgoing flow.
#[derive(Clone, Debug)]
pub struct BoundaryEvent {
    pub header: NodeHeader,
    pub trigger_id: TriggerId,
    pub trigger_name: String,
    pub attached_task_id: NodeId,
}

impl BoundaryEvent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        trigger_id: impl Into<String>,
        trigger_name: impl Into<String>,
        attached_task_id: impl Into<String>,
    ) -> Self {
        Self {
            header: NodeHeader::new(id, name),
            trigger_id: TriggerId::new(trigger_id),
            trigger_name: trigger_name.into(),
            attached_task_id: NodeId::new(attached_task_id),
        }
    }
}

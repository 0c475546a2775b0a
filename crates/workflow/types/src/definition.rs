//! Workflow definitions: immutable snapshots of a process graph
//!
//! A WorkflowDefinition is one `(workflow_id, version)` pair holding the
//! lanes, flow nodes and sequence flows of a process. Definitions are
//! validated when built and never change afterwards. To change a process,
//! publish a new version.

use crate::{
    BoundaryEvent, Event, EventType, FlowNode, Gateway, SequenceFlow, Task, TriggerId,
    WorkflowError, WorkflowResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── Identifiers ──────────────────────────────────────────────────────

/// Identifier of a workflow (shared by all of its versions)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a flow node, unique within one definition snapshot
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a sequence flow
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub String);

impl FlowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a lane
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneId(pub String);

impl LaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for LaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Lane ─────────────────────────────────────────────────────────────

/// A grouping label on flow nodes, used for bulk assignment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneId,
    pub name: String,
}

impl Lane {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: LaneId::new(id),
            name: name.into(),
        }
    }
}

// ── Workflow Definition ──────────────────────────────────────────────

/// An immutable snapshot of one workflow version
#[derive(Clone, Debug)]
pub struct WorkflowDefinition {
    workflow_id: WorkflowId,
    version: u32,
    name: String,
    effective_date: DateTime<Utc>,
    lanes: Vec<Lane>,
    nodes: Vec<FlowNode>,
    sequence_flows: Vec<SequenceFlow>,
    node_index: HashMap<NodeId, usize>,
}

impl WorkflowDefinition {
    pub fn builder(workflow_id: impl Into<String>, version: u32) -> DefinitionBuilder {
        DefinitionBuilder::new(workflow_id, version)
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn effective_date(&self) -> DateTime<Utc> {
        self.effective_date
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// All flow nodes in load order
    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    /// All sequence flows in load order
    pub fn sequence_flows(&self) -> &[SequenceFlow] {
        &self.sequence_flows
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.nodes.iter().filter_map(FlowNode::as_task)
    }

    pub fn gateways(&self) -> impl Iterator<Item = &Gateway> {
        self.nodes.iter().filter_map(|n| match n {
            FlowNode::Gateway(g) => Some(g),
            _ => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.nodes.iter().filter_map(|n| match n {
            FlowNode::Event(e) => Some(e),
            _ => None,
        })
    }

    pub fn boundary_events(&self) -> impl Iterator<Item = &BoundaryEvent> {
        self.nodes.iter().filter_map(|n| match n {
            FlowNode::BoundaryEvent(b) => Some(b),
            _ => None,
        })
    }

    /// The single START event
    pub fn start_event(&self) -> WorkflowResult<&Event> {
        self.events()
            .find(|e| e.event_type == EventType::Start)
            .ok_or_else(|| WorkflowError::NoStartEvent(self.workflow_id.clone()))
    }

    /// Get a node of any variant by id
    pub fn node(&self, id: &NodeId) -> WorkflowResult<&FlowNode> {
        self.node_index
            .get(id)
            .map(|&idx| &self.nodes[idx])
            .ok_or_else(|| WorkflowError::NodeNotFound(id.clone()))
    }

    /// Get a task by id; other variants are reported as missing tasks
    pub fn task(&self, id: &NodeId) -> WorkflowResult<&Task> {
        self.node_index
            .get(id)
            .and_then(|&idx| self.nodes[idx].as_task())
            .ok_or_else(|| WorkflowError::TaskNotFound(id.clone()))
    }

    /// Tasks belonging to a lane, in load order
    pub fn tasks_in_lane<'a>(
        &'a self,
        lane_id: &'a crate::LaneId,
    ) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks()
            .filter(move |t| t.header.lane_id.as_ref() == Some(lane_id))
    }

    /// Outgoing flows of a node, in load order
    pub fn outgoing_flows(&self, node_id: &NodeId) -> Vec<&SequenceFlow> {
        self.sequence_flows
            .iter()
            .filter(|f| &f.source_id == node_id)
            .collect()
    }

    /// Boundary events attached to a task
    pub fn boundary_events_for<'a>(
        &'a self,
        task_id: &'a NodeId,
    ) -> impl Iterator<Item = &'a BoundaryEvent> + 'a {
        self.boundary_events()
            .filter(move |b| &b.attached_task_id == task_id)
    }

    /// Boundary event attached to `task_id` listening for `trigger_id`.
    ///
    /// The result borrows only the definition, not the lookup keys.
    pub fn boundary_event_for_trigger(
        &self,
        task_id: &NodeId,
        trigger_id: &TriggerId,
    ) -> Option<&BoundaryEvent> {
        self.boundary_events()
            .find(|b| &b.attached_task_id == task_id && &b.trigger_id == trigger_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn flow_count(&self) -> usize {
        self.sequence_flows.len()
    }
}

// ── Builder ──────────────────────────────────────────────────────────

/// Assembles and validates a [`WorkflowDefinition`]
#[derive(Debug)]
pub struct DefinitionBuilder {
    workflow_id: WorkflowId,
    version: u32,
    name: String,
    effective_date: DateTime<Utc>,
    lanes: Vec<Lane>,
    nodes: Vec<FlowNode>,
    sequence_flows: Vec<SequenceFlow>,
}

impl DefinitionBuilder {
    pub fn new(workflow_id: impl Into<String>, version: u32) -> Self {
        let workflow_id = WorkflowId::new(workflow_id);
        Self {
            name: workflow_id.0.clone(),
            workflow_id,
            version,
            effective_date: DateTime::<Utc>::MIN_UTC,
            lanes: Vec::new(),
            nodes: Vec::new(),
            sequence_flows: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn effective_date(mut self, date: DateTime<Utc>) -> Self {
        self.effective_date = date;
        self
    }

    pub fn lane(mut self, lane: Lane) -> Self {
        self.lanes.push(lane);
        self
    }

    pub fn node(mut self, node: impl Into<FlowNode>) -> Self {
        self.nodes.push(node.into());
        self
    }

    pub fn flow(mut self, flow: SequenceFlow) -> Self {
        self.sequence_flows.push(flow);
        self
    }

    /// Validate the graph and freeze it into a definition
    pub fn build(self) -> WorkflowResult<WorkflowDefinition> {
        let mut node_index = HashMap::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            if node_index.insert(node.id().clone(), idx).is_some() {
                return Err(WorkflowError::DuplicateNodeId(node.id().clone()));
            }
        }

        let start_count = self
            .nodes
            .iter()
            .filter(|n| matches!(n, FlowNode::Event(e) if e.event_type == EventType::Start))
            .count();
        match start_count {
            0 => return Err(WorkflowError::NoStartEvent(self.workflow_id)),
            1 => {}
            count => {
                return Err(WorkflowError::MultipleStartEvents {
                    workflow_id: self.workflow_id,
                    count,
                })
            }
        }

        let mut flow_ids = HashSet::new();
        for flow in &self.sequence_flows {
            if !flow_ids.insert(&flow.id) {
                return Err(WorkflowError::DuplicateFlowId(flow.id.clone()));
            }
            if !node_index.contains_key(&flow.source_id) {
                return Err(WorkflowError::NodeNotFound(flow.source_id.clone()));
            }
            let target = node_index
                .get(&flow.target_id)
                .map(|&idx| &self.nodes[idx])
                .ok_or_else(|| WorkflowError::NodeNotFound(flow.target_id.clone()))?;
            // Start events and boundary events are entered only by the engine
            match target {
                FlowNode::Event(e) if e.event_type == EventType::Start => {
                    return Err(WorkflowError::IncomingFlowNotAllowed(e.header.id.clone()));
                }
                FlowNode::BoundaryEvent(b) => {
                    return Err(WorkflowError::IncomingFlowNotAllowed(b.header.id.clone()));
                }
                _ => {}
            }
        }

        for boundary in self.nodes.iter().filter_map(|n| match n {
            FlowNode::BoundaryEvent(b) => Some(b),
            _ => None,
        }) {
            let attached = node_index
                .get(&boundary.attached_task_id)
                .map(|&idx| &self.nodes[idx]);
            if !matches!(attached, Some(FlowNode::Task(_))) {
                return Err(WorkflowError::BoundaryTaskNotFound {
                    boundary_id: boundary.header.id.clone(),
                    task_id: boundary.attached_task_id.clone(),
                });
            }
        }

        let lane_ids: HashSet<_> = self.lanes.iter().map(|l| &l.id).collect();
        for node in &self.nodes {
            if let Some(lane_id) = &node.header().lane_id {
                if !lane_ids.contains(lane_id) {
                    return Err(WorkflowError::ValidationError(format!(
                        "Node '{}' references unknown lane '{}'",
                        node.id(),
                        lane_id
                    )));
                }
            }
        }

        Ok(WorkflowDefinition {
            workflow_id: self.workflow_id,
            version: self.version,
            name: self.name,
            effective_date: self.effective_date,
            lanes: self.lanes,
            nodes: self.nodes,
            sequence_flows: self.sequence_flows,
            node_index,
        })
    }
}

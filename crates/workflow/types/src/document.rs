//! Definition documents: the serialized form of a workflow definition
//!
//! Documents are plain serde data with condition strategies written as
//! `"Name(arg1,arg2)"` strings. [`DefinitionDocument::compile`] resolves
//! every strategy through a [`ConditionRegistry`] and validates the graph,
//! so a definition that compiles never fails on an unknown strategy later.

use crate::{
    BoundaryEvent, ConditionRegistry, Event, EventType, Gateway, GatewayType, Lane,
    MultiInstanceType, SequenceFlow, Task, WorkflowDefinition, WorkflowResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefinitionDocument {
    pub workflow_id: String,
    pub version: u32,
    #[serde(default)]
    pub name: String,
    /// Absent means effective from the beginning of time
    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lanes: Vec<LaneDocument>,
    #[serde(default)]
    pub tasks: Vec<TaskDocument>,
    #[serde(default)]
    pub gateways: Vec<GatewayDocument>,
    #[serde(default)]
    pub events: Vec<EventDocument>,
    #[serde(default)]
    pub boundary_events: Vec<BoundaryEventDocument>,
    /// Load order is significant: gateways try their flows in this order
    #[serde(default)]
    pub sequence_flows: Vec<SequenceFlowDocument>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lane_id: Option<String>,
    #[serde(default)]
    pub multi_instance_type: MultiInstanceType,
    #[serde(default)]
    pub completion_condition: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lane_id: Option<String>,
    #[serde(default)]
    pub gateway_type: GatewayType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lane_id: Option<String>,
    pub event_type: EventType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEventDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lane_id: Option<String>,
    pub trigger_id: String,
    #[serde(default)]
    pub trigger_name: String,
    pub attached_task_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceFlowDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub condition: Option<String>,
}

impl DefinitionDocument {
    /// Resolve condition strategies and build a validated definition
    pub fn compile(&self, registry: &ConditionRegistry) -> WorkflowResult<WorkflowDefinition> {
        let mut builder = WorkflowDefinition::builder(self.workflow_id.clone(), self.version);
        if !self.name.is_empty() {
            builder = builder.name(self.name.clone());
        }
        if let Some(date) = self.effective_date {
            builder = builder.effective_date(date);
        }

        for lane in &self.lanes {
            builder = builder.lane(Lane::new(lane.id.clone(), lane.name.clone()));
        }

        for doc in &self.tasks {
            let completion = doc
                .completion_condition
                .as_deref()
                .map(|raw| registry.parse_completion(raw))
                .transpose()?;
            let mut task = Task::new(
                doc.id.clone(),
                doc.name.clone(),
                doc.multi_instance_type,
                completion,
            )?;
            if let Some(lane_id) = &doc.lane_id {
                task = task.in_lane(lane_id.clone());
            }
            builder = builder.node(task);
        }

        for doc in &self.gateways {
            let mut gateway = Gateway::exclusive(doc.id.clone(), doc.name.clone());
            gateway.gateway_type = doc.gateway_type;
            if let Some(lane_id) = &doc.lane_id {
                gateway = gateway.in_lane(lane_id.clone());
            }
            builder = builder.node(gateway);
        }

        for doc in &self.events {
            let mut event = Event::new(doc.id.clone(), doc.name.clone(), doc.event_type);
            if let Some(lane_id) = &doc.lane_id {
                event = event.in_lane(lane_id.clone());
            }
            builder = builder.node(event);
        }

        for doc in &self.boundary_events {
            let mut boundary = BoundaryEvent::new(
                doc.id.clone(),
                doc.name.clone(),
                doc.trigger_id.clone(),
                doc.trigger_name.clone(),
                doc.attached_task_id.clone(),
            );
            if let Some(lane_id) = &doc.lane_id {
                boundary.header.lane_id = Some(crate::LaneId::new(lane_id.clone()));
            }
            builder = builder.node(boundary);
        }

        for doc in &self.sequence_flows {
            let mut flow = SequenceFlow::new(
                doc.id.clone(),
                doc.source_id.clone(),
                doc.target_id.clone(),
            )
            .with_name(doc.name.clone());
            if let Some(raw) = &doc.condition {
                flow = flow.with_condition(registry.parse_flow(raw)?);
            }
            builder = builder.flow(flow);
        }

        builder.build()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeId, Parameters, WorkflowError};

    const WF_JSON: &str = r#"{
        "workflow_id": "WF",
        "version": 1,
        "name": "Review",
        "lanes": [{ "id": "L1", "name": "Reviewers" }],
        "tasks": [
            { "id": "t1", "name": "Draft", "lane_id": "L1" },
            { "id": "t2", "name": "Vote", "multi_instance_type": "PARALLEL",
              "completion_condition": "OrCompletionCondition(2)" }
        ],
        "gateways": [{ "id": "g1", "name": "Decide" }],
        "events": [
            { "id": "start", "event_type": "START" },
            { "id": "end", "event_type": "TERMINATE" }
        ],
        "boundary_events": [
            { "id": "b1", "trigger_id": "cancel", "attached_task_id": "t2" }
        ],
        "sequence_flows": [
            { "id": "f1", "source_id": "start", "target_id": "t1" },
            { "id": "f2", "source_id": "t1", "target_id": "g1" },
            { "id": "f3", "source_id": "g1", "target_id": "t2", "condition": "ParamEquals(p,1)" },
            { "id": "f4", "source_id": "g1", "target_id": "end" },
            { "id": "f5", "source_id": "t2", "target_id": "end" },
            { "id": "f6", "source_id": "b1", "target_id": "end" }
        ]
    }"#;

    #[test]
    fn test_compile_full_document() {
        let doc = DefinitionDocument::from_json(WF_JSON).unwrap();
        let def = doc.compile(&ConditionRegistry::with_builtins()).unwrap();

        assert_eq!(def.name(), "Review");
        assert_eq!(def.node_count(), 6);
        assert_eq!(def.tasks().count(), 2);
        assert_eq!(def.boundary_events().count(), 1);
        assert_eq!(def.flow_count(), 6);
        assert_eq!(def.effective_date(), DateTime::<Utc>::MIN_UTC);

        let flows = def.outgoing_flows(&NodeId::new("g1"));
        assert_eq!(flows.len(), 2);
        let mut params = Parameters::new();
        params.insert("p".into(), "1".into());
        assert!(flows[0].accepts(&params));
        params.insert("p".into(), "2".into());
        assert!(!flows[0].accepts(&params));
        assert!(flows[1].accepts(&params));

        let t2 = def.task(&NodeId::new("t2")).unwrap();
        assert_eq!(t2.multi_instance, MultiInstanceType::Parallel);
    }

    #[test]
    fn test_unknown_condition_fails_at_compile() {
        let json = WF_JSON.replace("ParamEquals(p,1)", "NoSuchCondition(p)");
        let doc = DefinitionDocument::from_json(&json).unwrap();
        let err = doc.compile(&ConditionRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownCondition(_)));
    }

    #[test]
    fn test_completion_on_single_task_rejected() {
        let json = WF_JSON.replace(
            r#"{ "id": "t1", "name": "Draft", "lane_id": "L1" }"#,
            r#"{ "id": "t1", "name": "Draft", "completion_condition": "AllCompletionCondition" }"#,
        );
        let doc = DefinitionDocument::from_json(&json).unwrap();
        let err = doc.compile(&ConditionRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, WorkflowError::CompletionConditionNotAllowed(_)));
    }

    #[test]
    fn test_missing_start_rejected() {
        let doc = DefinitionDocument {
            workflow_id: "WF".into(),
            version: 1,
            name: String::new(),
            effective_date: None,
            lanes: vec![],
            tasks: vec![],
            gateways: vec![],
            events: vec![],
            boundary_events: vec![],
            sequence_flows: vec![],
        };
        let err = doc.compile(&ConditionRegistry::with_builtins()).unwrap_err();
        assert!(matches!(err, WorkflowError::NoStartEvent(_)));
    }
}

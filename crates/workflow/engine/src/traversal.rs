//! Graph traversal: finds the next interactive node
//!
//! Gateways are transparent. Starting from a node, traversal follows
//! flows through any number of gateways and stops on the first Task or
//! Event. This is the only place that knows which variants are skipped.

use std::collections::HashSet;

use laneflow_types::{
    EventType, FlowNode, NodeId, Parameters, WorkflowDefinition, WorkflowError, WorkflowResult,
};

/// The node that follows `current`, or `None` after a terminate event.
///
/// Tasks, start events and boundary events need exactly one outgoing
/// flow. A gateway takes its first accepting flow in load order.
pub fn next_node_id(
    definition: &WorkflowDefinition,
    current: &FlowNode,
    params: &Parameters,
) -> WorkflowResult<Option<NodeId>> {
    let node_id = current.id();
    let outgoing = definition.outgoing_flows(node_id);

    match current {
        FlowNode::Event(event) if event.event_type == EventType::Terminate => Ok(None),
        FlowNode::Gateway(_) => {
            for flow in &outgoing {
                let accepted = flow.accepts(params);
                tracing::debug!(
                    gateway_id = %node_id,
                    flow_id = %flow.id,
                    accepted,
                    "Evaluated gateway flow"
                );
                if accepted {
                    return Ok(Some(flow.target_id.clone()));
                }
            }
            Err(WorkflowError::NoMatchingFlow {
                gateway_id: node_id.clone(),
            })
        }
        _ => match outgoing.as_slice() {
            [flow] => Ok(Some(flow.target_id.clone())),
            flows => Err(WorkflowError::InvalidFlowCount {
                node_id: node_id.clone(),
                count: flows.len(),
            }),
        },
    }
}

/// Walk from `from` to the next Task or Event.
///
/// Returns `None` when `from` is a terminate event. Fails with
/// `GatewayCycle` if a chain of gateways loops back on itself.
pub fn find_landing<'d>(
    definition: &'d WorkflowDefinition,
    from: &NodeId,
    params: &Parameters,
) -> WorkflowResult<Option<&'d FlowNode>> {
    let mut current = definition.node(from)?;
    let mut visited = HashSet::new();

    loop {
        let Some(next_id) = next_node_id(definition, current, params)? else {
            return Ok(None);
        };
        let next = definition.node(&next_id)?;
        tracing::debug!(from = %current.id(), to = %next_id, kind = next.kind(), "Traversal hop");

        if !next.is_gateway() {
            return Ok(Some(next));
        }
        if !visited.insert(next_id.clone()) {
            return Err(WorkflowError::GatewayCycle(next_id));
        }
        current = next;
    }
}

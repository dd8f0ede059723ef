//! Instance status resolution
//!
//! Maps a pod and the namespace's events onto a platform instance state.
//! The decision table is closed: every combination yields a state, and a pod
//! with a `Killing` event is reported as absent rather than in a state.

use crate::models::InstanceState;
use k8s_openapi::api::core::v1::{ContainerStatus, Event, Pod};

pub const REASON_KILLING: &str = "Killing";
pub const REASON_FAILED_SCHEDULING: &str = "FailedScheduling";

const INSUFFICIENT_MARKER: &str = "Insufficient ";

const PHASE_PENDING: &str = "Pending";
const PHASE_UNKNOWN: &str = "Unknown";

/// Resolved state of one pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStatus {
    pub state: InstanceState,
    pub placement_error: Option<String>,
}

impl ResolvedStatus {
    fn state(state: InstanceState) -> Self {
        Self {
            state,
            placement_error: None,
        }
    }
}

/// Events whose involved object is the named pod
pub fn events_for_pod<'a>(pod_name: &'a str, events: &'a [Event]) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|event| event.involved_object.name.as_deref() == Some(pod_name))
        .collect()
}

/// Classify a pod. Returns `None` when the instance has been torn down.
pub fn resolve(pod: &Pod, events: &[&Event]) -> Option<ResolvedStatus> {
    if events.iter().any(|e| has_reason(e, REASON_KILLING)) {
        return None;
    }

    if let Some(placement_error) = placement_error(events) {
        return Some(ResolvedStatus {
            state: InstanceState::Unclaimed,
            placement_error: Some(placement_error),
        });
    }

    Some(ResolvedStatus::state(pod_state(pod)))
}

fn pod_state(pod: &Pod) -> InstanceState {
    let status = pod.status.as_ref();

    match status.and_then(|s| s.phase.as_deref()) {
        Some(PHASE_PENDING) => return InstanceState::Claimed,
        Some(PHASE_UNKNOWN) => return InstanceState::Unknown,
        _ => {}
    }

    let first = status
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.first());

    match first {
        None => InstanceState::Unknown,
        Some(container) => container_state(container),
    }
}

fn container_state(container: &ContainerStatus) -> InstanceState {
    let Some(state) = container.state.as_ref() else {
        return InstanceState::Unknown;
    };

    if state.terminated.is_some() || (state.waiting.is_some() && !container.ready) {
        InstanceState::Crashed
    } else if state.running.is_some() && container.ready {
        InstanceState::Running
    } else {
        InstanceState::Unknown
    }
}

fn has_reason(event: &Event, reason: &str) -> bool {
    event.reason.as_deref() == Some(reason)
}

/// Normalized placement error from FailedScheduling events, if any
fn placement_error(events: &[&Event]) -> Option<String> {
    let mut resources: Vec<String> = Vec::new();

    for event in events
        .iter()
        .filter(|e| has_reason(e, REASON_FAILED_SCHEDULING))
    {
        let message = event.message.as_deref().unwrap_or_default();
        for resource in insufficient_resources(message) {
            if !resources.contains(&resource) {
                resources.push(resource);
            }
        }
    }

    if resources.is_empty() {
        None
    } else {
        Some(format!("Insufficient resources: {}", resources.join(", ")))
    }
}

/// Resource names following each "Insufficient " marker in a scheduler message
fn insufficient_resources(message: &str) -> Vec<String> {
    message
        .match_indices(INSUFFICIENT_MARKER)
        .filter_map(|(idx, marker)| {
            let rest = &message[idx + marker.len()..];
            let resource: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '/' | '-' | '_'))
                .collect();
            let resource = resource.trim_end_matches('.');
            (!resource.is_empty()).then(|| resource.to_string())
        })
        .collect()
}

//! Liveness and readiness probe construction
//!
//! The translator only knows that it must ask each creator once per
//! translation; how a probe is shaped is up to the creator.

use crate::models::{HealthcheckKind, Lrp};
use k8s_openapi::api::core::v1::{HTTPGetAction, Probe, TCPSocketAction};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Liveness probes tolerate a few failures before restarting the container
const LIVENESS_FAILURE_THRESHOLD: i32 = 4;

/// Readiness flips on the first failure
const READINESS_FAILURE_THRESHOLD: i32 = 1;

/// Builds a probe from an LRP's declared health check
pub trait ProbeCreator: Send + Sync {
    fn create_probe(&self, lrp: &Lrp) -> Option<Probe>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LivenessProbeCreator;

impl ProbeCreator for LivenessProbeCreator {
    fn create_probe(&self, lrp: &Lrp) -> Option<Probe> {
        let initial_delay = to_seconds(lrp.health.timeout_ms);
        build_probe(lrp, initial_delay, LIVENESS_FAILURE_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessProbeCreator;

impl ProbeCreator for ReadinessProbeCreator {
    fn create_probe(&self, lrp: &Lrp) -> Option<Probe> {
        build_probe(lrp, 0, READINESS_FAILURE_THRESHOLD)
    }
}

fn build_probe(lrp: &Lrp, initial_delay: i32, failure_threshold: i32) -> Option<Probe> {
    let port = IntOrString::Int(lrp.health.port);

    let mut probe = match lrp.health.kind {
        HealthcheckKind::Http => Probe {
            http_get: Some(HTTPGetAction {
                path: Some(lrp.health.endpoint.clone()),
                port,
                ..Default::default()
            }),
            ..Default::default()
        },
        HealthcheckKind::Port => Probe {
            tcp_socket: Some(TCPSocketAction { port, host: None }),
            ..Default::default()
        },
        HealthcheckKind::None => return None,
    };

    probe.initial_delay_seconds = Some(initial_delay);
    probe.failure_threshold = Some(failure_threshold);
    Some(probe)
}

fn to_seconds(millis: u32) -> i32 {
    i32::try_from(millis / 1000).unwrap_or(i32::MAX)
}

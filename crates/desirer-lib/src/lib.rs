//! Desirer library for running Long Running Processes on Kubernetes
//!
//! This crate provides the core functionality for:
//! - Translating LRPs into StatefulSets and back
//! - Deterministic, DNS-safe StatefulSet naming
//! - Liveness and readiness probe construction
//! - Resolving pod and event state into instance states
//! - Desire/update/stop/list orchestration against the cluster API

pub mod cluster;
pub mod desirer;
pub mod error;
pub mod models;
pub mod naming;
pub mod probe;
pub mod status;
pub mod translate;

pub use cluster::{ClusterClient, ClusterError, KubeClusterClient};
pub use desirer::{Desirer, DesirerConfig};
pub use error::{DesirerError, Result};
pub use models::*;
pub use naming::{HashError, Hasher, TruncatedSha256Hasher};
pub use probe::{LivenessProbeCreator, ProbeCreator, ReadinessProbeCreator};

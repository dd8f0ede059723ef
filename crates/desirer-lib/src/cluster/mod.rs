//! Access to the namespaced Kubernetes API
//!
//! The desirer talks to the cluster exclusively through the [`ClusterClient`]
//! trait so the API server can be replaced in tests. Every method maps to a
//! single API round trip; nothing is cached between calls.

mod kube_client;

#[cfg(test)]
pub(crate) mod fake;

pub use kube_client::KubeClusterClient;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Event, Pod};
use thiserror::Error;

/// Failure reported by the cluster API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Optimistic concurrency check failed (stale resourceVersion)
    #[error("conflicting write to {0}")]
    Conflict(String),

    #[error("cluster API error ({code} {reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error("cluster unreachable: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ClusterError::Conflict(_) | ClusterError::Transport(_) => true,
            ClusterError::Api { code, .. } => *code == 429 || *code >= 500,
            ClusterError::NotFound(_) | ClusterError::AlreadyExists(_) => false,
        }
    }
}

/// Namespace-scoped operations the desirer needs from the cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List StatefulSets matching a label selector
    async fn list_stateful_sets(&self, label_selector: &str)
        -> Result<Vec<StatefulSet>, ClusterError>;

    /// Create a StatefulSet, failing if the name is taken
    async fn create_stateful_set(
        &self,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError>;

    /// Replace a StatefulSet; the object's resourceVersion acts as precondition
    async fn replace_stateful_set(
        &self,
        name: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError>;

    /// Delete a StatefulSet and, in the background, its pods
    async fn delete_stateful_set(&self, name: &str) -> Result<(), ClusterError>;

    /// List pods matching a label selector
    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, ClusterError>;

    /// Delete a single pod
    async fn delete_pod(&self, name: &str) -> Result<(), ClusterError>;

    /// List all events in the namespace
    async fn list_events(&self) -> Result<Vec<Event>, ClusterError>;
}

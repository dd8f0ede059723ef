//! `kube`-backed implementation of [`ClusterClient`]

use super::{ClusterClient, ClusterError};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::debug;

/// Cluster client scoped to a single namespace
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    namespace: String,
}

impl KubeClusterClient {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn stateful_sets(&self) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn events(&self) -> Api<Event> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

/// Map a kube error onto the cluster error taxonomy
fn map_error(err: kube::Error, object: &str) -> ClusterError {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => ClusterError::NotFound(object.to_string()),
            409 if response.reason == "AlreadyExists" => {
                ClusterError::AlreadyExists(object.to_string())
            }
            409 => ClusterError::Conflict(object.to_string()),
            code => ClusterError::Api {
                code,
                reason: response.reason,
                message: response.message,
            },
        },
        other => ClusterError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_stateful_sets(
        &self,
        label_selector: &str,
    ) -> Result<Vec<StatefulSet>, ClusterError> {
        debug!(namespace = %self.namespace, selector = %label_selector, "Listing statefulsets");
        let params = ListParams::default().labels(label_selector);
        let list = self
            .stateful_sets()
            .list(&params)
            .await
            .map_err(|e| map_error(e, "statefulsets"))?;
        Ok(list.items)
    }

    async fn create_stateful_set(
        &self,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError> {
        let name = stateful_set.metadata.name.as_deref().unwrap_or_default();
        self.stateful_sets()
            .create(&PostParams::default(), stateful_set)
            .await
            .map_err(|e| map_error(e, &format!("statefulset {}", name)))
    }

    async fn replace_stateful_set(
        &self,
        name: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError> {
        self.stateful_sets()
            .replace(name, &PostParams::default(), stateful_set)
            .await
            .map_err(|e| map_error(e, &format!("statefulset {}", name)))
    }

    async fn delete_stateful_set(&self, name: &str) -> Result<(), ClusterError> {
        self.stateful_sets()
            .delete(name, &DeleteParams::background())
            .await
            .map_err(|e| map_error(e, &format!("statefulset {}", name)))?;
        Ok(())
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, ClusterError> {
        debug!(namespace = %self.namespace, selector = %label_selector, "Listing pods");
        let params = ListParams::default().labels(label_selector);
        let list = self
            .pods()
            .list(&params)
            .await
            .map_err(|e| map_error(e, "pods"))?;
        Ok(list.items)
    }

    async fn delete_pod(&self, name: &str) -> Result<(), ClusterError> {
        self.pods()
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_error(e, &format!("pod {}", name)))?;
        Ok(())
    }

    async fn list_events(&self) -> Result<Vec<Event>, ClusterError> {
        let list = self
            .events()
            .list(&ListParams::default())
            .await
            .map_err(|e| map_error(e, "events"))?;
        Ok(list.items)
    }
}

//! LRP lifecycle orchestration
//!
//! The [`Desirer`] makes the cluster match desired LRP state and reports
//! observed instance state back. It holds no state between calls: every
//! lookup goes to the API server through a `guid=…,version=…` label selector.
//! Each mutating operation issues exactly one write, so dropping a future
//! mid-flight never leaves a half-applied change behind.


use crate::cluster::{ClusterClient, ClusterError};
use crate::error::{DesirerError, Result};
use crate::models::{labels, HealthcheckKind, Instance, Lrp, LrpIdentifier};
use crate::naming::{Hasher, TruncatedSha256Hasher};
use crate::probe::{LivenessProbeCreator, ProbeCreator, ReadinessProbeCreator};
use crate::status;
use crate::translate::{self, Translator};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Immutable settings shared by every operation
#[derive(Debug, Clone)]
pub struct DesirerConfig {
    /// Namespace all StatefulSets are created in
    pub namespace: String,
    /// Base image version stamped onto StatefulSets and pods
    pub rootfs_version: String,
}

/// Desires, updates, stops and observes LRPs as StatefulSets
pub struct Desirer {
    config: DesirerConfig,
    client: Arc<dyn ClusterClient>,
    liveness: Arc<dyn ProbeCreator>,
    readiness: Arc<dyn ProbeCreator>,
    hasher: Arc<dyn Hasher>,
}

impl Desirer {
    /// Create a desirer with the default probe creators and hasher
    pub fn new(config: DesirerConfig, client: Arc<dyn ClusterClient>) -> Self {
        Self {
            config,
            client,
            liveness: Arc::new(LivenessProbeCreator),
            readiness: Arc::new(ReadinessProbeCreator),
            hasher: Arc::new(TruncatedSha256Hasher),
        }
    }

    pub fn with_liveness_probe_creator(mut self, creator: Arc<dyn ProbeCreator>) -> Self {
        self.liveness = creator;
        self
    }

    pub fn with_readiness_probe_creator(mut self, creator: Arc<dyn ProbeCreator>) -> Self {
        self.readiness = creator;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn Hasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn config(&self) -> &DesirerConfig {
        &self.config
    }

    /// Create the StatefulSet for an LRP that does not exist yet
    pub async fn desire(&self, lrp: &Lrp) -> Result<()> {
        validate_lrp(lrp)?;
        let identifier = &lrp.identifier;

        let existing = self.list_matching(identifier, "desire").await?;
        if !existing.is_empty() {
            warn!(guid = %identifier.guid, version = %identifier.version, "LRP already desired");
            return Err(DesirerError::AlreadyExists(identifier.clone()));
        }

        let stateful_set = self.translator().to_stateful_set(lrp)?;
        let name = stateful_set.metadata.name.clone().unwrap_or_default();

        self.client
            .create_stateful_set(&stateful_set)
            .await
            .map_err(|e| match e {
                ClusterError::AlreadyExists(_) => DesirerError::AlreadyExists(identifier.clone()),
                other => DesirerError::infrastructure("create statefulset", Some(identifier), other),
            })?;

        info!(
            guid = %identifier.guid,
            version = %identifier.version,
            name = %name,
            replicas = lrp.target_instances,
            "Desired LRP"
        );
        Ok(())
    }

    /// Scale an existing StatefulSet and replace its metadata and routes
    pub async fn update(&self, lrp: &Lrp) -> Result<()> {
        validate_lrp(lrp)?;
        let identifier = &lrp.identifier;

        let mut stateful_set = self.find_stateful_set(identifier, "update").await?;
        let name = object_name(&stateful_set)?;

        stateful_set
            .spec
            .as_mut()
            .ok_or_else(|| {
                DesirerError::Translation(format!("statefulset {} has no spec", name))
            })?
            .replicas = Some(lrp.target_instances);

        translate::replace_metadata_annotations(
            stateful_set
                .metadata
                .annotations
                .get_or_insert_with(BTreeMap::new),
            lrp,
        );

        self.client
            .replace_stateful_set(&name, &stateful_set)
            .await
            .map_err(|e| match e {
                ClusterError::NotFound(_) => {
                    DesirerError::not_found(identifier, "statefulset deleted during update")
                }
                other => DesirerError::infrastructure("update statefulset", Some(identifier), other),
            })?;

        info!(
            guid = %identifier.guid,
            version = %identifier.version,
            name = %name,
            replicas = lrp.target_instances,
            "Updated LRP"
        );
        Ok(())
    }

    /// Reconstruct the LRP for an identifier
    pub async fn get(&self, identifier: &LrpIdentifier) -> Result<Lrp> {
        validate(identifier)?;
        let stateful_set = self.find_stateful_set(identifier, "get").await?;
        translate::to_lrp(&stateful_set)
    }

    /// Every LRP in the namespace
    pub async fn list(&self) -> Result<Vec<Lrp>> {
        let selector = format!("{}={}", labels::SOURCE_TYPE, labels::APP_SOURCE_TYPE);
        let stateful_sets = self
            .client
            .list_stateful_sets(&selector)
            .await
            .map_err(|e| DesirerError::infrastructure("list statefulsets", None, e))?;

        debug!(count = stateful_sets.len(), "Listed LRPs");
        stateful_sets.iter().map(translate::to_lrp).collect()
    }

    /// Delete the StatefulSet of an LRP
    pub async fn stop(&self, identifier: &LrpIdentifier) -> Result<()> {
        validate(identifier)?;
        let stateful_set = self.find_stateful_set(identifier, "stop").await?;
        let name = object_name(&stateful_set)?;

        self.client
            .delete_stateful_set(&name)
            .await
            .map_err(|e| match e {
                ClusterError::NotFound(_) => {
                    DesirerError::not_found(identifier, "statefulset already deleted")
                }
                other => DesirerError::infrastructure("delete statefulset", Some(identifier), other),
            })?;

        info!(guid = %identifier.guid, version = %identifier.version, name = %name, "Stopped LRP");
        Ok(())
    }

    /// Evict a single instance; the StatefulSet controller recreates it
    pub async fn stop_instance(&self, identifier: &LrpIdentifier, index: u32) -> Result<()> {
        validate(identifier)?;
        let stateful_set = self.find_stateful_set(identifier, "stop instance").await?;
        let name = object_name(&stateful_set)?;

        let replicas = stateful_set
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or_default();
        if i64::from(index) >= i64::from(replicas) {
            return Err(DesirerError::InvalidInput(format!(
                "instance index {} out of range for {} replicas",
                index, replicas
            )));
        }

        let pod_name = format!("{}-{}", name, index);
        self.client.delete_pod(&pod_name).await.map_err(|e| match e {
            ClusterError::NotFound(_) => {
                DesirerError::not_found(identifier, format!("pod {} not found", pod_name))
            }
            other => DesirerError::infrastructure("delete pod", Some(identifier), other),
        })?;

        info!(guid = %identifier.guid, version = %identifier.version, pod = %pod_name, "Stopped instance");
        Ok(())
    }

    /// Observed state of every instance of an LRP, in pod-list order
    ///
    /// Pods and events are read in two separate calls, so the two views
    /// may come from slightly different instants.
    pub async fn get_instances(&self, identifier: &LrpIdentifier) -> Result<Vec<Instance>> {
        validate(identifier)?;
        let selector = identifier.label_selector();

        let pods = self
            .client
            .list_pods(&selector)
            .await
            .map_err(|e| DesirerError::infrastructure("list pods", Some(identifier), e))?;
        let events = self
            .client
            .list_events()
            .await
            .map_err(|e| DesirerError::infrastructure("list events", Some(identifier), e))?;

        let mut instances = Vec::with_capacity(pods.len());
        for pod in &pods {
            let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
            let pod_events = status::events_for_pod(pod_name, &events);

            let Some(resolved) = status::resolve(pod, &pod_events) else {
                debug!(pod = %pod_name, "Omitting stopped instance");
                continue;
            };

            let Some(index) = parse_index(pod_name) else {
                warn!(pod = %pod_name, "Skipping pod without instance index");
                continue;
            };

            instances.push(Instance {
                index,
                since: start_time_nanos(pod),
                state: resolved.state,
                placement_error: resolved.placement_error,
            });
        }

        debug!(
            guid = %identifier.guid,
            version = %identifier.version,
            count = instances.len(),
            "Resolved instances"
        );
        Ok(instances)
    }

    fn translator(&self) -> Translator<'_> {
        Translator {
            namespace: &self.config.namespace,
            rootfs_version: &self.config.rootfs_version,
            liveness: self.liveness.as_ref(),
            readiness: self.readiness.as_ref(),
            hasher: self.hasher.as_ref(),
        }
    }

    async fn list_matching(
        &self,
        identifier: &LrpIdentifier,
        operation: &'static str,
    ) -> Result<Vec<StatefulSet>> {
        self.client
            .list_stateful_sets(&identifier.label_selector())
            .await
            .map_err(|e| {
                warn!(operation, error = %e, "Failed to list statefulsets");
                DesirerError::infrastructure("list statefulsets", Some(identifier), e)
            })
    }

    /// The single StatefulSet for an identifier; none or several is NotFound
    async fn find_stateful_set(
        &self,
        identifier: &LrpIdentifier,
        operation: &'static str,
    ) -> Result<StatefulSet> {
        let mut matches = self.list_matching(identifier, operation).await?;
        match matches.len() {
            0 => Err(DesirerError::not_found(identifier, "no statefulset matches")),
            1 => Ok(matches.remove(0)),
            n => {
                warn!(guid = %identifier.guid, version = %identifier.version, count = n, "Ambiguous LRP lookup");
                Err(DesirerError::not_found(
                    identifier,
                    format!("{} statefulsets match", n),
                ))
            }
        }
    }
}

fn validate(identifier: &LrpIdentifier) -> Result<()> {
    if identifier.guid.is_empty() {
        return Err(DesirerError::InvalidInput("empty LRP guid".to_string()));
    }
    if identifier.version.is_empty() {
        return Err(DesirerError::InvalidInput("empty LRP version".to_string()));
    }
    Ok(())
}

/// Reject LRPs the API server would refuse, before any cluster call
fn validate_lrp(lrp: &Lrp) -> Result<()> {
    validate(&lrp.identifier)?;

    if lrp.image.trim().is_empty() {
        return Err(invalid(&lrp.identifier, "image must not be empty"));
    }
    if lrp.target_instances < 0 {
        return Err(invalid(
            &lrp.identifier,
            format!("target_instances must not be negative, got {}", lrp.target_instances),
        ));
    }
    if lrp.memory_mb < 0 {
        return Err(invalid(
            &lrp.identifier,
            format!("memory_mb must not be negative, got {}", lrp.memory_mb),
        ));
    }
    if let Some(port) = lrp.ports.iter().find(|port| !(1..=65535).contains(*port)) {
        return Err(invalid(&lrp.identifier, format!("port {} out of range", port)));
    }
    if lrp.health.kind != HealthcheckKind::None && !(1..=65535).contains(&lrp.health.port) {
        return Err(invalid(
            &lrp.identifier,
            format!("health check port {} out of range", lrp.health.port),
        ));
    }
    Ok(())
}

fn invalid(identifier: &LrpIdentifier, reason: impl std::fmt::Display) -> DesirerError {
    DesirerError::InvalidInput(format!("LRP {}: {}", identifier, reason))
}

fn object_name(stateful_set: &StatefulSet) -> Result<String> {
    stateful_set
        .metadata
        .name
        .clone()
        .ok_or_else(|| DesirerError::Translation("statefulset has no name".to_string()))
}

/// Instance index from a StatefulSet pod name such as `odin-3`
fn parse_index(pod_name: &str) -> Option<u32> {
    pod_name
        .rsplit_once('-')
        .and_then(|(_, index)| index.parse().ok())
}

fn start_time_nanos(pod: &Pod) -> i64 {
    pod.status
        .as_ref()
        .and_then(|status| status.start_time.as_ref())
        .and_then(|time| time.0.timestamp_nanos_opt())
        .unwrap_or(0)
}

//! Translation between LRPs and StatefulSets
//!
//! [`Translator::to_stateful_set`] builds the full workload resource for a
//! desire request. [`to_lrp`] is its inverse and reconstructs every field the
//! forward translation preserves.

use crate::error::{DesirerError, Result};
use crate::models::{
    annotations, labels, metadata, Healthcheck, HealthcheckKind, Lrp, LrpIdentifier, VolumeMount,
};
use crate::naming::{self, Hasher};
use crate::probe::ProbeCreator;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, ObjectFieldSelector,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
    Volume, VolumeMount as K8sVolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Name of the single application container
pub const CONTAINER_NAME: &str = "opi";

pub const ENV_POD_NAME: &str = "POD_NAME";
pub const ENV_INSTANCE_IP: &str = "CF_INSTANCE_IP";
pub const ENV_INSTANCE_INTERNAL_IP: &str = "CF_INSTANCE_INTERNAL_IP";

const INJECTED_ENV: &[&str] = &[ENV_POD_NAME, ENV_INSTANCE_IP, ENV_INSTANCE_INTERNAL_IP];

const RESOURCE_MEMORY: &str = "memory";
const RESOURCE_CPU: &str = "cpu";

/// Forward translation with its injected collaborators
pub struct Translator<'a> {
    pub namespace: &'a str,
    pub rootfs_version: &'a str,
    pub liveness: &'a dyn ProbeCreator,
    pub readiness: &'a dyn ProbeCreator,
    pub hasher: &'a dyn Hasher,
}

impl Translator<'_> {
    /// Build the StatefulSet for an LRP. The LRP is never mutated.
    pub fn to_stateful_set(&self, lrp: &Lrp) -> Result<StatefulSet> {
        if lrp.memory_mb < 0 {
            return Err(DesirerError::Translation(format!(
                "memory_mb must not be negative, got {}",
                lrp.memory_mb
            )));
        }

        let name = naming::stateful_set_name(
            &lrp.app_name,
            &lrp.space_name,
            &lrp.identifier,
            self.hasher,
        )
        .map_err(|e| DesirerError::Translation(e.to_string()))?;

        let liveness_probe = self.liveness.create_probe(lrp);
        let readiness_probe = self.readiness.create_probe(lrp);

        let selector_labels = selector_labels(&lrp.identifier);
        let mut object_labels = selector_labels.clone();
        object_labels.insert(
            labels::ROOTFS_VERSION.to_string(),
            self.rootfs_version.to_string(),
        );

        let (volumes, volume_mounts) = volume_specs(&lrp.volume_mounts);

        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(lrp.image.clone()),
            image_pull_policy: Some("Always".to_string()),
            command: Some(lrp.command.clone()),
            env: Some(env_vars(&lrp.env)),
            ports: Some(
                lrp.ports
                    .iter()
                    .map(|port| ContainerPort {
                        container_port: *port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            resources: Some(resources(lrp)),
            liveness_probe,
            readiness_probe,
            volume_mounts: Some(volume_mounts),
            ..Default::default()
        };

        Ok(StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(self.namespace.to_string()),
                labels: Some(object_labels.clone()),
                annotations: Some(stateful_set_annotations(lrp)),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(lrp.target_instances),
                pod_management_policy: Some("Parallel".to_string()),
                service_name: name,
                selector: LabelSelector {
                    match_labels: Some(selector_labels),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(object_labels),
                        annotations: Some(pod_annotations(lrp)),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        automount_service_account_token: Some(false),
                        containers: vec![container],
                        volumes: Some(volumes),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        })
    }
}

/// Labels shared by the selector, the StatefulSet and its pods
pub fn selector_labels(identifier: &LrpIdentifier) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::GUID.to_string(), identifier.guid.clone()),
        (labels::VERSION.to_string(), identifier.version.clone()),
        (
            labels::SOURCE_TYPE.to_string(),
            labels::APP_SOURCE_TYPE.to_string(),
        ),
    ])
}

fn stateful_set_annotations(lrp: &Lrp) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    replace_metadata_annotations(&mut annotations, lrp);
    annotations.insert(annotations::SPACE_NAME.to_string(), lrp.space_name.clone());
    annotations.insert(annotations::APP_NAME.to_string(), lrp.app_name.clone());
    annotations
}

/// Swap the metadata annotations for the LRP's metadata and re-derive routes
///
/// Derived and prefixed annotations are left alone.
pub fn replace_metadata_annotations(target: &mut BTreeMap<String, String>, lrp: &Lrp) {
    target.retain(|key, _| !annotations::is_metadata(key));
    target.extend(
        lrp.metadata
            .iter()
            .filter(|(key, _)| annotations::is_metadata(key))
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    target.insert(
        annotations::REGISTERED_ROUTES.to_string(),
        lrp.metadata
            .get(metadata::APP_URIS)
            .cloned()
            .unwrap_or_default(),
    );
}

fn pod_annotations(lrp: &Lrp) -> BTreeMap<String, String> {
    [metadata::PROCESS_GUID, metadata::APP_ID]
        .iter()
        .filter_map(|key| {
            lrp.metadata
                .get(*key)
                .map(|value| (key.to_string(), value.clone()))
        })
        .collect()
}

fn env_vars(env: &BTreeMap<String, String>) -> Vec<EnvVar> {
    let mut vars: Vec<EnvVar> = env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            value_from: None,
        })
        .collect();

    vars.push(field_ref_env(ENV_POD_NAME, "metadata.name"));
    vars.push(field_ref_env(ENV_INSTANCE_IP, "status.podIP"));
    vars.push(field_ref_env(ENV_INSTANCE_INTERNAL_IP, "status.podIP"));
    vars
}

fn field_ref_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                api_version: None,
            }),
            ..Default::default()
        }),
    }
}

fn resources(lrp: &Lrp) -> ResourceRequirements {
    let memory = Quantity(format!("{}M", lrp.memory_mb));
    let cpu = Quantity(format!("{}m", lrp.cpu_weight));

    ResourceRequirements {
        limits: Some(BTreeMap::from([(
            RESOURCE_MEMORY.to_string(),
            memory.clone(),
        )])),
        requests: Some(BTreeMap::from([
            (RESOURCE_MEMORY.to_string(), memory),
            (RESOURCE_CPU.to_string(), cpu),
        ])),
        ..Default::default()
    }
}

fn volume_specs(mounts: &[VolumeMount]) -> (Vec<Volume>, Vec<K8sVolumeMount>) {
    mounts
        .iter()
        .map(|mount| {
            let volume = Volume {
                name: mount.claim_name.clone(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: mount.claim_name.clone(),
                    read_only: None,
                }),
                ..Default::default()
            };
            let volume_mount = K8sVolumeMount {
                name: mount.claim_name.clone(),
                mount_path: mount.mount_path.clone(),
                ..Default::default()
            };
            (volume, volume_mount)
        })
        .unzip()
}

/// Reconstruct the LRP a StatefulSet was translated from
pub fn to_lrp(stateful_set: &StatefulSet) -> Result<Lrp> {
    let name = stateful_set.metadata.name.as_deref().unwrap_or("<unnamed>");
    let malformed = |what: &str| DesirerError::Translation(format!("statefulset {}: {}", name, what));

    let empty = BTreeMap::new();
    let object_labels = stateful_set.metadata.labels.as_ref().unwrap_or(&empty);
    let object_annotations = stateful_set.metadata.annotations.as_ref().unwrap_or(&empty);

    let label = |key: &str| {
        object_labels
            .get(key)
            .cloned()
            .ok_or_else(|| malformed(&format!("missing label {}", key)))
    };
    let identifier = LrpIdentifier::new(label(labels::GUID)?, label(labels::VERSION)?);

    let spec = stateful_set
        .spec
        .as_ref()
        .ok_or_else(|| malformed("missing spec"))?;
    let pod_spec = spec
        .template
        .spec
        .as_ref()
        .ok_or_else(|| malformed("missing pod spec"))?;
    let container = pod_spec
        .containers
        .first()
        .ok_or_else(|| malformed("pod spec has no containers"))?;

    let requests = container
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref());
    let memory_mb = match requests.and_then(|r| r.get(RESOURCE_MEMORY)) {
        Some(quantity) => parse_memory_mb(quantity)?,
        None => 0,
    };
    let cpu_weight = match requests.and_then(|r| r.get(RESOURCE_CPU)) {
        Some(quantity) => parse_millicpu(quantity)?,
        None => 0,
    };

    let lrp_metadata: BTreeMap<String, String> = object_annotations
        .iter()
        .filter(|(key, _)| annotations::is_metadata(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let env = container
        .env
        .iter()
        .flatten()
        .filter(|var| !INJECTED_ENV.contains(&var.name.as_str()))
        .filter_map(|var| var.value.clone().map(|value| (var.name.clone(), value)))
        .collect();

    let volume_mounts = container
        .volume_mounts
        .iter()
        .flatten()
        .map(|mount| VolumeMount {
            claim_name: mount.name.clone(),
            mount_path: mount.mount_path.clone(),
        })
        .collect();

    Ok(Lrp {
        identifier,
        app_name: object_annotations
            .get(annotations::APP_NAME)
            .or_else(|| lrp_metadata.get(metadata::APP_NAME))
            .cloned()
            .unwrap_or_default(),
        space_name: object_annotations
            .get(annotations::SPACE_NAME)
            .cloned()
            .unwrap_or_default(),
        image: container.image.clone().unwrap_or_default(),
        command: container.command.clone().unwrap_or_default(),
        env,
        ports: container
            .ports
            .iter()
            .flatten()
            .map(|port| port.container_port)
            .collect(),
        memory_mb,
        cpu_weight,
        target_instances: spec.replicas.unwrap_or_default(),
        running_instances: stateful_set
            .status
            .as_ref()
            .and_then(|status| status.ready_replicas)
            .unwrap_or_default(),
        volume_mounts,
        health: healthcheck_from_probe(container.liveness_probe.as_ref()),
        metadata: lrp_metadata,
    })
}

fn healthcheck_from_probe(probe: Option<&Probe>) -> Healthcheck {
    let Some(probe) = probe else {
        return Healthcheck::default();
    };

    let timeout_ms = probe
        .initial_delay_seconds
        .and_then(|secs| u32::try_from(secs).ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or_default();

    if let Some(http) = &probe.http_get {
        Healthcheck {
            kind: HealthcheckKind::Http,
            port: int_port(&http.port),
            endpoint: http.path.clone().unwrap_or_default(),
            timeout_ms,
        }
    } else if let Some(tcp) = &probe.tcp_socket {
        Healthcheck {
            kind: HealthcheckKind::Port,
            port: int_port(&tcp.port),
            endpoint: String::new(),
            timeout_ms,
        }
    } else {
        Healthcheck::default()
    }
}

fn int_port(port: &IntOrString) -> i32 {
    match port {
        IntOrString::Int(port) => *port,
        IntOrString::String(name) => name.parse().unwrap_or_default(),
    }
}

/// Split a quantity into its numeric part and suffix
fn split_quantity(quantity: &Quantity) -> Result<(f64, &str)> {
    let raw = quantity.0.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, suffix) = raw.split_at(split);
    let value = number.parse::<f64>().map_err(|_| {
        DesirerError::Translation(format!("cannot parse resource quantity {:?}", raw))
    })?;
    Ok((value, suffix))
}

/// Parse a memory quantity into megabytes (10^6 bytes)
pub fn parse_memory_mb(quantity: &Quantity) -> Result<i64> {
    let (value, suffix) = split_quantity(quantity)?;
    let multiplier: f64 = match suffix {
        "" => 1.0,
        "k" | "K" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        other => {
            return Err(DesirerError::Translation(format!(
                "unsupported memory unit {:?} in {:?}",
                other, quantity.0
            )))
        }
    };
    Ok((value * multiplier / 1e6).round() as i64)
}

/// Parse a CPU quantity into millicpu
pub fn parse_millicpu(quantity: &Quantity) -> Result<u32> {
    let (value, suffix) = split_quantity(quantity)?;
    let millis = match suffix {
        "m" => value,
        "" => value * 1000.0,
        other => {
            return Err(DesirerError::Translation(format!(
                "unsupported cpu unit {:?} in {:?}",
                other, quantity.0
            )))
        }
    };
    if millis < 0.0 {
        return Err(DesirerError::Translation(format!(
            "negative cpu quantity {:?}",
            quantity.0
        )));
    }
    Ok(millis.round() as u32)
}

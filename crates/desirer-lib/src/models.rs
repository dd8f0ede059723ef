//! Core data models for the desirer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata keys carried on an LRP and copied onto its StatefulSet
pub mod metadata {
    pub const PROCESS_GUID: &str = "process_guid";
    pub const LAST_UPDATED: &str = "last_updated";
    pub const APP_URIS: &str = "application_uris";
    pub const APP_NAME: &str = "application_name";
    pub const APP_ID: &str = "application_id";
    pub const VERSION: &str = "version";
}

/// Annotation keys derived by the translator
///
/// Every other unprefixed annotation on a StatefulSet is LRP metadata.
pub mod annotations {
    pub const REGISTERED_ROUTES: &str = "routes";
    pub const SPACE_NAME: &str = "space_name";
    pub const APP_NAME: &str = "app_name";

    pub const DERIVED: &[&str] = &[REGISTERED_ROUTES, SPACE_NAME, APP_NAME];

    /// True for annotations holding LRP metadata rather than derived values
    /// or keys owned by other controllers (`example.com/...`)
    pub fn is_metadata(key: &str) -> bool {
        !DERIVED.contains(&key) && !key.contains('/')
    }
}

/// Label keys used as the lookup key for StatefulSets and pods
pub mod labels {
    pub const GUID: &str = "guid";
    pub const VERSION: &str = "version";
    pub const SOURCE_TYPE: &str = "source_type";
    pub const ROOTFS_VERSION: &str = "rootfs-version";

    pub const APP_SOURCE_TYPE: &str = "APP";
}

/// Identity of one desired-state generation of an application
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LrpIdentifier {
    pub guid: String,
    pub version: String,
}

impl LrpIdentifier {
    pub fn new(guid: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            version: version.into(),
        }
    }

    /// Label selector matching the StatefulSet and pods of this identifier
    pub fn label_selector(&self) -> String {
        format!(
            "{}={},{}={}",
            labels::GUID,
            self.guid,
            labels::VERSION,
            self.version
        )
    }
}

impl fmt::Display for LrpIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guid, self.version)
    }
}

/// Persistent volume claim mounted into the application container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub claim_name: String,
    pub mount_path: String,
}

/// Kind of health check declared for an LRP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthcheckKind {
    Http,
    Port,
    #[default]
    None,
}

/// Health check declaration used by the probe creators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Healthcheck {
    #[serde(rename = "type", default)]
    pub kind: HealthcheckKind,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub timeout_ms: u32,
}

/// Long Running Process desired-state record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lrp {
    #[serde(flatten)]
    pub identifier: LrpIdentifier,
    pub app_name: String,
    pub space_name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<i32>,
    #[serde(default)]
    pub memory_mb: i64,
    #[serde(default)]
    pub cpu_weight: u32,
    #[serde(default)]
    pub target_instances: i32,
    #[serde(default)]
    pub running_instances: i32,
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default)]
    pub health: Healthcheck,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Platform-level state of a single application instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceState {
    Running,
    Claimed,
    Crashed,
    Unclaimed,
    Unknown,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Running => "RUNNING",
            InstanceState::Claimed => "CLAIMED",
            InstanceState::Crashed => "CRASHED",
            InstanceState::Unclaimed => "UNCLAIMED",
            InstanceState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of one replica, recomputed on every query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub index: u32,
    /// Start time in nanoseconds since the epoch, 0 if not started
    pub since: i64,
    pub state: InstanceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_error: Option<String>,
}

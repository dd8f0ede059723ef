//! CLI configuration

use anyhow::{Context, Result};
use desirer_lib::{Desirer, DesirerConfig, KubeClusterClient};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Namespace the desirer operates in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Version label stamped onto StatefulSets and pods
    #[serde(default = "default_rootfs_version")]
    pub rootfs_version: String,

    /// Explicit kubeconfig; in-cluster or default discovery when unset
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_rootfs_version() -> String {
    "unknown".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            rootfs_version: default_rootfs_version(),
            kubeconfig: None,
        }
    }
}

impl CliConfig {
    /// Load configuration from `OPI_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("OPI"))
            .build()
            .context("Failed to read OPI_* environment")?;

        config
            .try_deserialize()
            .context("Invalid OPI_* configuration")
    }

    /// Apply command-line flags on top of the environment
    pub fn with_overrides(
        mut self,
        namespace: Option<String>,
        rootfs_version: Option<String>,
        kubeconfig: Option<PathBuf>,
    ) -> Self {
        if let Some(namespace) = namespace {
            self.namespace = namespace;
        }
        if let Some(rootfs_version) = rootfs_version {
            self.rootfs_version = rootfs_version;
        }
        if kubeconfig.is_some() {
            self.kubeconfig = kubeconfig;
        }
        self
    }

    pub fn desirer_config(&self) -> DesirerConfig {
        DesirerConfig {
            namespace: self.namespace.clone(),
            rootfs_version: self.rootfs_version.clone(),
        }
    }

    async fn kube_client(&self) -> Result<Client> {
        match &self.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                let config =
                    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .context("Invalid kubeconfig")?;
                Client::try_from(config).context("Failed to create Kubernetes client")
            }
            None => Client::try_default()
                .await
                .context("Failed to create Kubernetes client"),
        }
    }

    /// Connect to the cluster and build a desirer for the configured namespace
    pub async fn desirer(&self) -> Result<Desirer> {
        let client = self.kube_client().await?;
        info!(namespace = %self.namespace, "Connected to cluster");

        let cluster = KubeClusterClient::new(client, self.namespace.clone());
        Ok(Desirer::new(self.desirer_config(), Arc::new(cluster)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.rootfs_version, "unknown");
        assert!(config.kubeconfig.is_none());
    }

    #[test]
    fn test_flags_override_environment() {
        let config = CliConfig {
            namespace: "from-env".to_string(),
            rootfs_version: "v1".to_string(),
            kubeconfig: Some(PathBuf::from("/env/kubeconfig")),
        }
        .with_overrides(Some("eirini".to_string()), None, None);

        assert_eq!(config.namespace, "eirini");
        assert_eq!(config.rootfs_version, "v1");
        assert_eq!(config.kubeconfig, Some(PathBuf::from("/env/kubeconfig")));

        let desirer_config = config.desirer_config();
        assert_eq!(desirer_config.namespace, "eirini");
        assert_eq!(desirer_config.rootfs_version, "v1");
    }

    #[test]
    fn test_missing_fields_use_serde_defaults() {
        let config: CliConfig = serde_json::from_str(r#"{"namespace": "apps"}"#).unwrap();
        assert_eq!(config.namespace, "apps");
        assert_eq!(config.rootfs_version, "unknown");
    }
}

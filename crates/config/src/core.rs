//! Configuration sections

use serde::{Deserialize, Serialize};

/// Cluster connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Kubeconfig context, the current context when unset
    #[serde(default)]
    pub context: Option<String>,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            context: None,
        }
    }
}

/// Settings applied to every generated workload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_init_image")]
    pub init_image: String,
    #[serde(default = "default_repo_mount_path")]
    pub repo_mount_path: String,
    /// Secret holding one kubeconfig per target cluster
    #[serde(default = "default_kubeconfig_secret")]
    pub kubeconfig_secret: String,
    #[serde(default)]
    pub service_account: Option<String>,
    #[serde(default = "default_kaniko_image")]
    pub kaniko_image: String,
    #[serde(default = "default_helm_image")]
    pub helm_image: String,
    #[serde(default = "default_kubectl_image")]
    pub kubectl_image: String,
    #[serde(default = "default_dotnet_image")]
    pub dotnet_image: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            init_image: default_init_image(),
            repo_mount_path: default_repo_mount_path(),
            kubeconfig_secret: default_kubeconfig_secret(),
            service_account: None,
            kaniko_image: default_kaniko_image(),
            helm_image: default_helm_image(),
            kubectl_image: default_kubectl_image(),
            dotnet_image: default_dotnet_image(),
        }
    }
}

/// Owner linkage so the cluster garbage-collects workloads with their owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default = "default_owner_kind")]
    pub kind: String,
    #[serde(default = "default_owner_api_version")]
    pub api_version: String,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: String::new(),
            uid: String::new(),
            kind: default_owner_kind(),
            api_version: default_owner_api_version(),
        }
    }
}

impl OwnerConfig {
    /// Whether an owner reference can be attached
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.name.is_empty() && !self.uid.is_empty()
    }
}

/// Correlation identifiers attached to every workload of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub build_id: Option<String>,
}

// Default value functions for serde
fn default_namespace() -> String {
    "default".to_string()
}

fn default_name_prefix() -> String {
    "wharf-build".to_string()
}

fn default_init_image() -> String {
    "alpine:3".to_string()
}

fn default_repo_mount_path() -> String {
    "/mnt/repo".to_string()
}

fn default_kubeconfig_secret() -> String {
    "kubectl-config".to_string()
}

fn default_kaniko_image() -> String {
    "gcr.io/kaniko-project/executor:debug".to_string()
}

fn default_helm_image() -> String {
    "alpine/helm:3".to_string()
}

fn default_kubectl_image() -> String {
    "bitnami/kubectl:latest".to_string()
}

fn default_dotnet_image() -> String {
    "mcr.microsoft.com/dotnet/sdk:8.0".to_string()
}

fn default_owner_kind() -> String {
    "Pod".to_string()
}

fn default_owner_api_version() -> String {
    "v1".to_string()
}

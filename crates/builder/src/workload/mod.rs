//! Workload descriptions handed to the cluster orchestrator
//!
//! A workload is one pod-like unit: an init container that holds the
//! sandbox open while the workspace is transferred, followed by exactly one
//! application container that performs the step.

mod naming;
mod spec;
mod steps;

pub use naming::{generated_name, sanitize_label_value};
pub use spec::{continue_command, transfer_command, WorkloadSpecBuilder};

use std::collections::BTreeMap;

/// Complete description of a workload to create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadSpec {
    /// Name prefix; the orchestrator appends a unique suffix
    pub generate_name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
    pub service_account: Option<String>,
    pub init_containers: Vec<ContainerSpec>,
    pub containers: Vec<ContainerSpec>,
    pub volumes: Vec<VolumeSpec>,
}

/// One container of a workload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub env: Vec<EnvVar>,
    /// Secret whose keys are all exposed as environment variables
    pub env_from_secret: Option<String>,
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: EnvValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Plain(String),
    SecretKey { secret: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub name: String,
    pub source: VolumeSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    EmptyDir,
    /// Secret projected as files; `items` maps secret keys to file paths
    Secret {
        secret_name: String,
        items: Vec<(String, String)>,
    },
}

/// Metadata linking a workload to the object that owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl ContainerSpec {
    /// Mount a volume into this container
    #[must_use]
    pub fn with_mount(mut self, name: &str, mount_path: &str, read_only: bool) -> Self {
        self.volume_mounts.push(VolumeMount {
            name: name.to_string(),
            mount_path: mount_path.to_string(),
            read_only,
        });
        self
    }
}

impl EnvVar {
    pub fn plain(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: EnvValue::Plain(value.into()),
        }
    }

    pub fn from_secret(
        name: impl Into<String>,
        secret: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: EnvValue::SecretKey {
                secret: secret.into(),
                key: key.into(),
            },
        }
    }
}

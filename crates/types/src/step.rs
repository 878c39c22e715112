//! Step type variants
//!
//! Each variant carries the settings of one kind of action. The variant
//! name doubles as the type tag used in workload names and result reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The action performed by a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepType {
    Container(ContainerStep),
    Docker(DockerStep),
    Helm(HelmStep),
    Kubectl(KubectlStep),
    HelmPackage(HelmPackageStep),
    #[serde(rename = "nuget-package")]
    NuGetPackage(NuGetPackageStep),
}

impl StepType {
    /// Stable type tag, as written in the build definition
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Container(_) => "container",
            Self::Docker(_) => "docker",
            Self::Helm(_) => "helm",
            Self::Kubectl(_) => "kubectl",
            Self::HelmPackage(_) => "helm-package",
            Self::NuGetPackage(_) => "nuget-package",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Run arbitrary commands in a container image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerStep {
    pub image: String,
    pub cmds: Vec<String>,
    pub shell: String,
    /// Only `linux` workloads can be scheduled
    pub os: String,
    pub service_account: Option<String>,
    /// Secret whose keys are exposed as environment variables
    pub secret_name: Option<String>,
}

impl Default for ContainerStep {
    fn default() -> Self {
        Self {
            image: String::new(),
            cmds: Vec::new(),
            shell: "/bin/sh".to_string(),
            os: "linux".to_string(),
            service_account: None,
            secret_name: None,
        }
    }
}

/// Build and push a container image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DockerStep {
    pub file: String,
    pub context: String,
    /// Comma separated list of tags
    pub tag: String,
    pub registry: String,
    pub group: String,
    pub name: String,
    pub push: bool,
    pub secret_name: Option<String>,
    pub args: Vec<String>,
}

impl Default for DockerStep {
    fn default() -> Self {
        Self {
            file: "Dockerfile".to_string(),
            context: String::new(),
            tag: "latest".to_string(),
            registry: String::new(),
            group: String::new(),
            name: String::new(),
            push: true,
            secret_name: None,
            args: Vec::new(),
        }
    }
}

/// Install or upgrade a Helm release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HelmStep {
    pub chart: String,
    pub name: String,
    pub namespace: String,
    pub repo: String,
    pub files: Vec<String>,
    pub set: BTreeMap<String, String>,
    pub chart_version: String,
    pub helm_version: String,
    pub cluster: String,
}

/// Apply manifests with kubectl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KubectlStep {
    pub file: String,
    pub files: Vec<String>,
    pub namespace: String,
    pub action: String,
    pub force: bool,
    pub cluster: String,
}

impl Default for KubectlStep {
    fn default() -> Self {
        Self {
            file: String::new(),
            files: Vec::new(),
            namespace: String::new(),
            action: "apply".to_string(),
            force: false,
            cluster: String::new(),
        }
    }
}

/// Package a Helm chart and upload it to a chart repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HelmPackageStep {
    pub version: String,
    pub chart_path: String,
    pub destination: String,
}

/// Pack a .NET project and push it to a NuGet feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NuGetPackageStep {
    pub version: String,
    pub project_path: String,
    pub repo: String,
    pub skip_duplicate: bool,
}

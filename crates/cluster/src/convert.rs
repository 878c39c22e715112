//! Conversion between workload descriptions and Kubernetes pods

use k8s_openapi::api::core::v1::{
    Container, ContainerState as PodContainerState, ContainerStatus, EmptyDirVolumeSource,
    EnvFromSource, EnvVar as PodEnvVar, EnvVarSource, KeyToPath, Pod, PodSpec, SecretEnvSource,
    SecretKeySelector, SecretVolumeSource, Volume, VolumeMount as PodVolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use wharf_builder::workload::{
    ContainerSpec, EnvValue, EnvVar, VolumeSource, VolumeSpec, WorkloadSpec,
};
use wharf_builder::{ContainerState, WorkloadStatus};
use wharf_config::constants::{INIT_CONTAINER_NAME, STEP_CONTAINER_NAME};

/// Build the pod for a workload; it never restarts
pub(crate) fn pod_from_spec(spec: &WorkloadSpec) -> Pod {
    let owner_references: Vec<OwnerReference> = spec
        .owner_references
        .iter()
        .map(|owner| OwnerReference {
            api_version: owner.api_version.clone(),
            kind: owner.kind.clone(),
            name: owner.name.clone(),
            uid: owner.uid.clone(),
            ..OwnerReference::default()
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", spec.generate_name)),
            labels: Some(spec.labels.clone()),
            annotations: Some(spec.annotations.clone()),
            owner_references: (!owner_references.is_empty()).then_some(owner_references),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            service_account_name: spec.service_account.clone(),
            init_containers: Some(spec.init_containers.iter().map(container).collect()),
            containers: spec.containers.iter().map(container).collect(),
            volumes: Some(spec.volumes.iter().map(volume).collect()),
            ..PodSpec::default()
        }),
        status: None,
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

fn container(spec: &ContainerSpec) -> Container {
    Container {
        name: spec.name.clone(),
        image: Some(spec.image.clone()),
        command: non_empty(spec.command.clone()),
        args: non_empty(spec.args.clone()),
        working_dir: spec.working_dir.clone(),
        env: non_empty(spec.env.iter().map(env_var).collect()),
        env_from: spec.env_from_secret.as_ref().map(|secret| {
            vec![EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: secret.clone(),
                    optional: None,
                }),
                ..EnvFromSource::default()
            }]
        }),
        volume_mounts: non_empty(
            spec.volume_mounts
                .iter()
                .map(|mount| PodVolumeMount {
                    name: mount.name.clone(),
                    mount_path: mount.mount_path.clone(),
                    read_only: mount.read_only.then_some(true),
                    ..PodVolumeMount::default()
                })
                .collect(),
        ),
        ..Container::default()
    }
}

fn env_var(var: &EnvVar) -> PodEnvVar {
    match &var.value {
        EnvValue::Plain(value) => PodEnvVar {
            name: var.name.clone(),
            value: Some(value.clone()),
            value_from: None,
        },
        EnvValue::SecretKey { secret, key } => PodEnvVar {
            name: var.name.clone(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.clone(),
                    key: key.clone(),
                    optional: None,
                }),
                ..EnvVarSource::default()
            }),
        },
    }
}

fn volume(spec: &VolumeSpec) -> Volume {
    match &spec.source {
        VolumeSource::EmptyDir => Volume {
            name: spec.name.clone(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Volume::default()
        },
        VolumeSource::Secret { secret_name, items } => Volume {
            name: spec.name.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.clone()),
                items: non_empty(
                    items
                        .iter()
                        .map(|(key, path)| KeyToPath {
                            key: key.clone(),
                            path: path.clone(),
                            mode: None,
                        })
                        .collect(),
                ),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        },
    }
}

/// Extract the init and step container states of a pod
pub(crate) fn workload_status(pod: &Pod) -> WorkloadStatus {
    let Some(status) = &pod.status else {
        return WorkloadStatus::default();
    };
    WorkloadStatus {
        init: find_state(status.init_container_statuses.as_deref(), INIT_CONTAINER_NAME),
        step: find_state(status.container_statuses.as_deref(), STEP_CONTAINER_NAME),
    }
}

fn find_state(statuses: Option<&[ContainerStatus]>, name: &str) -> Option<ContainerState> {
    statuses?
        .iter()
        .find(|status| status.name == name)
        .and_then(|status| status.state.as_ref())
        .and_then(container_state)
}

fn container_state(state: &PodContainerState) -> Option<ContainerState> {
    if let Some(terminated) = &state.terminated {
        return Some(ContainerState::Terminated {
            exit_code: terminated.exit_code,
            reason: terminated.reason.clone().unwrap_or_default(),
        });
    }
    if state.running.is_some() {
        return Some(ContainerState::Running);
    }
    state.waiting.as_ref().map(|waiting| ContainerState::Waiting {
        reason: waiting.reason.clone().unwrap_or_default(),
        message: waiting.message.clone().unwrap_or_default(),
    })
}

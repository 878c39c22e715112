//! Translation of a step into a complete workload description

use super::naming::{generated_name, sanitize_label_value};
use super::steps::translate;
use super::{ContainerSpec, OwnerReference, VolumeSource, VolumeSpec, WorkloadSpec};
use std::collections::BTreeMap;
use wharf_config::constants::{
    ANNOTATION_STEP_TYPE, INIT_CONTAINER_NAME, LABEL_BUILD_ID, LABEL_INSTANCE_ID,
    LABEL_PROJECT_ID, LABEL_STAGE, LABEL_STEP, LABEL_STEP_TYPE, REPO_VOLUME_NAME,
};
use wharf_config::{Config, OwnerConfig, RunConfig, WorkloadConfig};
use wharf_errors::{ConfigError, Error};
use wharf_types::Step;

/// Keeps the init container alive until it receives SIGINT
const INIT_HOLD_SCRIPT: &str = "trap 'exit 0' INT; while :; do sleep 1; done";

/// Command that extracts a tar stream read from stdin into the repo volume
#[must_use]
pub fn transfer_command(repo_mount_path: &str) -> Vec<String> {
    ["tar", "-xf", "-", "-C", repo_mount_path]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Command that releases the init container's hold
#[must_use]
pub fn continue_command() -> Vec<String> {
    ["/bin/sh", "-c", "kill -INT 1"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Pure translation from steps to workload descriptions
#[derive(Debug, Clone, Default)]
pub struct WorkloadSpecBuilder {
    workload: WorkloadConfig,
    owner: OwnerConfig,
    run: RunConfig,
}

impl WorkloadSpecBuilder {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            workload: config.workload.clone(),
            owner: config.owner.clone(),
            run: config.run.clone(),
        }
    }

    /// Path inside the workload where the workspace is extracted
    #[must_use]
    pub fn repo_mount_path(&self) -> &str {
        &self.workload.repo_mount_path
    }

    /// Describe the workload that runs `step` of `stage`
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the step is missing required settings or
    /// its translation yields no application container.
    pub fn build(&self, stage: &str, step: &Step) -> Result<WorkloadSpec, Error> {
        let type_name = step.step_type.type_name();
        let translation = translate(&self.workload, step)?;
        if translation.containers.is_empty() {
            return Err(ConfigError::NoApplicationContainer {
                step: step.name.clone(),
                step_type: type_name.to_string(),
            }
            .into());
        }

        let mut volumes = vec![VolumeSpec {
            name: REPO_VOLUME_NAME.to_string(),
            source: VolumeSource::EmptyDir,
        }];
        volumes.extend(translation.volumes);

        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_STEP_TYPE.to_string(), type_name.to_string());

        Ok(WorkloadSpec {
            generate_name: generated_name(&self.workload.name_prefix, type_name, &step.name),
            labels: self.labels(stage, step),
            annotations,
            owner_references: self.owner_references(),
            service_account: translation
                .service_account
                .or_else(|| self.workload.service_account.clone()),
            init_containers: vec![self.init_container()],
            containers: translation.containers,
            volumes,
        })
    }

    fn init_container(&self) -> ContainerSpec {
        ContainerSpec {
            name: INIT_CONTAINER_NAME.to_string(),
            image: self.workload.init_image.clone(),
            command: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                INIT_HOLD_SCRIPT.to_string(),
            ],
            ..ContainerSpec::default()
        }
        .with_mount(REPO_VOLUME_NAME, &self.workload.repo_mount_path, false)
    }

    fn labels(&self, stage: &str, step: &Step) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        let mut insert = |key: &str, value: &str| {
            let value = sanitize_label_value(value);
            if !value.is_empty() {
                labels.insert(key.to_string(), value);
            }
        };

        insert(LABEL_STEP_TYPE, step.step_type.type_name());
        insert(LABEL_STEP, &step.name);
        insert(LABEL_STAGE, stage);
        if let Some(id) = &self.run.project_id {
            insert(LABEL_PROJECT_ID, id);
        }
        if let Some(id) = &self.run.instance_id {
            insert(LABEL_INSTANCE_ID, id);
        }
        if let Some(id) = &self.run.build_id {
            insert(LABEL_BUILD_ID, id);
        }
        labels
    }

    fn owner_references(&self) -> Vec<OwnerReference> {
        if !self.owner.is_active() {
            return Vec::new();
        }
        vec![OwnerReference {
            api_version: self.owner.api_version.clone(),
            kind: self.owner.kind.clone(),
            name: self.owner.name.clone(),
            uid: self.owner.uid.clone(),
        }]
    }
}

//! Per step-type translation into application containers

use super::{ContainerSpec, EnvVar, VolumeSource, VolumeSpec};
use wharf_config::constants::{
    KUBECONFIG_MOUNT_PATH, KUBECONFIG_VOLUME_NAME, REPO_VOLUME_NAME, STEP_CONTAINER_NAME,
};
use wharf_config::WorkloadConfig;
use wharf_errors::{ConfigError, Error};
use wharf_types::{
    ContainerStep, DockerStep, HelmPackageStep, HelmStep, KubectlStep, NuGetPackageStep, Step,
    StepType,
};

const KANIKO_DOCKER_CONFIG: &str = "/kaniko/.docker";
const NUGET_TOKEN_SECRET: &str = "nuget-token";

/// What a step type contributes to its workload
#[derive(Debug, Default)]
pub(super) struct Translation {
    pub containers: Vec<ContainerSpec>,
    pub volumes: Vec<VolumeSpec>,
    pub service_account: Option<String>,
}

impl Translation {
    fn single(container: ContainerSpec) -> Self {
        Self {
            containers: vec![container],
            ..Self::default()
        }
    }

    fn with_volume(mut self, volume: VolumeSpec) -> Self {
        self.volumes.push(volume);
        self
    }
}

pub(super) fn translate(config: &WorkloadConfig, step: &Step) -> Result<Translation, Error> {
    let required = Required { step };
    match &step.step_type {
        StepType::Container(container) => container_step(config, &required, container),
        StepType::Docker(docker) => docker_step(config, &required, docker),
        StepType::Helm(helm) => helm_step(config, &required, helm),
        StepType::Kubectl(kubectl) => kubectl_step(config, &required, kubectl),
        StepType::HelmPackage(package) => helm_package_step(config, &required, package),
        StepType::NuGetPackage(package) => nuget_package_step(config, &required, package),
    }
}

/// Checks required step fields, naming the step in errors
struct Required<'a> {
    step: &'a Step,
}

impl Required<'_> {
    fn field<'v>(&self, field: &str, value: &'v str) -> Result<&'v str, Error> {
        if value.trim().is_empty() {
            return Err(self.missing(field));
        }
        Ok(value)
    }

    fn missing(&self, field: &str) -> Error {
        ConfigError::MissingField {
            step: self.step.name.clone(),
            step_type: self.step.step_type.type_name().to_string(),
            field: field.to_string(),
        }
        .into()
    }
}

fn step_container(config: &WorkloadConfig, image: &str) -> ContainerSpec {
    ContainerSpec {
        name: STEP_CONTAINER_NAME.to_string(),
        image: image.to_string(),
        working_dir: Some(config.repo_mount_path.clone()),
        ..ContainerSpec::default()
    }
    .with_mount(REPO_VOLUME_NAME, &config.repo_mount_path, false)
}

fn shell_container(config: &WorkloadConfig, image: &str, script: String) -> ContainerSpec {
    let mut container = step_container(config, image);
    container.command = vec!["/bin/sh".to_string(), "-c".to_string(), script];
    container
}

fn repo_path(config: &WorkloadConfig, relative: &str) -> String {
    let relative = relative.trim_start_matches("./").trim_start_matches('/');
    if relative.is_empty() {
        config.repo_mount_path.clone()
    } else {
        format!("{}/{relative}", config.repo_mount_path.trim_end_matches('/'))
    }
}

fn kubeconfig_volume(config: &WorkloadConfig, cluster: &str) -> VolumeSpec {
    let key = if cluster.is_empty() { "config" } else { cluster };
    VolumeSpec {
        name: KUBECONFIG_VOLUME_NAME.to_string(),
        source: VolumeSource::Secret {
            secret_name: config.kubeconfig_secret.clone(),
            items: vec![(key.to_string(), "config".to_string())],
        },
    }
}

fn container_step(
    config: &WorkloadConfig,
    required: &Required<'_>,
    step: &ContainerStep,
) -> Result<Translation, Error> {
    let image = required.field("image", &step.image)?;
    if step.cmds.is_empty() {
        return Err(required.missing("cmds"));
    }
    if step.os != "linux" {
        return Err(ConfigError::InvalidValue {
            field: format!("{}.os", required.step.name),
            value: step.os.clone(),
        }
        .into());
    }

    let mut container = step_container(config, image);
    container.command = vec![step.shell.clone(), "-c".to_string(), step.cmds.join("\n")];
    container.env_from_secret.clone_from(&step.secret_name);

    let mut translation = Translation::single(container);
    translation.service_account.clone_from(&step.service_account);
    Ok(translation)
}

fn docker_step(
    config: &WorkloadConfig,
    required: &Required<'_>,
    step: &DockerStep,
) -> Result<Translation, Error> {
    let dockerfile = required.field("file", &step.file)?;

    let mut args = vec![
        format!("--dockerfile={}", repo_path(config, dockerfile)),
        format!("--context=dir://{}", repo_path(config, &step.context)),
    ];

    if step.push {
        let registry = required.field("registry", &step.registry)?;
        let name = required.field("name", &step.name)?;
        let repository = [registry.trim_end_matches('/'), step.group.as_str(), name]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/");
        for tag in step.tag.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            args.push(format!("--destination={repository}:{tag}"));
        }
    } else {
        args.push("--no-push".to_string());
    }
    args.extend(step.args.iter().map(|arg| format!("--build-arg={arg}")));

    let mut container = step_container(config, &config.kaniko_image);
    container.args = args;

    let Some(secret) = &step.secret_name else {
        return Ok(Translation::single(container));
    };
    container = container.with_mount("docker-config", KANIKO_DOCKER_CONFIG, true);
    Ok(Translation::single(container).with_volume(VolumeSpec {
        name: "docker-config".to_string(),
        source: VolumeSource::Secret {
            secret_name: secret.clone(),
            items: vec![(".dockerconfigjson".to_string(), "config.json".to_string())],
        },
    }))
}

fn helm_step(
    config: &WorkloadConfig,
    required: &Required<'_>,
    step: &HelmStep,
) -> Result<Translation, Error> {
    let chart = required.field("chart", &step.chart)?;
    let release = required.field("name", &step.name)?;
    let namespace = required.field("namespace", &step.namespace)?;

    let mut command = vec![
        "helm".to_string(),
        "upgrade".to_string(),
        "--install".to_string(),
        release.to_string(),
        chart.to_string(),
        "--namespace".to_string(),
        namespace.to_string(),
    ];
    if !step.repo.is_empty() {
        command.extend(["--repo".to_string(), step.repo.clone()]);
    }
    if !step.chart_version.is_empty() {
        command.extend(["--version".to_string(), step.chart_version.clone()]);
    }
    for file in &step.files {
        command.extend(["--values".to_string(), repo_path(config, file)]);
    }
    for (key, value) in &step.set {
        command.extend(["--set".to_string(), format!("{key}={value}")]);
    }

    let image = if step.helm_version.is_empty() {
        config.helm_image.clone()
    } else {
        let repository = config
            .helm_image
            .rsplit_once(':')
            .map_or(config.helm_image.as_str(), |(repo, _)| repo);
        format!("{repository}:{}", step.helm_version.trim_start_matches('v'))
    };

    let mut container = step_container(config, &image);
    container.command = command;
    let container = container.with_mount(KUBECONFIG_VOLUME_NAME, KUBECONFIG_MOUNT_PATH, true);
    Ok(Translation::single(container).with_volume(kubeconfig_volume(config, &step.cluster)))
}

fn kubectl_step(
    config: &WorkloadConfig,
    required: &Required<'_>,
    step: &KubectlStep,
) -> Result<Translation, Error> {
    let action = required.field("action", &step.action)?;
    let files: Vec<&str> = std::iter::once(step.file.as_str())
        .chain(step.files.iter().map(String::as_str))
        .filter(|file| !file.trim().is_empty())
        .collect();
    if files.is_empty() {
        return Err(required.missing("file"));
    }

    let mut command = vec!["kubectl".to_string(), action.to_string()];
    if !step.namespace.is_empty() {
        command.extend(["--namespace".to_string(), step.namespace.clone()]);
    }
    if step.force {
        command.push("--force".to_string());
    }
    for file in files {
        command.extend(["-f".to_string(), repo_path(config, file)]);
    }

    let mut container = step_container(config, &config.kubectl_image);
    container.command = command;
    let container = container.with_mount(KUBECONFIG_VOLUME_NAME, KUBECONFIG_MOUNT_PATH, true);
    Ok(Translation::single(container).with_volume(kubeconfig_volume(config, &step.cluster)))
}

fn helm_package_step(
    config: &WorkloadConfig,
    required: &Required<'_>,
    step: &HelmPackageStep,
) -> Result<Translation, Error> {
    let chart_path = required.field("chartPath", &step.chart_path)?;
    let destination = required.field("destination", &step.destination)?;

    let mut package = format!(
        "helm package {} --destination /tmp/charts",
        repo_path(config, chart_path)
    );
    if !step.version.is_empty() {
        package = format!("{package} --version {0} --app-version {0}", step.version);
    }
    let script = format!(
        "set -e\n{package}\nfor chart in /tmp/charts/*.tgz; do wget -q -O- --post-file=\"$chart\" {}/api/charts; done",
        destination.trim_end_matches('/')
    );

    Ok(Translation::single(shell_container(config, &config.helm_image, script)))
}

fn nuget_package_step(
    config: &WorkloadConfig,
    required: &Required<'_>,
    step: &NuGetPackageStep,
) -> Result<Translation, Error> {
    let project = required.field("projectPath", &step.project_path)?;
    let repo = required.field("repo", &step.repo)?;
    let version = required.field("version", &step.version)?;

    let mut push = format!(
        "dotnet nuget push /tmp/nuget/*.nupkg --source {repo} --api-key \"$NUGET_TOKEN\""
    );
    if step.skip_duplicate {
        push.push_str(" --skip-duplicate");
    }
    let script = format!(
        "set -e\ndotnet pack {} -c Release -p:PackageVersion={version} -o /tmp/nuget\n{push}",
        repo_path(config, project)
    );

    let mut container = shell_container(config, &config.dotnet_image, script);
    container
        .env
        .push(EnvVar::from_secret("NUGET_TOKEN", NUGET_TOKEN_SECRET, "token"));
    Ok(Translation::single(container))
}

//! Fixed names shared by every generated workload
//!
//! These are deliberately not configurable so that tooling watching the
//! cluster can rely on them.

pub const LABEL_STEP_TYPE: &str = "wharf.iver.com/type";
pub const LABEL_STEP: &str = "wharf.iver.com/step";
pub const LABEL_STAGE: &str = "wharf.iver.com/stage";
pub const LABEL_PROJECT_ID: &str = "wharf.iver.com/project-id";
pub const LABEL_INSTANCE_ID: &str = "wharf.iver.com/instance-id";
pub const LABEL_BUILD_ID: &str = "wharf.iver.com/build-id";
pub const ANNOTATION_STEP_TYPE: &str = "wharf.iver.com/step-type";

pub const INIT_CONTAINER_NAME: &str = "init";
pub const STEP_CONTAINER_NAME: &str = "step";
pub const REPO_VOLUME_NAME: &str = "repo";
pub const KUBECONFIG_VOLUME_NAME: &str = "kubeconfig";
pub const KUBECONFIG_MOUNT_PATH: &str = "/root/.kube";

/// Longest prefix handed to the cluster before it appends its own suffix
pub const MAX_GENERATED_NAME_PREFIX: usize = 42;

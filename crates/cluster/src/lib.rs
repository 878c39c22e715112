#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Kubernetes backend for the wharf build runner
//!
//! Every workload becomes a pod in the configured namespace. The pod is
//! watched by name, exec'd into over the websocket attach protocol and
//! deleted with a zero grace period.

mod convert;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use futures::AsyncBufReadExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{AttachParams, DeleteParams, LogParams, PostParams};
use kube::config::KubeConfigOptions;
use kube::runtime::watcher;
use kube::{Api, Client};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;
use wharf_builder::workload::WorkloadSpec;
use wharf_builder::{ExecInput, Orchestrator, WorkloadEvent};
use wharf_config::KubernetesConfig;
use wharf_errors::{Error, OrchestratorError, WorkloadPhase};

/// `Orchestrator` backed by pods of one namespace
#[derive(Clone)]
pub struct KubeOrchestrator {
    pods: Api<Pod>,
    namespace: String,
}

impl std::fmt::Debug for KubeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeOrchestrator")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KubeOrchestrator {
    /// Use an existing client
    #[must_use]
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }

    /// Connect using the in-cluster environment or the local kubeconfig
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Client` if no usable cluster configuration
    /// is found or the client cannot be built from it.
    pub async fn connect(config: &KubernetesConfig) -> Result<Self, Error> {
        let client_config = match &config.context {
            Some(context) => kube::Config::from_kubeconfig(&KubeConfigOptions {
                context: Some(context.clone()),
                ..KubeConfigOptions::default()
            })
            .await
            .map_err(client_error)?,
            None => kube::Config::infer().await.map_err(client_error)?,
        };
        let client = Client::try_from(client_config).map_err(client_error)?;
        debug!(namespace = %config.namespace, "connected to cluster");
        Ok(Self::new(client, &config.namespace))
    }

    /// Namespace workloads are created in
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

fn client_error(err: impl std::fmt::Display) -> Error {
    OrchestratorError::Client {
        message: err.to_string(),
    }
    .into()
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn create(&self, spec: &WorkloadSpec) -> Result<String, Error> {
        let create_error = |message: String| -> Error {
            OrchestratorError::Create {
                name_prefix: spec.generate_name.clone(),
                message,
            }
            .into()
        };

        let pod = self
            .pods
            .create(&PostParams::default(), &convert::pod_from_spec(spec))
            .await
            .map_err(|e| create_error(e.to_string()))?;
        pod.metadata
            .name
            .ok_or_else(|| create_error("created pod has no name".to_string()))
    }

    async fn watch(
        &self,
        workload: &str,
        phase: WorkloadPhase,
    ) -> Result<BoxStream<'static, Result<WorkloadEvent, Error>>, Error> {
        let name = workload.to_string();
        let config = watcher::Config::default().fields(&format!("metadata.name={workload}"));
        let events = watcher(self.pods.clone(), config)
            .filter_map(move |event| {
                let event = match event {
                    Ok(watcher::Event::Apply(pod) | watcher::Event::InitApply(pod)) => Some(Ok(
                        WorkloadEvent::Modified(convert::workload_status(&pod)),
                    )),
                    Ok(watcher::Event::Delete(_)) => Some(Ok(WorkloadEvent::Deleted)),
                    Ok(watcher::Event::Init | watcher::Event::InitDone) => None,
                    Err(err) => Some(Err(OrchestratorError::Watch {
                        workload: name.clone(),
                        phase,
                        message: err.to_string(),
                    }
                    .into())),
                };
                futures::future::ready(event)
            })
            .boxed();
        Ok(events)
    }

    async fn exec(
        &self,
        workload: &str,
        container: &str,
        phase: WorkloadPhase,
        command: &[String],
        stdin: Option<ExecInput>,
    ) -> Result<(), Error> {
        let exec_error = |message: String| -> Error {
            OrchestratorError::Exec {
                workload: workload.to_string(),
                phase,
                message,
            }
            .into()
        };

        let params = AttachParams::default()
            .container(container)
            .stdin(stdin.is_some())
            .stdout(false)
            .stderr(true);
        let mut process = self
            .pods
            .exec(workload, command.to_vec(), &params)
            .await
            .map_err(|e| exec_error(e.to_string()))?;

        let writer = process.stdin();
        let stderr = process.stderr();
        let status = process.take_status();

        let feed = async move {
            if let (Some(mut input), Some(mut writer)) = (stdin, writer) {
                tokio::io::copy(&mut input, &mut writer).await?;
                writer.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let collect = async move {
            let mut output = String::new();
            if let Some(mut stderr) = stderr {
                stderr.read_to_string(&mut output).await?;
            }
            Ok::<_, std::io::Error>(output)
        };
        let (fed, output) = tokio::join!(feed, collect);
        fed.map_err(|e| exec_error(format!("writing stdin: {e}")))?;
        let output = output.unwrap_or_default();

        let status = match status {
            Some(status) => status.await,
            None => None,
        };
        process
            .join()
            .await
            .map_err(|e| exec_error(e.to_string()))?;

        match status {
            Some(status) if status.status.as_deref() == Some("Failure") => {
                let mut message = status.message.unwrap_or_else(|| "command failed".to_string());
                let output = output.trim();
                if !output.is_empty() {
                    message = format!("{message}: {output}");
                }
                Err(exec_error(message))
            }
            _ => Ok(()),
        }
    }

    async fn logs(
        &self,
        workload: &str,
        container: &str,
    ) -> Result<BoxStream<'static, Result<String, Error>>, Error> {
        let params = LogParams {
            container: Some(container.to_string()),
            follow: true,
            ..LogParams::default()
        };
        let logs_error = |message: String| -> Error {
            OrchestratorError::Logs {
                workload: workload.to_string(),
                message,
            }
            .into()
        };

        let reader = self
            .pods
            .log_stream(workload, &params)
            .await
            .map_err(|e| logs_error(e.to_string()))?;
        let name = workload.to_string();
        let lines = reader
            .lines()
            .map(move |line| {
                line.map_err(|e| {
                    OrchestratorError::Logs {
                        workload: name.clone(),
                        message: e.to_string(),
                    }
                    .into()
                })
            })
            .boxed();
        Ok(lines)
    }

    async fn delete(&self, workload: &str) -> Result<(), Error> {
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..DeleteParams::default()
        };
        match self.pods.delete(workload, &params).await {
            Ok(_) => Ok(()),
            // Already gone, e.g. removed by its owner
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
            Err(err) => Err(OrchestratorError::Delete {
                workload: workload.to_string(),
                message: err.to_string(),
            }
            .into()),
        }
    }
}

//! Integration tests for the build coordinator against a scripted orchestrator

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream, StreamExt};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio_util::sync::CancellationToken;
    use wharf_builder::*;
    use wharf_config::constants::{INIT_CONTAINER_NAME, LABEL_STEP};
    use wharf_config::Config;
    use wharf_errors::{Error, ExecutionError, OrchestratorError, WorkloadPhase};
    use wharf_events::{AppEvent, BuildEvent, EventReceiver, GeneralEvent};
    use wharf_types::{
        BuildOptions, ContainerStep, Definition, Stage, Status, Step, StepType,
    };

    /// Scripted behaviour of the workload of one step
    #[derive(Debug, Clone)]
    enum Script {
        /// Runs, prints the given lines and exits 0
        Succeed(Vec<String>),
        /// Runs, then exits with the given code
        Exit(i32),
        /// Exits 0 before ever being reported as running
        CompleteWithoutRunning,
        /// Never leaves its waiting state
        Hang,
        /// Workload is deleted while waiting for the init container
        DeletedDuringInit,
        /// The create call itself fails
        RejectCreate,
        /// The workspace transfer exec never finishes
        StallTransfer,
        /// Prints one line, then keeps its log stream open
        StallLogs,
        /// Succeeds, but its workload cannot be deleted
        FailDelete,
        /// Init watch ends while the init container is still waiting
        InitWatchCloses,
    }

    #[derive(Default)]
    struct FakeOrchestrator {
        scripts: HashMap<String, Script>,
        counter: AtomicUsize,
        created: Mutex<HashMap<String, String>>,
        deleted: Mutex<Vec<String>>,
        execs: Mutex<Vec<(String, String, Vec<String>)>>,
        archives: Mutex<Vec<Vec<u8>>>,
    }

    impl FakeOrchestrator {
        fn with_scripts(scripts: &[(&str, Script)]) -> Arc<Self> {
            Arc::new(Self {
                scripts: scripts
                    .iter()
                    .map(|(step, script)| ((*step).to_string(), script.clone()))
                    .collect(),
                ..Self::default()
            })
        }

        fn script_for(&self, workload: &str) -> Script {
            let created = self.created.lock().unwrap();
            let step = created.get(workload).cloned().unwrap_or_default();
            self.scripts
                .get(&step)
                .cloned()
                .unwrap_or_else(|| Script::Succeed(Vec::new()))
        }

        fn create_count(&self) -> usize {
            self.created.lock().unwrap().len()
        }

        fn delete_count(&self) -> usize {
            self.deleted.lock().unwrap().len()
        }
    }

    fn modified(init: Option<ContainerState>, step: Option<ContainerState>) -> WorkloadEvent {
        WorkloadEvent::Modified(WorkloadStatus { init, step })
    }

    fn terminated(exit_code: i32) -> Option<ContainerState> {
        Some(ContainerState::Terminated {
            exit_code,
            reason: "Completed".to_string(),
        })
    }

    fn events(items: Vec<WorkloadEvent>) -> BoxStream<'static, Result<WorkloadEvent, Error>> {
        stream::iter(items.into_iter().map(Ok)).boxed()
    }

    #[async_trait]
    impl Orchestrator for FakeOrchestrator {
        async fn create(&self, spec: &WorkloadSpec) -> Result<String, Error> {
            let step = spec.labels.get(LABEL_STEP).cloned().unwrap_or_default();
            if matches!(self.scripts.get(&step), Some(Script::RejectCreate)) {
                return Err(OrchestratorError::Create {
                    name_prefix: spec.generate_name.clone(),
                    message: "quota exceeded".to_string(),
                }
                .into());
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let name = format!("{}-{n}", spec.generate_name);
            self.created.lock().unwrap().insert(name.clone(), step);
            Ok(name)
        }

        async fn watch(
            &self,
            workload: &str,
            phase: WorkloadPhase,
        ) -> Result<BoxStream<'static, Result<WorkloadEvent, Error>>, Error> {
            let script = self.script_for(workload);
            let running = Some(ContainerState::Running);
            let pending = Some(ContainerState::Waiting {
                reason: "PodInitializing".to_string(),
                message: String::new(),
            });

            let stream = match (phase, script) {
                (_, Script::Hang) => stream::pending().boxed(),
                (WorkloadPhase::Init, Script::DeletedDuringInit) => {
                    events(vec![modified(pending, None), WorkloadEvent::Deleted])
                }
                (WorkloadPhase::Init, Script::InitWatchCloses) => {
                    events(vec![modified(pending, None)])
                }
                (WorkloadPhase::Init, _) => events(vec![
                    modified(pending, None),
                    modified(running, None),
                ]),
                (_, Script::Succeed(_) | Script::FailDelete) => events(vec![
                    modified(terminated(0), running),
                    modified(terminated(0), terminated(0)),
                ]),
                (_, Script::Exit(code)) => events(vec![
                    modified(terminated(0), running),
                    modified(terminated(0), terminated(code)),
                ]),
                (_, Script::CompleteWithoutRunning) => {
                    events(vec![modified(terminated(0), terminated(0))])
                }
                (_, Script::StallLogs) => events(vec![modified(terminated(0), running)])
                    .chain(stream::pending())
                    .boxed(),
                (
                    _,
                    Script::DeletedDuringInit
                    | Script::RejectCreate
                    | Script::StallTransfer
                    | Script::InitWatchCloses,
                ) => events(Vec::new()),
            };
            Ok(stream)
        }

        async fn exec(
            &self,
            workload: &str,
            container: &str,
            _phase: WorkloadPhase,
            command: &[String],
            stdin: Option<ExecInput>,
        ) -> Result<(), Error> {
            self.execs.lock().unwrap().push((
                workload.to_string(),
                container.to_string(),
                command.to_vec(),
            ));
            if let Some(mut stdin) = stdin {
                if matches!(self.script_for(workload), Script::StallTransfer) {
                    let _reader = stdin;
                    return futures::future::pending().await;
                }
                let mut archive = Vec::new();
                stdin.read_to_end(&mut archive).await?;
                self.archives.lock().unwrap().push(archive);
            }
            Ok(())
        }

        async fn logs(
            &self,
            workload: &str,
            _container: &str,
        ) -> Result<BoxStream<'static, Result<String, Error>>, Error> {
            let lines = match self.script_for(workload) {
                Script::Succeed(lines) => lines,
                Script::StallLogs => {
                    return Ok(stream::iter(vec![Ok("x".to_string())])
                        .chain(stream::pending())
                        .boxed())
                }
                Script::CompleteWithoutRunning => {
                    return Err(OrchestratorError::Logs {
                        workload: workload.to_string(),
                        message: "container has exited".to_string(),
                    }
                    .into())
                }
                _ => Vec::new(),
            };
            Ok(stream::iter(lines.into_iter().map(Ok)).boxed())
        }

        async fn delete(&self, workload: &str) -> Result<(), Error> {
            self.deleted.lock().unwrap().push(workload.to_string());
            if matches!(self.script_for(workload), Script::FailDelete) {
                return Err(OrchestratorError::Delete {
                    workload: workload.to_string(),
                    message: "connection refused".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    fn container(name: &str) -> Step {
        Step::new(
            name,
            StepType::Container(ContainerStep {
                image: "alpine:3".to_string(),
                cmds: vec!["make test".to_string()],
                ..ContainerStep::default()
            }),
        )
    }

    fn stage(name: &str, steps: &[&str]) -> Stage {
        Stage::new(name, steps.iter().map(|step| container(step)).collect())
    }

    fn workspace() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Makefile"), "test:\n\ttrue\n").unwrap();
        dir
    }

    fn builder(
        orchestrator: &Arc<FakeOrchestrator>,
        workspace: &Path,
        definition: Definition,
    ) -> (Builder, EventReceiver) {
        let orchestrator: Arc<dyn Orchestrator> = orchestrator.clone();
        let (tx, rx) = wharf_events::channel();
        let context = BuildContext::new(orchestrator, &Config::default(), workspace.to_path_buf())
            .with_event_sender(tx);
        (Builder::new(context, definition), rx)
    }

    fn cancel_after(token: &CancellationToken, delay: Duration) {
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            canceller.cancel();
        });
    }

    fn step_output(rx: &mut EventReceiver) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Build(BuildEvent::StepOutput { line, .. }) = event {
                lines.push(line);
            }
        }
        lines
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[]);
        let definition = Definition {
            stages: vec![stage("test", &["unit", "lint", "docs"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Success);
        assert_eq!(result.stages.len(), 1);
        assert_eq!(result.stages[0].status, Status::Success);
        assert_eq!(result.stages[0].steps.len(), 3);
        assert!(result.stages[0]
            .steps
            .iter()
            .all(|step| step.status == Status::Success && step.step_type == "container"));
        assert_eq!(fake.create_count(), 3);
        assert_eq!(fake.delete_count(), 3);
    }

    #[tokio::test]
    async fn test_stops_at_first_failed_stage() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[("b1", Script::Exit(2))]);
        let definition = Definition {
            stages: vec![stage("A", &["a1"]), stage("B", &["b1"]), stage("C", &["c1"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Failed);
        let names: Vec<_> = result.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(result.stages[1].status, Status::Failed);
        let error = result.stages[1].steps[0].error.clone().unwrap();
        assert!(matches!(
            error,
            Error::Execution(ExecutionError::NonZeroExit { exit_code: 2, .. })
        ));
        assert_eq!(fake.create_count(), 2);
        assert_eq!(fake.delete_count(), 2);
    }

    #[tokio::test]
    async fn test_stage_filter_selects_single_stage() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[]);
        let definition = Definition {
            stages: vec![stage("A", &["a1"]), stage("B", &["b1", "b2"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);
        let builder = builder.with_options(BuildOptions::with_stage_filter("B"));

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Success);
        assert_eq!(result.stages.len(), 1);
        assert_eq!(result.stages[0].name, "B");
        assert_eq!(result.options.stage_filter, "B");
        assert_eq!(fake.create_count(), 2);
    }

    #[tokio::test]
    async fn test_no_selected_stage_is_status_none() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[]);
        let definition = Definition {
            stages: vec![stage("A", &["a1"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);
        let builder = builder.with_options(BuildOptions::with_stage_filter("deploy"));

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::None);
        assert!(result.stages.is_empty());
        assert_eq!(fake.create_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_cancels_siblings() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[
            ("broken", Script::Exit(1)),
            ("slow-a", Script::Hang),
            ("slow-b", Script::Hang),
        ]);
        let definition = Definition {
            stages: vec![stage("test", &["slow-a", "broken", "slow-b"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Failed);
        let stage = &result.stages[0];
        assert_eq!(stage.status, Status::Failed);
        assert_eq!(stage.steps.len(), 3);
        for step in &stage.steps {
            let expected = if step.name == "broken" {
                Status::Failed
            } else {
                Status::Cancelled
            };
            assert_eq!(step.status, expected, "step {}", step.name);
        }
        assert_eq!(fake.create_count(), fake.delete_count());
    }

    #[tokio::test]
    async fn test_cancelled_build_deletes_every_workload() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[
            ("a1", Script::Hang),
            ("a2", Script::Hang),
            ("b1", Script::Succeed(Vec::new())),
        ]);
        let definition = Definition {
            stages: vec![stage("A", &["a1", "a2"]), stage("B", &["b1"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = builder.build(&token).await.unwrap();

        assert_eq!(result.status, Status::Cancelled);
        assert_eq!(result.stages.len(), 1);
        assert!(result.stages[0]
            .steps
            .iter()
            .all(|step| step.status == Status::Cancelled));
        assert_eq!(fake.create_count(), 2);
        assert_eq!(fake.delete_count(), 2);
    }

    #[tokio::test]
    async fn test_exit_zero_without_running_is_success() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[("quick", Script::CompleteWithoutRunning)]);
        let definition = Definition {
            stages: vec![stage("test", &["quick"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Success);
        assert!(result.stages[0].steps[0].error.is_none());
        assert_eq!(fake.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_create_is_not_deleted() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[("nope", Script::RejectCreate)]);
        let definition = Definition {
            stages: vec![stage("test", &["nope"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Failed);
        assert!(matches!(
            result.stages[0].steps[0].error,
            Some(Error::Orchestrator(OrchestratorError::Create { .. }))
        ));
        assert_eq!(fake.create_count(), 0);
        assert_eq!(fake.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_deleted_workload_fails_step() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[("evicted", Script::DeletedDuringInit)]);
        let definition = Definition {
            stages: vec![stage("test", &["evicted"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Failed);
        assert!(matches!(
            result.stages[0].steps[0].error,
            Some(Error::Orchestrator(OrchestratorError::WorkloadDeleted {
                phase: WorkloadPhase::Init,
                ..
            }))
        ));
        assert_eq!(fake.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_transfers_workspace_then_continues() {
        let ws = workspace();
        std::fs::create_dir(ws.path().join(".git")).unwrap();
        std::fs::write(ws.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        let fake = FakeOrchestrator::with_scripts(&[]);
        let definition = Definition {
            stages: vec![stage("test", &["unit"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        builder.build(&CancellationToken::new()).await.unwrap();

        let execs = fake.execs.lock().unwrap().clone();
        assert_eq!(execs.len(), 2);
        assert_eq!(execs[0].1, INIT_CONTAINER_NAME);
        assert_eq!(execs[0].2, transfer_command("/mnt/repo"));
        assert_eq!(execs[1].2, continue_command());

        let archives = fake.archives.lock().unwrap().clone();
        let mut archive = tar::Archive::new(archives[0].as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|entry| entry.unwrap().path().unwrap().display().to_string())
            .collect();
        assert_eq!(names, ["Makefile"]);
    }

    #[tokio::test]
    async fn test_step_output_keeps_last_overwrite() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[(
            "unit",
            Script::Succeed(vec![
                "compiling".to_string(),
                "10%\r55%\r100%".to_string(),
                "done\r".to_string(),
            ]),
        )]);
        let definition = Definition {
            stages: vec![stage("test", &["unit"])],
        };
        let (builder, mut rx) = builder(&fake, ws.path(), definition);

        builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(step_output(&mut rx), ["compiling", "100%", "done"]);
    }

    #[tokio::test]
    async fn test_duplicate_step_names_are_rejected() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[]);
        let definition = Definition {
            stages: vec![stage("test", &["unit", "unit"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let err = builder.build(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Config(wharf_errors::ConfigError::DuplicateStep { .. })
        ));
        assert_eq!(fake.create_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_transfer() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[("unit", Script::StallTransfer)]);
        let definition = Definition {
            stages: vec![stage("test", &["unit"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let token = CancellationToken::new();
        cancel_after(&token, Duration::from_millis(100));
        let result = builder.build(&token).await.unwrap();

        assert_eq!(result.status, Status::Cancelled);
        let step = &result.stages[0].steps[0];
        assert_eq!(step.status, Status::Cancelled);
        assert!(matches!(step.error, Some(Error::Cancelled)));
        assert_eq!(fake.execs.lock().unwrap().len(), 1);
        assert_eq!(fake.create_count(), 1);
        assert_eq!(fake.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_following_logs() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[("unit", Script::StallLogs)]);
        let definition = Definition {
            stages: vec![stage("test", &["unit"])],
        };
        let (builder, mut rx) = builder(&fake, ws.path(), definition);

        let token = CancellationToken::new();
        cancel_after(&token, Duration::from_millis(100));
        let result = builder.build(&token).await.unwrap();

        assert_eq!(result.status, Status::Cancelled);
        assert_eq!(result.stages[0].steps[0].status, Status::Cancelled);
        assert_eq!(step_output(&mut rx), ["x"]);
        assert_eq!(fake.create_count(), 1);
        assert_eq!(fake.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_step_outcome() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[("unit", Script::FailDelete)]);
        let definition = Definition {
            stages: vec![stage("test", &["unit"])],
        };
        let (builder, mut rx) = builder(&fake, ws.path(), definition);

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Success);
        assert_eq!(result.stages[0].steps[0].status, Status::Success);
        assert!(result.stages[0].steps[0].error.is_none());
        assert_eq!(fake.delete_count(), 1);

        let mut warnings = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::General(GeneralEvent::Warning { message, context }) = event {
                warnings.push((message, context));
            }
        }
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].0.starts_with("failed to delete workload"));
        assert!(warnings[0]
            .1
            .as_deref()
            .is_some_and(|context| context.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_closed_init_watch_fails_step() {
        let ws = workspace();
        let fake = FakeOrchestrator::with_scripts(&[("unit", Script::InitWatchCloses)]);
        let definition = Definition {
            stages: vec![stage("test", &["unit"])],
        };
        let (builder, _rx) = builder(&fake, ws.path(), definition);

        let result = builder.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.status, Status::Failed);
        assert!(matches!(
            result.stages[0].steps[0].error,
            Some(Error::Orchestrator(OrchestratorError::WatchClosed {
                phase: WorkloadPhase::Init,
                ..
            }))
        ));
        assert!(fake.execs.lock().unwrap().is_empty());
        assert_eq!(fake.create_count(), 1);
        assert_eq!(fake.delete_count(), 1);
    }

    #[test]
    fn test_generated_names_are_dns_safe() {
        let pattern = regex::Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap();
        let names = [
            ("container", "Unit Tests"),
            ("helm-package", "--weird__name--"),
            ("docker", "ÄÖÜ build & push"),
            ("kubectl", "a-very-long-step-name-that-keeps-going-and-going-forever"),
            ("nuget-package", "x"),
        ];
        for (step_type, step) in names {
            let name = generated_name("wharf-build", step_type, step);
            assert!(pattern.is_match(&name), "{name:?}");
            assert!(name.len() <= 42, "{name:?}");
        }
    }
}

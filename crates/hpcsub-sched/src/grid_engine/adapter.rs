//! Grid-engine adapter for job submission and tracking.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adapter::{
    BatchScheduler, JobHandle, StatusQuery, deletion_result, log_command, logged, run_logged,
    submission_failure,
};
use crate::error::SchedResult;
use crate::executor::CommandExecutor;
use crate::grid_engine::{parser, schema, templates};
use crate::log::LogSink;
use crate::params::{ParameterSchema, ResolvedParameters};
use crate::status::{JobStatus, QueryFailurePolicy, StateTable, StatusTable, output_lines};
use crate::template::{JobContext, ScriptRenderer};

/// Command lines for the grid-engine tools.
mod commands {
    use std::path::Path;

    use crate::executor::shell_quote;

    pub const GROUPS: &str = "groups";
    pub const QSTAT: &str = "qstat";
    pub const QSTAT_SUMMARY: &str = "qstat -g c";

    pub fn qsub(work_dir: &Path, log_dir: &Path, group: &str, script_path: &Path) -> String {
        format!(
            "cd {} && qsub -g {} -o {} -e {} {}",
            shell_quote(&work_dir.display().to_string()),
            shell_quote(group),
            shell_quote(&log_dir.join("execute.log").display().to_string()),
            shell_quote(&log_dir.join("error.log").display().to_string()),
            shell_quote(&script_path.display().to_string()),
        )
    }

    pub fn qdel(job_id: &str) -> String {
        format!("qdel {}", shell_quote(job_id))
    }
}

/// Configuration for the grid-engine adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridEngineConfig {
    /// Default `-g` group. Detected from `groups` when unset.
    pub group: Option<String>,

    /// Behavior when `qstat` itself fails.
    pub query_failure: QueryFailurePolicy,
}

impl GridEngineConfig {
    /// Set the default group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the query failure policy.
    pub fn with_query_failure(mut self, policy: QueryFailurePolicy) -> Self {
        self.query_failure = policy;
        self
    }

    /// Fill the group from `groups` output if it is not set.
    pub async fn detect_group(mut self, executor: &dyn CommandExecutor) -> SchedResult<Self> {
        if self.group.is_none() {
            let output = executor.run(commands::GROUPS).await?;
            self.group = parser::parse_groups_output(&output.stdout);
            debug!("Detected default group: {:?}", self.group);
        }
        Ok(self)
    }
}

/// Adapter for grid-engine HPC schedulers.
pub struct GridEngineAdapter {
    config: GridEngineConfig,
    schema: ParameterSchema,
    renderer: ScriptRenderer,
    states: StateTable,
    executor: Arc<dyn CommandExecutor>,
    log: Arc<dyn LogSink>,
}

impl GridEngineAdapter {
    /// Scheduler type name.
    pub const NAME: &'static str = "grid-engine";

    /// Create an adapter from a fully specified configuration.
    pub fn new(
        config: GridEngineConfig,
        executor: Arc<dyn CommandExecutor>,
        log: Arc<dyn LogSink>,
    ) -> SchedResult<Self> {
        let group = config.group.clone().unwrap_or_default();
        Ok(Self {
            schema: schema::build(&group)?,
            renderer: templates::renderer()?,
            states: parser::state_table()?,
            config,
            executor,
            log,
        })
    }

    /// Create an adapter, detecting the default group with `groups` if the
    /// configuration does not name one.
    pub async fn detect(
        config: GridEngineConfig,
        executor: Arc<dyn CommandExecutor>,
        log: Arc<dyn LogSink>,
    ) -> SchedResult<Self> {
        let config = config.detect_group(&*executor).await?;
        Self::new(config, executor, log)
    }

    /// Get the configuration.
    pub fn config(&self) -> &GridEngineConfig {
        &self.config
    }

    fn status_query(&self) -> StatusQuery<'_> {
        StatusQuery {
            states: &self.states,
            policy: self.config.query_failure,
            log: &*self.log,
        }
    }
}

#[async_trait]
impl BatchScheduler for GridEngineAdapter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    fn log(&self) -> &dyn LogSink {
        &*self.log
    }

    fn render(&self, params: &ResolvedParameters, job: &JobContext) -> SchedResult<String> {
        self.renderer
            .render(params, job)
            .map_err(|e| logged(&*self.log, e))
    }

    async fn submit(
        &self,
        script_path: &Path,
        work_dir: &Path,
        log_dir: &Path,
        params: &ResolvedParameters,
    ) -> SchedResult<JobHandle> {
        self.schema
            .validate(params)
            .map_err(|e| logged(&*self.log, e))?;

        let group = params.text("group")?;
        let cmd = commands::qsub(work_dir, log_dir, &group, script_path);
        log_command(&*self.log, &cmd);

        let output = self
            .executor
            .capture(&cmd)
            .await
            .map_err(|e| logged(&*self.log, e))?;

        if !output.success() {
            return Err(submission_failure(
                &*self.log,
                "return-code is not zero",
                &cmd,
                output,
                work_dir,
            ));
        }

        let Some(job_id) = parser::parse_qsub_output(&output.stdout) else {
            return Err(submission_failure(
                &*self.log,
                "failed to get job_id",
                &cmd,
                output,
                work_dir,
            ));
        };

        self.log.write_line(&format!("job_id: {job_id}"));
        info!("Submitted grid-engine job {}", job_id);

        Ok(JobHandle {
            job_id,
            raw_output: output_lines(&output.stdout),
        })
    }

    async fn status(&self, job_id: &str) -> SchedResult<JobStatus> {
        // The full listing is filtered here, so a failing qstat is never
        // mistaken for an empty match.
        let output = run_logged(&*self.executor, &*self.log, commands::QSTAT).await?;
        self.status_query().single(commands::QSTAT, &output, job_id)
    }

    async fn multiple_status(&self, job_ids: &[String]) -> SchedResult<StatusTable> {
        let output = run_logged(&*self.executor, &*self.log, commands::QSTAT).await?;
        self.status_query().bulk(commands::QSTAT, &output, job_ids)
    }

    async fn all_status(&self) -> SchedResult<String> {
        let output = run_logged(&*self.executor, &*self.log, commands::QSTAT_SUMMARY).await?;
        Ok(output.stdout)
    }

    async fn delete(&self, job_id: &str) -> SchedResult<String> {
        let output = run_logged(&*self.executor, &*self.log, &commands::qdel(job_id)).await?;
        deletion_result(&*self.log, job_id, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedError;
    use crate::executor::{CommandOutput, ExecMode, MockExecutor};
    use crate::log::MemoryLogSink;
    use crate::status::JobState;

    const QSTAT: &str = "\
job-ID  prior   name       user         state submit/start at     queue                          jclass                         slots ja-task-ID
------------------------------------------------------------------------------------------------------------------------------------------------
   1001 0.25586 run.sh     aaa1         r     01/15/2024 10:30:00 gpu@g0001                                                        80
   1002 0.00000 run.sh     aaa1         qw    01/15/2024 10:31:00                                                                  80
  10010 0.00000 other.sh   aaa1         Eqw   01/15/2024 10:32:00                                                                  80
";

    fn adapter(exec: MockExecutor) -> (GridEngineAdapter, Arc<MockExecutor>, Arc<MemoryLogSink>) {
        let exec = Arc::new(exec);
        let log = Arc::new(MemoryLogSink::new());
        let adapter = GridEngineAdapter::new(
            GridEngineConfig::default().with_group("gaa50000"),
            exec.clone(),
            log.clone(),
        )
        .unwrap();
        (adapter, exec, log)
    }

    #[tokio::test]
    async fn test_submit_builds_qsub_command() {
        let (adapter, exec, log) = adapter(
            MockExecutor::new().respond(CommandOutput::ok(
                "Your job 1001 (\"run.sh\") has been submitted\n",
            )),
        );
        let params = adapter.schema().defaults();
        let handle = adapter
            .submit(
                Path::new("/w/run_hpcsub0.sh"),
                Path::new("/w"),
                Path::new("/w/_log"),
                &params,
            )
            .await
            .unwrap();

        assert_eq!(handle.job_id, "1001");
        assert_eq!(
            handle.raw_output,
            vec!["Your job 1001 (\"run.sh\") has been submitted".to_string()]
        );
        assert_eq!(
            exec.issued(),
            vec![(
                ExecMode::Capture,
                "cd /w && qsub -g gaa50000 -o /w/_log/execute.log -e /w/_log/error.log /w/run_hpcsub0.sh"
                    .to_string()
            )]
        );
        assert!(log.contains("cmd: cd /w && qsub"));
        assert!(log.lines().iter().any(|l| l.starts_with("time: ")));
        assert!(log.contains("job_id: 1001"));
    }

    #[tokio::test]
    async fn test_submit_nonzero_exit() {
        let (adapter, _, log) = adapter(MockExecutor::new().respond(
            CommandOutput::failed(1, "Unable to run job: denied")
                .with_stdout("Your job 5 (\"x\") has been submitted\n"),
        ));
        let params = adapter.schema().defaults();
        let err = adapter
            .submit(Path::new("/w/s.sh"), Path::new("/w"), Path::new("/w/l"), &params)
            .await
            .unwrap_err();

        match &err {
            SchedError::Submission {
                stderr, exit_code, ..
            } => {
                assert_eq!(stderr, "Unable to run job: denied");
                assert_eq!(*exit_code, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(log.contains("return-code is not zero"));
        assert!(!log.contains("job_id: 5"));
    }

    #[tokio::test]
    async fn test_submit_unparseable_output() {
        let (adapter, _, log) =
            adapter(MockExecutor::new().respond(CommandOutput::ok("something odd\n")));
        let params = adapter.schema().defaults();
        let err = adapter
            .submit(Path::new("/w/s.sh"), Path::new("/w"), Path::new("/w/l"), &params)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedError::Submission { exit_code: Some(0), .. }));
        assert!(log.contains("failed to get job_id"));
    }

    #[test]
    fn test_validation_failure_is_logged() {
        let (adapter, _, log) = adapter(MockExecutor::new());
        let supplied = serde_json::json!({"walltime": "soon"});
        let params = adapter.resolve(supplied.as_object().unwrap()).unwrap();
        let err = adapter.validate(&params).unwrap_err();
        assert!(matches!(err, SchedError::Validation(_)));
        assert_eq!(log.lines(), vec![err.to_string()]);

        let err = adapter
            .resolve(serde_json::json!({"queue": "a"}).as_object().unwrap())
            .unwrap_err();
        assert!(log.contains(&err.to_string()));
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_parameters_without_running() {
        let (adapter, exec, _) = adapter(MockExecutor::new());
        let supplied = serde_json::json!({"priority": "high"});
        let params = adapter.resolve(supplied.as_object().unwrap()).unwrap();
        let err = adapter
            .submit(Path::new("/w/s.sh"), Path::new("/w"), Path::new("/w/l"), &params)
            .await
            .unwrap_err();
        assert!(matches!(err, SchedError::Validation(_)));
        assert!(exec.issued().is_empty());
    }

    #[tokio::test]
    async fn test_status_single() {
        let (adapter, exec, _) = adapter(MockExecutor::new().respond(CommandOutput::ok(QSTAT)));
        let status = adapter.status("1002").await.unwrap();
        assert_eq!(status.status, JobState::Queued);
        assert_eq!(status.raw_output.len(), 1);
        assert!(status.raw_output[0].trim_start().starts_with("1002 "));
        assert_eq!(exec.issued(), vec![(ExecMode::Run, "qstat".to_string())]);
    }

    #[tokio::test]
    async fn test_status_not_listed_is_finished() {
        let (adapter, _, _) = adapter(MockExecutor::new().respond(CommandOutput::ok(QSTAT)));
        let status = adapter.status("4242").await.unwrap();
        assert_eq!(status, JobStatus::gone());
    }

    #[tokio::test]
    async fn test_status_ignores_longer_ids() {
        let (adapter, _, _) = adapter(MockExecutor::new().respond(CommandOutput::ok(QSTAT)));
        let status = adapter.status("1001").await.unwrap();
        assert_eq!(status.status, JobState::Running);
    }

    #[tokio::test]
    async fn test_status_query_failure_policy() {
        let failing = || MockExecutor::new().respond(CommandOutput::failed(2, ""));

        let (adapter, _, log) = adapter(failing());
        assert_eq!(
            adapter.status("1").await.unwrap().status,
            JobState::Finished
        );
        assert!(log.contains("qstat failed (exit code 2), assuming finished"));

        let exec = Arc::new(failing());
        let strict = GridEngineAdapter::new(
            GridEngineConfig::default()
                .with_group("g")
                .with_query_failure(QueryFailurePolicy::Error),
            exec,
            Arc::new(MemoryLogSink::new()),
        )
        .unwrap();
        assert!(matches!(
            strict.status("1").await,
            Err(SchedError::StatusQuery { exit_code: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_qstat_errors_for_single_and_bulk_alike() {
        // Exit code 1 used to be read as "no line matched".
        for exit_code in [1, 127] {
            let strict = GridEngineAdapter::new(
                GridEngineConfig::default()
                    .with_group("g")
                    .with_query_failure(QueryFailurePolicy::Error),
                Arc::new(
                    MockExecutor::new()
                        .respond(CommandOutput::failed(exit_code, ""))
                        .respond(CommandOutput::failed(exit_code, "")),
                ),
                Arc::new(MemoryLogSink::new()),
            )
            .unwrap();

            let single = strict.status("1001").await;
            let bulk = strict.multiple_status(&["1001".to_string()]).await;
            assert!(
                matches!(single, Err(SchedError::StatusQuery { exit_code: c, .. }) if c == exit_code),
                "single, exit code {exit_code}"
            );
            assert!(
                matches!(bulk, Err(SchedError::StatusQuery { exit_code: c, .. }) if c == exit_code),
                "bulk, exit code {exit_code}"
            );
        }
    }

    #[tokio::test]
    async fn test_multiple_status() {
        let (adapter, exec, _) = adapter(MockExecutor::new().respond(CommandOutput::ok(QSTAT)));
        let ids: Vec<String> = ["1001", "1002", "1003", "10010"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let table = adapter.multiple_status(&ids).await.unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table["1001"].status, JobState::Running);
        assert_eq!(table["1002"].status, JobState::Queued);
        assert_eq!(table["1003"], JobStatus::gone());
        assert_eq!(table["10010"].status, JobState::Finished);
        assert_eq!(exec.commands(), vec!["qstat".to_string()]);
    }

    #[tokio::test]
    async fn test_multiple_status_unknown_code() {
        let (adapter, _, log) = adapter(
            MockExecutor::new().respond(CommandOutput::ok("  77 0.5 a.sh u zz 01/01/2024\n")),
        );
        let err = adapter
            .multiple_status(&["77".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SchedError::StatusParse { .. }));
        assert!(log.contains("Unknown status output"));
    }

    #[tokio::test]
    async fn test_delete() {
        let (adapter, exec, _) = adapter(
            MockExecutor::new().respond(CommandOutput::ok("aaa1 has registered the job 1001 for deletion\n")),
        );
        let out = adapter.delete("1001").await.unwrap();
        assert_eq!(out, "aaa1 has registered the job 1001 for deletion\n");
        assert_eq!(exec.issued(), vec![(ExecMode::Run, "qdel 1001".to_string())]);
    }

    #[tokio::test]
    async fn test_delete_failure() {
        let (adapter, _, log) = adapter(MockExecutor::new().respond(CommandOutput::failed(1, "")));
        let err = adapter.delete("1001").await.unwrap_err();
        match err {
            SchedError::Deletion { job_id, exit_code } => {
                assert_eq!(job_id, "1001");
                assert_eq!(exit_code, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(log.contains("Failed to delete job 1001"));
    }

    #[tokio::test]
    async fn test_all_status() {
        let (adapter, exec, _) = adapter(MockExecutor::new().respond(CommandOutput::ok("CLUSTER QUEUE\n")));
        assert_eq!(adapter.all_status().await.unwrap(), "CLUSTER QUEUE\n");
        assert_eq!(exec.commands(), vec!["qstat -g c".to_string()]);
    }

    #[tokio::test]
    async fn test_detect_group() {
        let exec = Arc::new(MockExecutor::new().respond(CommandOutput::ok("aaa1 gaa50000 gab\n")));
        let adapter = GridEngineAdapter::detect(
            GridEngineConfig::default(),
            exec.clone(),
            Arc::new(MemoryLogSink::new()),
        )
        .await
        .unwrap();
        assert_eq!(adapter.config().group.as_deref(), Some("gaa50000"));
        assert_eq!(
            adapter.schema().defaults().text("group").unwrap(),
            "gaa50000"
        );
        assert_eq!(exec.commands(), vec!["groups".to_string()]);
    }
}

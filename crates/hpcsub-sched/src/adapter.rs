//! The scheduler adapter contract.

use std::path::Path;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{SchedError, SchedResult};
use crate::executor::{CommandExecutor, CommandOutput};
use crate::log::LogSink;
use crate::params::{ParameterSchema, ResolvedParameters};
use crate::status::{JobState, JobStatus, QueryFailurePolicy, StateTable, StatusTable, output_lines};
use crate::template::JobContext;

/// A job accepted by a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Scheduler-assigned job id.
    pub job_id: String,
    /// Submit command stdout, one entry per line.
    pub raw_output: Vec<String>,
}

/// Uniform interface over a batch scheduler's command-line tools.
///
/// Every async operation issues at most one external command and waits for
/// it. Implementations hold only immutable configuration.
#[async_trait]
pub trait BatchScheduler: Send + Sync {
    /// Scheduler type name.
    fn name(&self) -> &'static str;

    /// Parameter declarations of this scheduler.
    fn schema(&self) -> &ParameterSchema;

    /// Audit log every failure is written to.
    fn log(&self) -> &dyn LogSink;

    /// Overlay user-supplied values onto the schema defaults.
    fn resolve(&self, supplied: &serde_json::Map<String, Value>) -> SchedResult<ResolvedParameters> {
        self.schema()
            .resolve(supplied)
            .map_err(|e| logged(self.log(), e))
    }

    /// Check format rules and scheduler-specific cross-field rules.
    fn validate(&self, params: &ResolvedParameters) -> SchedResult<()> {
        self.schema()
            .validate(params)
            .map_err(|e| logged(self.log(), e))
    }

    /// Render the job script. Errors are logged.
    fn render(&self, params: &ResolvedParameters, job: &JobContext) -> SchedResult<String>;

    /// Submit a rendered script. All paths must be absolute.
    async fn submit(
        &self,
        script_path: &Path,
        work_dir: &Path,
        log_dir: &Path,
        params: &ResolvedParameters,
    ) -> SchedResult<JobHandle>;

    /// Status of one job.
    async fn status(&self, job_id: &str) -> SchedResult<JobStatus>;

    /// Status of several jobs from a single queue query.
    async fn multiple_status(&self, job_ids: &[String]) -> SchedResult<StatusTable>;

    /// Raw queue overview for display.
    async fn all_status(&self) -> SchedResult<String>;

    /// Cancel a job, returning the cancel command's output.
    async fn delete(&self, job_id: &str) -> SchedResult<String>;
}

/// Record a command about to be issued, with a timestamp.
pub(crate) fn log_command(log: &dyn LogSink, command: &str) {
    log.write_line(&format!("cmd: {command}"));
    log.write_line(&format!("time: {}", Local::now().to_rfc3339()));
}

/// Log and return an error.
pub(crate) fn logged(log: &dyn LogSink, err: SchedError) -> SchedError {
    warn!("{}", err);
    log.write_line(&err.to_string());
    err
}

/// Log and issue a bare-mode command.
pub(crate) async fn run_logged(
    executor: &dyn CommandExecutor,
    log: &dyn LogSink,
    command: &str,
) -> SchedResult<CommandOutput> {
    log_command(log, command);
    executor.run(command).await.map_err(|e| logged(log, e))
}

/// Turn a queue listing into a status, applying `policy` when the query failed.
pub(crate) struct StatusQuery<'a> {
    pub states: &'a StateTable,
    pub policy: QueryFailurePolicy,
    pub log: &'a dyn LogSink,
}

impl StatusQuery<'_> {
    /// Status of `job_id` from the output of `command`.
    pub fn single(&self, command: &str, output: &CommandOutput, job_id: &str) -> SchedResult<JobStatus> {
        if !output.success() {
            return self.failed(command, output);
        }
        self.states
            .status_of(&output.stdout, job_id)
            .map_err(|e| logged(self.log, e))
    }

    /// Status of every id in `job_ids` from the output of `command`.
    pub fn bulk(&self, command: &str, output: &CommandOutput, job_ids: &[String]) -> SchedResult<StatusTable> {
        if !output.success() {
            let fallback = self.failed(command, output)?;
            return Ok(job_ids
                .iter()
                .map(|id| (id.clone(), fallback.clone()))
                .collect());
        }
        self.states
            .partition(&output.stdout, job_ids)
            .map_err(|e| logged(self.log, e))
    }

    fn failed(&self, command: &str, output: &CommandOutput) -> SchedResult<JobStatus> {
        match self.policy {
            QueryFailurePolicy::AssumeFinished => {
                self.log.write_line(&format!(
                    "{command} failed (exit code {}), assuming finished",
                    output.exit_code
                ));
                Ok(JobStatus {
                    status: JobState::Finished,
                    raw_output: output_lines(&output.stdout),
                })
            }
            QueryFailurePolicy::Error => Err(logged(
                self.log,
                SchedError::StatusQuery {
                    command: command.to_string(),
                    exit_code: output.exit_code,
                },
            )),
        }
    }
}

/// Output of a cancel command, or a logged deletion failure.
pub(crate) fn deletion_result(log: &dyn LogSink, job_id: &str, output: CommandOutput) -> SchedResult<String> {
    if !output.success() {
        return Err(logged(
            log,
            SchedError::Deletion {
                job_id: job_id.to_string(),
                exit_code: output.exit_code,
            },
        ));
    }
    Ok(output.stdout)
}

/// Build, log and return a submission failure.
pub(crate) fn submission_failure(
    log: &dyn LogSink,
    reason: &str,
    command: &str,
    output: CommandOutput,
    work_dir: &Path,
) -> SchedError {
    logged(
        log,
        SchedError::Submission {
            reason: reason.to_string(),
            command: command.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: Some(output.exit_code),
            work_dir: work_dir.to_path_buf(),
        },
    )
}

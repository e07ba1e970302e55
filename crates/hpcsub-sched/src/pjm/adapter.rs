//! PJM adapter for job submission and tracking.

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
use crate::log::LogSink;
use crate::params::{ParameterSchema, ResolvedParameters};
use crate::pjm::parser::{self, PjsubParser};
use crate::pjm::schema::{self, DEFAULT_CORES_PER_NODE};
use crate::pjm::templates;
use crate::status::{JobStatus, QueryFailurePolicy, StateTable, StatusTable, output_lines};
use crate::template::{JobContext, ScriptRenderer};

/// Command lines for the PJM tools.
mod commands {
    use std::path::Path;

    use crate::executor::shell_quote;

    pub const PJSTAT: &str = "pjstat";

    pub fn pjsub(work_dir: &Path, log_dir: &Path, script_path: &Path) -> String {
        let log = |name: &str| shell_quote(&log_dir.join(name).display().to_string());
        format!(
            "cd {} && pjsub {} -o {} -e {} --spath {} < /dev/null",
            shell_quote(&work_dir.display().to_string()),
            shell_quote(&script_path.display().to_string()),
            log("%j.o.txt"),
            log("%j.e.txt"),
            log("%j.i.txt"),
        )
    }

    pub fn pjstat_job(job_id: &str) -> String {
        format!("pjstat {}", shell_quote(job_id))
    }

    pub fn pjdel(job_id: &str) -> String {
        format!("pjdel {}", shell_quote(job_id))
    }
}

/// Environment variable holding the default group on PJM sites.
pub const GROUP_ENV: &str = "GROUP";

/// Configuration for the PJM adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PjmConfig {
    /// `-g` group written into every script.
    pub group: Option<String>,

    /// Per-node budget for processes × threads.
    pub cores_per_node: u32,

    /// Behavior when `pjstat` itself fails.
    pub query_failure: QueryFailurePolicy,
}

impl Default for PjmConfig {
    fn default() -> Self {
        Self {
            group: None,
            cores_per_node: DEFAULT_CORES_PER_NODE,
            query_failure: QueryFailurePolicy::default(),
        }
    }
}

impl PjmConfig {
    /// Set the group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the per-node core budget.
    pub fn with_cores_per_node(mut self, cores: u32) -> Self {
        self.cores_per_node = cores;
        self
    }

    /// Set the query failure policy.
    pub fn with_query_failure(mut self, policy: QueryFailurePolicy) -> Self {
        self.query_failure = policy;
        self
    }

    /// Fill the group from `$GROUP` if it is not set.
    pub fn with_env_defaults(mut self) -> Self {
        if self.group.is_none() {
            self.group = std::env::var(GROUP_ENV).ok().filter(|g| !g.is_empty());
            debug!("Group from ${}: {:?}", GROUP_ENV, self.group);
        }
        self
    }
}

/// Adapter for PJM HPC schedulers.
pub struct PjmAdapter {
    config: PjmConfig,
    schema: ParameterSchema,
    renderer: ScriptRenderer,
    states: StateTable,
    pjsub: PjsubParser,
    executor: Arc<dyn CommandExecutor>,
    log: Arc<dyn LogSink>,
}

impl PjmAdapter {
    /// Scheduler type name.
    pub const NAME: &'static str = "pjm";

    pub fn new(
        config: PjmConfig,
        executor: Arc<dyn CommandExecutor>,
        log: Arc<dyn LogSink>,
    ) -> SchedResult<Self> {
        let group = config.group.clone().unwrap_or_default();
        Ok(Self {
            schema: schema::build(config.cores_per_node)?,
            renderer: templates::renderer(&group)?,
            states: parser::state_table()?,
            pjsub: PjsubParser::new()?,
            config,
            executor,
            log,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &PjmConfig {
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
impl BatchScheduler for PjmAdapter {
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

    /// Run `pjsub` with stderr inherited, so its diagnostics reach the
    /// terminal directly. A [`SchedError::Submission`] from this adapter
    /// therefore always carries an empty `stderr`; `stdout` holds pjsub's
    /// own `[ERR.]` lines.
    ///
    /// [`SchedError::Submission`]: crate::error::SchedError::Submission
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

        let cmd = commands::pjsub(work_dir, log_dir, script_path);
        log_command(&*self.log, &cmd);

        let output = self
            .executor
            .run(&cmd)
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

        let Some(job_id) = self.pjsub.job_id(&output.stdout) else {
            return Err(submission_failure(
                &*self.log,
                "failed to get job_id",
                &cmd,
                output,
                work_dir,
            ));
        };

        self.log.write_line(&format!("job_id: {job_id}"));
        info!("Submitted PJM job {}", job_id);

        Ok(JobHandle {
            job_id,
            raw_output: output_lines(&output.stdout),
        })
    }

    async fn status(&self, job_id: &str) -> SchedResult<JobStatus> {
        let cmd = commands::pjstat_job(job_id);
        let output = run_logged(&*self.executor, &*self.log, &cmd).await?;
        self.status_query().single(&cmd, &output, job_id)
    }

    async fn multiple_status(&self, job_ids: &[String]) -> SchedResult<StatusTable> {
        let output = run_logged(&*self.executor, &*self.log, commands::PJSTAT).await?;
        self.status_query().bulk(commands::PJSTAT, &output, job_ids)
    }

    async fn all_status(&self) -> SchedResult<String> {
        let output = run_logged(&*self.executor, &*self.log, commands::PJSTAT).await?;
        Ok(output.stdout)
    }

    async fn delete(&self, job_id: &str) -> SchedResult<String> {
        let output = run_logged(&*self.executor, &*self.log, &commands::pjdel(job_id)).await?;
        deletion_result(&*self.log, job_id, output)
    }
}

//! hpcsub batch scheduler adapters
//!
//! This crate puts one submit/status/delete interface over the command-line
//! tools of HPC batch schedulers, so a job runner can drive grid-engine and
//! PJM clusters the same way.
//!
//! # Overview
//!
//! Every adapter covers the same job lifecycle:
//! 1. **Parameters**: Overlay user values onto the scheduler's declared
//!    defaults and validate them
//! 2. **Script**: Render the batch script from the scheduler's template
//! 3. **Submission**: Run the submit command once and scrape the job id
//! 4. **Tracking**: Map queue listings to `queued` / `running` / `finished`
//! 5. **Deletion**: Cancel a job
//!
//! # Supported Schedulers
//!
//! | Scheduler | Aliases | Commands | Sites |
//! |-----------|---------|----------|-------|
//! | grid-engine | abci | qsub, qstat, qdel, groups | ABCI |
//! | PJM | ofp | pjsub, pjstat, pjdel | Oakforest-PACS |
//!
//! # Example: Submitting a Job
//!
//! ```ignore
//! use std::sync::Arc;
//! use hpcsub_sched::{
//!     create_scheduler, FileLogSink, JobContext, SchedulerRegistry, ShellExecutor, SiteConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SiteConfig::default().with_scheduler("abci");
//!     let log = Arc::new(FileLogSink::in_dir("/home/u/run/_log_job".as_ref())?);
//!     let scheduler = create_scheduler(
//!         &SchedulerRegistry::with_builtins(),
//!         &config,
//!         Arc::new(ShellExecutor::new()),
//!         log,
//!     )
//!     .await?;
//!
//!     let supplied = serde_json::json!({ "walltime": "2:00:00" });
//!     let params = scheduler.resolve(supplied.as_object().unwrap())?;
//!     scheduler.validate(&params)?;
//!
//!     let job = JobContext::new("/home/u/run", "/home/u/run/job.sh", "job");
//!     std::fs::write("/home/u/run/job_hpcsub0.sh", scheduler.render(&params, &job)?)?;
//!
//!     let handle = scheduler
//!         .submit(
//!             "/home/u/run/job_hpcsub0.sh".as_ref(),
//!             "/home/u/run".as_ref(),
//!             "/home/u/run/_log_job".as_ref(),
//!             &params,
//!         )
//!         .await?;
//!     println!("Submitted: {}", handle.job_id);
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! Adapters shell out only through [`CommandExecutor`]. [`MockExecutor`]
//! replays canned outputs and records every command issued, and
//! [`MemoryLogSink`] collects the audit log.

pub mod adapter;
pub mod config;
pub mod error;
pub mod executor;
pub mod grid_engine;
pub mod log;
pub mod params;
pub mod pjm;
pub mod registry;
pub mod status;
pub mod template;

// Re-exports
pub use adapter::{BatchScheduler, JobHandle};
pub use config::SiteConfig;
pub use error::{SchedError, SchedResult};
pub use executor::{CommandExecutor, CommandOutput, ExecMode, MockExecutor, ShellExecutor};
pub use grid_engine::{GridEngineAdapter, GridEngineConfig};
pub use log::{FileLogSink, LogSink, MemoryLogSink, TracingLogSink};
pub use params::{ParamValue, ParameterSchema, ParameterSpec, ResolvedParameters};
pub use pjm::{PjmAdapter, PjmConfig};
pub use registry::{SchedulerRegistry, create_scheduler};
pub use status::{JobState, JobStatus, QueryFailurePolicy, StatusTable};
pub use template::JobContext;

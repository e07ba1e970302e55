//! Error handling for the scheduler adapters.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur during scheduler operations.
#[derive(Error, Debug)]
pub enum SchedError {
    /// A parameter failed its format rule or a cross-field rule.
    #[error("Invalid parameters: {0}")]
    Validation(String),

    /// The submit command failed or its output carried no job id.
    #[error(
        "Submission failed: {reason}\n\t cmd={command:?}\n\t output={stdout:?}\n\t error={stderr:?}\n\t exit_code={}\n\t workdir={}",
        .exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()),
        .work_dir.display()
    )]
    Submission {
        reason: String,
        command: String,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        work_dir: PathBuf,
    },

    /// A status line carried a state code the scheduler adapter does not know.
    #[error("Unknown status output: {line}")]
    StatusParse { line: String },

    /// The status query command failed and the scheduler treats that as an error.
    #[error("Status query failed: {command} (exit code {exit_code})")]
    StatusQuery { command: String, exit_code: i32 },

    /// The cancel command exited with a nonzero code.
    #[error("Failed to delete job {job_id}: exit code {exit_code}")]
    Deletion { job_id: String, exit_code: i32 },

    /// Script rendering failed.
    #[error("Template error: {0}")]
    Template(String),

    /// The shell could not be started.
    #[error("Failed to run command: {command} - {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// No adapter registered under the requested scheduler type.
    #[error("Unknown scheduler type: {0}")]
    UnknownScheduler(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<minijinja::Error> for SchedError {
    fn from(e: minijinja::Error) -> Self {
        SchedError::Template(e.to_string())
    }
}

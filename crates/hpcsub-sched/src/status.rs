//! Canonical job status and status-line parsing.
//!
//! Each scheduler prints a free-text table with one line per job. A
//! [`StateTable`] names the column holding the state code and an ordered list
//! of `(pattern, state)` pairs; the first matching pattern wins and unmatched
//! codes fall through to the table's [`Fallback`]. A job with no line at all
//! has left the queue and is `finished`.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SchedError, SchedResult};

/// Canonical job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    /// Terminal.
    Finished,
}

impl JobState {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished)
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Finished => "finished",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of one job as derived from a single poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    /// The matched status line, or empty when the job is no longer listed.
    pub raw_output: Vec<String>,
}

impl JobStatus {
    /// A job that no longer appears in the queue.
    pub fn gone() -> Self {
        Self {
            status: JobState::Finished,
            raw_output: Vec::new(),
        }
    }
}

/// Job id → status for every id requested in one bulk poll.
pub type StatusTable = BTreeMap<String, JobStatus>;

/// What to do with a state code no pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Raise [`SchedError::StatusParse`].
    Error,
    /// Treat the job as finished.
    Finished,
}

/// What to do when the status query command itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryFailurePolicy {
    /// The job is no longer trackable; report it finished.
    #[default]
    AssumeFinished,
    /// Raise [`SchedError::StatusQuery`].
    Error,
}

/// Column position and code patterns of one scheduler's status listing.
#[derive(Debug, Clone)]
pub struct StateTable {
    column: usize,
    rules: Vec<(Regex, JobState)>,
    fallback: Fallback,
}

impl StateTable {
    /// Create a table reading the state code from `column` (0-indexed).
    pub fn new(column: usize, fallback: Fallback) -> Self {
        Self {
            column,
            rules: Vec::new(),
            fallback,
        }
    }

    /// Append a `(pattern, state)` rule. Rules are tried in insertion order.
    pub fn rule(mut self, pattern: &str, state: JobState) -> SchedResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| SchedError::Config(format!("bad state pattern '{pattern}': {e}")))?;
        self.rules.push((regex, state));
        Ok(self)
    }

    /// Parse the line listed for a job, or `None` if it was not listed.
    pub fn parse_line(&self, line: Option<&str>) -> SchedResult<JobStatus> {
        let Some(line) = line else {
            return Ok(JobStatus::gone());
        };
        let line = line.trim_end();

        let code = line.split_whitespace().nth(self.column);
        let matched = code.and_then(|code| {
            self.rules
                .iter()
                .find(|(pattern, _)| pattern.is_match(code))
                .map(|(_, state)| *state)
        });

        let status = match (matched, self.fallback) {
            (Some(state), _) => state,
            (None, Fallback::Finished) => JobState::Finished,
            (None, Fallback::Error) => {
                return Err(SchedError::StatusParse {
                    line: line.to_string(),
                });
            }
        };

        Ok(JobStatus {
            status,
            raw_output: vec![line.to_string()],
        })
    }

    /// Status of `job_id` from a queue listing. The last matching line wins.
    pub fn status_of(&self, output: &str, job_id: &str) -> SchedResult<JobStatus> {
        self.parse_line(last_line_for(output, job_id))
    }

    /// Statuses of every id in `job_ids` from one queue listing.
    pub fn partition<S: AsRef<str>>(&self, output: &str, job_ids: &[S]) -> SchedResult<StatusTable> {
        job_ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                Ok((id.to_string(), self.status_of(output, id)?))
            })
            .collect()
    }
}

/// Whether a listing line belongs to `job_id`.
///
/// The id must be the first whitespace-separated token, so `123` never
/// matches a line for `1234`.
pub fn line_matches(line: &str, job_id: &str) -> bool {
    line.split_whitespace().next() == Some(job_id)
}

fn last_line_for<'a>(output: &'a str, job_id: &str) -> Option<&'a str> {
    output
        .lines()
        .filter(|line| line_matches(line, job_id))
        .last()
}

/// Split command output into lines without terminators.
pub fn output_lines(output: &str) -> Vec<String> {
    output.lines().map(str::to_string).collect()
}

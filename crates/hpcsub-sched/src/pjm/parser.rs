//! Parsers for PJM command output.

use regex::Regex;

use crate::error::{SchedError, SchedResult};
use crate::status::{Fallback, JobState, StateTable};

/// Column of the state name in `pjstat` output.
const STATE_COLUMN: usize = 2;

/// State table for `pjstat`.
///
/// ```text
///  JOB_ID  JOB_NAME  STATUS   PROJECT  RSCGROUP      START_DATE  ELAPSE  TOKEN  NODE:COORD
///  812345  run.sh    RUNNING  xg17     regular-flat  01/15 10:30 00:12:01  -    4
///  812346  run.sh    QUEUED   xg17     debug-flat    -           -         -    1
/// ```
///
/// Every other state (`EXIT`, `CANCEL`, `HOLD` after completion, ...) counts
/// as finished.
pub(super) fn state_table() -> SchedResult<StateTable> {
    StateTable::new(STATE_COLUMN, Fallback::Finished)
        .rule("^QUEUED$", JobState::Queued)?
        .rule("^RUNNING$", JobState::Running)
}

/// Extracts the job id from `pjsub` output:
/// `[INFO] PJM 0000 pjsub Job 812345 submitted.`
#[derive(Debug)]
pub(super) struct PjsubParser {
    pattern: Regex,
}

impl PjsubParser {
    pub fn new() -> SchedResult<Self> {
        let pattern = Regex::new(r"Job (\d+) submitted")
            .map_err(|e| SchedError::Config(format!("bad pjsub pattern: {e}")))?;
        Ok(Self { pattern })
    }

    pub fn job_id(&self, output: &str) -> Option<String> {
        self.pattern
            .captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

//! Parsers for grid-engine command output.

use crate::error::SchedResult;
use crate::status::{Fallback, JobState, StateTable};

/// Column of the state code in `qstat` output.
const STATE_COLUMN: usize = 4;

/// State-code table for `qstat`.
///
/// ```text
/// job-ID  prior   name       user   state submit/start at     queue  slots ja-task-ID
/// ---------------------------------------------------------------------------------
///  123456 0.25586 run.sh     aaa1   r     01/15/2024 10:30:00 gpu@g0001   80
///  123457 0.00000 run.sh     aaa1   qw    01/15/2024 10:31:00              80
/// ```
///
/// Unknown codes are an error: they indicate a `qstat` this adapter does not
/// understand.
pub(super) fn state_table() -> SchedResult<StateTable> {
    StateTable::new(STATE_COLUMN, Fallback::Error)
        .rule("E", JobState::Finished)?
        .rule("qw|h|s|S|T|Rq", JobState::Queued)?
        .rule("r|t|d", JobState::Running)
}

/// Extract the job id from `qsub` output.
///
/// qsub output format: `Your job 12345 ("run.sh") has been submitted`, or
/// `Your job-array 12345.1-10:1 ("run.sh") has been submitted` for array
/// jobs. The id is the leading digits of the third token of the last
/// non-blank line.
pub(super) fn parse_qsub_output(output: &str) -> Option<String> {
    let last = output.lines().rev().find(|l| !l.trim().is_empty())?;
    let token = last.split_whitespace().nth(2)?;
    let digits: String = token.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

/// Second token of `groups` output: the user's first supplementary group.
pub(super) fn parse_groups_output(output: &str) -> Option<String> {
    output.split_whitespace().nth(1).map(str::to_string)
}

//! Status command implementation.
//!
//! Query job status from the scheduler. Several ids share one queue query.

use std::sync::Arc;

use anyhow::Result;
use console::style;

use hpcsub_sched::{JobState, TracingLogSink};

use super::common::{GlobalOptions, connect, print_json};

/// Execute the status command.
pub async fn execute(options: &GlobalOptions, job_ids: &[String]) -> Result<()> {
    let scheduler = connect(options, Arc::new(TracingLogSink)).await?;

    match job_ids {
        [] => {
            let overview = scheduler.all_status().await?;
            print!("{overview}");
        }
        [job_id] => {
            let status = scheduler.status(job_id).await?;
            let name = status.status.name();
            let styled = match status.status {
                JobState::Queued => style(name).yellow().bold(),
                JobState::Running => style(name).cyan().bold(),
                JobState::Finished => style(name).green().bold(),
            };
            eprintln!(
                "{} Job {} status: {}",
                style("→").cyan().bold(),
                style(job_id).dim(),
                styled
            );
            print_json(&status)?;
        }
        _ => {
            let table = scheduler.multiple_status(job_ids).await?;
            print_json(&table)?;
        }
    }

    Ok(())
}

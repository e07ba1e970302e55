//! Delete command implementation.

use std::sync::Arc;

use anyhow::Result;
use console::style;

use hpcsub_sched::TracingLogSink;

use super::common::{GlobalOptions, connect};

/// Execute the delete command.
pub async fn execute(options: &GlobalOptions, job_id: &str) -> Result<()> {
    let scheduler = connect(options, Arc::new(TracingLogSink)).await?;
    let output = scheduler.delete(job_id).await?;

    print!("{output}");
    eprintln!(
        "{} Job {} deleted",
        style("✓").green().bold(),
        style(job_id).yellow()
    );
    Ok(())
}

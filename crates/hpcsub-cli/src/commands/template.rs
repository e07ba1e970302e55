//! Template command implementation.
//!
//! Print the configured scheduler's parameters with their defaults and
//! formats, so job authors know what `submit -p` accepts.

use std::sync::Arc;

use anyhow::Result;

use hpcsub_sched::TracingLogSink;

use super::common::{GlobalOptions, connect, print_json};

/// Execute the template command.
pub async fn execute(options: &GlobalOptions) -> Result<()> {
    let scheduler = connect(options, Arc::new(TracingLogSink)).await?;
    print_json(scheduler.schema())
}

//! Submit command implementation.
//!
//! Resolve and validate parameters, write the rendered batch script next to
//! the job and hand it to the scheduler. The audit log goes to
//! `<log_dir>/hpcsub.log`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;
use tracing::info;

use hpcsub_sched::{FileLogSink, JobContext, ResolvedParameters};

use super::common::{GlobalOptions, absolutize, connect, next_script_path, parse_parameters, print_json};

/// Printed on success.
#[derive(Debug, Serialize)]
struct SubmitReport<'a> {
    job_id: &'a str,
    raw_output: &'a [String],
    parameters: &'a ResolvedParameters,
}

/// Execute the submit command.
pub async fn execute(
    options: &GlobalOptions,
    job_file: &Path,
    parameters: Option<&str>,
    work_dir: &Path,
    log_dir: Option<&Path>,
) -> Result<()> {
    if !job_file.is_file() {
        anyhow::bail!("Job file not found: {}", job_file.display());
    }
    let job_file = absolutize(job_file)?;
    let stem = job_file
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Job file name is not valid UTF-8")?
        .to_string();

    let work_dir = absolutize(work_dir)?;
    fs::create_dir_all(&work_dir)
        .with_context(|| format!("Failed to create work directory: {}", work_dir.display()))?;
    let log_dir = match log_dir {
        Some(dir) => absolutize(dir)?,
        None => work_dir.join(format!("_log_{stem}")),
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let log = Arc::new(FileLogSink::in_dir(&log_dir)?);
    let scheduler = connect(options, log).await?;

    let supplied = parse_parameters(parameters)?;
    let params = scheduler.resolve(&supplied)?;
    scheduler.validate(&params)?;

    let job = JobContext::new(&work_dir, &job_file, stem.as_str());
    let script = scheduler.render(&params, &job)?;
    let script_path = next_script_path(&work_dir, &stem);
    fs::write(&script_path, script)
        .with_context(|| format!("Failed to write script: {}", script_path.display()))?;
    info!("Wrote batch script {}", script_path.display());

    let handle = scheduler
        .submit(&script_path, &work_dir, &log_dir, &params)
        .await?;

    eprintln!(
        "{} Submitted {} to {} as job {}",
        style("✓").green().bold(),
        style(script_path.display()).dim(),
        scheduler.name(),
        style(&handle.job_id).yellow()
    );
    print_json(&SubmitReport {
        job_id: &handle.job_id,
        raw_output: &handle.raw_output,
        parameters: &params,
    })
}

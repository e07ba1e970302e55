//! Shared helpers for CLI commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use hpcsub_sched::{
    BatchScheduler, LogSink, SchedulerRegistry, ShellExecutor, SiteConfig, create_scheduler,
};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Explicit site configuration file.
    pub config: Option<PathBuf>,
    /// Scheduler type overriding the configuration file.
    pub scheduler: Option<String>,
}

/// Return the default site configuration path (~/.hpcsub/config.yaml).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hpcsub").join("config.yaml"))
}

/// Parse a YAML site configuration. An empty document yields the defaults.
pub fn parse_site_config(text: &str) -> Result<SiteConfig> {
    if text.trim().is_empty() {
        return Ok(SiteConfig::default());
    }
    serde_yaml_ng::from_str(text).context("Invalid site configuration")
}

/// Load the site configuration and apply the command-line scheduler override.
pub fn load_site_config(options: &GlobalOptions) -> Result<SiteConfig> {
    let path = match &options.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        }
        None => default_config_path().filter(|p| p.exists()),
    };

    let mut config = match path {
        Some(path) => {
            debug!("Loading site configuration from {}", path.display());
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            parse_site_config(&text)
                .with_context(|| format!("Failed to load config: {}", path.display()))?
        }
        None => SiteConfig::default(),
    };

    if let Some(scheduler) = &options.scheduler {
        config.scheduler = Some(scheduler.clone());
    }
    Ok(config)
}

/// Build the configured scheduler adapter on top of the shell.
pub async fn connect(options: &GlobalOptions, log: Arc<dyn LogSink>) -> Result<Box<dyn BatchScheduler>> {
    let config = load_site_config(options)?;
    if config.scheduler.is_none() {
        anyhow::bail!(
            "No scheduler type configured. Use --scheduler, HPCSUB_TYPE or `scheduler:` in the site configuration"
        );
    }

    create_scheduler(
        &SchedulerRegistry::with_builtins(),
        &config,
        Arc::new(ShellExecutor::new()),
        log,
    )
    .await
    .context("Failed to set up scheduler")
}

/// Resolve `path` against the current directory.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}

/// Parse `-p` parameters. Missing means no overrides.
pub fn parse_parameters(json: Option<&str>) -> Result<Map<String, Value>> {
    let Some(json) = json else {
        return Ok(Map::new());
    };
    match serde_json::from_str(json).context("Parameters are not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Parameters must be a JSON object, got: {other}"),
    }
}

/// First `<stem>_hpcsub<N>.sh` in `work_dir` that does not exist yet.
pub fn next_script_path(work_dir: &Path, stem: &str) -> PathBuf {
    let mut n: u32 = 0;
    loop {
        let candidate = work_dir.join(format!("{stem}_hpcsub{n}.sh"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

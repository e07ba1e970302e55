//! hpcsub Command-Line Interface
//!
//! Submit, track and cancel batch jobs on grid-engine and PJM clusters with
//! one set of commands.
//!
//! ```text
//! hpcsub template                          # parameter schema as JSON
//! hpcsub submit job.sh -p '{"walltime": "2:00:00"}'
//! hpcsub status 12345                      # one job
//! hpcsub status 12345 12346                # one queue query for both
//! hpcsub delete 12345
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::GlobalOptions;
use commands::{delete, status, submit, template, version};

/// hpcsub - one interface over HPC batch schedulers
#[derive(Parser)]
#[command(name = "hpcsub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Site configuration file (YAML)
    #[arg(long, env = "HPCSUB_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Scheduler type (grid-engine, abci, pjm, ofp); overrides the config file
    #[arg(long, env = "HPCSUB_TYPE", global = true)]
    scheduler: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the scheduler's parameters, defaults and formats as JSON
    Template,

    /// Render a batch script for a job file and submit it
    Submit {
        /// Job file sourced by the batch script
        job_file: PathBuf,

        /// Parameters as a JSON object
        #[arg(short, long)]
        parameters: Option<String>,

        /// Work directory
        #[arg(short = 'd', long, default_value = ".")]
        work_dir: PathBuf,

        /// Log directory (default: <work_dir>/_log_<job name>)
        #[arg(short, long)]
        log_dir: Option<PathBuf>,
    },

    /// Show job status; without ids, show the queue overview
    Status {
        /// Job ids
        job_ids: Vec<String>,
    },

    /// Cancel a job
    Delete {
        /// Job id
        job_id: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let global = GlobalOptions {
        config: cli.config,
        scheduler: cli.scheduler,
    };

    // Execute command
    let result = match cli.command {
        Commands::Template => template::execute(&global).await,
        Commands::Submit {
            job_file,
            parameters,
            work_dir,
            log_dir,
        } => {
            submit::execute(
                &global,
                &job_file,
                parameters.as_deref(),
                &work_dir,
                log_dir.as_deref(),
            )
            .await
        }
        Commands::Status { job_ids } => status::execute(&global, &job_ids).await,
        Commands::Delete { job_id } => delete::execute(&global, &job_id).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

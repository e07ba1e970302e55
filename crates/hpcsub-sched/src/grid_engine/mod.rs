//! Grid-engine style scheduler integration (`qsub`/`qstat`/`qdel`).
//!
//! Directives use the `#$` prefix, submission goes through `qsub -g <group>`
//! and job state is read from column 5 of the plain `qstat` listing. The
//! parameter set follows the ABCI site profile.

mod adapter;
mod parser;
mod schema;
mod templates;

pub use adapter::{GridEngineAdapter, GridEngineConfig};
pub use schema::DEFAULT_JOB_NAME;

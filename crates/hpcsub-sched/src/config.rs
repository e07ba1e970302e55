//! Site configuration.
//!
//! One [`SiteConfig`] describes a site: which scheduler it runs and the
//! settings for each adapter. Values derived from the environment (the
//! default group) are filled in once by [`SiteConfig::resolve_defaults`]
//! before an adapter is built, never per call.

use serde::{Deserialize, Serialize};

use crate::error::SchedResult;
use crate::executor::CommandExecutor;
use crate::grid_engine::{GridEngineAdapter, GridEngineConfig};
use crate::pjm::{PjmAdapter, PjmConfig};

/// Scheduler selection and per-adapter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheduler type name or alias (`grid-engine`, `abci`, `pjm`, `ofp`).
    pub scheduler: Option<String>,

    /// Grid-engine settings.
    pub grid_engine: GridEngineConfig,

    /// PJM settings.
    pub pjm: PjmConfig,
}

impl SiteConfig {
    /// Set the scheduler type name.
    pub fn with_scheduler(mut self, name: impl Into<String>) -> Self {
        self.scheduler = Some(name.into());
        self
    }

    /// Fill environment-derived values for the adapter named `scheduler`.
    ///
    /// Grid-engine asks `groups` for the default group; PJM reads `$GROUP`.
    /// Only the selected adapter's section is touched.
    pub async fn resolve_defaults(
        mut self,
        scheduler: &str,
        executor: &dyn CommandExecutor,
    ) -> SchedResult<Self> {
        match scheduler {
            GridEngineAdapter::NAME => {
                self.grid_engine = self.grid_engine.detect_group(executor).await?;
            }
            PjmAdapter::NAME => {
                self.pjm = self.pjm.with_env_defaults();
            }
            _ => {}
        }
        Ok(self)
    }
}

//! Scheduler registry for looking up adapters by type name.
//!
//! The [`SchedulerRegistry`] maps scheduler type names (and site aliases such
//! as `abci` or `ofp`) to adapter factories.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::adapter::BatchScheduler;
use crate::config::SiteConfig;
use crate::error::{SchedError, SchedResult};
use crate::executor::CommandExecutor;
use crate::grid_engine::GridEngineAdapter;
use crate::log::LogSink;
use crate::pjm::PjmAdapter;

/// Factory function type for scheduler adapters.
type SchedulerFactory = Box<
    dyn Fn(&SiteConfig, Arc<dyn CommandExecutor>, Arc<dyn LogSink>) -> SchedResult<Box<dyn BatchScheduler>>
        + Send
        + Sync,
>;

/// Central registry of scheduler adapters.
pub struct SchedulerRegistry {
    /// Factories keyed by canonical name.
    factories: FxHashMap<String, SchedulerFactory>,
    /// Alias → canonical name.
    aliases: FxHashMap<String, String>,
}

impl SchedulerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
            aliases: FxHashMap::default(),
        }
    }

    /// Create a registry with the grid-engine and PJM adapters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(GridEngineAdapter::NAME, |config, executor, log| {
            let adapter = GridEngineAdapter::new(config.grid_engine.clone(), executor, log)?;
            Ok(Box::new(adapter) as Box<dyn BatchScheduler>)
        });
        registry.register(PjmAdapter::NAME, |config, executor, log| {
            let adapter = PjmAdapter::new(config.pjm.clone(), executor, log)?;
            Ok(Box::new(adapter) as Box<dyn BatchScheduler>)
        });
        registry.alias("abci", GridEngineAdapter::NAME);
        registry.alias("ofp", PjmAdapter::NAME);
        registry
    }

    /// Register an adapter factory under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&SiteConfig, Arc<dyn CommandExecutor>, Arc<dyn LogSink>) -> SchedResult<Box<dyn BatchScheduler>>
            + Send
            + Sync
            + 'static,
    ) {
        let name = name.into();
        debug!("Registering scheduler: {}", name);
        self.factories.insert(name, Box::new(factory));
    }

    /// Make `alias` resolve to the adapter registered as `name`.
    pub fn alias(&mut self, alias: impl Into<String>, name: impl Into<String>) {
        self.aliases.insert(alias.into(), name.into());
    }

    /// Canonical name for a type name or alias. Lookup is case-insensitive.
    pub fn canonical(&self, name: &str) -> SchedResult<&str> {
        let lower = name.trim().to_ascii_lowercase();
        let key = self.aliases.get(&lower).unwrap_or(&lower);
        self.factories
            .get_key_value(key.as_str())
            .map(|(k, _)| k.as_str())
            .ok_or_else(|| SchedError::UnknownScheduler(name.to_string()))
    }

    /// Whether `name` resolves to a registered adapter.
    pub fn contains(&self, name: &str) -> bool {
        self.canonical(name).is_ok()
    }

    /// Registered canonical names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the adapter for `name` from an already resolved configuration.
    pub fn create(
        &self,
        name: &str,
        config: &SiteConfig,
        executor: Arc<dyn CommandExecutor>,
        log: Arc<dyn LogSink>,
    ) -> SchedResult<Box<dyn BatchScheduler>> {
        let name = self.canonical(name)?;
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchedError::UnknownScheduler(name.to_string()))?;
        factory(config, executor, log)
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Build the adapter named by `config.scheduler`, filling environment-derived
/// defaults first.
pub async fn create_scheduler(
    registry: &SchedulerRegistry,
    config: &SiteConfig,
    executor: Arc<dyn CommandExecutor>,
    log: Arc<dyn LogSink>,
) -> SchedResult<Box<dyn BatchScheduler>> {
    let requested = config
        .scheduler
        .as_deref()
        .ok_or_else(|| SchedError::Config("no scheduler type configured".to_string()))?;
    let name = registry.canonical(requested)?;
    let resolved = config.clone().resolve_defaults(name, &*executor).await?;
    registry.create(name, &resolved, executor, log)
}

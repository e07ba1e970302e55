//! Job script rendering.
//!
//! Scheduler templates are Jinja-style text expanded against the resolved
//! parameters (as top-level variables) and the [`JobContext`] (as `job`).
//! Undefined variables are an error, so a template cannot reference a
//! parameter its schema does not declare. Derived values are registered as
//! functions and evaluated at render time.

use std::collections::BTreeMap;
use std::path::PathBuf;

use minijinja::{Environment, UndefinedBehavior, Value};
use serde::Serialize;

use crate::error::SchedResult;
use crate::params::ResolvedParameters;

/// Name under which the job context is exposed to templates.
pub const JOB_CONTEXT_VAR: &str = "job";

/// Values a script needs that are not scheduler parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobContext {
    /// Absolute work directory.
    pub work_dir: PathBuf,
    /// Absolute path of the user's inner job file.
    pub job_file: PathBuf,
    /// Display name of the job, usually the job file stem.
    ///
    /// Informational: exposed to templates as `job.name`, but neither
    /// built-in script uses it. The grid-engine `-N` line takes the
    /// `name_job` parameter instead.
    pub name: String,
}

impl JobContext {
    pub fn new(work_dir: impl Into<PathBuf>, job_file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            job_file: job_file.into(),
            name: name.into(),
        }
    }
}

/// A compiled scheduler template with its helper functions and globals.
#[derive(Debug)]
pub struct ScriptRenderer {
    env: Environment<'static>,
    name: &'static str,
}

impl ScriptRenderer {
    /// Compile `source` under `name`.
    pub fn new(name: &'static str, source: &'static str) -> SchedResult<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_template(name, source)?;
        Ok(Self { env, name })
    }

    /// Access the environment to register functions or globals.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }

    /// Expose a configuration value to the template.
    pub fn with_global(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.env.add_global(name, value.into());
        self
    }

    /// Template name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Render the script text.
    pub fn render(&self, params: &ResolvedParameters, job: &JobContext) -> SchedResult<String> {
        let mut ctx: BTreeMap<String, Value> = params
            .iter()
            .map(|(name, value)| (name.to_string(), Value::from(value.to_text())))
            .collect();
        ctx.insert(JOB_CONTEXT_VAR.to_string(), Value::from_serialize(job));

        let template = self.env.get_template(self.name)?;
        Ok(template.render(ctx)?)
    }
}

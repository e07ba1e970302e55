//! Grid-engine parameter declarations and rules.

use crate::error::SchedResult;
use crate::params::{CrossFieldRule, ParameterSchema, ParameterSpec};

/// Default `-N` job name.
pub const DEFAULT_JOB_NAME: &str = "hpcsub_job";

/// Build the schema. `group` is the default for the `group` parameter.
pub(super) fn build(group: &str) -> SchedResult<ParameterSchema> {
    Ok(ParameterSchema::new()
        .param(ParameterSpec::new(
            "resource_type_num",
            "(resource_type)=(num)",
            "rt_F=1",
        ))
        .param(ParameterSpec::new("name_job", "name of job", DEFAULT_JOB_NAME))
        .param(ParameterSpec::new("group", "user group", group))
        .param(ParameterSpec::new("priority", "priority", 0).with_format(r"[0-9]\d*")?)
        .param(
            ParameterSpec::new("walltime", "Limit on elapsed time", "0:01:00")
                .with_format(r"\d+:\d{2}:\d{2}")?,
        )
        .param(ParameterSpec::new("mpi_procs", "MPI process", 1).with_format(r"[1-9]\d*")?)
        .param(ParameterSpec::new("omp_threads", "OMP threads", 1).with_format(r"[1-9]\d*")?)
        .rule(CrossFieldRule::new("procs-and-threads", |p| {
            let procs = p.int("mpi_procs").map_err(|e| e.to_string())?;
            let threads = p.int("omp_threads").map_err(|e| e.to_string())?;
            if procs >= 1 && threads >= 1 {
                Ok(())
            } else {
                Err(format!(
                    "mpi_procs ({procs}) and omp_threads ({threads}) must be larger than or equal to 1"
                ))
            }
        })))
}

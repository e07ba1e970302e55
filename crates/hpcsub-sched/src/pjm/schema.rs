//! PJM parameter declarations, rules and resource-group selection.

use crate::error::{SchedError, SchedResult};
use crate::params::{CrossFieldRule, ParameterSchema, ParameterSpec};

/// Cores available to processes × threads on one node.
pub const DEFAULT_CORES_PER_NODE: u32 = 68;

/// Largest job (in nodes) eligible for the debug resource group.
const DEBUG_MAX_NODES: u64 = 128;

/// Longest elapsed-time limit (in seconds) eligible for the debug resource group.
const DEBUG_MAX_SECONDS: u64 = 1800;

pub(super) fn build(cores_per_node: u32) -> SchedResult<ParameterSchema> {
    let budget = i64::from(cores_per_node);
    Ok(ParameterSchema::new()
        .param(ParameterSpec::new("mpi_procs", "MPI process", 1).with_format(r"[1-9]\d*")?)
        .param(
            ParameterSpec::new("max_mpi_procs_per_node", "Max MPI processes per node", 1)
                .with_format(r"[1-9]\d*")?,
        )
        .param(ParameterSpec::new("omp_threads", "OMP threads", 1).with_format(r"[1-9]\d*")?)
        .param(
            ParameterSpec::new("elapse", "Limit on elapsed time", "1:00:00")
                .with_format(r"\d+:\d{2}:\d{2}")?,
        )
        .param(ParameterSpec::new("node", "Nodes", "1").with_format(r"\d+(x\d+){0,2}")?)
        .param(
            ParameterSpec::new("memory_config", "Use MCDRAM as cache?", "flat")
                .with_format(r"(flat|cache)")?,
        )
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
        }))
        .rule(CrossFieldRule::new("cores-per-node", move |p| {
            let per_node = p.int("max_mpi_procs_per_node").map_err(|e| e.to_string())?;
            let threads = p.int("omp_threads").map_err(|e| e.to_string())?;
            if per_node.saturating_mul(threads) <= budget {
                Ok(())
            } else {
                Err(format!(
                    "max_mpi_procs_per_node ({per_node}) times omp_threads ({threads}) must be less than or equal to {budget}"
                ))
            }
        }))
        .rule(CrossFieldRule::new("resource-group", |p| {
            let node = p.text("node").map_err(|e| e.to_string())?;
            let elapse = p.text("elapse").map_err(|e| e.to_string())?;
            let memory_config = p.text("memory_config").map_err(|e| e.to_string())?;
            resource_group(&node, &elapse, &memory_config)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })))
}

/// Select the resource group for a job.
///
/// Jobs of at most 128 nodes with an elapsed limit of at most 30 minutes go
/// to the debug tier, everything else to the regular tier. The suffix follows
/// the memory mode: `flat`, otherwise `cache`.
pub fn resource_group(node: &str, elapse: &str, memory_config: &str) -> SchedResult<String> {
    let nodes = node_count(node)?;
    let seconds = elapse_seconds(elapse)?;

    let tier = if nodes <= DEBUG_MAX_NODES && seconds <= DEBUG_MAX_SECONDS {
        "debug"
    } else {
        "regular"
    };
    let mode = if memory_config == "flat" { "flat" } else { "cache" };
    Ok(format!("{tier}-{mode}"))
}

/// Leading node count of a `N`, `NxM` or `NxMxL` shape.
fn node_count(node: &str) -> SchedResult<u64> {
    let digits: String = node
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Err(SchedError::Validation(format!(
            "node '{node}' has no leading node count"
        )));
    }
    digits
        .parse()
        .map_err(|_| SchedError::Validation(format!("node count in '{node}' is out of range")))
}

/// Seconds in an `h:mm:ss` elapsed-time limit.
fn elapse_seconds(elapse: &str) -> SchedResult<u64> {
    elapse.trim().split(':').try_fold(0u64, |acc, part| {
        let value = part
            .parse::<u64>()
            .map_err(|_| SchedError::Validation(format!("elapse '{elapse}' is not h:mm:ss")))?;
        acc.checked_mul(60)
            .and_then(|seconds| seconds.checked_add(value))
            .ok_or_else(|| SchedError::Validation(format!("elapse '{elapse}' is out of range")))
    })
}

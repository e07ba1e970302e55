//! Site Integration Tests
//!
//! These tests drive both adapters through `dyn BatchScheduler`, the way a
//! job runner does: build from a site configuration, resolve and validate
//! parameters, render, submit, poll and cancel.
//!
//! Scheduler tools are replaced by `MockExecutor`; the shell executor tests
//! only need `sh`.

use std::path::Path;
use std::sync::Arc;

use hpcsub_sched::{
    BatchScheduler, CommandExecutor, CommandOutput, JobContext, JobState, JobStatus,
    MemoryLogSink, MockExecutor, QueryFailurePolicy, SchedError, SchedulerRegistry,
    ShellExecutor, SiteConfig, create_scheduler, pjm::resource_group,
};
use serde_json::json;

async fn build(
    name: &str,
    exec: MockExecutor,
) -> (Box<dyn BatchScheduler>, Arc<MockExecutor>, Arc<MemoryLogSink>) {
    let exec = Arc::new(exec);
    let log = Arc::new(MemoryLogSink::new());
    let mut config = SiteConfig::default().with_scheduler(name);
    config.grid_engine = config.grid_engine.with_group("gaa50000");
    config.pjm = config.pjm.with_group("xg17");
    let scheduler = create_scheduler(
        &SchedulerRegistry::with_builtins(),
        &config,
        exec.clone(),
        log.clone(),
    )
    .await
    .unwrap();
    (scheduler, exec, log)
}

// ============================================================================
// Parameters
// ============================================================================

#[tokio::test]
async fn test_defaults_validate_for_every_scheduler() {
    for name in ["grid-engine", "pjm"] {
        let (scheduler, _, _) = build(name, MockExecutor::new()).await;
        let params = scheduler.schema().defaults();
        assert!(scheduler.validate(&params).is_ok(), "{name}");
    }
}

#[tokio::test]
async fn test_invalid_parameters_name_the_rule() {
    let (scheduler, _, _) = build("ofp", MockExecutor::new()).await;
    let supplied = json!({"max_mpi_procs_per_node": 34, "omp_threads": 3});
    let params = scheduler.resolve(supplied.as_object().unwrap()).unwrap();
    let err = scheduler.validate(&params).unwrap_err();
    assert!(matches!(err, SchedError::Validation(_)));
    assert!(err.to_string().contains("cores-per-node"));
}

#[tokio::test]
async fn test_unknown_parameter_rejected() {
    let (scheduler, _, _) = build("abci", MockExecutor::new()).await;
    let supplied = json!({"wallclock": "1:00:00"});
    let err = scheduler.resolve(supplied.as_object().unwrap()).unwrap_err();
    assert!(err.to_string().contains("wallclock"));
}

#[tokio::test]
async fn test_rejected_parameters_reach_the_audit_log() {
    for name in ["grid-engine", "pjm"] {
        let (scheduler, exec, log) = build(name, MockExecutor::new()).await;
        let err = scheduler
            .resolve(json!({"queue": "short"}).as_object().unwrap())
            .unwrap_err();
        assert!(log.contains(&err.to_string()), "{name}");
        assert!(exec.issued().is_empty(), "{name}");
    }
}

#[tokio::test]
async fn test_status_query_failure_is_consistent() {
    for name in ["grid-engine", "pjm"] {
        let exec = Arc::new(
            MockExecutor::new()
                .respond(CommandOutput::failed(127, "sh: 1: not found"))
                .respond(CommandOutput::failed(127, "sh: 1: not found")),
        );
        let mut config = SiteConfig::default().with_scheduler(name);
        config.grid_engine = config
            .grid_engine
            .with_group("gaa50000")
            .with_query_failure(QueryFailurePolicy::Error);
        config.pjm = config
            .pjm
            .with_group("xg17")
            .with_query_failure(QueryFailurePolicy::Error);
        let scheduler = create_scheduler(
            &SchedulerRegistry::with_builtins(),
            &config,
            exec,
            Arc::new(MemoryLogSink::new()),
        )
        .await
        .unwrap();

        assert!(
            matches!(scheduler.status("1").await, Err(SchedError::StatusQuery { exit_code: 127, .. })),
            "{name}"
        );
        assert!(
            matches!(
                scheduler.multiple_status(&["1".to_string()]).await,
                Err(SchedError::StatusQuery { exit_code: 127, .. })
            ),
            "{name}"
        );
    }
}

// ============================================================================
// Rendering
// ============================================================================

#[tokio::test]
async fn test_render_is_deterministic() {
    let (scheduler, _, _) = build("pjm", MockExecutor::new()).await;
    let params = scheduler
        .resolve(json!({"node": "256", "elapse": "2:00:00", "memory_config": "cache"}).as_object().unwrap())
        .unwrap();
    let job = JobContext::new("/work", "/work/job.sh", "job");
    let first = scheduler.render(&params, &job).unwrap();
    let second = scheduler.render(&params, &job).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("rscgrp=regular-cache"));
    assert!(first.ends_with(". /work/job.sh\n"));
}

#[test]
fn test_resource_group_examples() {
    assert_eq!(resource_group("64", "0:30:00", "flat").unwrap(), "debug-flat");
    assert_eq!(resource_group("256", "2:00:00", "cache").unwrap(), "regular-cache");
    assert_eq!(resource_group("128", "0:30:00", "flat").unwrap(), "debug-flat");
    assert_eq!(resource_group("129", "0:30:00", "flat").unwrap(), "regular-flat");
    assert_eq!(resource_group("128", "0:30:01", "flat").unwrap(), "regular-flat");
}

// ============================================================================
// Job lifecycle
// ============================================================================

#[tokio::test]
async fn test_grid_engine_lifecycle() {
    let qstat_running = "  4001 0.5 job.sh aaa1 r 01/15/2024 10:30:00 gpu@g0001 80\n";
    let (scheduler, exec, log) = build(
        "grid-engine",
        MockExecutor::new()
            .respond(CommandOutput::ok("Your job 4001 (\"job\") has been submitted\n"))
            .respond(CommandOutput::ok(qstat_running))
            .respond(CommandOutput::ok("aaa1 has registered the job 4001 for deletion\n"))
            .respond(CommandOutput::ok("job-ID  prior   name       user         state\n")),
    )
    .await;

    let params = scheduler.schema().defaults();
    let handle = scheduler
        .submit(
            Path::new("/work/job_hpcsub0.sh"),
            Path::new("/work"),
            Path::new("/work/_log_job"),
            &params,
        )
        .await
        .unwrap();
    assert_eq!(handle.job_id, "4001");

    let status = scheduler.status(&handle.job_id).await.unwrap();
    assert_eq!(status.status, JobState::Running);
    assert_eq!(status.raw_output, vec![qstat_running.trim_end().to_string()]);

    let output = scheduler.delete(&handle.job_id).await.unwrap();
    assert_eq!(output, "aaa1 has registered the job 4001 for deletion\n");

    // No line for the job: it left the queue.
    let status = scheduler.status(&handle.job_id).await.unwrap();
    assert_eq!(status, JobStatus::gone());

    assert_eq!(exec.commands().len(), 4);
    assert!(log.contains("job_id: 4001"));
}

#[tokio::test]
async fn test_pjm_bulk_status_covers_every_id() {
    let pjstat = "\
 JOB_ID  JOB_NAME STATUS  PROJECT
 100     a.sh     RUNNING xg17
 300     c.sh     QUEUED  xg17
";
    let (scheduler, exec, _) = build("pjm", MockExecutor::new().respond(CommandOutput::ok(pjstat))).await;
    let ids = vec!["100".to_string(), "200".to_string(), "300".to_string()];
    let table = scheduler.multiple_status(&ids).await.unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table["100"].status, JobState::Running);
    assert_eq!(table["200"].status, JobState::Finished);
    assert_eq!(table["300"].status, JobState::Queued);
    assert_eq!(exec.commands().len(), 1);
}

#[tokio::test]
async fn test_nonzero_submit_never_parses_id() {
    for name in ["grid-engine", "pjm"] {
        let exec = MockExecutor::new().respond(
            CommandOutput::failed(1, "").with_stdout("Your job 1 (\"x\") has been submitted\nJob 1 submitted\n"),
        );
        let (scheduler, _, _) = build(name, exec).await;
        let params = scheduler.schema().defaults();
        let err = scheduler
            .submit(Path::new("/w/s.sh"), Path::new("/w"), Path::new("/w/l"), &params)
            .await
            .unwrap_err();
        assert!(
            matches!(err, SchedError::Submission { exit_code: Some(1), .. }),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_delete_failure_carries_job_id() {
    for name in ["grid-engine", "pjm"] {
        let (scheduler, _, _) =
            build(name, MockExecutor::new().respond(CommandOutput::failed(3, ""))).await;
        match scheduler.delete("9999").await {
            Err(SchedError::Deletion { job_id, exit_code }) => {
                assert_eq!(job_id, "9999");
                assert_eq!(exit_code, 3);
            }
            other => panic!("{name}: unexpected result {:?}", other.map(|_| ())),
        }
    }
}

// ============================================================================
// Shell executor
// ============================================================================

#[tokio::test]
async fn test_shell_executor_capture() {
    let output = ShellExecutor::new()
        .capture("echo out; echo err >&2; exit 3")
        .await
        .unwrap();
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
    assert_eq!(output.exit_code, 3);
}

#[tokio::test]
async fn test_shell_executor_run_leaves_stderr_uncaptured() {
    let output = ShellExecutor::new().run("echo out; echo err >&2").await.unwrap();
    assert_eq!(output.stdout, "out\n");
    assert!(output.stderr.is_empty());
    assert!(output.success());
}

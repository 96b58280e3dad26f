use std::sync::Arc;
use std::sync::atomic::Ordering;

use rrmflow::engine::{Scheduler, SchedulerOptions, StepCommands};
use rrmflow::errors::RrmflowError;
use rrmflow::fs::mock::MockFileSystem;
use rrmflow::types::{Dependency, Step, StepStatus};
use rrmflow_test_utils::builders::PipelineBuilder;
use rrmflow_test_utils::fake_launcher::{FakeEvent, Outcome, ScriptedLauncher};
use rrmflow_test_utils::static_probe::StaticProbe;
use rrmflow_test_utils::{init_tracing, with_timeout};

use Step::*;

#[test]
fn first_iteration_launches_only_steps_without_unmet_dependencies() {
    init_tracing();
    let launcher = ScriptedLauncher::new();
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Map, &[Mesh])
        .build(launcher.clone(), StaticProbe::empty())
        .unwrap();

    scheduler.initialize().unwrap();
    assert_eq!(scheduler.status_of(Mesh), StepStatus::ToDo);
    assert_eq!(scheduler.status_of(Map), StepStatus::ToDo);

    let first = scheduler.run_iteration().unwrap();
    assert_eq!(first.launched, vec![Mesh]);
    assert_eq!(scheduler.status_of(Mesh), StepStatus::InProgress);
    assert_eq!(scheduler.status_of(Map), StepStatus::ToDo);

    // mesh exits on its first poll.
    let second = scheduler.run_iteration().unwrap();
    assert!(second.launched.is_empty());
    assert_eq!(second.finished, vec![(Mesh, 0)]);
    assert_eq!(scheduler.status_of(Mesh), StepStatus::Complete);

    let third = scheduler.run_iteration().unwrap();
    assert_eq!(third.launched, vec![Map]);

    let fourth = scheduler.run_iteration().unwrap();
    assert_eq!(fourth.finished, vec![(Map, 0)]);
    assert!(fourth.done);
    assert_eq!(launcher.launches(), vec![Mesh, Map]);
}

#[test]
fn failing_step_is_retried_until_budget_is_used() {
    init_tracing();
    let launcher = ScriptedLauncher::new().always(Mesh, 1, 3);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .retry_attempts(2)
        .build(launcher.clone(), StaticProbe::empty())
        .unwrap();

    let mut retried = Vec::new();
    let mut exhausted = Vec::new();
    loop {
        let report = scheduler.run_iteration().unwrap();
        retried.extend(report.retried);
        exhausted.extend(report.exhausted);
        if report.done {
            break;
        }
    }

    assert_eq!(launcher.attempts_of(Mesh), 3);
    assert_eq!(retried, vec![Mesh, Mesh]);
    assert_eq!(exhausted, vec![Mesh]);
    assert_eq!(scheduler.status_of(Mesh), StepStatus::Failed);
    assert_eq!(scheduler.retries_of(Mesh), 2);

    let attempts: Vec<u32> = scheduler.records_of(Mesh).iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(scheduler.records_of(Mesh).iter().all(|r| r.exit_code == 1));
}

#[test]
fn retry_that_succeeds_completes_the_step() {
    let launcher = ScriptedLauncher::new().with_outcomes(Mesh, [Outcome::Exit(3), Outcome::Exit(0)]);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Map, &[Mesh])
        .retry_attempts(1)
        .build(launcher.clone(), StaticProbe::empty())
        .unwrap();

    while !scheduler.run_iteration().unwrap().done {}

    assert_eq!(scheduler.status_of(Mesh), StepStatus::Complete);
    assert_eq!(scheduler.status_of(Map), StepStatus::Complete);
    assert_eq!(scheduler.retries_of(Mesh), 1);
    assert_eq!(launcher.launches(), vec![Mesh, Mesh, Map]);
}

#[tokio::test]
async fn permanently_failed_dependency_blocks_dependents_but_run_terminates() {
    init_tracing();
    let launcher = ScriptedLauncher::new().always(Mesh, 1, 1);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Map, &[Mesh])
        .step(Topo, &[])
        .build(launcher.clone(), StaticProbe::empty())
        .unwrap();

    let summary = with_timeout(scheduler.run()).await.unwrap();

    assert_eq!(summary.status_of(Mesh), Some(StepStatus::Failed));
    assert_eq!(summary.status_of(Topo), Some(StepStatus::Complete));
    // Withheld, never launched, never marked failed.
    assert_eq!(summary.status_of(Map), Some(StepStatus::ToDo));
    assert!(summary.steps[&Map].blocked);
    assert!(summary.steps[&Map].records.is_empty());
    assert_eq!(summary.failed_steps(), vec![Mesh]);
    assert!(!launcher.launches().contains(&Map));
}

#[tokio::test]
async fn blocking_is_transitive_along_chains() {
    let launcher = ScriptedLauncher::new().always(Mesh, 1, 1);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Topo, &[Mesh])
        .step(AtmIc, &[Mesh, Topo])
        .max_iter(20)
        .build(launcher.clone(), StaticProbe::empty())
        .unwrap();

    let summary = with_timeout(scheduler.run()).await.unwrap();

    assert_eq!(summary.blocked_steps(), vec![Topo, AtmIc]);
    assert_eq!(launcher.launches(), vec![Mesh]);
    assert!(summary.iterations < 20);
}

#[test]
fn launch_failure_consumes_a_retry() {
    init_tracing();
    let launcher = ScriptedLauncher::new()
        .with_outcomes(Mesh, [Outcome::LaunchError("no such shell".to_string())]);
    let probe = StaticProbe::empty();
    let refreshes = probe.refresh_counter();
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .retry_attempts(1)
        .build(launcher.clone(), probe)
        .unwrap();

    let first = scheduler.run_iteration().unwrap();
    assert_eq!(first.launched, vec![Mesh]);
    assert_eq!(first.retried, vec![Mesh]);
    assert_eq!(scheduler.retries_of(Mesh), 1);

    let record = scheduler.last_record(Mesh).unwrap();
    assert_eq!(record.exit_code, -1);
    assert!(record.stderr.as_buffer().unwrap().contains("no such shell"));
    // A process that never started leaves nothing to refresh.
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);

    while !scheduler.run_iteration().unwrap().done {}
    assert_eq!(scheduler.status_of(Mesh), StepStatus::Complete);
    assert_eq!(
        launcher.events()[0],
        FakeEvent::LaunchFailed {
            step: Mesh,
            attempt: 1
        }
    );
}

#[test]
fn steps_with_existing_outputs_start_complete() {
    let launcher = ScriptedLauncher::new();
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Map, &[Mesh])
        .build(launcher.clone(), StaticProbe::empty().with_present(Mesh))
        .unwrap();

    let first = scheduler.run_iteration().unwrap();
    assert_eq!(first.launched, vec![Map]);
    assert!(!launcher.launches().contains(&Mesh));
}

#[test]
fn nothing_to_do_finishes_in_one_iteration() {
    let launcher = ScriptedLauncher::new();
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .build(launcher.clone(), StaticProbe::empty().with_present(Mesh))
        .unwrap();

    let report = scheduler.run_iteration().unwrap();
    assert!(report.done);
    assert!(launcher.launches().is_empty());
}

#[test]
fn listing_is_refreshed_once_per_finished_process() {
    let launcher = ScriptedLauncher::new()
        .with_outcomes(Mesh, [Outcome::ExitAfter { polls: 3, code: 0 }])
        .with_outcomes(Topo, [Outcome::Exit(2), Outcome::Exit(0)]);
    let probe = StaticProbe::empty();
    let refreshes = probe.refresh_counter();
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Topo, &[])
        .retry_attempts(1)
        .build(launcher, probe)
        .unwrap();

    while !scheduler.run_iteration().unwrap().done {}

    // mesh once, topo twice (failed attempt + retry).
    assert_eq!(refreshes.load(Ordering::SeqCst), 3);
}

#[test]
fn long_running_step_stays_in_progress() {
    let launcher =
        ScriptedLauncher::new().with_outcomes(Mesh, [Outcome::ExitAfter { polls: 2, code: 0 }]);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .build(launcher, StaticProbe::empty())
        .unwrap();

    scheduler.run_iteration().unwrap();
    for _ in 0..2 {
        let report = scheduler.run_iteration().unwrap();
        assert!(report.finished.is_empty());
        assert_eq!(scheduler.status_of(Mesh), StepStatus::InProgress);
    }
    let report = scheduler.run_iteration().unwrap();
    assert_eq!(report.finished, vec![(Mesh, 0)]);
}

#[test]
fn iteration_ceiling_is_fatal() {
    let launcher =
        ScriptedLauncher::new().with_outcomes(Mesh, [Outcome::ExitAfter { polls: 100, code: 0 }]);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .max_iter(5)
        .build(launcher, StaticProbe::empty())
        .unwrap();

    let mut result = Ok(());
    for _ in 0..6 {
        if let Err(e) = scheduler.run_iteration() {
            result = Err(e);
            break;
        }
    }

    match result {
        Err(RrmflowError::IterationCeilingExceeded { max_iter }) => assert_eq!(max_iter, 5),
        other => panic!("expected IterationCeilingExceeded, got {other:?}"),
    }
    assert_eq!(scheduler.iteration(), 6);
}

#[tokio::test]
async fn run_returns_ceiling_error() {
    let launcher =
        ScriptedLauncher::new().with_outcomes(Mesh, [Outcome::ExitAfter { polls: 100, code: 0 }]);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .max_iter(3)
        .build(launcher, StaticProbe::empty())
        .unwrap();

    let err = with_timeout(scheduler.run()).await.unwrap_err();
    assert!(matches!(err, RrmflowError::IterationCeilingExceeded { max_iter: 3 }));
}

#[test]
fn unknown_dependency_is_rejected_at_construction() {
    let result = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Domain, &[Mesh, Map])
        .build(ScriptedLauncher::new(), StaticProbe::empty());

    match result {
        Err(RrmflowError::UnknownDependency { step, dependency }) => {
            assert_eq!(step, Domain);
            assert_eq!(dependency, Map);
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
}

#[test]
fn cycle_is_rejected_at_construction() {
    let result = PipelineBuilder::new()
        .step(Mesh, &[Topo])
        .step(Topo, &[Mesh])
        .build(ScriptedLauncher::new(), StaticProbe::empty());
    assert!(matches!(result, Err(RrmflowError::DependencyCycle(_))));
}

#[test]
fn missing_script_is_rejected_at_construction() {
    let builder = PipelineBuilder::new().step(Mesh, &[]).step(Map, &[Mesh]);
    let commands = StepCommands::new("bash", "/tmp").with_script(Mesh, "mesh.sh");

    let result = Scheduler::new(
        builder.graph(),
        ScriptedLauncher::new(),
        StaticProbe::empty(),
        commands,
        builder.options(),
    );
    assert!(matches!(result, Err(RrmflowError::ConfigError(_))));
}

#[test]
fn set_dependency_waits_for_every_member() {
    let launcher =
        ScriptedLauncher::new().with_outcomes(Map, [Outcome::ExitAfter { polls: 2, code: 0 }]);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Map, &[Mesh])
        .dependency(Domain, Dependency::from_steps([Mesh, Map]))
        .build(launcher.clone(), StaticProbe::empty())
        .unwrap();

    while !scheduler.run_iteration().unwrap().done {}

    let events = launcher.events();
    let map_done = events
        .iter()
        .position(|e| matches!(e, FakeEvent::Exited { step: Map, .. }))
        .unwrap();
    let domain_launch = events
        .iter()
        .position(|e| matches!(e, FakeEvent::Launched { step: Domain, .. }))
        .unwrap();
    assert!(map_done < domain_launch);
}

#[test]
fn launch_order_within_iteration_follows_step_order() {
    let launcher = ScriptedLauncher::new();
    let mut scheduler = PipelineBuilder::new()
        .step(AtmIc, &[])
        .step(Topo, &[])
        .step(Mesh, &[])
        .build(launcher, StaticProbe::empty())
        .unwrap();

    let report = scheduler.run_iteration().unwrap();
    assert_eq!(report.launched, vec![Mesh, Topo, AtmIc]);
}

#[test]
fn launch_specs_use_shell_script_and_attempt() {
    let launcher = ScriptedLauncher::new().always(Mesh, 1, 1);
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .retry_attempts(1)
        .build(launcher.clone(), StaticProbe::empty())
        .unwrap();

    while !scheduler.run_iteration().unwrap().done {}

    let specs = launcher.specs();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].program, "bash");
    assert_eq!(specs[0].args, vec!["mesh.sh".to_string()]);
    assert_eq!(specs[0].attempt, 1);
    assert_eq!(specs[1].attempt, 2);
}

#[test]
fn status_file_is_rewritten_each_iteration() {
    let fs = MockFileSystem::new();
    let mut scheduler = PipelineBuilder::new()
        .step(Mesh, &[])
        .step(Map, &[Mesh])
        .status_file("/run/RRMStatus.log")
        .build(ScriptedLauncher::new(), StaticProbe::empty())
        .unwrap()
        .with_file_system(Arc::new(fs.clone()));

    scheduler.run_iteration().unwrap();
    let text = fs.contents("/run/RRMStatus.log").unwrap();
    assert!(text.contains("iteration: 1"));
    assert!(text.lines().any(|l| l.starts_with("mesh") && l.contains("in-progress")));
    assert!(text.lines().any(|l| l.starts_with("map") && l.contains("to-do")));

    while !scheduler.run_iteration().unwrap().done {}
    let text = fs.contents("/run/RRMStatus.log").unwrap();
    assert!(text.lines().any(|l| l.starts_with("map") && l.contains("complete")));
}

#[test]
fn default_options_match_documented_defaults() {
    let options = SchedulerOptions::default();
    assert_eq!(options.retry_attempts, 0);
    assert_eq!(options.max_iter, 2880);
    assert!(options.status_file.is_none());
}

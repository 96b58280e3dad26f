use std::path::Path;
use std::time::Duration;

use rrmflow::errors::RrmflowError;
use rrmflow::exec::{
    CapturedStream, LaunchSpec, OutputMode, ProcessHandle, ProcessLauncher, ProcessPoll,
    RunRecord, TokioLauncher,
};
use rrmflow::types::Step;
use rrmflow_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;

fn sh(step: Step, script: &str, cwd: &Path, output: OutputMode) -> LaunchSpec {
    LaunchSpec {
        step,
        attempt: 1,
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        cwd: cwd.to_path_buf(),
        output,
    }
}

async fn wait_for_exit(handle: &mut Box<dyn ProcessHandle>) -> RunRecord {
    loop {
        match handle.poll().unwrap() {
            ProcessPoll::Exited(record) => return record,
            ProcessPoll::Running => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
}

#[tokio::test]
async fn captures_stdout_stderr_and_exit_code() {
    init_tracing();
    let dir = tempdir().unwrap();
    let spec = sh(
        Step::Mesh,
        "echo out-line; echo err-line >&2; exit 3",
        dir.path(),
        OutputMode::Capture,
    );

    let mut handle = TokioLauncher::new().start(&spec).unwrap();
    let record = with_timeout(wait_for_exit(&mut handle)).await;

    assert_eq!(record.step, Step::Mesh);
    assert_eq!(record.attempt, 1);
    assert_eq!(record.exit_code, 3);
    assert!(!record.success());
    assert_eq!(record.stdout, CapturedStream::Buffer("out-line\n".to_string()));
    assert_eq!(record.stderr, CapturedStream::Buffer("err-line\n".to_string()));
}

#[tokio::test]
async fn runs_in_the_given_working_directory() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
    let spec = sh(Step::Topo, "cat marker.txt", dir.path(), OutputMode::Capture);

    let mut handle = TokioLauncher::new().start(&spec).unwrap();
    let record = with_timeout(wait_for_exit(&mut handle)).await;

    assert!(record.success());
    assert_eq!(record.stdout.as_buffer(), Some("here"));
}

#[tokio::test]
async fn poll_does_not_block_while_running() {
    let dir = tempdir().unwrap();
    let spec = sh(Step::Map, "sleep 1", dir.path(), OutputMode::Capture);

    let mut handle = TokioLauncher::new().start(&spec).unwrap();
    assert!(matches!(handle.poll().unwrap(), ProcessPoll::Running));

    let record = with_timeout(wait_for_exit(&mut handle)).await;
    assert_eq!(record.exit_code, 0);
    assert!(record.duration >= Duration::from_millis(500));
}

#[tokio::test]
async fn log_file_mode_writes_streams_to_files() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("mesh.out");
    let err = dir.path().join("mesh.err");
    std::fs::write(&out, "stale contents from an earlier attempt\n").unwrap();

    let spec = sh(
        Step::Mesh,
        "echo to-file; echo to-err >&2",
        dir.path(),
        OutputMode::LogFiles {
            stdout: out.clone(),
            stderr: err.clone(),
        },
    );

    let mut handle = TokioLauncher::new().start(&spec).unwrap();
    let record = with_timeout(wait_for_exit(&mut handle)).await;

    assert!(record.success());
    assert_eq!(record.stdout, CapturedStream::File(out.clone()));
    assert_eq!(record.stdout.read().unwrap(), "to-file\n");
    assert_eq!(record.stderr.read().unwrap(), "to-err\n");
}

#[tokio::test]
async fn missing_program_is_launch_error() {
    let dir = tempdir().unwrap();
    let spec = LaunchSpec {
        step: Step::AtmIc,
        attempt: 2,
        program: "rrmflow-no-such-shell-xyz".to_string(),
        args: vec!["script.sh".to_string()],
        cwd: dir.path().to_path_buf(),
        output: OutputMode::Capture,
    };

    let err = TokioLauncher::new().start(&spec).unwrap_err();
    match err {
        RrmflowError::ProcessLaunch { step, message } => {
            assert_eq!(step, Step::AtmIc);
            assert!(message.contains("rrmflow-no-such-shell-xyz"));
        }
        other => panic!("expected ProcessLaunch, got {other:?}"),
    }
}

#[test]
fn launch_failure_record_carries_message() {
    let spec = sh(Step::Domain, "true", Path::new("/"), OutputMode::Capture);
    let record = RunRecord::launch_failure(&spec, "boom");

    assert_eq!(record.exit_code, -1);
    assert_eq!(record.attempt, 1);
    assert_eq!(record.stderr.as_buffer(), Some("boom"));
    assert_eq!(spec.command_line(), "sh -c true");
}

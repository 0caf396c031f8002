//! End-to-end pipeline tests against `ExecutionService`, no HTTP involved.

use crate::common::{
    registry_with_shell, registry_with_shell_limits, setup_test_logging, shell_request,
    test_config,
};
use assert_matches::assert_matches;
use seek_common::{ExecError, ExecuteRequest, NullRecordSink, Outcome};
use seek_sandbox::{ExecutionService, ServiceConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn service() -> ExecutionService {
    ExecutionService::detached(test_config()).expect("service init")
}

#[tokio::test]
async fn test_shell_hello_world_end_to_end() {
    setup_test_logging();
    let service = service();
    let report = service
        .execute(&shell_request("echo hello"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.result.outcome, Outcome::Success);
    assert_eq!(report.result.exit_code, 0);
    assert_eq!(report.result.stdout.text, "hello\n");
    assert!(report.result.stderr.text.is_empty());
    assert!(!report.result.stdout.truncated);
    assert_eq!(report.language_id, "shell");
}

#[tokio::test]
async fn test_stdin_reaches_the_program() {
    let service = service();
    let mut request = shell_request("read line; echo \"got: $line\"");
    request.input = "ping\n".to_string();
    let report = service
        .execute(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.result.outcome, Outcome::Success);
    assert_eq!(report.result.stdout.text, "got: ping\n");
}

#[tokio::test]
async fn test_nonzero_exit_is_reported_not_errored() {
    let service = service();
    let report = service
        .execute(&shell_request("echo bad >&2; exit 7"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.result.outcome, Outcome::RuntimeError);
    assert_eq!(report.result.exit_code, 7);
    assert_eq!(report.result.stderr.text, "bad\n");
}

#[tokio::test]
async fn test_wall_deadline_kills_the_process() {
    setup_test_logging();
    let registry =
        registry_with_shell_limits(|l| l.with_wall_time(Duration::from_millis(300)));
    let service =
        ExecutionService::with_registry(test_config(), registry, Arc::new(NullRecordSink))
            .unwrap();

    let report = service
        .execute(&shell_request("sleep 10"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.result.outcome, Outcome::Timeout);
    assert!(report.result.wall_time_ms < 5_000);
    assert_eq!(service.active_sandboxes(), 0);
}

#[tokio::test]
async fn test_output_ceiling_truncates_and_stops() {
    let registry = registry_with_shell_limits(|l| {
        l.with_max_output_bytes(1024)
            .with_wall_time(Duration::from_secs(10))
    });
    let service =
        ExecutionService::with_registry(test_config(), registry, Arc::new(NullRecordSink))
            .unwrap();

    let report = service
        .execute(
            &shell_request("while true; do echo spamspamspamspam; done"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.result.outcome, Outcome::OutputExceeded);
    assert!(report.result.stdout.truncated);
    assert!(report.result.stdout.text.len() <= 1024);
    // Killed long before the wall deadline.
    assert!(report.result.wall_time_ms < 5_000);
}

#[tokio::test]
async fn test_capacity_rejection_when_saturated() {
    let config = ServiceConfig {
        max_concurrency: 1,
        max_queue_depth: 0,
        ..test_config()
    };
    let service = ExecutionService::detached(config).unwrap();

    let blocker = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .execute(&shell_request("sleep 2"), &CancellationToken::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    let err = service
        .execute(&shell_request("echo hi"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, ExecError::Capacity);

    let first = blocker.await.unwrap().unwrap();
    assert_eq!(first.result.outcome, Outcome::Success);
    assert_eq!(service.active_sandboxes(), 0);
}

#[tokio::test]
async fn test_cancellation_mid_run() {
    let service = service();
    let cancel = CancellationToken::new();

    let handle = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            service.execute(&shell_request("sleep 10"), &cancel).await
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.result.outcome, Outcome::Canceled);
    assert!(report.result.wall_time_ms < 5_000);
    assert_eq!(service.active_sandboxes(), 0);
}

#[tokio::test]
async fn test_disconnect_releases_sandbox_within_grace() {
    setup_test_logging();
    let service = service();

    // A submission whose work lives in a forked child, so killing only the
    // direct shell would leave the sandbox occupied.
    let handle = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .execute(&shell_request("sleep 30 & wait"), &CancellationToken::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(service.active_sandboxes(), 1);

    // Dropping the execute future is what an HTTP disconnect does.
    handle.abort();
    let _ = handle.await;

    let mut released = false;
    for _ in 0..20 {
        if service.active_sandboxes() == 0 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(released, "sandbox still alive 1s after disconnect");
}

#[tokio::test]
async fn test_compile_failure_skips_run_phase() {
    let registry = registry_with_shell(|shell| {
        shell.compile_command = Some(vec![
            "sh".into(),
            "-c".into(),
            "echo bad declaration >&2; exit 1".into(),
        ]);
    });
    let service =
        ExecutionService::with_registry(test_config(), registry, Arc::new(NullRecordSink))
            .unwrap();

    let report = service
        .execute(&shell_request("echo never runs"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.result.outcome, Outcome::CompileError);
    assert_eq!(report.result.stderr.text, "bad declaration\n");
    assert!(report.result.stdout.text.is_empty());
    assert_eq!(service.active_sandboxes(), 0);
}

#[tokio::test]
async fn test_memory_ceiling_is_applied_inside_the_jail() {
    let registry = registry_with_shell_limits(|l| l.with_memory_bytes(64 * 1024 * 1024));
    let service =
        ExecutionService::with_registry(test_config(), registry, Arc::new(NullRecordSink))
            .unwrap();

    // ulimit -v reports the address-space ceiling in kilobytes.
    let report = service
        .execute(&shell_request("ulimit -v"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.result.outcome, Outcome::Success);
    assert_eq!(report.result.stdout.text.trim(), "65536");
}

#[tokio::test]
async fn test_file_size_ceiling_kills_the_writer() {
    let registry = registry_with_shell(|shell| shell.limits.max_file_size_bytes = 64 * 1024);
    let service =
        ExecutionService::with_registry(test_config(), registry, Arc::new(NullRecordSink))
            .unwrap();

    let report = service
        .execute(
            &shell_request("dd if=/dev/zero of=big.bin bs=4096 count=64 2>/dev/null"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // dd dies to SIGXFSZ once the 64 KiB ceiling is crossed; the shell
    // reports the signal death as 128+25.
    assert_eq!(report.result.outcome, Outcome::RuntimeError);
    assert_eq!(report.result.exit_code, 153);
}

#[tokio::test]
async fn test_no_sandbox_leak_across_many_submissions() {
    let service = service();
    for i in 0..10 {
        let request = if i % 2 == 0 {
            shell_request("echo ok")
        } else {
            shell_request("exit 1")
        };
        let _ = service.execute(&request, &CancellationToken::new()).await;
    }
    assert_eq!(service.active_sandboxes(), 0);
}

#[tokio::test]
async fn test_alias_resolves_through_full_pipeline() {
    let service = service();
    let request = ExecuteRequest {
        code: "echo aliased".to_string(),
        language: "bash".to_string(),
        input: String::new(),
    };
    let report = service
        .execute(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.language_id, "shell");
    assert_eq!(report.result.stdout.text, "aliased\n");
}

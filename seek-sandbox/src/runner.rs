//! Execution orchestrator: drives the compile -> run pipeline inside a
//! sandbox, applies deadlines, caps output streams while they are produced,
//! and classifies the raw wait status into an [`Outcome`].

use crate::limits::ResourceLimits;
use crate::profile::LanguageProfile;
use crate::sandbox::SandboxHandle;
use crate::validate::Submission;
use seek_common::{CapturedStream, ExecutionResult, Outcome};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Run one submission to completion inside its sandbox.
///
/// Never returns an error for anything the submitted code did; every
/// child-process failure is caught and classified. The sandbox is not
/// released here - that stays with the caller so the guarantee lives in one
/// place.
pub async fn run(
    submission: &Submission,
    profile: &LanguageProfile,
    sandbox: &SandboxHandle,
    cancel: &CancellationToken,
) -> ExecutionResult {
    let source_name = profile.source_name();
    if let Err(e) = sandbox.write_source(&source_name, &submission.code).await {
        return ExecutionResult::infra_failure(e.to_string());
    }

    let dir = sandbox.dir().to_path_buf();
    let env = profile.render_env(&dir);

    // Compile phase. Strictly precedes the run phase; a failure here is
    // final and the run phase is skipped.
    if let Some(template) = &profile.compile_command {
        let spec = PhaseSpec {
            argv: profile.render(template, &dir),
            dir: &dir,
            env: env.clone(),
            stdin: None,
            limits: &profile.limits,
            deadline: profile.limits.compile_time,
            probe_memory: false,
        };
        let phase = run_phase(sandbox, spec, cancel).await;

        if let Some(message) = phase.spawn_error {
            return ExecutionResult::infra_failure(message);
        }
        if phase.canceled {
            return phase.into_result(Outcome::Canceled);
        }
        if phase.timed_out {
            tracing::debug!(submission_id = %submission.id, "compile phase timed out");
            return phase.into_result(Outcome::Timeout);
        }
        if phase.exit_code != 0 {
            return phase.into_result(Outcome::CompileError);
        }
    }

    // Run phase.
    let spec = PhaseSpec {
        argv: profile.render(&profile.run_command, &dir),
        dir: &dir,
        env,
        stdin: submission.stdin.as_deref(),
        limits: &profile.limits,
        deadline: profile.limits.wall_time,
        probe_memory: true,
    };
    let phase = run_phase(sandbox, spec, cancel).await;

    if let Some(message) = phase.spawn_error {
        return ExecutionResult::infra_failure(message);
    }
    let outcome = classify_run_phase(&phase, &profile.limits);
    phase.into_result(outcome)
}

/// Map a finished run phase to its outcome. Precedence: cancellation, then
/// the deadline, then the output ceiling, then the memory ceiling, then the
/// exit code.
pub(crate) fn classify_run_phase(phase: &PhaseOutput, limits: &ResourceLimits) -> Outcome {
    if phase.canceled {
        return Outcome::Canceled;
    }
    if phase.timed_out {
        return Outcome::Timeout;
    }
    if phase.stdout_truncated || phase.stderr_truncated {
        return Outcome::OutputExceeded;
    }
    if memory_exceeded(phase, limits) {
        return Outcome::MemoryExceeded;
    }
    if phase.exit_code == 0 {
        Outcome::Success
    } else {
        Outcome::RuntimeError
    }
}

/// The rlimit kill shows up as a signal death, not a tidy error. Treat a
/// kill/segv/abort with peak usage at or near the ceiling as the ceiling's
/// doing; everything else stays a runtime error with the raw code.
fn memory_exceeded(phase: &PhaseOutput, limits: &ResourceLimits) -> bool {
    if phase.peak_memory_bytes >= limits.memory_bytes {
        return true;
    }
    match phase.signal {
        Some(sig) if sig == 9 || sig == 11 || sig == 6 => {
            phase.peak_memory_bytes >= limits.memory_bytes / 10 * 9
        }
        _ => false,
    }
}

/// One compile or run phase invocation.
pub(crate) struct PhaseSpec<'a> {
    pub argv: Vec<String>,
    pub dir: &'a Path,
    pub env: Vec<(String, String)>,
    pub stdin: Option<&'a str>,
    pub limits: &'a ResourceLimits,
    pub deadline: Duration,
    pub probe_memory: bool,
}

/// Raw observations from one phase, before classification.
#[derive(Debug, Default)]
pub(crate) struct PhaseOutput {
    pub exit_code: i32,
    pub signal: Option<i32>,
    pub stdout: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr: Vec<u8>,
    pub stderr_truncated: bool,
    pub wall_time_ms: u64,
    pub peak_memory_bytes: u64,
    pub timed_out: bool,
    pub canceled: bool,
    pub spawn_error: Option<String>,
}

impl PhaseOutput {
    fn into_result(self, outcome: Outcome) -> ExecutionResult {
        ExecutionResult {
            outcome,
            exit_code: self.exit_code,
            stdout: CapturedStream::new(self.stdout, self.stdout_truncated),
            stderr: CapturedStream::new(self.stderr, self.stderr_truncated),
            wall_time_ms: self.wall_time_ms,
            peak_memory_bytes: self.peak_memory_bytes,
        }
    }

    fn spawn_failed(message: String) -> Self {
        Self {
            exit_code: -1,
            spawn_error: Some(message),
            ..Self::default()
        }
    }
}

/// Ceilings applied inside the child between fork and exec. Plain `Copy`
/// data because the pre-exec closure must not touch the parent's heap.
#[cfg(unix)]
#[derive(Clone, Copy)]
struct RlimitSpec {
    memory_bytes: u64,
    cpu_secs: u64,
    max_processes: u32,
    max_open_files: u32,
    max_file_size_bytes: u64,
}

// glibc types the setrlimit resource argument (and the RLIMIT_* constants)
// as u32; musl and the BSDs use c_int.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
type RlimitResource = libc::__rlimit_resource_t;
#[cfg(all(unix, not(all(target_os = "linux", target_env = "gnu"))))]
type RlimitResource = libc::c_int;

#[cfg(unix)]
fn apply_jail(spec: RlimitSpec) -> std::io::Result<()> {
    fn set(resource: RlimitResource, value: u64) -> std::io::Result<()> {
        let lim = libc::rlimit {
            rlim_cur: value as libc::rlim_t,
            rlim_max: value as libc::rlim_t,
        };
        // Safety: setrlimit only reads the struct we just built.
        if unsafe { libc::setrlimit(resource, &lim) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    // Own session and process group, so the whole tree dies to one killpg.
    if unsafe { libc::setsid() } == -1 {
        return Err(std::io::Error::last_os_error());
    }

    set(libc::RLIMIT_AS, spec.memory_bytes)?;
    set(libc::RLIMIT_CPU, spec.cpu_secs.max(1))?;
    set(libc::RLIMIT_NOFILE, spec.max_open_files as u64)?;
    set(libc::RLIMIT_FSIZE, spec.max_file_size_bytes)?;
    set(libc::RLIMIT_CORE, 0)?;
    // NPROC can legitimately fail for unprivileged users already over the
    // host default; the jail still holds through the other ceilings.
    let _ = set(libc::RLIMIT_NPROC, spec.max_processes as u64);

    Ok(())
}

/// Kills the recorded process group when the phase future is dropped before
/// the wait completed. A disconnected caller drops the whole pipeline, and
/// `kill_on_drop` only reaches the direct child, not forked descendants.
struct PhaseDropGuard {
    sandbox: SandboxHandle,
}

impl Drop for PhaseDropGuard {
    fn drop(&mut self) {
        // No-op after a normal finish, where the pgid is already cleared.
        self.sandbox.kill_process_group();
    }
}

async fn run_phase(
    sandbox: &SandboxHandle,
    spec: PhaseSpec<'_>,
    cancel: &CancellationToken,
) -> PhaseOutput {
    let mut cmd = Command::new(&spec.argv[0]);
    cmd.args(&spec.argv[1..])
        .current_dir(spec.dir)
        .env_clear()
        .env("PATH", "/usr/local/bin:/usr/bin:/bin")
        .env("HOME", spec.dir)
        .env("TMPDIR", spec.dir)
        .env("LANG", "C.UTF-8")
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    {
        let rlimits = RlimitSpec {
            memory_bytes: spec.limits.memory_bytes,
            cpu_secs: spec.limits.cpu_time.as_secs(),
            max_processes: spec.limits.max_processes,
            max_open_files: spec.limits.max_open_files,
            max_file_size_bytes: spec.limits.max_file_size_bytes,
        };
        // Safety: apply_jail is async-signal-safe (setsid + setrlimit only).
        unsafe {
            cmd.pre_exec(move || apply_jail(rlimits));
        }
    }

    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return PhaseOutput::spawn_failed(format!(
                "failed to spawn {}: {e}",
                spec.argv[0]
            ));
        }
    };

    let pid = child.id().map(|p| p as i32).unwrap_or(0);
    // setsid in the child makes its pgid equal to its pid.
    sandbox.register_pgid(pid);
    let _drop_guard = PhaseDropGuard {
        sandbox: sandbox.clone(),
    };

    if let (Some(input), Some(mut stdin)) = (spec.stdin, child.stdin.take()) {
        let payload = input.as_bytes().to_vec();
        tokio::spawn(async move {
            let _ = stdin.write_all(&payload).await;
            let _ = stdin.shutdown().await;
        });
    }

    let cap = spec.limits.max_output_bytes;
    let stdout_task = child
        .stdout
        .take()
        .map(|stream| spawn_capped_reader(stream, cap, sandbox.clone()));
    let stderr_task = child
        .stderr
        .take()
        .map(|stream| spawn_capped_reader(stream, cap, sandbox.clone()));

    let peak = Arc::new(AtomicU64::new(0));
    let probe_stop = CancellationToken::new();
    if spec.probe_memory && pid > 0 {
        let peak = Arc::clone(&peak);
        let stop = probe_stop.clone();
        tokio::spawn(async move {
            while !stop.is_cancelled() {
                match peak_resident_bytes(pid) {
                    Some(bytes) => {
                        peak.fetch_max(bytes, Ordering::Relaxed);
                    }
                    // The proc entry vanishes once the child is reaped.
                    None => break,
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        });
    }

    let deadline_at = tokio::time::Instant::now() + spec.deadline;
    let mut timed_out = false;
    let mut canceled = false;
    let wait_result = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = tokio::time::sleep_until(deadline_at), if !timed_out && !canceled => {
                timed_out = true;
                sandbox.kill_process_group();
                let _ = child.start_kill();
            }
            _ = cancel.cancelled(), if !canceled && !timed_out => {
                canceled = true;
                sandbox.kill_process_group();
                let _ = child.start_kill();
            }
        }
    };
    probe_stop.cancel();
    sandbox.clear_pgid();

    let (exit_code, signal) = match &wait_result {
        Ok(status) => exit_code_of(status),
        Err(_) => (-1, None),
    };

    let (stdout, stdout_truncated) = match stdout_task {
        Some(task) => task.await.unwrap_or_default(),
        None => (Vec::new(), false),
    };
    let (stderr, stderr_truncated) = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => (Vec::new(), false),
    };

    PhaseOutput {
        exit_code,
        signal,
        stdout,
        stdout_truncated,
        stderr,
        stderr_truncated,
        wall_time_ms: started.elapsed().as_millis() as u64,
        peak_memory_bytes: peak.load(Ordering::Relaxed),
        timed_out,
        canceled,
        spawn_error: wait_result
            .err()
            .map(|e| format!("waiting on child failed: {e}")),
    }
}

/// Stream reader that stops consuming once the byte ceiling is hit and
/// kills the producer so the truncation bounds memory, not just the
/// response body.
fn spawn_capped_reader<R>(
    mut stream: R,
    cap: usize,
    sandbox: SandboxHandle,
) -> tokio::task::JoinHandle<(Vec<u8>, bool)>
where
    R: AsyncReadExt + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut captured = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => return (captured, false),
                Ok(n) => {
                    if captured.len() + n > cap {
                        let keep = cap - captured.len();
                        captured.extend_from_slice(&chunk[..keep]);
                        sandbox.kill_process_group();
                        return (captured, true);
                    }
                    captured.extend_from_slice(&chunk[..n]);
                }
                Err(_) => return (captured, false),
            }
        }
    })
}

fn exit_code_of(status: &std::process::ExitStatus) -> (i32, Option<i32>) {
    if let Some(code) = status.code() {
        return (code, None);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return (128 + sig, Some(sig));
        }
    }
    (-1, None)
}

/// Peak resident set of a live process, from /proc VmHWM. Best effort; the
/// process usually disappears between the last sample and the wait.
#[cfg(target_os = "linux")]
fn peak_resident_bytes(pid: i32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let line = status.lines().find(|l| l.starts_with("VmHWM:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

#[cfg(not(target_os = "linux"))]
fn peak_resident_bytes(_pid: i32) -> Option<u64> {
    None
}

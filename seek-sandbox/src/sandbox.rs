//! Sandbox provisioning and guaranteed teardown.
//!
//! The isolation primitive is a process-level jail: a per-submission scratch
//! directory, an own session/process group, rlimits applied before exec, and
//! a scrubbed environment. `release` is idempotent and `Drop` is the
//! backstop, so no exit path - error, panic, timeout, or a caller that
//! disappears mid-run - can leak a sandbox.

use seek_common::ExecError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Creates and accounts for sandboxes. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct SandboxProvisioner {
    scratch_root: PathBuf,
    active: Arc<AtomicUsize>,
}

impl SandboxProvisioner {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Result<Self, ExecError> {
        let scratch_root = scratch_root.into();
        std::fs::create_dir_all(&scratch_root)
            .map_err(|e| ExecError::Infra(format!("cannot create scratch root: {e}")))?;
        Ok(Self {
            scratch_root,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Create a fresh jail for one submission.
    pub async fn acquire(&self, submission_id: Uuid) -> Result<SandboxHandle, ExecError> {
        let sandbox_id = Uuid::new_v4();
        let dir = self.scratch_root.join(format!("sbx-{sandbox_id}"));

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ExecError::Infra(format!("sandbox dir creation failed: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            tokio::fs::set_permissions(&dir, perms)
                .await
                .map_err(|e| ExecError::Infra(format!("sandbox dir permissions failed: {e}")))?;
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(%sandbox_id, %submission_id, dir = %dir.display(), "sandbox acquired");

        Ok(SandboxHandle {
            inner: Arc::new(SandboxInner {
                id: sandbox_id,
                submission_id,
                dir,
                pgid: AtomicI32::new(0),
                released: AtomicBool::new(false),
                active: Arc::clone(&self.active),
            }),
        })
    }

    /// Number of live sandboxes. Returns to zero between submissions; the
    /// leak-detection harness asserts on this.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct SandboxInner {
    id: Uuid,
    submission_id: Uuid,
    dir: PathBuf,
    /// Process group of the currently running phase; 0 when nothing runs.
    pgid: AtomicI32,
    released: AtomicBool,
    active: Arc<AtomicUsize>,
}

/// Handle to one live jail. Exclusively owned by a single submission's
/// orchestration lifetime; clones exist only so reader tasks can trigger an
/// early kill.
#[derive(Debug, Clone)]
pub struct SandboxHandle {
    inner: Arc<SandboxInner>,
}

impl SandboxHandle {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn submission_id(&self) -> Uuid {
        self.inner.submission_id
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Write the submitted source into the jail.
    pub async fn write_source(&self, file_name: &str, code: &str) -> Result<PathBuf, ExecError> {
        let path = self.inner.dir.join(file_name);
        tokio::fs::write(&path, code)
            .await
            .map_err(|e| ExecError::Infra(format!("writing source failed: {e}")))?;
        Ok(path)
    }

    /// Record the process group of the phase that just spawned.
    pub fn register_pgid(&self, pgid: i32) {
        self.inner.pgid.store(pgid, Ordering::SeqCst);
    }

    pub fn clear_pgid(&self) {
        self.inner.pgid.store(0, Ordering::SeqCst);
    }

    /// SIGKILL the whole recorded process group, catching forked children.
    pub fn kill_process_group(&self) {
        let pgid = self.inner.pgid.load(Ordering::SeqCst);
        if pgid <= 0 {
            return;
        }
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => {
                    tracing::warn!(sandbox_id = %self.inner.id, pgid, "killpg failed: {e}");
                }
            }
        }
    }

    /// Tear the jail down: kill any remaining process tree, remove the
    /// scratch directory, drop the live-sandbox accounting. Idempotent and
    /// safe after partial failure.
    pub fn release(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.kill_process_group();
        if let Err(e) = std::fs::remove_dir_all(&self.inner.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    sandbox_id = %self.inner.id,
                    dir = %self.inner.dir.display(),
                    "scratch removal failed: {e}"
                );
            }
        }
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(sandbox_id = %self.inner.id, "sandbox released");
    }
}

impl Drop for SandboxInner {
    fn drop(&mut self) {
        // Last-resort teardown when release() was never reached (panic,
        // dropped future after a client disconnect).
        if !self.released.swap(true, Ordering::SeqCst) {
            let pgid = self.pgid.load(Ordering::SeqCst);
            #[cfg(unix)]
            if pgid > 0 {
                use nix::sys::signal::{killpg, Signal};
                use nix::unistd::Pid;
                let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
            }
            let _ = std::fs::remove_dir_all(&self.dir);
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

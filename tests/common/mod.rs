//! Common test utilities shared across the integration tests.

use seek_common::ExecuteRequest;
use seek_gateway::{GatewayState, HistoryStore};
use seek_sandbox::{ExecutionService, ProfileRegistry, ServiceConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Service configuration pointed at a fresh scratch directory.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        scratch_root: tempfile::tempdir()
            .expect("Failed to create temp dir")
            .into_path(),
        ..ServiceConfig::default()
    }
}

/// Execute request against the shell profile.
pub fn shell_request(code: &str) -> ExecuteRequest {
    ExecuteRequest {
        code: code.to_string(),
        language: "shell".to_string(),
        input: String::new(),
    }
}

/// Registry whose shell profile is rewritten by the caller, for tests that
/// need a compile stage or custom ceilings on a toolchain-free profile.
pub fn registry_with_shell(
    mutate: impl FnOnce(&mut seek_sandbox::LanguageProfile),
) -> Arc<ProfileRegistry> {
    let mut registry = ProfileRegistry::builtin();
    let mut shell = (*registry.get("shell").expect("builtin shell profile")).clone();
    mutate(&mut shell);
    registry.insert(shell);
    Arc::new(registry)
}

/// Registry whose shell profile carries custom limits, for deadline and
/// output-ceiling tests that must not wait out production defaults.
pub fn registry_with_shell_limits(
    mutate: impl FnOnce(seek_sandbox::ResourceLimits) -> seek_sandbox::ResourceLimits,
) -> Arc<ProfileRegistry> {
    registry_with_shell(|shell| shell.limits = mutate(shell.limits.clone()))
}

/// A gateway bound to an ephemeral port, torn down when dropped.
pub struct TestGateway {
    pub base_url: String,
    pub state: GatewayState,
    shutdown: CancellationToken,
}

impl TestGateway {
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: ServiceConfig) -> anyhow::Result<Self> {
        let history = Arc::new(HistoryStore::default());
        let service = ExecutionService::new(config, history.clone())?;
        let state = GatewayState::new(service, history);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        tokio::spawn(seek_gateway::start_server(
            listener,
            state.clone(),
            shutdown.clone(),
        ));

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            shutdown,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

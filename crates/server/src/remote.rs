//! Capability interface to a managed host. The production implementation
//! spawns the orchestrator binary as a short-lived child process, one JSON
//! request on its stdin and one JSON response on its stdout, which isolates
//! SSH-library failures from the request-handling process.

use anyhow::{anyhow, Context, Result};
use shared::{OrchestratorRequest, OrchestratorResponse};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::OrchestratorConfig;

#[axum::async_trait]
pub trait RemoteHost: Send + Sync {
    async fn run(&self, request: OrchestratorRequest) -> OrchestratorResponse;
}

pub struct ChildProcessHost {
    binary: PathBuf,
    grace: Duration,
}

impl ChildProcessHost {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            binary: locate_binary(&config.binary),
            grace: Duration::from_secs(config.grace_secs),
        }
    }

    async fn spawn(&self, request: &OrchestratorRequest) -> Result<OrchestratorResponse> {
        let timeout = request.action.timeout() + self.grace;

        let mut child = Command::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary.display()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Orchestrator stdin unavailable"))?;
        stdin.write_all(&serde_json::to_vec(request)?).await?;
        drop(stdin);

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("Orchestrator timed out after {} seconds", timeout.as_secs()))??;

        serde_json::from_slice(&output.stdout).context("Orchestrator returned malformed output")
    }
}

#[axum::async_trait]
impl RemoteHost for ChildProcessHost {
    async fn run(&self, request: OrchestratorRequest) -> OrchestratorResponse {
        match self.spawn(&request).await {
            Ok(response) => response,
            Err(e) => OrchestratorResponse::failure(format!("{e:#}")),
        }
    }
}

/// A bare binary name is resolved next to the running server binary first
/// (the usual deployment shape: both binaries in one directory), then left
/// to PATH lookup.
fn locate_binary(configured: &str) -> PathBuf {
    let configured_path = Path::new(configured);
    if configured_path.components().count() > 1 {
        return configured_path.to_path_buf();
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join(configured);
            if sibling.exists() {
                return sibling;
            }
        }
    }
    configured_path.to_path_buf()
}

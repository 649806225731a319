//! Wire protocol between the panel server and the one-shot SSH orchestrator
//! child process. One JSON request on stdin, one JSON response on stdout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote path of the VPN service configuration file.
pub const REMOTE_CONFIG_PATH: &str = "/etc/hysteria/config.json";

/// Shell command that fetches and runs the provisioning script.
pub const PROVISION_COMMAND: &str =
    "curl -fsSL https://get.hy2.sh/ | sudo bash";

/// Timeout for a regular remote action.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the provisioning script, which downloads and installs.
pub const PROVISION_TIMEOUT: Duration = Duration::from_secs(60);

/// The closed set of remote actions. Unknown action names fail at
/// deserialization with serde's "unknown variant" message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SshAction {
    TestConnection,
    UpdateVpnConfig,
    RestartService,
    ResetConfig,
}

impl SshAction {
    pub fn timeout(self) -> Duration {
        match self {
            Self::ResetConfig => PROVISION_TIMEOUT,
            _ => COMMAND_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_restart_command: Option<String>,
}

fn default_port() -> u16 {
    crate::models::DEFAULT_SSH_PORT
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    #[serde(default)]
    pub usernames: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorRequest {
    pub action: SshAction,
    pub ssh_config: SshConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ActionPayload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<LogEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl OrchestratorResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            log: None,
            data: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            log: None,
            data: None,
        }
    }

    pub fn with_log(mut self, log: Vec<LogEntry>) -> Self {
        self.log = Some(log);
        self
    }
}

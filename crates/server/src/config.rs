use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub owner: OwnerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

/// The owner account is configuration, not data: these two values are the
/// single authority for "who is the owner" across login, session issuance
/// and backup restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Orchestrator binary; a bare name is resolved next to the server
    /// binary first, then via PATH.
    #[serde(default = "default_orchestrator_binary")]
    pub binary: String,
    /// Extra seconds granted to the child process beyond the action timeout.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

fn default_orchestrator_binary() -> String {
    "vpnpanel-orchestrator".to_string()
}

fn default_grace_secs() -> u64 {
    10
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            binary: default_orchestrator_binary(),
            grace_secs: default_grace_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
            },
            owner: OwnerConfig {
                username: "admin".to_string(),
                password: "change-me-in-production".to_string(),
            },
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("VPNPANEL_CONFIG") {
            return Ok(Self::load_from_path(&PathBuf::from(path))?.with_env_overrides());
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("vpnpanel.toml"),
            PathBuf::from("config/vpnpanel.toml"),
            PathBuf::from("/etc/vpnpanel/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Ok(Self::load_from_path(&path)?.with_env_overrides());
            }
        }

        tracing::warn!("No config file found, using defaults");
        Ok(Self::default().with_env_overrides())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(username) = std::env::var("VPNPANEL_OWNER_USERNAME") {
            self.owner.username = username;
        }
        if let Ok(password) = std::env::var("VPNPANEL_OWNER_PASSWORD") {
            self.owner.password = password;
        }
        self
    }
}

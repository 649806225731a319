use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default account lifetime for newly created VPN users, in days.
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Default SSH port for managed hosts.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default command used to restart the VPN service on a managed host.
pub const DEFAULT_RESTART_COMMAND: &str = "sudo systemctl restart hysteria-server.service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Manager,
}

/// Operator account. The owner is configured out-of-band and never stored,
/// so records in the credential store always carry `Role::Manager`; the
/// variant exists because backup snapshots from older deployments may still
/// contain an owner record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub assigned_server_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new_manager(
        username: String,
        password_hash: String,
        assigned_server_id: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash,
            role: Role::Manager,
            assigned_server_id: Some(assigned_server_id),
            created_at: Utc::now(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }
}

/// A managed remote host and the SSH credentials to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDefinition {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub ssh_username: String,
    pub ssh_password: String,
    #[serde(default = "default_restart_command")]
    pub service_restart_command: String,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_restart_command() -> String {
    DEFAULT_RESTART_COMMAND.to_string()
}

/// A time-limited account on a managed VPN service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnUser {
    pub id: String,
    pub username: String,
    pub server_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VpnUser {
    pub fn new(username: String, server_id: String, created_by: String, expiry_days: i64) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            server_id,
            created_by,
            created_at,
            expires_at: created_at + chrono::Duration::days(expiry_days),
        }
    }

    /// Whole days until expiry, rounded up: a user expiring later today
    /// still has 1 day left, one past its expiry has 0 or less.
    pub fn days_left(&self, now: DateTime<Utc>) -> i64 {
        let ms = (self.expires_at - now).num_milliseconds();
        (ms as f64 / 86_400_000.0).ceil() as i64
    }

    pub fn status(&self, now: DateTime<Utc>) -> VpnUserStatus {
        VpnUserStatus::classify(self.days_left(now))
    }
}

/// Read-time expiry classification; nothing in the stored record changes
/// when a user crosses its expiry instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VpnUserStatus {
    Active,
    Expiring,
    Expired,
}

impl VpnUserStatus {
    pub fn classify(days_left: i64) -> Self {
        if days_left <= 0 {
            Self::Expired
        } else if days_left <= 7 {
            Self::Expiring
        } else {
            Self::Active
        }
    }
}

/// Full point-in-time export of the panel's state. VPN users are grouped
/// per server so snapshots stay readable when hand-inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub servers: Vec<ServerDefinition>,
    pub managers: Vec<Credential>,
    pub vpn_users: BTreeMap<String, Vec<VpnUser>>,
    pub created_at: DateTime<Utc>,
}

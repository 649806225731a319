//! JSON-file-backed collections. Every operation reads or writes a whole
//! file; the store provides no locking, so concurrent writers to the same
//! collection race with last-writer-wins semantics (acceptable for a small
//! admin team).

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use shared::{BackupSnapshot, Credential, ServerDefinition, VpnUser};
use std::path::{Path, PathBuf};
use tokio::fs;

const CREDENTIALS_FILE: &str = "credentials.json";
const SERVERS_FILE: &str = "servers.json";
const VPN_USERS_FILE: &str = "vpn-users.json";

#[derive(Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    async fn read_collection<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.collection_path(name);
        if !path.exists() {
            // Created empty on first access.
            fs::create_dir_all(&self.data_dir).await?;
            fs::write(&path, "[]").await?;
            return Ok(Vec::new());
        }
        let bytes = fs::read(&path).await?;
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {name}"))
    }

    async fn write_collection<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;
        let json = serde_json::to_vec_pretty(items)?;
        fs::write(self.collection_path(name), json).await?;
        Ok(())
    }

    // Managers

    pub async fn load_managers(&self) -> Result<Vec<Credential>> {
        self.read_collection(CREDENTIALS_FILE).await
    }

    pub async fn save_managers(&self, managers: &[Credential]) -> Result<()> {
        self.write_collection(CREDENTIALS_FILE, managers).await
    }

    // Servers

    pub async fn load_servers(&self) -> Result<Vec<ServerDefinition>> {
        self.read_collection(SERVERS_FILE).await
    }

    pub async fn save_servers(&self, servers: &[ServerDefinition]) -> Result<()> {
        self.write_collection(SERVERS_FILE, servers).await
    }

    // VPN users

    pub async fn load_vpn_users(&self) -> Result<Vec<VpnUser>> {
        self.read_collection(VPN_USERS_FILE).await
    }

    pub async fn save_vpn_users(&self, users: &[VpnUser]) -> Result<()> {
        self.write_collection(VPN_USERS_FILE, users).await
    }

    // Backups

    /// Persist a snapshot under a name that sorts lexically by creation
    /// time, so listing can order newest-first by name alone.
    pub async fn write_backup(&self, snapshot: &BackupSnapshot) -> Result<String> {
        let dir = self.backups_dir();
        fs::create_dir_all(&dir).await?;
        let filename = format!(
            "backup_{}.json",
            snapshot.created_at.format("%Y-%m-%d_%H-%M-%S")
        );
        let json = serde_json::to_vec_pretty(snapshot)?;
        fs::write(dir.join(&filename), json).await?;
        Ok(filename)
    }

    pub async fn list_backups(&self) -> Result<Vec<String>> {
        let dir = self.backups_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if name.starts_with("backup_") && name.ends_with(".json") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort_by(|a, b| b.cmp(a));
        Ok(names)
    }

    pub async fn read_backup(&self, filename: &str) -> Result<BackupSnapshot> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            bail!("Invalid backup filename: {filename}");
        }
        let path = self.backups_dir().join(filename);
        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("Backup {filename} not found"))?;
        serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {filename}"))
    }
}

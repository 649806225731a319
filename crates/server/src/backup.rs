//! Snapshot assembly and restore. Restore replaces collections wholesale
//! (no merge); each collection is a single overwrite, but there is no
//! cross-collection transaction, so a crash mid-restore can leave the
//! collections inconsistent. Accepted for an operator-driven maintenance
//! action.

use anyhow::Result;
use chrono::Utc;
use shared::{BackupSnapshot, Role, VpnUser};
use std::collections::BTreeMap;

use crate::store::JsonStore;

/// Read all three collections and group VPN users per server.
pub async fn assemble(store: &JsonStore) -> Result<BackupSnapshot> {
    let servers = store.load_servers().await?;
    let managers = store.load_managers().await?;
    let users = store.load_vpn_users().await?;

    let mut vpn_users: BTreeMap<String, Vec<VpnUser>> = BTreeMap::new();
    for user in users {
        vpn_users.entry(user.server_id.clone()).or_default().push(user);
    }

    Ok(BackupSnapshot {
        servers,
        managers,
        vpn_users,
        created_at: Utc::now(),
    })
}

/// Replace all live collections with the snapshot's contents. The owner is
/// never restored from a snapshot: its identity lives in configuration, so
/// any `role=owner` record in the snapshot's manager list is dropped rather
/// than allowed to overwrite the running system's identity.
pub async fn restore(store: &JsonStore, snapshot: BackupSnapshot) -> Result<()> {
    store.save_servers(&snapshot.servers).await?;

    let managers: Vec<_> = snapshot
        .managers
        .into_iter()
        .filter(|c| c.role == Role::Manager)
        .collect();
    store.save_managers(&managers).await?;

    let mut users = Vec::new();
    for (server_id, group) in snapshot.vpn_users {
        for mut user in group {
            user.server_id = server_id.clone();
            users.push(user);
        }
    }
    store.save_vpn_users(&users).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Credential, ServerDefinition};
    use std::collections::BTreeSet;

    fn server(id: &str) -> ServerDefinition {
        ServerDefinition {
            id: id.into(),
            name: format!("srv-{id}"),
            host: "10.0.0.1".into(),
            port: 22,
            ssh_username: "root".into(),
            ssh_password: "pw".into(),
            service_restart_command: shared::DEFAULT_RESTART_COMMAND.into(),
        }
    }

    #[tokio::test]
    async fn restore_of_a_fresh_snapshot_round_trips_vpn_users() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        store.save_servers(&[server("s1"), server("s2")]).await.unwrap();
        let users = vec![
            VpnUser::new("alice".into(), "s1".into(), "admin".into(), 30),
            VpnUser::new("bob".into(), "s1".into(), "admin".into(), 30),
            VpnUser::new("carol".into(), "s2".into(), "admin".into(), 30),
        ];
        store.save_vpn_users(&users).await.unwrap();

        let before: BTreeSet<(String, String)> = users
            .iter()
            .map(|u| (u.server_id.clone(), u.username.clone()))
            .collect();

        let snapshot = assemble(&store).await.unwrap();
        // Dirty the live state, then restore.
        store.save_vpn_users(&[]).await.unwrap();
        store.save_servers(&[]).await.unwrap();
        restore(&store, snapshot).await.unwrap();

        let after: BTreeSet<(String, String)> = store
            .load_vpn_users()
            .await
            .unwrap()
            .iter()
            .map(|u| (u.server_id.clone(), u.username.clone()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(store.load_servers().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn restore_drops_owner_records_from_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let mut foreign_owner =
            Credential::new_manager("intruder".into(), "hash".into(), "s1".into(), None);
        foreign_owner.role = Role::Owner;
        let manager = Credential::new_manager("m1".into(), "hash".into(), "s1".into(), None);

        let snapshot = BackupSnapshot {
            servers: vec![server("s1")],
            managers: vec![foreign_owner, manager],
            vpn_users: BTreeMap::new(),
            created_at: Utc::now(),
        };
        restore(&store, snapshot).await.unwrap();

        let managers = store.load_managers().await.unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].username, "m1");
    }

    #[tokio::test]
    async fn restore_reattaches_server_ids_from_the_grouping() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        // A user filed under s2 whose embedded serverId went stale.
        let mut user = VpnUser::new("dave".into(), "s-old".into(), "admin".into(), 30);
        user.server_id = "s-old".into();
        let mut grouping = BTreeMap::new();
        grouping.insert("s2".to_string(), vec![user]);

        let snapshot = BackupSnapshot {
            servers: vec![server("s2")],
            managers: Vec::new(),
            vpn_users: grouping,
            created_at: Utc::now(),
        };
        restore(&store, snapshot).await.unwrap();

        let users = store.load_vpn_users().await.unwrap();
        assert_eq!(users[0].server_id, "s2");
    }
}

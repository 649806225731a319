//! Backup endpoints. Snapshots are immutable timestamped files under the
//! data directory; restore replaces all live collections (owner only).

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{backup, error::AppError, session::AuthSession, state::AppState};
use shared::BackupSnapshot;

/// GET /backup
pub async fn current(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<BackupSnapshot>, AppError> {
    session.require_owner()?;
    Ok(Json(backup::assemble(&state.store).await?))
}

/// Either the name of a snapshot file in the backups directory, or a raw
/// snapshot carried inline (an export kept elsewhere).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RestoreRequest {
    FromFile { filename: String },
    Inline(BackupSnapshot),
}

/// POST /backup
pub async fn restore(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require_owner()?;

    let snapshot = match req {
        RestoreRequest::FromFile { filename } => state.store.read_backup(&filename).await?,
        RestoreRequest::Inline(snapshot) => snapshot,
    };

    backup::restore(&state.store, snapshot).await?;
    tracing::info!("Restored state from backup");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /backup/create
pub async fn create(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require_owner()?;

    let snapshot = backup::assemble(&state.store).await?;
    let filename = state.store.write_backup(&snapshot).await?;
    tracing::info!("Wrote backup {filename}");
    Ok(Json(serde_json::json!({ "filename": filename })))
}

/// GET /backup/files
pub async fn list_files(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require_owner()?;
    let files = state.store.list_backups().await?;
    Ok(Json(serde_json::json!({ "files": files })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{test_state, FakeRemote};
    use crate::session::SessionClaims;
    use shared::VpnUser;

    fn owner() -> AuthSession {
        AuthSession(SessionClaims::owner("admin"))
    }

    #[tokio::test]
    async fn create_then_restore_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());

        state
            .store
            .save_vpn_users(&[VpnUser::new("alice".into(), "s1".into(), "admin".into(), 30)])
            .await
            .unwrap();

        let created = create(State(state.clone()), owner()).await.unwrap();
        let filename = created.0["filename"].as_str().unwrap().to_string();

        // Wipe, then restore from the file.
        state.store.save_vpn_users(&[]).await.unwrap();
        restore(
            State(state.clone()),
            owner(),
            Json(RestoreRequest::FromFile { filename: filename.clone() }),
        )
        .await
        .unwrap();

        let users = state.store.load_vpn_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");

        let files = list_files(State(state), owner()).await.unwrap();
        assert_eq!(files.0["files"][0], serde_json::json!(filename));
    }

    #[tokio::test]
    async fn restore_accepts_an_inline_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());

        let snapshot: BackupSnapshot = serde_json::from_value(serde_json::json!({
            "servers": [],
            "managers": [],
            "vpnUsers": {
                "s1": [{
                    "id": "u1",
                    "username": "alice",
                    "serverId": "s1",
                    "createdBy": "admin",
                    "createdAt": "2026-08-01T00:00:00Z",
                    "expiresAt": "2026-09-01T00:00:00Z"
                }]
            },
            "createdAt": "2026-08-01T00:00:00Z"
        }))
        .unwrap();

        restore(State(state.clone()), owner(), Json(RestoreRequest::Inline(snapshot)))
            .await
            .unwrap();

        let users = state.store.load_vpn_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].server_id, "s1");
    }

    #[tokio::test]
    async fn backups_are_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());

        let manager = AuthSession(SessionClaims {
            username: "kara".into(),
            role: shared::Role::Manager,
            assigned_server_id: Some("s1".into()),
        });
        let res = current(State(state), manager).await;
        assert!(matches!(res, Err(AppError::Forbidden(_))));
    }
}

//! VPN user CRUD. Batch creation is all-or-nothing: one colliding username
//! rejects the whole batch with the full list of collisions, so the
//! operator can fix the request in one pass.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, routes::check_day_count, session::AuthSession, state::AppState};
use shared::{VpnUser, VpnUserStatus, DEFAULT_EXPIRY_DAYS};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnUserView {
    pub id: String,
    pub username: String,
    pub server_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub days_left: i64,
    pub status: VpnUserStatus,
}

impl VpnUserView {
    fn new(user: &VpnUser, now: DateTime<Utc>) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            server_id: user.server_id.clone(),
            created_by: user.created_by.clone(),
            created_at: user.created_at,
            expires_at: user.expires_at,
            days_left: user.days_left(now),
            status: user.status(now),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub server_id: Option<String>,
    pub created_by: Option<String>,
}

/// GET /vpn-users?serverId=&createdBy=
///
/// Managers are pinned to their assigned server no matter what the query
/// says.
pub async fn list(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<VpnUserView>>, AppError> {
    let server_filter = if session.0.is_owner() {
        query.server_id
    } else {
        match &session.0.assigned_server_id {
            Some(assigned) => Some(assigned.clone()),
            None => return Err(AppError::Forbidden("No server assigned".to_string())),
        }
    };

    let now = Utc::now();
    let users = state.store.load_vpn_users().await?;
    let views = users
        .iter()
        .filter(|u| server_filter.as_deref().map_or(true, |s| u.server_id == s))
        .filter(|u| query.created_by.as_deref().map_or(true, |c| u.created_by == c))
        .map(|u| VpnUserView::new(u, now))
        .collect();
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    pub server_id: String,
    pub usernames: Vec<String>,
    pub expiry_days: Option<i64>,
}

/// POST /vpn-users
pub async fn create_batch(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<CreateBatchRequest>,
) -> Result<Json<Vec<VpnUserView>>, AppError> {
    session.require_server_scope(&req.server_id)?;

    let expiry_days = req.expiry_days.unwrap_or(DEFAULT_EXPIRY_DAYS);
    check_day_count("expiryDays", expiry_days)?;

    // Trim, drop blanks, dedupe within the batch preserving order.
    let mut usernames: Vec<String> = Vec::new();
    for name in &req.usernames {
        let name = name.trim();
        if !name.is_empty() && !usernames.iter().any(|u| u == name) {
            usernames.push(name.to_string());
        }
    }
    if usernames.is_empty() {
        return Err(AppError::BadRequest(
            "At least one username is required".to_string(),
        ));
    }

    let servers = state.store.load_servers().await?;
    if !servers.iter().any(|s| s.id == req.server_id) {
        return Err(AppError::NotFound(format!("Server {} not found", req.server_id)));
    }

    let mut users = state.store.load_vpn_users().await?;
    let duplicates: Vec<String> = usernames
        .iter()
        .filter(|name| {
            users
                .iter()
                .any(|u| u.server_id == req.server_id && &u.username == *name)
        })
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        // All-or-nothing: nothing from the batch is written.
        return Err(AppError::DuplicateUsers(duplicates));
    }

    let now = Utc::now();
    let created: Vec<VpnUser> = usernames
        .into_iter()
        .map(|name| {
            VpnUser::new(
                name,
                req.server_id.clone(),
                session.0.username.clone(),
                expiry_days,
            )
        })
        .collect();
    let views = created.iter().map(|u| VpnUserView::new(u, now)).collect();
    let created_count = created.len();
    users.extend(created);
    state.store.save_vpn_users(&users).await?;

    tracing::info!(
        "Created {} VPN users on server {}",
        created_count,
        req.server_id
    );
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVpnUserRequest {
    pub username: Option<String>,
    /// Renew: expiry becomes now + renewDays.
    pub renew_days: Option<i64>,
}

/// PUT /vpn-users/:id
pub async fn update(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    Json(req): Json<UpdateVpnUserRequest>,
) -> Result<Json<VpnUserView>, AppError> {
    let mut users = state.store.load_vpn_users().await?;
    let index = users
        .iter()
        .position(|u| u.id == id)
        .ok_or_else(|| AppError::NotFound(format!("VPN user {id} not found")))?;
    session.require_server_scope(&users[index].server_id)?;

    if let Some(username) = &req.username {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::BadRequest("Username cannot be empty".to_string()));
        }
        let server_id = users[index].server_id.clone();
        if users
            .iter()
            .any(|u| u.id != id && u.server_id == server_id && u.username == username)
        {
            return Err(AppError::DuplicateUsers(vec![username.to_string()]));
        }
        users[index].username = username.to_string();
    }

    if let Some(days) = req.renew_days {
        check_day_count("renewDays", days)?;
        users[index].expires_at = Utc::now() + Duration::days(days);
    }

    let view = VpnUserView::new(&users[index], Utc::now());
    state.store.save_vpn_users(&users).await?;
    Ok(Json(view))
}

/// DELETE /vpn-users/:id
pub async fn remove(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut users = state.store.load_vpn_users().await?;
    let user = users
        .iter()
        .find(|u| u.id == id)
        .ok_or_else(|| AppError::NotFound(format!("VPN user {id} not found")))?;
    session.require_server_scope(&user.server_id)?;

    users.retain(|u| u.id != id);
    state.store.save_vpn_users(&users).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{test_state, FakeRemote};
    use crate::session::SessionClaims;
    use shared::{Role, ServerDefinition};

    fn owner() -> AuthSession {
        AuthSession(SessionClaims::owner("admin"))
    }

    fn manager(server_id: &str) -> AuthSession {
        AuthSession(SessionClaims {
            username: "kara".into(),
            role: Role::Manager,
            assigned_server_id: Some(server_id.into()),
        })
    }

    async fn seed_server(state: &AppState, id: &str) {
        let server = ServerDefinition {
            id: id.into(),
            name: format!("srv-{id}"),
            host: "10.0.0.1".into(),
            port: 22,
            ssh_username: "root".into(),
            ssh_password: "pw".into(),
            service_restart_command: shared::DEFAULT_RESTART_COMMAND.into(),
        };
        let mut servers = state.store.load_servers().await.unwrap();
        servers.push(server);
        state.store.save_servers(&servers).await.unwrap();
    }

    fn batch(server_id: &str, names: &[&str]) -> CreateBatchRequest {
        CreateBatchRequest {
            server_id: server_id.into(),
            usernames: names.iter().map(|s| s.to_string()).collect(),
            expiry_days: None,
        }
    }

    #[tokio::test]
    async fn batch_with_any_collision_writes_nothing_and_lists_all_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());
        seed_server(&state, "s1").await;

        create_batch(State(state.clone()), owner(), Json(batch("s1", &["alice", "bob"])))
            .await
            .unwrap();

        let res = create_batch(
            State(state.clone()),
            owner(),
            Json(batch("s1", &["alice", "carol", "bob"])),
        )
        .await;
        match res {
            Err(AppError::DuplicateUsers(names)) => {
                assert_eq!(names, vec!["alice".to_string(), "bob".to_string()]);
            }
            other => panic!("expected DuplicateUsers, got {other:?}"),
        }

        // carol was not written either.
        let users = state.store.load_vpn_users().await.unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn same_username_is_fine_on_a_different_server() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());
        seed_server(&state, "s1").await;
        seed_server(&state, "s2").await;

        create_batch(State(state.clone()), owner(), Json(batch("s1", &["alice"])))
            .await
            .unwrap();
        create_batch(State(state.clone()), owner(), Json(batch("s2", &["alice"])))
            .await
            .unwrap();
        assert_eq!(state.store.load_vpn_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn default_expiry_is_thirty_days() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());
        seed_server(&state, "s1").await;

        let created = create_batch(State(state), owner(), Json(batch("s1", &["alice"])))
            .await
            .unwrap();
        assert_eq!(created.0[0].days_left, 30);
        assert_eq!(created.0[0].status, VpnUserStatus::Active);
    }

    #[tokio::test]
    async fn huge_day_counts_are_rejected_with_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());
        seed_server(&state, "s1").await;

        // Far beyond chrono's representable range; must 400, not panic.
        let res = create_batch(
            State(state.clone()),
            owner(),
            Json(CreateBatchRequest {
                server_id: "s1".into(),
                usernames: vec!["alice".into()],
                expiry_days: Some(100_000_000_000),
            }),
        )
        .await;
        assert!(matches!(res, Err(AppError::BadRequest(_))));
        assert!(state.store.load_vpn_users().await.unwrap().is_empty());

        let created = create_batch(State(state.clone()), owner(), Json(batch("s1", &["bob"])))
            .await
            .unwrap();
        let res = update(
            State(state),
            owner(),
            Path(created.0[0].id.clone()),
            Json(UpdateVpnUserRequest {
                username: None,
                renew_days: Some(100_000_000_000),
            }),
        )
        .await;
        assert!(matches!(res, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn manager_queries_are_pinned_to_their_server() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());
        seed_server(&state, "s1").await;
        seed_server(&state, "s2").await;

        create_batch(State(state.clone()), owner(), Json(batch("s1", &["alice"])))
            .await
            .unwrap();
        create_batch(State(state.clone()), owner(), Json(batch("s2", &["bob"])))
            .await
            .unwrap();

        // The manager asks for s2 but only ever sees s1.
        let listed = list(
            State(state.clone()),
            manager("s1"),
            Query(ListQuery {
                server_id: Some("s2".into()),
                created_by: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(listed.0.len(), 1);
        assert_eq!(listed.0[0].username, "alice");

        let res = create_batch(State(state), manager("s1"), Json(batch("s2", &["mallory"])))
            .await;
        assert!(matches!(res, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn renew_extends_from_now() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());
        seed_server(&state, "s1").await;

        let created = create_batch(
            State(state.clone()),
            owner(),
            Json(CreateBatchRequest {
                server_id: "s1".into(),
                usernames: vec!["alice".into()],
                expiry_days: Some(1),
            }),
        )
        .await
        .unwrap();

        let renewed = update(
            State(state),
            owner(),
            Path(created.0[0].id.clone()),
            Json(UpdateVpnUserRequest {
                username: None,
                renew_days: Some(60),
            }),
        )
        .await
        .unwrap();
        assert_eq!(renewed.0.days_left, 60);
        assert_eq!(renewed.0.status, VpnUserStatus::Active);
    }

    #[tokio::test]
    async fn rename_collision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), FakeRemote::always_ok());
        seed_server(&state, "s1").await;

        let created = create_batch(
            State(state.clone()),
            owner(),
            Json(batch("s1", &["alice", "bob"])),
        )
        .await
        .unwrap();

        let res = update(
            State(state),
            owner(),
            Path(created.0[1].id.clone()),
            Json(UpdateVpnUserRequest {
                username: Some("alice".into()),
                renew_days: None,
            }),
        )
        .await;
        assert!(matches!(res, Err(AppError::DuplicateUsers(_))));
    }
}

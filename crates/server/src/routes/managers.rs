//! Manager account CRUD. Owner only: managers cannot see or edit each
//! other. Password hashes never leave the server.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    routes::{auth::hash_password, check_day_count},
    session::AuthSession,
    state::AppState,
};
use shared::{Credential, Role};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerView {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub assigned_server_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Credential> for ManagerView {
    fn from(c: &Credential) -> Self {
        Self {
            id: c.id.clone(),
            username: c.username.clone(),
            role: c.role,
            assigned_server_id: c.assigned_server_id.clone(),
            created_at: c.created_at,
            expires_at: c.expires_at,
        }
    }
}

/// GET /managers
pub async fn list(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<Vec<ManagerView>>, AppError> {
    session.require_owner()?;
    let managers = state.store.load_managers().await?;
    Ok(Json(managers.iter().map(ManagerView::from).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateManagerRequest {
    pub username: String,
    pub password: String,
    pub assigned_server_id: String,
    pub expiry_days: Option<i64>,
}

/// POST /managers
pub async fn create(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<CreateManagerRequest>,
) -> Result<Json<ManagerView>, AppError> {
    session.require_owner()?;

    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }
    if username == state.config.owner.username {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }
    if let Some(days) = req.expiry_days {
        check_day_count("expiryDays", days)?;
    }

    let servers = state.store.load_servers().await?;
    if !servers.iter().any(|s| s.id == req.assigned_server_id) {
        return Err(AppError::BadRequest(format!(
            "Unknown server: {}",
            req.assigned_server_id
        )));
    }

    let mut managers = state.store.load_managers().await?;
    if managers.iter().any(|m| m.username == username) {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let expires_at = req.expiry_days.map(|days| Utc::now() + Duration::days(days));
    let manager = Credential::new_manager(
        username,
        hash_password(&req.password)?,
        req.assigned_server_id,
        expires_at,
    );
    let view = ManagerView::from(&manager);
    managers.push(manager);
    state.store.save_managers(&managers).await?;

    tracing::info!("Created manager {}", view.username);
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManagerRequest {
    pub username: Option<String>,
    /// Omitted or empty keeps the stored password hash.
    pub password: Option<String>,
    pub assigned_server_id: Option<String>,
    pub expiry_days: Option<i64>,
}

/// PUT /managers/:id
pub async fn update(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    Json(req): Json<UpdateManagerRequest>,
) -> Result<Json<ManagerView>, AppError> {
    session.require_owner()?;

    let mut managers = state.store.load_managers().await?;
    let index = managers
        .iter()
        .position(|m| m.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Manager {id} not found")))?;

    if let Some(username) = &req.username {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::BadRequest("Username cannot be empty".to_string()));
        }
        if username == state.config.owner.username
            || managers.iter().any(|m| m.id != id && m.username == username)
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        managers[index].username = username.to_string();
    }

    if let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) {
        managers[index].password_hash = hash_password(password)?;
    }

    if let Some(server_id) = &req.assigned_server_id {
        let servers = state.store.load_servers().await?;
        if !servers.iter().any(|s| &s.id == server_id) {
            return Err(AppError::BadRequest(format!("Unknown server: {server_id}")));
        }
        managers[index].assigned_server_id = Some(server_id.clone());
    }

    if let Some(days) = req.expiry_days {
        check_day_count("expiryDays", days)?;
        managers[index].expires_at = Some(Utc::now() + Duration::days(days));
    }

    let view = ManagerView::from(&managers[index]);
    state.store.save_managers(&managers).await?;
    Ok(Json(view))
}

/// DELETE /managers/:id
pub async fn remove(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require_owner()?;

    let mut managers = state.store.load_managers().await?;
    let before = managers.len();
    managers.retain(|m| m.id != id);
    if managers.len() == before {
        return Err(AppError::NotFound(format!("Manager {id} not found")));
    }
    state.store.save_managers(&managers).await?;

    tracing::info!("Deleted manager {id}");
    Ok(Json(serde_json::json!({ "success": true })))
}

//! Managed server CRUD. Owner only, with one exception: a manager may
//! fetch their assigned server with the SSH password redacted.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, session::AuthSession, state::AppState};
use shared::{ServerDefinition, DEFAULT_RESTART_COMMAND, DEFAULT_SSH_PORT};

/// GET /servers
pub async fn list(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<Vec<ServerDefinition>>, AppError> {
    session.require_owner()?;
    Ok(Json(state.store.load_servers().await?))
}

/// GET /servers/:id
pub async fn get_one(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<ServerDefinition>, AppError> {
    session.require_server_scope(&id)?;

    let servers = state.store.load_servers().await?;
    let mut server = servers
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Server {id} not found")))?;

    if !session.0.is_owner() {
        server.ssh_password = String::new();
    }
    Ok(Json(server))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerRequest {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub ssh_username: String,
    pub ssh_password: String,
    pub service_restart_command: Option<String>,
}

/// POST /servers
pub async fn create(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<CreateServerRequest>,
) -> Result<Json<ServerDefinition>, AppError> {
    session.require_owner()?;

    if req.name.trim().is_empty() || req.host.trim().is_empty() || req.ssh_username.is_empty() {
        return Err(AppError::BadRequest(
            "name, host and sshUsername are required".to_string(),
        ));
    }

    let server = ServerDefinition {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        host: req.host.trim().to_string(),
        port: req.port.unwrap_or(DEFAULT_SSH_PORT),
        ssh_username: req.ssh_username,
        ssh_password: req.ssh_password,
        service_restart_command: req
            .service_restart_command
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RESTART_COMMAND.to_string()),
    };

    let mut servers = state.store.load_servers().await?;
    servers.push(server.clone());
    state.store.save_servers(&servers).await?;

    tracing::info!("Created server {} ({})", server.name, server.host);
    Ok(Json(server))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServerRequest {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ssh_username: Option<String>,
    /// Omitted or empty keeps the stored password.
    pub ssh_password: Option<String>,
    pub service_restart_command: Option<String>,
}

/// PUT /servers/:id
pub async fn update(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    Json(req): Json<UpdateServerRequest>,
) -> Result<Json<ServerDefinition>, AppError> {
    session.require_owner()?;

    let mut servers = state.store.load_servers().await?;
    let server = servers
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Server {id} not found")))?;

    if let Some(name) = req.name.filter(|n| !n.trim().is_empty()) {
        server.name = name.trim().to_string();
    }
    if let Some(host) = req.host.filter(|h| !h.trim().is_empty()) {
        server.host = host.trim().to_string();
    }
    if let Some(port) = req.port {
        server.port = port;
    }
    if let Some(username) = req.ssh_username.filter(|u| !u.is_empty()) {
        server.ssh_username = username;
    }
    if let Some(password) = req.ssh_password.filter(|p| !p.is_empty()) {
        server.ssh_password = password;
    }
    if let Some(command) = req.service_restart_command.filter(|c| !c.trim().is_empty()) {
        server.service_restart_command = command;
    }

    let updated = server.clone();
    state.store.save_servers(&servers).await?;
    Ok(Json(updated))
}

/// DELETE /servers/:id
///
/// Cascades: managers pointing at the server lose their assignment, and
/// every VPN user on the server is deleted.
pub async fn remove(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    session.require_owner()?;

    let mut servers = state.store.load_servers().await?;
    let before = servers.len();
    servers.retain(|s| s.id != id);
    if servers.len() == before {
        return Err(AppError::NotFound(format!("Server {id} not found")));
    }
    state.store.save_servers(&servers).await?;

    let mut managers = state.store.load_managers().await?;
    for manager in &mut managers {
        if manager.assigned_server_id.as_deref() == Some(id.as_str()) {
            manager.assigned_server_id = None;
        }
    }
    state.store.save_managers(&managers).await?;

    let mut users = state.store.load_vpn_users().await?;
    users.retain(|u| u.server_id != id);
    state.store.save_vpn_users(&users).await?;

    tracing::info!("Deleted server {id} and cascaded to managers and VPN users");
    Ok(Json(serde_json::json!({ "success": true })))
}

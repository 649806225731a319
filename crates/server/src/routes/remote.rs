//! Remote orchestration endpoints: the raw `/ssh` relay and the
//! `/sync-users` convenience flow (push the user list, then restart the
//! service).

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, session::AuthSession, state::AppState};
use shared::{
    ActionPayload, OrchestratorRequest, OrchestratorResponse, ServerDefinition, SshAction,
    SshConfig,
};

/// POST /ssh
///
/// Owner only: the body carries raw SSH credentials. The orchestrator's
/// result is relayed back verbatim, success flag and all.
pub async fn ssh_action(
    State(state): State<AppState>,
    session: AuthSession,
    Json(request): Json<OrchestratorRequest>,
) -> Result<Json<OrchestratorResponse>, AppError> {
    session.require_owner()?;
    let response = state.remote.run(request).await;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncUsersRequest {
    pub server_id: String,
    /// Defaults to the stored server definition when omitted.
    pub ssh_config: Option<SshConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncUsersResponse {
    pub success: bool,
    pub update: OrchestratorResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<OrchestratorResponse>,
}

fn ssh_config_for(server: &ServerDefinition) -> SshConfig {
    SshConfig {
        host: server.host.clone(),
        port: server.port,
        username: server.ssh_username.clone(),
        password: server.ssh_password.clone(),
        service_restart_command: Some(server.service_restart_command.clone()),
    }
}

/// POST /sync-users
///
/// Pushes the server's current VPN user list to the remote host, then
/// restarts the service so the new list takes effect. The restart is
/// skipped when the config push already failed.
pub async fn sync_users(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<SyncUsersRequest>,
) -> Result<Json<SyncUsersResponse>, AppError> {
    session.require_server_scope(&req.server_id)?;

    let servers = state.store.load_servers().await?;
    let server = servers
        .iter()
        .find(|s| s.id == req.server_id)
        .ok_or_else(|| AppError::NotFound(format!("Server {} not found", req.server_id)))?;

    let ssh_config = req.ssh_config.unwrap_or_else(|| ssh_config_for(server));

    let usernames: Vec<String> = state
        .store
        .load_vpn_users()
        .await?
        .into_iter()
        .filter(|u| u.server_id == req.server_id)
        .map(|u| u.username)
        .collect();

    let update = state
        .remote
        .run(OrchestratorRequest {
            action: SshAction::UpdateVpnConfig,
            ssh_config: ssh_config.clone(),
            payload: Some(ActionPayload { usernames }),
        })
        .await;

    if !update.success {
        return Ok(Json(SyncUsersResponse {
            success: false,
            update,
            restart: None,
        }));
    }

    let restart = state
        .remote
        .run(OrchestratorRequest {
            action: SshAction::RestartService,
            ssh_config,
            payload: None,
        })
        .await;

    Ok(Json(SyncUsersResponse {
        success: restart.success,
        update,
        restart: Some(restart),
    }))
}

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    session::{self, AuthSession, SessionClaims},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: SessionClaims,
}

/// POST /auth/login
///
/// The owner is checked against the configured credentials, managers
/// against the credential store.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let claims = authenticate(&state, &req).await?;
    let jar = jar.add(session::session_cookie(&claims)?);

    tracing::info!("User {} logged in as {:?}", claims.username, claims.role);
    Ok((jar, Json(SessionResponse { user: claims })))
}

async fn authenticate(state: &AppState, req: &LoginRequest) -> Result<SessionClaims, AppError> {
    let owner = &state.config.owner;
    if req.username == owner.username && req.password == owner.password {
        return Ok(SessionClaims::owner(&owner.username));
    }

    let managers = state.store.load_managers().await?;
    let manager = managers
        .iter()
        .find(|m| m.username == req.username)
        .ok_or_else(|| AppError::Auth("Invalid username or password".to_string()))?;

    if !verify_password(&req.password, &manager.password_hash) {
        return Err(AppError::Auth("Invalid username or password".to_string()));
    }
    if manager.is_expired(Utc::now()) {
        return Err(AppError::Auth("This account has expired".to_string()));
    }

    Ok(SessionClaims::manager(manager))
}

/// POST /auth/logout
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(session::removal_cookie());
    (jar, Json(serde_json::json!({ "success": true })))
}

/// GET /auth/me
pub async fn me(session: AuthSession) -> Json<SessionResponse> {
    Json(SessionResponse { user: session.0 })
}

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {e}")))
}

pub(crate) fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

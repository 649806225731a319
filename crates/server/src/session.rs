//! Cookie-based sessions. The cookie value is the base64url-encoded JSON
//! claims; it is deliberately unsigned and expires client-side after 30
//! days.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use shared::{Credential, Role};

use crate::error::AppError;

pub const SESSION_COOKIE: &str = "vpnpanel_session";

const SESSION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub username: String,
    pub role: Role,
    pub assigned_server_id: Option<String>,
}

impl SessionClaims {
    pub fn owner(username: &str) -> Self {
        Self {
            username: username.to_string(),
            role: Role::Owner,
            assigned_server_id: None,
        }
    }

    pub fn manager(credential: &Credential) -> Self {
        Self {
            username: credential.username.clone(),
            role: Role::Manager,
            assigned_server_id: credential.assigned_server_id.clone(),
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

pub fn encode_claims(claims: &SessionClaims) -> Result<String, AppError> {
    let json = serde_json::to_vec(claims).map_err(anyhow::Error::from)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub fn decode_claims(value: &str) -> Option<SessionClaims> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn session_cookie(claims: &SessionClaims) -> Result<Cookie<'static>, AppError> {
    let value = encode_claims(claims)?;
    Ok(Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_DAYS))
        .build())
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Extractor: the authenticated session, rejecting with 401 when the cookie
/// is missing or unreadable.
pub struct AuthSession(pub SessionClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar
            .get(SESSION_COOKIE)
            .ok_or_else(|| AppError::Auth("Not logged in".to_string()))?;
        let claims = decode_claims(cookie.value())
            .ok_or_else(|| AppError::Auth("Invalid session".to_string()))?;
        Ok(Self(claims))
    }
}

impl AuthSession {
    pub fn require_owner(&self) -> Result<(), AppError> {
        if self.0.is_owner() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "This action requires the owner account".to_string(),
            ))
        }
    }

    /// Owners reach every server; a manager only their assigned one.
    pub fn require_server_scope(&self, server_id: &str) -> Result<(), AppError> {
        if self.0.is_owner() {
            return Ok(());
        }
        match self.0.assigned_server_id.as_deref() {
            Some(assigned) if assigned == server_id => Ok(()),
            _ => Err(AppError::Forbidden(
                "You can only manage your assigned server".to_string(),
            )),
        }
    }
}

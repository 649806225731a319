use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every endpoint fault funnels through here; nothing crosses the request
/// boundary unhandled.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("duplicate usernames: {0:?}")]
    DuplicateUsers(Vec<String>),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::Auth(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Self::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            Self::DuplicateUsers(names) => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Some usernames already exist on this server",
                    "code": "DUPLICATE_USERS",
                    "duplicates": names,
                }),
            ),
            Self::Internal(err) => {
                tracing::error!("Internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": err.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn duplicate_users_maps_to_conflict_with_code_and_names() {
        let response =
            AppError::DuplicateUsers(vec!["alice".to_string(), "bob".to_string()]).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["code"], "DUPLICATE_USERS");
        assert_eq!(body["duplicates"], json!(["alice", "bob"]));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn bad_request_maps_to_400_with_the_message() {
        let response = AppError::BadRequest("expiryDays must be positive".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "expiryDays must be positive");
    }
}

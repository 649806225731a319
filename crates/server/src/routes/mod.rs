use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

mod auth;
mod backup;
mod health;
mod managers;
mod remote;
mod servers;
mod vpn_users;

/// Upper bound for expiryDays/renewDays. Values past a century are typos,
/// and adding them to `Utc::now()` would overflow chrono's date range.
pub(crate) const MAX_DAY_COUNT: i64 = 36_500;

pub(crate) fn check_day_count(field: &str, days: i64) -> Result<(), AppError> {
    if days <= 0 {
        return Err(AppError::BadRequest(format!("{field} must be positive")));
    }
    if days > MAX_DAY_COUNT {
        return Err(AppError::BadRequest(format!(
            "{field} must be {MAX_DAY_COUNT} days or fewer"
        )));
    }
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Manager accounts (owner only)
        .route("/managers", get(managers::list).post(managers::create))
        .route("/managers/:id", put(managers::update).delete(managers::remove))
        // Managed servers
        .route("/servers", get(servers::list).post(servers::create))
        .route(
            "/servers/:id",
            get(servers::get_one).put(servers::update).delete(servers::remove),
        )
        // VPN users
        .route("/vpn-users", get(vpn_users::list).post(vpn_users::create_batch))
        .route(
            "/vpn-users/:id",
            put(vpn_users::update).delete(vpn_users::remove),
        )
        // Remote orchestration
        .route("/ssh", post(remote::ssh_action))
        .route("/sync-users", post(remote::sync_users))
        // Backups
        .route("/backup", get(backup::current).post(backup::restore))
        .route("/backup/create", post(backup::create))
        .route("/backup/files", get(backup::list_files))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::Mutex;

    use shared::{OrchestratorRequest, OrchestratorResponse};

    use crate::config::Config;
    use crate::remote::RemoteHost;
    use crate::state::AppState;

    /// In-memory stand-in for the orchestrator child process: records every
    /// request and replays canned responses.
    pub struct FakeRemote {
        pub requests: Mutex<Vec<OrchestratorRequest>>,
        pub responses: Mutex<Vec<OrchestratorResponse>>,
    }

    impl FakeRemote {
        pub fn always_ok() -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(Vec::new()),
            })
        }

        pub fn with_responses(responses: Vec<OrchestratorResponse>) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            })
        }
    }

    #[axum::async_trait]
    impl RemoteHost for FakeRemote {
        async fn run(&self, request: OrchestratorRequest) -> OrchestratorResponse {
            self.requests.lock().unwrap().push(request);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                OrchestratorResponse::ok("ok")
            } else {
                responses.remove(0)
            }
        }
    }

    pub fn test_state(data_dir: &std::path::Path, remote: Arc<FakeRemote>) -> AppState {
        let mut config = Config::default();
        config.storage.data_dir = data_dir.to_string_lossy().into_owned();
        config.owner.username = "admin".into();
        config.owner.password = "hunter2".into();
        AppState::new(config, remote)
    }
}

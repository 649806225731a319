//! The four remote actions. Each one opens a fresh connection, does its
//! single job and tears the session down before returning; a failure is
//! terminal for the invocation (the operator retries by hand).

use serde_json::json;
use shared::{
    ActionPayload, LogEntry, OrchestratorRequest, OrchestratorResponse, SshAction, SshConfig,
    DEFAULT_RESTART_COMMAND, PROVISION_COMMAND, REMOTE_CONFIG_PATH,
};
use ssh2::Session;

use crate::ssh::{self, SshError};

pub fn execute(request: &OrchestratorRequest) -> OrchestratorResponse {
    match request.action {
        SshAction::TestConnection => test_connection(&request.ssh_config),
        SshAction::UpdateVpnConfig => {
            update_vpn_config(&request.ssh_config, request.payload.clone().unwrap_or_default())
        }
        SshAction::RestartService => restart_service(&request.ssh_config),
        SshAction::ResetConfig => reset_config(&request.ssh_config),
    }
}

fn disconnect(session: &Session) {
    // The session drops the socket either way; the explicit disconnect just
    // sends the protocol goodbye when the action succeeded.
    let _ = session.disconnect(None, "done", None);
}

/// Open a session and report what happened, step by step. Never mutates
/// remote state.
fn test_connection(config: &SshConfig) -> OrchestratorResponse {
    let mut log = vec![LogEntry::info(format!(
        "Connecting to {}:{} as {}",
        config.host, config.port, config.username
    ))];

    match ssh::connect(config, SshAction::TestConnection.timeout()) {
        Ok(session) => {
            log.push(LogEntry::success("SSH handshake and authentication succeeded"));
            disconnect(&session);
            OrchestratorResponse::ok(format!("Connected to {}", config.host)).with_log(log)
        }
        Err(e) => {
            let message = e.to_string();
            log.push(LogEntry::error(message.clone()));
            OrchestratorResponse::failure(message).with_log(log)
        }
    }
}

/// Hard-coded configuration skeleton used when the remote file is absent or
/// unparsable.
pub fn default_remote_config() -> serde_json::Value {
    json!({
        "listen": ":36712",
        "cert": "/etc/hysteria/hysteria.server.crt",
        "key": "/etc/hysteria/hysteria.server.key",
        "obfs": "hysteria",
        "auth": {
            "mode": "passwords",
            "config": []
        }
    })
}

/// Overwrite `auth.config` with the given usernames, password equal to the
/// username by design. Full-field replace, not a merge.
pub fn apply_usernames(config: &mut serde_json::Value, usernames: &[String]) {
    let entries: Vec<serde_json::Value> = usernames
        .iter()
        .map(|u| json!({ "user": u, "pass": u }))
        .collect();

    if !config.is_object() {
        *config = default_remote_config();
    }
    let obj = config.as_object_mut().unwrap();
    let auth = obj
        .entry("auth")
        .or_insert_with(|| json!({ "mode": "passwords" }));
    if !auth.is_object() {
        *auth = json!({ "mode": "passwords" });
    }
    auth.as_object_mut().unwrap().insert("config".into(), json!(entries));
}

fn update_vpn_config(config: &SshConfig, payload: ActionPayload) -> OrchestratorResponse {
    let timeout = SshAction::UpdateVpnConfig.timeout();
    let session = match ssh::connect(config, timeout) {
        Ok(s) => s,
        Err(e) => return OrchestratorResponse::failure(e.to_string()),
    };

    let result = (|| -> Result<OrchestratorResponse, SshError> {
        let mut remote = match ssh::read_remote_file(&session, REMOTE_CONFIG_PATH)? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).unwrap_or_else(|_| default_remote_config())
            }
            None => default_remote_config(),
        };

        apply_usernames(&mut remote, &payload.usernames);

        let pretty = serde_json::to_vec_pretty(&remote)
            .map_err(|e| SshError::Other(e.to_string()))?;
        ssh::write_remote_file(&session, REMOTE_CONFIG_PATH, &pretty)?;

        Ok(OrchestratorResponse::ok(format!(
            "Wrote {} with {} users",
            REMOTE_CONFIG_PATH,
            payload.usernames.len()
        )))
    })();

    disconnect(&session);
    result.unwrap_or_else(|e| OrchestratorResponse::failure(e.to_string()))
}

fn restart_service(config: &SshConfig) -> OrchestratorResponse {
    let command = config
        .service_restart_command
        .clone()
        .unwrap_or_else(|| DEFAULT_RESTART_COMMAND.to_string());
    run_remote_command(config, &command, SshAction::RestartService)
}

fn reset_config(config: &SshConfig) -> OrchestratorResponse {
    run_remote_command(config, PROVISION_COMMAND, SshAction::ResetConfig)
}

/// Execute one shell command; failure is decided by the filtered stderr,
/// not the exit status, because many legitimate remote commands exit
/// cleanly while emitting benign TTY warnings (and vice versa).
fn run_remote_command(config: &SshConfig, command: &str, action: SshAction) -> OrchestratorResponse {
    let timeout = action.timeout();
    let session = match ssh::connect(config, timeout) {
        Ok(s) => s,
        Err(e) => return OrchestratorResponse::failure(e.to_string()),
    };

    let result = ssh::exec(&session, command, timeout);
    disconnect(&session);

    match result {
        Ok(output) => {
            if let Some(stderr) = output.meaningful_stderr() {
                tracing::warn!(
                    "Remote command failed (exit {}): {}",
                    output.exit_status,
                    stderr
                );
                OrchestratorResponse::failure(stderr)
            } else {
                let stdout = output.stdout.trim();
                let message = if stdout.is_empty() {
                    "Command completed".to_string()
                } else {
                    stdout.to_string()
                };
                OrchestratorResponse::ok(message)
            }
        }
        Err(e) => OrchestratorResponse::failure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_replace_auth_config_on_the_default_skeleton() {
        let mut config = default_remote_config();
        apply_usernames(&mut config, &["alice".to_string(), "bob".to_string()]);

        assert_eq!(
            config["auth"]["config"],
            json!([
                { "user": "alice", "pass": "alice" },
                { "user": "bob", "pass": "bob" }
            ])
        );
        // The rest of the skeleton is untouched.
        assert_eq!(config["listen"], json!(":36712"));
        assert_eq!(config["obfs"], json!("hysteria"));
        assert_eq!(config["auth"]["mode"], json!("passwords"));
    }

    #[test]
    fn existing_user_list_is_clobbered_not_merged() {
        let mut config = json!({
            "listen": ":443",
            "auth": { "mode": "passwords", "config": [{ "user": "old", "pass": "old" }] }
        });
        apply_usernames(&mut config, &["new".to_string()]);

        assert_eq!(config["auth"]["config"], json!([{ "user": "new", "pass": "new" }]));
        assert_eq!(config["listen"], json!(":443"));
    }

    #[test]
    fn garbage_document_is_replaced_by_the_skeleton() {
        let mut config = json!("not an object");
        apply_usernames(&mut config, &["alice".to_string()]);
        assert_eq!(config["auth"]["config"], json!([{ "user": "alice", "pass": "alice" }]));
        assert_eq!(config["listen"], json!(":36712"));
    }

    #[test]
    fn empty_username_list_empties_the_remote_user_list() {
        let mut config = default_remote_config();
        apply_usernames(&mut config, &[]);
        assert_eq!(config["auth"]["config"], json!([]));
    }
}

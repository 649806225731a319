use std::io::{Read, Write};

use anyhow::Result;
use shared::{OrchestratorRequest, OrchestratorResponse};

mod actions;
mod ssh;

fn main() -> Result<()> {
    // stdout carries the protocol response, so all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vpnpanel_orchestrator=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let response = match serde_json::from_str::<OrchestratorRequest>(&input) {
        Ok(request) => {
            tracing::info!(
                "Executing {:?} against {}:{}",
                request.action,
                request.ssh_config.host,
                request.ssh_config.port
            );
            actions::execute(&request)
        }
        Err(e) => OrchestratorResponse::failure(format!("Invalid orchestrator request: {e}")),
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;

    Ok(())
}

use std::sync::Arc;

use clap::Parser;

use bc_domain::config::{Config, ConfigSeverity, StatePaths};
use bc_gateway::cli::client::DaemonClient;
use bc_gateway::cli::{Cli, Command};
use bc_gateway::{bootstrap, logs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("cannot resolve home directory"))?;
    let paths = StatePaths::new(&home);
    let (config, config_path) = Config::discover(&cwd, &home)?;

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            logs::init_tracing(&config.logging, &paths)?;
            if let Some(path) = &config_path {
                tracing::info!(path = %path.display(), "config loaded");
            }

            let issues = config.validate();
            for issue in &issues {
                match issue.severity {
                    ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
                    ConfigSeverity::Error => tracing::error!("config: {issue}"),
                }
            }
            if issues
                .iter()
                .any(|i| i.severity == ConfigSeverity::Error)
            {
                anyhow::bail!(
                    "config validation failed with {} error(s)",
                    issues
                        .iter()
                        .filter(|i| i.severity == ConfigSeverity::Error)
                        .count()
                );
            }

            bootstrap::run_server(Arc::new(config), paths).await
        }
        Some(Command::Run {
            prompt,
            session,
            model,
        }) => {
            DaemonClient::from_config(&config)
                .run(&prompt, session, model)
                .await
        }
        Some(Command::Events { session_id }) => {
            DaemonClient::from_config(&config).events(&session_id).await
        }
        Some(Command::Status) => DaemonClient::from_config(&config).status().await,
        Some(Command::Logs { lines }) => DaemonClient::from_config(&config).logs(lines).await,
        Some(Command::Sessions) => DaemonClient::from_config(&config).sessions().await,
        Some(Command::Login) => bc_gateway::cli::login::login(&paths),
    }
}

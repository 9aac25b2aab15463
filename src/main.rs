use anyhow::Result;
use clap::Parser;
use secure_user_api::auth::CredentialParams;
use secure_user_api::cli::{self, Cli, Commands, CredentialCommands};
use secure_user_api::config::Config;
use secure_user_api::gateway;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.logging.level);
    match Config::locate(cli.config.as_deref()) {
        Some(path) => tracing::debug!("Config loaded from {}", path.display()),
        None => tracing::debug!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            config.validate()?;
            gateway::run_gateway(&config).await
        }
        Commands::Credential { cmd } => {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout().lock();
            match cmd {
                CredentialCommands::Hash { iterations } => {
                    let cost = iterations
                        .map(CredentialParams::with_iterations)
                        .unwrap_or(config.credentials);
                    cli::run_hash(&mut input, &mut output, &cost)
                }
                CredentialCommands::Verify { stored } => {
                    let valid =
                        cli::run_verify(&mut input, &mut output, &stored, &config.credentials)?;
                    if !valid {
                        output.flush()?;
                        std::process::exit(1);
                    }
                    Ok(())
                }
            }
        }
    }
}

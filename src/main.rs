//! sqldock - Main entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sqldock::cli::{
    Cli, Command, run_check_command, run_create_command, run_delete_command,
    run_start_command, run_stop_command,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A local .env never overrides variables already set in the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Create {
            source,
            mechanism,
            name,
            port,
            accept_eula,
        } => run_create_command(source, mechanism, name, port, accept_eula).await,
        Command::Start { name } => run_start_command(name).await,
        Command::Stop { name } => run_stop_command(name).await,
        Command::Delete { name } => run_delete_command(name).await,
        Command::Check => run_check_command().await,
    }
}

//! CLI command handling.
//!
//! Provides subcommands for:
//! - Provisioning an engine container and ingesting a source (`create`)
//! - Container lifecycle (`start`, `stop`, `delete`)
//! - Checking the container runtime (`check`)

use anyhow::{Context, bail};
use clap::{ColorChoice, Parser, Subcommand};
use tracing::info;

use crate::config::{EngineConfig, READY_LOG_PATTERN};
use crate::container::{ContainerController, ContainerHandle, DockerStatus, check_docker};
use crate::ingest::{IngestSettings, Ingestor, SqlcmdQueryRunner};

#[derive(Parser, Debug)]
#[command(name = "sqldock")]
#[command(about = "Provision a SQL Server container and ingest a database into it")]
#[command(
    long_about = "sqldock runs the database engine in a container and brings a database \
                  source online inside it.\nExamples:\n  \
                  sqldock create --accept-eula --use https://example.com/AdventureWorks.bak\n  \
                  sqldock create --accept-eula --use ./data.mdf,MyDb --mechanism attach"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an engine container, optionally ingesting a database source
    #[command(
        about = "Create an engine container and ingest a source",
        long_about = "Pulls the engine image, starts a container, waits for the engine to \
                      come up, then ingests the given source.\nExample: sqldock create \
                      --accept-eula --use https://example.com/sample.bak"
    )]
    Create {
        /// Database source: local path or http(s) URL, with an optional
        /// `,name` suffix overriding the database name
        #[arg(long = "use", value_name = "SOURCE")]
        source: Option<String>,

        /// Online mechanism to use, overriding file-extension matching
        #[arg(long, value_name = "NAME")]
        mechanism: Option<String>,

        /// Container name
        #[arg(long)]
        name: Option<String>,

        /// Host port to bind the engine's listener to
        #[arg(long)]
        port: Option<u16>,

        /// Accept the database engine's license terms
        #[arg(long)]
        accept_eula: bool,
    },

    /// Start a stopped engine container
    Start {
        /// Container name
        #[arg(long)]
        name: Option<String>,
    },

    /// Stop a running engine container
    Stop {
        /// Container name
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove an engine container
    Delete {
        /// Container name
        #[arg(long)]
        name: Option<String>,
    },

    /// Check whether the container runtime is installed and running
    Check,
}

/// Default container name when neither flag nor environment names one.
const DEFAULT_CONTAINER_NAME: &str = "sqldock";

pub async fn run_create_command(
    source: Option<String>,
    mechanism: Option<String>,
    name: Option<String>,
    port: Option<u16>,
    accept_eula: bool,
) -> anyhow::Result<()> {
    let mut config = EngineConfig::resolve().context("resolving engine configuration")?;
    if let Some(name) = name {
        config.container_name = name;
    }
    if config.container_name.is_empty() {
        config.container_name = DEFAULT_CONTAINER_NAME.to_string();
    }
    if let Some(port) = port {
        config.port = port;
    }
    if accept_eula {
        config.accept_eula = true;
    }

    if !config.accept_eula {
        bail!(
            "the engine's license terms must be accepted; pass --accept-eula \
             or set SQLDOCK_ACCEPT_EULA=yes"
        );
    }

    let controller = ContainerController::connect().await?;

    // Configuration errors surface before the image is pulled or any file
    // moves.
    let mut ingestor = match &source {
        Some(source) => {
            let mut ingestor = Ingestor::new(
                source,
                &controller,
                IngestSettings {
                    mechanism,
                    ..IngestSettings::default()
                },
            )?;
            ingestor.validate()?;
            Some(ingestor)
        }
        None => None,
    };

    controller.ensure_image(&config.image).await?;

    let spec = config.to_run_spec();
    let handle = controller.create_and_start(&spec).await?;
    info!(container = %handle, name = %config.container_name, "container started");

    println!("Waiting for the engine to come up...");
    controller.wait_for_log_entry(&handle, READY_LOG_PATTERN).await?;

    if let Some(ingestor) = &mut ingestor {
        let query = SqlcmdQueryRunner::new(
            controller.clone(),
            handle.clone(),
            &config.username,
            &config.password,
        );
        ingestor
            .run(&handle, &query, &config.username, &config.password)
            .await?;
        println!("Database {} is online.", ingestor.database_name());
    }

    println!(
        "Now ready to connect: sqlcmd -S localhost,{} -U {} -C",
        config.port, config.username
    );
    Ok(())
}

pub async fn run_start_command(name: Option<String>) -> anyhow::Result<()> {
    let controller = ContainerController::connect().await?;
    let handle = resolve_container(&controller, name).await?;
    controller.start(&handle).await?;
    println!("Container {handle} started.");
    Ok(())
}

pub async fn run_stop_command(name: Option<String>) -> anyhow::Result<()> {
    let controller = ContainerController::connect().await?;
    let handle = resolve_container(&controller, name).await?;
    controller.stop(&handle).await?;
    println!("Container {handle} stopped.");
    Ok(())
}

pub async fn run_delete_command(name: Option<String>) -> anyhow::Result<()> {
    let controller = ContainerController::connect().await?;
    let handle = resolve_container(&controller, name).await?;
    if controller.running(&handle).await? {
        controller.stop(&handle).await?;
    }
    controller.remove(&handle).await?;
    println!("Container {handle} removed.");
    Ok(())
}

pub async fn run_check_command() -> anyhow::Result<()> {
    let detection = check_docker().await;
    println!("Container runtime: {}", detection.status.as_str());
    match detection.status {
        DockerStatus::Available => Ok(()),
        DockerStatus::NotInstalled => {
            println!("  hint: {}", detection.platform.install_hint());
            bail!("container runtime is not installed");
        }
        DockerStatus::NotRunning => {
            println!("  hint: {}", detection.platform.start_hint());
            bail!("container runtime is not running");
        }
    }
}

/// Map a `--name` flag (or the configured/default name) to a live handle.
async fn resolve_container(
    controller: &ContainerController,
    name: Option<String>,
) -> anyhow::Result<ContainerHandle> {
    let name = match name {
        Some(name) => name,
        None => std::env::var("SQLDOCK_CONTAINER_NAME")
            .unwrap_or_else(|_| DEFAULT_CONTAINER_NAME.to_string()),
    };

    controller
        .find_by_name(&name)
        .await?
        .with_context(|| format!("no container named {name:?} found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_parses_source_and_mechanism() {
        let cli = Cli::parse_from([
            "sqldock",
            "create",
            "--accept-eula",
            "--use",
            "https://example.com/sample.bak",
            "--mechanism",
            "restore",
            "--port",
            "14330",
        ]);
        match cli.command {
            Command::Create {
                source,
                mechanism,
                port,
                accept_eula,
                ..
            } => {
                assert_eq!(source.as_deref(), Some("https://example.com/sample.bak"));
                assert_eq!(mechanism.as_deref(), Some("restore"));
                assert_eq!(port, Some(14330));
                assert!(accept_eula);
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn test_lifecycle_commands_take_optional_name() {
        let cli = Cli::parse_from(["sqldock", "stop", "--name", "mydb"]);
        match cli.command {
            Command::Stop { name } => assert_eq!(name.as_deref(), Some("mydb")),
            other => panic!("expected stop, got {other:?}"),
        }

        let cli = Cli::parse_from(["sqldock", "delete"]);
        assert!(matches!(cli.command, Command::Delete { name: None }));
    }
}

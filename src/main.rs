use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use vpsman::docker::{ContainerRuntime, DockerClient};
use vpsman::operator::{probe, InstanceManager, RawEditInput, RawInstanceInput, VpsError};
use vpsman::server::rest::run_rest_server;
use vpsman::shared::logging::init_logging;
use vpsman::shared::VpsConfig;

#[derive(Parser)]
#[command(name = "vpsman")]
#[command(about = "vpsman - Container-backed VPS instances on a single host", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ~/.vpsman/config.yaml when present)
    #[arg(short, long, global = true, env = "VPS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server
    Serve {
        /// Host for API server
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port for API server
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List managed instances
    List,

    /// Show live usage of running managed instances
    Monitor,

    /// Create a new instance
    Create {
        name: String,

        #[arg(long)]
        hostname: Option<String>,

        #[arg(long)]
        image: Option<String>,

        /// Memory limit, e.g. 512m or 1G
        #[arg(long)]
        ram: Option<String>,

        /// CPU limit in cores, e.g. 0.5
        #[arg(long)]
        cpu: Option<String>,

        /// Disk size, applied only when the storage driver supports quotas
        #[arg(long)]
        storage: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Start a stopped instance or stop a running one
    Toggle { name: String },

    /// Remove an instance
    Delete { name: String },

    /// Recreate an instance with new settings
    Edit {
        name: String,

        #[arg(long)]
        hostname: Option<String>,

        #[arg(long)]
        ram: Option<String>,

        #[arg(long)]
        cpu: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Report whether disk quotas can be enforced on this host
    Probe,
}

#[derive(Serialize)]
struct ProbeReport {
    driver: String,
    quota_supported: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = VpsConfig::load(cli.config.as_deref())?;

    if let Commands::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.host = host.clone();
        }
        if let Some(port) = port {
            config.port = *port;
        }
    }

    let _log_guard = init_logging(&config.log_dir, "vpsman")?;
    match VpsConfig::source_file(cli.config.as_deref()) {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults and environment"),
    }

    let config = Arc::new(config);
    let runtime: Arc<dyn ContainerRuntime> =
        Arc::new(DockerClient::connect(config.docker_socket.as_deref()).await?);
    let manager = Arc::new(InstanceManager::new(runtime.clone(), config.clone()));

    match cli.command {
        Commands::Serve { .. } => run_rest_server(manager, &config).await?,
        Commands::List => print_json(&report(manager.inventory().list().await)?)?,
        Commands::Monitor => print_json(&report(manager.inventory().monitor().await)?)?,
        Commands::Create {
            name,
            hostname,
            image,
            ram,
            cpu,
            storage,
            description,
        } => {
            let raw = RawInstanceInput {
                name: Some(name),
                hostname,
                image,
                ram,
                cpu,
                storage,
                description,
            };
            print_json(&report(manager.provision(raw).await)?)?
        }
        Commands::Toggle { name } => {
            let state = report(manager.toggle(&name).await)?;
            print_json(&serde_json::json!({ "name": name, "state": state }))?
        }
        Commands::Delete { name } => {
            report(manager.delete(&name).await)?;
            print_json(&serde_json::json!({ "name": name, "deleted": true }))?
        }
        Commands::Edit {
            name,
            hostname,
            ram,
            cpu,
            description,
        } => {
            let raw = RawEditInput {
                hostname,
                ram,
                cpu,
                description,
            };
            print_json(&report(manager.edit(&name, raw).await)?)?
        }
        Commands::Probe => {
            let driver = runtime.storage_driver().await?.driver;
            let quota_supported =
                probe::storage_quota_supported(runtime.as_ref(), config.storage_quota).await;
            print_json(&ProbeReport {
                driver,
                quota_supported,
            })?
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Logs operator failures before handing them to the caller, so the
/// structured fields (like the pre-image of a failed edit) reach the log file.
fn report<T>(result: Result<T, VpsError>) -> Result<T> {
    result.map_err(|e| {
        if e.is_retryable() {
            error!("{} (safe to retry)", e);
        } else {
            error!("{}", e);
        }
        anyhow::Error::new(e)
    })
}

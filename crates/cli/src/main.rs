//! Management gateway CLI
//!
//! A command-line client for the gateway HTTP API: containers, cluster
//! workloads, metrics and alerts.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cluster, containers, monitoring};

/// Container platform management gateway CLI
#[derive(Parser)]
#[command(name = "gwctl")]
#[command(author, version, about = "CLI for the container platform management gateway", long_about = None)]
pub struct Cli {
    /// Gateway URL (can also be set via GWCTL_GATEWAY_URL env var)
    #[arg(long, env = "GWCTL_GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage containers on the gateway's runtime
    #[command(subcommand)]
    Containers(ContainerCommands),

    /// Manage cluster deployments
    #[command(subcommand)]
    Deployments(DeploymentCommands),

    /// Inspect cluster services
    #[command(subcommand)]
    Services(ServiceCommands),

    /// Query container and system metrics
    #[command(subcommand)]
    Metrics(MetricsCommands),

    /// List alerts from the metrics store
    Alerts,

    /// Show per-backend gateway health
    Health,
}

#[derive(Subcommand)]
pub enum ContainerCommands {
    /// List all containers
    List,

    /// Show one container
    Get {
        /// Container ID or name
        id: String,
    },

    /// Print container logs
    Logs {
        /// Container ID or name
        id: String,

        /// Number of lines from the end of the logs
        #[arg(long, default_value_t = 100)]
        tail: usize,
    },

    /// Show a resource usage snapshot
    Stats {
        /// Container ID or name
        id: String,
    },

    /// Start a container
    Start {
        /// Container ID or name
        id: String,
    },

    /// Stop a container
    Stop {
        /// Container ID or name
        id: String,
    },

    /// Remove a container
    Rm {
        /// Container ID or name
        id: String,

        /// Remove even if running
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum DeploymentCommands {
    /// List deployments
    List {
        /// Namespace (gateway default if not specified)
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Set the replica count of a deployment
    Scale {
        /// Deployment name
        name: String,

        /// Desired replica count
        #[arg(long)]
        replicas: i32,

        /// Namespace (gateway default if not specified)
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Delete a deployment
    Delete {
        /// Deployment name
        name: String,

        /// Namespace (gateway default if not specified)
        #[arg(long, short)]
        namespace: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ServiceCommands {
    /// List services
    List {
        /// Namespace (gateway default if not specified)
        #[arg(long, short)]
        namespace: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MetricsCommands {
    /// CPU, memory and network series of one container
    Container {
        /// Container ID
        id: String,

        /// Window to query (e.g., 30s, 5m, 1h, 7d)
        #[arg(long, default_value = "5m")]
        duration: String,
    },

    /// Host-wide CPU, memory, disk and network series
    System,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let format = config.format(cli.format)?;

    // Initialize client
    let client = client::ApiClient::new(&config.gateway_url(cli.gateway_url))?;

    // Execute command
    match cli.command {
        Commands::Containers(cmd) => match cmd {
            ContainerCommands::List => containers::list(&client, format).await?,
            ContainerCommands::Get { id } => containers::get(&client, &id, format).await?,
            ContainerCommands::Logs { id, tail } => {
                containers::logs(&client, &id, tail, format).await?
            }
            ContainerCommands::Stats { id } => containers::stats(&client, &id, format).await?,
            ContainerCommands::Start { id } => containers::start(&client, &id, format).await?,
            ContainerCommands::Stop { id } => containers::stop(&client, &id, format).await?,
            ContainerCommands::Rm { id, force } => {
                containers::remove(&client, &id, force, format).await?
            }
        },
        Commands::Deployments(cmd) => match cmd {
            DeploymentCommands::List { namespace } => {
                cluster::list_deployments(&client, config.namespace(namespace), format).await?
            }
            DeploymentCommands::Scale {
                name,
                replicas,
                namespace,
            } => {
                cluster::scale_deployment(
                    &client,
                    &name,
                    replicas,
                    config.namespace(namespace),
                    format,
                )
                .await?
            }
            DeploymentCommands::Delete { name, namespace } => {
                cluster::delete_deployment(&client, &name, config.namespace(namespace), format)
                    .await?
            }
        },
        Commands::Services(ServiceCommands::List { namespace }) => {
            cluster::list_services(&client, config.namespace(namespace), format).await?
        }
        Commands::Metrics(cmd) => match cmd {
            MetricsCommands::Container { id, duration } => {
                monitoring::container_metrics(&client, &id, &duration, format).await?
            }
            MetricsCommands::System => monitoring::system_metrics(&client, format).await?,
        },
        Commands::Alerts => monitoring::alerts(&client, format).await?,
        Commands::Health => monitoring::health(&client, format).await?,
    }

    Ok(())
}

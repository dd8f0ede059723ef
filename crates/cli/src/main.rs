//! OPI desirer CLI
//!
//! Desires, updates, inspects and stops LRPs running as StatefulSets in a
//! Kubernetes namespace.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{instances, lrp};
use desirer_lib::LrpIdentifier;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// OPI desirer CLI
#[derive(Parser)]
#[command(name = "opi")]
#[command(author, version, about = "Run platform LRPs as Kubernetes StatefulSets", long_about = None)]
pub struct Cli {
    /// Namespace holding the StatefulSets (can also be set via OPI_NAMESPACE)
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Root filesystem version stamped onto new StatefulSets (can also be set via OPI_ROOTFS_VERSION)
    #[arg(long)]
    pub rootfs_version: Option<String>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the StatefulSet for a new LRP
    Desire {
        /// LRP definition in JSON
        file: PathBuf,
    },

    /// Scale an LRP and refresh its routes
    Update {
        /// LRP definition in JSON
        file: PathBuf,
    },

    /// List all LRPs in the namespace
    List,

    /// Show a single LRP
    Get {
        guid: String,
        version: String,
    },

    /// Delete an LRP and all its instances
    Stop {
        guid: String,
        version: String,
    },

    /// Restart a single instance of an LRP
    StopInstance {
        guid: String,
        version: String,
        /// Zero-based instance index
        index: u32,
    },

    /// Show the observed state of every instance of an LRP
    Instances {
        guid: String,
        version: String,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = config::CliConfig::load()?.with_overrides(
        cli.namespace.clone(),
        cli.rootfs_version.clone(),
        cli.kubeconfig.clone(),
    );
    debug!(namespace = %settings.namespace, rootfs_version = %settings.rootfs_version, "CLI configured");

    match cli.command {
        Commands::Desire { file } => {
            let lrp = lrp::read_lrp(&file)?;
            let desirer = settings.desirer().await?;
            lrp::desire(&desirer, &lrp, cli.format).await?;
        }
        Commands::Update { file } => {
            let lrp = lrp::read_lrp(&file)?;
            let desirer = settings.desirer().await?;
            lrp::update(&desirer, &lrp, cli.format).await?;
        }
        Commands::List => {
            let desirer = settings.desirer().await?;
            lrp::list(&desirer, cli.format).await?;
        }
        Commands::Get { guid, version } => {
            let desirer = settings.desirer().await?;
            lrp::get(&desirer, &LrpIdentifier::new(guid, version), cli.format).await?;
        }
        Commands::Stop { guid, version } => {
            let desirer = settings.desirer().await?;
            lrp::stop(&desirer, &LrpIdentifier::new(guid, version), cli.format).await?;
        }
        Commands::StopInstance {
            guid,
            version,
            index,
        } => {
            let desirer = settings.desirer().await?;
            instances::stop_instance(&desirer, &LrpIdentifier::new(guid, version), index, cli.format).await?;
        }
        Commands::Instances { guid, version } => {
            let desirer = settings.desirer().await?;
            instances::show_instances(&desirer, &LrpIdentifier::new(guid, version), cli.format).await?;
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use splitter_consul::{mesh_clients, ConsulConfig};
use splitter_core::{ConnectRouter, Router, RouterConfig, RouterMetrics, Routes};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod target;

use target::TargetArgs;

/// Drive Consul Connect traffic splitting for a canary by hand
#[derive(Parser, Debug)]
#[command(name = "splitter-ctl", version, about)]
struct Cli {
    /// Router configuration (YAML)
    #[arg(long, env = "SPLITTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    target: TargetArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update the resolver and splitter of the target
    Reconcile,
    /// Print the current primary and canary weights
    GetRoutes,
    /// Set the primary and canary weights
    SetRoutes {
        #[arg(long = "primary-weight")]
        primary: u32,
        #[arg(long = "canary-weight")]
        canary: u32,
        /// Accepted for interface parity; Consul Connect does not mirror
        #[arg(long)]
        mirrored: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RouterConfig::load(path)
            .with_context(|| format!("loading router config {}", path.display()))?,
        None => RouterConfig::default(),
    };

    let consul = ConsulConfig::from_env();
    info!("Using Consul at {}", consul.base_url());
    let mesh = mesh_clients(&consul).context("building Consul clients")?;

    let metrics = RouterMetrics::new()?;
    let router = ConnectRouter::new(config).with_metrics(metrics.clone());
    let target = cli.target.resolve().await?;

    match cli.command {
        Command::Reconcile => {
            router
                .reconcile(&mesh, &target)
                .await
                .with_context(|| format!("reconciling {}", target))?;
            info!("Reconciled {}", target);
        }
        Command::GetRoutes => {
            let routes = router
                .get_routes(&mesh, &target)
                .await
                .with_context(|| format!("reading routes of {}", target))?;
            println!(
                "primary={} canary={} mirrored={}",
                routes.primary_weight, routes.canary_weight, routes.mirrored
            );
        }
        Command::SetRoutes { primary, canary, mirrored } => {
            let routes = Routes {
                primary_weight: primary,
                canary_weight: canary,
                mirrored,
            };
            router
                .set_routes(&mesh, &target, routes)
                .await
                .with_context(|| format!("setting routes of {}", target))?;
            info!("Routes of {} set to primary={} canary={}", target, primary, canary);
        }
    }

    debug!("Metrics:\n{}", metrics.gather()?);
    Ok(())
}

//! rootmesh node
//!
//! `run` joins a mesh over the UDP radio emulation, `simulate` runs a whole
//! mesh in-process and prints where it settled.

mod config;
mod simulate;
mod udp;

use clap::{Parser, Subcommand};
use rootmesh_core::{FixedQuality, MacAddress, Node, NO_SIGNAL};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use udp::{UdpRadio, DEFAULT_PORT};

/// Self-organizing root selection over a datagram radio
#[derive(Parser)]
#[command(name = "rootmesh-node")]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a mesh over UDP
    Run {
        /// Hardware address of this node, e.g. 24:0a:c4:00:00:01
        #[arg(short, long)]
        address: MacAddress,

        /// Local signal quality in dBm
        #[arg(short, long, allow_negative_numbers = true)]
        quality: Option<i8>,

        /// UDP port shared by every node
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Explicit datagram destinations instead of the broadcast address
        #[arg(long, value_delimiter = ',')]
        fanout: Vec<SocketAddr>,

        /// JSON file with protocol settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run a whole mesh in-process
    Simulate {
        /// Signal quality of each node, comma separated
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        qualities: Vec<i8>,

        /// Probability of losing each delivery
        #[arg(long, default_value_t = 0.0)]
        loss: f64,

        /// Protocol interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// JSON file with protocol settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Simulated meshes run compressed unless told otherwise
const SIM_INTERVAL_MS: u64 = 50;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Run {
            address,
            quality,
            port,
            fanout,
            config,
        } => {
            let config = config::load(config.as_deref())?;

            let quality = quality.unwrap_or_else(|| {
                warn!("No signal quality given, using {}", NO_SIGNAL);
                NO_SIGNAL
            });

            let radio = Arc::new(UdpRadio::bind(address, port, fanout).await?);
            info!("rootmesh node {} listening on {}", address, radio.local_addr()?);

            let status_period = config.interval;
            let node = Node::start(config, radio, &FixedQuality(quality))?;

            let mut ticker = interval(status_period);
            let mut last_root = None;
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let status = node.status();
                        if status.is_settled() && last_root != Some(status.root_node) {
                            info!("Root node: {}", status.root_node);
                            last_root = Some(status.root_node);
                        }
                    }
                }
            }

            println!("{}", serde_json::to_string_pretty(&node.status())?);
            node.stop();
        }

        Commands::Simulate {
            qualities,
            loss,
            interval_ms,
            config,
        } => {
            let mut mesh_config = config::load(config.as_deref())?;
            let interval_ms = match (interval_ms, config.is_some()) {
                (Some(ms), _) => Some(ms),
                (None, false) => Some(SIM_INTERVAL_MS),
                (None, true) => None,
            };
            if let Some(ms) = interval_ms {
                mesh_config = mesh_config.with_interval(Duration::from_millis(ms));
                mesh_config.validate()?;
            }

            let statuses = simulate::run(mesh_config, &qualities, loss).await?;
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
    }

    Ok(())
}

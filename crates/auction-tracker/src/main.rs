//! Entry point: parse CLI args, load configuration, run the supervisor.

use clap::Parser;
use tracing::{error, info};

/// Auction tracking core: transport, supervisor and bid engine wiring.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via AUCTION_TRACKER_CONFIG env var).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(e) = auction_telemetry::init_logging() {
        eprintln!("failed to initialize logging: {e}");
        return std::process::ExitCode::from(1);
    }

    let args = Args::parse();
    info!("starting auction-tracker v{}", env!("CARGO_PKG_VERSION"));

    let config = match auction_tracker::config::AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            return std::process::ExitCode::from(1);
        }
    };

    let supervisor = auction_tracker::supervisor::Supervisor::new(config);
    match supervisor.run().await {
        Ok(()) => std::process::ExitCode::from(0),
        Err(e) => {
            error!(error = %e, "irrecoverable runtime error");
            std::process::ExitCode::from(2)
        }
    }
}

//! Service gateway binary.
//!
//! ```text
//!     Client ──▶ /api/{service}/... ──▶ Forwarder ──▶ Backend instance
//!                                        │   ▲
//!                      CircuitBreaker ◀──┤   │ LoadBalancer (per-service pools)
//!                                        ▼   │
//!                                    ServiceRegistry ◀── HealthMonitor
//! ```

use std::path::PathBuf;
use clap::Parser;
use service_gateway::lifecycle::startup;
use service_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "service-gateway")]
#[command(about = "Resilient HTTP gateway for backend services", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = startup::resolve_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        "service-gateway starting"
    );

    startup::run(config).await?;
    Ok(())
}

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the service gateway admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate health across services
    Health,
    /// Effective gateway configuration
    Config,
    /// List services with their last health status
    Services,
    /// Show one service with breaker and instances
    Service { name: String },
    /// Probe one service now
    Check { name: String },
    /// List circuit breakers
    Breakers,
    /// Force a circuit breaker back to CLOSED
    ResetBreaker { name: String },
    /// Load balancer statistics and instances
    LoadBalancer,
    /// Add an instance to a service
    AddInstance {
        service: String,
        url: String,
        #[arg(short, long, default_value_t = 1)]
        weight: u32,
    },
    /// Remove an instance from a service
    RemoveInstance { service: String, url: String },
    /// GET every service's health path through the gateway
    Warmup,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{base}/admin/health")).send().await?,
        Commands::Config => client.get(format!("{base}/admin/config")).send().await?,
        Commands::Services => client.get(format!("{base}/admin/services")).send().await?,
        Commands::Service { name } => {
            client.get(format!("{base}/admin/services/{name}")).send().await?
        }
        Commands::Check { name } => {
            client
                .post(format!("{base}/admin/services/{name}/health-check"))
                .send()
                .await?
        }
        Commands::Breakers => client.get(format!("{base}/admin/circuit-breakers")).send().await?,
        Commands::ResetBreaker { name } => {
            client
                .post(format!("{base}/admin/circuit-breakers/{name}/reset"))
                .send()
                .await?
        }
        Commands::LoadBalancer => client.get(format!("{base}/admin/load-balancer")).send().await?,
        Commands::AddInstance { service, url, weight } => {
            client
                .post(format!("{base}/admin/load-balancer/{service}/instances"))
                .json(&json!({ "url": url, "weight": weight }))
                .send()
                .await?
        }
        Commands::RemoveInstance { service, url } => {
            client
                .delete(format!("{base}/admin/load-balancer/{service}/instances"))
                .query(&[("url", url)])
                .send()
                .await?
        }
        Commands::Warmup => client.post(format!("{base}/admin/warmup")).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use rec_core::config::load_config;
use rec_core::health::Prober;
use rec_core::observability::logging::init_logging;
use rec_core::{ClientBuilder, Options};

#[derive(Parser)]
#[command(name = "rec-cli")]
#[command(about = "Diagnostics CLI for the recommendation transport core", long_about = None)]
struct Cli {
    /// Client configuration file (TOML).
    #[arg(short, long, default_value = "config/client.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current host ranking for every path
    Hosts,
    /// Probe one host's ping endpoint
    Ping {
        host: String,
        #[arg(long, default_value_t = 300)]
        timeout_ms: u64,
    },
    /// Send a signed JSON call and print the response
    Call {
        path: String,
        /// Request body as JSON
        body: String,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Logging disabled: {}", e);
    }

    match cli.command {
        Commands::Ping { host, timeout_ms } => {
            let prober = Prober::new(
                reqwest::Client::new(),
                config.schema.clone(),
                config.availability.ping_path.clone(),
                Duration::from_millis(timeout_ms),
            )
            .with_host_header(config.host_header.clone())
            .with_project_id(config.project_id.clone().unwrap_or_default());
            let ok = prober.ping(&host).await;
            println!("{} {}", host, if ok { "healthy" } else { "unhealthy" });
        }
        Commands::Hosts => {
            let client = ClientBuilder::from_config(config).build().await?;
            let hosts = client.availability().host_config();
            for (path, ranked) in hosts.paths() {
                println!("{:<24} {}", path, ranked.join(", "));
            }
            client.shutdown_and_wait().await;
        }
        Commands::Call {
            path,
            body,
            timeout_ms,
        } => {
            let request: Value = serde_json::from_str(&body)?;
            let client = ClientBuilder::from_config(config).build().await?;
            let mut options = Options::new();
            if let Some(ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(ms));
            }
            let result = client.call_json::<Value, Value>(&path, &request, options).await;
            client.shutdown_and_wait().await;
            let response = result?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use api_gateway::config::load_config;
use api_gateway::http::RoutingState;
use api_gateway::routing::normalize;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the API gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and print the route table
    Check {
        #[arg(short, long, env = "GATEWAY_CONFIG")]
        config: PathBuf,
    },
    /// Show which backend a path would be forwarded to
    Resolve {
        #[arg(short, long, env = "GATEWAY_CONFIG")]
        config: PathBuf,
        /// Request path, e.g. /api/users/42
        path: String,
    },
    /// Probe a running gateway's health endpoint
    Health {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(&config)?;
            let state = RoutingState::from_config(&config)?;
            println!(
                "OK: {} route(s), {} auth strategy(ies)",
                state.table().len(),
                state.registry().len()
            );
            for route in state.table().routes() {
                println!(
                    "  {:<24} -> {:<40} auth={}",
                    route.prefix(),
                    route.target(),
                    route.auth_type().unwrap_or("none")
                );
            }
        }
        Commands::Resolve { config, path } => {
            let config = load_config(&config)?;
            let state = RoutingState::from_config(&config)?;
            match state.table().resolve(&path) {
                Some(resolution) => {
                    println!("path:   {}", normalize(&path));
                    println!("prefix: {}", resolution.prefix);
                    println!("target: {}", resolution.target);
                    println!("auth:   {}", resolution.auth_type.unwrap_or("none"));
                }
                None => {
                    eprintln!("No route matches {}", normalize(&path));
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Health { url } => {
            let res = reqwest::Client::new()
                .get(format!("{}/health", url.trim_end_matches('/')))
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
                return Ok(ExitCode::FAILURE);
            }
            println!("{} {}", status, body.trim());
        }
    }

    Ok(ExitCode::SUCCESS)
}

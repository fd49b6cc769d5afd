//! CPU temperature control tool
//!
//! CLI for querying the CPU temperature daemon over HTTP.

mod client;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client::TempClient;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Shortest accepted `--watch` interval in milliseconds.
const MIN_WATCH_MS: u64 = 1000;

#[derive(Parser)]
#[command(name = "cputempctl")]
#[command(about = "Query the CPU temperature daemon")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Base URL of the daemon
    #[arg(long, env = "CPUTEMP_URL", default_value = "http://localhost:64567/temp")]
    url: String,

    /// Repeat the command every N milliseconds (must exceed 1000)
    #[arg(long, value_name = "MS")]
    watch: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Print the current temperature
    Temp,
    /// Check that the daemon is up
    Ping,
    /// Print the Prometheus metrics
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = TempClient::new(&cli.url);

    let Some(watch) = cli.watch else {
        return run(cli.command, &client).await;
    };
    if watch <= MIN_WATCH_MS {
        bail!("Watch interval must be greater than {}ms", MIN_WATCH_MS);
    }

    let mut interval = tokio::time::interval(Duration::from_millis(watch));
    loop {
        interval.tick().await;
        if let Err(e) = run(cli.command, &client).await {
            eprintln!("Error: {:#}", e);
        }
    }
}

async fn run(command: Commands, client: &TempClient) -> Result<()> {
    match command {
        Commands::Temp => {
            let celsius = client.temperature().await?;
            println!("{}", celsius);
        }
        Commands::Ping => {
            let status = client.ping().await?;
            println!("Daemon status: {}", status);
        }
        Commands::Metrics => {
            let text = client.metrics().await?;
            print!("{}", text);
        }
    }

    Ok(())
}

//! Feedgate CLI
//!
//! Command-line entry points for the feed gateway.
//!
//! # Commands
//!
//! - `serve` - Run the gateway over HTTP
//! - `encode` - Print the proxy URL for a target URL
//! - `decode` - Reverse a proxy URL back to its target

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_BASE: &str = "http://127.0.0.1:8080/proxy/";

/// Modern feeds for legacy clients.
#[derive(Parser)]
#[command(name = "feedgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway over HTTP
    Serve {
        /// Address to bind instead of the configured one
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Store directory for persisted documents (in-memory when absent)
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Externally visible base URL for encoded links
        #[arg(long)]
        base: Option<Url>,
    },

    /// Print the proxy URL for a target URL
    Encode {
        /// The target URL to encode
        url: Url,

        /// Content option (auto, feed, html, asset, image)
        #[arg(short, long, default_value = "auto")]
        option: String,

        /// API key embedded in the proxy URL
        #[arg(short, long)]
        key: String,

        /// Base URL of the gateway
        #[arg(long, default_value = DEFAULT_BASE)]
        base: Url,
    },

    /// Reverse a proxy URL back to its target
    Decode {
        /// The proxy URL to reverse
        url: Url,

        /// Base URL of the gateway
        #[arg(long, default_value = DEFAULT_BASE)]
        base: Url,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve { bind, store, base } => {
            commands::serve::run(bind, store, base).await?;
        }
        Commands::Encode {
            url,
            option,
            key,
            base,
        } => {
            commands::encode::run(&url, &option, &key, base)?;
        }
        Commands::Decode { url, base } => {
            commands::decode::run(&url, base).await?;
        }
        Commands::Version => {
            println!("feedgate v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

//! Catalog CLI - browse the product catalog through the proxy.
//!
//! # Usage
//!
//! ```bash
//! # Search, starting from an address-bar query string
//! catalog-cli search --url '?category=smartphones&sort=price&order=asc' --page 2
//!
//! # Free-text search with proxy-side retries
//! catalog-cli search --q phone --retries 3
//!
//! # Type queries line by line, debounced
//! catalog-cli browse
//!
//! # Category list and a single product
//! catalog-cli categories
//! catalog-cli product 1
//! ```
//!
//! # Environment Variables
//!
//! - `CATALOG_PROXY_URL` - Proxy origin (default: <http://127.0.0.1:3000>)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::search::SearchArgs;

const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000";

#[derive(Parser)]
#[command(name = "catalog-cli")]
#[command(author, version, about = "Product catalog CLI")]
struct Cli {
    /// Proxy origin. Falls back to `CATALOG_PROXY_URL`.
    #[arg(long, global = true)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one page of products
    Search(SearchArgs),
    /// Read search terms from stdin and show results as they settle
    Browse {
        /// Starting query string
        #[arg(long, default_value = "")]
        url: String,

        /// Quiet period before a typed term is searched, in milliseconds
        #[arg(long, default_value_t = 300)]
        debounce_ms: u64,

        /// Terms shorter than this are searched immediately
        #[arg(long, default_value_t = 0)]
        min_length: usize,
    },
    /// List product categories
    Categories,
    /// Show a single product
    Product {
        /// Upstream product ID
        id: u64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_cli=info,catalog_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let proxy = cli
        .proxy
        .or_else(|| std::env::var("CATALOG_PROXY_URL").ok())
        .unwrap_or_else(|| DEFAULT_PROXY_URL.to_string());

    match cli.command {
        Commands::Search(args) => commands::search::run(&proxy, args).await?,
        Commands::Browse {
            url,
            debounce_ms,
            min_length,
        } => commands::browse::run(&proxy, &url, debounce_ms, min_length).await?,
        Commands::Categories => commands::catalog::categories(&proxy).await?,
        Commands::Product { id } => commands::catalog::product(&proxy, id).await?,
    }
    Ok(())
}

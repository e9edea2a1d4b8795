//! Emporium CLI - Storefront shell and catalog commands.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! emporium products --search "linen shirt" --max 2500
//! emporium product 64f1c0ffee
//! emporium categories
//!
//! # Interactive shell with a persistent session
//! emporium shell
//! ```
//!
//! # Commands
//!
//! - `products` - Filtered product listing
//! - `product` - One product with its reviews
//! - `categories` - Parent categories and their children
//! - `shell` - Interactive storefront session (login, cart, wishlist, checkout)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emporium_storefront::{Storefront, StorefrontConfig};

mod commands;
mod render;

use commands::CliError;

#[derive(Parser)]
#[command(name = "emporium")]
#[command(author, version, about = "Emporium storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products matching a filter
    Products(commands::catalog::ProductsArgs),
    /// Show one product
    Product {
        /// Product ID
        id: String,
    },
    /// List categories
    Categories,
    /// Start an interactive storefront session
    Shell,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Configuration error: {e}");
            }
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so they never interleave with command output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "emporium_storefront=info,emporium_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CliError> {
    let storefront = Storefront::new(config)?;

    match cli.command {
        Commands::Products(args) => commands::catalog::products(&storefront, args).await?,
        Commands::Product { id } => commands::catalog::product(&storefront, &id).await?,
        Commands::Categories => commands::catalog::categories(&storefront).await?,
        Commands::Shell => commands::shell::run(&storefront).await?,
    }
    Ok(())
}

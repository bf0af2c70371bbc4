//! Suburbia CLI - database migrations and cart tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! suburbia migrate storefront
//!
//! # Work with the cart from a terminal
//! suburbia cart show
//! suburbia cart --user user_123 add --deck oni-mask --wheel red --truck silver --bolt black
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart` - Show and edit the cart, with login/logout sync

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "suburbia")]
#[command(author, version, about = "Suburbia CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Show and edit the cart
    Cart(commands::cart::CartArgs),
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run storefront database migrations
    Storefront,
}

#[tokio::main]
async fn main() {
    // Cart output goes to stdout, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,suburbia=info")),
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
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Storefront => commands::migrate::storefront().await?,
        },
        Commands::Cart(args) => commands::cart::run(args).await?,
    }
    Ok(())
}

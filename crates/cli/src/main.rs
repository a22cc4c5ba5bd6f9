//! PG Closets CLI - Database maintenance and a local cart.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations (cart tables and sessions)
//! pgc migrate
//!
//! # Load or refresh the product catalog mirror
//! pgc seed catalog catalog.yaml
//!
//! # Delete server carts past their expiry
//! pgc carts purge-expired
//!
//! # Work with a cart stored on this machine
//! pgc cart add bypass-door --price 459.00 --quantity 2 --option width=36
//! pgc cart show
//! pgc cart promo WELCOME10
//! pgc cart schedule 2026-11-02
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed catalog` - Upsert products from a YAML file
//! - `carts purge-expired` - Remove expired server-side carts
//! - `cart` - Local, file-backed cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pgc")]
#[command(author, version, about = "PG Closets CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed database tables from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Maintain server-side carts
    Carts {
        #[command(subcommand)]
        action: CartsAction,
    },
    /// Manage the local cart
    Cart {
        /// Directory holding the cart file (default: platform data dir)
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,

        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products from a YAML list
    Catalog {
        /// Path to the catalog YAML file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum CartsAction {
    /// Delete carts whose expiry has passed
    PurgeExpired,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show lines and order summary
    Show,
    /// Add a product (merges with an identical selection)
    Add {
        /// Catalog product id
        product_id: String,

        /// Unit price in dollars, e.g. 459.00
        #[arg(short, long)]
        price: String,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Customization option as key=value (repeatable)
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
    },
    /// Set a line's quantity (0 or less removes it)
    Update {
        /// Line id shown by `pgc cart show`
        line_id: String,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Line id shown by `pgc cart show`
        line_id: String,
    },
    /// Empty the cart and drop any promotion
    Clear,
    /// Request installation for a line
    Install {
        /// Line id shown by `pgc cart show`
        line_id: String,

        /// Cancel installation instead
        #[arg(long)]
        off: bool,
    },
    /// Apply a promotion code
    Promo {
        code: String,
    },
    /// Remove the promotion code
    Unpromo,
    /// Set the preferred installation day
    Schedule {
        /// Day as YYYY-MM-DD; omit to unset
        date: Option<String>,
    },
    /// Leave notes for the installer
    Notes {
        /// Instructions text; omit to unset
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pgc=info,pg_closets_cli=info".into()),
        )
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
        Commands::Carts { action } => match action {
            CartsAction::PurgeExpired => commands::carts::purge_expired().await?,
        },
        Commands::Cart { data_dir, action } => {
            let mut cart = commands::cart::LocalCart::open(data_dir)?;
            match action {
                CartAction::Show => {}
                CartAction::Add {
                    product_id,
                    price,
                    quantity,
                    options,
                } => cart.add(&product_id, &price, quantity, &options)?,
                CartAction::Update { line_id, quantity } => cart.update(&line_id, quantity)?,
                CartAction::Remove { line_id } => cart.remove(&line_id)?,
                CartAction::Clear => cart.clear()?,
                CartAction::Install { line_id, off } => cart.install(&line_id, !off)?,
                CartAction::Promo { code } => cart.apply_promo(&code)?,
                CartAction::Unpromo => cart.remove_promo()?,
                CartAction::Schedule { date } => cart.schedule(date.as_deref())?,
                CartAction::Notes { text } => cart.notes(text)?,
            }
            cart.print();
        }
    }
    Ok(())
}

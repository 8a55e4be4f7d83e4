//! Keydrop CLI - command line storefront for selling game activation keys.
//!
//! Commands:
//! - `keydrop init` - Create a config file and database
//! - `keydrop game` - Manage the catalog
//! - `keydrop key` - Provision activation keys
//! - `keydrop promo` - Manage promo codes
//! - `keydrop cart` - Work with a user's cart
//! - `keydrop checkout` - Place an order from a cart
//! - `keydrop pay` - Confirm or fail a payment
//! - `keydrop order` - Inspect and refund orders
//! - `keydrop stats` - Sales and promo reports

mod commands;
mod config;
mod context;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    CartArgs, CheckoutArgs, GameArgs, InitArgs, KeyArgs, OrderArgs, PayArgs, PromoArgs,
    StatsArgs,
};

/// Keydrop - sell digital game keys from the command line
#[derive(Parser)]
#[command(name = "keydrop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a config file and an empty database
    Init(InitArgs),

    /// Manage games in the catalog
    Game(GameArgs),

    /// Provision activation keys
    Key(KeyArgs),

    /// Manage promo codes
    Promo(PromoArgs),

    /// Work with a user's cart
    Cart(CartArgs),

    /// Turn a user's cart into a pending order
    Checkout(CheckoutArgs),

    /// Payment provider callbacks
    Pay(PayArgs),

    /// Inspect and refund orders
    Order(OrderArgs),

    /// Sales and promo reports
    Stats(StatsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let ctx = context::Context::load(cli.config.as_deref(), cli.db.as_deref(), output)?;
    logging::init(&ctx.config.logging, cli.verbose)?;

    // Execute command
    let result = match cli.command {
        Commands::Init(args) => commands::init::run(args, &ctx),
        Commands::Game(args) => commands::game::run(args, &ctx),
        Commands::Key(args) => commands::key::run(args, &ctx),
        Commands::Promo(args) => commands::promo::run(args, &ctx),
        Commands::Cart(args) => commands::cart::run(args, &ctx),
        Commands::Checkout(args) => commands::checkout::run(args, &ctx),
        Commands::Pay(args) => commands::pay::run(args, &ctx),
        Commands::Order(args) => commands::order::run(args, &ctx),
        Commands::Stats(args) => commands::stats::run(args, &ctx),
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

//! CLI command implementations.

pub mod cart;
pub mod checkout;
pub mod game;
pub mod init;
pub mod key;
pub mod order;
pub mod pay;
pub mod promo;
pub mod stats;

use clap::{Args, Subcommand};
use keydrop_commerce::catalog::DiscountKind;
use keydrop_commerce::checkout::PaymentMethod;

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing keydrop.toml.
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the game command.
#[derive(Args)]
pub struct GameArgs {
    #[command(subcommand)]
    pub command: GameCommand,
}

#[derive(Subcommand)]
pub enum GameCommand {
    /// Add a game to the catalog.
    Add {
        /// Display title.
        title: String,
        /// Base price in minor units.
        #[arg(short, long)]
        price: i64,
        /// Discount value.
        #[arg(short, long, default_value = "0")]
        discount: i64,
        /// How the discount applies (percentage or fixed).
        #[arg(short, long, default_value = "percentage")]
        kind: DiscountKind,
        /// Cover image URL.
        #[arg(long)]
        image: Option<String>,
        /// Create the game hidden from carts.
        #[arg(long)]
        inactive: bool,
    },
    /// List games.
    List {
        /// Include inactive games.
        #[arg(short, long)]
        all: bool,
    },
    /// Show one game.
    Show {
        /// Game ID.
        game_id: String,
    },
    /// Change a game's pricing.
    Price {
        /// Game ID.
        game_id: String,
        /// New base price in minor units.
        #[arg(short, long)]
        price: Option<i64>,
        /// New discount value.
        #[arg(short, long)]
        discount: Option<i64>,
        /// New discount kind.
        #[arg(short, long)]
        kind: Option<DiscountKind>,
    },
    /// Make a game available for purchase.
    Activate {
        /// Game ID.
        game_id: String,
    },
    /// Hide a game from carts.
    Deactivate {
        /// Game ID.
        game_id: String,
    },
}

/// Arguments for the key command.
#[derive(Args)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Add activation keys for a game.
    Add {
        /// Game ID.
        game_id: String,
        /// Keys to add.
        keys: Vec<String>,
        /// Read keys from a file, one per line.
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Count unused keys for a game.
    Count {
        /// Game ID.
        game_id: String,
    },
}

/// Arguments for the promo command.
#[derive(Args)]
pub struct PromoArgs {
    #[command(subcommand)]
    pub command: PromoCommand,
}

#[derive(Subcommand)]
pub enum PromoCommand {
    /// Create a promo code.
    Create {
        /// Code buyers enter (stored uppercase).
        code: String,
        /// Percent off the cart total (1-100).
        #[arg(short, long)]
        percent: i64,
        /// Number of redemptions allowed.
        #[arg(short = 'u', long, default_value = "100")]
        max_usage: i64,
        /// Cap on the discount amount.
        #[arg(long)]
        max_discount: Option<i64>,
        /// Minimum cart total.
        #[arg(long, default_value = "0")]
        min_purchase: i64,
        /// Expire after this many days.
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// List promo codes.
    List,
    /// Show one promo code.
    Show {
        /// Promo code.
        code: String,
    },
    /// Check a code against a cart total without spending it.
    Validate {
        /// Promo code.
        code: String,
        /// Cart total in minor units.
        total: i64,
    },
    /// Re-enable a promo code.
    Activate {
        /// Promo code.
        code: String,
    },
    /// Disable a promo code.
    Deactivate {
        /// Promo code.
        code: String,
    },
}

/// Arguments for the cart command.
#[derive(Args)]
pub struct CartArgs {
    /// User the cart belongs to.
    #[arg(short, long)]
    pub user: String,

    #[command(subcommand)]
    pub command: Option<CartCommand>,
}

#[derive(Subcommand)]
pub enum CartCommand {
    /// Show the cart.
    Show,
    /// Add a game to the cart.
    Add {
        /// Game ID.
        game_id: String,
        /// Units to add.
        #[arg(short, long, default_value = "1")]
        quantity: i64,
    },
    /// Set the quantity of a line (0 removes it).
    Set {
        /// Game ID.
        game_id: String,
        /// New quantity.
        quantity: i64,
    },
    /// Remove a game from the cart.
    Remove {
        /// Game ID.
        game_id: String,
    },
    /// Empty the cart.
    Clear,
    /// Apply a promo code to the cart.
    ApplyPromo {
        /// Promo code.
        code: String,
    },
    /// Drop the cart's promo code.
    RemovePromo,
    /// Add a free unit of a game.
    GrantFree {
        /// Game ID.
        game_id: String,
    },
}

/// Arguments for the checkout command.
#[derive(Args)]
pub struct CheckoutArgs {
    /// User checking out.
    #[arg(short, long)]
    pub user: String,

    /// Payment method (bank_transfer, e_wallet, credit_card or any name).
    #[arg(short, long, default_value = "bank_transfer")]
    pub payment: PaymentMethod,

    /// Promo code; overrides one applied to the cart.
    #[arg(long)]
    pub promo: Option<String>,
}

/// Arguments for the pay command.
#[derive(Args)]
pub struct PayArgs {
    #[command(subcommand)]
    pub command: PayCommand,
}

#[derive(Subcommand)]
pub enum PayCommand {
    /// Confirm payment and deliver keys.
    Confirm {
        /// Order ID.
        order_id: String,
        /// Payment provider reference.
        payment_id: String,
    },
    /// Record a refused payment.
    Fail {
        /// Order ID.
        order_id: String,
        /// Reason given by the provider.
        #[arg(short, long, default_value = "payment refused")]
        reason: String,
    },
}

/// Arguments for the order command.
#[derive(Args)]
pub struct OrderArgs {
    #[command(subcommand)]
    pub command: OrderCommand,
}

#[derive(Subcommand)]
pub enum OrderCommand {
    /// List a user's orders.
    List {
        /// User ID.
        #[arg(short, long)]
        user: String,
    },
    /// Show one of a user's orders, including delivered keys.
    Show {
        /// Order ID.
        order_id: String,
        /// Owner of the order.
        #[arg(short, long)]
        user: String,
    },
    /// List every order.
    All {
        /// Show only the last N orders.
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Refund a paid order.
    Refund {
        /// Order ID.
        order_id: String,
    },
}

/// Arguments for the stats command.
#[derive(Args)]
pub struct StatsArgs {
    #[command(subcommand)]
    pub command: StatsCommand,
}

#[derive(Subcommand)]
pub enum StatsCommand {
    /// Orders, revenue and conversion rate.
    Analytics,
    /// Promo code usage.
    Promos,
    /// Games ranked by keys delivered.
    BestSellers {
        /// Number of games to show.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

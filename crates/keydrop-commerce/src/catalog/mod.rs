//! Catalog and stock ledger.
//!
//! Games carry a price and a cached stock counter; activation keys are the
//! scarce, single-use goods actually delivered. The key table is the
//! authority on availability, the stock counter is for display and early
//! rejection only.

mod game;
mod key;
mod ledger;

pub use game::{compute_final_price, DiscountKind, Game, NewGame, PricingUpdate};
pub use key::ActivationKey;
pub use ledger::StockLedger;

pub(crate) use ledger::{claim_next_key, decrement_stock, find_game, require_game};

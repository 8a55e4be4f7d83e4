//! Promo code engine.
//!
//! Validating a code never spends it. Usage is only recorded through
//! [`PromoEngine::mark_used`] (or by checkout, inside its own transaction).

mod engine;
mod promo;

pub use engine::PromoEngine;
pub use promo::{normalize_code, NewPromo, Promo, PromoQuote};

pub(crate) use engine::{mark_used_with, validate_with};

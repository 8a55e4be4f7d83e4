//! Cart aggregator: one mutable basket per user.

mod cart;
mod service;

pub use cart::{Cart, CartItem};
pub use service::{CartLineView, CartService, CartView};

pub(crate) use service::{clear_cart, load_cart};

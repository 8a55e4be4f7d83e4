//! Checkout and fulfillment.
//!
//! Contains the order types, the order state machine and the pipeline that
//! turns a cart into an order and a confirmed payment into delivered keys.

mod order;
mod pipeline;

pub use order::{
    generate_order_number, DeliveredKey, FulfillmentResult, Order, OrderItem, OrderStatus,
    OrderSummary, PaymentMethod,
};
pub use pipeline::Checkout;

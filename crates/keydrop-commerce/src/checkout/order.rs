//! Order types.

use crate::error::CommerceError;
use crate::ids::{GameId, OrderId, UserId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Order status.
///
/// ```text
/// PENDING ──> PAID ──> REFUNDED
///    │
///    └──────> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created at checkout, awaiting payment.
    #[default]
    Pending,
    /// Payment confirmed and keys delivered.
    Paid,
    /// Payment refused by the provider.
    Failed,
    /// Refunded by an administrator.
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Failed => "Failed",
            OrderStatus::Refunded => "Refunded",
        }
    }

    /// Check if the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Failed)
                | (OrderStatus::Paid, OrderStatus::Refunded)
        )
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Failed | OrderStatus::Refunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the buyer intends to pay. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PaymentMethod {
    BankTransfer,
    EWallet,
    CreditCard,
    Other(String),
}

impl PaymentMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::EWallet => "e_wallet",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Other(name) => name,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PaymentMethod {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "bank_transfer" | "bank" | "transfer" => PaymentMethod::BankTransfer,
            "e_wallet" | "ewallet" | "wallet" => PaymentMethod::EWallet,
            "credit_card" | "card" => PaymentMethod::CreditCard,
            _ => PaymentMethod::Other(s),
        }
    }
}

impl From<PaymentMethod> for String {
    fn from(m: PaymentMethod) -> Self {
        match m {
            PaymentMethod::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PaymentMethod::from(s.to_string()))
    }
}

impl From<&PaymentMethod> for keydrop_db::Value {
    fn from(m: &PaymentMethod) -> Self {
        keydrop_db::Value::Text(m.as_str().to_string())
    }
}

/// A line item frozen at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub game_id: GameId,
    /// Game title at checkout time.
    pub title: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub is_free: bool,
}

impl OrderItem {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// An activation key as handed to the buyer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveredKey {
    pub game_id: GameId,
    pub game_title: String,
    pub key: String,
}

/// A placed order.
///
/// Items and amounts are a snapshot taken at checkout and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Human-readable order number. Practically unique, not guaranteed.
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub discount_amount: Money,
    /// Code of the promo that was redeemed, if any.
    pub promo_code: Option<String>,
    pub total_price: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    /// Provider reference, set on confirmation.
    pub payment_id: Option<String>,
    /// Keys bound to this order, set on confirmation.
    pub delivered_keys: Option<Vec<DeliveredKey>>,
    /// Provider's reason for a refused payment.
    pub failure_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub paid_at: Option<i64>,
}

impl Order {
    /// Units purchased across all lines.
    pub fn units(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Number of keys delivered so far.
    pub fn keys_delivered(&self) -> usize {
        self.delivered_keys.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// Move to `next`, if the state machine allows it.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), CommerceError> {
        if !self.status.can_transition_to(next) {
            return Err(CommerceError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// What checkout returns. Carries no keys: nothing has been paid yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_number: String,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub promo_code: Option<String>,
    pub total_price: Money,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            promo_code: order.promo_code.clone(),
            total_price: order.total_price,
            status: order.status,
            payment_method: order.payment_method.clone(),
        }
    }
}

/// Outcome of a payment confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentResult {
    pub order_id: OrderId,
    pub order_number: String,
    pub message: String,
    /// Keys actually bound to the order.
    pub keys_delivered: usize,
    /// Units the order paid for.
    pub units_purchased: i64,
    pub delivered_keys: Vec<DeliveredKey>,
}

impl FulfillmentResult {
    /// Whether some units went without a key.
    pub fn is_partial(&self) -> bool {
        (self.keys_delivered as i64) < self.units_purchased
    }
}

const ORDER_SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ORDER_SUFFIX_LEN: usize = 6;

/// Order number of the form `{prefix}-{YYYYMMDDHHMMSS}-{6 random chars}`.
///
/// The suffix avoids look-alike characters (`0/O`, `1/I`).
pub fn generate_order_number(prefix: &str, at: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| ORDER_SUFFIX_ALPHABET[rng.gen_range(0..ORDER_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", prefix, at.format("%Y%m%d%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(Paid.can_transition_to(Refunded));
        assert!(!Paid.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Paid));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(Refunded.is_terminal());
        assert!(!Paid.is_terminal());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "\"PAID\"");
        let status: OrderStatus = serde_json::from_str("\"REFUNDED\"").unwrap();
        assert_eq!(status, OrderStatus::Refunded);
    }

    #[test]
    fn test_payment_method_strings() {
        assert_eq!("Bank Transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
        assert_eq!("ewallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::EWallet);
        assert_eq!(
            "qris".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Other("qris".into())
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CreditCard).unwrap(),
            "\"credit_card\""
        );
        let m: PaymentMethod = serde_json::from_str("\"e_wallet\"").unwrap();
        assert_eq!(m, PaymentMethod::EWallet);
    }

    #[test]
    fn test_order_number_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        let number = generate_order_number("ORD", at);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], "20250309140507");
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].bytes().all(|b| ORDER_SUFFIX_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_transition_rejected() {
        let mut order = Order {
            id: OrderId::new("ord_1"),
            order_number: "ORD-1".into(),
            user_id: UserId::new("alice"),
            items: vec![OrderItem {
                game_id: GameId::new("g1"),
                title: "Celeste".into(),
                quantity: 2,
                unit_price: Money::new(10),
                is_free: false,
            }],
            subtotal: Money::new(20),
            discount_amount: Money::zero(),
            promo_code: None,
            total_price: Money::new(20),
            status: OrderStatus::Failed,
            payment_method: PaymentMethod::BankTransfer,
            payment_id: None,
            delivered_keys: None,
            failure_reason: None,
            created_at: 0,
            updated_at: 0,
            paid_at: None,
        };
        assert_eq!(order.units(), 2);
        assert_eq!(order.keys_delivered(), 0);
        assert!(matches!(
            order.transition(OrderStatus::Paid),
            Err(CommerceError::InvalidTransition { from: OrderStatus::Failed, to: OrderStatus::Paid })
        ));
    }

    #[test]
    fn test_partial_fulfillment() {
        let result = FulfillmentResult {
            order_id: OrderId::new("ord_1"),
            order_number: "ORD-1".into(),
            message: String::new(),
            keys_delivered: 1,
            units_purchased: 2,
            delivered_keys: Vec::new(),
        };
        assert!(result.is_partial());
    }
}

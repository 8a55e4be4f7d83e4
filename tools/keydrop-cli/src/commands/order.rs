//! Order commands.

use anyhow::Result;
use keydrop_commerce::checkout::Order;
use keydrop_commerce::{OrderId, UserId};

use super::{OrderArgs, OrderCommand};
use crate::context::Context;
use crate::output::{format_money, format_timestamp, status_badge};

/// Run the order command.
pub fn run(args: OrderArgs, ctx: &Context) -> Result<()> {
    let shop = ctx.open_shop()?;

    match args.command {
        OrderCommand::List { user } => {
            let orders = shop.get_user_orders(&UserId::new(user))?;
            list_orders(&orders, ctx);
        }
        OrderCommand::Show { order_id, user } => {
            let order = shop.get_order_by_id(&OrderId::new(order_id), &UserId::new(user))?;
            show_order(&order, ctx);
        }
        OrderCommand::All { limit } => {
            let mut orders = shop.get_all_orders()?;
            if let Some(limit) = limit {
                orders.truncate(limit);
            }
            list_orders(&orders, ctx);
        }
        OrderCommand::Refund { order_id } => {
            let order = shop.refund_order(&OrderId::new(order_id))?;
            if ctx.output.is_json() {
                ctx.output.json(&order);
                return Ok(());
            }
            ctx.output
                .success(&format!("Order {} refunded", order.order_number));
            ctx.output.kv("Status", &status_badge(order.status.as_str()));
        }
    }

    Ok(())
}

fn list_orders(orders: &[Order], ctx: &Context) {
    if ctx.output.is_json() {
        ctx.output.json(&orders);
        return;
    }
    if orders.is_empty() {
        ctx.output.info("No orders found.");
        return;
    }

    let currency = ctx.config.shop.currency;
    let widths = [26, 28, 12, 14, 6, 20];
    ctx.output.table_header(
        &["NUMBER", "ID", "USER", "TOTAL", "KEYS", "CREATED"],
        &widths,
    );
    for order in orders {
        let status = status_badge(order.status.as_str());
        ctx.output.table_row(
            &[
                &format!("{} {}", order.order_number, status),
                order.id.as_str(),
                order.user_id.as_str(),
                &format_money(order.total_price, currency),
                &format!("{}/{}", order.keys_delivered(), order.units()),
                &format_timestamp(order.created_at),
            ],
            &widths,
        );
    }
    ctx.output.info(&format!("Total: {} order(s)", orders.len()));
}

fn show_order(order: &Order, ctx: &Context) {
    if ctx.output.is_json() {
        ctx.output.json(order);
        return;
    }

    let currency = ctx.config.shop.currency;
    ctx.output.header(&format!("Order {}", order.order_number));
    ctx.output.kv("ID", order.id.as_str());
    ctx.output.kv("Status", &status_badge(order.status.as_str()));
    ctx.output.kv("Payment", order.payment_method.as_str());
    if let Some(payment_id) = &order.payment_id {
        ctx.output.kv("Payment ID", payment_id);
    }
    if let Some(reason) = &order.failure_reason {
        ctx.output.kv("Failure", reason);
    }
    ctx.output.kv("Created", &format_timestamp(order.created_at));
    if let Some(paid_at) = order.paid_at {
        ctx.output.kv("Paid", &format_timestamp(paid_at));
    }

    ctx.output.info("");
    for item in &order.items {
        let free = if item.is_free { " (free)" } else { "" };
        ctx.output.list_item(&format!(
            "{} x{} @ {}{}",
            item.title,
            item.quantity,
            format_money(item.unit_price, currency),
            free
        ));
    }

    ctx.output.info("");
    ctx.output.kv("Subtotal", &format_money(order.subtotal, currency));
    if let Some(code) = &order.promo_code {
        ctx.output.kv(
            "Discount",
            &format!("-{} ({})", format_money(order.discount_amount, currency), code),
        );
    }
    ctx.output.kv("Total", &format_money(order.total_price, currency));

    if let Some(keys) = &order.delivered_keys {
        ctx.output.header("Delivered keys");
        for key in keys {
            ctx.output
                .list_item(&format!("{}: {}", key.game_title, key.key));
        }
        let missing = order.units() - keys.len() as i64;
        if missing > 0 {
            ctx.output
                .warn(&format!("{} unit(s) could not be fulfilled", missing));
        }
    }
}

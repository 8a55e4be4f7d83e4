//! Place an order from a cart.

use anyhow::Result;
use keydrop_commerce::UserId;

use super::CheckoutArgs;
use crate::context::Context;
use crate::output::{format_money, status_badge};

/// Run the checkout command.
pub fn run(args: CheckoutArgs, ctx: &Context) -> Result<()> {
    let shop = ctx.open_shop()?;
    let user = UserId::new(args.user);

    let summary = shop.checkout(&user, args.payment, args.promo.as_deref())?;

    if ctx.output.is_json() {
        ctx.output.json(&summary);
        return Ok(());
    }

    if args.promo.is_some() && summary.promo_code.is_none() {
        ctx.output
            .warn("Promo code was not accepted; order placed at full price");
    }

    let currency = shop.config().currency;
    ctx.output
        .success(&format!("Order {} placed", summary.order_number));
    ctx.output.kv("Order ID", summary.order_id.as_str());
    ctx.output.kv("Subtotal", &format_money(summary.subtotal, currency));
    if let Some(code) = &summary.promo_code {
        ctx.output.kv(
            "Discount",
            &format!("-{} ({})", format_money(summary.discount_amount, currency), code),
        );
    }
    ctx.output.kv("Total", &format_money(summary.total_price, currency));
    ctx.output.kv("Payment", summary.payment_method.as_str());
    ctx.output.kv("Status", &status_badge(summary.status.as_str()));
    ctx.output.info("");
    ctx.output.info(&format!(
        "Keys are delivered once payment is confirmed: keydrop pay confirm {} <PAYMENT_ID>",
        summary.order_id
    ));

    Ok(())
}

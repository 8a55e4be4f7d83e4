//! Payment provider callbacks.

use anyhow::Result;
use keydrop_commerce::OrderId;

use super::{PayArgs, PayCommand};
use crate::context::Context;
use crate::output::status_badge;

/// Run the pay command.
pub fn run(args: PayArgs, ctx: &Context) -> Result<()> {
    let shop = ctx.open_shop()?;

    match args.command {
        PayCommand::Confirm {
            order_id,
            payment_id,
        } => {
            let result = shop.confirm_payment(&OrderId::new(order_id), &payment_id)?;
            if ctx.output.is_json() {
                ctx.output.json(&result);
                return Ok(());
            }

            if result.is_partial() {
                ctx.output.warn(&result.message);
            } else {
                ctx.output.success(&result.message);
            }
            ctx.output.kv("Order", &result.order_number);
            ctx.output.kv(
                "Keys",
                &format!("{}/{}", result.keys_delivered, result.units_purchased),
            );
            for key in &result.delivered_keys {
                ctx.output
                    .list_item(&format!("{}: {}", key.game_title, key.key));
            }
        }
        PayCommand::Fail { order_id, reason } => {
            let order = shop.fail_payment(&OrderId::new(order_id), &reason)?;
            if ctx.output.is_json() {
                ctx.output.json(&order);
                return Ok(());
            }
            ctx.output
                .warn(&format!("Order {} marked failed", order.order_number));
            ctx.output.kv("Status", &status_badge(order.status.as_str()));
            ctx.output.kv("Reason", &reason);
        }
    }

    Ok(())
}

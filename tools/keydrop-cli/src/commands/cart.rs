//! Cart commands.

use anyhow::Result;
use keydrop_commerce::cart::CartView;
use keydrop_commerce::{GameId, Shop, UserId};

use super::{CartArgs, CartCommand};
use crate::context::Context;
use crate::output::format_money;

/// Run the cart command.
pub fn run(args: CartArgs, ctx: &Context) -> Result<()> {
    let shop = ctx.open_shop()?;
    let user = UserId::new(args.user);

    match args.command.unwrap_or(CartCommand::Show) {
        CartCommand::Show => {}
        CartCommand::Add { game_id, quantity } => {
            shop.add_item(&user, &GameId::new(game_id), quantity)?;
            ctx.output.success(&format!("Added {} unit(s)", quantity));
        }
        CartCommand::Set { game_id, quantity } => {
            shop.update_quantity(&user, &GameId::new(game_id), quantity)?;
            ctx.output.success("Quantity updated");
        }
        CartCommand::Remove { game_id } => {
            shop.remove_item(&user, &GameId::new(game_id))?;
            ctx.output.success("Item removed");
        }
        CartCommand::Clear => {
            shop.clear_cart(&user)?;
            ctx.output.success("Cart cleared");
        }
        CartCommand::ApplyPromo { code } => {
            let quote = shop.apply_promo(&user, &code)?;
            ctx.output.success(&format!(
                "Promo {} applied: -{}",
                quote.code,
                format_money(quote.discount_amount, shop.config().currency)
            ));
        }
        CartCommand::RemovePromo => {
            shop.remove_promo(&user)?;
            ctx.output.success("Promo removed");
        }
        CartCommand::GrantFree { game_id } => {
            shop.grant_free_item(&user, &GameId::new(game_id))?;
            ctx.output.success("Free item granted");
        }
    }

    let view = shop.get_cart(&user)?;
    print_cart(&view, &shop, ctx);
    Ok(())
}

fn print_cart(view: &CartView, shop: &Shop, ctx: &Context) {
    if ctx.output.is_json() {
        ctx.output.json(view);
        return;
    }

    let currency = shop.config().currency;
    ctx.output.header(&format!("Cart of {}", view.user_id));
    if view.items.is_empty() {
        ctx.output.info("Cart is empty.");
        return;
    }

    let widths = [30, 28, 5, 14, 14];
    ctx.output
        .table_header(&["GAME", "TITLE", "QTY", "UNIT", "TOTAL"], &widths);
    for line in &view.items {
        let title = if line.is_free {
            format!("{} (free)", line.title)
        } else {
            line.title.clone()
        };
        ctx.output.table_row(
            &[
                line.game_id.as_str(),
                &title,
                &line.quantity.to_string(),
                &format_money(line.unit_price, currency),
                &format_money(line.line_total, currency),
            ],
            &widths,
        );
    }

    ctx.output.info("");
    ctx.output.kv("Items", &view.item_count.to_string());
    ctx.output.kv("Subtotal", &format_money(view.subtotal, currency));
    if let Some(code) = &view.promo_code {
        ctx.output.kv("Promo", code);
    }
}

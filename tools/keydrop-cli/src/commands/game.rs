//! Catalog commands.

use anyhow::{bail, Result};
use keydrop_commerce::catalog::{Game, NewGame, PricingUpdate};
use keydrop_commerce::{GameId, Money};

use super::{GameArgs, GameCommand};
use crate::context::Context;
use crate::output::{format_money, status_badge};

/// Run the game command.
pub fn run(args: GameArgs, ctx: &Context) -> Result<()> {
    let shop = ctx.open_shop()?;

    match args.command {
        GameCommand::Add {
            title,
            price,
            discount,
            kind,
            image,
            inactive,
        } => {
            let mut input = NewGame::new(title, Money::new(price)).with_discount(discount, kind);
            if let Some(url) = image {
                input = input.with_image(url);
            }
            input.active = !inactive;

            let game = shop.create_game(input)?;
            print_game(&game, ctx, "Game added");
        }
        GameCommand::List { all } => {
            let games = shop.list_games(!all)?;
            if ctx.output.is_json() {
                ctx.output.json(&games);
                return Ok(());
            }
            if games.is_empty() {
                ctx.output.info("No games found.");
                return Ok(());
            }

            let currency = shop.config().currency;
            let widths = [30, 32, 14, 7, 10];
            ctx.output
                .table_header(&["ID", "TITLE", "PRICE", "STOCK", "STATUS"], &widths);
            for game in &games {
                let price = format_money(game.final_price, currency);
                let stock = game.stock.to_string();
                let status = status_badge(if game.active { "active" } else { "inactive" });
                ctx.output.table_row(
                    &[game.id.as_str(), &game.title, &price, &stock, &status],
                    &widths,
                );
            }
            ctx.output.info(&format!("Total: {} game(s)", games.len()));
        }
        GameCommand::Show { game_id } => {
            let game_id = GameId::new(game_id);
            let game = shop.get_game(&game_id)?;
            print_game(&game, ctx, &game.title);
            if !ctx.output.is_json() {
                let unused = shop.count_unused_keys(&game_id)?;
                ctx.output.kv("Unused keys", &unused.to_string());
            }
        }
        GameCommand::Price {
            game_id,
            price,
            discount,
            kind,
        } => {
            let update = PricingUpdate {
                base_price: price.map(Money::new),
                discount,
                discount_kind: kind,
            };
            if update.is_empty() {
                bail!("Nothing to change: pass --price, --discount or --kind");
            }
            let game = shop.update_game_pricing(&GameId::new(game_id), update)?;
            print_game(&game, ctx, "Pricing updated");
        }
        GameCommand::Activate { game_id } => {
            let game = shop.set_game_active(&GameId::new(game_id), true)?;
            print_game(&game, ctx, "Game activated");
        }
        GameCommand::Deactivate { game_id } => {
            let game = shop.set_game_active(&GameId::new(game_id), false)?;
            print_game(&game, ctx, "Game deactivated");
        }
    }

    Ok(())
}

fn print_game(game: &Game, ctx: &Context, title: &str) {
    if ctx.output.is_json() {
        ctx.output.json(game);
        return;
    }

    let currency = ctx.config.shop.currency;
    ctx.output.success(title);
    ctx.output.kv("ID", game.id.as_str());
    ctx.output.kv("Title", &game.title);
    ctx.output.kv("Base price", &format_money(game.base_price, currency));
    ctx.output.kv(
        "Discount",
        &format!("{} ({})", game.discount, game.discount_kind),
    );
    ctx.output.kv("Final price", &format_money(game.final_price, currency));
    ctx.output.kv("Stock", &game.stock.to_string());
    ctx.output.kv(
        "Status",
        &status_badge(if game.active { "active" } else { "inactive" }),
    );
}

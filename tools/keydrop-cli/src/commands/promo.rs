//! Promo code commands.

use anyhow::Result;
use chrono::{Duration, Utc};
use keydrop_commerce::promo::{NewPromo, Promo};
use keydrop_commerce::Money;

use super::{PromoArgs, PromoCommand};
use crate::context::Context;
use crate::output::{format_money, format_timestamp, status_badge};

/// Run the promo command.
pub fn run(args: PromoArgs, ctx: &Context) -> Result<()> {
    let shop = ctx.open_shop()?;
    let currency = shop.config().currency;

    match args.command {
        PromoCommand::Create {
            code,
            percent,
            max_usage,
            max_discount,
            min_purchase,
            expires_in_days,
        } => {
            let mut input = NewPromo::percentage(code, percent, max_usage)
                .with_min_purchase(Money::new(min_purchase));
            if let Some(cap) = max_discount {
                input = input.with_max_discount(Money::new(cap));
            }
            if let Some(days) = expires_in_days {
                input = input.expires_at((Utc::now() + Duration::days(days)).timestamp());
            }

            let promo = shop.create_promo(input)?;
            print_promo(&promo, ctx, "Promo created");
        }
        PromoCommand::List => {
            let promos = shop.list_promos()?;
            if ctx.output.is_json() {
                ctx.output.json(&promos);
                return Ok(());
            }
            if promos.is_empty() {
                ctx.output.info("No promo codes found.");
                return Ok(());
            }

            let widths = [16, 8, 10, 20, 10];
            ctx.output
                .table_header(&["CODE", "PERCENT", "USED", "EXPIRES", "STATUS"], &widths);
            for promo in &promos {
                let percent = format!("{}%", promo.discount_percent);
                let used = format!("{}/{}", promo.used_count, promo.max_usage);
                let expires = promo
                    .expires_at
                    .map(format_timestamp)
                    .unwrap_or_else(|| "-".to_string());
                let status = status_badge(if promo.active { "active" } else { "inactive" });
                ctx.output
                    .table_row(&[&promo.code, &percent, &used, &expires, &status], &widths);
            }
            ctx.output.info(&format!("Total: {} promo(s)", promos.len()));
        }
        PromoCommand::Show { code } => {
            let promo = shop.get_promo(&code)?;
            print_promo(&promo, ctx, &promo.code);
        }
        PromoCommand::Validate { code, total } => {
            let quote = shop.validate_promo(&code, Money::new(total))?;
            if ctx.output.is_json() {
                ctx.output.json(&quote);
                return Ok(());
            }
            ctx.output.success(&format!("{} is valid", quote.code));
            ctx.output
                .kv("Discount", &format_money(quote.discount_amount, currency));
            ctx.output
                .kv("Final total", &format_money(quote.final_total, currency));
        }
        PromoCommand::Activate { code } => {
            let promo = shop.set_promo_active(&code, true)?;
            print_promo(&promo, ctx, "Promo activated");
        }
        PromoCommand::Deactivate { code } => {
            let promo = shop.set_promo_active(&code, false)?;
            print_promo(&promo, ctx, "Promo deactivated");
        }
    }

    Ok(())
}

fn print_promo(promo: &Promo, ctx: &Context, title: &str) {
    if ctx.output.is_json() {
        ctx.output.json(promo);
        return;
    }

    let currency = ctx.config.shop.currency;
    ctx.output.success(title);
    ctx.output.kv("Code", &promo.code);
    ctx.output.kv("Discount", &format!("{}%", promo.discount_percent));
    if let Some(cap) = promo.max_discount {
        ctx.output.kv("Max discount", &format_money(cap, currency));
    }
    ctx.output
        .kv("Min purchase", &format_money(promo.min_purchase, currency));
    ctx.output.kv(
        "Usage",
        &format!("{}/{}", promo.used_count, promo.max_usage),
    );
    if let Some(at) = promo.expires_at {
        ctx.output.kv("Expires", &format_timestamp(at));
    }
    ctx.output.kv(
        "Status",
        &status_badge(if promo.active { "active" } else { "inactive" }),
    );
}

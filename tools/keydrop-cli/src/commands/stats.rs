//! Reporting commands.

use anyhow::Result;

use super::{StatsArgs, StatsCommand};
use crate::context::Context;
use crate::output::format_money;

/// Run the stats command.
pub fn run(args: StatsArgs, ctx: &Context) -> Result<()> {
    let shop = ctx.open_shop()?;

    match args.command {
        StatsCommand::Analytics => {
            let analytics = shop.get_analytics()?;
            if ctx.output.is_json() {
                ctx.output.json(&analytics);
                return Ok(());
            }
            ctx.output.header("Sales");
            ctx.output
                .kv("Orders", &analytics.total_orders.to_string());
            ctx.output.kv("Paid", &analytics.paid_orders.to_string());
            ctx.output
                .kv("Pending", &analytics.pending_orders.to_string());
            ctx.output.kv(
                "Revenue",
                &format_money(analytics.total_revenue, shop.config().currency),
            );
            ctx.output.kv(
                "Conversion",
                &format!("{:.2}%", analytics.conversion_rate),
            );
        }
        StatsCommand::Promos => {
            let stats = shop.get_promo_stats()?;
            if ctx.output.is_json() {
                ctx.output.json(&stats);
                return Ok(());
            }
            ctx.output.header("Promo codes");
            ctx.output.kv("Total", &stats.total_promos.to_string());
            ctx.output.kv("Active", &stats.active_promos.to_string());
            ctx.output
                .kv("Redemptions", &stats.total_usage.to_string());
        }
        StatsCommand::BestSellers { limit } => {
            let top = shop.best_sellers(limit)?;
            if ctx.output.is_json() {
                ctx.output.json(&top);
                return Ok(());
            }
            if top.is_empty() {
                ctx.output.info("No keys delivered yet.");
                return Ok(());
            }
            let widths = [4, 32, 8];
            ctx.output.table_header(&["#", "TITLE", "KEYS"], &widths);
            for (rank, entry) in top.iter().enumerate() {
                ctx.output.table_row(
                    &[
                        &(rank + 1).to_string(),
                        &entry.title,
                        &entry.keys_delivered.to_string(),
                    ],
                    &widths,
                );
            }
        }
    }

    Ok(())
}

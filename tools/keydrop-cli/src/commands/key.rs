//! Activation key provisioning.

use anyhow::{bail, Context as _, Result};
use keydrop_commerce::GameId;

use super::{KeyArgs, KeyCommand};
use crate::context::Context;

/// Run the key command.
pub fn run(args: KeyArgs, ctx: &Context) -> Result<()> {
    let shop = ctx.open_shop()?;

    match args.command {
        KeyCommand::Add {
            game_id,
            keys,
            file,
        } => {
            let mut all_keys = keys;
            if let Some(file) = file {
                let path = ctx.resolve_path(&file);
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read key file: {}", path.display()))?;
                all_keys.extend(parse_key_lines(&content));
            }
            if all_keys.is_empty() {
                bail!("No keys given: pass keys as arguments or use --file");
            }

            let game_id = GameId::new(game_id);
            let added = shop.add_keys(&game_id, all_keys)?;
            let stock = shop.get_game(&game_id)?.stock;

            if ctx.output.is_json() {
                ctx.output.json(&serde_json::json!({
                    "game_id": game_id,
                    "added": added,
                    "stock": stock,
                }));
                return Ok(());
            }
            ctx.output.success(&format!("Added {} key(s)", added));
            ctx.output.kv("Stock", &stock.to_string());
        }
        KeyCommand::Count { game_id } => {
            let game_id = GameId::new(game_id);
            let unused = shop.count_unused_keys(&game_id)?;
            if ctx.output.is_json() {
                ctx.output
                    .json(&serde_json::json!({ "game_id": game_id, "unused": unused }));
                return Ok(());
            }
            ctx.output
                .info(&format!("{} unused key(s) for {}", unused, game_id));
        }
    }

    Ok(())
}

/// One key per line; blank lines and `#` comments are skipped.
fn parse_key_lines(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

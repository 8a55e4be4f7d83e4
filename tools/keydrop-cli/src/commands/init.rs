//! Create a config file and the database.

use anyhow::{bail, Result};

use super::InitArgs;
use crate::config::generate_default_config;
use crate::context::Context;

/// Run the init command.
pub fn run(args: InitArgs, ctx: &Context) -> Result<()> {
    ctx.output.header("Initializing keydrop storefront");

    let config_path = ctx.cwd.join("keydrop.toml");
    if config_path.exists() && !args.force {
        ctx.output.info(&format!(
            "Keeping existing config: {}",
            config_path.display()
        ));
    } else {
        if config_path.exists() && !config_path.is_file() {
            bail!("{} exists and is not a file", config_path.display());
        }
        std::fs::write(&config_path, generate_default_config())?;
        ctx.output
            .success(&format!("Wrote config: {}", config_path.display()));
    }

    let shop = ctx.open_shop()?;
    let games = shop.list_games(false)?.len();

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "config": config_path,
            "database": ctx.db_path(),
            "games": games,
        }));
        return Ok(());
    }

    ctx.output
        .success(&format!("Database ready: {}", ctx.db_path().display()));
    ctx.output.info("");
    ctx.output.info("Next steps:");
    ctx.output
        .list_item("keydrop game add \"Hollow Knight\" --price 150000");
    ctx.output.list_item("keydrop key add <GAME_ID> --file keys.txt");
    ctx.output.list_item("keydrop cart --user alice add <GAME_ID>");

    Ok(())
}

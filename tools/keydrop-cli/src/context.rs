//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use keydrop_commerce::Shop;
use keydrop_db::Db;

use crate::config::{CliConfig, CONFIG_FILE_NAMES};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
    /// Config file in use, if one was found.
    pub config_path: Option<PathBuf>,
    /// `--db` override.
    db_override: Option<PathBuf>,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, db_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = if let Some(path) = config_path {
            let path = resolve(&cwd, path);
            (CliConfig::load(&path)?, Some(path))
        } else {
            // Try to find config in current directory or parent directories
            match Self::find_config(&cwd) {
                Some((config, path)) => (config, Some(path)),
                None => (CliConfig::default(), None),
            }
        };

        Ok(Self {
            config,
            output,
            db_override: db_path.map(|p| resolve(&cwd, p)),
            config_path,
            cwd,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(CliConfig, PathBuf)> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_FILE_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = CliConfig::load(&config_path) {
                        return Some((config, config_path));
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Directory relative paths in the config file are resolved against.
    pub fn config_dir(&self) -> PathBuf {
        self.config_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone())
    }

    /// Database file in use.
    pub fn db_path(&self) -> PathBuf {
        match &self.db_override {
            Some(path) => path.clone(),
            None => resolve(&self.config_dir(), &self.config.database.path),
        }
    }

    /// Open the database and the storefront on top of it.
    pub fn open_shop(&self) -> Result<Shop> {
        let path = self.db_path();
        self.output.debug(&format!("Using database: {}", path.display()));
        let db = Db::open(&path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Shop::open(db, self.config.shop.clone()).context("Failed to prepare database schema")
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve(&self.cwd, path)
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

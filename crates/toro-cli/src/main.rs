//! Toro CLI - Receipt scanner for the exchange desk
//!
//! Usage:
//!   toro scan receipt.jpg                     Scan a receipt into a draft
//!   toro scan receipt.jpg --set category=NOMINA
//!   toro compress photo.png --format webp     Preprocess only
//!   toro cache status                         Inspect the analysis cache

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            file,
            no_cache,
            json,
            set,
            commission,
        } => {
            let options = commands::ScanOptions {
                use_cache: !no_cache,
                json,
                edits: commands::parse_assignments(&set)?,
                commission,
            };
            commands::cmd_scan(&config, cli.cache.as_deref(), &file, &options).await
        }
        Commands::Compress {
            file,
            out,
            max_width,
            max_height,
            quality,
            format,
        } => {
            let overrides = commands::CompressOverrides {
                max_width,
                max_height,
                quality,
                format,
            };
            commands::cmd_compress(&config, &file, out.as_deref(), &overrides).map(|_| ())
        }
        Commands::Cache { action } => {
            let cache = commands::open_cache(&config, cli.cache.as_deref())?;
            match action {
                CacheAction::Status => commands::cmd_cache_status(&cache),
                CacheAction::Clear => commands::cmd_cache_clear(&cache).map(|_| ()),
                CacheAction::Sweep => commands::cmd_cache_sweep(&cache).map(|_| ()),
            }
        }
        Commands::Config { action } => match action {
            None | Some(ConfigAction::Show) => commands::cmd_config_show(&config),
            Some(ConfigAction::Path) => commands::cmd_config_path(&config),
        },
        Commands::Health => commands::cmd_health(&config).await,
    }
}

//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Toro - Receipt scanner for the exchange desk
#[derive(Parser)]
#[command(name = "toro")]
#[command(about = "Scan payment receipts into transaction drafts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to the data-dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Analysis cache database (overrides [cache] path)
    ///
    /// Set TORO_CACHE_KEY to encrypt the cache with SQLCipher.
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a receipt image into a transaction draft
    Scan {
        /// Receipt image (JPEG, PNG or WebP)
        file: PathBuf,

        /// Skip the analysis cache (always call the extraction service)
        #[arg(long)]
        no_cache: bool,

        /// Print the draft and scan diagnostics as JSON
        #[arg(long)]
        json: bool,

        /// Edit a draft field after the scan, e.g. --set category=PAGO_PROVEEDOR
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Commission shortcut in percent of the amount (0.3, 1.5 or 3)
        #[arg(long)]
        commission: Option<f64>,
    },

    /// Preprocess an image without scanning it
    Compress {
        /// Image to compress
        file: PathBuf,

        /// Output file (defaults to <name>.compressed.<ext> next to the input)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Maximum width in pixels
        #[arg(long)]
        max_width: Option<u32>,

        /// Maximum height in pixels
        #[arg(long)]
        max_height: Option<u32>,

        /// Encoder quality between 0 and 1 (JPEG only)
        #[arg(long)]
        quality: Option<f32>,

        /// Output format: jpeg, png or webp
        #[arg(long)]
        format: Option<String>,
    },

    /// Manage the analysis cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Check that the extraction service is reachable
    Health,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show entry counts and age range
    Status,
    /// Remove every cached result
    Clear,
    /// Remove expired results
    Sweep,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show,
    /// Print where the override file is read from
    Path,
}

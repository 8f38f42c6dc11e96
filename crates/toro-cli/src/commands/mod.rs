//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (load_config, open_cache, --set parsing) and health
//! - `scan` - Scan a receipt into a transaction draft
//! - `compress` - Preprocess an image without scanning
//! - `cache` - Analysis cache commands (status, clear, sweep)
//! - `config` - Configuration commands (show, path)

pub mod cache;
pub mod compress;
pub mod config;
pub mod core;
pub mod scan;

// Re-export command functions for main.rs
pub use cache::*;
pub use compress::*;
pub use config::*;
pub use core::*;
pub use scan::*;

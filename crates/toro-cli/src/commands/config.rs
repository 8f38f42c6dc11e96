//! Configuration commands (show, path)

use anyhow::Result;
use toro_core::config::default_config_path;
use toro_core::Config;

pub fn cmd_config_show(config: &Config) -> Result<()> {
    match &config.source {
        Some(path) => println!("⚙️  Configuration from {}", path.display()),
        None => println!("⚙️  Built-in configuration"),
    }

    println!();
    println!("[extraction]");
    println!("  url          {}", config.extraction.url);
    println!("  timeout      {}s", config.extraction.timeout.as_secs());

    println!();
    println!("[cache]");
    match config.cache.resolved_path() {
        Some(path) => println!("  path         {}", path.display()),
        None => println!("  path         (no data directory available)"),
    }
    println!("  ttl          {}h", config.cache.ttl.num_hours());

    let options = &config.preprocess.options;
    println!();
    println!("[preprocess]");
    println!("  max size     {}x{}", options.max_width, options.max_height);
    println!("  quality      {}", options.quality);
    println!("  format       {}", options.format.as_str());
    println!(
        "  max upload   {}",
        toro_core::readable_size(config.preprocess.max_upload_bytes as u64)
    );

    println!();
    println!("[draft]");
    println!("  operator     {}", config.draft.operator);
    println!("  currency     {}", config.draft.currency);
    println!("  rate         {}", config.draft.rate);
    println!("  category     {}", config.draft.category);

    Ok(())
}

pub fn cmd_config_path(config: &Config) -> Result<()> {
    match default_config_path() {
        Some(path) if path.exists() => println!("📄 {} (in use)", path.display()),
        Some(path) => println!("📄 {} (not created; built-in defaults apply)", path.display()),
        None => println!("📄 No data directory available; built-in defaults apply"),
    }
    if let Some(source) = &config.source {
        println!("   Loaded: {}", source.display());
    }
    Ok(())
}

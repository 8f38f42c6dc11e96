//! Compress command implementation

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use toro_core::preprocess::{compress_bytes, validate_upload};
use toro_core::{readable_size, CompressedImage, Config, OutputFormat, PreprocessOptions};

/// Command-line overrides for the configured preprocessing options
#[derive(Debug, Clone, Default)]
pub struct CompressOverrides {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<f32>,
    pub format: Option<String>,
}

impl CompressOverrides {
    /// `base` with every given override applied
    pub fn apply(&self, base: &PreprocessOptions) -> Result<PreprocessOptions> {
        let mut options = base.clone();
        if let Some(w) = self.max_width {
            options.max_width = w;
        }
        if let Some(h) = self.max_height {
            options.max_height = h;
        }
        if let Some(q) = self.quality {
            if !(0.0..=1.0).contains(&q) {
                bail!("--quality must be between 0 and 1, got {}", q);
            }
            options.quality = q;
        }
        if let Some(f) = &self.format {
            options.format = f.parse::<OutputFormat>().map_err(anyhow::Error::msg)?;
        }
        if options.max_width == 0 || options.max_height == 0 {
            bail!("Maximum dimensions must be positive");
        }
        Ok(options)
    }
}

/// Default output path: `<stem>.compressed.<ext>` next to the input
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}.compressed.{}", stem, format.extension()))
}

pub fn cmd_compress(
    config: &Config,
    file: &Path,
    out: Option<&Path>,
    overrides: &CompressOverrides,
) -> Result<CompressedImage> {
    let options = overrides.apply(&config.preprocess.options)?;

    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    validate_upload(&bytes, config.preprocess.max_upload_bytes)?;
    let compressed = compress_bytes(&bytes, &options)
        .with_context(|| format!("Failed to compress {}", file.display()))?;

    let out = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(file, options.format));
    std::fs::write(&out, &compressed.image.bytes)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("🗜️  Compressed {}", file.display());
    println!(
        "   Size:       {} → {}",
        readable_size(compressed.original_bytes as u64),
        compressed.image.readable_size()
    );
    println!(
        "   Dimensions: {}x{} → {}x{}{}",
        compressed.original_width,
        compressed.original_height,
        compressed.image.width,
        compressed.image.height,
        if compressed.was_resized() { "" } else { " (not resized)" }
    );
    println!("   Format:     {}", compressed.image.format.as_str());
    println!("✅ Wrote {}", out.display());

    Ok(compressed)
}

//! Scan command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use toro_core::{
    readable_size, Config, DraftDefaults, DraftField, DraftSession, FieldValue, ImageInput,
    Ingestion, Ingestor, TransactionDraft,
};
use tracing::warn;

use super::core::open_cache;

/// Fields in the order the form shows them
const DRAFT_FIELDS: [DraftField; 20] = [
    DraftField::Type,
    DraftField::Category,
    DraftField::Operator,
    DraftField::Amount,
    DraftField::Currency,
    DraftField::Rate,
    DraftField::MarketRate,
    DraftField::AmountUsd,
    DraftField::Profit,
    DraftField::ManualExitAmount,
    DraftField::Commission,
    DraftField::AppliesBankFee,
    DraftField::BankOrigin,
    DraftField::ReceivingAccount,
    DraftField::Client,
    DraftField::ClientDocId,
    DraftField::Reference,
    DraftField::Notes,
    DraftField::RequiresReview,
    DraftField::ReviewReason,
];

/// What to do around the pipeline run
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub use_cache: bool,
    pub json: bool,
    /// Operator edits applied after the scan, in order
    pub edits: Vec<(DraftField, FieldValue)>,
    /// Quick commission percentage
    pub commission: Option<f64>,
}

pub async fn cmd_scan(
    config: &Config,
    cache_path: Option<&Path>,
    file: &Path,
    options: &ScanOptions,
) -> Result<()> {
    let mut ingestor =
        Ingestor::from_config(config).context("Failed to set up extraction client")?;

    if options.use_cache {
        match open_cache(config, cache_path) {
            Ok(cache) => ingestor = ingestor.with_cache(Arc::new(cache)),
            Err(e) => warn!(error = %e, "Analysis cache unavailable, scanning without it"),
        }
    }

    run_scan(&ingestor, &config.draft, file, options).await?;
    Ok(())
}

/// Scan `file` into a fresh draft, apply the requested edits and print it
pub async fn run_scan(
    ingestor: &Ingestor,
    defaults: &DraftDefaults,
    file: &Path,
    options: &ScanOptions,
) -> Result<TransactionDraft> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    if !options.json {
        println!("🧾 Scanning {}...", file.display());
    }

    let ingestion = ingestor
        .ingest(&ImageInput::Bytes(bytes))
        .await
        .context("Scan failed")?;

    let mut session = DraftSession::new(defaults.clone());
    let ticket = session.begin_scan();
    session.apply_scan(ticket, &ingestion.patch)?;

    for (field, value) in &options.edits {
        session
            .edit(*field, value.clone())
            .with_context(|| format!("Failed to set {}", field))?;
    }
    if let Some(pct) = options.commission {
        session.quick_commission(pct)?;
    }

    let draft = session.draft().clone();
    if options.json {
        let out = serde_json::json!({
            "draft": draft,
            "diagnostics": ingestion.diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_scan(&ingestion, &draft);
    }

    Ok(draft)
}

fn print_scan(ingestion: &Ingestion, draft: &TransactionDraft) {
    let diag = &ingestion.diagnostics;
    println!(
        "   📦 {} → {} ({}x{} → {}x{})",
        readable_size(diag.original_bytes as u64),
        readable_size(diag.compressed_bytes as u64),
        diag.original_dimensions.0,
        diag.original_dimensions.1,
        diag.compressed_dimensions.0,
        diag.compressed_dimensions.1,
    );
    if diag.cache_hit {
        println!(
            "   💾 Cached result ({})",
            diag.fingerprint.get(..12).unwrap_or(&diag.fingerprint)
        );
    } else {
        println!("   🤖 Extracted by {} in {}ms", diag.endpoint, diag.elapsed_ms);
    }
    if let Some(err) = &diag.cache_error {
        println!("   ⚠️  Cache skipped: {}", err);
    }

    if draft.requires_review {
        println!();
        println!("⚠️  Requires review: {}", draft.review_reason);
    }

    println!();
    println!("📝 Draft");
    println!("{}", "─".repeat(50));
    for field in DRAFT_FIELDS {
        let value = match draft.get(field) {
            FieldValue::Text(s) => s,
            FieldValue::Flag(b) => (if b { "yes" } else { "no" }).to_string(),
        };
        if field == DraftField::Notes {
            for (i, line) in value.lines().enumerate() {
                let label = if i == 0 { field.as_str() } else { "" };
                println!("  {:<18} {}", label, line);
            }
            continue;
        }
        if field == DraftField::ManualExitAmount && value.is_empty() && draft.category.is_exchange()
        {
            println!("  {:<18} ({} suggested)", field.as_str(), draft.counter_value());
            continue;
        }
        println!("  {:<18} {}", field.as_str(), value);
    }
}

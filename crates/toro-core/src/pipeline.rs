//! Receipt ingestion pipeline
//!
//! Image -> validate -> compress -> fingerprint -> cache lookup ->
//! (miss: extraction service -> cache store) -> normalize -> review flag.
//!
//! Preprocessing errors abort before any network call. Cache failures are
//! logged and treated as a miss. Only successful extractions are cached.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{fingerprint, AnalysisCache};
use crate::config::Config;
use crate::error::Result;
use crate::extraction::{ExtractionBackend, ExtractionClient, RawExtractionResult};
use crate::models::{DraftField, FieldValue};
use crate::normalize::{normalize, NormalizedFields};
use crate::preprocess::{compress_bytes, validate_upload, ImageInput, PreprocessOptions};
use crate::review::{annotate_notes, review_flag, ReviewFlag};

/// Default upload limit
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Draft values produced by one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPatch {
    pub fields: NormalizedFields,
    pub review: Option<ReviewFlag>,
}

impl ScanPatch {
    pub fn from_raw(raw: &RawExtractionResult) -> Self {
        Self {
            fields: normalize(raw),
            review: review_flag(raw),
        }
    }

    /// Notes with the review warning on top
    pub fn notes(&self) -> String {
        annotate_notes(self.review.as_ref(), &self.fields.notes)
    }

    /// Non-empty field writes, notes included
    pub fn changes(&self) -> Vec<(DraftField, FieldValue)> {
        let mut changes = self.fields.entries();
        let notes = self.notes();
        if !notes.is_empty() {
            changes.push((DraftField::Notes, FieldValue::Text(notes)));
        }
        changes
    }

    /// Review fields; always written so they reflect the latest scan
    pub fn review_changes(&self) -> [(DraftField, FieldValue); 2] {
        [
            (
                DraftField::RequiresReview,
                FieldValue::Flag(self.review.is_some()),
            ),
            (
                DraftField::ReviewReason,
                FieldValue::Text(
                    self.review
                        .as_ref()
                        .map(|r| r.reason.clone())
                        .unwrap_or_default(),
                ),
            ),
        ]
    }

    pub fn requires_review(&self) -> bool {
        self.review.is_some()
    }
}

/// What happened during a scan
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub fingerprint: String,
    pub cache_hit: bool,
    /// Set when the cache errored and the scan went straight to the service
    pub cache_error: Option<String>,
    pub original_bytes: usize,
    pub compressed_bytes: usize,
    pub original_dimensions: (u32, u32),
    pub compressed_dimensions: (u32, u32),
    pub endpoint: String,
    pub elapsed_ms: u64,
}

/// Result of ingesting one receipt image
#[derive(Debug, Clone)]
pub struct Ingestion {
    pub raw: RawExtractionResult,
    pub patch: ScanPatch,
    pub diagnostics: Diagnostics,
}

/// Runs the ingestion pipeline
#[derive(Clone)]
pub struct Ingestor {
    extractor: ExtractionClient,
    cache: Option<Arc<dyn AnalysisCache>>,
    options: PreprocessOptions,
    max_upload_bytes: usize,
}

impl Ingestor {
    /// Pipeline without a cache, default preprocessing
    pub fn new(extractor: ExtractionClient) -> Self {
        Self {
            extractor,
            cache: None,
            options: PreprocessOptions::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Pipeline configured from `config`, extraction client included
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(ExtractionClient::from_config(&config.extraction)?)
            .with_options(config.preprocess.options.clone())
            .with_max_upload_bytes(config.preprocess.max_upload_bytes))
    }

    pub fn with_cache(mut self, cache: Arc<dyn AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_options(mut self, options: PreprocessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    pub fn extractor(&self) -> &ExtractionClient {
        &self.extractor
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    /// Ingest one receipt image
    pub async fn ingest(&self, input: &ImageInput) -> Result<Ingestion> {
        let started = Instant::now();

        let bytes = input.to_bytes()?;
        validate_upload(&bytes, self.max_upload_bytes)?;
        let compressed = compress_bytes(&bytes, &self.options)?;
        let fp = fingerprint(&compressed.image.to_data_uri());

        let mut cache_error = None;
        let cached = match &self.cache {
            Some(cache) => match cache.get(&fp) {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(error = %e, "Analysis cache lookup failed, treating as miss");
                    cache_error = Some(e.to_string());
                    None
                }
            },
            None => None,
        };

        let cache_hit = cached.is_some();
        let raw = match cached {
            Some(raw) => {
                debug!(fingerprint = %fp, "Analysis cache hit");
                raw
            }
            None => {
                debug!(
                    fingerprint = %fp,
                    bytes = compressed.image.bytes.len(),
                    "Analysis cache miss, calling extraction service"
                );
                let raw = self.extractor.extract(&compressed.image).await?;
                if let Some(cache) = &self.cache {
                    match cache.set(&fp, &raw) {
                        Ok(()) => info!(fingerprint = %fp, "Stored extraction result in cache"),
                        Err(e) => {
                            warn!(error = %e, "Failed to store extraction result in cache");
                            cache_error.get_or_insert_with(|| e.to_string());
                        }
                    }
                }
                raw
            }
        };

        let patch = ScanPatch::from_raw(&raw);
        if let Some(flag) = &patch.review {
            info!(reason = %flag.reason, "Extraction flagged for manual review");
        }

        Ok(Ingestion {
            raw,
            patch,
            diagnostics: Diagnostics {
                fingerprint: fp,
                cache_hit,
                cache_error,
                original_bytes: compressed.original_bytes,
                compressed_bytes: compressed.image.bytes.len(),
                original_dimensions: (compressed.original_width, compressed.original_height),
                compressed_dimensions: (compressed.image.width, compressed.image.height),
                endpoint: self.extractor.endpoint().to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        })
    }
}

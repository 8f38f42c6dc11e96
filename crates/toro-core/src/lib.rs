//! Toro Core Library
//!
//! Receipt ingestion for the exchange desk:
//! - Image preprocessing (validate, downscale, re-encode)
//! - Content-addressed analysis cache (SQLite or in-memory)
//! - Pluggable extraction backends (HTTP scanner, mock)
//! - Field normalization across both response schemas
//! - Derivation rules for the transaction draft (type, USD, profit, fees)
//! - Review flagging and draft sessions

pub mod cache;
pub mod config;
pub mod derive;
pub mod error;
pub mod extraction;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod review;
pub mod session;

/// Test utilities including a mock extraction server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{fingerprint, AnalysisCache, CacheEntry, CacheStats, MemoryCache, SqliteCache};
pub use config::{CacheConfig, Config, ExtractionConfig, PreprocessConfig};
pub use derive::{apply_changes, apply_field_change, apply_quick_commission};
pub use error::{Error, Result};
pub use extraction::{
    ExtractionBackend, ExtractionClient, HttpBackend, MockBackend, RawExtractionResult, Scalar,
};
pub use models::{
    Category, Currency, DraftDefaults, DraftField, FieldValue, TransactionDraft, TransactionType,
};
pub use normalize::{normalize, NormalizedFields};
pub use pipeline::{Diagnostics, Ingestion, Ingestor, ScanPatch};
pub use preprocess::{
    compress, estimate_size, readable_size, CompressedImage, EncodedImage, ImageInput,
    OutputFormat, PreprocessOptions,
};
pub use review::{review_flag, ReviewFlag};
pub use session::{DraftSession, ScanTicket};

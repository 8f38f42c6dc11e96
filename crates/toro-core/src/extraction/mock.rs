//! Mock backend for testing
//!
//! Returns a canned extraction result (or a canned failure) and counts calls,
//! which is what the cache tests need to prove a hit skipped the service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::preprocess::EncodedImage;

use super::types::{RawExtractionResult, Scalar};
use super::ExtractionBackend;

/// Mock extraction backend
#[derive(Clone)]
pub struct MockBackend {
    response: RawExtractionResult,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Mock that answers with a Zelle payment receipt
    pub fn new() -> Self {
        Self::with_response(RawExtractionResult {
            amount: Some(Scalar::Number(1250.0)),
            currency: Some("USD".to_string()),
            reference_id: Some("REF-88772233".to_string()),
            platform: Some("ZELLE".to_string()),
            sender_name: Some("Maria Garcia".to_string()),
            raw_text_snippet: Some("Zelle payment sent".to_string()),
            ..Default::default()
        })
    }

    /// Mock that answers with the given result
    pub fn with_response(response: RawExtractionResult) -> Self {
        Self {
            response,
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mock whose calls fail as the service would on a non-success status
    pub fn failing(message: &str) -> Self {
        Self {
            response: RawExtractionResult::default(),
            failure: Some(message.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `extract` calls made so far (shared across clones)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    async fn extract(&self, _image: &EncodedImage) -> Result<RawExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(Error::ExtractionService(message.clone())),
            None => Ok(self.response.clone()),
        }
    }

    async fn health_check(&self) -> bool {
        self.failure.is_none()
    }

    fn endpoint(&self) -> &str {
        "mock://scanner"
    }
}

//! Receipt extraction service client
//!
//! The extraction service is a remote black box: it takes an uploaded receipt
//! image and answers with a loosely-typed JSON bag of fields. This module only
//! transports the image and parses the answer; interpretation happens in
//! `normalize`.
//!
//! # Architecture
//!
//! - `ExtractionBackend` trait: the interface every backend implements
//! - `ExtractionClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `HttpBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `TORO_EXTRACTION_BACKEND`: Backend to use (http, mock). Default: http
//! - `TORO_EXTRACTION_URL`: Scanner endpoint (overrides the config file)

mod http;
mod mock;
pub mod parsing;
pub mod types;

pub use http::HttpBackend;
pub use mock::MockBackend;
pub use types::*;

use async_trait::async_trait;

use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::preprocess::EncodedImage;

/// Trait defining the interface for extraction backends
///
/// Backends should be Send + Sync so a pipeline can be shared across tasks.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Upload an image and return the raw extraction result
    async fn extract(&self, image: &EncodedImage) -> Result<RawExtractionResult>;

    /// Check if the service is reachable
    async fn health_check(&self) -> bool;

    /// Endpoint the backend talks to (for logging)
    fn endpoint(&self) -> &str;
}

/// Concrete extraction client enum
#[derive(Clone)]
pub enum ExtractionClient {
    /// Remote scanner endpoint (multipart upload)
    Http(HttpBackend),
    /// Canned responses for tests and offline demos
    Mock(MockBackend),
}

impl ExtractionClient {
    /// Create a client from configuration, honouring `TORO_EXTRACTION_BACKEND`
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let backend =
            std::env::var("TORO_EXTRACTION_BACKEND").unwrap_or_else(|_| "http".to_string());

        match backend.to_lowercase().as_str() {
            "mock" => Ok(ExtractionClient::Mock(MockBackend::new())),
            "http" => HttpBackend::new(&config.url, config.timeout).map(ExtractionClient::Http),
            _ => {
                tracing::warn!(backend = %backend, "Unknown TORO_EXTRACTION_BACKEND, falling back to http");
                HttpBackend::new(&config.url, config.timeout).map(ExtractionClient::Http)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ExtractionClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl ExtractionBackend for ExtractionClient {
    async fn extract(&self, image: &EncodedImage) -> Result<RawExtractionResult> {
        match self {
            ExtractionClient::Http(b) => b.extract(image).await,
            ExtractionClient::Mock(b) => b.extract(image).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ExtractionClient::Http(b) => b.health_check().await,
            ExtractionClient::Mock(b) => b.health_check().await,
        }
    }

    fn endpoint(&self) -> &str {
        match self {
            ExtractionClient::Http(b) => b.endpoint(),
            ExtractionClient::Mock(b) => b.endpoint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_client_mock() {
        let client = ExtractionClient::mock();
        assert_eq!(client.endpoint(), "mock://scanner");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = ExtractionClient::mock();
        assert!(client.health_check().await);
    }
}

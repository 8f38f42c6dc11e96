//! HTTP backend for the scanner endpoint
//!
//! Uploads the preprocessed image as a multipart `file` part, the same shape
//! the scanner's upload form uses.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};
use crate::preprocess::EncodedImage;

use super::parsing::{parse_extraction_response, service_error_message};
use super::types::RawExtractionResult;
use super::ExtractionBackend;

/// Scanner endpoint client
///
/// The request timeout is mandatory so a stalled service cannot leave the
/// form waiting forever.
#[derive(Clone)]
pub struct HttpBackend {
    http_client: Client,
    url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a backend for the given scanner URL
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            url: url.to_string(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ExtractionBackend for HttpBackend {
    async fn extract(&self, image: &EncodedImage) -> Result<RawExtractionResult> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(format!("receipt.{}", image.format.extension()))
            .mime_str(image.format.mime_type())?;
        let form = Form::new().part("file", part);

        debug!(
            url = %self.url,
            bytes = image.bytes.len(),
            "Uploading receipt for extraction"
        );
        let started = Instant::now();

        let response = self
            .http_client
            .post(&self.url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction service responded"
        );

        if !status.is_success() {
            return Err(Error::ExtractionService(service_error_message(
                status.as_u16(),
                &body,
            )));
        }

        parse_extraction_response(&body)
    }

    async fn health_check(&self) -> bool {
        // Any HTTP answer means the service is up; only transport errors count
        self.http_client.get(&self.url).send().await.is_ok()
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::OutputFormat;
    use crate::test_utils::{MockExtractionServer, MockReply};
    use serde_json::json;

    fn image() -> EncodedImage {
        EncodedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4],
            format: OutputFormat::Jpeg,
            width: 2,
            height: 2,
        }
    }

    fn backend(server: &MockExtractionServer) -> HttpBackend {
        HttpBackend::new(&server.scanner_url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_extract_uploads_file_part() {
        let server = MockExtractionServer::start().await;
        let raw = backend(&server).extract(&image()).await.unwrap();

        assert_eq!(raw.reference_id.as_deref(), Some("REF-88772233"));
        assert_eq!(server.requests(), 1);
        let uploads = server.uploads();
        assert_eq!(uploads[0].content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(uploads[0].file_name.as_deref(), Some("receipt.jpg"));
        assert_eq!(uploads[0].size, 8);
    }

    #[tokio::test]
    async fn test_extract_tolerates_fenced_json() {
        let server = MockExtractionServer::start_with(MockReply::Text(
            "```json\n{\"monto\": \"20,50\", \"moneda\": \"Bs\"}\n```".into(),
        ))
        .await;
        let raw = backend(&server).extract(&image()).await.unwrap();
        assert_eq!(raw.moneda.as_deref(), Some("Bs"));
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let server = MockExtractionServer::start_with(MockReply::Error {
            status: 400,
            detail: Some("File type image/gif not allowed".into()),
        })
        .await;
        let err = backend(&server).extract(&image()).await.unwrap_err();
        assert!(matches!(err, Error::ExtractionService(_)));
        assert_eq!(err.to_string(), "File type image/gif not allowed");
    }

    #[tokio::test]
    async fn test_error_without_detail_is_generic() {
        let server = MockExtractionServer::start_with(MockReply::Error {
            status: 500,
            detail: None,
        })
        .await;
        let err = backend(&server).extract(&image()).await.unwrap_err();
        assert_eq!(err.to_string(), "Error al procesar la imagen. (HTTP 500)");
    }

    #[tokio::test]
    async fn test_review_fields_pass_through() {
        let server = MockExtractionServer::start_with(MockReply::Json(json!({
            "requires_manual_review": true,
            "manual_review_reason": "Monto ilegible"
        })))
        .await;
        let raw = backend(&server).extract(&image()).await.unwrap();
        assert_eq!(raw.requires_manual_review, Some(true));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockExtractionServer::start().await;
        assert!(backend(&server).health_check().await);

        let unreachable = HttpBackend::new("http://127.0.0.1:9/", Duration::from_secs(1)).unwrap();
        assert!(!unreachable.health_check().await);
    }
}

//! Integration tests for toro-core
//!
//! These tests exercise the full scan -> cache -> normalize -> draft workflow.

use std::sync::Arc;

use chrono::{Duration, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use toro_core::{
    cache::{AnalysisCache, MemoryCache, SqliteCache},
    extraction::{ExtractionClient, MockBackend, RawExtractionResult, Scalar},
    models::{DraftField, FieldValue, TransactionType},
    preprocess::{encode_as, ImageInput},
    session::DraftSession,
    Error, Ingestor,
};

/// Synthetic receipt photo, larger than the default bounding box
fn receipt_photo() -> Vec<u8> {
    let img = RgbImage::from_fn(2048, 1536, |x, y| {
        Rgb([(x / 8 % 256) as u8, (y / 6 % 256) as u8, 128])
    });
    encode_as(&DynamicImage::ImageRgb8(img), ImageFormat::Png).expect("encode test image")
}

fn data_uri(bytes: &[u8]) -> String {
    use base64::Engine;
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

// =============================================================================
// Pipeline Integration Tests
// =============================================================================

#[tokio::test]
async fn test_scan_fills_draft() {
    let ingestor = Ingestor::new(ExtractionClient::mock())
        .with_cache(Arc::new(SqliteCache::in_memory().expect("cache")));

    let ingestion = ingestor
        .ingest(&ImageInput::DataUri(data_uri(&receipt_photo())))
        .await
        .expect("ingest");

    assert_eq!(ingestion.diagnostics.original_dimensions, (2048, 1536));
    assert_eq!(ingestion.diagnostics.compressed_dimensions, (1024, 768));

    let mut session = DraftSession::default();
    let ticket = session.begin_scan();
    assert!(session.apply_scan(ticket, &ingestion.patch).unwrap());

    let draft = session.draft();
    assert_eq!(draft.bank_origin, "Zelle");
    assert_eq!(draft.reference, "REF-88772233");
    assert_eq!(draft.amount_usd, "1250.00");
    assert_eq!(draft.client, "Maria Garcia");
    assert_eq!(draft.notes, "Zelle payment sent");
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis_cache.db");
    let photo = ImageInput::Bytes(receipt_photo());

    let first_mock = MockBackend::new();
    {
        let cache = SqliteCache::open_with_key(&path, None).unwrap();
        let ingestor =
            Ingestor::new(ExtractionClient::Mock(first_mock.clone())).with_cache(Arc::new(cache));
        ingestor.ingest(&photo).await.unwrap();
    }

    let second_mock = MockBackend::new();
    let cache = SqliteCache::open_with_key(&path, None).unwrap();
    let ingestor =
        Ingestor::new(ExtractionClient::Mock(second_mock.clone())).with_cache(Arc::new(cache));
    let ingestion = ingestor.ingest(&photo).await.unwrap();

    assert_eq!(first_mock.calls(), 1);
    assert_eq!(second_mock.calls(), 0);
    assert!(ingestion.diagnostics.cache_hit);
}

#[tokio::test]
async fn test_expired_entry_triggers_new_extraction() {
    let cache = Arc::new(MemoryCache::new());
    let mock = MockBackend::new();
    let ingestor = Ingestor::new(ExtractionClient::Mock(mock.clone())).with_cache(cache.clone());
    let photo = ImageInput::Bytes(receipt_photo());

    let first = ingestor.ingest(&photo).await.unwrap();

    // Backdate the entry past the TTL
    let stale = Utc::now() - Duration::hours(25);
    cache
        .set_at(&first.diagnostics.fingerprint, &first.raw, stale)
        .unwrap();

    let second = ingestor.ingest(&photo).await.unwrap();
    assert!(!second.diagnostics.cache_hit);
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn test_outgoing_interbank_scan() {
    let mock = MockBackend::with_response(RawExtractionResult {
        monto: Some(Scalar::from("Bs. 1.000,00")),
        moneda: Some("Bs".into()),
        sender_bank: Some("BANESCO".into()),
        receiver_bank: Some("Mercantil".into()),
        referencia: Some("004455".into()),
        ..Default::default()
    });
    let ingestion = Ingestor::new(ExtractionClient::Mock(mock))
        .ingest(&ImageInput::Bytes(receipt_photo()))
        .await
        .unwrap();

    let mut session = DraftSession::default();
    session
        .edit(DraftField::Category, FieldValue::from("PAGO_PROVEEDOR"))
        .unwrap();
    let ticket = session.begin_scan();
    session.apply_scan(ticket, &ingestion.patch).unwrap();

    let draft = session.draft();
    assert_eq!(draft.tx_type, TransactionType::Salida);
    assert_eq!(draft.currency, "VES");
    assert!(draft.applies_bank_fee);
    assert_eq!(draft.commission, "30.00");
    assert_eq!(draft.amount_usd, "27.78");
}

#[tokio::test]
async fn test_flagged_scan() {
    let mock = MockBackend::with_response(RawExtractionResult {
        amount: Some(Scalar::Number(80.0)),
        requires_manual_review: Some(true),
        manual_review_reason: Some("Monto ilegible".into()),
        raw_text_snippet: Some("Pago Movil recibido".into()),
        ..Default::default()
    });
    let ingestion = Ingestor::new(ExtractionClient::Mock(mock))
        .ingest(&ImageInput::Bytes(receipt_photo()))
        .await
        .unwrap();

    let mut session = DraftSession::default();
    let ticket = session.begin_scan();
    session.apply_scan(ticket, &ingestion.patch).unwrap();

    assert!(session.draft().requires_review);
    assert!(session.draft().notes.starts_with("⚠️ REVISAR: Monto ilegible"));
}

#[tokio::test]
async fn test_reset_while_scanning_drops_result() {
    let ingestor = Ingestor::new(ExtractionClient::mock());
    let mut session = DraftSession::default();

    let photo = ImageInput::Bytes(receipt_photo());

    let ticket = session.begin_scan();
    let pending = ingestor.ingest(&photo);
    session.reset();
    let ingestion = pending.await.unwrap();

    assert!(!session.apply_scan(ticket, &ingestion.patch).unwrap());
    assert_eq!(session.draft().reference, "");
}

#[tokio::test]
async fn test_failed_extraction_leaves_draft_untouched() {
    let ingestor = Ingestor::new(ExtractionClient::Mock(MockBackend::failing(
        "Error al procesar la imagen.",
    )));
    let mut session = DraftSession::default();
    session
        .edit(DraftField::Client, FieldValue::from("Cliente Fijo"))
        .unwrap();
    let before = session.draft().clone();

    let err = ingestor
        .ingest(&ImageInput::Bytes(receipt_photo()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExtractionService(_)));
    assert_eq!(session.draft(), &before);
}

// =============================================================================
// Cache Maintenance Tests
// =============================================================================

#[test]
fn test_sweep_removes_only_expired() {
    let cache = SqliteCache::in_memory().unwrap();
    let now = Utc::now();
    let raw = RawExtractionResult::default();

    for hours in [1, 12, 23, 25, 30, 72] {
        cache
            .set_at(&format!("fp-{}", hours), &raw, now - Duration::hours(hours))
            .unwrap();
    }

    assert_eq!(cache.clean_expired_at(now).unwrap(), 3);
    let stats = cache.stats_at(now).unwrap();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.expired, 0);
}

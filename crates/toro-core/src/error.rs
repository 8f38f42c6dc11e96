//! Error types for Toro

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Image bytes could not be decoded (bad data URI, unknown format, truncated file)
    #[error("Image decode error: {0}")]
    Decode(String),

    /// The decoded image could not be rasterized or re-encoded
    #[error("Render surface unavailable: {0}")]
    RenderSurfaceUnavailable(String),

    /// Upload rejected before preprocessing (too large, unsupported type)
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Non-success response from the extraction service, message shown to the user as-is
    #[error("{0}")]
    ExtractionService(String),

    /// Local analysis cache could not be opened or queried
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

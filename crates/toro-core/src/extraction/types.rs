//! Extraction service response types
//!
//! The service has shipped two field naming schemes over time. Both are kept
//! as separate optional fields so the normalizer can decide precedence
//! explicitly instead of relying on serde aliases.

use serde::{Deserialize, Serialize};

/// A scalar the service may send either as a JSON number or as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Raw text form, numbers rendered without losing precision
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(s) => s.trim().is_empty(),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Result of analysing a receipt image, as returned by the extraction service
///
/// Every field is optional; a partially legible receipt yields a partial result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawExtractionResult {
    // Current schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_fee: Option<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text_snippet: Option<String>,

    // Legacy schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monto: Option<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moneda: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referencia: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,

    // Confidence signals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_manual_review: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_review_reason: Option<String>,

    /// Keys this version of the client does not know about
    #[serde(flatten, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Error body of a failed extraction call
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

//! JSON parsing helpers for extraction service responses
//!
//! The service normally answers with plain JSON, but older deployments relay
//! the model output verbatim, which can include markdown fences or prose
//! around the payload.

use crate::error::{Error, Result};

use super::types::{RawExtractionResult, ServiceErrorBody};

/// Message shown when a failed call carries no `detail`
pub const GENERIC_FAILURE: &str = "Error al procesar la imagen.";

/// Parse an extraction result from a response body
pub fn parse_extraction_response(body: &str) -> Result<RawExtractionResult> {
    let body = body.trim();
    let start = body.find('{');
    let end = body.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &body[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                // Truncate long responses for the error message
                let truncated = if json_str.chars().count() > 200 {
                    format!("{}...", json_str.chars().take(200).collect::<String>())
                } else {
                    json_str.to_string()
                };
                Error::InvalidData(format!(
                    "Invalid extraction JSON: {} | Raw: {}",
                    e, truncated
                ))
            })
        }
        _ => Err(Error::InvalidData(
            "No JSON found in extraction response".into(),
        )),
    }
}

/// Build the user-facing message for a non-success response
///
/// Uses the service's `detail` verbatim when present.
pub fn service_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ServiceErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("{} (HTTP {})", GENERIC_FAILURE, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::types::Scalar;

    #[test]
    fn test_parse_plain_json() {
        let raw = parse_extraction_response(r#"{"amount": 20, "currency": "VES"}"#).unwrap();
        assert_eq!(raw.amount, Some(Scalar::Number(20.0)));
    }

    #[test]
    fn test_parse_fenced_json() {
        let body = "```json\n{\"referencia\": \"123\"}\n```";
        let raw = parse_extraction_response(body).unwrap();
        assert_eq!(raw.referencia.as_deref(), Some("123"));
    }

    #[test]
    fn test_parse_without_json() {
        let err = parse_extraction_response("no receipt here").unwrap_err();
        assert!(err.to_string().contains("No JSON found"));
    }

    #[test]
    fn test_parse_invalid_json_is_truncated() {
        let body = format!("{{\"amount\": {}", "9".repeat(400));
        let body = format!("{}, }}", body);
        let err = parse_extraction_response(&body).unwrap_err();
        assert!(err.to_string().contains("..."));
    }

    #[test]
    fn test_service_error_message_uses_detail() {
        let msg = service_error_message(400, r#"{"detail": "File type image/gif not allowed"}"#);
        assert_eq!(msg, "File type image/gif not allowed");
    }

    #[test]
    fn test_service_error_message_generic() {
        assert_eq!(
            service_error_message(502, "<html>Bad gateway</html>"),
            "Error al procesar la imagen. (HTTP 502)"
        );
        assert_eq!(
            service_error_message(500, r#"{"detail": ""}"#),
            "Error al procesar la imagen. (HTTP 500)"
        );
    }
}

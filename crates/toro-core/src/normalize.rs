//! Field normalization
//!
//! Maps a raw extraction result (either naming scheme) onto canonical draft
//! values: bank names from a fixed keyword table, amounts as plain decimals,
//! currency codes in upper case. Normalization is pure and idempotent.

use regex::Regex;
use std::sync::OnceLock;

use crate::extraction::{RawExtractionResult, Scalar};
use crate::models::{Currency, DraftField, FieldValue};

/// Maximum length of the notes field, in characters
pub const NOTES_MAX_CHARS: usize = 200;

/// Keyword table for bank canonicalization, checked in order
///
/// Matching is a lower-case substring test, so "BBVA Provincial" and
/// "Banco Provincial" both land on `Provincial`.
const BANK_KEYWORDS: &[(&[&str], &str)] = &[
    (&["banesco"], "Banesco"),
    (&["mercantil"], "Mercantil"),
    (&["provincial", "bbva"], "Provincial"),
    (&["venezuela", "bdv"], "Venezuela"),
    (&["zelle"], "Zelle"),
    (&["binance"], "Binance"),
    (&["paypal"], "PayPal"),
    (&["zinli"], "Zinli"),
    (&["wally"], "Wally"),
    (&["bofa", "bank of america"], "Bank of America"),
];

/// Canonical bank name; unknown names pass through trimmed
pub fn canonical_bank(name: &str) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    BANK_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn amount_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.,\-]").expect("valid regex"))
}

/// Parse an amount as printed on a receipt
///
/// Handles currency symbols, `1,234.56` and `1.234,56`. A lone separator
/// followed by exactly three digits is read as a thousands separator, which
/// is how bolívar amounts are printed.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned = amount_noise().replace_all(text.trim(), "");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c == ',');
    if cleaned.is_empty() {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let canonical = match (last_dot, last_comma) {
        (Some(d), Some(c)) => {
            if c > d {
                // 1.234,56
                cleaned.replace('.', "").replace(',', ".")
            } else {
                // 1,234.56
                cleaned.replace(',', "")
            }
        }
        (Some(_), None) => single_separator(cleaned, '.'),
        (None, Some(_)) => single_separator(cleaned, ','),
        (None, None) => cleaned.to_string(),
    };

    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn single_separator(s: &str, sep: char) -> String {
    let parts: Vec<&str> = s.split(sep).collect();
    let is_thousands = parts.len() > 2
        || (parts.len() == 2
            && parts[1].len() == 3
            && !parts[0].is_empty()
            && parts[0].trim_start_matches('-') != "0");
    if is_thousands {
        parts.concat()
    } else {
        s.replace(sep, ".")
    }
}

/// Render a parsed amount the way the form shows typed numbers (`1250`, `20.5`)
pub fn render_amount(value: f64) -> String {
    value.to_string()
}

fn scalar_amount(value: &Scalar) -> Option<f64> {
    match value {
        Scalar::Number(n) if n.is_finite() => Some(*n),
        Scalar::Number(_) => None,
        Scalar::Text(s) => parse_amount(s),
    }
}

/// First non-blank value
fn first_text<'a>(candidates: &[Option<&'a String>]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
}

/// Cut `text` to at most `max` characters
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Canonical field values taken from one extraction result
///
/// Empty strings mean "not present on the receipt".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFields {
    pub amount: String,
    pub currency: String,
    pub reference: String,
    pub bank_origin: String,
    pub receiving_account: String,
    pub client: String,
    pub client_doc_id: String,
    pub commission: String,
    /// Breadcrumb plus receipt snippet, capped at `NOTES_MAX_CHARS`
    pub notes: String,
    /// Date as printed on the receipt (not a draft field)
    pub transaction_date: String,
}

impl NormalizedFields {
    /// Non-empty values as draft writes, notes excluded
    ///
    /// A receipt-level fee also switches the bank-fee flag on.
    pub fn entries(&self) -> Vec<(DraftField, FieldValue)> {
        let mut entries: Vec<(DraftField, FieldValue)> = [
            (DraftField::Amount, &self.amount),
            (DraftField::Currency, &self.currency),
            (DraftField::Reference, &self.reference),
            (DraftField::BankOrigin, &self.bank_origin),
            (DraftField::ReceivingAccount, &self.receiving_account),
            (DraftField::Client, &self.client),
            (DraftField::ClientDocId, &self.client_doc_id),
            (DraftField::Commission, &self.commission),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(f, v)| (f, FieldValue::Text(v.clone())))
        .collect();

        if !self.commission.is_empty() {
            entries.push((DraftField::AppliesBankFee, FieldValue::Flag(true)));
        }
        entries
    }
}

/// Normalize a raw extraction result
pub fn normalize(raw: &RawExtractionResult) -> NormalizedFields {
    let amount = raw
        .amount
        .iter()
        .chain(raw.monto.iter())
        .filter(|s| !s.is_blank())
        .find_map(scalar_amount)
        .map(render_amount)
        .unwrap_or_default();

    let currency = first_text(&[raw.currency.as_ref(), raw.moneda.as_ref()])
        .map(|c| Currency::from_code(c).as_str().to_string())
        .unwrap_or_default();

    let reference = first_text(&[raw.reference_id.as_ref(), raw.referencia.as_ref()])
        .unwrap_or_default()
        .to_string();

    let bank_origin = first_text(&[raw.sender_bank.as_ref(), raw.platform.as_ref()])
        .map(canonical_bank)
        .unwrap_or_default();

    let receiving_account = first_text(&[raw.receiver_bank.as_ref()])
        .map(canonical_bank)
        .unwrap_or_default();

    let client = first_text(&[raw.sender_name.as_ref(), raw.receiver_name.as_ref()])
        .unwrap_or_default()
        .to_string();

    let client_doc_id = first_text(&[raw.sender_doc_id.as_ref(), raw.receiver_doc_id.as_ref()])
        .unwrap_or_default()
        .to_string();

    // A zero fee counts as no fee
    let commission = raw
        .transaction_fee
        .as_ref()
        .and_then(scalar_amount)
        .filter(|fee| *fee != 0.0)
        .map(render_amount)
        .unwrap_or_default();

    let snippet = first_text(&[raw.raw_text_snippet.as_ref(), raw.raw_text.as_ref()])
        .unwrap_or_default();

    let mut notes = String::new();
    if let Some(receiver_id) = first_text(&[raw.receiver_doc_id.as_ref()]) {
        if receiver_id != client_doc_id {
            notes.push_str(&format!("ID Detectado: {}\n", receiver_id));
        }
    }
    notes.push_str(snippet);

    NormalizedFields {
        amount,
        currency,
        reference,
        bank_origin,
        receiving_account,
        client,
        client_doc_id,
        commission,
        notes: truncate_chars(&notes, NOTES_MAX_CHARS),
        transaction_date: first_text(&[raw.transaction_date.as_ref()])
            .unwrap_or_default()
            .to_string(),
    }
}

//! Data models for Toro
//!
//! The transaction draft is the form state the operator edits before a
//! transaction is submitted. All money fields are kept as decimal strings
//! because that is what the form layer renders and edits.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Inbound money
    #[default]
    Entrada,
    /// Outbound money
    Salida,
    /// Direction-neutral (currency exchange, internal transfer)
    Neutro,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entrada => "ENTRADA",
            Self::Salida => "SALIDA",
            Self::Neutro => "NEUTRO",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ENTRADA" => Ok(Self::Entrada),
            "SALIDA" => Ok(Self::Salida),
            "NEUTRO" => Ok(Self::Neutro),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

/// Kind of operation recorded by the operator
///
/// Grouped the same way the registration form groups them: treasury
/// (neutral), income and expense.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    // Treasury
    CambioDivisa,
    TransferenciaInterna,
    // Income
    Venta,
    CobroDeuda,
    InyeccionCapital,
    // Expenses
    GastoOperativo,
    PagoProveedor,
    Nomina,
    RetiroCapital,
    /// Anything the form sent that is not in the known set
    Other(String),
}

static ALL_CATEGORIES: [Category; 9] = [
    Category::CambioDivisa,
    Category::TransferenciaInterna,
    Category::Venta,
    Category::CobroDeuda,
    Category::InyeccionCapital,
    Category::GastoOperativo,
    Category::PagoProveedor,
    Category::Nomina,
    Category::RetiroCapital,
];

impl Category {
    /// All known categories (excludes `Other`)
    pub fn all() -> &'static [Category] {
        &ALL_CATEGORIES
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CambioDivisa => "CAMBIO_DIVISA",
            Self::TransferenciaInterna => "TRANSFERENCIA_INTERNA",
            Self::Venta => "VENTA",
            Self::CobroDeuda => "COBRO_DEUDA",
            Self::InyeccionCapital => "INYECCION_CAPITAL",
            Self::GastoOperativo => "GASTO_OPERATIVO",
            Self::PagoProveedor => "PAGO_PROVEEDOR",
            Self::Nomina => "NOMINA",
            Self::RetiroCapital => "RETIRO_CAPITAL",
            Self::Other(s) => s,
        }
    }

    /// Transaction type implied by this category, `None` for unknown categories
    pub fn transaction_type(&self) -> Option<TransactionType> {
        match self {
            Self::CambioDivisa | Self::TransferenciaInterna => Some(TransactionType::Neutro),
            Self::Venta | Self::CobroDeuda | Self::InyeccionCapital => {
                Some(TransactionType::Entrada)
            }
            Self::GastoOperativo | Self::PagoProveedor | Self::Nomina | Self::RetiroCapital => {
                Some(TransactionType::Salida)
            }
            Self::Other(_) => None,
        }
    }

    pub fn is_exchange(&self) -> bool {
        matches!(self, Self::CambioDivisa)
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Venta
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "CAMBIO_DIVISA" => Self::CambioDivisa,
            "TRANSFERENCIA_INTERNA" => Self::TransferenciaInterna,
            "VENTA" => Self::Venta,
            "COBRO_DEUDA" => Self::CobroDeuda,
            "INYECCION_CAPITAL" => Self::InyeccionCapital,
            "GASTO_OPERATIVO" => Self::GastoOperativo,
            "PAGO_PROVEEDOR" => Self::PagoProveedor,
            "NOMINA" => Self::Nomina,
            "RETIRO_CAPITAL" => Self::RetiroCapital,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Currency of an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Currency {
    Usd,
    Usdt,
    Eur,
    /// Venezuelan bolívar, the national currency
    Ves,
    Other(String),
}

impl Currency {
    /// Parse a currency code or the way receipts print it (`Bs.`, `$`, `€`)
    pub fn from_code(code: &str) -> Self {
        let upper = code.trim().to_uppercase();
        match upper.trim_end_matches('.') {
            "USD" | "$" | "US$" => Self::Usd,
            "USDT" => Self::Usdt,
            "EUR" | "€" => Self::Eur,
            "VES" | "VEF" | "BS" | "BS.S" | "BOLIVARES" | "BOLÍVARES" => Self::Ves,
            _ => Self::Other(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Usd => "USD",
            Self::Usdt => "USDT",
            Self::Eur => "EUR",
            Self::Ves => "VES",
            Self::Other(s) => s,
        }
    }

    /// USD and USDT amounts are already dollar-denominated
    pub fn is_dollar(&self) -> bool {
        matches!(self, Self::Usd | Self::Usdt)
    }

    pub fn is_national(&self) -> bool {
        matches!(self, Self::Ves)
    }
}

/// Draft field names, as the form layer sends them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DraftField {
    Type,
    Category,
    Operator,
    Amount,
    Currency,
    Rate,
    MarketRate,
    AmountUsd,
    Profit,
    ManualExitAmount,
    Commission,
    AppliesBankFee,
    BankOrigin,
    ReceivingAccount,
    Client,
    ClientDocId,
    Reference,
    Notes,
    RequiresReview,
    ReviewReason,
}

impl DraftField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Category => "category",
            Self::Operator => "operator",
            Self::Amount => "amount",
            Self::Currency => "currency",
            Self::Rate => "rate",
            Self::MarketRate => "marketRate",
            Self::AmountUsd => "amountUSD",
            Self::Profit => "profit",
            Self::ManualExitAmount => "manualExitAmount",
            Self::Commission => "commission",
            Self::AppliesBankFee => "appliesBankFee",
            Self::BankOrigin => "bankOrigin",
            Self::ReceivingAccount => "receivingAccount",
            Self::Client => "client",
            Self::ClientDocId => "clientDocId",
            Self::Reference => "reference",
            Self::Notes => "notes",
            Self::RequiresReview => "requiresReview",
            Self::ReviewReason => "reviewReason",
        }
    }
}

impl std::str::FromStr for DraftField {
    type Err = String;

    /// Accepts the form's camelCase names as well as snake_case
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "type" => Ok(Self::Type),
            "category" => Ok(Self::Category),
            "operator" => Ok(Self::Operator),
            "amount" => Ok(Self::Amount),
            "currency" => Ok(Self::Currency),
            "rate" => Ok(Self::Rate),
            "marketrate" => Ok(Self::MarketRate),
            "amountusd" => Ok(Self::AmountUsd),
            "profit" => Ok(Self::Profit),
            "manualexitamount" => Ok(Self::ManualExitAmount),
            "commission" => Ok(Self::Commission),
            "appliesbankfee" => Ok(Self::AppliesBankFee),
            "bankorigin" => Ok(Self::BankOrigin),
            "receivingaccount" => Ok(Self::ReceivingAccount),
            "client" => Ok(Self::Client),
            "clientdocid" => Ok(Self::ClientDocId),
            "reference" => Ok(Self::Reference),
            "notes" => Ok(Self::Notes),
            "requiresreview" => Ok(Self::RequiresReview),
            "reviewreason" => Ok(Self::ReviewReason),
            _ => Err(format!("Unknown draft field: {}", s)),
        }
    }
}

impl std::fmt::Display for DraftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value written into a draft field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Flag(_) => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

/// Session-start values for a new draft
#[derive(Debug, Clone, PartialEq)]
pub struct DraftDefaults {
    pub operator: String,
    pub currency: String,
    pub rate: String,
    pub category: Category,
}

impl Default for DraftDefaults {
    fn default() -> Self {
        Self {
            operator: "Camello_1".to_string(),
            currency: "USD".to_string(),
            rate: "36.00".to_string(),
            category: Category::Venta,
        }
    }
}

/// Working record pre-filled by a scan and edited by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub category: Category,
    pub operator: String,
    pub amount: String,
    pub currency: String,
    pub rate: String,
    pub market_rate: String,
    #[serde(rename = "amountUSD")]
    pub amount_usd: String,
    pub profit: String,
    pub manual_exit_amount: String,
    pub commission: String,
    pub applies_bank_fee: bool,
    pub bank_origin: String,
    pub receiving_account: String,
    pub client: String,
    pub client_doc_id: String,
    pub reference: String,
    pub notes: String,
    pub requires_review: bool,
    pub review_reason: String,
}

impl Default for TransactionDraft {
    fn default() -> Self {
        Self::with_defaults(&DraftDefaults::default())
    }
}

impl TransactionDraft {
    /// Fresh draft for a new scan session
    pub fn with_defaults(defaults: &DraftDefaults) -> Self {
        let tx_type = defaults
            .category
            .transaction_type()
            .unwrap_or(TransactionType::Entrada);
        Self {
            tx_type,
            category: defaults.category.clone(),
            operator: defaults.operator.clone(),
            amount: String::new(),
            currency: defaults.currency.clone(),
            rate: defaults.rate.clone(),
            market_rate: String::new(),
            amount_usd: String::new(),
            profit: String::new(),
            manual_exit_amount: String::new(),
            commission: String::new(),
            applies_bank_fee: false,
            bank_origin: String::new(),
            receiving_account: String::new(),
            client: String::new(),
            client_doc_id: String::new(),
            reference: String::new(),
            notes: String::new(),
            requires_review: false,
            review_reason: String::new(),
        }
    }

    /// Read a field as a `FieldValue`
    pub fn get(&self, field: DraftField) -> FieldValue {
        match field {
            DraftField::Type => FieldValue::Text(self.tx_type.as_str().to_string()),
            DraftField::Category => FieldValue::Text(self.category.as_str().to_string()),
            DraftField::AppliesBankFee => FieldValue::Flag(self.applies_bank_fee),
            DraftField::RequiresReview => FieldValue::Flag(self.requires_review),
            other => FieldValue::Text(self.text_field(other).cloned().unwrap_or_default()),
        }
    }

    /// Write a field without running any derivation
    pub fn set(&mut self, field: DraftField, value: FieldValue) -> Result<()> {
        match (field, value) {
            (DraftField::AppliesBankFee, FieldValue::Flag(b)) => self.applies_bank_fee = b,
            (DraftField::RequiresReview, FieldValue::Flag(b)) => self.requires_review = b,
            (DraftField::AppliesBankFee | DraftField::RequiresReview, FieldValue::Text(s)) => {
                let flag = parse_flag(&s).ok_or_else(|| {
                    Error::InvalidData(format!("{} expects true/false, got '{}'", field, s))
                })?;
                self.set(field, FieldValue::Flag(flag))?;
            }
            (DraftField::Type, FieldValue::Text(s)) => {
                self.tx_type = s.parse().map_err(Error::InvalidData)?;
            }
            (DraftField::Category, FieldValue::Text(s)) => {
                self.category = Category::from(s.as_str());
            }
            (other, FieldValue::Text(s)) => match self.text_field_mut(other) {
                Some(slot) => *slot = s,
                None => {
                    return Err(Error::InvalidData(format!(
                        "{} cannot hold a text value",
                        other
                    )))
                }
            },
            (other, FieldValue::Flag(_)) => {
                return Err(Error::InvalidData(format!(
                    "{} cannot hold a boolean value",
                    other
                )))
            }
        }
        Ok(())
    }

    fn text_field(&self, field: DraftField) -> Option<&String> {
        Some(match field {
            DraftField::Operator => &self.operator,
            DraftField::Amount => &self.amount,
            DraftField::Currency => &self.currency,
            DraftField::Rate => &self.rate,
            DraftField::MarketRate => &self.market_rate,
            DraftField::AmountUsd => &self.amount_usd,
            DraftField::Profit => &self.profit,
            DraftField::ManualExitAmount => &self.manual_exit_amount,
            DraftField::Commission => &self.commission,
            DraftField::BankOrigin => &self.bank_origin,
            DraftField::ReceivingAccount => &self.receiving_account,
            DraftField::Client => &self.client,
            DraftField::ClientDocId => &self.client_doc_id,
            DraftField::Reference => &self.reference,
            DraftField::Notes => &self.notes,
            DraftField::ReviewReason => &self.review_reason,
            _ => return None,
        })
    }

    fn text_field_mut(&mut self, field: DraftField) -> Option<&mut String> {
        Some(match field {
            DraftField::Operator => &mut self.operator,
            DraftField::Amount => &mut self.amount,
            DraftField::Currency => &mut self.currency,
            DraftField::Rate => &mut self.rate,
            DraftField::MarketRate => &mut self.market_rate,
            DraftField::AmountUsd => &mut self.amount_usd,
            DraftField::Profit => &mut self.profit,
            DraftField::ManualExitAmount => &mut self.manual_exit_amount,
            DraftField::Commission => &mut self.commission,
            DraftField::BankOrigin => &mut self.bank_origin,
            DraftField::ReceivingAccount => &mut self.receiving_account,
            DraftField::Client => &mut self.client,
            DraftField::ClientDocId => &mut self.client_doc_id,
            DraftField::Reference => &mut self.reference,
            DraftField::Notes => &mut self.notes,
            DraftField::ReviewReason => &mut self.review_reason,
            _ => return None,
        })
    }

    pub fn currency(&self) -> Currency {
        Currency::from_code(&self.currency)
    }

    /// Counter-value preview shown under the amount (`amount * rate`)
    ///
    /// Also the suggested `manualExitAmount` for exchange operations.
    pub fn counter_value(&self) -> String {
        let amount = parse_decimal(&self.amount).unwrap_or(0.0);
        let rate = parse_decimal(&self.rate).unwrap_or(0.0);
        format_money(amount * rate)
    }
}

/// Parse a decimal string as typed in the form (`"1250"`, `"36.5"`)
///
/// Returns `None` for empty or non-numeric input.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Format a money value with two decimals
pub fn format_money(value: f64) -> String {
    format!("{:.2}", value)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "si" | "sí" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_maps_to_a_type() {
        for category in Category::all() {
            let tx_type = category.transaction_type();
            assert!(
                matches!(
                    tx_type,
                    Some(TransactionType::Entrada)
                        | Some(TransactionType::Salida)
                        | Some(TransactionType::Neutro)
                ),
                "{} has no type",
                category
            );
        }
    }

    #[test]
    fn test_category_round_trip_and_unknown() {
        for category in Category::all() {
            assert_eq!(&Category::from(category.as_str()), category);
        }
        let other = Category::from("DONACION");
        assert_eq!(other, Category::Other("DONACION".to_string()));
        assert_eq!(other.transaction_type(), None);
    }

    #[test]
    fn test_currency_aliases() {
        assert_eq!(Currency::from_code("Bs."), Currency::Ves);
        assert_eq!(Currency::from_code("bolivares"), Currency::Ves);
        assert_eq!(Currency::from_code("usdt"), Currency::Usdt);
        assert!(Currency::from_code("USDT").is_dollar());
        assert!(!Currency::from_code("EUR").is_dollar());
        assert_eq!(Currency::from_code("cop").as_str(), "COP");
    }

    #[test]
    fn test_draft_field_names() {
        assert_eq!("marketRate".parse::<DraftField>(), Ok(DraftField::MarketRate));
        assert_eq!("market_rate".parse::<DraftField>(), Ok(DraftField::MarketRate));
        assert_eq!("amountUSD".parse::<DraftField>(), Ok(DraftField::AmountUsd));
        assert!("nonsense".parse::<DraftField>().is_err());
    }

    #[test]
    fn test_default_draft() {
        let draft = TransactionDraft::default();
        assert_eq!(draft.tx_type, TransactionType::Entrada);
        assert_eq!(draft.category, Category::Venta);
        assert_eq!(draft.rate, "36.00");
        assert_eq!(draft.operator, "Camello_1");
        assert!(!draft.applies_bank_fee);
    }

    #[test]
    fn test_set_rejects_mismatched_values() {
        let mut draft = TransactionDraft::default();
        assert!(draft.set(DraftField::Amount, FieldValue::Flag(true)).is_err());
        assert!(draft
            .set(DraftField::AppliesBankFee, FieldValue::from("maybe"))
            .is_err());
        draft
            .set(DraftField::AppliesBankFee, FieldValue::from("true"))
            .unwrap();
        assert!(draft.applies_bank_fee);
        assert!(draft.set(DraftField::Type, FieldValue::from("LATERAL")).is_err());
    }

    #[test]
    fn test_draft_json_uses_form_names() {
        let draft = TransactionDraft::default();
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["type"], "ENTRADA");
        assert_eq!(json["category"], "VENTA");
        assert!(json.get("amountUSD").is_some());
        assert!(json.get("appliesBankFee").is_some());
    }

    #[test]
    fn test_counter_value() {
        let mut draft = TransactionDraft::default();
        draft.amount = "100".to_string();
        draft.rate = "36.5".to_string();
        assert_eq!(draft.counter_value(), "3650.00");
    }
}

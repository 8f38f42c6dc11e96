//! Derived draft fields
//!
//! Every edit is applied as `(field, value)` and then an ordered list of
//! rules runs over the result. Each rule sees the draft as it was before the
//! edit and the set of fields that changed, so it can react only to its own
//! inputs and to conditions that have just become true.
//!
//! Rules, in order:
//! 1. `category_type` - category decides ENTRADA / SALIDA / NEUTRO
//! 2. `usd_equivalent` - `amountUSD` from amount, rate and currency
//! 3. `spread_profit` - `profit` for currency exchanges
//! 4. `outgoing_bank_fee` - 3% fee on national interbank outgoing transfers
//! 5. `bank_fee_toggle` - turning the fee off zeroes the commission

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    format_money, parse_decimal, DraftField, FieldValue, TransactionDraft, TransactionType,
};

/// Fee applied by the outgoing interbank rule
pub const OUTGOING_BANK_FEE_PCT: f64 = 3.0;

/// Percentages offered as one-click commission shortcuts
pub const QUICK_COMMISSION_PCTS: [f64; 3] = [0.3, 1.5, 3.0];

/// An edit as seen by the rules
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    /// Draft before the edit
    pub before: &'a TransactionDraft,
    /// Fields written by the edit
    pub changed: &'a [DraftField],
}

impl Transition<'_> {
    fn touched(&self, fields: &[DraftField]) -> bool {
        self.changed.iter().any(|f| fields.contains(f))
    }
}

pub type Rule = fn(&Transition<'_>, TransactionDraft) -> TransactionDraft;

/// Derivation rules in execution order
pub const RULES: &[(&str, Rule)] = &[
    ("category_type", category_type as Rule),
    ("usd_equivalent", usd_equivalent as Rule),
    ("spread_profit", spread_profit as Rule),
    ("outgoing_bank_fee", outgoing_bank_fee as Rule),
    ("bank_fee_toggle", bank_fee_toggle as Rule),
];

/// Apply one edit and run the derivation rules
pub fn apply_field_change(
    draft: &TransactionDraft,
    field: DraftField,
    value: FieldValue,
) -> Result<TransactionDraft> {
    apply_changes(draft, &[(field, value)])
}

/// Apply several edits as one transition (used when merging a scan)
pub fn apply_changes(
    draft: &TransactionDraft,
    changes: &[(DraftField, FieldValue)],
) -> Result<TransactionDraft> {
    let mut next = draft.clone();
    for (field, value) in changes {
        next.set(*field, value.clone())?;
    }
    let changed: Vec<DraftField> = changes.iter().map(|(f, _)| *f).collect();
    Ok(run_rules(draft, &changed, next))
}

/// Run every rule over `after`
pub fn run_rules(
    before: &TransactionDraft,
    changed: &[DraftField],
    after: TransactionDraft,
) -> TransactionDraft {
    let transition = Transition { before, changed };
    RULES.iter().fold(after, |draft, (name, rule)| {
        let previous = draft.clone();
        let next = rule(&transition, draft);
        if next != previous {
            debug!(rule = %name, "Derivation rule updated draft");
        }
        next
    })
}

/// Commission shortcut: `commission = amount * pct / 100`
pub fn apply_quick_commission(draft: &TransactionDraft, pct: f64) -> Result<TransactionDraft> {
    if !QUICK_COMMISSION_PCTS.contains(&pct) {
        return Err(Error::InvalidData(format!(
            "Unsupported commission shortcut {}%, expected one of 0.3, 1.5, 3",
            pct
        )));
    }
    let mut next = draft.clone();
    next.commission = percent_of(&draft.amount, pct);
    Ok(next)
}

fn percent_of(amount: &str, pct: f64) -> String {
    format_money(parse_decimal(amount).unwrap_or(0.0) * pct / 100.0)
}

fn category_type(t: &Transition<'_>, mut draft: TransactionDraft) -> TransactionDraft {
    if t.touched(&[DraftField::Category]) {
        if let Some(tx_type) = draft.category.transaction_type() {
            draft.tx_type = tx_type;
        }
    }
    draft
}

fn usd_equivalent(t: &Transition<'_>, mut draft: TransactionDraft) -> TransactionDraft {
    if !t.touched(&[DraftField::Amount, DraftField::Rate, DraftField::Currency]) {
        return draft;
    }
    // Needs both a numeric amount and a non-zero rate, even for dollar amounts
    let (Some(amount), Some(rate)) = (
        parse_decimal(&draft.amount),
        parse_decimal(&draft.rate).filter(|r| *r != 0.0),
    ) else {
        return draft;
    };

    draft.amount_usd = if draft.currency().is_dollar() {
        format_money(amount)
    } else {
        format_money(amount / rate)
    };
    draft
}

fn spread_profit(t: &Transition<'_>, mut draft: TransactionDraft) -> TransactionDraft {
    if !draft.category.is_exchange()
        || !t.touched(&[
            DraftField::Amount,
            DraftField::Rate,
            DraftField::MarketRate,
            DraftField::Category,
        ])
    {
        return draft;
    }

    if let (Some(amount), Some(rate), Some(market)) = (
        parse_decimal(&draft.amount),
        parse_decimal(&draft.rate),
        parse_decimal(&draft.market_rate),
    ) {
        draft.profit = format_money(amount * (rate - market).abs());
    }
    draft
}

/// National-currency outgoing transfer between two different banks
pub fn is_interbank_national_outgoing(draft: &TransactionDraft) -> bool {
    let origin = draft.bank_origin.trim();
    let destination = draft.receiving_account.trim();
    draft.tx_type == TransactionType::Salida
        && draft.currency().is_national()
        && !origin.is_empty()
        && !destination.is_empty()
        && origin.to_lowercase() != destination.to_lowercase()
}

fn outgoing_bank_fee(t: &Transition<'_>, mut draft: TransactionDraft) -> TransactionDraft {
    // Fires once, when the condition goes from false to true
    if !is_interbank_national_outgoing(t.before) && is_interbank_national_outgoing(&draft) {
        draft.applies_bank_fee = true;
        draft.commission = percent_of(&draft.amount, OUTGOING_BANK_FEE_PCT);
    }
    draft
}

fn bank_fee_toggle(t: &Transition<'_>, mut draft: TransactionDraft) -> TransactionDraft {
    if t.touched(&[DraftField::AppliesBankFee])
        && t.before.applies_bank_fee
        && !draft.applies_bank_fee
    {
        draft.commission = format_money(0.0);
    }
    draft
}

//! Draft session state
//!
//! A session owns the draft the operator is filling in. Scans are merged
//! into it without clobbering anything the operator typed, and every reset
//! bumps a generation counter so a scan that finishes after a reset is
//! dropped instead of repopulating the cleared form.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::derive::{apply_changes, apply_field_change, apply_quick_commission};
use crate::error::Result;
use crate::models::{DraftDefaults, DraftField, FieldValue, TransactionDraft};
use crate::pipeline::ScanPatch;

/// Handle for one in-flight scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTicket {
    generation: u64,
}

impl ScanTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The draft being edited plus its edit history
#[derive(Debug, Clone)]
pub struct DraftSession {
    draft: TransactionDraft,
    defaults: DraftDefaults,
    generation: u64,
    user_edited: BTreeSet<DraftField>,
}

impl Default for DraftSession {
    fn default() -> Self {
        Self::new(DraftDefaults::default())
    }
}

impl DraftSession {
    pub fn new(defaults: DraftDefaults) -> Self {
        Self {
            draft: TransactionDraft::with_defaults(&defaults),
            defaults,
            generation: 0,
            user_edited: BTreeSet::new(),
        }
    }

    pub fn draft(&self) -> &TransactionDraft {
        &self.draft
    }

    pub fn defaults(&self) -> &DraftDefaults {
        &self.defaults
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the operator has typed into `field` since the last reset
    pub fn is_user_edited(&self, field: DraftField) -> bool {
        self.user_edited.contains(&field)
    }

    /// Start a scan against the current generation
    pub fn begin_scan(&self) -> ScanTicket {
        ScanTicket {
            generation: self.generation,
        }
    }

    /// Merge a scan result into the draft
    ///
    /// Returns `false` when the ticket is stale (the draft was reset while the
    /// scan was in flight); the draft is left untouched in that case.
    pub fn apply_scan(&mut self, ticket: ScanTicket, patch: &ScanPatch) -> Result<bool> {
        if ticket.generation != self.generation {
            warn!(
                ticket = ticket.generation,
                current = self.generation,
                "Dropping scan result for a reset draft"
            );
            return Ok(false);
        }

        let scanned = patch.changes();
        let total = scanned.len();
        let mut changes: Vec<(DraftField, FieldValue)> = scanned
            .into_iter()
            .filter(|(field, _)| !self.keeps_operator_value(*field))
            .collect();
        let skipped = total - changes.len();
        if skipped > 0 {
            debug!(skipped, "Kept operator edits over scanned values");
        }
        changes.extend(patch.review_changes());

        self.draft = apply_changes(&self.draft, &changes)?;
        Ok(true)
    }

    /// Whether a scanned value must not replace what the operator typed
    ///
    /// An edited field that is back at its session-start value can be filled.
    fn keeps_operator_value(&self, field: DraftField) -> bool {
        self.user_edited.contains(&field)
            && self.draft.get(field) != TransactionDraft::with_defaults(&self.defaults).get(field)
    }

    /// Apply an operator edit and run the derivation rules
    pub fn edit(&mut self, field: DraftField, value: FieldValue) -> Result<&TransactionDraft> {
        self.draft = apply_field_change(&self.draft, field, value)?;
        self.user_edited.insert(field);
        Ok(&self.draft)
    }

    /// Apply a commission shortcut (0.3, 1.5 or 3 percent)
    pub fn quick_commission(&mut self, pct: f64) -> Result<&TransactionDraft> {
        self.draft = apply_quick_commission(&self.draft, pct)?;
        self.user_edited.insert(DraftField::Commission);
        Ok(&self.draft)
    }

    /// Clear the draft (explicit clear or after submission)
    ///
    /// Any scan started before the reset is invalidated.
    pub fn reset(&mut self) {
        self.draft = TransactionDraft::with_defaults(&self.defaults);
        self.user_edited.clear();
        self.generation += 1;
    }

    /// Hand the finished draft over for submission and start a fresh one
    pub fn submit(&mut self) -> TransactionDraft {
        let submitted = self.draft.clone();
        self.reset();
        submitted
    }
}

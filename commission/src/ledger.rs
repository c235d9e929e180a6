//! Ledger application
//!
//! Each credit is read-classify-write inside a [`LedgerTxn`]: the entry, the
//! wallet credit, the window totals and the rolling counters commit together
//! or not at all.

use chrono::{DateTime, Utc};
use tracing::debug;
use upline_core::{EntryStatus, LedgerEntry, MemberId, Result};
use upline_storage::{LedgerTxn, Store, TxResult};

use crate::calculator::CommissionCredit;
use crate::limits::EarningLimitChecker;

pub struct LedgerApplier<'a> {
    checker: &'a EarningLimitChecker,
}

impl<'a> LedgerApplier<'a> {
    pub fn new(checker: &'a EarningLimitChecker) -> Self {
        Self { checker }
    }

    /// Apply one credit inside the caller's transaction
    pub fn apply_credit(
        &self,
        txn: &LedgerTxn<'_>,
        credit: &CommissionCredit,
        reference: &str,
        source: Option<&MemberId>,
        at: DateTime<Utc>,
    ) -> TxResult<LedgerEntry> {
        let member = txn.require_member(&credit.recipient)?;
        let capped = credit.category.is_capped();
        let status = if capped {
            self.checker.classify_in(txn, &member, credit.amount, at)?
        } else {
            EntryStatus::Paid
        };

        let mut entry = LedgerEntry::new(
            credit.recipient.clone(),
            credit.amount,
            credit.category,
            status,
            reference,
            at,
        );
        if let Some(source) = source {
            entry = entry
                .with_description(credit.describe(source))
                .with_source(source.clone());
        }

        txn.post_entry(&entry)?;
        Ok(entry)
    }

    /// Apply credits one transaction each. A failure stops the batch; credits
    /// already applied stay applied.
    pub fn apply_batch(
        &self,
        store: &Store,
        credits: &[CommissionCredit],
        reference: &str,
        source: Option<&MemberId>,
        at: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        let mut applied = Vec::with_capacity(credits.len());
        for credit in credits {
            let entry =
                store.transaction(|txn| self.apply_credit(txn, credit, reference, source, at))?;
            debug!(
                "[LEDGER] {} {} {} to {}",
                entry.status, entry.category, entry.amount, entry.recipient
            );
            applied.push(entry);
        }
        Ok(applied)
    }
}

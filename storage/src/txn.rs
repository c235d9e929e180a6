//! Scoped ledger transaction
//!
//! Every wallet mutation goes through a [`LedgerTxn`]. The closure passed to
//! [`crate::Store::transaction`] either returns `Ok` and all of its writes
//! commit together, or returns `Err` and none of them do. sled re-runs the
//! closure on write conflicts, so two writers touching the same member record
//! are serialized.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use upline_core::{Amount, CommissionError, EntryStatus, LedgerEntry, Member, MemberId};

use crate::error::StorageError;
use crate::keys;
use crate::records::{DistributionRecord, PoolDistribution, PoolKind, PoolState};

pub type TxResult<T> = Result<T, ConflictableTransactionError<CommissionError>>;

/// Abort the surrounding transaction with a domain error
pub fn abort<T>(err: CommissionError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

pub struct LedgerTxn<'a> {
    tree: &'a TransactionalTree,
}

impl<'a> LedgerTxn<'a> {
    pub(crate) fn new(tree: &'a TransactionalTree) -> Self {
        Self { tree }
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> TxResult<Option<T>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => bincode::deserialize(&bytes).map(Some).or_else(|source| {
                abort(
                    StorageError::Decode {
                        key: key.to_string(),
                        source,
                    }
                    .into(),
                )
            }),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> TxResult<()> {
        let bytes = match bincode::serialize(value) {
            Ok(b) => b,
            Err(source) => {
                return abort(
                    StorageError::Encode {
                        key: key.to_string(),
                        source,
                    }
                    .into(),
                )
            }
        };
        self.tree.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    // ---------- members ----------

    pub fn member(&self, id: &MemberId) -> TxResult<Option<Member>> {
        self.get(&keys::member(id))
    }

    pub fn require_member(&self, id: &MemberId) -> TxResult<Member> {
        match self.member(id)? {
            Some(m) => Ok(m),
            None => abort(CommissionError::UnknownMember(id.to_string())),
        }
    }

    pub fn put_member(&self, member: &Member) -> TxResult<()> {
        self.put(&keys::member(&member.id), member)
    }

    // ---------- ledger ----------

    pub fn entry(&self, id: &str) -> TxResult<Option<LedgerEntry>> {
        self.get(&keys::entry(id))
    }

    /// Write an entry and keep the held index in step with its status
    fn write_entry(&self, entry: &LedgerEntry) -> TxResult<()> {
        self.put(&keys::entry(&entry.id), entry)?;
        let held_key = keys::held(&entry.id);
        if entry.status == EntryStatus::Held {
            self.tree
                .insert(held_key.as_bytes(), entry.recipient.as_str().as_bytes())?;
        } else {
            self.tree.remove(held_key.as_bytes())?;
        }
        Ok(())
    }

    /// Append a new entry. A PAID entry credits the recipient's wallet and
    /// counts against their earning windows in the same transaction; HELD and
    /// BURNED entries leave both untouched. Returns the recipient record as
    /// written.
    pub fn post_entry(&self, entry: &LedgerEntry) -> TxResult<Member> {
        if self.entry(&entry.id)?.is_some() {
            return abort(CommissionError::Validation(format!(
                "ledger entry {} already exists",
                entry.id
            )));
        }
        let mut member = self.require_member(&entry.recipient)?;
        self.write_entry(entry)?;
        if entry.status == EntryStatus::Paid {
            member.wallet.credit(entry.category, entry.amount);
            let paid_at = entry.processed_at.unwrap_or(entry.created_at);
            self.count_paid(&mut member, entry.amount, paid_at)?;
            self.put_member(&member)?;
        }
        Ok(member)
    }

    /// HELD -> PAID and credit the wallet. Already-PAID entries are a no-op
    /// returning `None`, which keeps release jobs idempotent.
    pub fn release_entry(
        &self,
        id: &str,
        note: &str,
        at: DateTime<Utc>,
    ) -> TxResult<Option<LedgerEntry>> {
        let mut entry = match self.entry(id)? {
            Some(e) => e,
            None => return abort(CommissionError::EntryNotFound(id.to_string())),
        };
        if entry.status == EntryStatus::Paid {
            return Ok(None);
        }
        entry
            .release(note, at)
            .map_err(ConflictableTransactionError::Abort)?;

        let mut member = self.require_member(&entry.recipient)?;
        member.wallet.credit(entry.category, entry.amount);
        self.count_paid(&mut member, entry.amount, at)?;
        self.put_member(&member)?;
        self.write_entry(&entry)?;
        Ok(Some(entry))
    }

    /// HELD -> BURNED. The wallet is not touched.
    pub fn burn_entry(&self, id: &str, reason: &str, at: DateTime<Utc>) -> TxResult<LedgerEntry> {
        let mut entry = match self.entry(id)? {
            Some(e) => e,
            None => return abort(CommissionError::EntryNotFound(id.to_string())),
        };
        entry
            .burn(reason, at)
            .map_err(ConflictableTransactionError::Abort)?;
        self.write_entry(&entry)?;
        Ok(entry)
    }

    // ---------- earning windows ----------

    /// PAID total already counted against a cap window
    pub fn window_total(&self, member: &MemberId, period: &str) -> TxResult<Amount> {
        Ok(self
            .get::<Amount>(&keys::window(member, period))?
            .unwrap_or_default())
    }

    /// Count PAID money against the day and month it is paid in, both the
    /// persisted windows and the wallet's rolling counters. The caller writes
    /// the member back.
    fn count_paid(&self, member: &mut Member, amount: Amount, at: DateTime<Utc>) -> TxResult<()> {
        self.add_to_window(&member.id, &keys::day_window(at), amount)?;
        self.add_to_window(&member.id, &keys::month_window(at), amount)?;
        member.wallet.daily_earnings += amount;
        member.wallet.monthly_earnings += amount;
        Ok(())
    }

    pub fn add_to_window(&self, member: &MemberId, period: &str, amount: Amount) -> TxResult<Amount> {
        let total = self.window_total(member, period)? + amount;
        self.put(&keys::window(member, period), &total)?;
        Ok(total)
    }

    // ---------- distribution log ----------

    pub fn distribution(&self, reference: &str) -> TxResult<Option<DistributionRecord>> {
        self.get(&keys::distribution(reference))
    }

    /// Uniqueness-constrained insert; a second writer for the same reference
    /// aborts with `AlreadyDistributed`.
    pub fn insert_distribution(&self, record: &DistributionRecord) -> TxResult<()> {
        if self.distribution(&record.reference)?.is_some() {
            return abort(CommissionError::AlreadyDistributed(record.reference.clone()));
        }
        self.put(&keys::distribution(&record.reference), record)
    }

    // ---------- pools ----------

    pub fn pool(&self, kind: PoolKind) -> TxResult<PoolState> {
        Ok(self.get(kind.key())?.unwrap_or_default())
    }

    pub fn put_pool(&self, kind: PoolKind, state: &PoolState) -> TxResult<()> {
        self.put(kind.key(), state)
    }

    pub fn add_to_pool(&self, kind: PoolKind, amount: Amount, at: DateTime<Utc>) -> TxResult<PoolState> {
        let mut state = self.pool(kind)?;
        state.total += amount;
        state.updated_at = Some(at);
        self.put_pool(kind, &state)?;
        Ok(state)
    }

    pub fn record_pool_distribution(&self, record: &PoolDistribution) -> TxResult<()> {
        self.put(&keys::pool_distribution(record.created_at, &record.id), record)
    }

    // ---------- job markers ----------

    /// Mark a scheduled job window as done. Returns false if it already was.
    pub fn mark_job(&self, marker: &str, at: DateTime<Utc>) -> TxResult<bool> {
        let key = keys::job(marker);
        if self.get::<DateTime<Utc>>(&key)?.is_some() {
            return Ok(false);
        }
        self.put(&key, &at)?;
        Ok(true)
    }
}

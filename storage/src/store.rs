//! Sled-based persistence for the commission ledger

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sled::transaction::TransactionError;
use std::path::Path;
use tracing::{debug, info};
use upline_core::{Amount, HeldFilter, LedgerEntry, Member, MemberDirectory, MemberId};

use crate::error::{Result, StorageError};
use crate::keys;
use crate::records::{DistributionRecord, PoolDistribution, PoolKind, PoolState};
use crate::txn::{LedgerTxn, TxResult};

/// Which wallet rolling counter a reset targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingCounter {
    Daily,
    Monthly,
}

#[derive(Debug, Clone)]
pub struct Store {
    db: sled::Db,
}

impl Store {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(&path).map_err(|source| StorageError::Open {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        info!("[STORE] Opened ledger at {}", path.as_ref().display());
        Ok(Self { db })
    }

    /// In-memory database that is discarded on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(StorageError::sled("Failed to open temporary db"))?;
        Ok(Self { db })
    }

    /// Run `f` as one atomic unit: every write commits, or none does.
    ///
    /// The closure may run more than once when sled detects a conflicting
    /// concurrent writer, so it must not have side effects outside `txn`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&LedgerTxn<'_>) -> TxResult<T>,
    {
        self.db
            .transaction(|tree| f(&LedgerTxn::new(tree)))
            .map_err(|e| match e {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(source) => StorageError::Sled {
                    context: "Transaction failed".into(),
                    source,
                }
                .into(),
            })
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(StorageError::sled("Failed to flush ledger"))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let data = self
            .db
            .get(key.as_bytes())
            .map_err(StorageError::sled(format!("Failed to load {}", key)))?;
        match data {
            Some(data) => {
                let value = bincode::deserialize(&data).map_err(|source| StorageError::Decode {
                    key: key.to_string(),
                    source,
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, value) =
                item.map_err(StorageError::sled(format!("Failed to scan {}", prefix)))?;
            let decoded = bincode::deserialize(&value).map_err(|source| StorageError::Decode {
                key: String::from_utf8_lossy(&key).into_owned(),
                source,
            })?;
            values.push(decoded);
        }
        Ok(values)
    }

    // ---------- members ----------

    /// Insert or update a member profile. An existing wallet is kept: wallet
    /// state only changes through ledger entries.
    pub fn upsert_member(&self, member: &Member) -> Result<()> {
        self.transaction(|txn| {
            let mut record = member.clone();
            if let Some(existing) = txn.member(&member.id)? {
                record.wallet = existing.wallet;
            }
            txn.put_member(&record)
        })
    }

    /// Zero one rolling counter on every member, one transaction per member
    /// so concurrent credits are never overwritten.
    pub fn reset_rolling(&self, counter: RollingCounter) -> Result<usize> {
        let mut reset = 0;
        for member in self.members()? {
            let changed = self.transaction(|txn| {
                let mut m = match txn.member(&member.id)? {
                    Some(m) => m,
                    None => return Ok(false),
                };
                let slot = match counter {
                    RollingCounter::Daily => &mut m.wallet.daily_earnings,
                    RollingCounter::Monthly => &mut m.wallet.monthly_earnings,
                };
                if slot.is_zero() {
                    return Ok(false);
                }
                *slot = Amount::ZERO;
                txn.put_member(&m)?;
                Ok(true)
            })?;
            if changed {
                reset += 1;
            }
        }
        debug!("[STORE] Reset {:?} counter on {} members", counter, reset);
        Ok(reset)
    }

    // ---------- ledger ----------

    pub fn entry(&self, id: &str) -> Result<Option<LedgerEntry>> {
        self.get(&keys::entry(id))
    }

    /// Full ledger, oldest first
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self.scan(keys::ENTRY_PREFIX)?;
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    pub fn entries_for(&self, recipient: &MemberId) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.recipient == *recipient)
            .collect())
    }

    /// HELD entries matching `filter`, oldest first. Uses the held index, so
    /// PAID history is never read.
    pub fn held_entries(&self, filter: &HeldFilter) -> Result<Vec<LedgerEntry>> {
        let mut held = Vec::new();
        for item in self.db.scan_prefix(keys::HELD_PREFIX.as_bytes()) {
            let (key, recipient) = item.map_err(StorageError::sled("Failed to scan held index"))?;
            if let Some(wanted) = &filter.recipient {
                if recipient.as_ref() != wanted.as_str().as_bytes() {
                    continue;
                }
            }
            let id = String::from_utf8_lossy(&key[keys::HELD_PREFIX.len()..]).to_string();
            if let Some(entry) = self.entry(&id)? {
                if filter.matches(&entry) {
                    held.push(entry);
                }
            }
        }
        held.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(held)
    }

    // ---------- distribution log ----------

    pub fn distribution(&self, reference: &str) -> Result<Option<DistributionRecord>> {
        self.get(&keys::distribution(reference))
    }

    pub fn distributions(&self) -> Result<Vec<DistributionRecord>> {
        self.scan(keys::DISTRIBUTION_PREFIX)
    }

    // ---------- pools ----------

    pub fn pool(&self, kind: PoolKind) -> Result<PoolState> {
        Ok(self.get(kind.key())?.unwrap_or_default())
    }

    /// Pool payout history, oldest first
    pub fn pool_distributions(&self) -> Result<Vec<PoolDistribution>> {
        self.scan(keys::POOL_DISTRIBUTION_PREFIX)
    }

    // ---------- job markers ----------

    /// When a scheduled job window was completed, if it was
    pub fn job_marker(&self, marker: &str) -> Result<Option<DateTime<Utc>>> {
        self.get(&keys::job(marker))
    }
}

impl MemberDirectory for Store {
    fn member(&self, id: &MemberId) -> Result<Option<Member>> {
        self.get(&keys::member(id))
    }

    fn members(&self) -> Result<Vec<Member>> {
        self.scan(keys::MEMBER_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upline_core::{Category, CommissionError, EntryStatus, PackageTier};

    fn store_with(members: &[(&str, Option<&str>)]) -> Store {
        let store = Store::temporary().unwrap();
        for (id, sponsor) in members {
            store
                .upsert_member(&Member::new(*id, sponsor.map(MemberId::from), PackageTier::Pro))
                .unwrap();
        }
        store
    }

    fn paid(recipient: &str, units: i64) -> LedgerEntry {
        LedgerEntry::new(
            recipient.into(),
            Amount::from_units(units),
            Category::Sponsor,
            EntryStatus::Paid,
            "sale:t",
            Utc::now(),
        )
    }

    #[test]
    fn test_post_paid_entry_credits_wallet() {
        let store = store_with(&[("a", None)]);
        let entry = paid("a", 40);

        store.transaction(|txn| txn.post_entry(&entry).map(|_| ())).unwrap();

        let a = store.member(&"a".into()).unwrap().unwrap();
        assert_eq!(a.wallet.balance, Amount::from_units(40));
        assert_eq!(a.wallet.sponsor_earnings, Amount::from_units(40));
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_aborted_transaction_leaves_nothing() {
        let store = store_with(&[("a", None)]);
        let entry = paid("a", 40);

        let result: Result<()> = store.transaction(|txn| {
            txn.post_entry(&entry)?;
            crate::txn::abort(CommissionError::Validation("boom".into()))
        });
        assert!(result.is_err());

        let a = store.member(&"a".into()).unwrap().unwrap();
        assert_eq!(a.wallet.balance, Amount::ZERO);
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn test_post_to_unknown_member_fails() {
        let store = Store::temporary().unwrap();
        let entry = paid("ghost", 1);
        let err = store.transaction(|txn| txn.post_entry(&entry).map(|_| ())).unwrap_err();
        assert_eq!(err, CommissionError::UnknownMember("ghost".into()));
    }

    #[test]
    fn test_held_index_and_release() {
        let store = store_with(&[("a", None), ("b", None)]);
        let mut held = paid("a", 300);
        held.status = EntryStatus::Held;
        held.processed_at = None;
        let mut other = paid("b", 10);
        other.status = EntryStatus::Held;

        store
            .transaction(|txn| {
                txn.post_entry(&held)?;
                txn.post_entry(&other)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.held_entries(&HeldFilter::default()).unwrap().len(), 2);
        let only_a = store
            .held_entries(&HeldFilter::for_recipient("a".into()))
            .unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(
            store.member(&"a".into()).unwrap().unwrap().wallet.balance,
            Amount::ZERO
        );

        let released = store
            .transaction(|txn| txn.release_entry(&held.id, "released", Utc::now()))
            .unwrap();
        assert!(released.is_some());
        assert_eq!(
            store.member(&"a".into()).unwrap().unwrap().wallet.balance,
            Amount::from_units(300)
        );
        assert_eq!(store.held_entries(&HeldFilter::default()).unwrap().len(), 1);

        // Second release is a no-op
        let again = store
            .transaction(|txn| txn.release_entry(&held.id, "released", Utc::now()))
            .unwrap();
        assert!(again.is_none());
        assert_eq!(
            store.member(&"a".into()).unwrap().unwrap().wallet.balance,
            Amount::from_units(300)
        );
    }

    #[test]
    fn test_paid_money_counts_in_the_window_it_is_paid() {
        use chrono::TimeZone;
        let store = store_with(&[("a", None)]);
        let october = Utc.with_ymd_and_hms(2026, 10, 31, 23, 0, 0).unwrap();
        let november = Utc.with_ymd_and_hms(2026, 11, 2, 9, 0, 0).unwrap();

        let mut held = paid("a", 300);
        held.status = EntryStatus::Held;
        held.processed_at = None;
        held.created_at = october;
        let mut passive = paid("a", 20);
        passive.category = Category::Passive;
        passive.processed_at = Some(october);

        store
            .transaction(|txn| {
                txn.post_entry(&held)?;
                txn.post_entry(&passive)?;
                Ok(())
            })
            .unwrap();
        store
            .transaction(|txn| txn.release_entry(&held.id, "released", november))
            .unwrap();

        let totals = |period: &'static str| {
            store
                .transaction(|txn| txn.window_total(&"a".into(), period))
                .unwrap()
        };
        assert_eq!(totals("2026-10"), Amount::from_units(20));
        assert_eq!(totals("2026-10-31"), Amount::from_units(20));
        assert_eq!(totals("2026-11"), Amount::from_units(300));
        assert_eq!(totals("2026-11-02"), Amount::from_units(300));

        let a = store.member(&"a".into()).unwrap().unwrap();
        assert_eq!(a.wallet.daily_earnings, Amount::from_units(320));
    }

    #[test]
    fn test_upsert_keeps_wallet() {
        let store = store_with(&[("a", None)]);
        let entry = paid("a", 5);
        store.transaction(|txn| txn.post_entry(&entry).map(|_| ())).unwrap();

        let mut profile = Member::new("a", None, PackageTier::Elite);
        profile.active = false;
        store.upsert_member(&profile).unwrap();

        let a = store.member(&"a".into()).unwrap().unwrap();
        assert_eq!(a.tier, PackageTier::Elite);
        assert!(!a.active);
        assert_eq!(a.wallet.balance, Amount::from_units(5));
    }

    #[test]
    fn test_distribution_log_is_unique() {
        let store = store_with(&[("a", None)]);
        let record = DistributionRecord {
            reference: DistributionRecord::admin_reference(&"a".into(), "pkg-1"),
            kind: crate::records::DistributionKind::AdminPackage,
            source: "a".into(),
            package_id: Some("pkg-1".into()),
            triggered_by: Some("admin".into()),
            sale_amount: Amount::from_units(100),
            entry_count: 0,
            total_amount: Amount::ZERO,
            created_at: Utc::now(),
        };

        store.transaction(|txn| txn.insert_distribution(&record)).unwrap();
        let err = store.transaction(|txn| txn.insert_distribution(&record)).unwrap_err();
        assert_eq!(err, CommissionError::AlreadyDistributed("admin:a:pkg-1".into()));
        assert_eq!(store.distributions().unwrap().len(), 1);
    }

    #[test]
    fn test_reset_rolling_and_windows() {
        let store = store_with(&[("a", None), ("b", None)]);
        store
            .transaction(|txn| {
                let mut a = txn.require_member(&"a".into())?;
                a.wallet.daily_earnings = Amount::from_units(50);
                a.wallet.monthly_earnings = Amount::from_units(70);
                txn.put_member(&a)?;
                txn.add_to_window(&"a".into(), "2026-10-16", Amount::from_units(50))?;
                Ok(())
            })
            .unwrap();

        assert_eq!(store.reset_rolling(RollingCounter::Daily).unwrap(), 1);
        let a = store.member(&"a".into()).unwrap().unwrap();
        assert_eq!(a.wallet.daily_earnings, Amount::ZERO);
        assert_eq!(a.wallet.monthly_earnings, Amount::from_units(70));

        let window = store
            .transaction(|txn| txn.window_total(&"a".into(), "2026-10-16"))
            .unwrap();
        assert_eq!(window, Amount::from_units(50));
    }

    #[test]
    fn test_job_marker_once() {
        let store = Store::temporary().unwrap();
        assert!(store.transaction(|txn| txn.mark_job("daily:2026-10-16", Utc::now())).unwrap());
        assert!(!store.transaction(|txn| txn.mark_job("daily:2026-10-16", Utc::now())).unwrap());
        assert!(store.job_marker("daily:2026-10-16").unwrap().is_some());
        assert!(store.job_marker("daily:2026-10-17").unwrap().is_none());
    }

    #[test]
    fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let store = Store::open(&path).unwrap();
            store
                .upsert_member(&Member::new("a", None, PackageTier::Basic))
                .unwrap();
            store.flush().unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.member(&"a".into()).unwrap().is_some());
    }
}

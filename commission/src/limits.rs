//! Earning limit checker
//!
//! Decides whether a capped credit is paid now or held for the next release.
//! Windows are UTC calendar days and months and hold every PAID amount the
//! member received in them: commissions, passive shares, settlements and
//! released entries.

use chrono::{DateTime, Utc};
use upline_core::{Amount, EarningCaps, EntryStatus, Member, PackageTier};
use upline_storage::{LedgerTxn, TxResult};

pub use upline_storage::{day_window, month_window};

#[derive(Debug, Clone)]
pub struct EarningLimitChecker {
    caps: EarningCaps,
}

impl EarningLimitChecker {
    pub fn new(caps: EarningCaps) -> Self {
        Self { caps }
    }

    /// PAID if the credit fits in both the daily and the monthly cap.
    /// A member without a package is always HELD.
    pub fn classify(
        &self,
        tier: PackageTier,
        daily_paid: Amount,
        monthly_paid: Amount,
        incoming: Amount,
    ) -> EntryStatus {
        if tier == PackageTier::None {
            return EntryStatus::Held;
        }
        let caps = self.caps.for_tier(tier);
        if daily_paid + incoming > caps.daily || monthly_paid + incoming > caps.monthly {
            EntryStatus::Held
        } else {
            EntryStatus::Paid
        }
    }

    /// Classify against the recipient's persisted window totals
    pub fn classify_in(
        &self,
        txn: &LedgerTxn<'_>,
        member: &Member,
        incoming: Amount,
        at: DateTime<Utc>,
    ) -> TxResult<EntryStatus> {
        let daily = txn.window_total(&member.id, &day_window(at))?;
        let monthly = txn.window_total(&member.id, &month_window(at))?;
        Ok(self.classify(member.tier, daily, monthly, incoming))
    }
}

impl Default for EarningLimitChecker {
    fn default() -> Self {
        Self::new(EarningCaps::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use upline_core::{Category, LedgerEntry};
    use upline_storage::Store;

    fn units(n: i64) -> Amount {
        Amount::from_units(n)
    }

    #[test]
    fn test_basic_daily_cap() {
        let checker = EarningLimitChecker::default();
        assert_eq!(
            checker.classify(PackageTier::Basic, Amount::ZERO, Amount::ZERO, units(500)),
            EntryStatus::Held
        );
        assert_eq!(
            checker.classify(PackageTier::Basic, Amount::ZERO, Amount::ZERO, units(150)),
            EntryStatus::Paid
        );
        // Exactly at the cap is still payable
        assert_eq!(
            checker.classify(PackageTier::Basic, units(50), Amount::ZERO, units(150)),
            EntryStatus::Paid
        );
        assert_eq!(
            checker.classify(PackageTier::Basic, units(51), Amount::ZERO, units(150)),
            EntryStatus::Held
        );
    }

    #[test]
    fn test_monthly_cap() {
        let checker = EarningLimitChecker::default();
        assert_eq!(
            checker.classify(PackageTier::Basic, Amount::ZERO, units(2_950), units(100)),
            EntryStatus::Held
        );
    }

    #[test]
    fn test_no_package_always_held() {
        let checker = EarningLimitChecker::default();
        assert_eq!(
            checker.classify(PackageTier::None, Amount::ZERO, Amount::ZERO, Amount::from_cents(1)),
            EntryStatus::Held
        );
    }

    #[test]
    fn test_window_keys_are_utc() {
        let at = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
        assert_eq!(day_window(at), "2026-01-31");
        assert_eq!(month_window(at), "2026-01");
    }

    #[test]
    fn test_windows_roll_over() {
        let store = Store::temporary().unwrap();
        let member = Member::new("m", None, PackageTier::Basic);
        store.upsert_member(&member).unwrap();
        let checker = EarningLimitChecker::default();
        let day1 = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 1).unwrap();

        let paid = LedgerEntry::new(
            member.id.clone(),
            units(150),
            Category::Depth(1),
            EntryStatus::Paid,
            "sale:1",
            day1,
        );
        store.transaction(|txn| txn.post_entry(&paid)).unwrap();

        let (same_day, next_day) = store
            .transaction(|txn| {
                Ok((
                    checker.classify_in(txn, &member, units(100), day1)?,
                    checker.classify_in(txn, &member, units(100), day2)?,
                ))
            })
            .unwrap();
        assert_eq!(same_day, EntryStatus::Held);
        assert_eq!(next_day, EntryStatus::Paid);
    }
}

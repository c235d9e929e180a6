//! Passive pool and company fund management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use upline_core::{Amount, Category, EntryStatus, LedgerEntry, MemberDirectory, MemberId};
use upline_storage::{abort, LedgerTxn, PoolDistribution, PoolKind, Store, TxResult};

use crate::error::{Result, TreasuryError};

/// Outcome of one passive pool payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassiveDistribution {
    pub pool_before: Amount,
    pub member_count: u64,
    pub amount_per_member: Amount,
    pub total_distributed: Amount,
    pub pool_after: Amount,
}

impl PassiveDistribution {
    fn noop(pool: Amount) -> Self {
        Self {
            pool_before: pool,
            member_count: 0,
            amount_per_member: Amount::ZERO,
            total_distributed: Amount::ZERO,
            pool_after: pool,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.total_distributed.is_zero()
    }
}

/// Current accumulator totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryReport {
    pub passive_pool: Amount,
    pub company_fund: Amount,
    pub passive_updated_at: Option<DateTime<Utc>>,
    pub company_updated_at: Option<DateTime<Utc>>,
    pub distributions: usize,
}

#[derive(Debug, Clone)]
pub struct Treasury {
    store: Store,
}

impl Treasury {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Add a sale's passive and company shares. Runs inside the caller's
    /// transaction so the accumulation commits with the sale's entries.
    pub fn accumulate(
        txn: &LedgerTxn<'_>,
        passive: Amount,
        company: Amount,
        at: DateTime<Utc>,
    ) -> TxResult<()> {
        if passive.is_positive() {
            txn.add_to_pool(PoolKind::Passive, passive, at)?;
        }
        if company.is_positive() {
            txn.add_to_pool(PoolKind::Company, company, at)?;
        }
        Ok(())
    }

    pub fn report(&self) -> Result<TreasuryReport> {
        let passive = self.store.pool(PoolKind::Passive)?;
        let company = self.store.pool(PoolKind::Company)?;
        Ok(TreasuryReport {
            passive_pool: passive.total,
            company_fund: company.total,
            passive_updated_at: passive.updated_at,
            company_updated_at: company.updated_at,
            distributions: self.store.pool_distributions()?.len(),
        })
    }

    pub fn history(&self) -> Result<Vec<PoolDistribution>> {
        self.store.pool_distributions()
    }

    /// Split the passive pool equally (floored to the cent) across every
    /// eligible member. Shares are PAID without a cap check. Cents that do
    /// not divide evenly stay in the pool.
    ///
    /// No-op when the pool is empty, nobody is eligible, or the share
    /// rounds down to zero.
    pub fn distribute_passive_pool(&self, at: DateTime<Utc>) -> Result<PassiveDistribution> {
        let candidates: Vec<MemberId> = self
            .store
            .members()?
            .into_iter()
            .filter(|m| m.is_eligible())
            .map(|m| m.id)
            .collect();

        let summary = self.store.transaction(|txn| {
            let mut pool = txn.pool(PoolKind::Passive)?;
            if !pool.total.is_positive() {
                return Ok(PassiveDistribution::noop(pool.total));
            }

            // Re-check inside the transaction; a member may have lapsed
            let mut eligible = Vec::with_capacity(candidates.len());
            for id in &candidates {
                if let Some(member) = txn.member(id)? {
                    if member.is_eligible() {
                        eligible.push(member.id);
                    }
                }
            }

            let count = eligible.len() as u64;
            let share = pool.total.split_floor(count);
            if count == 0 || !share.is_positive() {
                return Ok(PassiveDistribution::noop(pool.total));
            }

            let distribution_id = uuid::Uuid::new_v4().to_string();
            let reference = format!("passive:{}", distribution_id);
            for id in &eligible {
                let entry = LedgerEntry::new(
                    id.clone(),
                    share,
                    Category::Passive,
                    EntryStatus::Paid,
                    reference.clone(),
                    at,
                )
                .with_description("Passive pool share");
                txn.post_entry(&entry)?;
            }

            let pool_before = pool.total;
            let total = share.times(count);
            if total > pool.total {
                return abort(
                    TreasuryError::InsufficientBalance {
                        requested: total,
                        available: pool.total,
                    }
                    .into(),
                );
            }
            pool.total -= total;
            pool.updated_at = Some(at);
            txn.put_pool(PoolKind::Passive, &pool)?;

            txn.record_pool_distribution(&PoolDistribution {
                id: distribution_id.clone(),
                kind: PoolKind::Passive,
                pool_before,
                member_count: count,
                amount_per_member: share,
                total_distributed: total,
                created_at: at,
            })?;

            Ok(PassiveDistribution {
                pool_before,
                member_count: count,
                amount_per_member: share,
                total_distributed: total,
                pool_after: pool.total,
            })
        })?;

        if summary.is_noop() {
            debug!(
                "[TREASURY] Passive distribution skipped (pool {}, {} candidates)",
                summary.pool_before,
                candidates.len()
            );
        } else {
            info!(
                "[TREASURY] Distributed {} passive pool to {} members ({} each, {} left)",
                summary.total_distributed,
                summary.member_count,
                summary.amount_per_member,
                summary.pool_after
            );
        }
        Ok(summary)
    }

    /// Pay the whole company fund to the company account and zero it.
    /// Returns the settled amount (zero when the fund is empty).
    pub fn settle_company_fund(&self, account: &MemberId, at: DateTime<Utc>) -> Result<Amount> {
        let settled = self.store.transaction(|txn| {
            let mut fund = txn.pool(PoolKind::Company)?;
            if !fund.total.is_positive() {
                return Ok(Amount::ZERO);
            }
            if txn.member(account)?.is_none() {
                return abort(TreasuryError::UnknownAccount(account.clone()).into());
            }

            let id = uuid::Uuid::new_v4().to_string();
            let entry = LedgerEntry::new(
                account.clone(),
                fund.total,
                Category::Company,
                EntryStatus::Paid,
                format!("company:{}", id),
                at,
            )
            .with_description("Company fund settlement");
            txn.post_entry(&entry)?;

            let amount = fund.total;
            txn.record_pool_distribution(&PoolDistribution {
                id,
                kind: PoolKind::Company,
                pool_before: amount,
                member_count: 1,
                amount_per_member: amount,
                total_distributed: amount,
                created_at: at,
            })?;
            fund.total = Amount::ZERO;
            fund.updated_at = Some(at);
            txn.put_pool(PoolKind::Company, &fund)?;
            Ok(amount)
        })?;

        if settled.is_positive() {
            info!("[TREASURY] Settled company fund {} to {}", settled, account);
        }
        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upline_core::{Member, PackageTier};

    fn seeded(members: usize, pool_units: i64) -> (Store, Treasury) {
        let store = Store::temporary().unwrap();
        for i in 0..members {
            store
                .upsert_member(&Member::new(format!("m{}", i), None, PackageTier::Basic))
                .unwrap();
        }
        store
            .transaction(|txn| {
                Treasury::accumulate(txn, Amount::from_units(pool_units), Amount::ZERO, Utc::now())
            })
            .unwrap();
        (store.clone(), Treasury::new(store))
    }

    #[test]
    fn test_even_split_empties_pool() {
        let (store, treasury) = seeded(4, 100);

        let result = treasury.distribute_passive_pool(Utc::now()).unwrap();
        assert_eq!(result.member_count, 4);
        assert_eq!(result.amount_per_member, Amount::from_units(25));
        assert_eq!(result.pool_after, Amount::ZERO);

        for i in 0..4 {
            let m = store.member(&format!("m{}", i).into()).unwrap().unwrap();
            assert_eq!(m.wallet.balance, Amount::from_units(25));
            assert_eq!(m.wallet.passive_earnings, Amount::from_units(25));
        }
        assert_eq!(treasury.history().unwrap().len(), 1);
    }

    #[test]
    fn test_uneven_split_keeps_remainder() {
        let (_, treasury) = seeded(3, 1);

        let result = treasury.distribute_passive_pool(Utc::now()).unwrap();
        assert_eq!(result.amount_per_member, Amount::from_cents(33));
        assert_eq!(result.pool_after, Amount::from_cents(1));
    }

    #[test]
    fn test_empty_pool_is_noop() {
        let (_, treasury) = seeded(4, 0);
        let result = treasury.distribute_passive_pool(Utc::now()).unwrap();
        assert!(result.is_noop());
        assert!(treasury.history().unwrap().is_empty());
    }

    #[test]
    fn test_no_eligible_members_is_noop() {
        let (store, treasury) = seeded(0, 100);
        store
            .upsert_member(&Member::new("unpaid", None, PackageTier::None))
            .unwrap();

        let result = treasury.distribute_passive_pool(Utc::now()).unwrap();
        assert!(result.is_noop());
        assert_eq!(treasury.report().unwrap().passive_pool, Amount::from_units(100));
    }

    #[test]
    fn test_company_settlement() {
        let store = Store::temporary().unwrap();
        store
            .upsert_member(&Member::new("company", None, PackageTier::Elite))
            .unwrap();
        store
            .transaction(|txn| {
                Treasury::accumulate(txn, Amount::ZERO, Amount::from_units(75), Utc::now())
            })
            .unwrap();
        let treasury = Treasury::new(store.clone());

        let settled = treasury
            .settle_company_fund(&"company".into(), Utc::now())
            .unwrap();
        assert_eq!(settled, Amount::from_units(75));
        assert_eq!(treasury.report().unwrap().company_fund, Amount::ZERO);

        let company = store.member(&"company".into()).unwrap().unwrap();
        assert_eq!(company.wallet.company_earnings, Amount::from_units(75));

        // Nothing left to settle
        assert_eq!(
            treasury.settle_company_fund(&"company".into(), Utc::now()).unwrap(),
            Amount::ZERO
        );
    }

    #[test]
    fn test_company_settlement_requires_account() {
        let store = Store::temporary().unwrap();
        store
            .transaction(|txn| Treasury::accumulate(txn, Amount::ZERO, Amount::from_units(5), Utc::now()))
            .unwrap();
        let treasury = Treasury::new(store);
        assert_eq!(
            treasury.settle_company_fund(&"nobody".into(), Utc::now()),
            Err(upline_core::CommissionError::UnknownMember("nobody".into()))
        );
        assert_eq!(treasury.report().unwrap().company_fund, Amount::from_units(5));
    }
}

//! Commission engine
//!
//! Entry point for the request path (sale distribution, admin package
//! commissions, manual overrides) and the handle the scheduler drives.
//! Every operation takes a configuration snapshot when it starts, so a
//! concurrent `refresh_config` never changes rates mid-distribution.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use upline_core::{
    Amount, CommissionError, EngineConfig, HeldFilter, LedgerEntry, Member, MemberDirectory,
    MemberId, Membership, Result,
};
use upline_storage::{DistributionKind, DistributionRecord, Store};
use upline_treasury::{PassiveDistribution, Treasury, TreasuryReport};

use crate::audit::{audit, AuditMismatch};
use crate::calculator::CommissionCalculator;
use crate::fraud::{FraudDetector, FraudReport};
use crate::jobs::{self, MonthlyResetReport, ReleaseReport, MANUAL_RELEASE_NOTE};
use crate::ledger::LedgerApplier;
use crate::limits::EarningLimitChecker;

/// A purchase reported by the order collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub buyer: MemberId,
    pub amount: Amount,
    pub package_id: Option<String>,
    /// Idempotency key; sales without one are not deduplicated
    pub reference: Option<String>,
}

impl SaleEvent {
    pub fn new(buyer: impl Into<MemberId>, amount: Amount) -> Self {
        Self {
            buyer: buyer.into(),
            amount,
            package_id: None,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_package(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = Some(package_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleDistribution {
    pub reference: String,
    pub entries: Vec<LedgerEntry>,
    pub total_distributed: Amount,
    pub passive_pool_delta: Amount,
    pub company_fund_delta: Amount,
}

impl SaleDistribution {
    pub fn paid_total(&self) -> Amount {
        self.entries.iter().filter(|e| e.is_paid()).map(|e| e.amount).sum()
    }

    pub fn held_total(&self) -> Amount {
        self.entries.iter().filter(|e| e.is_held()).map(|e| e.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminCommissionRequest {
    pub source: MemberId,
    pub package_id: String,
    pub amount: Amount,
    pub admin_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminCommissionResult {
    pub reference: String,
    pub distributed_count: usize,
    pub total_amount: Amount,
}

#[derive(Debug, Clone)]
pub struct CommissionEngine {
    store: Store,
    treasury: Treasury,
    config: Arc<RwLock<EngineConfig>>,
    fraud: Arc<FraudDetector>,
}

impl CommissionEngine {
    pub fn new(store: Store, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            treasury: Treasury::new(store.clone()),
            store,
            config: Arc::new(RwLock::new(config)),
            fraud: Arc::new(FraudDetector::new()),
        })
    }

    /// Open the store named in the configuration
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = Store::open(&config.storage.path)?;
        Self::new(store, config)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    /// Snapshot of the active configuration
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Swap in a new configuration. Rejected configurations leave the active
    /// one in place.
    pub fn refresh_config(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        if config.storage != self.config.read().storage {
            warn!("[ENGINE] Storage settings changed; they apply after a restart");
        }
        *self.config.write() = config;
        info!("[ENGINE] Configuration refreshed");
        Ok(())
    }

    /// Insert or update a member profile; the wallet is left untouched
    pub fn register_member(&self, member: &Member) -> Result<()> {
        self.store.upsert_member(member)
    }

    // ---------- sales ----------

    pub fn distribute_sale(&self, event: &SaleEvent) -> Result<SaleDistribution> {
        self.distribute_sale_at(event, Utc::now())
    }

    /// Compute and apply one sale's commissions.
    ///
    /// The distribution log row, every ledger entry with its wallet update,
    /// and the pool accumulation commit as one unit. A rejected sale writes
    /// nothing; the purchase itself stands and may be retried with the same
    /// reference.
    pub fn distribute_sale_at(&self, event: &SaleEvent, at: DateTime<Utc>) -> Result<SaleDistribution> {
        if !event.amount.is_positive() {
            return Err(CommissionError::Validation(format!(
                "sale amount must be positive, got {}",
                event.amount
            )));
        }
        let buyer = self
            .store
            .member(&event.buyer)?
            .ok_or_else(|| CommissionError::UnknownMember(event.buyer.to_string()))?;

        let reference = match &event.reference {
            Some(r) if r.trim().is_empty() => {
                return Err(CommissionError::Validation("empty sale reference".to_string()))
            }
            Some(r) => DistributionRecord::sale_reference(r),
            None => DistributionRecord::sale_reference(&uuid::Uuid::new_v4().to_string()),
        };
        if self.store.distribution(&reference)?.is_some() {
            return Err(CommissionError::AlreadyDistributed(reference));
        }

        let config = self.config();
        let breakdown = CommissionCalculator::calculate_with_depth(
            &buyer.id,
            event.amount,
            &self.store,
            &config.commission,
            config.chain_depth(),
        )?;
        if buyer.membership == Membership::Free {
            info!("[ENGINE] Buyer {} is a free member; no commissions", buyer.id);
        }

        let checker = EarningLimitChecker::new(config.limits.clone());
        let applier = LedgerApplier::new(&checker);
        let passive = breakdown.passive_pool_amount;
        let company = breakdown.company_fund_delta();

        let entries = self.store.transaction(|txn| {
            txn.insert_distribution(&DistributionRecord {
                reference: reference.clone(),
                kind: DistributionKind::Sale,
                source: buyer.id.clone(),
                package_id: event.package_id.clone(),
                triggered_by: None,
                sale_amount: event.amount,
                entry_count: breakdown.entries.len(),
                total_amount: breakdown.total_distributed,
                created_at: at,
            })?;
            let mut entries = Vec::with_capacity(breakdown.entries.len());
            for credit in &breakdown.entries {
                entries.push(applier.apply_credit(txn, credit, &reference, Some(&buyer.id), at)?);
            }
            Treasury::accumulate(txn, passive, company, at)?;
            Ok(entries)
        })?;

        let result = SaleDistribution {
            reference,
            entries,
            total_distributed: breakdown.total_distributed,
            passive_pool_delta: passive,
            company_fund_delta: company,
        };
        info!(
            "[ENGINE] Sale {} by {} for {}: {} entries ({} paid, {} held), passive +{}, company +{}",
            result.reference,
            buyer.id,
            event.amount,
            result.entries.len(),
            result.paid_total(),
            result.held_total(),
            result.passive_pool_delta,
            result.company_fund_delta
        );
        Ok(result)
    }

    // ---------- admin package commissions ----------

    pub fn calculate_admin_commission(
        &self,
        request: &AdminCommissionRequest,
    ) -> Result<AdminCommissionResult> {
        self.calculate_admin_commission_at(request, Utc::now())
    }

    /// Operator-triggered commission for a package purchase, guarded by the
    /// deterministic `admin:<source>:<package>` reference. A second call for
    /// the same pair fails with `AlreadyDistributed` and writes nothing.
    pub fn calculate_admin_commission_at(
        &self,
        request: &AdminCommissionRequest,
        at: DateTime<Utc>,
    ) -> Result<AdminCommissionResult> {
        if !request.amount.is_positive() {
            return Err(CommissionError::Validation(format!(
                "package amount must be positive, got {}",
                request.amount
            )));
        }
        if request.package_id.trim().is_empty() {
            return Err(CommissionError::Validation("package id is required".to_string()));
        }
        if self.store.member(&request.source)?.is_none() {
            return Err(CommissionError::UnknownMember(request.source.to_string()));
        }

        let reference = DistributionRecord::admin_reference(&request.source, &request.package_id);
        if self.store.distribution(&reference)?.is_some() {
            return Err(CommissionError::AlreadyDistributed(reference));
        }

        let config = self.config();
        let credits = CommissionCalculator::calculate_admin(
            &request.source,
            request.amount,
            &self.store,
            &config.admin_commission,
        )?;
        let total_amount: Amount = credits.iter().map(|c| c.amount).sum();

        let checker = EarningLimitChecker::new(config.limits.clone());
        let applier = LedgerApplier::new(&checker);
        self.store.transaction(|txn| {
            txn.insert_distribution(&DistributionRecord {
                reference: reference.clone(),
                kind: DistributionKind::AdminPackage,
                source: request.source.clone(),
                package_id: Some(request.package_id.clone()),
                triggered_by: Some(request.admin_id.clone()),
                sale_amount: request.amount,
                entry_count: credits.len(),
                total_amount,
                created_at: at,
            })?;
            for credit in &credits {
                applier.apply_credit(txn, credit, &reference, Some(&request.source), at)?;
            }
            Ok(())
        })?;

        info!(
            "[ENGINE] Admin {} distributed {} package commissions ({}) for {}",
            request.admin_id,
            credits.len(),
            total_amount,
            reference
        );
        Ok(AdminCommissionResult {
            reference,
            distributed_count: credits.len(),
            total_amount,
        })
    }

    // ---------- manual override ----------

    pub fn held_entries(&self, filter: &HeldFilter) -> Result<Vec<LedgerEntry>> {
        self.store.held_entries(filter)
    }

    /// Release specific HELD entries, bypassing the earning caps
    pub fn release_entries(&self, ids: &[String], at: DateTime<Utc>) -> ReleaseReport {
        let report = jobs::release_entries(&self.store, ids, MANUAL_RELEASE_NOTE, at);
        info!(
            "[ENGINE] Manual release: {} released ({}), {} skipped, {} failed",
            report.released,
            report.released_amount,
            report.skipped,
            report.failures.len()
        );
        report
    }

    /// HELD -> BURNED; the wallet is not touched
    pub fn burn_entry(&self, id: &str, reason: &str, at: DateTime<Utc>) -> Result<LedgerEntry> {
        let entry = self.store.transaction(|txn| txn.burn_entry(id, reason, at))?;
        warn!(
            "[ENGINE] Burned entry {} ({} to {}): {}",
            entry.id, entry.amount, entry.recipient, reason
        );
        Ok(entry)
    }

    // ---------- scheduled jobs ----------

    pub fn run_daily_reset_if_due(&self, at: DateTime<Utc>) -> Result<bool> {
        jobs::run_daily_reset_if_due(&self.store, at)
    }

    pub fn run_monthly_reset_if_due(&self, at: DateTime<Utc>) -> Result<Option<MonthlyResetReport>> {
        jobs::run_monthly_reset_if_due(&self.store, at)
    }

    /// Unconditional monthly reset and release
    pub fn run_monthly_reset(&self, at: DateTime<Utc>) -> Result<MonthlyResetReport> {
        jobs::run_monthly_reset(&self.store, at)
    }

    pub fn run_daily_reset(&self, at: DateTime<Utc>) -> Result<usize> {
        jobs::run_daily_reset(&self.store, at)
    }

    // ---------- pools ----------

    pub fn distribute_passive_pool(&self, at: DateTime<Utc>) -> Result<PassiveDistribution> {
        self.treasury.distribute_passive_pool(at)
    }

    /// Pay the company fund to the configured company account
    pub fn settle_company_fund(&self, at: DateTime<Utc>) -> Result<Amount> {
        let account = self.config().company_account.ok_or_else(|| {
            CommissionError::InvalidConfig("company_account is not configured".to_string())
        })?;
        self.treasury.settle_company_fund(&account, at)
    }

    pub fn treasury_report(&self) -> Result<TreasuryReport> {
        self.treasury.report()
    }

    // ---------- integrity ----------

    pub fn run_fraud_scan(&self) -> Result<FraudReport> {
        let members = self.store.members()?;
        let entries = self.store.entries()?;
        Ok(self.fraud.scan(&members, &entries, Utc::now()))
    }

    pub fn audit_ledger(&self) -> Result<Vec<AuditMismatch>> {
        let members = self.store.members()?;
        let entries = self.store.entries()?;
        Ok(audit(&members, &entries))
    }
}

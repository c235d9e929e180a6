//! Persisted audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use upline_core::{Amount, MemberId};

/// What produced a distribution run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionKind {
    Sale,
    AdminPackage,
}

/// Idempotency row: one per distributed event. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub reference: String,
    pub kind: DistributionKind,
    pub source: MemberId,
    pub package_id: Option<String>,
    pub triggered_by: Option<String>,
    pub sale_amount: Amount,
    pub entry_count: usize,
    pub total_amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl DistributionRecord {
    /// Reference for a sale event carrying its own idempotency key
    pub fn sale_reference(reference: &str) -> String {
        format!("sale:{}", reference)
    }

    /// Deterministic reference for an operator-triggered package commission
    pub fn admin_reference(source: &MemberId, package_id: &str) -> String {
        format!("admin:{}:{}", source, package_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolKind {
    Passive,
    Company,
}

impl PoolKind {
    pub fn key(&self) -> &'static str {
        match self {
            PoolKind::Passive => "pool:passive",
            PoolKind::Company => "pool:company",
        }
    }
}

/// Running total of an accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    pub total: Amount,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for PoolState {
    fn default() -> Self {
        Self {
            total: Amount::ZERO,
            updated_at: None,
        }
    }
}

/// Snapshot of one pool payout, kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDistribution {
    pub id: String,
    pub kind: PoolKind,
    pub pool_before: Amount,
    pub member_count: u64,
    pub amount_per_member: Amount,
    pub total_distributed: Amount,
    pub created_at: DateTime<Utc>,
}

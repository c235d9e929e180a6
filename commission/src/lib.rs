//! Upline Commission Engine
//!
//! Distributes multi-level commissions from a sale across the sponsor chain:
//! - sponsor chain resolution and downline walks
//! - commission calculation (direct sponsor, depth levels, pool shares)
//! - earning caps (PAID vs HELD) and atomic ledger application
//! - idempotent sale and admin package distribution
//! - scheduled daily/monthly reset and held release
//! - fraud scans and ledger audit

pub mod audit;
pub mod calculator;
pub mod chain;
pub mod engine;
pub mod fraud;
pub mod jobs;
pub mod ledger;
pub mod limits;
pub mod scheduler;

pub use audit::AuditMismatch;
pub use calculator::{CommissionBreakdown, CommissionCalculator, CommissionCredit};
pub use chain::{resolve_upline, UplineLink};
pub use engine::{
    AdminCommissionRequest, AdminCommissionResult, CommissionEngine, SaleDistribution, SaleEvent,
};
pub use fraud::{FraudCheck, FraudDetector, FraudFinding, FraudReport};
pub use jobs::{MonthlyResetReport, ReleaseFailure, ReleaseReport};
pub use ledger::LedgerApplier;
pub use limits::EarningLimitChecker;
pub use scheduler::{Scheduler, SchedulerHandle};

pub use upline_core::{CommissionError, Result};

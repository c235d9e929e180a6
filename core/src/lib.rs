//! Upline Core
//!
//! Shared model for the commission engine:
//! - fixed-point money and percentages
//! - members, package tiers and wallet snapshots
//! - ledger entries and their lifecycle
//! - commission structures, earning caps and engine configuration

pub mod amount;
pub mod config;
pub mod error;
pub mod ledger;
pub mod member;
pub mod structure;

pub use amount::{Amount, Percent, CENTS_PER_UNIT};
pub use config::{EngineConfig, SchedulerConfig, StorageConfig};
pub use error::{CommissionError, Result};
pub use ledger::{Category, EntryStatus, HeldFilter, LedgerEntry};
pub use member::{Member, MemberDirectory, MemberId, MemberSnapshot, Membership, PackageTier, Wallet};
pub use structure::{AdminRateTable, CommissionStructure, EarningCaps, TierCaps};

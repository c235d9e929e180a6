//! Upline Storage Layer - sled-backed ledger
//!
//! Persists members (with wallet snapshots), the append-only ledger, the held
//! index, cap windows, the distribution log, pool accumulators and job
//! markers. All wallet mutation goes through [`LedgerTxn`].

pub mod error;
mod keys;
pub mod records;
pub mod store;
pub mod txn;

pub use error::StorageError;
pub use keys::{day_window, month_window};
pub use records::{DistributionKind, DistributionRecord, PoolDistribution, PoolKind, PoolState};
pub use store::{RollingCounter, Store};
pub use txn::{abort, LedgerTxn, TxResult};

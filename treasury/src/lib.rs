//! Upline Treasury Module
//!
//! Holds the two non-individual shares of every sale:
//! - the passive pool, periodically split equally across eligible members
//! - the company fund, retained until settled to the company account
//!
//! Both accumulators only grow from sales and only shrink through a
//! recorded distribution.

pub mod error;
pub mod pool;

pub use error::TreasuryError;
pub use pool::{PassiveDistribution, Treasury, TreasuryReport};

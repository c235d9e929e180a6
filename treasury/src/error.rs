//! Treasury error types

use thiserror::Error;
use upline_core::{Amount, CommissionError, MemberId};

/// Treasury failures, surfaced to callers as [`CommissionError`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreasuryError {
    #[error("Settlement account {0} is not a registered member")]
    UnknownAccount(MemberId),

    #[error("Insufficient pool balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },
}

impl From<TreasuryError> for CommissionError {
    fn from(err: TreasuryError) -> Self {
        match err {
            TreasuryError::UnknownAccount(id) => CommissionError::UnknownMember(id.to_string()),
            TreasuryError::InsufficientBalance { .. } => {
                CommissionError::Validation(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CommissionError>;

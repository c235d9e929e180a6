//! Commission engine error types

use thiserror::Error;

/// Errors surfaced by commission calculation and ledger application.
///
/// `Validation`, `UnknownMember` and `AlreadyDistributed` are raised before
/// any ledger write. Partial release failures and fraud findings are report
/// data and never show up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommissionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown member: {0}")]
    UnknownMember(String),

    #[error("Already distributed: {0}")]
    AlreadyDistributed(String),

    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CommissionError {
    /// Caller-side errors that map to a 4xx-style rejection
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CommissionError::Validation(_)
                | CommissionError::UnknownMember(_)
                | CommissionError::AlreadyDistributed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CommissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classes() {
        assert!(CommissionError::AlreadyDistributed("admin:a:p".into()).is_rejection());
        assert!(CommissionError::Validation("amount".into()).is_rejection());
        assert!(!CommissionError::Storage("io".into()).is_rejection());
    }

    #[test]
    fn test_display() {
        let err = CommissionError::InvalidTransition {
            id: "e1".into(),
            from: "PAID".into(),
            to: "BURNED".into(),
        };
        assert_eq!(err.to_string(), "Invalid status transition for e1: PAID -> BURNED");
    }
}

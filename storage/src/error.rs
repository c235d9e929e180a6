//! Storage error types

use thiserror::Error;
use upline_core::CommissionError;

/// sled and bincode failures. Public storage operations return
/// [`CommissionError`]; these convert into it with `?`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to open database at {path}: {source}")]
    Open { path: String, source: sled::Error },

    #[error("{context}: {source}")]
    Sled { context: String, source: sled::Error },

    #[error("Failed to decode {key}: {source}")]
    Decode { key: String, source: bincode::Error },

    #[error("Failed to encode {key}: {source}")]
    Encode { key: String, source: bincode::Error },
}

impl StorageError {
    pub(crate) fn sled(context: impl Into<String>) -> impl FnOnce(sled::Error) -> Self {
        let context = context.into();
        move |source| StorageError::Sled { context, source }
    }
}

impl From<StorageError> for CommissionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Decode { .. } | StorageError::Encode { .. } => {
                CommissionError::Serialization(err.to_string())
            }
            StorageError::Open { .. } | StorageError::Sled { .. } => {
                CommissionError::Storage(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CommissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_errors_map_to_serialization() {
        let source = bincode::deserialize::<u64>(&[1]).unwrap_err();
        let err: CommissionError = StorageError::Decode {
            key: "member:a".into(),
            source,
        }
        .into();
        match err {
            CommissionError::Serialization(msg) => {
                assert!(msg.starts_with("Failed to decode member:a"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_open_failure_maps_to_storage() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let err = crate::Store::open(file.join("ledger.db")).unwrap_err();
        assert!(matches!(err, CommissionError::Storage(_)));
        assert!(!err.is_rejection());
    }
}

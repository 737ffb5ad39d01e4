use poc_types::{Epoch, FailureKind, Metal, SnapshotError};
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{metal} does not earn in the {epoch} epoch")]
    TierUnavailable { metal: Metal, epoch: Epoch },

    #[error("{0} epoch balance is exhausted")]
    EpochExhausted(Epoch),

    #[error("invalid {field}: {value} (expected a finite value in 0..=10000)")]
    InvalidScore { field: &'static str, value: f64 },

    #[error("invalid tokenomics configuration: {0}")]
    InvalidConfig(String),

    #[error("ledger persistence failed: {0}")]
    Persistence(#[from] SnapshotError),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

impl LedgerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LedgerError::TierUnavailable { .. } => FailureKind::TierUnavailable,
            LedgerError::EpochExhausted(_) => FailureKind::EpochExhausted,
            LedgerError::InvalidScore { .. } => FailureKind::ScoreValidationFailure,
            LedgerError::InvalidConfig(_) => FailureKind::InvalidState,
            LedgerError::Persistence(_) | LedgerError::LockPoisoned => {
                FailureKind::PersistenceFailure
            }
        }
    }
}

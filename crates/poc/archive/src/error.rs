use poc_types::{FailureKind, LifecycleStatus, SnapshotError, SubmissionId};
use thiserror::Error;

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Archive errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("contribution not found: {0}")]
    NotFound(SubmissionId),

    #[error("contribution {0} already exists")]
    DuplicateId(SubmissionId),

    #[error("contribution {id}: invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        id: SubmissionId,
        from: LifecycleStatus,
        to: LifecycleStatus,
    },

    #[error("archive invariant violation: {0}")]
    InvariantViolation(String),

    #[error("archive persistence failed: {0}")]
    Persistence(#[from] SnapshotError),

    #[error("archive lock poisoned")]
    LockPoisoned,
}

impl ArchiveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ArchiveError::NotFound(_) => FailureKind::NotFound,
            ArchiveError::DuplicateId(_) => FailureKind::DuplicateId,
            ArchiveError::InvalidTransition { .. } | ArchiveError::InvariantViolation(_) => {
                FailureKind::InvalidState
            }
            ArchiveError::Persistence(_) | ArchiveError::LockPoisoned => {
                FailureKind::PersistenceFailure
            }
        }
    }
}

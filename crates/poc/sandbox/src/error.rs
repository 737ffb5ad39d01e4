use poc_archive::ArchiveError;
use poc_types::{FailureKind, SubmissionId};
use thiserror::Error;

pub type SandboxResult<T> = Result<T, SandboxError>;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("submission not found in archive: {0}")]
    NotFound(SubmissionId),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl SandboxError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SandboxError::NotFound(_) => FailureKind::NotFound,
            SandboxError::Archive(err) => err.kind(),
        }
    }
}

use crate::oracle::OracleError;
use poc_archive::ArchiveError;
use poc_sandbox::SandboxError;
use poc_tokenomics::LedgerError;
use poc_types::{FailureKind, LifecycleStatus, SubmissionId};
use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Orchestrator errors. Expected business outcomes (duplicates, failed
/// qualification, unavailable tiers) are not errors; they come back inside
/// an [`crate::EvaluationResult`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("submission not found: {0}")]
    NotFound(SubmissionId),

    #[error("submission {id} cannot be evaluated while {status}")]
    InvalidState {
        id: SubmissionId,
        status: LifecycleStatus,
    },

    #[error("score validation failed: {0}")]
    ScoreValidation(String),

    #[error("scoring oracle failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("redundancy engine error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            OrchestratorError::NotFound(_) => FailureKind::NotFound,
            OrchestratorError::InvalidState { .. } => FailureKind::InvalidState,
            OrchestratorError::ScoreValidation(_) | OrchestratorError::Oracle(_) => {
                FailureKind::ScoreValidationFailure
            }
            OrchestratorError::Archive(err) => err.kind(),
            OrchestratorError::Ledger(err) => err.kind(),
            OrchestratorError::Sandbox(err) => err.kind(),
            OrchestratorError::Config(_) => FailureKind::InvalidState,
        }
    }
}

impl From<::config::ConfigError> for OrchestratorError {
    fn from(err: ::config::ConfigError) -> Self {
        OrchestratorError::Config(err.to_string())
    }
}

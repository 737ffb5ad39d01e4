use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed failure kind recorded on contributions and returned to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    DuplicateId,
    DuplicateContent,
    InvalidState,
    TierUnavailable,
    EpochExhausted,
    PersistenceFailure,
    ScoreValidationFailure,
    QualificationFailed,
}

impl FailureKind {
    /// Expected business outcomes are reported as data, not as errors.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            FailureKind::NotFound
                | FailureKind::DuplicateContent
                | FailureKind::TierUnavailable
                | FailureKind::EpochExhausted
                | FailureKind::QualificationFailed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::DuplicateId => "duplicate_id",
            FailureKind::DuplicateContent => "duplicate_content",
            FailureKind::InvalidState => "invalid_state",
            FailureKind::TierUnavailable => "tier_unavailable",
            FailureKind::EpochExhausted => "epoch_exhausted",
            FailureKind::PersistenceFailure => "persistence_failure",
            FailureKind::ScoreValidationFailure => "score_validation_failure",
            FailureKind::QualificationFailed => "qualification_failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure with both a typed kind and a human-readable reason.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

use crate::score::ScoreInput;
use async_trait::async_trait;
use poc_types::{ContributorId, SubmissionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the scoring oracle is shown for one submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionInput {
    pub id: SubmissionId,
    pub title: String,
    pub contributor: ContributorId,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("scoring oracle unavailable: {0}")]
    Unavailable(String),

    #[error("scoring oracle returned a malformed response: {0}")]
    Malformed(String),
}

/// The external scoring collaborator.
///
/// Implementations may take tens of seconds. The orchestrator calls them
/// with no lock held.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn score(&self, submission: &SubmissionInput) -> Result<ScoreInput, OracleError>;
}

/// Oracle that answers every submission with the same score, e.g. one
/// loaded from a file by an operator.
#[derive(Clone, Debug)]
pub struct FixedOracle {
    score: ScoreInput,
}

impl FixedOracle {
    pub fn new(score: ScoreInput) -> Self {
        Self { score }
    }
}

#[async_trait]
impl ScoringOracle for FixedOracle {
    async fn score(&self, _submission: &SubmissionInput) -> Result<ScoreInput, OracleError> {
        Ok(self.score.clone())
    }
}

use crate::error::{OrchestratorError, OrchestratorResult};
use poc_types::{Metal, MAX_SCORE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Overall verdict of the scoring oracle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleVerdict {
    #[default]
    Approved,
    Rejected,
}

impl OracleVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            OracleVerdict::Approved => "approved",
            OracleVerdict::Rejected => "rejected",
        }
    }
}

/// Score object as supplied by the external scoring collaborator.
///
/// Redundancy may arrive either on the `0..=10000` scale or as a fraction in
/// `0..=1`. Metal labels are free strings until normalized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreInput {
    pub coherence: f64,
    pub density: f64,
    pub redundancy: f64,
    #[serde(default)]
    pub metals: Vec<String>,
    #[serde(default)]
    pub status: OracleVerdict,
    #[serde(default)]
    pub pod_score: Option<f64>,
}

/// Validated, strongly typed score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub coherence: f64,
    pub density: f64,
    /// Always on the `0..=10000` scale.
    pub redundancy: f64,
    pub pod_score: f64,
    pub metals: BTreeSet<Metal>,
    pub verdict: OracleVerdict,
    /// Labels that named no known metal.
    pub dropped_metals: Vec<String>,
}

impl ScoreInput {
    pub fn new(coherence: f64, density: f64, redundancy: f64, metals: &[&str]) -> Self {
        Self {
            coherence,
            density,
            redundancy,
            metals: metals.iter().map(|m| m.to_string()).collect(),
            status: OracleVerdict::Approved,
            pod_score: None,
        }
    }

    pub fn rejected(mut self) -> Self {
        self.status = OracleVerdict::Rejected;
        self
    }

    pub fn with_pod_score(mut self, pod_score: f64) -> Self {
        self.pod_score = Some(pod_score);
        self
    }

    pub fn normalize(&self) -> OrchestratorResult<NormalizedScore> {
        let coherence = in_range("coherence", self.coherence)?;
        let density = in_range("density", self.density)?;

        if !self.redundancy.is_finite() || self.redundancy < 0.0 {
            return Err(OrchestratorError::ScoreValidation(format!(
                "redundancy must be a finite non-negative value, got {}",
                self.redundancy
            )));
        }
        let redundancy = if self.redundancy <= 1.0 {
            self.redundancy * MAX_SCORE
        } else {
            in_range("redundancy", self.redundancy)?
        };

        let pod_score = match self.pod_score {
            Some(pod) => in_range("pod_score", pod)?,
            None => (coherence + density) / 2.0,
        };

        let mut metals = BTreeSet::new();
        let mut dropped_metals = Vec::new();
        for label in &self.metals {
            match label.parse::<Metal>() {
                Ok(metal) => {
                    metals.insert(metal);
                }
                Err(err) => {
                    warn!(label = %label, error = %err, "dropping unknown metal label");
                    dropped_metals.push(label.clone());
                }
            }
        }
        if metals.is_empty() {
            metals.insert(Metal::Gold);
        }

        Ok(NormalizedScore {
            coherence,
            density,
            redundancy,
            pod_score,
            metals,
            verdict: self.status,
            dropped_metals,
        })
    }
}

fn in_range(field: &str, value: f64) -> OrchestratorResult<f64> {
    if !value.is_finite() || !(0.0..=MAX_SCORE).contains(&value) {
        return Err(OrchestratorError::ScoreValidation(format!(
            "{field} must lie in 0..=10000, got {value}"
        )));
    }
    Ok(value)
}

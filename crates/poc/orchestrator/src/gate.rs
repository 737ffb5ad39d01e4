use crate::config::QualificationConfig;
use crate::score::{NormalizedScore, OracleVerdict};
use serde::{Deserialize, Serialize};

/// Outcome of the qualification gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub passed: bool,
    pub reasons: Vec<String>,
}

impl GateDecision {
    pub fn reason(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Absolute floors on coherence and density and a ceiling on redundancy.
/// Applied before any epoch or tier is considered.
#[derive(Clone, Debug)]
pub struct QualificationGate {
    config: QualificationConfig,
}

impl QualificationGate {
    pub fn new(config: QualificationConfig) -> Self {
        Self { config }
    }

    /// `redundancy` is the effective value, after the bootstrap rule.
    pub fn check(&self, score: &NormalizedScore, redundancy: f64) -> GateDecision {
        let mut reasons = Vec::new();
        if score.verdict == OracleVerdict::Rejected {
            reasons.push("scoring oracle rejected submission".to_string());
        }
        if score.coherence < self.config.coherence_floor {
            reasons.push(format!(
                "coherence {} below floor {}",
                score.coherence, self.config.coherence_floor
            ));
        }
        if score.density < self.config.density_floor {
            reasons.push(format!(
                "density {} below floor {}",
                score.density, self.config.density_floor
            ));
        }
        if redundancy > self.config.redundancy_ceiling {
            reasons.push(format!(
                "redundancy {} above ceiling {}",
                redundancy, self.config.redundancy_ceiling
            ));
        }
        GateDecision {
            passed: reasons.is_empty(),
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreInput;

    fn gate() -> QualificationGate {
        QualificationGate::new(QualificationConfig::default())
    }

    #[test]
    fn passes_at_exact_floors() {
        let score = ScoreInput::new(4000.0, 4000.0, 5000.0, &["gold"]).normalize().unwrap();
        assert!(gate().check(&score, score.redundancy).passed);
    }

    #[test]
    fn collects_every_failed_condition() {
        let score = ScoreInput::new(3999.0, 100.0, 9000.0, &["gold"])
            .rejected()
            .normalize()
            .unwrap();
        let decision = gate().check(&score, score.redundancy);
        assert!(!decision.passed);
        assert_eq!(decision.reasons.len(), 4);
        assert!(decision.reason().starts_with("scoring oracle rejected submission"));
    }

    #[test]
    fn bootstrap_override_clears_redundancy() {
        let score = ScoreInput::new(9000.0, 9000.0, 9000.0, &["gold"]).normalize().unwrap();
        assert!(!gate().check(&score, score.redundancy).passed);
        assert!(gate().check(&score, 0.0).passed);
    }
}

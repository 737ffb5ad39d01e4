use crate::tier::UnknownVariant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of an archived contribution.
///
/// `Draft → Pending → Evaluating → {Qualified | Unqualified}`. The only
/// backwards edge is `Evaluating → Pending`, used when the external scoring
/// round-trip fails and the evaluation is abandoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Draft,
    Pending,
    Evaluating,
    Qualified,
    Unqualified,
}

impl LifecycleStatus {
    pub const ALL: [LifecycleStatus; 5] = [
        LifecycleStatus::Draft,
        LifecycleStatus::Pending,
        LifecycleStatus::Evaluating,
        LifecycleStatus::Qualified,
        LifecycleStatus::Unqualified,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Qualified | LifecycleStatus::Unqualified)
    }

    pub fn can_transition_to(&self, next: LifecycleStatus) -> bool {
        use LifecycleStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Pending, Evaluating)
                | (Evaluating, Qualified)
                | (Evaluating, Unqualified)
                | (Evaluating, Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Draft => "draft",
            LifecycleStatus::Pending => "pending",
            LifecycleStatus::Evaluating => "evaluating",
            LifecycleStatus::Qualified => "qualified",
            LifecycleStatus::Unqualified => "unqualified",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LifecycleStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or(UnknownVariant {
                kind: "status",
                value: wanted,
            })
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A string that names no known metal or epoch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Reward tier of a contribution.
///
/// Gold marks scientific contributions, Silver technical ones and Copper
/// alignment work. A contribution may carry up to all three.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metal {
    Gold,
    Silver,
    Copper,
}

impl Metal {
    pub const ALL: [Metal; 3] = [Metal::Gold, Metal::Silver, Metal::Copper];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metal::Gold => "gold",
            Metal::Silver => "silver",
            Metal::Copper => "copper",
        }
    }

    /// Contribution domain the tier stands for.
    pub fn domain(&self) -> &'static str {
        match self {
            Metal::Gold => "scientific",
            Metal::Silver => "technical",
            Metal::Copper => "alignment",
        }
    }
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metal {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gold" => Ok(Metal::Gold),
            "silver" => Ok(Metal::Silver),
            "copper" => Ok(Metal::Copper),
            other => Err(UnknownVariant {
                kind: "metal",
                value: other.to_string(),
            }),
        }
    }
}

/// Token distribution phase. Declared in sequence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Epoch {
    Founder,
    Pioneer,
    Community,
    Ecosystem,
}

impl Epoch {
    /// All epochs in distribution sequence, most exclusive first.
    pub const ALL: [Epoch; 4] = [
        Epoch::Founder,
        Epoch::Pioneer,
        Epoch::Community,
        Epoch::Ecosystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Epoch::Founder => "founder",
            Epoch::Pioneer => "pioneer",
            Epoch::Community => "community",
            Epoch::Ecosystem => "ecosystem",
        }
    }

    /// The epoch that follows this one, if any.
    pub fn next(&self) -> Option<Epoch> {
        match self {
            Epoch::Founder => Some(Epoch::Pioneer),
            Epoch::Pioneer => Some(Epoch::Community),
            Epoch::Community => Some(Epoch::Ecosystem),
            Epoch::Ecosystem => None,
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Epoch {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "founder" => Ok(Epoch::Founder),
            "pioneer" => Ok(Epoch::Pioneer),
            "community" => Ok(Epoch::Community),
            "ecosystem" => Ok(Epoch::Ecosystem),
            other => Err(UnknownVariant {
                kind: "epoch",
                value: other.to_string(),
            }),
        }
    }
}

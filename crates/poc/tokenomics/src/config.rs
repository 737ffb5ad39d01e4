use crate::error::{LedgerError, LedgerResult};
use poc_types::{Epoch, Metal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Economic constants of the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenomicsConfig {
    /// Fixed total supply across all epochs
    pub total_supply: f64,
    /// Fraction of the supply assigned to each epoch; sums to 1.0
    pub distribution: BTreeMap<Epoch, f64>,
    /// Minimum density that qualifies a contribution for each epoch
    pub density_thresholds: BTreeMap<Epoch, f64>,
    /// Reward weight of each metal when several share an epoch
    pub multipliers: BTreeMap<Metal, f64>,
    /// Epochs in which each metal may earn
    pub availability: BTreeMap<Metal, BTreeSet<Epoch>>,
    /// Cumulative coherence between two Founder halvings
    pub halving_interval: f64,
}

impl Default for TokenomicsConfig {
    fn default() -> Self {
        Self {
            total_supply: 90_000_000_000_000.0,
            distribution: BTreeMap::from([
                (Epoch::Founder, 0.50),
                (Epoch::Pioneer, 0.10),
                (Epoch::Community, 0.20),
                (Epoch::Ecosystem, 0.20),
            ]),
            density_thresholds: BTreeMap::from([
                (Epoch::Founder, 8000.0),
                (Epoch::Pioneer, 6000.0),
                (Epoch::Community, 5000.0),
                (Epoch::Ecosystem, 4000.0),
            ]),
            multipliers: BTreeMap::from([
                (Metal::Gold, 1000.0),
                (Metal::Silver, 100.0),
                (Metal::Copper, 1.0),
            ]),
            availability: BTreeMap::from([
                (
                    Metal::Gold,
                    BTreeSet::from([Epoch::Founder, Epoch::Pioneer]),
                ),
                (
                    Metal::Silver,
                    BTreeSet::from([Epoch::Pioneer, Epoch::Community, Epoch::Ecosystem]),
                ),
                (
                    Metal::Copper,
                    BTreeSet::from([Epoch::Community, Epoch::Ecosystem]),
                ),
            ]),
            halving_interval: 1_000_000.0,
        }
    }
}

impl TokenomicsConfig {
    /// Initial balance of `epoch`: its distribution share of the supply.
    pub fn initial_balance(&self, epoch: Epoch) -> f64 {
        self.total_supply * self.distribution.get(&epoch).copied().unwrap_or(0.0)
    }

    pub fn threshold(&self, epoch: Epoch) -> f64 {
        self.density_thresholds
            .get(&epoch)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    pub fn multiplier(&self, metal: Metal) -> f64 {
        self.multipliers.get(&metal).copied().unwrap_or(0.0)
    }

    pub fn is_available(&self, metal: Metal, epoch: Epoch) -> bool {
        self.availability
            .get(&metal)
            .map(|epochs| epochs.contains(&epoch))
            .unwrap_or(false)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if !self.total_supply.is_finite() || self.total_supply <= 0.0 {
            return Err(LedgerError::InvalidConfig(format!(
                "total_supply must be positive, got {}",
                self.total_supply
            )));
        }

        let mut sum = 0.0;
        for epoch in Epoch::ALL {
            let share = self.distribution.get(&epoch).copied().ok_or_else(|| {
                LedgerError::InvalidConfig(format!("distribution is missing {epoch}"))
            })?;
            if !share.is_finite() || share < 0.0 {
                return Err(LedgerError::InvalidConfig(format!(
                    "distribution share of {epoch} must be non-negative, got {share}"
                )));
            }
            sum += share;

            let threshold = self.threshold(epoch);
            if !threshold.is_finite() || !(0.0..=10_000.0).contains(&threshold) {
                return Err(LedgerError::InvalidConfig(format!(
                    "density threshold of {epoch} must lie in 0..=10000"
                )));
            }
        }
        if (sum - 1.0).abs() > 1e-9 {
            return Err(LedgerError::InvalidConfig(format!(
                "distribution must sum to 1.0, got {sum}"
            )));
        }

        for metal in Metal::ALL {
            let multiplier = self.multiplier(metal);
            if !multiplier.is_finite() || multiplier <= 0.0 {
                return Err(LedgerError::InvalidConfig(format!(
                    "multiplier of {metal} must be positive, got {multiplier}"
                )));
            }
            if self.availability.get(&metal).map_or(true, |e| e.is_empty()) {
                return Err(LedgerError::InvalidConfig(format!(
                    "{metal} has no epoch in which it may earn"
                )));
            }
        }

        if !self.halving_interval.is_finite() || self.halving_interval <= 0.0 {
            return Err(LedgerError::InvalidConfig(format!(
                "halving_interval must be positive, got {}",
                self.halving_interval
            )));
        }
        Ok(())
    }
}

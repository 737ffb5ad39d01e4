use crate::config::TokenomicsConfig;
use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use poc_types::{ContributorId, Epoch, Metal, SubmissionId, MAX_SCORE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

/// Relative tolerance of the supply conservation identity, as a fraction of
/// the total supply. Covers floating point drift across many allocations.
pub const CONSERVATION_TOLERANCE: f64 = 1e-9;

/// Allocation records kept in memory and on disk when nothing else is set.
pub const DEFAULT_HISTORY_CAP: usize = 1000;

/// Immutable record of one recorded reward line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub submission_id: SubmissionId,
    pub contributor: ContributorId,
    pub epoch: Epoch,
    pub metal: Metal,
    pub pod_score: f64,
    pub share: f64,
    pub reward: f64,
    pub balance_after: f64,
    pub timestamp: DateTime<Utc>,
}

/// A priced but not yet recorded allocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationQuote {
    pub epoch: Epoch,
    pub metal: Metal,
    pub pod_score: f64,
    /// Multiplier share among the metals legal in `epoch`.
    pub share: f64,
    pub base_reward: f64,
    pub reward: f64,
    pub balance_before: f64,
}

/// Per-epoch view for operators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub epoch: Epoch,
    pub initial: f64,
    pub balance: f64,
    pub distributed: f64,
    pub threshold: f64,
    pub tiers: Vec<Metal>,
    pub current: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    pub total_supply: f64,
    pub total_allocated: f64,
    pub allocation_count: u64,
    pub per_epoch_distributed: BTreeMap<Epoch, f64>,
    pub halving_count: u32,
    pub halving_burned: f64,
    pub cumulative_coherence: f64,
    pub current_epoch: Epoch,
    pub contributors: usize,
    pub history_len: usize,
}

/// Persisted ledger document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub initial: BTreeMap<Epoch, f64>,
    pub balances: BTreeMap<Epoch, f64>,
    #[serde(default)]
    pub distributed: BTreeMap<Epoch, f64>,
    #[serde(default)]
    pub contributor_balances: BTreeMap<ContributorId, f64>,
    #[serde(default)]
    pub cumulative_coherence: f64,
    #[serde(default)]
    pub halving_count: u32,
    #[serde(default)]
    pub halving_burned: f64,
    pub current_epoch: Epoch,
    /// Most recent records only; totals below keep counting past the cap.
    #[serde(default)]
    pub history: VecDeque<AllocationRecord>,
    #[serde(default)]
    pub total_allocated: f64,
    #[serde(default)]
    pub allocation_count: u64,
}

impl LedgerState {
    /// Fresh state with every epoch at its initial balance.
    pub fn genesis(config: &TokenomicsConfig) -> Self {
        let initial: BTreeMap<Epoch, f64> = Epoch::ALL
            .iter()
            .map(|epoch| (*epoch, config.initial_balance(*epoch)))
            .collect();
        Self {
            balances: initial.clone(),
            distributed: Epoch::ALL.iter().map(|epoch| (*epoch, 0.0)).collect(),
            initial,
            contributor_balances: BTreeMap::new(),
            cumulative_coherence: 0.0,
            halving_count: 0,
            halving_burned: 0.0,
            current_epoch: Epoch::Founder,
            history: VecDeque::new(),
            total_allocated: 0.0,
            allocation_count: 0,
        }
    }
}

/// Ledger logic over a [`LedgerState`]. Cheap to clone, which is how
/// multi-step transactions are staged.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenLedger {
    config: TokenomicsConfig,
    state: LedgerState,
    history_cap: usize,
}

impl TokenLedger {
    pub fn new(config: TokenomicsConfig) -> LedgerResult<Self> {
        config.validate()?;
        let state = LedgerState::genesis(&config);
        Ok(Self {
            config,
            state,
            history_cap: DEFAULT_HISTORY_CAP,
        })
    }

    /// Resume from a persisted state. Persisted balances win over the
    /// configured supply.
    pub fn from_state(config: TokenomicsConfig, state: LedgerState) -> LedgerResult<Self> {
        config.validate()?;
        let mut ledger = Self {
            config,
            state,
            history_cap: DEFAULT_HISTORY_CAP,
        };
        ledger.refresh_current_epoch();
        Ok(ledger)
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self.trim_history();
        self
    }

    pub fn config(&self) -> &TokenomicsConfig {
        &self.config
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn history(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.state.history.iter()
    }

    pub fn balance(&self, epoch: Epoch) -> f64 {
        self.state.balances.get(&epoch).copied().unwrap_or(0.0)
    }

    pub fn initial_balance(&self, epoch: Epoch) -> f64 {
        self.state.initial.get(&epoch).copied().unwrap_or(0.0)
    }

    pub fn current_epoch(&self) -> Epoch {
        self.state.current_epoch
    }

    pub fn halving_count(&self) -> u32 {
        self.state.halving_count
    }

    pub fn cumulative_coherence(&self) -> f64 {
        self.state.cumulative_coherence
    }

    pub fn contributor_balance(&self, contributor: &ContributorId) -> f64 {
        self.state
            .contributor_balances
            .get(contributor)
            .copied()
            .unwrap_or(0.0)
    }

    /// Highest epoch whose density threshold is met, else the last epoch.
    pub fn qualify_epoch(&self, density: f64) -> Epoch {
        Epoch::ALL
            .into_iter()
            .find(|epoch| density >= self.config.threshold(*epoch))
            .unwrap_or(Epoch::Ecosystem)
    }

    pub fn is_tier_available(&self, metal: Metal, epoch: Epoch) -> bool {
        self.config.is_available(metal, epoch)
    }

    /// Metals that may earn in `epoch`.
    pub fn legal_tiers(&self, epoch: Epoch) -> Vec<Metal> {
        Metal::ALL
            .into_iter()
            .filter(|metal| self.is_tier_available(*metal, epoch))
            .collect()
    }

    /// Price an allocation without changing any balance.
    ///
    /// `reward = pod/10000 × balance`, scaled by the metal's multiplier
    /// share when more than one metal is legal in the epoch, and never more
    /// than the balance.
    pub fn calculate_allocation(
        &self,
        pod_score: f64,
        epoch: Epoch,
        metal: Metal,
    ) -> LedgerResult<AllocationQuote> {
        check_score("pod_score", pod_score)?;
        if !self.is_tier_available(metal, epoch) {
            return Err(LedgerError::TierUnavailable { metal, epoch });
        }
        let balance = self.balance(epoch);
        if balance <= 0.0 {
            return Err(LedgerError::EpochExhausted(epoch));
        }

        let legal = self.legal_tiers(epoch);
        let share = if legal.len() == 1 {
            1.0
        } else {
            let total: f64 = legal.iter().map(|m| self.config.multiplier(*m)).sum();
            self.config.multiplier(metal) / total
        };

        let base_reward = pod_score / MAX_SCORE * balance;
        let reward = (base_reward * share).min(balance);

        Ok(AllocationQuote {
            epoch,
            metal,
            pod_score,
            share,
            base_reward,
            reward,
            balance_before: balance,
        })
    }

    /// Record a priced allocation and feed `coherence` into the halving
    /// counter. The reward is clamped to the balance at recording time.
    pub fn record_allocation(
        &mut self,
        submission_id: &SubmissionId,
        contributor: &ContributorId,
        quote: &AllocationQuote,
        coherence: f64,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<AllocationRecord> {
        check_score("coherence", coherence)?;
        if !self.is_tier_available(quote.metal, quote.epoch) {
            return Err(LedgerError::TierUnavailable {
                metal: quote.metal,
                epoch: quote.epoch,
            });
        }
        let balance = self.balance(quote.epoch);
        if balance <= 0.0 {
            return Err(LedgerError::EpochExhausted(quote.epoch));
        }

        let reward = quote.reward.clamp(0.0, balance);
        let balance_after = balance - reward;
        self.state.balances.insert(quote.epoch, balance_after);
        *self.state.distributed.entry(quote.epoch).or_insert(0.0) += reward;
        *self
            .state
            .contributor_balances
            .entry(contributor.clone())
            .or_insert(0.0) += reward;
        self.state.total_allocated += reward;
        self.state.allocation_count += 1;

        let record = AllocationRecord {
            submission_id: submission_id.clone(),
            contributor: contributor.clone(),
            epoch: quote.epoch,
            metal: quote.metal,
            pod_score: quote.pod_score,
            share: quote.share,
            reward,
            balance_after,
            timestamp,
        };
        self.state.history.push_back(record.clone());
        self.trim_history();

        info!(
            submission = %submission_id,
            contributor = %contributor,
            epoch = %quote.epoch,
            metal = %quote.metal,
            reward,
            balance_after,
            "allocation recorded"
        );

        self.update_coherence_density(coherence)?;
        self.refresh_current_epoch();
        Ok(record)
    }

    /// Add `coherence` to the running total and halve the Founder balance
    /// once per interval crossed. Returns the number of halvings triggered.
    pub fn update_coherence_density(&mut self, coherence: f64) -> LedgerResult<u32> {
        if !coherence.is_finite() || coherence < 0.0 {
            return Err(LedgerError::InvalidScore {
                field: "coherence",
                value: coherence,
            });
        }
        self.state.cumulative_coherence += coherence;

        // Float-to-int `as` saturates, so absurd totals cap the counter.
        let crossed = (self.state.cumulative_coherence / self.config.halving_interval).floor() as u32;
        let triggered = crossed.saturating_sub(self.state.halving_count);
        if triggered > 0 {
            let before = self.balance(Epoch::Founder);
            let after = before * 0.5f64.powf(f64::from(triggered));
            self.state.balances.insert(Epoch::Founder, after);
            self.state.halving_burned += before - after;
            self.state.halving_count += triggered;

            info!(
                halvings = triggered,
                halving_count = self.state.halving_count,
                cumulative = self.state.cumulative_coherence,
                founder_balance = after,
                "founder balance halved"
            );
            self.refresh_current_epoch();
        }
        Ok(triggered)
    }

    pub fn epochs(&self) -> Vec<EpochInfo> {
        Epoch::ALL
            .into_iter()
            .map(|epoch| EpochInfo {
                epoch,
                initial: self.initial_balance(epoch),
                balance: self.balance(epoch),
                distributed: self.state.distributed.get(&epoch).copied().unwrap_or(0.0),
                threshold: self.config.threshold(epoch),
                tiers: self.legal_tiers(epoch),
                current: epoch == self.state.current_epoch,
            })
            .collect()
    }

    pub fn statistics(&self) -> LedgerStatistics {
        LedgerStatistics {
            total_supply: self.state.initial.values().sum(),
            total_allocated: self.state.total_allocated,
            allocation_count: self.state.allocation_count,
            per_epoch_distributed: self.state.distributed.clone(),
            halving_count: self.state.halving_count,
            halving_burned: self.state.halving_burned,
            cumulative_coherence: self.state.cumulative_coherence,
            current_epoch: self.state.current_epoch,
            contributors: self.state.contributor_balances.len(),
            history_len: self.state.history.len(),
        }
    }

    /// `Σ(initial − balance) − (Σ rewards + halving_burned)`; zero when the
    /// books balance.
    pub fn conservation_gap(&self) -> f64 {
        let drawn: f64 = Epoch::ALL
            .into_iter()
            .map(|epoch| self.initial_balance(epoch) - self.balance(epoch))
            .sum();
        drawn - (self.state.total_allocated + self.state.halving_burned)
    }

    pub fn is_conserved(&self) -> bool {
        let supply: f64 = self.state.initial.values().sum();
        self.conservation_gap().abs() <= CONSERVATION_TOLERANCE * supply.max(1.0)
    }

    /// Contributors that have received any reward, in id order.
    pub fn contributors(&self) -> BTreeSet<&ContributorId> {
        self.state.contributor_balances.keys().collect()
    }

    fn refresh_current_epoch(&mut self) {
        let next = Epoch::ALL
            .into_iter()
            .find(|epoch| self.balance(*epoch) > 0.0)
            .unwrap_or(Epoch::Ecosystem);
        if next != self.state.current_epoch {
            info!(from = %self.state.current_epoch, to = %next, "current epoch advanced");
            self.state.current_epoch = next;
        }
    }

    fn trim_history(&mut self) {
        let mut dropped = 0;
        while self.state.history.len() > self.history_cap {
            self.state.history.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, cap = self.history_cap, "allocation history trimmed");
        }
    }
}

fn check_score(field: &'static str, value: f64) -> LedgerResult<()> {
    if !value.is_finite() || !(0.0..=MAX_SCORE).contains(&value) {
        return Err(LedgerError::InvalidScore { field, value });
    }
    Ok(())
}

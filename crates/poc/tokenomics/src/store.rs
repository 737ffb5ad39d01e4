use crate::config::TokenomicsConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{
    AllocationQuote, AllocationRecord, EpochInfo, LedgerState, LedgerStatistics, TokenLedger,
};
use chrono::Utc;
use poc_types::{
    ContributorId, Epoch, InMemorySnapshot, JsonFileSnapshot, Metal, SnapshotStore, SubmissionId,
};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

/// Durable ledger handle.
///
/// Writes stage on a copy of the ledger, persist the full state and publish
/// only after the write succeeds. Build first, commit after durability.
pub struct LedgerStore {
    ledger: RwLock<Arc<TokenLedger>>,
    persistence: Arc<dyn SnapshotStore<LedgerState>>,
}

impl LedgerStore {
    pub fn open(
        config: TokenomicsConfig,
        history_cap: usize,
        persistence: Arc<dyn SnapshotStore<LedgerState>>,
    ) -> LedgerResult<Self> {
        let ledger = match persistence.load()? {
            Some(state) => TokenLedger::from_state(config, state)?,
            None => TokenLedger::new(config)?,
        }
        .with_history_cap(history_cap);

        if !ledger.is_conserved() {
            warn!(
                gap = ledger.conservation_gap(),
                "persisted ledger does not balance against its initial supply"
            );
        }
        info!(
            current_epoch = %ledger.current_epoch(),
            allocations = ledger.statistics().allocation_count,
            halvings = ledger.halving_count(),
            "ledger opened"
        );

        Ok(Self {
            ledger: RwLock::new(Arc::new(ledger)),
            persistence,
        })
    }

    pub fn open_file(
        config: TokenomicsConfig,
        history_cap: usize,
        path: impl Into<PathBuf>,
    ) -> LedgerResult<Self> {
        Self::open(config, history_cap, Arc::new(JsonFileSnapshot::new(path)))
    }

    pub fn in_memory(config: TokenomicsConfig) -> LedgerResult<Self> {
        Self::open(
            config,
            crate::ledger::DEFAULT_HISTORY_CAP,
            Arc::new(InMemorySnapshot::<LedgerState>::new()),
        )
    }

    /// Consistent read-only view.
    pub fn snapshot(&self) -> LedgerResult<Arc<TokenLedger>> {
        let guard = self.ledger.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Apply several mutations as one unit: stage on a copy, persist once.
    /// Nothing is published when `apply` or the write fails.
    pub fn transact<R>(
        &self,
        apply: impl FnOnce(&mut TokenLedger) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        let mut guard = self.ledger.write().map_err(|_| LedgerError::LockPoisoned)?;

        let mut next = TokenLedger::clone(&guard);
        let outcome = apply(&mut next)?;

        if let Err(err) = self.persistence.save(next.state()) {
            error!(error = %err, "ledger snapshot write failed; keeping previous state");
            return Err(err.into());
        }

        *guard = Arc::new(next);
        Ok(outcome)
    }

    /// Persist and publish `previous` again. Used to undo a committed
    /// transaction when a dependent write elsewhere failed.
    pub fn restore(&self, previous: Arc<TokenLedger>) -> LedgerResult<()> {
        let mut guard = self.ledger.write().map_err(|_| LedgerError::LockPoisoned)?;
        self.persistence.save(previous.state())?;
        *guard = previous;
        warn!("ledger restored to an earlier state");
        Ok(())
    }

    pub fn calculate_allocation(
        &self,
        pod_score: f64,
        epoch: Epoch,
        metal: Metal,
    ) -> LedgerResult<AllocationQuote> {
        self.snapshot()?.calculate_allocation(pod_score, epoch, metal)
    }

    pub fn record_allocation(
        &self,
        submission_id: &SubmissionId,
        contributor: &ContributorId,
        quote: &AllocationQuote,
        coherence: f64,
    ) -> LedgerResult<AllocationRecord> {
        let now = Utc::now();
        self.transact(|ledger| {
            ledger.record_allocation(submission_id, contributor, quote, coherence, now)
        })
    }

    pub fn update_coherence_density(&self, coherence: f64) -> LedgerResult<u32> {
        self.transact(|ledger| ledger.update_coherence_density(coherence))
    }

    pub fn statistics(&self) -> LedgerResult<LedgerStatistics> {
        Ok(self.snapshot()?.statistics())
    }

    pub fn epochs(&self) -> LedgerResult<Vec<EpochInfo>> {
        Ok(self.snapshot()?.epochs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(store: &LedgerStore, pod: f64) -> AllocationQuote {
        store
            .calculate_allocation(pod, Epoch::Founder, Metal::Gold)
            .unwrap()
    }

    #[test]
    fn failed_write_keeps_previous_ledger() {
        let persistence = Arc::new(InMemorySnapshot::<LedgerState>::new());
        let store = LedgerStore::open(TokenomicsConfig::default(), 10, persistence.clone()).unwrap();
        let before = store.snapshot().unwrap().balance(Epoch::Founder);

        persistence.set_fail_writes(true);
        let q = quote(&store, 5000.0);
        let err = store
            .record_allocation(&SubmissionId::new("a"), &ContributorId::new("alice"), &q, 9000.0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
        assert_eq!(store.snapshot().unwrap().balance(Epoch::Founder), before);
        assert_eq!(store.statistics().unwrap().allocation_count, 0);
    }

    #[test]
    fn transaction_is_all_or_nothing() {
        let store = LedgerStore::in_memory(TokenomicsConfig::default()).unwrap();
        let q = quote(&store, 1000.0);
        let result: LedgerResult<()> = store.transact(|ledger| {
            ledger.record_allocation(
                &SubmissionId::new("a"),
                &ContributorId::new("alice"),
                &q,
                0.0,
                Utc::now(),
            )?;
            ledger.calculate_allocation(1000.0, Epoch::Founder, Metal::Copper)?;
            Ok(())
        });
        assert!(matches!(result, Err(LedgerError::TierUnavailable { .. })));
        assert_eq!(store.statistics().unwrap().allocation_count, 0);
    }

    #[test]
    fn restore_undoes_a_committed_transaction() {
        let store = LedgerStore::in_memory(TokenomicsConfig::default()).unwrap();
        let previous = store.snapshot().unwrap();
        let q = quote(&store, 1000.0);
        store
            .record_allocation(&SubmissionId::new("a"), &ContributorId::new("alice"), &q, 0.0)
            .unwrap();
        store.restore(previous.clone()).unwrap();
        assert_eq!(*store.snapshot().unwrap(), *previous);
    }

    #[test]
    fn reopen_from_file_resumes_balances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let expected = {
            let store =
                LedgerStore::open_file(TokenomicsConfig::default(), 100, &path).unwrap();
            let q = quote(&store, 9000.0);
            store
                .record_allocation(&SubmissionId::new("a"), &ContributorId::new("alice"), &q, 9000.0)
                .unwrap();
            store.snapshot().unwrap().balance(Epoch::Founder)
        };

        let reopened = LedgerStore::open_file(TokenomicsConfig::default(), 100, &path).unwrap();
        let ledger = reopened.snapshot().unwrap();
        assert!((ledger.balance(Epoch::Founder) - expected).abs() < 1e-3);
        assert_eq!(ledger.statistics().allocation_count, 1);
        assert!(ledger.is_conserved());
    }
}

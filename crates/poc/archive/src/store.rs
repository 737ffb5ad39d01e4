use crate::error::{ArchiveError, ArchiveResult};
use crate::state::{ArchiveQuery, ArchiveState, ArchiveStatistics};
use chrono::Utc;
use poc_types::{
    ContentHash, Contribution, ContributionPatch, InMemorySnapshot, JsonFileSnapshot,
    SnapshotStore, SubmissionId,
};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// The archive: every contribution in every lifecycle state.
///
/// Readers take an `Arc` snapshot and never block writers for longer than a
/// pointer clone. Writers serialize on the lock, build the next state on a
/// copy, persist it, and publish it only after the write succeeded.
pub struct ContentStore {
    state: RwLock<Arc<ArchiveState>>,
    persistence: Arc<dyn SnapshotStore<ArchiveState>>,
}

impl ContentStore {
    /// Open the archive from `persistence`, rebuilding indexes from the
    /// primary map.
    pub fn open(persistence: Arc<dyn SnapshotStore<ArchiveState>>) -> ArchiveResult<Self> {
        let state = match persistence.load()? {
            Some(mut state) => {
                if state.rebuild_indexes() {
                    warn!(
                        records = state.len(),
                        "archive indexes drifted from primary map; rebuilt"
                    );
                }
                state.refresh_summary();
                state
            }
            None => ArchiveState::new(),
        };

        info!(
            records = state.len(),
            next_sequence = state.next_sequence(),
            "archive opened"
        );

        Ok(Self {
            state: RwLock::new(Arc::new(state)),
            persistence,
        })
    }

    /// Open a JSON-file backed archive.
    pub fn open_file(path: impl Into<PathBuf>) -> ArchiveResult<Self> {
        Self::open(Arc::new(JsonFileSnapshot::new(path)))
    }

    /// Archive with no durable backing.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(Arc::new(ArchiveState::new())),
            persistence: Arc::new(InMemorySnapshot::<ArchiveState>::new()),
        }
    }

    /// Consistent point-in-time view of the whole archive.
    pub fn snapshot(&self) -> ArchiveResult<Arc<ArchiveState>> {
        let guard = self.state.read().map_err(|_| ArchiveError::LockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Archive a new contribution. The store assigns its sequence number.
    pub fn add(&self, contribution: Contribution) -> ArchiveResult<Contribution> {
        let added = self.mutate(|state| state.insert(contribution))?;
        debug!(
            submission = %added.submission_id,
            sequence = added.sequence,
            hash = %added.content_hash,
            "contribution archived"
        );
        Ok(added)
    }

    pub fn get(&self, id: &SubmissionId) -> ArchiveResult<Contribution> {
        self.snapshot()?
            .get(id)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(id.clone()))
    }

    /// Apply `patch` atomically. On any failure the stored record is unchanged.
    pub fn update(&self, id: &SubmissionId, patch: ContributionPatch) -> ArchiveResult<Contribution> {
        let now = Utc::now();
        let updated = self.mutate(|state| state.apply_patch(id, patch, now))?;
        debug!(submission = %id, status = %updated.status, "contribution updated");
        Ok(updated)
    }

    pub fn query(&self, query: &ArchiveQuery) -> ArchiveResult<Vec<Contribution>> {
        Ok(self
            .snapshot()?
            .query(query)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn content_hash_history(&self, hash: &ContentHash) -> ArchiveResult<Vec<Contribution>> {
        Ok(self
            .snapshot()?
            .content_hash_history(hash)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn statistics(&self) -> ArchiveResult<ArchiveStatistics> {
        Ok(self.snapshot()?.statistics().clone())
    }

    pub fn is_first_archived(&self, id: &SubmissionId) -> ArchiveResult<bool> {
        self.snapshot()?.is_first_archived(id)
    }

    /// Delete every record flagged as test data. The only deletion path.
    pub fn purge_test_data(&self) -> ArchiveResult<Vec<SubmissionId>> {
        let purged = self.mutate(|state| {
            let ids = state.test_record_ids();
            for id in &ids {
                state.remove(id);
            }
            Ok(ids)
        })?;
        info!(purged = purged.len(), "test data purged from archive");
        Ok(purged)
    }

    fn mutate<R>(
        &self,
        apply: impl FnOnce(&mut ArchiveState) -> ArchiveResult<R>,
    ) -> ArchiveResult<R> {
        let mut guard = self.state.write().map_err(|_| ArchiveError::LockPoisoned)?;

        let mut next = ArchiveState::clone(&guard);
        let outcome = apply(&mut next)?;
        next.refresh_summary();

        if let Err(err) = self.persistence.save(&next) {
            warn!(error = %err, "archive snapshot write failed; keeping previous state");
            return Err(err.into());
        }

        *guard = Arc::new(next);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use poc_types::{ContributionDraft, ContributorId, LifecycleStatus, MetadataPatch, Metal};

    fn draft(id: &str, text: &str, is_test: bool, at: DateTime<Utc>) -> Contribution {
        Contribution::from_draft(
            SubmissionId::new(id),
            ContributionDraft {
                title: id.to_string(),
                contributor: ContributorId::new("alice"),
                text: text.to_string(),
                category: None,
                is_test,
            },
            at,
        )
    }

    fn advance(store: &ContentStore, id: &SubmissionId, status: LifecycleStatus) {
        store.update(id, ContributionPatch::status(status)).unwrap();
    }

    #[test]
    fn add_assigns_increasing_sequences() {
        let store = ContentStore::in_memory();
        let now = Utc::now();
        let a = store.add(draft("a", "one", false, now)).unwrap();
        let b = store.add(draft("b", "two", false, now)).unwrap();
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
        assert!(matches!(
            store.add(draft("a", "three", false, now)),
            Err(ArchiveError::DuplicateId(_))
        ));
    }

    #[test]
    fn failed_write_rolls_back_memory() {
        let persistence = Arc::new(InMemorySnapshot::<ArchiveState>::new());
        let store = ContentStore::open(persistence.clone()).unwrap();
        let id = SubmissionId::new("a");
        store.add(draft("a", "alpha", false, Utc::now())).unwrap();

        persistence.set_fail_writes(true);
        let err = store
            .update(&id, ContributionPatch::status(LifecycleStatus::Pending))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Persistence(_)));
        assert_eq!(store.get(&id).unwrap().status, LifecycleStatus::Draft);

        persistence.set_fail_writes(false);
        advance(&store, &id, LifecycleStatus::Pending);
        assert_eq!(store.get(&id).unwrap().status, LifecycleStatus::Pending);
    }

    #[test]
    fn reload_reproduces_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.json");
        let id = SubmissionId::new("a");
        {
            let store = ContentStore::open_file(&path).unwrap();
            store.add(draft("a", "alpha beta", false, Utc::now())).unwrap();
            store.add(draft("b", "alpha beta", false, Utc::now())).unwrap();
            advance(&store, &id, LifecycleStatus::Pending);
            advance(&store, &id, LifecycleStatus::Evaluating);
            store
                .update(
                    &id,
                    ContributionPatch {
                        status: Some(LifecycleStatus::Qualified),
                        metals: Some([Metal::Gold].into_iter().collect()),
                        metadata: MetadataPatch {
                            category: Some("physics".into()),
                            ..Default::default()
                        },
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        let before = ContentStore::open_file(&path).unwrap().snapshot().unwrap();
        let reopened = ContentStore::open_file(&path).unwrap();
        let after = reopened.snapshot().unwrap();
        assert_eq!(*before, *after);

        let stats = reopened.statistics().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.qualified, 1);
        assert_eq!(stats.duplicate_hash_groups, 1);

        let c = reopened.add(draft("c", "gamma", false, Utc::now())).unwrap();
        assert_eq!(c.sequence, 2);
    }

    #[test]
    fn purge_removes_only_test_records() {
        let store = ContentStore::in_memory();
        let now = Utc::now();
        store.add(draft("real", "alpha", false, now)).unwrap();
        store.add(draft("t1", "beta", true, now)).unwrap();
        store.add(draft("t2", "gamma", true, now)).unwrap();

        let purged = store.purge_test_data().unwrap();
        assert_eq!(purged.len(), 2);
        let stats = store.statistics().unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.test_records, 0);
        assert!(store.get(&SubmissionId::new("t1")).is_err());
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let store = ContentStore::in_memory();
        let now = Utc::now();
        store.add(draft("a", "alpha", false, now)).unwrap();
        let view = store.snapshot().unwrap();
        store
            .add(draft("b", "beta", false, now + Duration::seconds(1)))
            .unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(store.snapshot().unwrap().len(), 2);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = ContentStore::in_memory();
        let missing = SubmissionId::new("nope");
        assert!(matches!(store.get(&missing), Err(ArchiveError::NotFound(_))));
        assert!(matches!(
            store.update(&missing, ContributionPatch::default()),
            Err(ArchiveError::NotFound(_))
        ));
        assert!(matches!(
            store.is_first_archived(&missing),
            Err(ArchiveError::NotFound(_))
        ));
    }
}

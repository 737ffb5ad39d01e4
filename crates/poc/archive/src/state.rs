use crate::error::{ArchiveError, ArchiveResult};
use chrono::{DateTime, Utc};
use poc_types::{
    ContentHash, Contribution, ContributionPatch, ContributorId, LifecycleStatus, Metal,
    SubmissionId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

type Index<K> = BTreeMap<K, BTreeSet<SubmissionId>>;

/// Index filters. Absent filters match everything; present ones intersect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveQuery {
    pub status: Option<LifecycleStatus>,
    pub contributor: Option<ContributorId>,
    pub metal: Option<Metal>,
}

/// Summary counters persisted alongside the archive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStatistics {
    pub total: usize,
    pub by_status: BTreeMap<LifecycleStatus, usize>,
    pub by_metal: BTreeMap<Metal, usize>,
    pub qualified: usize,
    pub contributors: usize,
    pub distinct_content: usize,
    /// Content hashes shared by more than one submission.
    pub duplicate_hash_groups: usize,
    pub test_records: usize,
}

/// The archive document: primary map, four secondary indexes and counters.
///
/// This is both the in-memory state and the persisted snapshot shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveState {
    #[serde(default)]
    contributions: BTreeMap<SubmissionId, Contribution>,
    #[serde(default)]
    content_hash_index: Index<ContentHash>,
    #[serde(default)]
    status_index: Index<LifecycleStatus>,
    #[serde(default)]
    contributor_index: Index<ContributorId>,
    #[serde(default)]
    metal_index: Index<Metal>,
    #[serde(default)]
    summary: ArchiveStatistics,
    #[serde(default)]
    next_sequence: u64,
}

impl ArchiveState {
    pub fn new() -> Self {
        let mut state = Self::default();
        state.refresh_summary();
        state
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    pub fn get(&self, id: &SubmissionId) -> Option<&Contribution> {
        self.contributions.get(id)
    }

    pub fn contains(&self, id: &SubmissionId) -> bool {
        self.contributions.contains_key(id)
    }

    /// Every archived contribution regardless of status, in id order.
    pub fn contributions(&self) -> impl Iterator<Item = &Contribution> {
        self.contributions.values()
    }

    pub fn statistics(&self) -> &ArchiveStatistics {
        &self.summary
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Insert a new contribution, stamping its archive sequence.
    pub fn insert(&mut self, mut contribution: Contribution) -> ArchiveResult<Contribution> {
        if self.contributions.contains_key(&contribution.submission_id) {
            return Err(ArchiveError::DuplicateId(contribution.submission_id));
        }
        check_metal_invariant(&contribution)?;

        contribution.sequence = self.next_sequence;
        self.next_sequence += 1;

        self.index(&contribution);
        self.contributions
            .insert(contribution.submission_id.clone(), contribution.clone());
        Ok(contribution)
    }

    /// Apply a partial update, migrating status and metal index membership.
    pub fn apply_patch(
        &mut self,
        id: &SubmissionId,
        patch: ContributionPatch,
        now: DateTime<Utc>,
    ) -> ArchiveResult<Contribution> {
        let current = self
            .contributions
            .get(id)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(id.clone()))?;

        let mut next = current.clone();
        if let Some(status) = patch.status {
            if status != current.status && !current.status.can_transition_to(status) {
                return Err(ArchiveError::InvalidTransition {
                    id: id.clone(),
                    from: current.status,
                    to: status,
                });
            }
            next.status = status;
        }
        if let Some(title) = patch.title {
            next.title = title;
        }
        if let Some(metals) = patch.metals {
            next.metals = metals;
        }
        if let Some(scores) = patch.scores {
            next.scores = Some(scores);
        }
        next.metadata.merge(patch.metadata);
        next.updated_at = now;

        check_metal_invariant(&next)?;

        self.unindex(&current);
        self.index(&next);
        self.contributions.insert(id.clone(), next.clone());
        Ok(next)
    }

    /// Remove a contribution and every index entry pointing at it.
    pub fn remove(&mut self, id: &SubmissionId) -> Option<Contribution> {
        let removed = self.contributions.remove(id)?;
        self.unindex(&removed);
        Some(removed)
    }

    /// Contributions matching every present filter, in canonical order.
    pub fn query(&self, query: &ArchiveQuery) -> Vec<&Contribution> {
        let empty = BTreeSet::new();
        let mut filters: Vec<&BTreeSet<SubmissionId>> = Vec::new();
        if let Some(status) = query.status {
            filters.push(self.status_index.get(&status).unwrap_or(&empty));
        }
        if let Some(contributor) = &query.contributor {
            filters.push(self.contributor_index.get(contributor).unwrap_or(&empty));
        }
        if let Some(metal) = query.metal {
            filters.push(self.metal_index.get(&metal).unwrap_or(&empty));
        }

        let candidates: Option<BTreeSet<&SubmissionId>> =
            filters.into_iter().fold(None, |acc, ids| {
                Some(match acc {
                    Some(current) => current.into_iter().filter(|id| ids.contains(*id)).collect(),
                    None => ids.iter().collect(),
                })
            });

        let mut results: Vec<&Contribution> = match candidates {
            Some(ids) => ids
                .into_iter()
                .filter_map(|id| self.contributions.get(id))
                .collect(),
            None => self.contributions.values().collect(),
        };
        results.sort_by_key(|c| c.canonical_key());
        results
    }

    /// All submissions sharing `hash`, earliest (canonical) first.
    pub fn content_hash_history(&self, hash: &ContentHash) -> Vec<&Contribution> {
        let mut history: Vec<&Contribution> = self
            .content_hash_index
            .get(hash)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.contributions.get(id))
                    .collect()
            })
            .unwrap_or_default();
        history.sort_by_key(|c| c.canonical_key());
        history
    }

    /// True when `id` was the first contribution ever inserted.
    ///
    /// Sequences are never reused, so purging earlier records does not hand
    /// the bootstrap slot to a later one.
    pub fn is_first_archived(&self, id: &SubmissionId) -> ArchiveResult<bool> {
        self.contributions
            .get(id)
            .map(|c| c.sequence == 0)
            .ok_or_else(|| ArchiveError::NotFound(id.clone()))
    }

    /// Ids of every contribution flagged as test data.
    pub fn test_record_ids(&self) -> Vec<SubmissionId> {
        self.contributions
            .values()
            .filter(|c| c.is_test)
            .map(|c| c.submission_id.clone())
            .collect()
    }

    /// Rebuild all secondary indexes from the primary map.
    ///
    /// Returns `true` when the rebuilt indexes differ from the ones held
    /// before (drift between a persisted document and its primary map).
    pub fn rebuild_indexes(&mut self) -> bool {
        let previous = (
            std::mem::take(&mut self.content_hash_index),
            std::mem::take(&mut self.status_index),
            std::mem::take(&mut self.contributor_index),
            std::mem::take(&mut self.metal_index),
        );

        let contributions: Vec<Contribution> = self.contributions.values().cloned().collect();
        for contribution in &contributions {
            self.index(contribution);
        }

        let max_sequence = contributions.iter().map(|c| c.sequence + 1).max().unwrap_or(0);
        self.next_sequence = self.next_sequence.max(max_sequence);

        previous
            != (
                self.content_hash_index.clone(),
                self.status_index.clone(),
                self.contributor_index.clone(),
                self.metal_index.clone(),
            )
    }

    /// Check that every index entry points at a contribution with that key.
    pub fn validate(&self) -> ArchiveResult<()> {
        let mut rebuilt = self.clone();
        if rebuilt.rebuild_indexes() {
            return Err(ArchiveError::InvariantViolation(
                "secondary indexes disagree with the primary map".to_string(),
            ));
        }
        for contribution in self.contributions.values() {
            check_metal_invariant(contribution)?;
        }
        Ok(())
    }

    /// Recompute the summary counters from the indexes.
    pub fn refresh_summary(&mut self) {
        let by_status = LifecycleStatus::ALL
            .iter()
            .map(|status| {
                let count = self.status_index.get(status).map(|s| s.len()).unwrap_or(0);
                (*status, count)
            })
            .collect::<BTreeMap<_, _>>();
        let by_metal = Metal::ALL
            .iter()
            .map(|metal| {
                let count = self.metal_index.get(metal).map(|s| s.len()).unwrap_or(0);
                (*metal, count)
            })
            .collect::<BTreeMap<_, _>>();

        self.summary = ArchiveStatistics {
            total: self.contributions.len(),
            qualified: by_status
                .get(&LifecycleStatus::Qualified)
                .copied()
                .unwrap_or(0),
            by_status,
            by_metal,
            contributors: self.contributor_index.len(),
            distinct_content: self.content_hash_index.len(),
            duplicate_hash_groups: self
                .content_hash_index
                .values()
                .filter(|ids| ids.len() > 1)
                .count(),
            test_records: self.contributions.values().filter(|c| c.is_test).count(),
        };
    }

    fn index(&mut self, contribution: &Contribution) {
        let id = &contribution.submission_id;
        index_insert(
            &mut self.content_hash_index,
            contribution.content_hash.clone(),
            id,
        );
        index_insert(&mut self.status_index, contribution.status, id);
        index_insert(
            &mut self.contributor_index,
            contribution.contributor.clone(),
            id,
        );
        for metal in &contribution.metals {
            index_insert(&mut self.metal_index, *metal, id);
        }
    }

    fn unindex(&mut self, contribution: &Contribution) {
        let id = &contribution.submission_id;
        index_remove(&mut self.content_hash_index, &contribution.content_hash, id);
        index_remove(&mut self.status_index, &contribution.status, id);
        index_remove(&mut self.contributor_index, &contribution.contributor, id);
        for metal in &contribution.metals {
            index_remove(&mut self.metal_index, metal, id);
        }
    }
}

fn index_insert<K: Ord>(index: &mut Index<K>, key: K, id: &SubmissionId) {
    index.entry(key).or_default().insert(id.clone());
}

fn index_remove<K: Ord>(index: &mut Index<K>, key: &K, id: &SubmissionId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

fn check_metal_invariant(contribution: &Contribution) -> ArchiveResult<()> {
    let qualified = contribution.status == LifecycleStatus::Qualified;
    if qualified && contribution.metals.is_empty() {
        return Err(ArchiveError::InvariantViolation(format!(
            "qualified contribution {} must carry at least one metal",
            contribution.submission_id
        )));
    }
    if !qualified && !contribution.metals.is_empty() {
        return Err(ArchiveError::InvariantViolation(format!(
            "contribution {} carries metals while {}",
            contribution.submission_id, contribution.status
        )));
    }
    Ok(())
}

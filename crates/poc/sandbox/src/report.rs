use crate::error::{SandboxError, SandboxResult};
use crate::similarity::{classify, token_similarity, OverlapClass};
use chrono::{DateTime, Utc};
use poc_archive::ArchiveState;
use poc_types::{
    tokenize, ContentHash, ContributorId, LifecycleStatus, RedundancyAudit, SubmissionId,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

/// One archived record that overlaps the report target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RedundancyMatch {
    pub submission_id: SubmissionId,
    pub contributor: ContributorId,
    pub status: LifecycleStatus,
    pub score: f64,
    pub class: OverlapClass,
    /// Found through the content-hash index rather than pairwise comparison.
    pub hash_match: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-class counts over every compared record, not only the reported top N.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapCounts {
    pub exact_duplicate: usize,
    pub high_redundancy: usize,
    pub moderate_overlap: usize,
    pub related: usize,
}

impl OverlapCounts {
    pub fn record(&mut self, class: OverlapClass) {
        match class {
            OverlapClass::ExactDuplicate => self.exact_duplicate += 1,
            OverlapClass::HighRedundancy => self.high_redundancy += 1,
            OverlapClass::ModerateOverlap => self.moderate_overlap += 1,
            OverlapClass::Related => self.related += 1,
            OverlapClass::None => {}
        }
    }

    pub fn total(&self) -> usize {
        self.exact_duplicate + self.high_redundancy + self.moderate_overlap + self.related
    }
}

/// Archive-first redundancy report for one submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RedundancyReport {
    pub submission_id: SubmissionId,
    pub content_hash: ContentHash,
    /// Every other archived record, in every status.
    pub compared_against: usize,
    /// Highest scoring overlaps, best first.
    pub matches: Vec<RedundancyMatch>,
    pub counts: OverlapCounts,
    pub top_n: usize,
    /// True when more overlaps existed than `top_n`.
    pub truncated: bool,
}

impl RedundancyReport {
    pub fn top_match(&self) -> Option<&RedundancyMatch> {
        self.matches.first()
    }

    pub fn top_score(&self) -> f64 {
        self.top_match().map(|m| m.score).unwrap_or(0.0)
    }

    pub fn has_exact_duplicate(&self) -> bool {
        self.counts.exact_duplicate > 0
    }

    pub fn score_for(&self, id: &SubmissionId) -> Option<f64> {
        self.matches
            .iter()
            .find(|m| &m.submission_id == id)
            .map(|m| m.score)
    }

    /// Compact summary stored with the contribution.
    pub fn audit(&self, bootstrap: bool) -> RedundancyAudit {
        RedundancyAudit {
            compared_against: self.compared_against,
            top_match: self.top_match().map(|m| m.submission_id.clone()),
            top_score: self.top_score(),
            exact_duplicates: self.counts.exact_duplicate,
            high_redundancy: self.counts.high_redundancy,
            moderate_overlap: self.counts.moderate_overlap,
            related: self.counts.related,
            bootstrap,
        }
    }
}

/// Report drawn from the content-hash index alone.
///
/// Lists only the records sharing the target's hash, all exact duplicates,
/// and tokenizes nothing. `compared_against` counts those records. Used
/// once the hash has already proven duplication.
pub fn hash_duplicate_report(
    state: &ArchiveState,
    id: &SubmissionId,
    top_n: usize,
) -> SandboxResult<RedundancyReport> {
    let target = state
        .get(id)
        .ok_or_else(|| SandboxError::NotFound(id.clone()))?;

    // History is already in canonical order, which is the ranking for
    // equal scores.
    let mut matches: Vec<RedundancyMatch> = state
        .content_hash_history(&target.content_hash)
        .into_iter()
        .filter(|other| &other.submission_id != id)
        .map(|other| RedundancyMatch {
            submission_id: other.submission_id.clone(),
            contributor: other.contributor.clone(),
            status: other.status,
            score: 1.0,
            class: OverlapClass::ExactDuplicate,
            hash_match: true,
            created_at: other.created_at,
        })
        .collect();

    let compared_against = matches.len();
    let counts = OverlapCounts {
        exact_duplicate: compared_against,
        ..Default::default()
    };
    let truncated = matches.len() > top_n;
    matches.truncate(top_n);

    debug!(submission = %id, exact = compared_against, "hash duplicate report computed");

    Ok(RedundancyReport {
        submission_id: id.clone(),
        content_hash: target.content_hash.clone(),
        compared_against,
        matches,
        counts,
        top_n,
        truncated,
    })
}

/// Compare `id` against every other record in `state`.
///
/// Records sharing the target's content hash are taken from the hash index
/// as exact duplicates without tokenizing them.
pub fn redundancy_report(
    state: &ArchiveState,
    id: &SubmissionId,
    top_n: usize,
) -> SandboxResult<RedundancyReport> {
    let target = state
        .get(id)
        .ok_or_else(|| SandboxError::NotFound(id.clone()))?;

    let hash_peers: BTreeSet<&SubmissionId> = state
        .content_hash_history(&target.content_hash)
        .into_iter()
        .map(|c| &c.submission_id)
        .filter(|peer| *peer != id)
        .collect();

    let target_tokens = tokenize(&target.text);
    let mut counts = OverlapCounts::default();
    let mut matches = Vec::new();
    let mut compared_against = 0;

    for other in state.contributions() {
        if &other.submission_id == id {
            continue;
        }
        compared_against += 1;

        let hash_match = hash_peers.contains(&other.submission_id);
        let (score, class) = if hash_match {
            (1.0, OverlapClass::ExactDuplicate)
        } else {
            let score = token_similarity(&target_tokens, &tokenize(&other.text));
            (score, classify(score))
        };

        counts.record(class);
        if class.is_overlap() {
            matches.push(RedundancyMatch {
                submission_id: other.submission_id.clone(),
                contributor: other.contributor.clone(),
                status: other.status,
                score,
                class,
                hash_match,
                created_at: other.created_at,
            });
        }
    }

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.created_at.cmp(&b.created_at))
            .then_with(|| a.submission_id.cmp(&b.submission_id))
    });
    let truncated = matches.len() > top_n;
    matches.truncate(top_n);

    debug!(
        submission = %id,
        compared_against,
        overlaps = counts.total(),
        exact = counts.exact_duplicate,
        "redundancy report computed"
    );

    Ok(RedundancyReport {
        submission_id: id.clone(),
        content_hash: target.content_hash.clone(),
        compared_against,
        matches,
        counts,
        top_n,
        truncated,
    })
}

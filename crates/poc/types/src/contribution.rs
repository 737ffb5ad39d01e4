use crate::content::ContentHash;
use crate::ids::{ContributorId, SubmissionId};
use crate::lifecycle::LifecycleStatus;
use crate::metadata::{ContributionMetadata, MetadataPatch};
use crate::tier::Metal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound of every externally supplied score.
pub const MAX_SCORE: f64 = 10_000.0;

/// Scores attached once a contribution has been evaluated. All on `0..=10000`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub coherence: f64,
    pub density: f64,
    pub redundancy: f64,
    pub pod_score: f64,
}

/// An archived contribution.
///
/// `content_hash` may repeat across submissions; the earliest one in
/// canonical order (`created_at`, then `sequence`) owns the content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub submission_id: SubmissionId,
    pub title: String,
    pub contributor: ContributorId,
    pub content_hash: ContentHash,
    pub text: String,
    pub status: LifecycleStatus,
    /// Empty until qualified; one to three metals once qualified.
    #[serde(default)]
    pub metals: BTreeSet<Metal>,
    #[serde(default)]
    pub scores: Option<Scores>,
    #[serde(default)]
    pub metadata: ContributionMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Archive insertion order, assigned by the store.
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub is_test: bool,
}

impl Contribution {
    /// Build a draft record from submission input. The store assigns `sequence`.
    pub fn from_draft(
        submission_id: SubmissionId,
        draft: ContributionDraft,
        now: DateTime<Utc>,
    ) -> Self {
        let content_hash = ContentHash::of_text(&draft.text);
        Self {
            submission_id,
            title: draft.title,
            contributor: draft.contributor,
            content_hash,
            text: draft.text,
            status: LifecycleStatus::Draft,
            metals: BTreeSet::new(),
            scores: None,
            metadata: ContributionMetadata {
                category: draft.category,
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
            sequence: 0,
            is_test: draft.is_test,
        }
    }

    /// Total order used to pick the canonical owner of a content hash.
    pub fn canonical_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }

    /// True when `self` was archived strictly before `other`.
    pub fn precedes(&self, other: &Contribution) -> bool {
        self.canonical_key() < other.canonical_key()
    }
}

/// Caller-supplied fields of a new contribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributionDraft {
    pub title: String,
    pub contributor: ContributorId,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_test: bool,
}

/// Partial update applied atomically by the archive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContributionPatch {
    pub title: Option<String>,
    pub status: Option<LifecycleStatus>,
    pub metals: Option<BTreeSet<Metal>>,
    pub scores: Option<Scores>,
    pub metadata: MetadataPatch,
}

impl ContributionPatch {
    pub fn status(status: LifecycleStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataPatch) -> Self {
        self.metadata = metadata;
        self
    }
}

//! Typed extension metadata attached to contributions.
//!
//! Recognized keys are strongly typed fields. Anything else lands in
//! `extra`, so annotations written by newer tooling survive a load/save
//! cycle untouched. Recognized keys can only be written through their
//! typed field; `annotate` refuses them.

use crate::failure::Failure;
use crate::ids::SubmissionId;
use crate::tier::{Epoch, Metal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Keys with a typed home in [`ContributionMetadata`].
pub const RECOGNIZED_METADATA_KEYS: [&str; 8] = [
    "category",
    "duplicate_of",
    "failure",
    "redundancy_audit",
    "allocations",
    "oracle_verdict",
    "evaluation_started_at",
    "evaluated_at",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("metadata key '{0}' is reserved; set it through its typed field")]
    ReservedKey(String),
}

/// Audit summary of the redundancy report taken at evaluation time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RedundancyAudit {
    pub compared_against: usize,
    pub top_match: Option<SubmissionId>,
    pub top_score: f64,
    pub exact_duplicates: usize,
    pub high_redundancy: usize,
    pub moderate_overlap: usize,
    pub related: usize,
    /// The very first archived record is scored with zero redundancy.
    pub bootstrap: bool,
}

/// One reward line of an evaluation: a single metal in a single epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub metal: Metal,
    pub epoch: Epoch,
    pub pod_score: f64,
    /// Fraction of the pool the tier is entitled to in this epoch.
    pub share: f64,
    pub reward: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl AllocationLine {
    pub fn is_recorded(&self) -> bool {
        self.failure.is_none() && self.recorded_at.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<SubmissionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy_audit: Option<RedundancyAudit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<AllocationLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ContributionMetadata {
    /// Attach a forward-compatible annotation under an unrecognized key.
    pub fn annotate(&mut self, key: impl Into<String>, value: Value) -> Result<(), MetadataError> {
        let key = key.into();
        if RECOGNIZED_METADATA_KEYS.contains(&key.as_str()) {
            return Err(MetadataError::ReservedKey(key));
        }
        self.extra.insert(key, value);
        Ok(())
    }

    /// Merge a patch: present fields overwrite, absent fields are kept.
    pub fn merge(&mut self, patch: MetadataPatch) {
        if let Some(category) = patch.category {
            self.category = Some(category);
        }
        if let Some(duplicate_of) = patch.duplicate_of {
            self.duplicate_of = Some(duplicate_of);
        }
        if let Some(failure) = patch.failure {
            self.failure = failure;
        }
        if let Some(audit) = patch.redundancy_audit {
            self.redundancy_audit = Some(audit);
        }
        if let Some(allocations) = patch.allocations {
            self.allocations = allocations;
        }
        if let Some(verdict) = patch.oracle_verdict {
            self.oracle_verdict = Some(verdict);
        }
        if let Some(started) = patch.evaluation_started_at {
            self.evaluation_started_at = Some(started);
        }
        if let Some(evaluated) = patch.evaluated_at {
            self.evaluated_at = Some(evaluated);
        }
        self.extra.extend(patch.extra);
    }
}

/// Partial metadata update. `failure: Some(None)` clears a recorded failure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataPatch {
    pub category: Option<String>,
    pub duplicate_of: Option<SubmissionId>,
    pub failure: Option<Option<Failure>>,
    pub redundancy_audit: Option<RedundancyAudit>,
    pub allocations: Option<Vec<AllocationLine>>,
    pub oracle_verdict: Option<String>,
    pub evaluation_started_at: Option<DateTime<Utc>>,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub extra: BTreeMap<String, Value>,
}

impl MetadataPatch {
    pub fn is_empty(&self) -> bool {
        *self == MetadataPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;

    #[test]
    fn unknown_keys_survive_roundtrip() {
        let raw = serde_json::json!({
            "category": "physics",
            "source_file": "paper.pdf",
            "reviewer_notes": {"pass": 2}
        });
        let meta: ContributionMetadata = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(meta.category.as_deref(), Some("physics"));
        assert_eq!(meta.extra.len(), 2);
        assert_eq!(serde_json::to_value(&meta).unwrap(), raw);
    }

    #[test]
    fn annotate_refuses_reserved_keys() {
        let mut meta = ContributionMetadata::default();
        assert_eq!(
            meta.annotate("failure", Value::Null),
            Err(MetadataError::ReservedKey("failure".into()))
        );
        meta.annotate("ingest_batch", Value::from(7)).unwrap();
        assert_eq!(meta.extra["ingest_batch"], Value::from(7));
    }

    #[test]
    fn merge_keeps_absent_fields_and_can_clear_failure() {
        let mut meta = ContributionMetadata {
            category: Some("biology".into()),
            failure: Some(Failure::new(FailureKind::InvalidState, "x")),
            ..Default::default()
        };
        meta.merge(MetadataPatch {
            duplicate_of: Some(SubmissionId::new("first")),
            failure: Some(None),
            ..Default::default()
        });
        assert_eq!(meta.category.as_deref(), Some("biology"));
        assert_eq!(meta.duplicate_of, Some(SubmissionId::new("first")));
        assert!(meta.failure.is_none());
    }
}

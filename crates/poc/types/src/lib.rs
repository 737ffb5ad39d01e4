//! PoC archive shared vocabulary.
//!
//! Every other crate in the workspace speaks in these types:
//! - identifiers for submissions and contributors
//! - the `Contribution` record and its lifecycle
//! - metals (reward tiers) and epochs (distribution phases)
//! - normalized content hashing shared by the archive and the redundancy engine
//! - whole-document snapshot persistence (write temp, then rename)
//!
//! String-valued enums only exist at the serialization boundary; unknown
//! values fail to deserialize instead of passing through.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod content;
mod contribution;
mod failure;
mod ids;
mod lifecycle;
mod metadata;
pub mod snapshot;
mod tier;

pub use content::{normalize_text, tokenize, ContentHash};
pub use contribution::{Contribution, ContributionDraft, ContributionPatch, Scores, MAX_SCORE};
pub use failure::{Failure, FailureKind};
pub use ids::{ContributorId, SubmissionId};
pub use lifecycle::LifecycleStatus;
pub use metadata::{
    AllocationLine, ContributionMetadata, MetadataError, MetadataPatch, RedundancyAudit,
    RECOGNIZED_METADATA_KEYS,
};
pub use snapshot::{InMemorySnapshot, JsonFileSnapshot, SnapshotError, SnapshotStore};
pub use tier::{Epoch, Metal, UnknownVariant};

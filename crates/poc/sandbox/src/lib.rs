//! Redundancy engine for the PoC archive.
//!
//! Similarity is Jaccard overlap of lowercase token sets, the same
//! normalization the archive hashes with. Reports compare one submission
//! against every archived record in every status; maps compare every pair
//! of a filtered node set and group them into overlap clusters.
//!
//! Full maps cost O(n²) comparisons. [`MapOptions::max_nodes`] and
//! [`Bucketing::Contributor`] bound that cost explicitly, and every map
//! reports how many pairs it actually evaluated.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod cluster;
mod engine;
mod error;
mod map;
mod report;
mod similarity;

pub use cluster::Cluster;
pub use engine::RedundancyEngine;
pub use error::{SandboxError, SandboxResult};
pub use map::{full_map, Bucketing, MapNode, MapOptions, OverlapEdge, SandboxMap, SandboxStatistics};
pub use report::{
    hash_duplicate_report, redundancy_report, OverlapCounts, RedundancyMatch, RedundancyReport,
};
pub use similarity::{
    classify, similarity, token_similarity, OverlapClass, HIGH_REDUNDANCY_THRESHOLD,
    MODERATE_OVERLAP_THRESHOLD, RELATED_THRESHOLD,
};

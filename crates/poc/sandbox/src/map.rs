use crate::cluster::{connected_components, Cluster};
use crate::report::OverlapCounts;
use crate::similarity::{classify, token_similarity, OverlapClass};
use chrono::{DateTime, Utc};
use poc_archive::{ArchiveQuery, ArchiveState};
use poc_types::{
    tokenize, ContentHash, Contribution, ContributorId, LifecycleStatus, Metal, SubmissionId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Pre-bucketing applied before pairwise comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucketing {
    /// Compare every pair of nodes.
    #[default]
    None,
    /// Only compare nodes from the same contributor.
    Contributor,
}

/// Node filters and cost bounds for [`full_map`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapOptions {
    pub status: Option<LifecycleStatus>,
    pub contributor: Option<ContributorId>,
    pub metal: Option<Metal>,
    #[serde(default)]
    pub include_test: bool,
    /// Keep at most this many nodes, most recent first.
    pub max_nodes: Option<usize>,
    #[serde(default)]
    pub bucketing: Bucketing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub submission_id: SubmissionId,
    pub title: String,
    pub contributor: ContributorId,
    pub status: LifecycleStatus,
    pub metals: BTreeSet<Metal>,
    pub content_hash: ContentHash,
    pub created_at: DateTime<Utc>,
    pub is_test: bool,
}

impl From<&Contribution> for MapNode {
    fn from(c: &Contribution) -> Self {
        Self {
            submission_id: c.submission_id.clone(),
            title: c.title.clone(),
            contributor: c.contributor.clone(),
            status: c.status,
            metals: c.metals.clone(),
            content_hash: c.content_hash.clone(),
            created_at: c.created_at,
            is_test: c.is_test,
        }
    }
}

/// Derived overlap between two map nodes. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlapEdge {
    pub source: SubmissionId,
    pub target: SubmissionId,
    pub source_index: usize,
    pub target_index: usize,
    pub score: f64,
    pub class: OverlapClass,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxStatistics {
    pub nodes: usize,
    pub edges: usize,
    pub edges_by_class: OverlapCounts,
    pub clusters: usize,
    pub largest_cluster: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SandboxMap {
    /// Nodes in canonical archive order.
    pub nodes: Vec<MapNode>,
    pub edges: Vec<OverlapEdge>,
    pub clusters: Vec<Cluster>,
    pub statistics: SandboxStatistics,
    /// Nodes that matched the filters before the `max_nodes` cap.
    pub total_candidates: usize,
    pub truncated: bool,
    pub pairs_evaluated: usize,
    pub bucketing: Bucketing,
}

/// Build the overlap map of every archived record matching `options`.
///
/// Cost is one comparison per node pair (per bucket pair when bucketing by
/// contributor). `pairs_evaluated` reports the number actually performed.
pub fn full_map(state: &ArchiveState, options: &MapOptions) -> SandboxMap {
    let query = ArchiveQuery {
        status: options.status,
        contributor: options.contributor.clone(),
        metal: options.metal,
    };
    let mut selected: Vec<&Contribution> = state
        .query(&query)
        .into_iter()
        .filter(|c| options.include_test || !c.is_test)
        .collect();

    let total_candidates = selected.len();
    let truncated = match options.max_nodes {
        Some(cap) if selected.len() > cap => {
            selected.drain(..selected.len() - cap);
            warn!(
                candidates = total_candidates,
                kept = cap,
                "sandbox map truncated to most recent nodes"
            );
            true
        }
        _ => false,
    };

    let tokens: Vec<BTreeSet<String>> = selected.iter().map(|c| tokenize(&c.text)).collect();
    let ids: Vec<SubmissionId> = selected.iter().map(|c| c.submission_id.clone()).collect();

    let mut edges = Vec::new();
    let mut edges_by_class = OverlapCounts::default();
    let mut pairs_evaluated = 0;

    for i in 0..selected.len() {
        for j in (i + 1)..selected.len() {
            let (a, b) = (selected[i], selected[j]);
            if options.bucketing == Bucketing::Contributor && a.contributor != b.contributor {
                continue;
            }
            pairs_evaluated += 1;

            let (score, class) = if a.content_hash == b.content_hash {
                (1.0, OverlapClass::ExactDuplicate)
            } else {
                let score = token_similarity(&tokens[i], &tokens[j]);
                (score, classify(score))
            };
            if !class.is_overlap() {
                continue;
            }

            edges_by_class.record(class);
            edges.push(OverlapEdge {
                source: ids[i].clone(),
                target: ids[j].clone(),
                source_index: i,
                target_index: j,
                score,
                class,
            });
        }
    }

    let clusters = connected_components(&ids, &edges);
    let statistics = SandboxStatistics {
        nodes: selected.len(),
        edges: edges.len(),
        edges_by_class,
        clusters: clusters.len(),
        largest_cluster: clusters.iter().map(|c| c.members.len()).max().unwrap_or(0),
    };

    debug!(
        nodes = statistics.nodes,
        edges = statistics.edges,
        clusters = statistics.clusters,
        pairs_evaluated,
        "sandbox map built"
    );

    SandboxMap {
        nodes: selected.into_iter().map(MapNode::from).collect(),
        edges,
        clusters,
        statistics,
        total_candidates,
        truncated,
        pairs_evaluated,
        bucketing: options.bucketing,
    }
}

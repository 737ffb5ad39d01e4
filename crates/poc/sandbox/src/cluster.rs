use crate::map::OverlapEdge;
use poc_types::SubmissionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A connected component of the overlap graph with at least two members.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    /// Members in node order.
    pub members: Vec<SubmissionId>,
    pub edge_count: usize,
    pub max_score: f64,
}

/// Disjoint-set forest over node indices, path-halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}

/// Group `nodes` into connected components over `edges`.
///
/// Edges refer to nodes by position in `nodes`. Clusters come out ordered by
/// their first member, so the result is deterministic for a given input.
pub(crate) fn connected_components(nodes: &[SubmissionId], edges: &[OverlapEdge]) -> Vec<Cluster> {
    let mut forest = DisjointSet::new(nodes.len());
    for edge in edges {
        forest.union(edge.source_index, edge.target_index);
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for index in 0..nodes.len() {
        let root = forest.find(index);
        components.entry(root).or_default().push(index);
    }

    let mut stats: BTreeMap<usize, (usize, f64)> = BTreeMap::new();
    for edge in edges {
        let root = forest.find(edge.source_index);
        let entry = stats.entry(root).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 = entry.1.max(edge.score);
    }

    let mut grouped: Vec<(usize, Vec<usize>)> = components
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .collect();
    grouped.sort_by_key(|(_, members)| members[0]);

    grouped
        .into_iter()
        .enumerate()
        .map(|(id, (root, members))| {
            let (edge_count, max_score) = stats.get(&root).copied().unwrap_or((0, 0.0));
            Cluster {
                id,
                members: members.iter().map(|i| nodes[*i].clone()).collect(),
                edge_count,
                max_score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::OverlapClass;

    fn edge(nodes: &[SubmissionId], a: usize, b: usize, score: f64) -> OverlapEdge {
        OverlapEdge {
            source: nodes[a].clone(),
            target: nodes[b].clone(),
            source_index: a,
            target_index: b,
            score,
            class: OverlapClass::Related,
        }
    }

    #[test]
    fn transitive_overlap_forms_one_cluster() {
        let nodes: Vec<SubmissionId> = (0..5).map(|i| SubmissionId::new(format!("n{i}"))).collect();
        let edges = vec![edge(&nodes, 0, 1, 0.5), edge(&nodes, 1, 2, 0.9), edge(&nodes, 3, 4, 0.7)];
        let clusters = connected_components(&nodes, &edges);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members.len(), 3);
        assert_eq!(clusters[0].edge_count, 2);
        assert_eq!(clusters[0].max_score, 0.9);
        assert_eq!(clusters[1].members, vec![nodes[3].clone(), nodes[4].clone()]);
    }

    #[test]
    fn singletons_are_not_clusters() {
        let nodes: Vec<SubmissionId> = (0..3).map(|i| SubmissionId::new(format!("n{i}"))).collect();
        assert!(connected_components(&nodes, &[]).is_empty());
    }
}

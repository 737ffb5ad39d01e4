use crate::error::SandboxResult;
use crate::map::{full_map, Bucketing, MapOptions, SandboxMap};
use crate::report::{redundancy_report, RedundancyReport};
use poc_archive::ContentStore;
use poc_types::SubmissionId;
use std::sync::Arc;

/// Redundancy engine bound to an archive.
///
/// Every call works on a fresh archive snapshot, so long comparisons never
/// hold the archive lock.
pub struct RedundancyEngine {
    archive: Arc<ContentStore>,
    top_n: usize,
    max_nodes: usize,
    bucketing: Bucketing,
}

impl RedundancyEngine {
    pub fn new(archive: Arc<ContentStore>) -> Self {
        Self {
            archive,
            top_n: 20,
            max_nodes: 500,
            bucketing: Bucketing::None,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Default node cap for maps whose options do not set one.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Bucketing applied to maps that do not request any.
    pub fn with_bucketing(mut self, bucketing: Bucketing) -> Self {
        self.bucketing = bucketing;
        self
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn report(&self, id: &SubmissionId) -> SandboxResult<RedundancyReport> {
        let snapshot = self.archive.snapshot()?;
        redundancy_report(&snapshot, id, self.top_n)
    }

    pub fn map(&self, options: &MapOptions) -> SandboxResult<SandboxMap> {
        let mut options = options.clone();
        if options.max_nodes.is_none() {
            options.max_nodes = Some(self.max_nodes);
        }
        if options.bucketing == Bucketing::None {
            options.bucketing = self.bucketing;
        }
        let snapshot = self.archive.snapshot()?;
        Ok(full_map(&snapshot, &options))
    }
}

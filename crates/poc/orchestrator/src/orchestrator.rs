use crate::config::PocConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::gate::QualificationGate;
use crate::oracle::{FixedOracle, ScoringOracle, SubmissionInput};
use crate::score::{NormalizedScore, ScoreInput};
use chrono::Utc;
use poc_archive::{ArchiveError, ArchiveStatistics, ContentStore};
use poc_sandbox::{MapOptions, RedundancyEngine, RedundancyReport, SandboxMap};
use poc_tokenomics::{EpochInfo, LedgerStatistics, LedgerStore};
use poc_types::{
    AllocationLine, Contribution, ContributionDraft, ContributionPatch, ContributorId, Epoch,
    Failure, FailureKind, LifecycleStatus, MetadataPatch, Metal, Scores, SubmissionId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Input of [`Orchestrator::submit`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Caller-chosen id; a fresh one is minted when absent.
    #[serde(default)]
    pub id: Option<SubmissionId>,
    pub title: String,
    pub contributor: ContributorId,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_test: bool,
}

impl SubmissionRequest {
    pub fn new(
        title: impl Into<String>,
        contributor: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            contributor: ContributorId::new(contributor),
            text: text.into(),
            category: None,
            is_test: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(SubmissionId::new(id));
        self
    }
}

/// Aggregate outcome of one evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// True when the contribution qualified.
    pub success: bool,
    #[serde(rename = "id")]
    pub submission_id: SubmissionId,
    pub status: LifecycleStatus,
    pub qualified: bool,
    pub metals: Vec<Metal>,
    pub epoch: Option<Epoch>,
    /// One line per declared metal, recorded or failed.
    pub allocations: Vec<AllocationLine>,
    pub total_reward: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    pub redundancy_report: RedundancyReport,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemStatistics {
    pub archive: ArchiveStatistics,
    pub ledger: LedgerStatistics,
}

/// Owns the archive and ledger and drives every contribution through its
/// lifecycle.
pub struct Orchestrator {
    archive: Arc<ContentStore>,
    ledger: Arc<LedgerStore>,
    engine: RedundancyEngine,
    gate: QualificationGate,
    /// Held for each state transition, never across the oracle call.
    commit: Mutex<()>,
}

impl Orchestrator {
    pub fn new(archive: Arc<ContentStore>, ledger: Arc<LedgerStore>, config: &PocConfig) -> Self {
        let engine = RedundancyEngine::new(Arc::clone(&archive))
            .with_top_n(config.archive.report_top_n)
            .with_max_nodes(config.archive.map_max_nodes)
            .with_bucketing(config.archive.map_bucketing);
        Self {
            archive,
            ledger,
            engine,
            gate: QualificationGate::new(config.qualification.clone()),
            commit: Mutex::new(()),
        }
    }

    /// Open file-backed archive and ledger at the configured paths.
    pub fn open(config: &PocConfig) -> OrchestratorResult<Self> {
        config.validate()?;
        let archive = Arc::new(ContentStore::open_file(&config.archive.path)?);
        let ledger = Arc::new(LedgerStore::open_file(
            config.tokenomics.clone(),
            config.ledger.history_cap,
            &config.ledger.path,
        )?);
        Ok(Self::new(archive, ledger, config))
    }

    /// Volatile archive and ledger, for tests and dry runs.
    pub fn in_memory(config: &PocConfig) -> OrchestratorResult<Self> {
        config.validate()?;
        let archive = Arc::new(ContentStore::in_memory());
        let ledger = Arc::new(LedgerStore::in_memory(config.tokenomics.clone())?);
        Ok(Self::new(archive, ledger, config))
    }

    pub fn archive(&self) -> &Arc<ContentStore> {
        &self.archive
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    pub fn get(&self, id: &SubmissionId) -> OrchestratorResult<Contribution> {
        self.archive.get(id).map_err(not_found)
    }

    /// Archive a new contribution and move it to `Pending`. It takes part in
    /// redundancy checks from this point on.
    pub async fn submit(&self, request: SubmissionRequest) -> OrchestratorResult<Contribution> {
        let id = request.id.clone().unwrap_or_else(SubmissionId::generate);
        let draft = ContributionDraft {
            title: request.title,
            contributor: request.contributor,
            text: request.text,
            category: request.category,
            is_test: request.is_test,
        };

        let _gate = self.commit.lock().await;
        let contribution = Contribution::from_draft(id.clone(), draft, Utc::now());
        self.archive.add(contribution)?;
        let pending = self
            .archive
            .update(&id, ContributionPatch::status(LifecycleStatus::Pending))?;

        info!(
            submission = %id,
            contributor = %pending.contributor,
            hash = %pending.content_hash,
            "contribution submitted"
        );
        Ok(pending)
    }

    /// Evaluate with a score object that was obtained out of band.
    pub async fn evaluate(
        &self,
        id: &SubmissionId,
        score: ScoreInput,
    ) -> OrchestratorResult<EvaluationResult> {
        self.evaluate_with(id, &FixedOracle::new(score)).await
    }

    /// Full evaluation round-trip: `Pending → Evaluating` under the commit
    /// gate, the oracle call with no lock held, then the terminal commit.
    pub async fn evaluate_with(
        &self,
        id: &SubmissionId,
        oracle: &dyn ScoringOracle,
    ) -> OrchestratorResult<EvaluationResult> {
        let contribution = self.begin_evaluation(id).await?;

        let input = SubmissionInput {
            id: id.clone(),
            title: contribution.title.clone(),
            contributor: contribution.contributor.clone(),
            text: contribution.text.clone(),
            category: contribution.metadata.category.clone(),
        };

        let score = match oracle.score(&input).await {
            Ok(raw) => raw.normalize(),
            Err(err) => Err(err.into()),
        };
        let score = match score {
            Ok(score) => score,
            Err(err) => {
                let _gate = self.commit.lock().await;
                self.abandon_evaluation(id, Failure::new(err.kind(), err.to_string()));
                return Err(err);
            }
        };

        let _gate = self.commit.lock().await;
        self.commit_evaluation(id, score)
    }

    pub fn redundancy_report(&self, id: &SubmissionId) -> OrchestratorResult<RedundancyReport> {
        Ok(self.engine.report(id)?)
    }

    pub fn sandbox_map(&self, options: &MapOptions) -> OrchestratorResult<SandboxMap> {
        Ok(self.engine.map(options)?)
    }

    pub fn statistics(&self) -> OrchestratorResult<SystemStatistics> {
        Ok(SystemStatistics {
            archive: self.archive.statistics()?,
            ledger: self.ledger.statistics()?,
        })
    }

    pub fn epochs(&self) -> OrchestratorResult<Vec<EpochInfo>> {
        Ok(self.ledger.epochs()?)
    }

    /// Remove test records from the archive. Ledger history is untouched.
    pub async fn purge_test_data(&self) -> OrchestratorResult<Vec<SubmissionId>> {
        let _gate = self.commit.lock().await;
        Ok(self.archive.purge_test_data()?)
    }

    async fn begin_evaluation(&self, id: &SubmissionId) -> OrchestratorResult<Contribution> {
        let _gate = self.commit.lock().await;

        let current = self.archive.get(id).map_err(not_found)?;
        if current.status != LifecycleStatus::Pending {
            return Err(OrchestratorError::InvalidState {
                id: id.clone(),
                status: current.status,
            });
        }

        let patch = ContributionPatch::status(LifecycleStatus::Evaluating).with_metadata(
            MetadataPatch {
                failure: Some(None),
                evaluation_started_at: Some(Utc::now()),
                ..Default::default()
            },
        );
        let evaluating = self.archive.update(id, patch)?;
        info!(submission = %id, "evaluation started");
        Ok(evaluating)
    }

    /// Return an `Evaluating` record to `Pending` with the failure recorded.
    /// Best effort: a failure here is logged, the caller's error wins.
    fn abandon_evaluation(&self, id: &SubmissionId, failure: Failure) {
        warn!(submission = %id, kind = %failure.kind, reason = %failure.reason, "evaluation abandoned");
        let patch = ContributionPatch::status(LifecycleStatus::Pending).with_metadata(MetadataPatch {
            failure: Some(Some(failure)),
            ..Default::default()
        });
        if let Err(err) = self.archive.update(id, patch) {
            error!(submission = %id, error = %err, "could not return submission to pending");
        }
    }

    /// Terminal commit. Caller holds the commit gate.
    fn commit_evaluation(
        &self,
        id: &SubmissionId,
        score: NormalizedScore,
    ) -> OrchestratorResult<EvaluationResult> {
        let snapshot = self.archive.snapshot()?;
        let contribution = snapshot
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(id.clone()))?;
        if contribution.status != LifecycleStatus::Evaluating {
            return Err(OrchestratorError::InvalidState {
                id: id.clone(),
                status: contribution.status,
            });
        }

        // Archive-first: an earlier record with the same content owns it.
        // The hash proves it, so no pairwise comparison is needed.
        let owner = snapshot
            .content_hash_history(&contribution.content_hash)
            .first()
            .map(|c| c.submission_id.clone());
        if let Some(owner) = owner.filter(|owner| owner != id) {
            let report = poc_sandbox::hash_duplicate_report(&snapshot, id, self.engine.top_n())?;
            let (scores, base_metadata) = evaluation_record(&score, score.redundancy, &report, false);
            let failure = Failure::new(
                FailureKind::DuplicateContent,
                format!("content already archived as {owner}"),
            );
            let patch = ContributionPatch {
                status: Some(LifecycleStatus::Unqualified),
                scores: Some(scores),
                metadata: MetadataPatch {
                    duplicate_of: Some(owner.clone()),
                    failure: Some(Some(failure.clone())),
                    ..base_metadata
                },
                ..Default::default()
            };
            self.write_terminal(id, patch)?;
            info!(submission = %id, duplicate_of = %owner, "duplicate content; unqualified");
            return Ok(EvaluationResult::rejected(id, failure, report));
        }

        let report = poc_sandbox::redundancy_report(&snapshot, id, self.engine.top_n())?;
        let bootstrap = snapshot.is_first_archived(id)?;
        let redundancy = if bootstrap { 0.0 } else { score.redundancy };
        let (scores, base_metadata) = evaluation_record(&score, redundancy, &report, bootstrap);

        let decision = self.gate.check(&score, redundancy);
        if !decision.passed {
            let failure = Failure::new(FailureKind::QualificationFailed, decision.reason());
            let patch = ContributionPatch {
                status: Some(LifecycleStatus::Unqualified),
                scores: Some(scores),
                metadata: MetadataPatch {
                    failure: Some(Some(failure.clone())),
                    ..base_metadata
                },
                ..Default::default()
            };
            self.write_terminal(id, patch)?;
            info!(submission = %id, reason = %failure.reason, "qualification gate failed");
            return Ok(EvaluationResult::rejected(id, failure, report));
        }

        // Every metal is priced against the same pre-evaluation ledger, then
        // all successful lines are recorded in one ledger transaction.
        let previous_ledger = self.ledger.snapshot()?;
        let epoch = previous_ledger.qualify_epoch(score.density);
        let mut lines: Vec<AllocationLine> = Vec::new();
        let mut quotes = Vec::new();
        for metal in &score.metals {
            match previous_ledger.calculate_allocation(score.pod_score, epoch, *metal) {
                Ok(quote) => {
                    quotes.push((lines.len(), quote));
                    lines.push(AllocationLine {
                        metal: *metal,
                        epoch,
                        pod_score: score.pod_score,
                        share: 0.0,
                        reward: 0.0,
                        recorded_at: None,
                        failure: None,
                    });
                }
                Err(err) => {
                    warn!(submission = %id, metal = %metal, epoch = %epoch, error = %err, "allocation line refused");
                    lines.push(AllocationLine {
                        metal: *metal,
                        epoch,
                        pod_score: score.pod_score,
                        share: 0.0,
                        reward: 0.0,
                        recorded_at: None,
                        failure: Some(Failure::new(err.kind(), err.to_string())),
                    });
                }
            }
        }

        if !quotes.is_empty() {
            let contributor = contribution.contributor.clone();
            let coherence = score.coherence;
            let recorded = self.ledger.transact(|ledger| {
                let now = Utc::now();
                quotes
                    .iter()
                    .map(|(index, quote)| {
                        ledger
                            .record_allocation(id, &contributor, quote, coherence, now)
                            .map(|record| (*index, record))
                    })
                    .collect::<Result<Vec<_>, _>>()
            });
            let recorded = match recorded {
                Ok(recorded) => recorded,
                Err(err) => {
                    let err = OrchestratorError::from(err);
                    self.abandon_evaluation(id, Failure::new(err.kind(), err.to_string()));
                    return Err(err);
                }
            };
            for (index, record) in recorded {
                let line = &mut lines[index];
                line.share = record.share;
                line.reward = record.reward;
                line.recorded_at = Some(record.timestamp);
            }
        }

        let metals: Vec<Metal> = score.metals.iter().copied().collect();
        let patch = ContributionPatch {
            status: Some(LifecycleStatus::Qualified),
            metals: Some(score.metals.clone()),
            scores: Some(scores),
            metadata: MetadataPatch {
                failure: Some(None),
                allocations: Some(lines.clone()),
                ..base_metadata
            },
            ..Default::default()
        };
        if let Err(err) = self.archive.update(id, patch) {
            if !quotes.is_empty() {
                if let Err(restore_err) = self.ledger.restore(previous_ledger) {
                    error!(
                        submission = %id,
                        error = %restore_err,
                        "ledger compensation failed after archive write failure"
                    );
                }
            }
            let err = OrchestratorError::from(err);
            self.abandon_evaluation(id, Failure::new(err.kind(), err.to_string()));
            return Err(err);
        }

        let total_reward: f64 = lines.iter().map(|l| l.reward).sum();
        info!(
            submission = %id,
            epoch = %epoch,
            metals = metals.len(),
            total_reward,
            "contribution qualified"
        );

        Ok(EvaluationResult {
            success: true,
            submission_id: id.clone(),
            status: LifecycleStatus::Qualified,
            qualified: true,
            metals,
            epoch: Some(epoch),
            allocations: lines,
            total_reward,
            failure: None,
            redundancy_report: report,
        })
    }

    /// Unqualified terminal write. On failure the record goes back to
    /// `Pending` so it can be evaluated again.
    fn write_terminal(&self, id: &SubmissionId, patch: ContributionPatch) -> OrchestratorResult<()> {
        if let Err(err) = self.archive.update(id, patch) {
            let err = OrchestratorError::from(err);
            self.abandon_evaluation(id, Failure::new(err.kind(), err.to_string()));
            return Err(err);
        }
        Ok(())
    }
}

impl EvaluationResult {
    fn rejected(id: &SubmissionId, failure: Failure, report: RedundancyReport) -> Self {
        Self {
            success: false,
            submission_id: id.clone(),
            status: LifecycleStatus::Unqualified,
            qualified: false,
            metals: Vec::new(),
            epoch: None,
            allocations: Vec::new(),
            total_reward: 0.0,
            failure: Some(failure),
            redundancy_report: report,
        }
    }
}

/// Scores and audit metadata stamped on every evaluated record.
fn evaluation_record(
    score: &NormalizedScore,
    redundancy: f64,
    report: &RedundancyReport,
    bootstrap: bool,
) -> (Scores, MetadataPatch) {
    let scores = Scores {
        coherence: score.coherence,
        density: score.density,
        redundancy,
        pod_score: score.pod_score,
    };
    let metadata = MetadataPatch {
        redundancy_audit: Some(report.audit(bootstrap)),
        oracle_verdict: Some(score.verdict.as_str().to_string()),
        evaluated_at: Some(Utc::now()),
        ..Default::default()
    };
    (scores, metadata)
}

fn not_found(err: ArchiveError) -> OrchestratorError {
    match err {
        ArchiveError::NotFound(id) => OrchestratorError::NotFound(id),
        other => other.into(),
    }
}

//! End-to-end lifecycle tests over in-memory and file-backed stores.

use async_trait::async_trait;
use poc_orchestrator::{
    OracleError, Orchestrator, OrchestratorError, PocConfig, ScoreInput, ScoringOracle,
    SubmissionInput, SubmissionRequest,
};
use poc_sandbox::MapOptions;
use poc_types::{Epoch, FailureKind, LifecycleStatus, Metal, SubmissionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn orchestrator() -> Orchestrator {
    Orchestrator::in_memory(&PocConfig::default()).unwrap()
}

async fn submit(orch: &Orchestrator, id: &str, contributor: &str, text: &str) -> SubmissionId {
    orch.submit(SubmissionRequest::new(id, contributor, text).with_id(id))
        .await
        .unwrap()
        .submission_id
}

#[tokio::test]
async fn first_contribution_takes_founder_gold() {
    let orch = orchestrator();
    let founder = orch.ledger().snapshot().unwrap().initial_balance(Epoch::Founder);
    let c1 = submit(&orch, "c1", "alice", "alpha beta gamma").await;

    let result = orch
        .evaluate(&c1, ScoreInput::new(9000.0, 9000.0, 0.0, &["gold"]))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.status, LifecycleStatus::Qualified);
    assert_eq!(result.epoch, Some(Epoch::Founder));
    assert_eq!(result.metals, vec![Metal::Gold]);
    assert_eq!(result.allocations.len(), 1);
    assert!(close(result.total_reward, 0.9 * founder));

    let stored = orch.get(&c1).unwrap();
    assert_eq!(stored.status, LifecycleStatus::Qualified);
    let audit = stored.metadata.redundancy_audit.unwrap();
    assert!(audit.bootstrap);
    assert_eq!(stored.scores.unwrap().redundancy, 0.0);

    let ledger = orch.ledger().snapshot().unwrap();
    assert!(close(ledger.balance(Epoch::Founder), 0.1 * founder));
    assert!(ledger.is_conserved());
}

#[tokio::test]
async fn identical_resubmission_is_a_duplicate() {
    let orch = orchestrator();
    let c1 = submit(&orch, "c1", "alice", "alpha beta gamma").await;
    orch.evaluate(&c1, ScoreInput::new(9000.0, 9000.0, 0.0, &["gold"]))
        .await
        .unwrap();
    let founder_after_c1 = orch.ledger().snapshot().unwrap().balance(Epoch::Founder);

    let c2 = submit(&orch, "c2", "bob", "  Alpha   BETA gamma ").await;
    let result = orch
        .evaluate(&c2, ScoreInput::new(9500.0, 9500.0, 0.0, &["gold"]))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.status, LifecycleStatus::Unqualified);
    assert_eq!(
        result.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::DuplicateContent)
    );
    assert!(result.allocations.is_empty());
    assert_eq!(result.total_reward, 0.0);
    assert!(result.redundancy_report.has_exact_duplicate());

    let stored = orch.get(&c2).unwrap();
    assert_eq!(stored.metadata.duplicate_of, Some(c1));
    assert_eq!(
        orch.ledger().snapshot().unwrap().balance(Epoch::Founder),
        founder_after_c1
    );
}

#[tokio::test]
async fn earlier_pending_record_owns_its_content() {
    // The owner has not been evaluated yet; the later copy still loses.
    let orch = orchestrator();
    let first = submit(&orch, "first", "alice", "shared words here").await;
    let second = submit(&orch, "second", "bob", "shared words here").await;

    let result = orch
        .evaluate(&second, ScoreInput::new(9000.0, 9000.0, 0.0, &["gold"]))
        .await
        .unwrap();
    assert_eq!(
        result.failure.map(|f| f.kind),
        Some(FailureKind::DuplicateContent)
    );
    assert_eq!(orch.get(&first).unwrap().status, LifecycleStatus::Pending);
    assert_eq!(orch.statistics().unwrap().ledger.allocation_count, 0);
}

#[tokio::test]
async fn community_split_follows_multiplier_weights() {
    let orch = orchestrator();
    submit(&orch, "seed", "alice", "seed document").await;
    let c3 = submit(&orch, "c3", "carol", "distinct community material").await;
    let community = orch.ledger().snapshot().unwrap().balance(Epoch::Community);

    let result = orch
        .evaluate(&c3, ScoreInput::new(6000.0, 5000.0, 1000.0, &["silver", "copper"]))
        .await
        .unwrap();

    assert!(result.qualified);
    assert_eq!(result.epoch, Some(Epoch::Community));
    assert_eq!(result.allocations.len(), 2);
    assert!(result.allocations.iter().all(|l| l.is_recorded()));

    let silver = result.allocations.iter().find(|l| l.metal == Metal::Silver).unwrap();
    let copper = result.allocations.iter().find(|l| l.metal == Metal::Copper).unwrap();
    assert!(close(silver.share, 100.0 / 101.0));
    assert!(close(copper.share, 1.0 / 101.0));
    assert!(result.total_reward <= community);
    assert!(close(silver.reward / copper.reward, 100.0));

    let ledger = orch.ledger().snapshot().unwrap();
    assert!(close(ledger.balance(Epoch::Community), community - result.total_reward));
    assert!(ledger.is_conserved());
}

#[tokio::test]
async fn halvings_follow_cumulative_coherence() {
    let orch = orchestrator();
    let founder = orch.ledger().snapshot().unwrap().initial_balance(Epoch::Founder);

    let mut halvings = 0;
    for _ in 0..300 {
        halvings += orch.ledger().update_coherence_density(10_000.0).unwrap();
    }
    assert_eq!(halvings, 3);

    let ledger = orch.ledger().snapshot().unwrap();
    assert_eq!(ledger.halving_count(), 3);
    assert!(close(ledger.balance(Epoch::Founder), founder / 8.0));
    assert!(ledger.is_conserved());
}

#[tokio::test]
async fn concurrent_identical_submissions_qualify_once() {
    let orch = Arc::new(orchestrator());
    let a = submit(&orch, "a", "alice", "one shared body of text").await;
    let b = submit(&orch, "b", "bob", "one shared body of text").await;

    let score = ScoreInput::new(9000.0, 9000.0, 0.0, &["gold"]);
    let (ra, rb) = tokio::join!(
        {
            let orch = Arc::clone(&orch);
            let score = score.clone();
            let a = a.clone();
            tokio::spawn(async move { orch.evaluate(&a, score).await })
        },
        {
            let orch = Arc::clone(&orch);
            let score = score.clone();
            let b = b.clone();
            tokio::spawn(async move { orch.evaluate(&b, score).await })
        }
    );
    let ra = ra.unwrap().unwrap();
    let rb = rb.unwrap().unwrap();

    let qualified = [&ra, &rb].iter().filter(|r| r.qualified).count();
    assert_eq!(qualified, 1);
    assert!(ra.qualified);
    assert_eq!(orch.statistics().unwrap().ledger.allocation_count, 1);
}

#[tokio::test]
async fn reload_restores_archive_and_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PocConfig::default();
    config.archive.path = dir.path().join("archive.json");
    config.ledger.path = dir.path().join("ledger.json");

    let (before_record, before_stats) = {
        let orch = Orchestrator::open(&config).unwrap();
        let c1 = submit(&orch, "c1", "alice", "alpha beta gamma").await;
        submit(&orch, "c2", "bob", "pending forever").await;
        orch.evaluate(&c1, ScoreInput::new(9000.0, 9000.0, 0.0, &["gold"]))
            .await
            .unwrap();
        (orch.get(&c1).unwrap(), orch.statistics().unwrap())
    };

    let orch = Orchestrator::open(&config).unwrap();
    let after_record = orch.get(&before_record.submission_id).unwrap();
    let after_stats = orch.statistics().unwrap();

    assert_eq!(after_record.status, before_record.status);
    assert_eq!(after_record.content_hash, before_record.content_hash);
    assert_eq!(after_record.sequence, before_record.sequence);
    assert_eq!(after_stats.archive, before_stats.archive);
    assert_eq!(after_stats.ledger.allocation_count, before_stats.ledger.allocation_count);
    assert!(close(
        after_stats.ledger.total_allocated,
        before_stats.ledger.total_allocated
    ));
    assert_eq!(
        orch.get(&SubmissionId::new("c2")).unwrap().status,
        LifecycleStatus::Pending
    );

    // A record submitted after reload sorts after everything restored.
    let c3 = submit(&orch, "c3", "carol", "fresh text").await;
    assert!(orch.get(&c3).unwrap().sequence > before_record.sequence);
}

#[tokio::test]
async fn purge_removes_test_records_only() {
    let orch = orchestrator();
    submit(&orch, "real", "alice", "real contribution").await;
    let mut request = SubmissionRequest::new("sample", "qa", "synthetic sample text").with_id("sample");
    request.is_test = true;
    orch.submit(request).await.unwrap();

    let purged = orch.purge_test_data().await.unwrap();
    assert_eq!(purged, vec![SubmissionId::new("sample")]);
    assert!(matches!(
        orch.get(&SubmissionId::new("sample")),
        Err(OrchestratorError::NotFound(_))
    ));
    assert_eq!(orch.statistics().unwrap().archive.total, 1);
}

#[tokio::test]
async fn sandbox_map_clusters_overlapping_work() {
    let orch = orchestrator();
    submit(&orch, "x1", "alice", "rust ownership borrowing lifetimes").await;
    submit(&orch, "x2", "bob", "rust ownership borrowing lifetimes traits").await;
    submit(&orch, "y1", "carol", "soil carbon sequestration").await;

    let map = orch.sandbox_map(&MapOptions::default()).unwrap();
    assert_eq!(map.nodes.len(), 3);
    assert_eq!(map.edges.len(), 1);
    assert_eq!(map.statistics.largest_cluster, 2);

    let report = orch.redundancy_report(&SubmissionId::new("x2")).unwrap();
    assert_eq!(
        report.top_match().map(|m| m.submission_id.clone()),
        Some(SubmissionId::new("x1"))
    );
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let orch = orchestrator();
    submit(&orch, "same", "alice", "first").await;
    let err = orch
        .submit(SubmissionRequest::new("t", "bob", "second").with_id("same"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::DuplicateId);
}

#[tokio::test]
async fn duplicate_report_comes_from_the_hash_index() {
    let orch = orchestrator();
    let c1 = submit(&orch, "c1", "alice", "alpha beta gamma").await;
    submit(&orch, "near", "carol", "gamma beta alpha").await;
    submit(&orch, "other", "dave", "soil carbon sequestration").await;
    let c2 = submit(&orch, "c2", "bob", "Alpha, beta gamma").await;

    let result = orch
        .evaluate(&c2, ScoreInput::new(9000.0, 9000.0, 0.0, &["gold"]))
        .await
        .unwrap();

    assert_eq!(
        result.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::DuplicateContent)
    );
    let report = &result.redundancy_report;
    assert_eq!(report.compared_against, 1);
    assert_eq!(report.counts.exact_duplicate, 1);
    assert_eq!(report.counts.total(), 1);
    assert_eq!(report.top_match().map(|m| &m.submission_id), Some(&c1));

    let audit = orch.get(&c2).unwrap().metadata.redundancy_audit.unwrap();
    assert_eq!(audit.exact_duplicates, 1);
    assert!(!audit.bootstrap);
}

#[tokio::test]
async fn reordered_copy_is_high_redundancy_not_duplicate() {
    let orch = orchestrator();
    submit(&orch, "a", "alice", "alpha beta gamma").await;
    let b = submit(&orch, "b", "bob", "gamma beta alpha").await;

    let result = orch
        .evaluate(&b, ScoreInput::new(9000.0, 9000.0, 0.0, &["gold"]))
        .await
        .unwrap();

    assert!(result.qualified);
    assert!(!result.redundancy_report.has_exact_duplicate());
    assert_eq!(result.redundancy_report.counts.high_redundancy, 1);
    let audit = orch.get(&b).unwrap().metadata.redundancy_audit.unwrap();
    assert_eq!(audit.exact_duplicates, 0);
    assert_eq!(audit.high_redundancy, 1);
}

#[tokio::test]
async fn purging_the_first_record_does_not_pass_on_bootstrap() {
    let orch = orchestrator();
    let mut request = SubmissionRequest::new("t", "qa", "synthetic seed").with_id("t");
    request.is_test = true;
    orch.submit(request).await.unwrap();
    let real = submit(&orch, "r", "alice", "real contribution text").await;
    orch.purge_test_data().await.unwrap();

    let result = orch
        .evaluate(&real, ScoreInput::new(9000.0, 9000.0, 9000.0, &["gold"]))
        .await
        .unwrap();

    assert_eq!(result.status, LifecycleStatus::Unqualified);
    assert_eq!(
        result.failure.map(|f| f.kind),
        Some(FailureKind::QualificationFailed)
    );
    let stored = orch.get(&real).unwrap();
    assert_eq!(stored.sequence, 1);
    assert_eq!(stored.scores.unwrap().redundancy, 9000.0);
    assert!(!stored.metadata.redundancy_audit.unwrap().bootstrap);
}

/// Holds its answer until released, so a test can act mid-scoring.
struct HeldOracle {
    started: Arc<Notify>,
    release: Arc<Notify>,
    score: ScoreInput,
}

#[async_trait]
impl ScoringOracle for HeldOracle {
    async fn score(&self, _submission: &SubmissionInput) -> Result<ScoreInput, OracleError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.score.clone())
    }
}

#[tokio::test]
async fn submissions_proceed_while_the_oracle_is_scoring() {
    let orch = Arc::new(orchestrator());
    let c1 = submit(&orch, "c1", "alice", "slowly scored text").await;

    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let oracle = HeldOracle {
        started: Arc::clone(&started),
        release: Arc::clone(&release),
        score: ScoreInput::new(9000.0, 9000.0, 0.0, &["gold"]),
    };
    let evaluation = {
        let orch = Arc::clone(&orch);
        let c1 = c1.clone();
        tokio::spawn(async move { orch.evaluate_with(&c1, &oracle).await })
    };

    started.notified().await;
    assert_eq!(orch.get(&c1).unwrap().status, LifecycleStatus::Evaluating);

    let c2 = tokio::time::timeout(
        Duration::from_secs(5),
        submit(&orch, "c2", "bob", "arrives during scoring"),
    )
    .await
    .expect("submit waited on an in-flight evaluation");
    assert_eq!(orch.get(&c2).unwrap().status, LifecycleStatus::Pending);
    assert_eq!(orch.statistics().unwrap().archive.total, 2);

    release.notify_one();
    let result = evaluation.await.unwrap().unwrap();
    assert!(result.qualified);
    assert_eq!(orch.get(&c1).unwrap().status, LifecycleStatus::Qualified);
}

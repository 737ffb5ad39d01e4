//! Command implementations

use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use poc_orchestrator::{Orchestrator, PocConfig, ScoreInput, SubmissionRequest};
use poc_sandbox::{Bucketing, MapOptions};
use poc_types::{ContributorId, LifecycleStatus, Metal, SubmissionId};
use std::path::PathBuf;
use tracing::debug;

#[derive(Args)]
pub struct SubmitArgs {
    /// Contribution title
    #[arg(long)]
    title: String,

    /// Contributor id
    #[arg(long)]
    contributor: String,

    /// Contribution text
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    text: Option<String>,

    /// Read contribution text from a file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Explicit submission id
    #[arg(long)]
    id: Option<String>,

    /// Free-form category
    #[arg(long)]
    category: Option<String>,

    /// Flag the contribution as test data
    #[arg(long)]
    test: bool,
}

#[derive(Args)]
pub struct EvaluateArgs {
    /// Submission id
    id: String,

    /// JSON score object from the scoring oracle
    #[arg(long, alias = "score", conflicts_with_all = ["coherence", "density", "redundancy"])]
    score_file: Option<PathBuf>,

    /// Coherence score (0-10000)
    #[arg(long, required_unless_present = "score_file")]
    coherence: Option<f64>,

    /// Density score (0-10000)
    #[arg(long, required_unless_present = "score_file")]
    density: Option<f64>,

    /// Redundancy score (0-10000, or a fraction 0-1)
    #[arg(long, default_value_t = 0.0)]
    redundancy: f64,

    /// Declared metal; repeat for several
    #[arg(long = "metal")]
    metals: Vec<String>,

    /// Explicit PoD score; defaults to the mean of coherence and density
    #[arg(long)]
    pod_score: Option<f64>,

    /// Record the oracle verdict as rejected
    #[arg(long)]
    rejected: bool,
}

#[derive(Args)]
pub struct MapArgs {
    /// Only contributions in this status
    #[arg(long)]
    status: Option<LifecycleStatus>,

    /// Only contributions by this contributor
    #[arg(long)]
    contributor: Option<String>,

    /// Only contributions carrying this metal
    #[arg(long)]
    metal: Option<Metal>,

    /// Include test data
    #[arg(long)]
    include_test: bool,

    /// Keep at most this many nodes, most recent first
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Only compare contributions from the same contributor
    #[arg(long)]
    bucket_by_contributor: bool,
}

pub async fn submit(config: &PocConfig, args: SubmitArgs) -> anyhow::Result<()> {
    let text = match (args.text, args.file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading contribution text from {}", path.display()))?,
        (None, None) => anyhow::bail!("either --text or --file is required"),
    };

    let request = SubmissionRequest {
        id: args.id.map(SubmissionId::new),
        title: args.title,
        contributor: ContributorId::new(args.contributor),
        text,
        category: args.category,
        is_test: args.test,
    };

    let orchestrator = Orchestrator::open(config)?;
    let contribution = orchestrator.submit(request).await?;
    print_json(&contribution)
}

pub async fn evaluate(config: &PocConfig, args: EvaluateArgs) -> anyhow::Result<()> {
    let score = match args.score_file {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading score object from {}", path.display()))?;
            serde_json::from_str::<ScoreInput>(&raw)
                .with_context(|| format!("parsing score object in {}", path.display()))?
        }
        None => {
            let coherence = args.coherence.context("--coherence is required")?;
            let density = args.density.context("--density is required")?;
            let metals: Vec<&str> = args.metals.iter().map(String::as_str).collect();
            let mut score = ScoreInput::new(coherence, density, args.redundancy, &metals);
            if let Some(pod) = args.pod_score {
                score = score.with_pod_score(pod);
            }
            if args.rejected {
                score = score.rejected();
            }
            score
        }
    };
    debug!(?score, "evaluating with score object");

    let orchestrator = Orchestrator::open(config)?;
    let result = orchestrator
        .evaluate(&SubmissionId::new(args.id), score)
        .await?;
    print_json(&result)
}

pub fn show(config: &PocConfig, id: &str) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::open(config)?;
    print_json(&orchestrator.get(&SubmissionId::new(id))?)
}

pub fn report(config: &PocConfig, id: &str) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::open(config)?;
    print_json(&orchestrator.redundancy_report(&SubmissionId::new(id))?)
}

pub fn map(config: &PocConfig, args: MapArgs) -> anyhow::Result<()> {
    let options = MapOptions {
        status: args.status,
        contributor: args.contributor.map(ContributorId::new),
        metal: args.metal,
        include_test: args.include_test,
        max_nodes: args.max_nodes,
        bucketing: if args.bucket_by_contributor {
            Bucketing::Contributor
        } else {
            config.archive.map_bucketing
        },
    };
    let orchestrator = Orchestrator::open(config)?;
    print_json(&orchestrator.sandbox_map(&options)?)
}

pub fn epochs(config: &PocConfig) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::open(config)?;
    print_json(&orchestrator.epochs()?)
}

pub fn statistics(config: &PocConfig) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::open(config)?;
    print_json(&orchestrator.statistics()?)
}

pub async fn purge_test_data(config: &PocConfig) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::open(config)?;
    let purged = orchestrator.purge_test_data().await?;
    print_json(&serde_json::json!({ "purged": purged }))
}

//! Configuration for the PoC archive

use crate::error::{OrchestratorError, OrchestratorResult};
use poc_sandbox::Bucketing;
use poc_tokenomics::{TokenomicsConfig, DEFAULT_HISTORY_CAP};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PocConfig {
    /// Archive storage and redundancy settings
    #[serde(default)]
    pub archive: ArchiveSettings,

    /// Ledger storage settings
    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Economic constants
    #[serde(default)]
    pub tokenomics: TokenomicsConfig,

    /// Qualification gate thresholds
    #[serde(default)]
    pub qualification: QualificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Archive configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// Snapshot file path
    #[serde(default = "default_archive_path")]
    pub path: PathBuf,

    /// Matches kept in a redundancy report
    #[serde(default = "default_report_top_n")]
    pub report_top_n: usize,

    /// Node cap for sandbox maps that do not set one
    #[serde(default = "default_map_max_nodes")]
    pub map_max_nodes: usize,

    /// Pre-bucketing applied to sandbox maps
    #[serde(default)]
    pub map_bucketing: Bucketing,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            path: default_archive_path(),
            report_top_n: default_report_top_n(),
            map_max_nodes: default_map_max_nodes(),
            map_bucketing: Bucketing::None,
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Snapshot file path
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,

    /// Allocation records retained in history
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

/// Absolute floors and ceiling applied before any allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationConfig {
    #[serde(default = "default_floor")]
    pub coherence_floor: f64,

    #[serde(default = "default_floor")]
    pub density_floor: f64,

    #[serde(default = "default_redundancy_ceiling")]
    pub redundancy_ceiling: f64,
}

impl Default for QualificationConfig {
    fn default() -> Self {
        Self {
            coherence_floor: default_floor(),
            density_floor: default_floor(),
            redundancy_ceiling: default_redundancy_ceiling(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("data/archive.json")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger.json")
}

fn default_report_top_n() -> usize {
    20
}

fn default_map_max_nodes() -> usize {
    500
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

fn default_floor() -> f64 {
    4000.0
}

fn default_redundancy_ceiling() -> f64 {
    5000.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PocConfig {
    /// Load configuration: defaults, then the optional file, then `POC_*`
    /// environment variables (`POC_ARCHIVE__PATH=/srv/archive.json`).
    pub fn load(path: Option<&str>) -> OrchestratorResult<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("POC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: PocConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        self.tokenomics
            .validate()
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;

        let q = &self.qualification;
        for (name, value) in [
            ("coherence_floor", q.coherence_floor),
            ("density_floor", q.density_floor),
            ("redundancy_ceiling", q.redundancy_ceiling),
        ] {
            if !value.is_finite() || !(0.0..=10_000.0).contains(&value) {
                return Err(OrchestratorError::Config(format!(
                    "qualification.{name} must lie in 0..=10000, got {value}"
                )));
            }
        }
        if self.archive.report_top_n == 0 {
            return Err(OrchestratorError::Config(
                "archive.report_top_n must be at least 1".to_string(),
            ));
        }
        if self.ledger.history_cap == 0 {
            return Err(OrchestratorError::Config(
                "ledger.history_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

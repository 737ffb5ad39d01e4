//! Submission lifecycle for the PoC archive.
//!
//! `Draft → Pending → Evaluating → {Qualified | Unqualified}`. The
//! [`Orchestrator`] owns one archive and one ledger and serializes every
//! state transition behind a single commit gate. The external scoring
//! round-trip runs between two short critical sections and never holds the
//! gate, so slow oracles do not block submissions or reads.
//!
//! A terminal commit writes the ledger first and the archive second. When
//! the archive write fails, the ledger is restored to its pre-evaluation
//! state and the record goes back to `Pending`.
//!
//! Snapshot writes are synchronous file I/O (write, fsync, rename) done on
//! the calling task while the gate is held, so each transition briefly
//! occupies an executor thread. Only the scoring round-trip is awaited with
//! the gate released.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod config;
mod error;
mod gate;
mod oracle;
mod orchestrator;
mod score;

pub use self::config::{ArchiveSettings, LedgerSettings, LoggingConfig, PocConfig, QualificationConfig};
pub use error::{OrchestratorError, OrchestratorResult};
pub use gate::{GateDecision, QualificationGate};
pub use oracle::{FixedOracle, OracleError, ScoringOracle, SubmissionInput};
pub use orchestrator::{EvaluationResult, Orchestrator, SubmissionRequest, SystemStatistics};
pub use score::{NormalizedScore, OracleVerdict, ScoreInput};

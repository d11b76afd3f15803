//! Error types shared across the orchestration core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used by the dataset store, rollback manager and driver.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the orchestration core.
///
/// The variants follow the failure classes the pipeline distinguishes:
/// sequencing bugs (`SessionConflict`, `SessionMismatch`), environment
/// problems the operator has to fix (`DatasetMissing`, `MissingColumn`),
/// failures inside a phase body (`Phase`), and the row-count corruption
/// guard (`RowCountDrift`). Phase bodies themselves return `anyhow::Result`
/// and are wrapped at the driver boundary.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A second `begin_phase` arrived while a session was still active.
    /// This is a sequencing bug in the caller, never retried.
    #[error(
        "session '{active}' is still active; begin_phase({requested}) must wait for commit or rollback"
    )]
    SessionConflict { active: String, requested: u8 },

    /// A commit/rollback referenced a session that is not the active one.
    #[error("session id '{given}' does not match the active session {active:?}")]
    SessionMismatch {
        given: String,
        active: Option<String>,
    },

    /// A phase needs a column that an earlier phase should have produced.
    #[error(
        "column '{column}' required by phase {needed_by} is missing; run phase {produced_by} first"
    )]
    MissingColumn {
        column: String,
        needed_by: u8,
        produced_by: u8,
    },

    /// The dataset file is not on disk at all.
    #[error("dataset file {path:?} is missing; place the scraped review corpus there before running")]
    DatasetMissing { path: PathBuf },

    /// The insight report was requested before phase 7 produced it.
    #[error("insight report {path:?} has not been generated yet; run the pipeline first")]
    ReportMissing { path: PathBuf },

    /// A phase ordinal outside the registered range was requested.
    #[error("phase {requested} does not exist; valid phases are 1..={total}")]
    UnknownPhase { requested: u8, total: u8 },

    /// A phase body failed; the phase has been rolled back.
    #[error("phase {phase} ({name}) failed: {source}")]
    Phase {
        phase: u8,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// An enrichment phase changed the number of rows.
    #[error(
        "phase {phase} changed the row count ({before} -> {after}); enrichment phases must not add or drop rows"
    )]
    RowCountDrift {
        phase: u8,
        before: usize,
        after: usize,
    },

    /// Snapshotting a file failed before the phase ran; no session was created.
    #[error("backing up {path:?} failed: {reason}")]
    Backup { path: PathBuf, reason: String },

    /// A malformed line-protocol command.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

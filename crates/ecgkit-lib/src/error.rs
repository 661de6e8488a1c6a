use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

/// Failures surfaced by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("channel '{channel}' not found (available: {})", available.join(", "))]
    MissingChannel {
        channel: String,
        available: Vec<String>,
    },

    #[error("invalid time window [{t0}, {t1}]: need t1 > t0 >= 0")]
    InvalidWindow { t0: f64, t1: f64 },

    #[error("no heartbeat detected in {samples} samples at {fs} Hz")]
    InsufficientSignal { samples: usize, fs: f64 },

    #[error("insufficient beats: need {needed}, found {found}")]
    InsufficientBeats { needed: usize, found: usize },

    #[error("beat index {index} out of range ({count} beats detected)")]
    InvalidIndex { index: usize, count: usize },

    #[error("beat classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("recording produced no beat epochs")]
    EmptyRecording,

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

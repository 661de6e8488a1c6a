pub mod beats;
pub mod config;
pub mod detectors;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod sanitize;
pub mod segment;
pub mod signal;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use pipeline::{
    analyze_prepared, analyze_segment, classify_beats, extract_beat, PreparedRecording,
    SegmentAnalysis,
};
pub use sanitize::{sanitize, sanitize_value};
pub use signal::*;

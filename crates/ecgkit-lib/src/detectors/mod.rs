pub mod clean;
pub mod ecg;

pub use clean::{clean_ecg, min_max_normalize, CleanerConfig};
pub use ecg::{detect_r_peaks, EcgPipelineConfig};

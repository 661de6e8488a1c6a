pub mod classify;
pub mod epochs;
pub mod scorer;

pub use classify::{
    classify_epochs, resample_linear, AnalysisCache, BeatClassification, BeatPrediction,
    BeatScorer, ClassLabel, ClassifierConfig, MemoryCache,
};
pub use epochs::{epoch_at, segment_epochs, BeatEpoch, BoundaryPolicy, EpochConfig, EpochWindow};
pub use scorer::{CommandScorer, TimeoutScorer};

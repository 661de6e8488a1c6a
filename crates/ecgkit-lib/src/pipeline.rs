//! End-to-end operations over a waveform source.

use crate::{
    beats::{
        classify::{classify_epochs, AnalysisCache, BeatClassification, BeatScorer},
        epochs::{epoch_at, segment_epochs, BeatEpoch},
    },
    config::AnalysisConfig,
    detectors::{clean::clean_ecg, clean::min_max_normalize, ecg::detect_r_peaks},
    error::{AnalysisError, Result},
    io::WaveformSource,
    metrics::hrv::{hrv_metrics, HrvMetrics},
    segment::{extract_segment, FiducialPoint, IntervalSeries},
    signal::{Events, TimeSeries, TimeWindow},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// A recording after cleaning and R-peak detection. Computed once per call.
#[derive(Debug, Clone)]
pub struct PreparedRecording {
    pub source: String,
    pub raw: TimeSeries,
    pub cleaned: TimeSeries,
    pub fiducials: Events,
}

impl PreparedRecording {
    pub fn prepare(source: impl Into<String>, raw: TimeSeries, cfg: &AnalysisConfig) -> Result<Self> {
        let cleaned = clean_ecg(&raw, &cfg.cleaner)?;
        let fiducials = detect_r_peaks(&cleaned, &cfg.detector)?;
        Ok(Self {
            source: source.into(),
            raw,
            cleaned,
            fiducials,
        })
    }

    pub fn load(source: &dyn WaveformSource, cfg: &AnalysisConfig) -> Result<Self> {
        let raw = source.load()?;
        let prepared = Self::prepare(source.identity(), raw, cfg)?;
        info!(
            "{}: {:.1} s at {} Hz, {} R-peaks",
            prepared.source,
            prepared.raw.duration(),
            prepared.raw.fs,
            prepared.fiducials.len()
        );
        Ok(prepared)
    }

    /// R-peak times in seconds.
    pub fn fiducial_times(&self) -> Vec<f64> {
        self.fiducials
            .indices
            .iter()
            .map(|&i| self.raw.time_at(i))
            .collect()
    }
}

/// Result of a windowed HRV analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentAnalysis {
    pub source: String,
    pub sampling_rate: f64,
    pub window: TimeWindow,
    /// `[time, amplitude]` pairs of the raw lead
    pub segment: Vec<[f64; 2]>,
    pub fiducials: Vec<FiducialPoint>,
    /// `[time of later beat, interval seconds]` pairs
    pub intervals: Vec<[f64; 2]>,
    pub metrics: HrvMetrics,
}

/// Window the recording to `[t0, t1]` and compute HRV over the beats inside it.
pub fn analyze_segment(
    source: &dyn WaveformSource,
    t0: f64,
    t1: f64,
    cfg: &AnalysisConfig,
) -> Result<SegmentAnalysis> {
    let window = TimeWindow::new(t0, t1)?;
    let prepared = PreparedRecording::load(source, cfg)?;
    analyze_prepared(&prepared, window, cfg)
}

pub fn analyze_prepared(
    prepared: &PreparedRecording,
    window: TimeWindow,
    cfg: &AnalysisConfig,
) -> Result<SegmentAnalysis> {
    let recorded = prepared.raw.duration();
    if window.t1 > recorded {
        warn!(
            "{}: {:.1} s window ends past the {:.1} s recording",
            prepared.source,
            window.length(),
            recorded
        );
    }
    let segment = extract_segment(&prepared.raw, &prepared.fiducials, window);
    let needed = cfg.hrv.min_beats.max(3);
    if segment.fiducials.len() < needed {
        return Err(AnalysisError::InsufficientBeats {
            needed,
            found: segment.fiducials.len(),
        });
    }
    let intervals = IntervalSeries::from_fiducials(&segment.fiducials);
    let metrics = hrv_metrics(&intervals, &cfg.hrv)?;
    Ok(SegmentAnalysis {
        source: prepared.source.clone(),
        sampling_rate: prepared.raw.fs,
        window,
        segment: segment.samples,
        fiducials: segment.fiducials,
        intervals: intervals.points,
        metrics,
    })
}

/// One beat of the cleaned recording, `beat_index` counted from zero.
pub fn extract_beat(
    source: &dyn WaveformSource,
    beat_index: usize,
    pre_s: f64,
    post_s: f64,
    cfg: &AnalysisConfig,
) -> Result<BeatEpoch> {
    let prepared = PreparedRecording::load(source, cfg)?;
    epoch_at(
        &prepared.cleaned,
        &prepared.fiducials,
        beat_index,
        pre_s,
        post_s,
        cfg.epochs.boundary,
    )
}

/// Label every beat of a recording, reading through `cache`.
///
/// A cache hit returns without loading the waveform. After a fresh run the
/// result is offered to the cache; a failed store is logged and ignored.
pub fn classify_beats(
    source: &dyn WaveformSource,
    scorer: &dyn BeatScorer,
    cache: &dyn AnalysisCache,
    force_refresh: bool,
    cfg: &AnalysisConfig,
) -> Result<BeatClassification> {
    let key = source.identity();
    if !force_refresh {
        match cache.load_cached(&key) {
            Ok(Some(hit)) => {
                info!("{}: using cached classification", key);
                return Ok(hit);
            }
            Ok(None) => info!("{}: no cached classification", key),
            Err(err) => warn!("{}: cache lookup failed, recomputing: {}", key, err),
        }
    }

    let raw = source.load()?;
    let normalized = min_max_normalize(&raw);
    let prepared = match PreparedRecording::prepare(key.clone(), normalized, cfg) {
        Ok(prepared) => prepared,
        Err(AnalysisError::InsufficientSignal { .. }) => return Err(AnalysisError::EmptyRecording),
        Err(err) => return Err(err),
    };
    let (pre_s, post_s) = cfg.classifier.window.resolve(
        &prepared.fiducials,
        prepared.cleaned.fs,
        &cfg.epochs,
    );
    let epochs = segment_epochs(
        &prepared.cleaned,
        &prepared.fiducials,
        pre_s,
        post_s,
        cfg.epochs.boundary,
    )?;
    let predictions = classify_epochs(&epochs, scorer, &cfg.classifier)?;
    let result = BeatClassification::new(key.clone(), predictions);
    info!("{}: classified {} beats", key, result.beat_count);

    if let Err(err) = cache.store_cached(&key, &result) {
        warn!("{}: failed to store classification: {}", key, err);
    }
    Ok(result)
}

use crate::{
    error::{AnalysisError, Result},
    signal::{Events, TimeSeries},
};
use serde::{Deserialize, Serialize};

/// What to do with a beat whose window runs past either end of the recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Keep the epoch, truncated to the available samples.
    #[default]
    Clip,
    /// Drop the epoch.
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochConfig {
    /// Seconds before the R-peak.
    pub pre_s: f64,
    /// Seconds after the R-peak.
    pub post_s: f64,
    pub boundary: BoundaryPolicy,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            pre_s: 0.2,
            post_s: 0.4,
            boundary: BoundaryPolicy::Clip,
        }
    }
}

const TACHY_BPM: f64 = 80.0;
const TACHY_WIDEN_S: f64 = 0.1;

/// How the window around each beat is sized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum EpochWindow {
    Fixed { pre_s: f64, post_s: f64 },
    /// One cardiac cycle at the mean heart rate, 35 % before the peak.
    /// From 80 bpm up both sides widen by 0.1 s.
    Auto,
}

impl EpochWindow {
    /// Concrete `(pre, post)` seconds for a recording.
    pub fn resolve(&self, events: &Events, fs: f64, fallback: &EpochConfig) -> (f64, f64) {
        match *self {
            EpochWindow::Fixed { pre_s, post_s } => (pre_s, post_s),
            EpochWindow::Auto => match events.mean_heart_rate(fs) {
                Some(hr) => {
                    let cycle = 60.0 / hr;
                    let widen = if hr >= TACHY_BPM { TACHY_WIDEN_S } else { 0.0 };
                    (0.35 * cycle + widen, 0.65 * cycle + widen)
                }
                None => (fallback.pre_s, fallback.post_s),
            },
        }
    }
}

/// Samples around one R-peak, time relative to the peak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatEpoch {
    /// 1-based position of the beat in the recording.
    pub beat: usize,
    /// Sample index of the R-peak.
    pub index: usize,
    pub r_time: f64,
    pub relative_time: Vec<f64>,
    pub amplitude: Vec<f64>,
}

impl BeatEpoch {
    pub fn len(&self) -> usize {
        self.amplitude.len()
    }
    pub fn is_empty(&self) -> bool {
        self.amplitude.is_empty()
    }
}

fn check_window(pre_s: f64, post_s: f64) -> Result<()> {
    if !(pre_s.is_finite() && pre_s > 0.0 && post_s.is_finite() && post_s > 0.0) {
        return Err(AnalysisError::InvalidInput(format!(
            "epoch window must be positive, got pre {pre_s} s / post {post_s} s"
        )));
    }
    Ok(())
}

/// Sample range for a beat, or `None` if the policy drops it.
fn epoch_range(
    len: usize,
    idx: usize,
    pre_n: usize,
    post_n: usize,
    policy: BoundaryPolicy,
) -> Option<(usize, usize)> {
    // Window lengths saturate at usize::MAX for absurd durations.
    let end = idx.saturating_add(post_n);
    let complete = idx >= pre_n && end < len;
    if !complete && policy == BoundaryPolicy::Exclude {
        return None;
    }
    Some((idx.saturating_sub(pre_n), end.min(len - 1)))
}

fn build_epoch(ts: &TimeSeries, beat: usize, idx: usize, start: usize, end: usize) -> BeatEpoch {
    let relative_time = (start..=end)
        .map(|j| (j as f64 - idx as f64) / ts.fs)
        .collect();
    BeatEpoch {
        beat,
        index: idx,
        r_time: ts.time_at(idx),
        relative_time,
        amplitude: ts.data[start..=end].to_vec(),
    }
}

fn window_samples(ts: &TimeSeries, pre_s: f64, post_s: f64) -> (usize, usize) {
    (
        (pre_s * ts.fs).round() as usize,
        (post_s * ts.fs).round() as usize,
    )
}

/// Cut one epoch per R-peak over the whole recording.
pub fn segment_epochs(
    ts: &TimeSeries,
    events: &Events,
    pre_s: f64,
    post_s: f64,
    policy: BoundaryPolicy,
) -> Result<Vec<BeatEpoch>> {
    check_window(pre_s, post_s)?;
    if ts.is_empty() {
        return Ok(Vec::new());
    }
    let (pre_n, post_n) = window_samples(ts, pre_s, post_s);
    let epochs: Vec<BeatEpoch> = events
        .indices
        .iter()
        .enumerate()
        .filter(|(_, idx)| **idx < ts.len())
        .filter_map(|(k, &idx)| {
            epoch_range(ts.len(), idx, pre_n, post_n, policy)
                .map(|(start, end)| build_epoch(ts, k + 1, idx, start, end))
        })
        .collect();
    log::debug!(
        "segmented {} epochs from {} beats (pre {:.3} s, post {:.3} s, {:?})",
        epochs.len(),
        events.len(),
        pre_s,
        post_s,
        policy
    );
    Ok(epochs)
}

/// The epoch of the beat at zero-based `beat_index`.
pub fn epoch_at(
    ts: &TimeSeries,
    events: &Events,
    beat_index: usize,
    pre_s: f64,
    post_s: f64,
    policy: BoundaryPolicy,
) -> Result<BeatEpoch> {
    check_window(pre_s, post_s)?;
    let idx = events
        .indices
        .get(beat_index)
        .copied()
        .filter(|&idx| idx < ts.len())
        .ok_or(AnalysisError::InvalidIndex {
            index: beat_index,
            count: events.len(),
        })?;
    let (pre_n, post_n) = window_samples(ts, pre_s, post_s);
    let (start, end) = epoch_range(ts.len(), idx, pre_n, post_n, policy).ok_or_else(|| {
        AnalysisError::InvalidInput(format!(
            "epoch for beat {beat_index} extends past the recording"
        ))
    })?;
    Ok(build_epoch(ts, beat_index + 1, idx, start, end))
}

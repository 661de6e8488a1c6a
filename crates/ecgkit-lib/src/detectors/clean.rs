use crate::{
    error::{AnalysisError, Result},
    signal::TimeSeries,
};
use serde::{Deserialize, Serialize};

use super::ecg::{single_pole_highpass, single_pole_lowpass};

/// Fixed conditioning applied to the raw lead before peak detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Baseline wander cutoff (Hz).
    pub highpass_hz: f64,
    /// High-frequency noise cutoff (Hz). Skipped at or above Nyquist.
    pub lowpass_hz: f64,
    /// Mains frequency smoothed out by a moving average (Hz).
    pub powerline_hz: f64,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            highpass_hz: 0.5,
            lowpass_hz: 40.0,
            powerline_hz: 50.0,
        }
    }
}

/// Remove baseline drift and high-frequency noise while keeping the QRS shape.
///
/// Filters run forward then backward so the cleaned trace has no phase lag and
/// peak positions line up with the raw samples. Output length equals input length.
pub fn clean_ecg(ts: &TimeSeries, cfg: &CleanerConfig) -> Result<TimeSeries> {
    if ts.is_empty() {
        return Err(AnalysisError::InvalidInput("cannot clean an empty waveform".into()));
    }
    if !(ts.fs.is_finite() && ts.fs > 0.0) {
        return Err(AnalysisError::InvalidInput(format!(
            "sampling rate must be positive, got {}",
            ts.fs
        )));
    }
    let fs = ts.fs;
    let mut data = zero_phase(&ts.data, |x| single_pole_highpass(x, fs, cfg.highpass_hz));
    if cfg.lowpass_hz < fs * 0.5 {
        data = zero_phase(&data, |x| single_pole_lowpass(x, fs, cfg.lowpass_hz));
    }
    if fs >= 100.0 && cfg.powerline_hz > 0.0 {
        let win = (fs / cfg.powerline_hz).round() as usize;
        if win > 1 {
            data = centered_moving_average(&data, win);
        }
    }
    log::debug!(
        "cleaned {} samples at {} Hz (hp {} Hz, lp {} Hz)",
        data.len(),
        fs,
        cfg.highpass_hz,
        cfg.lowpass_hz
    );
    Ok(TimeSeries { fs, data })
}

/// Scale a whole recording into `[0, 1]`. A constant recording maps to zeros.
pub fn min_max_normalize(ts: &TimeSeries) -> TimeSeries {
    let (min, max) = ts
        .data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    let data = if range > 0.0 && range.is_finite() {
        ts.data.iter().map(|v| (v - min) / range).collect()
    } else {
        vec![0.0; ts.data.len()]
    };
    TimeSeries { fs: ts.fs, data }
}

fn zero_phase<F>(data: &[f64], filter: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let mut forward = filter(data);
    forward.reverse();
    let mut out = filter(&forward);
    out.reverse();
    out
}

fn centered_moving_average(data: &[f64], win: usize) -> Vec<f64> {
    let half = win / 2;
    let mut prefix = Vec::with_capacity(data.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &v in data {
        acc += v;
        prefix.push(acc);
    }
    (0..data.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + win - half).min(data.len());
            (prefix[end] - prefix[start]) / (end - start) as f64
        })
        .collect()
}

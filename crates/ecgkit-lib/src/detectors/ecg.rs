use crate::{
    error::{AnalysisError, Result},
    signal::{Events, TimeSeries},
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Configurable parameters for R-peak detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcgPipelineConfig {
    /// Lower cutoff for the single-pole high-pass filter (Hz).
    pub lowcut_hz: f64,
    /// Upper cutoff for the single-pole low-pass filter (Hz).
    pub highcut_hz: f64,
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    /// Minimum physiological RR distance / refractory period (seconds).
    pub min_rr_s: f64,
    /// Scale between noise and signal envelopes for the adaptive threshold.
    pub threshold_scale: f64,
    /// Half-width (seconds) of the window searched for the precise R-peak after a detection.
    pub search_window_s: f64,
}

impl Default for EcgPipelineConfig {
    fn default() -> Self {
        Self {
            lowcut_hz: 5.0,
            highcut_hz: 15.0,
            integration_window_s: 0.150,
            min_rr_s: 0.200,
            threshold_scale: 0.6,
            search_window_s: 0.150,
        }
    }
}

/// Detect R-peaks in a cleaned lead.
///
/// The result is strictly increasing and no two peaks are closer than `min_rr_s`.
pub fn detect_r_peaks(ts: &TimeSeries, cfg: &EcgPipelineConfig) -> Result<Events> {
    let fs = ts.fs;
    if ts.is_empty() || !(fs.is_finite() && fs > 0.0) {
        return Err(AnalysisError::InsufficientSignal {
            samples: ts.len(),
            fs,
        });
    }

    let envelope = pan_tompkins_envelope(ts, cfg);
    let mut peaks = pick_peaks(&ts.data, &envelope, fs, cfg);

    if peaks.len() < 2 {
        log::warn!(
            "adaptive detector found {} peaks, falling back to local-maximum picker",
            peaks.len()
        );
        peaks = fallback_peak_picker(ts, cfg);
    }

    let refractory = refractory_samples(fs, cfg);
    let peaks = enforce_refractory(&ts.data, peaks, refractory);
    if peaks.is_empty() {
        return Err(AnalysisError::InsufficientSignal {
            samples: ts.len(),
            fs,
        });
    }
    log::debug!("detected {} R-peaks in {} samples", peaks.len(), ts.len());
    Ok(Events::from_indices(peaks))
}

fn refractory_samples(fs: f64, cfg: &EcgPipelineConfig) -> usize {
    (cfg.min_rr_s * fs).round().max(1.0) as usize
}

/// Integrated slope energy of the band-passed lead.
fn pan_tompkins_envelope(ts: &TimeSeries, cfg: &EcgPipelineConfig) -> Vec<f64> {
    let filtered = bandpass(&ts.data, ts.fs, cfg.lowcut_hz, cfg.highcut_hz);
    let energy: Vec<f64> = std::iter::once(0.0)
        .chain(filtered.windows(2).map(|w| (w[1] - w[0]).powi(2)))
        .take(filtered.len())
        .collect();
    let win = ((cfg.integration_window_s * ts.fs).round() as usize).max(1);
    trailing_mean(&energy, win)
}

fn bandpass(data: &[f64], fs: f64, low: f64, high: f64) -> Vec<f64> {
    let passed = if low > 0.0 {
        single_pole_highpass(data, fs, low)
    } else {
        data.to_vec()
    };
    if high > 0.0 && high < fs * 0.5 {
        single_pole_lowpass(&passed, fs, high)
    } else {
        passed
    }
}

fn time_constant(cutoff: f64) -> f64 {
    1.0 / (2.0 * PI * cutoff.max(0.01))
}

pub(crate) fn single_pole_highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    let Some(&first) = data.first() else {
        return Vec::new();
    };
    let rc = time_constant(cutoff);
    let alpha = rc / (rc + 1.0 / fs);
    let (mut last_x, mut last_y) = (first, 0.0);
    data.iter()
        .map(|&x| {
            last_y = alpha * (last_y + x - last_x);
            last_x = x;
            last_y
        })
        .collect()
}

pub(crate) fn single_pole_lowpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    let Some(&first) = data.first() else {
        return Vec::new();
    };
    let dt = 1.0 / fs;
    let alpha = dt / (time_constant(cutoff) + dt);
    let mut state = first;
    data.iter()
        .map(|&x| {
            state += alpha * (x - state);
            state
        })
        .collect()
}

/// Mean of the last `win` samples; the first `win - 1` outputs are zero-padded.
fn trailing_mean(data: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 {
        return data.to_vec();
    }
    let mut sum = 0.0;
    data.iter()
        .enumerate()
        .map(|(i, &x)| {
            sum += x;
            if i >= win {
                sum -= data[i - win];
            }
            sum / win as f64
        })
        .collect()
}

/// Running signal and noise estimates of the envelope.
struct AdaptiveThreshold {
    signal: f64,
    noise: f64,
    scale: f64,
}

impl AdaptiveThreshold {
    /// Seeded from the first second of the envelope.
    fn seeded(envelope: &[f64], fs: f64, scale: f64) -> Self {
        let n = envelope.len().min((fs as usize).max(1));
        let avg = envelope[..n].iter().sum::<f64>() / n as f64;
        Self {
            signal: avg,
            noise: 0.5 * avg,
            scale,
        }
    }

    fn level(&self) -> f64 {
        self.noise + self.scale * (self.signal - self.noise).max(0.0)
    }

    fn saw_peak(&mut self, sample: f64) {
        self.signal = 0.125 * sample + 0.875 * self.signal;
    }

    fn saw_noise(&mut self, sample: f64) {
        self.noise = 0.125 * sample + 0.875 * self.noise;
    }
}

fn pick_peaks(lead: &[f64], envelope: &[f64], fs: f64, cfg: &EcgPipelineConfig) -> Vec<usize> {
    if lead.is_empty() || envelope.is_empty() {
        return Vec::new();
    }
    let refractory = refractory_samples(fs, cfg);
    let search = (cfg.search_window_s * fs).round().max(1.0) as usize;
    let mut threshold = AdaptiveThreshold::seeded(envelope, fs, cfg.threshold_scale);
    let mut last_hit: Option<usize> = None;
    let mut peaks = Vec::new();

    for (i, &sample) in envelope.iter().enumerate() {
        let rested = last_hit.map_or(true, |hit| i - hit >= refractory);
        if sample > 0.0 && sample >= threshold.level() && rested {
            // The integrated envelope lags the complex, so look on both sides.
            let lo = i.saturating_sub(search);
            let hi = (i + search).min(lead.len() - 1);
            peaks.push(lo + argmax(&lead[lo..=hi]));
            last_hit = Some(i);
            threshold.saw_peak(sample);
        } else {
            threshold.saw_noise(sample);
        }
    }

    log::debug!(
        "adaptive threshold settled at {:.4e} (signal {:.4e}, noise {:.4e})",
        threshold.level(),
        threshold.signal,
        threshold.noise
    );
    peaks
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, max), (j, &v)| {
            if v > max {
                (j, v)
            } else {
                (best, max)
            }
        })
        .0
}

/// Sort, deduplicate, and drop the smaller of any two peaks closer than `refractory`.
fn enforce_refractory(data: &[f64], mut peaks: Vec<usize>, refractory: usize) -> Vec<usize> {
    peaks.sort_unstable();
    peaks.dedup();
    let mut kept: Vec<usize> = Vec::with_capacity(peaks.len());
    for idx in peaks {
        match kept.last().copied() {
            Some(prev) if idx - prev < refractory => {
                if data[idx] > data[prev] {
                    kept.pop();
                    kept.push(idx);
                }
            }
            _ => kept.push(idx),
        }
    }
    kept
}

/// Local maxima above a moving-average baseline, at least one refractory period apart.
fn fallback_peak_picker(ts: &TimeSeries, cfg: &EcgPipelineConfig) -> Vec<usize> {
    let data = &ts.data;
    if data.len() < 3 {
        return Vec::new();
    }
    let gap = refractory_samples(ts.fs, cfg);
    let win = ((cfg.integration_window_s * ts.fs) as usize).max(1);
    let detrended: Vec<f64> = data
        .iter()
        .zip(trailing_mean(data, win))
        .map(|(x, baseline)| x - baseline)
        .collect();

    let mut peaks: Vec<usize> = Vec::new();
    for (k, w) in detrended.windows(3).enumerate() {
        let i = k + 1;
        let spaced = peaks.last().map_or(true, |&last| i - last >= gap);
        if w[1] > 0.0 && w[1] > w[0] && w[1] > w[2] && spaced {
            peaks.push(i);
        }
    }
    peaks
}

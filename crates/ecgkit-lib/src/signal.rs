use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Uniformly sampled waveform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    /// Build a waveform, rejecting empty data and non-positive rates.
    pub fn new(fs: f64, data: Vec<f64>) -> Result<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "sampling rate must be positive, got {fs}"
            )));
        }
        if data.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "waveform has no samples".into(),
            ));
        }
        Ok(Self { fs, data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
    /// Time in seconds of sample `index`.
    pub fn time_at(&self, index: usize) -> f64 {
        index as f64 / self.fs
    }
}

/// Point events on a timeline (R-peak sample indices).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Mean heart rate in bpm, if at least two events exist.
    pub fn mean_heart_rate(&self, fs: f64) -> Option<f64> {
        let rr = RRSeries::from_events(self, fs);
        if rr.rr.is_empty() {
            return None;
        }
        let mean = rr.rr.iter().sum::<f64>() / rr.rr.len() as f64;
        (mean > 0.0).then(|| 60.0 / mean)
    }
}

/// RR intervals (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_events(events: &Events, fs: f64) -> Self {
        let mut rr = Vec::new();
        for w in events.indices.windows(2) {
            let dt = (w[1] as f64 - w[0] as f64) / fs;
            rr.push(dt);
        }
        Self { rr }
    }

    /// Intervals in milliseconds.
    pub fn to_millis(&self) -> Vec<f64> {
        self.rr.iter().map(|v| v * 1000.0).collect()
    }
}

/// Inclusive analysis window in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub t0: f64,
    pub t1: f64,
}

impl TimeWindow {
    pub fn new(t0: f64, t1: f64) -> Result<Self> {
        if !(t0.is_finite() && t1.is_finite()) || t0 < 0.0 || t1 <= t0 {
            return Err(AnalysisError::InvalidWindow { t0, t1 });
        }
        Ok(Self { t0, t1 })
    }

    pub fn contains(&self, t: f64) -> bool {
        self.t0 <= t && t <= self.t1
    }

    pub fn length(&self) -> f64 {
        self.t1 - self.t0
    }
}

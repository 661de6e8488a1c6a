use crate::{
    beats::epochs::{BeatEpoch, EpochWindow},
    error::{AnalysisError, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Beat morphology classes in scorer output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLabel {
    Normal,
    SupraventricularEctopic,
    VentricularEctopic,
    Fusion,
    Unknown,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 5] = [
        ClassLabel::Normal,
        ClassLabel::SupraventricularEctopic,
        ClassLabel::VentricularEctopic,
        ClassLabel::Fusion,
        ClassLabel::Unknown,
    ];

    /// Single-letter AAMI beat code.
    pub fn code(&self) -> char {
        match self {
            ClassLabel::Normal => 'N',
            ClassLabel::SupraventricularEctopic => 'S',
            ClassLabel::VentricularEctopic => 'V',
            ClassLabel::Fusion => 'F',
            ClassLabel::Unknown => 'Q',
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ClassLabel::Normal => "normal",
            ClassLabel::SupraventricularEctopic => "supraventricular ectopic",
            ClassLabel::VentricularEctopic => "ventricular ectopic",
            ClassLabel::Fusion => "fusion",
            ClassLabel::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Samples per beat handed to the scorer.
    pub target_length: usize,
    pub window: EpochWindow,
    /// Scorer class index to label.
    pub labels: Vec<ClassLabel>,
    /// Seconds to wait for the scorer.
    pub timeout_s: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            target_length: 186,
            window: EpochWindow::Auto,
            labels: ClassLabel::ALL.to_vec(),
            timeout_s: 30.0,
        }
    }
}

impl ClassifierConfig {
    pub fn label_for(&self, class_index: usize) -> ClassLabel {
        match self.labels.get(class_index) {
            Some(label) => *label,
            None => {
                log::warn!(
                    "scorer returned class {} outside the {}-entry label table",
                    class_index,
                    self.labels.len()
                );
                ClassLabel::Unknown
            }
        }
    }
}

/// Opaque model: one probability vector per input beat.
pub trait BeatScorer {
    fn score(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
}

impl<S: BeatScorer + ?Sized> BeatScorer for Box<S> {
    fn score(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        (**self).score(batch)
    }
}

/// Read-through store for finished classifications, keyed by source identity.
pub trait AnalysisCache {
    fn load_cached(&self, key: &str) -> Result<Option<BeatClassification>>;
    fn store_cached(&self, key: &str, result: &BeatClassification) -> Result<()>;
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, BeatClassification>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisCache for MemoryCache {
    fn load_cached(&self, key: &str) -> Result<Option<BeatClassification>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn store_cached(&self, key: &str, result: &BeatClassification) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), result.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatPrediction {
    /// 1-based beat identifier.
    pub beat: usize,
    pub class_index: usize,
    pub label: ClassLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatClassification {
    pub source: String,
    pub beat_count: usize,
    pub beats: Vec<BeatPrediction>,
    /// RFC 3339 UTC.
    pub analysis_timestamp: String,
}

impl BeatClassification {
    pub fn new(source: impl Into<String>, beats: Vec<BeatPrediction>) -> Self {
        Self {
            source: source.into(),
            beat_count: beats.len(),
            beats,
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Beats per label, in label order.
    pub fn summary(&self) -> Vec<(ClassLabel, usize)> {
        ClassLabel::ALL
            .iter()
            .map(|label| (*label, self.beats.iter().filter(|b| b.label == *label).count()))
            .collect()
    }
}

/// Linearly resample to `target` samples; both endpoints are kept.
pub fn resample_linear(data: &[f64], target: usize) -> Vec<f64> {
    match (data.len(), target) {
        (_, 0) => Vec::new(),
        (0, _) => vec![0.0; target],
        (1, _) => vec![data[0]; target],
        (_, 1) => vec![data[0]],
        (n, _) => {
            let step = (n - 1) as f64 / (target - 1) as f64;
            (0..target)
                .map(|j| {
                    if j == target - 1 {
                        return data[n - 1];
                    }
                    let pos = j as f64 * step;
                    let lo = pos.floor() as usize;
                    let hi = (lo + 1).min(n - 1);
                    let frac = pos - lo as f64;
                    data[lo] + (data[hi] - data[lo]) * frac
                })
                .collect()
        }
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] || values[best].is_nan() {
            best = i;
        }
    }
    best
}

/// Score epochs and map each to a label.
pub fn classify_epochs<S: BeatScorer + ?Sized>(
    epochs: &[BeatEpoch],
    scorer: &S,
    cfg: &ClassifierConfig,
) -> Result<Vec<BeatPrediction>> {
    if epochs.is_empty() {
        return Err(AnalysisError::EmptyRecording);
    }
    let batch: Vec<Vec<f64>> = epochs
        .iter()
        .map(|e| resample_linear(&e.amplitude, cfg.target_length))
        .collect();
    let scores = scorer.score(&batch)?;
    if scores.len() != batch.len() {
        return Err(AnalysisError::ClassifierUnavailable(format!(
            "scorer returned {} outputs for {} beats",
            scores.len(),
            batch.len()
        )));
    }
    epochs
        .iter()
        .zip(scores)
        .map(|(epoch, probs)| {
            if probs.is_empty() {
                return Err(AnalysisError::ClassifierUnavailable(format!(
                    "empty score vector for beat {}",
                    epoch.beat
                )));
            }
            let class_index = argmax(&probs);
            Ok(BeatPrediction {
                beat: epoch.beat,
                class_index,
                label: cfg.label_for(class_index),
            })
        })
        .collect()
}

use crate::{
    beats::{classify::ClassifierConfig, epochs::EpochConfig},
    detectors::{clean::CleanerConfig, ecg::EcgPipelineConfig},
    error::{AnalysisError, Result},
    metrics::hrv::HrvConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CHANNEL: &str = "MLII";

/// Immutable settings handed to every pipeline stage.
///
/// Every section is optional in TOML; missing keys fall back to the defaults below.
///
/// ```toml
/// channel = "MLII"
///
/// [detector]
/// min_rr_s = 0.25
///
/// [epochs]
/// boundary = "exclude"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Column holding the lead to analyse.
    pub channel: String,
    pub cleaner: CleanerConfig,
    pub detector: EcgPipelineConfig,
    pub hrv: HrvConfig,
    pub epochs: EpochConfig,
    pub classifier: ClassifierConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.into(),
            cleaner: CleanerConfig::default(),
            detector: EcgPipelineConfig::default(),
            hrv: HrvConfig::default(),
            epochs: EpochConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: AnalysisConfig =
            toml::from_str(text).map_err(|e| AnalysisError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject settings no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if self.channel.trim().is_empty() {
            return Err(invalid("channel name is empty"));
        }
        let positive = [
            ("cleaner.highpass_hz", self.cleaner.highpass_hz),
            ("cleaner.lowpass_hz", self.cleaner.lowpass_hz),
            ("detector.lowcut_hz", self.detector.lowcut_hz),
            ("detector.highcut_hz", self.detector.highcut_hz),
            ("detector.integration_window_s", self.detector.integration_window_s),
            ("detector.min_rr_s", self.detector.min_rr_s),
            ("detector.threshold_scale", self.detector.threshold_scale),
            ("detector.search_window_s", self.detector.search_window_s),
            ("hrv.interpolation_hz", self.hrv.interpolation_hz),
            ("hrv.welch_segment_s", self.hrv.welch_segment_s),
            ("hrv.sampen_r", self.hrv.sampen_r),
            ("epochs.pre_s", self.epochs.pre_s),
            ("epochs.post_s", self.epochs.post_s),
            ("classifier.timeout_s", self.classifier.timeout_s),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(&format!("{name} must be positive, got {value}")));
            }
        }
        if self.hrv.min_beats < 3 {
            return Err(invalid("hrv.min_beats must be at least 3"));
        }
        if self.classifier.target_length < 2 {
            return Err(invalid("classifier.target_length must be at least 2"));
        }
        if self.classifier.labels.is_empty() {
            return Err(invalid("classifier.labels is empty"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> AnalysisError {
    AnalysisError::Config(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beats::{classify::ClassLabel, epochs::BoundaryPolicy};
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let cfg = AnalysisConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.channel, "MLII");
        assert_eq!(cfg.epochs.pre_s, 0.2);
        assert_eq!(cfg.epochs.post_s, 0.4);
        assert_eq!(cfg.classifier.target_length, 186);
        assert_eq!(cfg.classifier.labels.len(), 5);
        assert_eq!(cfg.classifier.labels[2], ClassLabel::VentricularEctopic);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = AnalysisConfig::from_toml_str(
            r#"
channel = "V5"

[detector]
min_rr_s = 0.25

[epochs]
boundary = "exclude"
"#,
        )
        .unwrap();
        assert_eq!(cfg.channel, "V5");
        assert_eq!(cfg.detector.min_rr_s, 0.25);
        assert_eq!(cfg.detector.lowcut_hz, 5.0);
        assert_eq!(cfg.epochs.boundary, BoundaryPolicy::Exclude);
        assert_eq!(cfg.hrv.min_beats, 3);
    }

    #[test]
    fn rejects_non_positive_durations() {
        let err = AnalysisConfig::from_toml_str("[epochs]\npre_s = 0.0\n").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
        let err = AnalysisConfig::from_toml_str("channel = [1]").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[classifier]\ntimeout_s = 5.0").unwrap();
        let cfg = AnalysisConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(cfg.classifier.timeout_s, 5.0);
    }
}

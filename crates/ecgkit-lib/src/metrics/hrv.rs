//! Heart-rate variability over a sequence of inter-beat intervals.
//!
//! All three tables use the `HRV_*` naming common to clinical tooling. Intervals
//! are converted to milliseconds before any statistic is taken, so band powers
//! come out in ms². A metric that cannot be computed from the input is `None`
//! rather than `NaN` or zero.

use crate::{
    error::{AnalysisError, Result},
    segment::IntervalSeries,
    signal::RRSeries,
};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::ops::RangeInclusive;

/// Metric name to value; `None` marks a metric the input cannot support.
pub type MetricTable = BTreeMap<String, Option<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HrvConfig {
    /// Fewest beats (not intervals) an analysis accepts.
    pub min_beats: usize,
    /// Rate of the uniform grid the intervals are resampled onto (Hz).
    pub interpolation_hz: f64,
    /// Welch segment length (seconds).
    pub welch_segment_s: f64,
    /// Embedding dimension for approximate and sample entropy.
    pub sampen_m: usize,
    /// Tolerance for the entropies as a fraction of SDNN.
    pub sampen_r: f64,
}

impl Default for HrvConfig {
    fn default() -> Self {
        Self {
            min_beats: 3,
            interpolation_hz: 4.0,
            welch_segment_s: 30.0,
            sampen_m: 2,
            sampen_r: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    pub time_domain: MetricTable,
    pub frequency_domain: MetricTable,
    pub non_linear_domain: MetricTable,
}

const BANDS: [(&str, f64, f64); 5] = [
    ("HRV_ULF", 0.0, 0.0033),
    ("HRV_VLF", 0.0033, 0.04),
    ("HRV_LF", 0.04, 0.15),
    ("HRV_HF", 0.15, 0.4),
    ("HRV_VHF", 0.4, 0.5),
];

/// Metrics for an interval series built from detected beats.
pub fn hrv_metrics(intervals: &IntervalSeries, cfg: &HrvConfig) -> Result<HrvMetrics> {
    ensure_beats(intervals.len() + 1, cfg)?;
    let times: Vec<f64> = intervals.points.iter().map(|p| p[0]).collect();
    let rr_ms: Vec<f64> = intervals.points.iter().map(|p| p[1] * 1000.0).collect();
    Ok(compute(&times, &rr_ms, cfg))
}

/// Metrics for a bare list of RR intervals in seconds.
pub fn hrv_metrics_from_rr(rr: &RRSeries, cfg: &HrvConfig) -> Result<HrvMetrics> {
    ensure_beats(rr.rr.len() + 1, cfg)?;
    if let Some(bad) = rr.rr.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
        return Err(AnalysisError::InvalidInput(format!(
            "RR intervals must be positive, got {bad}"
        )));
    }
    let mut times = Vec::with_capacity(rr.rr.len());
    let mut acc = 0.0;
    for interval in &rr.rr {
        acc += interval;
        times.push(acc);
    }
    Ok(compute(&times, &rr.to_millis(), cfg))
}

fn ensure_beats(found: usize, cfg: &HrvConfig) -> Result<()> {
    let needed = cfg.min_beats.max(3);
    if found < needed {
        return Err(AnalysisError::InsufficientBeats { needed, found });
    }
    Ok(())
}

fn compute(times: &[f64], rr_ms: &[f64], cfg: &HrvConfig) -> HrvMetrics {
    HrvMetrics {
        time_domain: time_domain(rr_ms),
        frequency_domain: frequency_domain(times, rr_ms, cfg),
        non_linear_domain: non_linear_domain(rr_ms, cfg),
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d != 0.0 => finite(n / d),
        _ => None,
    }
}

fn insert(table: &mut MetricTable, name: &str, value: Option<f64>) {
    table.insert(name.to_string(), value.and_then(finite));
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(values.iter().sum::<f64>() / values.len() as f64)
}

fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    finite(var.sqrt())
}

fn successive_diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Linear-interpolated percentile over already sorted values.
fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

fn time_domain(rr: &[f64]) -> MetricTable {
    let mut table = MetricTable::new();
    let diffs = successive_diffs(rr);
    let ordered = sorted(rr);

    let mean_nn = mean(rr);
    let sdnn = std_dev(rr);
    let rmssd = if diffs.is_empty() {
        None
    } else {
        finite((diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt())
    };
    let median = percentile(&ordered, 50.0);
    let mad = median.and_then(|med| {
        let deviations = sorted(&rr.iter().map(|x| (x - med).abs()).collect::<Vec<_>>());
        percentile(&deviations, 50.0).map(|m| 1.4826 * m)
    });
    let pnn = |threshold: f64| -> Option<f64> {
        if diffs.is_empty() {
            return None;
        }
        let count = diffs.iter().filter(|d| d.abs() > threshold).count();
        Some(100.0 * count as f64 / diffs.len() as f64)
    };
    let q25 = percentile(&ordered, 25.0);
    let q75 = percentile(&ordered, 75.0);

    insert(&mut table, "HRV_MeanNN", mean_nn);
    insert(&mut table, "HRV_SDNN", sdnn);
    insert(&mut table, "HRV_RMSSD", rmssd);
    insert(&mut table, "HRV_SDSD", std_dev(&diffs));
    insert(&mut table, "HRV_CVNN", ratio(sdnn, mean_nn));
    insert(&mut table, "HRV_CVSD", ratio(rmssd, mean_nn));
    insert(&mut table, "HRV_MedianNN", median);
    insert(&mut table, "HRV_MadNN", mad);
    insert(&mut table, "HRV_MCVNN", ratio(mad, median));
    insert(&mut table, "HRV_IQRNN", q75.zip(q25).map(|(hi, lo)| hi - lo));
    insert(&mut table, "HRV_Prc20NN", percentile(&ordered, 20.0));
    insert(&mut table, "HRV_Prc80NN", percentile(&ordered, 80.0));
    insert(&mut table, "HRV_pNN50", pnn(50.0));
    insert(&mut table, "HRV_pNN20", pnn(20.0));
    insert(&mut table, "HRV_MinNN", ordered.first().copied());
    insert(&mut table, "HRV_MaxNN", ordered.last().copied());
    insert(&mut table, "HRV_HTI", triangular_index(rr));
    table
}

/// Beat count over the tallest bin of a 1/128 s histogram.
fn triangular_index(rr: &[f64]) -> Option<f64> {
    const BIN_MS: f64 = 1000.0 / 128.0;
    if rr.is_empty() {
        return None;
    }
    let mut bins: BTreeMap<i64, usize> = BTreeMap::new();
    for &v in rr {
        *bins.entry((v / BIN_MS).floor() as i64).or_default() += 1;
    }
    let tallest = bins.values().copied().max()?;
    Some(rr.len() as f64 / tallest as f64)
}

fn frequency_domain(times: &[f64], rr_ms: &[f64], cfg: &HrvConfig) -> MetricTable {
    let mut table = MetricTable::new();
    let powers: Vec<Option<f64>> = match welch_psd(times, rr_ms, cfg) {
        Some((freqs, psd)) => BANDS
            .iter()
            .map(|&(_, lo, hi)| integrate_band(&freqs, &psd, (lo, hi)))
            .collect(),
        None => vec![None; BANDS.len()],
    };
    for ((name, _, _), power) in BANDS.iter().zip(&powers) {
        insert(&mut table, name, *power);
    }

    let total = if powers.iter().all(Option::is_none) {
        None
    } else {
        Some(powers.iter().flatten().sum::<f64>())
    };
    let lf = powers[2];
    let hf = powers[3];
    insert(&mut table, "HRV_TP", total);
    insert(&mut table, "HRV_LFHF", ratio(lf, hf));
    insert(&mut table, "HRV_LFn", ratio(lf, total));
    insert(&mut table, "HRV_HFn", ratio(hf, total));
    insert(
        &mut table,
        "HRV_LnHF",
        hf.filter(|v| *v > 0.0).map(f64::ln),
    );
    table
}

/// Sum PSD bins with `lo <= f < hi` (DC excluded), scaled by the bin width.
fn integrate_band(freqs: &[f64], powers: &[f64], band: (f64, f64)) -> Option<f64> {
    if freqs.len() < 2 {
        return None;
    }
    let df = freqs[1] - freqs[0];
    let mut any = false;
    let total: f64 = freqs
        .iter()
        .zip(powers)
        .filter(|(f, _)| **f > 0.0 && **f >= band.0 && **f < band.1)
        .map(|(_, p)| {
            any = true;
            *p * df
        })
        .sum();
    any.then_some(total)
}

/// Resample intervals onto a uniform grid and estimate a one-sided PSD density.
fn welch_psd(times: &[f64], rr_ms: &[f64], cfg: &HrvConfig) -> Option<(Vec<f64>, Vec<f64>)> {
    const MIN_SAMPLES: usize = 8;
    let fs = cfg.interpolation_hz;
    let signal = interpolate_rr(times, rr_ms, fs);
    let n = signal.len();
    if n < MIN_SAMPLES {
        log::debug!("{} interpolated samples, too few for a PSD", n);
        return None;
    }
    let window = ((fs * cfg.welch_segment_s).round() as usize).clamp(MIN_SAMPLES, n);
    let step = (window / 2).max(1);
    let window_func = hann(window);
    let norm: f64 = window_func.iter().map(|w| w * w).sum::<f64>() * fs;

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(window);
    let bins = window / 2 + 1;
    let freqs: Vec<f64> = (0..bins).map(|k| k as f64 * fs / window as f64).collect();
    let mut powers = vec![0.0; bins];
    let mut segments = 0;
    let mut pos = 0;
    while pos + window <= n {
        let slice = &signal[pos..pos + window];
        let seg_mean = slice.iter().sum::<f64>() / window as f64;
        let mut frame: Vec<f64> = slice
            .iter()
            .zip(window_func.iter())
            .map(|(x, w)| (x - seg_mean) * w)
            .collect();
        let mut spectrum = r2c.make_output_vec();
        r2c.process(&mut frame, &mut spectrum).ok()?;
        for (k, val) in spectrum.iter().enumerate() {
            let one_sided = if k == 0 || (window % 2 == 0 && k == window / 2) {
                1.0
            } else {
                2.0
            };
            powers[k] += one_sided * val.norm_sqr() / norm;
        }
        segments += 1;
        pos += step;
    }
    for p in powers.iter_mut() {
        *p /= segments as f64;
    }
    log::debug!(
        "welch psd: {} segments of {} samples, df {:.4} Hz",
        segments,
        window,
        fs / window as f64
    );
    Some((freqs, powers))
}

/// Linear interpolation of interval values at their beat times, mean removed.
fn interpolate_rr(times: &[f64], values: &[f64], fs: f64) -> Vec<f64> {
    if times.len() < 2 || times.len() != values.len() {
        return Vec::new();
    }
    let start = times[0];
    let span = times[times.len() - 1] - start;
    if !(span > 0.0) {
        return Vec::new();
    }
    let n = (span * fs).floor() as usize + 1;
    let mut signal = Vec::with_capacity(n);
    let mut idx = 0;
    for i in 0..n {
        let t = start + i as f64 / fs;
        while idx + 2 < times.len() && times[idx + 1] < t {
            idx += 1;
        }
        let (t0, t1) = (times[idx], times[idx + 1]);
        let (v0, v1) = (values[idx], values[idx + 1]);
        let frac = if t1 > t0 {
            ((t - t0) / (t1 - t0)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        signal.push(v0 + (v1 - v0) * frac);
    }
    let m = signal.iter().sum::<f64>() / signal.len() as f64;
    signal.iter_mut().for_each(|v| *v -= m);
    signal
}

fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size as f64)).cos()))
        .collect()
}

fn non_linear_domain(rr: &[f64], cfg: &HrvConfig) -> MetricTable {
    let mut table = MetricTable::new();
    let diffs = successive_diffs(rr);
    let sdnn = std_dev(rr);
    let sd1 = std_dev(&diffs).map(|sdsd| sdsd / 2f64.sqrt());
    let sd2 = sdnn
        .zip(sd1)
        .and_then(|(sdnn, sd1)| finite((2.0 * sdnn * sdnn - sd1 * sd1).max(0.0).sqrt()));

    let prod = sd1.zip(sd2).map(|(a, b)| a * b);
    insert(&mut table, "HRV_SD1", sd1);
    insert(&mut table, "HRV_SD2", sd2);
    insert(&mut table, "HRV_SD1SD2", ratio(sd1, sd2));
    insert(&mut table, "HRV_S", prod.map(|p| PI * p));
    insert(&mut table, "HRV_CSI", ratio(sd2, sd1));
    insert(
        &mut table,
        "HRV_CVI",
        prod.filter(|p| *p > 0.0).map(|p| (16.0 * p).log10()),
    );
    insert(
        &mut table,
        "HRV_CSI_Modified",
        ratio(sd2.map(|v| 4.0 * v * v), sd1),
    );

    let tolerance = sdnn.map(|s| cfg.sampen_r * s).filter(|r| *r > 0.0);
    insert(
        &mut table,
        "HRV_ApEn",
        tolerance.and_then(|r| approximate_entropy(rr, cfg.sampen_m, r)),
    );
    insert(
        &mut table,
        "HRV_SampEn",
        tolerance.and_then(|r| sample_entropy(rr, cfg.sampen_m, r)),
    );
    insert(&mut table, "HRV_DFA_alpha1", dfa_alpha(rr, 4..=16));
    insert(&mut table, "HRV_DFA_alpha2", dfa_alpha(rr, 16..=64));
    table
}

/// Chebyshev distance between the length-`m` templates starting at `i` and `j`.
fn chebyshev(data: &[f64], i: usize, j: usize, m: usize) -> f64 {
    data[i..i + m]
        .iter()
        .zip(&data[j..j + m])
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

/// SampEn: self-matches excluded, both template lengths drawn from the same `N - m` starts.
fn sample_entropy(data: &[f64], m: usize, r: f64) -> Option<f64> {
    if data.len() <= m + 1 {
        return None;
    }
    let starts = data.len() - m;
    let (matches_m, matches_m1) = (0..starts)
        .flat_map(|i| (i + 1..starts).map(move |j| (i, j)))
        .filter(|&(i, j)| chebyshev(data, i, j, m) < r)
        .fold((0usize, 0usize), |(short, long), (i, j)| {
            (short + 1, long + usize::from(chebyshev(data, i, j, m + 1) < r))
        });
    if matches_m == 0 || matches_m1 == 0 {
        return None;
    }
    finite(-(matches_m1 as f64 / matches_m as f64).ln())
}

fn approximate_entropy(data: &[f64], m: usize, r: f64) -> Option<f64> {
    if data.len() <= m + 1 {
        return None;
    }
    let phi = |len: usize| {
        let count = data.len() - len + 1;
        let log_share: f64 = (0..count)
            .map(|i| {
                let similar = (0..count).filter(|&j| chebyshev(data, i, j, len) <= r).count();
                (similar as f64 / count as f64).ln()
            })
            .sum();
        log_share / count as f64
    };
    finite(phi(m) - phi(m + 1))
}

/// Ordinary least squares over `(x, y)` pairs, as `(slope, intercept)`.
fn least_squares(points: impl IntoIterator<Item = (f64, f64)>) -> Option<(f64, f64)> {
    let (n, sx, sy, sxx, sxy) = points.into_iter().fold(
        (0.0, 0.0, 0.0, 0.0, 0.0),
        |(n, sx, sy, sxx, sxy), (x, y)| (n + 1.0, sx + x, sy + y, sxx + x * x, sxy + x * y),
    );
    let denom = n * sxx - sx * sx;
    if n < 2.0 || denom.abs() < f64::EPSILON {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denom;
    Some((slope, (sy - slope * sx) / n))
}

/// Mean squared residual of one box around its own linear trend.
fn detrended_variance(segment: &[f64]) -> f64 {
    let points = || segment.iter().enumerate().map(|(i, &y)| (i as f64, y));
    let (slope, intercept) =
        least_squares(points()).unwrap_or((0.0, mean(segment).unwrap_or(0.0)));
    points()
        .map(|(x, y)| (y - slope * x - intercept).powi(2))
        .sum::<f64>()
        / segment.len() as f64
}

/// DFA exponent: slope of log F(n) against log n for box sizes in `scales`,
/// the largest box capped at half the series.
fn dfa_alpha(rr: &[f64], scales: RangeInclusive<usize>) -> Option<f64> {
    let smallest = *scales.start();
    let largest = (*scales.end()).min(rr.len() / 2);
    if rr.len() < 2 * smallest || largest <= smallest {
        return None;
    }
    let centre = mean(rr)?;
    let profile: Vec<f64> = rr
        .iter()
        .scan(0.0, |walk, &v| {
            *walk += v - centre;
            Some(*walk)
        })
        .collect();

    let fluctuation: Vec<(f64, f64)> = (smallest..=largest)
        .filter_map(|n| {
            let boxes = profile.chunks_exact(n);
            let count = boxes.len();
            if count == 0 {
                return None;
            }
            let f = (boxes.map(detrended_variance).sum::<f64>() / count as f64).sqrt();
            (f.is_finite() && f > 0.0).then(|| ((n as f64).ln(), f.ln()))
        })
        .collect();
    if fluctuation.len() < 2 {
        return None;
    }
    least_squares(fluctuation).and_then(|(alpha, _)| finite(alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::FiducialPoint;

    fn rr_series() -> RRSeries {
        let data = [
            0.82, 0.78, 0.80, 0.79, 0.83, 0.77, 0.84, 0.88, 0.86, 0.81, 0.79, 0.82, 0.85, 0.78,
            0.80, 0.79, 0.83, 0.84, 0.82, 0.81,
        ];
        RRSeries { rr: data.to_vec() }
    }

    fn assert_close(actual: Option<f64>, expected: f64, tol: f64) {
        let actual = actual.unwrap_or_else(|| panic!("expected {expected}, got None"));
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    fn get(table: &MetricTable, key: &str) -> Option<f64> {
        *table.get(key).unwrap_or_else(|| panic!("missing key {key}"))
    }

    #[test]
    fn time_domain_hand_computed() {
        let rr = RRSeries {
            rr: vec![0.800, 0.850, 0.780, 0.820],
        };
        let m = hrv_metrics_from_rr(&rr, &HrvConfig::default()).unwrap();
        let t = &m.time_domain;
        assert_close(get(t, "HRV_MeanNN"), 812.5, 1e-9);
        assert_close(get(t, "HRV_SDNN"), (2675.0f64 / 3.0).sqrt(), 1e-9);
        assert_close(get(t, "HRV_RMSSD"), 3000.0f64.sqrt(), 1e-9);
        assert_close(get(t, "HRV_pNN50"), 100.0 / 3.0, 1e-9);
        assert_close(get(t, "HRV_pNN20"), 100.0, 1e-9);
        assert_close(get(t, "HRV_MedianNN"), 810.0, 1e-9);
        assert_close(get(t, "HRV_Prc20NN"), 792.0, 1e-9);
        assert_close(get(t, "HRV_Prc80NN"), 832.0, 1e-9);
        assert_close(get(t, "HRV_IQRNN"), 32.5, 1e-9);
        assert_close(get(t, "HRV_MinNN"), 780.0, 1e-9);
        assert_close(get(t, "HRV_MaxNN"), 850.0, 1e-9);
    }

    #[test]
    fn rejects_too_few_beats() {
        let rr = RRSeries { rr: vec![0.8] };
        let err = hrv_metrics_from_rr(&rr, &HrvConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientBeats { needed: 3, found: 2 }
        ));
        let bad = RRSeries {
            rr: vec![0.8, -0.1, 0.8],
        };
        assert!(matches!(
            hrv_metrics_from_rr(&bad, &HrvConfig::default()),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn three_beats_yield_all_tables() {
        let points = [0.5, 1.3, 2.1].map(|t| FiducialPoint {
            index: (t * 360.0) as usize,
            time: t,
            amplitude: 1.0,
        });
        let series = IntervalSeries::from_fiducials(&points);
        let m = hrv_metrics(&series, &HrvConfig::default()).unwrap();
        assert!(get(&m.time_domain, "HRV_MeanNN").is_some());
        assert!(m.frequency_domain.contains_key("HRV_LF"));
        assert!(m.frequency_domain.values().all(Option::is_none));
        assert!(get(&m.non_linear_domain, "HRV_SD1").is_none());
        assert!(get(&m.non_linear_domain, "HRV_DFA_alpha1").is_none());
    }

    #[test]
    fn poincare_descriptors_are_consistent() {
        let m = hrv_metrics_from_rr(&rr_series(), &HrvConfig::default()).unwrap();
        let nl = &m.non_linear_domain;
        let sd1 = get(nl, "HRV_SD1").unwrap();
        let sd2 = get(nl, "HRV_SD2").unwrap();
        let sdsd = get(&m.time_domain, "HRV_SDSD").unwrap();
        assert!((sd1 - sdsd / 2f64.sqrt()).abs() < 1e-9);
        assert_close(get(nl, "HRV_SD1SD2"), sd1 / sd2, 1e-9);
        assert_close(get(nl, "HRV_S"), PI * sd1 * sd2, 1e-6);
        assert_close(get(nl, "HRV_CSI"), sd2 / sd1, 1e-9);
        assert!(get(nl, "HRV_SampEn").is_some());
        assert!(get(nl, "HRV_ApEn").is_some());
        assert!(get(nl, "HRV_DFA_alpha1").is_some());
        assert!(get(nl, "HRV_DFA_alpha2").is_none());
    }

    #[test]
    fn psd_places_respiratory_power_in_hf() {
        // 0.25 Hz modulation of the interval series should dominate the HF band.
        let mut rr = Vec::new();
        let mut t = 0.0;
        while t < 300.0 {
            let interval = 0.8 + 0.05 * (2.0 * PI * 0.25 * t).sin();
            rr.push(interval);
            t += interval;
        }
        let m = hrv_metrics_from_rr(&RRSeries { rr }, &HrvConfig::default()).unwrap();
        let f = &m.frequency_domain;
        let hf = get(f, "HRV_HF").unwrap();
        let lf = get(f, "HRV_LF").unwrap();
        assert!(hf > 10.0 * lf, "hf {hf} lf {lf}");
        let tp = get(f, "HRV_TP").unwrap();
        assert_close(get(f, "HRV_HFn"), hf / tp, 1e-9);
        assert_close(get(f, "HRV_LnHF"), hf.ln(), 1e-9);
        // Sinusoid amplitude 50 ms carries 1250 ms² of variance.
        assert!(hf > 600.0 && hf < 1400.0, "hf {hf}");
    }

    #[test]
    fn dfa_separates_smooth_and_alternating_rhythms() {
        let line = least_squares([(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((line.0 - 2.0).abs() < 1e-12 && (line.1 - 1.0).abs() < 1e-12);
        assert!(least_squares([(1.0, 1.0)]).is_none());
        assert!(detrended_variance(&[0.1, 0.2, 0.3, 0.4]) < 1e-20);

        // Slow drift integrates to a curved profile: F(n) grows roughly as n².
        let smooth: Vec<f64> = (0..128)
            .map(|i| 0.8 + 0.05 * (2.0 * PI * i as f64 / 64.0).sin())
            .collect();
        let alpha = dfa_alpha(&smooth, 4..=16).unwrap();
        assert!(alpha > 1.2, "alpha1 {alpha}");

        // Beat-to-beat alternation leaves a flat profile: F(n) barely moves.
        let alternating: Vec<f64> = (0..128)
            .map(|i| if i % 2 == 0 { 0.75 } else { 0.85 })
            .collect();
        let alpha = dfa_alpha(&alternating, 4..=16).unwrap();
        assert!(alpha < 0.3, "alpha1 {alpha}");

        assert!(dfa_alpha(&smooth[..20], 16..=64).is_none());
    }

    #[test]
    fn constant_rhythm_has_no_entropy() {
        let rr = RRSeries { rr: vec![0.8; 30] };
        let m = hrv_metrics_from_rr(&rr, &HrvConfig::default()).unwrap();
        assert!(get(&m.non_linear_domain, "HRV_SampEn").is_none());
        assert_close(get(&m.time_domain, "HRV_SDNN"), 0.0, 1e-9);
        assert!(get(&m.frequency_domain, "HRV_LnHF").is_none());
        assert!(m
            .frequency_domain
            .values()
            .flatten()
            .all(|v| v.abs() < 1e-9));
    }
}

use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

#[derive(Deserialize)]
struct Fiducial {
    time: f64,
    amplitude: f64,
}

#[derive(Deserialize)]
struct SegmentOutput {
    sampling_rate: f64,
    segment: Vec<[f64; 2]>,
    fiducials: Vec<Fiducial>,
    intervals: Vec<[f64; 2]>,
    metrics: BTreeMap<String, BTreeMap<String, Option<f64>>>,
}

#[derive(Deserialize)]
struct RpeakOutput {
    count: usize,
    indices: Vec<usize>,
}

#[test]
fn segment_reports_window_and_metrics() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("ecgkit");
    cmd.args([
        "segment",
        "--input",
        &sample_path("test_data/synthetic_mlii.csv"),
        "--fs",
        "360",
        "--t0",
        "1.0",
        "--t1",
        "10.0",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let actual: SegmentOutput = serde_json::from_slice(&out)?;

    assert_eq!(actual.sampling_rate, 360.0);
    assert!(actual.segment.iter().all(|p| p[0] >= 1.0 && p[0] <= 10.0));
    assert_eq!(actual.segment.len(), 9 * 360 + 1);
    assert_eq!(actual.fiducials.len(), 11);
    assert!(actual.fiducials.iter().all(|f| f.amplitude > 0.5));
    assert_eq!(actual.intervals.len(), actual.fiducials.len() - 1);
    assert!((actual.intervals[0][0] - actual.fiducials[1].time).abs() < 1e-9);

    for table in ["time_domain", "frequency_domain", "non_linear_domain"] {
        assert!(actual.metrics.contains_key(table), "missing {table}");
    }
    let mean_nn = actual.metrics["time_domain"]["HRV_MeanNN"].expect("MeanNN");
    assert!((mean_nn - 800.0).abs() < 20.0, "MeanNN {mean_nn}");
    Ok(())
}

#[test]
fn segment_output_is_json_safe() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("ecgkit");
    cmd.args([
        "segment",
        "--input",
        &sample_path("test_data/synthetic_mlii.csv"),
        "--t0",
        "0",
        "--t1",
        "2.5",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out)?;
    assert!(!text.contains("NaN"));
    let value: Value = serde_json::from_str(&text)?;
    // Three beats: every frequency metric is undefined.
    assert_eq!(value["fiducials"].as_array().map(Vec::len), Some(3));
    let freq = value["metrics"]["frequency_domain"]
        .as_object()
        .expect("frequency table");
    assert!(freq.values().all(Value::is_null));
    Ok(())
}

#[test]
fn short_window_fails_with_insufficient_beats() {
    let mut cmd = cargo_bin_cmd!("ecgkit");
    cmd.args([
        "segment",
        "--input",
        &sample_path("test_data/synthetic_mlii.csv"),
        "--t0",
        "0",
        "--t1",
        "1",
    ]);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("insufficient beats"), "stderr: {stderr}");
}

#[test]
fn inverted_window_is_rejected() {
    let mut cmd = cargo_bin_cmd!("ecgkit");
    cmd.args([
        "segment",
        "--input",
        &sample_path("test_data/synthetic_mlii.csv"),
        "--t0",
        "5",
        "--t1",
        "2",
    ]);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid time window"), "stderr: {stderr}");
}

#[test]
fn missing_channel_names_the_column() {
    let mut cmd = cargo_bin_cmd!("ecgkit");
    cmd.args([
        "find-rpeaks",
        "--input",
        &sample_path("test_data/synthetic_mlii.csv"),
        "--channel",
        "II",
    ]);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("channel 'II' not found"), "stderr: {stderr}");
}

#[test]
fn finds_every_rpeak() -> Result<(), Box<dyn Error>> {
    for channel in ["MLII", "V5"] {
        let mut cmd = cargo_bin_cmd!("ecgkit");
        cmd.args([
            "find-rpeaks",
            "--input",
            &sample_path("test_data/synthetic_mlii.csv"),
            "--channel",
            channel,
        ]);
        let out = cmd.assert().success().get_output().stdout.clone();
        let actual: RpeakOutput = serde_json::from_slice(&out)?;
        assert_eq!(actual.count, 24, "channel {channel}");
        assert!(actual.indices.windows(2).all(|w| w[1] - w[0] >= 72));
    }
    Ok(())
}

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn sample_path(relative: &str) -> String {
    workspace_root()
        .join(relative)
        .to_string_lossy()
        .to_string()
}

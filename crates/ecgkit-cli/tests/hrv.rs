use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;

fn sample_path(relative: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
        .to_string_lossy()
        .to_string()
}

#[test]
fn hrv_from_rr_file() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("ecgkit");
    cmd.args(["hrv", "--input", &sample_path("test_data/tiny_rr.txt")]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let metrics: Value = serde_json::from_slice(&out)?;

    let mean_nn = metrics["time_domain"]["HRV_MeanNN"].as_f64().expect("MeanNN");
    assert!(mean_nn > 700.0 && mean_nn < 900.0, "MeanNN {mean_nn}");
    let lf = metrics["frequency_domain"]["HRV_LF"].as_f64().expect("LF");
    let hf = metrics["frequency_domain"]["HRV_HF"].as_f64().expect("HF");
    assert!(hf > lf, "LF {lf} HF {hf}");
    assert!(metrics["non_linear_domain"]["HRV_SD1"].as_f64().is_some());
    Ok(())
}

#[test]
fn hrv_from_stdin_with_short_series() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("ecgkit");
    cmd.arg("hrv").write_stdin("# rr\n0.80\n0.85\n0.78\n");
    let out = cmd.assert().success().get_output().stdout.clone();
    let metrics: Value = serde_json::from_slice(&out)?;

    let mean_nn = metrics["time_domain"]["HRV_MeanNN"].as_f64().expect("MeanNN");
    assert!((mean_nn - 810.0).abs() < 1e-6);
    // Too short for a spectrum.
    assert!(metrics["frequency_domain"]["HRV_HF"].is_null());
    Ok(())
}

#[test]
fn hrv_rejects_too_few_intervals() {
    let mut cmd = cargo_bin_cmd!("ecgkit");
    cmd.arg("hrv").write_stdin("0.8\n");
    let assert = cmd.assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("insufficient beats"), "stderr: {stderr}");
}

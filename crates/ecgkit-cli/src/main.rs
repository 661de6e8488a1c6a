use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ecgkit_lib::{
    analyze_segment, classify_beats,
    beats::scorer::CommandScorer,
    extract_beat,
    io::{text as text_io, CsvWaveform},
    metrics::hrv::{hrv_metrics_from_rr, HrvMetrics},
    plot::{figure_from_beat, figure_from_segment, Figure, Series},
    report::{build_report_prompt, clean_report_text},
    sanitize, AnalysisConfig, PreparedRecording, RRSeries,
};
use ecgkit_store::{analysis_status, cache_path, load_cached_analysis, remove_cached, JsonFileCache};
use log::info;
use plotters::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Parser)]
#[command(
    name = "ecgkit",
    version,
    about = "ecgkit: ECG segment analysis and beat classification"
)]
struct Cli {
    /// TOML file overriding the default analysis settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

/// Where a recording comes from.
#[derive(clap::Args, Debug, Clone)]
struct RecordingArgs {
    /// CSV recording with a header row
    #[arg(long)]
    input: PathBuf,
    /// Sampling rate in Hz
    #[arg(long, default_value_t = 360.0)]
    fs: f64,
    /// Column to analyse (defaults to the configured channel)
    #[arg(long)]
    channel: Option<String>,
}

impl RecordingArgs {
    fn source(&self, cfg: &AnalysisConfig) -> CsvWaveform {
        let channel = self.channel.clone().unwrap_or_else(|| cfg.channel.clone());
        CsvWaveform::new(&self.input, channel, self.fs)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a recording and list its R-peaks
    FindRpeaks {
        #[command(flatten)]
        recording: RecordingArgs,
    },
    /// HRV analysis of the window [t0, t1] seconds
    Segment {
        #[command(flatten)]
        recording: RecordingArgs,
        #[arg(long)]
        t0: f64,
        #[arg(long)]
        t1: f64,
    },
    /// Extract one beat (zero-based index) around its R-peak
    Beat {
        #[command(flatten)]
        recording: RecordingArgs,
        #[arg(long)]
        index: usize,
        #[arg(long, default_value_t = 0.2)]
        pre: f64,
        #[arg(long, default_value_t = 0.4)]
        post: f64,
        /// Also render the beat to this PNG
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Label every beat with an external scorer, caching the result beside the CSV
    Classify {
        #[command(flatten)]
        recording: RecordingArgs,
        /// Scorer program (JSON lines on stdin/stdout)
        #[arg(long)]
        scorer: PathBuf,
        /// Argument passed to the scorer; repeatable
        #[arg(long = "scorer-arg", allow_hyphen_values = true)]
        scorer_args: Vec<String>,
        /// Ignore any stored analysis and recompute
        #[arg(long)]
        force_refresh: bool,
        /// Seconds to wait for the scorer (defaults to the configured timeout)
        #[arg(long)]
        timeout_s: Option<f64>,
    },
    /// Print the stored classification of a recording
    Analysis {
        #[arg(long)]
        input: PathBuf,
    },
    /// Report whether a classification is stored for a recording
    AnalysisStatus {
        #[arg(long)]
        input: PathBuf,
    },
    /// Delete the stored classification of a recording (best-effort)
    AnalysisClear {
        #[arg(long)]
        input: PathBuf,
    },
    /// HRV tables from newline-delimited RR intervals (seconds)
    Hrv {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Render the window [t0, t1] with R-peak markers to a PNG
    SegmentPlot {
        #[command(flatten)]
        recording: RecordingArgs,
        #[arg(long)]
        t0: f64,
        #[arg(long)]
        t1: f64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Build the report-writer prompt from `segment` or `hrv` JSON output
    ReportPrompt {
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
    /// Tidy report text returned by the report writer
    ReportClean {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();
    let cfg = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::FindRpeaks { recording } => cmd_find_rpeaks(&recording, &cfg)?,
        Commands::Segment { recording, t0, t1 } => cmd_segment(&recording, t0, t1, &cfg)?,
        Commands::Beat {
            recording,
            index,
            pre,
            post,
            plot,
        } => cmd_beat(&recording, index, pre, post, plot.as_deref(), &cfg)?,
        Commands::Classify {
            recording,
            scorer,
            scorer_args,
            force_refresh,
            timeout_s,
        } => cmd_classify(&recording, scorer, scorer_args, force_refresh, timeout_s, &cfg)?,
        Commands::Analysis { input } => cmd_analysis(&input)?,
        Commands::AnalysisStatus { input } => print_json(&analysis_status(&input))?,
        Commands::AnalysisClear { input } => cmd_analysis_clear(&input)?,
        Commands::Hrv { input } => cmd_hrv(input.as_deref(), &cfg)?,
        Commands::SegmentPlot {
            recording,
            t0,
            t1,
            out,
        } => cmd_segment_plot(&recording, t0, t1, &out, &cfg)?,
        Commands::ReportPrompt { metrics } => cmd_report_prompt(metrics.as_deref())?,
        Commands::ReportClean { input } => println!("{}", clean_report_text(&read_text(input.as_deref())?)),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let js = serde_json::to_string(&sanitize(value)?)?;
    println!("{}", js);
    Ok(())
}

fn read_text(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

#[derive(Serialize)]
struct RpeakOutput {
    source: String,
    fs: f64,
    sample_count: usize,
    count: usize,
    indices: Vec<usize>,
    times: Vec<f64>,
}

fn cmd_find_rpeaks(recording: &RecordingArgs, cfg: &AnalysisConfig) -> Result<()> {
    let source = recording.source(cfg);
    let prepared = PreparedRecording::load(&source, cfg)
        .with_context(|| format!("detecting R-peaks in {}", recording.input.display()))?;
    print_json(&RpeakOutput {
        source: prepared.source.clone(),
        fs: prepared.raw.fs,
        sample_count: prepared.raw.len(),
        count: prepared.fiducials.len(),
        times: prepared.fiducial_times(),
        indices: prepared.fiducials.indices,
    })
}

fn cmd_segment(recording: &RecordingArgs, t0: f64, t1: f64, cfg: &AnalysisConfig) -> Result<()> {
    let source = recording.source(cfg);
    let analysis = analyze_segment(&source, t0, t1, cfg).with_context(|| {
        format!(
            "analysing {} over [{}, {}] s",
            recording.input.display(),
            t0,
            t1
        )
    })?;
    print_json(&analysis)
}

fn cmd_beat(
    recording: &RecordingArgs,
    index: usize,
    pre: f64,
    post: f64,
    plot: Option<&Path>,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let source = recording.source(cfg);
    let epoch = extract_beat(&source, index, pre, post, cfg)
        .with_context(|| format!("extracting beat {} of {}", index, recording.input.display()))?;
    if let Some(out) = plot {
        draw_plotters_figure(out, &figure_from_beat(&epoch))?;
    }
    print_json(&epoch)
}

fn cmd_classify(
    recording: &RecordingArgs,
    scorer: PathBuf,
    scorer_args: Vec<String>,
    force_refresh: bool,
    timeout_s: Option<f64>,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let timeout_s = timeout_s.unwrap_or(cfg.classifier.timeout_s);
    if !(timeout_s.is_finite() && timeout_s > 0.0) {
        bail!("--timeout-s must be positive, got {}", timeout_s);
    }
    let scorer =
        CommandScorer::new(scorer, scorer_args).with_timeout(Duration::from_secs_f64(timeout_s));
    let source = recording.source(cfg);
    let result = classify_beats(&source, &scorer, &JsonFileCache, force_refresh, cfg)
        .with_context(|| format!("classifying beats of {}", recording.input.display()))?;
    let counts: Vec<String> = result
        .summary()
        .iter()
        .map(|(label, n)| format!("{}={}", label.code(), n))
        .collect();
    info!(
        "{} beats ({}); analysis at {}",
        result.beat_count,
        counts.join(" "),
        cache_path(&recording.input).display()
    );
    print_json(&result)
}

fn cmd_analysis(input: &Path) -> Result<()> {
    match load_cached_analysis(input) {
        Some(analysis) => print_json(&analysis),
        None => bail!("no analysis stored for {}", input.display()),
    }
}

#[derive(Serialize)]
struct ClearOutput {
    cache_path: PathBuf,
    removed: bool,
}

fn cmd_analysis_clear(input: &Path) -> Result<()> {
    let removed = remove_cached(input);
    print_json(&ClearOutput {
        cache_path: cache_path(input),
        removed,
    })
}

fn cmd_hrv(input: Option<&Path>, cfg: &AnalysisConfig) -> Result<()> {
    let rr = match input {
        Some(path) => text_io::read_rr_intervals(path)?,
        None => text_io::parse_rr_intervals(&read_text(None)?)?,
    };
    let metrics = hrv_metrics_from_rr(&RRSeries { rr }, &cfg.hrv)?;
    print_json(&metrics)
}

fn cmd_segment_plot(
    recording: &RecordingArgs,
    t0: f64,
    t1: f64,
    out: &Path,
    cfg: &AnalysisConfig,
) -> Result<()> {
    let source = recording.source(cfg);
    let analysis = analyze_segment(&source, t0, t1, cfg)
        .with_context(|| format!("analysing {}", recording.input.display()))?;
    draw_plotters_figure(out, &figure_from_segment(&analysis, 4096))
}

fn cmd_report_prompt(metrics: Option<&Path>) -> Result<()> {
    let value: Value = serde_json::from_str(&read_text(metrics)?).context("parsing metrics JSON")?;
    // Accept either a full `segment` result or bare metric tables.
    let tables = value.get("metrics").cloned().unwrap_or(value);
    let metrics: HrvMetrics =
        serde_json::from_value(tables).context("expected time/frequency/non-linear tables")?;
    println!("{}", build_report_prompt(&metrics)?);
    Ok(())
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let Some((mut x_min, mut x_max, mut y_min, mut y_max)) = fig.bounds() else {
        bail!("nothing to plot");
    };
    if x_max <= x_min {
        x_min -= 0.5;
        x_max += 0.5;
    }
    if y_max <= y_min {
        y_min -= 0.5;
        y_max += 0.5;
    }
    let backend = BitMapBackend::new(path, (1000, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    let mut mesh = chart.configure_mesh();
    if let Some(label) = &fig.x.label {
        mesh.x_desc(label.as_str());
    }
    if let Some(label) = &fig.y.label {
        mesh.y_desc(label.as_str());
    }
    mesh.draw()?;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let (r, g, b) = line.style.color.rgb();
                chart.draw_series(LineSeries::new(
                    line.points.iter().map(|p| (p[0], p[1])),
                    RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                ))?;
            }
            Series::Points(points) => {
                let (r, g, b) = points.style.color.rgb();
                let radius = points.style.width.round().max(1.0) as i32;
                chart.draw_series(
                    points
                        .points
                        .iter()
                        .map(|p| Circle::new((p[0], p[1]), radius, RGBColor(r, g, b).filled())),
                )?;
            }
        }
    }
    root.present()?;
    Ok(())
}

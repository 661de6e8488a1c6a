use crate::error::{AnalysisError, Result};
use crate::signal::TimeSeries;
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Something that can yield a waveform on demand.
///
/// `identity` is the cache key; `load` is only called when the waveform is
/// actually needed, so a cache hit never touches the underlying data.
pub trait WaveformSource {
    fn identity(&self) -> String;
    fn load(&self) -> Result<TimeSeries>;
}

/// One named column of a CSV recording.
#[derive(Debug, Clone)]
pub struct CsvWaveform {
    pub path: PathBuf,
    pub channel: String,
    pub fs: f64,
}

impl CsvWaveform {
    pub fn new(path: impl Into<PathBuf>, channel: impl Into<String>, fs: f64) -> Self {
        Self {
            path: path.into(),
            channel: channel.into(),
            fs,
        }
    }
}

impl WaveformSource for CsvWaveform {
    fn identity(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn load(&self) -> Result<TimeSeries> {
        load_channel(&self.path, &self.channel, self.fs)
    }
}

/// Waveform already held in memory, mostly for tests and embedding.
#[derive(Debug, Clone)]
pub struct InMemoryWaveform {
    pub id: String,
    pub series: TimeSeries,
}

impl WaveformSource for InMemoryWaveform {
    fn identity(&self) -> String {
        self.id.clone()
    }

    fn load(&self) -> Result<TimeSeries> {
        Ok(self.series.clone())
    }
}

/// Load `channel` from a headed CSV file sampled at `fs`.
pub fn load_channel(path: &Path, channel: &str, fs: f64) -> Result<TimeSeries> {
    let file = std::fs::File::open(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = read_channel(file, channel).map_err(|err| match err {
        AnalysisError::Csv { source, .. } => AnalysisError::Csv {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    log::debug!(
        "loaded {} samples of '{}' from {}",
        data.len(),
        channel,
        path.display()
    );
    TimeSeries::new(fs, data)
}

/// Read one numeric column from CSV text with a header row.
pub fn read_channel<R: Read>(reader: R, channel: &str) -> Result<Vec<f64>> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);
    let headers = rdr.headers().map_err(csv_error)?.clone();
    let column = locate_column(&headers, channel).ok_or_else(|| AnalysisError::MissingChannel {
        channel: channel.to_string(),
        available: headers.iter().map(clean_header).collect(),
    })?;

    let mut data = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_error)?;
        let raw = record.get(column).unwrap_or("");
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => data.push(value),
            _ => {
                return Err(AnalysisError::InvalidInput(format!(
                    "row {} column '{}' is not a finite number: '{}'",
                    row + 1,
                    channel,
                    raw
                )))
            }
        }
    }
    if data.is_empty() {
        return Err(AnalysisError::InvalidInput(format!(
            "channel '{channel}' has no samples"
        )));
    }
    Ok(data)
}

fn locate_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| clean_header(h) == name)
}

fn clean_header(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '\'' || c == '"').trim().to_string()
}

fn csv_error(source: csv::Error) -> AnalysisError {
    AnalysisError::Csv {
        path: PathBuf::new(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "'sample #','MLII','V5'\n0,-0.145,-0.065\n1,-0.145,-0.065\n2,-0.150,-0.070\n";

    #[test]
    fn reads_quoted_channel() {
        let data = read_channel(SAMPLE.as_bytes(), "MLII").unwrap();
        assert_eq!(data, vec![-0.145, -0.145, -0.150]);
    }

    #[test]
    fn missing_channel_lists_columns() {
        let err = read_channel(SAMPLE.as_bytes(), "II").unwrap_err();
        match err {
            AnalysisError::MissingChannel { channel, available } => {
                assert_eq!(channel, "II");
                assert_eq!(available, vec!["sample #", "MLII", "V5"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_non_numeric_cells() {
        let err = read_channel("MLII\n0.1\nabc\n".as_bytes(), "MLII").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(msg) if msg.contains("row 2")));
        let err = read_channel("MLII\n".as_bytes(), "MLII").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(msg) if msg.contains("no samples")));
        for bad in ["nan", "NaN", "inf", "-inf", "infinity"] {
            let text = format!("MLII\n0.1\n0.2\n{bad}\n");
            let err = read_channel(text.as_bytes(), "MLII").unwrap_err();
            assert!(
                matches!(&err, AnalysisError::InvalidInput(msg) if msg.contains("row 3")),
                "{bad}: {err:?}"
            );
        }
    }

    #[test]
    fn csv_source_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("100.csv");
        std::fs::write(&path, SAMPLE).unwrap();
        let source = CsvWaveform::new(&path, "V5", 360.0);
        let ts = source.load().unwrap();
        assert_eq!(ts.fs, 360.0);
        assert_eq!(ts.data.len(), 3);
        assert_eq!(source.identity(), path.to_string_lossy());

        let missing = CsvWaveform::new(dir.path().join("nope.csv"), "MLII", 360.0);
        assert!(matches!(missing.load(), Err(AnalysisError::Io { .. })));
    }
}

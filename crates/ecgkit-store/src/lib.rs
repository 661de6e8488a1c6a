//! File-backed storage for finished beat classifications.
//!
//! The analysis of `…/<stem>.csv` lives next to it as `…/<stem>_analyse.json`.

use anyhow::{Context, Result};
use ecgkit_lib::{
    beats::classify::{AnalysisCache, BeatClassification},
    error::AnalysisError,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SUFFIX: &str = "_analyse.json";

/// Where the analysis for `source` is stored.
pub fn cache_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}{SUFFIX}"))
}

pub fn write_analysis(path: &Path, analysis: &BeatClassification) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("creating analysis {}", path.display()))?;
    serde_json::to_writer_pretty(file, analysis)
        .with_context(|| format!("writing analysis {}", path.display()))?;
    Ok(())
}

pub fn read_analysis(path: &Path) -> Result<BeatClassification> {
    let file =
        fs::File::open(path).with_context(|| format!("opening analysis {}", path.display()))?;
    let analysis = serde_json::from_reader::<_, BeatClassification>(file)
        .with_context(|| format!("parsing analysis {}", path.display()))?;
    Ok(analysis)
}

/// The stored analysis for `source`, or `None` if absent or unreadable.
pub fn load_cached_analysis(source: &Path) -> Option<BeatClassification> {
    let path = cache_path(source);
    if !path.exists() {
        debug!("no analysis at {}", path.display());
        return None;
    }
    match read_analysis(&path) {
        Ok(analysis) => Some(analysis),
        Err(err) => {
            warn!("ignoring unreadable analysis: {:#}", err);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub source: PathBuf,
    pub cache_path: PathBuf,
    pub exists: bool,
    /// The file exists and parses.
    pub has_analysis: bool,
}

pub fn analysis_status(source: &Path) -> AnalysisStatus {
    let path = cache_path(source);
    let exists = path.is_file();
    let has_analysis = exists && read_analysis(&path).is_ok();
    AnalysisStatus {
        source: source.to_path_buf(),
        cache_path: path,
        exists,
        has_analysis,
    }
}

/// Delete the stored analysis for `source`. Best-effort: failures are logged and
/// reported as `false`, never raised.
pub fn remove_cached(source: &Path) -> bool {
    let path = cache_path(source);
    match fs::remove_file(&path) {
        Ok(()) => {
            info!("removed analysis {}", path.display());
            true
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
        Err(err) => {
            warn!("could not remove analysis {}: {}", path.display(), err);
            false
        }
    }
}

/// [`AnalysisCache`] keyed by source file path.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFileCache;

impl AnalysisCache for JsonFileCache {
    fn load_cached(&self, key: &str) -> ecgkit_lib::Result<Option<BeatClassification>> {
        Ok(load_cached_analysis(Path::new(key)))
    }

    fn store_cached(&self, key: &str, result: &BeatClassification) -> ecgkit_lib::Result<()> {
        let path = cache_path(Path::new(key));
        write_analysis(&path, result).map_err(|err| AnalysisError::Io {
            path: path.clone(),
            source: std::io::Error::other(format!("{err:#}")),
        })?;
        info!("stored analysis {}", path.display());
        Ok(())
    }
}

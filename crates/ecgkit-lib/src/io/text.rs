//! Plain-text RR interval lists: one value in seconds per line.
//!
//! Anything after `#` is a comment, so annotated exports such as
//! `0.812  # ectopic?` load as-is.

use crate::error::{AnalysisError, Result};
use std::path::Path;

pub fn parse_rr_intervals(text: &str) -> Result<Vec<f64>> {
    let rr = text
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let value = line.split('#').next().unwrap_or("").trim();
            (!value.is_empty()).then_some((idx + 1, value))
        })
        .map(|(lineno, value)| match value.parse::<f64>() {
            Ok(secs) if secs.is_finite() => Ok(secs),
            _ => Err(AnalysisError::InvalidInput(format!(
                "line {lineno}: expected a finite RR interval, got '{value}'"
            ))),
        })
        .collect::<Result<Vec<f64>>>()?;
    if rr.is_empty() {
        return Err(AnalysisError::InvalidInput("no RR intervals found".into()));
    }
    Ok(rr)
}

pub fn read_rr_intervals(path: &Path) -> Result<Vec<f64>> {
    std::fs::read_to_string(path)
        .map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|text| parse_rr_intervals(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let rr = parse_rr_intervals("# exported rr\n0.800\n\n  0.812 # ectopic?\n0.790\n").unwrap();
        assert_eq!(rr, vec![0.8, 0.812, 0.79]);
    }

    #[test]
    fn bad_values_name_their_line() {
        let err = parse_rr_intervals("0.8\nnope\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(matches!(
            parse_rr_intervals("# nothing here\n"),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        for bad in ["NaN", "inf", "-inf", "infinity"] {
            let err = parse_rr_intervals(&format!("0.80\n0.81\n{bad}\n")).unwrap_err();
            assert!(
                matches!(&err, AnalysisError::InvalidInput(msg) if msg.contains("line 3")),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_rr_intervals(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, AnalysisError::Io { .. }));
    }
}

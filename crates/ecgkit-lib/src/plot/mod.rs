use crate::{beats::epochs::BeatEpoch, pipeline::SegmentAnalysis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    /// Unconnected markers, e.g. R-peaks.
    Points(LineSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(s) | Series::Points(s) => &s.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over all series, or `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut pts = self.series.iter().flat_map(|s| s.points().iter());
        let first = pts.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(pts.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Lead trace with R-peak markers for a windowed analysis.
pub fn figure_from_segment(analysis: &SegmentAnalysis, max_points: usize) -> Figure {
    let window = analysis.window;
    let title = format!(
        "{} [{:.1} s, {:.1} s] ({:.1} s, {} beats)",
        analysis.source,
        window.t0,
        window.t1,
        window.length(),
        analysis.fiducials.len()
    );
    let mut fig = Figure::new(Some(title));
    fig.x.label = Some("time (s)".into());
    fig.y.label = Some("amplitude".into());
    fig.add_series(Series::Line(LineSeries {
        name: "ECG".into(),
        points: decimate_points(&analysis.segment, max_points),
        style: Style {
            width: 1.4,
            color: Color(0x1F77B4),
        },
    }));
    fig.add_series(Series::Points(LineSeries {
        name: "R-peaks".into(),
        points: analysis.fiducials.iter().map(|f| [f.time, f.amplitude]).collect(),
        style: Style {
            width: 3.0,
            color: Color(0xD62728),
        },
    }));
    fig
}

/// One beat against time relative to its R-peak.
pub fn figure_from_beat(epoch: &BeatEpoch) -> Figure {
    let mut fig = Figure::new(Some(format!("beat {} at {:.3} s", epoch.beat, epoch.r_time)));
    fig.x.label = Some("time from R-peak (s)".into());
    fig.y.label = Some("amplitude".into());
    fig.add_series(Series::Line(LineSeries {
        name: "beat".into(),
        points: epoch
            .relative_time
            .iter()
            .zip(&epoch.amplitude)
            .map(|(t, a)| [*t, *a])
            .collect(),
        style: Style {
            width: 2.0,
            color: Color(0xFF0077),
        },
    }));
    fig
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimation_caps_point_count() {
        let points: Vec<[f64; 2]> = (0..10_000).map(|i| [i as f64, 0.0]).collect();
        let out = decimate_points(&points, 1000);
        assert_eq!(out.len(), 1000);
        assert_eq!(out[0], [0.0, 0.0]);
        assert_eq!(decimate_points(&points[..10], 1000).len(), 10);
    }

    #[test]
    fn segment_figure_titles_window_and_beats() {
        let analysis = SegmentAnalysis {
            source: "100.csv".into(),
            sampling_rate: 100.0,
            window: crate::signal::TimeWindow::new(2.0, 12.5).unwrap(),
            segment: (200..=1250).map(|i| [i as f64 / 100.0, 0.0]).collect(),
            fiducials: vec![
                crate::segment::FiducialPoint { index: 300, time: 3.0, amplitude: 1.0 },
                crate::segment::FiducialPoint { index: 400, time: 4.0, amplitude: 1.1 },
            ],
            intervals: vec![[4.0, 1.0]],
            metrics: Default::default(),
        };
        let fig = figure_from_segment(&analysis, 500);
        assert_eq!(fig.title.as_deref(), Some("100.csv [2.0 s, 12.5 s] (10.5 s, 2 beats)"));
        assert_eq!(fig.series.len(), 2);
    }

    #[test]
    fn beat_figure_has_bounds() {
        let epoch = BeatEpoch {
            beat: 1,
            index: 10,
            r_time: 0.1,
            relative_time: vec![-0.1, 0.0, 0.1],
            amplitude: vec![0.0, 1.5, -0.5],
        };
        let fig = figure_from_beat(&epoch);
        assert_eq!(fig.bounds(), Some((-0.1, 0.1, -0.5, 1.5)));
        assert_eq!(Color(0xFF0077).rgb(), (0xFF, 0x00, 0x77));
        assert!(Figure::new(None::<String>).bounds().is_none());
    }
}

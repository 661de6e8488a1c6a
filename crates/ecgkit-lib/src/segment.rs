use crate::signal::{Events, TimeSeries, TimeWindow};
use serde::{Deserialize, Serialize};

/// One detected beat inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiducialPoint {
    pub index: usize,
    pub time: f64,
    pub amplitude: f64,
}

/// Samples and fiducials inside an inclusive time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub window: TimeWindow,
    /// `[time, amplitude]` pairs
    pub samples: Vec<[f64; 2]>,
    pub fiducials: Vec<FiducialPoint>,
}

/// Successive inter-beat intervals tagged with the time of the later beat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntervalSeries {
    /// `[time, interval seconds]` pairs
    pub points: Vec<[f64; 2]>,
}

impl IntervalSeries {
    pub fn from_fiducials(fiducials: &[FiducialPoint]) -> Self {
        let points = fiducials
            .windows(2)
            .map(|w| [w[1].time, w[1].time - w[0].time])
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Slice `ts` and `events` to `t0 <= index / fs <= t1`.
///
/// Amplitudes come from `ts`, so pass the raw lead to report raw values.
pub fn extract_segment(ts: &TimeSeries, events: &Events, window: TimeWindow) -> Segment {
    let samples = window_indices(ts, window)
        .map(|i| [ts.time_at(i), ts.data[i]])
        .collect();
    let fiducials = events
        .indices
        .iter()
        .copied()
        .filter(|&i| i < ts.len() && window.contains(ts.time_at(i)))
        .map(|i| FiducialPoint {
            index: i,
            time: ts.time_at(i),
            amplitude: ts.data[i],
        })
        .collect();
    Segment {
        window,
        samples,
        fiducials,
    }
}

fn window_indices(ts: &TimeSeries, window: TimeWindow) -> impl Iterator<Item = usize> + '_ {
    let lo = ((window.t0 * ts.fs).floor() as usize).saturating_sub(1);
    let hi = (((window.t1 * ts.fs).ceil() as usize).saturating_add(2)).min(ts.len());
    (lo.min(hi)..hi).filter(move |&i| window.contains(ts.time_at(i)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(fs: f64, n: usize) -> TimeSeries {
        TimeSeries {
            fs,
            data: (0..n).map(|i| i as f64).collect(),
        }
    }

    #[test]
    fn returns_exactly_the_inclusive_window() {
        let ts = ramp(10.0, 100);
        let events = Events::from_indices(vec![5, 10, 20, 30, 31, 95]);
        let seg = extract_segment(&ts, &events, TimeWindow::new(1.0, 3.0).unwrap());
        let expected: Vec<[f64; 2]> = (10..=30).map(|i| [i as f64 / 10.0, i as f64]).collect();
        assert_eq!(seg.samples, expected);
        let idx: Vec<usize> = seg.fiducials.iter().map(|f| f.index).collect();
        assert_eq!(idx, vec![10, 20, 30]);
        assert_eq!(seg.fiducials[1].amplitude, 20.0);
    }

    #[test]
    fn window_past_the_end_is_empty() {
        let ts = ramp(10.0, 20);
        let events = Events::from_indices(vec![5, 15]);
        let seg = extract_segment(&ts, &events, TimeWindow::new(5.0, 9.0).unwrap());
        assert!(seg.samples.is_empty());
        assert!(seg.fiducials.is_empty());
    }

    #[test]
    fn intervals_follow_second_endpoint() {
        let points = [0.5, 1.3, 2.0].map(|t| FiducialPoint {
            index: (t * 100.0) as usize,
            time: t,
            amplitude: 1.0,
        });
        let series = IntervalSeries::from_fiducials(&points);
        assert_eq!(series.len(), points.len() - 1);
        assert_eq!(series.points[0][0], 1.3);
        assert!((series.points[0][1] - 0.8).abs() < 1e-12);
        assert!((series.points[1][1] - 0.7).abs() < 1e-12);
    }
}

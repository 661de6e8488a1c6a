pub mod hrv;

pub use hrv::{hrv_metrics, hrv_metrics_from_rr, HrvConfig, HrvMetrics, MetricTable};

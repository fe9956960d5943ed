use super::Monitor;
use tracing::debug;

/// Monitor that forwards every metric as a `tracing` debug event.
///
/// Useful during development and as a reference implementation; production
/// deployments usually implement [`Monitor`] against a real metrics backend
/// instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMonitor;

fn format_labels(labels: &[(&str, &str)]) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl Monitor for LogMonitor {
    fn increment(&self, name: &str, value: u64, labels: &[(&str, &str)]) {
        debug!(metric = name, value, labels = %format_labels(labels), "counter");
    }

    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        debug!(metric = name, value, labels = %format_labels(labels), "gauge");
    }

    fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        debug!(metric = name, value, labels = %format_labels(labels), "histogram");
    }
}

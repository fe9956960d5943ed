use super::Monitor;

/// Monitor that discards everything. Used when no backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMonitor;

impl Monitor for NoOpMonitor {
    fn increment(&self, _name: &str, _value: u64, _labels: &[(&str, &str)]) {}

    fn set_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}

    fn observe_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

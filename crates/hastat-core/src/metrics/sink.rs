//! Emission interface towards the metrics pipeline.

use std::collections::BTreeMap;

use serde::Serialize;

use super::taxonomy::MetricKind;

/// Dimension key → value, kept sorted for stable output.
pub type Dimensions = BTreeMap<String, String>;

/// One finished datapoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub kind: MetricKind,
    pub value: i64,
    /// `None` for metrics with no dimensions at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl MetricSample {
    /// Returns a dimension value.
    pub fn dimension(&self, key: &str) -> Option<&str> {
        self.dimensions
            .as_ref()
            .and_then(|d| d.get(key))
            .map(String::as_str)
    }
}

/// Receiver of finished samples. Buffering and transmission are up to the
/// implementation.
pub trait MetricSink {
    fn submit(&mut self, sample: MetricSample);
}

impl MetricSink for Vec<MetricSample> {
    fn submit(&mut self, sample: MetricSample) {
        self.push(sample);
    }
}

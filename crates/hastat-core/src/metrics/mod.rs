//! Metric taxonomy, mapping of aggregated values to samples, and the sink
//! samples are handed to.

pub mod mapper;
pub mod sink;
pub mod taxonomy;

pub use mapper::MetricMapper;
pub use sink::{Dimensions, MetricSample, MetricSink};
pub use taxonomy::{MetricDef, MetricKind, MetricTier};

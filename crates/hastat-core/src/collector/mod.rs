//! HAProxy control-socket collector.
//!
//! Polls one or more HAProxy stats sockets, parses the replies and folds
//! per-process rows into one set of entities, ready for metric mapping.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Collector                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐  │
//! │  │    fetch     │  │    parser    │  │     aggregate     │  │
//! │  │ - show info  │─▶│ - info       │─▶│ - role/selection  │  │
//! │  │ - show stat  │  │ - stat CSV   │  │ - sum / mean      │  │
//! │  │ - resolvers  │  │ - resolvers  │  └─────────┬─────────┘  │
//! │  └──────┬───────┘  └──────────────┘            │            │
//! │         │                              ┌───────▼───────┐    │
//! │  ┌──────▼──────┐                       │ MetricMapper  │    │
//! │  │  Transport  │ (trait)               └───────┬───────┘    │
//! │  └──────┬──────┘                               │            │
//! └─────────┼──────────────────────────────────────┼────────────┘
//!           │                                      ▼
//!    ┌──────┴─────────┐                       MetricSink
//!    │                │
//! ┌──▼──────────────┐ ┌▼──────────────┐
//! │ SocketTransport │ │ MockTransport │
//! │ (unix / tcp)    │ │ (Testing)     │
//! └─────────────────┘ └───────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production
//!
//! ```ignore
//! use hastat_core::collector::{Collector, SocketTransport};
//! use hastat_core::config::CollectorConfig;
//!
//! let config = CollectorConfig::default();
//! let mut collector = Collector::new(SocketTransport::new(config.timeout), config);
//! let mut samples: Vec<MetricSample> = Vec::new();
//! collector.collect(&mut samples)?;
//! ```
//!
//! ## Testing (with MockTransport)
//!
//! ```
//! use hastat_core::collector::{Collector, Endpoint, MockTransport};
//! use hastat_core::config::CollectorConfig;
//! use hastat_core::metrics::MetricSample;
//!
//! let endpoint = Endpoint::parse("/var/run/haproxy.sock");
//! let transport = MockTransport::typical_haproxy(&endpoint);
//! let mut collector = Collector::new(transport, CollectorConfig::default());
//! let mut samples: Vec<MetricSample> = Vec::new();
//! collector.collect(&mut samples).unwrap();
//! assert!(!samples.is_empty());
//! ```

pub mod aggregate;
#[allow(clippy::module_inception)]
mod collector;
pub mod endpoint;
pub mod fetch;
pub mod mock;
pub mod parser;
pub mod traits;

#[allow(unused_imports)]
pub use aggregate::{AggregatedEntity, Aggregator, EntityKey, EntityRole};
pub use collector::{
    CMD_SHOW_INFO, CMD_SHOW_RESOLVERS, CMD_SHOW_STAT, CollectError, Collector, CollectorTiming,
    CycleReport,
};
pub use endpoint::Endpoint;
pub use mock::MockTransport;
pub use traits::{SocketTransport, Transport};

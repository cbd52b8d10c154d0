//! hastat-core - shared library for the hastat HAProxy stats collector.
//!
//! Provides:
//! - `collector` - control-socket transport, protocol parsers, entity
//!   aggregation and the per-tick collection cycle
//! - `metrics` - metric taxonomy, field-to-metric mapper, sample sink
//! - `config` - collector configuration and collectd-style option parsing

pub mod collector;
pub mod config;
pub mod metrics;

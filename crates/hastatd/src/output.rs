//! Sample writers for stdout.
//!
//! `PutvalSink` speaks the collectd exec-plugin text protocol, `JsonSink`
//! writes one JSON object per line.

use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use hastat_core::metrics::{Dimensions, MetricSample, MetricSink};

/// collectd plugin name.
pub const PLUGIN_NAME: &str = "haproxy";

/// Formats dimensions as `[a=foo,b=bar]`, the form collectd forwarders
/// accept inside a plugin instance.
pub fn format_dimensions(dimensions: &Dimensions) -> String {
    let pairs: Vec<String> = dimensions
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!("[{}]", pairs.join(","))
}

/// collectd identifier `<host>/haproxy[-<dims>]/<kind>-<name>`.
pub fn identifier(host: &str, sample: &MetricSample) -> String {
    let mut plugin = PLUGIN_NAME.to_string();
    if let Some(dims) = sample.dimensions.as_ref().filter(|d| !d.is_empty()) {
        plugin.push('-');
        plugin.push_str(&format_dimensions(dims));
    }
    format!("{}/{}/{}-{}", host, plugin, sample.kind, sample.name)
}

/// Writes `PUTVAL` lines.
pub struct PutvalSink<W: Write> {
    writer: W,
    host: String,
    interval: Duration,
    timestamp: i64,
}

impl<W: Write> PutvalSink<W> {
    pub fn new(writer: W, host: impl Into<String>, interval: Duration) -> Self {
        Self {
            writer,
            host: host.into(),
            interval,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Pins the timestamp written for every following sample.
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&self, sample: &MetricSample) -> String {
        format!(
            "PUTVAL \"{}\" interval={} {}:{}",
            identifier(&self.host, sample),
            self.interval.as_secs().max(1),
            self.timestamp,
            sample.value
        )
    }
}

impl<W: Write> MetricSink for PutvalSink<W> {
    fn submit(&mut self, sample: MetricSample) {
        let line = self.line(&sample);
        if let Err(e) = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush()) {
            warn!("Failed to write sample {}: {}", sample.name, e);
        }
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: i64,
    host: &'a str,
    #[serde(flatten)]
    sample: &'a MetricSample,
}

/// Writes one JSON object per sample.
pub struct JsonSink<W: Write> {
    writer: W,
    host: String,
    timestamp: i64,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W, host: impl Into<String>) -> Self {
        Self {
            writer,
            host: host.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Pins the timestamp written for every following sample.
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricSink for JsonSink<W> {
    fn submit(&mut self, sample: MetricSample) {
        let record = JsonRecord {
            timestamp: self.timestamp,
            host: &self.host,
            sample: &sample,
        };
        let result = serde_json::to_writer(&mut self.writer, &record)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.writer))
            .and_then(|_| self.writer.flush());
        if let Err(e) = result {
            warn!("Failed to write sample {}: {}", sample.name, e);
        }
    }
}

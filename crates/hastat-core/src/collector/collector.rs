//! Collection cycle: fetch → parse → classify/aggregate → map → emit.
//!
//! The `Collector` struct is driven by an external timer; each call to
//! [`Collector::collect`] is one complete, independent cycle.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::collector::aggregate::{Aggregator, is_selected};
use crate::collector::fetch::{FetchOutcome, fetch_all};
use crate::collector::parser::{InfoRecord, merge_info, parse_info, parse_resolvers, parse_stat};
use crate::collector::traits::Transport;
use crate::config::CollectorConfig;
use crate::metrics::{MetricMapper, MetricSink};

/// Global process attributes.
pub const CMD_SHOW_INFO: &str = "show info";
/// Per-proxy statistics table.
pub const CMD_SHOW_STAT: &str = "show stat";
/// DNS resolver counters. Not implemented by older HAProxy versions.
pub const CMD_SHOW_RESOLVERS: &str = "show resolvers";

/// Error type for a collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    /// Not a single configured socket answered.
    NoEndpointsReachable { command: String, endpoints: usize },
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::NoEndpointsReachable { command, endpoints } => write!(
                f,
                "no endpoints reachable: '{}' failed on all {} HAProxy socket(s)",
                command, endpoints
            ),
        }
    }
}

impl std::error::Error for CollectError {}

/// Timing information for each cycle phase.
///
/// Used for debugging slow or hanging sockets.
#[derive(Debug, Clone, Default)]
pub struct CollectorTiming {
    /// Whole cycle.
    pub total: Duration,
    /// `show info` round trips.
    pub info: Duration,
    /// `show stat` round trips.
    pub stat: Duration,
    /// `show resolvers` round trips (zero when not requested).
    pub resolvers: Duration,
    /// Parsing, selection and aggregation.
    pub aggregate: Duration,
    /// Mapping and handing samples to the sink.
    pub emit: Duration,
}

/// What one successful cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Configured endpoints.
    pub endpoints: usize,
    /// Endpoints that answered `show stat`.
    pub endpoints_responded: usize,
    /// Stat rows parsed across all endpoints.
    pub rows: usize,
    /// Stat rows matching the monitor set.
    pub rows_selected: usize,
    /// Nameserver blocks parsed across all endpoints.
    pub nameservers: usize,
    /// Distinct entities after aggregation.
    pub entities: usize,
    /// Samples handed to the sink.
    pub samples: usize,
}

/// Polls the configured control sockets and emits metric samples.
pub struct Collector<T: Transport> {
    transport: T,
    config: CollectorConfig,
    mapper: MetricMapper,
    /// Timing information from the last collect call.
    last_timing: Option<CollectorTiming>,
    last_error: Option<String>,
}

impl<T: Transport> Collector<T> {
    /// Creates a new collector.
    ///
    /// # Arguments
    /// * `transport` - Socket transport (real or mock)
    /// * `config` - Finished collector configuration
    pub fn new(transport: T, config: CollectorConfig) -> Self {
        let mapper = MetricMapper::new(&config);
        Self {
            transport,
            config,
            mapper,
            last_timing: None,
            last_error: None,
        }
    }

    /// Returns the configuration this collector runs with.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns timing information from the last collect call.
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    /// Returns the error of the last cycle, if it failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Runs one collection cycle, handing every sample to `sink`.
    ///
    /// Samples are only emitted once every fetch is done, so a failed cycle
    /// emits nothing. Failures never panic and are never retried here; the
    /// next call starts afresh.
    pub fn collect<S: MetricSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> Result<CycleReport, CollectError> {
        let start = Instant::now();
        let mut timing = CollectorTiming::default();

        let result = self.run_cycle(sink, &mut timing);

        timing.total = start.elapsed();
        debug!("cycle timing: {:?}", timing);
        self.last_timing = Some(timing);

        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                warn!("status err {}", e);
                self.last_error = Some(e.to_string());
            }
        }

        result
    }

    fn fetch(&self, command: &str) -> Result<FetchOutcome, CollectError> {
        let outcome = fetch_all(&self.transport, &self.config.endpoints, command);
        if outcome.all_failed() {
            return Err(CollectError::NoEndpointsReachable {
                command: command.to_string(),
                endpoints: self.config.endpoints.len(),
            });
        }
        Ok(outcome)
    }

    fn run_cycle<S: MetricSink + ?Sized>(
        &self,
        sink: &mut S,
        timing: &mut CollectorTiming,
    ) -> Result<CycleReport, CollectError> {
        let mut report = CycleReport {
            endpoints: self.config.endpoints.len(),
            ..CycleReport::default()
        };

        // FETCH
        let t = Instant::now();
        let info = self.fetch(CMD_SHOW_INFO)?;
        timing.info = t.elapsed();

        let t = Instant::now();
        let stat = self.fetch(CMD_SHOW_STAT)?;
        timing.stat = t.elapsed();
        report.endpoints_responded = stat.responded();

        let resolvers = if self.config.enhanced_metrics {
            let t = Instant::now();
            let outcome = self.fetch(CMD_SHOW_RESOLVERS)?;
            timing.resolvers = t.elapsed();
            Some(outcome)
        } else {
            None
        };

        // PARSE, CLASSIFY + AGGREGATE
        let t = Instant::now();
        let records: Vec<InfoRecord> = info.successful().map(parse_info).collect();
        let merged_info = merge_info(&records, self.config.endpoints.len() > 1);

        let mut aggregator = Aggregator::new();
        for row in stat.successful().flat_map(parse_stat) {
            report.rows += 1;
            if is_selected(&row, &self.config.proxy_monitors) {
                report.rows_selected += 1;
                aggregator.add_row(&row);
            }
        }

        if let Some(resolvers) = &resolvers {
            for body in resolvers.successful() {
                let parsed = parse_resolvers(body);
                report.nameservers += parsed.len();
                aggregator.add_resolvers(&parsed);
            }
        }
        report.entities = aggregator.len();
        timing.aggregate = t.elapsed();

        // MAP + EMIT
        let t = Instant::now();
        let mut samples = self.mapper.map_info(&merged_info);
        for entity in aggregator.into_entities() {
            samples.extend(self.mapper.map_entity(&entity));
        }

        if samples.is_empty() {
            warn!("haproxy: No data received");
        }

        report.samples = samples.len();
        for sample in samples {
            trace!("{:?}", sample);
            sink.submit(sample);
        }
        timing.emit = t.elapsed();

        debug!(
            "cycle: {}/{} endpoints, {} rows ({} selected), {} nameservers, {} entities, {} samples",
            report.endpoints_responded,
            report.endpoints,
            report.rows,
            report.rows_selected,
            report.nameservers,
            report.entities,
            report.samples
        );

        Ok(report)
    }
}

//! hastatd - HAProxy stats collector daemon.
//!
//! Polls HAProxy control sockets on a fixed interval and writes metric
//! samples to stdout, either as collectd `PUTVAL` lines (exec plugin) or as
//! JSON lines. Logs go to stderr.

mod output;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use hastat_core::collector::{Collector, SocketTransport};
use hastat_core::config::{CollectorConfig, ConfigOption, parse_config_file};
use hastat_core::metrics::MetricSink;

use crate::output::{JsonSink, PutvalSink};

/// Polling interval when neither the config nor the command line sets one.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// collectd exec-plugin `PUTVAL` lines.
    Putval,
    /// One JSON object per sample.
    Json,
}

/// HAProxy stats collector daemon.
#[derive(Parser, Debug)]
#[command(name = "hastatd", about = "HAProxy stats collector daemon", version)]
struct Args {
    /// HAProxy control socket: a path, unix://PATH, tcp://HOST:PORT or
    /// HOST:PORT. Repeat for multi-process setups.
    #[arg(short, long = "socket", value_name = "ADDR")]
    sockets: Vec<String>,

    /// Proxy or service name to report on (e.g. frontend, backend, server,
    /// or a proxy name). Repeatable.
    #[arg(short, long = "proxy-monitor", value_name = "NAME")]
    proxy_monitors: Vec<String>,

    /// Metric name never to report. Repeatable.
    #[arg(long = "exclude-metric", value_name = "NAME")]
    exclude_metrics: Vec<String>,

    /// Extra dimension added to every sample, as KEY=VALUE. Repeatable.
    #[arg(short, long = "dimension", value_name = "KEY=VALUE", value_parser = parse_dimension)]
    dimensions: Vec<(String, String)>,

    /// Also report the enhanced metric set and DNS resolver counters.
    #[arg(short, long)]
    enhanced_metrics: bool,

    /// Collection interval in seconds.
    #[arg(short, long, env = "COLLECTD_INTERVAL")]
    interval: Option<f64>,

    /// Per-socket connect/read timeout in seconds.
    #[arg(short, long)]
    timeout: Option<f64>,

    /// collectd-style config file (Socket, ProxyMonitor, ...). Command line
    /// options are applied after it.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host name written into PUTVAL identifiers and JSON records.
    #[arg(long, env = "COLLECTD_HOSTNAME", default_value = "localhost")]
    hostname: String,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Putval)]
    format: OutputFormat,

    /// Run a single collection cycle and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Parses a `KEY=VALUE` dimension.
fn parse_dimension(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("invalid dimension '{}', expected KEY=VALUE", s)),
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("hastatd={}", level).parse().unwrap())
        .add_directive(format!("hastat_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Turns command line arguments into module options, appended after the
/// options read from the config file.
fn cli_options(args: &Args) -> Vec<ConfigOption> {
    let mut options = Vec::new();

    for socket in &args.sockets {
        options.push(ConfigOption::new("Socket", &[socket.as_str()]));
    }
    for monitor in &args.proxy_monitors {
        options.push(ConfigOption::new("ProxyMonitor", &[monitor.as_str()]));
    }
    for metric in &args.exclude_metrics {
        options.push(ConfigOption::new("ExcludeMetric", &[metric.as_str()]));
    }
    for (key, value) in &args.dimensions {
        options.push(ConfigOption::new("Dimension", &[key.as_str(), value.as_str()]));
    }
    if args.enhanced_metrics {
        options.push(ConfigOption::new("EnhancedMetrics", &["true"]));
    }
    if let Some(interval) = args.interval {
        options.push(ConfigOption::new("Interval", &[interval.to_string().as_str()]));
    }
    if let Some(timeout) = args.timeout {
        options.push(ConfigOption::new("Timeout", &[timeout.to_string().as_str()]));
    }

    options
}

fn load_config(args: &Args) -> Result<CollectorConfig, String> {
    let mut options = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
            parse_config_file(&content).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => Vec::new(),
    };
    options.extend(cli_options(args));

    CollectorConfig::from_options(&options).map_err(|e| e.to_string())
}

fn make_sink(args: &Args, interval: Duration) -> Box<dyn MetricSink> {
    let stdout = io::stdout();
    match args.format {
        OutputFormat::Putval => Box::new(PutvalSink::new(stdout, args.hostname.as_str(), interval)),
        OutputFormat::Json => Box::new(JsonSink::new(stdout, args.hostname.as_str())),
    }
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let interval = config.interval.unwrap_or(DEFAULT_INTERVAL);
    let transport = SocketTransport::new(config.timeout);
    let mut collector = Collector::new(transport, config);

    let config = collector.config();
    let endpoints: Vec<String> = config.endpoints.iter().map(|e| e.to_string()).collect();

    info!("hastatd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: interval={:?}, timeout={:?}, sockets=[{}], enhanced_metrics={}",
        interval,
        collector.transport().timeout(),
        endpoints.join(", "),
        config.enhanced_metrics
    );
    let mut monitors: Vec<&str> = config.proxy_monitors.iter().map(String::as_str).collect();
    monitors.sort_unstable();
    debug!("Monitoring: {}", monitors.join(", "));

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut cycle_count: u64 = 0;
    let mut failed = false;

    info!("Starting collection loop");

    while running.load(Ordering::SeqCst) {
        let mut sink = make_sink(&args, interval);

        match collector.collect(sink.as_mut()) {
            Ok(report) => {
                cycle_count += 1;
                failed = false;
                debug!(
                    "Cycle #{}: {}/{} sockets, {} entities, {} samples",
                    cycle_count,
                    report.endpoints_responded,
                    report.endpoints,
                    report.entities,
                    report.samples
                );
                if let Some(timing) = collector.last_timing() {
                    debug!("Cycle #{} took {:?}", cycle_count, timing.total);
                }
            }
            // Logged by the collector.
            Err(_) => failed = true,
        }

        if args.once {
            break;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutdown complete after {} cycles", cycle_count);

    if args.once && failed {
        std::process::exit(1);
    }
}

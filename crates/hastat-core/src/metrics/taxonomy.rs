//! Metric taxonomy: raw HAProxy field name → reporting name and type.
//!
//! Keys are lowercase. `show info` attribute names (`CumReq`, `Idle_pct`)
//! and `show stat` column names (`stot`, `hrsp_5xx`) share one namespace.
//! Anything not listed here is never reported.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Serialize;

/// Value semantics of a metric, as understood by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time value.
    Gauge,
    /// Monotonic counter that may wrap.
    Counter,
    /// Monotonic absolute value; the rate is computed downstream.
    Derive,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Derive => "derive",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a metric is always reported or only with enhanced metrics on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricTier {
    Default,
    Enhanced,
}

/// Reporting identity of one raw field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDef {
    pub name: &'static str,
    pub kind: MetricKind,
    pub tier: MetricTier,
}

use MetricKind::{Counter, Derive, Gauge};
use MetricTier::{Default as Std, Enhanced};

const fn def(name: &'static str, kind: MetricKind, tier: MetricTier) -> MetricDef {
    MetricDef { name, kind, tier }
}

#[rustfmt::skip]
const TABLE: &[(&str, MetricDef)] = &[
    // Reported unless excluded.
    ("connrate",        def("connection_rate", Gauge, Std)),
    ("cumreq",          def("requests", Derive, Std)),
    ("idle_pct",        def("idle_pct", Gauge, Std)),
    ("scur",            def("session_current", Gauge, Std)),
    ("sessrate",        def("session_rate_all", Gauge, Std)),
    ("lbtot",           def("server_selected_total", Counter, Std)),
    ("bout",            def("bytes_out", Derive, Std)),
    ("bin",             def("bytes_in", Derive, Std)),
    ("ttime",           def("session_time_avg", Gauge, Std)),
    ("req_rate",        def("request_rate", Gauge, Std)),
    ("rate",            def("session_rate", Gauge, Std)),
    ("hrsp_2xx",        def("response_2xx", Derive, Std)),
    ("hrsp_4xx",        def("response_4xx", Derive, Std)),
    ("hrsp_5xx",        def("response_5xx", Derive, Std)),
    ("ereq",            def("error_request", Derive, Std)),
    ("dreq",            def("denied_request", Derive, Std)),
    ("econ",            def("error_connection", Derive, Std)),
    ("dresp",           def("denied_response", Derive, Std)),
    ("qcur",            def("queue_current", Gauge, Std)),
    ("qtime",           def("queue_time_avg", Gauge, Std)),
    ("rtime",           def("response_time_avg", Gauge, Std)),
    ("eresp",           def("error_response", Derive, Std)),
    ("wretr",           def("retries", Derive, Std)),
    ("wredis",          def("redispatched", Derive, Std)),

    // `show info`, enhanced.
    ("maxconn",         def("max_connections", Gauge, Enhanced)),
    ("cumconns",        def("connections", Derive, Enhanced)),
    ("maxconnrate",     def("max_connection_rate", Gauge, Enhanced)),
    ("maxsessrate",     def("max_session_rate", Gauge, Enhanced)),
    ("maxsslconns",     def("max_ssl_connections", Gauge, Enhanced)),
    ("cumsslconns",     def("ssl_connections", Derive, Enhanced)),
    ("maxpipes",        def("max_pipes", Gauge, Enhanced)),
    ("tasks",           def("tasks", Gauge, Enhanced)),
    ("run_queue",       def("run_queue", Gauge, Enhanced)),
    ("pipesused",       def("pipes_used", Gauge, Enhanced)),
    ("pipesfree",       def("pipes_free", Gauge, Enhanced)),
    ("uptime_sec",      def("uptime_seconds", Derive, Enhanced)),
    ("currconns",       def("current_connections", Gauge, Enhanced)),
    ("currsslconns",    def("current_ssl_connections", Gauge, Enhanced)),
    ("sslrate",         def("ssl_rate", Gauge, Enhanced)),
    ("sslfrontendkeyrate", def("ssl_frontend_key_rate", Gauge, Enhanced)),
    ("sslbackendkeyrate",  def("ssl_backend_key_rate", Gauge, Enhanced)),
    ("sslcachelookups", def("ssl_cache_lookups", Derive, Enhanced)),
    ("sslcachemisses",  def("ssl_cache_misses", Derive, Enhanced)),
    ("compressbpsin",   def("compress_bps_in", Derive, Enhanced)),
    ("compressbpsout",  def("compress_bps_out", Derive, Enhanced)),
    ("zlibmemusage",    def("zlib_mem_usage", Gauge, Enhanced)),

    // `show stat`, enhanced.
    ("chkfail",         def("failed_checks", Derive, Enhanced)),
    ("downtime",        def("downtime", Derive, Enhanced)),
    ("hrsp_1xx",        def("response_1xx", Derive, Enhanced)),
    ("hrsp_3xx",        def("response_3xx", Derive, Enhanced)),
    ("hrsp_other",      def("response_other", Derive, Enhanced)),
    ("qmax",            def("queue_max", Gauge, Enhanced)),
    ("qlimit",          def("queue_limit", Gauge, Enhanced)),
    ("rate_lim",        def("session_rate_limit", Gauge, Enhanced)),
    ("rate_max",        def("session_rate_max", Gauge, Enhanced)),
    ("req_rate_max",    def("request_rate_max", Gauge, Enhanced)),
    ("stot",            def("session_total", Derive, Enhanced)),
    ("slim",            def("session_limit", Gauge, Enhanced)),
    ("smax",            def("session_max", Gauge, Enhanced)),
    ("throttle",        def("throttle", Gauge, Enhanced)),
    ("cli_abrt",        def("cli_abrt", Derive, Enhanced)),
    ("srv_abrt",        def("srv_abrt", Derive, Enhanced)),
    ("comp_in",         def("comp_in", Derive, Enhanced)),
    ("comp_out",        def("comp_out", Derive, Enhanced)),
    ("comp_byp",        def("comp_byp", Derive, Enhanced)),
    ("comp_rsp",        def("comp_rsp", Derive, Enhanced)),
    ("ctime",           def("connect_time_avg", Gauge, Enhanced)),
    ("act",             def("active_servers", Gauge, Enhanced)),
    ("bck",             def("backup_servers", Gauge, Enhanced)),
    ("check_duration",  def("health_check_duration", Gauge, Enhanced)),
    ("lastsess",        def("last_session", Gauge, Enhanced)),
    ("conn_rate",       def("conn_rate", Gauge, Enhanced)),
    ("conn_rate_max",   def("conn_rate_max", Gauge, Enhanced)),
    ("conn_tot",        def("conn_total", Counter, Enhanced)),
    ("intercepted",     def("intercepted", Gauge, Enhanced)),
    ("dcon",            def("denied_tcp_conn", Gauge, Enhanced)),
    ("dses",            def("denied_tcp_sess", Gauge, Enhanced)),

    // `show resolvers`, enhanced.
    ("sent",            def("resolver_sent", Derive, Enhanced)),
    ("snd_error",       def("resolver_snd_error", Derive, Enhanced)),
    ("valid",           def("resolver_valid", Derive, Enhanced)),
    ("update",          def("resolver_update", Derive, Enhanced)),
    ("cname",           def("resolver_cname", Derive, Enhanced)),
    ("cname_error",     def("resolver_cname_error", Derive, Enhanced)),
    ("any_err",         def("resolver_any_err", Derive, Enhanced)),
    ("nx",              def("resolver_nx", Derive, Enhanced)),
    ("timeout",         def("resolver_timeout", Derive, Enhanced)),
    ("refused",         def("resolver_refused", Derive, Enhanced)),
    ("other",           def("resolver_other", Derive, Enhanced)),
    ("invalid",         def("resolver_invalid", Derive, Enhanced)),
    ("too_big",         def("resolver_too_big", Derive, Enhanced)),
    ("truncated",       def("resolver_truncated", Derive, Enhanced)),
    ("outdated",        def("resolver_outdated", Derive, Enhanced)),
];

static TAXONOMY: LazyLock<HashMap<&'static str, MetricDef>> =
    LazyLock::new(|| TABLE.iter().copied().collect());

/// Looks up a raw field name, case-insensitively.
pub fn lookup(field: &str) -> Option<MetricDef> {
    TAXONOMY.get(field.to_ascii_lowercase().as_str()).copied()
}

/// Number of known fields.
pub fn len() -> usize {
    TAXONOMY.len()
}

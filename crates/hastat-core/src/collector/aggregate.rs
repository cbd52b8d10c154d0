//! Entity classification and multi-socket aggregation.
//!
//! With `nbproc > 1` every HAProxy process answers on its own socket and
//! reports its own copy of each frontend, backend and server. Rows for the
//! same entity are merged here with a fixed per-field policy: identity
//! fields pass through, counters are summed, timings are averaged. Fields
//! without a policy are dropped.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::trace;

use super::parser::{ResolverReport, StatRow};

/// Entity type reported in the `type` column of `show stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRole {
    Frontend,
    Backend,
    Server,
    Listener,
}

impl EntityRole {
    /// Maps the numeric `type` column: 0=frontend, 1=backend, 2=server,
    /// 3=socket/listener.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EntityRole::Frontend),
            1 => Some(EntityRole::Backend),
            2 => Some(EntityRole::Server),
            3 => Some(EntityRole::Listener),
            _ => None,
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            EntityRole::Frontend => "frontend",
            EntityRole::Backend => "backend",
            EntityRole::Server => "server",
            EntityRole::Listener => "listener",
        }
    }

    /// Role of a stat row, if its type code is known.
    pub fn of(row: &StatRow) -> Option<Self> {
        row.type_code().and_then(Self::from_code)
    }
}

/// Returns true when `row` should be emitted for the given monitor set.
///
/// `monitors` must hold lowercase names. A row matches on its proxy or
/// service name; servers are also included whenever `backend` is monitored.
pub fn is_selected(row: &StatRow, monitors: &HashSet<String>) -> bool {
    if monitors.contains(&row.pxname().to_lowercase())
        || monitors.contains(&row.svname().to_lowercase())
    {
        return true;
    }
    EntityRole::of(row) == Some(EntityRole::Server) && monitors.contains("backend")
}

/// Identity of one observable entity across all polled processes.
///
/// The `Display` form is the instance label attached to emitted metrics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// A server inside a backend.
    Server { proxy: String, server: String },
    /// A frontend, backend or listener row.
    Proxy { service: String, proxy: String },
    /// A nameserver from `show resolvers`.
    Nameserver { name: String },
}

impl EntityKey {
    /// Derives the key for a stat row.
    pub fn for_row(row: &StatRow) -> Self {
        match EntityRole::of(row) {
            Some(EntityRole::Server) => EntityKey::Server {
                proxy: row.pxname().to_lowercase(),
                server: row.svname().to_string(),
            },
            _ => EntityKey::Proxy {
                service: row.svname().to_lowercase(),
                proxy: row.pxname().to_string(),
            },
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Server { proxy, server } => write!(f, "backend.{}.{}", proxy, server),
            EntityKey::Proxy { service, proxy } => write!(f, "{}.{}", service, proxy),
            EntityKey::Nameserver { name } => write!(f, "nameserver.{}", name),
        }
    }
}

/// How values of one field are combined across rows of the same entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Identity field; last writer wins.
    Pull,
    /// Integer sum.
    Sum,
    /// Running mean.
    Mean,
}

/// Static per-field aggregation policy. `None` means the field is dropped.
///
/// The policy depends on the field alone, never on the entity kind.
pub fn field_policy(field: &str) -> Option<FieldPolicy> {
    let policy = match field.to_ascii_lowercase().as_str() {
        "pxname" | "svname" | "type" => FieldPolicy::Pull,

        // Per-process counters and gauges that add up.
        "qcur" | "qmax" | "scur" | "smax" | "slim" | "stot" | "bin" | "bout" | "dreq"
        | "dresp" | "ereq" | "econ" | "eresp" | "wretr" | "wredis" | "chkfail" | "chkdown"
        | "qlimit" | "lbtot" | "rate" | "rate_lim" | "rate_max" | "hrsp_1xx" | "hrsp_2xx"
        | "hrsp_3xx" | "hrsp_4xx" | "hrsp_5xx" | "hrsp_other" | "hanafail" | "req_rate"
        | "req_rate_max" | "req_tot" | "cli_abrt" | "srv_abrt" | "comp_in" | "comp_out"
        | "comp_byp" | "comp_rsp" | "conn_rate" | "conn_rate_max" | "conn_tot"
        | "intercepted" | "dcon" | "dses" => FieldPolicy::Sum,

        // Resolver counters.
        "sent" | "snd_error" | "valid" | "update" | "cname" | "cname_error" | "any_err"
        | "nx" | "timeout" | "refused" | "other" | "invalid" | "too_big" | "truncated"
        | "outdated" => FieldPolicy::Sum,

        // Timings and state every process reports identically or as averages.
        "qtime" | "ctime" | "rtime" | "ttime" | "act" | "bck" | "check_duration"
        | "lastsess" | "lastchg" | "throttle" | "downtime" | "weight" => FieldPolicy::Mean,

        _ => return None,
    };
    Some(policy)
}

/// Combined value of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatedValue {
    Text(String),
    Sum(i64),
    /// Running mean over `count` samples. The count is bookkeeping only.
    Mean { avg: f64, count: u32 },
}

impl AggregatedValue {
    /// Integer value for emission. Means are rounded to the nearest integer.
    pub fn as_metric_value(&self) -> Option<i64> {
        match self {
            AggregatedValue::Text(_) => None,
            AggregatedValue::Sum(v) => Some(*v),
            AggregatedValue::Mean { avg, .. } => Some(avg.round() as i64),
        }
    }
}

/// All surviving fields of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedEntity {
    pub key: EntityKey,
    pub fields: BTreeMap<String, AggregatedValue>,
}

impl AggregatedEntity {
    fn new(key: EntityKey) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
        }
    }

    /// Returns the aggregated value of `field`.
    pub fn get(&self, field: &str) -> Option<&AggregatedValue> {
        self.fields.get(field)
    }

    /// Returns the integer value of `field`.
    pub fn value(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(AggregatedValue::as_metric_value)
    }

    /// Folds one raw value into the aggregate.
    ///
    /// Non-numeric values of `Sum`/`Mean` fields are skipped; a field that
    /// never saw a numeric value does not appear at all.
    fn absorb(&mut self, field: &str, raw: &str) {
        let Some(policy) = field_policy(field) else {
            return;
        };
        let field = field.to_ascii_lowercase();

        if policy == FieldPolicy::Pull {
            self.fields.insert(field, AggregatedValue::Text(raw.to_string()));
            return;
        }

        let Ok(value) = raw.trim().parse::<i64>() else {
            return;
        };

        match (policy, self.fields.get_mut(&field)) {
            (FieldPolicy::Sum, Some(AggregatedValue::Sum(total))) => {
                *total = total.saturating_add(value);
            }
            (FieldPolicy::Mean, Some(AggregatedValue::Mean { avg, count })) => {
                *count += 1;
                let n = f64::from(*count);
                *avg = (*avg * (n - 1.0) + value as f64) / n;
            }
            (FieldPolicy::Sum, _) => {
                self.fields.insert(field, AggregatedValue::Sum(value));
            }
            (FieldPolicy::Mean, _) => {
                self.fields.insert(
                    field,
                    AggregatedValue::Mean {
                        avg: value as f64,
                        count: 1,
                    },
                );
            }
            (FieldPolicy::Pull, _) => {}
        }
    }
}

/// Groups rows and resolver entries by entity and merges their fields.
///
/// Output is ordered by entity key and field name, independent of the
/// order rows were added in.
#[derive(Debug, Default)]
pub struct Aggregator {
    entities: BTreeMap<EntityKey, AggregatedEntity>,
}

impl Aggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one stat row into its entity.
    pub fn add_row(&mut self, row: &StatRow) {
        let key = EntityKey::for_row(row);
        trace!(
            "{} {} (pid {:?}, iid {:?}, sid {:?})",
            EntityRole::of(row).map_or("unknown", |role| role.label()),
            key,
            row.pid(),
            row.iid(),
            row.sid()
        );
        let entity = self
            .entities
            .entry(key.clone())
            .or_insert_with(|| AggregatedEntity::new(key));
        for (field, value) in &row.fields {
            entity.absorb(field, value);
        }
    }

    /// Merges every nameserver of one resolver report.
    pub fn add_resolvers(&mut self, report: &ResolverReport) {
        for (name, counters) in report {
            let key = EntityKey::Nameserver { name: name.clone() };
            let entity = self
                .entities
                .entry(key.clone())
                .or_insert_with(|| AggregatedEntity::new(key));
            for (counter, value) in counters {
                entity.absorb(counter, value);
            }
        }
    }

    /// Number of distinct entities seen so far.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing was added.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the aggregated entity for `key`.
    pub fn get(&self, key: &EntityKey) -> Option<&AggregatedEntity> {
        self.entities.get(key)
    }

    /// Consumes the aggregator, yielding entities in key order.
    pub fn into_entities(self) -> Vec<AggregatedEntity> {
        self.entities.into_values().collect()
    }
}

//! Collector configuration.
//!
//! The configuration is a finished value by the time the collector sees it.
//! It can be built directly, or from collectd-style module options:
//!
//! ```text
//! Socket "/var/run/haproxy.sock"
//! ProxyMonitor "backend"
//! EnhancedMetrics true
//! ExcludeMetric "bytes_in"
//! Dimension "cluster" "edge"
//! Interval 10
//! ```

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::collector::endpoint::Endpoint;
use crate::collector::traits::SocketTransport;
use crate::metrics::sink::Dimensions;

/// Socket polled when none is configured.
pub const DEFAULT_SOCKET: &str = "/var/run/haproxy.sock";

/// Entities monitored when no `ProxyMonitor` is configured.
pub const DEFAULT_PROXY_MONITORS: [&str; 3] = ["server", "frontend", "backend"];

/// Error type for configuration failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// An option value could not be interpreted.
    InvalidValue { key: String, value: String },
    /// A config file line could not be tokenized.
    Syntax { line: usize, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value '{}' for {}", value, key)
            }
            ConfigError::Syntax { line, message } => {
                write!(f, "config line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything the collection cycle needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    /// Control sockets, polled in order.
    pub endpoints: Vec<Endpoint>,
    /// Lowercase proxy or service names to report on.
    pub proxy_monitors: HashSet<String>,
    /// Reporting names never emitted.
    pub excluded_metrics: HashSet<String>,
    /// Static dimensions added to every sample.
    pub custom_dimensions: Dimensions,
    /// Also report the enhanced metric tier and resolver counters.
    pub enhanced_metrics: bool,
    /// Polling interval requested by the configuration, if any.
    pub interval: Option<Duration>,
    /// Connect/read/write timeout per endpoint.
    pub timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![Endpoint::parse(DEFAULT_SOCKET)],
            proxy_monitors: DEFAULT_PROXY_MONITORS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            excluded_metrics: HashSet::new(),
            custom_dimensions: Dimensions::new(),
            enhanced_metrics: false,
            interval: None,
            timeout: SocketTransport::DEFAULT_TIMEOUT,
        }
    }
}

/// One `Key value...` configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOption {
    pub key: String,
    pub values: Vec<String>,
}

impl ConfigOption {
    pub fn new(key: impl Into<String>, values: &[&str]) -> Self {
        Self {
            key: key.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl CollectorConfig {
    /// Builds a configuration from module options.
    ///
    /// Unknown keys and malformed `Dimension` entries are logged and
    /// skipped. Options whose first value is empty are ignored.
    pub fn from_options(options: &[ConfigOption]) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut endpoints = Vec::new();
        let mut monitors = HashSet::new();

        for option in options {
            let key = option.key.as_str();
            let Some(first) = option.values.first().filter(|v| !v.is_empty()) else {
                if key.eq_ignore_ascii_case("Dimension") {
                    warn!("Check configuration setting for {}", key);
                }
                continue;
            };

            match key.to_ascii_lowercase().as_str() {
                "socket" => endpoints.push(Endpoint::parse(first)),
                "proxymonitor" => {
                    monitors.extend(
                        option
                            .values
                            .iter()
                            .filter(|v| !v.is_empty())
                            .map(|v| v.to_lowercase()),
                    );
                }
                "enhancedmetrics" => config.enhanced_metrics = str_to_bool(first),
                "excludemetric" => {
                    config.excluded_metrics.insert(first.clone());
                }
                "dimension" => {
                    if let [name, value] = option.values.as_slice() {
                        config.custom_dimensions.insert(name.clone(), value.clone());
                    } else {
                        warn!("Check configuration setting for {}", key);
                    }
                }
                "interval" => config.interval = Some(parse_seconds(key, first)?),
                "timeout" => config.timeout = parse_seconds(key, first)?,
                "testing" => {}
                _ => warn!("Unknown config key: {}", key),
            }
        }

        if !endpoints.is_empty() {
            config.endpoints = endpoints;
        }
        if !monitors.is_empty() {
            config.proxy_monitors = monitors;
        }

        Ok(config)
    }
}

/// Converts a `true`/`false` string. Anything else logs a warning and
/// yields `false`.
pub fn str_to_bool(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    if value == "true" {
        return true;
    }
    if value != "false" {
        warn!(
            "String ({}) could not be converted to a boolean. Returning false.",
            value
        );
    }
    false
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    let secs: f64 = value.trim().parse().map_err(|_| invalid())?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Reads collectd-style option lines.
///
/// Each non-empty line is a key followed by whitespace-separated values;
/// values may be double-quoted (with `\"` and `\\` escapes). `#` starts a
/// comment outside quotes. `<Module ...>` block markers are skipped.
pub fn parse_config_file(content: &str) -> Result<Vec<ConfigOption>, ConfigError> {
    let mut options = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('<') {
            continue;
        }

        let tokens = tokenize_line(trimmed).map_err(|message| ConfigError::Syntax {
            line: idx + 1,
            message,
        })?;
        let mut tokens = tokens.into_iter();
        let Some(key) = tokens.next() else {
            continue;
        };
        options.push(ConfigOption {
            key,
            values: tokens.collect(),
        });
    }

    Ok(options)
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '#' {
            break;
        }

        let mut token = String::new();
        if c == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => token.push(escaped),
                        None => break,
                    },
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => token.push(c),
                }
            }
            if !closed {
                return Err("unterminated quoted string".to_string());
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '#' {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let options = [ConfigOption::new("Testing", &["True"])];
        let config = CollectorConfig::from_options(&options).unwrap();
        assert_eq!(
            config.endpoints,
            vec![Endpoint::Unix(PathBuf::from("/var/run/haproxy.sock"))]
        );
        assert_eq!(config.proxy_monitors.len(), 3);
        for monitor in ["server", "frontend", "backend"] {
            assert!(config.proxy_monitors.contains(monitor));
        }
        assert!(!config.enhanced_metrics);
        assert!(config.excluded_metrics.is_empty());
        assert_eq!(config.interval, None);
    }

    #[test]
    fn test_from_options() {
        let options = [
            ConfigOption::new("Socket", &["/run/haproxy/1.sock"]),
            ConfigOption::new("Socket", &["tcp://127.0.0.1:9999"]),
            ConfigOption::new("ProxyMonitor", &["Backend"]),
            ConfigOption::new("ProxyMonitor", &["web", "api"]),
            ConfigOption::new("EnhancedMetrics", &["True"]),
            ConfigOption::new("ExcludeMetric", &["bytes_in"]),
            ConfigOption::new("Dimension", &["cluster", "edge"]),
            ConfigOption::new("Interval", &["10"]),
            ConfigOption::new("Timeout", &["2.5"]),
        ];
        let config = CollectorConfig::from_options(&options).unwrap();

        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[1].to_string(), "tcp://127.0.0.1:9999");
        assert_eq!(
            config.proxy_monitors,
            ["backend", "web", "api"]
                .iter()
                .map(|s| s.to_string())
                .collect::<HashSet<String>>()
        );
        assert!(config.enhanced_metrics);
        assert!(config.excluded_metrics.contains("bytes_in"));
        assert_eq!(config.custom_dimensions.get("cluster").map(String::as_str), Some("edge"));
        assert_eq!(config.interval, Some(Duration::from_secs(10)));
        assert_eq!(config.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let options = [
            ConfigOption::new("Dimension", &["only-one"]),
            ConfigOption::new("Bogus", &["x"]),
            ConfigOption::new("EnhancedMetrics", &["yes"]),
            ConfigOption::new("Socket", &[""]),
        ];
        let config = CollectorConfig::from_options(&options).unwrap();
        assert!(config.custom_dimensions.is_empty());
        assert!(!config.enhanced_metrics);
        assert_eq!(config.endpoints, CollectorConfig::default().endpoints);
    }

    #[test]
    fn test_invalid_interval() {
        let options = [ConfigOption::new("Interval", &["soon"])];
        let err = CollectorConfig::from_options(&options).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "Interval".to_string(),
                value: "soon".to_string(),
            }
        );
        assert!(CollectorConfig::from_options(&[ConfigOption::new("Timeout", &["0"])]).is_err());
    }

    #[test]
    fn test_str_to_bool() {
        assert!(str_to_bool("True"));
        assert!(str_to_bool(" true "));
        assert!(!str_to_bool("false"));
        assert!(!str_to_bool("1"));
    }

    #[test]
    fn test_parse_config_file() {
        let content = r#"
<Module haproxy>
  # control sockets
  Socket "/var/run/haproxy.sock"
  ProxyMonitor backend  # servers follow
  Dimension "cluster" "edge \"1\""
  EnhancedMetrics true
</Module>
"#;
        let options = parse_config_file(content).unwrap();
        assert_eq!(
            options,
            vec![
                ConfigOption::new("Socket", &["/var/run/haproxy.sock"]),
                ConfigOption::new("ProxyMonitor", &["backend"]),
                ConfigOption::new("Dimension", &["cluster", "edge \"1\""]),
                ConfigOption::new("EnhancedMetrics", &["true"]),
            ]
        );
    }

    #[test]
    fn test_parse_config_file_unterminated_quote() {
        let err = parse_config_file("Socket \"/var/run\n").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 1, .. }));
    }
}

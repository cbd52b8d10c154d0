//! Control socket addresses.
//!
//! HAProxy exposes its admin socket either as a UNIX-domain stream socket
//! (`stats socket /var/run/haproxy.sock`) or on a TCP port
//! (`stats socket ipv4@127.0.0.1:9999`). Both are accepted here.

use std::fmt;
use std::path::PathBuf;

/// One configured control socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// UNIX-domain stream socket at the given path.
    Unix(PathBuf),
    /// TCP socket.
    Tcp { host: String, port: u16 },
    /// Address that could not be recognised. Kept so it can be reported
    /// on every cycle instead of silently disappearing from the config.
    Unsupported(String),
}

impl Endpoint {
    /// Parses a socket address.
    ///
    /// Accepted forms:
    /// - `unix:///path/to/sock`, `file:///path/to/sock`, `/path/to/sock`
    /// - `tcp://host:port`, `host:port`, `[::1]:port`
    pub fn parse(addr: &str) -> Self {
        let addr = addr.trim();

        if let Some(path) = addr
            .strip_prefix("unix://")
            .or_else(|| addr.strip_prefix("file://"))
        {
            if path.is_empty() {
                return Endpoint::Unsupported(addr.to_string());
            }
            return Endpoint::Unix(PathBuf::from(path));
        }

        if addr.starts_with('/') {
            return Endpoint::Unix(PathBuf::from(addr));
        }

        let host_port = addr.strip_prefix("tcp://").unwrap_or(addr);
        match parse_host_port(host_port) {
            Some((host, port)) => Endpoint::Tcp { host, port },
            None => Endpoint::Unsupported(addr.to_string()),
        }
    }

    /// Returns true for addresses that can actually be dialled.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Endpoint::Unsupported(_))
    }
}

/// Splits `host:port` on the last colon. IPv6 hosts may be bracketed.
fn parse_host_port(s: &str) -> Option<(String, u16)> {
    let (host, port) = s.rsplit_once(':')?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() || host.contains('/') {
        return None;
    }
    let port: u16 = port.parse().ok()?;
    Some((host.to_string(), port))
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp://[{}]:{}", host, port)
            }
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Endpoint::Unsupported(raw) => write!(f, "{}", raw),
        }
    }
}

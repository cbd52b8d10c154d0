//! Fan-out of one command over every configured control socket.

use tracing::{debug, error, warn};

use super::endpoint::Endpoint;
use super::traits::Transport;

/// Responses to one command, in endpoint order.
///
/// `None` marks an endpoint that could not be reached (or could not be
/// dialled at all). Downstream parsers treat it as an empty body.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub bodies: Vec<Option<String>>,
}

impl FetchOutcome {
    /// True when no endpoint answered. An empty endpoint list counts as failed.
    pub fn all_failed(&self) -> bool {
        self.bodies.iter().all(Option::is_none)
    }

    /// Number of endpoints that answered.
    pub fn responded(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_some()).count()
    }

    /// Bodies of the endpoints that answered, in endpoint order.
    pub fn successful(&self) -> impl Iterator<Item = &str> {
        self.bodies.iter().filter_map(|b| b.as_deref())
    }
}

/// Sends `command` to each endpoint in turn.
///
/// A failing endpoint is logged and contributes `None`; it never aborts the
/// remaining endpoints.
pub fn fetch_all<T: Transport + ?Sized>(
    transport: &T,
    endpoints: &[Endpoint],
    command: &str,
) -> FetchOutcome {
    let mut bodies = Vec::with_capacity(endpoints.len());

    for endpoint in endpoints {
        if !endpoint.is_supported() {
            error!(
                "Could not connect to socket {}: unsupported address, check HAProxy config",
                endpoint
            );
            bodies.push(None);
            continue;
        }

        match transport.send(endpoint, command) {
            Ok(body) => {
                debug!(
                    "{}: '{}' returned {} bytes",
                    endpoint,
                    command.trim_end(),
                    body.len()
                );
                bodies.push(Some(body));
            }
            Err(e) => {
                warn!("Unable to connect to HAProxy socket at {}: {}", endpoint, e);
                bodies.push(None);
            }
        }
    }

    FetchOutcome { bodies }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockTransport;

    #[test]
    fn test_fetch_all_keeps_endpoint_order() {
        let a = Endpoint::parse("/a.sock");
        let b = Endpoint::parse("/b.sock");
        let mut transport = MockTransport::new();
        transport.add_response(&a, "show info", "Pid: 1\n");
        transport.add_response(&b, "show info", "Pid: 2\n");

        let outcome = fetch_all(&transport, &[b.clone(), a.clone()], "show info");
        assert_eq!(
            outcome.bodies,
            vec![Some("Pid: 2\n".to_string()), Some("Pid: 1\n".to_string())]
        );
        assert_eq!(outcome.responded(), 2);
        assert!(!outcome.all_failed());
    }

    #[test]
    fn test_fetch_all_isolates_failures() {
        let a = Endpoint::parse("/a.sock");
        let b = Endpoint::parse("/b.sock");
        let bogus = Endpoint::parse("not-a-socket");
        let mut transport = MockTransport::new();
        transport.add_response(&a, "show stat", "# pxname,svname\n");
        transport.refuse(&b);

        let outcome = fetch_all(&transport, &[a, b, bogus], "show stat");
        assert_eq!(outcome.bodies.len(), 3);
        assert!(outcome.bodies[0].is_some());
        assert!(outcome.bodies[1].is_none());
        assert!(outcome.bodies[2].is_none());
        assert_eq!(outcome.successful().count(), 1);
    }

    #[test]
    fn test_fetch_all_every_endpoint_down() {
        let a = Endpoint::parse("/a.sock");
        let mut transport = MockTransport::new();
        transport.refuse(&a);

        assert!(fetch_all(&transport, &[a], "show info").all_failed());
        assert!(fetch_all(&transport, &[], "show info").all_failed());
    }

    #[test]
    fn test_unsupported_endpoint_never_reaches_transport() {
        let transport = MockTransport::new();
        let outcome = fetch_all(&transport, &[Endpoint::parse("nowhere")], "show info");
        assert!(outcome.all_failed());
        assert!(transport.sent_commands().is_empty());
    }
}

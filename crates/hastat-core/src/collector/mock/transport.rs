//! Mock transport replaying canned control socket responses.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;

use crate::collector::endpoint::Endpoint;
use crate::collector::traits::Transport;

use super::scenarios::UNKNOWN_COMMAND;

/// In-memory control socket.
///
/// Responses are keyed by endpoint and command (without the trailing
/// newline). An endpoint with no responses at all, or one marked with
/// [`MockTransport::refuse`], fails with `ConnectionRefused`. A known endpoint
/// asked for a command it has no response for answers like HAProxy does:
/// with an "Unknown command" message.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: HashMap<(Endpoint, String), String>,
    refused: HashSet<Endpoint>,
    sent: RefCell<Vec<(Endpoint, String)>>,
}

impl MockTransport {
    /// Creates a transport with no reachable endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the response `endpoint` returns for `command`.
    pub fn add_response(
        &mut self,
        endpoint: &Endpoint,
        command: &str,
        response: impl Into<String>,
    ) {
        self.refused.remove(endpoint);
        self.responses.insert(
            (endpoint.clone(), command.trim_end().to_string()),
            response.into(),
        );
    }

    /// Makes every connection attempt to `endpoint` fail.
    pub fn refuse(&mut self, endpoint: &Endpoint) {
        self.refused.insert(endpoint.clone());
    }

    /// Commands received so far, in order.
    pub fn sent_commands(&self) -> Vec<(Endpoint, String)> {
        self.sent.borrow().clone()
    }

    fn knows(&self, endpoint: &Endpoint) -> bool {
        self.responses.keys().any(|(e, _)| e == endpoint)
    }
}

impl Transport for MockTransport {
    fn send(&self, endpoint: &Endpoint, command: &str) -> io::Result<String> {
        if self.refused.contains(endpoint) || !self.knows(endpoint) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("connection refused: {}", endpoint),
            ));
        }

        let command = command.trim_end().to_string();
        self.sent
            .borrow_mut()
            .push((endpoint.clone(), command.clone()));

        Ok(self
            .responses
            .get(&(endpoint.clone(), command))
            .cloned()
            .unwrap_or_else(|| UNKNOWN_COMMAND.to_string()))
    }
}

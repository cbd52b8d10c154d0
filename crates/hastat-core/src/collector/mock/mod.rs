//! In-memory control socket for tests and offline runs.

mod scenarios;
mod transport;

pub use scenarios::{SHOW_INFO, SHOW_RESOLVERS, SHOW_STAT, UNKNOWN_COMMAND, info_for_process};
pub use transport::MockTransport;

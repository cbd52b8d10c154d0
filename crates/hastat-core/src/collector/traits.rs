//! Abstraction over control socket access to enable testing and mocking.
//!
//! The `Transport` trait allows the collector to talk to a real HAProxy
//! process or to an in-memory mock that replays canned responses.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::debug;

use super::endpoint::Endpoint;

/// Size of a single read from the socket.
const RECV_SIZE: usize = 4096;

/// Pause between connect attempts while a UNIX listener's backlog is full.
#[cfg(unix)]
const CONNECT_RETRY: Duration = Duration::from_millis(10);

/// Abstraction for a request/response exchange with a control socket.
pub trait Transport {
    /// Sends one command and returns the complete response body.
    ///
    /// The command is newline-terminated if the caller omitted it. The
    /// connection is opened for this call only and closed before returning.
    fn send(&self, endpoint: &Endpoint, command: &str) -> io::Result<String>;
}

/// Real socket transport (UNIX-domain and TCP).
///
/// Every connect, read and write is bounded by `timeout`, so a hung HAProxy
/// process cannot stall the collection cycle forever.
#[derive(Debug, Clone, Copy)]
pub struct SocketTransport {
    timeout: Duration,
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl SocketTransport {
    /// Default connect/read/write timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a new transport with the given I/O timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the configured I/O timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(unix)]
    fn send_unix(&self, path: &std::path::Path, command: &str) -> io::Result<String> {
        let mut stream = connect_unix(path, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        exchange(&mut stream, command)
    }

    #[cfg(not(unix))]
    fn send_unix(&self, path: &std::path::Path, _command: &str) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("UNIX sockets are not available here: {}", path.display()),
        ))
    }

    fn send_tcp(&self, host: &str, port: u16, command: &str) -> io::Result<String> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(mut stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    return exchange(&mut stream, command);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}:{} did not resolve to any address", host, port),
            )
        }))
    }
}

impl Transport for SocketTransport {
    fn send(&self, endpoint: &Endpoint, command: &str) -> io::Result<String> {
        let command = terminate_command(command);
        match endpoint {
            Endpoint::Unix(path) => self.send_unix(path, &command),
            Endpoint::Tcp { host, port } => self.send_tcp(host, *port, &command),
            Endpoint::Unsupported(raw) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported socket address: {}", raw),
            )),
        }
    }
}

/// Connects to a UNIX stream socket within `timeout`.
///
/// A listener whose accept backlog is full makes a non-blocking connect fail
/// with `WouldBlock` instead of waiting, so the attempt is repeated until
/// the deadline passes.
#[cfg(unix)]
fn connect_unix(
    path: &std::path::Path,
    timeout: Duration,
) -> io::Result<std::os::unix::net::UnixStream> {
    let addr = SockAddr::unix(path)?;
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {} timed out after {:?}", path.display(), timeout),
            ));
        }

        let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
        match socket.connect_timeout(&addr, remaining) {
            Ok(()) => return Ok(socket.into()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(CONNECT_RETRY.min(remaining));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Appends the trailing newline HAProxy needs to execute a command.
pub(crate) fn terminate_command(command: &str) -> String {
    if command.ends_with('\n') {
        command.to_string()
    } else {
        format!("{}\n", command)
    }
}

/// Writes the command and reads until the peer closes the connection.
///
/// A read timeout after some data has arrived is treated as the end of the
/// response: HAProxy in interactive mode keeps the socket open.
fn exchange<S: Read + Write>(stream: &mut S, command: &str) -> io::Result<String> {
    stream.write_all(command.as_bytes())?;
    stream.flush()?;

    let mut response = Vec::new();
    let mut chunk = [0u8; RECV_SIZE];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_timeout(&e) && !response.is_empty() => {
                debug!(
                    "peer stopped sending after {} bytes, treating as complete",
                    response.len()
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(String::from_utf8_lossy(&response).into_owned())
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_terminate_command() {
        assert_eq!(terminate_command("show info"), "show info\n");
        assert_eq!(terminate_command("show info\n"), "show info\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_socket_round_trip() {
        use std::os::unix::net::UnixListener;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haproxy.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut stream = reader.into_inner();
            stream.write_all(b"Name: HAProxy\nPid: 42\n").unwrap();
            line
        });

        let transport = SocketTransport::default();
        let body = transport
            .send(&Endpoint::Unix(path.clone()), "show info")
            .unwrap();

        assert_eq!(server.join().unwrap(), "show info\n");
        assert_eq!(body, "Name: HAProxy\nPid: 42\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_socket_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let transport = SocketTransport::default();
        let result = transport.send(&Endpoint::Unix(dir.path().join("nope.sock")), "show info");
        assert!(result.is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unix_connect_to_full_backlog_times_out() {
        use std::sync::mpsc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stuck.sock");
        let addr = SockAddr::unix(&path).unwrap();

        // A listener that never accepts, with the smallest backlog.
        let listener = Socket::new(Domain::UNIX, Type::STREAM, None).unwrap();
        listener.bind(&addr).unwrap();
        listener.listen(1).unwrap();

        let mut queued = Vec::new();
        loop {
            let client = Socket::new(Domain::UNIX, Type::STREAM, None).unwrap();
            client.set_nonblocking(true).unwrap();
            match client.connect(&addr) {
                Ok(()) => queued.push(client),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("unexpected connect error: {}", e),
            }
            assert!(queued.len() < 64, "backlog never filled");
        }

        let (tx, rx) = mpsc::channel();
        let endpoint = Endpoint::Unix(path.clone());
        thread::spawn(move || {
            let started = Instant::now();
            let transport = SocketTransport::new(Duration::from_millis(200));
            let result = transport.send(&endpoint, "show info");
            let _ = tx.send((result, started.elapsed()));
        });

        let (result, elapsed) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("send blocked on a full backlog");
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::TimedOut);
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
        drop(listener);
    }

    #[test]
    fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut stream = reader.into_inner();
            // Respond in several writes to exercise the read loop.
            stream.write_all(b"# pxname,svname,\n").unwrap();
            stream.write_all(b"web,FRONTEND,\n").unwrap();
            line
        });

        let transport = SocketTransport::new(Duration::from_secs(2));
        let endpoint = Endpoint::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        let body = transport.send(&endpoint, "show stat\n").unwrap();

        assert_eq!(server.join().unwrap(), "show stat\n");
        assert_eq!(body, "# pxname,svname,\nweb,FRONTEND,\n");
    }

    #[test]
    fn test_peer_that_stops_sending_is_complete_after_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Uptime_sec: 10\n").unwrap();
            // Keep the connection open until the client is finished.
            let _ = done_rx.recv();
        });

        let transport = SocketTransport::new(Duration::from_millis(200));
        let endpoint = Endpoint::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        let body = transport.send(&endpoint, "show info").unwrap();
        done_tx.send(()).unwrap();
        server.join().unwrap();

        assert_eq!(body, "Uptime_sec: 10\n");
    }

    #[test]
    fn test_unsupported_endpoint_is_rejected() {
        let transport = SocketTransport::default();
        let err = transport
            .send(&Endpoint::Unsupported("bogus".to_string()), "show info")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}

//! Request/response transport over plain HTTP/1.1.
//!
//! Every sync opens a new connection, writes one request and reads until
//! the `Content-Length` body is complete (or the server closes, the buffer
//! fills or the read times out), then drops the stream. There is no
//! connection reuse.
//!
//! ```text
//! POST /api/data HTTP/1.1
//! Host: 192.168.0.10:5000
//! Content-Type: application/json
//! Content-Length: 30
//! Connection: close
//!
//! {"node_id":"mac-aabbccddeeff"}
//! ```

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use core::fmt::Write as _;

use log::{debug, warn};

use crate::error::{ProtocolError, SyncError, TransportError};
use crate::messages::{DeviceSyncState, Payload, ServerCommand};
use crate::serializer::BoundedBuf;
use crate::traits::{Connector, Endpoint, SyncReply, SyncTransport};

/// Request path for sync exchanges.
pub const SYNC_PATH: &str = "/api/data";

/// Capacity of the response buffer in bytes (headers plus body).
pub const RESPONSE_CAPACITY: usize = 1024;

/// Default connect/read/write timeout.
const DEFAULT_TIMEOUT_MS: u32 = 5000;

type RequestHead = BoundedBuf<256>;

// ============================================================================
// Connector
// ============================================================================

/// [`Connector`] backed by `std::net::TcpStream`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdConnector;

impl Connector for StdConnector {
    type Stream = TcpStream;

    fn connect(
        &mut self,
        host: &str,
        port: u16,
        timeout_ms: u32,
    ) -> Result<TcpStream, TransportError> {
        let timeout = Duration::from_millis(u64::from(timeout_ms.max(1)));
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|_| TransportError::Connect)?;

        let mut last_err = TransportError::Connect;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(timeout))
                        .and_then(|_| stream.set_write_timeout(Some(timeout)))
                        .map_err(|_| TransportError::Connect)?;
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => last_err = TransportError::Timeout,
                Err(_) => {}
            }
        }
        Err(last_err)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Blocking HTTP sync transport.
///
/// # Example
///
/// ```rust,no_run
/// use pin_mirror::transport::{HttpTransport, StdConnector};
/// use pin_mirror::traits::{Endpoint, SyncTransport};
/// use pin_mirror::messages::DeviceSyncState;
///
/// let mut http = HttpTransport::new(StdConnector).with_timeout_ms(2000);
/// let endpoint = Endpoint::new("192.168.0.10", 5000);
/// let reply = http.sync(&endpoint, &DeviceSyncState::handshake("mac-aabbccddeeff"));
/// ```
pub struct HttpTransport<C: Connector> {
    connector: C,
    timeout_ms: u32,
    payload: Payload,
    response: [u8; RESPONSE_CAPACITY],
}

impl<C: Connector> HttpTransport<C> {
    /// Create a transport with the default 5 s timeout.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            payload: Payload::new(),
            response: [0; RESPONSE_CAPACITY],
        }
    }

    /// Set the connect/read/write timeout.
    pub fn with_timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Timeout applied to every network operation.
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// The connector, for inspection in tests.
    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: Connector> SyncTransport for HttpTransport<C> {
    fn sync(
        &mut self,
        endpoint: &Endpoint,
        state: &DeviceSyncState<'_>,
    ) -> Result<SyncReply, SyncError> {
        state.encode(&mut self.payload)?;

        let mut head = RequestHead::new();
        write!(
            head,
            "POST {} HTTP/1.1\r\nHost: {}:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            SYNC_PATH,
            endpoint.host,
            endpoint.port,
            self.payload.len()
        )
        .map_err(|_| TransportError::Send)?;

        debug!(
            "POST {}:{}{} ({} bytes)",
            endpoint.host,
            endpoint.port,
            SYNC_PATH,
            self.payload.len()
        );

        let received = {
            // Dropped at the end of this block, closing the connection.
            let mut stream =
                self.connector
                    .connect(endpoint.host.as_str(), endpoint.port, self.timeout_ms)?;
            send_request(&mut stream, head.as_bytes(), self.payload.as_bytes())?;
            read_response(&mut stream, &mut self.response)?
        };

        let body = response_body(&self.response[..received])?;
        let command = ServerCommand::parse(body)?;
        Ok(SyncReply::Command(command))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn send_request<S: Write>(stream: &mut S, head: &[u8], body: &[u8]) -> Result<(), TransportError> {
    stream
        .write_all(head)
        .and_then(|_| stream.write_all(body))
        .and_then(|_| stream.flush())
        .map_err(|e| {
            warn!("request write failed: {}", e);
            io_error(e.kind(), TransportError::Send)
        })
}

/// Read until the declared body is in, EOF, a full buffer or a timeout.
/// Returns the byte count.
fn read_response<S: Read>(stream: &mut S, buf: &mut [u8]) -> Result<usize, TransportError> {
    let mut len = 0;
    while len < buf.len() {
        match stream.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => {
                len += n;
                if response_complete(&buf[..len]) {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if len > 0 => {
                // Server kept the socket open; judge what we have.
                debug!("read stopped after {} bytes: {}", len, e);
                break;
            }
            Err(e) => {
                warn!("response read failed: {}", e);
                return Err(io_error(e.kind(), TransportError::Receive));
            }
        }
    }

    if len == 0 {
        return Err(TransportError::NoResponse);
    }
    Ok(len)
}

fn io_error(kind: ErrorKind, fallback: TransportError) -> TransportError {
    match kind {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout,
        _ => fallback,
    }
}

/// Validate status line and length, return the body.
fn response_body(raw: &[u8]) -> Result<&[u8], ProtocolError> {
    let split = find(raw, b"\r\n\r\n").ok_or(ProtocolError::Truncated)?;
    let head = core::str::from_utf8(&raw[..split]).map_err(|_| ProtocolError::Malformed)?;
    let body = &raw[split + 4..];

    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or(ProtocolError::Malformed)?;
    if !(200..300).contains(&status) {
        return Err(ProtocolError::HttpStatus(status));
    }

    match content_length(lines) {
        Some(n) if body.len() < n => Err(ProtocolError::Truncated),
        Some(n) => Ok(&body[..n]),
        None => Ok(body),
    }
}

/// Whether `raw` holds the headers and every body byte they announce.
/// Without a `Content-Length` only EOF ends the response.
fn response_complete(raw: &[u8]) -> bool {
    let Some(split) = find(raw, b"\r\n\r\n") else {
        return false;
    };
    let Ok(head) = core::str::from_utf8(&raw[..split]) else {
        return false;
    };
    match content_length(head.split("\r\n").skip(1)) {
        Some(n) => raw.len() >= split + 4 + n,
        None => false,
    }
}

fn content_length<'a>(mut header_lines: impl Iterator<Item = &'a str>) -> Option<usize> {
    header_lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse::<usize>().ok()
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockConnector, MockStream};

    fn endpoint() -> Endpoint {
        Endpoint::new("192.168.0.10", 5000)
    }

    fn ok_response(body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    // =========================================================================
    // Request format
    // =========================================================================

    #[test]
    fn request_has_required_headers() {
        let connector = MockConnector::new().with_response(ok_response(r#"{"status":"ok"}"#));
        let mut http = HttpTransport::new(connector);

        let reply = http
            .sync(&endpoint(), &DeviceSyncState::handshake("mac-aabbccddeeff"))
            .unwrap();
        assert_eq!(reply, SyncReply::Command(ServerCommand::ok()));

        let request = http.connector().last_request().unwrap();
        assert_eq!(
            request,
            "POST /api/data HTTP/1.1\r\nHost: 192.168.0.10:5000\r\nContent-Type: application/json\r\nContent-Length: 30\r\nConnection: close\r\n\r\n{\"node_id\":\"mac-aabbccddeeff\"}"
        );
    }

    #[test]
    fn one_connection_per_sync() {
        let connector = MockConnector::new()
            .with_response(ok_response(r#"{"status":"ok"}"#))
            .with_response(ok_response(r#"{"status":"ok"}"#));
        let mut http = HttpTransport::new(connector).with_timeout_ms(750);

        let state = DeviceSyncState::handshake("n1");
        http.sync(&endpoint(), &state).unwrap();
        http.sync(&endpoint(), &state).unwrap();

        assert_eq!(http.connector().connections(), 2);
        assert_eq!(http.connector().last_timeout_ms(), Some(750));
    }

    // =========================================================================
    // Response handling
    // =========================================================================

    #[test]
    fn directive_fields_are_parsed() {
        let connector = MockConnector::new().with_response(ok_response(
            r#"{"status":"ok","description":"Lab","blink":true}"#,
        ));
        let mut http = HttpTransport::new(connector);

        let reply = http
            .sync(&endpoint(), &DeviceSyncState::handshake("n1"))
            .unwrap();
        let cmd = reply.command().unwrap();
        assert_eq!(cmd.new_description.as_deref(), Some("Lab"));
        assert!(cmd.should_blink);
    }

    #[test]
    fn body_without_content_length_reads_to_eof() {
        let raw = b"HTTP/1.0 200 OK\r\n\r\n{\"status\":\"ok\"}".to_vec();
        let mut http = HttpTransport::new(MockConnector::new().with_response(raw));
        assert!(http.sync(&endpoint(), &DeviceSyncState::handshake("n1")).is_ok());
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let mut http = HttpTransport::new(MockConnector::new().refusing());
        assert_eq!(
            http.sync(&endpoint(), &DeviceSyncState::handshake("n1")),
            Err(SyncError::Transport(TransportError::Connect))
        );
    }

    #[test]
    fn empty_response_is_failure() {
        let mut http = HttpTransport::new(MockConnector::new().with_response(Vec::new()));
        assert_eq!(
            http.sync(&endpoint(), &DeviceSyncState::handshake("n1")),
            Err(SyncError::Transport(TransportError::NoResponse))
        );
    }

    #[test]
    fn read_timeout_without_data_is_timeout() {
        let stream = MockStream::new(Vec::new()).fail_reads(ErrorKind::TimedOut);
        let mut http = HttpTransport::new(MockConnector::new().with_stream(stream));
        assert_eq!(
            http.sync(&endpoint(), &DeviceSyncState::handshake("n1")),
            Err(SyncError::Transport(TransportError::Timeout))
        );
    }

    #[test]
    fn write_failure_is_send_error() {
        let stream = MockStream::new(ok_response(r#"{"status":"ok"}"#)).fail_writes();
        let mut http = HttpTransport::new(MockConnector::new().with_stream(stream));
        assert_eq!(
            http.sync(&endpoint(), &DeviceSyncState::handshake("n1")),
            Err(SyncError::Transport(TransportError::Send))
        );
    }

    #[test]
    fn truncated_body_is_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 40\r\n\r\n{\"status\":\"ok\"}".to_vec();
        let mut http = HttpTransport::new(MockConnector::new().with_response(raw));
        assert_eq!(
            http.sync(&endpoint(), &DeviceSyncState::handshake("n1")),
            Err(SyncError::Protocol(ProtocolError::Truncated))
        );
    }

    #[test]
    fn missing_header_terminator_is_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 15\r\n".to_vec();
        let mut http = HttpTransport::new(MockConnector::new().with_response(raw));
        assert_eq!(
            http.sync(&endpoint(), &DeviceSyncState::handshake("n1")),
            Err(SyncError::Protocol(ProtocolError::Truncated))
        );
    }

    #[test]
    fn server_error_status_is_rejected() {
        let raw = b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n".to_vec();
        let mut http = HttpTransport::new(MockConnector::new().with_response(raw));
        assert_eq!(
            http.sync(&endpoint(), &DeviceSyncState::handshake("n1")),
            Err(SyncError::Protocol(ProtocolError::HttpStatus(500)))
        );
    }

    #[test]
    fn not_ok_status_field_is_rejected() {
        let mut http = HttpTransport::new(
            MockConnector::new().with_response(ok_response(r#"{"status":"busy","blink":true}"#)),
        );
        assert_eq!(
            http.sync(&endpoint(), &DeviceSyncState::handshake("n1")),
            Err(SyncError::Protocol(ProtocolError::Rejected))
        );
    }

    #[test]
    fn response_body_ignores_bytes_past_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\ncontent-length: 15\r\n\r\n{\"status\":\"ok\"}garbage";
        assert_eq!(response_body(raw).unwrap(), b"{\"status\":\"ok\"}");
    }

    // =========================================================================
    // Open connections
    // =========================================================================

    /// Hands out `chunks` one read at a time, then blocks like a socket the
    /// server keeps open.
    struct KeepAliveStream {
        chunks: Vec<&'static [u8]>,
        reads_after_last_chunk: usize,
    }

    impl Read for KeepAliveStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                self.reads_after_last_chunk += 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn read_stops_once_declared_body_arrived() {
        let mut stream = KeepAliveStream {
            chunks: vec![
                b"HTTP/1.1 200 OK\r\nContent-Length: 15\r\n",
                b"\r\n{\"status\"",
                b":\"ok\"}",
            ],
            reads_after_last_chunk: 0,
        };
        let mut buf = [0u8; RESPONSE_CAPACITY];

        let len = read_response(&mut stream, &mut buf).unwrap();
        assert_eq!(stream.reads_after_last_chunk, 0);
        assert_eq!(response_body(&buf[..len]).unwrap(), b"{\"status\":\"ok\"}");
    }

    #[test]
    fn response_complete_needs_every_body_byte() {
        assert!(!response_complete(b"HTTP/1.1 200 OK\r\nContent-Length: 2"));
        assert!(!response_complete(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{"));
        assert!(response_complete(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}"));
        assert!(response_complete(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"));
        // no length: only EOF ends it
        assert!(!response_complete(b"HTTP/1.1 200 OK\r\n\r\n{}"));
    }
}

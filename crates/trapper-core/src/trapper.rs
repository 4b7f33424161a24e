//! Blocking TCP client for the trapper protocol.
//!
//! One `send` is one connection: resolve, connect with a bounded timeout,
//! write the frame, read until the collector closes the stream or the
//! fixed-size response buffer is full, then drop the socket. Any I/O failure
//! fails the call; nothing is retried here.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};
use crate::protocol::{DEFAULT_PORT, encode_frame, parse_response, render_body};
use crate::sender::{SendResult, StatusSender};
use crate::status::{Status, epoch_seconds};

/// Default connect and read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Size of the response buffer. Longer replies are cut off.
pub const RESPONSE_BUFFER_LEN: usize = 512;

/// Sender that pushes statuses to a collector over TCP.
#[derive(Debug, Clone)]
pub struct TrapperSender {
    server: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TrapperSender {
    /// Sender for `server` on the default port with default timeouts.
    pub fn new(server: impl Into<String>) -> Self {
        Self::with_port(server, DEFAULT_PORT)
    }

    pub fn with_port(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override both timeouts. Zero durations keep the current values, since
    /// the socket layer rejects them.
    pub fn timeouts(mut self, connect: Duration, read: Duration) -> Self {
        if !connect.is_zero() {
            self.connect_timeout = connect;
        }
        if !read.is_zero() {
            self.read_timeout = read;
        }
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Connect to the first resolved address that accepts, in resolver
    /// order. Returns the last connect error if none does.
    fn connect(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.server.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("connect to {addr} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address found for {}", self.server),
            )
        }))
    }

    fn round_trip(&self, frame: &[u8]) -> io::Result<Vec<u8>> {
        let mut stream = self.connect()?;
        stream.set_read_timeout(Some(self.read_timeout))?;
        stream.set_write_timeout(Some(self.read_timeout))?;

        stream.write_all(frame)?;
        stream.flush()?;

        let mut buf = [0u8; RESPONSE_BUFFER_LEN];
        let mut count = 0;
        while count < buf.len() {
            match stream.read(&mut buf[count..]) {
                Ok(0) => break,
                Ok(n) => count += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(buf[..count].to_vec())
    }
}

impl StatusSender for TrapperSender {
    fn send(&self, statuses: &[Status]) -> Result<SendResult> {
        let rendered = render_body(statuses, epoch_seconds());
        let frame = encode_frame(rendered.json.as_bytes());
        debug!(
            "sending {} statuses ({} bytes) to {}",
            statuses.len(),
            frame.len(),
            self.destination()
        );

        let mut result = SendResult {
            request: rendered.json,
            data: rendered.data,
            ..Default::default()
        };

        let raw = self
            .round_trip(&frame)
            .map_err(|e| Error::transport(self.destination(), e))?;
        let parsed = parse_response(&raw)?;
        debug!("received {} bytes from {}", raw.len(), self.destination());

        result.response = parsed.text;
        result.truncated = parsed.truncated;
        Ok(result)
    }

    fn destination(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

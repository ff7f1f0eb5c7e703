//! Raw TCP socket adapter (`TCPIP[n]::host::port::SOCKET`).
//!
//! Covers LAN instruments listening on a raw SCPI port as well as the
//! GPIB-over-Ethernet bridges (KISS-488 on port 23, Prologix on port 1234).

use super::stream::StreamTransport;
use super::{Framing, Transport};
use crate::error::{DcpsError, DcpsResult};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Socket adapter for Ethernet instruments.
pub struct SocketAdapter {
    inner: StreamTransport<TcpStream>,
}

impl SocketAdapter {
    /// Connect to `host:port`, applying the framing timeout to connect, read and write.
    ///
    /// # Errors
    ///
    /// Returns [`DcpsError::Resource`] if the host cannot be resolved and
    /// [`DcpsError::Io`] if the connection is refused or times out.
    pub fn connect(host: &str, port: u16, framing: Framing) -> DcpsResult<Self> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| DcpsError::Resource(format!("cannot resolve {}:{}", host, port)))?;

        let stream = TcpStream::connect_timeout(&addr, framing.timeout.max(MIN_CONNECT))?;
        stream.set_read_timeout(Some(framing.timeout))?;
        stream.set_write_timeout(Some(framing.timeout))?;
        stream.set_nodelay(true)?;
        debug!("Socket {}:{} connected", host, port);

        Ok(Self {
            inner: StreamTransport::new(stream, framing, format!("{}:{}", host, port)),
        })
    }
}

const MIN_CONNECT: Duration = Duration::from_millis(500);

impl Transport for SocketAdapter {
    fn write_line(&mut self, line: &str) -> DcpsResult<()> {
        self.inner.write_line(line)
    }

    fn read_line(&mut self) -> DcpsResult<String> {
        self.inner.read_line()
    }

    fn read_bytes(&mut self, count: usize) -> DcpsResult<Vec<u8>> {
        self.inner.read_bytes(count)
    }

    fn set_timeout(&mut self, timeout: Duration) -> DcpsResult<()> {
        self.inner.set_timeout(timeout)
    }

    fn describe(&self) -> String {
        format!("socket {}", self.inner.describe())
    }
}

//! Line framing over any blocking byte stream.
//!
//! Sockets, serial ports and VISA sessions all expose `Read + Write`; this type adds
//! terminator handling and timeout mapping once for all of them.

use super::{Framing, Transport};
use crate::error::{DcpsError, DcpsResult};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::time::Duration;
use tracing::trace;

/// Byte streams whose read timeout can be changed after opening.
pub trait TimeoutControl {
    /// Apply a new read timeout.
    fn apply_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;
}

impl TimeoutControl for std::net::TcpStream {
    fn apply_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

/// [`Transport`] over a buffered byte stream.
pub struct StreamTransport<S: Read + Write> {
    stream: BufReader<S>,
    framing: Framing,
    label: String,
    /// Start of a reply cut short by a read timeout, completed by the next read.
    pending: Vec<u8>,
}

impl<S: Read + Write + TimeoutControl + Send> StreamTransport<S> {
    /// Wrap an already opened stream.
    pub fn new(stream: S, framing: Framing, label: impl Into<String>) -> Self {
        Self {
            stream: BufReader::new(stream),
            framing,
            label: label.into(),
            pending: Vec::new(),
        }
    }

    fn terminator(&self) -> &[u8] {
        match self.framing.read_termination.as_deref() {
            Some(term) if !term.is_empty() => term.as_bytes(),
            _ => b"\n",
        }
    }
}

fn map_read_error(err: std::io::Error) -> DcpsError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => DcpsError::Timeout,
        _ => DcpsError::Io(err),
    }
}

impl<S: Read + Write + TimeoutControl + Send> Transport for StreamTransport<S> {
    fn write_line(&mut self, line: &str) -> DcpsResult<()> {
        let framed = format!("{}{}", line, self.framing.write_termination);
        trace!("{} OUT/{}", self.label, hex(framed.as_bytes()));
        let stream = self.stream.get_mut();
        stream.write_all(framed.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> DcpsResult<String> {
        let terminator = self.terminator().to_vec();
        let last = terminator[terminator.len() - 1];
        let mut buf = std::mem::take(&mut self.pending);
        loop {
            let n = match self.stream.read_until(last, &mut buf) {
                Ok(n) => n,
                Err(err) => {
                    if !buf.is_empty() {
                        trace!("{} kept {} bytes of a partial reply", self.label, buf.len());
                    }
                    self.pending = buf;
                    return Err(map_read_error(err));
                }
            };
            if n == 0 {
                return Err(DcpsError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("{} closed the connection", self.label),
                )));
            }
            if buf.ends_with(&terminator) {
                buf.truncate(buf.len() - terminator.len());
                break;
            }
        }
        trace!("{} IN /{}", self.label, hex(&buf));
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn read_bytes(&mut self, count: usize) -> DcpsResult<Vec<u8>> {
        let mut buf = std::mem::take(&mut self.pending);
        if buf.len() >= count {
            self.pending = buf.split_off(count);
            return Ok(buf);
        }
        let mut filled = buf.len();
        buf.resize(count, 0);
        while filled < count {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    buf.truncate(filled);
                    self.pending = buf;
                    return Err(DcpsError::Io(ErrorKind::UnexpectedEof.into()));
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    buf.truncate(filled);
                    self.pending = buf;
                    return Err(map_read_error(err));
                }
            }
        }
        trace!("{} IN /{}", self.label, hex(&buf));
        Ok(buf)
    }

    fn set_timeout(&mut self, timeout: Duration) -> DcpsResult<()> {
        self.framing.timeout = timeout;
        self.stream.get_mut().apply_timeout(timeout)?;
        Ok(())
    }

    fn clear_input(&mut self) -> DcpsResult<()> {
        self.pending.clear();
        let stale = self.stream.buffer().len();
        if stale > 0 {
            trace!("{} dropped {} buffered bytes", self.label, stale);
            self.stream.consume(stale);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Colon separated hex dump used for wire tracing.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory duplex stream: reads from `input`, collects writes in `output`.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl TimeoutControl for Duplex {
        fn apply_timeout(&mut self, _timeout: Duration) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn transport(input: &[u8], framing: Framing) -> StreamTransport<Duplex> {
        StreamTransport::new(
            Duplex {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            },
            framing,
            "duplex",
        )
    }

    #[test]
    fn test_write_appends_terminator() {
        let framing = Framing {
            write_termination: "\r\n".into(),
            ..Framing::default()
        };
        let mut t = transport(b"", framing);
        t.write_line("OP1 1").unwrap();
        assert_eq!(t.stream.get_ref().output, b"OP1 1\r\n");
    }

    #[test]
    fn test_read_line_strips_multibyte_terminator() {
        let framing = Framing {
            read_termination: Some("\r\n".into()),
            ..Framing::default()
        };
        let mut t = transport(b"5.000\nV\r\nnext\r\n", framing);
        assert_eq!(t.read_line().unwrap(), "5.000\nV");
        assert_eq!(t.read_line().unwrap(), "next");
    }

    #[test]
    fn test_read_bytes_and_eof() {
        let mut t = transport(b"12.345", Framing::default());
        assert_eq!(t.read_bytes(5).unwrap(), b"12.34");
        assert!(t.read_line().is_err());
    }

    /// Replays reads one chunk at a time; `None` reads as a timeout.
    struct Chunked {
        chunks: std::collections::VecDeque<Option<Vec<u8>>>,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Some(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Some(chunk[n..].to_vec()));
                    }
                    Ok(n)
                }
                Some(None) => Err(ErrorKind::TimedOut.into()),
                None => Ok(0),
            }
        }
    }

    impl Write for Chunked {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl TimeoutControl for Chunked {
        fn apply_timeout(&mut self, _timeout: Duration) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn chunked(chunks: Vec<Option<&str>>) -> StreamTransport<Chunked> {
        let chunks = chunks
            .into_iter()
            .map(|c| c.map(|c| c.as_bytes().to_vec()))
            .collect();
        StreamTransport::new(Chunked { chunks }, Framing::default(), "chunked")
    }

    #[test]
    fn test_timeout_mid_line_keeps_partial_reply() {
        let mut t = chunked(vec![Some("5.0"), None, Some("12\n"), Some("OK\n")]);
        assert!(t.read_line().unwrap_err().is_timeout());
        assert_eq!(t.read_line().unwrap(), "5.012");
        assert_eq!(t.read_line().unwrap(), "OK");
    }

    #[test]
    fn test_clear_input_drops_partial_reply() {
        let mut t = chunked(vec![Some("stale"), None, Some("1.5\n")]);
        assert!(t.read_line().is_err());
        t.clear_input().unwrap();
        assert_eq!(t.read_line().unwrap(), "1.5");
    }

    #[test]
    fn test_timeout_mid_read_bytes_keeps_prefix() {
        let mut t = chunked(vec![Some("12"), None, Some(".345")]);
        assert!(t.read_bytes(5).is_err());
        assert_eq!(t.read_bytes(5).unwrap(), b"12.34");
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex(b"V1?\r"), "56:31:3f:0d");
    }
}

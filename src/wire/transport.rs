use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::wire::error::WireError;

/// Read/write timeout applied to socket transports.
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Byte channel consumed by every codec in this crate.
///
/// `read_bytes` fills the buffer exactly or fails: a short read is an
/// error, never a silently truncated value. The codecs perform no
/// buffering of their own; whatever the underlying channel buffers is all
/// there is.
///
/// A transport instance is owned by a single logical connection and must
/// not be used from more than one thread without external serialization.
pub trait Transport {
    /// Fills `buf` with exactly `buf.len()` bytes from the channel.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), WireError>;

    /// Writes all of `buf` to the channel.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), WireError>;
}

/// Transport over any in-memory or file-like byte stream.
///
/// Used with [`std::io::Cursor`] in tests and for encoding payloads into
/// buffers before framing. Failures surface as whatever the underlying
/// stream reports, except truncation, which is always
/// [`WireError::UnexpectedEndOfInput`].
pub struct StreamTransport<S> {
    inner: S,
}

impl<S> StreamTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => WireError::UnexpectedEndOfInput("stream"),
            _ => WireError::Io(e),
        })
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), WireError> {
        self.inner.write_all(buf)?;
        Ok(())
    }
}

/// Transport over a live TCP connection to a peer.
///
/// Owns the stream as an opaque connection handle; the raw descriptor is
/// never exposed, so it cannot outlive or alias the connection. Read and
/// write timeouts are applied once at construction; a timed-out or closed
/// channel is reported as [`WireError::ConnectionClosed`], never as a
/// short value.
pub struct SocketTransport {
    stream: TcpStream,
}

impl SocketTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(Self { stream })
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

impl Transport for SocketTransport {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        self.stream.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => WireError::ConnectionClosed,
            _ => WireError::Io(e),
        })
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), WireError> {
        self.stream.write_all(buf).map_err(|e| match e.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => WireError::ConnectionClosed,
            _ => WireError::Io(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    /// Creates a connected local TcpStream pair (client, server).
    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn stream_read_fills_buffer_exactly() {
        let mut t = StreamTransport::new(Cursor::new(vec![1u8, 2, 3, 4]));
        let mut buf = [0u8; 4];
        t.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn stream_short_input_is_an_error_not_a_partial_read() {
        let mut t = StreamTransport::new(Cursor::new(vec![1u8, 2]));
        let mut buf = [0u8; 4];
        let err = t.read_bytes(&mut buf).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEndOfInput(_)));
    }

    #[test]
    fn stream_write_appends_to_sink() {
        let mut t = StreamTransport::new(Cursor::new(Vec::new()));
        t.write_bytes(&[0xAA, 0xBB]).unwrap();
        t.write_bytes(&[0xCC]).unwrap();
        assert_eq!(t.into_inner().into_inner(), vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn socket_round_trips_bytes() {
        let (client, server) = tcp_pair();
        let handle = thread::spawn(move || {
            let mut t = SocketTransport::new(server).unwrap();
            t.write_bytes(&[9, 8, 7]).unwrap();
        });

        let mut t = SocketTransport::new(client).unwrap();
        let mut buf = [0u8; 3];
        t.read_bytes(&mut buf).unwrap();
        assert_eq!(buf, [9, 8, 7]);
        handle.join().unwrap();
    }

    #[test]
    fn socket_reports_peer_drop_as_connection_closed() {
        let (client, server) = tcp_pair();
        drop(server);

        let mut t = SocketTransport::new(client).unwrap();
        let mut buf = [0u8; 1];
        let err = t.read_bytes(&mut buf).unwrap_err();
        assert!(matches!(err, WireError::ConnectionClosed));
    }
}

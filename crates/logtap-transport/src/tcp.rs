use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// A connected diagnostic log stream — implements Read + Write.
///
/// Wraps a TCP stream delivering an ordered, reliable byte stream.
/// One `read` call corresponds to one receive event; `Ok(0)` means the
/// peer closed the connection cleanly.
pub struct TcpConnection {
    inner: TcpStream,
}

impl TcpConnection {
    /// Connect to a log source (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        info!(addr = %addr, "connected to log source");
        Ok(Self { inner: stream })
    }

    pub(crate) fn from_stream(stream: TcpStream) -> Self {
        Self { inner: stream }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this connection (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self { inner: cloned })
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Local address of this end of the connection.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }

    /// Shut down both halves of the connection.
    pub fn shutdown(&self) -> Result<()> {
        self.inner
            .shutdown(std::net::Shutdown::Both)
            .map_err(Into::into)
    }
}

impl Read for TcpConnection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for TcpConnection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}

/// Listening side of the transport.
///
/// Accepts inbound log streams; used by tools that receive a pushed
/// stream and by tests standing in for a log source.
pub struct LogListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl LogListener {
    /// Bind and listen on the given address.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening for log streams");
        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<TcpConnection> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted log stream");
        Ok(TcpConnection::from_stream(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_connect_accept_roundtrip() {
        let listener = LogListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let handle = thread::spawn(move || {
            let mut client = TcpConnection::connect(addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get an address nothing listens on.
        let addr = {
            let listener = LogListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr()
        };

        let result = TcpConnection::connect(addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_clean_shutdown_reads_zero() {
        let listener = LogListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let handle = thread::spawn(move || {
            let client = TcpConnection::connect(addr).unwrap();
            drop(client);
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 16];
        let n = server.read(&mut buf).unwrap();
        assert_eq!(n, 0, "closed peer must read as EOF");

        handle.join().unwrap();
    }

    #[test]
    fn test_read_timeout_applies() {
        let listener = LogListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let handle = thread::spawn(move || {
            let client = TcpConnection::connect(addr).unwrap();
            // Hold the connection open without sending anything.
            thread::sleep(Duration::from_millis(200));
            drop(client);
        });

        let mut server = listener.accept().unwrap();
        server
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let mut buf = [0u8; 16];
        let err = server.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));

        handle.join().unwrap();
    }
}

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};

use may::net::TcpStream;

/// Byte-level socket abstraction consumed by the connection engine.
///
/// `recv` returning `Ok(0)` is the closed signal; every method suspends the
/// calling coroutine rather than blocking its worker thread. A TLS adapter
/// implements the same surface on top of its wrapped stream.
pub trait Transport: Send {
    /// Receive up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send the whole slice or fail; partial sends surface as errors.
    fn send_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Disable Nagle's algorithm on the underlying socket.
    fn set_nodelay(&mut self) -> io::Result<()>;

    /// Peer address for logging.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Shut the connection down. Idempotent; errors are ignored.
    fn close(&mut self);
}

impl Transport for TcpStream {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn send_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)
    }

    fn set_nodelay(&mut self) -> io::Result<()> {
        TcpStream::set_nodelay(self, true)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn close(&mut self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

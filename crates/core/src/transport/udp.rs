use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use crate::error::Result;

/// UDP socket for outbound RTP packet delivery.
///
/// The server allocates one per session at PLAY and drops it at TEARDOWN.
/// Clones share the socket; it closes when the last clone is dropped.
///
/// This layer is address-only; it does not know about
/// sessions. The caller resolves the destination before calling
/// [`send_to`](Self::send_to).
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind a UDP socket for outbound RTP, typically `0.0.0.0:0`.
    pub fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        tracing::trace!(local = ?socket.local_addr().ok(), "media socket bound");
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Send raw bytes to a specific socket address.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(payload, addr)?)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_to_address() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        let tx = UdpTransport::bind("127.0.0.1:0").unwrap();
        assert_eq!(tx.send_to(b"hello", rx.local_addr().unwrap()).unwrap(), 5);

        let mut buf = [0u8; 16];
        let (n, from) = rx.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, tx.local_addr().unwrap());
    }
}

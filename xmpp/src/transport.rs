// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The byte transport a session runs over.
//!
//! Anything that reads and writes bytes asynchronously can carry a stream;
//! the trait only adds the peer address. TLS upgrades replace the transport
//! in place (see the `starttls` module), which preserves the owning
//! session's identity and state.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

use crate::Error;

/// A duplex byte stream a session can own.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {
    /// The peer's network address, when the transport has one.
    fn peer_addr(&self) -> Option<SocketAddr>;
}

/// The boxed form sessions store, so STARTTLS can swap the implementation
/// without changing the session's type.
pub type BoxTransport = Box<dyn Transport>;

impl Transport for TcpStream {
    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}

impl Transport for DuplexStream {
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn peer_addr(&self) -> Option<SocketAddr> {
        (**self).peer_addr()
    }
}

/// Opens a TCP transport to `addr` (a `host:port` pair).
pub async fn tcp_connect(addr: &str) -> Result<TcpStream, Error> {
    Ok(TcpStream::connect(addr).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplex_is_a_transport() {
        let (client, server) = tokio::io::duplex(256);
        let boxed: BoxTransport = Box::new(client);
        assert_eq!(boxed.peer_addr(), None);
        drop(server);
    }
}

//! TCP transport.
//!
//! Frames are length-delimited (see [`crate::wire`]); every accepted or
//! dialed stream completes the SP handshake before it is surfaced as a
//! pipe. TCP_NODELAY is enabled on every stream: request/reply latency
//! matters more here than coalescing tiny frames.
//!
//! # Safety
//!
//! `enable_tcp_nodelay` uses unsafe code to borrow the raw fd/socket for
//! option configuration. The unsafe operations are encapsulated and safe
//! to use from the public API.

#![allow(unsafe_code)]

use crate::endpoint::Endpoint;
use crate::options::LinkConfig;
use crate::stream::{exchange_sp_handshake, spawn_duplex};
use crate::transport::{Conn, Listener, Transport};
use compio::net::{TcpListener, TcpStream};
use std::io;
use tracing::debug;

/// Enable TCP_NODELAY on a compio `TcpStream`.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &TcpStream) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        sock.set_nodelay(true)?;
        std::mem::forget(sock); // Don't close the fd
        Ok(())
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        sock.set_nodelay(true)?;
        std::mem::forget(sock); // Don't close the socket
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    {
        // Unsupported platform - just continue without TCP_NODELAY
        Ok(())
    }
}

/// The `tcp://` transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

impl TcpTransport {
    /// Create the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait(?Send)]
impl Transport for TcpTransport {
    fn scheme(&self) -> &'static str {
        "tcp"
    }

    async fn dial(&self, endpoint: &Endpoint, config: &LinkConfig) -> io::Result<Conn> {
        let Endpoint::Tcp(addr) = endpoint else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tcp transport handed a non-tcp endpoint",
            ));
        };

        let mut stream = TcpStream::connect(*addr).await?;
        enable_tcp_nodelay(&stream)?;
        exchange_sp_handshake(&mut stream, config).await?;
        debug!("[tcp] dialed {addr}");
        spawn_duplex(stream, config)
    }

    async fn listen(
        &self,
        endpoint: &Endpoint,
        config: &LinkConfig,
    ) -> io::Result<Box<dyn Listener>> {
        let Endpoint::Tcp(addr) = endpoint else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tcp transport handed a non-tcp endpoint",
            ));
        };

        let listener = TcpListener::bind(*addr).await?;
        debug!("[tcp] listening on {addr}");
        Ok(Box::new(TcpAcceptor {
            listener,
            config: config.clone(),
        }))
    }
}

#[derive(Debug)]
struct TcpAcceptor {
    listener: TcpListener,
    config: LinkConfig,
}

#[async_trait::async_trait(?Send)]
impl Listener for TcpAcceptor {
    async fn accept(&mut self) -> io::Result<Conn> {
        let (mut stream, peer) = self.listener.accept().await?;
        enable_tcp_nodelay(&stream)?;
        exchange_sp_handshake(&mut stream, &self.config).await?;
        debug!("[tcp] accepted {peer}");
        spawn_duplex(stream, &self.config)
    }
}

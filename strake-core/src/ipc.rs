//! IPC transport via Unix domain sockets.
//!
//! Same framing and SP handshake as TCP, minus the network stack. Binding
//! removes a stale socket file left behind by a previous process.

use crate::endpoint::Endpoint;
use crate::options::LinkConfig;
use crate::stream::{exchange_sp_handshake, spawn_duplex};
use crate::transport::{Conn, Listener, Transport};
use compio::net::{UnixListener, UnixStream};
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// The `ipc://` transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct IpcTransport;

impl IpcTransport {
    /// Create the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait(?Send)]
impl Transport for IpcTransport {
    fn scheme(&self) -> &'static str {
        "ipc"
    }

    async fn dial(&self, endpoint: &Endpoint, config: &LinkConfig) -> io::Result<Conn> {
        let Endpoint::Ipc(path) = endpoint else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ipc transport handed a non-ipc endpoint",
            ));
        };

        let mut stream = UnixStream::connect(path).await?;
        exchange_sp_handshake(&mut stream, config).await?;
        debug!("[ipc] dialed {}", path.display());
        spawn_duplex(stream, config)
    }

    async fn listen(
        &self,
        endpoint: &Endpoint,
        config: &LinkConfig,
    ) -> io::Result<Box<dyn Listener>> {
        let Endpoint::Ipc(path) = endpoint else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ipc transport handed a non-ipc endpoint",
            ));
        };

        // Remove a stale socket file from a previous run.
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path).await?;
        debug!("[ipc] listening on {}", path.display());
        Ok(Box::new(IpcAcceptor {
            listener,
            path: path.clone(),
            config: config.clone(),
        }))
    }
}

#[derive(Debug)]
struct IpcAcceptor {
    listener: UnixListener,
    path: PathBuf,
    config: LinkConfig,
}

#[async_trait::async_trait(?Send)]
impl Listener for IpcAcceptor {
    async fn accept(&mut self) -> io::Result<Conn> {
        let (mut stream, _peer) = self.listener.accept().await?;
        exchange_sp_handshake(&mut stream, &self.config).await?;
        debug!("[ipc] accepted on {}", self.path.display());
        spawn_duplex(stream, &self.config)
    }
}

impl Drop for IpcAcceptor {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

//! In-process transport over channels.
//!
//! Endpoints live in a process-global registry keyed by name. Binding
//! parks an accept queue under the name; dialing cross-wires two channel
//! pairs and pushes the listener's end onto that queue. Messages are
//! already whole frames, so there is no framing layer and no handshake —
//! but the bound side's protocol number is recorded so an incompatible
//! dialer is still refused.

use crate::endpoint::Endpoint;
use crate::options::LinkConfig;
use crate::transport::{Conn, Listener, Transport};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::io;
use tracing::debug;

/// What a bound inproc endpoint parks in the registry.
struct Binding {
    /// Protocol number of the bound socket, checked against dialers.
    proto: u16,
    /// Queue of listener-side connections awaiting accept.
    accept_tx: flume::Sender<Conn>,
}

static ENDPOINTS: Lazy<DashMap<String, Binding>> = Lazy::new(DashMap::new);

/// The `inproc://` transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct InprocTransport;

impl InprocTransport {
    /// Create the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait(?Send)]
impl Transport for InprocTransport {
    fn scheme(&self) -> &'static str {
        "inproc"
    }

    async fn dial(&self, endpoint: &Endpoint, config: &LinkConfig) -> io::Result<Conn> {
        let Endpoint::Inproc(name) = endpoint else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "inproc transport handed a non-inproc endpoint",
            ));
        };

        let conn = {
            let Some(binding) = ENDPOINTS.get(name) else {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("inproc endpoint '{name}' is not bound"),
                ));
            };
            if binding.proto != config.peer_proto {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "inproc endpoint '{name}' speaks protocol {}, required {}",
                        binding.proto, config.peer_proto
                    ),
                ));
            }

            let (here_tx, here_rx) = flume::unbounded();
            let (there_tx, there_rx) = flume::unbounded();
            let local = Conn {
                tx: here_tx,
                rx: there_rx,
            };
            let remote = Conn {
                tx: there_tx,
                rx: here_rx,
            };
            binding.accept_tx.send(remote).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("inproc endpoint '{name}' stopped accepting"),
                )
            })?;
            local
        };

        debug!("[inproc] dialed '{name}'");
        Ok(conn)
    }

    async fn listen(
        &self,
        endpoint: &Endpoint,
        config: &LinkConfig,
    ) -> io::Result<Box<dyn Listener>> {
        let Endpoint::Inproc(name) = endpoint else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "inproc transport handed a non-inproc endpoint",
            ));
        };

        let (accept_tx, accept_rx) = flume::unbounded();
        match ENDPOINTS.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("inproc endpoint '{name}' is already bound"),
                ));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Binding {
                    proto: config.self_proto,
                    accept_tx,
                });
            }
        }

        debug!("[inproc] listening on '{name}'");
        Ok(Box::new(InprocAcceptor {
            name: name.clone(),
            accept_rx,
        }))
    }
}

#[derive(Debug)]
struct InprocAcceptor {
    name: String,
    accept_rx: flume::Receiver<Conn>,
}

#[async_trait::async_trait(?Send)]
impl Listener for InprocAcceptor {
    async fn accept(&mut self) -> io::Result<Conn> {
        self.accept_rx.recv_async().await.map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "inproc endpoint torn down")
        })
    }
}

impl Drop for InprocAcceptor {
    fn drop(&mut self) {
        ENDPOINTS.remove(&self.name);
    }
}

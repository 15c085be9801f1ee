//! Transport contract: dialers and listeners that produce pipes.
//!
//! The socket layer never touches a stream. A transport hands back a
//! [`Conn`] — a pair of flume channels carrying whole wire frames — and
//! keeps the IO pumps behind it to itself. Dropping the channel ends is
//! how a connection is closed: the write pump drains what was already
//! queued and exits, the read pump follows.
//!
//! Transports are injected per socket (`add_transport`); there is no
//! process-global registry. The facade crate offers a convenience bundle
//! that is nothing more than a few `add_transport` calls.

use crate::endpoint::Endpoint;
use crate::options::LinkConfig;
use bytes::Bytes;
use std::io;

/// One established connection, seen as a frame channel pair.
///
/// `tx` carries outbound wire frames toward the peer; `rx` yields inbound
/// frames. Transport-level failure surfaces as the channels disconnecting.
#[derive(Debug)]
pub struct Conn {
    /// Outbound frames, consumed by the transport's write pump.
    pub tx: flume::Sender<Bytes>,
    /// Inbound frames, produced by the transport's read pump.
    pub rx: flume::Receiver<Bytes>,
}

/// A transport capability: dial and listen for one address scheme.
///
/// Implementations run on the socket's driver runtime, so the futures do
/// not need to be `Send`; the transport object itself crosses threads once
/// at registration time.
#[async_trait::async_trait(?Send)]
pub trait Transport: Send + Sync {
    /// The address scheme this transport serves (`"tcp"`, `"ipc"`, ...).
    fn scheme(&self) -> &'static str;

    /// Connect to a remote endpoint and complete the SP handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails; dial loops
    /// treat every failure as retryable.
    async fn dial(&self, endpoint: &Endpoint, config: &LinkConfig) -> io::Result<Conn>;

    /// Bind a listener on a local endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (`AddrInUse` is
    /// surfaced to the `listen` caller).
    async fn listen(
        &self,
        endpoint: &Endpoint,
        config: &LinkConfig,
    ) -> io::Result<Box<dyn Listener>>;
}

/// Accept side of a bound transport endpoint.
#[async_trait::async_trait(?Send)]
pub trait Listener: std::fmt::Debug {
    /// Wait for the next fully handshaken inbound connection.
    ///
    /// # Errors
    ///
    /// Individual accept failures (a peer that fails the handshake, a
    /// transient socket error) are returned per call; the accept loop logs
    /// them and keeps listening.
    async fn accept(&mut self) -> io::Result<Conn>;
}

//! The user-facing socket: one logical endpoint over many pipes.
//!
//! A [`Socket`] is a cheap, cloneable handle. All protocol state and the
//! pipe set live on a dedicated driver thread running its own compio
//! runtime; the handle talks to it over flume channels, whose dual
//! sync/async API is what lets this surface stay blocking-with-timeouts
//! while everything behind it is async. Handles may be used from any
//! number of threads concurrently; cloning does not create a new socket.
//!
//! ```no_run
//! use strake_proto::pair;
//! use strake_core::tcp::TcpTransport;
//!
//! # fn main() -> strake_core::error::Result<()> {
//! let socket = pair::socket()?;
//! socket.add_transport(TcpTransport::new())?;
//! socket.listen("tcp://127.0.0.1:5555")?;
//! let msg = socket.recv()?;
//! socket.send(msg)?;
//! socket.close();
//! # Ok(())
//! # }
//! ```

use crate::hub::Hub;
use crate::proto::{Protocol, ProtocolId};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strake_core::endpoint::Endpoint;
use strake_core::error::{Error, Result};
use strake_core::message::Message;
use strake_core::options::SocketOptions;
use strake_core::transport::Transport;
use tracing::error;

/// Options settable on a live socket.
///
/// Subscription options are protocol-level and only meaningful on SUB
/// sockets; everything else applies to any protocol.
#[derive(Debug, Clone)]
pub enum SocketOption {
    /// Deadline for `recv`; `None` blocks indefinitely.
    RecvTimeout(Option<Duration>),
    /// Deadline for `send`; `None` blocks indefinitely.
    SendTimeout(Option<Duration>),
    /// How long `close` lets queued outbound messages drain.
    Linger(Duration),
    /// Initial redial delay.
    ReconnectIvl(Duration),
    /// Redial backoff ceiling.
    ReconnectIvlMax(Duration),
    /// Inbound frame size cap.
    MaxRecvSize(Option<usize>),
    /// Raw mode: skip protocol header stamping/stripping (device legs).
    Raw(bool),
    /// Add a topic prefix to a SUB socket's filter set.
    Subscribe(Bytes),
    /// Remove a topic prefix from a SUB socket's filter set.
    Unsubscribe(Bytes),
}

/// Commands from a socket handle to its hub.
pub(crate) enum Cmd {
    Listen(Endpoint, flume::Sender<Result<()>>),
    Dial(Endpoint, flume::Sender<Result<()>>),
    AddTransport(Arc<dyn Transport>),
    Send(Message, flume::Sender<Result<()>>),
    SetOption(SocketOption, flume::Sender<Result<()>>),
    Close(flume::Sender<()>),
}

/// Immutable facts about the bound protocol, cached in every handle.
#[derive(Debug, Clone, Copy)]
struct ProtoInfo {
    number: ProtocolId,
    peer_number: ProtocolId,
    name: &'static str,
    can_send: bool,
    can_recv: bool,
}

/// A protocol-typed messaging socket.
#[derive(Clone)]
pub struct Socket {
    cmd_tx: flume::Sender<Cmd>,
    recv_rx: flume::Receiver<Message>,
    closed: Arc<AtomicBool>,
    options: Arc<Mutex<SocketOptions>>,
    info: ProtoInfo,
}

impl Socket {
    /// Create a socket bound to the given protocol, with default options.
    ///
    /// # Errors
    ///
    /// Fails only if the driver thread cannot be spawned.
    pub fn new(proto: Box<dyn Protocol>) -> Result<Self> {
        Self::with_options(proto, SocketOptions::default())
    }

    /// Create a socket bound to the given protocol and options.
    ///
    /// Spawns the driver thread; the protocol instance moves there and is
    /// never replaced for the socket's lifetime.
    ///
    /// # Errors
    ///
    /// Fails only if the driver thread cannot be spawned.
    pub fn with_options(proto: Box<dyn Protocol>, options: SocketOptions) -> Result<Self> {
        let info = ProtoInfo {
            number: proto.number(),
            peer_number: proto.peer_number(),
            name: proto.name(),
            can_send: proto.can_send(),
            can_recv: proto.can_recv(),
        };
        let options = Arc::new(Mutex::new(options));
        let (cmd_tx, cmd_rx) = flume::unbounded();
        let (recv_tx, recv_rx) = flume::unbounded();

        let hub_options = options.clone();
        std::thread::Builder::new()
            .name(format!("strake-{}", info.name))
            .spawn(move || {
                let rt = match compio::runtime::Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("[socket] failed to create driver runtime: {e}");
                        return;
                    }
                };
                rt.block_on(Hub::new(proto, hub_options, cmd_rx, recv_tx).run());
            })
            .map_err(Error::Transport)?;

        Ok(Self {
            cmd_tx,
            recv_rx,
            closed: Arc::new(AtomicBool::new(false)),
            options,
            info,
        })
    }

    /// This socket's protocol number.
    #[must_use]
    pub fn number(&self) -> ProtocolId {
        self.info.number
    }

    /// The protocol number this socket requires of its peers.
    #[must_use]
    pub fn peer_number(&self) -> ProtocolId {
        self.info.peer_number
    }

    /// Short protocol name (`"pair"`, `"req"`, ...).
    #[must_use]
    pub fn protocol_name(&self) -> &'static str {
        self.info.name
    }

    /// Whether this protocol supports sending.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.info.can_send
    }

    /// Whether this protocol supports receiving.
    #[must_use]
    pub fn can_recv(&self) -> bool {
        self.info.can_recv
    }

    /// True once `close` has been called on any clone of this socket.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Snapshot of the current option values.
    #[must_use]
    pub fn options(&self) -> SocketOptions {
        self.options.lock().clone()
    }

    /// Register a transport for its address scheme.
    ///
    /// Registering a second transport for the same scheme replaces the
    /// first for endpoints dialed or listened after that point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] on a closed socket.
    pub fn add_transport(&self, transport: impl Transport + 'static) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.cmd_tx
            .send(Cmd::AddTransport(Arc::new(transport)))
            .map_err(|_| Error::Closed)
    }

    /// Start listening on an address.
    ///
    /// Binds synchronously, then accepts in the background; each inbound
    /// connection becomes a pipe once the protocol accepts it.
    ///
    /// # Errors
    ///
    /// `AddrInvalid` for an unparseable address or unregistered scheme,
    /// `AddrInUse` if the address is taken, `Closed` on a closed socket.
    pub fn listen(&self, addr: &str) -> Result<()> {
        let endpoint = self.parse(addr)?;
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.cmd_tx
            .send(Cmd::Listen(endpoint, reply_tx))
            .map_err(|_| Error::Closed)?;
        reply_rx.recv().map_err(|_| Error::Closed)?
    }

    /// Start dialing an address.
    ///
    /// Returns once the dial loop is running, not once connected: the loop
    /// connects in the background and redials with backoff, forever, until
    /// the socket closes.
    ///
    /// # Errors
    ///
    /// `AddrInvalid` for an unparseable address or unregistered scheme,
    /// `Closed` on a closed socket.
    pub fn dial(&self, addr: &str) -> Result<()> {
        let endpoint = self.parse(addr)?;
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.cmd_tx
            .send(Cmd::Dial(endpoint, reply_tx))
            .map_err(|_| Error::Closed)?;
        reply_rx.recv().map_err(|_| Error::Closed)?
    }

    /// Send a message, waiting up to the configured send deadline.
    ///
    /// # Errors
    ///
    /// `Timeout` if no eligible pipe took the message in time (a timed-out
    /// message is discarded, never sent late), `NotSupported` for send-less
    /// protocols, `Closed` on a closed socket.
    pub fn send(&self, msg: Message) -> Result<()> {
        let timeout = self.options.lock().send_timeout;
        self.send_timeout(msg, timeout)
    }

    /// Send with an explicit deadline, overriding the socket option.
    ///
    /// # Errors
    ///
    /// As [`Socket::send`].
    pub fn send_timeout(&self, msg: Message, timeout: Option<Duration>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if !self.info.can_send {
            return Err(Error::NotSupported);
        }
        let (done_tx, done_rx) = flume::bounded(1);
        self.cmd_tx
            .send(Cmd::Send(msg, done_tx))
            .map_err(|_| Error::Closed)?;
        await_reply(&done_rx, timeout)
    }

    /// Receive a message, waiting up to the configured receive deadline.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing arrived in time, `NotSupported` for recv-less
    /// protocols, `Closed` on a closed socket (which takes precedence over
    /// messages still sitting in the delivery queue).
    pub fn recv(&self) -> Result<Message> {
        let timeout = self.options.lock().recv_timeout;
        self.recv_timeout(timeout)
    }

    /// Receive with an explicit deadline, overriding the socket option.
    ///
    /// # Errors
    ///
    /// As [`Socket::recv`].
    pub fn recv_timeout(&self, timeout: Option<Duration>) -> Result<Message> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if !self.info.can_recv {
            return Err(Error::NotSupported);
        }
        match timeout {
            None => self.recv_rx.recv().map_err(|_| Error::Closed),
            Some(d) => self.recv_rx.recv_timeout(d).map_err(|e| match e {
                flume::RecvTimeoutError::Timeout => Error::Timeout,
                flume::RecvTimeoutError::Disconnected => Error::Closed,
            }),
        }
    }

    /// Change one socket option.
    ///
    /// Takes effect for subsequent operations; pipes already established
    /// keep the link parameters they were created with.
    ///
    /// # Errors
    ///
    /// `NotSupported` if the option is not meaningful for this protocol,
    /// `Closed` on a closed socket.
    pub fn set_option(&self, option: SocketOption) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.cmd_tx
            .send(Cmd::SetOption(option, reply_tx))
            .map_err(|_| Error::Closed)?;
        reply_rx.recv().map_err(|_| Error::Closed)?
    }

    /// Close the socket: stop all listeners and dialers, close every pipe,
    /// and unblock pending sends and receives with [`Error::Closed`].
    ///
    /// Idempotent, never fails, safe to call from any thread or clone.
    /// Returns within roughly the linger interval.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let (ack_tx, ack_rx) = flume::bounded(1);
        if self.cmd_tx.send(Cmd::Close(ack_tx)).is_ok() {
            let linger = self.options.lock().linger;
            // Small slack past the hub's own linger-bounded drain.
            let _ = ack_rx.recv_timeout(linger + Duration::from_millis(500));
        }
    }

    /// Whether two handles refer to the same underlying socket.
    pub(crate) fn same_socket(a: &Socket, b: &Socket) -> bool {
        Arc::ptr_eq(&a.closed, &b.closed)
    }

    fn parse(&self, addr: &str) -> Result<Endpoint> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Endpoint::parse(addr).map_err(|e| Error::AddrInvalid(e.to_string()))
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("protocol", &self.info.name)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn await_reply(rx: &flume::Receiver<Result<()>>, timeout: Option<Duration>) -> Result<()> {
    match timeout {
        None => rx.recv().map_err(|_| Error::Closed)?,
        Some(d) => match rx.recv_timeout(d) {
            Ok(inner) => inner,
            Err(flume::RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(flume::RecvTimeoutError::Disconnected) => Err(Error::Closed),
        },
    }
}

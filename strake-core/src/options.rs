//! Socket configuration options.
//!
//! Options are plain data; the socket consults a shared snapshot on every
//! blocking call, so changing a deadline affects subsequent sends and
//! receives but never an already-parked one.

use std::time::Duration;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use strake_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_recv_timeout(Some(Duration::from_secs(5)))
///     .with_reconnect_ivl(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Receive deadline.
    ///
    /// - `None`: block indefinitely (default)
    /// - `Some(duration)`: wait up to duration, then fail with `Timeout`
    pub recv_timeout: Option<Duration>,

    /// Send deadline, same semantics as `recv_timeout`.
    pub send_timeout: Option<Duration>,

    /// Maximum time to complete the SP handshake after a transport
    /// connection is established. Connections that cannot finish the
    /// exchange in time are cut.
    pub handshake_timeout: Duration,

    /// Time `close()` waits for queued outbound messages to drain before
    /// returning. Pipes are dropped regardless once the interval elapses.
    pub linger: Duration,

    /// Initial redial delay after a failed or broken connection.
    pub reconnect_ivl: Duration,

    /// Ceiling for the exponential redial backoff.
    pub reconnect_ivl_max: Duration,

    /// Reject inbound wire frames larger than this. `None` = unlimited.
    pub max_recv_size: Option<usize>,

    /// Size of the buffers the transport read pumps allocate per read.
    pub read_buffer_size: usize,

    /// Raw mode: bypass protocol header stamping/stripping on send/recv.
    ///
    /// Devices switch their legs into raw mode so that messages are
    /// forwarded verbatim, preserving any backtrace a Req/Rep chain needs
    /// to retrace.
    pub raw: bool,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            recv_timeout: None,
            send_timeout: None,
            handshake_timeout: Duration::from_secs(5),
            linger: Duration::from_secs(1),
            reconnect_ivl: Duration::from_millis(100),
            reconnect_ivl_max: Duration::from_secs(30),
            max_recv_size: None,
            read_buffer_size: 8192,
            raw: false,
        }
    }
}

impl SocketOptions {
    /// Set the receive deadline (builder-style).
    #[must_use]
    pub fn with_recv_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Set the send deadline (builder-style).
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the initial redial delay (builder-style).
    #[must_use]
    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    /// Set the redial backoff ceiling (builder-style).
    #[must_use]
    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    /// Set the close linger interval (builder-style).
    #[must_use]
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Set the maximum inbound frame size (builder-style).
    #[must_use]
    pub fn with_max_recv_size(mut self, max: Option<usize>) -> Self {
        self.max_recv_size = max;
        self
    }
}

/// Per-connection configuration a socket hands to its transports.
///
/// Captures everything a transport needs to establish one pipe: the
/// protocol numbers for the SP handshake plus the framing limits.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Our protocol number, announced in the handshake.
    pub self_proto: u16,
    /// The protocol number we require the peer to announce.
    pub peer_proto: u16,
    /// Handshake deadline.
    pub handshake_timeout: Duration,
    /// Inbound frame size cap.
    pub max_recv_size: Option<usize>,
    /// Read pump buffer size.
    pub read_buffer_size: usize,
}

impl LinkConfig {
    /// Build a link config for a socket with the given protocol numbers.
    #[must_use]
    pub fn new(self_proto: u16, peer_proto: u16, options: &SocketOptions) -> Self {
        Self {
            self_proto,
            peer_proto,
            handshake_timeout: options.handshake_timeout,
            max_recv_size: options.max_recv_size,
            read_buffer_size: options.read_buffer_size,
        }
    }
}

//! # Strake
//!
//! A scalability-protocol messaging runtime: independent processes
//! exchange discrete messages over interchangeable transports using
//! well-known communication patterns.
//!
//! ## Architecture
//!
//! Strake is structured as a **messaging kernel** with clean layering:
//!
//! - **`strake-core`**: message container, wire framing, SP handshake,
//!   and the transports (TCP, IPC, inproc)
//! - **`strake-proto`**: pattern state machines (sans-IO), the socket
//!   runtime, and the device bridge
//! - **`strake`**: public API surface (this crate)
//!
//! ## Patterns
//!
//! PAIR, REQ/REP, PUB/SUB, BUS, PUSH/PULL, SURVEYOR/RESPONDENT. Each
//! socket is protocol-typed at creation and multiplexes any number of
//! physical connections behind one send/recv endpoint, with dialers
//! reconnecting on their own.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strake::{pair, Message};
//!
//! # fn main() -> strake::Result<()> {
//! let server = pair::socket()?;
//! strake::add_standard_transports(&server)?;
//! server.listen("tcp://127.0.0.1:5555")?;
//!
//! let client = pair::socket()?;
//! strake::add_standard_transports(&client)?;
//! client.dial("tcp://127.0.0.1:5555")?;
//!
//! client.send(Message::from_body(b"hello"))?;
//! let msg = server.recv()?;
//! server.send(msg)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Devices
//!
//! A [`Device`] bridges two sockets (or one socket back onto itself),
//! forwarding raw messages without applying either side's protocol
//! semantics — the building block for brokers, forwarders and reflectors.

pub mod dev_tracing;

// Core building blocks
pub use strake_core::backoff::Backoff;
pub use strake_core::endpoint::{Endpoint, EndpointError};
pub use strake_core::error::{Error, Result};
pub use strake_core::inproc::InprocTransport;
pub use strake_core::message::Message;
pub use strake_core::options::{LinkConfig, SocketOptions};
pub use strake_core::tcp::TcpTransport;
pub use strake_core::transport::{Conn, Listener, Transport};

#[cfg(unix)]
pub use strake_core::ipc::IpcTransport;

// Protocol layer
pub use strake_proto::{bus, pair, publisher, pull, push, rep, req, subscriber, survey};
pub use strake_proto::{Device, PipeId, Protocol, ProtocolId, SendPlan, Socket, SocketOption};

/// Register the built-in transports (TCP, IPC on Unix, inproc) on a socket.
///
/// Purely convenience sugar over [`Socket::add_transport`]; sockets that
/// want a different set just register transports themselves.
///
/// # Errors
///
/// Returns [`Error::Closed`] on a closed socket.
pub fn add_standard_transports(socket: &Socket) -> Result<()> {
    socket.add_transport(TcpTransport::new())?;
    #[cfg(unix)]
    socket.add_transport(IpcTransport::new())?;
    socket.add_transport(InprocTransport::new())?;
    Ok(())
}

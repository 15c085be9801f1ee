//! # Strake Proto
//!
//! The scalability-protocol layer of Strake: pattern state machines, the
//! socket runtime that multiplexes pipes behind one logical endpoint, and
//! the device bridge.
//!
//! ## Design
//!
//! - **Sans-IO protocols**: every pattern ({PAIR, REQ, REP, PUB, SUB, BUS,
//!   PUSH, PULL, SURVEYOR, RESPONDENT}) is a plain state machine behind
//!   one [`proto::Protocol`] trait; adding a pattern means adding a
//!   variant, not type-switching in the core.
//! - **One hub per socket**: a single task owns the protocol and the pipe
//!   set, so attach, detach and fan-out never race.
//! - **Blocking surface, async engine**: user handles are sync with
//!   timeouts; the driver thread runs a compio runtime underneath.
//!
//! ```no_run
//! use strake_proto::{pair, Device};
//! use strake_core::tcp::TcpTransport;
//!
//! # fn main() -> strake_core::error::Result<()> {
//! let socket = pair::socket()?;
//! socket.add_transport(TcpTransport::new())?;
//! socket.listen("tcp://127.0.0.1:5555")?;
//!
//! // Reflect everything the remote peer sends back at it.
//! let device = Device::new(Some(socket.clone()), Some(socket))?;
//! device.start()?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod bus;
pub mod device;
mod hub;
pub mod pair;
pub mod pipe;
pub mod proto;
pub mod publisher;
pub mod pull;
pub mod push;
pub mod rep;
pub mod req;
pub mod socket;
pub mod subscriber;
pub mod survey;

pub use device::Device;
pub use pipe::PipeId;
pub use proto::{Protocol, ProtocolId, SendPlan};
pub use socket::{Socket, SocketOption};

//! Strake Core
//!
//! This crate contains the protocol-agnostic building blocks of the
//! messaging runtime:
//! - Message container with separate header/body regions (`message`)
//! - Error vocabulary shared across the stack (`error`)
//! - Endpoint parsing and scheme dispatch (`endpoint`)
//! - Socket and per-link configuration (`options`)
//! - Redial backoff schedule (`backoff`)
//! - Wire framing + SP connection header (`wire`)
//! - The transport contract (`transport`) and the built-in transports
//!   (`tcp`, `ipc`, `inproc`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod backoff;
pub mod endpoint;
pub mod error;
pub mod inproc;
pub mod message;
pub mod options;
pub mod stream;
pub mod tcp;
pub mod transport;
pub mod wire;

#[cfg(unix)]
pub mod ipc;

// Small prelude for downstream crates; kept minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::backoff::Backoff;
    pub use crate::endpoint::{Endpoint, EndpointError};
    pub use crate::error::{Error, Result};
    pub use crate::inproc::InprocTransport;
    pub use crate::message::Message;
    pub use crate::options::{LinkConfig, SocketOptions};
    pub use crate::tcp::TcpTransport;
    pub use crate::transport::{Conn, Listener, Transport};

    #[cfg(unix)]
    pub use crate::ipc::IpcTransport;
}

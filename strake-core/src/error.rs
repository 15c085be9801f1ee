/// Strake Error Types
///
/// The error vocabulary shared by sockets, pipes, devices and transports.
use std::io;
use thiserror::Error;

/// Main error type for Strake operations
#[derive(Error, Debug)]
pub enum Error {
    /// Operation attempted on (or after) a closed socket or pipe
    #[error("object closed")]
    Closed,

    /// Blocking call exceeded its deadline
    #[error("operation timed out")]
    Timeout,

    /// Peer protocol is not compatible with this socket's protocol
    #[error("incompatible peer protocol")]
    BadProto,

    /// Listen address is already bound
    #[error("address in use")]
    AddrInUse,

    /// Address could not be parsed or no transport handles its scheme
    #[error("invalid address: {0}")]
    AddrInvalid(String),

    /// Operation is not defined for this protocol (e.g. send on SUB)
    #[error("operation not supported by this protocol")]
    NotSupported,

    /// Underlying connection failure
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),
}

/// Result type alias for Strake operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map an I/O error onto the closest Strake error kind.
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::AddrInUse => Self::AddrInUse,
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::InvalidInput => Self::AddrInvalid(err.to_string()),
            _ => Self::Transport(err),
        }
    }

    /// True for [`Error::Closed`].
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// True for [`Error::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

//! Pipe bookkeeping: the socket's view of one physical connection.
//!
//! A pipe is a transport [`Conn`] plus a stable identity. The hub owns the
//! outbound channel end; a small detached pump forwards inbound frames
//! onto the hub's event queue and reports the pipe's death. Dropping the
//! hub-side handle is what closes a pipe: the transport's write pump
//! drains and exits, and the halt channel stops the inbound pump without
//! waiting for the peer.

use bytes::Bytes;
use futures::{select, FutureExt};
use tracing::trace;

/// Stable pipe identity, assigned by the socket at attach time.
///
/// Ids are 31-bit (high bit clear) so that a pipe id chunk in a backtrace
/// can never be mistaken for a correlation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(pub u32);

impl PipeId {
    /// Big-endian encoding used in backtrace headers.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Decode from a backtrace chunk.
    #[must_use]
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}

impl std::fmt::Display for PipeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events flowing into the hub from accept loops, dial loops and pipes.
pub(crate) enum PipeEvent {
    /// A transport produced a connection; the hub assigns an id and offers
    /// it to the protocol. `death` is the dial loop's redial trigger.
    Attached {
        conn: strake_core::transport::Conn,
        death: Option<flume::Sender<()>>,
    },
    /// One whole inbound frame from a live pipe.
    Inbound { pipe: PipeId, frame: Bytes },
    /// The pipe's connection is gone.
    Down { pipe: PipeId },
}

/// Hub-side handle to a live pipe. Dropping it closes the pipe.
pub(crate) struct PipeHandle {
    /// Outbound wire frames toward the transport write pump.
    pub tx: flume::Sender<Bytes>,
    /// Held for a dialed pipe; dropping it wakes the dial loop to redial.
    pub _death: Option<flume::Sender<()>>,
    /// Dropping this halts the inbound pump immediately.
    pub _halt: flume::Sender<()>,
}

/// Forward inbound frames from a pipe's connection onto the hub queue.
///
/// Ends when the connection dies (reports `Down`), when the hub drops the
/// pipe handle (halt fires; the hub already forgot the pipe, so no event),
/// or when the hub itself is gone.
pub(crate) async fn inbound_pump(
    pipe: PipeId,
    rx: flume::Receiver<Bytes>,
    events: flume::Sender<PipeEvent>,
    halt: flume::Receiver<()>,
) {
    loop {
        select! {
            _ = halt.recv_async().fuse() => return,
            frame = rx.recv_async().fuse() => match frame {
                Ok(frame) => {
                    if events.send_async(PipeEvent::Inbound { pipe, frame }).await.is_err() {
                        return;
                    }
                }
                Err(_) => break,
            },
        }
    }
    trace!("[pipe] {pipe} connection lost");
    let _ = events.send(PipeEvent::Down { pipe });
}

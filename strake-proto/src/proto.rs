//! The protocol contract: sans-IO state machines driven by the socket hub.
//!
//! A protocol never touches a pipe directly. The hub feeds it attach and
//! detach notifications and inbound messages, and asks it to plan outbound
//! routing; the protocol answers with a [`SendPlan`]. All protocol state
//! therefore lives on one task and needs no locking.
//!
//! Routing metadata rides in a message's header as a *backtrace*: a run of
//! 4-byte chunks, pipe ids (high bit clear) pushed by intermediate hops,
//! terminated by the correlation tag (high bit set) stamped by the
//! requesting endpoint. Replies carry the same bytes back, and each hop
//! pops its own pipe id to retrace the path.

use crate::pipe::PipeId;
use crate::socket::SocketOption;
use smallvec::SmallVec;
use std::fmt;
use strake_core::error::{Error, Result};
use strake_core::message::Message;

/// Scalability-protocol number, also announced in the SP handshake.
///
/// Numbering is `family * 16 + index`, matching the SP convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolId(pub u16);

impl ProtocolId {
    pub const PAIR: Self = Self(16);
    pub const PUB: Self = Self(32);
    pub const SUB: Self = Self(33);
    pub const REQ: Self = Self(48);
    pub const REP: Self = Self(49);
    pub const PUSH: Self = Self(80);
    pub const PULL: Self = Self(81);
    pub const SURVEYOR: Self = Self(98);
    pub const RESPONDENT: Self = Self(99);
    pub const BUS: Self = Self(112);

    /// The raw SP number.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the hub should move one outbound message.
#[derive(Debug)]
pub enum SendPlan {
    /// Deliver to this pipe; if it is gone, ask the protocol to replan.
    Unicast(PipeId, Message),
    /// Deliver to this pipe; if it is gone, drop silently (reply paths).
    UnicastOrDrop(PipeId, Message),
    /// Clone the frame to every listed pipe; dead pipes are skipped.
    Broadcast(SmallVec<[PipeId; 4]>, Message),
    /// No eligible pipe right now; park until one attaches.
    Queue(Message),
    /// Swallow the message and report success.
    Discard,
}

/// One scalability-protocol state machine, bound to a socket for life.
///
/// The hub serializes every call, so implementations are plain mutable
/// state. `remove_pipe` may be called for ids the protocol never fully
/// registered (attach racing a close) and must tolerate them.
pub trait Protocol: Send {
    /// This protocol's SP number.
    fn number(&self) -> ProtocolId;

    /// The SP number the peer must announce.
    fn peer_number(&self) -> ProtocolId;

    /// Short lowercase name for diagnostics (`"pair"`, `"req"`, ...).
    fn name(&self) -> &'static str;

    /// Whether user code may send on this protocol.
    fn can_send(&self) -> bool {
        true
    }

    /// Whether user code may receive on this protocol.
    fn can_recv(&self) -> bool {
        true
    }

    /// Offer a freshly attached pipe. Returning `false` rejects it and the
    /// hub closes the connection immediately.
    fn add_pipe(&mut self, pipe: PipeId) -> bool;

    /// A pipe detached (remote close, transport failure, or local close).
    fn remove_pipe(&mut self, pipe: PipeId);

    /// Plan one outbound message. Called exactly once per logical send;
    /// this is where correlation tags are stamped and state advances.
    fn prep_send(&mut self, msg: Message, raw: bool) -> SendPlan;

    /// Re-route a message whose planned pipe died, or one coming off the
    /// pending queue. Must not stamp anything again.
    fn replan_send(&mut self, msg: Message, raw: bool) -> SendPlan;

    /// Judge one inbound message. `None` drops it silently (filtering,
    /// stale correlation tags); `Some` surfaces it to the receiver.
    fn accept_recv(&mut self, from: PipeId, msg: Message, raw: bool) -> Option<Message>;

    /// Apply a protocol-level option (subscriptions). Everything else is
    /// handled by the socket and never reaches the protocol.
    fn set_option(&mut self, option: &SocketOption) -> Result<()> {
        let _ = option;
        Err(Error::NotSupported)
    }
}

/// Length of one backtrace chunk / correlation tag.
pub(crate) const TAG_LEN: usize = 4;

/// High bit distinguishes a correlation tag from a pipe id chunk.
pub(crate) const TAG_FLAG: u32 = 0x8000_0000;

/// Move the backtrace off the body front into the header: pipe-id chunks
/// up to and including the terminating tag chunk. Returns `false` (caller
/// drops the message) if the body runs out first.
pub(crate) fn strip_backtrace(msg: &mut Message) -> bool {
    loop {
        let Some(chunk) = msg.take_body_front(TAG_LEN) else {
            return false;
        };
        let terminal = chunk[0] & 0x80 != 0;
        msg.append_header(&chunk);
        if terminal {
            return true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_backtrace_stops_at_tag() {
        let mut msg = Message::new();
        // pipe id 5, pipe id 9, tag, then payload
        msg.append_body(&5u32.to_be_bytes());
        msg.append_body(&9u32.to_be_bytes());
        msg.append_body(&(TAG_FLAG | 77).to_be_bytes());
        msg.append_body(b"payload");

        assert!(strip_backtrace(&mut msg));
        assert_eq!(msg.body(), b"payload");
        assert_eq!(msg.header().len(), 12);
        assert_eq!(&msg.header()[8..], (TAG_FLAG | 77).to_be_bytes());
    }

    #[test]
    fn test_strip_backtrace_truncated_body() {
        let mut msg = Message::from_body(&[0u8, 0, 1]); // not even one chunk
        assert!(!strip_backtrace(&mut msg));

        let mut msg = Message::new();
        msg.append_body(&5u32.to_be_bytes()); // pipe id but no tag
        assert!(!strip_backtrace(&mut msg));
    }
}

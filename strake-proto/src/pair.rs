//! PAIR protocol.
//!
//! Strict 1:1 peering: exactly one pipe at a time. A second connection
//! arriving while the first is live is rejected (and closed) without
//! disturbing the existing peer; there is no implicit failover — when the
//! peer drops, the socket simply has zero pipes until a new one attaches.

use crate::pipe::PipeId;
use crate::proto::{Protocol, ProtocolId, SendPlan};
use crate::socket::Socket;
use strake_core::error::Result;
use strake_core::message::Message;
use strake_core::options::SocketOptions;
use tracing::debug;

/// PAIR state machine: the single active peer, or none.
#[derive(Debug, Default)]
pub(crate) struct Pair {
    peer: Option<PipeId>,
}

impl Protocol for Pair {
    fn number(&self) -> ProtocolId {
        ProtocolId::PAIR
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::PAIR
    }

    fn name(&self) -> &'static str {
        "pair"
    }

    fn add_pipe(&mut self, pipe: PipeId) -> bool {
        if self.peer.is_some() {
            debug!("[pair] rejecting pipe {pipe}, already paired");
            return false;
        }
        self.peer = Some(pipe);
        true
    }

    fn remove_pipe(&mut self, pipe: PipeId) {
        if self.peer == Some(pipe) {
            self.peer = None;
        }
    }

    fn prep_send(&mut self, msg: Message, _raw: bool) -> SendPlan {
        match self.peer {
            Some(pipe) => SendPlan::Unicast(pipe, msg),
            None => SendPlan::Queue(msg),
        }
    }

    fn replan_send(&mut self, msg: Message, raw: bool) -> SendPlan {
        self.prep_send(msg, raw)
    }

    fn accept_recv(&mut self, _from: PipeId, msg: Message, _raw: bool) -> Option<Message> {
        Some(msg)
    }
}

/// Create a PAIR socket.
pub fn socket() -> Result<Socket> {
    Socket::new(Box::new(Pair::default()))
}

/// Create a PAIR socket with explicit options.
pub fn with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Pair::default()), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_peer_exclusivity() {
        let mut pair = Pair::default();
        assert!(pair.add_pipe(PipeId(1)));
        assert!(!pair.add_pipe(PipeId(2)));

        // Removing the rejected pipe must not evict the active one.
        pair.remove_pipe(PipeId(2));
        assert!(matches!(
            pair.prep_send(Message::from_body(b"x"), false),
            SendPlan::Unicast(PipeId(1), _)
        ));

        pair.remove_pipe(PipeId(1));
        assert!(matches!(
            pair.prep_send(Message::from_body(b"x"), false),
            SendPlan::Queue(_)
        ));

        // Slot is free again.
        assert!(pair.add_pipe(PipeId(3)));
    }

    #[test]
    fn test_recv_passthrough() {
        let mut pair = Pair::default();
        pair.add_pipe(PipeId(1));
        let msg = pair
            .accept_recv(PipeId(1), Message::from_body(b"hi"), false)
            .unwrap();
        assert_eq!(msg.body(), b"hi");
    }
}

//! PUB protocol.
//!
//! Send broadcasts to every attached pipe; with no subscribers the send
//! still succeeds (best-effort fan-out). Receiving is not part of the
//! pattern. Filtering happens on the SUB side.

use crate::pipe::PipeId;
use crate::proto::{Protocol, ProtocolId, SendPlan};
use crate::socket::Socket;
use smallvec::SmallVec;
use strake_core::error::Result;
use strake_core::message::Message;
use strake_core::options::SocketOptions;

#[derive(Debug, Default)]
pub(crate) struct Pub {
    pipes: SmallVec<[PipeId; 4]>,
}

impl Protocol for Pub {
    fn number(&self) -> ProtocolId {
        ProtocolId::PUB
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::SUB
    }

    fn name(&self) -> &'static str {
        "pub"
    }

    fn can_recv(&self) -> bool {
        false
    }

    fn add_pipe(&mut self, pipe: PipeId) -> bool {
        self.pipes.push(pipe);
        true
    }

    fn remove_pipe(&mut self, pipe: PipeId) {
        self.pipes.retain(|p| *p != pipe);
    }

    fn prep_send(&mut self, msg: Message, _raw: bool) -> SendPlan {
        SendPlan::Broadcast(self.pipes.clone(), msg)
    }

    fn replan_send(&mut self, msg: Message, raw: bool) -> SendPlan {
        self.prep_send(msg, raw)
    }

    fn accept_recv(&mut self, _from: PipeId, _msg: Message, _raw: bool) -> Option<Message> {
        None
    }
}

/// Create a PUB socket.
pub fn socket() -> Result<Socket> {
    Socket::new(Box::new(Pub::default()))
}

/// Create a PUB socket with explicit options.
pub fn with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Pub::default()), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcasts_to_all() {
        let mut p = Pub::default();
        p.add_pipe(PipeId(1));
        p.add_pipe(PipeId(2));
        p.add_pipe(PipeId(3));
        p.remove_pipe(PipeId(2));

        match p.prep_send(Message::from_body(b"tick"), false) {
            SendPlan::Broadcast(pipes, _) => {
                assert_eq!(pipes.as_slice(), &[PipeId(1), PipeId(3)]);
            }
            other => panic!("expected broadcast, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_fanout_is_fine() {
        let mut p = Pub::default();
        assert!(matches!(
            p.prep_send(Message::from_body(b"tick"), false),
            SendPlan::Broadcast(pipes, _) if pipes.is_empty()
        ));
        assert!(p.accept_recv(PipeId(1), Message::new(), false).is_none());
    }
}

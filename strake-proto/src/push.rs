//! PUSH protocol.
//!
//! One-way pipeline head: each message goes to exactly one downstream
//! peer, round-robin over the attached pipes, queuing while none are up.
//! Receiving is not part of the pattern.

use crate::pipe::PipeId;
use crate::proto::{Protocol, ProtocolId, SendPlan};
use crate::socket::Socket;
use strake_core::error::Result;
use strake_core::message::Message;
use strake_core::options::SocketOptions;

#[derive(Debug, Default)]
pub(crate) struct Push {
    pipes: Vec<PipeId>,
    cursor: usize,
}

impl Push {
    fn pick_pipe(&mut self) -> Option<PipeId> {
        if self.pipes.is_empty() {
            return None;
        }
        let idx = self.cursor % self.pipes.len();
        self.cursor = self.cursor.wrapping_add(1);
        Some(self.pipes[idx])
    }
}

impl Protocol for Push {
    fn number(&self) -> ProtocolId {
        ProtocolId::PUSH
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::PULL
    }

    fn name(&self) -> &'static str {
        "push"
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
        match self.pick_pipe() {
            Some(pipe) => SendPlan::Unicast(pipe, msg),
            None => SendPlan::Queue(msg),
        }
    }

    fn replan_send(&mut self, msg: Message, raw: bool) -> SendPlan {
        self.prep_send(msg, raw)
    }

    fn accept_recv(&mut self, _from: PipeId, _msg: Message, _raw: bool) -> Option<Message> {
        None
    }
}

/// Create a PUSH socket.
pub fn socket() -> Result<Socket> {
    Socket::new(Box::new(Push::default()))
}

/// Create a PUSH socket with explicit options.
pub fn with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Push::default()), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_and_queue() {
        let mut push = Push::default();
        assert!(matches!(
            push.prep_send(Message::new(), false),
            SendPlan::Queue(_)
        ));

        push.add_pipe(PipeId(1));
        push.add_pipe(PipeId(2));
        let mut seen = Vec::new();
        for _ in 0..4 {
            match push.prep_send(Message::new(), false) {
                SendPlan::Unicast(p, _) => seen.push(p),
                other => panic!("expected unicast, got {other:?}"),
            }
        }
        assert_eq!(seen, vec![PipeId(1), PipeId(2), PipeId(1), PipeId(2)]);

        // Survives churn: removing a pipe narrows the rotation.
        push.remove_pipe(PipeId(1));
        assert!(matches!(
            push.prep_send(Message::new(), false),
            SendPlan::Unicast(PipeId(2), _)
        ));
    }
}

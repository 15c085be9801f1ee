//! PULL protocol.
//!
//! One-way pipeline tail: receives from any attached upstream pipe,
//! sending is not part of the pattern.

use crate::pipe::PipeId;
use crate::proto::{Protocol, ProtocolId, SendPlan};
use crate::socket::Socket;
use strake_core::error::Result;
use strake_core::message::Message;
use strake_core::options::SocketOptions;

#[derive(Debug, Default)]
pub(crate) struct Pull;

impl Protocol for Pull {
    fn number(&self) -> ProtocolId {
        ProtocolId::PULL
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::PUSH
    }

    fn name(&self) -> &'static str {
        "pull"
    }

    fn can_send(&self) -> bool {
        false
    }

    fn add_pipe(&mut self, _pipe: PipeId) -> bool {
        true
    }

    fn remove_pipe(&mut self, _pipe: PipeId) {}

    fn prep_send(&mut self, _msg: Message, _raw: bool) -> SendPlan {
        SendPlan::Discard
    }

    fn replan_send(&mut self, _msg: Message, _raw: bool) -> SendPlan {
        SendPlan::Discard
    }

    fn accept_recv(&mut self, _from: PipeId, msg: Message, _raw: bool) -> Option<Message> {
        Some(msg)
    }
}

/// Create a PULL socket.
pub fn socket() -> Result<Socket> {
    Socket::new(Box::new(Pull))
}

/// Create a PULL socket with explicit options.
pub fn with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Pull), options)
}

//! BUS protocol.
//!
//! Every peer talks to every peer: send broadcasts to all attached pipes,
//! recv accepts from any of them. In raw mode the origin pipe id rides in
//! the header so that a device re-broadcasting a message can exclude the
//! pipe it arrived on — without that, a bus bridged through a device would
//! echo every message straight back to its sender.

use crate::pipe::PipeId;
use crate::proto::{Protocol, ProtocolId, SendPlan, TAG_LEN};
use crate::socket::Socket;
use smallvec::SmallVec;
use strake_core::error::Result;
use strake_core::message::Message;
use strake_core::options::SocketOptions;

#[derive(Debug, Default)]
pub(crate) struct Bus {
    pipes: SmallVec<[PipeId; 4]>,
}

impl Bus {
    fn everyone_except(&self, skip: Option<PipeId>) -> SmallVec<[PipeId; 4]> {
        self.pipes
            .iter()
            .copied()
            .filter(|p| Some(*p) != skip)
            .collect()
    }
}

impl Protocol for Bus {
    fn number(&self) -> ProtocolId {
        ProtocolId::BUS
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::BUS
    }

    fn name(&self) -> &'static str {
        "bus"
    }

    fn add_pipe(&mut self, pipe: PipeId) -> bool {
        self.pipes.push(pipe);
        true
    }

    fn remove_pipe(&mut self, pipe: PipeId) {
        self.pipes.retain(|p| *p != pipe);
    }

    fn prep_send(&mut self, mut msg: Message, raw: bool) -> SendPlan {
        let skip = if raw {
            msg.take_header_front(TAG_LEN)
                .map(|b| PipeId::from_be_bytes([b[0], b[1], b[2], b[3]]))
        } else {
            None
        };
        SendPlan::Broadcast(self.everyone_except(skip), msg)
    }

    fn replan_send(&mut self, msg: Message, _raw: bool) -> SendPlan {
        SendPlan::Broadcast(self.everyone_except(None), msg)
    }

    fn accept_recv(&mut self, from: PipeId, mut msg: Message, raw: bool) -> Option<Message> {
        if raw {
            msg.prepend_header(&from.to_be_bytes());
        }
        Some(msg)
    }
}

/// Create a BUS socket.
pub fn socket() -> Result<Socket> {
    Socket::new(Box::new(Bus::default()))
}

/// Create a BUS socket with explicit options.
pub fn with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Bus::default()), options)
}

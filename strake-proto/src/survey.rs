//! SURVEYOR / RESPONDENT protocols.
//!
//! A surveyor broadcasts a question stamped with a survey tag and then
//! collects any number of responses carrying that tag, until a new survey
//! supersedes it — responses to an old survey are dropped on arrival. A
//! respondent behaves like REP with a different peer: it answers the
//! survey it last received, retracing the backtrace.

use crate::pipe::PipeId;
use crate::proto::{strip_backtrace, Protocol, ProtocolId, SendPlan, TAG_FLAG, TAG_LEN};
use crate::socket::Socket;
use bytes::Bytes;
use smallvec::SmallVec;
use strake_core::error::Result;
use strake_core::message::Message;
use strake_core::options::SocketOptions;
use tracing::debug;

pub(crate) struct Surveyor {
    pipes: SmallVec<[PipeId; 4]>,
    next_tag: u32,
    /// Tag of the survey currently collecting responses.
    active: Option<u32>,
}

impl Surveyor {
    pub(crate) fn new() -> Self {
        Self {
            pipes: SmallVec::new(),
            next_tag: rand::random::<u32>(),
            active: None,
        }
    }
}

impl Protocol for Surveyor {
    fn number(&self) -> ProtocolId {
        ProtocolId::SURVEYOR
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::RESPONDENT
    }

    fn name(&self) -> &'static str {
        "surveyor"
    }

    fn add_pipe(&mut self, pipe: PipeId) -> bool {
        self.pipes.push(pipe);
        true
    }

    fn remove_pipe(&mut self, pipe: PipeId) {
        self.pipes.retain(|p| *p != pipe);
    }

    fn prep_send(&mut self, mut msg: Message, raw: bool) -> SendPlan {
        if !raw {
            let tag = self.next_tag | TAG_FLAG;
            self.next_tag = self.next_tag.wrapping_add(1);
            self.active = Some(tag);
            msg.clear_header();
            msg.append_header(&tag.to_be_bytes());
        }
        SendPlan::Broadcast(self.pipes.clone(), msg)
    }

    fn replan_send(&mut self, msg: Message, _raw: bool) -> SendPlan {
        SendPlan::Broadcast(self.pipes.clone(), msg)
    }

    fn accept_recv(&mut self, _from: PipeId, mut msg: Message, raw: bool) -> Option<Message> {
        if raw {
            return strip_backtrace(&mut msg).then_some(msg);
        }

        let tag_bytes = msg.take_body_front(TAG_LEN)?;
        let tag = u32::from_be_bytes([tag_bytes[0], tag_bytes[1], tag_bytes[2], tag_bytes[3]]);
        if self.active != Some(tag) {
            debug!("[surveyor] dropping response to superseded survey");
            return None;
        }
        Some(msg)
    }
}

/// Respondent state: the reply path of the survey being answered.
#[derive(Debug, Default)]
pub(crate) struct Respondent {
    pending_reply: Option<(PipeId, Bytes)>,
}

impl Protocol for Respondent {
    fn number(&self) -> ProtocolId {
        ProtocolId::RESPONDENT
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::SURVEYOR
    }

    fn name(&self) -> &'static str {
        "respondent"
    }

    fn add_pipe(&mut self, _pipe: PipeId) -> bool {
        true
    }

    fn remove_pipe(&mut self, _pipe: PipeId) {}

    fn prep_send(&mut self, mut msg: Message, raw: bool) -> SendPlan {
        if raw {
            let Some(id_bytes) = msg.take_header_front(TAG_LEN) else {
                return SendPlan::Discard;
            };
            let pipe =
                PipeId::from_be_bytes([id_bytes[0], id_bytes[1], id_bytes[2], id_bytes[3]]);
            return SendPlan::UnicastOrDrop(pipe, msg);
        }

        let Some((pipe, backtrace)) = self.pending_reply.take() else {
            debug!("[respondent] send with no survey outstanding, discarding");
            return SendPlan::Discard;
        };
        msg.clear_header();
        msg.append_header(&backtrace);
        SendPlan::UnicastOrDrop(pipe, msg)
    }

    fn replan_send(&mut self, _msg: Message, _raw: bool) -> SendPlan {
        SendPlan::Discard
    }

    fn accept_recv(&mut self, from: PipeId, mut msg: Message, raw: bool) -> Option<Message> {
        if !strip_backtrace(&mut msg) {
            return None;
        }
        if raw {
            msg.prepend_header(&from.to_be_bytes());
            return Some(msg);
        }
        self.pending_reply = Some((from, Bytes::copy_from_slice(msg.header())));
        msg.clear_header();
        Some(msg)
    }
}

/// Create a SURVEYOR socket.
pub fn surveyor() -> Result<Socket> {
    Socket::new(Box::new(Surveyor::new()))
}

/// Create a SURVEYOR socket with explicit options.
pub fn surveyor_with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Surveyor::new()), options)
}

/// Create a RESPONDENT socket.
pub fn respondent() -> Result<Socket> {
    Socket::new(Box::new(Respondent::default()))
}

/// Create a RESPONDENT socket with explicit options.
pub fn respondent_with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Respondent::default()), options)
}

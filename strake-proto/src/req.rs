//! REQ protocol.
//!
//! Each request is stamped with a fresh correlation tag (a u32 with the
//! high bit set, seeded randomly so restarts do not collide) and routed to
//! one peer, round-robin over the attached pipes. At most one request is
//! outstanding; a new send supersedes the previous wait. On receive, a
//! reply is surfaced only if its tag matches the outstanding request —
//! late or duplicate replies are dropped and the caller keeps waiting.

use crate::pipe::PipeId;
use crate::proto::{strip_backtrace, Protocol, ProtocolId, SendPlan, TAG_FLAG, TAG_LEN};
use crate::socket::Socket;
use strake_core::error::Result;
use strake_core::message::Message;
use strake_core::options::SocketOptions;
use tracing::debug;

pub(crate) struct Req {
    pipes: Vec<PipeId>,
    cursor: usize,
    next_tag: u32,
    outstanding: Option<u32>,
}

impl Req {
    pub(crate) fn new() -> Self {
        Self {
            pipes: Vec::new(),
            cursor: 0,
            next_tag: rand::random::<u32>(),
            outstanding: None,
        }
    }

    fn next_request_tag(&mut self) -> u32 {
        let tag = self.next_tag | TAG_FLAG;
        self.next_tag = self.next_tag.wrapping_add(1);
        tag
    }

    fn pick_pipe(&mut self) -> Option<PipeId> {
        if self.pipes.is_empty() {
            return None;
        }
        let idx = self.cursor % self.pipes.len();
        self.cursor = self.cursor.wrapping_add(1);
        Some(self.pipes[idx])
    }

    fn route(&mut self, msg: Message) -> SendPlan {
        match self.pick_pipe() {
            Some(pipe) => SendPlan::Unicast(pipe, msg),
            None => SendPlan::Queue(msg),
        }
    }
}

impl Protocol for Req {
    fn number(&self) -> ProtocolId {
        ProtocolId::REQ
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::REP
    }

    fn name(&self) -> &'static str {
        "req"
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
            let tag = self.next_request_tag();
            self.outstanding = Some(tag);
            msg.clear_header();
            msg.append_header(&tag.to_be_bytes());
        }
        // Raw mode: a device leg forwards the header (the accumulated
        // backtrace) exactly as it stands.
        self.route(msg)
    }

    fn replan_send(&mut self, msg: Message, _raw: bool) -> SendPlan {
        self.route(msg)
    }

    fn accept_recv(&mut self, _from: PipeId, mut msg: Message, raw: bool) -> Option<Message> {
        if raw {
            // Move the reply's backtrace into the header so the device can
            // hand it to its other leg intact.
            return strip_backtrace(&mut msg).then_some(msg);
        }

        let tag_bytes = msg.take_body_front(TAG_LEN)?;
        let tag = u32::from_be_bytes([tag_bytes[0], tag_bytes[1], tag_bytes[2], tag_bytes[3]]);
        if self.outstanding != Some(tag) {
            debug!("[req] dropping reply with stale tag {tag:#010x}");
            return None;
        }
        self.outstanding = None;
        Some(msg)
    }
}

/// Create a REQ socket.
pub fn socket() -> Result<Socket> {
    Socket::new(Box::new(Req::new()))
}

/// Create a REQ socket with explicit options.
pub fn with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Req::new()), options)
}

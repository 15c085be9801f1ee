//! REP protocol.
//!
//! Receive strips the request's backtrace off the body and remembers it
//! together with the originating pipe; the next send re-attaches exactly
//! those bytes and unicasts back to that pipe, so the reply retraces the
//! request's path byte-for-byte. A reply whose path has since died is
//! dropped, never rerouted.
//!
//! In raw mode (device legs) the saved state moves into the message
//! itself: recv prepends the local pipe id to the relocated backtrace, and
//! send pops it back off to pick the return pipe. That is the entire
//! mechanism by which a reply finds its way back through a device chain.

use crate::pipe::PipeId;
use crate::proto::{strip_backtrace, Protocol, ProtocolId, SendPlan, TAG_LEN};
use crate::socket::Socket;
use bytes::Bytes;
use strake_core::error::Result;
use strake_core::message::Message;
use strake_core::options::SocketOptions;
use tracing::debug;

#[derive(Debug, Default)]
pub(crate) struct Rep {
    /// Origin pipe and backtrace of the request being serviced.
    pending_reply: Option<(PipeId, Bytes)>,
}

impl Protocol for Rep {
    fn number(&self) -> ProtocolId {
        ProtocolId::REP
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::REQ
    }

    fn name(&self) -> &'static str {
        "rep"
    }

    fn add_pipe(&mut self, _pipe: PipeId) -> bool {
        true
    }

    fn remove_pipe(&mut self, _pipe: PipeId) {
        // The saved reply path may now point at a dead pipe; send resolves
        // that as a silent drop.
    }

    fn prep_send(&mut self, mut msg: Message, raw: bool) -> SendPlan {
        if raw {
            let Some(id_bytes) = msg.take_header_front(TAG_LEN) else {
                debug!("[rep] raw send without return pipe id, discarding");
                return SendPlan::Discard;
            };
            let pipe =
                PipeId::from_be_bytes([id_bytes[0], id_bytes[1], id_bytes[2], id_bytes[3]]);
            return SendPlan::UnicastOrDrop(pipe, msg);
        }

        let Some((pipe, backtrace)) = self.pending_reply.take() else {
            debug!("[rep] send with no request outstanding, discarding");
            return SendPlan::Discard;
        };
        msg.clear_header();
        msg.append_header(&backtrace);
        SendPlan::UnicastOrDrop(pipe, msg)
    }

    fn replan_send(&mut self, _msg: Message, _raw: bool) -> SendPlan {
        // Replies are never queued or rerouted; if the path died, the
        // reply dies with it.
        SendPlan::Discard
    }

    fn accept_recv(&mut self, from: PipeId, mut msg: Message, raw: bool) -> Option<Message> {
        if !strip_backtrace(&mut msg) {
            debug!("[rep] request from {from} with malformed backtrace, dropping");
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

/// Create a REP socket.
pub fn socket() -> Result<Socket> {
    Socket::new(Box::new(Rep::default()))
}

/// Create a REP socket with explicit options.
pub fn with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Rep::default()), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::TAG_FLAG;

    fn request_wire(tag: u32, payload: &[u8]) -> Message {
        let mut msg = Message::new();
        msg.append_body(&tag.to_be_bytes());
        msg.append_body(payload);
        msg
    }

    #[test]
    fn test_reply_retraces_request() {
        let mut rep = Rep::default();
        rep.add_pipe(PipeId(4));

        let tag = TAG_FLAG | 42;
        let req = rep
            .accept_recv(PipeId(4), request_wire(tag, b"question"), false)
            .unwrap();
        assert_eq!(req.body(), b"question");
        assert!(req.header().is_empty());

        match rep.prep_send(Message::from_body(b"answer"), false) {
            SendPlan::UnicastOrDrop(pipe, msg) => {
                assert_eq!(pipe, PipeId(4));
                assert_eq!(msg.header(), tag.to_be_bytes());
                assert_eq!(msg.body(), b"answer");
            }
            other => panic!("expected unicast-or-drop, got {other:?}"),
        }

        // The reply consumed the saved path; a second send has nowhere to go.
        assert!(matches!(
            rep.prep_send(Message::from_body(b"again"), false),
            SendPlan::Discard
        ));
    }

    #[test]
    fn test_malformed_backtrace_dropped() {
        let mut rep = Rep::default();
        let msg = Message::from_body(b"ab"); // shorter than one chunk
        assert!(rep.accept_recv(PipeId(1), msg, false).is_none());
    }

    #[test]
    fn test_raw_mode_threads_pipe_id() {
        let mut rep = Rep::default();

        let tag = TAG_FLAG | 9;
        let msg = rep
            .accept_recv(PipeId(6), request_wire(tag, b"fwd"), true)
            .unwrap();
        // Header now carries [local pipe id][tag].
        assert_eq!(&msg.header()[..4], 6u32.to_be_bytes());
        assert_eq!(&msg.header()[4..], tag.to_be_bytes());

        // Raw send pops the pipe id back off and routes there.
        match rep.prep_send(msg, true) {
            SendPlan::UnicastOrDrop(pipe, out) => {
                assert_eq!(pipe, PipeId(6));
                assert_eq!(out.header(), tag.to_be_bytes());
                assert_eq!(out.body(), b"fwd");
            }
            other => panic!("expected unicast-or-drop, got {other:?}"),
        }
    }
}

//! SUB protocol.
//!
//! Delivery is gated by a set of topic prefixes: an inbound message
//! surfaces only if its body starts with at least one subscribed prefix,
//! evaluated against the full current set. No match means silent drop, and
//! an empty set matches nothing — a fresh SUB socket is deaf until its
//! first subscription. Sending is not part of the pattern.

use crate::pipe::PipeId;
use crate::proto::{Protocol, ProtocolId, SendPlan};
use crate::socket::{Socket, SocketOption};
use bytes::Bytes;
use strake_core::error::{Error, Result};
use strake_core::message::Message;
use strake_core::options::SocketOptions;
use tracing::trace;

#[derive(Debug, Default)]
pub(crate) struct Sub {
    topics: Vec<Bytes>,
}

impl Sub {
    fn matches(&self, body: &[u8]) -> bool {
        self.topics
            .iter()
            .any(|t| body.len() >= t.len() && &body[..t.len()] == &t[..])
    }
}

impl Protocol for Sub {
    fn number(&self) -> ProtocolId {
        ProtocolId::SUB
    }

    fn peer_number(&self) -> ProtocolId {
        ProtocolId::PUB
    }

    fn name(&self) -> &'static str {
        "sub"
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

    fn accept_recv(&mut self, _from: PipeId, msg: Message, raw: bool) -> Option<Message> {
        // Raw mode forwards everything; filtering is an end-socket concern.
        if raw || self.matches(msg.body()) {
            return Some(msg);
        }
        trace!("[sub] no matching topic, dropping");
        None
    }

    fn set_option(&mut self, option: &SocketOption) -> Result<()> {
        match option {
            SocketOption::Subscribe(topic) => {
                if !self.topics.contains(topic) {
                    self.topics.push(topic.clone());
                }
                Ok(())
            }
            SocketOption::Unsubscribe(topic) => {
                self.topics.retain(|t| t != topic);
                Ok(())
            }
            _ => Err(Error::NotSupported),
        }
    }
}

/// Create a SUB socket.
pub fn socket() -> Result<Socket> {
    Socket::new(Box::new(Sub::default()))
}

/// Create a SUB socket with explicit options.
pub fn with_options(options: SocketOptions) -> Result<Socket> {
    Socket::with_options(Box::new(Sub::default()), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribe(sub: &mut Sub, topic: &[u8]) {
        sub.set_option(&SocketOption::Subscribe(Bytes::copy_from_slice(topic)))
            .unwrap();
    }

    #[test]
    fn test_no_subscriptions_drops_everything() {
        let mut sub = Sub::default();
        assert!(sub
            .accept_recv(PipeId(1), Message::from_body(b"anything"), false)
            .is_none());
    }

    #[test]
    fn test_prefix_filtering() {
        let mut sub = Sub::default();
        subscribe(&mut sub, b"weather/");
        subscribe(&mut sub, b"news");

        assert!(sub
            .accept_recv(PipeId(1), Message::from_body(b"weather/oslo 3C"), false)
            .is_some());
        assert!(sub
            .accept_recv(PipeId(1), Message::from_body(b"newsflash"), false)
            .is_some());
        assert!(sub
            .accept_recv(PipeId(1), Message::from_body(b"sports/score"), false)
            .is_none());
        // Shorter than the prefix cannot match it.
        assert!(sub
            .accept_recv(PipeId(1), Message::from_body(b"new"), false)
            .is_none());
    }

    #[test]
    fn test_empty_prefix_matches_all() {
        let mut sub = Sub::default();
        subscribe(&mut sub, b"");
        assert!(sub
            .accept_recv(PipeId(1), Message::from_body(b"whatever"), false)
            .is_some());
    }

    #[test]
    fn test_unsubscribe() {
        let mut sub = Sub::default();
        subscribe(&mut sub, b"a");
        sub.set_option(&SocketOption::Unsubscribe(Bytes::from_static(b"a")))
            .unwrap();
        assert!(sub
            .accept_recv(PipeId(1), Message::from_body(b"abc"), false)
            .is_none());
    }

    #[test]
    fn test_raw_bypasses_filter() {
        let mut sub = Sub::default();
        assert!(sub
            .accept_recv(PipeId(1), Message::from_body(b"unfiltered"), true)
            .is_some());
    }
}

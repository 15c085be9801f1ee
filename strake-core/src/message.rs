//! Message container with separate header and body regions.
//!
//! A [`Message`] carries an opaque payload (`body`) plus a routing header
//! (`header`) that protocols use for correlation tags and backtraces. The
//! two regions grow independently: header edits never disturb body bytes
//! and vice versa.
//!
//! On the wire a message travels as a single frame, header first. The
//! receiving side cannot know where the header ended, so [`Message::from_wire`]
//! places everything in the body and leaves the header empty — protocols
//! that care move their routing bytes back out of the body front.

use bytes::{Bytes, BytesMut};

/// A discrete message exchanged between sockets.
///
/// # Examples
///
/// ```
/// use strake_core::message::Message;
///
/// let mut msg = Message::from_body(b"hello");
/// msg.prepend_header(&[0x80, 0, 0, 1]);
/// assert_eq!(msg.body(), b"hello");
/// assert_eq!(msg.header().len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    header: BytesMut,
    body: BytesMut,
}

impl Message {
    /// Create an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message with pre-reserved body capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            header: BytesMut::new(),
            body: BytesMut::with_capacity(capacity),
        }
    }

    /// Create a message whose body is a copy of `body` and whose header is empty.
    #[must_use]
    pub fn from_body(body: impl AsRef<[u8]>) -> Self {
        Self {
            header: BytesMut::new(),
            body: BytesMut::from(body.as_ref()),
        }
    }

    /// Reconstruct a message from a wire frame.
    ///
    /// Everything lands in the body; receivers that stamped routing bytes
    /// into the header on the sending side strip them back off the body
    /// front themselves.
    #[must_use]
    pub fn from_wire(frame: Bytes) -> Self {
        Self {
            header: BytesMut::new(),
            body: BytesMut::from(&frame[..]),
        }
    }

    /// Flatten into a single wire frame: header bytes followed by body bytes.
    #[must_use]
    pub fn to_wire(&self) -> Bytes {
        if self.header.is_empty() {
            return Bytes::copy_from_slice(&self.body);
        }
        let mut frame = BytesMut::with_capacity(self.header.len() + self.body.len());
        frame.extend_from_slice(&self.header);
        frame.extend_from_slice(&self.body);
        frame.freeze()
    }

    /// Body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Header bytes.
    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Total length on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.header.len() + self.body.len()
    }

    /// True when both regions are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.body.is_empty()
    }

    /// Append bytes to the body.
    pub fn append_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// Prepend bytes to the body.
    pub fn prepend_body(&mut self, bytes: &[u8]) {
        prepend(&mut self.body, bytes);
    }

    /// Append bytes to the header.
    pub fn append_header(&mut self, bytes: &[u8]) {
        self.header.extend_from_slice(bytes);
    }

    /// Prepend bytes to the header.
    pub fn prepend_header(&mut self, bytes: &[u8]) {
        prepend(&mut self.header, bytes);
    }

    /// Discard all header bytes, leaving the body untouched.
    pub fn clear_header(&mut self) {
        self.header.clear();
    }

    /// Split `n` bytes off the front of the body.
    ///
    /// Returns `None` (body untouched) if fewer than `n` bytes remain.
    pub fn take_body_front(&mut self, n: usize) -> Option<Bytes> {
        if self.body.len() < n {
            return None;
        }
        Some(self.body.split_to(n).freeze())
    }

    /// Split `n` bytes off the front of the header.
    ///
    /// Returns `None` (header untouched) if fewer than `n` bytes remain.
    pub fn take_header_front(&mut self, n: usize) -> Option<Bytes> {
        if self.header.len() < n {
            return None;
        }
        Some(self.header.split_to(n).freeze())
    }
}

impl From<Vec<u8>> for Message {
    fn from(body: Vec<u8>) -> Self {
        Self::from_body(body)
    }
}

impl From<&[u8]> for Message {
    fn from(body: &[u8]) -> Self {
        Self::from_body(body)
    }
}

// BytesMut::extend_from_slice only grows at the tail, so prepending
// rebuilds the buffer. Headers are a handful of 4-byte chunks; this is
// not a hot path.
fn prepend(buf: &mut BytesMut, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    let mut next = BytesMut::with_capacity(bytes.len() + buf.len());
    next.extend_from_slice(bytes);
    next.extend_from_slice(buf);
    *buf = next;
}

//! Wire framing and the SP connection header.
//!
//! Stream transports (TCP, IPC) carry messages as length-delimited frames:
//! an 8-byte big-endian length followed by that many payload bytes. The
//! framing is what lets the receiver reconstruct exactly one message per
//! send, regardless of how the stream fragments.
//!
//! Immediately after connecting, both sides exchange an 8-byte SP header
//! announcing their protocol number; a peer announcing anything other than
//! the required peer protocol is cut before a single frame moves.

use bytes::{Bytes, BytesMut};
use std::io;

/// Length of the SP connection header.
pub const SP_HEADER_LEN: usize = 8;

/// Length prefix carried in front of every frame.
pub const FRAME_PREFIX_LEN: usize = 8;

/// Encode the SP connection header for a protocol number.
///
/// Layout: `\0` `S` `P` version(0) proto(u16 BE) reserved(2).
#[must_use]
pub fn sp_header(proto: u16) -> [u8; SP_HEADER_LEN] {
    let [hi, lo] = proto.to_be_bytes();
    [0, b'S', b'P', 0, hi, lo, 0, 0]
}

/// Parse a peer's SP connection header, returning its protocol number.
///
/// # Errors
///
/// Returns `InvalidData` if the signature or version bytes are wrong.
pub fn parse_sp_header(buf: &[u8]) -> io::Result<u16> {
    if buf.len() != SP_HEADER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "short SP header",
        ));
    }
    if buf[0] != 0 || buf[1] != b'S' || buf[2] != b'P' || buf[3] != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "bad SP header signature",
        ));
    }
    if buf[6] != 0 || buf[7] != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "nonzero SP header reserved bytes",
        ));
    }
    Ok(u16::from_be_bytes([buf[4], buf[5]]))
}

/// Prefix a frame with its length, ready for a stream write.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_PREFIX_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Incremental decoder turning a byte stream back into whole frames.
///
/// Feed raw reads in with [`FrameDecoder::extend`], then drain complete
/// frames with [`FrameDecoder::next_frame`] until it returns `Ok(None)`.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame: Option<usize>,
}

impl FrameDecoder {
    /// Create a decoder; frames longer than `max_frame` are rejected.
    #[must_use]
    pub fn new(max_frame: Option<usize>) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame,
        }
    }

    /// Buffer freshly read stream bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, if the buffer holds one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` when a frame announces a length beyond the
    /// configured cap; the connection carrying it cannot be resynchronized
    /// and must be dropped.
    pub fn next_frame(&mut self) -> io::Result<Option<Bytes>> {
        if self.buf.len() < FRAME_PREFIX_LEN {
            return Ok(None);
        }
        let mut prefix = [0u8; FRAME_PREFIX_LEN];
        prefix.copy_from_slice(&self.buf[..FRAME_PREFIX_LEN]);
        let len = u64::from_be_bytes(prefix);

        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame length overflow"))?;
        if let Some(max) = self.max_frame {
            if len > max {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame of {len} bytes exceeds cap of {max}"),
                ));
            }
        }
        let whole = len.checked_add(FRAME_PREFIX_LEN).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "frame length overflow")
        })?;
        if self.buf.len() < whole {
            self.buf.reserve(whole - self.buf.len());
            return Ok(None);
        }

        let _ = self.buf.split_to(FRAME_PREFIX_LEN);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sp_header_roundtrip() {
        let hdr = sp_header(49);
        assert_eq!(parse_sp_header(&hdr).unwrap(), 49);
    }

    #[test]
    fn test_sp_header_rejects_garbage() {
        assert!(parse_sp_header(b"ZMQ\x00\x00\x10\x00\x00").is_err());
        assert!(parse_sp_header(&[0, b'S', b'P', 0, 0, 16, 1, 0]).is_err());
        assert!(parse_sp_header(&[0, b'S', b'P']).is_err());
    }

    #[test]
    fn test_decode_single_frame() {
        let mut dec = FrameDecoder::new(None);
        dec.extend(&encode_frame(b"hello"));
        assert_eq!(&dec.next_frame().unwrap().unwrap()[..], b"hello");
        assert!(dec.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_decode_fragmented_frames() {
        let mut dec = FrameDecoder::new(None);
        let wire = [encode_frame(b"one"), encode_frame(b"two")].concat();

        // Feed one byte at a time; frames must come out whole and in order.
        let mut frames = Vec::new();
        for byte in wire {
            dec.extend(&[byte]);
            while let Some(frame) = dec.next_frame().unwrap() {
                frames.push(frame);
            }
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], b"one");
        assert_eq!(&frames[1][..], b"two");
    }

    #[test]
    fn test_decode_empty_frame() {
        let mut dec = FrameDecoder::new(None);
        dec.extend(&encode_frame(b""));
        assert_eq!(dec.next_frame().unwrap().unwrap().len(), 0);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut dec = FrameDecoder::new(Some(4));
        dec.extend(&encode_frame(b"too big"));
        assert!(dec.next_frame().is_err());
    }
}

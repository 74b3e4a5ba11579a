//! Frame codecs.
//!
//! Two framings carry the same JSON envelope:
//! - **length-prefixed**: `u32` big-endian body length, then the UTF-8 JSON
//!   body. Used over a raw TLS TCP stream, so reads arrive in arbitrary
//!   chunks and must be reassembled.
//! - **self-framed**: the transport already delimits messages (WebSocket), so
//!   each unit is parsed on its own.

use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::message::ProtoMessage;

/// Largest body length accepted by the length-prefixed decoder.
pub const MAX_FRAME_LEN: usize = 2_000_000;

const HEADER_LEN: usize = 4;

/// Which framing a deployment speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Length-prefixed JSON over TLS TCP.
    #[default]
    LengthPrefixed,
    /// JSON text messages over a TLS WebSocket.
    SelfFramed,
}

impl Framing {
    /// Port the remote API listens on for this framing.
    pub fn default_port(self) -> u16 {
        match self {
            Framing::LengthPrefixed => 5035,
            Framing::SelfFramed => 5036,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Framing::LengthPrefixed => "length_prefixed",
            Framing::SelfFramed => "self_framed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to serialize message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("encoded body of {0} bytes exceeds frame limit of {MAX_FRAME_LEN}")]
    Oversize(usize),
}

/// Serialize a message for a self-framed transport.
pub fn encode_text(msg: &ProtoMessage) -> Result<String, FrameError> {
    Ok(serde_json::to_string(msg)?)
}

/// Serialize a message and prepend its 4-byte big-endian length.
pub fn encode_length_prefixed(msg: &ProtoMessage) -> Result<Vec<u8>, FrameError> {
    let body = serde_json::to_vec(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(FrameError::Oversize(body.len()));
    }
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse one self-framed unit. Malformed units yield `None`.
pub fn decode_text(unit: &str) -> Option<ProtoMessage> {
    match serde_json::from_str(unit) {
        Ok(m) => Some(m),
        Err(e) => {
            debug!(error = %e, len = unit.len(), "dropping malformed message");
            None
        }
    }
}

/// Reassembles length-prefixed frames from an arbitrarily chunked stream.
///
/// A header announcing a zero or oversize body means the stream is out of
/// sync. There is no reliable way to find the next boundary, so the whole
/// buffer is dropped and decoding continues with whatever arrives next.
#[derive(Debug, Default)]
pub struct LengthPrefixedDecoder {
    buf: BytesMut,
    discarded_bytes: u64,
    dropped_bodies: u64,
}

impl LengthPrefixedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly read bytes; returns every message completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ProtoMessage> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while self.buf.len() >= HEADER_LEN {
            let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]])
                as usize;

            if len == 0 || len > MAX_FRAME_LEN {
                warn!(
                    announced_len = len,
                    buffered = self.buf.len(),
                    "frame length out of range; discarding buffered bytes"
                );
                self.discarded_bytes += self.buf.len() as u64;
                self.buf.clear();
                break;
            }

            if self.buf.len() < HEADER_LEN + len {
                break;
            }

            self.buf.advance(HEADER_LEN);
            let body = self.buf.split_to(len);
            match serde_json::from_slice::<ProtoMessage>(&body) {
                Ok(m) => out.push(m),
                Err(e) => {
                    self.dropped_bodies += 1;
                    debug!(error = %e, len, "dropping unparseable frame body");
                }
            }
        }
        out
    }

    /// Bytes currently held waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Total bytes thrown away after out-of-range length headers.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Complete frames whose body was not a valid message.
    pub fn dropped_bodies(&self) -> u64 {
        self.dropped_bodies
    }
}

//! ctb-wire: message model and frame codecs for the trading-platform API.
//!
//! This crate owns everything that is true about bytes on the wire and
//! nothing about sockets: the [`ProtoMessage`] envelope, the fixed
//! [`PayloadType`] catalogue, the two framing variants, and lenient field
//! accessors for the heterogeneous JSON the remote side returns.

pub mod codec;
pub mod fields;
pub mod message;
pub mod payload;

pub use codec::{
    decode_text, encode_length_prefixed, encode_text, Framing, FrameError, LengthPrefixedDecoder,
    MAX_FRAME_LEN,
};
pub use message::ProtoMessage;
pub use payload::PayloadType;

//! Codec module - conversion between application messages and payload bytes.
//!
//! A [`Codec`] turns user messages into framed payload bytes and back:
//!
//! - [`RawCodec`] - pass-through for raw bytes (zero-copy)
//! - [`MsgPackCodec`] - MessagePack over serde using `rmp-serde`
//! - [`JsonCodec`] - JSON over serde using `serde_json`
//!
//! Sessions are parameterised over their codec, so the message type flows
//! through `send` and the event callback with no downcasting.
//!
//! # Example
//!
//! ```
//! use wireline::codec::{Codec, MsgPackCodec};
//!
//! let codec: MsgPackCodec<String> = MsgPackCodec::new();
//! let msg = codec.encode(&"hello".to_string()).unwrap();
//! let decoded = codec.decode(msg.data()).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod json;
mod msgpack;
mod raw;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;
pub use raw::RawCodec;

use crate::error::Result;
use crate::message::Message;

/// Conversion between application messages and encoded payload bytes.
///
/// Both operations are pure with respect to the session.
pub trait Codec: Send + Sync + 'static {
    /// The application message type carried by the session.
    type Msg: Send + 'static;

    /// Encode a message into payload bytes.
    ///
    /// The returned [`Message`] wraps the payload only; the 4-byte length
    /// prefix is written by the framing layer.
    fn encode(&self, msg: &Self::Msg) -> Result<Message>;

    /// Decode a payload slice into a message.
    ///
    /// `bytes` is valid only for the duration of the call. When the frame
    /// fit inside the session's receive buffer the slice is a view into
    /// that buffer and will be overwritten by later reads, so any retained
    /// data must be copied.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Msg>;
}

//! Raw codec - pass-through for binary data.
//!
//! Used when payloads are already serialized or are raw bytes. Encoding an
//! existing `Bytes` value is zero-copy; decoding copies the payload out of
//! the receive buffer, since the buffer slice is only valid during the
//! decode call.

use bytes::Bytes;

use super::Codec;
use crate::error::Result;
use crate::message::Message;

/// Codec that passes bytes through without transformation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl RawCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for RawCodec {
    type Msg = Bytes;

    fn encode(&self, msg: &Bytes) -> Result<Message> {
        // Bytes clones share the underlying storage.
        Ok(Message::new(msg.clone()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

//! JSON codec using `serde_json`.
//!
//! Same shape as [`MsgPackCodec`](super::MsgPackCodec); handy when the peer
//! speaks JSON or when payloads need to be inspectable on the wire.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::Result;
use crate::message::Message;

/// JSON codec for structured data.
pub struct JsonCodec<T> {
    _msg: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self { _msg: PhantomData }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Msg = T;

    fn encode(&self, msg: &T) -> Result<Message> {
        let data = serde_json::to_vec(msg)?;
        Ok(Message::new(Bytes::from(data)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

//! MsgPack codec using `rmp-serde`.
//!
//! Uses `to_vec_named` so structs serialize as maps (with field names)
//! rather than positional arrays, which keeps the wire format readable by
//! non-Rust peers.
//!
//! # Example
//!
//! ```
//! use serde::{Serialize, Deserialize};
//! use wireline::codec::{Codec, MsgPackCodec};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Ping {
//!     seq: u32,
//! }
//!
//! let codec: MsgPackCodec<Ping> = MsgPackCodec::new();
//! let msg = codec.encode(&Ping { seq: 7 }).unwrap();
//! let decoded = codec.decode(msg.data()).unwrap();
//! assert_eq!(decoded, Ping { seq: 7 });
//! ```

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::Result;
use crate::message::Message;

/// MessagePack codec for structured data.
pub struct MsgPackCodec<T> {
    _msg: PhantomData<fn() -> T>,
}

impl<T> MsgPackCodec<T> {
    pub fn new() -> Self {
        Self { _msg: PhantomData }
    }
}

impl<T> Default for MsgPackCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec for MsgPackCodec<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Msg = T;

    fn encode(&self, msg: &T) -> Result<Message> {
        let data = rmp_serde::to_vec_named(msg)?;
        Ok(Message::new(Bytes::from(data)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        id: u32,
        name: String,
        active: bool,
    }

    #[test]
    fn test_round_trip_struct() {
        let codec: MsgPackCodec<TestStruct> = MsgPackCodec::new();
        let original = TestStruct {
            id: 42,
            name: "test".to_string(),
            active: true,
        };

        let msg = codec.encode(&original).unwrap();
        let decoded = codec.decode(msg.data()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_round_trip_primitives() {
        let codec: MsgPackCodec<i64> = MsgPackCodec::new();
        let msg = codec.encode(&12345).unwrap();
        assert_eq!(codec.decode(msg.data()).unwrap(), 12345);

        let codec: MsgPackCodec<String> = MsgPackCodec::new();
        let msg = codec.encode(&"hello".to_string()).unwrap();
        assert_eq!(codec.decode(msg.data()).unwrap(), "hello");
    }

    #[test]
    fn test_structs_serialize_as_maps() {
        let codec: MsgPackCodec<TestStruct> = MsgPackCodec::new();
        let msg = codec
            .encode(&TestStruct {
                id: 1,
                name: "x".to_string(),
                active: false,
            })
            .unwrap();

        // fixmap marker is 0x8X; fixarray (positional) would be 0x9X.
        assert_eq!(msg.data()[0] & 0xF0, 0x80);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let codec: MsgPackCodec<TestStruct> = MsgPackCodec::new();
        assert!(codec.decode(b"not valid msgpack").is_err());
    }

    #[test]
    fn test_round_trip_option() {
        let codec: MsgPackCodec<Option<i32>> = MsgPackCodec::new();

        let msg = codec.encode(&Some(42)).unwrap();
        assert_eq!(codec.decode(msg.data()).unwrap(), Some(42));

        let msg = codec.encode(&None).unwrap();
        assert_eq!(msg.data(), &[0xc0]);
        assert_eq!(codec.decode(msg.data()).unwrap(), None);
    }
}

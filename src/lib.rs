//! # wireline
//!
//! Stream-oriented network session library: turns a raw reliable byte
//! stream (TCP) into a bidirectional channel of discrete application
//! messages.
//!
//! Each session frames outbound messages with a 4-byte big-endian length
//! prefix, buffers them through a bounded send queue, and delivers decoded
//! inbound messages to a user callback. Two tasks per session do the work:
//! the sender drains the queue into the socket, the receiver deframes and
//! decodes whatever arrives.
//!
//! ## Architecture
//!
//! - **Outbound**: `send` → codec encode → bounded queue → sender task →
//!   send buffer → socket
//! - **Inbound**: socket → receive buffer → deframe → codec decode → event
//!   callback
//!
//! ## Example
//!
//! ```ignore
//! use bytes::Bytes;
//! use wireline::{connect, Event, RawCodec};
//!
//! #[tokio::main]
//! async fn main() -> wireline::Result<()> {
//!     let session = connect::<RawCodec>("tcp", "127.0.0.1:7000").await?;
//!     session.set_codecs(RawCodec::new())?;
//!     session.start(|session, event| match event {
//!         Event::Message(msg) => println!("got {} bytes", msg.len()),
//!         Event::Error { kind, error } => eprintln!("{kind}: {error}"),
//!         Event::Close { reason } => println!("closed: {reason}"),
//!     })?;
//!
//!     session.send(&Bytes::from_static(b"hello")).await?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod error;
pub mod event;
pub mod message;
pub mod queue;
pub mod session;

mod tcp;

pub use codec::{Codec, JsonCodec, MsgPackCodec, RawCodec};
pub use error::{Result, SessionError};
pub use event::{Event, ErrorKind, CLOSE_REASON_CONN_RESET, CLOSE_REASON_REMOTE_CLOSED};
pub use message::Message;
pub use session::{Session, TcpSession};
pub use tcp::{connect, connect_timeout, listen, TcpListener};

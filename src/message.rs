//! Encoded message handle.
//!
//! A [`Message`] wraps the bytes a codec produced for one application
//! message, together with an optional release hook. Ownership flows from the
//! caller of `send` into the send queue, then to the sender task, which
//! releases the handle once the bytes have been copied into the send buffer.

use bytes::Bytes;

/// An encoded outbound message.
///
/// The release hook runs exactly once: either through [`Message::release`]
/// when the sender task is done with the bytes, or on drop if the message
/// never reached the wire (for example when the queue is destroyed during
/// close).
pub struct Message {
    data: Bytes,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Message {
    /// Create a message over payload bytes with no release hook.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            release: None,
        }
    }

    /// Create a message whose hook runs when the payload is no longer needed.
    ///
    /// Useful when the payload was allocated from a pool.
    pub fn with_release<F>(data: Bytes, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            data,
            release: Some(Box::new(release)),
        }
    }

    /// The encoded payload bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the message and run its release hook.
    pub fn release(mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("len", &self.data.len())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

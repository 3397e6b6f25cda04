//! Error types for wireline sessions.

use std::io;

use thiserror::Error;

/// Main error type for all session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error produced by a user-supplied codec.
    #[error("codec error: {0}")]
    Codec(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Network name other than "tcp", "tcp4" or "tcp6".
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// Session is already started.
    #[error("session started")]
    SessionStarted,

    /// Session has not been started yet.
    #[error("session not started")]
    SessionNotStarted,

    /// Session has been closed.
    #[error("session closed")]
    SessionClosed,

    /// No codec installed before `start`.
    #[error("codecs not set")]
    CodecsNotSet,

    /// Invalid send/receive buffer size.
    #[error("invalid buffer size: {0}")]
    BuffSize(usize),

    /// Invalid maximum message size.
    #[error("invalid max message size: {0}")]
    MaxMsgSize(usize),

    /// Invalid send queue size.
    #[error("invalid send queue size: {0}")]
    SendQueueSize(usize),

    /// Encoded payload exceeds the session's maximum message size.
    #[error("message too large: {size} bytes (max {max})")]
    MsgTooLarge { size: usize, max: usize },

    /// The send queue has been destroyed.
    #[error("send queue destroyed")]
    QueueDestroyed,

    /// Buffer does not hold enough readable bytes.
    #[error("buffered not enough")]
    BufferedNotEnough,

    /// Buffer does not have enough writable room at the tail.
    #[error("available not enough")]
    AvailableNotEnough,
}

impl SessionError {
    /// Wrap an arbitrary error produced by a user codec.
    pub fn codec<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SessionError::Codec(Box::new(err))
    }

    /// Whether this error represents an expired I/O deadline.
    ///
    /// Timeouts are non-fatal: the task emits an error event and retries.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SessionError::Io(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
        )
    }

    /// Whether this error represents a connection reset by the peer.
    ///
    /// Resets are fatal: the session closes and a Close event is emitted.
    pub fn is_conn_reset(&self) -> bool {
        matches!(
            self,
            SessionError::Io(e) if e.kind() == io::ErrorKind::ConnectionReset
        )
    }
}

/// Result type alias using SessionError.
pub type Result<T> = std::result::Result<T, SessionError>;

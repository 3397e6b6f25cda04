//! Session events delivered to the user callback.
//!
//! A session produces three kinds of events: a decoded inbound message, a
//! non-fatal I/O or codec error tagged with the direction it occurred in,
//! and a terminal close notification carrying a human-readable reason. The
//! callback is invoked serially from whichever task produced the event; by
//! the time a [`Event::Close`] is delivered the session has already
//! transitioned to closed.

use crate::error::SessionError;

/// Close reason when the peer reset the connection.
pub const CLOSE_REASON_CONN_RESET: &str = "connection reset";

/// Close reason when the peer shut the connection down cleanly.
pub const CLOSE_REASON_REMOTE_CLOSED: &str = "remote session closed";

/// Direction a session error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error on the send path.
    Send,
    /// Error on the receive path.
    Receive,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Send => f.write_str("SendMessageError"),
            ErrorKind::Receive => f.write_str("ReceiveMessageError"),
        }
    }
}

/// An event produced during session communication.
#[derive(Debug)]
pub enum Event<M> {
    /// A message arrived and decoded successfully.
    Message(M),
    /// A non-fatal error occurred; the session continues.
    Error {
        kind: ErrorKind,
        error: SessionError,
    },
    /// The session closed. Terminal.
    Close { reason: String },
}

impl<M> Event<M> {
    pub(crate) fn error(kind: ErrorKind, error: SessionError) -> Self {
        Event::Error { kind, error }
    }

    pub(crate) fn close(reason: &str) -> Self {
        Event::Close {
            reason: reason.to_string(),
        }
    }

    /// The decoded message, if this is a message event.
    pub fn message(&self) -> Option<&M> {
        match self {
            Event::Message(m) => Some(m),
            _ => None,
        }
    }

    /// The error kind and cause, if this is an error event.
    pub fn error_parts(&self) -> Option<(ErrorKind, &SessionError)> {
        match self {
            Event::Error { kind, error } => Some((*kind, error)),
            _ => None,
        }
    }

    /// The close reason, if this is a close event.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Event::Close { reason } => Some(reason),
            _ => None,
        }
    }
}

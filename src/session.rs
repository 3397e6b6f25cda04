//! Session lifecycle and configuration.
//!
//! A [`Session`] owns one bidirectional stream connection and turns it into
//! a channel of discrete messages. Configuration happens before
//! [`Session::start`]; `start` allocates the send queue and spawns the
//! sender and receiver tasks; [`Session::close`] tears both down. The
//! started/closed bits are set-only: a closed session never restarts.
//!
//! The session core is generic over the stream type so the machinery can be
//! exercised over in-memory duplex pairs; [`TcpSession`] is the TCP
//! instantiation produced by the listener/dialer facade.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::debug;

use crate::codec::Codec;
use crate::error::{Result, SessionError};
use crate::event::Event;
use crate::queue::SendQueue;
use crate::tcp::{self, ReceiverConfig, SenderConfig};

/// Default capacity of the send queue, in messages.
pub const DEFAULT_SEND_QUEUE_SIZE: usize = 10;

/// Default capacity of the send buffer, in bytes.
pub const DEFAULT_SEND_BUFF_SIZE: usize = 8192;

/// Default capacity of the receive buffer, in bytes.
pub const DEFAULT_RECEIVE_BUFF_SIZE: usize = 8192;

/// Default upper bound on a single message payload, in bytes.
pub const DEFAULT_MAX_MSG_SIZE: usize = 65536;

/// Width of the frame length prefix on the wire.
pub const MSG_SIZE_LEN: usize = 4;

/// Largest payload the 4-byte length prefix can describe.
pub const MAX_MSG_SIZE: usize = u32::MAX as usize - MSG_SIZE_LEN;

const STATE_STARTED: u8 = 1 << 0;
const STATE_CLOSED: u8 = 1 << 1;

/// Callback receiving session events, shared by both I/O tasks.
pub(crate) type Callback<C, S> =
    Arc<dyn Fn(&Session<C, S>, Event<<C as Codec>::Msg>) + Send + Sync>;

/// A TCP session as produced by [`listen`](crate::listen) /
/// [`connect`](crate::connect).
pub type TcpSession<C> = Session<C, TcpStream>;

/// One bidirectional stream connection with its tasks and configuration.
///
/// Cloning yields another handle to the same session; handles are cheap and
/// safe to move into the event callback.
pub struct Session<C: Codec, S> {
    shared: Arc<Shared<C, S>>,
}

impl<C: Codec, S> Clone for Session<C, S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Shared<C: Codec, S> {
    state: AtomicU8,
    mtx: Mutex<Mutable<C, S>>,
}

struct Mutable<C: Codec, S> {
    conn: Option<S>,
    codecs: Option<Arc<C>>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
    send_buff_size: usize,
    receive_buff_size: usize,
    max_msg_size: usize,
    send_queue_size: usize,
    send_queue: Option<Arc<SendQueue>>,
    closed_tx: Option<watch::Sender<bool>>,
}

impl<C: Codec, S> Session<C, S> {
    /// Wrap an already-connected stream in a session with default sizes.
    pub fn new(conn: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(0),
                mtx: Mutex::new(Mutable {
                    conn: Some(conn),
                    codecs: None,
                    send_timeout: None,
                    receive_timeout: None,
                    send_buff_size: DEFAULT_SEND_BUFF_SIZE,
                    receive_buff_size: DEFAULT_RECEIVE_BUFF_SIZE,
                    max_msg_size: DEFAULT_MAX_MSG_SIZE,
                    send_queue_size: DEFAULT_SEND_QUEUE_SIZE,
                    send_queue: None,
                    closed_tx: None,
                }),
            }),
        }
    }

    /// Whether `start` has run successfully.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) & STATE_STARTED != 0
    }

    /// Whether the session has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) & STATE_CLOSED != 0
    }

    /// Install the codec. Before start only.
    pub fn set_codecs(&self, codecs: C) -> Result<()> {
        let mut g = self.lock_for_config()?;
        g.codecs = Some(Arc::new(codecs));
        Ok(())
    }

    /// Deadline for one socket write; `None` means no deadline.
    pub fn set_send_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let mut g = self.lock_for_config()?;
        g.send_timeout = timeout;
        Ok(())
    }

    /// Deadline for one socket read; `None` means no deadline.
    pub fn set_receive_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let mut g = self.lock_for_config()?;
        g.receive_timeout = timeout;
        Ok(())
    }

    /// Capacity of the sender task's binary buffer.
    pub fn set_send_buffer(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(SessionError::BuffSize(size));
        }
        let mut g = self.lock_for_config()?;
        g.send_buff_size = size;
        Ok(())
    }

    /// Capacity of the receiver task's binary buffer.
    pub fn set_receive_buffer(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(SessionError::BuffSize(size));
        }
        let mut g = self.lock_for_config()?;
        g.receive_buff_size = size;
        Ok(())
    }

    /// Upper bound for a single message payload, enforced on send and
    /// receive. Must fit the 4-byte length prefix: `0 < n <= 2^32 - 5`.
    pub fn set_max_message(&self, size: usize) -> Result<()> {
        if size == 0 || size > MAX_MSG_SIZE {
            return Err(SessionError::MaxMsgSize(size));
        }
        let mut g = self.lock_for_config()?;
        g.max_msg_size = size;
        Ok(())
    }

    /// Capacity of the send queue, in messages.
    pub fn set_send_queue(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(SessionError::SendQueueSize(size));
        }
        let mut g = self.lock_for_config()?;
        g.send_queue_size = size;
        Ok(())
    }

    /// Encode a message, check it against the size bound and enqueue it for
    /// transmission.
    ///
    /// Waits when the send queue is full (backpressure). Returns the
    /// codec's error, [`SessionError::MsgTooLarge`] without enqueueing, or a
    /// lifecycle error.
    pub async fn send(&self, msg: &C::Msg) -> Result<()> {
        let (codecs, queue, max_msg_size) = {
            let g = self.shared.mtx.lock().unwrap();
            if !self.is_started() {
                return Err(SessionError::SessionNotStarted);
            }
            if self.is_closed() {
                return Err(SessionError::SessionClosed);
            }
            (
                g.codecs.clone().expect("codecs checked at start"),
                g.send_queue.clone().expect("queue allocated at start"),
                g.max_msg_size,
            )
        };

        let encoded = codecs.encode(msg)?;
        if encoded.len() > max_msg_size {
            return Err(SessionError::MsgTooLarge {
                size: encoded.len(),
                max: max_msg_size,
            });
        }

        match queue.push(encoded).await {
            // The queue dying under us means close won the race.
            Err(SessionError::QueueDestroyed) => Err(SessionError::SessionClosed),
            other => other,
        }
    }

    /// Close the session: signal both tasks, destroy the send queue and
    /// release the connection.
    ///
    /// Idempotent in effect; the second call returns `SessionClosed`.
    pub fn close(&self) -> Result<()> {
        let mut g = self.shared.mtx.lock().unwrap();
        if !self.is_started() {
            return Err(SessionError::SessionNotStarted);
        }
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }

        self.shared
            .state
            .fetch_or(STATE_CLOSED, Ordering::Release);

        if let Some(tx) = g.closed_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(queue) = g.send_queue.take() {
            queue.destroy();
        }

        debug!("session closed");
        Ok(())
    }

    /// Lock the configuration slab, rejecting when started or closed.
    fn lock_for_config(&self) -> Result<std::sync::MutexGuard<'_, Mutable<C, S>>> {
        let g = self.shared.mtx.lock().unwrap();
        if self.is_started() {
            return Err(SessionError::SessionStarted);
        }
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        Ok(g)
    }
}

impl<C, S> Session<C, S>
where
    C: Codec,
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Begin I/O: allocate the send queue and spawn the sender and receiver
    /// tasks, which deliver events to `callback` until the session closes.
    ///
    /// Fails with `CodecsNotSet` if no codec is installed, and with the
    /// lifecycle errors on re-entry. Must be called within a tokio runtime.
    ///
    /// The callback runs serially inside whichever task produced the event.
    /// It may call [`Session::close`]; awaiting `send` from inside it would
    /// deadlock the task the callback runs on.
    pub fn start<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&Session<C, S>, Event<C::Msg>) + Send + Sync + 'static,
    {
        let mut g = self.shared.mtx.lock().unwrap();

        let codecs = g.codecs.clone().ok_or(SessionError::CodecsNotSet)?;
        if self.is_started() {
            return Err(SessionError::SessionStarted);
        }
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }

        let conn = g.conn.take().expect("connection present before start");
        let queue = Arc::new(SendQueue::new(g.send_queue_size));
        let (closed_tx, closed_rx) = watch::channel(false);

        g.send_queue = Some(queue.clone());
        g.closed_tx = Some(closed_tx);

        let sender_cfg = SenderConfig {
            timeout: g.send_timeout,
            buff_size: g.send_buff_size,
        };
        let receiver_cfg = ReceiverConfig {
            timeout: g.receive_timeout,
            buff_size: g.receive_buff_size,
            max_msg_size: g.max_msg_size,
        };

        // Configuration writes above happen under the mutex, ordered before
        // the Started transition becomes visible.
        self.shared
            .state
            .fetch_or(STATE_STARTED, Ordering::Release);
        drop(g);

        let callback: Callback<C, S> = Arc::new(callback);
        let (reader, writer) = tokio::io::split(conn);

        debug!("session started");

        tokio::spawn(tcp::send_loop(
            self.clone(),
            writer,
            queue,
            callback.clone(),
            closed_rx.clone(),
            sender_cfg,
        ));
        tokio::spawn(tcp::receive_loop(
            self.clone(),
            reader,
            codecs,
            callback,
            closed_rx,
            receiver_cfg,
        ));

        Ok(())
    }
}

impl<C: Codec, S> std::fmt::Debug for Session<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("started", &self.is_started())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawCodec;
    use bytes::Bytes;
    use tokio::io::DuplexStream;

    fn duplex_session() -> (Session<RawCodec, DuplexStream>, DuplexStream) {
        let (a, b) = tokio::io::duplex(1024);
        (Session::new(a), b)
    }

    fn noop_callback(
    ) -> impl Fn(&Session<RawCodec, DuplexStream>, Event<Bytes>) + Send + Sync + 'static {
        |_, _| {}
    }

    #[test]
    fn test_new_session_state() {
        let (session, _peer) = duplex_session();
        assert!(!session.is_started());
        assert!(!session.is_closed());
    }

    #[test]
    fn test_setters_accept_before_start() {
        let (session, _peer) = duplex_session();
        session.set_codecs(RawCodec::new()).unwrap();
        session
            .set_send_timeout(Some(Duration::from_secs(1)))
            .unwrap();
        session.set_receive_timeout(None).unwrap();
        session.set_send_buffer(4096).unwrap();
        session.set_receive_buffer(4096).unwrap();
        session.set_max_message(1024).unwrap();
        session.set_send_queue(5).unwrap();
    }

    #[test]
    fn test_numeric_setters_reject_zero() {
        let (session, _peer) = duplex_session();
        assert!(matches!(
            session.set_send_buffer(0),
            Err(SessionError::BuffSize(0))
        ));
        assert!(matches!(
            session.set_receive_buffer(0),
            Err(SessionError::BuffSize(0))
        ));
        assert!(matches!(
            session.set_max_message(0),
            Err(SessionError::MaxMsgSize(0))
        ));
        assert!(matches!(
            session.set_send_queue(0),
            Err(SessionError::SendQueueSize(0))
        ));
    }

    #[test]
    fn test_max_message_rejects_above_frame_cap() {
        let (session, _peer) = duplex_session();
        assert!(matches!(
            session.set_max_message(MAX_MSG_SIZE + 1),
            Err(SessionError::MaxMsgSize(_))
        ));
        session.set_max_message(MAX_MSG_SIZE).unwrap();
    }

    #[tokio::test]
    async fn test_start_requires_codecs() {
        let (session, _peer) = duplex_session();
        assert!(matches!(
            session.start(noop_callback()),
            Err(SessionError::CodecsNotSet)
        ));
    }

    #[tokio::test]
    async fn test_start_then_setters_rejected() {
        let (session, _peer) = duplex_session();
        session.set_codecs(RawCodec::new()).unwrap();
        session.start(noop_callback()).unwrap();
        assert!(session.is_started());

        assert!(matches!(
            session.set_codecs(RawCodec::new()),
            Err(SessionError::SessionStarted)
        ));
        assert!(matches!(
            session.set_send_buffer(1),
            Err(SessionError::SessionStarted)
        ));
        assert!(matches!(
            session.set_send_timeout(None),
            Err(SessionError::SessionStarted)
        ));
        assert!(matches!(
            session.set_max_message(1),
            Err(SessionError::SessionStarted)
        ));

        session.close().unwrap();
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (session, _peer) = duplex_session();
        session.set_codecs(RawCodec::new()).unwrap();
        session.start(noop_callback()).unwrap();
        assert!(matches!(
            session.start(noop_callback()),
            Err(SessionError::SessionStarted)
        ));
        session.close().unwrap();
    }

    #[test]
    fn test_close_before_start_rejected() {
        let (session, _peer) = duplex_session();
        assert!(matches!(
            session.close(),
            Err(SessionError::SessionNotStarted)
        ));
    }

    #[tokio::test]
    async fn test_close_idempotence() {
        let (session, _peer) = duplex_session();
        session.set_codecs(RawCodec::new()).unwrap();
        session.start(noop_callback()).unwrap();

        session.close().unwrap();
        assert!(session.is_closed());
        assert!(matches!(session.close(), Err(SessionError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_setters_after_close_return_closed() {
        let (session, _peer) = duplex_session();
        session.set_codecs(RawCodec::new()).unwrap();
        session.start(noop_callback()).unwrap();
        session.close().unwrap();

        assert!(matches!(
            session.set_send_buffer(1),
            Err(SessionError::SessionClosed)
        ));
        assert!(matches!(
            session.set_send_queue(1),
            Err(SessionError::SessionClosed)
        ));
        assert!(matches!(
            session.start(noop_callback()),
            Err(SessionError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_send_before_start_rejected() {
        let (session, _peer) = duplex_session();
        session.set_codecs(RawCodec::new()).unwrap();
        assert!(matches!(
            session.send(&Bytes::from_static(b"early")).await,
            Err(SessionError::SessionNotStarted)
        ));
    }

    #[tokio::test]
    async fn test_send_after_close_rejected() {
        let (session, _peer) = duplex_session();
        session.set_codecs(RawCodec::new()).unwrap();
        session.start(noop_callback()).unwrap();
        session.close().unwrap();

        assert!(matches!(
            session.send(&Bytes::from_static(b"late")).await,
            Err(SessionError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_send_rejects_oversize_without_enqueueing() {
        let (session, _peer) = duplex_session();
        session.set_codecs(RawCodec::new()).unwrap();
        session.set_max_message(8).unwrap();
        session.start(noop_callback()).unwrap();

        let big = Bytes::from(vec![0u8; 9]);
        assert!(matches!(
            session.send(&big).await,
            Err(SessionError::MsgTooLarge { size: 9, max: 8 })
        ));

        session.close().unwrap();
    }
}

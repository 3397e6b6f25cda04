//! Framing tasks and the TCP listener/dialer facade.
//!
//! Wire format: a stream is a concatenation of frames, each a 4-byte
//! big-endian payload length followed by exactly that many payload bytes.
//! The sender task drains the session's queue into its binary buffer and
//! flushes to the socket; the receiver task reads into its binary buffer,
//! deframes, decodes and emits events. Both run until the session closes.

use std::future::Future;
use std::io;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::buffer::BinaryBuffer;
use crate::codec::Codec;
use crate::error::{Result, SessionError};
use crate::event::{Event, ErrorKind, CLOSE_REASON_CONN_RESET, CLOSE_REASON_REMOTE_CLOSED};
use crate::message::Message;
use crate::queue::SendQueue;
use crate::session::{Callback, Session, TcpSession, MSG_SIZE_LEN};

/// Delay before retrying after a non-timeout I/O error.
const RETRY_DELAY: Duration = Duration::from_millis(100);

pub(crate) struct SenderConfig {
    pub timeout: Option<Duration>,
    pub buff_size: usize,
}

pub(crate) struct ReceiverConfig {
    pub timeout: Option<Duration>,
    pub buff_size: usize,
    pub max_msg_size: usize,
}

enum IoOutcome<T> {
    Done(Result<T>),
    Closed,
}

fn deadline_exceeded() -> SessionError {
    SessionError::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        "i/o deadline exceeded",
    ))
}

/// Run one socket I/O future under an optional deadline, interruptible by
/// the session's close signal.
async fn guarded_io<T>(
    fut: impl Future<Output = Result<T>>,
    deadline: Option<Duration>,
    closed_rx: &mut watch::Receiver<bool>,
) -> IoOutcome<T> {
    let fut = async move {
        match deadline {
            Some(d) => match tokio::time::timeout(d, fut).await {
                Ok(res) => res,
                Err(_) => Err(deadline_exceeded()),
            },
            None => fut.await,
        }
    };

    tokio::select! {
        res = fut => IoOutcome::Done(res),
        // Any wake of the close watch (value change or sender drop) means
        // the session is going down.
        _ = closed_rx.changed() => IoOutcome::Closed,
    }
}

/// Sender task: drain the queue, frame, flush to the socket.
pub(crate) async fn send_loop<C, S, W>(
    session: Session<C, S>,
    mut writer: W,
    queue: Arc<SendQueue>,
    callback: Callback<C, S>,
    mut closed_rx: watch::Receiver<bool>,
    cfg: SenderConfig,
) where
    C: Codec,
    W: AsyncWrite + Unpin,
{
    let mut buffer = BinaryBuffer::new(cfg.buff_size);
    let mut pending: Option<Message> = None;
    let mut length = 0usize;
    let mut wrote = 0usize;
    let mut size_written = false;

    debug!("sender task running");

    while !session.is_closed() {
        let mut wait_pop = true;

        // Fill phase: pack as many frames as fit into the buffer. Only the
        // first pop of each round may block, so partial contents get
        // flushed promptly once the queue runs dry.
        while buffer.available() > 0 {
            if pending.is_none() {
                let popped = if wait_pop {
                    match queue.pop().await {
                        Ok(m) => Some(m),
                        Err(_) => {
                            debug!("send queue destroyed, sender exiting");
                            return;
                        }
                    }
                } else {
                    match queue.try_pop() {
                        Ok(m) => m,
                        Err(_) => return,
                    }
                };

                match popped {
                    Some(m) => {
                        length = m.len();
                        pending = Some(m);
                    }
                    None => break,
                }
            }
            wait_pop = false;

            // The length prefix is written whole or not at all; flush first
            // when the tail cannot hold it.
            if !size_written {
                if buffer.available() < MSG_SIZE_LEN {
                    break;
                }
                buffer
                    .write_u32(length as u32)
                    .expect("tail holds the length prefix");
                size_written = true;
            }

            let msg = pending.as_ref().expect("message popped above");
            wrote += buffer.write(&msg.data()[wrote..]);
            if wrote == length {
                pending.take().expect("message popped above").release();
                size_written = false;
                length = 0;
                wrote = 0;
            }
        }

        // Drain phase: flush buffered bytes, tolerating partial writes.
        while buffer.buffered() > 0 {
            match guarded_io(buffer.write_to(&mut writer), cfg.timeout, &mut closed_rx).await {
                IoOutcome::Closed => return,
                IoOutcome::Done(Ok(_)) => {}
                IoOutcome::Done(Err(err)) => {
                    if session.is_closed() {
                        return;
                    }

                    if err.is_conn_reset() {
                        let _ = session.close();
                        callback(&session, Event::close(CLOSE_REASON_CONN_RESET));
                        return;
                    }

                    let is_timeout = err.is_timeout();
                    warn!(error = %err, "socket write failed");
                    callback(&session, Event::error(ErrorKind::Send, err));
                    if !is_timeout {
                        sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        buffer.trim();
    }
}

/// Receiver task: read from the socket, deframe, decode, emit events.
pub(crate) async fn receive_loop<C, S, R>(
    session: Session<C, S>,
    mut reader: R,
    codecs: Arc<C>,
    callback: Callback<C, S>,
    mut closed_rx: watch::Receiver<bool>,
    cfg: ReceiverConfig,
) where
    C: Codec,
    R: AsyncRead + Unpin,
{
    let mut buffer = BinaryBuffer::new(cfg.buff_size);
    // Standalone allocation for messages larger than the buffer.
    let mut standalone: Option<Vec<u8>> = None;
    let mut msg_size: Option<usize> = None;
    let mut msg_read = 0usize;
    // Remaining bytes of a size-rejected message still to be dropped.
    let mut discard_left = 0usize;

    debug!("receiver task running");

    while !session.is_closed() {
        buffer.trim();

        let n = match guarded_io(buffer.read_from(&mut reader), cfg.timeout, &mut closed_rx).await
        {
            IoOutcome::Closed => return,
            IoOutcome::Done(Ok(n)) => n,
            IoOutcome::Done(Err(err)) => {
                if session.is_closed() {
                    return;
                }

                if err.is_conn_reset() {
                    let _ = session.close();
                    callback(&session, Event::close(CLOSE_REASON_CONN_RESET));
                    return;
                }

                let is_timeout = err.is_timeout();
                warn!(error = %err, "socket read failed");
                callback(&session, Event::error(ErrorKind::Receive, err));
                if !is_timeout {
                    sleep(RETRY_DELAY).await;
                }
                continue;
            }
        };

        if n == 0 {
            // Clean shutdown by the peer.
            if session.is_closed() {
                return;
            }
            let _ = session.close();
            callback(&session, Event::close(CLOSE_REASON_REMOTE_CLOSED));
            return;
        }

        if discard_left > 0 {
            discard_left -= buffer.discard(discard_left);
            if discard_left > 0 {
                continue;
            }
        }

        // Deframe phase: extract as many complete messages as arrived.
        while buffer.buffered() > 0 {
            let size = match msg_size {
                Some(s) => s,
                None => {
                    if buffer.buffered() < MSG_SIZE_LEN {
                        break;
                    }
                    let s = buffer.read_u32().expect("length prefix buffered") as usize;

                    if s > cfg.max_msg_size {
                        warn!(size = s, max = cfg.max_msg_size, "dropping oversize frame");
                        callback(
                            &session,
                            Event::error(
                                ErrorKind::Receive,
                                SessionError::MsgTooLarge {
                                    size: s,
                                    max: cfg.max_msg_size,
                                },
                            ),
                        );

                        let left = s - buffer.discard(s);
                        if left > 0 {
                            discard_left = left;
                            break;
                        }
                        continue;
                    }

                    if s > buffer.size() {
                        standalone = Some(vec![0u8; s]);
                        msg_read = 0;
                    }
                    msg_size = Some(s);
                    s
                }
            };

            let decoded = if let Some(bytes) = &mut standalone {
                msg_read += buffer.read(&mut bytes[msg_read..]);
                if msg_read < size {
                    break;
                }
                let decoded = codecs.decode(&bytes[..]);
                standalone = None;
                decoded
            } else if buffer.buffered() >= size {
                // The whole message is contiguous in the buffer; decode from
                // a zero-copy view, then drop it.
                let decoded = codecs.decode(buffer.peek(size).expect("full message buffered"));
                buffer.discard(size);
                decoded
            } else {
                break;
            };

            match decoded {
                Ok(msg) => callback(&session, Event::Message(msg)),
                Err(err) => callback(&session, Event::error(ErrorKind::Receive, err)),
            }
            msg_size = None;
            msg_read = 0;
        }
    }
}

/// Validate a network name, returning its canonical static form.
fn validate_network(network: &str) -> Result<&'static str> {
    match network {
        "tcp" => Ok("tcp"),
        "tcp4" => Ok("tcp4"),
        "tcp6" => Ok("tcp6"),
        other => Err(SessionError::UnknownNetwork(other.to_string())),
    }
}

/// Resolve `addr` to a socket address matching the network's family.
async fn resolve_addr(network: &'static str, addr: &str) -> Result<SocketAddr> {
    let mut candidates = lookup_host(addr).await?;
    candidates
        .find(|a| match network {
            "tcp4" => a.is_ipv4(),
            "tcp6" => a.is_ipv6(),
            _ => true,
        })
        .ok_or_else(|| {
            SessionError::Io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no {network} address for {addr}"),
            ))
        })
}

/// Listener producing one [`TcpSession`] per inbound connection.
pub struct TcpListener<C> {
    inner: tokio::net::TcpListener,
    network: &'static str,
    _codec: PhantomData<fn() -> C>,
}

impl<C: Codec> TcpListener<C> {
    /// Accept the next inbound connection as a session with default sizes.
    pub async fn accept(&self) -> Result<TcpSession<C>> {
        let (stream, peer) = self.inner.accept().await?;
        debug!(%peer, "accepted session");
        Ok(Session::new(stream))
    }

    /// The network this listener was bound with.
    pub fn network(&self) -> &str {
        self.network
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Stop listening and release the socket.
    pub fn close(self) {
        drop(self.inner);
    }
}

/// Bind a listener. `network` must be `"tcp"`, `"tcp4"` or `"tcp6"`.
pub async fn listen<C: Codec>(network: &str, addr: &str) -> Result<TcpListener<C>> {
    let network = validate_network(network)?;
    let addr = resolve_addr(network, addr).await?;
    let inner = tokio::net::TcpListener::bind(addr).await?;
    debug!(%addr, network, "listening");

    Ok(TcpListener {
        inner,
        network,
        _codec: PhantomData,
    })
}

/// Dial a peer and wrap the connection in a session with default sizes.
pub async fn connect<C: Codec>(network: &str, addr: &str) -> Result<TcpSession<C>> {
    let network = validate_network(network)?;
    let addr = resolve_addr(network, addr).await?;
    let stream = TcpStream::connect(addr).await?;
    Ok(Session::new(stream))
}

/// [`connect`] bounded by a dial deadline.
pub async fn connect_timeout<C: Codec>(
    network: &str,
    addr: &str,
    timeout: Duration,
) -> Result<TcpSession<C>> {
    let network = validate_network(network)?;
    let addr = resolve_addr(network, addr).await?;
    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| deadline_exceeded())??;
    Ok(Session::new(stream))
}

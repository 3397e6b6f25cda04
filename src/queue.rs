//! Bounded FIFO of outbound messages.
//!
//! The queue sits between user calls to `send` and the sender task. Pushing
//! into a full queue suspends the producer (backpressure), popping from an
//! empty queue suspends the consumer. [`SendQueue::destroy`] wakes every
//! suspended operation; anything touching the queue afterwards gets
//! [`SessionError::QueueDestroyed`].
//!
//! Capacity is tracked with two semaphores (free slots / queued items) so
//! that both directions block and wake without a busy loop;
//! `Semaphore::close` provides the destroy wake-up.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::{Semaphore, TryAcquireError};

use crate::error::{Result, SessionError};
use crate::message::Message;

struct Inner {
    items: VecDeque<Message>,
    destroyed: bool,
}

/// Bounded message queue with blocking push and blocking/non-blocking pop.
pub struct SendQueue {
    inner: Mutex<Inner>,
    /// Permits for free slots; producers acquire, consumers replenish.
    space: Semaphore,
    /// Permits for queued items; consumers acquire, producers replenish.
    ready: Semaphore,
    capacity: usize,
}

impl SendQueue {
    /// Create a queue holding at most `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be greater than zero");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                destroyed: false,
            }),
            space: Semaphore::new(capacity),
            ready: Semaphore::new(0),
            capacity,
        }
    }

    /// Declared capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message, waiting while the queue is full.
    ///
    /// Fails with `QueueDestroyed` once [`SendQueue::destroy`] has run; the
    /// rejected message is dropped, which runs its release hook.
    pub async fn push(&self, msg: Message) -> Result<()> {
        let permit = self
            .space
            .acquire()
            .await
            .map_err(|_| SessionError::QueueDestroyed)?;
        permit.forget();

        {
            let mut g = self.inner.lock().unwrap();
            // A permit acquired in the same instant destroy ran must not
            // strand the message in a dead queue.
            if g.destroyed {
                return Err(SessionError::QueueDestroyed);
            }
            g.items.push_back(msg);
        }
        self.ready.add_permits(1);
        Ok(())
    }

    /// Remove the oldest message, waiting until one arrives.
    ///
    /// Fails with `QueueDestroyed` once the queue is destroyed.
    pub async fn pop(&self) -> Result<Message> {
        let permit = self
            .ready
            .acquire()
            .await
            .map_err(|_| SessionError::QueueDestroyed)?;
        permit.forget();
        self.take_front()
    }

    /// Remove the oldest message without waiting.
    ///
    /// Returns `Ok(None)` when the queue is empty and `QueueDestroyed` once
    /// the queue is destroyed.
    pub fn try_pop(&self) -> Result<Option<Message>> {
        match self.ready.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.take_front().map(Some)
            }
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(SessionError::QueueDestroyed),
        }
    }

    fn take_front(&self) -> Result<Message> {
        let msg = {
            let mut g = self.inner.lock().unwrap();
            // destroy may have drained the item behind our permit.
            g.items.pop_front().ok_or(SessionError::QueueDestroyed)?
        };
        self.space.add_permits(1);
        Ok(msg)
    }

    /// Destroy the queue: wake all blocked pushes and pops and release any
    /// queued messages. Idempotent.
    pub fn destroy(&self) {
        let drained: Vec<Message> = {
            let mut g = self.inner.lock().unwrap();
            g.destroyed = true;
            g.items.drain(..).collect()
        };
        self.space.close();
        self.ready.close();

        // Dropping the messages runs their release hooks.
        drop(drained);
    }
}

impl std::fmt::Debug for SendQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let g = self.inner.lock().unwrap();
        f.debug_struct("SendQueue")
            .field("capacity", &self.capacity)
            .field("len", &g.items.len())
            .field("destroyed", &g.destroyed)
            .finish()
    }
}

//! Fixed-capacity binary buffer mediating between the socket and the codec.
//!
//! The buffer is a non-wrapping byte region with a read cursor `r` and a
//! write cursor `w`, `0 <= r <= w <= capacity`. Readable bytes live in
//! `[r, w)`; writable room is the tail `[w, capacity)`. Consumers reclaim
//! head space with [`BinaryBuffer::trim`], which keeps every `peek`/`read`
//! result contiguous so a whole message can be handed to the decoder as one
//! slice without copying.
//!
//! All multi-byte integers are big endian.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, SessionError};

/// Fixed-capacity byte buffer with read/write cursors.
pub struct BinaryBuffer {
    buf: Vec<u8>,
    r: usize,
    w: usize,
}

impl BinaryBuffer {
    /// Create a buffer with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be greater than zero");
        Self {
            buf: vec![0u8; capacity],
            r: 0,
            w: 0,
        }
    }

    /// Total capacity.
    #[inline]
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Readable bytes: `w - r`.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.w - self.r
    }

    /// Writable room at the tail: `capacity - w`.
    #[inline]
    pub fn available(&self) -> usize {
        self.buf.len() - self.w
    }

    /// Shift `[r, w)` down to the front so the whole tail becomes writable.
    ///
    /// Preserves contents; no-op when `r == 0`.
    pub fn trim(&mut self) {
        if self.r == 0 {
            return;
        }

        let n = self.w - self.r;
        if n > 0 {
            self.buf.copy_within(self.r..self.w, 0);
        }
        self.r = 0;
        self.w = n;
    }

    /// View the next `n` readable bytes without advancing the read cursor.
    pub fn peek(&self, n: usize) -> Result<&[u8]> {
        if self.buffered() < n {
            return Err(SessionError::BufferedNotEnough);
        }
        Ok(&self.buf[self.r..self.r + n])
    }

    /// Advance the read cursor by up to `n`, returning the amount discarded.
    pub fn discard(&mut self, n: usize) -> usize {
        let discarded = n.min(self.buffered());
        self.r += discarded;
        discarded
    }

    /// Read a big-endian u16 and advance the read cursor by 2.
    pub fn read_u16(&mut self) -> Result<u16> {
        if self.buffered() < 2 {
            return Err(SessionError::BufferedNotEnough);
        }
        let value = u16::from_be_bytes(self.buf[self.r..self.r + 2].try_into().unwrap());
        self.r += 2;
        Ok(value)
    }

    /// Read a big-endian u32 and advance the read cursor by 4.
    pub fn read_u32(&mut self) -> Result<u32> {
        if self.buffered() < 4 {
            return Err(SessionError::BufferedNotEnough);
        }
        let value = u32::from_be_bytes(self.buf[self.r..self.r + 4].try_into().unwrap());
        self.r += 4;
        Ok(value)
    }

    /// Read a big-endian u64 and advance the read cursor by 8.
    pub fn read_u64(&mut self) -> Result<u64> {
        if self.buffered() < 8 {
            return Err(SessionError::BufferedNotEnough);
        }
        let value = u64::from_be_bytes(self.buf[self.r..self.r + 8].try_into().unwrap());
        self.r += 8;
        Ok(value)
    }

    /// Copy up to `dst.len()` buffered bytes into `dst`, advancing the read
    /// cursor by the amount copied. Returns the number of bytes copied,
    /// which is short when fewer bytes are buffered.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.buffered());
        dst[..n].copy_from_slice(&self.buf[self.r..self.r + n]);
        self.r += n;
        n
    }

    /// Write a big-endian u16 at the tail.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        if self.available() < 2 {
            return Err(SessionError::AvailableNotEnough);
        }
        self.buf[self.w..self.w + 2].copy_from_slice(&value.to_be_bytes());
        self.w += 2;
        Ok(())
    }

    /// Write a big-endian u32 at the tail.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        if self.available() < 4 {
            return Err(SessionError::AvailableNotEnough);
        }
        self.buf[self.w..self.w + 4].copy_from_slice(&value.to_be_bytes());
        self.w += 4;
        Ok(())
    }

    /// Write a big-endian u64 at the tail.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        if self.available() < 8 {
            return Err(SessionError::AvailableNotEnough);
        }
        self.buf[self.w..self.w + 8].copy_from_slice(&value.to_be_bytes());
        self.w += 8;
        Ok(())
    }

    /// Copy up to `available()` bytes from `src`, advancing the write
    /// cursor. Returns the number of bytes copied, which is short when the
    /// tail lacks room.
    pub fn write(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.available());
        self.buf[self.w..self.w + n].copy_from_slice(&src[..n]);
        self.w += n;
        n
    }

    /// Perform one `read` call from `reader` into the tail `[w, capacity)`,
    /// advancing the write cursor by the bytes returned.
    ///
    /// Fails with `AvailableNotEnough` when the tail is full.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        if self.available() == 0 {
            return Err(SessionError::AvailableNotEnough);
        }

        let n = reader.read(&mut self.buf[self.w..]).await?;
        self.w += n;
        Ok(n)
    }

    /// Perform one `write` call of `[r, w)` to `writer`, advancing the read
    /// cursor by the bytes written. Partial writes advance partially.
    pub async fn write_to<W>(&mut self, writer: &mut W) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let n = writer.write(&self.buf[self.r..self.w]).await?;
        self.r += n;
        Ok(n)
    }
}

impl std::fmt::Debug for BinaryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryBuffer")
            .field("size", &self.size())
            .field("r", &self.r)
            .field("w", &self.w)
            .finish()
    }
}

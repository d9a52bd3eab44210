//! Pooled heap buffers backing regions when memory mapping is unavailable
//!
//! Every buffer handed out by the pool is owned by exactly one [`PooledBuffer`].
//! Dropping that owner returns the allocation to the pool, so a buffer cannot be
//! released twice or read after it has been recycled.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

/// Maximum number of idle buffers kept for reuse
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Buffers larger than this are freed instead of being kept idle
pub const MAX_IDLE_CAPACITY: usize = 1 << 20;

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<Vec<u8>>,
    outstanding: usize,
    outstanding_bytes: usize,
}

/// A shared allocator of read buffers with alloc/free bookkeeping.
#[derive(Debug)]
pub struct BufferPool {
    state: Mutex<PoolState>,
    max_idle: usize,
}
impl Default for BufferPool {
    fn default() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }
}
impl BufferPool {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            max_idle,
        }
    }

    /// Takes a zero-filled buffer of exactly `len` bytes from the pool.
    pub fn take(self: &Arc<Self>, len: usize) -> PooledBuffer {
        let mut buf = {
            let mut state = self.state.lock();
            state.outstanding += 1;
            state.outstanding_bytes += len;
            match state.idle.iter().position(|b| b.capacity() >= len) {
                Some(pos) => state.idle.swap_remove(pos),
                None => Vec::with_capacity(len),
            }
        };
        buf.clear();
        buf.resize(len, 0);
        PooledBuffer {
            buf,
            pool: Arc::clone(self),
        }
    }

    fn give_back(&self, buf: Vec<u8>) {
        let mut state = self.state.lock();
        state.outstanding -= 1;
        state.outstanding_bytes -= buf.len();
        if state.idle.len() < self.max_idle && buf.capacity() <= MAX_IDLE_CAPACITY {
            state.idle.push(buf);
        }
    }

    /// Number of buffers currently owned by callers
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Number of bytes currently owned by callers
    #[must_use]
    pub fn outstanding_bytes(&self) -> usize {
        self.state.lock().outstanding_bytes
    }

    /// Number of idle buffers available for reuse
    #[must_use]
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }
}

/// An owned buffer borrowed from a [`BufferPool`]; returned to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<BufferPool>,
}
impl PooledBuffer {
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}
impl Deref for PooledBuffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.buf
    }
}
impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.give_back(buf);
    }
}

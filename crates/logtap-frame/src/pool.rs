//! Free-list pool for message payload buffers.
//!
//! Every decoded message owns its bytes; the pool lets those buffers
//! cycle back for the next decode instead of hitting the allocator per
//! frame. The pool is an explicit object shared by `Rc` — components
//! that need it take a handle at construction.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use bytes::BytesMut;

const DEFAULT_MAX_IDLE: usize = 32;
const INITIAL_BUF_CAPACITY: usize = 2 * 1024;

/// A bounded free-list of reusable byte buffers.
pub struct BufferPool {
    free: RefCell<Vec<BytesMut>>,
    max_idle: usize,
}

impl BufferPool {
    /// Create a pool keeping up to 32 idle buffers.
    pub fn new() -> Rc<Self> {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }

    /// Create a pool with an explicit idle-list bound.
    pub fn with_max_idle(max_idle: usize) -> Rc<Self> {
        Rc::new(Self {
            free: RefCell::new(Vec::new()),
            max_idle,
        })
    }

    /// Check out an empty buffer; it returns to the pool on drop.
    pub fn acquire(self: &Rc<Self>) -> PooledBuf {
        let buf = self
            .free
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(INITIAL_BUF_CAPACITY));
        PooledBuf {
            buf,
            pool: Some(Rc::clone(self)),
        }
    }

    /// Number of buffers currently idle in the pool.
    pub fn idle(&self) -> usize {
        self.free.borrow().len()
    }

    fn release(&self, mut buf: BytesMut) {
        let mut free = self.free.borrow_mut();
        if free.len() < self.max_idle {
            buf.clear();
            free.push(buf);
        }
    }
}

/// A byte buffer checked out of a [`BufferPool`].
///
/// Dereferences to `[u8]`; hands its allocation back to the pool when
/// dropped.
pub struct PooledBuf {
    buf: BytesMut,
    pool: Option<Rc<BufferPool>>,
}

impl PooledBuf {
    /// A standalone buffer that frees normally instead of returning
    /// to a pool.
    pub fn detached() -> Self {
        Self {
            buf: BytesMut::new(),
            pool: None,
        }
    }

    /// Append bytes to the buffer.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("len", &self.buf.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(std::mem::take(&mut self.buf));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_returns_to_pool_on_drop() {
        let pool = BufferPool::new();
        assert_eq!(pool.idle(), 0);

        let mut buf = pool.acquire();
        buf.extend_from_slice(b"payload");
        assert_eq!(&buf[..], b"payload");
        drop(buf);

        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn reacquired_buffer_is_empty() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"stale contents");
        drop(buf);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = BufferPool::with_max_idle(2);
        let bufs: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(bufs);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn detached_buffer_never_pools() {
        let mut buf = PooledBuf::detached();
        buf.extend_from_slice(b"xyz");
        assert_eq!(buf.len(), 3);
        drop(buf);
    }
}

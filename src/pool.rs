//! Buffer Pool
//!
//! A bounded, best-effort cache of fixed-size relay buffers. Checkout never
//! blocks: an empty pool hands out a freshly zeroed buffer, and a full pool
//! silently drops returned buffers.

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Default size of a single relay buffer in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Default number of idle buffers kept around
pub const DEFAULT_POOL_CAPACITY: usize = 2048;

/// Scratch region used by one relay pump
pub type Buffer = Box<[u8]>;

/// Leaky pool of reusable relay buffers
#[derive(Debug)]
pub struct BufferPool {
    free: ArrayQueue<Buffer>,
    buffer_size: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

/// Pool usage counters reported through accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub capacity: usize,
    pub hits: usize,
    pub misses: usize,
}

impl BufferPool {
    /// Create a pool holding at most `capacity` idle buffers of `buffer_size` bytes
    pub fn new(buffer_size: usize, capacity: usize) -> Self {
        Self {
            // ArrayQueue rejects a zero capacity
            free: ArrayQueue::new(capacity.max(1)),
            buffer_size,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Check out a buffer, allocating when none is idle
    pub fn acquire(&self) -> Buffer {
        match self.free.pop() {
            Some(buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(buffer_size = self.buffer_size, "Buffer pool empty, allocating");
                vec![0u8; self.buffer_size].into_boxed_slice()
            }
        }
    }

    /// Return a buffer; it is discarded when the pool is full
    pub fn release(&self, buf: Buffer) {
        if buf.len() != self.buffer_size {
            return;
        }
        if self.free.push(buf).is_err() {
            trace!("Buffer pool full, dropping returned buffer");
        }
    }

    /// Number of idle buffers currently held
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.len(),
            capacity: self.capacity(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_acquire_from_empty_pool_allocates() {
        let pool = BufferPool::new(4096, 4);
        assert!(pool.is_empty());

        let buf = pool.acquire();
        assert_eq!(buf.len(), 4096);
        assert!(buf.iter().all(|&b| b == 0));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_release_reuses_buffer() {
        let pool = BufferPool::new(1024, 4);
        let buf = pool.acquire();
        let ptr = buf.as_ptr();

        pool.release(buf);
        assert_eq!(pool.len(), 1);

        let again = pool.acquire();
        assert_eq!(again.as_ptr(), ptr);
        assert!(pool.is_empty());

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_release_drops_when_full() {
        let pool = BufferPool::new(512, 2);
        let bufs: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        for buf in bufs {
            pool.release(buf);
        }
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn test_release_ignores_foreign_sizes() {
        let pool = BufferPool::new(512, 2);
        pool.release(vec![0u8; 128].into_boxed_slice());
        assert!(pool.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkout_never_shares_buffers() {
        let pool = Arc::new(BufferPool::new(256, 8));
        let in_use = Arc::new(Mutex::new(HashSet::new()));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let pool = Arc::clone(&pool);
            let in_use = Arc::clone(&in_use);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    let buf = pool.acquire();
                    let addr = buf.as_ptr() as usize;
                    assert!(in_use.lock().unwrap().insert(addr), "buffer issued twice");
                    tokio::task::yield_now().await;
                    assert!(in_use.lock().unwrap().remove(&addr));
                    pool.release(buf);
                    assert!(pool.len() <= pool.capacity());
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert!(pool.len() <= 8);
    }
}

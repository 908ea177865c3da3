//! Object and buffer pools.
//!
//! Both pools are bounded free lists behind a `parking_lot::Mutex`. Values
//! are reset when they come back, never when they go out, so whatever
//! `acquire` hands out is already clean.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use parking_lot::Mutex;
use serde::Serialize;

use super::model::AccessLogEntry;

/// Buffers that grew past this multiple of the default capacity are dropped
/// instead of pooled.
const MAX_BUFFER_GROWTH: usize = 4;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStats {
    pub available: usize,
    pub capacity: usize,
    pub created: u64,
    pub reused: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    created: AtomicU64,
    reused: AtomicU64,
}

impl PoolCounters {
    fn stats(&self, available: usize, capacity: usize) -> PoolStats {
        PoolStats {
            available,
            capacity,
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        }
    }
}

/// Reusable [`AccessLogEntry`] values.
#[derive(Debug)]
pub struct EntryPool {
    free: Mutex<Vec<AccessLogEntry>>,
    capacity: usize,
    counters: PoolCounters,
}

impl EntryPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity.min(1024))),
            capacity,
            counters: PoolCounters::default(),
        }
    }

    pub fn acquire(&self) -> AccessLogEntry {
        match self.free.lock().pop() {
            Some(entry) => {
                self.counters.reused.fetch_add(1, Ordering::Relaxed);
                entry
            }
            None => {
                self.counters.created.fetch_add(1, Ordering::Relaxed);
                AccessLogEntry::default()
            }
        }
    }

    /// Reset `entry` and keep it for the next `acquire`, unless the pool is
    /// already full.
    pub fn release(&self, mut entry: AccessLogEntry) {
        entry.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(entry);
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.stats(self.free.lock().len(), self.capacity)
    }
}

#[derive(Debug)]
struct BufferPoolInner {
    free: Mutex<Vec<BytesMut>>,
    buffer_size: usize,
    capacity: usize,
    counters: PoolCounters,
}

impl BufferPoolInner {
    fn give_back(&self, mut buf: BytesMut) {
        if buf.capacity() > self.buffer_size * MAX_BUFFER_GROWTH {
            return;
        }
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(buf);
        }
    }
}

/// Reusable byte buffers. Cloning shares the same pool.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

impl BufferPool {
    pub fn new(buffer_size: usize, capacity: usize) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                free: Mutex::new(Vec::new()),
                buffer_size: buffer_size.max(1),
                capacity,
                counters: PoolCounters::default(),
            }),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    pub fn acquire(&self) -> PooledBuffer {
        let reused = self.inner.free.lock().pop();
        let buf = match reused {
            Some(buf) => {
                self.inner.counters.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.inner.counters.created.fetch_add(1, Ordering::Relaxed);
                BytesMut::with_capacity(self.inner.buffer_size)
            }
        };
        PooledBuffer {
            buf,
            pool: Arc::clone(&self.inner),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.inner
            .counters
            .stats(self.inner.free.lock().len(), self.inner.capacity)
    }
}

/// A buffer on loan from a [`BufferPool`]; it goes back when dropped.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: BytesMut,
    pool: Arc<BufferPoolInner>,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

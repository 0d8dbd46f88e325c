use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Scratch buffers are dropped instead of pooled once they grow past this.
const MAX_POOLED_CAPACITY: usize = 64 * 1024;

/// Pool of reusable byte buffers for assembling one record at a time.
///
/// [`BufferPool::acquire`] hands out an exclusive, empty buffer; dropping the
/// guard clears it and returns it to the pool on every exit path.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        BufferPool::default()
    }

    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self.free.lock().pop().unwrap_or_else(|| Vec::with_capacity(256));
        PooledBuffer { pool: self, buf }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buf.clear();
        self.free.lock().push(buf);
    }
}

pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

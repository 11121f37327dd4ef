//! Segment allocator and segmented growable buffer (§4.1).
//!
//! [`BufferPool`] caches power-of-two-sized byte buffers in capacity
//! buckets so encoders/decoders can recycle allocations across `reset()`
//! calls instead of hitting the global allocator on every document.
//! [`Buffer`] is the segmented logical buffer built on top of it: an
//! ordered list of segments where only the last has spare capacity, used as
//! both the decoder's input window and (via its `std::io::Write`
//! implementation) a zero-copy-friendly in-memory encoder sink.

use std::io;
use std::sync::Mutex;

/// Segments below this size are allocated directly and never pooled.
const MIN_SEGMENT: usize = 4096;

/// Buffers larger than this are never retained by the pool or by
/// `Buffer::reset`.
const MAX_RETAINED: usize = 64 * 1024;

/// Maximum number of segment slots a `Buffer` retains in its `segments`
/// vector across a `reset()`.
const MAX_RETAINED_SLOTS: usize = 64;

fn bucket_index(capacity: usize) -> usize {
    debug_assert!(capacity >= MIN_SEGMENT);
    (usize::BITS - (capacity - 1).leading_zeros()) as usize
}

/// A concurrency-safe cache of recyclable byte buffers, bucketed by
/// capacity so that `get(n)` returns a buffer whose capacity lies in
/// `[2^k, 2^(k+1))` for some `k`.
#[derive(Debug, Default)]
pub struct BufferPool {
    buckets: Mutex<Vec<Vec<Vec<u8>>>>,
}

impl BufferPool {
    /// An empty pool with nothing recycled yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a zero-length buffer with capacity at least
    /// `max(n, 4096)`, recycled from the pool when possible.
    #[must_use]
    pub fn get(&self, n: usize) -> Vec<u8> {
        let n = n.max(MIN_SEGMENT);
        let idx = bucket_index(n);
        let mut buckets = self.buckets.lock().expect("buffer pool mutex poisoned");
        if let Some(bucket) = buckets.get_mut(idx) {
            if let Some(mut buf) = bucket.pop() {
                buf.clear();
                return buf;
            }
        }
        drop(buckets);
        Vec::with_capacity(n.next_power_of_two())
    }

    /// Return `buf` to the pool for reuse, unless its capacity exceeds
    /// [`MAX_RETAINED`].
    pub fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() < MIN_SEGMENT || buf.capacity() > MAX_RETAINED {
            return;
        }
        buf.clear();
        let idx = bucket_index(buf.capacity());
        let mut buckets = self.buckets.lock().expect("buffer pool mutex poisoned");
        if buckets.len() <= idx {
            buckets.resize_with(idx + 1, Vec::new);
        }
        buckets[idx].push(buf);
    }
}

/// A growable byte buffer built from appended, power-of-two-sized segments.
///
/// Only the last segment ever has spare capacity; earlier segments are
/// immutable once a new one is appended. `bytes()` flattens into a single
/// contiguous slice (allocating a fresh flattened segment from the pool),
/// which is the common case for a decoder's lexer; callers that only need
/// to append (the encoder's sink role) never need to flatten.
#[derive(Debug)]
pub struct Buffer {
    segments: Vec<Vec<u8>>,
    pool: std::sync::Arc<BufferPool>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    /// An empty buffer with its own private pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            pool: std::sync::Arc::new(BufferPool::new()),
        }
    }

    /// An empty buffer that recycles segments through `pool`, for sharing
    /// one pool across several encoders/decoders.
    #[must_use]
    pub fn with_pool(pool: std::sync::Arc<BufferPool>) -> Self {
        Self {
            segments: Vec::new(),
            pool,
        }
    }

    /// Total length across all segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// True iff no bytes have been written since creation or the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(Vec::is_empty)
    }

    /// Ensure the trailing segment has at least `n` bytes of spare
    /// capacity, returning the pool's previous trailing segment first if it
    /// was left empty by a prior flatten.
    pub fn grow(&mut self, n: usize) {
        if let Some(last) = self.segments.last() {
            if last.capacity() - last.len() >= n {
                return;
            }
            if last.is_empty() {
                let empty = self.segments.pop().expect("checked Some above");
                self.pool.put(empty);
            }
        }
        self.segments.push(self.pool.get(n));
    }

    /// Append `bytes` to the trailing segment, growing at most once.
    pub fn write(&mut self, bytes: &[u8]) {
        self.grow(bytes.len());
        self.segments
            .last_mut()
            .expect("grow() always leaves a trailing segment")
            .extend_from_slice(bytes);
    }

    /// Flatten all segments into one contiguous slice, allocating a fresh
    /// flattened segment from the pool when there is more than one segment.
    pub fn bytes(&mut self) -> &[u8] {
        if self.segments.len() > 1 {
            let total = self.len();
            let mut flat = self.pool.get(total);
            for seg in &self.segments {
                flat.extend_from_slice(seg);
            }
            for seg in self.segments.drain(..) {
                self.pool.put(seg);
            }
            self.segments.push(flat);
        }
        self.segments.first().map_or(&[], Vec::as_slice)
    }

    /// Return a freshly allocated copy of the buffer's contents.
    #[must_use]
    pub fn bytes_clone(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for seg in &self.segments {
            out.extend_from_slice(seg);
        }
        out
    }

    /// Free all segments back to the pool except one, retained only if its
    /// capacity is at most [`MAX_RETAINED`]; also cap the `segments` vector
    /// itself at [`MAX_RETAINED_SLOTS`] slots.
    pub fn reset(&mut self) {
        let keep = self
            .segments
            .pop()
            .filter(|s| s.capacity() <= MAX_RETAINED)
            .map(|mut s| {
                s.clear();
                s
            });
        for seg in self.segments.drain(..) {
            self.pool.put(seg);
        }
        if self.segments.capacity() > MAX_RETAINED_SLOTS {
            self.segments = Vec::new();
        }
        if let Some(seg) = keep {
            self.segments.push(seg);
        }
    }
}

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Buffer::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::{Buffer, BufferPool, MIN_SEGMENT};

    #[test]
    fn pool_recycles_same_bucket_capacity() {
        let pool = BufferPool::new();
        let buf = pool.get(8192);
        let cap = buf.capacity();
        pool.put(buf);
        let buf2 = pool.get(8192);
        assert_eq!(buf2.capacity(), cap);
        assert!(buf2.is_empty());
    }

    #[test]
    fn pool_does_not_retain_oversized_buffers() {
        let pool = BufferPool::new();
        pool.put(Vec::with_capacity(1024 * 1024));
        let buf = pool.get(1024 * 1024);
        // A fresh allocation, not the oversized one we tried to return.
        assert!(buf.capacity() >= 1024 * 1024);
    }

    #[test]
    fn buffer_accumulates_across_segments() {
        let mut buf = Buffer::new();
        buf.write(b"hello");
        buf.write(b" world");
        assert_eq!(buf.len(), 11);
        assert_eq!(buf.bytes(), b"hello world");
    }

    #[test]
    fn buffer_write_impl_matches_write_method() {
        let mut buf = Buffer::new();
        buf.write_all(b"abc").unwrap();
        assert_eq!(buf.bytes(), b"abc");
    }

    #[test]
    fn buffer_reset_retains_one_small_segment() {
        let mut buf = Buffer::new();
        buf.write(&vec![b'x'; MIN_SEGMENT]);
        buf.reset();
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn buffer_clone_is_independent() {
        let mut buf = Buffer::new();
        buf.write(b"abc");
        let cloned = buf.bytes_clone();
        buf.write(b"def");
        assert_eq!(cloned, b"abc");
        assert_eq!(buf.bytes(), b"abcdef");
    }
}

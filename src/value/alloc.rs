//! Scratch-buffer pooling for the schema-directed walkers.
//!
//! A recursive walk over a document allocates one index buffer per list or
//! map it visits. [`Freelist`] recycles those buffers so a deep traversal
//! performs a bounded number of real allocations. Buffers must be returned
//! with [`Freelist::put`] before the walk returns, including on error
//! paths, in reverse order of acquisition.

/// A pool of reusable `Vec<T>` buffers.
#[derive(Debug)]
pub struct Freelist<T> {
    free: Vec<Vec<T>>,
}

impl<T> Freelist<T> {
    pub fn new() -> Self {
        Freelist { free: Vec::new() }
    }

    /// Takes a cleared buffer from the pool, allocating one only when the
    /// pool is empty.
    pub fn take(&mut self) -> Vec<T> {
        self.free.pop().unwrap_or_default()
    }

    /// Returns a buffer to the pool. The buffer is cleared here so `take`
    /// always hands out empty storage.
    pub fn put(&mut self, mut buf: Vec<T>) {
        buf.clear();
        self.free.push(buf);
    }

    /// Number of buffers currently pooled.
    pub fn pooled(&self) -> usize {
        self.free.len()
    }
}

impl<T> Default for Freelist<T> {
    fn default() -> Self {
        Freelist::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_reuses_returned_buffers() {
        let mut pool: Freelist<u32> = Freelist::new();

        let mut a = pool.take();
        a.push(1);
        a.push(2);
        let capacity = a.capacity();
        pool.put(a);
        assert_eq!(pool.pooled(), 1);

        let b = pool.take();
        assert!(b.is_empty());
        assert_eq!(b.capacity(), capacity);
        assert_eq!(pool.pooled(), 0);
    }

    #[test]
    fn take_allocates_when_pool_empty() {
        let mut pool: Freelist<String> = Freelist::new();
        let a = pool.take();
        let b = pool.take();
        assert!(a.is_empty() && b.is_empty());
        pool.put(a);
        pool.put(b);
        assert_eq!(pool.pooled(), 2);
    }
}

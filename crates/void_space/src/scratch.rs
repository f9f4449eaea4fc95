//! Reusable candidate buffers for broadphase culling

use crate::object::Rid;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

/// One shape of one collision object, as returned by the broadphase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKey {
    /// Owning object
    pub object: Rid,
    /// Index into the object's shape list
    pub shape: usize,
}

impl ShapeKey {
    /// Create a key
    pub fn new(object: Rid, shape: usize) -> Self {
        Self { object, shape }
    }
}

/// Fixed-capacity candidate list with a length counter.
///
/// Pushing past capacity drops the candidate and marks the buffer saturated,
/// so a crowded query degrades to a partial answer instead of allocating.
#[derive(Debug, Default)]
pub struct CullBuffer {
    items: Vec<ShapeKey>,
    capacity: usize,
    saturated: bool,
}

impl CullBuffer {
    /// Create a buffer holding at most `capacity` candidates
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            saturated: false,
        }
    }

    /// Maximum number of candidates
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reset the length counter
    pub fn clear(&mut self) {
        self.items.clear();
        self.saturated = false;
    }

    /// Append a candidate; returns false once full
    pub fn push(&mut self, key: ShapeKey) -> bool {
        if self.items.len() >= self.capacity {
            self.saturated = true;
            return false;
        }
        self.items.push(key);
        true
    }

    /// Whether a push was rejected since the last clear
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    /// Keep only candidates matching `keep`, preserving order
    pub fn retain(&mut self, keep: impl FnMut(&ShapeKey) -> bool) {
        self.items.retain(keep);
    }

    /// Candidates in cull order
    pub fn as_slice(&self) -> &[ShapeKey] {
        &self.items
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no candidates
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Pool of candidate buffers owned by one space
#[derive(Debug)]
pub struct ScratchPool {
    capacity: usize,
    free: Mutex<Vec<CullBuffer>>,
}

impl ScratchPool {
    /// Create a pool handing out buffers of `capacity` candidates
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Check a buffer out; it returns to the pool when the guard drops
    pub fn acquire(&self) -> ScratchGuard<'_> {
        let buffer = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| CullBuffer::with_capacity(self.capacity));
        ScratchGuard { pool: self, buffer }
    }

    /// Buffers currently idle in the pool
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

/// Exclusive handle on a pooled buffer
#[derive(Debug)]
pub struct ScratchGuard<'a> {
    pool: &'a ScratchPool,
    buffer: CullBuffer,
}

impl Deref for ScratchGuard<'_> {
    type Target = CullBuffer;

    fn deref(&self) -> &CullBuffer {
        &self.buffer
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut CullBuffer {
        &mut self.buffer
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.clear();
        self.pool.free.lock().push(buffer);
    }
}

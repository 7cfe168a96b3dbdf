//! Framework id allocation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use plinth_core::FrameworkId;

/// Hands out framework ids from a shared atomic counter.
///
/// Clones share the counter.  Ids start at `1`, only ever increase and are
/// never reused for the lifetime of the counter.  Contexts built without an
/// explicit allocator draw from [`FrameworkIdAllocator::process`].
#[derive(Debug, Clone)]
pub struct FrameworkIdAllocator {
    next: Arc<AtomicU64>,
}

impl FrameworkIdAllocator {
    /// A fresh, independent counter.
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The counter shared by the whole process.
    pub fn process() -> Self {
        static PROCESS: OnceLock<FrameworkIdAllocator> = OnceLock::new();
        PROCESS.get_or_init(FrameworkIdAllocator::new).clone()
    }

    /// Takes the next id.
    pub fn allocate(&self) -> FrameworkId {
        FrameworkId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for FrameworkIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_ids_increase() {
        let alloc = FrameworkIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(b > a);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let alloc = FrameworkIdAllocator::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let alloc = alloc.clone();
                thread::spawn(move || (0..100).map(|_| alloc.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}

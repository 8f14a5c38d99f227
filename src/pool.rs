use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Recycles boxed extent descriptors so the allocator doesn't pay a fresh
/// heap allocation for every split/free/confirm. Grows on demand, never
/// shrinks: a released box goes back on the free stack instead of being
/// dropped.
pub struct NodePool<T> {
    free: Mutex<Vec<Box<T>>>,
    grown: AtomicUsize,
}

impl<T> NodePool<T> {
    pub fn new() -> Self {
        Self { free: Mutex::new(Vec::new()), grown: AtomicUsize::new(0) }
    }

    pub fn acquire(&self, data: T) -> Box<T> {
        let mut free = self.free.lock().unwrap();
        match free.pop() {
            Some(mut node) => {
                *node = data;
                node
            }
            None => {
                self.grown.fetch_add(1, Ordering::Relaxed);
                Box::new(data)
            }
        }
    }

    pub fn release(&self, node: Box<T>) {
        self.free.lock().unwrap().push(node);
    }

    /// Total number of descriptors ever allocated from the heap (i.e. how
    /// many times the pool has grown). Never decreases.
    pub fn allocated(&self) -> usize {
        self.grown.load(Ordering::Relaxed)
    }
}

impl<T> Default for NodePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_released_nodes_instead_of_growing() {
        let pool: NodePool<u32> = NodePool::new();
        let a = pool.acquire(1);
        assert_eq!(pool.allocated(), 1);
        pool.release(a);
        let b = pool.acquire(2);
        assert_eq!(*b, 2);
        // reused the released box rather than allocating a new one
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn grows_when_nothing_is_free() {
        let pool: NodePool<u32> = NodePool::new();
        let _a = pool.acquire(1);
        let _b = pool.acquire(2);
        assert_eq!(pool.allocated(), 2);
    }
}

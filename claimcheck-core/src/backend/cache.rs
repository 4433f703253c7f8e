use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::ClaimCheckResult;

/// Lazily created per-topic container handles.
///
/// The map lock is only held to find or insert the slot for a name; the
/// creation itself runs under that slot's once-cell, so callers for
/// different topics never wait on each other and callers for the same
/// topic wait for the single creation in flight. A failed creation leaves
/// the slot empty and the next caller tries again.
pub struct ContainerCache<H> {
    slots: Mutex<HashMap<String, Arc<OnceCell<H>>>>,
}

impl<H: Clone> ContainerCache<H> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the handle for `name`, creating it with `create` on first use
    pub fn get_or_try_create<F>(&self, name: &str, create: F) -> ClaimCheckResult<H>
    where
        F: FnOnce() -> ClaimCheckResult<H>,
    {
        let slot = {
            let mut slots = self.slots.lock();
            slots
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        slot.get_or_try_init(create).cloned()
    }

    /// Handle for `name` if it was already created
    pub fn get(&self, name: &str) -> Option<H> {
        let slots = self.slots.lock();
        slots.get(name).and_then(|slot| slot.get().cloned())
    }

    /// Number of created handles
    pub fn len(&self) -> usize {
        let slots = self.slots.lock();
        slots.values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every handle
    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

impl<H: Clone> Default for ContainerCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClaimCheckError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_creates_once_per_name() {
        let cache = ContainerCache::<String>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let handle = cache
                .get_or_try_create("orders", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("orders-handle".to_string())
                })
                .unwrap();
            assert_eq!(handle, "orders-handle");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_creation_is_retried() {
        let cache = ContainerCache::<u32>::new();

        let first = cache.get_or_try_create("t", || Err(ClaimCheckError::backend("unavailable")));
        assert!(first.is_err());
        assert!(cache.get("t").is_none());

        let second = cache.get_or_try_create("t", || Ok(7)).unwrap();
        assert_eq!(second, 7);
    }

    #[test]
    fn test_concurrent_first_use() {
        let cache = Arc::new(ContainerCache::<String>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let topic = if i % 2 == 0 { "a" } else { "b" };
                    barrier.wait();
                    cache
                        .get_or_try_create(topic, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(topic.to_string())
                        })
                        .unwrap()
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }
}

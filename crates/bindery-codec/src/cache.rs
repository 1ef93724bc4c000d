// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Build-once cache for node codecs.
//!
//! Concurrent lookups of the same key run the builder once; the other
//! callers block on the slot and share the result. A failed build is handed
//! to the callers that waited on that attempt and is then forgotten, so the
//! next lookup tries again.
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::CodecError;

struct Slot<V> {
    ready: OnceLock<Arc<V>>,
    state: Mutex<SlotState>,
    done: Condvar,
}

#[derive(Default)]
struct SlotState {
    building: bool,
    attempt: u64,
    failure: Option<(u64, CodecError)>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            ready: OnceLock::new(),
            state: Mutex::new(SlotState::default()),
            done: Condvar::new(),
        }
    }
}

/// Records a failure if the builder unwinds, so waiters never hang.
struct BuildGuard<'a, V> {
    slot: &'a Slot<V>,
    attempt: u64,
    finished: bool,
}

impl<V> BuildGuard<'_, V> {
    fn finish(mut self, failure: Option<CodecError>) {
        self.finished = true;
        let mut state = self.slot.state.lock();
        state.building = false;
        state.failure = failure.map(|err| (self.attempt, err));
        self.slot.done.notify_all();
    }
}

impl<V> Drop for BuildGuard<'_, V> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.slot.state.lock();
        state.building = false;
        state.failure = Some((
            self.attempt,
            CodecError::ConstructionFailure {
                location: String::from("codec cache"),
                reason: String::from("construction panicked"),
            },
        ));
        self.slot.done.notify_all();
    }
}

/// Concurrent build-once map from `K` to shared `V`.
pub struct CodecCache<K, V> {
    slots: RwLock<FxHashMap<K, Arc<Slot<V>>>>,
    constructions: AtomicUsize,
}

impl<K, V> Default for CodecCache<K, V> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(FxHashMap::default()),
            constructions: AtomicUsize::new(0),
        }
    }
}

impl<K, V> CodecCache<K, V>
where
    K: Eq + Hash + Copy + fmt::Debug,
{
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: K) -> Arc<Slot<V>> {
        if let Some(slot) = self.slots.read().get(&key) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(key).or_default())
    }

    /// Value for `key`, running `build` if nobody has built it yet.
    ///
    /// # Errors
    /// Returns the builder's error, either from this caller's own attempt or
    /// from the attempt it was waiting on.
    pub fn get_or_build<F>(&self, key: K, build: F) -> Result<Arc<V>, CodecError>
    where
        F: FnOnce() -> Result<V, CodecError>,
    {
        let slot = self.slot(key);
        if let Some(value) = slot.ready.get() {
            return Ok(Arc::clone(value));
        }

        let attempt = {
            let mut state = slot.state.lock();
            if state.building {
                let watching = state.attempt;
                while state.building && state.attempt == watching {
                    slot.done.wait(&mut state);
                }
                if let Some(value) = slot.ready.get() {
                    return Ok(Arc::clone(value));
                }
                if let Some((failed, err)) = &state.failure {
                    if *failed == watching {
                        return Err(err.clone());
                    }
                }
            }
            if let Some(value) = slot.ready.get() {
                return Ok(Arc::clone(value));
            }
            state.building = true;
            state.attempt += 1;
            state.failure = None;
            state.attempt
        };

        let guard = BuildGuard {
            slot: &slot,
            attempt,
            finished: false,
        };
        self.constructions.fetch_add(1, Ordering::Relaxed);
        match build() {
            Ok(value) => {
                let value = Arc::clone(slot.ready.get_or_init(|| Arc::new(value)));
                guard.finish(None);
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(key = ?key, error = %err, "codec construction failed");
                guard.finish(Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Value for `key` if it has been built.
    pub fn get(&self, key: K) -> Option<Arc<V>> {
        self.slots.read().get(&key)?.ready.get().cloned()
    }

    /// Number of times a builder has been started.
    pub fn construction_count(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }

    /// Number of built values.
    pub fn len(&self) -> usize {
        self.slots.read().values().filter(|s| s.ready.get().is_some()).count()
    }

    /// True when nothing has been built.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> fmt::Debug for CodecCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecCache")
            .field("slots", &self.slots.read().len())
            .field("constructions", &self.constructions.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn failure() -> CodecError {
        CodecError::ConstructionFailure {
            location: String::from("test"),
            reason: String::from("boom"),
        }
    }

    #[test]
    fn concurrent_lookups_build_once() {
        let cache: Arc<CodecCache<u32, String>> = Arc::new(CodecCache::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_build(7, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(String::from("codec"))
                        })
                        .unwrap()
                })
            })
            .collect();
        let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.construction_count(), 1);
        assert!(values.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: CodecCache<u32, u32> = CodecCache::new();
        assert_eq!(cache.get_or_build(1, || Err(failure())), Err(failure()));
        assert!(cache.get(1).is_none());
        let value = cache.get_or_build(1, || Ok(5)).unwrap();
        assert_eq!(*value, 5);
        assert_eq!(cache.construction_count(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn waiters_share_the_failure_of_their_attempt() {
        let cache: Arc<CodecCache<u32, u32>> = Arc::new(CodecCache::new());
        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_build(3, || {
                        thread::sleep(Duration::from_millis(20));
                        Err(failure())
                    })
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Err(failure()));
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn panicking_builder_releases_waiters() {
        let cache: CodecCache<u32, u32> = CodecCache::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_or_build(9, || -> Result<u32, CodecError> {
                std::panic::resume_unwind(Box::new("builder failed"))
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(*cache.get_or_build(9, || Ok(1)).unwrap(), 1);
    }
}

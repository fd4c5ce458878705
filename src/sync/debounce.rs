use crate::core::{EntityId, FieldName, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// The unit of debounce independence: one timer per entity *and* field.
pub type FieldKey = (EntityId, FieldName);

type CommitFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct ArmedTimer {
    generation: u64,
    commit: Option<CommitFn>,
    sleeper: JoinHandle<()>,
}

/// Per-field debounce scheduler.
///
/// Each `(entity, field)` pair owns exactly one timer. Re-arming a pair
/// cancels only that pair's previous timer and drops its commit
/// (last-edit-wins within the quiescence window); timers for other fields
/// of the same entity, or the same field of other entities, are never
/// touched. A shared timer would let an edit to one field silently discard
/// another field's still-pending save, which is the failure mode this
/// component exists to prevent.
#[derive(Clone)]
pub struct FieldDebounceScheduler {
    window: Duration,
    timers: Arc<Mutex<HashMap<FieldKey, ArmedTimer>>>,
    generations: Arc<AtomicU64>,
}

impl FieldDebounceScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arms (or re-arms) the timer for `key`. The commit runs once the
    /// quiescence window elapses without another `schedule` for the same
    /// key.
    pub fn schedule<F, Fut>(&self, key: FieldKey, commit: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

        // holding the lock across the spawn keeps a racing fire() from
        // observing the map without this entry
        let mut timers = self.timers.lock()?;
        let sleeper = tokio::spawn({
            let scheduler = self.clone();
            let key = key.clone();
            let window = self.window;
            async move {
                tokio::time::sleep(window).await;
                scheduler.fire(key, generation).await;
            }
        });
        if let Some(superseded) = timers.insert(
            key.clone(),
            ArmedTimer {
                generation,
                commit: Some(Box::new(move || commit().boxed())),
                sleeper,
            },
        ) {
            superseded.sleeper.abort();
            debug!(entity = %key.0, field = %key.1, "debounce timer re-armed");
        }
        Ok(())
    }

    /// If a timer for `key` is armed, cancels it and runs its commit
    /// immediately (blur). Other pairs' timers are unaffected. Returns
    /// whether a commit ran.
    pub async fn flush_now(&self, key: &FieldKey) -> Result<bool> {
        let commit = {
            let mut timers = self.timers.lock()?;
            timers.remove(key).and_then(|mut timer| {
                timer.sleeper.abort();
                timer.commit.take()
            })
        };
        match commit {
            Some(commit) => {
                commit().await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fires every still-armed timer's commit in key order and clears the
    /// timer set. Called on teardown so an edit made right before
    /// navigating away is not lost.
    pub async fn flush_all(&self) -> Result<usize> {
        let mut drained: Vec<(FieldKey, CommitFn)> = {
            let mut timers = self.timers.lock()?;
            timers
                .drain()
                .filter_map(|(key, mut timer)| {
                    timer.sleeper.abort();
                    timer.commit.take().map(|commit| (key, commit))
                })
                .collect()
        };
        drained.sort_by(|(a, _), (b, _)| a.cmp(b));

        let count = drained.len();
        for (key, commit) in drained {
            debug!(entity = %key.0, field = %key.1, "flushing armed timer on teardown");
            commit().await;
        }
        Ok(count)
    }

    /// Whether a timer is currently armed for `key`.
    pub fn is_armed(&self, key: &FieldKey) -> bool {
        self.timers
            .lock()
            .map(|timers| timers.contains_key(key))
            .unwrap_or(false)
    }

    pub fn armed_count(&self) -> usize {
        self.timers.lock().map(|timers| timers.len()).unwrap_or(0)
    }

    /// Runs the commit for `key` if its timer is still the armed one.
    async fn fire(&self, key: FieldKey, generation: u64) {
        let commit = {
            let Ok(mut timers) = self.timers.lock() else {
                return;
            };
            match timers.get(&key) {
                Some(timer) if timer.generation == generation => timers
                    .remove(&key)
                    .and_then(|mut timer| timer.commit.take()),
                // a newer edit re-armed this key; the stale sleeper loses
                _ => None,
            }
        };
        if let Some(commit) = commit {
            commit().await;
        }
    }
}

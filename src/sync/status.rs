use crate::core::{Result, SaveStatus};
use crate::sync::debounce::FieldKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

struct StatusEntry {
    status: SaveStatus,
    generation: u64,
}

/// Per-field save indicator board.
///
/// Every `(entity, field)` pair is tracked independently, so one field's
/// failure never touches another field's indicator. `Saved` and `Error`
/// are transient: a generation-guarded task clears them back to `Idle`
/// after the configured display window, unless a newer transition has
/// already replaced the entry.
#[derive(Clone)]
pub struct SaveStatusBoard {
    entries: Arc<RwLock<HashMap<FieldKey, StatusEntry>>>,
    generations: Arc<AtomicU64>,
    saved_clear_after: Duration,
    error_clear_after: Duration,
}

impl SaveStatusBoard {
    pub fn new(saved_clear_after: Duration, error_clear_after: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
            saved_clear_after,
            error_clear_after,
        }
    }

    /// Current status for the pair; untracked pairs are `Idle`.
    pub fn status(&self, key: &FieldKey) -> SaveStatus {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .get(key)
                    .map(|entry| entry.status)
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Marks a persistence call as in flight.
    pub fn begin_save(&self, key: &FieldKey) -> Result<()> {
        self.set(key, SaveStatus::Saving)?;
        Ok(())
    }

    /// Marks a successful save; clears back to `Idle` after the display
    /// window.
    pub fn finish_saved(&self, key: &FieldKey) -> Result<()> {
        let generation = self.set(key, SaveStatus::Saved)?;
        self.spawn_clear(key.clone(), generation, self.saved_clear_after);
        Ok(())
    }

    /// Marks a failed save; clears after the (longer) error window so the
    /// indicator never permanently blocks further edits.
    pub fn finish_error(&self, key: &FieldKey) -> Result<()> {
        let generation = self.set(key, SaveStatus::Error)?;
        self.spawn_clear(key.clone(), generation, self.error_clear_after);
        Ok(())
    }

    fn set(&self, key: &FieldKey, status: SaveStatus) -> Result<u64> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let mut entries = self.entries.write()?;
        entries.insert(key.clone(), StatusEntry { status, generation });
        Ok(generation)
    }

    fn spawn_clear(&self, key: FieldKey, generation: u64, after: Duration) {
        let board = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Ok(mut entries) = board.entries.write()
                && let Some(entry) = entries.get(&key)
                && entry.generation == generation
            {
                entries.remove(&key);
            }
        });
    }
}

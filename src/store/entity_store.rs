use crate::core::{EntityId, MeterReading, NaturalKey, ReadingPatch, Result, SyncError};
use chrono::{DateTime, Utc};
use im::OrdMap;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::error;

/// The in-memory collection of reading records for the active scope.
///
/// This is a value type over a persistent map: every "mutation" returns a
/// structurally new `EntityStore` and leaves the receiver untouched. Clones
/// are O(1) via structural sharing, so readers take cheap snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    entries: OrdMap<EntityId, MeterReading>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from canonical rows, rejecting duplicate identities.
    pub fn from_entities(entities: impl IntoIterator<Item = MeterReading>) -> Result<Self> {
        let mut store = Self::new();
        for entity in entities {
            store = store.inserted(entity)?;
        }
        Ok(store)
    }

    pub(crate) fn from_map(entries: OrdMap<EntityId, MeterReading>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: &EntityId) -> Option<&MeterReading> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &MeterReading)> {
        self.entries.iter()
    }

    /// Rows in identity order: canonical first, then temporary.
    pub fn readings(&self) -> Vec<MeterReading> {
        self.entries.values().cloned().collect()
    }

    pub fn by_natural_key(&self, key: &NaturalKey) -> Option<&MeterReading> {
        self.entries
            .values()
            .find(|reading| reading.natural_key() == *key)
    }

    /// Inserts a row that must not exist yet.
    ///
    /// A duplicate identity is an invariant violation, not an upsert: at
    /// most one row per permanent identity may ever be present, and a
    /// temporary identity is superseded exactly once.
    pub fn inserted(&self, reading: MeterReading) -> Result<Self> {
        if self.entries.contains_key(&reading.id) {
            return Err(SyncError::ReferenceIntegrity(format!(
                "duplicate identity '{}' in entity store",
                reading.id
            )));
        }
        Ok(Self {
            entries: self.entries.update(reading.id.clone(), reading),
        })
    }

    /// Inserts or replaces a row.
    pub fn replaced(&self, reading: MeterReading) -> Self {
        Self {
            entries: self.entries.update(reading.id.clone(), reading),
        }
    }

    /// Removes a row; removing an absent identity returns a structurally
    /// equal store.
    pub fn removed(&self, id: &EntityId) -> Self {
        Self {
            entries: self.entries.without(id),
        }
    }

    /// Applies a partial patch to an existing row.
    pub fn patched(
        &self,
        id: &EntityId,
        patch: &ReadingPatch,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let current = self
            .entries
            .get(id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        let next = current.apply_patch(patch, now);
        Ok(Self {
            entries: self.entries.update(id.clone(), next),
        })
    }

    /// Pointer equality of the underlying map. Two stores that share the
    /// same root are the "identical reference" the mutation guard rejects.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.entries.ptr_eq(&other.entries)
    }
}

/// Shared handle owning the committed store value.
///
/// All writers go through [`StoreHandle::update_with`] or
/// [`StoreHandle::commit`]; every committed snapshot is published on a
/// watch channel so reactive observers see each distinct state exactly
/// once. Committing the identical collection back is rejected as a
/// programming defect (reactive observers rely on a new value per change).
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<EntityStore>>,
    observers: Arc<watch::Sender<EntityStore>>,
}

impl StoreHandle {
    pub fn new() -> Self {
        let initial = EntityStore::new();
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(RwLock::new(initial)),
            observers: Arc::new(tx),
        }
    }

    /// Cheap snapshot of the committed store.
    pub fn snapshot(&self) -> EntityStore {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Subscribe to committed snapshots.
    pub fn subscribe(&self) -> watch::Receiver<EntityStore> {
        self.observers.subscribe()
    }

    /// Read-modify-commit under one write lock.
    ///
    /// The closure receives the committed store and returns its successor.
    /// Returning the identical collection trips the mutation guard.
    pub fn update_with<F>(&self, mutate: F) -> Result<EntityStore>
    where
        F: FnOnce(&EntityStore) -> Result<EntityStore>,
    {
        let mut guard = self.inner.write()?;
        let next = mutate(&guard)?;
        if next.ptr_eq(&guard) {
            error!("store update returned the identical collection it was given");
            return Err(SyncError::ReferenceIntegrity(
                "store update returned the identical collection it was given".to_string(),
            ));
        }
        *guard = next.clone();
        drop(guard);
        let _ = self.observers.send(next.clone());
        Ok(next)
    }

    /// Like [`StoreHandle::update_with`], but the closure may decline to
    /// commit by returning `None` (a deliberate no-op, distinct from
    /// returning an unchanged collection).
    pub fn update_if_changed<F>(&self, mutate: F) -> Result<Option<EntityStore>>
    where
        F: FnOnce(&EntityStore) -> Result<Option<EntityStore>>,
    {
        let mut guard = self.inner.write()?;
        let Some(next) = mutate(&guard)? else {
            return Ok(None);
        };
        if next.ptr_eq(&guard) {
            error!("store update returned the identical collection it was given");
            return Err(SyncError::ReferenceIntegrity(
                "store update returned the identical collection it was given".to_string(),
            ));
        }
        *guard = next.clone();
        drop(guard);
        let _ = self.observers.send(next.clone());
        Ok(Some(next))
    }

    /// Commits an externally built store value (merge results).
    pub fn commit(&self, next: EntityStore) -> Result<EntityStore> {
        self.update_with(|_| Ok(next))
    }
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new()
    }
}

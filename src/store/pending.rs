use crate::core::{MeterReading, Result, SyncError, TempId};
use im::OrdMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::error;

/// An optimistic create that the backing store has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub temp_id: TempId,
    pub op_seq: u64,
    /// The optimistic row as it was synthesized at create time.
    pub snapshot: MeterReading,
}

/// Registry of locally created rows awaiting confirmation, keyed by their
/// temporary identity.
///
/// Same value-type discipline as the entity store: every mutation returns a
/// new registry. The set of temporary identities held here is always a
/// subset of the identities in the entity store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingWriteRegistry {
    entries: OrdMap<TempId, PendingWrite>,
}

impl PendingWriteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, temp_id: &TempId) -> Option<&PendingWrite> {
        self.entries.get(temp_id)
    }

    pub fn contains(&self, temp_id: &TempId) -> bool {
        self.entries.contains_key(temp_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TempId, &PendingWrite)> {
        self.entries.iter()
    }

    pub fn temp_ids(&self) -> Vec<TempId> {
        self.entries.keys().cloned().collect()
    }

    /// Registers an optimistic create. A temporary identity may be
    /// registered at most once.
    pub fn inserted(&self, write: PendingWrite) -> Result<Self> {
        if self.entries.contains_key(&write.temp_id) {
            return Err(SyncError::ReferenceIntegrity(format!(
                "duplicate temporary identity '{}' in pending registry",
                write.temp_id
            )));
        }
        Ok(Self {
            entries: self.entries.update(write.temp_id.clone(), write),
        })
    }

    pub fn removed(&self, temp_id: &TempId) -> Self {
        Self {
            entries: self.entries.without(temp_id),
        }
    }

    /// Drops every entry sharing the given operation sequence. Guards
    /// against stray duplicates left by re-entrant create calls.
    pub fn without_op_seq(&self, op_seq: u64) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(_, write)| write.op_seq != op_seq)
                .map(|(id, write)| (id.clone(), write.clone()))
                .collect(),
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.entries.ptr_eq(&other.entries)
    }
}

/// Shared handle owning the committed registry, with the same
/// identical-collection guard as the store handle.
#[derive(Clone)]
pub struct PendingHandle {
    inner: Arc<RwLock<PendingWriteRegistry>>,
}

impl PendingHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(PendingWriteRegistry::new())),
        }
    }

    pub fn snapshot(&self) -> PendingWriteRegistry {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn update_with<F>(&self, mutate: F) -> Result<PendingWriteRegistry>
    where
        F: FnOnce(&PendingWriteRegistry) -> Result<PendingWriteRegistry>,
    {
        let mut guard = self.inner.write()?;
        let next = mutate(&guard)?;
        if next.ptr_eq(&guard) {
            error!("pending registry update returned the identical collection it was given");
            return Err(SyncError::ReferenceIntegrity(
                "pending registry update returned the identical collection it was given"
                    .to_string(),
            ));
        }
        *guard = next.clone();
        Ok(next)
    }
}

impl Default for PendingHandle {
    fn default() -> Self {
        Self::new()
    }
}

use crate::core::{EntityId, MeterReading, ReadingDraft, ReadingPatch, Result, Scope};
use async_trait::async_trait;

pub mod memory;

pub use memory::MemoryAdapter;

/// Contract of the asynchronous persistence layer.
///
/// The engine never talks to storage directly; everything goes through
/// this seam. Implementations return canonical rows with permanent
/// identities and authoritative timestamps.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync + 'static {
    /// Persists a new record and returns its canonical row.
    ///
    /// Fails with `SyncError::Persistence` on I/O or validation failure and
    /// with `SyncError::Conflict` when a record with the same natural key
    /// already exists.
    async fn create(&self, draft: ReadingDraft) -> Result<MeterReading>;

    /// Applies a partial patch to an existing record.
    ///
    /// The patch follows the presence/absence convention: a slot absent
    /// from the patch leaves the field untouched, a present null slot
    /// clears it. Fails with `SyncError::NotFound` when `id` does not
    /// exist; a temporary identity the store never confirmed always takes
    /// this path.
    async fn update(&self, id: &EntityId, patch: ReadingPatch) -> Result<MeterReading>;

    /// Returns the authoritative snapshot for a scope. An empty scope is
    /// an empty list, never an error.
    async fn list(&self, scope: &Scope) -> Result<Vec<MeterReading>>;
}

/// Shared adapters work wherever an adapter does, so callers can keep a
/// handle on the same instance the engine drives.
#[async_trait]
impl<A: PersistenceAdapter> PersistenceAdapter for std::sync::Arc<A> {
    async fn create(&self, draft: ReadingDraft) -> Result<MeterReading> {
        (**self).create(draft).await
    }

    async fn update(&self, id: &EntityId, patch: ReadingPatch) -> Result<MeterReading> {
        (**self).update(id, patch).await
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<MeterReading>> {
        (**self).list(scope).await
    }
}

// ============================================================================
// metersync Library
// ============================================================================

//! Optimistic entity-synchronization engine for property-association
//! records: per-field debounced autosave of meter readings, optimistic
//! creation under temporary identifiers, and merge-based reconciliation
//! against an asynchronous persistence layer.
//!
//! Rows appear in the store the instant they are created or edited; the
//! persistence adapter catches up in the background.
//!
//! # Examples
//!
//! ```
//! use metersync::{
//!     MemoryAdapter, MeterKind, ReadingDraft, ReconciliationController, Scope, SyncConfig,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> metersync::Result<()> {
//! let scope = Scope::new("property-17");
//! let engine =
//!     ReconciliationController::new(MemoryAdapter::new(), scope.clone(), SyncConfig::default())?;
//!
//! let draft = ReadingDraft::new(scope, "EG links", "7311", MeterKind::Water);
//! let reading = engine.create(draft).await?;
//! assert_eq!(engine.store().len(), 1);
//! assert!(!reading.id.is_temp());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod persist;
pub mod store;
pub mod sync;

// Re-export main types for convenience
pub use config::SyncConfig;
pub use core::{
    EntityId, FieldName, MeterKind, MeterReading, NaturalKey, ReadingDraft, ReadingPatch, Result,
    SaveStatus, Scope, SyncError, TempId,
};
pub use persist::{MemoryAdapter, PersistenceAdapter};
pub use store::{EntityStore, PendingWrite, PendingWriteRegistry, StoreHandle};
pub use sync::{FieldDebounceScheduler, ReconciliationController, SaveTicket};

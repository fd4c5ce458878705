pub mod entity_store;
pub mod pending;

pub use entity_store::{EntityStore, StoreHandle};
pub use pending::{PendingHandle, PendingWrite, PendingWriteRegistry};

pub mod entity;
pub mod error;
pub mod patch;
pub mod types;
pub mod value;

pub use entity::MeterReading;
pub use error::{Result, SyncError};
pub use patch::{FieldEdit, FieldPatch, ReadingDraft, ReadingPatch};
pub use types::{EntityId, FieldName, MeterKind, NaturalKey, SaveStatus, Scope, TempId};
pub use value::{parse_note_input, parse_reading_input};

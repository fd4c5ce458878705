pub mod debounce;
pub mod merge;
pub mod reconcile;
pub mod status;

pub use debounce::{FieldDebounceScheduler, FieldKey};
pub use merge::{latest_of, merge};
pub use reconcile::{ReconciliationController, SaveTicket};
pub use status::SaveStatusBoard;

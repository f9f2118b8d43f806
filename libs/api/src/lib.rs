//! Shared types for the stride workspace: the record model, the store error
//! and the store capability traits implemented by the storage plugins.

mod error;
mod record;
mod store;

pub use error::{ErrorKind, StoreError};
pub use record::{CursorAdvance, RESERVED_SLOTS, Record, RecordId, RecordPatch};
pub use store::{SequenceStore, StoreFactory, StoreFuture};

//! Durable `SequenceStore` backed by JSON-lines journals.

mod config;
mod storage;

pub use config::FileStoreConfig;
pub use storage::{FileStore, FileStoreFactory};

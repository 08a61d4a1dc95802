//! Shared file library: uploaded documents under `files/` with a record per file.

mod service;
mod sqlite;
mod store;
mod types;

pub use service::FileLibrary;
pub use sqlite::SqliteFileStore;
pub use store::FileStore;
pub use types::{FileRecord, LibraryError, NewFile};

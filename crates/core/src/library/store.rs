use super::{FileRecord, LibraryError, NewFile};

/// Trait for file library record storage.
pub trait FileStore: Send + Sync {
    fn create(&self, file: &NewFile) -> Result<FileRecord, LibraryError>;

    fn find(&self, filename: &str) -> Result<Option<FileRecord>, LibraryError>;

    /// Sorted by name. `query` matches any part of the name.
    fn list(&self, query: Option<&str>) -> Result<Vec<FileRecord>, LibraryError>;

    /// Point a record at a new name. Returns false if `from` did not exist.
    fn rename(&self, from: &str, to: &str) -> Result<bool, LibraryError>;

    /// Returns false if the record did not exist.
    fn delete(&self, filename: &str) -> Result<bool, LibraryError>;
}

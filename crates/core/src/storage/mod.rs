//! Tiered object storage.
//!
//! Binary artifacts (reports, previews, uploaded files, ticket attachments)
//! are stored by `(prefix, name)` in exactly one active backend per process:
//! the local filesystem or an S3-compatible bucket.

mod error;
mod local;
mod migrate;
mod s3;
mod store;
mod traits;
mod types;

pub use error::StoreError;
pub use local::LocalBackend;
pub use migrate::{migrate_local_to_remote, MigrationOptions, MigrationReport, PrefixReport};
pub use s3::S3Backend;
pub use store::{ObjectStore, StorageMode, MAX_NAME_ATTEMPTS};
pub use traits::ObjectBackend;
pub use types::{
    client_basename, content_type_for, numbered_name, split_extension, validate_name, ObjectMetadata,
    ObjectSource, ObjectStream, Prefix, DEFAULT_CONTENT_TYPE,
};

//! Local schema cache storage.
//!
//! One cache slot per directory:
//! - `metadata.json`: the committed [`CacheMetadata`](crate::CacheMetadata) record
//! - `schema-<checksum>.<ext>`: the document it points at
//!
//! Renaming `metadata.json` into place is the commit point of every write.

mod freshness;
mod local;

pub use freshness::{is_fresh, ttl_duration};
pub use local::{LocalStore, METADATA_FILE};

#[cfg(test)]
pub(crate) use local::FaultPoint;

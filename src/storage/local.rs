//! Filesystem cache slot.
//!
//! # Write protocol
//!
//! 1. Document bytes go to `<name>.tmp`, are fsynced and renamed to the
//!    content-addressed `schema-<checksum>.<ext>`.
//! 2. Metadata goes to `metadata.json.tmp`, is fsynced and renamed over
//!    `metadata.json`. This rename commits the write.
//! 3. Document files no longer referenced are removed.
//!
//! A crash anywhere before step 2 leaves the previous entry readable. A
//! metadata record whose document is missing or does not match its checksum
//! is reported as absent, never as a valid entry.

use crate::config::DEFAULT_MAX_DOCUMENT_BYTES;
use crate::models::{CacheMetadata, SchemaDocument};
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Name of the committed metadata record.
pub const METADATA_FILE: &str = "metadata.json";

const METADATA_TMP_FILE: &str = "metadata.json.tmp";
const DOCUMENT_PREFIX: &str = "schema-";
const TMP_SUFFIX: &str = ".tmp";

/// Maximum metadata file size (1MB).
const MAX_METADATA_SIZE: u64 = 1024 * 1024;

/// Points in the write protocol where a test can simulate a crash.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultPoint {
    /// After the document temp file is written, before its rename.
    BeforeDocumentRename,
    /// After the document rename, before any metadata is written.
    AfterDocumentRename,
    /// After `metadata.json.tmp` is written, before the commit rename.
    BeforeMetadataRename,
}

/// Filesystem-backed schema cache slot.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    max_document_bytes: u64,
    #[cfg(test)]
    fault: std::sync::Mutex<Option<FaultPoint>>,
}

impl LocalStore {
    /// Opens the cache slot at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::io("create_cache_dir", &e))?;
        Ok(Self {
            dir,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            #[cfg(test)]
            fault: std::sync::Mutex::new(None),
        })
    }

    /// Sets the largest document accepted on read or write.
    #[must_use]
    pub const fn with_max_document_bytes(mut self, max: u64) -> Self {
        self.max_document_bytes = max;
        self
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Reads only the committed metadata record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] for filesystem failures other than a missing
    /// file. Unparseable records are logged and reported as `None`.
    pub fn metadata(&self) -> Result<Option<CacheMetadata>> {
        let path = self.metadata_path();
        let Some(bytes) = read_bounded(&path, MAX_METADATA_SIZE, "read_metadata")? else {
            return Ok(None);
        };

        match serde_json::from_slice::<CacheMetadata>(&bytes) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring corrupt cache metadata"
                );
                metrics::counter!("schema_cache_corrupt_total", "reason" => "metadata")
                    .increment(1);
                Ok(None)
            },
        }
    }

    /// Reads the cached document and its metadata.
    ///
    /// Returns `None` when nothing is cached or the entry is corrupt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] for filesystem failures other than missing files.
    pub fn read(&self) -> Result<Option<(SchemaDocument, CacheMetadata)>> {
        let Some(metadata) = self.metadata()? else {
            return Ok(None);
        };
        self.read_entry(metadata)
    }

    /// Loads the document `metadata` points at.
    fn read_entry(
        &self,
        mut metadata: CacheMetadata,
    ) -> Result<Option<(SchemaDocument, CacheMetadata)>> {
        let mut bytes = self.read_document(&metadata)?;
        if bytes.is_none() {
            // A concurrent write may have committed and pruned this document.
            match self.metadata()? {
                None => return Ok(None),
                Some(current) if current.document_file_name() != metadata.document_file_name() => {
                    bytes = self.read_document(&current)?;
                    metadata = current;
                },
                Some(_) => {},
            }
        }

        let path = self.dir.join(metadata.document_file_name());
        let Some(bytes) = bytes else {
            report_corrupt(&path, "document referenced by metadata is missing or too large");
            return Ok(None);
        };

        let Ok(text) = String::from_utf8(bytes) else {
            report_corrupt(&path, "document is not valid UTF-8");
            return Ok(None);
        };

        let document = SchemaDocument::new(text, metadata.format);
        if !metadata.matches(&document) {
            report_corrupt(&path, "document does not match recorded checksum");
            return Ok(None);
        }

        Ok(Some((document, metadata)))
    }

    fn read_document(&self, metadata: &CacheMetadata) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(metadata.document_file_name());
        read_bounded(&path, self.max_document_bytes, "read_document")
    }

    /// Returns true if a readable, uncorrupted entry exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        matches!(self.read(), Ok(Some(_)))
    }

    /// Atomically replaces the cached entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `metadata` does not describe
    /// `document` or the document exceeds the size limit, and [`Error::Io`]
    /// if any filesystem step fails. On error the previous entry remains.
    pub fn write(&self, document: &SchemaDocument, metadata: &CacheMetadata) -> Result<()> {
        if !metadata.matches(document) {
            return Err(Error::InvalidInput(
                "metadata checksum does not match document".to_string(),
            ));
        }
        if metadata.size_bytes > self.max_document_bytes {
            return Err(Error::InvalidInput(format!(
                "schema document of {} bytes exceeds limit of {} bytes",
                metadata.size_bytes, self.max_document_bytes
            )));
        }
        if metadata.format != document.format() {
            return Err(Error::InvalidInput(format!(
                "metadata format '{}' does not match document format '{}'",
                metadata.format,
                document.format()
            )));
        }

        fs::create_dir_all(&self.dir).map_err(|e| Error::io("create_cache_dir", &e))?;

        let document_name = metadata.document_file_name();
        let document_path = self.dir.join(&document_name);
        let document_tmp = self.dir.join(format!("{document_name}{TMP_SUFFIX}"));
        write_synced(&document_tmp, document.as_bytes(), "write_document")?;
        #[cfg(test)]
        self.check_fault(FaultPoint::BeforeDocumentRename)?;
        fs::rename(&document_tmp, &document_path).map_err(|e| Error::io("rename_document", &e))?;
        #[cfg(test)]
        self.check_fault(FaultPoint::AfterDocumentRename)?;

        let json = serde_json::to_vec_pretty(metadata).map_err(|e| Error::OperationFailed {
            operation: "serialize_metadata".to_string(),
            cause: e.to_string(),
        })?;
        let metadata_tmp = self.dir.join(METADATA_TMP_FILE);
        write_synced(&metadata_tmp, &json, "write_metadata")?;
        #[cfg(test)]
        self.check_fault(FaultPoint::BeforeMetadataRename)?;
        fs::rename(&metadata_tmp, self.metadata_path())
            .map_err(|e| Error::io("commit_metadata", &e))?;
        sync_dir(&self.dir);

        tracing::debug!(
            dir = %self.dir.display(),
            document = %document_name,
            size_bytes = metadata.size_bytes,
            source = metadata.source.as_str(),
            "Committed schema cache entry"
        );

        self.prune_documents(Some(&document_name));
        Ok(())
    }

    /// Removes the cached entry.
    ///
    /// Returns true if a committed entry existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the metadata record cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        let existed = match fs::remove_file(self.metadata_path()) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(Error::io("remove_metadata", &e)),
        };
        self.prune_documents(None);
        Ok(existed)
    }

    /// Deletes document and temp files other than `keep`.
    fn prune_documents(&self, keep: Option<&str>) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to list cache dir");
                return;
            },
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let is_ours = name.starts_with(DOCUMENT_PREFIX)
                || (keep.is_none() && name == METADATA_TMP_FILE);
            if !is_ours || Some(name) == keep {
                continue;
            }
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::warn!(file = name, error = %e, "Failed to remove stale cache file");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn inject_fault(&self, point: Option<FaultPoint>) {
        *self
            .fault
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = point;
    }

    #[cfg(test)]
    fn check_fault(&self, point: FaultPoint) -> Result<()> {
        let armed = *self
            .fault
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if armed == Some(point) {
            return Err(Error::Io {
                operation: "injected_fault".to_string(),
                cause: format!("{point:?}"),
            });
        }
        Ok(())
    }
}

/// Reads a file, returning `None` if it is missing or larger than `max`.
fn read_bounded(path: &Path, max: u64, operation: &str) -> Result<Option<Vec<u8>>> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(operation, &e)),
    };
    if size > max {
        tracing::warn!(
            path = %path.display(),
            size,
            max,
            "Cache file exceeds size limit"
        );
        return Ok(None);
    }

    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(operation, &e)),
    }
}

fn write_synced(path: &Path, bytes: &[u8], operation: &str) -> Result<()> {
    let mut file = File::create(path).map_err(|e| Error::io(operation, &e))?;
    file.write_all(bytes).map_err(|e| Error::io(operation, &e))?;
    file.sync_all().map_err(|e| Error::io(operation, &e))
}

/// Flushes directory entries so renames survive power loss. Not supported
/// on every platform, so failures are ignored.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

fn report_corrupt(path: &Path, reason: &'static str) {
    tracing::warn!(path = %path.display(), reason, "Ignoring corrupt cache entry");
    metrics::counter!("schema_cache_corrupt_total", "reason" => "document").increment(1);
}

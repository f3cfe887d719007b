//! Snapshot Module
//!
//! Dumps the value-only view of a store to a file and loads it back. TTLs
//! are not persisted: loaded entries get the store's default TTL.
//!
//! A dump copies the entries under a short read lock and writes the copy
//! afterwards, so writes racing the dump may or may not be included.

mod codec;

pub use codec::{decode, encode, MAGIC, VERSION};

use std::path::Path;

use tokio::fs;
use tracing::info;

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};

impl CacheStore<String, String> {
    // == Dump ==
    /// Writes every live key/value pair to `destination`, creating parent
    /// directories as needed. Returns the number of entries written.
    pub async fn dump(&self, destination: impl AsRef<Path>) -> Result<usize> {
        let path = destination.as_ref();
        let entries = self.snapshot_entries();
        let image = encode(&entries)?;

        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent, e))?;
        }
        fs::write(path, &image)
            .await
            .map_err(|e| CacheError::io(path, e))?;

        info!(
            path = %path.display(),
            entries = entries.len(),
            bytes = image.len(),
            "Snapshot dumped"
        );
        Ok(entries.len())
    }

    // == Load ==
    /// Replaces the store contents with the snapshot at `source`.
    ///
    /// The file is read and decoded in full first; on any failure the store
    /// is left untouched. Returns the number of entries loaded.
    pub async fn load(&self, source: impl AsRef<Path>) -> Result<usize> {
        let path = source.as_ref();
        let image = fs::read(path).await.map_err(|e| CacheError::io(path, e))?;
        let entries = decode(&image)?;

        let count = self.replace_all(entries)?;
        info!(
            path = %path.display(),
            entries = count,
            ttl_ms = self.default_ttl().as_millis() as u64,
            "Snapshot loaded"
        );
        Ok(count)
    }
}

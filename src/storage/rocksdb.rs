//! Shared RocksDB storage utilities.
//!
//! Generic helpers for RocksDB-based storage: configuration, a handle with
//! bincode-serialized get/put, and iteration. No forum logic lives here.

use crate::error::{ForumError, Result};
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

// =============================================================================
// RocksDB Configuration
// =============================================================================

/// Configuration for RocksDB storage.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Number of log files to keep.
    pub keep_log_file_num: usize,
    /// Maximum WAL size in bytes.
    pub max_wal_size: u64,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Maximum number of write buffers.
    pub max_write_buffer_number: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 64,
            keep_log_file_num: 2,
            max_wal_size: 16 * 1024 * 1024,      // 16MB
            write_buffer_size: 8 * 1024 * 1024,  // 8MB
            max_write_buffer_number: 2,
        }
    }
}

impl RocksDbConfig {
    /// Builds RocksDB Options from this configuration.
    pub fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_keep_log_file_num(self.keep_log_file_num);
        opts.set_max_total_wal_size(self.max_wal_size);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

/// Big-endian key for a numeric id, so byte order matches numeric order for
/// non-negative ids.
pub fn id_key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Concatenates two id keys, for prefix-iterable indexes.
pub fn pair_key(first: i64, second: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&id_key(first));
    key.extend_from_slice(&id_key(second));
    key
}

// =============================================================================
// Database Handle Wrapper
// =============================================================================

/// A wrapper around RocksDB that provides common operations.
///
/// Embedded in storage structs to share the plumbing while they add their
/// own key layout.
pub struct RocksDbHandle {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksDbHandle {
    /// Opens a RocksDB database with the given column families.
    pub fn open(
        db_path: impl AsRef<Path>,
        config: &RocksDbConfig,
        column_families: &[&str],
    ) -> Result<Self> {
        let opts = config.build_options();
        let cf_opts = Options::default();

        let cf_descriptors: Vec<_> = column_families
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(*cf, cf_opts.clone()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &opts,
            db_path.as_ref(),
            cf_descriptors,
        )
        .map_err(|e| ForumError::storage(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Gets a column family handle.
    pub fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ForumError::storage(format!("Column family '{}' not found", name)))
    }

    /// Stores a serializable value at the given key.
    pub fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = bincode::serialize(value)
            .map_err(|e| ForumError::serialization(format!("Failed to serialize: {}", e)))?;

        trace!(
            cf = cf_name,
            key_len = key.len(),
            value_bytes = bytes.len(),
            "db_put: storing serialized value"
        );

        self.db
            .put_cf(&cf, key, &bytes)
            .map_err(|e| ForumError::storage(format!("Failed to write: {}", e)))?;

        Ok(())
    }

    /// Stores raw bytes at the given key.
    pub fn put_raw(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;

        trace!(
            cf = cf_name,
            key_len = key.len(),
            value_bytes = value.len(),
            "db_put_raw: storing raw bytes"
        );

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| ForumError::storage(format!("Failed to write: {}", e)))?;
        Ok(())
    }

    /// Loads and deserializes a value from the given key.
    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;

        match self.db.get_cf(&cf, key) {
            Ok(Some(bytes)) => {
                trace!(
                    cf = cf_name,
                    key_len = key.len(),
                    value_bytes = bytes.len(),
                    "db_get: found record"
                );
                let value: T = bincode::deserialize(&bytes).map_err(|e| {
                    ForumError::serialization(format!("Failed to deserialize: {}", e))
                })?;
                Ok(Some(value))
            }
            Ok(None) => {
                trace!(cf = cf_name, key_len = key.len(), "db_get: key not found");
                Ok(None)
            }
            Err(e) => Err(ForumError::storage(format!("Failed to read: {}", e))),
        }
    }

    /// Checks if a key exists.
    pub fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map(|v| v.is_some())
            .map_err(|e| ForumError::storage(format!("Failed to check key: {}", e)))
    }

    /// Iterates over all entries with the given prefix.
    ///
    /// The callback receives (key, value) pairs and returns true to continue
    /// or false to stop.
    pub fn prefix_iterate<F>(&self, cf_name: &str, prefix: &[u8], mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let mut iter = self.db.raw_iterator_cf(&cf);
        iter.seek(prefix);

        let mut count: usize = 0;
        while iter.valid() {
            let (Some(key), Some(value)) = (iter.key(), iter.value()) else {
                break;
            };
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
            if !callback(key, value) {
                break;
            }
            iter.next();
        }

        debug!(
            cf = cf_name,
            prefix_len = prefix.len(),
            records_iterated = count,
            "db_prefix_iterate: completed iteration"
        );

        Ok(())
    }

    /// Iterates over all entries in a column family, in key order.
    pub fn iterate_all<F>(&self, cf_name: &str, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let iter = self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start);

        let mut count: usize = 0;
        for item in iter {
            match item {
                Ok((key, value)) => {
                    count += 1;
                    if !callback(&key, &value) {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Iterator error: {}", e);
                }
            }
        }

        debug!(
            cf = cf_name,
            records_iterated = count,
            "db_iterate_all: completed full iteration"
        );

        Ok(())
    }

    /// Collects and deserializes every value of a column family. Values that
    /// fail to deserialize are skipped with a warning.
    pub fn collect_all<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut errors: usize = 0;

        self.iterate_all(cf_name, |_, value| {
            match bincode::deserialize(value) {
                Ok(item) => results.push(item),
                Err(e) => {
                    errors += 1;
                    warn!("Failed to deserialize item: {}", e);
                }
            }
            true
        })?;

        debug!(
            cf = cf_name,
            records_collected = results.len(),
            deserialization_errors = errors,
            "db_collect_all: collected records"
        );

        Ok(results)
    }
}

impl std::fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbHandle")
            .field("db", &"RocksDB")
            .finish()
    }
}

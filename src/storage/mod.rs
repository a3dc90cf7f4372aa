//! Storage utilities and abstractions.
//!
//! Shared storage infrastructure used by the persistent forum backend.
//!
//! ## Modules
//!
//! - `rocksdb`: Generic RocksDB utilities (configuration, handle, iteration)

pub mod rocksdb;

pub use rocksdb::{id_key, pair_key, RocksDbConfig, RocksDbHandle};

//! Key-value store abstraction and its backends
//!
//! # Tables
//!
//! - `projects` - Project records (key: project_id, big-endian)
//! - `collaborators` - Share records (key: project_id || principal)
//! - `meta` - Counters and chain height (key: ASCII name)
//! - `events` - Append-only event log (key: sequence, big-endian)
//!
//! The ledger never deletes keys. Every mutating operation hands the store
//! exactly one [`ChangeSet`], which a backend must apply atomically.

use crate::{
    error::{Error, Result},
    Config,
};
use parking_lot::RwLock;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, Options,
    SingleThreaded, WriteBatch,
};
use std::collections::BTreeMap;
use std::fmt;

type Db = DBWithThreadMode<SingleThreaded>;

/// Logical table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    /// Project records
    Projects,
    /// Collaborator share records
    Collaborators,
    /// Counters
    Meta,
    /// Event log
    Events,
}

impl Table {
    /// Every table, in column family creation order
    pub const ALL: [Table; 4] = [
        Table::Projects,
        Table::Collaborators,
        Table::Meta,
        Table::Events,
    ];

    /// Column family name
    pub fn name(&self) -> &'static str {
        match self {
            Table::Projects => "projects",
            Table::Collaborators => "collaborators",
            Table::Meta => "meta",
            Table::Events => "events",
        }
    }
}

/// Buffered writes of one operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    writes: Vec<(Table, Vec<u8>, Vec<u8>)>,
}

impl ChangeSet {
    /// Create empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>) {
        self.writes.push((table, key, value));
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Iterate queued writes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (Table, &[u8], &[u8])> {
        self.writes
            .iter()
            .map(|(table, key, value)| (*table, key.as_slice(), value.as_slice()))
    }
}

/// Persistent key-value state the ledger reads and writes through
pub trait KvStore: Send + Sync {
    /// Point read
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every write in `changes` or none of them
    fn apply(&self, changes: &ChangeSet) -> Result<()>;
}

/// In-memory store, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<(Table, Vec<u8>), Vec<u8>>>,
}

impl MemoryStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of the full contents
    pub fn snapshot(&self) -> BTreeMap<(Table, Vec<u8>), Vec<u8>> {
        self.entries.read().clone()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(&(table, key.to_vec())).cloned())
    }

    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self.entries.read();
        let found = entries
            .range((table, prefix.to_vec())..)
            .take_while(|((t, key), _)| *t == table && key.starts_with(prefix))
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect();
        Ok(found)
    }

    fn apply(&self, changes: &ChangeSet) -> Result<()> {
        let mut entries = self.entries.write();
        for (table, key, value) in changes.iter() {
            entries.insert((table, key.to_vec()), value.to_vec());
        }
        Ok(())
    }
}

/// RocksDB-backed store, one column family per table
pub struct RocksStore {
    db: Db,
}

impl fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = Table::ALL
            .iter()
            .map(|table| ColumnFamilyDescriptor::new(table.name(), Self::cf_options(*table)))
            .collect::<Vec<_>>();

        let db = Db::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, tables = Table::ALL.len(), "Opened RocksDB");

        Ok(Self { db })
    }

    fn cf_options(table: Table) -> Options {
        let mut opts = Options::default();
        match table {
            // Append-only, rarely read back
            Table::Events => {
                opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
            }
            // Prefix-scanned per project on every distribution
            Table::Collaborators => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                let mut block_opts = rocksdb::BlockBasedOptions::default();
                block_opts.set_bloom_filter(10.0, false);
                opts.set_block_based_table_factory(&block_opts);
            }
            Table::Projects | Table::Meta => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            }
        }
        opts
    }

    fn cf_handle(&self, table: Table) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(table.name())
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", table.name())))
    }

    /// Approximate number of keys in a table
    pub fn approximate_count(&self, table: Table) -> Result<u64> {
        let cf = self.cf_handle(table)?;
        let count = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(count)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

impl KvStore for RocksStore {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(table)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf_handle(table)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut found = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            found.push((key.to_vec(), value.to_vec()));
        }
        Ok(found)
    }

    fn apply(&self, changes: &ChangeSet) -> Result<()> {
        let mut batch = WriteBatch::default();
        for (table, key, value) in changes.iter() {
            let cf = self.cf_handle(table)?;
            batch.put_cf(cf, key, value);
        }

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(writes = changes.len(), "Change set applied");
        Ok(())
    }
}

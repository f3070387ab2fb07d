// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! RocksDB-backed document database.
//!
//! The regular and intents spaces live in two separate RocksDB instances under
//! `<path>/regular` and `<path>/intents`. Reads go through RocksDB snapshots.

use std::path::Path;

use rocksdb::{
    DBRawIteratorWithThreadMode, DBWithThreadMode, MultiThreaded, Options,
    SnapshotWithThreadMode, WriteBatch as RocksWriteBatch, WriteOptions,
};

use super::{DocDbSnapshot, KvCursor, Space, StorageError, WriteBatch, WriteOp};

type Db = DBWithThreadMode<MultiThreaded>;

/// Durability mode for write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Writes are synced to WAL but not fsynced to disk.
    /// Durable against process crashes but not power failures.
    #[default]
    WalOnly,
    /// Writes are fsynced to disk on every operation.
    FsyncEveryWrite,
}

/// Two RocksDB instances holding the regular and intents spaces.
pub struct RocksDocDb {
    regular: Db,
    intents: Db,
    write_opts: WriteOptions,
    sync_write_opts: WriteOptions,
}

impl RocksDocDb {
    /// Opens or creates both spaces under `path`.
    ///
    /// Uses `DurabilityMode::WalOnly` by default.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::open_with_durability(path, DurabilityMode::default())
    }

    /// Opens or creates both spaces with the specified durability mode.
    pub fn open_with_durability(path: &Path, durability: DurabilityMode) -> Result<Self, StorageError> {
        Self::open_with_options(path, Self::default_options(), durability)
    }

    /// Opens both spaces with custom RocksDB options.
    pub fn open_with_options(
        path: &Path,
        opts: Options,
        durability: DurabilityMode,
    ) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let regular = Db::open(&opts, path.join("regular"))?;
        let intents = Db::open(&opts, path.join("intents"))?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(durability == DurabilityMode::FsyncEveryWrite);

        let mut sync_write_opts = WriteOptions::default();
        sync_write_opts.set_sync(true);

        Ok(Self {
            regular,
            intents,
            write_opts,
            sync_write_opts,
        })
    }

    fn default_options() -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        opts.set_write_buffer_size(64 * 1024 * 1024); // 64MB
        opts.set_max_write_buffer_number(4);
        opts.set_target_file_size_base(64 * 1024 * 1024);
        opts.set_level_compaction_dynamic_level_bytes(true);

        // Point lookups by logical key dominate intent resolution.
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);

        opts
    }

    /// Applies a batch using the configured durability mode.
    pub fn apply<B: AsRef<WriteBatch>>(&self, batch: &B) -> Result<(), StorageError> {
        self.apply_opt(batch.as_ref(), &self.write_opts)
    }

    /// Applies a batch with explicit fsync, regardless of durability mode.
    pub fn apply_sync<B: AsRef<WriteBatch>>(&self, batch: &B) -> Result<(), StorageError> {
        self.apply_opt(batch.as_ref(), &self.sync_write_opts)
    }

    /// Writes the regular space before the intents space. Readers capture the
    /// spaces in the opposite order, so an applied transaction is never missed.
    fn apply_opt(&self, batch: &WriteBatch, opts: &WriteOptions) -> Result<(), StorageError> {
        for (space, db) in [(Space::Regular, &self.regular), (Space::Intents, &self.intents)] {
            let mut rocks_batch = RocksWriteBatch::default();
            for op in batch.ops_in(space) {
                match op {
                    WriteOp::Put { key, value, .. } => rocks_batch.put(key, value),
                    WriteOp::Delete { key, .. } => rocks_batch.delete(key),
                }
            }
            if !rocks_batch.is_empty() {
                db.write_opt(rocks_batch, opts)?;
            }
        }
        Ok(())
    }

    /// Flushes both spaces to disk.
    pub fn sync(&self) -> Result<(), StorageError> {
        self.regular.flush()?;
        self.intents.flush()?;
        Ok(())
    }

    /// Captures both spaces, intents first.
    pub fn snapshot(&self) -> RocksSnapshot<'_> {
        let intents = self.intents.snapshot();
        let regular = self.regular.snapshot();
        RocksSnapshot { regular, intents }
    }
}

/// RocksDB snapshots of both spaces.
pub struct RocksSnapshot<'a> {
    regular: SnapshotWithThreadMode<'a, Db>,
    intents: SnapshotWithThreadMode<'a, Db>,
}

impl<'s> DocDbSnapshot for RocksSnapshot<'s> {
    type Cursor<'a> = RocksCursor<'a> where Self: 'a;

    fn regular_cursor(&self) -> RocksCursor<'_> {
        RocksCursor {
            iter: self.regular.raw_iterator(),
        }
    }

    fn intents_cursor(&self) -> RocksCursor<'_> {
        RocksCursor {
            iter: self.intents.raw_iterator(),
        }
    }
}

/// Cursor over a RocksDB snapshot.
pub struct RocksCursor<'a> {
    iter: DBRawIteratorWithThreadMode<'a, Db>,
}

impl KvCursor for RocksCursor<'_> {
    fn seek(&mut self, target: &[u8]) {
        self.iter.seek(target);
    }

    fn seek_to_first(&mut self) {
        self.iter.seek_to_first();
    }

    fn seek_to_last(&mut self) {
        self.iter.seek_to_last();
    }

    fn next(&mut self) {
        if self.iter.valid() {
            self.iter.next();
        }
    }

    fn prev(&mut self) {
        if self.iter.valid() {
            self.iter.prev();
        }
    }

    fn valid(&self) -> bool {
        self.iter.valid()
    }

    fn key(&self) -> &[u8] {
        self.iter.key().unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.iter.value().unwrap_or_default()
    }

    fn status(&self) -> Result<(), StorageError> {
        self.iter.status().map_err(StorageError::from)
    }
}

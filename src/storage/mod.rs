//! The six RocksDB column families the engine persists to: the three covering indexes, the
//! giants overflow table, the schema catalog, and the meta table.

use crate::error::StoreError;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, ReadOptions, WriteBatch, DB};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub const CF_EAV: &str = "eav";
pub const CF_AVE: &str = "ave";
pub const CF_VEA: &str = "vea";
pub const CF_GIANTS: &str = "giants";
pub const CF_SCHEMA: &str = "schema";
pub const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 6] = [CF_EAV, CF_AVE, CF_VEA, CF_GIANTS, CF_SCHEMA, CF_META];

/// Direction for a range scan over one column family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Thin wrapper over the RocksDB handle. Holds no index-specific knowledge; [`crate::store`]
/// decides what goes in which column family and how it's encoded.
///
/// `db` sits behind a `RwLock` purely so [`IndexSet::close`] can take `&self`: every read and
/// write operation below only ever takes the read side, RocksDB itself serializes concurrent
/// writers.
pub struct IndexSet {
    db: RwLock<Option<DB>>,
    path: PathBuf,
}

impl IndexSet {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));

        let db = DB::open_cf_descriptors(&db_opts, &path, cf_descriptors)?;
        Ok(IndexSet {
            db: RwLock::new(Some(db)),
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.db.read().expect("lock poisoned").is_none()
    }

    pub fn close(&self) {
        *self.db.write().expect("lock poisoned") = None;
    }

    fn cf<'a>(&self, db: &'a DB, name: &str) -> Result<&'a rocksdb::ColumnFamily, StoreError> {
        db.cf_handle(name)
            .ok_or_else(|| StoreError::Corrupt(format!("missing column family '{name}'")))
    }

    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.db.read().expect("lock poisoned");
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        let cf = self.cf(db, cf_name)?;
        Ok(db.get_cf(cf, key)?)
    }

    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let guard = self.db.read().expect("lock poisoned");
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        let cf = self.cf(db, cf_name)?;
        Ok(db.put_cf(cf, key, value)?)
    }

    /// Runs one atomic batch of writes, built via `build`. `build` receives the `DB` handle so
    /// it can resolve column family handles itself.
    pub fn write_batch<F>(&self, build: F) -> Result<(), StoreError>
    where
        F: FnOnce(&DB, &mut WriteBatch) -> Result<(), StoreError>,
    {
        let guard = self.db.read().expect("lock poisoned");
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        let mut batch = WriteBatch::default();
        build(db, &mut batch)?;
        Ok(db.write(batch)?)
    }

    pub fn cf_handle<'a>(&self, db: &'a DB, name: &str) -> Result<&'a rocksdb::ColumnFamily, StoreError> {
        self.cf(db, name)
    }

    /// Iterates every entry in one column family, in the given direction. Used for schema load
    /// and giant-id recovery, where there is no natural range bound to compute.
    pub fn scan_all(&self, cf_name: &str, direction: Direction) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, StoreError> {
        let guard = self.db.read().expect("lock poisoned");
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        let cf = self.cf(db, cf_name)?;
        let mode = match direction {
            Direction::Forward => IteratorMode::Start,
            Direction::Reverse => IteratorMode::End,
        };
        let iter = db.iterator_cf(cf, mode);
        let mut out = Vec::new();
        for item in iter {
            let (k, v) = item?;
            out.push((k, v));
        }
        Ok(out)
    }

    /// Iterates one column family between `lower` (inclusive) and `upper` (exclusive), in the
    /// given direction. Bounds are raw bytes; callers compute them via [`crate::codec`].
    pub fn range(
        &self,
        cf_name: &str,
        lower: &[u8],
        upper: &[u8],
        direction: Direction,
    ) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>, StoreError> {
        let guard = self.db.read().expect("lock poisoned");
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        let cf = self.cf(db, cf_name)?;
        let mut opts = ReadOptions::default();
        opts.set_iterate_lower_bound(lower.to_vec());
        opts.set_iterate_upper_bound(upper.to_vec());

        let mode = match direction {
            Direction::Forward => IteratorMode::Start,
            Direction::Reverse => IteratorMode::End,
        };
        let iter = db.iterator_cf_opt(cf, opts, mode);
        let mut out = Vec::new();
        for item in iter {
            let (k, v) = item?;
            out.push((k, v));
        }
        Ok(out)
    }
}

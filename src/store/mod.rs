//! The `Store` facade: schema catalog, transactional ingestion, and ranged retrieval over a
//! RocksDB-backed set of covering indexes.

pub mod catalog;
pub mod ingest;
pub mod retrieve;

pub use catalog::CatalogSnapshot;
pub use retrieve::Bound;

use crate::clock::{Clock, SystemClock};
use crate::codec::{self, Index};
use crate::datom::{Datom, Value};
use crate::error::{Result, StoreError};
use crate::schema::{Attribute, AttributeProperties, ReverseSchema, Schema};
use crate::storage::{IndexSet, CF_META};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

const META_LAST_MODIFIED: &[u8] = b"last-modified";

/// Tunables for a [`Store`]. There is no file-based configuration layer — the CLI that would
/// read one is out of scope here — so this is constructed directly by the embedding process.
///
/// `max_key_size` is validated against [`codec::MAX_KEY_SIZE`] on [`Store::open_with`] rather than
/// flowing into the codec as a live parameter: see [`codec::validate_max_key_size`] for why.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub batch_size: usize,
    pub max_key_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            batch_size: ingest::TX_DATOM_BATCH_SIZE,
            max_key_size: codec::MAX_KEY_SIZE,
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_key_size(mut self, max_key_size: usize) -> Self {
        self.max_key_size = max_key_size;
        self
    }
}

pub struct Store {
    storage: IndexSet,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    write_lock: Mutex<()>,
    clock: Box<dyn Clock + Send + Sync>,
    options: StoreOptions,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        Self::open_with_clock(path, Box::new(SystemClock), options)
    }

    pub fn open_with_clock(path: impl AsRef<Path>, clock: Box<dyn Clock + Send + Sync>, options: StoreOptions) -> Result<Self> {
        codec::validate_max_key_size(options.max_key_size)?;
        let storage = IndexSet::open(&path)?;
        let snapshot = catalog::load(&storage)?;
        info!(
            "opened store at {:?} ({} attributes, max_gt={})",
            storage.path(),
            snapshot.schema.len(),
            snapshot.max_gt
        );
        Ok(Store {
            storage,
            snapshot: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
            clock,
            options,
        })
    }

    pub fn close(&self) {
        debug!("closing store at {:?}", self.storage.path());
        self.storage.close();
    }

    pub fn is_closed(&self) -> bool {
        self.storage.is_closed()
    }

    pub fn directory(&self) -> &Path {
        self.storage.path()
    }

    fn current(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().expect("lock poisoned").clone()
    }

    pub fn schema(&self) -> Schema {
        self.current().schema.clone()
    }

    pub fn rschema(&self) -> ReverseSchema {
        self.current().rschema.clone()
    }

    pub fn attrs(&self) -> std::collections::HashMap<u32, std::rc::Rc<str>> {
        self.current().attrs.clone()
    }

    pub fn max_aid(&self) -> u32 {
        self.current().max_aid
    }

    pub fn max_gt(&self) -> u64 {
        self.current().max_gt
    }

    pub fn last_modified(&self) -> Result<Option<u64>> {
        let bytes = self.storage.get(CF_META, META_LAST_MODIFIED)?;
        Ok(bytes.map(|b| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&b);
            u64::from_be_bytes(buf)
        }))
    }

    /// Declares or updates attributes. New attributes are assigned a fresh `aid`; existing ones
    /// are merged through the same migration checks as [`Store::swap_attr`].
    pub fn set_schema(&self, attributes: Vec<Attribute>) -> Result<()> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        let mut snapshot = (*self.current()).clone();

        for attr in attributes {
            let ident: std::rc::Rc<str> = std::rc::Rc::from(attr.ident.as_str());
            let new_props = match snapshot.schema.get(ident.as_ref()) {
                Some(existing) => {
                    let mut merged = existing.clone();
                    merged.cardinality = attr.cardinality;
                    merged.unique = attr.unique;
                    merged.is_component = attr.is_component;
                    merged.doc = attr.doc.clone();
                    merged.value_type = attr.value_type;
                    catalog::check_migration(&self.storage, &ident, existing, &merged)?;
                    merged
                }
                None => {
                    let aid = catalog::next_aid(&snapshot);
                    AttributeProperties {
                        aid,
                        value_type: attr.value_type,
                        cardinality: attr.cardinality,
                        unique: attr.unique,
                        is_component: attr.is_component,
                        doc: attr.doc.clone(),
                    }
                }
            };
            catalog::persist(&self.storage, &ident, &new_props)?;
            info!("attribute {ident} registered with aid {}", new_props.aid);
            snapshot.schema.insert(ident.clone(), new_props);
            snapshot.max_aid = snapshot.max_aid.max(snapshot.schema[&ident].aid);
        }
        snapshot.rschema = crate::schema::derive_reverse_schema(&snapshot.schema);
        snapshot.attrs = crate::schema::derive_attrs_by_id(&snapshot.schema);
        self.publish(snapshot);
        Ok(())
    }

    /// Atomically mutates one attribute's properties, applying the same migration checks as
    /// [`Store::set_schema`].
    pub fn swap_attr(&self, ident: &str, f: impl FnOnce(AttributeProperties) -> AttributeProperties) -> Result<()> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        let mut snapshot = (*self.current()).clone();

        let old = snapshot
            .schema
            .get(ident)
            .cloned()
            .unwrap_or_else(|| AttributeProperties::new(catalog::next_aid(&snapshot), crate::datom::ValueType::Str));
        let new_props = f(old.clone());
        if snapshot.schema.contains_key(ident) {
            if let Err(e) = catalog::check_migration(&self.storage, ident, &old, &new_props) {
                warn!("refused schema change for {ident}: {e}");
                return Err(e);
            }
        }
        catalog::persist(&self.storage, ident, &new_props)?;
        let ident_rc: std::rc::Rc<str> = std::rc::Rc::from(ident);
        snapshot.max_aid = snapshot.max_aid.max(new_props.aid);
        snapshot.schema.insert(ident_rc, new_props);
        snapshot.rschema = crate::schema::derive_reverse_schema(&snapshot.schema);
        snapshot.attrs = crate::schema::derive_attrs_by_id(&snapshot.schema);
        self.publish(snapshot);
        Ok(())
    }

    fn publish(&self, snapshot: CatalogSnapshot) {
        *self.snapshot.write().expect("lock poisoned") = Arc::new(snapshot);
    }

    /// Ingests `datoms`, committing in fixed-size atomic batches. Mutually exclusive with itself
    /// and with [`Store::swap_attr`]/[`Store::set_schema`].
    pub fn load_datoms(&self, datoms: &[Datom]) -> Result<()> {
        let _guard = self.write_lock.lock().expect("lock poisoned");
        let snapshot = (*self.current()).clone();
        let updated = ingest::load_datoms(&self.storage, snapshot, self.clock.as_ref(), datoms, self.options.batch_size)?;
        debug!("committed {} datoms for store at {:?}", datoms.len(), self.storage.path());
        self.publish(updated);
        Ok(())
    }

    pub fn fetch(&self, entity: u64, attribute: &str, value: &Value) -> Result<Option<Datom>> {
        retrieve::fetch(&self.storage, &self.current(), entity, attribute, value)
    }

    pub fn populated(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>) -> Result<bool> {
        retrieve::populated(&self.storage, &self.current(), index, lo, hi)
    }

    pub fn size(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>) -> Result<u64> {
        retrieve::size(&self.storage, &self.current(), index, lo, hi)
    }

    pub fn head(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>) -> Result<Option<Datom>> {
        retrieve::head(&self.storage, &self.current(), index, lo, hi)
    }

    pub fn tail(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>) -> Result<Option<Datom>> {
        retrieve::tail(&self.storage, &self.current(), index, lo, hi)
    }

    pub fn slice(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>) -> Result<Vec<Datom>> {
        retrieve::slice(&self.storage, &self.current(), index, lo, hi)
    }

    pub fn rslice(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>) -> Result<Vec<Datom>> {
        retrieve::rslice(&self.storage, &self.current(), index, lo, hi)
    }

    pub fn slice_filter(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>, pred: impl Fn(&Datom) -> bool) -> Result<Vec<Datom>> {
        retrieve::slice_filter(&self.storage, &self.current(), index, lo, hi, pred)
    }

    pub fn rslice_filter(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>, pred: impl Fn(&Datom) -> bool) -> Result<Vec<Datom>> {
        retrieve::rslice_filter(&self.storage, &self.current(), index, lo, hi, pred)
    }

    pub fn head_filter(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>, pred: impl Fn(&Datom) -> bool) -> Result<Option<Datom>> {
        retrieve::head_filter(&self.storage, &self.current(), index, lo, hi, pred)
    }

    pub fn tail_filter(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>, pred: impl Fn(&Datom) -> bool) -> Result<Option<Datom>> {
        retrieve::tail_filter(&self.storage, &self.current(), index, lo, hi, pred)
    }

    pub fn size_filter(&self, index: Index, lo: &Bound<'_>, hi: &Bound<'_>, pred: impl Fn(&Datom) -> bool) -> Result<u64> {
        retrieve::size_filter(&self.storage, &self.current(), index, lo, hi, pred)
    }

    pub fn datom_count(&self, index: Index) -> Result<u64> {
        retrieve::datom_count(&self.storage, &self.current(), index)
    }

    pub fn init_max_eid(&self) -> Result<u64> {
        retrieve::init_max_eid(&self.storage, &self.current())
    }
}

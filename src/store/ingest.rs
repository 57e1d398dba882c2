//! Batched, transactional ingestion: turns a slice of [`Datom`]s into atomic writes across the
//! covering indexes, allocating giant ids and attribute ids as it goes.

use super::catalog::{self, CatalogSnapshot};
use crate::clock::Clock;
use crate::codec::{self, Index};
use crate::datom::{Datom, Value};
use crate::error::StoreError;
use crate::schema::AttributeProperties;
use crate::storage::{Direction, IndexSet, CF_AVE, CF_EAV, CF_GIANTS, CF_META, CF_VEA};

/// Number of datoms committed per RocksDB write batch.
pub const TX_DATOM_BATCH_SIZE: usize = 512;

const META_LAST_MODIFIED: &[u8] = b"last-modified";

/// Loads `datoms`, batching commits and returning the catalog snapshot as it stood after the
/// last batch (which may have grown from auto-resolved attributes and giant allocation).
pub fn load_datoms(
    storage: &IndexSet,
    mut snapshot: CatalogSnapshot,
    clock: &dyn Clock,
    datoms: &[Datom],
    batch_size: usize,
) -> Result<CatalogSnapshot, StoreError> {
    for batch in datoms.chunks(batch_size.max(1)) {
        snapshot = load_batch(storage, snapshot, clock, batch)?;
    }
    Ok(snapshot)
}

fn load_batch(
    storage: &IndexSet,
    mut snapshot: CatalogSnapshot,
    clock: &dyn Clock,
    batch: &[Datom],
) -> Result<CatalogSnapshot, StoreError> {
    // Resolve/auto-create attributes before building the write batch: a new attribute is
    // schema state, persisted outside the datom batch itself, exactly like a fresh ident
    // observed for the first time.
    for datom in batch {
        if !snapshot.schema.contains_key(datom.attribute.as_ref()) {
            if !datom.added {
                return Err(StoreError::UnknownAttribute(datom.attribute.to_string()));
            }
            let aid = catalog::next_aid(&snapshot);
            let value_type = datom
                .value
                .value_type()
                .ok_or_else(|| StoreError::Corrupt("cannot infer type from sentinel value".to_string()))?;
            let props = AttributeProperties::new(aid, value_type);
            catalog::persist(storage, &datom.attribute, &props)?;
            snapshot.schema.insert(datom.attribute.clone(), props.clone());
            snapshot.rschema = crate::schema::derive_reverse_schema(&snapshot.schema);
            snapshot.attrs.insert(aid, datom.attribute.clone());
            snapshot.max_aid = snapshot.max_aid.max(aid);
        }
    }

    storage.write_batch(|db, write_batch| {
        for datom in batch {
            let props = snapshot
                .schema
                .get(datom.attribute.as_ref())
                .expect("attribute resolved above")
                .clone();

            if datom.added {
                put_datom(db, write_batch, storage, &mut snapshot, &props, datom)?;
            } else {
                retract_datom(db, write_batch, storage, &mut snapshot, &props, datom)?;
            }
        }

        let cf_meta = storage.cf_handle(db, CF_META)?;
        write_batch.put_cf(cf_meta, META_LAST_MODIFIED, clock.now_millis().to_be_bytes());
        Ok(())
    })?;

    Ok(snapshot)
}

fn put_datom(
    db: &rocksdb::DB,
    write_batch: &mut rocksdb::WriteBatch,
    storage: &IndexSet,
    snapshot: &mut CatalogSnapshot,
    props: &AttributeProperties,
    datom: &Datom,
) -> Result<(), StoreError> {
    let giant = codec::is_giant(&datom.value)?;
    let gt = if giant {
        let id = snapshot.max_gt;
        snapshot.max_gt += 1;
        Some(id)
    } else {
        None
    };
    let stored_value: [u8; 8] = gt.unwrap_or(0).to_be_bytes();

    if let Some(gt) = gt {
        let record = codec::encode_giant_record(datom.entity, props.aid, &datom.value)?;
        let cf_giants = storage.cf_handle(db, CF_GIANTS)?;
        write_batch.put_cf(cf_giants, codec::gt_key(gt), record);
    }

    let eav_key = codec::encode(Index::Eav, datom.entity, props.aid, &datom.value, gt)?;
    let ave_key = codec::encode(Index::Ave, datom.entity, props.aid, &datom.value, gt)?;
    let cf_eav = storage.cf_handle(db, CF_EAV)?;
    let cf_ave = storage.cf_handle(db, CF_AVE)?;
    write_batch.put_cf(cf_eav, eav_key, stored_value);
    write_batch.put_cf(cf_ave, ave_key, stored_value);

    if matches!(datom.value, Value::Ref(_)) {
        let vea_key = codec::encode(Index::Vea, datom.entity, props.aid, &datom.value, gt)?;
        let cf_vea = storage.cf_handle(db, CF_VEA)?;
        write_batch.put_cf(cf_vea, vea_key, stored_value);
    }
    Ok(())
}

fn retract_datom(
    db: &rocksdb::DB,
    write_batch: &mut rocksdb::WriteBatch,
    storage: &IndexSet,
    snapshot: &mut CatalogSnapshot,
    props: &AttributeProperties,
    datom: &Datom,
) -> Result<(), StoreError> {
    let giant = codec::is_giant(&datom.value)?;

    let gt = if giant {
        match find_giant_id(storage, props, datom)? {
            Some(gt) => Some(gt),
            None => return Ok(()), // never asserted: silent no-op on the index deletes
        }
    } else {
        None
    };

    let eav_key = codec::encode(Index::Eav, datom.entity, props.aid, &datom.value, gt)?;
    let ave_key = codec::encode(Index::Ave, datom.entity, props.aid, &datom.value, gt)?;
    let cf_eav = storage.cf_handle(db, CF_EAV)?;
    let cf_ave = storage.cf_handle(db, CF_AVE)?;
    write_batch.delete_cf(cf_eav, eav_key);
    write_batch.delete_cf(cf_ave, ave_key);

    if matches!(datom.value, Value::Ref(_)) {
        let vea_key = codec::encode(Index::Vea, datom.entity, props.aid, &datom.value, gt)?;
        let cf_vea = storage.cf_handle(db, CF_VEA)?;
        write_batch.delete_cf(cf_vea, vea_key);
    }

    if let Some(gt) = gt {
        let cf_giants = storage.cf_handle(db, CF_GIANTS)?;
        write_batch.delete_cf(cf_giants, codec::gt_key(gt));
    }

    Ok(())
}

/// Recovers the giant id assigned to a previously-asserted giant datom by scanning the bounded
/// range of candidates sharing its truncated EAV prefix, verifying each against `giants`.
pub(crate) fn find_giant_id(storage: &IndexSet, props: &AttributeProperties, datom: &Datom) -> Result<Option<u64>, StoreError> {
    let exact_key = codec::encode(Index::Eav, datom.entity, props.aid, &datom.value, Some(0))?;
    let prefix = &exact_key[..codec::EAV_GIANT_PREFIX_LEN];
    let upper = codec::next_prefix(prefix).unwrap_or_else(|| prefix.to_vec());

    let candidates = storage.range(CF_EAV, prefix, &upper, Direction::Forward)?;
    for (_, stored) in candidates {
        if stored.len() != 8 {
            continue;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&stored);
        let gt = u64::from_be_bytes(buf);
        if gt == 0 {
            continue;
        }
        let record = storage.get(CF_GIANTS, &codec::gt_key(gt))?;
        if let Some(bytes) = record {
            let retrieved = codec::decode_giant_record(&bytes)?;
            if retrieved.entity == datom.entity && retrieved.aid == props.aid && retrieved.value == datom.value {
                return Ok(Some(gt));
            }
        }
    }
    Ok(None)
}

//! Schema persistence: encoding attribute properties to/from the `schema` column family,
//! recovering `max_aid`/`max_gt` on open, and the in-memory snapshot readers see.

use crate::codec::serde::{Reader, Writer};
use crate::codec::{self, Index};
use crate::datom::ValueType;
use crate::error::StoreError;
use crate::schema::{
    default::implicit_schema, derive_attrs_by_id, derive_reverse_schema, AttributeProperties,
    Cardinality, ReverseSchema, Schema, Unique,
};
use crate::storage::{Direction, IndexSet, CF_GIANTS, CF_SCHEMA};
use std::collections::HashMap;
use std::rc::Rc;

/// Everything ingestion and retrieval need that isn't a raw RocksDB call; published as a whole
/// by [`super::Store::swap_attr`]/[`super::Store::set_schema`] so readers never observe a
/// half-updated schema.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub schema: Schema,
    pub rschema: ReverseSchema,
    pub attrs: HashMap<u32, Rc<str>>,
    pub max_aid: u32,
    pub max_gt: u64,
}

impl CatalogSnapshot {
    fn rebuild(schema: Schema, max_gt: u64) -> Self {
        let rschema = derive_reverse_schema(&schema);
        let attrs = derive_attrs_by_id(&schema);
        let max_aid = schema.values().map(|p| p.aid).max().unwrap_or(0);
        CatalogSnapshot {
            schema,
            rschema,
            attrs,
            max_aid,
            max_gt,
        }
    }
}

fn encode_properties(props: &AttributeProperties) -> Vec<u8> {
    let mut w = Writer::new(32);
    w.write_u32(props.aid);
    w.write_u8(props.value_type.tag());
    w.write_u8(match props.cardinality {
        Cardinality::One => 0,
        Cardinality::Many => 1,
    });
    w.write_u8(match props.unique {
        Unique::None => 0,
        Unique::Identity => 1,
        Unique::Value => 2,
    });
    w.write_u8(if props.is_component { 1 } else { 0 });
    match &props.doc {
        Some(doc) => {
            w.write_u8(1);
            w.write_str(doc);
        }
        None => w.write_u8(0),
    }
    w.into_vec()
}

fn decode_properties(bytes: &[u8]) -> Result<AttributeProperties, StoreError> {
    let err = |e: crate::codec::serde::ReadError| StoreError::Corrupt(e.to_string());
    let mut r = Reader::new(bytes);
    let aid = r.read_u32().map_err(err)?;
    let value_type = tag_to_value_type(r.read_u8().map_err(err)?)?;
    let cardinality = match r.read_u8().map_err(err)? {
        0 => Cardinality::One,
        1 => Cardinality::Many,
        other => return Err(StoreError::Corrupt(format!("bad cardinality tag {other}"))),
    };
    let unique = match r.read_u8().map_err(err)? {
        0 => Unique::None,
        1 => Unique::Identity,
        2 => Unique::Value,
        other => return Err(StoreError::Corrupt(format!("bad unique tag {other}"))),
    };
    let is_component = r.read_u8().map_err(err)? != 0;
    let doc = match r.read_u8().map_err(err)? {
        0 => None,
        _ => Some(r.read_str().map_err(err)?),
    };
    Ok(AttributeProperties {
        aid,
        value_type,
        cardinality,
        unique,
        is_component,
        doc,
    })
}

fn tag_to_value_type(tag: u8) -> Result<ValueType, StoreError> {
    [
        ValueType::Ref,
        ValueType::I64,
        ValueType::F64,
        ValueType::Bool,
        ValueType::Instant,
        ValueType::Uuid,
        ValueType::Keyword,
        ValueType::Symbol,
        ValueType::Str,
        ValueType::Bytes,
    ]
    .into_iter()
    .find(|vt| vt.tag() == tag)
    .ok_or_else(|| StoreError::Corrupt(format!("unknown value type tag {tag}")))
}

/// Loads the persisted schema, seeding the implicit schema if the `schema` column family is
/// still empty, and recomputes `max_gt` from the `giants` column family.
pub fn load(storage: &IndexSet) -> Result<CatalogSnapshot, StoreError> {
    let rows = storage.scan_all(CF_SCHEMA, Direction::Forward)?;
    let mut schema = Schema::new();
    if rows.is_empty() {
        schema = implicit_schema();
        for (ident, props) in &schema {
            storage.put(CF_SCHEMA, ident.as_bytes(), &encode_properties(props))?;
        }
    } else {
        for (key, value) in rows {
            let ident: Rc<str> = Rc::from(String::from_utf8_lossy(&key).into_owned());
            let props = decode_properties(&value)?;
            schema.insert(ident, props);
        }
    }
    let max_gt = compute_max_gt(storage)?;
    Ok(CatalogSnapshot::rebuild(schema, max_gt))
}

/// `last-stored-gt + 1`, or the first giant id if none have been stored yet.
fn compute_max_gt(storage: &IndexSet) -> Result<u64, StoreError> {
    const FIRST_GT: u64 = 1;
    let rows = storage.scan_all(CF_GIANTS, Direction::Reverse)?;
    match rows.first() {
        Some((key, _)) => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(key);
            Ok(u64::from_be_bytes(buf) + 1)
        }
        None => Ok(FIRST_GT),
    }
}

pub fn persist(storage: &IndexSet, ident: &str, props: &AttributeProperties) -> Result<(), StoreError> {
    storage.put(CF_SCHEMA, ident.as_bytes(), &encode_properties(props))
}

/// True if any datom exists for `attr` in AVE, without materializing more than one entry.
pub fn attribute_has_data(storage: &IndexSet, props: &AttributeProperties) -> Result<bool, StoreError> {
    let lo = codec::encode_low(Index::Ave, None, Some(props.aid), None)?;
    let hi = codec::encode_high(Index::Ave, None, Some(props.aid), None)?;
    let rows = storage.range(crate::storage::CF_AVE, &lo, &hi, Direction::Forward)?;
    Ok(!rows.is_empty())
}

pub fn next_aid(snapshot: &CatalogSnapshot) -> u32 {
    snapshot.max_aid + 1
}

/// Checks whether `old -> new` is an allowed evolution of one attribute's properties. See the
/// module-level migration rules: cardinality demotion, a value-type change, and newly-added
/// uniqueness are all refused once the attribute has data, because validating them would need a
/// full index scan this store does not perform.
pub fn check_migration(storage: &IndexSet, ident: &str, old: &AttributeProperties, new: &AttributeProperties) -> Result<(), StoreError> {
    if old.cardinality == Cardinality::Many && new.cardinality == Cardinality::One {
        return Err(StoreError::SchemaConflict {
            attribute: ident.to_string(),
            reason: "cardinality many -> one is not supported".to_string(),
        });
    }

    let has_data = attribute_has_data(storage, old)?;
    if has_data && old.value_type != new.value_type {
        return Err(StoreError::SchemaConflict {
            attribute: ident.to_string(),
            reason: "value type cannot change once data exists".to_string(),
        });
    }
    if has_data && old.unique == Unique::None && new.unique != Unique::None {
        return Err(StoreError::SchemaConflict {
            attribute: ident.to_string(),
            reason: "uniqueness cannot be added once data exists".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Index;
    use crate::datom::ValueType;
    use tempdir::TempDir;

    fn open_storage() -> (TempDir, IndexSet) {
        let dir = TempDir::new("datomstore-catalog-test").expect("tempdir");
        let storage = IndexSet::open(dir.path()).expect("open storage");
        (dir, storage)
    }

    #[test]
    fn cardinality_many_to_one_is_always_refused() {
        let (_dir, storage) = open_storage();
        let old = AttributeProperties {
            cardinality: Cardinality::Many,
            ..AttributeProperties::new(100, ValueType::Str)
        };
        let new = AttributeProperties::new(100, ValueType::Str);
        let err = check_migration(&storage, "tags", &old, &new).unwrap_err();
        assert!(matches!(err, StoreError::SchemaConflict { .. }));
    }

    #[test]
    fn value_type_change_is_allowed_before_data_and_refused_after() {
        let (_dir, storage) = open_storage();
        let old = AttributeProperties::new(100, ValueType::Str);
        let new = AttributeProperties::new(100, ValueType::I64);
        assert!(check_migration(&storage, "score", &old, &new).is_ok());

        let key = codec::encode(Index::Ave, 1, old.aid, &crate::datom::Value::str("x"), None).unwrap();
        storage.put(crate::storage::CF_AVE, &key, &0u64.to_be_bytes()).unwrap();

        let err = check_migration(&storage, "score", &old, &new).unwrap_err();
        assert!(matches!(err, StoreError::SchemaConflict { .. }));
    }

    #[test]
    fn adding_uniqueness_is_allowed_before_data_and_refused_after() {
        let (_dir, storage) = open_storage();
        let old = AttributeProperties::new(101, ValueType::Str);
        let new = {
            let mut p = old.clone();
            p.unique = Unique::Identity;
            p
        };
        assert!(check_migration(&storage, "handle", &old, &new).is_ok());

        let key = codec::encode(Index::Ave, 1, old.aid, &crate::datom::Value::str("x"), None).unwrap();
        storage.put(crate::storage::CF_AVE, &key, &0u64.to_be_bytes()).unwrap();

        let err = check_migration(&storage, "handle", &old, &new).unwrap_err();
        assert!(matches!(err, StoreError::SchemaConflict { .. }));
    }
}

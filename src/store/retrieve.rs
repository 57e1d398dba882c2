//! Range and point reads over a chosen covering index.

use super::catalog::CatalogSnapshot;
use super::ingest::find_giant_id;
use crate::codec::{self, Index};
use crate::datom::{Datom, Value};
use crate::error::StoreError;
use crate::storage::{Direction, IndexSet, CF_EAV, CF_GIANTS};

/// A range endpoint with optionally-unspecified components; `None` fields widen to the index's
/// min/max sentinel when encoded.
#[derive(Debug, Clone, Default)]
pub struct Bound<'a> {
    pub entity: Option<u64>,
    pub attribute: Option<&'a str>,
    pub value: Option<&'a Value>,
}

impl<'a> Bound<'a> {
    pub fn new() -> Self {
        Bound::default()
    }

    pub fn entity(mut self, entity: u64) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn attribute(mut self, attribute: &'a str) -> Self {
        self.attribute = Some(attribute);
        self
    }

    pub fn value(mut self, value: &'a Value) -> Self {
        self.value = Some(value);
        self
    }

    fn aid(&self, snapshot: &CatalogSnapshot) -> Option<u32> {
        self.attribute.and_then(|a| snapshot.schema.get(a)).map(|p| p.aid)
    }
}

fn low_key(index: Index, bound: &Bound, snapshot: &CatalogSnapshot) -> Result<Vec<u8>, StoreError> {
    codec::encode_low(index, bound.entity, bound.aid(snapshot), bound.value)
}

fn high_key(index: Index, bound: &Bound, snapshot: &CatalogSnapshot) -> Result<Vec<u8>, StoreError> {
    // Range upper bounds are exclusive; widen by one to make a closed bound on the high side
    // inclusive of `bound`'s exact value, matching the "closed range" contract of this module.
    let exact = codec::encode_high(index, bound.entity, bound.aid(snapshot), bound.value)?;
    Ok(codec::next_prefix(&exact).unwrap_or_else(|| {
        // `exact` is already all 0xff (the fully unbounded high end): no finite key exceeds it,
        // so widen by one byte to get a strictly-greater exclusive bound instead.
        let mut widened = exact.clone();
        widened.push(0xff);
        widened
    }))
}

fn decode_row(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index, key: &[u8], stored: &[u8]) -> Result<Datom, StoreError> {
    let gt = {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(stored);
        u64::from_be_bytes(buf)
    };
    let retrieved = if gt == 0 {
        codec::decode(index, key)?
    } else {
        let bytes = storage
            .get(CF_GIANTS, &codec::gt_key(gt))?
            .ok_or_else(|| StoreError::Corrupt(format!("dangling giant id {gt}")))?;
        codec::decode_giant_record(&bytes)?
    };
    let attribute = snapshot
        .attrs
        .get(&retrieved.aid)
        .cloned()
        .ok_or_else(|| StoreError::Corrupt(format!("unknown aid {}", retrieved.aid)))?;
    Ok(Datom {
        entity: retrieved.entity,
        attribute,
        value: retrieved.value,
        added: true,
    })
}

/// Point lookup: does entity `entity` have attribute `attribute` set to exactly `value`?
pub fn fetch(storage: &IndexSet, snapshot: &CatalogSnapshot, entity: u64, attribute: &str, value: &Value) -> Result<Option<Datom>, StoreError> {
    let props = match snapshot.schema.get(attribute) {
        Some(p) => p,
        None => return Ok(None),
    };
    if !codec::is_giant(value)? {
        let key = codec::encode(Index::Eav, entity, props.aid, value, None)?;
        return Ok(match storage.get(CF_EAV, &key)? {
            Some(_) => Some(Datom::add(entity, attribute, value.clone())),
            None => None,
        });
    }
    let probe = Datom::add(entity, attribute, value.clone());
    match find_giant_id(storage, props, &probe)? {
        Some(_) => Ok(Some(Datom::add(entity, attribute, value.clone()))),
        None => Ok(None),
    }
}

fn scan(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index, lo: &Bound, hi: &Bound, direction: Direction) -> Result<Vec<Datom>, StoreError> {
    let lo_key = low_key(index, lo, snapshot)?;
    let hi_key = high_key(index, hi, snapshot)?;
    let cf = index.column_family();
    storage
        .range(cf, &lo_key, &hi_key, direction)?
        .into_iter()
        .map(|(k, v)| decode_row(storage, snapshot, index, &k, &v))
        .collect()
}

pub fn populated(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index, lo: &Bound, hi: &Bound) -> Result<bool, StoreError> {
    let lo_key = low_key(index, lo, snapshot)?;
    let hi_key = high_key(index, hi, snapshot)?;
    Ok(!storage.range(index.column_family(), &lo_key, &hi_key, Direction::Forward)?.is_empty())
}

pub fn size(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index, lo: &Bound, hi: &Bound) -> Result<u64, StoreError> {
    let lo_key = low_key(index, lo, snapshot)?;
    let hi_key = high_key(index, hi, snapshot)?;
    Ok(storage.range(index.column_family(), &lo_key, &hi_key, Direction::Forward)?.len() as u64)
}

pub fn head(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index, lo: &Bound, hi: &Bound) -> Result<Option<Datom>, StoreError> {
    Ok(slice(storage, snapshot, index, lo, hi)?.into_iter().next())
}

pub fn tail(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index, lo: &Bound, hi: &Bound) -> Result<Option<Datom>, StoreError> {
    Ok(rslice(storage, snapshot, index, lo, hi)?.into_iter().next())
}

pub fn slice(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index, lo: &Bound, hi: &Bound) -> Result<Vec<Datom>, StoreError> {
    scan(storage, snapshot, index, lo, hi, Direction::Forward)
}

pub fn rslice(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index, lo: &Bound, hi: &Bound) -> Result<Vec<Datom>, StoreError> {
    scan(storage, snapshot, index, lo, hi, Direction::Reverse)
}

pub fn slice_filter(
    storage: &IndexSet,
    snapshot: &CatalogSnapshot,
    index: Index,
    lo: &Bound,
    hi: &Bound,
    pred: impl Fn(&Datom) -> bool,
) -> Result<Vec<Datom>, StoreError> {
    Ok(slice(storage, snapshot, index, lo, hi)?.into_iter().filter(pred).collect())
}

pub fn rslice_filter(
    storage: &IndexSet,
    snapshot: &CatalogSnapshot,
    index: Index,
    lo: &Bound,
    hi: &Bound,
    pred: impl Fn(&Datom) -> bool,
) -> Result<Vec<Datom>, StoreError> {
    Ok(rslice(storage, snapshot, index, lo, hi)?.into_iter().filter(pred).collect())
}

pub fn head_filter(
    storage: &IndexSet,
    snapshot: &CatalogSnapshot,
    index: Index,
    lo: &Bound,
    hi: &Bound,
    pred: impl Fn(&Datom) -> bool,
) -> Result<Option<Datom>, StoreError> {
    Ok(slice_filter(storage, snapshot, index, lo, hi, pred)?.into_iter().next())
}

pub fn tail_filter(
    storage: &IndexSet,
    snapshot: &CatalogSnapshot,
    index: Index,
    lo: &Bound,
    hi: &Bound,
    pred: impl Fn(&Datom) -> bool,
) -> Result<Option<Datom>, StoreError> {
    Ok(rslice_filter(storage, snapshot, index, lo, hi, pred)?.into_iter().next())
}

pub fn size_filter(
    storage: &IndexSet,
    snapshot: &CatalogSnapshot,
    index: Index,
    lo: &Bound,
    hi: &Bound,
    pred: impl Fn(&Datom) -> bool,
) -> Result<u64, StoreError> {
    Ok(slice_filter(storage, snapshot, index, lo, hi, pred)?.len() as u64)
}

pub fn datom_count(storage: &IndexSet, snapshot: &CatalogSnapshot, index: Index) -> Result<u64, StoreError> {
    size(storage, snapshot, index, &Bound::new(), &Bound::new())
}

/// Largest entity id in use, recovered by scanning EAV backwards from the end.
pub fn init_max_eid(storage: &IndexSet, snapshot: &CatalogSnapshot) -> Result<u64, StoreError> {
    Ok(tail(storage, snapshot, Index::Eav, &Bound::new(), &Bound::new())?
        .map(|d| d.entity)
        .unwrap_or(0))
}

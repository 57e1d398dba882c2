//! Encodes datoms into the fixed-shape ordered byte keys the three covering indexes store, and
//! decodes them back.
//!
//! Every key is exactly [`MAX_KEY_SIZE`] bytes: an 8-byte entity id, a 4-byte attribute id, a
//! 1-byte type tag, and a 498-byte value slot, permuted per index so lexicographic byte order
//! realizes each index's semantic order. Values that do not fit the slot are classified *giant*:
//! the slot carries a truncated prefix plus an 8-byte tiebreaker id, and the full value lives in
//! the `giants` sub-database keyed by that id.

pub mod serde;

use crate::datom::{Value, ValueType};
use crate::error::StoreError;
use serde::{Reader, Writer};
use std::rc::Rc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Conventional LMDB/B-tree key-size ceiling this layout was designed against. Kept as the
/// budget even though the RocksDB backend has no such hard limit itself.
pub const MAX_KEY_SIZE: usize = 511;
pub const HEADER_SIZE: usize = 8 + 4 + 1;
pub const VALUE_BUDGET: usize = MAX_KEY_SIZE - HEADER_SIZE;
pub const GIANT_TAIL: usize = 8;

/// Checks a configured key-size budget against this build's fixed layout.
///
/// The layout in this module (field widths, value slot, giant tail) is frozen into the on-disk
/// format: every key a store ever wrote was ordered according to exactly one budget. A budget
/// configured via [`crate::store::StoreOptions`] that disagreed with it would silently misorder
/// that store's own keys on the next read, so it is validated rather than threaded in as a live
/// parameter.
pub fn validate_max_key_size(max_key_size: usize) -> Result<(), StoreError> {
    if max_key_size != MAX_KEY_SIZE {
        return Err(StoreError::UnsupportedKeySize {
            requested: max_key_size,
            supported: MAX_KEY_SIZE,
        });
    }
    Ok(())
}

/// Which covering index a key belongs to; each orders its three components differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    Eav,
    Ave,
    Vea,
}

impl Index {
    pub fn column_family(self) -> &'static str {
        match self {
            Index::Eav => "eav",
            Index::Ave => "ave",
            Index::Vea => "vea",
        }
    }
}

/// A decoded index entry, before the attribute id has been resolved to its ident.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub entity: u64,
    pub aid: u32,
    pub value: Value,
}

fn tag_for_bound(value: &Value) -> u8 {
    match value {
        Value::SysMin => 0,
        Value::SysMax => 255,
        other => other.value_type().expect("non-sentinel value has a type").tag(),
    }
}

fn write_content(w: &mut Writer, value: &Value) -> Result<(), StoreError> {
    match value {
        Value::Ref(v) => w.write_u64(*v),
        Value::I64(v) => w.write_i64_ordered(*v),
        Value::F64(v) => w.write_f64_ordered(*v),
        Value::Bool(v) => w.write_u8(if *v { 1 } else { 0 }),
        Value::Instant(v) => {
            let millis = (v.unix_timestamp_nanos() / 1_000_000) as i64;
            w.write_i64_ordered(millis);
        }
        Value::Uuid(v) => w.write_bytes_raw(v.as_bytes()),
        Value::Keyword(v) => w.write_str(v),
        Value::Symbol(v) => w.write_str(v),
        Value::Str(v) => w.write_str(v),
        Value::Bytes(v) => w.write_bytes(v),
        Value::SysMin | Value::SysMax => {
            return Err(StoreError::Corrupt(
                "attempted to encode a sentinel bound as a value".to_string(),
            ))
        }
    }
    Ok(())
}

fn read_content(tag: u8, r: &mut Reader) -> Result<Value, StoreError> {
    let err = |e: serde::ReadError| StoreError::Corrupt(e.to_string());
    match tag {
        t if t == ValueType::Ref.tag() => Ok(Value::Ref(r.read_u64().map_err(err)?)),
        t if t == ValueType::I64.tag() => Ok(Value::I64(r.read_i64_ordered().map_err(err)?)),
        t if t == ValueType::F64.tag() => Ok(Value::F64(r.read_f64_ordered().map_err(err)?)),
        t if t == ValueType::Bool.tag() => Ok(Value::Bool(r.read_u8().map_err(err)? != 0)),
        t if t == ValueType::Instant.tag() => {
            let millis = r.read_i64_ordered().map_err(err)?;
            let nanos = millis as i128 * 1_000_000;
            OffsetDateTime::from_unix_timestamp_nanos(nanos)
                .map(Value::Instant)
                .map_err(|e| StoreError::Corrupt(e.to_string()))
        }
        t if t == ValueType::Uuid.tag() => {
            let bytes = r.read_bytes_raw(16).map_err(err)?;
            Uuid::from_slice(bytes)
                .map(Value::Uuid)
                .map_err(|e| StoreError::Corrupt(e.to_string()))
        }
        t if t == ValueType::Keyword.tag() => Ok(Value::Keyword(Rc::from(r.read_str().map_err(err)?))),
        t if t == ValueType::Symbol.tag() => Ok(Value::Symbol(Rc::from(r.read_str().map_err(err)?))),
        t if t == ValueType::Str.tag() => Ok(Value::Str(Rc::from(r.read_str().map_err(err)?))),
        t if t == ValueType::Bytes.tag() => Ok(Value::Bytes(r.read_bytes().map_err(err)?)),
        other => Err(StoreError::Corrupt(format!("unknown type tag {other}"))),
    }
}

fn encode_content(value: &Value) -> Result<Vec<u8>, StoreError> {
    let mut w = Writer::new(16);
    write_content(&mut w, value)?;
    Ok(w.into_vec())
}

/// Whether `value`'s encoded content is too large to fit in an index key's value slot.
pub fn is_giant(value: &Value) -> Result<bool, StoreError> {
    Ok(encode_content(value)?.len() > VALUE_BUDGET - GIANT_TAIL)
}

fn build_slot(content: &[u8], giant_id: Option<u64>) -> [u8; VALUE_BUDGET] {
    let mut slot = [0u8; VALUE_BUDGET];
    match giant_id {
        Some(gt) => {
            let prefix_len = VALUE_BUDGET - GIANT_TAIL;
            let take = content.len().min(prefix_len);
            slot[..take].copy_from_slice(&content[..take]);
            slot[prefix_len..].copy_from_slice(&gt.to_be_bytes());
        }
        None => {
            slot[..content.len()].copy_from_slice(content);
        }
    }
    slot
}

/// Encodes a concrete datom component triple as an index key.
///
/// `giant_id` must be `Some` exactly when [`is_giant`] says so for `value`. `value` may be the
/// `SysMin`/`SysMax` bound sentinels, in which case `giant_id` is ignored and the slot is filled
/// with the corresponding all-zero/all-`0xff` bytes.
pub fn encode(index: Index, entity: u64, aid: u32, value: &Value, giant_id: Option<u64>) -> Result<Vec<u8>, StoreError> {
    let tag = tag_for_bound(value);
    let slot = match value {
        Value::SysMin => [0u8; VALUE_BUDGET],
        Value::SysMax => [0xffu8; VALUE_BUDGET],
        other => {
            let content = encode_content(other)?;
            build_slot(&content, giant_id)
        }
    };

    let mut w = Writer::new(MAX_KEY_SIZE);
    match index {
        Index::Eav => {
            w.write_u64(entity);
            w.write_u32(aid);
            w.write_u8(tag);
            w.write_bytes_raw(&slot);
        }
        Index::Ave => {
            w.write_u32(aid);
            w.write_u8(tag);
            w.write_bytes_raw(&slot);
            w.write_u64(entity);
        }
        Index::Vea => {
            w.write_u8(tag);
            w.write_bytes_raw(&slot);
            w.write_u64(entity);
            w.write_u32(aid);
        }
    }
    Ok(w.into_vec())
}

/// Encodes a bound (range endpoint) where `entity`/`aid`/`value` may each be left unspecified, in
/// which case they are filled with the minimum sentinel for their component.
pub fn encode_low(index: Index, entity: Option<u64>, aid: Option<u32>, value: Option<&Value>) -> Result<Vec<u8>, StoreError> {
    encode_bound(index, entity, aid, value, 0, 0, Value::SysMin)
}

/// As [`encode_low`] but filling unspecified components with the maximum sentinel.
pub fn encode_high(index: Index, entity: Option<u64>, aid: Option<u32>, value: Option<&Value>) -> Result<Vec<u8>, StoreError> {
    encode_bound(index, entity, aid, value, u64::MAX, u32::MAX, Value::SysMax)
}

fn encode_bound(
    index: Index,
    entity: Option<u64>,
    aid: Option<u32>,
    value: Option<&Value>,
    min_or_max_entity: u64,
    min_or_max_aid: u32,
    sentinel: Value,
) -> Result<Vec<u8>, StoreError> {
    if let (Some(v), None) = (value, aid) {
        if !matches!(v, Value::Ref(_)) {
            return Err(StoreError::BadBound);
        }
    }
    let entity = entity.unwrap_or(min_or_max_entity);
    let aid = aid.unwrap_or(min_or_max_aid);
    match value {
        Some(v) => encode(index, entity, aid, v, None),
        None => encode(index, entity, aid, &sentinel, None),
    }
}

/// Decodes a normal (non-giant) index entry. Callers must route giant entries through
/// [`decode_giant_record`] instead.
pub fn decode(index: Index, key: &[u8]) -> Result<Retrieved, StoreError> {
    let err = |e: serde::ReadError| StoreError::Corrupt(e.to_string());
    let mut r = Reader::new(key);
    let (entity, aid, tag, slot) = match index {
        Index::Eav => {
            let e = r.read_u64().map_err(err)?;
            let a = r.read_u32().map_err(err)?;
            let t = r.read_u8().map_err(err)?;
            let slot = r.read_bytes_raw(VALUE_BUDGET).map_err(err)?;
            (e, a, t, slot)
        }
        Index::Ave => {
            let a = r.read_u32().map_err(err)?;
            let t = r.read_u8().map_err(err)?;
            let slot = r.read_bytes_raw(VALUE_BUDGET).map_err(err)?;
            let e = r.read_u64().map_err(err)?;
            (e, a, t, slot)
        }
        Index::Vea => {
            let t = r.read_u8().map_err(err)?;
            let slot = r.read_bytes_raw(VALUE_BUDGET).map_err(err)?;
            let e = r.read_u64().map_err(err)?;
            let a = r.read_u32().map_err(err)?;
            (e, a, t, slot)
        }
    };
    let mut sr = Reader::new(slot);
    let value = read_content(tag, &mut sr)?;
    Ok(Retrieved { entity, aid, value })
}

/// The full, untruncated encoding stored in the `giants` sub-database: `gt -> (e, aid, value)`.
pub fn encode_giant_record(entity: u64, aid: u32, value: &Value) -> Result<Vec<u8>, StoreError> {
    let tag = tag_for_bound(value);
    let content = encode_content(value)?;
    let mut w = Writer::new(13 + content.len());
    w.write_u64(entity);
    w.write_u32(aid);
    w.write_u8(tag);
    w.write_bytes_raw(&content);
    Ok(w.into_vec())
}

pub fn decode_giant_record(bytes: &[u8]) -> Result<Retrieved, StoreError> {
    let err = |e: serde::ReadError| StoreError::Corrupt(e.to_string());
    let mut r = Reader::new(bytes);
    let entity = r.read_u64().map_err(err)?;
    let aid = r.read_u32().map_err(err)?;
    let tag = r.read_u8().map_err(err)?;
    let value = read_content(tag, &mut r)?;
    Ok(Retrieved { entity, aid, value })
}

pub fn gt_key(gt: u64) -> [u8; 8] {
    gt.to_be_bytes()
}

/// Position within an EAV key where the giant tiebreaker begins; bytes before this are the
/// truncated, giant-independent prefix shared by every giant candidate for the same value.
pub const EAV_GIANT_PREFIX_LEN: usize = HEADER_SIZE + VALUE_BUDGET - GIANT_TAIL;

/// Lowest key following the largest key with the given prefix: the exclusive upper bound of a
/// prefix scan expressed as a right-open range `[prefix, next_prefix(prefix))`.
pub fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let ffs = prefix.iter().rev().take_while(|&&byte| byte == u8::MAX).count();
    let mut next = prefix[..(prefix.len() - ffs)].to_vec();
    let last = next.last_mut()?;
    *last += 1;
    Some(next)
}

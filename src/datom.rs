//! The datom: the single immutable fact this store persists.

use std::rc::Rc;
use time::OffsetDateTime;
use uuid::Uuid;

/// A typed value attached to a datom.
///
/// `SysMin` and `SysMax` never appear on a real datom — they exist only so [`crate::codec`] can
/// build inclusive range bounds when a caller leaves the value component of a bound unspecified.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    SysMin,
    Ref(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Instant(OffsetDateTime),
    Uuid(Uuid),
    Keyword(Rc<str>),
    Symbol(Rc<str>),
    Str(Rc<str>),
    Bytes(Vec<u8>),
    SysMax,
}

impl Value {
    pub fn str(value: impl Into<Rc<str>>) -> Self {
        Value::Str(value.into())
    }

    pub fn keyword(value: impl Into<Rc<str>>) -> Self {
        Value::Keyword(value.into())
    }

    pub fn symbol(value: impl Into<Rc<str>>) -> Self {
        Value::Symbol(value.into())
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::SysMin | Value::SysMax => None,
            Value::Ref(_) => Some(ValueType::Ref),
            Value::I64(_) => Some(ValueType::I64),
            Value::F64(_) => Some(ValueType::F64),
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Instant(_) => Some(ValueType::Instant),
            Value::Uuid(_) => Some(ValueType::Uuid),
            Value::Keyword(_) => Some(ValueType::Keyword),
            Value::Symbol(_) => Some(ValueType::Symbol),
            Value::Str(_) => Some(ValueType::Str),
            Value::Bytes(_) => Some(ValueType::Bytes),
        }
    }

    pub fn matches_type(&self, value_type: ValueType) -> bool {
        self.value_type() == Some(value_type)
    }
}

/// The declared type of an attribute's values; stored in the schema, not on every datom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Ref,
    I64,
    F64,
    Bool,
    Instant,
    Uuid,
    Keyword,
    Symbol,
    Str,
    Bytes,
}

impl ValueType {
    /// Type tag byte used by the codec; order here is the cross-type comparison order.
    pub(crate) fn tag(self) -> u8 {
        match self {
            ValueType::Ref => 1,
            ValueType::I64 => 2,
            ValueType::F64 => 3,
            ValueType::Bool => 4,
            ValueType::Instant => 5,
            ValueType::Uuid => 6,
            ValueType::Keyword => 7,
            ValueType::Symbol => 8,
            ValueType::Str => 9,
            ValueType::Bytes => 10,
        }
    }
}

/// An immutable fact: entity `entity` has attribute `attribute` set to `value`.
///
/// `added` only has meaning on the way into [`crate::store::Store::load_datoms`]: it tells
/// ingestion whether to assert or retract the fact. It is never itself persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Datom {
    pub entity: u64,
    pub attribute: Rc<str>,
    pub value: Value,
    pub added: bool,
}

impl Datom {
    pub fn add(entity: u64, attribute: impl Into<Rc<str>>, value: Value) -> Self {
        Datom {
            entity,
            attribute: attribute.into(),
            value,
            added: true,
        }
    }

    pub fn retract(entity: u64, attribute: impl Into<Rc<str>>, value: Value) -> Self {
        Datom {
            entity,
            attribute: attribute.into(),
            value,
            added: false,
        }
    }
}

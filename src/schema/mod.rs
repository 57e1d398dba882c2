//! The schema catalog: attribute identifiers, their declared types, and evolution rules.

pub mod attribute;
pub mod default;

use crate::datom::ValueType;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub use attribute::Attribute;

/// How many values an entity may have for a given attribute at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Whether an attribute's value must be unique across entities, and in what sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unique {
    None,
    /// A value identifies its entity; upserts resolve through it.
    Identity,
    /// A value must not be shared by two entities, but does not drive upserts.
    Value,
}

/// The persisted properties of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeProperties {
    pub aid: u32,
    pub value_type: ValueType,
    pub cardinality: Cardinality,
    pub unique: Unique,
    pub is_component: bool,
    pub doc: Option<String>,
}

impl AttributeProperties {
    pub fn new(aid: u32, value_type: ValueType) -> Self {
        AttributeProperties {
            aid,
            value_type,
            cardinality: Cardinality::One,
            unique: Unique::None,
            is_component: false,
            doc: None,
        }
    }
}

pub type Schema = HashMap<Rc<str>, AttributeProperties>;

/// Attribute names grouped by property, derived from [`Schema`] after every mutation.
#[derive(Debug, Clone, Default)]
pub struct ReverseSchema {
    pub unique: HashSet<Rc<str>>,
    pub components: HashSet<Rc<str>>,
    pub many: HashSet<Rc<str>>,
}

pub fn derive_reverse_schema(schema: &Schema) -> ReverseSchema {
    let mut reverse = ReverseSchema::default();
    for (ident, props) in schema {
        if props.unique != Unique::None {
            reverse.unique.insert(ident.clone());
        }
        if props.is_component {
            reverse.components.insert(ident.clone());
        }
        if props.cardinality == Cardinality::Many {
            reverse.many.insert(ident.clone());
        }
    }
    reverse
}

pub fn derive_attrs_by_id(schema: &Schema) -> HashMap<u32, Rc<str>> {
    schema
        .iter()
        .map(|(ident, props)| (props.aid, ident.clone()))
        .collect()
}

// Well-known implicit attributes, seeded on first open. Their `aid`s are fixed so the implicit
// schema never collides with a user-assigned one.
pub const DB_IDENT: &str = "db/ident";
pub const DB_IDENT_AID: u32 = 1;

pub const DB_VALUE_TYPE: &str = "db/valueType";
pub const DB_VALUE_TYPE_AID: u32 = 2;

pub const DB_CARDINALITY: &str = "db/cardinality";
pub const DB_CARDINALITY_AID: u32 = 3;

pub const DB_UNIQUE: &str = "db/unique";
pub const DB_UNIQUE_AID: u32 = 4;

pub const DB_IS_COMPONENT: &str = "db/isComponent";
pub const DB_IS_COMPONENT_AID: u32 = 5;

pub const DB_DOC: &str = "db/doc";
pub const DB_DOC_AID: u32 = 6;

/// Largest `aid` reserved by the implicit schema; user attributes start above this.
pub const MAX_IMPLICIT_AID: u32 = DB_DOC_AID;

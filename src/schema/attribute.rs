use super::{Cardinality, Unique};
use crate::datom::ValueType;

/// Builder for declaring a new attribute before it is handed to
/// [`crate::store::Store::set_schema`].
///
/// ```
/// use datomstore::datom::ValueType;
/// use datomstore::schema::Attribute;
///
/// let attr = Attribute::new("person/name", ValueType::Str)
///     .with_doc("a person's given name")
///     .unique_identity();
/// assert!(attr.doc.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Attribute {
    pub ident: String,
    pub value_type: ValueType,
    pub cardinality: Cardinality,
    pub unique: Unique,
    pub is_component: bool,
    pub doc: Option<String>,
}

impl Attribute {
    pub fn new(ident: impl Into<String>, value_type: ValueType) -> Self {
        Attribute {
            ident: ident.into(),
            value_type,
            cardinality: Cardinality::One,
            unique: Unique::None,
            is_component: false,
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn many(mut self) -> Self {
        self.cardinality = Cardinality::Many;
        self
    }

    pub fn unique_identity(mut self) -> Self {
        self.unique = Unique::Identity;
        self
    }

    pub fn unique_value(mut self) -> Self {
        self.unique = Unique::Value;
        self
    }

    pub fn component(mut self) -> Self {
        self.is_component = true;
        self
    }
}

//! The implicit schema, seeded into a store the first time its Schema column family is opened.

use super::*;
use crate::datom::ValueType;

pub fn implicit_schema() -> Schema {
    let mut schema = Schema::new();
    schema.insert(
        DB_IDENT.into(),
        AttributeProperties {
            doc: Some("Human readable name of an attribute".to_string()),
            unique: Unique::Identity,
            ..AttributeProperties::new(DB_IDENT_AID, ValueType::Str)
        },
    );
    schema.insert(
        DB_VALUE_TYPE.into(),
        AttributeProperties {
            doc: Some("Declared value type of an attribute".to_string()),
            ..AttributeProperties::new(DB_VALUE_TYPE_AID, ValueType::Keyword)
        },
    );
    schema.insert(
        DB_CARDINALITY.into(),
        AttributeProperties {
            doc: Some("Whether an attribute holds one or many values per entity".to_string()),
            ..AttributeProperties::new(DB_CARDINALITY_AID, ValueType::Keyword)
        },
    );
    schema.insert(
        DB_UNIQUE.into(),
        AttributeProperties {
            doc: Some("Uniqueness constraint of an attribute, if any".to_string()),
            ..AttributeProperties::new(DB_UNIQUE_AID, ValueType::Keyword)
        },
    );
    schema.insert(
        DB_IS_COMPONENT.into(),
        AttributeProperties {
            doc: Some("Whether this attribute's referenced entity is owned by its parent".to_string()),
            ..AttributeProperties::new(DB_IS_COMPONENT_AID, ValueType::Bool)
        },
    );
    schema.insert(
        DB_DOC.into(),
        AttributeProperties {
            doc: Some("Documentation string of an attribute".to_string()),
            ..AttributeProperties::new(DB_DOC_AID, ValueType::Str)
        },
    );
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_schema_aids_are_stable() {
        let schema = implicit_schema();
        assert_eq!(schema[DB_IDENT].aid, DB_IDENT_AID);
        assert_eq!(schema[DB_DOC].aid, DB_DOC_AID);
        assert_eq!(schema.len(), 6);
    }
}

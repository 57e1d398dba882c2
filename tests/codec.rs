extern crate datomstore;

use datomstore::codec::{self, Index};
use datomstore::datom::Value;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

#[derive(Debug, Clone)]
struct ArbitraryValue(Value);

impl Arbitrary for ArbitraryValue {
    fn arbitrary(g: &mut Gen) -> Self {
        Self(match u8::arbitrary(g) % 6 {
            0 => Value::Ref(u64::arbitrary(g)),
            1 => Value::I64(i64::arbitrary(g)),
            2 => Value::Bool(bool::arbitrary(g)),
            3 => Value::Keyword(String::arbitrary(g).into()),
            4 => Value::Str(String::arbitrary(g).into()),
            _ => Value::Bytes(Vec::<u8>::arbitrary(g)),
        })
    }
}

#[quickcheck]
fn eav_round_trip(entity: u64, aid: u32, value: ArbitraryValue) -> bool {
    round_trip(Index::Eav, entity, aid, value.0)
}

#[quickcheck]
fn ave_round_trip(entity: u64, aid: u32, value: ArbitraryValue) -> bool {
    round_trip(Index::Ave, entity, aid, value.0)
}

#[quickcheck]
fn vea_round_trip(entity: u64, aid: u32, value: ArbitraryValue) -> bool {
    round_trip(Index::Vea, entity, aid, value.0)
}

fn round_trip(index: Index, entity: u64, aid: u32, value: Value) -> bool {
    let giant = codec::is_giant(&value).unwrap();
    // Keep the property test to the normal (non-giant) path: giant key truncation is exercised
    // by the `giant_string_round_trips_through_overflow_table` integration test instead.
    if giant {
        return true;
    }
    let key = codec::encode(index, entity, aid, &value, None).unwrap();
    let retrieved = codec::decode(index, &key).unwrap();
    retrieved.entity == entity && retrieved.aid == aid && retrieved.value == value
}

#[quickcheck]
fn eav_key_order_matches_entity_order(a: u64, b: u64, aid: u32) -> bool {
    let value = Value::I64(7);
    let key_a = codec::encode(Index::Eav, a, aid, &value, None).unwrap();
    let key_b = codec::encode(Index::Eav, b, aid, &value, None).unwrap();
    a.cmp(&b) == key_a.cmp(&key_b)
}

#[quickcheck]
fn ave_key_order_matches_value_order(entity: u64, aid: u32, a: i64, b: i64) -> bool {
    let value_a = Value::I64(a);
    let value_b = Value::I64(b);
    let key_a = codec::encode(Index::Ave, entity, aid, &value_a, None).unwrap();
    let key_b = codec::encode(Index::Ave, entity, aid, &value_b, None).unwrap();
    a.cmp(&b) == key_a[..13].cmp(&key_b[..13])
}

#[test]
fn giant_classification_threshold() {
    let short = Value::str("a".repeat(100));
    let long = Value::str("a".repeat(600));
    assert!(!codec::is_giant(&short).unwrap());
    assert!(codec::is_giant(&long).unwrap());
}

#[test]
fn bound_with_value_but_no_attribute_is_rejected_unless_ref() {
    let name = Value::str("Ada");
    let err = codec::encode_low(Index::Eav, None, None, Some(&name)).unwrap_err();
    assert!(matches!(err, datomstore::StoreError::BadBound));

    let err = codec::encode_high(Index::Ave, None, None, Some(&name)).unwrap_err();
    assert!(matches!(err, datomstore::StoreError::BadBound));

    // A `Ref` value carries no ambiguity about its width, so it's allowed without an attribute.
    let reference = Value::Ref(7);
    assert!(codec::encode_low(Index::Vea, None, None, Some(&reference)).is_ok());
}

#[test]
fn validate_max_key_size_rejects_any_other_size() {
    assert!(codec::validate_max_key_size(codec::MAX_KEY_SIZE).is_ok());
    let err = codec::validate_max_key_size(codec::MAX_KEY_SIZE + 1).unwrap_err();
    assert!(matches!(err, datomstore::StoreError::UnsupportedKeySize { .. }));
}

use datomstore::clock::MockClock;
use datomstore::codec::Index;
use datomstore::datom::{Datom, Value, ValueType};
use datomstore::schema::Attribute;
use datomstore::store::Bound;
use datomstore::{Store, StoreError, StoreOptions};
use tempdir::TempDir;

fn open_store() -> (TempDir, Store) {
    let dir = TempDir::new("datomstore-test").expect("tempdir");
    let store = Store::open_with_clock(dir.path(), Box::new(MockClock::new()), StoreOptions::default()).expect("open store");
    (dir, store)
}

#[test]
fn basic_assert_retract() {
    let (_dir, store) = open_store();
    store
        .set_schema(vec![
            Attribute::new("name", ValueType::Str),
            Attribute::new("age", ValueType::I64),
        ])
        .unwrap();

    store
        .load_datoms(&[
            Datom::add(1, "name", Value::str("Ada")),
            Datom::add(1, "age", Value::I64(36)),
        ])
        .unwrap();

    let lo = Bound::new().entity(1);
    let hi = Bound::new().entity(1);
    let mut datoms = store.slice(Index::Eav, &lo, &hi).unwrap();
    datoms.sort_by_key(|d| d.attribute.clone());
    assert_eq!(datoms.len(), 2);

    store.load_datoms(&[Datom::retract(1, "age", Value::I64(36))]).unwrap();

    let datoms = store.slice(Index::Eav, &lo, &hi).unwrap();
    assert_eq!(datoms.len(), 1);
    assert_eq!(datoms[0].attribute.as_ref(), "name");
}

#[test]
fn giant_string_round_trips_through_overflow_table() {
    let (_dir, store) = open_store();
    store.set_schema(vec![Attribute::new("name", ValueType::Str)]).unwrap();

    let giant = "x".repeat(1024);
    let before_gt = store.max_gt();
    store.load_datoms(&[Datom::add(2, "name", Value::str(giant.clone()))]).unwrap();

    let fetched = store.fetch(2, "name", &Value::str(giant.clone())).unwrap();
    assert_eq!(fetched.unwrap().value, Value::str(giant));
    assert_eq!(store.max_gt(), before_gt + 1);
}

#[test]
fn reverse_attribute_via_vea() {
    let (_dir, store) = open_store();
    store.set_schema(vec![Attribute::new("friend", ValueType::Ref).many()]).unwrap();

    store
        .load_datoms(&[
            Datom::add(10, "friend", Value::Ref(20)),
            Datom::add(11, "friend", Value::Ref(20)),
        ])
        .unwrap();

    let target = Value::Ref(20);
    let lo = Bound::new().value(&target);
    let hi = Bound::new().value(&target);
    let mut datoms = store.slice(Index::Vea, &lo, &hi).unwrap();
    datoms.sort_by_key(|d| d.entity);

    assert_eq!(datoms.len(), 2);
    assert_eq!(datoms[0].entity, 10);
    assert_eq!(datoms[1].entity, 11);

    let eav_lo = Bound::new().entity(20);
    let eav_hi = Bound::new().entity(20);
    assert!(store.slice(Index::Eav, &eav_lo, &eav_hi).unwrap().is_empty());
}

#[test]
fn range_bounds_over_ave() {
    let (_dir, store) = open_store();
    store.set_schema(vec![Attribute::new("score", ValueType::I64)]).unwrap();

    let datoms: Vec<Datom> = (1..=100u64)
        .map(|e| Datom::add(e, "score", Value::I64((e * 10) as i64)))
        .collect();
    store.load_datoms(&datoms).unwrap();

    let low = Value::I64(250);
    let high = Value::I64(500);
    let lo = Bound::new().attribute("score").value(&low);
    let hi = Bound::new().attribute("score").value(&high);
    assert_eq!(store.size(Index::Ave, &lo, &hi).unwrap(), 26);
}

#[test]
fn predicate_filter_over_ave() {
    let (_dir, store) = open_store();
    store.set_schema(vec![Attribute::new("score", ValueType::I64)]).unwrap();

    let datoms: Vec<Datom> = (1..=100u64)
        .map(|e| Datom::add(e, "score", Value::I64((e * 10) as i64)))
        .collect();
    store.load_datoms(&datoms).unwrap();

    let lo = Bound::new().attribute("score");
    let hi = Bound::new().attribute("score");
    let filtered = store
        .slice_filter(Index::Ave, &lo, &hi, |d| matches!(d.value, Value::I64(v) if v % 100 == 0))
        .unwrap();

    assert_eq!(filtered.len(), 10);
    assert_eq!(filtered[0].value, Value::I64(100));
    assert_eq!(filtered[9].value, Value::I64(1000));
}

#[test]
fn reopening_recovers_max_gt_and_schema() {
    let dir = TempDir::new("datomstore-test").expect("tempdir");
    let giant = "y".repeat(1024);

    {
        let store = Store::open_with_clock(dir.path(), Box::new(MockClock::new()), StoreOptions::default()).unwrap();
        store.set_schema(vec![Attribute::new("name", ValueType::Str)]).unwrap();
        store.load_datoms(&[Datom::add(2, "name", Value::str(giant.clone()))]).unwrap();
        store.close();
    }

    let reopened = Store::open_with_clock(dir.path(), Box::new(MockClock::new()), StoreOptions::default()).unwrap();
    let fetched = reopened.fetch(2, "name", &Value::str(giant.clone())).unwrap();
    assert_eq!(fetched.unwrap().value, Value::str(giant));
    assert_eq!(reopened.attrs()[&reopened.schema()["name"].aid].as_ref(), "name");
    assert!(reopened.max_gt() >= 2);
}

#[test]
fn retracting_an_unknown_attribute_is_an_error() {
    let (_dir, store) = open_store();
    let err = store.load_datoms(&[Datom::retract(1, "nope", Value::I64(1))]).unwrap_err();
    assert!(matches!(err, StoreError::UnknownAttribute(attr) if attr == "nope"));
}

#[test]
fn asserting_an_unknown_attribute_auto_creates_it() {
    let (_dir, store) = open_store();
    store.load_datoms(&[Datom::add(1, "fresh", Value::I64(9))]).unwrap();
    assert!(store.schema().contains_key("fresh"));
    assert_eq!(store.fetch(1, "fresh", &Value::I64(9)).unwrap().unwrap().entity, 1);
}

#[test]
fn demoting_cardinality_many_to_one_is_refused() {
    let (_dir, store) = open_store();
    store.set_schema(vec![Attribute::new("tags", ValueType::Str).many()]).unwrap();

    let err = store
        .swap_attr("tags", |mut props| {
            props.cardinality = datomstore::schema::Cardinality::One;
            props
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::SchemaConflict { attribute, .. } if attribute == "tags"));
}

#[test]
fn changing_value_type_after_data_exists_is_refused() {
    let (_dir, store) = open_store();
    store.set_schema(vec![Attribute::new("score", ValueType::I64)]).unwrap();
    store.load_datoms(&[Datom::add(1, "score", Value::I64(42))]).unwrap();

    let err = store
        .swap_attr("score", |mut props| {
            props.value_type = ValueType::Str;
            props
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::SchemaConflict { attribute, .. } if attribute == "score"));
}

#[test]
fn opening_with_a_mismatched_key_size_is_refused() {
    let dir = TempDir::new("datomstore-test").expect("tempdir");
    let options = StoreOptions::default().with_max_key_size(128);
    let err = Store::open_with_clock(dir.path(), Box::new(MockClock::new()), options).unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedKeySize { requested: 128, .. }));
}

/// Mapper tests
///
/// Upsert, relation and list semantics of JSON → model mapping.
/// Run with: cargo test --test mapper_tests

mod common;

use common::{Address, Dog, Kennel, User, array, dogs_json, object, user_json};
use memomap::{Mapper, MapperConfig, MappingError, MappingResult, PrimaryKey, Store, StoreError};
use serde_json::{Value, json};

fn mapped_user(store: &mut Store, json: &Value) -> memomap::ModelRef<User> {
    store
        .write(|store| store.map::<User>(object(json)))
        .unwrap()
}

#[test]
fn test_map_nested_graph() {
    let mut store = Store::new();
    let user = mapped_user(&mut store, &user_json());

    let found = store.object_for_primary_key::<User>("1").unwrap();
    assert!(found.ptr_eq(&user));

    let user = user.read();
    assert_eq!(user.name, "User");
    assert!(user.joined.is_some());

    let address = user.address.as_ref().unwrap().read();
    assert_eq!(address.city, "City");
    let phone = address.phone.as_ref().unwrap().read();
    assert_eq!(phone.number, "+849876543210");
    assert_eq!(phone.kind, "Work");

    assert_eq!(user.dogs.len(), 1);
    assert_eq!(user.dogs[0].read().name, "Pluto");
    assert!(user.dogs[0].is_managed());

    assert_eq!(store.count::<Address>(), 1);
    assert_eq!(store.count::<Dog>(), 1);
}

#[test]
fn test_map_twice_keeps_single_instance() {
    let mut store = Store::new();
    let mut json = user_json();
    mapped_user(&mut store, &json);

    json["name"] = json!("Renamed");
    mapped_user(&mut store, &json);

    let users = store.filter::<User>(|u| u.id == "1");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].read().name, "Renamed");
    assert_eq!(store.count::<Dog>(), 1);
}

#[test]
fn test_existing_reference_observes_update() {
    let mut store = Store::new();
    let mut json = user_json();
    let first = mapped_user(&mut store, &json);

    json["name"] = json!("Updated");
    json["dogs"][0]["color"] = json!("Brown");
    let second = mapped_user(&mut store, &json);

    assert!(first.ptr_eq(&second));
    assert_eq!(first.read().name, "Updated");
    assert_eq!(first.read().dogs[0].read().color, "Brown");
}

#[test]
fn test_absent_relation_is_left_untouched() {
    let mut store = Store::new();
    let mut json = user_json();
    let user = mapped_user(&mut store, &json);
    let address = user.read().address.clone().unwrap();

    json.as_object_mut().unwrap().remove("address");
    mapped_user(&mut store, &json);

    let current = user.read().address.clone().unwrap();
    assert!(current.ptr_eq(&address));
}

#[test]
fn test_null_relation_is_cleared() {
    let mut store = Store::new();
    let mut json = user_json();
    let user = mapped_user(&mut store, &json);

    json["address"] = Value::Null;
    mapped_user(&mut store, &json);

    assert!(user.read().address.is_none());
}

#[test]
fn test_wrong_kind_relation_is_ignored() {
    let mut store = Store::new();
    let mut json = user_json();
    let user = mapped_user(&mut store, &json);

    json["address"] = json!("somewhere");
    json["dogs"] = json!(42);
    mapped_user(&mut store, &json);

    let user = user.read();
    assert!(user.address.is_some());
    assert_eq!(user.dogs.len(), 1);
}

#[test]
fn test_strict_mapper_rejects_wrong_kind_relation() {
    let mut store = Store::new();
    let mut json = user_json();
    json["address"] = json!(["not", "an", "object"]);

    let mapper = Mapper::with_config(MapperConfig::new().strict_kinds(true));
    let err = store
        .write(|store| mapper.map::<User>(store, object(&json)))
        .unwrap_err();

    assert!(matches!(
        err,
        MappingError::UnexpectedKind { type_name: "User", expected: "object", found: "array", .. }
    ));
    assert_eq!(store.count::<User>(), 0);
}

#[test]
fn test_list_is_replaced_not_merged() {
    let mut store = Store::new();
    let mut json = user_json();
    let user = mapped_user(&mut store, &json);
    assert_eq!(user.read().dogs.len(), 1);

    json["dogs"] = dogs_json();
    mapped_user(&mut store, &json);

    let user = user.read();
    assert_eq!(user.dogs.len(), 2);
    assert_eq!(user.dogs[0].read().color, "Black new");
    assert_eq!(user.dogs[1].read().name, "Lux");
    assert_eq!(store.count::<Dog>(), 2);
}

#[test]
fn test_absent_list_is_left_untouched() {
    let mut store = Store::new();
    let mut json = user_json();
    let user = mapped_user(&mut store, &json);

    json.as_object_mut().unwrap().remove("dogs");
    mapped_user(&mut store, &json);

    assert_eq!(user.read().dogs.len(), 1);
}

#[test]
fn test_null_list_is_emptied() {
    let mut store = Store::new();
    let mut json = user_json();
    let user = mapped_user(&mut store, &json);

    json["dogs"] = Value::Null;
    mapped_user(&mut store, &json);

    assert_eq!(user.read().dogs.len(), 0);
    // the dog itself stays attached
    assert_eq!(store.count::<Dog>(), 1);
}

#[test]
fn test_nested_upsert_shares_instances() {
    let mut store = Store::new();
    let dogs = store
        .write(|store| store.map_array::<Dog>(array(&dogs_json())))
        .unwrap();
    let user = mapped_user(&mut store, &user_json());

    assert!(user.read().dogs[0].ptr_eq(&dogs[0]));
    assert_eq!(dogs[0].read().color, "Black");
    assert_eq!(store.count::<Dog>(), 2);
}

#[test]
fn test_map_array_in_order() {
    let mut store = Store::new();
    let dogs = store
        .write(|store| store.map_array::<Dog>(array(&dogs_json())))
        .unwrap();

    let names: Vec<String> = dogs.iter().map(|d| d.read().name.clone()).collect();
    assert_eq!(names, vec!["Pluto", "Lux"]);

    let stored: Vec<String> = store
        .objects::<Dog>()
        .iter()
        .map(|d| d.read().id.clone())
        .collect();
    assert_eq!(stored, vec!["1", "2"]);
}

#[test]
fn test_map_array_reports_first_failing_element() {
    let mut store = Store::new();
    let json = json!([
        {"id": "1", "name": "Ann"},
        {"name": "No id"},
        {"id": "3", "name": "Cid"}
    ]);

    store.begin_write().unwrap();
    let err = store.map_array::<User>(array(&json)).unwrap_err();

    assert!(matches!(
        &err,
        MappingError::Element { index: 1, source } if matches!(**source, MappingError::InvalidJson { type_name: "User", .. })
    ));
    assert_eq!(err.element_path(), vec![1]);
    assert!(store.object_for_primary_key::<User>("3").is_none());

    store.cancel_write().unwrap();
    assert_eq!(store.count::<User>(), 0);
}

#[test]
fn test_non_object_element_is_invalid_json() {
    let mut store = Store::new();
    let json = json!([{"id": "1"}, "dog"]);

    let err = store
        .write(|store| store.map_array::<Dog>(array(&json)))
        .unwrap_err();
    assert_eq!(err.element_path(), vec![1]);
    assert!(matches!(err.root(), MappingError::InvalidJson { type_name: "Dog", .. }));
}

#[test]
fn test_invalid_document_leaves_store_untouched() {
    let mut store = Store::new();
    let mut json = user_json();
    json["address"]["phone"] = json!({"type": "Home"});

    store.begin_write().unwrap();
    let err = store.map::<User>(object(&json)).unwrap_err();
    assert!(matches!(err, MappingError::InvalidJson { type_name: "Phone", .. }));
    assert!(store.is_empty());
    store.commit_write().unwrap();
}

#[test]
fn test_missing_primary_key() {
    let mut store = Store::new();
    let json = json!({"code": null, "dogs": []});

    let err = store
        .write(|store| store.map::<Kennel>(object(&json)))
        .unwrap_err();
    assert!(matches!(err, MappingError::MissingPrimaryKey { type_name: "Kennel" }));
    assert_eq!(err.code(), 2);
}

#[test]
fn test_missing_primary_key_in_nested_list() {
    let mut store = Store::new();
    let json = json!({"kennel": {"code": 4}});
    let kennels = json!([{"code": 4, "dogs": [{"id": "1"}]}, {"code": null}]);

    let err = store
        .write(|store| -> MappingResult<()> {
            store.map::<Kennel>(object(&json["kennel"]))?;
            store.map_array::<Kennel>(array(&kennels))?;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.element_path(), vec![1]);
    assert!(matches!(err.root(), MappingError::MissingPrimaryKey { .. }));
    // write closure failed, so everything was rolled back
    assert!(store.is_empty());
}

#[test]
fn test_integer_primary_keys() {
    let mut store = Store::new();
    let json = json!({"code": 7, "dogs": [{"id": "1", "name": "Pluto"}]});

    store
        .write(|store| -> MappingResult<()> {
            store.map::<Kennel>(object(&json))?;
            store.map::<Kennel>(object(&json))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(store.count::<Kennel>(), 1);
    assert!(store.object_for_primary_key::<Kennel>(PrimaryKey::Int(7)).is_some());
    assert!(store.object_for_primary_key::<Kennel>("7").is_none());
}

#[test]
fn test_map_requires_write_transaction() {
    let mut store = Store::new();
    let err = store.map::<User>(object(&user_json())).unwrap_err();
    assert!(matches!(err, MappingError::Store(StoreError::NotInWriteTransaction)));

    let err = store.map_array::<Dog>(array(&dogs_json())).unwrap_err();
    assert!(matches!(err, MappingError::Store(StoreError::NotInWriteTransaction)));
}

#[test]
fn test_map_value_rejects_non_objects() {
    let mut store = Store::new();
    let err = store
        .write(|store| Mapper::new().map_value::<Dog>(store, &json!(["1"])))
        .unwrap_err();
    assert!(matches!(err, MappingError::InvalidJson { type_name: "Dog", .. }));
}

#[test]
fn test_cancelled_upsert_restores_previous_values() {
    let mut store = Store::new();
    let mut json = user_json();
    let user = mapped_user(&mut store, &json);

    json["name"] = json!("Temporary");
    json["dogs"] = dogs_json();
    store.begin_write().unwrap();
    store.map::<User>(object(&json)).unwrap();
    assert_eq!(user.read().name, "Temporary");
    store.cancel_write().unwrap();

    let user = user.read();
    assert_eq!(user.name, "User");
    assert_eq!(user.dogs.len(), 1);
    assert_eq!(user.dogs[0].read().color, "Black");
    assert_eq!(store.count::<Dog>(), 1);
}

#[test]
fn test_absent_primary_key_is_missing_not_default() {
    let mut store = Store::new();
    let json = json!([{"name": "A"}, {"name": "B"}]);

    let err = store
        .write(|store| store.map_array::<Dog>(array(&json)))
        .unwrap_err();

    assert_eq!(err.element_path(), vec![0]);
    assert!(matches!(err.root(), MappingError::MissingPrimaryKey { type_name: "Dog" }));
    assert!(store.is_empty());
}

#[test]
fn test_absent_primary_key_in_nested_list() {
    let mut store = Store::new();
    let mut json = user_json();
    json["dogs"] = json!([{"id": "1"}, {"name": "Nameless"}]);

    let err = store
        .write(|store| store.map::<User>(object(&json)))
        .unwrap_err();

    assert_eq!(err.element_path(), vec![1]);
    assert!(matches!(err.root(), MappingError::MissingPrimaryKey { type_name: "Dog" }));
    assert!(store.is_empty());
}

#[test]
fn test_deep_graph_upsert_keeps_nested_identity() {
    let mut store = Store::new();
    let json = json!({"code": 1, "dogs": [{"id": "1", "name": "Pluto"}]});
    let kennel = store
        .write(|store| store.map::<Kennel>(object(&json)))
        .unwrap();
    let pluto = kennel.read().dogs[0].clone();

    let json = json!({"code": 1, "dogs": [{"id": "1", "color": "Gray"}, {"id": "2"}]});
    store
        .write(|store| store.map::<Kennel>(object(&json)))
        .unwrap();

    let kennel = kennel.read();
    assert!(kennel.dogs[0].ptr_eq(&pluto));
    assert_eq!(pluto.read().name, "Pluto");
    assert_eq!(pluto.read().color, "Gray");
    assert_eq!(store.count::<Dog>(), 2);
}

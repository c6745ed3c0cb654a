use kvnest_core::{JsonMap, JsonValue, Store, StoreConfig};
use serde_json::json;
use tempfile::TempDir;

fn open_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(StoreConfig::new(dir.path().join("store.db"), "proj1"));
    (dir, store)
}

fn value(raw: serde_json::Value) -> JsonValue {
    JsonValue::from(raw)
}

#[test]
fn add_then_get_returns_value() {
    let (_dir, store) = open_store();

    assert!(store.add("answer", 42));
    assert!(store.add("nested", value(json!({"list": [1, "a", null]}))));

    assert_eq!(store.get("answer"), Some(JsonValue::from(42)));
    assert_eq!(
        store.get("nested"),
        Some(value(json!({"list": [1, "a", null]})))
    );
}

#[test]
fn get_missing_key_returns_none() {
    let (_dir, store) = open_store();

    assert_eq!(store.get("missing"), None);
    assert_eq!(store.try_get("missing").unwrap(), None);
}

#[test]
fn null_value_is_distinct_from_missing_key() {
    let (_dir, store) = open_store();

    assert!(store.add("nothing", JsonValue::Null));
    assert_eq!(store.get("nothing"), Some(JsonValue::Null));
    assert!(store.exists("nothing", None));
}

#[test]
fn repeated_add_is_idempotent_and_keeps_created_at() {
    let (_dir, store) = open_store();

    assert!(store.add("k", "v"));
    let first = store.entry("k").unwrap();
    assert!(store.add("k", "v"));

    assert_eq!(store.get("k"), Some(JsonValue::from("v")));
    assert_eq!(store.count(), (1, 0));
    let second = store.entry("k").unwrap();
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
}

#[test]
fn add_overwrites_in_place() {
    let (_dir, store) = open_store();

    store.add("k", 1);
    store.add("k", value(json!({"replaced": true})));

    assert_eq!(store.get("k"), Some(value(json!({"replaced": true}))));
    assert_eq!(store.count(), (1, 0));
}

#[test]
fn subadd_auto_creates_empty_parent() {
    let (_dir, store) = open_store();

    assert!(store.subadd("p", "s", 1));

    assert!(store.exists("p", None));
    assert_eq!(store.get("p"), Some(JsonValue::empty_object()));
    assert_eq!(store.subget("p", "s"), Some(JsonValue::from(1)));
}

#[test]
fn subadd_keeps_existing_parent_value() {
    let (_dir, store) = open_store();

    store.add("p", value(json!({"own": "value"})));
    store.subadd("p", "s", 1);

    assert_eq!(store.get("p"), Some(value(json!({"own": "value"}))));
}

#[test]
fn subadd_replaces_existing_pair() {
    let (_dir, store) = open_store();

    store.subadd("p", "s", 1);
    let first = store.sub_entry("p", "s").unwrap();
    store.subadd("p", "s", "two");

    assert_eq!(store.subget("p", "s"), Some(JsonValue::from("two")));
    assert_eq!(store.count(), (1, 1));
    let second = store.sub_entry("p", "s").unwrap();
    assert_eq!(second.created_at, first.created_at);
}

#[test]
fn subget_missing_pair_returns_none() {
    let (_dir, store) = open_store();

    store.subadd("p", "s", 1);
    assert_eq!(store.subget("p", "other"), None);
    assert_eq!(store.subget("nobody", "s"), None);
}

#[test]
fn add_on_parent_keeps_its_sub_entries() {
    let (_dir, store) = open_store();

    store.subadd("p", "s", 1);
    store.add("p", "scalar");

    assert!(store.exists("p", Some("s")));
    assert_eq!(store.count(), (1, 1));
}

#[test]
fn get_all_subdata_collects_sub_entries() {
    let (_dir, store) = open_store();

    store.subadd("p", "a", 1);
    store.subadd("p", "b", value(json!([true])));
    store.subadd("q", "c", 3);

    let subdata = store.get_all_subdata("p");
    assert_eq!(subdata.len(), 2);
    assert_eq!(subdata["a"], JsonValue::from(1));
    assert_eq!(subdata["b"], value(json!([true])));
    assert!(store.get_all_subdata("none").is_empty());
}

#[test]
fn remove_without_subkey_deletes_entry_and_sub_entries() {
    let (_dir, store) = open_store();

    store.subadd("p", "s", 1);
    assert!(store.remove("p", None));

    assert!(!store.exists("p", None));
    assert!(!store.exists("p", Some("s")));
    assert_eq!(store.count(), (0, 0));
}

#[test]
fn remove_with_subkey_deletes_only_that_pair() {
    let (_dir, store) = open_store();

    store.subadd("p", "a", 1);
    store.subadd("p", "b", 2);
    assert!(store.remove("p", Some("a")));

    assert!(!store.exists("p", Some("a")));
    assert!(store.exists("p", Some("b")));
    assert!(store.exists("p", None));
}

#[test]
fn remove_missing_key_still_succeeds() {
    let (_dir, store) = open_store();

    assert!(store.remove("ghost", None));
    assert!(store.remove("ghost", Some("s")));
}

#[test]
fn empty_subkey_is_an_ordinary_subkey() {
    let (_dir, store) = open_store();

    store.subadd("p", "", 1);
    store.subadd("p", "s", 2);
    assert!(store.exists("p", Some("")));

    store.remove("p", Some(""));
    assert!(!store.exists("p", Some("")));
    assert!(store.exists("p", Some("s")));
}

#[test]
fn update_routes_objects_to_sub_entries() {
    let (_dir, store) = open_store();
    let mut data = JsonMap::new();
    data.insert("plain".to_string(), JsonValue::from(5));
    data.insert("group".to_string(), value(json!({"x": 1, "y": "two"})));

    assert!(store.update(&data));

    assert_eq!(store.get("plain"), Some(JsonValue::from(5)));
    assert_eq!(store.get("group"), Some(JsonValue::empty_object()));
    assert_eq!(store.subget("group", "x"), Some(JsonValue::from(1)));
    assert_eq!(store.subget("group", "y"), Some(JsonValue::from("two")));
    assert_eq!(store.count(), (2, 2));
}

#[test]
fn update_with_empty_object_writes_nothing() {
    let (_dir, store) = open_store();
    let mut data = JsonMap::new();
    data.insert("empty".to_string(), JsonValue::empty_object());

    assert!(store.update(&data));
    assert!(!store.exists("empty", None));
}

#[test]
fn fetchall_merges_object_entry_with_sub_entries() {
    let (_dir, store) = open_store();

    store.add("cfg", value(json!({"x": 1})));
    store.subadd("cfg", "y", 2);
    store.add("plain", "text");

    let all = store.fetchall();
    assert_eq!(all["cfg"], value(json!({"x": 1, "y": 2})));
    assert_eq!(all["plain"], JsonValue::from("text"));
    assert_eq!(all.len(), 2);
}

#[test]
fn fetchall_replaces_scalar_entry_that_has_sub_entries() {
    let (_dir, store) = open_store();

    store.subadd("k", "a", 1);
    store.add("k", 99);

    assert_eq!(store.fetchall()["k"], value(json!({"a": 1})));
}

#[test]
fn fetchall_on_empty_store_is_empty() {
    let (_dir, store) = open_store();
    assert!(store.fetchall().is_empty());
}

#[test]
fn setup_and_check_track_completion() {
    let (_dir, store) = open_store();

    assert_eq!(store.check(), None);

    assert!(store.setup(true, "proj1"));
    assert_eq!(store.check().as_deref(), Some("proj1"));

    assert!(store.setup(false, "proj1"));
    assert_eq!(store.check(), None);
    assert_eq!(
        store.get("done"),
        Some(value(json!({"status": false, "name": "proj1"})))
    );
}

#[test]
fn setup_default_uses_configured_name() {
    let (_dir, store) = open_store();

    assert!(store.setup_default(true));
    assert_eq!(store.check().as_deref(), Some("proj1"));
}

#[test]
fn count_matches_distinct_keys_and_subkeys() {
    let (_dir, store) = open_store();

    store.setup(true, "proj1");
    store.add("cfg", value(json!({"x": 1})));
    store.subadd("cfg", "y", 2);
    store.subadd("p", "a", 1);
    store.subadd("p", "b", 2);
    store.subadd("p", "b", 3);

    assert_eq!(store.count(), (3, 3));
    assert_eq!(store.try_count().unwrap(), (3, 3));
}

#[test]
fn data_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("store.db"), "proj1");

    {
        let store = Store::open(config.clone());
        store.subadd("p", "s", "kept");
    }

    let reopened = Store::open(config);
    assert_eq!(reopened.subget("p", "s"), Some(JsonValue::from("kept")));
}

#[test]
fn open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Assets").join("proj1.db");

    let store = Store::open(StoreConfig::new(&path, "proj1"));

    assert!(store.add("k", 1));
    assert!(path.is_file());
}

use serde_json::json;
use spark_tracked::{
    cloned, effect, flush_sync, root, ReactiveDate, ReactiveMap, ReactiveRecord, ReactiveSearchParams,
    ReactiveSet, ReactiveUrl, ReactiveVec,
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn map_serializes_as_ordered_pairs() {
    let m: ReactiveMap<String, i32> = [("b".to_string(), 2), ("a".to_string(), 1)].into_iter().collect();
    assert_eq!(serde_json::to_value(&m).unwrap(), json!([["b", 2], ["a", 1]]));
}

#[test]
fn set_serializes_in_insertion_order() {
    let s: ReactiveSet<u32> = [3, 1, 2].into_iter().collect();
    assert_eq!(serde_json::to_string(&s).unwrap(), "[3,1,2]");
}

#[test]
fn vec_serializes_as_a_sequence() {
    let v: ReactiveVec<u32> = [3, 1, 2].into_iter().collect();
    v.sort();
    assert_eq!(serde_json::to_string(&v).unwrap(), "[1,2,3]");
}

#[test]
fn record_serializes_its_present_fields() {
    let r: ReactiveRecord<String, i32> = [("x".to_string(), 1), ("y".to_string(), 2)].into_iter().collect();
    r.remove("x");
    let _ = r.get("never");
    assert_eq!(serde_json::to_value(&r).unwrap(), json!({ "y": 2 }));
}

#[test]
fn date_serializes_like_to_json() {
    let date = ReactiveDate::from_timestamp_millis(1_709_634_030_456).unwrap();
    assert_eq!(serde_json::to_value(&date).unwrap(), json!("2024-03-05T10:20:30.456Z"));
}

#[test]
fn url_and_params_serialize() {
    let url = ReactiveUrl::parse("https://example.com/p?a=1&b=two").unwrap();
    assert_eq!(serde_json::to_value(&url).unwrap(), json!("https://example.com/p?a=1&b=two"));

    let params = ReactiveSearchParams::new("x=1&x=2");
    assert_eq!(serde_json::to_value(&params).unwrap(), json!([["x", "1"], ["x", "2"]]));
}

#[test]
fn serializing_inside_an_effect_tracks_the_contents() {
    let m: ReactiveMap<&str, i32> = [("k", 1)].into_iter().collect();
    let snapshots = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(m, snapshots => move || {
        effect(cloned!(m, snapshots => move || {
            snapshots.borrow_mut().push(serde_json::to_string(&m).unwrap());
        }));
    }));
    flush_sync();

    m.insert("k", 2);
    flush_sync();
    m.insert("k", 2);
    flush_sync();
    assert_eq!(*snapshots.borrow(), vec![r#"[["k",1]]"#, r#"[["k",2]]"#]);
}

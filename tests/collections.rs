use spark_tracked::{
    cloned, effect, flush_sync, root, Error, ReactiveMap, ReactiveRecord, ReactiveSet, ReactiveVec,
};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

#[test]
fn equal_write_keeps_iteration_snapshot() {
    let m: ReactiveMap<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
    let runs = counter();

    let _tree = root(cloned!(m, runs => move || {
        effect(cloned!(m, runs => move || {
            let _ = m.entries();
            runs.set(runs.get() + 1);
        }));
    }));
    flush_sync();
    assert_eq!(runs.get(), 1);

    m.insert("a", 1);
    flush_sync();
    assert_eq!(runs.get(), 1, "equal value must not invalidate entries()");

    m.insert("a", 5);
    flush_sync();
    assert_eq!(runs.get(), 2);
}

#[test]
fn missing_key_reads_are_tracked() {
    let m: ReactiveMap<String, i32> = ReactiveMap::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(m, seen => move || {
        effect(cloned!(m, seen => move || seen.borrow_mut().push(m.contains_key("late"))));
    }));
    flush_sync();

    m.insert("late".to_string(), 1);
    flush_sync();
    assert_eq!(*seen.borrow(), vec![false, true]);

    m.remove("late");
    flush_sync();
    assert_eq!(*seen.borrow(), vec![false, true, false]);
}

#[test]
fn size_readers_ignore_value_changes() {
    let m: ReactiveMap<&str, i32> = [("a", 1)].into_iter().collect();
    let runs = counter();

    let _tree = root(cloned!(m, runs => move || {
        effect(cloned!(m, runs => move || {
            let _ = m.len();
            runs.set(runs.get() + 1);
        }));
    }));
    flush_sync();

    m.insert("a", 2);
    m.insert("a", 3);
    flush_sync();
    assert_eq!(runs.get(), 1);

    m.insert("b", 1);
    flush_sync();
    assert_eq!(runs.get(), 2);
}

#[test]
fn clear_is_observed_as_one_update() {
    let m: ReactiveMap<&str, i32> = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
    let observed = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(m, observed => move || {
        effect(cloned!(m, observed => move || {
            let state = (m.len(), m.get("a"), m.get("b"), m.contains_key("c"));
            observed.borrow_mut().push(state);
        }));
    }));
    flush_sync();

    m.clear();
    flush_sync();

    let observed = observed.borrow();
    assert_eq!(observed.len(), 2);
    assert_eq!(observed[1], (0, None, None, false));
}

#[test]
fn clear_seen_from_inside_a_reader() {
    // Every cell bump happens after storage is emptied: a reader woken by any
    // of them sees the final state.
    let m: ReactiveMap<i32, i32> = (0..4).map(|i| (i, i)).collect();
    let m2 = m.clone();
    let sizes = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(sizes => move || {
        effect(cloned!(m2, sizes => move || {
            for k in 0..4 {
                let _ = m2.get(&k);
            }
            sizes.borrow_mut().push(m2.len());
        }));
    }));
    flush_sync();
    m.clear();
    flush_sync();
    assert_eq!(*sizes.borrow(), vec![4, 0]);
}

#[test]
fn keys_follow_membership_not_values() {
    let m: ReactiveMap<&str, i32> = [("x", 1)].into_iter().collect();
    let keys = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(m, keys => move || {
        effect(cloned!(m, keys => move || keys.borrow_mut().push(m.keys())));
    }));
    flush_sync();

    m.insert("x", 10);
    flush_sync();
    m.insert("y", 2);
    flush_sync();
    assert_eq!(*keys.borrow(), vec![vec!["x"], vec!["x", "y"]]);
}

#[test]
fn map_scenario_logs_distinct_values() {
    let m: ReactiveMap<&str, i32> = [("a", 1)].into_iter().collect();
    let log = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(m, log => move || {
        effect(cloned!(m, log => move || log.borrow_mut().push(m.get("a"))));
    }));
    flush_sync();
    m.insert("a", 1);
    flush_sync();
    assert_eq!(*log.borrow(), vec![Some(1)]);

    m.insert("a", 2);
    flush_sync();
    assert_eq!(*log.borrow(), vec![Some(1), Some(2)]);
}

#[test]
fn set_scenario_union_is_independent() {
    let s: ReactiveSet<i32> = [1, 2].into_iter().collect();
    let d: ReactiveSet<i32> = [2, 3].into_iter().collect();
    let d2 = s.union(&d);

    let mut items = d2.to_vec();
    items.sort();
    assert_eq!(items, vec![1, 2, 3]);

    d2.remove(&1);
    assert!(s.contains(&1));
    s.insert(9);
    assert!(!d2.contains(&9));
}

#[test]
fn set_membership_and_size_are_separate() {
    let s: ReactiveSet<&str> = ["a"].into_iter().collect();
    let membership = counter();
    let size = counter();

    let _tree = root(cloned!(s, membership, size => move || {
        effect(cloned!(s, membership => move || {
            let _ = s.contains(&"a");
            membership.set(membership.get() + 1);
        }));
        effect(cloned!(s, size => move || {
            let _ = s.len();
            size.set(size.get() + 1);
        }));
    }));
    flush_sync();

    s.insert("b");
    flush_sync();
    assert_eq!((membership.get(), size.get()), (1, 2));

    s.remove(&"a");
    flush_sync();
    assert_eq!((membership.get(), size.get()), (2, 3));

    // Re-adding what is already present is a no-op
    s.insert("b");
    flush_sync();
    assert_eq!((membership.get(), size.get()), (2, 3));
}

#[test]
fn set_algebra_against_plain_sets() {
    let s: ReactiveSet<i32> = [1, 2, 3, 4].into_iter().collect();
    let plain: HashSet<i32> = [3, 4, 5].into_iter().collect();

    let mut inter = s.intersection(&plain).to_vec();
    inter.sort();
    assert_eq!(inter, vec![3, 4]);

    let mut diff = s.difference(&plain).to_vec();
    diff.sort();
    assert_eq!(diff, vec![1, 2]);

    let mut sym = s.symmetric_difference(&plain).to_vec();
    sym.sort();
    assert_eq!(sym, vec![1, 2, 5]);

    assert!(!s.is_disjoint(&plain));
    assert!(s.is_superset(&HashSet::from([1, 2])));
    assert!(!s.is_subset(&plain));
}

#[test]
fn vec_scenario_index_and_length_readers() {
    let todos: ReactiveVec<&str> = ["write", "review"].into_iter().collect();
    let first = Rc::new(RefCell::new(Vec::new()));
    let lengths = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(todos, first, lengths => move || {
        effect(cloned!(todos, first => move || first.borrow_mut().push(todos.get(0))));
        effect(cloned!(todos, lengths => move || lengths.borrow_mut().push(todos.len())));
    }));
    flush_sync();

    todos.set(1, "merge").unwrap();
    flush_sync();
    todos.push("ship");
    flush_sync();
    todos.insert(0, "plan").unwrap();
    flush_sync();

    assert_eq!(*first.borrow(), vec![Some("write"), Some("plan")]);
    assert_eq!(*lengths.borrow(), vec![2, 3, 4]);
    assert_eq!(todos.to_vec(), vec!["plan", "write", "merge", "ship"]);
    assert!(matches!(todos.remove(9), Err(Error::IndexOutOfBounds { index: 9, len: 4 })));
}

#[test]
fn record_scenario_fields_are_independent() {
    let profile: ReactiveRecord<String, String> =
        [("name".to_string(), "ada".to_string())].into_iter().collect();
    let names = counter();
    let fields = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(profile, names, fields => move || {
        effect(cloned!(profile, names => move || {
            let _ = profile.get("name");
            names.set(names.get() + 1);
        }));
        effect(cloned!(profile, fields => move || fields.borrow_mut().push(profile.keys().join(","))));
    }));
    flush_sync();

    profile.insert("email".to_string(), "ada@example.com".to_string());
    flush_sync();
    profile.insert("email".to_string(), "ada@example.org".to_string());
    flush_sync();
    assert_eq!(names.get(), 1);

    profile.insert("name".to_string(), "grace".to_string());
    profile.remove("email");
    flush_sync();
    assert_eq!(names.get(), 2);
    assert_eq!(*fields.borrow(), vec!["name", "name,email", "name"]);
}

use spark_tracked::{cloned, derived, effect, flush_sync, root, ReactiveMap, ReactiveSet, Tracked};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn showcase_derived_over_collections() {
    let prices: ReactiveMap<&str, u32> = [("apple", 3), ("pear", 5)].into_iter().collect();
    let basket: ReactiveSet<&str> = ["apple"].into_iter().collect();

    // Captures both handles without manual clones
    let total = derived!(prices, basket => {
        basket
            .iter()
            .filter_map(|item| prices.get(item))
            .sum::<u32>()
    });
    assert_eq!(total.get(), 3);

    basket.insert("pear");
    assert_eq!(total.get(), 8);

    prices.insert("apple", 4);
    assert_eq!(total.get(), 9);
}

#[test]
fn showcase_effect_macro() {
    let name = Tracked::new("ferris".to_string());
    let greetings = Rc::new(RefCell::new(Vec::new()));

    let _tree = root(cloned!(name, greetings => move || {
        effect!(name, greetings => greetings.borrow_mut().push(format!("hello {}", name.get())));
    }));
    flush_sync();

    name.set("corro".to_string());
    flush_sync();
    assert_eq!(*greetings.borrow(), vec!["hello ferris", "hello corro"]);
}

#[test]
fn showcase_plain_closures() {
    let n = Tracked::new(2);
    // No captures to clone: the expression form
    let constant = derived!(40 + 2);
    let squared = derived!(n => n.get() * n.get());

    assert_eq!(constant.get(), 42);
    assert_eq!(squared.get(), 4);
    n.set(3);
    assert_eq!(squared.get(), 9);
}

//! Integration tests for the hashed-tree containers and tuples.
//!
//! These exercise the containers through the public `Specifier` surface
//! rather than any one module's internals, to catch regressions at the
//! boundary callers (the compiler's literal table, a future interpreter)
//! actually cross.

use setl2_runtime::Specifier;
use setl2_runtime::container::map::{MapRoot, cow as map_cow, map_to_set, set_to_map};
use setl2_runtime::container::set::{SetRoot, cow as set_cow};
use setl2_runtime::container::tuple::TupleRoot;

#[test]
fn set_hash_law_equal_values_hash_equal() {
    let a = SetRoot::new();
    let b = SetRoot::new();
    for v in [5, 1, 9, 3, 7, 2, 8, 4, 6, 0] {
        a.borrow_mut().insert(Specifier::Short(v));
    }
    for v in [0, 2, 4, 6, 8, 1, 3, 5, 7, 9] {
        b.borrow_mut().insert(Specifier::Short(v));
    }
    assert!(a.borrow().equal(&b.borrow()));
    assert_eq!(a.borrow().hash_code(), b.borrow().hash_code());
}

#[test]
fn set_cow_leaves_shared_original_untouched_across_many_inserts() {
    let original = SetRoot::new();
    original.borrow_mut().insert(Specifier::Short(1));
    let alias = original.clone();
    assert_eq!(std::rc::Rc::strong_count(&original), 2);

    let private = set_cow(&alias);
    for v in 2..30 {
        private.borrow_mut().insert(Specifier::Short(v));
    }
    assert_eq!(original.borrow().cardinality(), 1);
    assert_eq!(private.borrow().cardinality(), 29);
}

#[test]
fn map_cow_isolates_mutation_from_aliases() {
    let original = MapRoot::new();
    original.borrow_mut().insert(Specifier::Short(1), Specifier::Short(10));
    let alias = original.clone();
    let private = map_cow(&alias);
    private.borrow_mut().insert(Specifier::Short(2), Specifier::Short(20));
    assert_eq!(original.borrow().cardinality(), 1);
    assert_eq!(private.borrow().cardinality(), 2);
}

#[test]
fn map_to_set_and_back_round_trips_cardinality() {
    let map = MapRoot::new();
    {
        let mut m = map.borrow_mut();
        m.insert(Specifier::Short(1), Specifier::Short(100));
        m.insert(Specifier::Short(2), Specifier::Short(200));
        m.insert(Specifier::Short(3), Specifier::Short(300));
    }
    let as_set = map_to_set(&map.borrow());
    assert_eq!(as_set.borrow().cardinality(), 3);

    let pairs: Vec<Specifier> = as_set.borrow().iter();
    let back = set_to_map(&pairs, false).unwrap();
    assert_eq!(back.borrow().cardinality(), 3);
    for (d, r) in [(1, 100), (2, 200), (3, 300)] {
        let (range, is_multi) = back.borrow().get(&Specifier::Short(d)).unwrap();
        assert!(!is_multi);
        assert!(range.equal(&Specifier::Short(r)));
    }
}

#[test]
fn nested_tuple_of_sets_compares_structurally() {
    let set_a = SetRoot::new();
    set_a.borrow_mut().insert(Specifier::Short(1));
    let set_b = SetRoot::new();
    set_b.borrow_mut().insert(Specifier::Short(1));

    let tuple_a = TupleRoot::from_vec(vec![Specifier::Short(0), Specifier::Set(set_a)]);
    let tuple_b = TupleRoot::from_vec(vec![Specifier::Short(0), Specifier::Set(set_b)]);
    assert!(tuple_a.borrow().equal(&tuple_b.borrow()));
}

#[test]
fn expansion_then_many_removals_contracts_map_without_losing_entries() {
    let map = MapRoot::new();
    {
        let mut m = map.borrow_mut();
        for i in 0..40 {
            m.insert(Specifier::Short(i), Specifier::new_string(format!("v{i}")));
        }
    }
    assert!(map.borrow().height() >= 1);
    {
        let mut m = map.borrow_mut();
        for i in 0..35 {
            m.remove(&Specifier::Short(i)).unwrap();
        }
    }
    let m = map.borrow();
    assert_eq!(m.cell_count(), 5);
    for i in 35..40 {
        assert!(m.get(&Specifier::Short(i)).is_some());
    }
}

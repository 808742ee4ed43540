//! Persistent hashed-tree set (spec §3.3.1, §4.2).

use super::{CLASH_SIZE, HASH_SIZE, child_index};
use crate::specifier::Specifier;
use setl2_core::arena::{Arena, Handle};
use std::cell::RefCell;
use std::rc::Rc;

struct Cell {
    hash: i32,
    spec: Specifier,
    next: Option<Handle<Cell>>,
}

enum Child {
    Empty,
    Clash(Handle<Cell>),
    Node(Handle<Header>),
}

enum Kind {
    Root { cardinality: u32, height: u32 },
    Intern { parent: Handle<Header>, child_index: u8 },
}

struct Header {
    /// XOR-fold of every element hash reachable beneath this header. Root's
    /// copy of this field is the container's hash code (§4.1).
    hash: i32,
    kind: Kind,
    children: [Child; HASH_SIZE as usize],
}

impl Header {
    fn new_root() -> Self {
        Header {
            hash: 0,
            kind: Kind::Root {
                cardinality: 0,
                height: 0,
            },
            children: [Child::Empty, Child::Empty, Child::Empty, Child::Empty],
        }
    }
}

/// Owning store for one set's trie. Wrapped in `Rc<RefCell<_>>` by
/// [`SetHandle`] so `Rc::strong_count` plays the role of the original's
/// `s_use_count`.
pub struct SetRoot {
    headers: Arena<Header>,
    cells: Arena<Cell>,
    root: Handle<Header>,
}

pub type SetHandle = Rc<RefCell<SetRoot>>;

impl SetRoot {
    pub fn new() -> SetHandle {
        let mut headers = Arena::new();
        let root = headers.insert(Header::new_root());
        Rc::new(RefCell::new(SetRoot {
            headers,
            cells: Arena::new(),
            root,
        }))
    }

    pub fn cardinality(&self) -> u32 {
        match self.headers.get(self.root).unwrap().kind {
            Kind::Root { cardinality, .. } => cardinality,
            Kind::Intern { .. } => unreachable!("root header must be Kind::Root"),
        }
    }

    pub fn height(&self) -> u32 {
        match self.headers.get(self.root).unwrap().kind {
            Kind::Root { height, .. } => height,
            Kind::Intern { .. } => unreachable!("root header must be Kind::Root"),
        }
    }

    pub fn hash_code(&self) -> i32 {
        self.headers.get(self.root).unwrap().hash
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }

    /// Structural equality: same cardinality, same hash, and every element
    /// of one is a member of the other (spec §4.1 "value equality").
    pub fn equal(&self, other: &SetRoot) -> bool {
        self.cardinality() == other.cardinality()
            && self.hash_code() == other.hash_code()
            && self.iter().into_iter().all(|e| other.contains(&e))
    }

    pub fn contains(&self, spec: &Specifier) -> bool {
        let hash = spec.hash_code();
        let height = self.height();
        let mut node = self.root;
        let mut depth = 0;
        loop {
            let header = self.headers.get(node).unwrap();
            let idx = child_index(hash, height.saturating_sub(depth + 1));
            match &header.children[idx] {
                Child::Empty => return false,
                Child::Node(h) => {
                    node = *h;
                    depth += 1;
                }
                Child::Clash(first) => {
                    let mut cursor = Some(*first);
                    while let Some(h) = cursor {
                        let cell = self.cells.get(h).unwrap();
                        if cell.hash == hash && cell.spec.equal(spec) {
                            return true;
                        }
                        if cell.hash > hash {
                            return false;
                        }
                        cursor = cell.next;
                    }
                    return false;
                }
            }
        }
    }

    /// Insert `spec`; returns `true` if it was newly added (mirrors
    /// `false` on duplicate, matching SETL2's silent membership semantics).
    pub fn insert(&mut self, spec: Specifier) -> bool {
        let hash = spec.hash_code();
        let height = self.height();
        let inserted = self.insert_at(self.root, hash, spec, height, 0);
        if inserted {
            self.xor_hash_on_path(hash);
            let cardinality = {
                let header = self.headers.get_mut(self.root).unwrap();
                match &mut header.kind {
                    Kind::Root { cardinality, .. } => {
                        *cardinality += 1;
                        *cardinality
                    }
                    _ => unreachable!(),
                }
            };
            if cardinality > (HASH_SIZE.pow(self.height().max(0)) * CLASH_SIZE).max(CLASH_SIZE) {
                self.expand();
            }
        }
        inserted
    }

    fn xor_hash_on_path(&mut self, hash: i32) {
        // Root's hash is the one externally observable container hash; per
        // §4.1 it is the XOR-fold across every element, independent of
        // insertion order, so a single XOR at the root suffices.
        let header = self.headers.get_mut(self.root).unwrap();
        header.hash ^= hash;
    }

    fn insert_at(&mut self, node: Handle<Header>, hash: i32, spec: Specifier, height: u32, depth: u32) -> bool {
        let idx = child_index(hash, height.saturating_sub(depth + 1));
        let header = self.headers.get(node).unwrap();
        match &header.children[idx] {
            Child::Empty => {
                let cell = self.cells.insert(Cell {
                    hash,
                    spec,
                    next: None,
                });
                self.headers.get_mut(node).unwrap().children[idx] = Child::Clash(cell);
                true
            }
            Child::Node(child) => {
                let child = *child;
                self.insert_at(child, hash, spec, height, depth + 1)
            }
            Child::Clash(first) => {
                let first = *first;
                // Sorted-by-hash clash list splice, rejecting a matching
                // specifier at equal hash (duplicate elements rejected).
                let mut prev: Option<Handle<Cell>> = None;
                let mut cursor = Some(first);
                while let Some(h) = cursor {
                    let cell = self.cells.get(h).unwrap();
                    if cell.hash == hash && cell.spec.equal(&spec) {
                        return false;
                    }
                    if cell.hash > hash {
                        break;
                    }
                    prev = cursor;
                    cursor = cell.next;
                }
                let new_cell = self.cells.insert(Cell {
                    hash,
                    spec,
                    next: cursor,
                });
                match prev {
                    Some(p) => self.cells.get_mut(p).unwrap().next = Some(new_cell),
                    None => {
                        self.headers.get_mut(node).unwrap().children[idx] = Child::Clash(new_cell)
                    }
                }
                true
            }
        }
    }

    /// Expand the bottom layer by one level (spec §4.2 "Expansion"):
    /// every leaf clash list becomes an internal header whose children
    /// redistribute the same cells by the next `SHIFT_DIST` bits.
    fn expand(&mut self) {
        let old_height = self.height();
        {
            let header = self.headers.get_mut(self.root).unwrap();
            if let Kind::Root { height, .. } = &mut header.kind {
                *height += 1;
            }
        }
        self.expand_subtree(self.root, old_height, 0);
    }

    fn expand_subtree(&mut self, node: Handle<Header>, old_height: u32, depth: u32) {
        for idx in 0..HASH_SIZE as usize {
            let child = std::mem::replace(
                &mut self.headers.get_mut(node).unwrap().children[idx],
                Child::Empty,
            );
            match child {
                Child::Empty => {}
                Child::Node(h) => {
                    self.expand_subtree(h, old_height, depth + 1);
                    self.headers.get_mut(node).unwrap().children[idx] = Child::Node(h);
                }
                Child::Clash(first) => {
                    let new_node = self.headers.insert(Header {
                        hash: 0,
                        kind: Kind::Intern {
                            parent: node,
                            child_index: idx as u8,
                        },
                        children: [Child::Empty, Child::Empty, Child::Empty, Child::Empty],
                    });
                    let mut cursor = Some(first);
                    while let Some(h) = cursor {
                        let (hash, next) = {
                            let cell = self.cells.get(h).unwrap();
                            (cell.hash, cell.next)
                        };
                        self.cells.get_mut(h).unwrap().next = None;
                        self.splice_sorted(new_node, old_height + 1, depth + 1, h, hash);
                        cursor = next;
                    }
                    self.headers.get_mut(node).unwrap().children[idx] = Child::Node(new_node);
                }
            }
        }
    }

    fn splice_sorted(
        &mut self,
        node: Handle<Header>,
        height: u32,
        depth: u32,
        cell_handle: Handle<Cell>,
        hash: i32,
    ) {
        let idx = child_index(hash, height.saturating_sub(depth + 1));
        let head = match &self.headers.get(node).unwrap().children[idx] {
            Child::Clash(h) => Some(*h),
            _ => None,
        };
        let mut prev: Option<Handle<Cell>> = None;
        let mut cursor = head;
        while let Some(h) = cursor {
            let c_hash = self.cells.get(h).unwrap().hash;
            if c_hash > hash {
                break;
            }
            prev = cursor;
            cursor = self.cells.get(h).unwrap().next;
        }
        self.cells.get_mut(cell_handle).unwrap().next = cursor;
        match prev {
            Some(p) => self.cells.get_mut(p).unwrap().next = Some(cell_handle),
            None => self.headers.get_mut(node).unwrap().children[idx] = Child::Clash(cell_handle),
        }
    }

    /// Stackless iteration over every element, using an explicit traversal
    /// stack rather than the original's in-node cursor (§9): safe for
    /// concurrent/re-entrant traversal of the same tree.
    pub fn iter(&self) -> Vec<Specifier> {
        let mut out = Vec::with_capacity(self.cardinality() as usize);
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            let header = self.headers.get(node).unwrap();
            for child in &header.children {
                match child {
                    Child::Empty => {}
                    Child::Node(h) => stack.push(*h),
                    Child::Clash(first) => {
                        let mut cursor = Some(*first);
                        while let Some(h) = cursor {
                            let cell = self.cells.get(h).unwrap();
                            out.push(cell.spec.clone());
                            cursor = cell.next;
                        }
                    }
                }
            }
        }
        out
    }

    pub fn clone_deep(&self) -> SetHandle {
        let mut copy = SetRoot::new();
        {
            let mut copy_ref = copy.borrow_mut();
            for spec in self.iter() {
                copy_ref.insert(spec);
            }
        }
        copy
    }
}

/// Copy-on-write accessor: if `handle` is shared, returns a private deep
/// clone; otherwise returns `handle` unchanged. Mirrors §4.1's
/// `copy_on_write` contract — a read-only traversal never mutates through a
/// shared root, an in-place mutation clones first.
pub fn cow(handle: &SetHandle) -> SetHandle {
    if Rc::strong_count(handle) > 1 {
        handle.borrow().clone_deep()
    } else {
        handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specifier::Specifier;

    #[test]
    fn insert_rejects_duplicates() {
        let set = SetRoot::new();
        {
            let mut s = set.borrow_mut();
            assert!(s.insert(Specifier::Short(1)));
            assert!(!s.insert(Specifier::Short(1)));
            assert_eq!(s.cardinality(), 1);
        }
    }

    #[test]
    fn hash_is_order_independent() {
        let a = SetRoot::new();
        let b = SetRoot::new();
        {
            let mut sa = a.borrow_mut();
            sa.insert(Specifier::Short(1));
            sa.insert(Specifier::Short(2));
            sa.insert(Specifier::Short(3));
        }
        {
            let mut sb = b.borrow_mut();
            sb.insert(Specifier::Short(3));
            sb.insert(Specifier::Short(1));
            sb.insert(Specifier::Short(2));
        }
        assert_eq!(a.borrow().hash_code(), b.borrow().hash_code());
    }

    #[test]
    fn expansion_preserves_all_elements() {
        let set = SetRoot::new();
        {
            let mut s = set.borrow_mut();
            for i in 0..12 {
                s.insert(Specifier::Short(i));
            }
        }
        let r = set.borrow();
        assert!(r.height() >= 1, "12 elements at CLASH_SIZE=3 must expand");
        let mut got: Vec<i32> = r
            .iter()
            .into_iter()
            .map(|s| match s {
                Specifier::Short(n) => n,
                _ => panic!("unexpected variant"),
            })
            .collect();
        got.sort_unstable();
        assert_eq!(got, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn cow_isolates_mutation() {
        let original = SetRoot::new();
        original.borrow_mut().insert(Specifier::Short(1));
        let shared = original.clone();
        let copy = cow(&shared);
        copy.borrow_mut().insert(Specifier::Short(2));
        assert_eq!(original.borrow().cardinality(), 1);
        assert_eq!(copy.borrow().cardinality(), 2);
    }

    #[test]
    fn contains_after_many_inserts() {
        let set = SetRoot::new();
        {
            let mut s = set.borrow_mut();
            for i in 0..50 {
                s.insert(Specifier::Short(i));
            }
        }
        let r = set.borrow();
        for i in 0..50 {
            assert!(r.contains(&Specifier::Short(i)));
        }
        assert!(!r.contains(&Specifier::Short(999)));
    }
}

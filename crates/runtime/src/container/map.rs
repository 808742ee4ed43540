//! Persistent hashed-tree map (spec §3.3.2, §4.2).
//!
//! Shaped exactly like [`super::set`] but keyed on the domain element's
//! hash, with cells carrying `(domain, range, is_multi_val)` triples per the
//! original's `map_c_item` (confirmed against `original_source/src/maps.h`).
//! A second insertion under an already-present domain element promotes the
//! cell's range to a nested set (`is_multi_val` flips).

use super::set::{SetHandle, SetRoot};
use super::{CLASH_SIZE, HASH_SIZE, child_index};
use crate::error::ContainerError;
use crate::specifier::Specifier;
use setl2_core::arena::{Arena, Handle};
use std::cell::RefCell;
use std::rc::Rc;

struct Cell {
    hash: i32,
    domain: Specifier,
    range: Specifier,
    is_multi_val: bool,
    next: Option<Handle<Cell>>,
}

enum Child {
    Empty,
    Clash(Handle<Cell>),
    Node(Handle<Header>),
}

enum Kind {
    Root {
        cardinality: u32,
        cell_count: u32,
        height: u32,
    },
    Intern {
        #[allow(dead_code)]
        parent: Handle<Header>,
        #[allow(dead_code)]
        child_index: u8,
    },
}

struct Header {
    hash: i32,
    kind: Kind,
    children: [Child; HASH_SIZE as usize],
}

pub struct MapRoot {
    headers: Arena<Header>,
    cells: Arena<Cell>,
    root: Handle<Header>,
}

pub type MapHandle = Rc<RefCell<MapRoot>>;

impl MapRoot {
    pub fn new() -> MapHandle {
        let mut headers = Arena::new();
        let root = headers.insert(Header {
            hash: 0,
            kind: Kind::Root {
                cardinality: 0,
                cell_count: 0,
                height: 0,
            },
            children: [Child::Empty, Child::Empty, Child::Empty, Child::Empty],
        });
        Rc::new(RefCell::new(MapRoot {
            headers,
            cells: Arena::new(),
            root,
        }))
    }

    fn root_kind(&self) -> (u32, u32, u32) {
        match self.headers.get(self.root).unwrap().kind {
            Kind::Root {
                cardinality,
                cell_count,
                height,
            } => (cardinality, cell_count, height),
            _ => unreachable!(),
        }
    }

    pub fn cardinality(&self) -> u32 {
        self.root_kind().0
    }
    pub fn cell_count(&self) -> u32 {
        self.root_kind().1
    }
    pub fn height(&self) -> u32 {
        self.root_kind().2
    }
    pub fn hash_code(&self) -> i32 {
        self.headers.get(self.root).unwrap().hash
    }

    /// Structural equality: same cell count and hash, and every domain/range
    /// pair of one appears in the other (spec §4.1 "value equality").
    pub fn equal(&self, other: &MapRoot) -> bool {
        if self.cell_count() != other.cell_count() || self.hash_code() != other.hash_code() {
            return false;
        }
        self.pairs().into_iter().all(|(d, r)| match other.get(&d) {
            Some((other_r, _)) => other_r.equal(&r),
            None => false,
        })
    }

    /// Look up the range value(s) bound to `domain`. Returns `None` if
    /// absent; `Some((range, is_multi_val))` otherwise, where `range` is a
    /// `Set` specifier when `is_multi_val` is set.
    pub fn get(&self, domain: &Specifier) -> Option<(Specifier, bool)> {
        let hash = domain.hash_code();
        let height = self.height();
        let mut node = self.root;
        let mut depth = 0;
        loop {
            let header = self.headers.get(node).unwrap();
            let idx = child_index(hash, height.saturating_sub(depth + 1));
            match &header.children[idx] {
                Child::Empty => return None,
                Child::Node(h) => {
                    node = *h;
                    depth += 1;
                }
                Child::Clash(first) => {
                    let mut cursor = Some(*first);
                    while let Some(h) = cursor {
                        let cell = self.cells.get(h).unwrap();
                        if cell.hash == hash && cell.domain.equal(domain) {
                            return Some((cell.range.clone(), cell.is_multi_val));
                        }
                        if cell.hash > hash {
                            return None;
                        }
                        cursor = cell.next;
                    }
                    return None;
                }
            }
        }
    }

    /// `m{domain} := range`: insert a pair, promoting to multi-valued if the
    /// domain element is already bound (spec §3.3.2, scenario §8.3.3).
    pub fn insert(&mut self, domain: Specifier, range: Specifier) {
        let hash = domain.hash_code();
        let height = self.height();
        let (is_new_cell, pair_hash) = self.insert_at(self.root, hash, domain, range, height, 0);
        let header = self.headers.get_mut(self.root).unwrap();
        header.hash ^= pair_hash;
        if let Kind::Root {
            cardinality,
            cell_count,
            ..
        } = &mut header.kind
        {
            *cardinality += 1;
            if is_new_cell {
                *cell_count += 1;
            }
        }
        let cell_count = self.cell_count();
        if cell_count > (HASH_SIZE.pow(self.height()) * CLASH_SIZE).max(CLASH_SIZE) {
            self.expand();
        }
    }

    /// Returns `(is_new_cell, xor_contribution)`. `xor_contribution` is the
    /// hash of the pair just added (domain hash XOR range hash), folded
    /// into the root hash by the caller.
    fn insert_at(
        &mut self,
        node: Handle<Header>,
        hash: i32,
        domain: Specifier,
        range: Specifier,
        height: u32,
        depth: u32,
    ) -> (bool, i32) {
        let idx = child_index(hash, height.saturating_sub(depth + 1));
        let header = self.headers.get(node).unwrap();
        match &header.children[idx] {
            Child::Empty => {
                let pair_hash = hash ^ range.hash_code();
                let cell = self.cells.insert(Cell {
                    hash,
                    domain,
                    range,
                    is_multi_val: false,
                    next: None,
                });
                self.headers.get_mut(node).unwrap().children[idx] = Child::Clash(cell);
                (true, pair_hash)
            }
            Child::Node(child) => {
                let child = *child;
                self.insert_at(child, hash, domain, range, height, depth + 1)
            }
            Child::Clash(first) => {
                let first = *first;
                let mut prev: Option<Handle<Cell>> = None;
                let mut cursor = Some(first);
                while let Some(h) = cursor {
                    let cell = self.cells.get(h).unwrap();
                    if cell.hash == hash && cell.domain.equal(&domain) {
                        return self.promote_to_multi(h, range);
                    }
                    if cell.hash > hash {
                        break;
                    }
                    prev = cursor;
                    cursor = cell.next;
                }
                let pair_hash = hash ^ range.hash_code();
                let new_cell = self.cells.insert(Cell {
                    hash,
                    domain,
                    range,
                    is_multi_val: false,
                    next: cursor,
                });
                match prev {
                    Some(p) => self.cells.get_mut(p).unwrap().next = Some(new_cell),
                    None => {
                        self.headers.get_mut(node).unwrap().children[idx] = Child::Clash(new_cell)
                    }
                }
                (true, pair_hash)
            }
        }
    }

    fn promote_to_multi(&mut self, cell_handle: Handle<Cell>, range: Specifier) -> (bool, i32) {
        let cell = self.cells.get_mut(cell_handle).unwrap();
        if cell.is_multi_val {
            let value_set = match &cell.range {
                Specifier::Set(s) => s.clone(),
                _ => unreachable!("multi-valued cell must hold a Set"),
            };
            let added = value_set.borrow_mut().insert(range.clone());
            return (false, if added { range.hash_code() } else { 0 });
        }
        let value_set = SetRoot::new();
        let old_range = cell.range.clone();
        {
            let mut s = value_set.borrow_mut();
            s.insert(old_range);
            s.insert(range.clone());
        }
        cell.range = Specifier::Set(value_set);
        cell.is_multi_val = true;
        (false, range.hash_code())
    }

    fn expand(&mut self) {
        let old_height = self.height();
        if let Kind::Root { height, .. } = &mut self.headers.get_mut(self.root).unwrap().kind {
            *height += 1;
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

    /// `m lessf domain`: drop a domain entry. A cell that becomes a
    /// zero-cell structure is retracted by contraction, triggered
    /// separately by the caller re-checking `cell_count` (spec §3.3.2).
    pub fn remove(&mut self, domain: &Specifier) -> Result<(), ContainerError> {
        let hash = domain.hash_code();
        let height = self.height();
        let removed = self.remove_at(self.root, hash, domain, height, 0);
        match removed {
            Some((pair_hash, _was_multi)) => {
                let header = self.headers.get_mut(self.root).unwrap();
                header.hash ^= pair_hash;
                if let Kind::Root {
                    cardinality,
                    cell_count,
                    ..
                } = &mut header.kind
                {
                    *cell_count -= 1;
                    *cardinality = cardinality.saturating_sub(1);
                }
                let (cell_count, height) = (self.cell_count(), self.height());
                if height > 0 && cell_count < HASH_SIZE.pow(height - 1) {
                    self.contract();
                }
                Ok(())
            }
            None => Err(ContainerError::NotFound),
        }
    }

    fn remove_at(
        &mut self,
        node: Handle<Header>,
        hash: i32,
        domain: &Specifier,
        height: u32,
        depth: u32,
    ) -> Option<(i32, bool)> {
        let idx = child_index(hash, height.saturating_sub(depth + 1));
        let header = self.headers.get(node).unwrap();
        match &header.children[idx] {
            Child::Empty => None,
            Child::Node(child) => {
                let child = *child;
                self.remove_at(child, hash, domain, height, depth + 1)
            }
            Child::Clash(first) => {
                let first = *first;
                let mut prev: Option<Handle<Cell>> = None;
                let mut cursor = Some(first);
                while let Some(h) = cursor {
                    let cell = self.cells.get(h).unwrap();
                    if cell.hash == hash && cell.domain.equal(domain) {
                        let next = cell.next;
                        let pair_hash = cell.hash ^ cell.range.hash_code();
                        let was_multi = cell.is_multi_val;
                        self.cells.remove(h);
                        match prev {
                            Some(p) => self.cells.get_mut(p).unwrap().next = next,
                            None => {
                                self.headers.get_mut(node).unwrap().children[idx] = match next {
                                    Some(n) => Child::Clash(n),
                                    None => Child::Empty,
                                }
                            }
                        }
                        return Some((pair_hash, was_multi));
                    }
                    if cell.hash > hash {
                        return None;
                    }
                    prev = cursor;
                    cursor = cell.next;
                }
                None
            }
        }
    }

    /// Merge the four leaves of every parent at the bottom layer into one
    /// clash list (spec §4.2 "Contraction"), decrementing `height`.
    fn contract(&mut self) {
        let height = self.height();
        if height == 0 {
            return;
        }
        self.contract_subtree(self.root, height, 0);
        if let Kind::Root { height, .. } = &mut self.headers.get_mut(self.root).unwrap().kind {
            *height -= 1;
        }
    }

    fn contract_subtree(&mut self, node: Handle<Header>, height: u32, depth: u32) {
        for idx in 0..HASH_SIZE as usize {
            let child = match &self.headers.get(node).unwrap().children[idx] {
                Child::Node(h) => Some(*h),
                _ => None,
            };
            let Some(child) = child else { continue };
            if depth + 1 == height {
                // `child`'s own children are all leaves (clash lists);
                // 4-way merge them into a single sorted clash list that
                // replaces `child` at this slot.
                let merged = self.merge_leaves(child);
                self.headers.remove(child);
                self.headers.get_mut(node).unwrap().children[idx] = match merged {
                    Some(h) => Child::Clash(h),
                    None => Child::Empty,
                };
            } else {
                self.contract_subtree(child, height, depth + 1);
            }
        }
    }

    fn merge_leaves(&mut self, node: Handle<Header>) -> Option<Handle<Cell>> {
        let mut lists: Vec<Option<Handle<Cell>>> = Vec::with_capacity(HASH_SIZE as usize);
        for idx in 0..HASH_SIZE as usize {
            match &self.headers.get(node).unwrap().children[idx] {
                Child::Clash(h) => lists.push(Some(*h)),
                _ => lists.push(None),
            }
        }
        let mut merged: Option<Handle<Cell>> = None;
        for list in lists {
            merged = self.merge_two(merged, list);
        }
        merged
    }

    fn merge_two(
        &mut self,
        a: Option<Handle<Cell>>,
        b: Option<Handle<Cell>>,
    ) -> Option<Handle<Cell>> {
        match (a, b) {
            (None, x) | (x, None) => x,
            (Some(ah), Some(bh)) => {
                let a_hash = self.cells.get(ah).unwrap().hash;
                let b_hash = self.cells.get(bh).unwrap().hash;
                if a_hash <= b_hash {
                    let a_next = self.cells.get(ah).unwrap().next;
                    let rest = self.merge_two(a_next, Some(bh));
                    self.cells.get_mut(ah).unwrap().next = rest;
                    Some(ah)
                } else {
                    let b_next = self.cells.get(bh).unwrap().next;
                    let rest = self.merge_two(Some(ah), b_next);
                    self.cells.get_mut(bh).unwrap().next = rest;
                    Some(bh)
                }
            }
        }
    }

    /// Every `(domain, range)` pair, expanding multi-valued cells into one
    /// pair per range element (used by `map_to_set`).
    pub fn pairs(&self) -> Vec<(Specifier, Specifier)> {
        let mut out = Vec::new();
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
                            if cell.is_multi_val {
                                if let Specifier::Set(s) = &cell.range {
                                    for v in s.borrow().iter() {
                                        out.push((cell.domain.clone(), v));
                                    }
                                }
                            } else {
                                out.push((cell.domain.clone(), cell.range.clone()));
                            }
                            cursor = cell.next;
                        }
                    }
                }
            }
        }
        out
    }

    pub fn clone_deep(&self) -> MapHandle {
        let copy = MapRoot::new();
        {
            let mut copy_ref = copy.borrow_mut();
            for (d, r) in self.pairs() {
                copy_ref.insert(d, r);
            }
        }
        copy
    }
}

pub fn cow(handle: &MapHandle) -> MapHandle {
    if Rc::strong_count(handle) > 1 {
        handle.borrow().clone_deep()
    } else {
        handle.clone()
    }
}

/// Convert a set of 1- or 2-tuples into a map (spec §4.2 "Set-to-map
/// conversion"; the length-1 Open Question is resolved per §9:
/// `domain_omega_allowed` accepts length-1 tuples with an implicit `Omega`
/// range, otherwise they are rejected).
pub fn set_to_map(elements: &[Specifier], domain_omega_allowed: bool) -> Result<MapHandle, ContainerError> {
    let map = MapRoot::new();
    {
        let mut m = map.borrow_mut();
        for element in elements {
            let Specifier::Tuple(t) = element else {
                return Err(ContainerError::ExpectedPair { len: usize::MAX });
            };
            let components = t.borrow().components();
            match components.len() {
                1 if domain_omega_allowed => {
                    m.insert(components[0].clone(), Specifier::Omega);
                }
                2 => {
                    m.insert(components[0].clone(), components[1].clone());
                }
                n => return Err(ContainerError::ExpectedPair { len: n }),
            }
        }
    }
    Ok(map)
}

/// Convert a map into a set of 2-tuples (spec §4.2 "Map-to-set
/// conversion").
pub fn map_to_set(map: &MapRoot) -> SetHandle {
    let set = SetRoot::new();
    {
        let mut s = set.borrow_mut();
        for (domain, range) in map.pairs() {
            s.insert(Specifier::Tuple(super::tuple::TupleRoot::from_vec(vec![
                domain, range,
            ])));
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_valued_insert_promotes_to_set() {
        let map = MapRoot::new();
        {
            let mut m = map.borrow_mut();
            m.insert(Specifier::Short(1), Specifier::Short(2));
            m.insert(Specifier::Short(1), Specifier::Short(3));
        }
        let m = map.borrow();
        assert_eq!(m.cell_count(), 1);
        assert_eq!(m.cardinality(), 2);
        let (range, is_multi) = m.get(&Specifier::Short(1)).unwrap();
        assert!(is_multi);
        match range {
            Specifier::Set(s) => assert_eq!(s.borrow().cardinality(), 2),
            _ => panic!("expected a value-set"),
        }
    }

    #[test]
    fn remove_then_contract() {
        let map = MapRoot::new();
        {
            let mut m = map.borrow_mut();
            for i in 0..20 {
                m.insert(Specifier::Short(i), Specifier::Short(i));
            }
        }
        assert!(map.borrow().height() >= 1);
        {
            let mut m = map.borrow_mut();
            for i in 0..18 {
                m.remove(&Specifier::Short(i)).unwrap();
            }
        }
        let m = map.borrow();
        assert_eq!(m.cell_count(), 2);
        assert!(m.get(&Specifier::Short(18)).is_some());
        assert!(m.get(&Specifier::Short(19)).is_some());
    }

    #[test]
    fn set_to_map_round_trips_via_map_to_set() {
        let pairs = vec![
            Specifier::Tuple(super::super::tuple::TupleRoot::from_vec(vec![
                Specifier::Short(1),
                Specifier::Short(10),
            ])),
            Specifier::Tuple(super::super::tuple::TupleRoot::from_vec(vec![
                Specifier::Short(2),
                Specifier::Short(20),
            ])),
        ];
        let map = set_to_map(&pairs, false).unwrap();
        let back = map_to_set(&map.borrow());
        assert_eq!(back.borrow().cardinality(), 2);
    }

    #[test]
    fn set_to_map_rejects_bad_arity_without_flag() {
        let bad = vec![Specifier::Tuple(super::super::tuple::TupleRoot::from_vec(
            vec![Specifier::Short(1)],
        ))];
        assert!(set_to_map(&bad, false).is_err());
        assert!(set_to_map(&bad, true).is_ok());
    }
}

//! Persistent tuple values (spec §3.3.3).
//!
//! Unlike sets and maps, tuples are positional and don't need a hashed
//! trie: they're a flat, reference-counted, copy-on-write vector. The one
//! subtlety carried over from the original (`tuples.c`) is trailing-`Omega`
//! trimming: `tup(n) := x` past the current end pads with `Omega`, and
//! assigning `Omega` onto the last slot shrinks the tuple back down rather
//! than leaving a dangling `Omega` tail.

use crate::specifier::Specifier;
use std::rc::Rc;

pub struct TupleRoot {
    elements: Vec<Specifier>,
}

pub type TupleHandle = Rc<std::cell::RefCell<TupleRoot>>;

impl TupleRoot {
    pub fn new() -> TupleHandle {
        Rc::new(std::cell::RefCell::new(TupleRoot {
            elements: Vec::new(),
        }))
    }

    pub fn from_vec(mut elements: Vec<Specifier>) -> TupleHandle {
        trim_trailing_omega(&mut elements);
        Rc::new(std::cell::RefCell::new(TupleRoot { elements }))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn components(&self) -> &[Specifier] {
        &self.elements
    }

    /// `tup(n)`, 1-based per SETL2 convention; out-of-range reads are
    /// `Omega` rather than an error (spec §3.3.3 edge case).
    pub fn get(&self, n: usize) -> Specifier {
        if n == 0 {
            return Specifier::Omega;
        }
        self.elements.get(n - 1).cloned().unwrap_or(Specifier::Omega)
    }

    /// `tup(n) := value`, 1-based. Extends with `Omega` as needed; setting
    /// the trailing slot(s) to `Omega` trims them back off instead of
    /// leaving a dangling tail.
    pub fn set(&mut self, n: usize, value: Specifier) {
        assert!(n >= 1, "tuple positions are 1-based");
        let idx = n - 1;
        if idx >= self.elements.len() {
            if matches!(value, Specifier::Omega) {
                return;
            }
            self.elements.resize(idx + 1, Specifier::Omega);
        }
        self.elements[idx] = value;
        trim_trailing_omega(&mut self.elements);
    }

    pub fn hash_code(&self) -> i32 {
        // Positional, so order matters: fold left with rotation rather than
        // the order-independent XOR sets and maps use (spec §4.1).
        let mut h: u32 = 0;
        for e in &self.elements {
            h = h.rotate_left(5) ^ (e.hash_code() as u32);
        }
        h as i32
    }

    pub fn equal(&self, other: &TupleRoot) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|(a, b)| a.equal(b))
    }

    pub fn clone_deep(&self) -> TupleHandle {
        TupleRoot::from_vec(self.elements.clone())
    }
}

fn trim_trailing_omega(elements: &mut Vec<Specifier>) {
    while matches!(elements.last(), Some(Specifier::Omega)) {
        elements.pop();
    }
}

/// Copy-on-write accessor, same contract as [`super::set::cow`] /
/// [`super::map::cow`].
pub fn cow(handle: &TupleHandle) -> TupleHandle {
    if Rc::strong_count(handle) > 1 {
        handle.borrow().clone_deep()
    } else {
        handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_out_of_range_is_omega() {
        let t = TupleRoot::from_vec(vec![Specifier::Short(1), Specifier::Short(2)]);
        assert!(matches!(t.borrow().get(5), Specifier::Omega));
    }

    #[test]
    fn set_past_end_pads_with_omega() {
        let t = TupleRoot::new();
        t.borrow_mut().set(3, Specifier::Short(7));
        let r = t.borrow();
        assert_eq!(r.len(), 3);
        assert!(matches!(r.get(1), Specifier::Omega));
        assert!(matches!(r.get(2), Specifier::Omega));
        match r.get(3) {
            Specifier::Short(7) => {}
            _ => panic!("expected Short(7)"),
        }
    }

    #[test]
    fn trailing_omega_assignment_trims_tail() {
        let t = TupleRoot::from_vec(vec![Specifier::Short(1), Specifier::Short(2), Specifier::Short(3)]);
        t.borrow_mut().set(3, Specifier::Omega);
        assert_eq!(t.borrow().len(), 2);
        t.borrow_mut().set(2, Specifier::Omega);
        assert_eq!(t.borrow().len(), 0);
    }

    #[test]
    fn equal_tuples_hash_equal() {
        let a = TupleRoot::from_vec(vec![Specifier::Short(1), Specifier::Short(2)]);
        let b = TupleRoot::from_vec(vec![Specifier::Short(1), Specifier::Short(2)]);
        assert!(a.borrow().equal(&b.borrow()));
        assert_eq!(a.borrow().hash_code(), b.borrow().hash_code());
    }

    #[test]
    fn order_matters_for_equality() {
        let a = TupleRoot::from_vec(vec![Specifier::Short(1), Specifier::Short(2)]);
        let b = TupleRoot::from_vec(vec![Specifier::Short(2), Specifier::Short(1)]);
        assert!(!a.borrow().equal(&b.borrow()));
    }
}

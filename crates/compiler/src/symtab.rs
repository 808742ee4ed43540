//! Symbol table and procedure (unit) tree (spec §3.2, §4.4).
//!
//! A symbol belongs to exactly one procedure and, while visible, sits on
//! its name's binding stack (newest declaration shadows older ones within
//! nested scopes). Closing a scope calls [`SymbolTable::detach`], which
//! pulls every symbol the scope owns off its name's stack in one pass —
//! the symbols stay reachable through their owning procedure's thread
//! until the whole compilation unit is torn down.

use crate::namtab::NameId;
use setl2_core::arena::{Arena, Handle};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Id,
    Label,
    Selector,
    Procedure,
    Method,
    Slot,
    Package,
    Class,
    Process,
    Program,
    Use,
    Inherit,
    Integer,
    Real,
    String,
}

/// Bit flags from spec §3.2. Kept as individually named `bool`s rather
/// than a bitset: the checker reads/writes a handful of these per node
/// visited, and a `bool` field reads better at each call site than a
/// `flags.contains(Flag::X)` lookup for state this is mutated this often.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolFlags {
    pub lvalue: bool,
    pub rvalue: bool,
    pub read_param: bool,
    pub write_param: bool,
    pub temp: bool,
    pub needs_stored: bool,
    pub is_alloced: bool,
    pub initialized: bool,
    pub hidden: bool,
    pub declared: bool,
    pub public: bool,
    pub in_spec: bool,
    pub visible_slot: bool,
    pub global: bool,
}

pub struct Symbol {
    pub owning_procedure: Handle<Procedure>,
    pub name: NameId,
    pub kind: SymbolKind,
    pub unit_number: u32,
    /// Label number before optimization, byte offset after (§3.2).
    pub offset: u32,
    pub slot_number: u32,
    pub file_pos: (u32, u32),
    pub flags: SymbolFlags,
    /// Set when a procedure literal has been assigned to this symbol
    /// (`kind` is then `SymbolKind::Procedure`); lets a later `of`/`ofa`
    /// through this name reach the callee's `num_formals`.
    pub bound_procedure: Option<Handle<Procedure>>,
    /// Next symbol sharing this name's binding stack, further down
    /// (shadowed). `None` once this is the last visible binding.
    next_in_name: Option<Handle<Symbol>>,
    /// Thread through every symbol the owning procedure declared, in
    /// declaration order (spec §4.4's procedure "symbol list").
    next_in_procedure: Option<Handle<Symbol>>,
}

pub struct Procedure {
    pub parent: Option<Handle<Procedure>>,
    pub first_child: Option<Handle<Procedure>>,
    pub next_sibling: Option<Handle<Procedure>>,
    pub tail_child: Option<Handle<Procedure>>,
    symbol_head: Option<Handle<Symbol>>,
    symbol_tail: Option<Handle<Symbol>>,
    pub num_labels: u32,
    pub num_formals: u32,
    pub init_quad_count: u32,
    pub slot_quad_count: u32,
    pub body_quad_count: u32,
}

impl Procedure {
    fn new(parent: Option<Handle<Procedure>>) -> Self {
        Procedure {
            parent,
            first_child: None,
            next_sibling: None,
            tail_child: None,
            symbol_head: None,
            symbol_tail: None,
            num_labels: 0,
            num_formals: 0,
            init_quad_count: 0,
            slot_quad_count: 0,
            body_quad_count: 0,
        }
    }
}

pub struct SymbolTable {
    symbols: Arena<Symbol>,
    procedures: Arena<Procedure>,
    /// Head of each name's visibility stack (most recent declaration
    /// first), the Rust analogue of `nt_symtab_ptr`.
    visible: HashMap<NameId, Handle<Symbol>>,
}

impl SymbolTable {
    pub fn new() -> (SymbolTable, Handle<Procedure>) {
        let mut procedures = Arena::new();
        let root = procedures.insert(Procedure::new(None));
        (
            SymbolTable {
                symbols: Arena::new(),
                procedures,
                visible: HashMap::new(),
            },
            root,
        )
    }

    pub fn new_procedure(&mut self, parent: Handle<Procedure>) -> Handle<Procedure> {
        let child = self.procedures.insert(Procedure::new(Some(parent)));
        let p = self.procedures.get_mut(parent).unwrap();
        match p.tail_child {
            Some(tail) => self.procedures.get_mut(tail).unwrap().next_sibling = Some(child),
            None => p.first_child = Some(child),
        }
        self.procedures.get_mut(parent).unwrap().tail_child = Some(child);
        child
    }

    pub fn procedure(&self, handle: Handle<Procedure>) -> &Procedure {
        self.procedures.get(handle).unwrap()
    }

    pub fn procedure_mut(&mut self, handle: Handle<Procedure>) -> &mut Procedure {
        self.procedures.get_mut(handle).unwrap()
    }

    pub fn symbol(&self, handle: Handle<Symbol>) -> &Symbol {
        self.symbols.get(handle).unwrap()
    }

    pub fn symbol_mut(&mut self, handle: Handle<Symbol>) -> &mut Symbol {
        self.symbols.get_mut(handle).unwrap()
    }

    fn is_already_declared(&self, name: NameId, procedure: Handle<Procedure>) -> bool {
        let mut cursor = self.visible.get(&name).copied();
        while let Some(h) = cursor {
            let sym = self.symbols.get(h).unwrap();
            if sym.owning_procedure == procedure {
                return true;
            }
            cursor = sym.next_in_name;
        }
        false
    }

    /// `declare(name, procedure, file_pos) -> symbol` (spec §4.4). Returns
    /// `None` (and the caller is expected to raise `msg_dup_declaration`)
    /// if `name` is already bound within `procedure`.
    pub fn declare(
        &mut self,
        name: NameId,
        procedure: Handle<Procedure>,
        kind: SymbolKind,
        file_pos: (u32, u32),
    ) -> Option<Handle<Symbol>> {
        if self.is_already_declared(name, procedure) {
            return None;
        }
        let handle = self.symbols.insert(Symbol {
            owning_procedure: procedure,
            name,
            kind,
            unit_number: 0,
            offset: 0,
            slot_number: 0,
            file_pos,
            flags: SymbolFlags::default(),
            bound_procedure: None,
            next_in_name: self.visible.get(&name).copied(),
            next_in_procedure: None,
        });
        self.visible.insert(name, handle);

        let p = self.procedures.get_mut(procedure).unwrap();
        match p.symbol_tail {
            Some(tail) => self.symbols.get_mut(tail).unwrap().next_in_procedure = Some(handle),
            None => p.symbol_head = Some(handle),
        }
        self.procedures.get_mut(procedure).unwrap().symbol_tail = Some(handle);
        Some(handle)
    }

    /// `lookup_visible(name) -> symbol` (spec §4.4): walks the name's
    /// attached list, skipping entries flagged `hidden`.
    pub fn lookup_visible(&self, name: NameId) -> Option<Handle<Symbol>> {
        let mut cursor = self.visible.get(&name).copied();
        while let Some(h) = cursor {
            let sym = self.symbols.get(h).unwrap();
            if !sym.flags.hidden {
                return Some(h);
            }
            cursor = sym.next_in_name;
        }
        None
    }

    /// `detach(symbol_list_head)` (spec §4.4): remove every symbol owned
    /// by `procedure` from its name's visibility list. The symbols remain
    /// reachable via the procedure's own thread.
    pub fn detach_procedure(&mut self, procedure: Handle<Procedure>) {
        let mut cursor = self.procedures.get(procedure).unwrap().symbol_head;
        while let Some(h) = cursor {
            let (name, next_in_procedure) = {
                let sym = self.symbols.get(h).unwrap();
                (sym.name, sym.next_in_procedure)
            };
            self.remove_from_name_list(name, h);
            cursor = next_in_procedure;
        }
    }

    fn remove_from_name_list(&mut self, name: NameId, target: Handle<Symbol>) {
        let head = match self.visible.get(&name).copied() {
            Some(h) => h,
            None => return,
        };
        if head == target {
            let next = self.symbols.get(target).unwrap().next_in_name;
            match next {
                Some(n) => {
                    self.visible.insert(name, n);
                }
                None => {
                    self.visible.remove(&name);
                }
            }
            return;
        }
        let mut prev = head;
        let mut cursor = self.symbols.get(prev).unwrap().next_in_name;
        while let Some(h) = cursor {
            if h == target {
                let next = self.symbols.get(h).unwrap().next_in_name;
                self.symbols.get_mut(prev).unwrap().next_in_name = next;
                return;
            }
            prev = h;
            cursor = self.symbols.get(h).unwrap().next_in_name;
        }
    }

    /// Every symbol `procedure` declared, in declaration order.
    pub fn procedure_symbols(&self, procedure: Handle<Procedure>) -> Vec<Handle<Symbol>> {
        let mut out = Vec::new();
        let mut cursor = self.procedures.get(procedure).unwrap().symbol_head;
        while let Some(h) = cursor {
            out.push(h);
            cursor = self.symbols.get(h).unwrap().next_in_procedure;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namtab::NameTable;

    #[test]
    fn declare_rejects_duplicate_within_same_procedure() {
        let (mut names, _) = NameTable::new();
        let (mut symtab, root) = SymbolTable::new();
        let x = names.intern("x");
        assert!(symtab.declare(x, root, SymbolKind::Id, (1, 1)).is_some());
        assert!(symtab.declare(x, root, SymbolKind::Id, (2, 1)).is_none());
    }

    #[test]
    fn inner_scope_shadows_outer_until_detached() {
        let (mut names, _) = NameTable::new();
        let (mut symtab, root) = SymbolTable::new();
        let x = names.intern("x");
        let outer = symtab.declare(x, root, SymbolKind::Id, (1, 1)).unwrap();
        let inner_proc = symtab.new_procedure(root);
        let inner = symtab.declare(x, inner_proc, SymbolKind::Id, (2, 1)).unwrap();
        assert_eq!(symtab.lookup_visible(x), Some(inner));
        symtab.detach_procedure(inner_proc);
        assert_eq!(symtab.lookup_visible(x), Some(outer));
    }

    #[test]
    fn hidden_symbols_are_skipped_by_lookup() {
        let (mut names, _) = NameTable::new();
        let (mut symtab, root) = SymbolTable::new();
        let x = names.intern("x");
        let sym = symtab.declare(x, root, SymbolKind::Id, (1, 1)).unwrap();
        symtab.symbol_mut(sym).flags.hidden = true;
        assert_eq!(symtab.lookup_visible(x), None);
    }

    #[test]
    fn procedure_tree_links_children_in_order() {
        let (_names, _) = NameTable::new();
        let (mut symtab, root) = SymbolTable::new();
        let a = symtab.new_procedure(root);
        let b = symtab.new_procedure(root);
        assert_eq!(symtab.procedure(root).first_child, Some(a));
        assert_eq!(symtab.procedure(a).next_sibling, Some(b));
    }
}

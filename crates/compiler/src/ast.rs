//! AST node pool and DFS-postorder serialization (spec §3.4, §4.5, §6.2).
//!
//! Nodes are arena-allocated (`setl2-core::Arena`, §9: "arena indices
//! rather than owning pointers") instead of the original's hand-rolled
//! block-pool free list; freeing a whole compilation unit's tree is just
//! dropping the arena.
//!
//! A node's `next` field chains it to its following sibling the same way
//! the original links a statement list or argument list. The
//! intermediate-file record contract of §6.2 treats that chain as part of
//! the same attachment graph as `child`: serializing a subtree walks
//! `child` *and* `next` before emitting a node's own record, and a
//! sibling's `parent_index` names whatever node it attaches onto — the
//! true tree parent for a first child (`which_child = ChildChild`), or
//! the preceding sibling for every later one (`which_child = NextChild`).
//! That's what lets the reader rebuild the tree with a single stack: pop
//! every waiting record whose `parent_index` matches the record just
//! read, and attach it via `which_child`.

use crate::namtab::NameId;
use crate::symtab::Symbol;
use setl2_core::arena::{Arena, Handle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstKind {
    List,
    Name,
    Symtab,
    Dot,
    IntLit,
    RealLit,
    StringLit,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Neg,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    In,
    NotIn,
    Union,
    Intersect,
    SetDiff,
    With,
    Less,
    Assign,
    AssignOp,
    Of,
    Ofa,
    Slice,
    End,
    From,
    Fromb,
    Frome,
    Forall,
    Exists,
    SetFormer,
    TupleFormer,
    If,
    While,
    Until,
    Loop,
    For,
    Case,
    Return,
    Exit,
    Continue,
    Stop,
    Quit,
    Assert,
    Slot,
    SlotOf,
    SlotCall,
    InitObj,
    Menviron,
    Penviron,
    SelfExpr,
    Call,
    EnumTup,
    ProcLit,
    /// `label: stmt` (§4.9's optimizer operates on the label/goto pairs
    /// this and `Goto` produce).
    LabelDef,
    Goto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhichChild {
    /// The node this record attaches to via the target's `child` field.
    ChildChild,
    /// The node this record attaches to via the target's `next` field.
    NextChild,
}

pub struct AstNode {
    pub kind: AstKind,
    /// Meaning depends on `kind`: the operand list head for most
    /// operators, the bound-variable list for quantifiers, etc.
    pub child: Option<Handle<AstNode>>,
    pub next: Option<Handle<AstNode>>,
    pub file_pos: (u32, u32),
    /// An overloaded operator's method name, used by the checker to
    /// rewrite e.g. unary `-` into a method call when the operand's type
    /// defines one (§3.4 "extension").
    pub extension: Option<NameId>,
    /// Set once the checker resolves this node to a concrete symbol
    /// (`name` rewritten to `symtab`, spec §4.8).
    pub symbol: Option<Handle<Symbol>>,
}

pub struct AstPool {
    nodes: Arena<AstNode>,
}

impl AstPool {
    pub fn new() -> Self {
        AstPool { nodes: Arena::new() }
    }

    pub fn alloc(&mut self, kind: AstKind, file_pos: (u32, u32)) -> Handle<AstNode> {
        self.nodes.insert(AstNode {
            kind,
            child: None,
            next: None,
            file_pos,
            extension: None,
            symbol: None,
        })
    }

    pub fn get(&self, handle: Handle<AstNode>) -> &AstNode {
        self.nodes.get(handle).unwrap()
    }

    pub fn get_mut(&mut self, handle: Handle<AstNode>) -> &mut AstNode {
        self.nodes.get_mut(handle).unwrap()
    }

    pub fn set_child(&mut self, parent: Handle<AstNode>, child: Handle<AstNode>) {
        self.get_mut(parent).child = Some(child);
    }

    pub fn append_sibling(&mut self, node: Handle<AstNode>, sibling: Handle<AstNode>) {
        self.get_mut(node).next = Some(sibling);
    }

    /// Iterate `node`'s sibling chain without recursion, by reversing the
    /// chain and walking it back (spec §4.5: "reverses `next` chains to
    /// walk a sibling list non-recursively, then re-reverses on the way
    /// back").
    pub fn siblings(&self, mut node: Option<Handle<AstNode>>) -> Vec<Handle<AstNode>> {
        let mut reversed = Vec::new();
        while let Some(h) = node {
            reversed.push(h);
            node = self.get(h).next;
        }
        reversed
    }
}

impl Default for AstPool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstRecord {
    pub kind: AstKind,
    pub file_pos: (u32, u32),
    pub extension: Option<NameId>,
    pub self_index: u32,
    pub parent_index: u32,
    pub which_child: WhichChild,
}

/// Serialize the subtree rooted at `root` to the DFS-postorder record
/// stream of §6.2.
pub fn serialize(pool: &AstPool, root: Handle<AstNode>) -> Vec<AstRecord> {
    let mut indices = std::collections::HashMap::new();
    let mut counter = 0u32;
    assign_indices(pool, root, &mut indices, &mut counter);

    let mut records = Vec::with_capacity(indices.len());
    emit_postorder(pool, root, 0, WhichChild::ChildChild, &indices, &mut records);
    records
}

fn assign_indices(
    pool: &AstPool,
    node: Handle<AstNode>,
    indices: &mut std::collections::HashMap<Handle<AstNode>, u32>,
    counter: &mut u32,
) {
    *counter += 1;
    indices.insert(node, *counter);
    if let Some(child) = pool.get(node).child {
        assign_indices(pool, child, indices, counter);
    }
    if let Some(next) = pool.get(node).next {
        assign_indices(pool, next, indices, counter);
    }
}

fn emit_postorder(
    pool: &AstPool,
    node: Handle<AstNode>,
    parent_index: u32,
    which_child: WhichChild,
    indices: &std::collections::HashMap<Handle<AstNode>, u32>,
    out: &mut Vec<AstRecord>,
) {
    let self_index = indices[&node];
    if let Some(child) = pool.get(node).child {
        emit_postorder(pool, child, self_index, WhichChild::ChildChild, indices, out);
    }
    if let Some(next) = pool.get(node).next {
        emit_postorder(pool, next, self_index, WhichChild::NextChild, indices, out);
    }
    let n = pool.get(node);
    out.push(AstRecord {
        kind: n.kind,
        file_pos: n.file_pos,
        extension: n.extension,
        self_index,
        parent_index,
        which_child,
    });
}

/// Rebuild a subtree from its record stream, following the reader
/// contract of §6.2 exactly: pop every waiting record whose
/// `parent_index` matches the one just read, attach it, and stop once
/// the root (`self_index == 1`) has been read.
pub fn deserialize(pool: &mut AstPool, records: &[AstRecord]) -> Handle<AstNode> {
    let mut waiting: Vec<(AstRecord, Handle<AstNode>)> = Vec::new();
    let mut built: std::collections::HashMap<u32, Handle<AstNode>> = std::collections::HashMap::new();
    let mut root = None;

    for record in records {
        let handle = pool.alloc(record.kind, record.file_pos);
        pool.get_mut(handle).extension = record.extension;
        built.insert(record.self_index, handle);

        let mut still_waiting = Vec::new();
        for (waiting_record, waiting_handle) in waiting.drain(..) {
            if waiting_record.parent_index == record.self_index {
                match waiting_record.which_child {
                    WhichChild::ChildChild => pool.get_mut(handle).child = Some(waiting_handle),
                    WhichChild::NextChild => pool.get_mut(handle).next = Some(waiting_handle),
                }
            } else {
                still_waiting.push((waiting_record, waiting_handle));
            }
        }
        waiting = still_waiting;
        waiting.push((*record, handle));

        if record.self_index == 1 {
            root = Some(handle);
            break;
        }
    }

    root.expect("record stream must contain a self_index == 1 root")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_small_tree() {
        let mut pool = AstPool::new();
        let root = pool.alloc(AstKind::List, (1, 1));
        let a = pool.alloc(AstKind::IntLit, (1, 2));
        let b = pool.alloc(AstKind::IntLit, (1, 4));
        let c = pool.alloc(AstKind::IntLit, (1, 6));
        pool.set_child(root, a);
        pool.append_sibling(a, b);
        pool.append_sibling(b, c);

        let records = serialize(&pool, root);
        assert_eq!(records.last().unwrap().self_index, 1);

        let mut pool2 = AstPool::new();
        let root2 = deserialize(&mut pool2, &records);
        assert_eq!(pool2.get(root2).kind, AstKind::List);
        let kids = pool2.siblings(pool2.get(root2).child);
        assert_eq!(kids.len(), 3);
        assert!(kids.iter().all(|h| pool2.get(*h).kind == AstKind::IntLit));
    }

    #[test]
    fn siblings_walks_chain_in_order() {
        let mut pool = AstPool::new();
        let a = pool.alloc(AstKind::IntLit, (1, 1));
        let b = pool.alloc(AstKind::IntLit, (1, 2));
        pool.append_sibling(a, b);
        let list = pool.siblings(Some(a));
        assert_eq!(list, vec![a, b]);
    }
}

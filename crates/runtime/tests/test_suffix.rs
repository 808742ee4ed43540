//! Integration tests for the generalized suffix tree's public API.

use setl2_runtime::suffix::{ChildPolicy, SuffixTree};

#[test]
fn mississippi_has_the_expected_suffix_link_chain() {
    let mut tree = SuffixTree::new_tree(128, ChildPolicy::SortedList).unwrap();
    tree.add_string(b"mississippi", 0).unwrap();

    let issi = tree.walk(tree.root(), b"issi");
    assert_eq!(issi.1, 4, "the whole pattern should be consumable");

    let hits = tree.match_(b"issi");
    assert_eq!(hits.len(), 2);
    let mut positions: Vec<u32> = hits.iter().map(|o| o.pos).collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![1, 4]);
}

#[test]
fn generalized_tree_distinguishes_occurrences_by_string_id() {
    let mut tree = SuffixTree::new_tree(128, ChildPolicy::ListThenArray).unwrap();
    tree.add_string(b"banana", 0).unwrap();
    tree.add_string(b"ananas", 1).unwrap();

    let hits = tree.match_(b"ana");
    let ids: std::collections::HashSet<u32> = hits.iter().map(|o| o.string_id).collect();
    assert!(ids.contains(&0));
    assert!(ids.contains(&1));
}

#[test]
fn num_leaves_matches_total_suffix_count_at_root() {
    let mut tree = SuffixTree::new_tree(128, ChildPolicy::CompleteArray).unwrap();
    tree.add_string(b"abab", 0).unwrap();
    // Every one of the 4 suffixes of "abab" is represented somewhere under
    // the root, regardless of how many of them collapse onto shared edges.
    assert_eq!(tree.num_leaves(tree.root()), 4);
}

#[test]
fn child_policy_does_not_change_match_results() {
    let patterns: [&[u8]; 3] = [b"an", b"na", b"banana"];
    for policy in [
        ChildPolicy::LinkedList,
        ChildPolicy::SortedList,
        ChildPolicy::ListThenArray,
        ChildPolicy::CompleteArray,
    ] {
        let mut tree = SuffixTree::new_tree(128, policy).unwrap();
        tree.add_string(b"banana", 0).unwrap();
        for pattern in patterns {
            let mut hits = tree.match_(pattern);
            hits.sort_unstable_by_key(|o| (o.string_id, o.pos));
            let mut naive: Vec<u32> = (0..=6usize.saturating_sub(pattern.len()))
                .filter(|&i| b"banana"[i..i + pattern.len()] == *pattern)
                .map(|i| i as u32)
                .collect();
            naive.sort_unstable();
            let got: Vec<u32> = hits.iter().map(|o| o.pos).collect();
            assert_eq!(got, naive, "policy {policy:?} mismatched on {pattern:?}");
        }
    }
}

//! Shared constants and addressing for the hashed-tree containers.
//!
//! Sets, maps and (conceptually) tuples all share the header/cell trie shape
//! described in spec §3.3: internal headers select a child with successive
//! groups of `SHIFT_DIST` hash bits, and a leaf's overflow is a clash list
//! sorted by hash. The constants below are confirmed against the original
//! implementation's `sets.h`/`maps.h` (`SET_HASH_SIZE`/`MAP_HASH_SIZE` = 4,
//! `*_SHIFT_DIST` = 2, `*_CLASH_SIZE` = 3).

pub mod map;
pub mod set;
pub mod tuple;

pub const HASH_SIZE: u32 = 4;
pub const SHIFT_DIST: u32 = 2;
pub const CLASH_SIZE: u32 = 3;
pub const HASH_MASK: u32 = 0x03;

/// Pick the child index a header at `depth` (0 = root) routes `hash` to.
///
/// Depth counts down from the root; once `depth * SHIFT_DIST` exceeds the
/// width of the hash code every element collapses onto the same digit and
/// the clash list carries the rest — the pathological case of a very deep,
/// highly collided trie, bounded in practice by the expansion trigger.
pub fn child_index(hash: i32, depth: u32) -> usize {
    let shift = depth * SHIFT_DIST;
    let bits = if shift >= 32 { 0 } else { (hash as u32) >> shift };
    (bits & HASH_MASK) as usize
}

/// Smallest tree height whose leaf capacity (`HASH_SIZE^height *
/// CLASH_SIZE`) can hold `cardinality` elements without triggering another
/// expansion — used by the round-trip property in spec §8.1.
pub fn min_height_for(cardinality: u32) -> u32 {
    let mut height = 0u32;
    let mut capacity: u64 = CLASH_SIZE as u64;
    while capacity < cardinality as u64 {
        height += 1;
        capacity = (HASH_SIZE as u64).pow(height) * CLASH_SIZE as u64;
    }
    height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_index_uses_successive_bit_groups() {
        // binary ...000111 -> depth 0 picks bits 0-1 (0b11=3), depth 1 picks
        // bits 2-3 (0b01=1)
        let hash = 0b0111;
        assert_eq!(child_index(hash, 0), 0b11);
        assert_eq!(child_index(hash, 1), 0b01);
    }

    #[test]
    fn min_height_matches_expansion_trigger() {
        assert_eq!(min_height_for(3), 0);
        assert_eq!(min_height_for(4), 1);
        assert_eq!(min_height_for(12), 1);
        assert_eq!(min_height_for(13), 2);
    }
}

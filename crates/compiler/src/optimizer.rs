//! Quadruple-stream optimizer (spec §4.9).
//!
//! Runs after the checker has produced a resolved AST and (eventually) a
//! codegen pass has flattened it to quadruples. Grounded on
//! `original_source/src/optimize.c`'s peephole passes: goto-chain
//! collapsing, dead-quadruple elimination, and final label resolution to
//! linear offsets across the `[init | slot-init | body]` layout §4.9
//! describes. Each pass is a free function over `Vec<Quadruple>` so it can
//! be unit-tested directly against hand-built quadruple streams without
//! needing a full codegen pass to exist yet.

use crate::namtab::NameId;
use crate::quadruple::{Op, Operand, Quadruple};
use std::collections::HashMap;

/// Step 1 (§4.9): any name that ever appears as a quadruple operand or
/// result needs a durable storage slot, as opposed to purely transient
/// checker-time bookkeeping. Collected as a set so codegen can decide
/// which symbols to allocate storage for.
pub fn needs_stored(quads: &[Quadruple]) -> Vec<NameId> {
    let mut seen = Vec::new();
    let mut mark = |operand: Operand, seen: &mut Vec<NameId>| {
        if let Operand::Name(name) = operand {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
    };
    for q in quads {
        mark(q.operand1, &mut seen);
        mark(q.operand2, &mut seen);
        mark(q.result, &mut seen);
    }
    seen
}

/// Step 2 (§4.9): collapse goto chains. If label `A`'s quadruple is
/// immediately followed by an unconditional `goto B`, every jump that
/// targets `A` can target `B` instead. Chains are closed transitively
/// (`A -> B -> C` collapses to `A -> C`) and a cycle (`A -> B -> A`)
/// leaves the chain as-is rather than looping forever.
pub fn collapse_goto_chains(quads: &mut [Quadruple]) {
    let mut redirect: HashMap<NameId, NameId> = HashMap::new();
    for i in 0..quads.len() {
        if let Some(label) = quads[i].label_name() {
            if let Some(next) = quads.get(i + 1) {
                if next.is_unconditional_goto() {
                    if let Operand::LabelRef(target) = next.target {
                        if target != label {
                            redirect.insert(label, target);
                        }
                    }
                }
            }
        }
    }

    for (start, _) in redirect.clone() {
        let mut current = start;
        let mut guard = 0usize;
        while let Some(&next) = redirect.get(&current) {
            if guard > redirect.len() || next == start {
                break;
            }
            current = next;
            guard += 1;
        }
        redirect.insert(start, current);
    }

    for q in quads.iter_mut() {
        if let Operand::LabelRef(target) = q.target {
            if let Some(&resolved) = redirect.get(&target) {
                q.target = Operand::LabelRef(resolved);
            }
        }
    }
}

/// Step 3 (§4.9): delete quadruples that can never execute. A label that
/// no surviving `goto`/`goto-if-false` still targets (because goto-chain
/// collapsing in step 2 already redirected every jump past it) is no
/// longer a valid entry point; any straight-line code between an
/// unconditional jump and the next *referenced* label is unreachable and
/// is dropped. Also folds a jump whose target is the textually-next
/// instruction into a no-op. Label quadruples themselves are left alone
/// here — step 4 ([`resolve_labels`]) strips all of them uniformly once
/// offsets are known.
pub fn delete_dead_quadruples(quads: Vec<Quadruple>) -> Vec<Quadruple> {
    let referenced: std::collections::HashSet<NameId> = quads
        .iter()
        .filter_map(|q| match q.op {
            Op::Goto | Op::GotoIfFalse => match q.target {
                Operand::LabelRef(target) => Some(target),
                _ => None,
            },
            _ => None,
        })
        .collect();

    let mut keep = vec![true; quads.len()];
    let mut reachable = true;

    for i in 0..quads.len() {
        if let Some(label) = quads[i].label_name() {
            if referenced.contains(&label) {
                reachable = true;
            }
            continue;
        }

        if !reachable {
            keep[i] = false;
            continue;
        }

        if matches!(quads[i].op, Op::Goto | Op::GotoIfFalse) {
            if let Operand::LabelRef(target) = quads[i].target {
                let next_is_same_label = quads
                    .get(i + 1)
                    .and_then(|n| n.label_name())
                    .is_some_and(|name| name == target);
                if next_is_same_label {
                    keep[i] = false;
                    continue;
                }
            }
        }

        if quads[i].op == Op::Goto {
            reachable = false;
        }
    }

    quads
        .into_iter()
        .zip(keep)
        .filter_map(|(q, k)| if k { Some(q) } else { None })
        .collect()
}

/// Step 4+5 (§4.9): strip remaining label quadruples and resolve every
/// `LabelRef` to the final linear offset of the quadruple it now points
/// at (the next surviving non-label quadruple after the label). `base`
/// is the starting offset of this stream within the `[init | slot-init |
/// body]` layout, so procedure bodies laid out after the init segment
/// resolve to absolute offsets. Returns the resolved stream and the
/// offset each label name was assigned, so callers can set label-symbol
/// offsets (step 5) without a second pass.
pub fn resolve_labels(quads: Vec<Quadruple>, base: u32) -> (Vec<Quadruple>, HashMap<NameId, u32>) {
    let mut offsets: HashMap<NameId, u32> = HashMap::new();
    let mut resolved = Vec::with_capacity(quads.len());

    // First pass: compute the offset each surviving non-label quadruple
    // will land at, and record it for every label immediately preceding it.
    let mut offset = base;
    let mut pending_labels = Vec::new();
    for q in &quads {
        if let Some(name) = q.label_name() {
            pending_labels.push(name);
            continue;
        }
        for name in pending_labels.drain(..) {
            offsets.insert(name, offset);
        }
        offset += 1;
    }
    // Labels with nothing after them (end of stream) resolve to the
    // one-past-the-end offset.
    for name in pending_labels.drain(..) {
        offsets.insert(name, offset);
    }

    // Second pass: emit non-label quadruples with targets rewritten to
    // resolved offsets.
    for q in quads {
        if q.label_name().is_some() {
            continue;
        }
        let mut out = q;
        if let Operand::LabelRef(target) = out.target {
            let resolved_offset = offsets.get(&target).copied().unwrap_or(base);
            out.target = Operand::IntConst(resolved_offset as i64);
        }
        resolved.push(out);
    }

    (resolved, offsets)
}

/// Run the full five-step pass (§4.9) over a single quadruple stream.
/// Idempotent: step 4 strips every label and resolves every target to a
/// plain `IntConst` offset, so a second call has no `LabelRef` left to
/// collapse or chase and returns its input unchanged.
pub fn optimize(mut quads: Vec<Quadruple>, base: u32) -> (Vec<Quadruple>, HashMap<NameId, u32>) {
    collapse_goto_chains(&mut quads);
    let quads = delete_dead_quadruples(quads);
    resolve_labels(quads, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namtab::NameTable;

    #[test]
    fn goto_chain_collapses_to_final_target() {
        let (mut names, _) = NameTable::new();
        let l1 = names.intern("L1");
        let l2 = names.intern("L2");
        let l3 = names.intern("L3");
        let x = names.intern("x");

        let quads = vec![
            Quadruple::label(l1),
            Quadruple::goto(l2),
            Quadruple::label(l2),
            Quadruple::goto(l3),
            Quadruple::label(l3),
            Quadruple::assign(Operand::Name(x), Operand::IntConst(1)),
        ];

        let entry_goto = Quadruple::goto(l1);
        let mut stream = vec![entry_goto];
        stream.extend(quads);

        let (resolved, offsets) = optimize(stream, 0);

        // The entry jump survives (redirected straight to L3); the two
        // intermediate gotos that made up L1's and L2's bodies become
        // unreachable once nothing targets them directly anymore, and are
        // deleted. Only the redirected entry jump and the assignment
        // remain, and every label resolves to the assignment's offset.
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].op, Op::Goto);
        assert_eq!(resolved[1].op, Op::Assign);

        let assign_offset = offsets[&l3];
        assert_eq!(resolved[0].target, Operand::IntConst(assign_offset as i64));
        assert_eq!(offsets[&l1], assign_offset);
        assert_eq!(offsets[&l2], assign_offset);
    }

    #[test]
    fn needs_stored_collects_distinct_operand_names() {
        let (mut names, _) = NameTable::new();
        let x = names.intern("x");
        let y = names.intern("y");
        let quads = vec![
            Quadruple::assign(Operand::Name(x), Operand::IntConst(1)),
            Quadruple::assign(Operand::Name(y), Operand::Name(x)),
        ];
        let stored = needs_stored(&quads);
        assert_eq!(stored.len(), 2);
        assert!(stored.contains(&x));
        assert!(stored.contains(&y));
    }

    #[test]
    fn branch_to_textually_next_quadruple_is_deleted() {
        let (mut names, _) = NameTable::new();
        let l1 = names.intern("L1");
        let x = names.intern("x");
        let quads = vec![
            Quadruple::goto_if_false(Operand::Name(x), l1),
            Quadruple::label(l1),
            Quadruple::assign(Operand::Name(x), Operand::IntConst(0)),
        ];
        let reduced = delete_dead_quadruples(quads);
        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0].label_name(), Some(l1));
    }

    #[test]
    fn optimizing_twice_yields_same_stream() {
        let (mut names, _) = NameTable::new();
        let l1 = names.intern("L1");
        let x = names.intern("x");
        let quads = vec![
            Quadruple::label(l1),
            Quadruple::assign(Operand::Name(x), Operand::IntConst(1)),
            Quadruple::goto(l1),
        ];
        let (resolved_once, offsets_once) = optimize(quads, 0);
        assert_eq!(offsets_once[&l1], 0);

        let (resolved_twice, _) = optimize(resolved_once.clone(), 0);
        assert_eq!(resolved_once, resolved_twice);
    }
}

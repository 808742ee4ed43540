//! Three-address quadruple IR (spec §4.9, §9 GLOSSARY "Quadruple").
//!
//! A thin intermediate form between the checked AST and the optimizer:
//! enough opcodes to express straight-line assignment, unconditional and
//! conditional jumps, labels, and procedure return, which is what the
//! optimizer's goto-collapse/dead-code/label-resolution passes operate on.
//! Full statement-to-quadruple lowering for every AST shape is future work;
//! what's here is grounded directly in §4.9's five-step algorithm and the
//! `Quadruple` glossary entry.

use crate::namtab::NameId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Name(NameId),
    IntConst(i64),
    /// An unresolved reference to a label's quadruple position; replaced by
    /// a byte/offset value during [`crate::optimizer::resolve_labels`].
    LabelRef(NameId),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// A no-op marker recording where a label points; never reaches the
    /// final resolved stream (step 4 of §4.9 strips label quadruples).
    Label(NameId),
    Assign,
    Goto,
    /// Conditional jump: jumps to `target` when `cond` is false (the shape
    /// `if`/`while` lowering produces for a "fall through on true" body).
    GotoIfFalse,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quadruple {
    pub op: Op,
    pub operand1: Operand,
    pub operand2: Operand,
    pub result: Operand,
    /// `LabelRef` target for `Goto`/`GotoIfFalse`; `Operand::None` otherwise.
    pub target: Operand,
}

impl Quadruple {
    pub fn label(name: NameId) -> Self {
        Quadruple {
            op: Op::Label(name),
            operand1: Operand::None,
            operand2: Operand::None,
            result: Operand::None,
            target: Operand::None,
        }
    }

    pub fn goto(target: NameId) -> Self {
        Quadruple {
            op: Op::Goto,
            operand1: Operand::None,
            operand2: Operand::None,
            result: Operand::None,
            target: Operand::LabelRef(target),
        }
    }

    pub fn goto_if_false(cond: Operand, target: NameId) -> Self {
        Quadruple {
            op: Op::GotoIfFalse,
            operand1: cond,
            operand2: Operand::None,
            result: Operand::None,
            target: Operand::LabelRef(target),
        }
    }

    pub fn assign(dest: Operand, value: Operand) -> Self {
        Quadruple {
            op: Op::Assign,
            operand1: value,
            operand2: Operand::None,
            result: dest,
            target: Operand::None,
        }
    }

    pub fn is_unconditional_goto(&self) -> bool {
        self.op == Op::Goto
    }

    pub fn label_name(&self) -> Option<NameId> {
        match self.op {
            Op::Label(name) => Some(name),
            _ => None,
        }
    }
}

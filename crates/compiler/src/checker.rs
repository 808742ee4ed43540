//! Semantic checker (spec §4.8).
//!
//! A single recursive pass over a compilation unit's AST, threading a
//! context bitmask down through each call so the same `dot`/`of` node
//! validates differently depending on whether it sits in statement,
//! LHS, or RHS position. Nodes that resolve further — `name` to a
//! concrete symbol, `of` to a `call` — rewrite themselves in place
//! rather than producing a second tree.

use crate::ast::{AstKind, AstPool};
use crate::config::CompilerConfig;
use crate::diagnostics::{DiagnosticsCollector, FilePos};
use crate::namtab::{NameId, NameTable, ReservedNames};
use crate::symtab::{Procedure, Symbol, SymbolKind, SymbolTable};
use setl2_core::arena::Handle;
use std::collections::HashMap;

pub type Ctx = u32;

pub const STMT: Ctx = 1 << 0;
pub const LHS_GEN: Ctx = 1 << 1;
pub const LHS_BV: Ctx = 1 << 2;
pub const LHS_MAP: Ctx = 1 << 3;
pub const RHS_VAL: Ctx = 1 << 4;
pub const RHS_COND: Ctx = 1 << 5;
pub const RHS_CALL: Ctx = 1 << 6;
pub const CONST: Ctx = 1 << 7;

type NodeHandle = Handle<crate::ast::AstNode>;

pub struct Checker<'a> {
    pool: &'a mut AstPool,
    names: &'a mut NameTable,
    reserved: ReservedNames,
    symtab: &'a mut SymbolTable,
    diagnostics: &'a mut DiagnosticsCollector,
    config: &'a CompilerConfig,
    current_procedure: Handle<Procedure>,
    in_class_body: bool,
    /// One label-number allocation counter and the seen-labels-within-a-case
    /// table, reset per compilation unit; tracks scenario 2 (duplicate case
    /// label) without needing a second AST pass.
    next_label_number: u32,
}

fn fp(pos: (u32, u32)) -> FilePos {
    FilePos { line: pos.0, column: pos.1 }
}

impl<'a> Checker<'a> {
    pub fn new(
        pool: &'a mut AstPool,
        names: &'a mut NameTable,
        reserved: ReservedNames,
        symtab: &'a mut SymbolTable,
        diagnostics: &'a mut DiagnosticsCollector,
        config: &'a CompilerConfig,
        root_procedure: Handle<Procedure>,
    ) -> Self {
        Checker {
            pool,
            names,
            reserved,
            symtab,
            diagnostics,
            config,
            current_procedure: root_procedure,
            in_class_body: false,
            next_label_number: 1,
        }
    }

    pub fn check_program(&mut self, root: NodeHandle) {
        self.visit(root, STMT);
    }

    fn error(&mut self, pos: (u32, u32), message: impl Into<String>) {
        self.diagnostics.error(fp(pos), message);
    }

    fn resolve_or_declare(&mut self, name: NameId) -> Option<Handle<Symbol>> {
        if let Some(sym) = self.symtab.lookup_visible(name) {
            return Some(sym);
        }
        if self.config.implicit_declarations {
            return self.symtab.declare(name, self.current_procedure, SymbolKind::Id, (0, 0));
        }
        None
    }

    /// `name` -> `symtab` rewrite (§4.8).
    fn check_name(&mut self, node: NodeHandle, ctx: Ctx) {
        let pos = self.pool.get(node).file_pos;
        let name = self.pool.get(node).extension;
        let Some(name) = name else { return };

        if ctx & LHS_BV != 0 {
            let sym = self
                .symtab
                .declare(name, self.current_procedure, SymbolKind::Id, pos)
                .unwrap_or_else(|| self.symtab.lookup_visible(name).unwrap());
            self.pool.get_mut(node).symbol = Some(sym);
            return;
        }

        match self.resolve_or_declare(name) {
            Some(sym) => self.pool.get_mut(node).symbol = Some(sym),
            None => self.error(pos, format!("undeclared identifier '{}'", self.names.text(name))),
        }
    }

    fn visit_children(&mut self, node: NodeHandle, ctx: Ctx) {
        if let Some(child) = self.pool.get(node).child {
            self.visit_list(child, ctx);
        }
    }

    fn visit_list(&mut self, mut node: NodeHandle, ctx: Ctx) {
        loop {
            let next = self.pool.get(node).next;
            self.visit(node, ctx);
            match next {
                Some(n) => node = n,
                None => break,
            }
        }
    }

    fn visit(&mut self, node: NodeHandle, ctx: Ctx) {
        let kind = self.pool.get(node).kind;
        let pos = self.pool.get(node).file_pos;

        match kind {
            AstKind::List => self.visit_children(node, ctx),

            AstKind::Name => self.check_name(node, ctx),

            AstKind::SelfExpr => {
                if !self.in_class_body {
                    self.error(pos, "SELF used outside a class or process body");
                } else if ctx & (LHS_GEN | LHS_BV | LHS_MAP | CONST | STMT) != 0 {
                    self.error(pos, "SELF is not a valid assignment target or constant");
                }
            }

            AstKind::Assign | AstKind::AssignOp => {
                let lhs = self.pool.get(node).child.unwrap();
                let rhs = self.pool.get(lhs).next.unwrap();
                self.check_lhs(lhs);
                if self.pool.get(rhs).kind == AstKind::ProcLit {
                    let proc = self.check_proc_lit(rhs);
                    if self.pool.get(lhs).kind == AstKind::Name {
                        if let Some(sym) = self.pool.get(lhs).symbol {
                            let s = self.symtab.symbol_mut(sym);
                            s.kind = SymbolKind::Procedure;
                            s.bound_procedure = Some(proc);
                        }
                    }
                } else {
                    self.visit(rhs, RHS_VAL);
                }
                if kind == AstKind::AssignOp && matches!(self.pool.get(lhs).kind, AstKind::Of | AstKind::Ofa) {
                    self.wrap_index_list_in_enum_tup(lhs);
                }
            }

            AstKind::Dot => self.check_dot(node, ctx),

            AstKind::Of | AstKind::Ofa => self.check_of(node, ctx),

            AstKind::Call => self.visit_children(node, RHS_VAL),

            AstKind::If => self.check_if(node),
            AstKind::While | AstKind::Until => self.check_while(node),
            AstKind::Loop => self.visit_children(node, STMT),
            AstKind::For => self.check_for(node),
            AstKind::Forall | AstKind::Exists => self.check_quantifier(node),
            AstKind::SetFormer | AstKind::TupleFormer => self.check_former(node),
            AstKind::Case => self.check_case(node),

            AstKind::Return => {
                if self.current_procedure == self.symtab.procedure(self.current_procedure).parent.unwrap_or(self.current_procedure)
                {
                    // unreachable guard kept simple: top-level program has no parent
                }
                if self.symtab.procedure(self.current_procedure).parent.is_none() {
                    self.error(pos, "RETURN used outside a procedure body (program level)");
                }
                if let Some(value) = self.pool.get(node).child {
                    self.visit(value, RHS_VAL);
                }
            }
            AstKind::Exit => {
                if ctx & STMT == 0 {
                    self.error(pos, "EXIT used outside a loop context");
                }
            }
            AstKind::Continue => {
                if ctx & STMT == 0 {
                    self.error(pos, "CONTINUE used outside a loop context");
                }
            }
            AstKind::Stop | AstKind::Quit => {
                if ctx & RHS_VAL != 0 {
                    self.error(pos, "STOP/QUIT cannot be used as a value");
                }
            }

            AstKind::Assert => self.visit_children(node, RHS_COND),

            AstKind::LabelDef => self.check_label_def(node),
            AstKind::Goto => self.check_goto(node),

            AstKind::Not => self.visit_children(node, RHS_COND),
            AstKind::And | AstKind::Or => self.visit_children(node, RHS_COND),

            AstKind::Eq | AstKind::Ne | AstKind::Lt | AstKind::Le | AstKind::Gt | AstKind::Ge
            | AstKind::In | AstKind::NotIn => self.visit_children(node, RHS_VAL),

            AstKind::Add | AstKind::Sub | AstKind::Mul | AstKind::Div | AstKind::Mod | AstKind::Exp
            | AstKind::Union | AstKind::Intersect | AstKind::SetDiff | AstKind::With | AstKind::Less
            | AstKind::Neg => self.visit_children(node, RHS_VAL),

            AstKind::ProcLit => {
                self.check_proc_lit(node);
            }

            AstKind::IntLit | AstKind::RealLit | AstKind::StringLit => {
                if ctx & STMT != 0 {
                    self.error(pos, "value used as a statement");
                }
            }

            _ => self.visit_children(node, ctx),
        }
    }

    fn check_lhs(&mut self, node: NodeHandle) {
        let kind = self.pool.get(node).kind;
        match kind {
            AstKind::Name => self.check_name(node, LHS_GEN),
            AstKind::Of | AstKind::Ofa => {
                let base = self.pool.get(node).child.unwrap();
                self.visit(base, RHS_VAL);
                let args = self.pool.get(base).next.unwrap();
                self.visit_list(self.pool.get(args).child.unwrap_or(args), LHS_MAP);
            }
            AstKind::EnumTup => self.visit_children(node, LHS_GEN),
            AstKind::TupleFormer => self.visit_children(node, LHS_GEN),
            _ => {
                let pos = self.pool.get(node).file_pos;
                self.error(pos, "invalid left-hand side");
            }
        }
    }

    fn wrap_index_list_in_enum_tup(&mut self, of_node: NodeHandle) {
        let base = self.pool.get(of_node).child.unwrap();
        let args = self.pool.get(base).next.unwrap();
        let n_args = self.pool.siblings(self.pool.get(args).child).len();
        if n_args <= 1 {
            return;
        }
        let pos = self.pool.get(args).file_pos;
        let wrapper = self.pool.alloc(AstKind::EnumTup, pos);
        let inner_child = self.pool.get(args).child;
        if let Some(c) = inner_child {
            self.pool.set_child(wrapper, c);
        }
        self.pool.get_mut(args).child = None;
        self.pool.set_child(args, wrapper);
    }

    /// `dot` walk (§4.8): left-to-right, non-trailing positions must
    /// themselves resolve to a scope (a package/class/procedure), only the
    /// final segment is a value reference.
    fn check_dot(&mut self, node: NodeHandle, ctx: Ctx) {
        let pos = self.pool.get(node).file_pos;
        let segments = self.pool.siblings(self.pool.get(node).child);
        if segments.is_empty() {
            return;
        }
        for seg in &segments[..segments.len() - 1] {
            if !matches!(self.pool.get(*seg).kind, AstKind::Name) {
                self.error(pos, "non-trailing dotted segment must be a simple name");
            } else {
                self.check_name(*seg, RHS_CALL);
            }
        }
        let last = *segments.last().unwrap();
        if ctx & (LHS_GEN | LHS_MAP) != 0 {
            self.check_lhs(last);
        } else {
            self.visit(last, ctx);
        }
    }

    /// `of`/`ofa` (§4.8): arity-checks a literal-procedure callee and
    /// rewrites to `call`; anything else is left as an indexing operation
    /// for the runtime to dispatch dynamically. This grammar has no
    /// rest-parameter syntax (every `lambda` is fixed-arity), so the check
    /// is an exact `actual == formal`, not the variable-arity `>=` a
    /// vararg-capable procedure form would need.
    fn check_of(&mut self, node: NodeHandle, ctx: Ctx) {
        let base = self.pool.get(node).child.unwrap();
        self.visit(base, RHS_CALL);
        let args = self.pool.get(base).next.unwrap();
        self.visit_list(self.pool.get(args).child.unwrap_or(args), RHS_VAL);

        let base_symbol = self.pool.get(base).symbol;
        if let Some(sym) = base_symbol {
            let symbol = self.symtab.symbol(sym);
            if symbol.kind == SymbolKind::Procedure {
                if let Some(proc) = symbol.bound_procedure {
                    let actual = self.pool.siblings(self.pool.get(args).child).len() as u32;
                    let formal = self.symtab.procedure(proc).num_formals;
                    if actual != formal {
                        let pos = self.pool.get(node).file_pos;
                        self.error(
                            pos,
                            format!("procedure called with {actual} argument(s), expected {formal}"),
                        );
                    }
                }
                self.pool.get_mut(node).kind = AstKind::Call;
            }
        }
        if ctx & STMT != 0 && self.pool.get(node).kind != AstKind::Call {
            let pos = self.pool.get(node).file_pos;
            self.error(pos, "value used as a statement");
        }
    }

    /// `if`/`elseif` arms are alternating (cond, body) sibling pairs; a
    /// lone trailing node (no following sibling) is the `else` body.
    fn check_if(&mut self, node: NodeHandle) {
        let mut cursor = self.pool.get(node).child;
        while let Some(cond) = cursor {
            let Some(body) = self.pool.get(cond).next else {
                self.visit_list_as_stmts(cond);
                break;
            };
            self.visit(cond, RHS_COND);
            self.visit_list_as_stmts(body);
            cursor = self.pool.get(body).next;
        }
    }

    fn visit_list_as_stmts(&mut self, list_node: NodeHandle) {
        if let Some(first) = self.pool.get(list_node).child {
            self.visit_list(first, STMT);
        }
    }

    fn check_while(&mut self, node: NodeHandle) {
        let cond = self.pool.get(node).child.unwrap();
        self.visit(cond, RHS_COND);
        if let Some(body) = self.pool.get(cond).next {
            self.visit_list_as_stmts(body);
        }
    }

    fn open_iterator_scope(&mut self) -> Handle<Procedure> {
        let outer = self.current_procedure;
        self.current_procedure = self.symtab.new_procedure(outer);
        outer
    }

    fn close_iterator_scope(&mut self, outer: Handle<Procedure>) {
        self.symtab.detach_procedure(self.current_procedure);
        self.current_procedure = outer;
    }

    fn check_for(&mut self, node: NodeHandle) {
        let outer = self.open_iterator_scope();
        let iter = self.pool.get(node).child.unwrap();
        self.check_iterator_expr(iter);
        if let Some(body) = self.pool.get(iter).next {
            self.visit_list_as_stmts(body);
        }
        self.close_iterator_scope(outer);
    }

    fn check_quantifier(&mut self, node: NodeHandle) {
        let outer = self.open_iterator_scope();
        let iter = self.pool.get(node).child.unwrap();
        self.check_iterator_expr(iter);
        if let Some(cond) = self.pool.get(iter).next {
            self.visit(cond, RHS_COND);
        }
        self.close_iterator_scope(outer);
    }

    fn check_former(&mut self, node: NodeHandle) {
        let outer = self.open_iterator_scope();
        self.visit_children(node, LHS_BV | RHS_VAL);
        self.close_iterator_scope(outer);
    }

    /// The `bv in iter` shape inside `for`/quantifiers: `bv` declares,
    /// `iter` is an ordinary value expression (§4.8 "bound variable ...
    /// declares on first sight").
    fn check_iterator_expr(&mut self, iter_node: NodeHandle) {
        if matches!(self.pool.get(iter_node).kind, AstKind::In) {
            let bv = self.pool.get(iter_node).child.unwrap();
            let domain = self.pool.get(bv).next.unwrap();
            self.check_name(bv, LHS_BV);
            self.visit(domain, RHS_VAL);
        } else {
            self.visit(iter_node, RHS_VAL);
        }
    }

    /// Scenario 2: two `case` labels with the same literal text under the
    /// same selector report `msg_dup_declaration`'s case-label analogue.
    fn check_case(&mut self, node: NodeHandle) {
        let selector = self.pool.get(node).child.unwrap();
        self.visit(selector, RHS_VAL);
        let mut seen: HashMap<String, ()> = HashMap::new();
        // Arms are stored as alternating (label-list, body) sibling pairs
        // after the selector; a lone trailing node (no following sibling)
        // is the `otherwise` body.
        let mut cursor = self.pool.get(selector).next;
        while let Some(label_list) = cursor {
            let Some(body) = self.pool.get(label_list).next else {
                // lone trailing node: the otherwise body.
                self.visit_list_as_stmts(label_list);
                break;
            };
            if let Some(first_label) = self.pool.get(label_list).child {
                for label in self.pool.siblings(Some(first_label)) {
                    let key = self.label_text(label);
                    if seen.insert(key.clone(), ()).is_some() {
                        let pos = self.pool.get(label).file_pos;
                        self.error(pos, format!("duplicate case label '{key}'"));
                    }
                }
            }
            self.visit_list_as_stmts(body);
            cursor = self.pool.get(body).next;
        }
    }

    fn label_text(&self, node: NodeHandle) -> String {
        match self.pool.get(node).extension {
            Some(name) => self.names.text(name).to_string(),
            None => format!("<node{node:?}>"),
        }
    }

    fn check_proc_lit(&mut self, node: NodeHandle) -> Handle<Procedure> {
        let outer = self.current_procedure;
        let proc = self.symtab.new_procedure(outer);
        self.current_procedure = proc;
        let formals = self.pool.get(node).child.unwrap();
        if let Some(first) = self.pool.get(formals).child {
            let num_formals = self.pool.siblings(Some(first)).len() as u32;
            self.symtab.procedure_mut(proc).num_formals = num_formals;
            self.visit_list(first, LHS_BV);
        }
        if let Some(body) = self.pool.get(formals).next {
            self.visit_list_as_stmts(body);
        }
        self.symtab.detach_procedure(proc);
        self.current_procedure = outer;
        proc
    }

    fn check_label_def(&mut self, node: NodeHandle) {
        let pos = self.pool.get(node).file_pos;
        if let Some(name) = self.pool.get(node).extension {
            let sym = self
                .symtab
                .declare(name, self.current_procedure, SymbolKind::Label, pos)
                .unwrap_or_else(|| self.symtab.lookup_visible(name).unwrap());
            self.symtab.symbol_mut(sym).offset = self.next_label_number;
            self.next_label_number += 1;
            self.pool.get_mut(node).symbol = Some(sym);
        }
        if let Some(body) = self.pool.get(node).child {
            self.visit(body, STMT);
        }
    }

    fn check_goto(&mut self, node: NodeHandle) {
        let pos = self.pool.get(node).file_pos;
        if let Some(name) = self.pool.get(node).extension {
            match self.symtab.lookup_visible(name) {
                Some(sym) => self.pool.get_mut(node).symbol = Some(sym),
                None => self.error(pos, format!("undefined label '{}'", self.names.text(name))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn check_src(src: &str) -> (DiagnosticsCollector, AstPool) {
        let (mut names, reserved) = NameTable::new();
        let (mut symtab, root_proc) = SymbolTable::new();
        let mut pool = AstPool::new();
        let config = CompilerConfig::new();
        let mut parser = Parser::new(src.as_bytes(), &mut names, reserved, 8, 4096).unwrap();
        let root = parser.parse_program(&mut pool).unwrap();
        drop(parser);
        let mut diagnostics = DiagnosticsCollector::new();
        let mut checker =
            Checker::new(&mut pool, &mut names, reserved, &mut symtab, &mut diagnostics, &config, root_proc);
        checker.check_program(root);
        (diagnostics, pool)
    }

    #[test]
    fn implicit_declaration_resolves_name_without_error() {
        let (diagnostics, _pool) = check_src("x := 1;");
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn undeclared_identifier_errors_when_implicit_declarations_disabled() {
        let (mut names, reserved) = NameTable::new();
        let (mut symtab, root_proc) = SymbolTable::new();
        let mut pool = AstPool::new();
        let config = CompilerConfig::new().with_implicit_declarations(false);
        let mut parser = Parser::new(b"y := x;", &mut names, reserved, 8, 4096).unwrap();
        let root = parser.parse_program(&mut pool).unwrap();
        drop(parser);
        let mut diagnostics = DiagnosticsCollector::new();
        let mut checker =
            Checker::new(&mut pool, &mut names, reserved, &mut symtab, &mut diagnostics, &config, root_proc);
        checker.check_program(root);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn duplicate_case_label_is_reported() {
        let (diagnostics, _pool) =
            check_src("case x when 1 : y := 1; when 1 : y := 2; end case;");
        assert!(diagnostics.num_errors() >= 1);
    }

    #[test]
    fn goto_to_undefined_label_is_reported() {
        let (diagnostics, _pool) = check_src("goto nowhere;");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn goto_to_known_label_is_clean() {
        let (diagnostics, _pool) = check_src("L1: goto L2; L2: x := 1;");
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn calling_a_bound_procedure_with_too_few_arguments_is_an_arity_error() {
        let (diagnostics, _pool) =
            check_src("f := lambda(x, y); return x + y; end lambda; z := f(1);");
        assert!(diagnostics.has_errors());
        assert!(diagnostics.get(0).unwrap().message.contains("expected 2"));
    }

    #[test]
    fn calling_a_bound_procedure_with_the_right_arity_is_clean() {
        let (diagnostics, _pool) =
            check_src("f := lambda(x, y); return x + y; end lambda; z := f(1, 2);");
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn bare_index_statement_on_a_non_procedure_name_is_rejected() {
        let (diagnostics, _pool) = check_src("s := 1; s(1);");
        assert!(diagnostics.has_errors());
    }
}

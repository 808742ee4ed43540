//! Compiler instance facade (spec §5, §6.4).
//!
//! A `CompilerInstance` owns one name table, one symbol/procedure tree and
//! one diagnostics collector for as long as it lives — the single-owner
//! concurrency model of §5: no locking, because nothing here is shared
//! across threads. `compile` resets diagnostics for a fresh full-program
//! run; `compile_fragment` appends to the running diagnostics so a native
//! bridge can feed a session multiple fragments (a REPL-style incremental
//! compile) against the same accumulated symbol table.

use crate::ast::{AstKind, AstNode, AstPool};
use crate::checker::Checker;
use crate::config::CompilerConfig;
use crate::diagnostics::{DiagnosticsCollector, FilePos};
use crate::namtab::{NameTable, ReservedNames};
use crate::parser::Parser;
use crate::symtab::{Procedure, SymbolTable};
use setl2_core::arena::Handle;
use setl2_runtime::Specifier;
use setl2_runtime::container::tuple::TupleRoot;

pub struct CompilerInstance {
    names: NameTable,
    reserved: ReservedNames,
    symtab: SymbolTable,
    root_procedure: Handle<Procedure>,
    diagnostics: DiagnosticsCollector,
    config: CompilerConfig,
}

impl CompilerInstance {
    pub fn new(config: CompilerConfig) -> Self {
        let (names, reserved) = NameTable::new();
        let (symtab, root_procedure) = SymbolTable::new();
        CompilerInstance {
            names,
            reserved,
            symtab,
            root_procedure,
            diagnostics: DiagnosticsCollector::new(),
            config,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn record_parse_error(&mut self, err: impl std::fmt::Display) {
        self.diagnostics.error(FilePos { line: 0, column: 0 }, err.to_string());
    }

    /// `compile(source_text) -> ExitCode` (§6.4): `0` on a clean parse and
    /// check, non-zero otherwise. Starts a fresh diagnostics list, the way
    /// a one-shot `setl2c build` invocation would.
    pub fn compile(&mut self, source: &str) -> i32 {
        self.diagnostics = DiagnosticsCollector::new();
        let mut pool = AstPool::new();
        let root = match self.parse_program_into(source, &mut pool) {
            Ok(root) => root,
            Err(e) => {
                self.record_parse_error(e);
                return 1;
            }
        };
        self.check(&mut pool, root);
        if self.diagnostics.has_errors() { 1 } else { 0 }
    }

    /// `parse(string) -> tuple_tree | omega` (§6.4): parse only, no
    /// semantic check, for callers that just want the tree shape.
    pub fn parse(&mut self, source: &str) -> Specifier {
        let mut pool = AstPool::new();
        match self.parse_program_into(source, &mut pool) {
            Ok(root) => ast_to_tuple_tree(&pool, root),
            Err(e) => {
                self.record_parse_error(e);
                Specifier::Omega
            }
        }
    }

    /// `parse_expr(string) -> tuple_tree | omega` (§6.4). A compilation
    /// unit here is just its top-level statement list ([`Parser::parse_program`]
    /// never requires the `PROGRAM name; ... END name;` bracketing), so
    /// there's no unit wrapper to splice a bare expression into; this goes
    /// straight to the expression grammar's own entry point
    /// ([`Parser::parse_expr_entry`]).
    pub fn parse_expr(&mut self, source: &str) -> Specifier {
        let mut pool = AstPool::new();
        let parsed = Parser::new(
            source.as_bytes(),
            &mut self.names,
            self.reserved,
            self.config.tab_width,
            self.config.max_tok_len,
        )
        .and_then(|mut parser| parser.parse_expr_entry(&mut pool));
        match parsed {
            Ok(root) => ast_to_tuple_tree(&pool, root),
            Err(e) => {
                self.record_parse_error(e);
                Specifier::Omega
            }
        }
    }

    /// `compile_fragment(string) -> 0 | omega` (§6.4): parse and check one
    /// fragment against this instance's running symbol table, without
    /// resetting prior diagnostics.
    pub fn compile_fragment(&mut self, source: &str) -> Specifier {
        let mut pool = AstPool::new();
        let root = match self.parse_program_into(source, &mut pool) {
            Ok(root) => root,
            Err(e) => {
                self.record_parse_error(e);
                return Specifier::Omega;
            }
        };
        self.check(&mut pool, root);
        if self.diagnostics.has_errors() {
            Specifier::Omega
        } else {
            Specifier::Short(0)
        }
    }

    pub fn num_errors(&self) -> u32 {
        self.diagnostics.num_errors()
    }

    pub fn err_string(&self, index: usize) -> Option<String> {
        self.diagnostics.get(index).map(|d| d.to_string())
    }

    fn parse_program_into(
        &mut self,
        source: &str,
        pool: &mut AstPool,
    ) -> Result<Handle<AstNode>, crate::error::ParseError> {
        let mut parser = Parser::new(
            source.as_bytes(),
            &mut self.names,
            self.reserved,
            self.config.tab_width,
            self.config.max_tok_len,
        )?;
        parser.parse_program(pool)
    }

    fn check(&mut self, pool: &mut AstPool, root: Handle<AstNode>) {
        let mut checker = Checker::new(
            pool,
            &mut self.names,
            self.reserved,
            &mut self.symtab,
            &mut self.diagnostics,
            &self.config,
            self.root_procedure,
        );
        checker.check_program(root);
    }
}

/// Render a checked or unchecked AST subtree as a `tuple_tree`: a 4-tuple
/// of `[kind-name, line, column, child-list]`, where `child-list` is a
/// tuple of this same shape for each of the node's children in order. This
/// mirrors the shape the original native bridge returned a parse tree in —
/// a value built entirely from ordinary tuples and strings, rather than an
/// opaque handle the caller can't introspect.
fn ast_to_tuple_tree(pool: &AstPool, node: Handle<AstNode>) -> Specifier {
    let n = pool.get(node);
    let children: Vec<Specifier> = pool
        .siblings(n.child)
        .into_iter()
        .map(|child| ast_to_tuple_tree(pool, child))
        .collect();
    Specifier::Tuple(TupleRoot::from_vec(vec![
        Specifier::new_string(kind_name(n.kind)),
        Specifier::Short(n.file_pos.0 as i32),
        Specifier::Short(n.file_pos.1 as i32),
        Specifier::Tuple(TupleRoot::from_vec(children)),
    ]))
}

fn kind_name(kind: AstKind) -> &'static str {
    match kind {
        AstKind::List => "list",
        AstKind::Name => "name",
        AstKind::Symtab => "symtab",
        AstKind::Dot => "dot",
        AstKind::IntLit => "intlit",
        AstKind::RealLit => "reallit",
        AstKind::StringLit => "stringlit",
        AstKind::Add => "add",
        AstKind::Sub => "sub",
        AstKind::Mul => "mul",
        AstKind::Div => "div",
        AstKind::Mod => "mod",
        AstKind::Exp => "exp",
        AstKind::Neg => "neg",
        AstKind::Eq => "eq",
        AstKind::Ne => "ne",
        AstKind::Lt => "lt",
        AstKind::Le => "le",
        AstKind::Gt => "gt",
        AstKind::Ge => "ge",
        AstKind::And => "and",
        AstKind::Or => "or",
        AstKind::Not => "not",
        AstKind::In => "in",
        AstKind::NotIn => "notin",
        AstKind::Union => "union",
        AstKind::Intersect => "inter",
        AstKind::SetDiff => "setdiff",
        AstKind::With => "with",
        AstKind::Less => "less",
        AstKind::Assign => "assign",
        AstKind::AssignOp => "assignop",
        AstKind::Of => "of",
        AstKind::Ofa => "ofa",
        AstKind::Slice => "slice",
        AstKind::End => "end",
        AstKind::From => "from",
        AstKind::Fromb => "fromb",
        AstKind::Frome => "frome",
        AstKind::Forall => "forall",
        AstKind::Exists => "exists",
        AstKind::SetFormer => "setformer",
        AstKind::TupleFormer => "tupleformer",
        AstKind::If => "if",
        AstKind::While => "while",
        AstKind::Until => "until",
        AstKind::Loop => "loop",
        AstKind::For => "for",
        AstKind::Case => "case",
        AstKind::Return => "return",
        AstKind::Exit => "exit",
        AstKind::Continue => "continue",
        AstKind::Stop => "stop",
        AstKind::Quit => "quit",
        AstKind::Assert => "assert",
        AstKind::Slot => "slot",
        AstKind::SlotOf => "slotof",
        AstKind::SlotCall => "slotcall",
        AstKind::InitObj => "initobj",
        AstKind::Menviron => "menviron",
        AstKind::Penviron => "penviron",
        AstKind::SelfExpr => "self",
        AstKind::Call => "call",
        AstKind::EnumTup => "enumtup",
        AstKind::ProcLit => "proclit",
        AstKind::LabelDef => "labeldef",
        AstKind::Goto => "goto",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_accepts_well_formed_fragment() {
        let mut instance = CompilerInstance::new(CompilerConfig::default());
        let code = instance.compile("x := 1;");
        assert_eq!(code, 0);
        assert_eq!(instance.num_errors(), 0);
    }

    #[test]
    fn compile_reports_checker_errors() {
        let mut instance =
            CompilerInstance::new(CompilerConfig::default().with_implicit_declarations(false));
        let code = instance.compile("y := x;");
        assert_eq!(code, 1);
        assert!(instance.num_errors() > 0);
        assert!(instance.err_string(0).unwrap().contains("undeclared"));
    }

    #[test]
    fn parse_returns_tuple_tree_shape() {
        let mut instance = CompilerInstance::new(CompilerConfig::default());
        let tree = instance.parse("x := 1;");
        assert!(matches!(tree, Specifier::Tuple(_)));
    }

    #[test]
    fn parse_expr_parses_a_bare_expression() {
        let mut instance = CompilerInstance::new(CompilerConfig::default());
        let tree = instance.parse_expr("1 + 2");
        assert!(matches!(tree, Specifier::Tuple(_)));
    }

    #[test]
    fn parse_reports_omega_on_syntax_error() {
        let mut instance = CompilerInstance::new(CompilerConfig::default());
        let tree = instance.parse("x := ;");
        assert!(matches!(tree, Specifier::Omega));
    }

    #[test]
    fn compile_fragment_reuses_running_symbol_table() {
        let mut instance = CompilerInstance::new(CompilerConfig::default());
        let first = instance.compile_fragment("x := 1;");
        assert!(matches!(first, Specifier::Short(0)));
        let second = instance.compile_fragment("y := x + 1;");
        assert!(matches!(second, Specifier::Short(0)));
    }
}

//! Recursive-descent parser (spec §4.7).
//!
//! Tokens are pulled from [`crate::lexer::Lexer`] one at a time into a
//! single-token lookahead buffer; there's no separate tokenize-then-parse
//! pass. Every node is allocated directly into the caller's [`AstPool`],
//! the same pool the checker and optimizer will walk afterward.
//!
//! An unresolved identifier always parses to a bare `AstKind::Name` node
//! (§4.8: name resolution, including implicit declaration, is entirely the
//! checker's job). The parser never consults the symbol table.

use crate::ast::{AstKind, AstPool};
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::namtab::{NameId, NameTable, ReservedNames};
use setl2_core::arena::Handle;

pub struct Parser<'src, 'names> {
    lexer: Lexer<'src>,
    names: &'names mut NameTable,
    reserved: ReservedNames,
    lookahead: Token,
    /// One further token of lookahead, filled lazily by [`Parser::peek2`]
    /// to disambiguate a leading identifier's `label:` form from an
    /// ordinary expression statement.
    lookahead2: Option<Token>,
}

type NodeHandle = Handle<crate::ast::AstNode>;

impl<'src, 'names> Parser<'src, 'names> {
    pub fn new(
        source: &'src [u8],
        names: &'names mut NameTable,
        reserved: ReservedNames,
        tab_width: u32,
        max_tok_len: usize,
    ) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source, tab_width, max_tok_len);
        let lookahead = lexer.next(names)?;
        Ok(Parser { lexer, names, reserved, lookahead, lookahead2: None })
    }

    fn bump(&mut self) -> Result<Token, ParseError> {
        let next = match self.lookahead2.take() {
            Some(buffered) => buffered,
            None => self.lexer.next(self.names)?,
        };
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn peek2(&mut self) -> Result<&Token, ParseError> {
        if self.lookahead2.is_none() {
            self.lookahead2 = Some(self.lexer.next(self.names)?);
        }
        Ok(self.lookahead2.as_ref().unwrap())
    }

    fn at_reserved(&self, id: NameId) -> bool {
        matches!(&self.lookahead.kind, TokenKind::Reserved(r) if *r == id)
    }

    fn at_punct(&self, id: NameId) -> bool {
        matches!(&self.lookahead.kind, TokenKind::Punct(r) if *r == id)
    }

    fn eat_reserved(&mut self, id: NameId, what: &'static str) -> Result<Token, ParseError> {
        if self.at_reserved(id) {
            self.bump()
        } else {
            Err(self.unexpected(what))
        }
    }

    fn eat_punct(&mut self, id: NameId, what: &'static str) -> Result<Token, ParseError> {
        if self.at_punct(id) {
            self.bump()
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            line: self.lookahead.line,
            column: self.lookahead.column,
            found: self.describe_current(),
            expected,
        }
    }

    fn describe_current(&self) -> String {
        match &self.lookahead.kind {
            TokenKind::Eof => "<eof>".to_string(),
            TokenKind::Id(id) => self.names.text(*id).to_string(),
            TokenKind::Reserved(id) => self.names.text(*id).to_string(),
            TokenKind::IntLit(v) => v.to_string(),
            TokenKind::RealLit(v) => v.to_string(),
            TokenKind::StringLit(s) => format!("\"{s}\""),
            TokenKind::Punct(id) => self.names.text(*id).to_string(),
            TokenKind::OpAssign(id) => self.names.text(*id).to_string(),
            TokenKind::OpReduce(id) => self.names.text(*id).to_string(),
        }
    }

    fn pos(&self) -> (u32, u32) {
        (self.lookahead.line, self.lookahead.column)
    }

    /// `parse_program(pool) -> root` (§4.7): a bare statement list, used
    /// both for whole compilation units and for `compile_fragment` (§6.4).
    pub fn parse_program(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        self.parse_statement_list(pool, &[])
    }

    /// `parse_expr(pool) -> root` (§6.4 `parse_expr` entrypoint): a single
    /// expression with no trailing statement punctuation expected.
    pub fn parse_expr_entry(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        self.parse_expr(pool)
    }

    fn parse_statement_list(
        &mut self,
        pool: &mut AstPool,
        stop_words: &[NameId],
    ) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        let list = pool.alloc(AstKind::List, pos);
        let mut prev: Option<NodeHandle> = None;
        loop {
            while self.at_punct(self.reserved.semi) {
                self.bump()?;
            }
            if matches!(self.lookahead.kind, TokenKind::Eof) {
                break;
            }
            if stop_words.iter().any(|w| self.at_reserved(*w)) {
                break;
            }
            let stmt = self.parse_statement(pool)?;
            match prev {
                None => pool.set_child(list, stmt),
                Some(p) => pool.append_sibling(p, stmt),
            }
            prev = Some(stmt);
            while self.at_punct(self.reserved.semi) {
                self.bump()?;
            }
        }
        Ok(list)
    }

    fn parse_statement(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        if matches!(self.lookahead.kind, TokenKind::Id(_)) {
            let next_kind = self.peek2()?.kind.clone();
            if matches!(next_kind, TokenKind::Punct(id) if id == self.reserved.colon) {
                return self.parse_label(pool);
            }
        }
        let r = &self.reserved;
        if self.at_reserved(r.goto) {
            return self.parse_goto(pool);
        }
        if self.at_reserved(r.if_) {
            return self.parse_if(pool);
        }
        if self.at_reserved(r.while_) {
            return self.parse_while(pool);
        }
        if self.at_reserved(r.until) {
            return self.parse_until(pool);
        }
        if self.at_reserved(r.loop_) {
            return self.parse_loop(pool);
        }
        if self.at_reserved(r.for_) {
            return self.parse_for(pool);
        }
        if self.at_reserved(r.case) {
            return self.parse_case(pool);
        }
        if self.at_reserved(r.return_) {
            return self.parse_simple_keyword(pool, r.return_, AstKind::Return, true);
        }
        if self.at_reserved(r.exit) {
            return self.parse_simple_keyword(pool, r.exit, AstKind::Exit, false);
        }
        if self.at_reserved(r.continue_) {
            return self.parse_simple_keyword(pool, r.continue_, AstKind::Continue, false);
        }
        if self.at_reserved(r.stop) {
            return self.parse_simple_keyword(pool, r.stop, AstKind::Stop, false);
        }
        if self.at_reserved(r.quit) {
            return self.parse_simple_keyword(pool, r.quit, AstKind::Quit, false);
        }
        if self.at_reserved(r.assert) {
            return self.parse_assert(pool);
        }
        self.parse_expr_statement(pool)
    }

    fn parse_simple_keyword(
        &mut self,
        pool: &mut AstPool,
        keyword: NameId,
        kind: AstKind,
        optional_value: bool,
    ) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(keyword, "keyword")?;
        let node = pool.alloc(kind, pos);
        if optional_value && !self.at_punct(self.reserved.semi) && !matches!(self.lookahead.kind, TokenKind::Eof)
        {
            let value = self.parse_expr(pool)?;
            pool.set_child(node, value);
        }
        Ok(node)
    }

    fn parse_label(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        let name = match self.bump()?.kind {
            TokenKind::Id(id) => id,
            _ => unreachable!("caller already checked lookahead is Id"),
        };
        self.eat_punct(self.reserved.colon, ":")?;
        let node = pool.alloc(AstKind::LabelDef, pos);
        pool.get_mut(node).extension = Some(name);
        let labeled = self.parse_statement(pool)?;
        pool.set_child(node, labeled);
        Ok(node)
    }

    fn parse_goto(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.goto, "GOTO")?;
        let target = match self.bump()?.kind {
            TokenKind::Id(id) => id,
            _ => return Err(self.unexpected("label name")),
        };
        let node = pool.alloc(AstKind::Goto, pos);
        pool.get_mut(node).extension = Some(target);
        Ok(node)
    }

    fn parse_assert(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.assert, "ASSERT")?;
        let node = pool.alloc(AstKind::Assert, pos);
        let cond = self.parse_expr(pool)?;
        pool.set_child(node, cond);
        Ok(node)
    }

    fn parse_if(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.if_, "IF")?;
        let node = pool.alloc(AstKind::If, pos);
        let cond = self.parse_expr(pool)?;
        self.eat_reserved(self.reserved.then, "THEN")?;
        let then_branch = self.parse_statement_list(pool, &[self.reserved.elseif, self.reserved.else_, self.reserved.end])?;
        pool.set_child(node, cond);
        pool.append_sibling(cond, then_branch);
        let mut tail = then_branch;
        while self.at_reserved(self.reserved.elseif) {
            self.bump()?;
            let elseif_cond = self.parse_expr(pool)?;
            self.eat_reserved(self.reserved.then, "THEN")?;
            let elseif_body = self.parse_statement_list(pool, &[self.reserved.elseif, self.reserved.else_, self.reserved.end])?;
            pool.append_sibling(tail, elseif_cond);
            pool.append_sibling(elseif_cond, elseif_body);
            tail = elseif_body;
        }
        if self.at_reserved(self.reserved.else_) {
            self.bump()?;
            let else_body = self.parse_statement_list(pool, &[self.reserved.end])?;
            pool.append_sibling(tail, else_body);
        }
        self.eat_reserved(self.reserved.end, "END")?;
        self.eat_reserved(self.reserved.if_, "IF")?;
        Ok(node)
    }

    fn parse_while(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.while_, "WHILE")?;
        let node = pool.alloc(AstKind::While, pos);
        let cond = self.parse_expr(pool)?;
        self.eat_reserved(self.reserved.loop_, "LOOP")?;
        let body = self.parse_statement_list(pool, &[self.reserved.end])?;
        self.eat_reserved(self.reserved.end, "END")?;
        self.eat_reserved(self.reserved.loop_, "LOOP")?;
        pool.set_child(node, cond);
        pool.append_sibling(cond, body);
        Ok(node)
    }

    fn parse_until(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.until, "UNTIL")?;
        let node = pool.alloc(AstKind::Until, pos);
        let cond = self.parse_expr(pool)?;
        self.eat_reserved(self.reserved.loop_, "LOOP")?;
        let body = self.parse_statement_list(pool, &[self.reserved.end])?;
        self.eat_reserved(self.reserved.end, "END")?;
        self.eat_reserved(self.reserved.loop_, "LOOP")?;
        pool.set_child(node, cond);
        pool.append_sibling(cond, body);
        Ok(node)
    }

    fn parse_loop(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.loop_, "LOOP")?;
        let node = pool.alloc(AstKind::Loop, pos);
        let body = self.parse_statement_list(pool, &[self.reserved.end])?;
        self.eat_reserved(self.reserved.end, "END")?;
        self.eat_reserved(self.reserved.loop_, "LOOP")?;
        pool.set_child(node, body);
        Ok(node)
    }

    fn parse_for(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.for_, "FOR")?;
        let node = pool.alloc(AstKind::For, pos);
        let iter = self.parse_expr(pool)?;
        self.eat_reserved(self.reserved.loop_, "LOOP")?;
        let body = self.parse_statement_list(pool, &[self.reserved.end])?;
        self.eat_reserved(self.reserved.end, "END")?;
        self.eat_reserved(self.reserved.loop_, "LOOP")?;
        pool.set_child(node, iter);
        pool.append_sibling(iter, body);
        Ok(node)
    }

    /// `case <selector> when <label-list> : <stmts> ... [otherwise <stmts>]
    /// end case;` (§8.3 scenario 2's surface syntax).
    fn parse_case(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.case, "CASE")?;
        let node = pool.alloc(AstKind::Case, pos);
        let selector = self.parse_expr(pool)?;
        pool.set_child(node, selector);
        let mut tail = selector;
        while self.at_reserved(self.reserved.when_kw) {
            self.bump()?;
            let label_pos = self.pos();
            let label_list = pool.alloc(AstKind::List, label_pos);
            let first_label = self.parse_expr(pool)?;
            pool.set_child(label_list, first_label);
            let mut label_tail = first_label;
            while self.at_punct(self.reserved.comma) {
                self.bump()?;
                let more = self.parse_expr(pool)?;
                pool.append_sibling(label_tail, more);
                label_tail = more;
            }
            self.eat_punct(self.reserved.colon, ":")?;
            let arm_body = self.parse_statement_list(
                pool,
                &[self.reserved.when_kw, self.reserved.otherwise, self.reserved.end],
            )?;
            pool.append_sibling(tail, label_list);
            pool.append_sibling(label_list, arm_body);
            tail = arm_body;
        }
        if self.at_reserved(self.reserved.otherwise) {
            self.bump()?;
            self.eat_punct(self.reserved.colon, ":")?;
            let otherwise_body = self.parse_statement_list(pool, &[self.reserved.end])?;
            pool.append_sibling(tail, otherwise_body);
        }
        self.eat_reserved(self.reserved.end, "END")?;
        self.eat_reserved(self.reserved.case, "CASE")?;
        Ok(node)
    }

    fn parse_expr_statement(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        let lhs = self.parse_expr(pool)?;
        if self.at_punct(self.reserved.assign) {
            self.bump()?;
            let rhs = self.parse_expr(pool)?;
            let node = pool.alloc(AstKind::Assign, pos);
            pool.set_child(node, lhs);
            pool.append_sibling(lhs, rhs);
            return Ok(node);
        }
        if let TokenKind::OpAssign(op) = self.lookahead.kind {
            self.bump()?;
            let rhs = self.parse_expr(pool)?;
            let node = pool.alloc(AstKind::AssignOp, pos);
            pool.get_mut(node).extension = Some(op);
            pool.set_child(node, lhs);
            pool.append_sibling(lhs, rhs);
            return Ok(node);
        }
        Ok(lhs)
    }

    /// Expression grammar, lowest to highest precedence: `or` < `and` <
    /// `not` < relational/`in`/`notin` < `with`/`less` <
    /// union/intersect/setdiff < additive < multiplicative < `**` <
    /// unary < postfix/primary (§4.7).
    fn parse_expr(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        self.parse_or(pool)
    }

    fn parse_or(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let mut lhs = self.parse_and(pool)?;
        while self.at_reserved(self.reserved.or) {
            let pos = self.pos();
            self.bump()?;
            let rhs = self.parse_and(pool)?;
            lhs = self.binary(pool, AstKind::Or, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let mut lhs = self.parse_not(pool)?;
        while self.at_reserved(self.reserved.and) {
            let pos = self.pos();
            self.bump()?;
            let rhs = self.parse_not(pool)?;
            lhs = self.binary(pool, AstKind::And, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        if self.at_reserved(self.reserved.not) {
            let pos = self.pos();
            self.bump()?;
            let operand = self.parse_not(pool)?;
            let node = pool.alloc(AstKind::Not, pos);
            pool.set_child(node, operand);
            return Ok(node);
        }
        self.parse_relational(pool)
    }

    fn parse_relational(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let lhs = self.parse_set_ops(pool)?;
        let r = &self.reserved;
        let pos = self.pos();
        let kind = if self.at_punct(r.eq) {
            AstKind::Eq
        } else if self.at_punct(r.ne) {
            AstKind::Ne
        } else if self.at_punct(r.lt) {
            AstKind::Lt
        } else if self.at_punct(r.le) {
            AstKind::Le
        } else if self.at_punct(r.gt) {
            AstKind::Gt
        } else if self.at_punct(r.ge) {
            AstKind::Ge
        } else if self.at_reserved(r.in_) {
            AstKind::In
        } else if self.at_reserved(r.notin) {
            AstKind::NotIn
        } else {
            return Ok(lhs);
        };
        self.bump()?;
        let rhs = self.parse_set_ops(pool)?;
        Ok(self.binary(pool, kind, lhs, rhs, pos))
    }

    fn parse_set_ops(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let mut lhs = self.parse_with_less(pool)?;
        loop {
            let pos = self.pos();
            let kind = if self.at_reserved(self.reserved.union_kw) {
                AstKind::Union
            } else if self.at_reserved(self.reserved.inter_kw) {
                AstKind::Intersect
            } else if self.at_reserved(self.reserved.setdiff_kw) {
                AstKind::SetDiff
            } else {
                break;
            };
            self.bump()?;
            let rhs = self.parse_with_less(pool)?;
            lhs = self.binary(pool, kind, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_with_less(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let mut lhs = self.parse_additive(pool)?;
        loop {
            let pos = self.pos();
            let kind = if self.at_reserved(self.reserved.with_kw) {
                AstKind::With
            } else if self.at_reserved(self.reserved.less_kw) {
                AstKind::Less
            } else {
                break;
            };
            self.bump()?;
            let rhs = self.parse_additive(pool)?;
            lhs = self.binary(pool, kind, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let mut lhs = self.parse_multiplicative(pool)?;
        loop {
            let pos = self.pos();
            let kind = if self.at_punct(self.reserved.plus) {
                AstKind::Add
            } else if self.at_punct(self.reserved.dash) {
                AstKind::Sub
            } else {
                break;
            };
            self.bump()?;
            let rhs = self.parse_multiplicative(pool)?;
            lhs = self.binary(pool, kind, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let mut lhs = self.parse_exponent(pool)?;
        loop {
            let pos = self.pos();
            let kind = if self.at_punct(self.reserved.mult) {
                AstKind::Mul
            } else if self.at_punct(self.reserved.slash) {
                AstKind::Div
            } else if self.at_reserved(self.reserved.mod_kw) {
                AstKind::Mod
            } else {
                break;
            };
            self.bump()?;
            let rhs = self.parse_exponent(pool)?;
            lhs = self.binary(pool, kind, lhs, rhs, pos);
        }
        Ok(lhs)
    }

    fn parse_exponent(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let lhs = self.parse_unary(pool)?;
        if self.at_punct(self.reserved.expon) {
            let pos = self.pos();
            self.bump()?;
            let rhs = self.parse_exponent(pool)?;
            return Ok(self.binary(pool, AstKind::Exp, lhs, rhs, pos));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        if self.at_punct(self.reserved.dash) {
            let pos = self.pos();
            self.bump()?;
            let operand = self.parse_unary(pool)?;
            let node = pool.alloc(AstKind::Neg, pos);
            pool.set_child(node, operand);
            return Ok(node);
        }
        self.parse_postfix(pool)
    }

    fn binary(
        &mut self,
        pool: &mut AstPool,
        kind: AstKind,
        lhs: NodeHandle,
        rhs: NodeHandle,
        pos: (u32, u32),
    ) -> NodeHandle {
        let node = pool.alloc(kind, pos);
        pool.set_child(node, lhs);
        pool.append_sibling(lhs, rhs);
        node
    }

    /// Postfix chain: `expr(args)`, `expr[subscript]`, `expr.field`,
    /// `expr.SLOT` (§4.7, §4.8's `of`/`ofa`/`dot` rewriting happens later
    /// in the checker; the parser just records the raw shape).
    fn parse_postfix(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let mut expr = self.parse_primary(pool)?;
        loop {
            if self.at_punct(self.reserved.lparen) {
                let pos = self.pos();
                self.bump()?;
                let args = self.parse_arg_list(pool, self.reserved.rparen)?;
                self.eat_punct(self.reserved.rparen, ")")?;
                let node = pool.alloc(AstKind::Of, pos);
                pool.set_child(node, expr);
                pool.append_sibling(expr, args);
                expr = node;
                continue;
            }
            if self.at_punct(self.reserved.lbracket) {
                let pos = self.pos();
                self.bump()?;
                let args = self.parse_arg_list(pool, self.reserved.rbracket)?;
                self.eat_punct(self.reserved.rbracket, "]")?;
                let node = pool.alloc(AstKind::Ofa, pos);
                pool.set_child(node, expr);
                pool.append_sibling(expr, args);
                expr = node;
                continue;
            }
            if self.at_punct(self.reserved.dot) {
                let pos = self.pos();
                self.bump()?;
                let field = self.parse_primary(pool)?;
                let node = pool.alloc(AstKind::Dot, pos);
                pool.set_child(node, expr);
                pool.append_sibling(expr, field);
                expr = node;
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_arg_list(&mut self, pool: &mut AstPool, close: NameId) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        let list = pool.alloc(AstKind::List, pos);
        if self.at_punct(close) {
            return Ok(list);
        }
        let first = self.parse_expr(pool)?;
        pool.set_child(list, first);
        let mut tail = first;
        while self.at_punct(self.reserved.comma) {
            self.bump()?;
            let more = self.parse_expr(pool)?;
            pool.append_sibling(tail, more);
            tail = more;
        }
        Ok(list)
    }

    fn parse_primary(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        match self.lookahead.kind.clone() {
            TokenKind::IntLit(v) => {
                self.bump()?;
                let node = pool.alloc(AstKind::IntLit, pos);
                let name = self.names.intern(&v.to_string());
                pool.get_mut(node).extension = Some(name);
                Ok(node)
            }
            TokenKind::RealLit(v) => {
                self.bump()?;
                let node = pool.alloc(AstKind::RealLit, pos);
                let name = self.names.intern(&v.to_string());
                pool.get_mut(node).extension = Some(name);
                Ok(node)
            }
            TokenKind::StringLit(s) => {
                self.bump()?;
                let node = pool.alloc(AstKind::StringLit, pos);
                let name = self.names.intern(&s);
                pool.get_mut(node).extension = Some(name);
                Ok(node)
            }
            TokenKind::Id(id) => {
                self.bump()?;
                let node = pool.alloc(AstKind::Name, pos);
                pool.get_mut(node).extension = Some(id);
                Ok(node)
            }
            TokenKind::Reserved(id) if id == self.reserved.self_kw => {
                self.bump()?;
                Ok(pool.alloc(AstKind::SelfExpr, pos))
            }
            TokenKind::Reserved(id) if id == self.reserved.forall => self.parse_quantifier(pool, AstKind::Forall),
            TokenKind::Reserved(id) if id == self.reserved.exists => self.parse_quantifier(pool, AstKind::Exists),
            TokenKind::Reserved(id) if id == self.reserved.lambda => self.parse_lambda(pool),
            TokenKind::Punct(id) if id == self.reserved.lparen => {
                self.bump()?;
                let inner = self.parse_expr(pool)?;
                self.eat_punct(self.reserved.rparen, ")")?;
                Ok(inner)
            }
            TokenKind::Punct(id) if id == self.reserved.lbrace => self.parse_set_or_former(pool),
            TokenKind::Punct(id) if id == self.reserved.lbracket => self.parse_tuple_or_former(pool),
            TokenKind::Punct(id) if id == self.reserved.nelt => {
                self.bump()?;
                let operand = self.parse_unary(pool)?;
                let node = pool.alloc(AstKind::Call, pos);
                pool.get_mut(node).extension = self.names.lookup("#");
                pool.set_child(node, operand);
                Ok(node)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_quantifier(&mut self, pool: &mut AstPool, kind: AstKind) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.bump()?;
        let node = pool.alloc(kind, pos);
        let iter = self.parse_expr(pool)?;
        pool.set_child(node, iter);
        if self.at_punct(self.reserved.suchthat) {
            self.bump()?;
            let cond = self.parse_expr(pool)?;
            pool.append_sibling(iter, cond);
        }
        Ok(node)
    }

    fn parse_lambda(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_reserved(self.reserved.lambda, "LAMBDA")?;
        let node = pool.alloc(AstKind::ProcLit, pos);
        self.eat_punct(self.reserved.lparen, "(")?;
        let formals = self.parse_arg_list(pool, self.reserved.rparen)?;
        self.eat_punct(self.reserved.rparen, ")")?;
        self.eat_punct(self.reserved.semi, ";")?;
        let body = self.parse_statement_list(pool, &[self.reserved.end])?;
        self.eat_reserved(self.reserved.end, "END")?;
        self.eat_reserved(self.reserved.lambda, "LAMBDA")?;
        pool.set_child(node, formals);
        pool.append_sibling(formals, body);
        Ok(node)
    }

    /// `{ expr : bv in iter | cond }` former vs. a literal `{a, b, c}` set
    /// (§3.4 `set_former`/`SETL_SET`): the two share a lead token and are
    /// disambiguated by whether a bare `suchthat`/`IN`-bound-variable shape
    /// follows the first element.
    fn parse_set_or_former(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_punct(self.reserved.lbrace, "{")?;
        if self.at_punct(self.reserved.rbrace) {
            self.bump()?;
            return Ok(pool.alloc(AstKind::List, pos));
        }
        let first = self.parse_expr(pool)?;
        if self.at_punct(self.reserved.suchthat) {
            self.bump()?;
            let node = pool.alloc(AstKind::SetFormer, pos);
            let bound = self.parse_expr(pool)?;
            pool.set_child(node, first);
            pool.append_sibling(first, bound);
            self.eat_punct(self.reserved.rbrace, "}")?;
            return Ok(node);
        }
        let list = pool.alloc(AstKind::List, pos);
        pool.set_child(list, first);
        let mut tail = first;
        while self.at_punct(self.reserved.comma) {
            self.bump()?;
            let more = self.parse_expr(pool)?;
            pool.append_sibling(tail, more);
            tail = more;
        }
        self.eat_punct(self.reserved.rbrace, "}")?;
        Ok(list)
    }

    fn parse_tuple_or_former(&mut self, pool: &mut AstPool) -> Result<NodeHandle, ParseError> {
        let pos = self.pos();
        self.eat_punct(self.reserved.lbracket, "[")?;
        if self.at_punct(self.reserved.rbracket) {
            self.bump()?;
            return Ok(pool.alloc(AstKind::TupleFormer, pos));
        }
        let first = self.parse_expr(pool)?;
        if self.at_punct(self.reserved.suchthat) {
            self.bump()?;
            let node = pool.alloc(AstKind::TupleFormer, pos);
            let bound = self.parse_expr(pool)?;
            pool.set_child(node, first);
            pool.append_sibling(first, bound);
            self.eat_punct(self.reserved.rbracket, "]")?;
            return Ok(node);
        }
        let node = pool.alloc(AstKind::TupleFormer, pos);
        pool.set_child(node, first);
        let mut tail = first;
        while self.at_punct(self.reserved.comma) {
            self.bump()?;
            let more = self.parse_expr(pool)?;
            pool.append_sibling(tail, more);
            tail = more;
        }
        self.eat_punct(self.reserved.rbracket, "]")?;
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr_src(src: &str) -> (AstPool, NodeHandle, NameTable) {
        let (mut names, reserved) = NameTable::new();
        let mut pool = AstPool::new();
        let mut parser = Parser::new(src.as_bytes(), &mut names, reserved, 8, 4096).unwrap();
        let root = parser.parse_expr_entry(&mut pool).unwrap();
        drop(parser);
        (pool, root, names)
    }

    #[test]
    fn parses_additive_precedence() {
        let (pool, root, _names) = parse_expr_src("1 + 2 * 3");
        assert_eq!(pool.get(root).kind, AstKind::Add);
    }

    #[test]
    fn parses_assignment_statement() {
        let (mut names, reserved) = NameTable::new();
        let mut pool = AstPool::new();
        let mut parser = Parser::new(b"x := 1 + 2;", &mut names, reserved, 8, 4096).unwrap();
        let root = parser.parse_program(&mut pool).unwrap();
        let stmts = pool.siblings(pool.get(root).child);
        assert_eq!(stmts.len(), 1);
        assert_eq!(pool.get(stmts[0]).kind, AstKind::Assign);
    }

    #[test]
    fn parses_if_statement_chain() {
        let (mut names, reserved) = NameTable::new();
        let mut pool = AstPool::new();
        let mut parser =
            Parser::new(b"if a then b := 1; elseif c then b := 2; else b := 3; end if;", &mut names, reserved, 8, 4096)
                .unwrap();
        let root = parser.parse_program(&mut pool).unwrap();
        let stmts = pool.siblings(pool.get(root).child);
        assert_eq!(pool.get(stmts[0]).kind, AstKind::If);
    }

    #[test]
    fn parses_set_former() {
        let (pool, root, _names) = parse_expr_src("{x : y in s | x > 0}");
        assert_eq!(pool.get(root).kind, AstKind::SetFormer);
    }

    #[test]
    fn parses_tuple_literal() {
        let (pool, root, _names) = parse_expr_src("[1, 2, 3]");
        assert_eq!(pool.get(root).kind, AstKind::TupleFormer);
    }

    #[test]
    fn parses_call_postfix() {
        let (pool, root, _names) = parse_expr_src("f(1, 2)");
        assert_eq!(pool.get(root).kind, AstKind::Of);
    }

    #[test]
    fn parses_for_loop() {
        let (mut names, reserved) = NameTable::new();
        let mut pool = AstPool::new();
        let mut parser = Parser::new(b"for x in s loop y := x; end loop;", &mut names, reserved, 8, 4096).unwrap();
        let root = parser.parse_program(&mut pool).unwrap();
        let stmts = pool.siblings(pool.get(root).child);
        assert_eq!(pool.get(stmts[0]).kind, AstKind::For);
    }

    #[test]
    fn parses_label_and_goto_chain() {
        let (mut names, reserved) = NameTable::new();
        let mut pool = AstPool::new();
        let mut parser = Parser::new(
            b"L1: goto L2; L2: goto L3; L3: x := 1;",
            &mut names,
            reserved,
            8,
            4096,
        )
        .unwrap();
        let root = parser.parse_program(&mut pool).unwrap();
        let stmts = pool.siblings(pool.get(root).child);
        assert_eq!(stmts.len(), 3);
        for s in &stmts {
            assert_eq!(pool.get(*s).kind, AstKind::LabelDef);
        }
        let first_goto = pool.get(stmts[0]).child.unwrap();
        assert_eq!(pool.get(first_goto).kind, AstKind::Goto);
    }
}

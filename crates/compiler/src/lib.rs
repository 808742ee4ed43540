//! SETL2 Compiler: lexer, parser, semantic checker and optimizer
//!
//! Lowers SETL2 source text to a checked, label-resolved quadruple stream.
//! The pipeline is lexer -> parser -> checker -> optimizer, each stage a
//! free-standing module so it can be driven and tested independently of
//! the others; [`instance::CompilerInstance`] wires the whole thing
//! together behind the single-owner facade the native bridge talks to.
//!
//! # Modules
//!
//! - `error`: per-stage error types (`LexError`, `ParseError`, `FatalError`)
//! - `config`: `CompilerConfig`, environment-variable overrides
//! - `diagnostics`: the sorted diagnostics collector
//! - `namtab`: identifier interning and reserved-word table
//! - `symtab`: symbol table and procedure tree
//! - `ast`: AST node pool and intermediate-file (de)serialization
//! - `lexer`: tokenizer
//! - `parser`: recursive-descent parser
//! - `checker`: context-bitmask semantic pass
//! - `quadruple`: the three-address IR the optimizer consumes
//! - `optimizer`: goto-chain collapsing, dead-code elimination, label resolution
//! - `instance`: the `CompilerInstance` facade

pub mod ast;
pub mod checker;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod instance;
pub mod lexer;
pub mod namtab;
pub mod optimizer;
pub mod parser;
pub mod quadruple;
pub mod symtab;

pub use config::CompilerConfig;
pub use diagnostics::{Diagnostic, DiagnosticsCollector, Severity};
pub use error::{FatalError, LexError, ParseError};
pub use instance::CompilerInstance;

//! Compiler error types.
//!
//! One small enum per pipeline stage with a manual `Display`/`Error` impl,
//! the same shape as `setl2-runtime::error` and grounded on the teacher's
//! `codegen::error::CodeGenError`: a `Logic`-style variant for ordinary
//! failures plus a wrapped variant for the one external error type each
//! stage can produce.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A token exceeded `CompilerConfig::max_tok_len` (§4.6 `msg_token_too_long`).
    TokenTooLong { line: u32, column: u32 },
    /// An unrecognized lead character (§4.6 "Invalid lexical token").
    InvalidChar { line: u32, column: u32, ch: char },
    /// A `"`-string ran off the end of the line (§4.6).
    UnterminatedString { line: u32, column: u32 },
    /// A `\x` escape wasn't followed by two hex digits.
    InvalidEscape { line: u32, column: u32 },
    /// A `N#...#` numeric base prefix outside `[2, 36]`.
    InvalidBase { line: u32, column: u32, base: u32 },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TokenTooLong { line, column } => {
                write!(f, "[{line}:{column}] token too long")
            }
            LexError::InvalidChar { line, column, ch } => {
                write!(f, "[{line}:{column}] invalid lexical token '{ch}'")
            }
            LexError::UnterminatedString { line, column } => {
                write!(f, "[{line}:{column}] unterminated string literal")
            }
            LexError::InvalidEscape { line, column } => {
                write!(f, "[{line}:{column}] invalid escape sequence")
            }
            LexError::InvalidBase { line, column, base } => {
                write!(f, "[{line}:{column}] numeric base {base} out of range [2, 36]")
            }
        }
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnexpectedToken { line: u32, column: u32, found: String, expected: &'static str },
    Lex(LexError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { line, column, found, expected } => {
                write!(f, "[{line}:{column}] expected {expected}, found {found}")
            }
            ParseError::Lex(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

/// Conditions that abort compilation outright rather than being collected
/// as ordinary diagnostics (spec §7.4, §9's replacement for `giveup()`).
#[derive(Debug)]
pub enum FatalError {
    /// The original's `msg_malloc_error`; this rewrite has no allocator
    /// failure path of its own, but callers driving very large inputs
    /// under a caller-imposed node budget surface it here.
    OutOfMemory,
    IntermediateFile { path: PathBuf, source: std::io::Error },
    CorruptInvariant(String),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::OutOfMemory => write!(f, "out of memory"),
            FatalError::IntermediateFile { path, source } => {
                write!(f, "intermediate file {}: {source}", path.display())
            }
            FatalError::CorruptInvariant(msg) => write!(f, "corrupted internal invariant: {msg}"),
        }
    }
}

impl std::error::Error for FatalError {}

impl From<setl2_runtime::ContainerError> for FatalError {
    fn from(e: setl2_runtime::ContainerError) -> Self {
        FatalError::CorruptInvariant(e.to_string())
    }
}

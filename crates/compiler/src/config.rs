//! Compiler configuration (spec §6.1, §6.5, §9 Open Question).
//!
//! Mirrors the teacher's `compiler::config` module: a plain struct with a
//! builder-ish `with_*` API, constructible directly for tests or from
//! environment variables for the CLI.

use std::path::PathBuf;

pub const DEFAULT_TAB_WIDTH: u32 = 8;
pub const DEFAULT_MAX_TOK_LEN: usize = 4096;

/// Environment variable names from §6.5.
pub const ENV_LIBRARY_NAME: &str = "SETL2_LIBRARY";
pub const ENV_LIBRARY_PATH: &str = "SETL2_LIBPATH";
pub const ENV_TMPDIR: &str = "SETL2_TMPDIR";

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Columns per tab stop when computing file positions (§6.1).
    pub tab_width: u32,
    /// Whether an unresolved `name` node is declared implicitly in the
    /// current procedure rather than reported as undeclared (§4.8, §7.3).
    pub implicit_declarations: bool,
    /// Longest lexeme the lexer will accept before `LexError::TokenTooLong`
    /// (§4.6 `MAX_TOK_LEN`).
    pub max_tok_len: usize,
    /// Extra directories searched for library units, in order (§6.5).
    pub library_search_path: Vec<PathBuf>,
    /// Overrides the default library file name (§6.5).
    pub library_name: Option<String>,
    /// Scratch directory for the intermediate AST file of §6.2.
    pub temp_dir: PathBuf,
    /// Resolves the §9 Open Question: whether `set_to_map` accepts a
    /// length-1 tuple (producing an `Omega` range) instead of rejecting it.
    pub domain_omega_allowed: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            tab_width: DEFAULT_TAB_WIDTH,
            implicit_declarations: true,
            max_tok_len: DEFAULT_MAX_TOK_LEN,
            library_search_path: Vec::new(),
            library_name: None,
            temp_dir: std::env::temp_dir(),
            domain_omega_allowed: false,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from the environment variables of §6.5, falling
    /// back to [`CompilerConfig::default`] for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(ENV_LIBRARY_NAME) {
            config.library_name = Some(name);
        }
        if let Ok(path) = std::env::var(ENV_LIBRARY_PATH) {
            config.library_search_path = std::env::split_paths(&path).collect();
        }
        if let Ok(dir) = std::env::var(ENV_TMPDIR) {
            config.temp_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn with_tab_width(mut self, tab_width: u32) -> Self {
        self.tab_width = tab_width;
        self
    }

    pub fn with_implicit_declarations(mut self, enabled: bool) -> Self {
        self.implicit_declarations = enabled;
        self
    }

    pub fn with_max_tok_len(mut self, len: usize) -> Self {
        self.max_tok_len = len;
        self
    }

    pub fn with_domain_omega_allowed(mut self, enabled: bool) -> Self {
        self.domain_omega_allowed = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.tab_width, 8);
        assert!(config.implicit_declarations);
        assert!(!config.domain_omega_allowed);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = CompilerConfig::new()
            .with_tab_width(4)
            .with_implicit_declarations(false)
            .with_domain_omega_allowed(true);
        assert_eq!(config.tab_width, 4);
        assert!(!config.implicit_declarations);
        assert!(config.domain_omega_allowed);
    }
}

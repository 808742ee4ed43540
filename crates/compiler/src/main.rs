//! SETL2 Compiler CLI
//!
//! Thin command-line driver over [`setl2c::CompilerInstance`]: the real
//! collaborator this core hands off to is the interpreter (out of scope
//! here, per spec), so this binary exists to drive the pipeline by hand
//! against a source file and print diagnostics the way a build step would.

use clap::{Parser as ClapParser, Subcommand};
use setl2c::{CompilerConfig, CompilerInstance};
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "setl2c")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SETL2 compiler front end", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .stl file, reporting diagnostics
    Build {
        /// Input SETL2 source file
        input: PathBuf,

        /// Columns per tab stop
        #[arg(long, default_value_t = setl2c::config::DEFAULT_TAB_WIDTH)]
        tab_width: u32,

        /// Reject unresolved identifiers instead of declaring them implicitly
        #[arg(long)]
        no_implicit_declarations: bool,
    },

    /// Parse a .stl file and print its tuple-tree shape, without checking
    Parse {
        /// Input SETL2 source file
        input: PathBuf,
    },

    /// Parse a single expression passed on the command line
    ParseExpr {
        /// Expression text
        expr: String,
    },

    /// Parse and semantically check a file, reporting diagnostics only
    Check {
        /// Input SETL2 source file
        input: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, tab_width, no_implicit_declarations } => {
            run_build(&input, tab_width, no_implicit_declarations);
        }
        Commands::Parse { input } => run_parse(&input),
        Commands::ParseExpr { expr } => run_parse_expr(&expr),
        Commands::Check { input } => run_check(&input),
    }
}

fn read_source(path: &PathBuf) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error reading {}: {e}", path.display());
        process::exit(2);
    })
}

fn print_diagnostics(instance: &CompilerInstance) {
    for i in 0..instance.num_errors() as usize {
        if let Some(message) = instance.err_string(i) {
            eprintln!("{message}");
        }
    }
}

fn run_build(input: &PathBuf, tab_width: u32, no_implicit_declarations: bool) {
    let source = read_source(input);
    let config = CompilerConfig::new()
        .with_tab_width(tab_width)
        .with_implicit_declarations(!no_implicit_declarations);
    let mut instance = CompilerInstance::new(config);
    let exit_code = instance.compile(&source);
    if exit_code != 0 {
        print_diagnostics(&instance);
    } else {
        println!("{}: no errors", input.display());
    }
    process::exit(exit_code);
}

fn run_parse(input: &PathBuf) {
    let source = read_source(input);
    let mut instance = CompilerInstance::new(CompilerConfig::default());
    let tree = instance.parse(&source);
    if tree.is_omega() {
        print_diagnostics(&instance);
        process::exit(1);
    }
    println!("{tree:?}");
}

fn run_parse_expr(expr: &str) {
    let mut instance = CompilerInstance::new(CompilerConfig::default());
    let tree = instance.parse_expr(expr);
    if tree.is_omega() {
        print_diagnostics(&instance);
        process::exit(1);
    }
    println!("{tree:?}");
}

fn run_check(input: &PathBuf) {
    let source = read_source(input);
    let mut instance = CompilerInstance::new(CompilerConfig::default());
    instance.compile_fragment(&source);
    print_diagnostics(&instance);
    process::exit(if instance.num_errors() > 0 { 1 } else { 0 });
}

//! End-to-end tests driving [`setl2c::CompilerInstance`] the way the CLI
//! and a native bridge both would: source text in, exit code or tuple tree
//! out, with no access to any stage's internals.

use setl2c::{CompilerConfig, CompilerInstance};
use setl2_runtime::Specifier;

#[test]
fn clean_program_compiles_with_no_diagnostics() {
    let mut instance = CompilerInstance::new(CompilerConfig::default());
    let code = instance.compile("x := 1; y := x + 2; L1: goto L2; L2: x := y;");
    assert_eq!(code, 0);
    assert_eq!(instance.num_errors(), 0);
}

#[test]
fn undeclared_identifier_is_rejected_when_implicit_declarations_are_off() {
    let config = CompilerConfig::default().with_implicit_declarations(false);
    let mut instance = CompilerInstance::new(config);
    let code = instance.compile("y := x;");
    assert_eq!(code, 1);
    assert_eq!(instance.num_errors(), 1);
    assert!(instance.err_string(0).unwrap().contains("undeclared identifier 'x'"));
}

#[test]
fn goto_to_undefined_label_is_reported_through_the_facade() {
    let mut instance = CompilerInstance::new(CompilerConfig::default());
    let code = instance.compile("goto nowhere;");
    assert_eq!(code, 1);
    assert!(instance.err_string(0).unwrap().contains("undefined label 'nowhere'"));
}

#[test]
fn duplicate_case_label_is_reported_through_the_facade() {
    let mut instance = CompilerInstance::new(CompilerConfig::default());
    let source = "case x when 1 : y := 1; when 1 : y := 2; end case;";
    let code = instance.compile(source);
    assert_eq!(code, 1);
    assert!(instance.err_string(0).unwrap().contains("duplicate case label"));
}

#[test]
fn parse_tree_of_an_assignment_has_the_expected_shape() {
    let mut instance = CompilerInstance::new(CompilerConfig::default());
    let tree = instance.parse("x := 1;");
    let Specifier::Tuple(root) = tree else {
        panic!("expected a tuple tree");
    };
    let components = root.borrow().components().to_vec();
    assert_eq!(components.len(), 4);
    let Specifier::Str(kind) = &components[0] else {
        panic!("first element should be the node kind name");
    };
    assert_eq!(kind.0.as_str(), "assign");
}

#[test]
fn compile_fragment_accumulates_diagnostics_across_calls() {
    let mut instance = CompilerInstance::new(CompilerConfig::default().with_implicit_declarations(false));
    let first = instance.compile_fragment("x := 1;");
    assert!(matches!(first, Specifier::Short(0)));
    assert_eq!(instance.num_errors(), 0);

    let second = instance.compile_fragment("z := w;");
    assert!(matches!(second, Specifier::Omega));
    assert_eq!(instance.num_errors(), 1);

    // A later successful fragment does not clear the errors already
    // accumulated by the running session.
    let third = instance.compile_fragment("x := x + 1;");
    assert!(matches!(third, Specifier::Short(0)));
    assert_eq!(instance.num_errors(), 1);
}

#[test]
fn syntax_error_reports_a_parse_diagnostic_not_a_panic() {
    let mut instance = CompilerInstance::new(CompilerConfig::default());
    let code = instance.compile("x := ;");
    assert_eq!(code, 1);
    assert!(instance.num_errors() > 0);
}

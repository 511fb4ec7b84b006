// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn string(s: &str) -> Expr {
    Expr::Str(s.to_string())
}

fn only_call(program: &Program) -> &Call {
    match &program.statements[..] {
        [Statement {
            kind: StatementKind::Call(call),
            ..
        }] => call,
        other => panic!("Expected a single call, got: {:?}", other),
    }
}

#[rstest]
fn test_parse_simple_call() {
    let program = parse("setenv(\"SALAMI\", '/opt/1')\n").unwrap();
    let call = only_call(&program);
    assert_eq!(call.name, "setenv");
    assert_eq!(call.args, vec![string("SALAMI"), string("/opt/1")]);
    assert!(call.kwargs.is_empty());
}

#[rstest]
fn test_parse_keyword_arguments() {
    let program = parse("prereq(\"gcc\", fallback=\"gcc/9.1\")").unwrap();
    let call = only_call(&program);
    assert_eq!(call.args, vec![string("gcc")]);
    assert_eq!(
        call.kwargs,
        vec![("fallback".to_string(), string("gcc/9.1"))]
    );
}

#[rstest]
fn test_positional_after_keyword_is_rejected() {
    let err = parse("prereq(fallback=\"a\", \"b\")").unwrap_err();
    assert_eq!(err.line, 1);
}

#[rstest]
fn test_comments_and_blank_lines_are_ignored() {
    let source = "# a comment\n\n\"Module docs.\"\nsetenv(\"A\", \"#not a comment\")  # trailing\n";
    let program = parse(source).unwrap();
    assert_eq!(program.statements.len(), 2);
    assert_eq!(program.statements[0].kind, StatementKind::Pass);
    match &program.statements[1].kind {
        StatementKind::Call(call) => assert_eq!(call.args[1], string("#not a comment")),
        other => panic!("Expected call, got: {:?}", other),
    }
    assert_eq!(program.statements[1].line, 4);
}

#[rstest]
fn test_bracket_continuation_spans_lines() {
    let source = "prepend_path(\n    \"PATH\",\n    [\"/a\", \"/b\",],\n)\nsetenv(\"X\", \"1\")\n";
    let program = parse(source).unwrap();
    assert_eq!(program.statements.len(), 2);
    match &program.statements[0].kind {
        StatementKind::Call(call) => {
            assert_eq!(call.args[1], Expr::List(vec![string("/a"), string("/b")]))
        }
        other => panic!("Expected call, got: {:?}", other),
    }
    assert_eq!(program.statements[1].line, 5);
}

#[rstest]
fn test_string_escapes() {
    let program = parse(r#"setenv("A", "tab\there \"q\" \d")"#).unwrap();
    let call = only_call(&program);
    assert_eq!(call.args[1], string("tab\there \"q\" \\d"));
}

#[rstest]
fn test_assignment_and_concatenation() {
    let program = parse("root = \"/opt/\" + version\n").unwrap();
    assert_eq!(
        program.statements[0].kind,
        StatementKind::Assign {
            name: "root".to_string(),
            value: Expr::Concat(
                Box::new(string("/opt/")),
                Box::new(Expr::Name("version".to_string()))
            ),
        }
    );
}

#[rstest]
fn test_if_elif_else_blocks() {
    let source = "\
if platform == \"darwin\":
    setenv(\"OS\", \"mac\")
elif platform != \"linux\" and not False:
    setenv(\"OS\", \"other\")
else:
    setenv(\"OS\", \"linux\")
    pass
setenv(\"DONE\", \"1\")
";
    let program = parse(source).unwrap();
    assert_eq!(program.statements.len(), 2);
    match &program.statements[0].kind {
        StatementKind::If {
            branches,
            otherwise,
        } => {
            assert_eq!(branches.len(), 2);
            assert!(matches!(branches[0].0, Expr::Compare(CompareOp::Eq, _, _)));
            assert!(matches!(branches[1].0, Expr::And(_, _)));
            assert_eq!(otherwise.len(), 2);
            assert_eq!(otherwise[0].line, 6);
        }
        other => panic!("Expected if statement, got: {:?}", other),
    }
    assert_eq!(program.statements[1].line, 8);
}

#[rstest]
fn test_nested_blocks() {
    let source = "\
if exists(\"/opt\"):
    if \"a\" in [\"a\", \"b\"]:
        setenv(\"A\", \"1\")
    setenv(\"B\", \"1\")
";
    let program = parse(source).unwrap();
    match &program.statements[0].kind {
        StatementKind::If { branches, .. } => {
            assert_eq!(branches[0].1.len(), 2);
            assert!(matches!(
                branches[0].1[0].kind,
                StatementKind::If { .. }
            ));
        }
        other => panic!("Expected if statement, got: {:?}", other),
    }
}

#[rstest]
#[case::unexpected_indent("setenv(\"A\", \"1\")\n    setenv(\"B\", \"2\")\n", 2)]
#[case::missing_block("if True:\nsetenv(\"A\", \"1\")\n", 1)]
#[case::dangling_else("else:\n    pass\n", 1)]
#[case::unterminated_string("pass\nsetenv(\"A, \"1\")\n", 2)]
#[case::unclosed_bracket("pass\nsetenv(\"A\",\n", 2)]
#[case::unmatched_bracket("pass\n)\n", 2)]
#[case::not_a_statement("1 + 2\n", 1)]
#[case::arbitrary_code("import os\n", 1)]
fn test_syntax_errors_report_line(#[case] source: &str, #[case] line: usize) {
    let err = parse(source).unwrap_err();
    assert_eq!(err.line, line, "{}", err.message);
}

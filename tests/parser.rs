//! Tests for the parser
//!
//! These tests verify that source is parsed into the expected AST shapes and that
//! the language-version gate rejects constructs with a diagnostic.

use jsrun::ast::{Expression, ForInit, Program, Statement};
use jsrun::config::{LanguageVersion, ParseOptions};
use jsrun::parser::Parser;
use jsrun::string_dict::StringDict;
use jsrun::{JsError, Runtime};

fn options(language_version: LanguageVersion) -> ParseOptions {
    ParseOptions {
        language_version,
        record_comments: false,
    }
}

#[allow(clippy::unwrap_used)]
fn parse(source: &str) -> Program {
    let mut dict = StringDict::new();
    Parser::new(source, &mut dict, ParseOptions::default())
        .parse_program()
        .unwrap()
}

fn parse_err(source: &str, version: LanguageVersion) -> String {
    let mut dict = StringDict::new();
    match Parser::new(source, &mut dict, options(version)).parse_program() {
        Ok(_) => String::from("parsed"),
        Err(e) => e.to_string(),
    }
}

#[test]
fn test_statement_kinds() {
    let prog = parse("var a = 1; function f() {} class C {} if (a) {} label: for (;;) break label;");
    assert_eq!(prog.body.len(), 5);
    assert!(matches!(prog.body.first(), Some(Statement::VariableDeclaration(_))));
    assert!(matches!(prog.body.get(1), Some(Statement::FunctionDeclaration(_))));
    assert!(matches!(prog.body.get(2), Some(Statement::ClassDeclaration(_))));
    assert!(matches!(prog.body.get(3), Some(Statement::If(_))));
    assert!(matches!(prog.body.get(4), Some(Statement::Labeled(_))));
}

#[test]
fn test_degenerate_for_initializers() {
    for source in ["for (;;) { break; }", "for (; false;) {}", "for (var i = 0;;) { break; }"] {
        let prog = parse(source);
        assert!(matches!(prog.body.first(), Some(Statement::For(_))), "{}", source);
    }
    let prog = parse("for (;;) break;");
    let Some(Statement::For(stmt)) = prog.body.first() else {
        panic!("expected a for statement");
    };
    assert!(stmt.init.is_none() && stmt.test.is_none() && stmt.update.is_none());

    let prog = parse("for (i = 0; i < 1; i++) {}");
    let Some(Statement::For(stmt)) = prog.body.first() else {
        panic!("expected a for statement");
    };
    assert!(matches!(stmt.init, Some(ForInit::Expression(_))));
}

#[test]
fn test_tagged_template_keeps_raw_segments() {
    let prog = parse(r"tag`a\n${1}b`;");
    let Some(Statement::Expression(stmt)) = prog.body.first() else {
        panic!("expected an expression statement");
    };
    let Expression::TaggedTemplate(tagged) = stmt.expression.as_ref() else {
        panic!("expected a tagged template");
    };
    let raws: Vec<&str> = tagged.quasi.quasis.iter().map(|q| q.raw.as_str()).collect();
    assert_eq!(raws, vec![r"a\n", "b"]);
    assert_eq!(tagged.quasi.expressions.len(), 1);
}

#[test]
fn test_use_strict_directive() {
    assert!(parse("'use strict'; var a;").strict);
    assert!(!parse("var a; 'use strict';").strict);
}

#[test]
fn test_version_gates_name_the_construct() {
    assert!(parse_err("let x = 1;", LanguageVersion::Es5).contains("not supported in ES5"));
    assert_eq!(parse_err("let x = 2 ** 3;", LanguageVersion::Es2016), "parsed");
    assert!(parse_err("let x = 2 ** 3;", LanguageVersion::Es2015).contains("requires ES2016"));
    assert!(parse_err("a?.b;", LanguageVersion::Es2018).contains("requires ES2020"));
    assert!(parse_err("a ||= b;", LanguageVersion::Es2020).contains("not supported in ES2020"));
    assert_eq!(parse_err("a ||= b;", LanguageVersion::Latest), "parsed");
}

#[test]
fn test_object_rest_is_rejected_below_es2018() {
    let message = parse_err("var {a, ...rest} = {};", LanguageVersion::Es2017);
    assert!(message.contains("object rest properties not supported"), "{}", message);
}

#[test]
fn test_syntax_error_carries_source_name_and_line() {
    let mut runtime = Runtime::new();
    let err = runtime.compile("var ok = 1;\nvar = 2;", "broken.js", 5).err();
    match err {
        Some(JsError::SyntaxError { location, .. }) => {
            assert_eq!(location.source_name.as_deref(), Some("broken.js"));
            assert_eq!(location.line, 6);
        }
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

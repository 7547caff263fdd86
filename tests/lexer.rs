//! Tests for the lexer
//!
//! These tests drive the lexer through its public API the way the parser does.

use jsrun::JsString;
use jsrun::lexer::{Lexer, TemplatePart, TokenKind};
use jsrun::string_dict::StringDict;

fn s(value: &str) -> JsString {
    JsString::from(value)
}

fn lex(source: &str) -> Vec<TokenKind> {
    let mut dict = StringDict::new();
    let mut lexer = Lexer::new(source, &mut dict);
    let mut tokens = vec![];
    loop {
        let token = lexer.next_token();
        if token.kind == TokenKind::Eof {
            break;
        }
        tokens.push(token.kind);
    }
    tokens
}

#[test]
fn test_keywords_and_identifiers() {
    assert_eq!(
        lex("let yieldx = function"),
        vec![
            TokenKind::Let,
            TokenKind::Identifier(s("yieldx")),
            TokenKind::Eq,
            TokenKind::Function,
        ]
    );
}

#[test]
fn test_unicode_identifiers() {
    assert_eq!(
        lex("café $_ ünïcode"),
        vec![
            TokenKind::Identifier(s("café")),
            TokenKind::Identifier(s("$_")),
            TokenKind::Identifier(s("ünïcode")),
        ]
    );
}

#[test]
fn test_compound_operators() {
    assert_eq!(
        lex("a ??= b >>>= c ** d"),
        vec![
            TokenKind::Identifier(s("a")),
            TokenKind::QuestionQuestionEq,
            TokenKind::Identifier(s("b")),
            TokenKind::GtGtGtEq,
            TokenKind::Identifier(s("c")),
            TokenKind::StarStar,
            TokenKind::Identifier(s("d")),
        ]
    );
    assert_eq!(lex("=== !== =>"), vec![TokenKind::EqEqEq, TokenKind::BangEqEq, TokenKind::Arrow]);
}

#[test]
fn test_number_forms() {
    assert_eq!(lex("0b101"), vec![TokenKind::Number(5.0)]);
    assert_eq!(lex("0o17"), vec![TokenKind::Number(15.0)]);
    assert_eq!(lex("1.5e-3"), vec![TokenKind::Number(1.5e-3)]);
}

#[test]
fn test_spans_track_lines_and_columns() {
    let mut dict = StringDict::new();
    let mut lexer = Lexer::new("a\n  bc", &mut dict);
    let first = lexer.next_token();
    assert_eq!((first.span.line, first.span.column), (1, 1));
    let second = lexer.next_token();
    assert_eq!((second.span.line, second.span.column), (2, 3));
    assert!(lexer.had_newline_before());
}

#[test]
fn test_template_head_then_continuation() {
    let mut dict = StringDict::new();
    let mut lexer = Lexer::new("`Hello ${name}!`", &mut dict);
    assert_eq!(
        lexer.next_token().kind,
        TokenKind::TemplateHead(TemplatePart {
            cooked: Some(s("Hello ")),
            raw: s("Hello "),
        })
    );
    assert_eq!(lexer.next_token().kind, TokenKind::Identifier(s("name")));
    let rbrace = lexer.next_token();
    assert_eq!(rbrace.kind, TokenKind::RBrace);
    assert_eq!(
        lexer.rescan_template_continuation(rbrace.span).kind,
        TokenKind::TemplateTail(TemplatePart {
            cooked: Some(s("!")),
            raw: s("!"),
        })
    );
}

#[test]
fn test_unterminated_template() {
    assert!(matches!(lex("`abc").as_slice(), [TokenKind::Unterminated(_)]));
}

#[test]
fn test_slash_is_division_until_rescanned() {
    let mut dict = StringDict::new();
    let mut lexer = Lexer::new("/ab+c/g", &mut dict);
    let slash = lexer.next_token();
    assert_eq!(slash.kind, TokenKind::Slash);
    assert_eq!(
        lexer.rescan_as_regexp(slash.span).kind,
        TokenKind::RegExp("ab+c".to_string(), "g".to_string())
    );
}

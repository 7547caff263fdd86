//! JSON.parse and JSON.stringify

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_parse_values() {
    assert_eq!(eval("JSON.parse('42')"), JsValue::Number(42.0));
    assert_eq!(eval("JSON.parse('\"hi\"')"), s("hi"));
    assert_eq!(eval("JSON.parse('null')"), JsValue::Null);
    assert_eq!(eval("JSON.parse('[1, [2, 3]]')[1][1]"), JsValue::Number(3.0));
    assert_eq!(eval("var o = JSON.parse('{\"a\": {\"b\": true}}'); o.a.b"), JsValue::Boolean(true));
}

#[test]
fn test_parse_numbers_from_text() {
    assert_eq!(eval("JSON.parse('1e400')"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("JSON.parse('[-1e400]')[0]"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("JSON.parse('0.1') + JSON.parse('0.2')"), JsValue::Number(0.1 + 0.2));
    assert_eq!(eval("1 / JSON.parse('-0')"), JsValue::Number(f64::NEG_INFINITY));
    assert_eq!(eval("JSON.parse('12345678901234567890')"), JsValue::Number(12345678901234567890.0));
}

#[test]
fn test_parse_lone_surrogates() {
    assert_eq!(eval(r#"JSON.parse('"\\ud800x"')"#), s("\u{FFFD}x"));
    assert_eq!(eval(r#"JSON.parse('"a\\udc00"')"#), s("a\u{FFFD}"));
    assert_eq!(eval(r#"JSON.parse('"\\ud83d\\ude00"')"#), s("\u{1F600}"));
    assert_eq!(eval(r#"JSON.parse('"\\\\ud800"')"#), s("\\ud800"));
}

#[test]
fn test_parse_keeps_member_order() {
    assert_eq!(
        eval("Object.keys(JSON.parse('{\"z\": 1, \"a\": 2, \"m\": 3}')).join()"),
        s("z,a,m")
    );
}

#[test]
fn test_parse_errors() {
    assert!(throws_error("JSON.parse('{a: 1}')", "SyntaxError"));
    assert!(throws_error("JSON.parse('[1,]')", "SyntaxError"));
    assert!(throws_error("JSON.parse('')", "SyntaxError"));
}

#[test]
fn test_parse_reviver() {
    assert_eq!(
        eval("JSON.stringify(JSON.parse('{\"a\": 1, \"b\": [2, 3]}', (k, v) => typeof v === 'number' ? v * 10 : v))"),
        s("{\"a\":10,\"b\":[20,30]}")
    );
    assert_eq!(
        eval("var o = JSON.parse('{\"keep\": 1, \"drop\": 2}', (k, v) => k === 'drop' ? undefined : v); Object.keys(o).join()"),
        s("keep")
    );
}

#[test]
fn test_stringify_basics() {
    assert_eq!(eval("JSON.stringify({a: 1, b: 'two', c: [true, null]})"), s("{\"a\":1,\"b\":\"two\",\"c\":[true,null]}"));
    assert_eq!(eval("JSON.stringify('quote\"and\\nnewline')"), s("\"quote\\\"and\\nnewline\""));
    assert_eq!(eval("JSON.stringify([NaN, Infinity, -0])"), s("[null,null,0]"));
    assert_eq!(eval("JSON.stringify(undefined)"), JsValue::Undefined);
    assert_eq!(eval("JSON.stringify(function () {})"), JsValue::Undefined);
}

#[test]
fn test_stringify_skips_unserializable_members() {
    assert_eq!(eval("JSON.stringify({a: undefined, b: () => 1, c: Symbol('s'), d: 1})"), s("{\"d\":1}"));
    assert_eq!(eval("JSON.stringify([undefined, () => 1])"), s("[null,null]"));
}

#[test]
fn test_stringify_indent() {
    assert_eq!(eval("JSON.stringify({a: [1]}, null, 2)"), s("{\n  \"a\": [\n    1\n  ]\n}"));
    assert_eq!(eval("JSON.stringify([1, 2], null, '--')"), s("[\n--1,\n--2\n]"));
    assert_eq!(eval("JSON.stringify({}, null, 4) + JSON.stringify([], null, 4)"), s("{}[]"));
}

#[test]
fn test_stringify_replacers() {
    assert_eq!(eval("JSON.stringify({a: 1, b: 2, c: 3}, ['c', 'a'])"), s("{\"c\":3,\"a\":1}"));
    assert_eq!(
        eval("JSON.stringify({a: 1, b: 'x'}, (k, v) => typeof v === 'number' ? v + 1 : v)"),
        s("{\"a\":2,\"b\":\"x\"}")
    );
}

#[test]
fn test_stringify_to_json_and_wrappers() {
    assert_eq!(eval("JSON.stringify({toJSON() { return 'custom'; }})"), s("\"custom\""));
    assert_eq!(eval("JSON.stringify({v: {toJSON(key) { return key; }}})"), s("{\"v\":\"v\"}"));
    assert_eq!(eval("JSON.stringify([new Number(1), new String('s'), new Boolean(false)])"), s("[1,\"s\",false]"));
}

#[test]
fn test_stringify_cycles() {
    assert!(throws_error("var o = {}; o.self = o; JSON.stringify(o)", "Converting circular structure to JSON"));
    assert_eq!(eval("var shared = {}; JSON.stringify([shared, shared])"), s("[{},{}]"));
}

#[test]
fn test_stringify_nesting_limit() {
    assert!(throws_error(
        "var o = {}; for (var i = 0; i < 20000; i++) { o = {a: o}; } JSON.stringify(o)",
        "RangeError: Maximum call stack size exceeded"
    ));
    assert_eq!(
        eval("var o = 1; for (var i = 0; i < 100; i++) { o = [o]; } JSON.stringify(o).length"),
        JsValue::Number(201.0)
    );
}

#[test]
fn test_stringify_lone_surrogate_is_replaced() {
    assert_eq!(eval(r#"JSON.stringify('\ud800')"#), s("\"\u{FFFD}\""));
    assert_eq!(eval("String.fromCharCode(0xD800) === '\\uFFFD'"), JsValue::Boolean(true));
    assert_eq!(eval(r#"JSON.stringify('😀')"#), s("\"\u{1F600}\""));
}

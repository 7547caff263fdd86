//! Strings: UTF-16 semantics and String.prototype methods

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_utf16_length_and_indexing() {
    assert_eq!(eval("'héllo'.length"), JsValue::Number(5.0));
    assert_eq!(eval("'😀'.length"), JsValue::Number(2.0));
    assert_eq!(eval("'😀'.charCodeAt(0)"), JsValue::Number(55357.0));
    assert_eq!(eval("'😀'.codePointAt(0)"), JsValue::Number(128512.0));
    assert_eq!(eval("[...'a😀'].length"), JsValue::Number(2.0));
    assert_eq!(eval("'abc'[1] + 'abc'.charAt(2) + 'abc'.at(-3)"), s("bca"));
    assert_eq!(eval("'abc'[5]"), JsValue::Undefined);
    assert_eq!(eval("String.fromCharCode(72, 105) + String.fromCodePoint(128512)"), s("Hi😀"));
}

#[test]
fn test_search_methods() {
    assert_eq!(eval("'hello world'.indexOf('o') + ',' + 'hello world'.lastIndexOf('o')"), s("4,7"));
    assert_eq!(eval("'hello'.indexOf('l', 3)"), JsValue::Number(3.0));
    assert_eq!(eval("'hello'.includes('ell') + ',' + 'hello'.startsWith('he') + ',' + 'hello'.endsWith('lo')"), s("true,true,true"));
    assert_eq!(eval("'hello'.startsWith('l', 2)"), JsValue::Boolean(true));
}

#[test]
fn test_extraction() {
    assert_eq!(eval("'hello'.slice(1, -1)"), s("ell"));
    assert_eq!(eval("'hello'.substring(3, 1)"), s("el"));
    assert_eq!(eval("'hello'.substr(-3, 2)"), s("ll"));
    assert_eq!(eval("'a,b,,c'.split(',').length"), JsValue::Number(4.0));
    assert_eq!(eval("'abc'.split('').join('-')"), s("a-b-c"));
    assert_eq!(eval("'a b c'.split(' ', 2).join()"), s("a,b"));
    assert_eq!(eval("'abc'.split().length"), JsValue::Number(1.0));
}

#[test]
fn test_transformation() {
    assert_eq!(eval("'Hello'.toUpperCase() + 'Hello'.toLowerCase()"), s("HELLOhello"));
    assert_eq!(eval("'  pad  '.trim() + '|' + '  pad'.trimStart() + '|' + 'pad  '.trimEnd()"), s("pad|pad|pad"));
    assert_eq!(eval("'ab'.repeat(3)"), s("ababab"));
    assert!(throws_error("'ab'.repeat(-1)", "RangeError"));
    assert_eq!(eval("'5'.padStart(3, '0') + '|' + 'x'.padEnd(4, 'ab')"), s("005|xaba"));
    assert_eq!(eval("'a'.concat(1, null)"), s("a1null"));
}

#[test]
fn test_replace_with_strings() {
    assert_eq!(eval("'aaa'.replace('a', 'b')"), s("baa"));
    assert_eq!(eval("'aaa'.replaceAll('a', 'b')"), s("bbb"));
    assert_eq!(eval("'price: 5'.replace('5', '$$$&')"), s("price: $5"));
    assert_eq!(eval("'abc'.replace('b', (m, offset) => m.toUpperCase() + offset)"), s("aB1c"));
}

#[test]
fn test_string_objects_and_coercion() {
    assert_eq!(eval("typeof new String('x') + ',' + typeof String('x')"), s("object,string"));
    assert_eq!(eval("new String('abc').length"), JsValue::Number(3.0));
    assert_eq!(eval("String(null) + String(undefined) + String(12.5) + String(true)"), s("nullundefined12.5true"));
    assert_eq!(eval("String(Symbol('x'))"), s("Symbol(x)"));
    assert_eq!(eval("'b' > 'a' && 'B' < 'a' && '10' < '9'"), JsValue::Boolean(true));
    assert_eq!(eval("var str = 'abc'; str.length = 1; str.length"), JsValue::Number(3.0));
}

#[test]
fn test_string_raw() {
    assert_eq!(eval("String.raw({raw: ['a', 'b', 'c']}, 1, 2)"), s("a1b2c"));
}

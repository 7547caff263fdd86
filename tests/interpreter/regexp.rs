//! Regular expressions, backed by the `regex` feature
#![cfg(feature = "regex")]

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_literal_properties() {
    assert_eq!(
        eval("var re = /ab+c/gi; [re.source, re.flags, re.global, re.ignoreCase, re.lastIndex].join()"),
        s("ab+c,gi,true,true,0")
    );
    assert_eq!(eval("String(/a\\/b/m)"), s("/a\\/b/m"));
    assert_eq!(eval("/x/ instanceof RegExp"), JsValue::Boolean(true));
}

#[test]
fn test_literal_creates_fresh_object_each_evaluation() {
    assert_eq!(
        eval("function f() { return /a/g; } var a = f(), b = f(); a.lastIndex = 3; (a !== b) + ':' + b.lastIndex"),
        s("true:0")
    );
}

#[test]
fn test_test_and_exec() {
    assert_eq!(eval("/^\\d+$/.test('12345') + ',' + /^\\d+$/.test('12a')"), s("true,false"));
    assert_eq!(
        eval("var m = /(\\w+)@(\\w+)\\.com/.exec('mail bob@example.com now'); [m[0], m[1], m[2], m.index].join()"),
        s("bob@example.com,bob,example,5")
    );
    assert_eq!(eval("/z/.exec('abc')"), JsValue::Null);
    assert_eq!(eval("/ABC/i.test('xabcx')"), JsValue::Boolean(true));
}

#[test]
fn test_global_exec_advances_last_index() {
    assert_eq!(
        eval("var re = /o/g, str = 'foo boo', out = []; var m; while ((m = re.exec(str)) !== null) out.push(m.index); out.join() + ':' + re.lastIndex"),
        s("1,2,5,6:0")
    );
}

#[test]
fn test_string_methods_accept_regexps() {
    assert_eq!(eval("'a1b22c333'.match(/\\d+/g).join()"), s("1,22,333"));
    assert_eq!(eval("'abc'.match(/(b)(c)/).slice(1).join()"), s("b,c"));
    assert_eq!(eval("'abc'.match(/x/g)"), JsValue::Null);
    assert_eq!(eval("'2024-01-15'.replace(/(\\d+)-(\\d+)-(\\d+)/, '$3/$2/$1')"), s("15/01/2024"));
    assert_eq!(eval("'aXbXc'.replace(/x/gi, '-')"), s("a-b-c"));
    assert_eq!(eval("'one two'.replace(/\\w+/g, w => w.length)"), s("3 3"));
    assert_eq!(eval("'a1b2c'.split(/\\d/).join()"), s("a,b,c"));
    assert_eq!(eval("'hello'.search(/l+/)"), JsValue::Number(2.0));
}

#[test]
fn test_offsets_are_utf16() {
    assert_eq!(eval("/b/.exec('😀b').index"), JsValue::Number(2.0));
}

#[test]
fn test_constructor() {
    assert_eq!(eval("new RegExp('a+', 'g').flags"), s("g"));
    assert_eq!(eval("new RegExp(/x/i).flags"), s("i"));
    assert_eq!(eval("RegExp('\\\\d').test('7')"), JsValue::Boolean(true));
    assert!(throws_error("new RegExp('a', 'gg')", "Invalid regular expression flags"));
    assert!(throws_error("new RegExp('(')", "Invalid regular expression"));
}

//! Expressions, operators, bindings and scoping

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_arithmetic_and_precedence() {
    assert_eq!(eval("1 + 2 * 3"), JsValue::Number(7.0));
    assert_eq!(eval("(1 + 2) * 3"), JsValue::Number(9.0));
    assert_eq!(eval("2 ** 3 ** 2"), JsValue::Number(512.0));
    assert_eq!(eval("-7 % 3"), JsValue::Number(-1.0));
    assert_eq!(eval("1 / 0"), JsValue::Number(f64::INFINITY));
}

#[test]
fn test_string_concatenation_and_coercion() {
    assert_eq!(eval("'a' + 1 + 2"), s("a12"));
    assert_eq!(eval("1 + 2 + 'a'"), s("3a"));
    assert_eq!(eval("'3' * '4'"), JsValue::Number(12.0));
    assert_eq!(eval("[1, 2] + ''"), s("1,2"));
    assert_eq!(eval("({}) + ''"), s("[object Object]"));
}

#[test]
fn test_equality() {
    assert_eq!(eval("null == undefined"), JsValue::Boolean(true));
    assert_eq!(eval("null === undefined"), JsValue::Boolean(false));
    assert_eq!(eval("'1' == 1"), JsValue::Boolean(true));
    assert_eq!(eval("NaN === NaN"), JsValue::Boolean(false));
    assert_eq!(eval("[NaN].includes(NaN)"), JsValue::Boolean(true));
}

#[test]
fn test_typeof() {
    assert_eq!(eval("typeof 1"), s("number"));
    assert_eq!(eval("typeof 'x'"), s("string"));
    assert_eq!(eval("typeof null"), s("object"));
    assert_eq!(eval("typeof function() {}"), s("function"));
    assert_eq!(eval("typeof Symbol()"), s("symbol"));
    assert_eq!(eval("typeof notDeclaredAnywhere"), s("undefined"));
}

#[test]
fn test_bitwise_operators() {
    assert_eq!(eval("5 & 3"), JsValue::Number(1.0));
    assert_eq!(eval("5 | 3"), JsValue::Number(7.0));
    assert_eq!(eval("~5"), JsValue::Number(-6.0));
    assert_eq!(eval("-1 >>> 28"), JsValue::Number(15.0));
    assert_eq!(eval("1 << 31"), JsValue::Number(-2147483648.0));
}

#[test]
fn test_update_and_compound_assignment() {
    assert_eq!(eval("var i = 1; var j = i++; i * 10 + j"), JsValue::Number(21.0));
    assert_eq!(eval("var i = 1; ++i + ++i"), JsValue::Number(5.0));
    assert_eq!(eval("var o = {n: 2}; o.n **= 3; o.n"), JsValue::Number(8.0));
}

#[test]
fn test_logical_and_nullish() {
    assert_eq!(eval("0 || 'fallback'"), s("fallback"));
    assert_eq!(eval("0 ?? 'fallback'"), JsValue::Number(0.0));
    assert_eq!(eval("null ?? 'fallback'"), s("fallback"));
    assert_eq!(eval("var a = null; a ??= 5; a"), JsValue::Number(5.0));
    assert_eq!(eval("var b = 1; b &&= 7; b"), JsValue::Number(7.0));
    assert_eq!(eval("var c = 0; c ||= 9; c"), JsValue::Number(9.0));
}

#[test]
fn test_optional_chaining() {
    assert_eq!(eval("var o = null; o?.a.b.c"), JsValue::Undefined);
    assert_eq!(eval("var o = {a: {b: 2}}; o?.a?.b"), JsValue::Number(2.0));
    assert_eq!(eval("var o = {}; o.f?.()"), JsValue::Undefined);
    assert_eq!(eval("var o = {f() { return this.v; }, v: 3}; o.f?.()"), JsValue::Number(3.0));
}

#[test]
fn test_var_hoisting_and_function_declarations() {
    assert_eq!(eval("var r = typeof f; function f() {} r"), s("function"));
    assert_eq!(eval("var r = x; var x = 1; r"), JsValue::Undefined);
}

#[test]
fn test_block_scoping() {
    assert_eq!(eval("let x = 1; { let x = 2; } x"), JsValue::Number(1.0));
    assert!(throws_error("{ x; let x = 1; }", "before initialization"));
    assert!(throws_error("const c = 1; c = 2;", "Assignment to constant variable"));
}

#[test]
fn test_closures_capture_bindings() {
    assert_eq!(
        eval(
            "function counter() { let n = 0; return function() { return ++n; }; }
             var c = counter(); c(); c(); c()"
        ),
        JsValue::Number(3.0)
    );
    assert_eq!(
        eval("var fs = []; for (let i = 0; i < 3; i++) fs.push(() => i); fs.map(f => f()).join()"),
        s("0,1,2")
    );
    assert_eq!(
        eval("var fs = []; for (var i = 0; i < 3; i++) fs.push(() => i); fs.map(f => f()).join()"),
        s("3,3,3")
    );
}

#[test]
fn test_comma_void_delete_in() {
    assert_eq!(eval("(1, 2, 3)"), JsValue::Number(3.0));
    assert_eq!(eval("void 0"), JsValue::Undefined);
    assert_eq!(eval("var o = {a: 1}; delete o.a; 'a' in o"), JsValue::Boolean(false));
    assert_eq!(eval("'length' in []"), JsValue::Boolean(true));
}

#[test]
fn test_number_formatting() {
    assert_eq!(eval("String(0.1 + 0.2)"), s("0.30000000000000004"));
    assert_eq!(eval("String(1e21)"), s("1e+21"));
    assert_eq!(eval("String(-0)"), s("0"));
    assert_eq!(eval("(255).toString(16)"), s("ff"));
    assert_eq!(eval("(1.005).toFixed(2)"), s("1.00"));
    assert_eq!(eval("(2.5).toFixed(0)"), s("3"));
}

#[test]
fn test_global_functions() {
    assert_eq!(eval("parseInt('0x1f')"), JsValue::Number(31.0));
    assert_eq!(eval("parseInt('12px', 10)"), JsValue::Number(12.0));
    assert_eq!(eval("parseFloat('3.5e2abc')"), JsValue::Number(350.0));
    assert_eq!(eval("isNaN('abc')"), JsValue::Boolean(true));
    assert_eq!(eval("Number.isNaN('abc')"), JsValue::Boolean(false));
    assert_eq!(eval("Number.parseInt === parseInt"), JsValue::Boolean(true));
    assert_eq!(eval("globalThis.Math === Math"), JsValue::Boolean(true));
}

#[test]
fn test_math() {
    assert_eq!(eval("Math.max(1, 5, 3)"), JsValue::Number(5.0));
    assert_eq!(eval("Math.min()"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("Math.round(-2.5)"), JsValue::Number(-2.0));
    assert_eq!(eval("Math.round(2.5)"), JsValue::Number(3.0));
    assert_eq!(eval("Math.abs(-3)"), JsValue::Number(3.0));
    assert_eq!(eval("Math.hypot(3, 4)"), JsValue::Number(5.0));
    assert_eq!(eval("var r = Math.random(); r >= 0 && r < 1"), JsValue::Boolean(true));
}

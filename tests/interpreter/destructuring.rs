//! Destructuring patterns in declarations, assignments and parameters

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_array_patterns() {
    assert_eq!(eval("var [a, , b = 5, ...rest] = [1, 2, undefined, 4, 5]; [a, b, rest.join('')].join()"), s("1,5,45"));
    assert_eq!(eval("var a = 1, b = 2; [a, b] = [b, a]; a * 10 + b"), JsValue::Number(21.0));
}

#[test]
fn test_object_patterns() {
    assert_eq!(
        eval("var {a, b: {c}, d = 'dflt', ['e' + 1]: e1} = {a: 1, b: {c: 2}, e1: 3}; [a, c, d, e1].join()"),
        s("1,2,dflt,3")
    );
    assert_eq!(
        eval("var {x, ...others} = {x: 1, y: 2, z: 3}; Object.keys(others).join()"),
        s("y,z")
    );
}

#[test]
fn test_parameter_patterns() {
    assert_eq!(
        eval("function f({a, b = 2} = {}, [c] = [3]) { return a + ':' + b + ':' + c; } f()"),
        s("undefined:2:3")
    );
    assert_eq!(
        eval("var add = ({x, y}) => x + y; add({x: 1, y: 2})"),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_defaults_evaluate_in_order_and_only_when_undefined() {
    assert_eq!(
        eval(
            "var log = [];
             function d(n) { log.push(n); return n; }
             var {a = d('a'), b = d('b'), c = d('c')} = {b: null};
             log.join() + ':' + b"
        ),
        s("a,c:null")
    );
}

#[test]
fn test_iterable_destructuring_uses_iterator_protocol() {
    assert_eq!(
        eval("function* g() { yield 'x'; yield 'y'; } var [p, q] = g(); p + q"),
        s("xy")
    );
    assert_eq!(eval("var [first, second] = 'hi'; second + first"), s("ih"));
}

#[test]
fn test_for_of_with_destructuring() {
    assert_eq!(
        eval("var out = ''; for (const [k, v] of [['a', 1], ['b', 2]]) out += k + v; out"),
        s("a1b2")
    );
    assert_eq!(
        eval("var out = ''; for (const [i, v] of ['x', 'y'].entries()) out += i + v; out"),
        s("0x1y")
    );
}

#[test]
fn test_destructuring_null_throws() {
    assert!(throws_error("var {a} = null;", "TypeError"));
    assert!(throws_error("var [a] = {};", "is not iterable"));
}

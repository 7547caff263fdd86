//! Statements: loops, labels, switch, exceptions

use super::{eval, s};
use jsrun::JsValue;

#[test]
fn test_loops() {
    assert_eq!(eval("var t = 0; for (var i = 1; i <= 10; i++) t += i; t"), JsValue::Number(55.0));
    assert_eq!(eval("var i = 0; while (i < 5) i++; i"), JsValue::Number(5.0));
    assert_eq!(eval("var i = 10, n = 0; do { n++; } while (i < 5); n"), JsValue::Number(1.0));
}

#[test]
fn test_degenerate_for_headers() {
    assert_eq!(eval("var n = 0; for (;;) { if (++n === 3) break; } n"), JsValue::Number(3.0));
    assert_eq!(eval("var n = 0; for (; n < 4;) n++; n"), JsValue::Number(4.0));
    assert_eq!(eval("var j; for (j = 0;; j++) { if (j > 2) break; } j"), JsValue::Number(3.0));
}

#[test]
fn test_labeled_break_and_continue() {
    assert_eq!(
        eval(
            "var out = [];
             outer: for (var i = 0; i < 3; i++) {
                 for (var j = 0; j < 3; j++) {
                     if (j === 1) continue outer;
                     if (i === 2) break outer;
                     out.push(i + '' + j);
                 }
             }
             out.join()"
        ),
        s("00,10")
    );
    assert_eq!(eval("var x = 0; block: { x = 1; break block; x = 2; } x"), JsValue::Number(1.0));
}

#[test]
fn test_switch_fall_through_and_default() {
    let source = |v: &str| {
        format!(
            "var out = ''; switch ({}) {{ case 1: out += 'a'; case 2: out += 'b'; break; default: out += 'd'; case 3: out += 'c'; }} out",
            v
        )
    };
    assert_eq!(eval(&source("1")), s("ab"));
    assert_eq!(eval(&source("2")), s("b"));
    assert_eq!(eval(&source("3")), s("c"));
    assert_eq!(eval(&source("9")), s("dc"));
    assert_eq!(eval(&source("'1'")), s("dc"));
}

#[test]
fn test_switch_lexical_scope() {
    assert_eq!(
        eval("var r; switch (1) { case 0: let x = 'zero'; case 1: let y = 'one'; r = y; } r + ':' + typeof y"),
        s("one:undefined")
    );
}

#[test]
fn test_for_in_order() {
    assert_eq!(
        eval("var o = {b: 1, 2: 1, a: 1, 1: 1}; var keys = []; for (var k in o) keys.push(k); keys.join()"),
        s("1,2,b,a")
    );
}

#[test]
fn test_for_in_walks_prototype_and_skips_shadowed() {
    assert_eq!(
        eval(
            "var proto = {inherited: 1, shadowed: 1};
             var o = Object.create(proto);
             o.own = 1;
             Object.defineProperty(o, 'shadowed', {value: 2, enumerable: false});
             var keys = []; for (var k in o) keys.push(k); keys.join()"
        ),
        s("own,inherited")
    );
    assert_eq!(
        eval("var o = {a: 1, b: 2, c: 3}; var keys = []; for (var k in o) { delete o.b; keys.push(k); } keys.join()"),
        s("a,c")
    );
    assert_eq!(eval("var n = 0; for (var k in null) n++; n"), JsValue::Number(0.0));
}

#[test]
fn test_for_of_closes_iterator_on_break() {
    assert_eq!(
        eval(
            "var closed = false;
             var iterable = {
                 [Symbol.iterator]() {
                     var i = 0;
                     return {
                         next() { return {value: i++, done: false}; },
                         return() { closed = true; return {}; }
                     };
                 }
             };
             for (var v of iterable) { if (v === 2) break; }
             closed + ':' + v"
        ),
        s("true:2")
    );
}

#[test]
fn test_try_catch_finally() {
    assert_eq!(eval("var r; try { throw 1; } catch (e) { r = e + 1; } r"), JsValue::Number(2.0));
    assert_eq!(
        eval("var log = []; function f() { try { return 'try'; } finally { log.push('fin'); } } f() + log"),
        s("tryfin")
    );
    assert_eq!(eval("function f() { try { return 1; } finally { return 2; } } f()"), JsValue::Number(2.0));
    assert_eq!(eval("var r; try { null.x; } catch ({name}) { r = name; } r"), s("TypeError"));
    assert_eq!(eval("var r = 'none'; try { throw 0; } catch { r = 'caught'; } r"), s("caught"));
    assert_eq!(
        eval("var n = 0; for (var i = 0; i < 3; i++) { try { continue; } finally { n++; } } n"),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_completion_values() {
    assert_eq!(eval("1; 2;"), JsValue::Number(2.0));
    assert_eq!(eval("var x = 5;"), JsValue::Undefined);
    assert_eq!(eval("if (true) { 'yes'; } else { 'no'; }"), s("yes"));
}

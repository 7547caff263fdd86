//! Set: unique values in insertion order

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_basic_operations() {
    assert_eq!(eval("var t = new Set([1, 2, 2, 3, 1]); [t.size, [...t].join()].join('|')"), s("3|1,2,3"));
    assert_eq!(eval("var t = new Set(); t.add(1).add(2); [t.has(1), t.has(3), t.delete(1), t.delete(1), t.size].join()"), s("true,false,true,false,1"));
    assert_eq!(eval("var t = new Set('hello'); [...t].join('')"), s("helo"));
    assert_eq!(eval("var t = new Set([NaN, NaN, 0, -0]); t.size"), JsValue::Number(2.0));
}

#[test]
fn test_iterators() {
    assert_eq!(eval("Set.prototype.keys === Set.prototype.values"), JsValue::Boolean(true));
    assert_eq!(eval("Set.prototype[Symbol.iterator] === Set.prototype.values"), JsValue::Boolean(true));
    assert_eq!(eval("[...new Set(['a', 'b']).entries()].map(function (e) { return e.join(':'); }).join()"), s("a:a,b:b"));
    assert_eq!(eval("Object.prototype.toString.call(new Set().values())"), s("[object Set Iterator]"));
}

#[test]
fn test_iteration_sees_mutation() {
    assert_eq!(
        eval(
            "var t = new Set([1, 2, 3]); var seen = [];
             t.forEach(function (v) { seen.push(v); if (v === 1) { t.delete(2); t.add(5); } });
             seen.join()"
        ),
        s("1,3,5")
    );
    // Deleting and re-adding moves a value to the end
    assert_eq!(
        eval("var t = new Set([1, 2, 3]); var seen = []; for (var v of t) { seen.push(v); if (seen.length === 1) { t.delete(1); t.add(1); } } seen.join()"),
        s("1,2,3,1")
    );
}

#[test]
fn test_errors() {
    assert!(throws_error("Set()", "TypeError"));
    assert!(throws_error("new Set(5)", "TypeError"));
    assert!(throws_error("Set.prototype.add.call(new Map(), 1)", "TypeError"));
}

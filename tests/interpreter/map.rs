//! Map: SameValueZero keys, insertion order and live iteration

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_basic_operations() {
    assert_eq!(
        eval("var m = new Map(); m.set('a', 1).set('b', 2); [m.get('a'), m.get('b'), m.get('c'), m.size].join()"),
        s("1,2,,2")
    );
    assert_eq!(eval("var m = new Map([[1, 'x']]); [m.has(1), m.has('1'), m.delete(1), m.delete(1), m.size].join()"), s("true,false,true,false,0"));
    assert_eq!(eval("var m = new Map([[1, 2], [3, 4]]); m.clear(); m.size"), JsValue::Number(0.0));
}

#[test]
fn test_same_value_zero() {
    assert_eq!(eval("var m = new Map(); m.set(NaN, 'nan'); m.get(NaN)"), s("nan"));
    assert_eq!(eval("var m = new Map(); m.set(-0, 'zero'); m.get(0)"), s("zero"));
    assert_eq!(eval("var m = new Map(); m.set(-0, 1); 1 / m.keys().next().value"), JsValue::Number(f64::INFINITY));
    assert_eq!(eval("var k = {}; var m = new Map([[k, 1], [{}, 2]]); [m.get(k), m.get({}), m.size].join()"), s("1,,2"));
}

#[test]
fn test_insertion_order_survives_replacement() {
    assert_eq!(
        eval("var m = new Map([['z', 1], ['a', 2]]); m.set('z', 3); Array.from(m).join(';')"),
        s("z,3;a,2")
    );
    assert_eq!(eval("var m = new Map([['a', 1], ['b', 2]]); [...m.keys()].join() + '|' + [...m.values()].join()"), s("a,b|1,2"));
}

#[test]
fn test_iteration_sees_mutation() {
    // Entries added during iteration are visited, deleted ones are skipped
    assert_eq!(
        eval(
            "var m = new Map([[1, 1], [2, 2], [3, 3]]); var seen = [];
             for (var [k] of m) { seen.push(k); if (k === 1) { m.delete(2); m.set(4, 4); } }
             seen.join()"
        ),
        s("1,3,4")
    );
    assert_eq!(
        eval(
            "var m = new Map(); for (var i = 0; i < 100; i++) m.set(i, i);
             var it = m.keys(); it.next();
             for (var i = 0; i < 98; i++) m.delete(i);
             [it.next().value, it.next().value, it.next().done].join()"
        ),
        s("98,99,true")
    );
    assert_eq!(
        eval("var m = new Map([[1, 1]]); var it = m.entries(); m.clear(); m.set(2, 'b'); it.next().value.join()"),
        s("2,b")
    );
}

#[test]
fn test_for_each() {
    assert_eq!(
        eval("var out = []; new Map([['a', 1], ['b', 2]]).forEach(function (v, k, m) { out.push(k + v + m.size); }); out.join()"),
        s("a12,b22")
    );
}

#[test]
fn test_group_by() {
    assert_eq!(
        eval(
            "var g = Map.groupBy([1, 2, 3, 4, 5], function (n) { return n % 2 ? 'odd' : 'even'; });
             [...g.keys()].join() + '|' + g.get('odd').join() + '|' + g.get('even').join()"
        ),
        s("odd,even|1,3,5|2,4")
    );
}

#[test]
fn test_prototype_shape() {
    assert_eq!(eval("Map.prototype[Symbol.iterator] === Map.prototype.entries"), JsValue::Boolean(true));
    assert_eq!(eval("Object.prototype.toString.call(new Map())"), s("[object Map]"));
    assert_eq!(eval("Object.prototype.toString.call(new Map().keys())"), s("[object Map Iterator]"));
    assert_eq!(eval("typeof Object.getOwnPropertyDescriptor(Map.prototype, 'size').get"), s("function"));
}

#[test]
fn test_errors() {
    assert!(throws_error("Map()", "TypeError"));
    assert!(throws_error("new Map([1])", "TypeError"));
    assert!(throws_error("Map.prototype.get.call({}, 1)", "TypeError"));
    assert!(throws_error("Map.prototype.size", "TypeError"));
}

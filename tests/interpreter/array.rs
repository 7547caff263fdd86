//! Arrays: literals, length semantics and Array.prototype methods

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_literals_and_holes() {
    assert_eq!(eval("[1, 2, 3].length"), JsValue::Number(3.0));
    assert_eq!(eval("[1, , 3].length"), JsValue::Number(3.0));
    assert_eq!(eval("1 in [1, , 3]"), JsValue::Boolean(false));
    assert_eq!(eval("[, ].length"), JsValue::Number(1.0));
    assert_eq!(eval("[...'ab', ...[1, 2]].join('')"), s("ab12"));
}

#[test]
fn test_length_tracks_writes_and_truncates() {
    assert_eq!(eval("var a = []; a[4] = 1; a.length"), JsValue::Number(5.0));
    assert_eq!(eval("var a = [1, 2, 3, 4]; a.length = 2; a.join() + ':' + a[3]"), s("1,2:undefined"));
    assert!(throws_error("var a = []; a.length = -1;", "Invalid array length"));
    assert!(throws_error("new Array(-1)", "Invalid array length"));
    assert_eq!(eval("new Array(3).length + ':' + new Array(3, 4).join()"), s("3:3,4"));
}

#[test]
fn test_define_property_length_is_validated() {
    assert!(throws_error(
        "var a = [1, 2]; Object.defineProperty(a, 'length', {value: -1});",
        "RangeError: Invalid array length"
    ));
    assert!(throws_error(
        "Object.defineProperty([1, 2, 3], 'length', {value: 1.5});",
        "Invalid array length"
    ));
    assert_eq!(
        eval("var a = [1, 2, 3]; Object.defineProperty(a, 'length', {value: '1'}); a.length + ':' + a.join()"),
        s("1:1")
    );
    assert_eq!(
        eval("var a = [1, 2]; try { Object.defineProperty(a, 'length', {value: -1}); } catch (e) {} a.join()"),
        s("1,2")
    );
}

#[test]
fn test_mutators() {
    assert_eq!(
        eval("var a = [1, 2]; a.push(3, 4); a.pop(); a.unshift(0); a.shift(); a.join()"),
        s("1,2,3")
    );
    assert_eq!(
        eval("var a = [1, 2, 3, 4, 5]; var removed = a.splice(1, 2, 'x'); a.join() + '|' + removed.join()"),
        s("1,x,4,5|2,3")
    );
    assert_eq!(eval("[1, 2, 3].reverse().join()"), s("3,2,1"));
    assert_eq!(eval("new Array(3).fill(0).join()"), s("0,0,0"));
}

#[test]
fn test_sort() {
    assert_eq!(eval("[10, 9, 1, 2].sort().join()"), s("1,10,2,9"));
    assert_eq!(eval("[10, 9, 1, 2].sort((a, b) => a - b).join()"), s("1,2,9,10"));
    assert_eq!(eval("[3, undefined, 1].sort().join()"), s("1,3,"));
    assert_eq!(
        eval("[{k: 1, v: 'a'}, {k: 0, v: 'b'}, {k: 1, v: 'c'}].sort((x, y) => x.k - y.k).map(e => e.v).join('')"),
        s("bac")
    );
    assert!(throws_error("[1, 2].sort(5)", "TypeError"));
}

#[test]
fn test_higher_order_methods() {
    assert_eq!(eval("[1, 2, 3].map(x => x * 2).join()"), s("2,4,6"));
    assert_eq!(eval("[1, 2, 3, 4].filter(x => x % 2).join()"), s("1,3"));
    assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b)"), JsValue::Number(6.0));
    assert_eq!(eval("['a', 'b'].reduceRight((a, b) => a + b, '')"), s("ba"));
    assert_eq!(eval("[1, 2, 3].some(x => x > 2) + ',' + [1, 2, 3].every(x => x > 2)"), s("true,false"));
    assert_eq!(eval("[5, 12, 8].find(x => x > 6) + ',' + [5, 12, 8].findIndex(x => x > 100)"), s("12,-1"));
    assert_eq!(eval("var t = 0; [1, 2, 3].forEach(function (x) { t += x * this.m; }, {m: 10}); t"), JsValue::Number(60.0));
    assert!(throws_error("[].reduce((a, b) => a)", "Reduce of empty array with no initial value"));
}

#[test]
fn test_search_and_copy() {
    assert_eq!(eval("[1, 2, NaN].indexOf(NaN) + ',' + [1, 2, NaN].includes(NaN)"), s("-1,true"));
    assert_eq!(eval("[1, 2, 1].lastIndexOf(1)"), JsValue::Number(2.0));
    assert_eq!(eval("[1, 2, 3, 4].slice(1, -1).join()"), s("2,3"));
    assert_eq!(eval("[1].concat([2, 3], 4).join()"), s("1,2,3,4"));
    assert_eq!(eval("[1, [2, [3, [4]]]].flat(Infinity).join()"), s("1,2,3,4"));
    assert_eq!(eval("[1, 2].flatMap(x => [x, x * 10]).join()"), s("1,10,2,20"));
    assert_eq!(eval("[1, 2, 3].at(-1)"), JsValue::Number(3.0));
}

#[test]
fn test_statics() {
    assert_eq!(eval("Array.isArray([]) + ',' + Array.isArray({length: 0})"), s("true,false"));
    assert_eq!(eval("Array.from('abc').join('-')"), s("a-b-c"));
    assert_eq!(eval("Array.from({length: 3}, (_, i) => i * i).join()"), s("0,1,4"));
    assert_eq!(eval("Array.of(7).length"), JsValue::Number(1.0));
}

#[test]
fn test_iterators() {
    assert_eq!(eval("[...['a', 'b'].keys()].join()"), s("0,1"));
    assert_eq!(eval("[...['a', 'b'].entries()].join('|')"), s("0,a|1,b"));
    assert_eq!(eval("var it = [1][Symbol.iterator](); it.next().value + ':' + it.next().done"), s("1:true"));
    assert_eq!(eval("[][Symbol.iterator] === Array.prototype.values"), JsValue::Boolean(true));
}

#[test]
fn test_join_and_to_string() {
    assert_eq!(eval("[1, null, undefined, 'x'].join()"), s("1,,,x"));
    assert_eq!(eval("String([1, [2, 3]])"), s("1,2,3"));
}

#[test]
fn test_array_like_generic_methods() {
    assert_eq!(
        eval("Array.prototype.map.call({length: 2, 0: 'a', 1: 'b'}, x => x.toUpperCase()).join('')"),
        s("AB")
    );
    assert_eq!(
        eval("function f() { return Array.prototype.slice.call(arguments, 1); } f(1, 2, 3).join()"),
        s("2,3")
    );
}

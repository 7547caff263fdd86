//! Object model: property attributes, prototypes, integrity levels

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_literals_and_access() {
    assert_eq!(eval("var o = {a: 1, 'b c': 2, 3: 'three'}; o.a + o['b c'] + o[3]"), s("3three"));
    assert_eq!(eval("var k = 'key'; var o = {[k + 1]: 'v'}; o.key1"), s("v"));
    assert_eq!(eval("var x = 1; var o = {x, m() { return this.x; }}; o.m()"), JsValue::Number(1.0));
    assert_eq!(
        eval("var o = {_v: 1, get v() { return this._v; }, set v(n) { this._v = n * 2; }}; o.v = 5; o.v"),
        JsValue::Number(10.0)
    );
    assert_eq!(eval("var o = {__proto__: {inherited: 'yes'}}; o.inherited"), s("yes"));
    assert_eq!(eval("var o = {...{a: 1, b: 2}, b: 3}; o.a + o.b"), JsValue::Number(4.0));
}

#[test]
fn test_key_order() {
    assert_eq!(eval("Object.keys({b: 1, a: 2, 10: 3, 2: 4}).join()"), s("2,10,b,a"));
    assert_eq!(eval("var o = {a: 1, b: 2}; delete o.a; o.a = 3; Object.keys(o).join()"), s("b,a"));
}

#[test]
fn test_define_property_attributes() {
    assert_eq!(
        eval(
            "var o = {};
             Object.defineProperty(o, 'x', {value: 1});
             var d = Object.getOwnPropertyDescriptor(o, 'x');
             [d.value, d.writable, d.enumerable, d.configurable].join()"
        ),
        s("1,false,false,false")
    );
    assert_eq!(
        eval("var o = {}; Object.defineProperty(o, 'x', {value: 1}); o.x = 2; o.x"),
        JsValue::Number(1.0)
    );
    assert!(throws_error(
        "var o = {}; Object.defineProperty(o, 'x', {value: 1}); Object.defineProperty(o, 'x', {value: 2});",
        "Cannot redefine property: x"
    ));
    assert_eq!(
        eval("var o = {}; Object.defineProperty(o, 'g', {get() { return 'got'; }, enumerable: true}); o.g + Object.keys(o)"),
        s("gotg")
    );
    assert!(throws_error("Object.defineProperty({}, 'x', {get() {}, value: 1})", "TypeError"));
}

#[test]
fn test_freeze_seal_prevent_extensions() {
    assert_eq!(
        eval(
            "var o = Object.freeze({a: 1});
             o.a = 2; o.b = 3; delete o.a;
             [o.a, o.b, Object.isFrozen(o), Object.isSealed(o), Object.isExtensible(o)].join()"
        ),
        s("1,,true,true,false")
    );
    assert_eq!(
        eval("var o = Object.seal({a: 1}); o.a = 2; delete o.a; o.a + ':' + Object.isFrozen(o)"),
        s("2:false")
    );
    assert_eq!(
        eval("var o = Object.preventExtensions({a: 1}); o.b = 1; delete o.a; ('a' in o) + ':' + ('b' in o)"),
        s("false:false")
    );
    assert_eq!(eval("Object.isFrozen(Object.preventExtensions({}))"), JsValue::Boolean(true));
    assert_eq!(eval("Object.freeze(5)"), JsValue::Number(5.0));
}

#[test]
fn test_prototypes() {
    assert_eq!(
        eval("var proto = {greet() { return 'hi ' + this.n; }}; var o = Object.create(proto); o.n = 'x'; o.greet()"),
        s("hi x")
    );
    assert_eq!(eval("Object.getPrototypeOf(Object.create(null))"), JsValue::Null);
    assert_eq!(eval("var o = Object.create(null); o.x = 1; 'toString' in o"), JsValue::Boolean(false));
    assert_eq!(
        eval("var a = {}, b = Object.create(a); a.isPrototypeOf(b) + ',' + b.isPrototypeOf(a)"),
        s("true,false")
    );
    assert_eq!(
        eval("function F() {} F.prototype.shared = 1; var f = new F(); f.shared + ':' + f.hasOwnProperty('shared')"),
        s("1:false")
    );
}

#[test]
fn test_prototype_cycles_are_rejected() {
    assert!(throws_error(
        "var a = {}, b = Object.create(a); Object.setPrototypeOf(a, b);",
        "Cyclic __proto__ value"
    ));
    assert!(throws_error("var a = {}; Object.setPrototypeOf(a, a);", "Cyclic __proto__ value"));
    assert!(throws_error(
        "Object.setPrototypeOf(Object.preventExtensions({}), {})",
        "TypeError"
    ));
}

#[test]
fn test_setter_on_prototype_chain() {
    assert_eq!(
        eval(
            "var log = [];
             var proto = {set v(x) { log.push(x); }};
             var o = Object.create(proto);
             o.v = 7;
             log.join() + ':' + o.hasOwnProperty('v')"
        ),
        s("7:false")
    );
    assert_eq!(
        eval("var proto = Object.freeze({v: 1}); var o = Object.create(proto); o.v = 2; o.v + ':' + o.hasOwnProperty('v')"),
        s("1:false")
    );
}

#[test]
fn test_statics() {
    assert_eq!(eval("Object.values({a: 1, b: 2}).join()"), s("1,2"));
    assert_eq!(eval("Object.entries({a: 1}).join()"), s("a,1"));
    assert_eq!(eval("Object.fromEntries([['a', 1], ['b', 2]]).b"), JsValue::Number(2.0));
    assert_eq!(eval("var t = Object.assign({a: 1}, null, {b: 2}, {a: 3}); t.a + t.b"), JsValue::Number(5.0));
    assert_eq!(eval("Object.is(NaN, NaN) + ',' + Object.is(0, -0)"), s("true,false"));
    assert_eq!(eval("Object.getOwnPropertyNames([1, 2]).join()"), s("0,1,length"));
    assert_eq!(eval("Object.hasOwn({x: undefined}, 'x')"), JsValue::Boolean(true));
}

#[test]
fn test_to_string_tags() {
    assert_eq!(eval("Object.prototype.toString.call([])"), s("[object Array]"));
    assert_eq!(eval("Object.prototype.toString.call(null)"), s("[object Null]"));
    assert_eq!(eval("Object.prototype.toString.call(function () {})"), s("[object Function]"));
    assert_eq!(eval("Object.prototype.toString.call(new Error())"), s("[object Error]"));
    assert_eq!(eval("String({[Symbol.toStringTag]: 'Custom'})"), s("[object Custom]"));
    assert_eq!(eval("String(JSON)"), s("[object JSON]"));
}

#[test]
fn test_to_primitive() {
    assert_eq!(eval("var o = {valueOf() { return 41; }}; o + 1"), JsValue::Number(42.0));
    assert_eq!(eval("var o = {toString() { return 'str'; }}; `${o}`"), s("str"));
    assert_eq!(
        eval("var o = {[Symbol.toPrimitive](hint) { return hint; }}; `${o}` + (o + '') + (+{[Symbol.toPrimitive]: () => 5})"),
        s("stringdefault5")
    );
    assert!(throws_error("var o = {valueOf() { return {}; }, toString() { return {}; }}; o + 1", "TypeError"));
}

#[test]
fn test_symbols_as_keys() {
    assert_eq!(
        eval("var sym = Symbol('tag'); var o = {[sym]: 1, a: 2}; Object.keys(o).length + ':' + o[sym] + ':' + sym.description"),
        s("1:1:tag")
    );
    assert_eq!(eval("Symbol.for('k') === Symbol.for('k')"), JsValue::Boolean(true));
    assert_eq!(eval("Symbol.keyFor(Symbol.for('k'))"), s("k"));
    assert_eq!(eval("Symbol('d').toString()"), s("Symbol(d)"));
    assert!(throws_error("Symbol() + ''", "TypeError"));
}

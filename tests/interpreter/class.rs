//! Classes: construction, inheritance, super, statics and accessors

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_class_basics() {
    assert_eq!(
        eval(
            "class Point {
                 constructor(x, y) { this.x = x; this.y = y; }
                 sum() { return this.x + this.y; }
             }
             new Point(2, 3).sum()"
        ),
        JsValue::Number(5.0)
    );
    assert_eq!(eval("class A {} typeof A"), s("function"));
    assert_eq!(eval("var C = class Named {}; C.name"), s("Named"));
    assert_eq!(eval("var C = class {}; C.name"), s("C"));
}

#[test]
fn test_methods_are_not_enumerable() {
    assert_eq!(
        eval("class A { m() {} } Object.keys(A.prototype).length + ':' + typeof A.prototype.m"),
        s("0:function")
    );
}

#[test]
fn test_inheritance_and_super() {
    assert_eq!(
        eval(
            "class Animal {
                 constructor(name) { this.name = name; }
                 speak() { return this.name + ' makes a sound'; }
             }
             class Dog extends Animal {
                 constructor(name) { super(name); this.kind = 'dog'; }
                 speak() { return super.speak() + ' (woof)'; }
             }
             var d = new Dog('Rex');
             [d.speak(), d instanceof Animal, Object.getPrototypeOf(Dog) === Animal].join()"
        ),
        s("Rex makes a sound (woof),true,true")
    );
}

#[test]
fn test_default_derived_constructor_forwards_arguments() {
    assert_eq!(
        eval("class A { constructor(a, b) { this.v = a + b; } } class B extends A {} new B(1, 2).v"),
        JsValue::Number(3.0)
    );
}

#[test]
fn test_static_members_and_accessors() {
    assert_eq!(
        eval(
            "class Temp {
                 constructor(c) { this.c = c; }
                 get f() { return this.c * 9 / 5 + 32; }
                 set f(v) { this.c = (v - 32) * 5 / 9; }
                 static freezing() { return new Temp(0); }
             }
             var t = Temp.freezing();
             var before = t.f;
             t.f = 212;
             before + ',' + t.c"
        ),
        s("32,100")
    );
    assert_eq!(
        eval("class A { static create() { return new this(); } } class B extends A {} B.create() instanceof B"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_computed_method_names() {
    assert_eq!(
        eval("var k = 'dyn'; class A { [k + 'amic']() { return 1; } } new A().dynamic()"),
        JsValue::Number(1.0)
    );
    assert_eq!(
        eval(
            "class Range {
                 constructor(n) { this.n = n; }
                 *[Symbol.iterator]() { for (var i = 0; i < this.n; i++) yield i; }
             }
             [...new Range(3)].join()"
        ),
        s("0,1,2")
    );
}

#[test]
fn test_new_target_in_class_hierarchy() {
    assert_eq!(
        eval("class A { constructor() { this.t = new.target.name; } } class B extends A {} new B().t"),
        s("B")
    );
}

#[test]
fn test_extending_builtins() {
    assert_eq!(
        eval("class MyError extends Error { constructor(m) { super(m); this.name = 'MyError'; } } String(new MyError('bad'))"),
        s("MyError: bad")
    );
    assert_eq!(
        eval("class Stack extends Array {} var st = new Stack(); st.push(1, 2); st.length + ':' + Array.isArray(st)"),
        s("2:true")
    );
}

#[test]
fn test_extends_null_and_expressions() {
    assert_eq!(
        eval("function mixin(Base) { return class extends Base { m() { return 'mixed'; } }; } class A {} new (mixin(A))().m()"),
        s("mixed")
    );
    assert!(throws_error("class A extends 5 {}", "Class extends value"));
}

#[test]
fn test_class_errors() {
    assert!(throws_error("class A {} A()", "Class constructor A cannot be invoked without 'new'"));
    assert!(throws_error(
        "class A {} class B extends A { constructor() { this.x = 1; } } new B()",
        "Cannot access 'this' before initialization"
    ));
    assert!(throws_error(
        "class A {} class B extends A { constructor() { let x = 1; } } new B()",
        "Must call super constructor"
    ));
    assert!(throws_error(
        "class A {} class B extends A { constructor() { super(); super(); } } new B()",
        "Super constructor may only be called once"
    ));
    assert!(throws_error("new C(); class C {}", "before initialization"));
}

#[test]
fn test_has_instance_override() {
    assert_eq!(
        eval("class Even { static [Symbol.hasInstance](n) { return n % 2 === 0; } } (2 instanceof Even) + ',' + (3 instanceof Even)"),
        s("true,false")
    );
}

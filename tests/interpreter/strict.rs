//! Strict mode semantics and strict diagnostics

use super::{eval, s, throws_error};
use jsrun::{JsError, JsValue, OptimizationTier, Runtime, RuntimeConfig};

#[test]
fn test_this_is_not_coerced() {
    assert_eq!(eval("'use strict'; function f() { return this; } f()"), JsValue::Undefined);
    assert_eq!(eval("'use strict'; function f() { return typeof this; } f.call(5)"), s("number"));
    assert_eq!(eval("function f() { return typeof this; } f.call(5)"), s("object"));
    assert_eq!(
        eval("function f() { 'use strict'; return this === undefined; } f()"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_undeclared_assignment() {
    assert!(throws_error("'use strict'; undeclaredName = 1;", "ReferenceError"));
    assert_eq!(eval("sloppyGlobal = 1; globalThis.sloppyGlobal"), JsValue::Number(1.0));
}

#[test]
fn test_failed_writes_throw() {
    assert!(throws_error(
        "'use strict'; var o = Object.freeze({a: 1}); o.a = 2;",
        "Cannot assign to read only property"
    ));
    assert!(throws_error(
        "'use strict'; var o = Object.preventExtensions({}); o.b = 1;",
        "object is not extensible"
    ));
    assert!(throws_error("'use strict'; var o = Object.seal({a: 1}); delete o.a;", "Cannot delete property"));
    assert!(throws_error("'use strict'; var o = {get x() { return 1; }}; o.x = 2;", "TypeError"));
    assert!(throws_error("'use strict'; 'str'.prop = 1;", "Cannot create property"));
}

#[test]
fn test_strict_scope_is_lexical() {
    assert_eq!(
        eval(
            "function sloppy() { return this !== undefined; }
             function strict() { 'use strict'; return sloppy(); }
             strict()"
        ),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval("'use strict'; var f = function () { return (() => this)(); }; f()"),
        JsValue::Undefined
    );
}

#[test]
fn test_classes_are_strict() {
    assert!(throws_error("class A { m() { undeclaredInClass = 1; } } new A().m()", "ReferenceError"));
}

#[test]
fn test_strict_syntax_restrictions() {
    assert!(throws_error("'use strict'; var x = 010;", "SyntaxError"));
    assert!(throws_error("'use strict'; var eval = 1;", "SyntaxError"));
    assert!(throws_error("'use strict'; with ({}) {}", "SyntaxError"));
    assert!(throws_error("function f(a, a) { 'use strict'; }", "SyntaxError"));
    assert_eq!(eval("var x = 010; x"), JsValue::Number(8.0));
}

fn diagnostics_runtime(tier: OptimizationTier, warnings_as_errors: bool) -> Runtime {
    Runtime::with_config(
        RuntimeConfig::default()
            .with_tier(tier)
            .with_strict_diagnostics(warnings_as_errors),
    )
}

#[test]
fn test_diagnostics_record_warnings() {
    for tier in OptimizationTier::ALL {
        let mut runtime = diagnostics_runtime(tier, false);
        let result = runtime.eval("var o = {a: 1}; o.a; o.missing; undeclared = 2; o.toString; typeof undeclared");
        assert_eq!(result.ok(), Some(JsValue::from("number")), "{:?}", tier);
        assert_eq!(
            runtime.warnings(),
            [
                "Reference to undefined property \"missing\"".to_string(),
                "Assignment to undeclared variable undeclared".to_string(),
            ],
            "{:?}",
            tier
        );
    }
}

#[test]
fn test_diagnostics_off_by_default() {
    let mut runtime = Runtime::new();
    assert!(runtime.eval("var o = {}; o.missing; undeclared = 1;").is_ok());
    assert!(runtime.warnings().is_empty());
}

#[test]
fn test_warnings_as_errors() {
    for tier in OptimizationTier::ALL {
        let mut runtime = diagnostics_runtime(tier, true);
        match runtime.eval("var o = {}; o.missing") {
            Err(JsError::ReferenceError { message }) => {
                assert_eq!(message, "Reference to undefined property \"missing\"", "{:?}", tier)
            }
            other => panic!("{:?}: expected a ReferenceError, got {:?}", tier, other),
        }
        assert!(runtime.warnings().is_empty());
        let caught = runtime.eval("try { neverDeclared = 1; 'no'; } catch (e) { e instanceof ReferenceError; }");
        assert_eq!(caught.ok(), Some(JsValue::Boolean(true)), "{:?}", tier);
    }
}

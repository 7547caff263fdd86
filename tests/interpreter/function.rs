//! Call protocol: call, apply, bind, arguments, constructors

use super::{eval, s, throws_error};
use jsrun::{JsValue, OptimizationTier, Runtime, RuntimeConfig};

#[test]
fn test_call_and_apply_set_this() {
    assert_eq!(
        eval("function f(a, b) { return this.x + a + b; } f.call({x: 1}, 2, 3)"),
        JsValue::Number(6.0)
    );
    assert_eq!(
        eval("function f(a, b) { return this.x + a + b; } f.apply({x: 1}, [2, 3])"),
        JsValue::Number(6.0)
    );
    assert_eq!(
        eval("function f() { return arguments.length; } f.apply(null, {length: 2})"),
        JsValue::Number(2.0)
    );
}

#[test]
fn test_apply_applied_to_itself_reaches_the_target() {
    assert_eq!(
        eval(
            "function f(a, b) { return this.tag + ':' + a + b; }
             Function.prototype.apply.apply(f, [{tag: 'ctx'}, ['x', 'y']])"
        ),
        s("ctx:xy")
    );
    assert_eq!(
        eval(
            "function f(a) { return this.tag + a; }
             Function.prototype.call.call(f, {tag: 'T'}, 1)"
        ),
        s("T1")
    );
    assert_eq!(
        eval(
            "function f() { return this.v; }
             Function.prototype.call.apply(f, [{v: 42}])"
        ),
        JsValue::Number(42.0)
    );
}

#[test]
fn test_bind_fixes_this_and_prefix() {
    assert_eq!(
        eval(
            "function f(a, b, c) { return [this.n, a, b, c].join('-'); }
             var g = f.bind({n: 0}, 1);
             var h = g.bind({n: 99}, 2);
             h(3)"
        ),
        s("0-1-2-3")
    );
}

#[test]
fn test_bound_function_name_and_length() {
    assert_eq!(eval("function foo(a, b, c) {} foo.bind(null, 1).name"), s("bound foo"));
    assert_eq!(eval("function foo(a, b, c) {} foo.bind(null, 1).length"), JsValue::Number(2.0));
    assert_eq!(eval("function foo(a) {} foo.bind(null, 1, 2).length"), JsValue::Number(0.0));
}

#[test]
fn test_bound_constructor_ignores_bound_this() {
    assert_eq!(
        eval(
            "function P(x, y) { this.x = x; this.y = y; }
             var B = P.bind({ignored: true}, 1);
             var p = new B(2);
             [p.x, p.y, p instanceof P, p.ignored].join()"
        ),
        s("1,2,true,")
    );
}

#[test]
fn test_function_name_inference() {
    assert_eq!(eval("function foo() {} foo.name"), s("foo"));
    assert_eq!(eval("var f = function() {}; f.name"), s("f"));
    assert_eq!(eval("let arrow = () => {}; arrow.name"), s("arrow"));
    assert_eq!(eval("var o = {m() {}}; o.m.name"), s("m"));
    assert_eq!(eval("[].push.name"), s("push"));
}

#[test]
fn test_function_length_stops_at_default() {
    assert_eq!(eval("(function(a, b = 1, c) {}).length"), JsValue::Number(1.0));
    assert_eq!(eval("(function(...rest) {}).length"), JsValue::Number(0.0));
}

#[test]
fn test_arguments_object() {
    assert_eq!(
        eval("function f() { return arguments.length + ':' + arguments[1]; } f('a', 'b', 'c')"),
        s("3:b")
    );
    assert_eq!(
        eval("function f(a) { arguments[0] = 9; return a; } f(1)"),
        JsValue::Number(1.0)
    );
}

#[test]
fn test_rest_and_spread() {
    assert_eq!(
        eval("function f(a, ...rest) { return rest.length; } f(1, 2, 3, 4)"),
        JsValue::Number(3.0)
    );
    assert_eq!(eval("Math.max(...[1, 9, 3])"), JsValue::Number(9.0));
    assert_eq!(eval("var a = [2, 3]; [1, ...a, 4].join()"), s("1,2,3,4"));
}

#[test]
fn test_default_parameters_evaluate_left_to_right() {
    assert_eq!(
        eval(
            "var log = [];
             function f(a = log.push('a'), b = log.push('b:' + a)) { return log.join(); }
             f()"
        ),
        s("a,b:1")
    );
    assert_eq!(
        eval("function f(a, b = a * 2) { return b; } f(4)"),
        JsValue::Number(8.0)
    );
}

#[test]
fn test_this_in_arrow_is_lexical() {
    assert_eq!(
        eval(
            "var o = {v: 7, m() { return [1].map(() => this.v)[0]; }};
             o.m()"
        ),
        JsValue::Number(7.0)
    );
}

#[test]
fn test_sloppy_this_is_global() {
    assert_eq!(eval("function f() { return this === globalThis; } f()"), JsValue::Boolean(true));
}

#[test]
fn test_new_target() {
    assert_eq!(
        eval("function F() { return new.target === F; } F() === false && new F() instanceof F"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_non_callable_and_non_constructible() {
    assert!(throws_error("var x = 1; x()", "is not a function"));
    assert!(throws_error("new Math.max()", "is not a constructor"));
    assert!(throws_error("new (() => {})()", "is not a constructor"));
    assert!(throws_error("new Symbol()", "is not a constructor"));
}

#[test]
fn test_function_constructor() {
    assert_eq!(eval("new Function('a', 'b', 'return a + b')(2, 3)"), JsValue::Number(5.0));
    assert_eq!(eval("Function('return typeof this')()"), s("object"));
}

#[test]
fn test_recursion_limit() {
    for tier in OptimizationTier::ALL {
        let config = RuntimeConfig {
            max_call_depth: 64,
            ..RuntimeConfig::default().with_tier(tier)
        };
        let mut runtime = Runtime::with_config(config);
        let err = runtime.eval("function r() { return r(); } r()").unwrap_err();
        assert!(err.to_string().contains("Maximum call stack size exceeded"), "{}", err);
        let caught = runtime
            .eval("try { r(); } catch (e) { e instanceof RangeError }")
            .unwrap();
        assert_eq!(caught, JsValue::Boolean(true));
    }
}

#[test]
fn test_deep_recursion_within_default_limit() {
    for tier in OptimizationTier::ALL {
        let mut runtime = Runtime::with_config(RuntimeConfig::default().with_tier(tier));
        let depth = runtime
            .eval("function down(n) { return n === 0 ? 0 : 1 + down(n - 1); } down(9000)")
            .unwrap();
        assert_eq!(depth, JsValue::Number(9000.0), "{:?}", tier);
        let err = runtime.eval("function r() { return r(); } r()").unwrap_err();
        assert!(err.to_string().contains("Maximum call stack size exceeded"), "{}", err);
        // The runtime is still usable after unwinding the whole stack
        assert_eq!(runtime.eval("down(10)").unwrap(), JsValue::Number(10.0));
    }
}

#[test]
fn test_exceptions_unwind_through_nested_calls() {
    for tier in OptimizationTier::ALL {
        let mut runtime = Runtime::with_config(RuntimeConfig::default().with_tier(tier));
        let source = "
            var log = [];
            function thrower(n) { if (n === 0) throw new Error('bottom'); return thrower(n - 1); }
            function middle() {
                try { return thrower(50); } finally { log.push('finally'); }
            }
            function outer() {
                try { middle(); } catch (e) { log.push(e.message); }
                return log.join(',');
            }
            outer()
        ";
        assert_eq!(runtime.eval(source).unwrap(), JsValue::from("finally,bottom"), "{:?}", tier);
    }
}

//! Generators: suspension, resumption, delegation and parameter ordering

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_basic_yield_sequence() {
    assert_eq!(
        eval(
            "function* g() { yield 1; yield 2; return 3; }
             var it = g();
             var out = [];
             for (var i = 0; i < 4; i++) { var r = it.next(); out.push(r.value + ':' + r.done); }
             out.join()"
        ),
        s("1:false,2:false,3:true,undefined:true")
    );
}

#[test]
fn test_next_argument_becomes_yield_result() {
    assert_eq!(
        eval(
            "function* g() { var a = yield 'first'; var b = yield a * 2; return a + b; }
             var it = g();
             it.next('ignored');
             var second = it.next(5).value;
             var last = it.next(7).value;
             second + ',' + last"
        ),
        s("10,12")
    );
}

#[test]
fn test_for_of_and_spread_over_generators() {
    assert_eq!(
        eval(
            "function* range(n) { for (let i = 0; i < n; i++) yield i; }
             var sum = 0; for (const x of range(5)) sum += x;
             sum + ':' + [...range(3)].join('')"
        ),
        s("10:012")
    );
}

#[test]
fn test_return_runs_finally() {
    assert_eq!(
        eval(
            "var log = [];
             function* g() { try { yield 1; yield 2; } finally { log.push('cleanup'); } }
             var it = g(); it.next();
             var r = it.return(9);
             log.join() + ':' + r.value + ':' + r.done + ':' + it.next().done"
        ),
        s("cleanup:9:true:true")
    );
}

#[test]
fn test_throw_is_catchable_inside_generator() {
    assert_eq!(
        eval(
            "function* g() { try { yield 1; } catch (e) { yield 'caught ' + e; } }
             var it = g(); it.next();
             it.throw('boom').value"
        ),
        s("caught boom")
    );
    assert!(throws_error(
        "function* g() { yield 1; } var it = g(); it.throw(new Error('out'))",
        "Error: out"
    ));
}

#[test]
fn test_break_out_of_for_of_closes_generator() {
    assert_eq!(
        eval(
            "var closed = false;
             function* g() { try { yield 1; yield 2; } finally { closed = true; } }
             for (var x of g()) { break; }
             closed"
        ),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_yield_star_delegates() {
    assert_eq!(
        eval(
            "function* inner() { yield 'a'; yield 'b'; return 'r'; }
             function* outer() { var r = yield* inner(); yield r; yield* [1, 2]; }
             [...outer()].join()"
        ),
        s("a,b,r,1,2")
    );
}

#[test]
fn test_generator_methods_and_prototype_chain() {
    assert_eq!(
        eval(
            "var o = { *items() { yield 1; } };
             var it = o.items();
             [typeof it.next, it[Symbol.iterator]() === it, Object.prototype.toString.call(it)].join()"
        ),
        s("function,true,[object Generator]")
    );
    assert_eq!(
        eval("function* g() {} Object.getPrototypeOf(g()) === g.prototype"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_default_parameters_run_before_generator_object_exists() {
    assert_eq!(
        eval(
            "function* g(a = (g.prototype = null)) { yield 1; }
             var it = g();
             Object.getPrototypeOf(it) === Object.getPrototypeOf(g).prototype"
        ),
        JsValue::Boolean(true)
    );
    assert_eq!(
        eval(
            "var custom = { marker: 'custom' };
             function* g(a = (g.prototype = custom)) {}
             g().marker"
        ),
        s("custom")
    );
}

#[test]
fn test_default_parameter_errors_escape_before_generator_creation() {
    assert_eq!(
        eval(
            "var created = false;
             function* g(a = (function() { throw new Error('early'); })()) { created = true; }
             var message;
             try { g(); } catch (e) { message = e.message; }
             message + ':' + created"
        ),
        s("early:false")
    );
}

#[test]
fn test_generator_is_not_reentrant() {
    assert!(throws_error(
        "var it; function* g() { it.next(); yield 1; } it = g(); it.next()",
        "already running"
    ));
}

#[test]
fn test_generator_closures_keep_state() {
    assert_eq!(
        eval(
            "function* fib() { let [a, b] = [0, 1]; while (true) { yield a; [a, b] = [b, a + b]; } }
             var out = []; for (var n of fib()) { if (out.length === 8) break; out.push(n); }
             out.join(' ')"
        ),
        s("0 1 1 2 3 5 8 13")
    );
}

#[test]
fn test_loop_bindings_are_shared_inside_generators() {
    assert_eq!(
        eval(
            "function* g() {
                 var fs = [];
                 for (let i = 0; i < 3; i++) fs.push(function () { return i; });
                 yield fs.map(function (f) { return f(); }).join();
             }
             g().next().value"
        ),
        s("3,3,3")
    );
    assert_eq!(
        eval(
            "function f() {
                 var fs = [];
                 for (let i = 0; i < 3; i++) fs.push(function () { return i; });
                 return fs.map(function (f) { return f(); }).join();
             }
             f()"
        ),
        s("0,1,2")
    );
}

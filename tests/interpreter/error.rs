//! Error objects, engine errors surfacing as script exceptions, uncaught throws

use super::{eval, eval_err, s, throws_error};
use jsrun::{JsError, JsValue};

#[test]
fn test_error_construction() {
    assert_eq!(eval("var e = new Error('boom'); e.name + ':' + e.message"), s("Error:boom"));
    assert_eq!(eval("String(new RangeError('r'))"), s("RangeError: r"));
    assert_eq!(eval("String(TypeError('called'))"), s("TypeError: called"));
    assert_eq!(eval("String(new Error())"), s("Error"));
    assert_eq!(eval("new Error().hasOwnProperty('message')"), JsValue::Boolean(false));
    assert_eq!(eval("new Error('').hasOwnProperty('message')"), JsValue::Boolean(true));
    assert_eq!(eval("new Error('x', {cause: 42}).cause"), JsValue::Number(42.0));
    assert_eq!(eval("typeof new Error('x').stack"), s("string"));
}

#[test]
fn test_error_hierarchy() {
    assert_eq!(
        eval("var e = new TypeError('t'); [e instanceof TypeError, e instanceof Error, e instanceof RangeError].join()"),
        s("true,true,false")
    );
    assert_eq!(eval("Object.getPrototypeOf(SyntaxError) === Error"), JsValue::Boolean(true));
    assert_eq!(eval("Object.getPrototypeOf(URIError.prototype) === Error.prototype"), JsValue::Boolean(true));
    assert_eq!(eval("Object.keys(new Error('m')).length"), JsValue::Number(0.0));
}

#[test]
fn test_engine_errors_are_catchable_objects() {
    assert_eq!(
        eval("try { undefined.x; } catch (e) { e instanceof TypeError && e.constructor === TypeError; }"),
        JsValue::Boolean(true)
    );
    assert_eq!(eval("try { missing; } catch (e) { e.name + ': ' + e.message; }"), s("ReferenceError: \"missing\" is not defined."));
    assert_eq!(eval("try { null(); } catch (e) { e.name; }"), s("TypeError"));
    assert_eq!(eval("try { new Array(-1); } catch (e) { e instanceof RangeError; }"), JsValue::Boolean(true));
}

#[test]
fn test_uncaught_errors_surface_to_the_host() {
    assert!(matches!(eval_err("undeclared"), JsError::ReferenceError { .. }));
    assert!(matches!(eval_err("null.x"), JsError::TypeError { .. }));
    assert_eq!(eval_err("throw new Error('custom')").to_string(), "Error: custom");
    assert_eq!(eval_err("throw 42").to_string(), "42");
    let err = eval_err("throw {code: 7}");
    let JsError::Thrown { value, .. } = err else {
        panic!("expected a thrown value");
    };
    assert!(value.is_object());
}

#[test]
fn test_rethrow_keeps_identity() {
    assert_eq!(
        eval(
            "var original = new Error('x'), seen;
             try { try { throw original; } catch (e) { throw e; } } catch (e) { seen = e; }
             seen === original"
        ),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_errors_from_native_callbacks_propagate() {
    assert_eq!(
        eval("try { [1, 2].map(x => { throw new Error('in map ' + x); }); } catch (e) { e.message; }"),
        s("in map 1")
    );
    assert!(throws_error("JSON.parse('{bad')", "SyntaxError"));
}

#[test]
fn test_error_to_string_generic() {
    assert_eq!(eval("Error.prototype.toString.call({name: 'N', message: 'M'})"), s("N: M"));
    assert_eq!(eval("Error.prototype.toString.call({message: 'only'})"), s("Error: only"));
    assert!(throws_error("Error.prototype.toString.call(1)", "TypeError"));
}

//! Built-in function implementations for the JavaScript standard library
//!
//! Every realm gets its own copy: the intrinsic prototypes are created empty by the
//! realm and filled in here, then the constructors and namespaces are installed on
//! the realm's global object.

pub mod array;
pub mod boolean;
pub mod console;
pub mod date;
pub mod error;
pub mod function;
pub mod generator;
pub mod global;
pub mod json;
pub mod map;
pub mod math;
pub mod number;
pub mod object;
pub mod regexp;
pub mod set;
pub mod string;
pub mod symbol;

pub use json::{js_value_to_json, json_to_js_value};

use crate::interpreter::Interpreter;
use crate::value::JsValue;

/// Populate the current realm: intrinsic prototypes first, then globals
pub fn init_standard_library(interp: &mut Interpreter) {
    object::init_object_prototype(interp);
    function::init_function_prototype(interp);
    array::init_array_prototype(interp);
    string::init_string_prototype(interp);
    number::init_number_prototype(interp);
    boolean::init_boolean_prototype(interp);
    symbol::init_symbol_prototype(interp);
    error::init_error_prototypes(interp);
    generator::init_iterator_prototypes(interp);
    regexp::init_regexp_prototype(interp);
    map::init_map_prototype(interp);
    set::init_set_prototype(interp);
    date::init_date_prototype(interp);

    let object = object::create_object_constructor(interp);
    interp.define_global("Object", JsValue::Object(object));
    let function = function::create_function_constructor(interp);
    interp.define_global("Function", JsValue::Object(function));
    let array = array::create_array_constructor(interp);
    interp.define_global("Array", JsValue::Object(array));
    let string = string::create_string_constructor(interp);
    interp.define_global("String", JsValue::Object(string));
    let boolean = boolean::create_boolean_constructor(interp);
    interp.define_global("Boolean", JsValue::Object(boolean));
    let symbol = symbol::create_symbol_constructor(interp);
    interp.define_global("Symbol", JsValue::Object(symbol));
    let regexp = regexp::create_regexp_constructor(interp);
    interp.define_global("RegExp", JsValue::Object(regexp));
    let map = map::create_map_constructor(interp);
    interp.define_global("Map", JsValue::Object(map));
    let set = set::create_set_constructor(interp);
    interp.define_global("Set", JsValue::Object(set));
    let date = date::create_date_constructor(interp);
    interp.define_global("Date", JsValue::Object(date));
    error::register_error_constructors(interp);

    // Number statics share parseInt/parseFloat with the global object
    global::register_global_functions(interp);
    let number = number::create_number_constructor(interp);
    interp.define_global("Number", JsValue::Object(number));

    let math = math::create_math_object(interp);
    interp.define_global("Math", JsValue::Object(math));
    let json = json::create_json_object(interp);
    interp.define_global("JSON", JsValue::Object(json));
    let console = console::create_console_object(interp);
    interp.define_global("console", JsValue::Object(console));
}

/// Argument `index`, or `undefined` when the caller passed fewer
#[inline]
pub(crate) fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or(JsValue::Undefined)
}

//! Function.prototype built-in methods (call, apply, bind) and Function constructor

use crate::error::JsError;
use crate::interpreter::{create_bound_function, Interpreter};
use crate::object::{Callable, JsObjectRef};
use crate::value::{CheapClone, JsString, JsValue, PropertyKey, WellKnownSymbol};

use super::arg;

/// Initialize Function.prototype with call, apply, bind methods
pub fn init_function_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().function_prototype.cheap_clone();

    interp.register_method(&proto, "call", function_call, 1);
    interp.register_method(&proto, "apply", function_apply, 2);
    interp.register_method(&proto, "bind", function_bind, 1);
    interp.register_method(&proto, "toString", function_to_string, 0);
    interp.register_symbol_method(&proto, WellKnownSymbol::HasInstance, function_has_instance, 1);
}

/// Create the global Function constructor
pub fn create_function_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().function_prototype.cheap_clone();
    interp.create_native_constructor(
        "Function",
        function_constructor_fn,
        function_construct,
        1,
        &proto,
    )
}

/// The Function constructor: new Function([p1[, p2[, ...pN]],] body)
///
/// The last argument is the body, the ones before it parameter lists. The function
/// closes over the global scope of the current realm, never the caller's.
fn function_constructor_fn(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(interp.to_js_string(value)?.to_string());
    }
    let body = parts.pop().unwrap_or_default();
    let source = format!("(function anonymous({}\n) {{\n{}\n}})", parts.join(","), body);

    let template = interp.compile_source(&source, "Function", 1)?;
    let realm = interp.realm().cheap_clone();
    interp.run_script(&template, &realm)
}

fn function_construct(
    interp: &mut Interpreter,
    args: &[JsValue],
    _new_target: &JsObjectRef,
) -> Result<JsValue, JsError> {
    function_constructor_fn(interp, JsValue::Undefined, args)
}

// Function.prototype.call - call function with specified this value and arguments
pub fn function_call(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_callable() {
        return Err(JsError::type_error("Function.prototype.call called on non-function"));
    }
    let this_arg = arg(args, 0);
    let call_args = args.get(1..).unwrap_or_default();
    interp.call_function(&this, this_arg, call_args)
}

/// CreateListFromArrayLike
pub(crate) fn array_like_to_vec(interp: &mut Interpreter, value: &JsValue) -> Result<Vec<JsValue>, JsError> {
    match value {
        JsValue::Undefined | JsValue::Null => Ok(Vec::new()),
        JsValue::Object(obj) => {
            if let Some(elements) = obj.borrow().array_elements() {
                return Ok(elements);
            }
            let length = interp.get_named(value, "length")?;
            let length = interp.to_length(&length)?;
            let mut values = Vec::with_capacity(length.min(1024));
            for i in 0..length {
                values.push(interp.get(value, &PropertyKey::Index(i as u32))?);
            }
            Ok(values)
        }
        other => Err(JsError::type_error(format!(
            "CreateListFromArrayLike called on non-object {}",
            interp.display_value(other)
        ))),
    }
}

// Function.prototype.apply - call function with specified this value and array of arguments
pub fn function_apply(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_callable() {
        return Err(JsError::type_error("Function.prototype.apply was called on a non-function"));
    }
    let this_arg = arg(args, 0);
    let call_args = array_like_to_vec(interp, &arg(args, 1))?;
    interp.call_function(&this, this_arg, &call_args)
}

// Function.prototype.bind - create a new function with bound this value and pre-filled arguments
pub fn function_bind(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = match &this {
        JsValue::Object(f) if f.borrow().is_callable() => f.cheap_clone(),
        _ => return Err(JsError::type_error("Bind must be called on a function")),
    };
    let this_arg = arg(args, 0);
    let bound_args: Vec<JsValue> = args.iter().skip(1).cloned().collect();
    let bound_count = bound_args.len() as f64;

    let target_length = match interp.get_named(&this, "length")? {
        JsValue::Number(n) => n,
        _ => 0.0,
    };
    let length = (target_length - bound_count).max(0.0);
    let target_name = match interp.get_named(&this, "name")? {
        JsValue::String(s) => s,
        _ => JsString::from(""),
    };

    let bound = create_bound_function(target, this_arg, bound_args);
    let name = JsString::from(format!("bound {}", target_name));
    interp.define_name_and_length(&bound, name, length as u32);
    Ok(JsValue::Object(bound))
}

/// Function.prototype.toString: the source text of script functions
pub fn function_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let Some(obj) = this.as_object() else {
        return Err(JsError::type_error(
            "Function.prototype.toString requires that 'this' be a Function",
        ));
    };
    let rendered = match obj.borrow().callable() {
        Some(Callable::Script(_)) => None,
        Some(other) => Some(format!("function {}() {{ [native code] }}", other.debug_name())),
        None => {
            return Err(JsError::type_error(
                "Function.prototype.toString requires that 'this' be a Function",
            ));
        }
    };
    Ok(JsValue::from(rendered.unwrap_or_else(|| interp.display_value(&this))))
}

/// Function.prototype[Symbol.hasInstance]
pub fn function_has_instance(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    interp.ordinary_has_instance(&this, &value).map(JsValue::Boolean)
}

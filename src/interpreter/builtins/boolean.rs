//! Boolean built-in constructor and prototype methods

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::value::{CheapClone, JsValue};

use super::arg;

/// Initialize Boolean.prototype with toString, valueOf
pub fn init_boolean_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().boolean_prototype.cheap_clone();

    interp.register_method(&proto, "toString", boolean_to_string, 0);
    interp.register_method(&proto, "valueOf", boolean_value_of, 0);
}

/// Create Boolean constructor with prototype property
pub fn create_boolean_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().boolean_prototype.cheap_clone();
    interp.create_native_constructor("Boolean", boolean_constructor_fn, boolean_construct, 1, &proto)
}

/// Boolean(value) converts to a primitive boolean
pub fn boolean_constructor_fn(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(arg(args, 0).to_boolean()))
}

/// new Boolean(value) creates a wrapper object
fn boolean_construct(interp: &mut Interpreter, args: &[JsValue], new_target: &JsObjectRef) -> Result<JsValue, JsError> {
    let value = arg(args, 0).to_boolean();
    let proto = interp.prototype_from_constructor(new_target, |i| &i.boolean_prototype)?;
    Ok(JsValue::Object(
        JsObject::new(Some(proto), ObjectKind::Boolean(value)).into_ref(),
    ))
}

/// thisBooleanValue
fn this_boolean_value(this: &JsValue, method: &str) -> Result<bool, JsError> {
    match this {
        JsValue::Boolean(b) => Ok(*b),
        JsValue::Object(obj) => match obj.borrow().kind {
            ObjectKind::Boolean(b) => Ok(b),
            _ => Err(JsError::type_error(format!(
                "Boolean.prototype.{} requires that 'this' be a Boolean",
                method
            ))),
        },
        _ => Err(JsError::type_error(format!(
            "Boolean.prototype.{} requires that 'this' be a Boolean",
            method
        ))),
    }
}

pub fn boolean_to_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let b = this_boolean_value(&this, "toString")?;
    Ok(JsValue::from(if b { "true" } else { "false" }))
}

pub fn boolean_value_of(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    this_boolean_value(&this, "valueOf").map(JsValue::Boolean)
}

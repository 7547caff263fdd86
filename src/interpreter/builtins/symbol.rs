//! Symbol built-in object implementation
//!
//! `Symbol.for` keys live in the interpreter's registry, shared by every realm it
//! owns. Well-known symbols are process-wide constants.

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{JsObjectRef, ObjectKind};
use crate::value::{CheapClone, JsString, JsSymbol, JsValue, Property, WellKnownSymbol};

use super::arg;

/// Initialize Symbol.prototype
pub fn init_symbol_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().symbol_prototype.cheap_clone();

    interp.register_method(&proto, "toString", symbol_to_string, 0);
    interp.register_method(&proto, "valueOf", symbol_value_of, 0);
    interp.register_symbol_method(&proto, WellKnownSymbol::ToPrimitive, symbol_value_of, 1);
    let description = interp.key("description");
    interp.register_getter(&proto, description, symbol_description);
    proto.borrow_mut().define_raw(
        WellKnownSymbol::ToStringTag.key(),
        Property::with_attributes(JsValue::from("Symbol"), false, false, true),
    );
}

/// Create the Symbol constructor function object: callable, never constructible
pub fn create_symbol_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().symbol_prototype.cheap_clone();
    let constructor = interp.create_native_function("Symbol", symbol_constructor_fn, 0);

    let prototype_key = interp.key("prototype");
    constructor.borrow_mut().define_raw(
        prototype_key,
        Property::with_attributes(JsValue::Object(proto.cheap_clone()), false, false, false),
    );
    interp.define_hidden(&proto, "constructor", JsValue::Object(constructor.cheap_clone()));

    interp.register_method(&constructor, "for", symbol_for, 1);
    interp.register_method(&constructor, "keyFor", symbol_key_for, 1);

    for symbol in WellKnownSymbol::ALL {
        let key = interp.key(symbol.property_name());
        constructor.borrow_mut().define_raw(
            key,
            Property::with_attributes(
                JsValue::Symbol(JsSymbol::well_known(symbol)),
                false,
                false,
                false,
            ),
        );
    }

    constructor
}

/// Symbol([description])
fn symbol_constructor_fn(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let description = match arg(args, 0) {
        JsValue::Undefined => None,
        other => Some(interp.to_js_string(&other)?),
    };
    Ok(JsValue::Symbol(JsSymbol::new(description)))
}

/// Symbol.for(key): one symbol per key, shared across realms
fn symbol_for(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let key = interp.to_js_string(&arg(args, 0))?;
    Ok(JsValue::Symbol(interp.registered_symbol(key)))
}

/// Symbol.keyFor(sym): the registry key, or undefined for unregistered symbols
fn symbol_key_for(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    match arg(args, 0) {
        JsValue::Symbol(symbol) => Ok(interp
            .symbol_key_for(&symbol)
            .map_or(JsValue::Undefined, JsValue::String)),
        other => Err(JsError::type_error(format!(
            "{} is not a symbol",
            interp.display_value(&other)
        ))),
    }
}

/// thisSymbolValue
fn this_symbol_value(this: &JsValue, method: &str) -> Result<JsSymbol, JsError> {
    match this {
        JsValue::Symbol(s) => Ok(s.cheap_clone()),
        JsValue::Object(obj) => match &obj.borrow().kind {
            ObjectKind::Symbol(s) => Ok(s.cheap_clone()),
            _ => Err(JsError::type_error(format!(
                "Symbol.prototype.{} requires that 'this' be a Symbol",
                method
            ))),
        },
        _ => Err(JsError::type_error(format!(
            "Symbol.prototype.{} requires that 'this' be a Symbol",
            method
        ))),
    }
}

fn symbol_to_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let symbol = this_symbol_value(&this, "toString")?;
    Ok(JsValue::from(symbol.descriptive_string()))
}

fn symbol_value_of(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    this_symbol_value(&this, "valueOf").map(JsValue::Symbol)
}

fn symbol_description(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let symbol = this_symbol_value(&this, "description")?;
    Ok(symbol
        .description()
        .map_or(JsValue::Undefined, |d: &JsString| JsValue::String(d.cheap_clone())))
}

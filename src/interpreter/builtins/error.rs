//! Error constructors and Error.prototype
//!
//! The seven native error constructors share one implementation; each kind only
//! differs in the intrinsic prototype its instances fall back to.

use crate::error::JsError;
use crate::interpreter::{ErrorKind, Interpreter};
use crate::object::{JsObjectRef, NativeConstructFn, NativeFn};
use crate::value::{CheapClone, JsValue};

use super::arg;

/// Give every error prototype its `name` and empty `message`, plus `toString` on
/// Error.prototype
pub fn init_error_prototypes(interp: &mut Interpreter) {
    for kind in ErrorKind::ALL {
        let proto = interp.intrinsics().error_prototype(kind).cheap_clone();
        interp.define_hidden(&proto, "name", JsValue::from(kind.name()));
        interp.define_hidden(&proto, "message", JsValue::from(""));
    }
    let error_proto = interp.intrinsics().error_prototype(ErrorKind::Error).cheap_clone();
    interp.register_method(&error_proto, "toString", error_to_string, 0);
}

/// Create `Error` and the derived constructors and install them as globals
pub fn register_error_constructors(interp: &mut Interpreter) {
    let mut base: Option<JsObjectRef> = None;
    for kind in ErrorKind::ALL {
        let proto = interp.intrinsics().error_prototype(kind).cheap_clone();
        let (call, construct) = constructor_fns(kind);
        let ctor = interp.create_native_constructor(kind.name(), call, construct, 1, &proto);
        match &base {
            // Derived constructors inherit from Error itself
            Some(error_ctor) => ctor.borrow_mut().prototype = Some(error_ctor.cheap_clone()),
            None => base = Some(ctor.cheap_clone()),
        }
        interp.define_global(kind.name(), JsValue::Object(ctor));
    }
}

/// Build an error instance: `message` and `options.cause` become own properties
fn build_error(
    interp: &mut Interpreter,
    proto: JsObjectRef,
    kind: ErrorKind,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let message = match arg(args, 0) {
        JsValue::Undefined => None,
        other => Some(interp.to_js_string(&other)?),
    };
    let error = interp.create_error_with_proto(
        proto,
        kind.name(),
        message.as_ref().map_or("", |m| m.as_str()),
    );
    if let Some(message) = message.filter(|m| m.is_empty()) {
        interp.define_hidden(&error, "message", JsValue::String(message));
    }

    let options = arg(args, 1);
    if let JsValue::Object(options_obj) = &options {
        let cause_key = interp.key("cause");
        if interp.has_property(options_obj, &cause_key) {
            let cause = interp.get(&options, &cause_key)?;
            interp.define_hidden(&error, "cause", cause);
        }
    }
    Ok(JsValue::Object(error))
}

macro_rules! error_constructors {
    ($($kind:ident => $call:ident, $construct:ident;)*) => {
        $(
            fn $call(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
                let proto = interp.intrinsics().error_prototype(ErrorKind::$kind).cheap_clone();
                build_error(interp, proto, ErrorKind::$kind, args)
            }

            fn $construct(
                interp: &mut Interpreter,
                args: &[JsValue],
                new_target: &JsObjectRef,
            ) -> Result<JsValue, JsError> {
                let proto = interp
                    .prototype_from_constructor(new_target, |i| i.error_prototype(ErrorKind::$kind))?;
                build_error(interp, proto, ErrorKind::$kind, args)
            }
        )*

        fn constructor_fns(kind: ErrorKind) -> (NativeFn, NativeConstructFn) {
            match kind {
                $(ErrorKind::$kind => ($call, $construct),)*
            }
        }
    };
}

error_constructors! {
    Error => error_call, error_construct;
    TypeError => type_error_call, type_error_construct;
    RangeError => range_error_call, range_error_construct;
    ReferenceError => reference_error_call, reference_error_construct;
    SyntaxError => syntax_error_call, syntax_error_construct;
    EvalError => eval_error_call, eval_error_construct;
    UriError => uri_error_call, uri_error_construct;
}

/// Error.prototype.toString: `name: message`, either part dropped when empty
pub fn error_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_object() {
        return Err(JsError::type_error(
            "Error.prototype.toString requires that 'this' be an Object",
        ));
    }
    let name = match interp.get_named(&this, "name")? {
        JsValue::Undefined => "Error".to_string(),
        other => interp.to_js_string(&other)?.to_string(),
    };
    let message = match interp.get_named(&this, "message")? {
        JsValue::Undefined => String::new(),
        other => interp.to_js_string(&other)?.to_string(),
    };
    Ok(JsValue::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    }))
}


//! Console built-in methods
//!
//! Output goes through the `log` facade; the embedder decides where it lands.

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::JsObjectRef;
use crate::value::JsValue;

/// Create the console object with log, error, warn, info and debug
pub fn create_console_object(interp: &mut Interpreter) -> JsObjectRef {
    let console = interp.create_object();
    interp.register_method(&console, "log", console_log, 0);
    interp.register_method(&console, "info", console_info, 0);
    interp.register_method(&console, "warn", console_warn, 0);
    interp.register_method(&console, "error", console_error, 0);
    interp.register_method(&console, "debug", console_debug, 0);
    console
}

/// Arguments converted with ToString and joined by spaces
fn format_args(interp: &mut Interpreter, args: &[JsValue]) -> Result<String, JsError> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(match value {
            JsValue::Symbol(s) => s.descriptive_string(),
            other => interp.to_js_string(other)?.to_string(),
        });
    }
    Ok(parts.join(" "))
}

pub fn console_log(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    log::info!("{}", format_args(interp, args)?);
    Ok(JsValue::Undefined)
}

pub fn console_info(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    log::info!("{}", format_args(interp, args)?);
    Ok(JsValue::Undefined)
}

pub fn console_warn(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    log::warn!("{}", format_args(interp, args)?);
    Ok(JsValue::Undefined)
}

pub fn console_error(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    log::error!("{}", format_args(interp, args)?);
    Ok(JsValue::Undefined)
}

pub fn console_debug(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    log::debug!("{}", format_args(interp, args)?);
    Ok(JsValue::Undefined)
}

//! Number built-in constructor, statics and prototype methods

use crate::error::JsError;
use crate::interpreter::{data_value, Interpreter};
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::value::{number_to_string, number_to_string_radix, CheapClone, JsValue, Property};

use super::arg;

/// Largest integer `n` such that `n` and `n + 1` are both exactly representable
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Initialize Number.prototype
pub fn init_number_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().number_prototype.cheap_clone();

    interp.register_method(&proto, "toString", number_to_string_method, 1);
    interp.register_method(&proto, "toLocaleString", number_to_locale_string, 0);
    interp.register_method(&proto, "toFixed", number_to_fixed, 1);
    interp.register_method(&proto, "toPrecision", number_to_precision, 1);
    interp.register_method(&proto, "valueOf", number_value_of, 0);
}

/// Create the Number constructor with its constants and statics
///
/// `parseInt`/`parseFloat` are the very functions installed on the global object,
/// so the globals must exist first.
pub fn create_number_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().number_prototype.cheap_clone();
    let constructor =
        interp.create_native_constructor("Number", number_constructor_fn, number_construct, 1, &proto);

    let constants = [
        ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
        ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
        ("EPSILON", f64::EPSILON),
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("NaN", f64::NAN),
    ];
    for (name, value) in constants {
        let key = interp.key(name);
        constructor.borrow_mut().define_raw(key, Property::constant(JsValue::Number(value)));
    }

    interp.register_method(&constructor, "isInteger", number_is_integer, 1);
    interp.register_method(&constructor, "isSafeInteger", number_is_safe_integer, 1);
    interp.register_method(&constructor, "isFinite", number_is_finite, 1);
    interp.register_method(&constructor, "isNaN", number_is_nan, 1);

    let global = interp.global();
    for name in ["parseInt", "parseFloat"] {
        let key = interp.key(name);
        if let Some(f) = data_value(&global, &key) {
            interp.define_hidden(&constructor, name, f);
        }
    }

    constructor
}

/// Number(value): ToNumeric, 0 without arguments
pub fn number_constructor_fn(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    match args.first() {
        None => Ok(JsValue::Number(0.0)),
        Some(value) => Ok(JsValue::Number(interp.to_number(value)?)),
    }
}

fn number_construct(interp: &mut Interpreter, args: &[JsValue], new_target: &JsObjectRef) -> Result<JsValue, JsError> {
    let value = match args.first() {
        None => 0.0,
        Some(value) => interp.to_number(value)?,
    };
    let proto = interp.prototype_from_constructor(new_target, |i| &i.number_prototype)?;
    Ok(JsValue::Object(
        JsObject::new(Some(proto), ObjectKind::Number(value)).into_ref(),
    ))
}

/// thisNumberValue
fn this_number_value(this: &JsValue, method: &str) -> Result<f64, JsError> {
    match this {
        JsValue::Number(n) => Ok(*n),
        JsValue::Object(obj) => match obj.borrow().kind {
            ObjectKind::Number(n) => Ok(n),
            _ => Err(JsError::type_error(format!(
                "Number.prototype.{} requires that 'this' be a Number",
                method
            ))),
        },
        _ => Err(JsError::type_error(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            method
        ))),
    }
}

// ============ STATICS ============

fn is_integral(value: &JsValue) -> Option<f64> {
    match value {
        JsValue::Number(n) if n.is_finite() && n.trunc() == *n => Some(*n),
        _ => None,
    }
}

pub fn number_is_integer(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(is_integral(&arg(args, 0)).is_some()))
}

pub fn number_is_safe_integer(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(
        is_integral(&arg(args, 0)).is_some_and(|n| n.abs() <= MAX_SAFE_INTEGER),
    ))
}

/// Number.isFinite: no coercion, unlike the global
pub fn number_is_finite(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(matches!(arg(args, 0), JsValue::Number(n) if n.is_finite())))
}

/// Number.isNaN: no coercion, unlike the global
pub fn number_is_nan(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(matches!(arg(args, 0), JsValue::Number(n) if n.is_nan())))
}

// ============ PROTOTYPE ============

pub fn number_value_of(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    this_number_value(&this, "valueOf").map(JsValue::Number)
}

/// Number.prototype.toString([radix])
pub fn number_to_string_method(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = this_number_value(&this, "toString")?;
    let radix = match arg(args, 0) {
        JsValue::Undefined => 10.0,
        other => interp.to_integer(&other)?,
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(JsError::range_error("toString() radix must be between 2 and 36"));
    }
    let radix = radix as u32;
    Ok(JsValue::from(if radix == 10 {
        number_to_string(n)
    } else {
        number_to_string_radix(n, radix)
    }))
}

pub fn number_to_locale_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = this_number_value(&this, "toLocaleString")?;
    Ok(JsValue::from(number_to_string(n)))
}

/// Fixed-point rendering with ties rounded away from zero
fn format_fixed(n: f64, digits: usize) -> String {
    let magnitude = n.abs();
    let scale = 10f64.powi(digits as i32);
    let scaled = magnitude * scale;
    // Exact ties: the formatter rounds half to even
    let rendered = if scaled.fract() == 0.5 && scaled < 2f64.powi(52) {
        let rounded = scaled.ceil() / scale;
        format!("{:.*}", digits, rounded)
    } else {
        format!("{:.*}", digits, magnitude)
    };
    if n < 0.0 {
        format!("-{}", rendered)
    } else {
        rendered
    }
}

/// Number.prototype.toFixed(digits)
pub fn number_to_fixed(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = this_number_value(&this, "toFixed")?;
    let digits = interp.to_integer(&arg(args, 0))?;
    if !(0.0..=100.0).contains(&digits) {
        return Err(JsError::range_error("toFixed() digits argument must be between 0 and 100"));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(JsValue::from(number_to_string(n)));
    }
    Ok(JsValue::from(format_fixed(n, digits as usize)))
}

/// Number.prototype.toPrecision(precision)
pub fn number_to_precision(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = this_number_value(&this, "toPrecision")?;
    let precision = arg(args, 0);
    if precision.is_undefined() || !n.is_finite() {
        return Ok(JsValue::from(number_to_string(n)));
    }
    let precision = interp.to_integer(&precision)?;
    if !(1.0..=100.0).contains(&precision) {
        return Err(JsError::range_error("toPrecision() argument must be between 1 and 100"));
    }
    let precision = precision as usize;
    if n == 0.0 {
        return Ok(JsValue::from(format_fixed(0.0, precision - 1)));
    }

    let scientific = format!("{:.*e}", precision - 1, n);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -6 || exponent >= precision as i32 {
        let sign = if exponent >= 0 { "+" } else { "-" };
        return Ok(JsValue::from(format!("{}e{}{}", mantissa, sign, exponent.abs())));
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    Ok(JsValue::from(format!("{:.*}", decimals, n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_rounds_ties_away_from_zero() {
        assert_eq!(format_fixed(2.5, 0), "3");
        assert_eq!(format_fixed(1.25, 1), "1.3");
        assert_eq!(format_fixed(3.14159, 2), "3.14");
        assert_eq!(format_fixed(-1.5, 0), "-2");
        assert_eq!(format_fixed(-0.0, 2), "0.00");
    }
}

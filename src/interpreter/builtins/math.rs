//! Math built-in methods

use std::cell::Cell;

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::JsObjectRef;
use crate::value::{JsValue, Property, WellKnownSymbol};

use super::arg;

/// Create Math object with all math methods and constants
pub fn create_math_object(interp: &mut Interpreter) -> JsObjectRef {
    let math = interp.create_object();

    let constants = [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ];
    for (name, value) in constants {
        let key = interp.key(name);
        math.borrow_mut().define_raw(key, Property::constant(JsValue::Number(value)));
    }
    math.borrow_mut().define_raw(
        WellKnownSymbol::ToStringTag.key(),
        Property::with_attributes(JsValue::from("Math"), false, false, true),
    );

    // Rounding methods
    interp.register_method(&math, "abs", math_abs, 1);
    interp.register_method(&math, "floor", math_floor, 1);
    interp.register_method(&math, "ceil", math_ceil, 1);
    interp.register_method(&math, "round", math_round, 1);
    interp.register_method(&math, "trunc", math_trunc, 1);
    interp.register_method(&math, "sign", math_sign, 1);

    // Min/max
    interp.register_method(&math, "min", math_min, 2);
    interp.register_method(&math, "max", math_max, 2);

    // Power and root functions
    interp.register_method(&math, "pow", math_pow, 2);
    interp.register_method(&math, "sqrt", math_sqrt, 1);
    interp.register_method(&math, "cbrt", math_cbrt, 1);
    interp.register_method(&math, "hypot", math_hypot, 2);

    // Logarithmic and exponential
    interp.register_method(&math, "log", math_log, 1);
    interp.register_method(&math, "log2", math_log2, 1);
    interp.register_method(&math, "log10", math_log10, 1);
    interp.register_method(&math, "log1p", math_log1p, 1);
    interp.register_method(&math, "exp", math_exp, 1);
    interp.register_method(&math, "expm1", math_expm1, 1);

    // Trigonometric
    interp.register_method(&math, "sin", math_sin, 1);
    interp.register_method(&math, "cos", math_cos, 1);
    interp.register_method(&math, "tan", math_tan, 1);
    interp.register_method(&math, "asin", math_asin, 1);
    interp.register_method(&math, "acos", math_acos, 1);
    interp.register_method(&math, "atan", math_atan, 1);
    interp.register_method(&math, "atan2", math_atan2, 2);
    interp.register_method(&math, "sinh", math_sinh, 1);
    interp.register_method(&math, "cosh", math_cosh, 1);
    interp.register_method(&math, "tanh", math_tanh, 1);

    interp.register_method(&math, "random", math_random, 0);

    math
}

fn number_arg(interp: &mut Interpreter, args: &[JsValue], index: usize) -> Result<f64, JsError> {
    interp.to_number(&arg(args, index))
}

/// Math functions of one argument that map straight onto `f64` methods
macro_rules! unary_math {
    ($($name:ident => $op:expr;)*) => {
        $(
            pub fn $name(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
                let n = number_arg(interp, args, 0)?;
                let op: fn(f64) -> f64 = $op;
                Ok(JsValue::Number(op(n)))
            }
        )*
    };
}

unary_math! {
    math_abs => f64::abs;
    math_floor => f64::floor;
    math_ceil => f64::ceil;
    math_trunc => f64::trunc;
    math_sqrt => f64::sqrt;
    math_cbrt => f64::cbrt;
    math_log => f64::ln;
    math_log2 => f64::log2;
    math_log10 => f64::log10;
    math_log1p => f64::ln_1p;
    math_exp => f64::exp;
    math_expm1 => f64::exp_m1;
    math_sin => f64::sin;
    math_cos => f64::cos;
    math_tan => f64::tan;
    math_asin => f64::asin;
    math_acos => f64::acos;
    math_atan => f64::atan;
    math_sinh => f64::sinh;
    math_cosh => f64::cosh;
    math_tanh => f64::tanh;
}

/// Math.round: halves round towards +Infinity, -0 is preserved
pub fn math_round(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = number_arg(interp, args, 0)?;
    if !n.is_finite() || n == 0.0 {
        return Ok(JsValue::Number(n));
    }
    if (-0.5..0.0).contains(&n) {
        return Ok(JsValue::Number(-0.0));
    }
    Ok(JsValue::Number((n + 0.5).floor()))
}

pub fn math_sign(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = number_arg(interp, args, 0)?;
    Ok(JsValue::Number(if n.is_nan() || n == 0.0 {
        n
    } else if n > 0.0 {
        1.0
    } else {
        -1.0
    }))
}

/// Math.min/Math.max: every argument is converted, NaN wins
fn extremum(interp: &mut Interpreter, args: &[JsValue], max: bool) -> Result<JsValue, JsError> {
    let mut result = if max { f64::NEG_INFINITY } else { f64::INFINITY };
    let mut saw_nan = false;
    for value in args {
        let n = interp.to_number(value)?;
        if n.is_nan() {
            saw_nan = true;
            continue;
        }
        let better = if max {
            n > result || (n == 0.0 && result == 0.0 && result.is_sign_negative())
        } else {
            n < result || (n == 0.0 && result == 0.0 && n.is_sign_negative())
        };
        if better {
            result = n;
        }
    }
    Ok(JsValue::Number(if saw_nan { f64::NAN } else { result }))
}

pub fn math_min(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    extremum(interp, args, false)
}

pub fn math_max(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    extremum(interp, args, true)
}

pub fn math_pow(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let base = number_arg(interp, args, 0)?;
    let exponent = number_arg(interp, args, 1)?;
    Ok(JsValue::Number(crate::interpreter::operators::js_pow(base, exponent)))
}

pub fn math_atan2(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let y = number_arg(interp, args, 0)?;
    let x = number_arg(interp, args, 1)?;
    Ok(JsValue::Number(y.atan2(x)))
}

pub fn math_hypot(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut values = Vec::with_capacity(args.len());
    for value in args {
        values.push(interp.to_number(value)?);
    }
    if values.iter().any(|n| n.is_infinite()) {
        return Ok(JsValue::Number(f64::INFINITY));
    }
    Ok(JsValue::Number(values.iter().map(|n| n * n).sum::<f64>().sqrt()))
}

thread_local! {
    static RANDOM_STATE: Cell<u64> = Cell::new(random_seed());
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x2545_F491_4F6C_DD1D);
    nanos | 1
}

/// xorshift64* over a per-thread state; not suitable for cryptography
pub fn math_random(_interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let bits = RANDOM_STATE.with(|state| {
        let mut x = state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        state.set(x);
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    });
    Ok(JsValue::Number((bits >> 11) as f64 / (1u64 << 53) as f64))
}

//! Global functions and value properties
//!
//! `globalThis`, `undefined`, `NaN`, `Infinity`, `isNaN`, `isFinite`, `parseInt`,
//! `parseFloat`, the URI component codecs, `print` and indirect `eval`.

use crate::error::JsError;
use crate::interpreter::{ErrorKind, Interpreter};
use crate::value::{is_js_whitespace, CheapClone, JsString, JsValue, Property};

use super::arg;

/// Install the global value properties and functions on the current realm's global
pub fn register_global_functions(interp: &mut Interpreter) {
    let global = interp.global();

    interp.define_hidden(&global, "globalThis", JsValue::Object(global.cheap_clone()));
    for (name, value) in [
        ("undefined", JsValue::Undefined),
        ("NaN", JsValue::Number(f64::NAN)),
        ("Infinity", JsValue::Number(f64::INFINITY)),
    ] {
        let key = interp.key(name);
        global.borrow_mut().define_raw(key, Property::constant(value));
    }

    interp.register_method(&global, "isNaN", global_is_nan, 1);
    interp.register_method(&global, "isFinite", global_is_finite, 1);
    interp.register_method(&global, "parseInt", global_parse_int, 2);
    interp.register_method(&global, "parseFloat", global_parse_float, 1);
    interp.register_method(&global, "encodeURIComponent", global_encode_uri_component, 1);
    interp.register_method(&global, "decodeURIComponent", global_decode_uri_component, 1);
    interp.register_method(&global, "print", global_print, 0);
    interp.register_method(&global, "eval", global_eval, 1);
}

pub fn global_is_nan(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = interp.to_number(&arg(args, 0))?;
    Ok(JsValue::Boolean(n.is_nan()))
}

pub fn global_is_finite(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let n = interp.to_number(&arg(args, 0))?;
    Ok(JsValue::Boolean(n.is_finite()))
}

/// parseInt(string, radix): longest valid prefix, NaN when there is none
pub fn global_parse_int(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let input = interp.to_js_string(&arg(args, 0))?;
    let mut radix = interp.to_int32_value(&arg(args, 1))?;
    Ok(JsValue::Number(parse_int(input.as_str(), &mut radix)))
}

fn parse_int(input: &str, radix: &mut i32) -> f64 {
    let s = input.trim_start_matches(is_js_whitespace);
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let mut strip_prefix = true;
    if *radix != 0 {
        if !(2..=36).contains(&*radix) {
            return f64::NAN;
        }
        if *radix != 16 {
            strip_prefix = false;
        }
    } else {
        *radix = 10;
    }
    let s = if strip_prefix {
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(rest) => {
                *radix = 16;
                rest
            }
            None => s,
        }
    } else {
        s
    };

    let mut result = 0.0_f64;
    let mut found_digit = false;
    for c in s.chars() {
        let Some(digit) = c.to_digit(*radix as u32) else {
            break;
        };
        found_digit = true;
        result = result * f64::from(*radix) + f64::from(digit);
    }
    if !found_digit {
        return f64::NAN;
    }
    if negative { -result } else { result }
}

/// parseFloat(string): longest prefix that is a StrDecimalLiteral
pub fn global_parse_float(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let input = interp.to_js_string(&arg(args, 0))?;
    Ok(JsValue::Number(parse_float(input.as_str())))
}

fn parse_float(input: &str) -> f64 {
    let s = input.trim_start_matches(is_js_whitespace);
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let mut end = s.len() - unsigned.len();
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut chars = unsigned.char_indices().peekable();
    let offset = end;
    while let Some(&(i, c)) = chars.peek() {
        match c {
            '0'..='9' => {
                seen_digit = true;
                end = offset + i + 1;
            }
            '.' if !seen_dot => seen_dot = true,
            'e' | 'E' if seen_digit => {
                // Only consume the exponent when digits follow
                let rest = unsigned.get(i + 1..).unwrap_or_default();
                let signless = rest.strip_prefix(['+', '-']).unwrap_or(rest);
                let digits = signless.chars().take_while(char::is_ascii_digit).count();
                if digits > 0 {
                    end = offset + i + 1 + (rest.len() - signless.len()) + digits;
                }
                break;
            }
            _ => break,
        }
        chars.next();
    }
    if !seen_digit {
        return f64::NAN;
    }
    s.get(..end)
        .and_then(|prefix| prefix.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

const URI_UNRESERVED_MARKS: &str = "-_.!~*'()";

fn uri_error(interp: &mut Interpreter, message: &str) -> JsError {
    let error = interp.create_error(ErrorKind::UriError, message);
    interp.throw_value(JsValue::Object(error))
}

pub fn global_encode_uri_component(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_js_string(&arg(args, 0))?;
    let units = s.to_utf16();
    let mut result = String::with_capacity(units.len());
    for c in char::decode_utf16(units.iter().copied()) {
        let Ok(c) = c else {
            return Err(uri_error(interp, "URI malformed"));
        };
        if c.is_ascii_alphanumeric() || URI_UNRESERVED_MARKS.contains(c) {
            result.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    Ok(JsValue::from(result))
}

pub fn global_decode_uri_component(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = interp.to_js_string(&arg(args, 0))?;
    let bytes = s.as_str().as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        if b != b'%' {
            decoded.push(b);
            i += 1;
            continue;
        }
        let byte = bytes
            .get(i + 1..i + 3)
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match byte {
            Some(byte) => decoded.push(byte),
            None => return Err(uri_error(interp, "URI malformed")),
        }
        i += 3;
    }
    match String::from_utf8(decoded) {
        Ok(text) => Ok(JsValue::from(text)),
        Err(_) => Err(uri_error(interp, "URI malformed")),
    }
}

/// print(...values): the string forms separated by spaces, on stdout
pub fn global_print(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(match value {
            JsValue::Symbol(s) => s.descriptive_string(),
            other => interp.to_js_string(other)?.to_string(),
        });
    }
    println!("{}", parts.join(" "));
    Ok(JsValue::Undefined)
}

/// eval(source): always global, whatever the call site
pub fn global_eval(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let source: JsString = match arg(args, 0) {
        JsValue::String(s) => s,
        other => return Ok(other),
    };
    let template = interp.compile_source(source.as_str(), "eval", 1)?;
    let realm = interp.realm().cheap_clone();
    interp.run_script(&template, &realm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(s: &str, radix: i32) -> f64 {
        let mut radix = radix;
        parse_int(s, &mut radix)
    }

    #[test]
    fn parse_int_prefixes_and_radix() {
        assert_eq!(int("  42px", 0), 42.0);
        assert_eq!(int("-0x1F", 0), -31.0);
        assert_eq!(int("ff", 16), 255.0);
        assert_eq!(int("101", 2), 5.0);
        assert!(int("z", 10).is_nan());
        assert!(int("10", 37).is_nan());
    }

    #[test]
    fn parse_float_longest_prefix() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("  -2.5e3x"), -2500.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("abc").is_nan());
    }
}

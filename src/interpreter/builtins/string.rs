//! String built-in methods
//!
//! Positions are UTF-16 code unit offsets, as scripts observe them; methods that
//! index into a string work on its UTF-16 form.

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{JsObject, JsObjectRef, ObjectKind};
use crate::value::{is_js_whitespace, CheapClone, JsString, JsValue, Property, WellKnownSymbol};

use super::arg;
use super::regexp::{builtin_exec, match_from, match_to_array, regexp_data, RegExpMatch};

/// Initialize String.prototype with all string methods
pub fn init_string_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().string_prototype.cheap_clone();

    // Character access
    interp.register_method(&proto, "charAt", string_char_at, 1);
    interp.register_method(&proto, "charCodeAt", string_char_code_at, 1);
    interp.register_method(&proto, "codePointAt", string_code_point_at, 1);
    interp.register_method(&proto, "at", string_at, 1);

    // Search methods
    interp.register_method(&proto, "indexOf", string_index_of, 1);
    interp.register_method(&proto, "lastIndexOf", string_last_index_of, 1);
    interp.register_method(&proto, "includes", string_includes, 1);
    interp.register_method(&proto, "startsWith", string_starts_with, 1);
    interp.register_method(&proto, "endsWith", string_ends_with, 1);
    interp.register_method(&proto, "search", string_search, 1);
    interp.register_method(&proto, "match", string_match, 1);

    // Extraction methods
    interp.register_method(&proto, "slice", string_slice, 2);
    interp.register_method(&proto, "substring", string_substring, 2);
    interp.register_method(&proto, "substr", string_substr, 2);

    // Case conversion
    interp.register_method(&proto, "toLowerCase", string_to_lower_case, 0);
    interp.register_method(&proto, "toUpperCase", string_to_upper_case, 0);

    // Whitespace
    interp.register_method(&proto, "trim", string_trim, 0);
    interp.register_method(&proto, "trimStart", string_trim_start, 0);
    interp.register_method(&proto, "trimEnd", string_trim_end, 0);

    // Transformation
    interp.register_method(&proto, "split", string_split, 2);
    interp.register_method(&proto, "repeat", string_repeat, 1);
    interp.register_method(&proto, "replace", string_replace, 2);
    interp.register_method(&proto, "replaceAll", string_replace_all, 2);
    interp.register_method(&proto, "padStart", string_pad_start, 2);
    interp.register_method(&proto, "padEnd", string_pad_end, 2);
    interp.register_method(&proto, "concat", string_concat, 1);
    interp.register_method(&proto, "localeCompare", string_locale_compare, 1);

    interp.register_method(&proto, "valueOf", string_value_of, 0);
    interp.register_method(&proto, "toString", string_to_string, 0);
    interp.register_symbol_method(&proto, WellKnownSymbol::Iterator, string_iterator, 0);

    let iterator_proto = interp.intrinsics().string_iterator_prototype.cheap_clone();
    interp.register_method(&iterator_proto, "next", string_iterator_next, 0);
    iterator_proto.borrow_mut().define_raw(
        WellKnownSymbol::ToStringTag.key(),
        Property::with_attributes(JsValue::from("String Iterator"), false, false, true),
    );
}

/// Create String constructor with static methods
pub fn create_string_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().string_prototype.cheap_clone();
    let constructor =
        interp.create_native_constructor("String", string_constructor_fn, string_construct, 1, &proto);

    interp.register_method(&constructor, "fromCharCode", string_from_char_code, 1);
    interp.register_method(&constructor, "fromCodePoint", string_from_code_point, 1);
    interp.register_method(&constructor, "raw", string_raw, 1);

    constructor
}

/// String(value): symbols convert to their descriptive string when called
pub fn string_constructor_fn(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    match args.first() {
        None => Ok(JsValue::from("")),
        Some(JsValue::Symbol(s)) => Ok(JsValue::from(s.descriptive_string())),
        Some(value) => Ok(JsValue::String(interp.to_js_string(value)?)),
    }
}

fn string_construct(interp: &mut Interpreter, args: &[JsValue], new_target: &JsObjectRef) -> Result<JsValue, JsError> {
    let value = match args.first() {
        None => JsString::from(""),
        Some(value) => interp.to_js_string(value)?,
    };
    let proto = interp.prototype_from_constructor(new_target, |i| &i.string_prototype)?;
    Ok(JsValue::Object(
        JsObject::new(Some(proto), ObjectKind::String(value)).into_ref(),
    ))
}

// ============ HELPERS ============

/// RequireObjectCoercible(this) then ToString
fn this_string(interp: &mut Interpreter, this: &JsValue, method: &str) -> Result<JsString, JsError> {
    if this.is_null_or_undefined() {
        return Err(JsError::type_error(format!(
            "String.prototype.{} called on null or undefined",
            method
        )));
    }
    interp.to_js_string(this)
}

/// thisStringValue: a primitive string or a String wrapper
fn this_string_value(this: &JsValue, method: &str) -> Result<JsString, JsError> {
    match this {
        JsValue::String(s) => Ok(s.cheap_clone()),
        JsValue::Object(obj) => match &obj.borrow().kind {
            ObjectKind::String(s) => Ok(s.cheap_clone()),
            _ => Err(JsError::type_error(format!(
                "String.prototype.{} requires that 'this' be a String",
                method
            ))),
        },
        _ => Err(JsError::type_error(format!(
            "String.prototype.{} requires that 'this' be a String",
            method
        ))),
    }
}

fn from_units(units: &[u16]) -> JsValue {
    JsValue::String(JsString::from_utf16(units))
}

fn units_range(units: &[u16], start: usize, end: usize) -> &[u16] {
    units.get(start..end.max(start)).unwrap_or_default()
}

/// First occurrence of `needle` at or after `from`
fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack.get(i..i + needle.len()) == Some(needle))
}

/// Integer position argument clamped into `0..=len`, `default` when undefined
fn clamp_position(interp: &mut Interpreter, value: &JsValue, len: usize, default: usize) -> Result<usize, JsError> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = interp.to_integer(value)?;
    Ok(n.clamp(0.0, len as f64) as usize)
}

/// Like [`clamp_position`] but negative values count from the end
fn relative_position(interp: &mut Interpreter, value: &JsValue, len: usize, default: usize) -> Result<usize, JsError> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = interp.to_integer(value)?;
    let len = len as f64;
    let position = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
    Ok(position as usize)
}

fn reject_regexp(value: &JsValue, method: &str) -> Result<(), JsError> {
    if regexp_data(value).is_some() {
        return Err(JsError::type_error(format!(
            "First argument to String.prototype.{} must not be a regular expression",
            method
        )));
    }
    Ok(())
}

// ============ CONSTRUCTOR STATICS ============

pub fn string_from_char_code(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut units = Vec::with_capacity(args.len());
    for value in args {
        units.push(interp.to_uint32_value(value)? as u16);
    }
    Ok(from_units(&units))
}

pub fn string_from_code_point(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut result = String::with_capacity(args.len());
    for value in args {
        let n = interp.to_number(value)?;
        let c = (n.fract() == 0.0 && (0.0..=1_114_111.0).contains(&n))
            .then(|| char::from_u32(n as u32))
            .flatten()
            .ok_or_else(|| JsError::range_error(format!("Invalid code point {}", interp.display_value(value))))?;
        result.push(c);
    }
    Ok(JsValue::from(result))
}

/// String.raw`...`: interleave the raw strings with the substitutions
pub fn string_raw(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let template = JsValue::Object(interp.to_object(&arg(args, 0))?);
    let raw = interp.get_named(&template, "raw")?;
    let raw = JsValue::Object(interp.to_object(&raw)?);
    let length = interp.get_named(&raw, "length")?;
    let length = interp.to_length(&length)?;
    let mut result = String::new();
    for i in 0..length {
        let segment = interp.get(&raw, &crate::value::PropertyKey::from_number(i as f64))?;
        result.push_str(interp.to_js_string(&segment)?.as_str());
        match args.get(i + 1) {
            Some(substitution) if i + 1 < length => {
                result.push_str(interp.to_js_string(substitution)?.as_str());
            }
            _ => {}
        }
    }
    Ok(JsValue::from(result))
}

// ============ CHARACTER ACCESS ============

pub fn string_char_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "charAt")?;
    let position = interp.to_integer(&arg(args, 0))?;
    let units = s.to_utf16();
    if position < 0.0 {
        return Ok(JsValue::from(""));
    }
    Ok(match units.get(position as usize) {
        Some(unit) => from_units(&[*unit]),
        None => JsValue::from(""),
    })
}

pub fn string_char_code_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "charCodeAt")?;
    let position = interp.to_integer(&arg(args, 0))?;
    let units = s.to_utf16();
    if position < 0.0 {
        return Ok(JsValue::Number(f64::NAN));
    }
    Ok(JsValue::Number(
        units.get(position as usize).map_or(f64::NAN, |u| f64::from(*u)),
    ))
}

pub fn string_code_point_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "codePointAt")?;
    let position = interp.to_integer(&arg(args, 0))?;
    let units = s.to_utf16();
    if position < 0.0 {
        return Ok(JsValue::Undefined);
    }
    let i = position as usize;
    let Some(&first) = units.get(i) else {
        return Ok(JsValue::Undefined);
    };
    let code_point = match units.get(i + 1) {
        Some(&second) if (0xD800..0xDC00).contains(&first) && (0xDC00..0xE000).contains(&second) => {
            0x10000 + ((u32::from(first) - 0xD800) << 10) + (u32::from(second) - 0xDC00)
        }
        _ => u32::from(first),
    };
    Ok(JsValue::Number(f64::from(code_point)))
}

pub fn string_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "at")?;
    let units = s.to_utf16();
    let n = interp.to_integer(&arg(args, 0))?;
    let index = if n < 0.0 { units.len() as f64 + n } else { n };
    if index < 0.0 {
        return Ok(JsValue::Undefined);
    }
    Ok(match units.get(index as usize) {
        Some(unit) => from_units(&[*unit]),
        None => JsValue::Undefined,
    })
}

// ============ SEARCH ============

pub fn string_index_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "indexOf")?.to_utf16();
    let search = interp.to_js_string(&arg(args, 0))?.to_utf16();
    let from = clamp_position(interp, &arg(args, 1), s.len(), 0)?;
    Ok(JsValue::Number(
        find_units(&s, &search, from).map_or(-1.0, |i| i as f64),
    ))
}

pub fn string_last_index_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "lastIndexOf")?.to_utf16();
    let search = interp.to_js_string(&arg(args, 0))?.to_utf16();
    let position = interp.to_number(&arg(args, 1))?;
    let start = if position.is_nan() {
        s.len()
    } else {
        crate::value::to_integer_or_infinity(position).clamp(0.0, s.len() as f64) as usize
    };
    if search.len() > s.len() {
        return Ok(JsValue::Number(-1.0));
    }
    let last = start.min(s.len() - search.len());
    let found = (0..=last)
        .rev()
        .find(|&i| s.get(i..i + search.len()) == Some(search.as_slice()));
    Ok(JsValue::Number(found.map_or(-1.0, |i| i as f64)))
}

pub fn string_includes(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "includes")?.to_utf16();
    reject_regexp(&arg(args, 0), "includes")?;
    let search = interp.to_js_string(&arg(args, 0))?.to_utf16();
    let from = clamp_position(interp, &arg(args, 1), s.len(), 0)?;
    Ok(JsValue::Boolean(find_units(&s, &search, from).is_some()))
}

pub fn string_starts_with(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "startsWith")?.to_utf16();
    reject_regexp(&arg(args, 0), "startsWith")?;
    let search = interp.to_js_string(&arg(args, 0))?.to_utf16();
    let start = clamp_position(interp, &arg(args, 1), s.len(), 0)?;
    Ok(JsValue::Boolean(
        s.get(start..start + search.len()) == Some(search.as_slice()),
    ))
}

pub fn string_ends_with(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "endsWith")?.to_utf16();
    reject_regexp(&arg(args, 0), "endsWith")?;
    let search = interp.to_js_string(&arg(args, 0))?.to_utf16();
    let end = clamp_position(interp, &arg(args, 1), s.len(), s.len())?;
    let Some(start) = end.checked_sub(search.len()) else {
        return Ok(JsValue::Boolean(false));
    };
    Ok(JsValue::Boolean(s.get(start..end) == Some(search.as_slice())))
}

/// A RegExp argument as is, anything else compiled from its string form
fn to_regexp(interp: &mut Interpreter, value: &JsValue, flags: &str) -> Result<JsObjectRef, JsError> {
    if let (Some(_), Some(obj)) = (regexp_data(value), value.as_object()) {
        return Ok(obj.cheap_clone());
    }
    let pattern = match value {
        JsValue::Undefined => JsString::from("(?:)"),
        other => interp.to_js_string(other)?,
    };
    super::regexp::create_regexp(interp, pattern.as_str(), flags)
}

pub fn string_search(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "search")?;
    let regexp = to_regexp(interp, &arg(args, 0), "")?;
    let found = match_from(&regexp, s.as_str(), 0)?;
    Ok(JsValue::Number(found.map_or(-1.0, |m| m.start as f64)))
}

/// Every match of a global pattern, advancing past empty matches
fn all_matches(interp: &mut Interpreter, regexp: &JsObjectRef, flags: &str, text: &str) -> Result<Vec<RegExpMatch>, JsError> {
    let last_index = interp.key("lastIndex");
    let target = JsValue::Object(regexp.cheap_clone());
    interp.set(&target, last_index.cheap_clone(), JsValue::Number(0.0), true)?;
    let mut matches = Vec::new();
    while let Some(m) = builtin_exec(interp, regexp, flags, text)? {
        if m.start == m.end {
            interp.set(&target, last_index.cheap_clone(), JsValue::Number((m.end + 1) as f64), true)?;
        }
        matches.push(m);
    }
    Ok(matches)
}

pub fn string_match(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "match")?;
    let regexp = to_regexp(interp, &arg(args, 0), "")?;
    let flags = regexp_data(&JsValue::Object(regexp.cheap_clone()))
        .map(|(_, flags)| flags)
        .unwrap_or_else(|| JsString::from(""));
    if !flags.as_str().contains('g') {
        return Ok(match builtin_exec(interp, &regexp, flags.as_str(), s.as_str())? {
            Some(m) => match_to_array(interp, &m, &s),
            None => JsValue::Null,
        });
    }
    let matches = all_matches(interp, &regexp, flags.as_str(), s.as_str())?;
    if matches.is_empty() {
        return Ok(JsValue::Null);
    }
    let values = matches
        .into_iter()
        .map(|m| {
            m.captures
                .into_iter()
                .next()
                .flatten()
                .map_or(JsValue::Undefined, JsValue::String)
        })
        .collect();
    Ok(JsValue::Object(interp.create_array(values)))
}

// ============ EXTRACTION ============

pub fn string_slice(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "slice")?.to_utf16();
    let start = relative_position(interp, &arg(args, 0), s.len(), 0)?;
    let end = relative_position(interp, &arg(args, 1), s.len(), s.len())?;
    Ok(from_units(units_range(&s, start, end)))
}

pub fn string_substring(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "substring")?.to_utf16();
    let a = clamp_position(interp, &arg(args, 0), s.len(), 0)?;
    let b = clamp_position(interp, &arg(args, 1), s.len(), s.len())?;
    Ok(from_units(units_range(&s, a.min(b), a.max(b))))
}

pub fn string_substr(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "substr")?.to_utf16();
    let start = relative_position(interp, &arg(args, 0), s.len(), 0)?;
    let remaining = s.len() - start;
    let length = match arg(args, 1) {
        JsValue::Undefined => remaining,
        other => interp.to_integer(&other)?.clamp(0.0, remaining as f64) as usize,
    };
    Ok(from_units(units_range(&s, start, start + length)))
}

// ============ CASE AND WHITESPACE ============

pub fn string_to_lower_case(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "toLowerCase")?;
    Ok(JsValue::from(s.as_str().to_lowercase()))
}

pub fn string_to_upper_case(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "toUpperCase")?;
    Ok(JsValue::from(s.as_str().to_uppercase()))
}

pub fn string_trim(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "trim")?;
    Ok(JsValue::from(s.as_str().trim_matches(is_js_whitespace)))
}

pub fn string_trim_start(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "trimStart")?;
    Ok(JsValue::from(s.as_str().trim_start_matches(is_js_whitespace)))
}

pub fn string_trim_end(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "trimEnd")?;
    Ok(JsValue::from(s.as_str().trim_end_matches(is_js_whitespace)))
}

// ============ TRANSFORMATION ============

pub fn string_split(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "split")?;
    let separator = arg(args, 0);
    let limit = match arg(args, 1) {
        JsValue::Undefined => u32::MAX as usize,
        other => interp.to_uint32_value(&other)? as usize,
    };
    let units = s.to_utf16();
    let mut parts: Vec<JsValue> = Vec::new();
    if limit == 0 {
        return Ok(JsValue::Object(interp.create_array(parts)));
    }

    if regexp_data(&separator).is_some() {
        let Some(regexp) = separator.as_object().cloned() else {
            return Ok(JsValue::Object(interp.create_array(parts)));
        };
        let text = s.as_str();
        if units.is_empty() {
            if match_from(&regexp, text, 0)?.is_none() {
                parts.push(JsValue::String(s.cheap_clone()));
            }
            return Ok(JsValue::Object(interp.create_array(parts)));
        }
        let mut p = 0;
        let mut q = 0;
        while q < units.len() {
            let Some(m) = match_from(&regexp, text, q)? else {
                break;
            };
            if m.start >= units.len() {
                break;
            }
            if m.end == p {
                q = m.start + 1;
                continue;
            }
            parts.push(from_units(units_range(&units, p, m.start)));
            if parts.len() >= limit {
                return Ok(JsValue::Object(interp.create_array(parts)));
            }
            for capture in m.captures.iter().skip(1) {
                parts.push(capture.as_ref().map_or(JsValue::Undefined, |c| JsValue::String(c.cheap_clone())));
                if parts.len() >= limit {
                    return Ok(JsValue::Object(interp.create_array(parts)));
                }
            }
            p = m.end;
            q = if m.end == m.start { m.end + 1 } else { m.end };
        }
        parts.push(from_units(units_range(&units, p, units.len())));
        return Ok(JsValue::Object(interp.create_array(parts)));
    }

    if separator.is_undefined() {
        parts.push(JsValue::String(s));
        return Ok(JsValue::Object(interp.create_array(parts)));
    }
    let separator = interp.to_js_string(&separator)?.to_utf16();
    if separator.is_empty() {
        parts.extend(units.iter().take(limit).map(|u| from_units(&[*u])));
        return Ok(JsValue::Object(interp.create_array(parts)));
    }
    let mut start = 0;
    while let Some(found) = find_units(&units, &separator, start) {
        parts.push(from_units(units_range(&units, start, found)));
        if parts.len() >= limit {
            return Ok(JsValue::Object(interp.create_array(parts)));
        }
        start = found + separator.len();
    }
    parts.push(from_units(units_range(&units, start, units.len())));
    Ok(JsValue::Object(interp.create_array(parts)))
}

pub fn string_repeat(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "repeat")?;
    let count = interp.to_integer(&arg(args, 0))?;
    if count < 0.0 || count.is_infinite() {
        return Err(JsError::range_error(format!(
            "Invalid count value: {}",
            crate::value::number_to_string(count)
        )));
    }
    if s.is_empty() {
        return Ok(JsValue::String(s));
    }
    if count * s.as_str().len() as f64 > (1u64 << 30) as f64 {
        return Err(JsError::range_error("Invalid string length"));
    }
    Ok(JsValue::from(s.as_str().repeat(count as usize)))
}

fn pad(interp: &mut Interpreter, this: JsValue, args: &[JsValue], at_start: bool) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, if at_start { "padStart" } else { "padEnd" })?;
    let target = interp.to_length(&arg(args, 0))?;
    let filler = match arg(args, 1) {
        JsValue::Undefined => vec![u16::from(b' ')],
        other => interp.to_js_string(&other)?.to_utf16(),
    };
    let units = s.to_utf16();
    if target <= units.len() || filler.is_empty() {
        return Ok(JsValue::String(s));
    }
    if target > (1 << 30) {
        return Err(JsError::range_error("Invalid string length"));
    }
    let padding: Vec<u16> = filler.iter().copied().cycle().take(target - units.len()).collect();
    let result = if at_start {
        [padding, units].concat()
    } else {
        [units, padding].concat()
    };
    Ok(from_units(&result))
}

pub fn string_pad_start(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    pad(interp, this, args, true)
}

pub fn string_pad_end(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    pad(interp, this, args, false)
}

pub fn string_concat(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut result = this_string(interp, &this, "concat")?.to_string();
    for value in args {
        result.push_str(interp.to_js_string(value)?.as_str());
    }
    Ok(JsValue::from(result))
}

pub fn string_locale_compare(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "localeCompare")?;
    let other = interp.to_js_string(&arg(args, 0))?;
    Ok(JsValue::Number(match s.as_str().cmp(other.as_str()) {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    }))
}

// ============ REPLACE ============

/// One match to substitute: position and captures in UTF-16 units
struct Replacement {
    start: usize,
    end: usize,
    captures: Vec<Option<JsString>>,
    names: Vec<(usize, JsString)>,
}

impl From<RegExpMatch> for Replacement {
    fn from(m: RegExpMatch) -> Self {
        Replacement {
            start: m.start,
            end: m.end,
            captures: m.captures,
            names: m.names,
        }
    }
}

/// GetSubstitution: expand `$$`, `$&`, `` $` ``, `$'`, `$n`, `$nn` and `$<name>`
fn expand_replacement(template: &str, units: &[u16], m: &Replacement) -> String {
    let mut result = String::with_capacity(template.len());
    let chars: Vec<char> = template.chars().collect();
    let group_count = m.captures.len().saturating_sub(1);
    let capture = |n: usize| {
        m.captures
            .get(n)
            .cloned()
            .flatten()
            .map(|s| s.to_string())
            .unwrap_or_default()
    };
    let mut i = 0;
    while let Some(&c) = chars.get(i) {
        if c != '$' {
            result.push(c);
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some('$') => {
                result.push('$');
                i += 2;
            }
            Some('&') => {
                result.push_str(&String::from_utf16_lossy(units_range(units, m.start, m.end)));
                i += 2;
            }
            Some('`') => {
                result.push_str(&String::from_utf16_lossy(units_range(units, 0, m.start)));
                i += 2;
            }
            Some('\'') => {
                result.push_str(&String::from_utf16_lossy(units_range(units, m.end, units.len())));
                i += 2;
            }
            Some(d) if d.is_ascii_digit() => {
                let first = d.to_digit(10).unwrap_or(0) as usize;
                let two = chars
                    .get(i + 2)
                    .and_then(|c| c.to_digit(10))
                    .map(|second| first * 10 + second as usize);
                match two {
                    Some(n) if n >= 1 && n <= group_count => {
                        result.push_str(&capture(n));
                        i += 3;
                    }
                    _ if first >= 1 && first <= group_count => {
                        result.push_str(&capture(first));
                        i += 2;
                    }
                    _ => {
                        result.push('$');
                        i += 1;
                    }
                }
            }
            Some('<') if !m.names.is_empty() => {
                let rest: String = chars.get(i + 2..).unwrap_or_default().iter().collect();
                match rest.find('>') {
                    Some(close) => {
                        let name = rest.get(..close).unwrap_or_default();
                        if let Some((index, _)) = m.names.iter().find(|(_, n)| n.as_str() == name) {
                            result.push_str(&capture(*index));
                        }
                        i += 2 + name.chars().count() + 1;
                    }
                    None => {
                        result.push('$');
                        i += 1;
                    }
                }
            }
            _ => {
                result.push('$');
                i += 1;
            }
        }
    }
    result
}

/// Build the result of `replace`/`replaceAll` from the matches found
fn apply_replacements(
    interp: &mut Interpreter,
    s: &JsString,
    matches: Vec<Replacement>,
    replacement: &JsValue,
) -> Result<JsValue, JsError> {
    let units = s.to_utf16();
    let template = if replacement.is_callable() {
        None
    } else {
        Some(interp.to_js_string(replacement)?)
    };
    let mut result: Vec<u16> = Vec::with_capacity(units.len());
    let mut position = 0;
    for m in matches {
        if m.start < position {
            continue;
        }
        result.extend_from_slice(units_range(&units, position, m.start));
        let replaced = match &template {
            Some(template) => expand_replacement(template.as_str(), &units, &m),
            None => {
                let mut call_args: Vec<JsValue> = m
                    .captures
                    .iter()
                    .map(|c| c.as_ref().map_or(JsValue::Undefined, |c| JsValue::String(c.cheap_clone())))
                    .collect();
                call_args.push(JsValue::Number(m.start as f64));
                call_args.push(JsValue::String(s.cheap_clone()));
                let value = interp.call_function(replacement, JsValue::Undefined, &call_args)?;
                interp.to_js_string(&value)?.to_string()
            }
        };
        result.extend(replaced.encode_utf16());
        position = m.end;
    }
    result.extend_from_slice(units_range(&units, position, units.len()));
    Ok(from_units(&result))
}

/// Occurrences of a plain search string, first only unless `all`
fn string_matches(units: &[u16], search: &[u16], all: bool) -> Vec<Replacement> {
    let mut matches = Vec::new();
    let mut from = 0;
    while let Some(found) = find_units(units, search, from) {
        matches.push(Replacement {
            start: found,
            end: found + search.len(),
            captures: vec![Some(JsString::from_utf16(search))],
            names: Vec::new(),
        });
        if !all {
            break;
        }
        from = found + search.len().max(1);
        if from > units.len() {
            break;
        }
    }
    matches
}

fn replace(interp: &mut Interpreter, this: JsValue, args: &[JsValue], all: bool) -> Result<JsValue, JsError> {
    let method = if all { "replaceAll" } else { "replace" };
    let s = this_string(interp, &this, method)?;
    let pattern = arg(args, 0);
    let replacement = arg(args, 1);

    let matches: Vec<Replacement> = match (regexp_data(&pattern), pattern.as_object()) {
        (Some((_, flags)), Some(regexp)) => {
            let global = flags.as_str().contains('g');
            if all && !global {
                return Err(JsError::type_error(
                    "replaceAll must be called with a global RegExp",
                ));
            }
            if global {
                all_matches(interp, regexp, flags.as_str(), s.as_str())?
                    .into_iter()
                    .map(Replacement::from)
                    .collect()
            } else {
                builtin_exec(interp, regexp, flags.as_str(), s.as_str())?
                    .into_iter()
                    .map(Replacement::from)
                    .collect()
            }
        }
        _ => {
            let search = interp.to_js_string(&pattern)?.to_utf16();
            string_matches(&s.to_utf16(), &search, all)
        }
    };
    apply_replacements(interp, &s, matches, &replacement)
}

pub fn string_replace(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    replace(interp, this, args, false)
}

pub fn string_replace_all(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    replace(interp, this, args, true)
}

// ============ CONVERSION AND ITERATION ============

pub fn string_value_of(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    this_string_value(&this, "valueOf").map(JsValue::String)
}

pub fn string_to_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    this_string_value(&this, "toString").map(JsValue::String)
}

/// String.prototype[Symbol.iterator]: iterates code points
pub fn string_iterator(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let s = this_string(interp, &this, "[Symbol.iterator]")?;
    let proto = interp.intrinsics().string_iterator_prototype.cheap_clone();
    Ok(JsValue::Object(
        JsObject::new(
            Some(proto),
            ObjectKind::StringIterator {
                chars: s.as_str().chars().collect(),
                position: 0,
            },
        )
        .into_ref(),
    ))
}

pub fn string_iterator_next(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let incompatible = || JsError::type_error("next method called on incompatible receiver");
    let obj = this.as_object().ok_or_else(incompatible)?;
    let next = {
        let mut borrowed = obj.borrow_mut();
        let ObjectKind::StringIterator { chars, position } = &mut borrowed.kind else {
            return Err(incompatible());
        };
        let next = chars.get(*position).copied();
        if next.is_some() {
            *position += 1;
        }
        next
    };
    Ok(match next {
        Some(c) => interp.create_generator_result(JsValue::from(c.to_string()), false),
        None => interp.create_generator_result(JsValue::Undefined, true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn find_units_respects_start_position() {
        let hay = units("abcabc");
        assert_eq!(find_units(&hay, &units("bc"), 0), Some(1));
        assert_eq!(find_units(&hay, &units("bc"), 2), Some(4));
        assert_eq!(find_units(&hay, &units("x"), 0), None);
        assert_eq!(find_units(&hay, &units(""), 3), Some(3));
    }

    #[test]
    fn replacement_patterns_expand() {
        let text = units("John Smith");
        let m = Replacement {
            start: 0,
            end: 10,
            captures: vec![
                Some(JsString::from("John Smith")),
                Some(JsString::from("John")),
                Some(JsString::from("Smith")),
            ],
            names: Vec::new(),
        };
        assert_eq!(expand_replacement("$2, $1", &text, &m), "Smith, John");
        assert_eq!(expand_replacement("$$&", &text, &m), "$&");
        assert_eq!(expand_replacement("[$&]", &text, &m), "[John Smith]");
        assert_eq!(expand_replacement("$3", &text, &m), "$3");
    }
}

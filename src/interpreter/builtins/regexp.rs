//! RegExp built-in methods
//!
//! Matching is delegated to `fancy-regex` behind the `regex` feature. Offsets seen by
//! scripts (`index`, `lastIndex`) are UTF-16 code unit positions; the engine works on
//! UTF-8 byte offsets, so every crossing converts.

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{JsObject, JsObjectRef, ObjectKind, RegExpData};
use crate::value::{CheapClone, JsString, JsValue, Property};

use super::arg;

const KNOWN_FLAGS: &str = "dgimsuy";

/// Initialize RegExp.prototype
pub fn init_regexp_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().regexp_prototype.cheap_clone();

    interp.register_method(&proto, "exec", regexp_exec, 1);
    interp.register_method(&proto, "test", regexp_test, 1);
    interp.register_method(&proto, "toString", regexp_to_string, 0);

    let source = interp.key("source");
    interp.register_getter(&proto, source, regexp_source);
    let flags = interp.key("flags");
    interp.register_getter(&proto, flags, regexp_flags);
    let global = interp.key("global");
    interp.register_getter(&proto, global, regexp_global);
    let ignore_case = interp.key("ignoreCase");
    interp.register_getter(&proto, ignore_case, regexp_ignore_case);
    let multiline = interp.key("multiline");
    interp.register_getter(&proto, multiline, regexp_multiline);
    let sticky = interp.key("sticky");
    interp.register_getter(&proto, sticky, regexp_sticky);
}

/// Create RegExp constructor
pub fn create_regexp_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().regexp_prototype.cheap_clone();
    interp.create_native_constructor("RegExp", regexp_constructor_fn, regexp_construct, 2, &proto)
}

/// RegExp(pattern, flags): a RegExp pattern contributes its source (and its flags when
/// none are given)
fn regexp_constructor_fn(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let pattern = arg(args, 0);
    let flags = arg(args, 1);
    let (source, default_flags) = match regexp_data(&pattern) {
        Some((source, flags)) => (source.to_string(), flags.to_string()),
        None if pattern.is_undefined() => ("(?:)".to_string(), String::new()),
        None => (interp.to_js_string(&pattern)?.to_string(), String::new()),
    };
    let flags = match flags {
        JsValue::Undefined => default_flags,
        other => interp.to_js_string(&other)?.to_string(),
    };
    create_regexp(interp, &source, &flags).map(JsValue::Object)
}

fn regexp_construct(
    interp: &mut Interpreter,
    args: &[JsValue],
    new_target: &JsObjectRef,
) -> Result<JsValue, JsError> {
    let proto = interp.prototype_from_constructor(new_target, |i| &i.regexp_prototype)?;
    let regexp = regexp_constructor_fn(interp, JsValue::Undefined, args)?;
    if let JsValue::Object(obj) = &regexp {
        obj.borrow_mut().prototype = Some(proto);
    }
    Ok(regexp)
}

fn validate_flags(flags: &str) -> Result<(), JsError> {
    let mut seen = String::new();
    for c in flags.chars() {
        if !KNOWN_FLAGS.contains(c) || seen.contains(c) {
            return Err(JsError::syntax_error(
                format!("Invalid regular expression flags '{}'", flags),
                0,
                0,
            ));
        }
        seen.push(c);
    }
    Ok(())
}

/// Rewrite the JavaScript-only pieces of a pattern into the engine's syntax
#[cfg(feature = "regex")]
fn translate_pattern(pattern: &str, flags: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
    if !inline.is_empty() {
        out.push_str("(?");
        out.push_str(&inline);
        out.push(')');
    }
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => out.push('/'),
            // ASCII classes, as in JavaScript without the `u` flag
            Some('d') => out.push_str("[0-9]"),
            Some('D') => out.push_str("[^0-9]"),
            Some('w') => out.push_str("[A-Za-z0-9_]"),
            Some('W') => out.push_str("[^A-Za-z0-9_]"),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Create a RegExp object in the current realm
#[cfg(feature = "regex")]
pub fn create_regexp(interp: &mut Interpreter, pattern: &str, flags: &str) -> Result<JsObjectRef, JsError> {
    validate_flags(flags)?;
    let translated = translate_pattern(pattern, flags);
    let regex = fancy_regex::Regex::new(&translated).map_err(|e| {
        JsError::syntax_error(
            format!("Invalid regular expression: /{}/: {}", pattern, e),
            0,
            0,
        )
    })?;
    let data = RegExpData {
        source: JsString::from(pattern),
        flags: JsString::from(flags),
        regex: std::rc::Rc::new(regex),
    };
    Ok(new_regexp_object(interp, data))
}

#[cfg(not(feature = "regex"))]
pub fn create_regexp(_interp: &mut Interpreter, _pattern: &str, flags: &str) -> Result<JsObjectRef, JsError> {
    validate_flags(flags)?;
    Err(JsError::syntax_error(
        "Regular expressions require the 'regex' feature",
        0,
        0,
    ))
}

#[cfg_attr(not(feature = "regex"), allow(dead_code))]
fn new_regexp_object(interp: &mut Interpreter, data: RegExpData) -> JsObjectRef {
    let proto = interp.intrinsics().regexp_prototype.cheap_clone();
    let obj = JsObject::new(Some(proto), ObjectKind::RegExp(Box::new(data))).into_ref();
    let last_index = interp.key("lastIndex");
    obj.borrow_mut().define_raw(
        last_index,
        Property::with_attributes(JsValue::Number(0.0), true, false, false),
    );
    obj
}

/// Source and flags of a RegExp object
pub(crate) fn regexp_data(value: &JsValue) -> Option<(JsString, JsString)> {
    let obj = value.as_object()?;
    match &obj.borrow().kind {
        ObjectKind::RegExp(data) => Some((data.source.cheap_clone(), data.flags.cheap_clone())),
        _ => None,
    }
}

fn this_regexp(this: &JsValue, method: &str) -> Result<(JsObjectRef, JsString, JsString), JsError> {
    let (source, flags) = regexp_data(this).ok_or_else(|| {
        JsError::type_error(format!(
            "RegExp.prototype.{} called on incompatible receiver",
            method
        ))
    })?;
    let obj = this
        .as_object()
        .cloned()
        .ok_or_else(|| JsError::type_error("RegExp method called on a non-object"))?;
    Ok((obj, source, flags))
}

// ============ MATCHING ============

/// One successful match, offsets in UTF-16 code units
pub(crate) struct RegExpMatch {
    pub start: usize,
    pub end: usize,
    /// Group 0 is the whole match; `None` for groups that did not participate
    pub captures: Vec<Option<JsString>>,
    pub names: Vec<(usize, JsString)>,
}

pub(crate) fn utf16_offset(text: &str, byte: usize) -> usize {
    text.get(..byte).map_or(0, |prefix| prefix.encode_utf16().count())
}

pub(crate) fn byte_offset(text: &str, utf16: usize) -> usize {
    let mut units = 0;
    for (byte, c) in text.char_indices() {
        if units >= utf16 {
            return byte;
        }
        units += c.len_utf16();
    }
    text.len()
}

/// Match `regexp` against `text` starting at UTF-16 offset `from`
#[cfg(feature = "regex")]
pub(crate) fn match_from(regexp: &JsObjectRef, text: &str, from: usize) -> Result<Option<RegExpMatch>, JsError> {
    let regex = match &regexp.borrow().kind {
        ObjectKind::RegExp(data) => data.regex.cheap_clone(),
        _ => return Err(JsError::type_error("Receiver is not a RegExp")),
    };
    let start = byte_offset(text, from);
    let captures = regex
        .captures_from_pos(text, start)
        .map_err(|e| JsError::range_error(format!("Regular expression failed: {}", e)))?;
    let Some(captures) = captures else {
        return Ok(None);
    };
    let Some(whole) = captures.get(0) else {
        return Ok(None);
    };
    let groups = (0..captures.len())
        .map(|i| captures.get(i).map(|m| JsString::from(m.as_str())))
        .collect();
    let names = regex
        .capture_names()
        .enumerate()
        .filter_map(|(i, name)| name.map(|n| (i, JsString::from(n))))
        .collect();
    Ok(Some(RegExpMatch {
        start: utf16_offset(text, whole.start()),
        end: utf16_offset(text, whole.end()),
        captures: groups,
        names,
    }))
}

#[cfg(not(feature = "regex"))]
pub(crate) fn match_from(_regexp: &JsObjectRef, _text: &str, _from: usize) -> Result<Option<RegExpMatch>, JsError> {
    Err(JsError::type_error("Regular expressions require the 'regex' feature"))
}

fn last_index(interp: &mut Interpreter, regexp: &JsObjectRef) -> Result<usize, JsError> {
    let value = interp.get_named(&JsValue::Object(regexp.cheap_clone()), "lastIndex")?;
    interp.to_length(&value)
}

fn set_last_index(interp: &mut Interpreter, regexp: &JsObjectRef, index: usize) -> Result<(), JsError> {
    let key = interp.key("lastIndex");
    interp.set(
        &JsValue::Object(regexp.cheap_clone()),
        key,
        JsValue::Number(index as f64),
        true,
    )
}

/// RegExpBuiltinExec: honours and updates `lastIndex` for global and sticky patterns
pub(crate) fn builtin_exec(
    interp: &mut Interpreter,
    regexp: &JsObjectRef,
    flags: &str,
    text: &str,
) -> Result<Option<RegExpMatch>, JsError> {
    let global = flags.contains('g');
    let sticky = flags.contains('y');
    let from = if global || sticky {
        last_index(interp, regexp)?
    } else {
        0
    };
    if from > text.encode_utf16().count() {
        if global || sticky {
            set_last_index(interp, regexp, 0)?;
        }
        return Ok(None);
    }
    let found = match match_from(regexp, text, from)? {
        Some(m) if sticky && m.start != from => None,
        other => other,
    };
    match found {
        Some(m) => {
            if global || sticky {
                set_last_index(interp, regexp, m.end)?;
            }
            Ok(Some(m))
        }
        None => {
            if global || sticky {
                set_last_index(interp, regexp, 0)?;
            }
            Ok(None)
        }
    }
}

/// The array `exec` and non-global `match` return
pub(crate) fn match_to_array(interp: &mut Interpreter, m: &RegExpMatch, input: &JsString) -> JsValue {
    let values = m
        .captures
        .iter()
        .map(|c| c.as_ref().map_or(JsValue::Undefined, |s| JsValue::String(s.cheap_clone())))
        .collect();
    let array = interp.create_array(values);
    let index_key = interp.key("index");
    let input_key = interp.key("input");
    let groups_key = interp.key("groups");
    let groups = if m.names.is_empty() {
        JsValue::Undefined
    } else {
        let groups = interp.create_object();
        for (i, name) in &m.names {
            let value = m
                .captures
                .get(*i)
                .cloned()
                .flatten()
                .map_or(JsValue::Undefined, JsValue::String);
            groups.borrow_mut().set_property(name.cheap_clone().into(), value);
        }
        JsValue::Object(groups)
    };
    {
        let mut a = array.borrow_mut();
        a.set_property(index_key, JsValue::Number(m.start as f64));
        a.set_property(input_key, JsValue::String(input.cheap_clone()));
        a.set_property(groups_key, groups);
    }
    JsValue::Object(array)
}

// ============ PROTOTYPE METHODS ============

pub fn regexp_exec(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (regexp, _, flags) = this_regexp(&this, "exec")?;
    let input = interp.to_js_string(&arg(args, 0))?;
    match builtin_exec(interp, &regexp, flags.as_str(), input.as_str())? {
        Some(m) => Ok(match_to_array(interp, &m, &input)),
        None => Ok(JsValue::Null),
    }
}

pub fn regexp_test(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (regexp, _, flags) = this_regexp(&this, "test")?;
    let input = interp.to_js_string(&arg(args, 0))?;
    let found = builtin_exec(interp, &regexp, flags.as_str(), input.as_str())?;
    Ok(JsValue::Boolean(found.is_some()))
}

pub fn regexp_to_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, source, flags) = this_regexp(&this, "toString")?;
    Ok(JsValue::from(format!("/{}/{}", source, flags)))
}

fn regexp_source(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, source, _) = this_regexp(&this, "source")?;
    Ok(JsValue::String(source))
}

fn regexp_flags(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, _, flags) = this_regexp(&this, "flags")?;
    Ok(JsValue::String(flags))
}

fn has_flag(this: &JsValue, flag: char, method: &str) -> Result<JsValue, JsError> {
    let (_, _, flags) = this_regexp(this, method)?;
    Ok(JsValue::Boolean(flags.as_str().contains(flag)))
}

fn regexp_global(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    has_flag(&this, 'g', "global")
}

fn regexp_ignore_case(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    has_flag(&this, 'i', "ignoreCase")
}

fn regexp_multiline(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    has_flag(&this, 'm', "multiline")
}

fn regexp_sticky(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    has_flag(&this, 'y', "sticky")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_convert_between_utf8_and_utf16() {
        let text = "aé😀b";
        assert_eq!(utf16_offset(text, 0), 0);
        assert_eq!(utf16_offset(text, 3), 2);
        assert_eq!(utf16_offset(text, 7), 4);
        assert_eq!(byte_offset(text, 2), 3);
        assert_eq!(byte_offset(text, 4), 7);
        assert_eq!(byte_offset(text, 10), text.len());
    }

    #[test]
    fn rejects_unknown_and_repeated_flags() {
        assert!(validate_flags("gim").is_ok());
        assert!(validate_flags("gg").is_err());
        assert!(validate_flags("x").is_err());
    }

    #[cfg(feature = "regex")]
    #[test]
    fn translates_escaped_slash_and_inline_flags() {
        assert_eq!(translate_pattern(r"a\/b", "gi"), "(?i)a/b");
        assert_eq!(translate_pattern(r"\d+", ""), "[0-9]+");
    }
}

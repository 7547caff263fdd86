//! JSON built-in methods
//!
//! Parsing goes through serde_json (with `preserve_order`, so member order survives)
//! and the resulting tree is converted into the object model. Stringification walks
//! the object model directly so `toJSON`, replacers and number formatting follow
//! the language rather than serde's output.

use std::borrow::Cow;
use std::rc::Rc;

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{JsObjectRef, ObjectKind};
use crate::prelude::{grow_stack, IndexSet};
use crate::value::{number_to_string, CheapClone, JsString, JsValue, Property, PropertyKey, WellKnownSymbol};

use super::arg;
use super::object::enumerable_own_keys;

/// Create the JSON namespace object
pub fn create_json_object(interp: &mut Interpreter) -> JsObjectRef {
    let json = interp.create_object();
    interp.register_method(&json, "parse", json_parse, 2);
    interp.register_method(&json, "stringify", json_stringify, 3);
    json.borrow_mut().define_raw(
        WellKnownSymbol::ToStringTag.key(),
        Property::with_attributes(JsValue::from("JSON"), false, false, true),
    );
    json
}

pub fn json_parse(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let text = interp.to_js_string(&arg(args, 0))?;
    let text = replace_lone_surrogates(text.as_str());
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
        JsError::syntax_error(format!("JSON.parse: {}", e), e.line() as u32, e.column() as u32)
    })?;
    let value = json_to_js_value(interp, &json);

    let reviver = arg(args, 1);
    if !reviver.is_callable() {
        return Ok(value);
    }
    let root = interp.create_object();
    let empty = PropertyKey::from("");
    interp.create_data_property(&root, empty.clone(), value);
    internalize(interp, &root, empty, &reviver)
}

/// Numeric value of a `\uXXXX` escape at the start of `text`
fn escaped_unit(text: &str) -> Option<u32> {
    let hex = text.strip_prefix("\\u")?.get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Rewrite escaped lone surrogates as `\uFFFD`
///
/// Strings are UTF-8 and cannot hold an unpaired surrogate, and serde_json rejects
/// them outright.
fn replace_lone_surrogates(text: &str) -> Cow<'_, str> {
    if !text.contains("\\u") {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);
        let consumed = match escaped_unit(tail) {
            Some(0xD800..=0xDBFF) => {
                let paired = tail
                    .get(6..)
                    .and_then(escaped_unit)
                    .is_some_and(|low| (0xDC00..=0xDFFF).contains(&low));
                if paired {
                    out.push_str(tail.get(..12).unwrap_or(tail));
                    12
                } else {
                    out.push_str("\\uFFFD");
                    6
                }
            }
            Some(0xDC00..=0xDFFF) => {
                out.push_str("\\uFFFD");
                6
            }
            _ => {
                // Any other escape is copied along with the character it escapes
                let escaped = tail.get(1..).and_then(|t| t.chars().next()).map_or(0, char::len_utf8);
                out.push_str(tail.get(..1 + escaped).unwrap_or(tail));
                1 + escaped
            }
        };
        rest = tail.get(consumed..).unwrap_or("");
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Walk the parsed tree bottom-up, letting the reviver replace or drop members
fn internalize(
    interp: &mut Interpreter,
    holder: &JsObjectRef,
    key: PropertyKey,
    reviver: &JsValue,
) -> Result<JsValue, JsError> {
    grow_stack(|| internalize_unchecked(interp, holder, key, reviver))
}

fn internalize_unchecked(
    interp: &mut Interpreter,
    holder: &JsObjectRef,
    key: PropertyKey,
    reviver: &JsValue,
) -> Result<JsValue, JsError> {
    let holder_value = JsValue::Object(holder.cheap_clone());
    let value = interp.get(&holder_value, &key)?;

    if let JsValue::Object(obj) = &value {
        let keys: Vec<PropertyKey> = if obj.borrow().is_array() {
            let length = interp.get_named(&value, "length")?;
            let length = interp.to_length(&length)?;
            (0..length).map(|i| PropertyKey::Index(i as u32)).collect()
        } else {
            enumerable_own_keys(obj)
        };
        for member in keys {
            let revived = internalize(interp, obj, member.clone(), reviver)?;
            if revived.is_undefined() {
                interp.delete_property(&value, &member, false)?;
            } else {
                interp.create_data_property(obj, member, revived);
            }
        }
    }

    interp.call_function(reviver, holder_value, &[key.to_value(), value])
}

/// Convert a serde_json tree into fresh objects and arrays of the current realm
pub fn json_to_js_value(interp: &mut Interpreter, json: &serde_json::Value) -> JsValue {
    match json {
        serde_json::Value::Null => JsValue::Null,
        serde_json::Value::Bool(b) => JsValue::Boolean(*b),
        // Parsed from the literal text, so out-of-range exponents become infinities
        serde_json::Value::Number(n) => JsValue::Number(n.to_string().parse().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => JsValue::String(interp.intern(s)),
        serde_json::Value::Array(items) => {
            let elements = items.iter().map(|item| json_to_js_value(interp, item)).collect();
            JsValue::Object(interp.create_array(elements))
        }
        serde_json::Value::Object(map) => {
            let obj = interp.create_object();
            for (name, member) in map {
                let value = json_to_js_value(interp, member);
                let key = interp.key(name);
                obj.borrow_mut().define_raw(key, Property::data(value));
            }
            JsValue::Object(obj)
        }
    }
}

/// Convert a value to a serde_json tree with the same rules as `JSON.stringify`
///
/// Values `JSON.stringify` would drop entirely (undefined, functions, symbols)
/// become `null`.
pub fn js_value_to_json(interp: &mut Interpreter, value: &JsValue) -> Result<serde_json::Value, JsError> {
    let mut serializer = Serializer::default();
    match serializer.serialize_top(interp, value.clone())? {
        Some(text) => serde_json::from_str(&text)
            .map_err(|e| JsError::internal_error(format!("invalid JSON produced: {}", e))),
        None => Ok(serde_json::Value::Null),
    }
}

pub fn json_stringify(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut serializer = Serializer::default();

    let replacer = arg(args, 1);
    if replacer.is_callable() {
        serializer.replacer = Some(replacer);
    } else if let JsValue::Object(list) = &replacer {
        if list.borrow().is_array() {
            serializer.property_list = Some(property_list(interp, &replacer)?);
        }
    }
    serializer.gap = gap(interp, arg(args, 2))?;

    Ok(match serializer.serialize_top(interp, arg(args, 0))? {
        Some(text) => JsValue::from(text),
        None => JsValue::Undefined,
    })
}

/// Keys named by an array replacer, deduplicated in first-seen order
fn property_list(interp: &mut Interpreter, replacer: &JsValue) -> Result<Vec<PropertyKey>, JsError> {
    let length = interp.get_named(replacer, "length")?;
    let length = interp.to_length(&length)?;
    let mut keys: IndexSet<PropertyKey> = IndexSet::default();
    for i in 0..length {
        let item = interp.get(replacer, &PropertyKey::Index(i as u32))?;
        let name = match &item {
            JsValue::String(s) => Some(s.cheap_clone()),
            JsValue::Number(_) => Some(interp.to_js_string(&item)?),
            JsValue::Object(obj) => match wrapper_kind(obj) {
                Some(Wrapper::Number | Wrapper::String) => Some(interp.to_js_string(&item)?),
                _ => None,
            },
            _ => None,
        };
        if let Some(name) = name {
            keys.insert(PropertyKey::from_string(name));
        }
    }
    Ok(keys.into_iter().collect())
}

enum Wrapper {
    Number,
    String,
    Boolean(bool),
}

fn wrapper_kind(obj: &JsObjectRef) -> Option<Wrapper> {
    match obj.borrow().kind {
        ObjectKind::Number(_) => Some(Wrapper::Number),
        ObjectKind::String(_) => Some(Wrapper::String),
        ObjectKind::Boolean(b) => Some(Wrapper::Boolean(b)),
        _ => None,
    }
}

/// The indentation unit: up to ten spaces or the first ten characters of a string
fn gap(interp: &mut Interpreter, space: JsValue) -> Result<String, JsError> {
    let space = match &space {
        JsValue::Object(obj) => match wrapper_kind(obj) {
            Some(Wrapper::Number) => JsValue::Number(interp.to_number(&space)?),
            Some(Wrapper::String) => JsValue::String(interp.to_js_string(&space)?),
            _ => space,
        },
        _ => space,
    };
    Ok(match space {
        JsValue::Number(n) => {
            let count = crate::value::to_integer_or_infinity(n).clamp(0.0, 10.0) as usize;
            " ".repeat(count)
        }
        JsValue::String(s) => s.as_str().chars().take(10).collect(),
        _ => String::new(),
    })
}

/// Deepest object/array nesting `JSON.stringify` will walk
const MAX_NESTING: usize = 5_000;

fn quote(s: &str) -> Result<String, JsError> {
    serde_json::to_string(s).map_err(|e| JsError::internal_error(e.to_string()))
}

#[derive(Default)]
struct Serializer {
    replacer: Option<JsValue>,
    property_list: Option<Vec<PropertyKey>>,
    gap: String,
    indent: String,
    stack: Vec<JsObjectRef>,
}

impl Serializer {
    fn serialize_top(&mut self, interp: &mut Interpreter, value: JsValue) -> Result<Option<String>, JsError> {
        let wrapper = interp.create_object();
        let empty = PropertyKey::from("");
        interp.create_data_property(&wrapper, empty.clone(), value.clone());
        self.serialize_property(interp, &JsValue::Object(wrapper), &empty, value)
    }

    /// SerializeJSONProperty: `None` means the member is skipped
    fn serialize_property(
        &mut self,
        interp: &mut Interpreter,
        holder: &JsValue,
        key: &PropertyKey,
        value: JsValue,
    ) -> Result<Option<String>, JsError> {
        grow_stack(|| self.serialize_property_unchecked(interp, holder, key, value))
    }

    fn serialize_property_unchecked(
        &mut self,
        interp: &mut Interpreter,
        holder: &JsValue,
        key: &PropertyKey,
        mut value: JsValue,
    ) -> Result<Option<String>, JsError> {
        if value.is_object() {
            let to_json = interp.get_named(&value, "toJSON")?;
            if to_json.is_callable() {
                value = interp.call_function(&to_json, value, &[key.to_value()])?;
            }
        }
        if let Some(replacer) = &self.replacer {
            let replacer = replacer.clone();
            value = interp.call_function(&replacer, holder.clone(), &[key.to_value(), value])?;
        }

        if let JsValue::Object(obj) = &value {
            value = match wrapper_kind(obj) {
                Some(Wrapper::Number) => JsValue::Number(interp.to_number(&value)?),
                Some(Wrapper::String) => JsValue::String(interp.to_js_string(&value)?),
                Some(Wrapper::Boolean(b)) => JsValue::Boolean(b),
                None => value,
            };
        }

        Ok(match &value {
            JsValue::Null => Some("null".to_string()),
            JsValue::Boolean(true) => Some("true".to_string()),
            JsValue::Boolean(false) => Some("false".to_string()),
            JsValue::String(s) => Some(quote(s.as_str())?),
            JsValue::Number(n) if n.is_finite() => Some(number_to_string(*n)),
            JsValue::Number(_) => Some("null".to_string()),
            JsValue::Object(obj) if !obj.borrow().is_callable() => {
                let obj = obj.cheap_clone();
                if obj.borrow().is_array() {
                    Some(self.serialize_array(interp, &obj)?)
                } else {
                    Some(self.serialize_object(interp, &obj)?)
                }
            }
            _ => None,
        })
    }

    fn enter(&mut self, obj: &JsObjectRef) -> Result<String, JsError> {
        if self.stack.iter().any(|seen| Rc::ptr_eq(seen, obj)) {
            return Err(JsError::type_error("Converting circular structure to JSON"));
        }
        if self.stack.len() >= MAX_NESTING {
            return Err(JsError::range_error("Maximum call stack size exceeded"));
        }
        self.stack.push(obj.cheap_clone());
        let stepback = self.indent.clone();
        self.indent.push_str(&self.gap);
        Ok(stepback)
    }

    fn leave(&mut self, stepback: String) {
        self.stack.pop();
        self.indent = stepback;
    }

    fn wrap(&self, open: char, close: char, parts: Vec<String>, stepback: &str) -> String {
        if parts.is_empty() {
            return format!("{}{}", open, close);
        }
        if self.gap.is_empty() {
            return format!("{}{}{}", open, parts.join(","), close);
        }
        let separator = format!(",\n{}", self.indent);
        format!("{}\n{}{}\n{}{}", open, self.indent, parts.join(&separator), stepback, close)
    }

    fn serialize_object(&mut self, interp: &mut Interpreter, obj: &JsObjectRef) -> Result<String, JsError> {
        let stepback = self.enter(obj)?;
        let keys = match &self.property_list {
            Some(list) => list.clone(),
            None => enumerable_own_keys(obj),
        };
        let holder = JsValue::Object(obj.cheap_clone());
        let mut parts = Vec::with_capacity(keys.len());
        for key in keys {
            let value = interp.get(&holder, &key)?;
            if let Some(text) = self.serialize_property(interp, &holder, &key, value)? {
                let name = match key.to_value() {
                    JsValue::String(s) => s,
                    _ => JsString::from(""),
                };
                let colon = if self.gap.is_empty() { ":" } else { ": " };
                parts.push(format!("{}{}{}", quote(name.as_str())?, colon, text));
            }
        }
        let result = self.wrap('{', '}', parts, &stepback);
        self.leave(stepback);
        Ok(result)
    }

    fn serialize_array(&mut self, interp: &mut Interpreter, obj: &JsObjectRef) -> Result<String, JsError> {
        let stepback = self.enter(obj)?;
        let holder = JsValue::Object(obj.cheap_clone());
        let length = interp.get_named(&holder, "length")?;
        let length = interp.to_length(&length)?;
        let mut parts = Vec::with_capacity(length.min(1024));
        for i in 0..length {
            let key = PropertyKey::Index(i as u32);
            let value = interp.get(&holder, &key)?;
            let text = self.serialize_property(interp, &holder, &key, value)?;
            parts.push(text.unwrap_or_else(|| "null".to_string()));
        }
        let result = self.wrap('[', ']', parts, &stepback);
        self.leave(stepback);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn stringify(interp: &mut Interpreter, value: JsValue, space: JsValue) -> JsValue {
        json_stringify(interp, JsValue::Undefined, &[value, JsValue::Undefined, space]).unwrap()
    }

    #[test]
    fn parse_preserves_member_order() {
        let mut interp = Interpreter::new(RuntimeConfig::default());
        let json: serde_json::Value = serde_json::from_str(r#"{"z":1,"a":[true,null],"m":"x"}"#).unwrap();
        let value = json_to_js_value(&mut interp, &json);
        let JsValue::Object(obj) = &value else { panic!("expected object") };
        let keys: Vec<String> = enumerable_own_keys(obj)
            .iter()
            .map(|k| match k.to_value() {
                JsValue::String(s) => s.to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(js_value_to_json(&mut interp, &value).unwrap(), json);
    }

    #[test]
    fn stringify_with_indent() {
        let mut interp = Interpreter::new(RuntimeConfig::default());
        let json: serde_json::Value = serde_json::from_str(r#"{"a":[1,2],"b":{}}"#).unwrap();
        let value = json_to_js_value(&mut interp, &json);
        let text = stringify(&mut interp, value, JsValue::Number(2.0));
        assert_eq!(
            text,
            JsValue::from("{\n  \"a\": [\n    1,\n    2\n  ],\n  \"b\": {}\n}")
        );
    }

    #[test]
    fn stringify_skips_undefined_members() {
        let mut interp = Interpreter::new(RuntimeConfig::default());
        let obj = interp.create_object();
        interp.create_data_property(&obj, PropertyKey::from("a"), JsValue::Undefined);
        interp.create_data_property(&obj, PropertyKey::from("b"), JsValue::Number(f64::NAN));
        let text = stringify(&mut interp, JsValue::Object(obj), JsValue::Undefined);
        assert_eq!(text, JsValue::from("{\"b\":null}"));
        assert_eq!(
            stringify(&mut interp, JsValue::Undefined, JsValue::Undefined),
            JsValue::Undefined
        );
    }

    #[test]
    fn stringify_detects_cycles() {
        let mut interp = Interpreter::new(RuntimeConfig::default());
        let obj = interp.create_object();
        interp.create_data_property(&obj, PropertyKey::from("self"), JsValue::Object(obj.clone()));
        let result = json_stringify(&mut interp, JsValue::Undefined, &[JsValue::Object(obj)]);
        assert!(result.is_err());
    }
}

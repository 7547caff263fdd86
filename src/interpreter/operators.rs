//! Type conversions and operator semantics
//!
//! Conversions that can call back into script code (`valueOf`, `toString`,
//! `Symbol.toPrimitive`) live on [`Interpreter`]; pure ones stay on `JsValue`.

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::JsError;
use crate::object::{find_property, is_prototype_of, Callable, JsObject, JsObjectRef, ObjectKind};
use crate::value::{
    number_to_string, string_to_number, to_int32, to_uint32, CheapClone, JsString, JsValue,
    PropertyKey, WellKnownSymbol,
};

use super::Interpreter;

/// Hint passed to ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Default,
    Number,
    String,
}

impl PreferredType {
    fn as_str(self) -> &'static str {
        match self {
            PreferredType::Default => "default",
            PreferredType::Number => "number",
            PreferredType::String => "string",
        }
    }
}

impl Interpreter {
    // ============ CONVERSIONS ============

    pub fn to_primitive(&mut self, value: &JsValue, hint: PreferredType) -> Result<JsValue, JsError> {
        let JsValue::Object(obj) = value else {
            return Ok(value.cheap_clone());
        };
        let exotic = self.get_with_receiver(obj, &WellKnownSymbol::ToPrimitive.key(), value)?;
        if !exotic.is_null_or_undefined() {
            if !exotic.is_callable() {
                return Err(JsError::type_error("Symbol.toPrimitive is not a function"));
            }
            let result = self.call_function(&exotic, value.cheap_clone(), &[JsValue::from(hint.as_str())])?;
            if result.is_object() {
                return Err(JsError::type_error("Cannot convert object to primitive value"));
            }
            return Ok(result);
        }
        let order = if hint == PreferredType::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get_named(value, name)?;
            if method.is_callable() {
                let result = self.call_function(&method, value.cheap_clone(), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(JsError::type_error("Cannot convert object to primitive value"))
    }

    pub fn to_number(&mut self, value: &JsValue) -> Result<f64, JsError> {
        Ok(match value {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            JsValue::Number(n) => *n,
            JsValue::String(s) => string_to_number(s.as_str()),
            JsValue::Symbol(_) => {
                return Err(JsError::type_error("Cannot convert a Symbol value to a number"));
            }
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    pub fn to_js_string(&mut self, value: &JsValue) -> Result<JsString, JsError> {
        Ok(match value {
            JsValue::String(s) => s.cheap_clone(),
            JsValue::Symbol(_) => {
                return Err(JsError::type_error("Cannot convert a Symbol value to a string"));
            }
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                return self.to_js_string(&primitive);
            }
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            other => JsString::from(self.display_value(other)),
        })
    }

    pub fn to_property_key(&mut self, value: &JsValue) -> Result<PropertyKey, JsError> {
        match value {
            JsValue::Symbol(s) => Ok(PropertyKey::Symbol(s.cheap_clone())),
            JsValue::Number(n) => Ok(PropertyKey::from_number(*n)),
            JsValue::String(s) => Ok(PropertyKey::from_string(s.cheap_clone())),
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                self.to_property_key(&primitive)
            }
            other => {
                let s = self.to_js_string(other)?;
                Ok(PropertyKey::from_string(s))
            }
        }
    }

    /// ToObject: wrap primitives, reject `undefined`/`null`
    pub fn to_object(&mut self, value: &JsValue) -> Result<JsObjectRef, JsError> {
        let intrinsics = self.intrinsics();
        let (proto, kind) = match value {
            JsValue::Object(obj) => return Ok(obj.cheap_clone()),
            JsValue::Undefined | JsValue::Null => {
                return Err(JsError::type_error(format!(
                    "Cannot convert {} to object",
                    self.display_value(value)
                )));
            }
            JsValue::Boolean(b) => (&intrinsics.boolean_prototype, ObjectKind::Boolean(*b)),
            JsValue::Number(n) => (&intrinsics.number_prototype, ObjectKind::Number(*n)),
            JsValue::String(s) => (&intrinsics.string_prototype, ObjectKind::String(s.cheap_clone())),
            JsValue::Symbol(s) => (&intrinsics.symbol_prototype, ObjectKind::Symbol(s.cheap_clone())),
        };
        Ok(JsObject::new(Some(proto.cheap_clone()), kind).into_ref())
    }

    pub fn to_int32_value(&mut self, value: &JsValue) -> Result<i32, JsError> {
        Ok(to_int32(self.to_number(value)?))
    }

    pub fn to_uint32_value(&mut self, value: &JsValue) -> Result<u32, JsError> {
        Ok(to_uint32(self.to_number(value)?))
    }

    /// ToIntegerOrInfinity of an arbitrary value
    pub fn to_integer(&mut self, value: &JsValue) -> Result<f64, JsError> {
        Ok(crate::value::to_integer_or_infinity(self.to_number(value)?))
    }

    /// ToLength clamped into `usize`
    pub fn to_length(&mut self, value: &JsValue) -> Result<usize, JsError> {
        let n = self.to_integer(value)?;
        Ok(if n <= 0.0 {
            0
        } else {
            n.min(9_007_199_254_740_991.0) as usize
        })
    }

    /// Rendering of a value for messages and `print`, never running script code
    pub fn display_value(&self, value: &JsValue) -> String {
        match value {
            JsValue::Undefined => "undefined".to_string(),
            JsValue::Null => "null".to_string(),
            JsValue::Boolean(b) => b.to_string(),
            JsValue::Number(n) => number_to_string(*n),
            JsValue::String(s) => s.to_string(),
            JsValue::Symbol(s) => s.descriptive_string(),
            JsValue::Object(obj) => {
                let Ok(o) = obj.try_borrow() else {
                    return "[object Object]".to_string();
                };
                match &o.kind {
                    ObjectKind::Function(f) => match f {
                        Callable::Script(s) => s
                            .template
                            .source_text
                            .as_deref()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("function {}() {{ [code] }}", s.template.name)),
                        other => format!("function {}() {{ [native code] }}", other.debug_name()),
                    },
                    ObjectKind::Array { .. } => {
                        let elements = o.array_elements().unwrap_or_default();
                        elements
                            .iter()
                            .map(|e| {
                                if e.is_null_or_undefined() {
                                    String::new()
                                } else if matches!(e, JsValue::Object(inner) if std::rc::Rc::ptr_eq(inner, obj)) {
                                    String::new()
                                } else {
                                    self.display_value(e)
                                }
                            })
                            .collect::<Vec<_>>()
                            .join(",")
                    }
                    ObjectKind::String(s) => s.to_string(),
                    ObjectKind::Number(n) => number_to_string(*n),
                    ObjectKind::Boolean(b) => b.to_string(),
                    ObjectKind::Error => {
                        let name = super::data_value(obj, &PropertyKey::from("name"))
                            .map(|v| self.display_value(&v))
                            .unwrap_or_else(|| "Error".to_string());
                        let message = super::data_value(obj, &PropertyKey::from("message"))
                            .map(|v| self.display_value(&v))
                            .unwrap_or_default();
                        if message.is_empty() {
                            name
                        } else {
                            format!("{}: {}", name, message)
                        }
                    }
                    ObjectKind::RegExp(data) => format!("/{}/{}", data.source, data.flags),
                    other => format!("[object {}]", other.class_name()),
                }
            }
        }
    }

    // ============ OPERATORS ============

    /// Unary operators other than `typeof` and `delete`
    pub fn unary_op(&mut self, op: UnaryOp, value: &JsValue) -> Result<JsValue, JsError> {
        Ok(match op {
            UnaryOp::Minus => JsValue::Number(-self.to_number(value)?),
            UnaryOp::Plus => JsValue::Number(self.to_number(value)?),
            UnaryOp::Not => JsValue::Boolean(!value.to_boolean()),
            UnaryOp::BitNot => JsValue::Number(f64::from(!self.to_int32_value(value)?)),
            UnaryOp::Void => JsValue::Undefined,
            UnaryOp::Typeof => JsValue::from(value.type_of()),
            UnaryOp::Delete => JsValue::Boolean(true),
        })
    }

    pub fn binary_op(&mut self, op: BinaryOp, left: &JsValue, right: &JsValue) -> Result<JsValue, JsError> {
        Ok(match op {
            BinaryOp::Add => return self.add(left, right),
            BinaryOp::Sub => JsValue::Number(self.to_number(left)? - self.to_number(right)?),
            BinaryOp::Mul => JsValue::Number(self.to_number(left)? * self.to_number(right)?),
            BinaryOp::Div => JsValue::Number(self.to_number(left)? / self.to_number(right)?),
            BinaryOp::Mod => JsValue::Number(js_remainder(self.to_number(left)?, self.to_number(right)?)),
            BinaryOp::Exp => JsValue::Number(js_pow(self.to_number(left)?, self.to_number(right)?)),
            BinaryOp::Eq => JsValue::Boolean(self.loose_equals(left, right)?),
            BinaryOp::NotEq => JsValue::Boolean(!self.loose_equals(left, right)?),
            BinaryOp::StrictEq => JsValue::Boolean(left.strict_equals(right)),
            BinaryOp::StrictNotEq => JsValue::Boolean(!left.strict_equals(right)),
            BinaryOp::Lt => JsValue::Boolean(self.less_than(left, right, true)? == Some(true)),
            BinaryOp::Gt => JsValue::Boolean(self.less_than(right, left, false)? == Some(true)),
            BinaryOp::LtEq => JsValue::Boolean(self.less_than(right, left, false)? == Some(false)),
            BinaryOp::GtEq => JsValue::Boolean(self.less_than(left, right, true)? == Some(false)),
            BinaryOp::BitAnd => JsValue::Number(f64::from(self.to_int32_value(left)? & self.to_int32_value(right)?)),
            BinaryOp::BitOr => JsValue::Number(f64::from(self.to_int32_value(left)? | self.to_int32_value(right)?)),
            BinaryOp::BitXor => JsValue::Number(f64::from(self.to_int32_value(left)? ^ self.to_int32_value(right)?)),
            BinaryOp::LShift => {
                let l = self.to_int32_value(left)?;
                let r = self.to_uint32_value(right)?;
                JsValue::Number(f64::from(l.wrapping_shl(r & 31)))
            }
            BinaryOp::RShift => {
                let l = self.to_int32_value(left)?;
                let r = self.to_uint32_value(right)?;
                JsValue::Number(f64::from(l >> (r & 31)))
            }
            BinaryOp::URShift => {
                let l = self.to_uint32_value(left)?;
                let r = self.to_uint32_value(right)?;
                JsValue::Number(f64::from(l >> (r & 31)))
            }
            BinaryOp::In => JsValue::Boolean(self.has_in(left, right)?),
            BinaryOp::Instanceof => JsValue::Boolean(self.instance_of(left, right)?),
        })
    }

    fn add(&mut self, left: &JsValue, right: &JsValue) -> Result<JsValue, JsError> {
        if let (JsValue::Number(a), JsValue::Number(b)) = (left, right) {
            return Ok(JsValue::Number(a + b));
        }
        let l = self.to_primitive(left, PreferredType::Default)?;
        let r = self.to_primitive(right, PreferredType::Default)?;
        if matches!(l, JsValue::String(_)) || matches!(r, JsValue::String(_)) {
            let ls = self.to_js_string(&l)?;
            let rs = self.to_js_string(&r)?;
            return Ok(JsValue::String(ls.concat(rs.as_str())));
        }
        Ok(JsValue::Number(self.to_number(&l)? + self.to_number(&r)?))
    }

    /// Abstract relational comparison `a < b`; `None` when either side is NaN
    fn less_than(&mut self, a: &JsValue, b: &JsValue, left_first: bool) -> Result<Option<bool>, JsError> {
        let (pa, pb) = if left_first {
            let pa = self.to_primitive(a, PreferredType::Number)?;
            let pb = self.to_primitive(b, PreferredType::Number)?;
            (pa, pb)
        } else {
            let pb = self.to_primitive(b, PreferredType::Number)?;
            let pa = self.to_primitive(a, PreferredType::Number)?;
            (pa, pb)
        };
        if let (JsValue::String(x), JsValue::String(y)) = (&pa, &pb) {
            return Ok(Some(x.to_utf16() < y.to_utf16()));
        }
        let x = self.to_number(&pa)?;
        let y = self.to_number(&pb)?;
        if x.is_nan() || y.is_nan() {
            return Ok(None);
        }
        Ok(Some(x < y))
    }

    /// `==`
    pub fn loose_equals(&mut self, a: &JsValue, b: &JsValue) -> Result<bool, JsError> {
        Ok(match (a, b) {
            (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
            (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => false,
            (JsValue::Number(_), JsValue::String(s)) => a.strict_equals(&JsValue::Number(string_to_number(s.as_str()))),
            (JsValue::String(s), JsValue::Number(_)) => JsValue::Number(string_to_number(s.as_str())).strict_equals(b),
            (JsValue::Boolean(x), _) => {
                let n = JsValue::Number(if *x { 1.0 } else { 0.0 });
                return self.loose_equals(&n, b);
            }
            (_, JsValue::Boolean(y)) => {
                let n = JsValue::Number(if *y { 1.0 } else { 0.0 });
                return self.loose_equals(a, &n);
            }
            (JsValue::Object(_), JsValue::Object(_)) => a.strict_equals(b),
            (JsValue::Object(_), _) => {
                let p = self.to_primitive(a, PreferredType::Default)?;
                return self.loose_equals(&p, b);
            }
            (_, JsValue::Object(_)) => {
                let p = self.to_primitive(b, PreferredType::Default)?;
                return self.loose_equals(a, &p);
            }
            _ => a.strict_equals(b),
        })
    }

    /// `key in target`
    pub fn has_in(&mut self, key: &JsValue, target: &JsValue) -> Result<bool, JsError> {
        let JsValue::Object(obj) = target else {
            return Err(JsError::type_error(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                self.display_value(key),
                self.display_value(target)
            )));
        };
        let key = self.to_property_key(key)?;
        Ok(find_property(obj, &key).is_some())
    }

    /// `value instanceof target`
    pub fn instance_of(&mut self, value: &JsValue, target: &JsValue) -> Result<bool, JsError> {
        if !target.is_object() {
            return Err(JsError::type_error(
                "Right-hand side of 'instanceof' is not an object",
            ));
        }
        let has_instance = self.get(target, &WellKnownSymbol::HasInstance.key())?;
        if !has_instance.is_null_or_undefined() {
            let result = self.call_function(&has_instance, target.cheap_clone(), &[value.cheap_clone()])?;
            return Ok(result.to_boolean());
        }
        if !target.is_callable() {
            return Err(JsError::type_error("Right-hand side of 'instanceof' is not callable"));
        }
        self.ordinary_has_instance(target, value)
    }

    /// OrdinaryHasInstance, shared with `Function.prototype[Symbol.hasInstance]`
    pub fn ordinary_has_instance(&mut self, target: &JsValue, value: &JsValue) -> Result<bool, JsError> {
        let Some(f) = target.as_object() else {
            return Ok(false);
        };
        let bound_target = match f.borrow().callable() {
            Some(Callable::Bound(b)) => Some(b.target.cheap_clone()),
            Some(_) => None,
            None => return Ok(false),
        };
        if let Some(bound) = bound_target {
            return self.instance_of(value, &JsValue::Object(bound));
        }
        let JsValue::Object(obj) = value else {
            return Ok(false);
        };
        let proto = self.get_named(target, "prototype")?;
        let JsValue::Object(proto) = proto else {
            return Err(JsError::type_error(
                "Function has non-object prototype in instanceof check",
            ));
        };
        Ok(is_prototype_of(&proto, obj))
    }

    /// `++`/`--` on an already-read value: returns (old numeric value, new value)
    pub fn update_value(&mut self, value: &JsValue, increment: bool) -> Result<(JsValue, JsValue), JsError> {
        let old = self.to_number(value)?;
        let new = if increment { old + 1.0 } else { old - 1.0 };
        Ok((JsValue::Number(old), JsValue::Number(new)))
    }
}

/// `%` with the sign of the dividend
pub(crate) fn js_remainder(a: f64, b: f64) -> f64 {
    if b.is_infinite() && a.is_finite() {
        return a;
    }
    a % b
}

/// `**`, where `(±1) ** ±Infinity` and `1 ** NaN` are NaN
pub(crate) fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_keeps_dividend_sign() {
        assert_eq!(js_remainder(-7.0, 3.0), -1.0);
        assert_eq!(js_remainder(5.5, f64::INFINITY), 5.5);
        assert!(js_remainder(1.0, 0.0).is_nan());
    }

    #[test]
    fn pow_edge_cases() {
        assert!(js_pow(1.0, f64::INFINITY).is_nan());
        assert!(js_pow(1.0, f64::NAN).is_nan());
        assert_eq!(js_pow(2.0, 10.0), 1024.0);
        assert_eq!(js_pow(f64::NAN, 0.0), 1.0);
    }
}

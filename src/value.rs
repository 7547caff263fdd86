//! JavaScript value representation
//!
//! The core JsValue type and related structures for representing JavaScript values at runtime.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::object::{JsObjectRef, ObjectKind};

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// This trait makes it explicit when a clone is cheap (just incrementing a reference count)
/// vs when it might be expensive (copying data). Types implementing this trait should have
/// O(1) clone operations, typically because they use `Rc` or similar reference counting.
pub trait CheapClone: Clone {
    /// Create a cheap (reference-counted) clone of this value.
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

// Implement CheapClone for Rc-based types (Rc<RefCell<T>> is covered by this)
impl<T: ?Sized> CheapClone for Rc<T> {}

/// A JavaScript value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
}

// Every variant is either Copy or reference-counted
impl CheapClone for JsValue {}

impl JsValue {
    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Check if this value is callable (a function)
    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    /// Get the typeof result for this value
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) | JsValue::Object(_) => true,
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            // NaN !== NaN falls out of IEEE comparison
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// SameValueZero, used by `includes` and collection lookups
    pub fn same_value_zero(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Number(a), JsValue::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    /// SameValue, used by `Object.is` and property redefinition checks
    pub fn same_value(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Number(a), JsValue::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_str()),
            JsValue::Symbol(s) => write!(f, "{}", s.descriptive_string()),
            JsValue::Object(obj) => {
                let Ok(obj) = obj.try_borrow() else {
                    return write!(f, "[object <borrowed>]");
                };
                match &obj.kind {
                    ObjectKind::Ordinary => write!(f, "{{...}}"),
                    ObjectKind::Array { length, .. } => write!(f, "[Array({})]", length),
                    ObjectKind::Function(func) => write!(f, "[Function: {}]", func.debug_name()),
                    ObjectKind::Error => write!(f, "[object Error]"),
                    ObjectKind::Generator(_) => write!(f, "[object Generator]"),
                    other => write!(f, "[object {}]", other.class_name()),
                }
            }
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

// Conversions from Rust types

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(f64::from(n))
    }
}

impl From<u32> for JsValue {
    fn from(n: u32) -> Self {
        JsValue::Number(f64::from(n))
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(obj: JsObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

/// Reference-counted string for efficient string handling
///
/// Contents are UTF-8, so an unpaired UTF-16 surrogate cannot be stored: every path that
/// builds a string from code units or escapes replaces it with U+FFFD.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

// JsString wraps Rc<str>, so clone is cheap (just reference count increment)
impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in UTF-16 code units, the unit JavaScript indexes strings by
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }

    /// The code units of this string
    pub fn to_utf16(&self) -> Vec<u16> {
        self.0.encode_utf16().collect()
    }

    pub fn from_utf16(units: &[u16]) -> JsString {
        JsString::from(String::from_utf16_lossy(units))
    }

    pub fn concat(&self, other: &str) -> JsString {
        let mut s = String::with_capacity(self.0.len() + other.len());
        s.push_str(&self.0);
        s.push_str(other);
        JsString::from(s)
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(WellKnownSymbol::COUNT);

/// A unique symbol. Identity is the id; the description is informational.
#[derive(Clone)]
pub struct JsSymbol {
    id: u64,
    description: Option<JsString>,
}

impl CheapClone for JsSymbol {}

impl JsSymbol {
    pub fn new(description: Option<JsString>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description,
        }
    }

    pub fn well_known(symbol: WellKnownSymbol) -> Self {
        Self {
            id: symbol as u64,
            description: Some(JsString::from(symbol.description())),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> Option<&JsString> {
        self.description.as_ref()
    }

    /// `Symbol(desc)`, as produced by `String(sym)`
    pub fn descriptive_string(&self) -> String {
        match &self.description {
            Some(desc) => format!("Symbol({})", desc),
            None => "Symbol()".to_string(),
        }
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for JsSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptive_string())
    }
}

/// Symbols shared by every realm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum WellKnownSymbol {
    Iterator = 1,
    HasInstance = 2,
    ToPrimitive = 3,
    ToStringTag = 4,
    IsConcatSpreadable = 5,
}

impl WellKnownSymbol {
    const COUNT: u64 = 16;

    pub const ALL: [WellKnownSymbol; 5] = [
        WellKnownSymbol::Iterator,
        WellKnownSymbol::HasInstance,
        WellKnownSymbol::ToPrimitive,
        WellKnownSymbol::ToStringTag,
        WellKnownSymbol::IsConcatSpreadable,
    ];

    pub fn description(self) -> &'static str {
        match self {
            WellKnownSymbol::Iterator => "Symbol.iterator",
            WellKnownSymbol::HasInstance => "Symbol.hasInstance",
            WellKnownSymbol::ToPrimitive => "Symbol.toPrimitive",
            WellKnownSymbol::ToStringTag => "Symbol.toStringTag",
            WellKnownSymbol::IsConcatSpreadable => "Symbol.isConcatSpreadable",
        }
    }

    /// Property name on the `Symbol` constructor
    pub fn property_name(self) -> &'static str {
        match self {
            WellKnownSymbol::Iterator => "iterator",
            WellKnownSymbol::HasInstance => "hasInstance",
            WellKnownSymbol::ToPrimitive => "toPrimitive",
            WellKnownSymbol::ToStringTag => "toStringTag",
            WellKnownSymbol::IsConcatSpreadable => "isConcatSpreadable",
        }
    }

    pub fn key(self) -> PropertyKey {
        PropertyKey::Symbol(JsSymbol::well_known(self))
    }
}

/// Property key - strings, array indices and symbols
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    /// Canonical array index (`"0"`..`"4294967294"`)
    Index(u32),
    Symbol(JsSymbol),
}

impl CheapClone for PropertyKey {}

impl PropertyKey {
    /// Build a key from a string, normalizing canonical indices
    pub fn from_string(s: JsString) -> Self {
        match parse_array_index(s.as_str()) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::String(s),
        }
    }

    pub fn from_number(n: f64) -> Self {
        if n >= 0.0 && n < 4_294_967_295.0 && n.fract() == 0.0 {
            PropertyKey::Index(n as u32)
        } else {
            PropertyKey::String(JsString::from(number_to_string(n)))
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// The key as a script value: strings for names and indices, the symbol otherwise
    pub fn to_value(&self) -> JsValue {
        match self {
            PropertyKey::String(s) => JsValue::String(s.cheap_clone()),
            PropertyKey::Index(i) => JsValue::String(JsString::from(i.to_string())),
            PropertyKey::Symbol(s) => JsValue::Symbol(s.cheap_clone()),
        }
    }

    /// Function name derived from this key (`[desc]` for symbols)
    pub fn function_name(&self) -> JsString {
        match self {
            PropertyKey::String(s) => s.cheap_clone(),
            PropertyKey::Index(i) => JsString::from(i.to_string()),
            PropertyKey::Symbol(s) => match s.description() {
                Some(desc) => JsString::from(format!("[{}]", desc)),
                None => JsString::from(""),
            },
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from_string(JsString::from(s))
    }
}

impl From<JsString> for PropertyKey {
    fn from(s: JsString) -> Self {
        PropertyKey::from_string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        PropertyKey::Index(i)
    }
}

impl fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(s) => write!(f, "{}", s.descriptive_string()),
        }
    }
}

/// Parse a canonical array index. Leading zeros, signs and 2^32-1 are rejected.
pub fn parse_array_index(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    let first = *bytes.first()?;
    if !first.is_ascii_digit() || (first == b'0' && bytes.len() > 1) || bytes.len() > 10 {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value: u64 = s.parse().ok()?;
    if value < 4_294_967_295 {
        Some(value as u32)
    } else {
        None
    }
}

/// What a property holds
#[derive(Clone, Debug)]
pub enum PropertyKind {
    Data {
        value: JsValue,
        writable: bool,
    },
    Accessor {
        getter: Option<JsObjectRef>,
        setter: Option<JsObjectRef>,
    },
}

/// An own property: data or accessor, plus the attributes every property carries
#[derive(Clone, Debug)]
pub struct Property {
    pub kind: PropertyKind,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// Writable, enumerable, configurable data property (plain assignment)
    pub fn data(value: JsValue) -> Self {
        Self {
            kind: PropertyKind::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    /// Writable, non-enumerable, configurable data property (built-in methods)
    pub fn hidden(value: JsValue) -> Self {
        Self {
            kind: PropertyKind::Data {
                value,
                writable: true,
            },
            enumerable: false,
            configurable: true,
        }
    }

    /// Read-only, non-enumerable, non-configurable (constants like `Math.PI`)
    pub fn constant(value: JsValue) -> Self {
        Self {
            kind: PropertyKind::Data {
                value,
                writable: false,
            },
            enumerable: false,
            configurable: false,
        }
    }

    pub fn with_attributes(
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            kind: PropertyKind::Data { value, writable },
            enumerable,
            configurable,
        }
    }

    pub fn accessor(
        getter: Option<JsObjectRef>,
        setter: Option<JsObjectRef>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            kind: PropertyKind::Accessor { getter, setter },
            enumerable,
            configurable,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.kind, PropertyKind::Accessor { .. })
    }

    pub fn writable(&self) -> bool {
        matches!(self.kind, PropertyKind::Data { writable: true, .. })
    }

    /// Data value, or `undefined` for accessors
    pub fn value(&self) -> JsValue {
        match &self.kind {
            PropertyKind::Data { value, .. } => value.cheap_clone(),
            PropertyKind::Accessor { .. } => JsValue::Undefined,
        }
    }

    /// Whether the property meets the frozen bar: non-configurable, and
    /// non-writable when it is a data property
    pub fn is_frozen(&self) -> bool {
        !self.configurable && !self.writable()
    }
}

/// A partial descriptor, as accepted by `Object.defineProperty`
#[derive(Clone, Debug, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<Option<JsObjectRef>>,
    pub set: Option<Option<JsObjectRef>>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }
}

/// Number::toString for radix 10
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }

    // Shortest round-trip digits and exponent from the `{:e}` formatter
    let formatted = format!("{:e}", n);
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let point = exponent + 1;

    if k <= point && point <= 21 {
        let mut out = digits;
        out.extend(std::iter::repeat_n('0', (point - k) as usize));
        out
    } else if 0 < point && point <= 21 {
        let (int_part, frac_part) = digits.split_at(point as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < point && point <= 0 {
        let mut out = String::from("0.");
        out.extend(std::iter::repeat_n('0', (-point) as usize));
        out.push_str(&digits);
        out
    } else {
        let sign = if point - 1 < 0 { '-' } else { '+' };
        let exp = (point - 1).abs();
        let mut chars = digits.chars();
        let first = chars.next().unwrap_or('0');
        let rest: String = chars.collect();
        if rest.is_empty() {
            format!("{}e{}{}", first, sign, exp)
        } else {
            format!("{}.{}e{}{}", first, rest, sign, exp)
        }
    }
}

/// Number::toString for other radices (integer and fraction digits)
pub fn number_to_string_radix(n: f64, radix: u32) -> String {
    if radix == 10 || n.is_nan() || n.is_infinite() {
        return number_to_string(n);
    }
    let negative = n < 0.0;
    let n = n.abs();
    let mut int_part = n.trunc();
    let mut frac = n - int_part;

    let mut int_digits = Vec::new();
    if int_part == 0.0 {
        int_digits.push('0');
    }
    while int_part >= 1.0 {
        let digit = (int_part % f64::from(radix)) as u32;
        int_digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        int_part = (int_part / f64::from(radix)).trunc();
    }
    int_digits.reverse();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.extend(int_digits);
    if frac > 0.0 {
        out.push('.');
        let mut count = 0;
        while frac > 0.0 && count < 52 {
            frac *= f64::from(radix);
            let digit = frac.trunc() as u32;
            out.push(std::char::from_digit(digit, radix).unwrap_or('0'));
            frac -= f64::from(digit);
            count += 1;
        }
    }
    out
}

/// StringToNumber: whitespace-trimmed decimal, hex/octal/binary or `Infinity`
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }
    let radix_body = |prefix_lower: &str, prefix_upper: &str| {
        trimmed
            .strip_prefix(prefix_lower)
            .or_else(|| trimmed.strip_prefix(prefix_upper))
    };
    for (lower, upper, radix) in [("0x", "0X", 16), ("0o", "0O", 8), ("0b", "0B", 2)] {
        if let Some(body) = radix_body(lower, upper) {
            if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
                return f64::NAN;
            }
            return body
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
        }
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let valid = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// WhiteSpace and LineTerminator code points
pub fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\u{0009}'
            | '\u{000A}'
            | '\u{000B}'
            | '\u{000C}'
            | '\u{000D}'
            | '\u{0020}'
            | '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
            | '\u{FEFF}'
    )
}

/// ToInt32
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let int = n.trunc();
    let modulo = int.rem_euclid(4_294_967_296.0);
    modulo as u32
}

/// ToIntegerOrInfinity
pub fn to_integer_or_infinity(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() {
        n
    } else {
        n.trunc() + 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_numbers_like_javascript() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
        assert_eq!(number_to_string(42.5), "42.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn formats_other_radices() {
        assert_eq!(number_to_string_radix(255.0, 16), "ff");
        assert_eq!(number_to_string_radix(-5.0, 2), "-101");
        assert_eq!(number_to_string_radix(0.5, 2), "0.1");
    }

    #[test]
    fn parses_strings_to_numbers() {
        assert_eq!(string_to_number("  42  "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert_eq!(string_to_number(".5"), 0.5);
    }

    #[test]
    fn canonical_indices_only() {
        assert_eq!(parse_array_index("0"), Some(0));
        assert_eq!(parse_array_index("4294967294"), Some(4_294_967_294));
        assert_eq!(parse_array_index("4294967295"), None);
        assert_eq!(parse_array_index("01"), None);
        assert_eq!(parse_array_index("-1"), None);
        assert_eq!(parse_array_index("1.5"), None);
    }

    #[test]
    fn int32_wraps() {
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
        assert_eq!(to_int32(f64::NAN), 0);
    }

    #[test]
    fn symbols_compare_by_identity() {
        let a = JsSymbol::new(Some(JsString::from("a")));
        let b = JsSymbol::new(Some(JsString::from("a")));
        assert_ne!(a, b);
        assert_eq!(a, a.cheap_clone());
        assert_eq!(
            JsSymbol::well_known(WellKnownSymbol::Iterator),
            JsSymbol::well_known(WellKnownSymbol::Iterator)
        );
    }
}

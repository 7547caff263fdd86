//! Date built-in constructor and prototype methods
//!
//! A date is a time value in milliseconds since the epoch, NaN when invalid. The
//! engine has no time zone database: local time is UTC, so every `getX` matches its
//! `getUTCX` twin and `getTimezoneOffset()` is 0.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::error::JsError;
use crate::interpreter::{Interpreter, PreferredType};
use crate::object::{JsObject, JsObjectRef, NativeFn, ObjectKind};
use crate::value::{CheapClone, JsValue, WellKnownSymbol};

use super::arg;

const MS_PER_DAY: f64 = 86_400_000.0;
/// Largest time value magnitude, 100 000 000 days either side of the epoch
const MAX_TIME: f64 = 8.64e15;

// Positions in the broken-down field array
const YEAR: usize = 0;
const MONTH: usize = 1;
const DAY: usize = 2;
const HOUR: usize = 3;
const MINUTE: usize = 4;
const SECOND: usize = 5;
const MILLISECOND: usize = 6;

/// `[year, month (0-based), day, hour, minute, second, millisecond]`
type Fields = [f64; 7];

/// TimeClip: NaN outside the representable range, otherwise an integer without -0
fn time_clip(t: f64) -> f64 {
    if !t.is_finite() || t.abs() > MAX_TIME {
        return f64::NAN;
    }
    t.trunc() + 0.0
}

/// Time value from fields that may overflow their usual ranges: month 12 is January
/// of the next year and day 0 is the last day of the previous month
fn make_time(fields: Fields) -> f64 {
    if fields.iter().any(|f| !f.is_finite()) {
        return f64::NAN;
    }
    let [year, month, day, hour, minute, second, ms] = fields.map(f64::trunc);
    let year = year + (month / 12.0).floor();
    let month = month.rem_euclid(12.0);
    if year.abs() > 400_000.0 {
        return f64::NAN;
    }
    let Some(first_of_month) = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    else {
        return f64::NAN;
    };
    let days = first_of_month.and_utc().timestamp_millis() as f64 / MS_PER_DAY + (day - 1.0);
    let time = hour * 3_600_000.0 + minute * 60_000.0 + second * 1_000.0 + ms;
    time_clip(days * MS_PER_DAY + time)
}

fn utc(t: f64) -> Option<DateTime<Utc>> {
    if t.is_nan() {
        return None;
    }
    DateTime::from_timestamp_millis(t as i64)
}

fn fields_of(t: f64) -> Option<Fields> {
    let dt = utc(t)?;
    Some([
        f64::from(dt.year()),
        f64::from(dt.month0()),
        f64::from(dt.day()),
        f64::from(dt.hour()),
        f64::from(dt.minute()),
        f64::from(dt.second()),
        t.rem_euclid(1_000.0),
    ])
}

/// Fields from constructor or `Date.UTC` arguments; years 0 to 99 mean 1900 to 1999
fn fields_from_args(interp: &mut Interpreter, args: &[JsValue]) -> Result<Fields, JsError> {
    let mut fields = [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (slot, value) in fields.iter_mut().zip(args) {
        *slot = interp.to_number(value)?;
    }
    if let Some(year) = fields.get_mut(YEAR) {
        if (0.0..=99.0).contains(&year.trunc()) {
            *year = 1900.0 + year.trunc();
        }
    }
    Ok(fields)
}

/// Parse the formats this engine produces plus common ISO variants; NaN otherwise
fn parse_date(s: &str) -> f64 {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return time_clip(dt.timestamp_millis() as f64);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return time_clip(dt.and_utc().timestamp_millis() as f64);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map_or(f64::NAN, |dt| time_clip(dt.and_utc().timestamp_millis() as f64));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map_or(f64::NAN, |dt| time_clip(dt.and_utc().timestamp_millis() as f64));
    }
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s.parse::<f64>().unwrap_or(f64::NAN);
        return make_time([year, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return time_clip(dt.timestamp_millis() as f64);
    }
    // toString() output, with or without the trailing zone name
    let without_zone = s.split(" (").next().unwrap_or(s);
    if let Ok(dt) = DateTime::parse_from_str(without_zone, "%a %b %d %Y %H:%M:%S GMT%z") {
        return time_clip(dt.timestamp_millis() as f64);
    }
    f64::NAN
}

fn now() -> f64 {
    Utc::now().timestamp_millis() as f64
}

/// Initialize Date.prototype
pub fn init_date_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().date_prototype.cheap_clone();

    interp.register_method(&proto, "getTime", date_get_time, 0);
    interp.register_method(&proto, "valueOf", date_get_time, 0);
    interp.register_method(&proto, "getTimezoneOffset", date_get_timezone_offset, 0);
    let getters: [(&str, &str, NativeFn); 8] = [
        ("getFullYear", "getUTCFullYear", date_get_full_year),
        ("getMonth", "getUTCMonth", date_get_month),
        ("getDate", "getUTCDate", date_get_date),
        ("getDay", "getUTCDay", date_get_day),
        ("getHours", "getUTCHours", date_get_hours),
        ("getMinutes", "getUTCMinutes", date_get_minutes),
        ("getSeconds", "getUTCSeconds", date_get_seconds),
        ("getMilliseconds", "getUTCMilliseconds", date_get_milliseconds),
    ];
    for (local, universal, getter) in getters {
        interp.register_method(&proto, local, getter, 0);
        interp.register_method(&proto, universal, getter, 0);
    }

    interp.register_method(&proto, "setTime", date_set_time, 1);
    let setters: [(&str, &str, NativeFn, u32); 7] = [
        ("setFullYear", "setUTCFullYear", date_set_full_year, 3),
        ("setMonth", "setUTCMonth", date_set_month, 2),
        ("setDate", "setUTCDate", date_set_date, 1),
        ("setHours", "setUTCHours", date_set_hours, 4),
        ("setMinutes", "setUTCMinutes", date_set_minutes, 3),
        ("setSeconds", "setUTCSeconds", date_set_seconds, 2),
        ("setMilliseconds", "setUTCMilliseconds", date_set_milliseconds, 1),
    ];
    for (local, universal, setter, arity) in setters {
        interp.register_method(&proto, local, setter, arity);
        interp.register_method(&proto, universal, setter, arity);
    }

    interp.register_method(&proto, "toISOString", date_to_iso_string, 0);
    interp.register_method(&proto, "toJSON", date_to_json, 1);
    interp.register_method(&proto, "toString", date_to_string, 0);
    interp.register_method(&proto, "toDateString", date_to_date_string, 0);
    interp.register_method(&proto, "toTimeString", date_to_time_string, 0);
    interp.register_method(&proto, "toUTCString", date_to_utc_string, 0);
    interp.register_method(&proto, "toGMTString", date_to_utc_string, 0);
    interp.register_method(&proto, "toLocaleString", date_to_string, 0);
    interp.register_method(&proto, "toLocaleDateString", date_to_date_string, 0);
    interp.register_method(&proto, "toLocaleTimeString", date_to_time_string, 0);
    interp.register_symbol_method(&proto, WellKnownSymbol::ToPrimitive, date_to_primitive, 1);
}

/// Create the Date constructor with now, UTC and parse
pub fn create_date_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().date_prototype.cheap_clone();
    let ctor = interp.create_native_constructor("Date", date_call, date_construct, 7, &proto);
    interp.register_method(&ctor, "now", date_now, 0);
    interp.register_method(&ctor, "UTC", date_utc, 7);
    interp.register_method(&ctor, "parse", date_parse, 1);
    ctor
}

/// Date() without `new` is the current time as a string
fn date_call(_interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::from(format_string(now()).as_str()))
}

fn date_construct(interp: &mut Interpreter, args: &[JsValue], new_target: &JsObjectRef) -> Result<JsValue, JsError> {
    let time = match args {
        [] => now(),
        [value] => {
            let existing = match value {
                JsValue::Object(obj) => match obj.borrow().kind {
                    ObjectKind::Date(t) => Some(t),
                    _ => None,
                },
                _ => None,
            };
            match existing {
                Some(t) => t,
                None => match interp.to_primitive(value, PreferredType::Default)? {
                    JsValue::String(s) => parse_date(s.as_str()),
                    primitive => time_clip(interp.to_number(&primitive)?),
                },
            }
        }
        _ => make_time(fields_from_args(interp, args)?),
    };
    let proto = interp.prototype_from_constructor(new_target, |i| &i.date_prototype)?;
    Ok(JsValue::Object(
        JsObject::new(Some(proto), ObjectKind::Date(time)).into_ref(),
    ))
}

pub fn date_now(_interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Number(now()))
}

pub fn date_utc(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let fields = fields_from_args(interp, args)?;
    Ok(JsValue::Number(make_time(fields)))
}

pub fn date_parse(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let text = interp.to_js_string(&arg(args, 0))?;
    Ok(JsValue::Number(parse_date(text.as_str())))
}

// ============ TIME VALUE ============

/// thisTimeValue
fn this_time_value(this: &JsValue) -> Result<f64, JsError> {
    if let JsValue::Object(obj) = this {
        if let ObjectKind::Date(t) = obj.borrow().kind {
            return Ok(t);
        }
    }
    Err(JsError::type_error("this is not a Date object."))
}

fn set_time_value(this: &JsValue, time: f64) -> Result<JsValue, JsError> {
    if let JsValue::Object(obj) = this {
        if let ObjectKind::Date(t) = &mut obj.borrow_mut().kind {
            *t = time;
            return Ok(JsValue::Number(time));
        }
    }
    Err(JsError::type_error("this is not a Date object."))
}

fn field(this: &JsValue, index: usize) -> Result<JsValue, JsError> {
    let t = this_time_value(this)?;
    let value = fields_of(t).and_then(|fields| fields.get(index).copied());
    Ok(JsValue::Number(value.unwrap_or(f64::NAN)))
}

pub fn date_get_time(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    this_time_value(&this).map(JsValue::Number)
}

fn date_get_timezone_offset(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this)?;
    Ok(JsValue::Number(if t.is_nan() { f64::NAN } else { 0.0 }))
}

fn date_get_full_year(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    field(&this, YEAR)
}

fn date_get_month(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    field(&this, MONTH)
}

fn date_get_date(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    field(&this, DAY)
}

/// Day of the week, 0 for Sunday; the epoch was a Thursday
fn date_get_day(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this)?;
    Ok(JsValue::Number(((t / MS_PER_DAY).floor() + 4.0).rem_euclid(7.0)))
}

fn date_get_hours(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    field(&this, HOUR)
}

fn date_get_minutes(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    field(&this, MINUTE)
}

fn date_get_seconds(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    field(&this, SECOND)
}

fn date_get_milliseconds(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    field(&this, MILLISECOND)
}

pub fn date_set_time(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    this_time_value(&this)?;
    let time = interp.to_number(&arg(args, 0))?;
    set_time_value(&this, time_clip(time))
}

/// Replace up to `count` consecutive fields starting at `first` with the arguments.
/// An invalid date stays invalid, except that setting the year starts from +0.
fn set_fields(
    interp: &mut Interpreter,
    this: &JsValue,
    args: &[JsValue],
    first: usize,
    count: usize,
) -> Result<JsValue, JsError> {
    let t = this_time_value(this)?;
    let mut values = Vec::with_capacity(count);
    for value in args.iter().take(count) {
        values.push(interp.to_number(value)?);
    }
    if values.is_empty() {
        values.push(f64::NAN);
    }
    let base = if t.is_nan() && first == YEAR { 0.0 } else { t };
    let Some(mut fields) = fields_of(base) else {
        return Ok(JsValue::Number(f64::NAN));
    };
    for (slot, value) in fields.iter_mut().skip(first).zip(values) {
        *slot = value;
    }
    set_time_value(this, make_time(fields))
}

fn date_set_full_year(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    set_fields(interp, &this, args, YEAR, 3)
}

fn date_set_month(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    set_fields(interp, &this, args, MONTH, 2)
}

fn date_set_date(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    set_fields(interp, &this, args, DAY, 1)
}

fn date_set_hours(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    set_fields(interp, &this, args, HOUR, 4)
}

fn date_set_minutes(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    set_fields(interp, &this, args, MINUTE, 3)
}

fn date_set_seconds(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    set_fields(interp, &this, args, SECOND, 2)
}

fn date_set_milliseconds(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    set_fields(interp, &this, args, MILLISECOND, 1)
}

// ============ FORMATTING ============

fn format_with(t: f64, pattern: &str) -> String {
    match utc(t) {
        Some(dt) => dt.format(pattern).to_string(),
        None => "Invalid Date".to_string(),
    }
}

fn format_string(t: f64) -> String {
    format_with(t, "%a %b %d %Y %H:%M:%S GMT+0000 (UTC)")
}

pub fn date_to_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this)?;
    Ok(JsValue::from(format_string(t).as_str()))
}

fn date_to_date_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this)?;
    Ok(JsValue::from(format_with(t, "%a %b %d %Y").as_str()))
}

fn date_to_time_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this)?;
    Ok(JsValue::from(format_with(t, "%H:%M:%S GMT+0000 (UTC)").as_str()))
}

fn date_to_utc_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this)?;
    Ok(JsValue::from(format_with(t, "%a, %d %b %Y %H:%M:%S GMT").as_str()))
}

/// Date.prototype.toISOString: `YYYY-MM-DDTHH:mm:ss.sssZ`, with a signed six-digit
/// year outside 0 to 9999
pub fn date_to_iso_string(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let t = this_time_value(&this)?;
    let Some([year, month, day, hour, minute, second, ms]) = fields_of(t) else {
        return Err(JsError::range_error("Invalid Date"));
    };
    let year = year as i64;
    let year = if (0..=9999).contains(&year) {
        format!("{:04}", year)
    } else {
        format!("{:+07}", year)
    };
    Ok(JsValue::from(
        format!(
            "{}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            year,
            month as i64 + 1,
            day as i64,
            hour as i64,
            minute as i64,
            second as i64,
            ms as i64
        )
        .as_str(),
    ))
}

/// Date.prototype.toJSON: `null` for a non-finite time value, otherwise whatever
/// `toISOString` returns
fn date_to_json(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let object = JsValue::Object(interp.to_object(&this)?);
    if let JsValue::Number(n) = interp.to_primitive(&object, PreferredType::Number)? {
        if !n.is_finite() {
            return Ok(JsValue::Null);
        }
    }
    let method = interp.get_named(&object, "toISOString")?;
    if !method.is_callable() {
        return Err(JsError::type_error("toISOString is not a function"));
    }
    interp.call_function(&method, object, &[])
}

/// Date.prototype[Symbol.toPrimitive]: the `default` hint behaves like `string`
fn date_to_primitive(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_object() {
        return Err(JsError::type_error("Date.prototype[Symbol.toPrimitive] called on non-object"));
    }
    let order = match &arg(args, 0) {
        JsValue::String(hint) if matches!(hint.as_str(), "string" | "default") => ["toString", "valueOf"],
        JsValue::String(hint) if hint.as_str() == "number" => ["valueOf", "toString"],
        _ => return Err(JsError::type_error("Invalid hint")),
    };
    for name in order {
        let method = interp.get_named(&this, name)?;
        if method.is_callable() {
            let result = interp.call_function(&method, this.cheap_clone(), &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(JsError::type_error("Cannot convert object to primitive value"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_time_handles_overflowing_fields() {
        assert_eq!(make_time([1970.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]), 0.0);
        // Month 12 of 2023 is January 2024, day 0 is the last day of the previous month
        assert_eq!(
            make_time([2023.0, 12.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
            make_time([2024.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0])
        );
        assert_eq!(
            make_time([2024.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            make_time([2024.0, 1.0, 29.0, 0.0, 0.0, 0.0, 0.0])
        );
        assert_eq!(make_time([1969.0, 11.0, 31.0, 23.0, 59.0, 59.0, 999.0]), -1.0);
        assert!(make_time([f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]).is_nan());
        assert!(make_time([300_000.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]).is_nan());
    }

    #[test]
    fn fields_round_trip_negative_times() {
        assert_eq!(fields_of(-1.0), Some([1969.0, 11.0, 31.0, 23.0, 59.0, 59.0, 999.0]));
        assert_eq!(fields_of(f64::NAN), None);
    }

    #[test]
    fn parses_iso_and_own_formats() {
        assert_eq!(parse_date("1970-01-01T00:00:00Z"), 0.0);
        assert_eq!(parse_date("1970-01-01T00:00:01.500Z"), 1500.0);
        assert_eq!(parse_date("1970-01-02"), MS_PER_DAY);
        assert_eq!(parse_date("1970-02"), 31.0 * MS_PER_DAY);
        assert_eq!(parse_date("1971"), 365.0 * MS_PER_DAY);
        assert_eq!(parse_date("2024-12-25T10:30:00+02:00"), parse_date("2024-12-25T08:30:00Z"));
        assert_eq!(parse_date(&format_string(86_400_000.0)), MS_PER_DAY);
        assert_eq!(parse_date("Thu, 01 Jan 1970 00:00:00 GMT"), 0.0);
        assert!(parse_date("not a date").is_nan());
    }
}

//! Date: time values, UTC fields, parsing and formatting

use super::{eval, s, throws_error};
use jsrun::JsValue;

#[test]
fn test_time_values() {
    assert_eq!(eval("new Date(0).getTime()"), JsValue::Number(0.0));
    assert_eq!(eval("new Date(1.9).valueOf()"), JsValue::Number(1.0));
    assert_eq!(eval("Date.UTC(2024, 1, 29, 12, 30, 15, 250)"), JsValue::Number(1_709_209_815_250.0));
    assert_eq!(eval("Date.UTC(99, 0)"), eval("Date.UTC(1999, 0)"));
    assert_eq!(eval("new Date(new Date(42)).getTime()"), JsValue::Number(42.0));
    assert_eq!(eval("isNaN(new Date(9e15).getTime())"), JsValue::Boolean(true));
    assert_eq!(eval("new Date(2024, 0, 1) - new Date(2023, 11, 31)"), JsValue::Number(86_400_000.0));
    assert_eq!(eval("typeof Date.now()"), s("number"));
    assert_eq!(eval("typeof Date()"), s("string"));
}

#[test]
fn test_components() {
    assert_eq!(
        eval(
            "var d = new Date(Date.UTC(2024, 1, 29, 13, 5, 9, 7));
             [d.getFullYear(), d.getMonth(), d.getDate(), d.getDay(), d.getHours(),
              d.getMinutes(), d.getSeconds(), d.getMilliseconds(), d.getTimezoneOffset()].join()"
        ),
        s("2024,1,29,4,13,5,9,7,0")
    );
    assert_eq!(eval("new Date(-1).getUTCFullYear()"), JsValue::Number(1969.0));
    assert_eq!(eval("new Date(-1).getUTCMilliseconds()"), JsValue::Number(999.0));
    assert_eq!(eval("isNaN(new Date(NaN).getMonth())"), JsValue::Boolean(true));
}

#[test]
fn test_setters_normalize_fields() {
    assert_eq!(eval("var d = new Date(0); d.setMonth(12); d.toISOString()"), s("1971-01-01T00:00:00.000Z"));
    assert_eq!(eval("var d = new Date(Date.UTC(2024, 2, 1)); d.setDate(0); d.getDate()"), JsValue::Number(29.0));
    assert_eq!(eval("var d = new Date(0); d.setHours(25, 61); d.toISOString()"), s("1970-01-02T02:01:00.000Z"));
    assert_eq!(eval("var d = new Date(0); d.setTime(5)"), JsValue::Number(5.0));
    assert_eq!(eval("var d = new Date(NaN); isNaN(d.setMinutes(1)) && isNaN(d.getTime())"), JsValue::Boolean(true));
    assert_eq!(eval("var d = new Date(NaN); d.setFullYear(2000); d.toISOString()"), s("2000-01-01T00:00:00.000Z"));
}

#[test]
fn test_parse() {
    assert_eq!(eval("Date.parse('2024-02-29T13:05:09.007Z')"), eval("Date.UTC(2024, 1, 29, 13, 5, 9, 7)"));
    assert_eq!(eval("Date.parse('2024-02-29')"), eval("Date.UTC(2024, 1, 29)"));
    assert_eq!(eval("Date.parse('2024-02-29T01:00:00+01:00')"), eval("Date.UTC(2024, 1, 29)"));
    assert_eq!(eval("var d = new Date(123456789000); Date.parse(d.toString()) === d.getTime()"), JsValue::Boolean(true));
    assert_eq!(eval("var d = new Date(123456789000); Date.parse(d.toUTCString()) === d.getTime()"), JsValue::Boolean(true));
    assert_eq!(eval("isNaN(Date.parse('yesterday'))"), JsValue::Boolean(true));
    assert_eq!(eval("new Date('2000-01-01').getUTCFullYear()"), JsValue::Number(2000.0));
}

#[test]
fn test_formatting() {
    assert_eq!(eval("new Date(0).toISOString()"), s("1970-01-01T00:00:00.000Z"));
    assert_eq!(eval("new Date(Date.UTC(-1, 0)).toISOString()"), s("-000001-01-01T00:00:00.000Z"));
    assert_eq!(eval("new Date(Date.UTC(10000, 0)).toISOString()"), s("+010000-01-01T00:00:00.000Z"));
    assert_eq!(eval("new Date(0).toString()"), s("Thu Jan 01 1970 00:00:00 GMT+0000 (UTC)"));
    assert_eq!(eval("new Date(0).toUTCString()"), s("Thu, 01 Jan 1970 00:00:00 GMT"));
    assert_eq!(eval("new Date(0).toDateString()"), s("Thu Jan 01 1970"));
    assert_eq!(eval("String(new Date(NaN))"), s("Invalid Date"));
    assert_eq!(eval("'' + new Date(0)"), s("Thu Jan 01 1970 00:00:00 GMT+0000 (UTC)"));
    assert_eq!(eval("+new Date(7)"), JsValue::Number(7.0));
    assert!(throws_error("new Date(NaN).toISOString()", "RangeError"));
}

#[test]
fn test_json() {
    assert_eq!(eval("JSON.stringify({ at: new Date(0) })"), s(r#"{"at":"1970-01-01T00:00:00.000Z"}"#));
    assert_eq!(eval("JSON.stringify(new Date(NaN))"), s("null"));
    assert_eq!(eval("Date.prototype.toJSON.call({ toISOString: function () { return 'custom'; } })"), s("custom"));
}

#[test]
fn test_to_primitive() {
    assert_eq!(eval("new Date(0)[Symbol.toPrimitive]('number')"), JsValue::Number(0.0));
    assert_eq!(eval("typeof new Date(0)[Symbol.toPrimitive]('default')"), s("string"));
    assert!(throws_error("new Date(0)[Symbol.toPrimitive]('bogus')", "TypeError"));
    assert!(throws_error("Date.prototype.getTime.call({})", "TypeError"));
    assert_eq!(eval("Object.prototype.toString.call(new Date(0))"), s("[object Date]"));
}

//! Template literals and tagged templates

use super::{eval, s};
use jsrun::JsValue;

#[test]
fn test_template_literal_substitution() {
    assert_eq!(eval("`Hello ${'World'}`"), s("Hello World"));
    assert_eq!(eval("var a = 2, b = 3; `${a} + ${b} = ${a + b}`"), s("2 + 3 = 5"));
    assert_eq!(eval("`nested ${`inner ${1 + 1}`}`"), s("nested inner 2"));
    assert_eq!(eval("`line1\nline2`.length"), JsValue::Number(11.0));
}

#[test]
fn test_tagged_template_result() {
    assert_eq!(
        eval(
            "function tag(strings, ...values) {
                 return strings.reduce((acc, str, i) => acc + str + (i < values.length ? values[i] : ''), '');
             }
             tag`Count: ${42}!`"
        ),
        s("Count: 42!")
    );
}

#[test]
fn test_site_object_and_raw_are_frozen_and_distinct() {
    assert_eq!(
        eval(
            "function tag(strings) { return strings; }
             var site = tag`a${1}b`;
             [Object.isFrozen(site), Object.isFrozen(site.raw), site !== site.raw, Array.isArray(site.raw)].join()"
        ),
        s("true,true,true,true")
    );
}

#[test]
fn test_raw_strings_keep_escapes() {
    assert_eq!(
        eval("function tag(s) { return s.raw[0] + '|' + s[0]; } tag`a\\tb`"),
        s("a\\tb|a\tb")
    );
    assert_eq!(eval("String.raw`x\\ny${1}`"), s("x\\ny1"));
}

#[test]
fn test_invalid_escape_in_tagged_template_is_undefined() {
    assert_eq!(
        eval("function tag(s) { return s[0] === undefined && s.raw[0] === '\\\\unicode'; } tag`\\unicode`"),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_site_object_cached_per_call_site() {
    assert_eq!(
        eval(
            "function tag(s) { return s; }
             function site() { return tag`same`; }
             var first = site(), second = site();
             var other = tag`same`;
             (first === second) + ',' + (first === other)"
        ),
        s("true,false")
    );
}

#[test]
fn test_tag_receives_member_this() {
    assert_eq!(
        eval("var o = { p: '>', tag(s, v) { return this.p + s[0] + v; } }; o.tag`v=${5}`"),
        s(">v=5")
    );
}

//! %IteratorPrototype%, Generator.prototype and %GeneratorFunction.prototype%

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::interpreter::generator::ResumeMode;
use crate::object::JsObjectRef;
use crate::value::{CheapClone, JsValue, Property, WellKnownSymbol};

use super::arg;

/// Wire the iterator protocol objects every generator and built-in iterator share
pub fn init_iterator_prototypes(interp: &mut Interpreter) {
    let iterator_proto = interp.intrinsics().iterator_prototype.cheap_clone();
    interp.register_symbol_method(&iterator_proto, WellKnownSymbol::Iterator, iterator_self, 0);

    let generator_proto = interp.intrinsics().generator_prototype.cheap_clone();
    interp.register_method(&generator_proto, "next", generator_next, 1);
    interp.register_method(&generator_proto, "return", generator_return, 1);
    interp.register_method(&generator_proto, "throw", generator_throw, 1);
    define_tag(&generator_proto, "Generator");

    let generator_function_proto = interp.intrinsics().generator_function_prototype.cheap_clone();
    let prototype_key = interp.key("prototype");
    generator_function_proto.borrow_mut().define_raw(
        prototype_key,
        Property::with_attributes(JsValue::Object(generator_proto.cheap_clone()), false, false, true),
    );
    let constructor_key = interp.key("constructor");
    generator_proto.borrow_mut().define_raw(
        constructor_key,
        Property::with_attributes(JsValue::Object(generator_function_proto.cheap_clone()), false, false, true),
    );
    define_tag(&generator_function_proto, "GeneratorFunction");
}

fn define_tag(obj: &JsObjectRef, tag: &str) {
    obj.borrow_mut().define_raw(
        WellKnownSymbol::ToStringTag.key(),
        Property::with_attributes(JsValue::from(tag), false, false, true),
    );
}

/// %IteratorPrototype%[Symbol.iterator]
fn iterator_self(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(this)
}

pub fn generator_next(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.generator_resume(&this, ResumeMode::Next(arg(args, 0)), "next")
}

pub fn generator_return(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.generator_resume(&this, ResumeMode::Return(arg(args, 0)), "return")
}

pub fn generator_throw(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.generator_resume(&this, ResumeMode::Throw(arg(args, 0)), "throw")
}

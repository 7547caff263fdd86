//! Host interop boundary
//!
//! Host functions carry a set of overload [`Signature`]s and one Rust callback. On
//! every call the arguments are matched against the signatures and the callback
//! receives the index of the overload that won. Adapter construction (an object
//! implementing a host-described interface with script-provided method bodies) is
//! a capability the embedder supplies through [`AdapterFactory`].

use std::fmt;

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{Callable, JsObjectRef};
use crate::value::{CheapClone, JsValue};

/// Runtime type a host parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Anything, `undefined` included
    Any,
    Boolean,
    Number,
    String,
    /// Any object, functions and arrays included
    Object,
    Array,
    Callable,
}

impl ParamType {
    pub fn accepts(self, value: &JsValue) -> bool {
        match self {
            ParamType::Any => true,
            ParamType::Boolean => matches!(value, JsValue::Boolean(_)),
            ParamType::Number => matches!(value, JsValue::Number(_)),
            ParamType::String => matches!(value, JsValue::String(_)),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.as_object().is_some_and(|o| o.borrow().is_array()),
            ParamType::Callable => value.is_callable(),
        }
    }

    /// Higher is narrower: `Any` < `Object` < the rest
    fn specificity(self) -> u8 {
        match self {
            ParamType::Any => 0,
            ParamType::Object => 1,
            _ => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamType::Any => "Any",
            ParamType::Boolean => "Boolean",
            ParamType::Number => "Number",
            ParamType::String => "String",
            ParamType::Object => "Object",
            ParamType::Array => "Array",
            ParamType::Callable => "Callable",
        }
    }

    /// Runtime type name of a value, as used in resolution errors
    fn describe(value: &JsValue) -> &'static str {
        match value {
            JsValue::Undefined => "undefined",
            JsValue::Null => "null",
            JsValue::Boolean(_) => "Boolean",
            JsValue::Number(_) => "Number",
            JsValue::String(_) => "String",
            JsValue::Symbol(_) => "Symbol",
            JsValue::Object(o) => {
                let o = o.borrow();
                if o.is_callable() {
                    "Callable"
                } else if o.is_array() {
                    "Array"
                } else {
                    "Object"
                }
            }
        }
    }
}

/// One overload: fixed leading parameters and an optional variadic tail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ParamType>,
    pub rest: Option<ParamType>,
}

impl Signature {
    pub fn fixed(params: Vec<ParamType>) -> Self {
        Signature { params, rest: None }
    }

    pub fn variadic(params: Vec<ParamType>, rest: ParamType) -> Self {
        Signature {
            params,
            rest: Some(rest),
        }
    }

    /// Number of leading, non-variadic parameters
    pub fn arity(&self) -> u32 {
        self.params.len() as u32
    }

    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }

    /// Whether this overload is structurally applicable to `args`
    pub fn accepts(&self, args: &[JsValue]) -> bool {
        if args.len() < self.params.len() {
            return false;
        }
        if args.len() > self.params.len() && self.rest.is_none() {
            return false;
        }
        args.iter().enumerate().all(|(i, value)| match self.params.get(i) {
            Some(param) => param.accepts(value),
            None => self.rest.is_some_and(|rest| rest.accepts(value)),
        })
    }

    /// Ranking key among applicable overloads; larger wins
    fn rank(&self, args: &[JsValue]) -> (bool, u32) {
        let specificity = (0..args.len())
            .map(|i| {
                self.params
                    .get(i)
                    .copied()
                    .or(self.rest)
                    .map_or(0, |p| u32::from(p.specificity()))
            })
            .sum();
        (!self.is_variadic(), specificity)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.params.iter().map(|p| p.name().to_string()).collect();
        if let Some(rest) = self.rest {
            parts.push(format!("{}...", rest.name()));
        }
        write!(f, "({})", parts.join(", "))
    }
}

/// Pick the most specific overload applicable to `args`
///
/// A fixed-arity overload beats a variadic one; among those, narrower parameter
/// types beat wider ones. No applicable overload, or a tie at the top, is a
/// `TypeError`.
pub fn resolve_overload(signatures: &[Signature], args: &[JsValue]) -> Result<usize, JsError> {
    let mut best: Option<(usize, (bool, u32))> = None;
    let mut tied = false;
    for (index, signature) in signatures.iter().enumerate() {
        if !signature.accepts(args) {
            continue;
        }
        let rank = signature.rank(args);
        match &best {
            Some((_, best_rank)) if rank < *best_rank => {}
            Some((_, best_rank)) if rank == *best_rank => tied = true,
            _ => {
                best = Some((index, rank));
                tied = false;
            }
        }
    }

    let arg_types: Vec<&str> = args.iter().map(ParamType::describe).collect();
    match best {
        Some((index, _)) if !tied => Ok(index),
        Some(_) => Err(JsError::type_error(format!(
            "Ambiguous call: more than one overload matches ({})",
            arg_types.join(", ")
        ))),
        None => Err(JsError::type_error(format!(
            "No overload matches arguments ({})",
            arg_types.join(", ")
        ))),
    }
}

/// Callback of a host function: receives the chosen overload index
pub type HostCallback = dyn Fn(&mut Interpreter, usize, JsValue, &[JsValue]) -> Result<JsValue, JsError>;

/// A host-provided function with one or more overloads
pub struct HostFunction {
    name: String,
    signatures: Vec<Signature>,
    callback: Box<HostCallback>,
}

impl HostFunction {
    pub fn new<F>(name: impl Into<String>, signatures: Vec<Signature>, callback: F) -> Self
    where
        F: Fn(&mut Interpreter, usize, JsValue, &[JsValue]) -> Result<JsValue, JsError> + 'static,
    {
        HostFunction {
            name: name.into(),
            signatures,
            callback: Box::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Smallest fixed arity among the overloads, reported as `length`
    pub fn arity(&self) -> u32 {
        self.signatures.iter().map(Signature::arity).min().unwrap_or(0)
    }

    pub fn invoke(&self, interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        let overload = resolve_overload(&self.signatures, args)
            .map_err(|e| JsError::type_error(format!("{}: {}", self.name, e.message())))?;
        log::trace!("host call {} resolved to overload {}", self.name, overload);
        (self.callback)(interp, overload, this, args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("signatures", &self.signatures)
            .finish_non_exhaustive()
    }
}

/// A method an adapter must provide
#[derive(Debug, Clone)]
pub struct InterfaceMethod {
    pub name: String,
    pub signatures: Vec<Signature>,
}

/// Host description of the interface an adapter implements
#[derive(Debug, Clone)]
pub struct InterfaceDescription {
    pub name: String,
    pub methods: Vec<InterfaceMethod>,
}

/// Builds objects that satisfy a host interface using script-provided method bodies
pub trait AdapterFactory {
    fn create_adapter(
        &self,
        interp: &mut Interpreter,
        interface: &InterfaceDescription,
        implementation: &JsObjectRef,
    ) -> Result<JsValue, JsError>;
}

/// Adapter factory that wraps each script method in a host function
///
/// The adapter checks arguments against the interface signatures before
/// forwarding to the script method with the implementation object as `this`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MethodTableAdapter;

impl AdapterFactory for MethodTableAdapter {
    fn create_adapter(
        &self,
        interp: &mut Interpreter,
        interface: &InterfaceDescription,
        implementation: &JsObjectRef,
    ) -> Result<JsValue, JsError> {
        let adapter = interp.create_object();
        let receiver = JsValue::Object(implementation.cheap_clone());
        for method in &interface.methods {
            let body = interp.get_named(&receiver, &method.name)?;
            if !body.is_callable() {
                return Err(JsError::type_error(format!(
                    "{} does not implement {}.{}",
                    interp.display_value(&receiver),
                    interface.name,
                    method.name
                )));
            }
            let target = receiver.clone();
            let host = HostFunction::new(
                method.name.clone(),
                method.signatures.clone(),
                move |interp, _overload, _this, args| interp.call_function(&body, target.clone(), args),
            );
            let f = interp.create_host_function(host);
            interp.define_hidden(&adapter, &method.name, JsValue::Object(f));
        }
        Ok(JsValue::Object(adapter))
    }
}

impl Interpreter {
    /// Arity and overloads of any callable value
    ///
    /// Script and native functions report their `length` leading `Any` parameters
    /// with a variadic `Any` tail; bound functions drop the bound arguments from
    /// their target's signatures; host functions report their own overloads.
    pub fn function_signatures(&self, value: &JsValue) -> Result<Vec<Signature>, JsError> {
        let obj = value
            .as_object()
            .filter(|o| o.borrow().is_callable())
            .ok_or_else(|| JsError::type_error("function_signatures: value is not callable"))?;
        let mut bound_count = 0usize;
        let mut current: JsObjectRef = obj.cheap_clone();
        loop {
            let target = {
                let borrowed = current.borrow();
                let signatures = match borrowed.callable() {
                    Some(Callable::Bound(b)) => {
                        bound_count += b.args.len();
                        None
                    }
                    Some(Callable::Script(f)) => Some(vec![any_signature(f.template.length)]),
                    Some(Callable::Native(f)) => Some(vec![any_signature(f.arity)]),
                    Some(Callable::Host(h)) => Some(h.signatures().to_vec()),
                    None => None,
                };
                if let Some(signatures) = signatures {
                    return Ok(signatures
                        .into_iter()
                        .map(|s| drop_leading(s, bound_count))
                        .collect());
                }
                match borrowed.callable() {
                    Some(Callable::Bound(b)) => b.target.cheap_clone(),
                    _ => return Err(JsError::type_error("function_signatures: value is not callable")),
                }
            };
            current = target;
        }
    }
}

fn any_signature(length: u32) -> Signature {
    Signature::variadic(vec![ParamType::Any; length as usize], ParamType::Any)
}

/// Signature left after `count` arguments have been bound
fn drop_leading(mut signature: Signature, count: usize) -> Signature {
    let keep = signature.params.len().saturating_sub(count);
    let dropped = signature.params.len() - keep;
    signature.params.drain(..dropped);
    signature
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn string_callable_overloads() -> Vec<Signature> {
        vec![
            Signature::variadic(vec![], ParamType::String),
            Signature::fixed(vec![ParamType::String, ParamType::Callable]),
        ]
    }

    #[test]
    fn fixed_typed_overload_beats_variadic() {
        let mut interp = Interpreter::new(RuntimeConfig::default());
        let f = interp.create_native_function("f", |_, _, _| Ok(JsValue::Undefined), 0);
        let args = [JsValue::from("x"), JsValue::Object(f)];
        assert_eq!(resolve_overload(&string_callable_overloads(), &args).unwrap(), 1);
    }

    #[test]
    fn variadic_used_when_fixed_does_not_apply() {
        let args = [JsValue::from("a"), JsValue::from("b"), JsValue::from("c")];
        assert_eq!(resolve_overload(&string_callable_overloads(), &args).unwrap(), 0);
    }

    #[test]
    fn typed_beats_any() {
        let signatures = vec![
            Signature::fixed(vec![ParamType::Any]),
            Signature::fixed(vec![ParamType::Number]),
        ];
        assert_eq!(resolve_overload(&signatures, &[JsValue::Number(1.0)]).unwrap(), 1);
        assert_eq!(resolve_overload(&signatures, &[JsValue::from("s")]).unwrap(), 0);
    }

    #[test]
    fn ambiguity_and_mismatch_are_type_errors() {
        let signatures = vec![
            Signature::fixed(vec![ParamType::Number]),
            Signature::fixed(vec![ParamType::Number]),
        ];
        let err = resolve_overload(&signatures, &[JsValue::Number(1.0)]).unwrap_err();
        assert!(err.to_string().contains("Ambiguous"));
        let err = resolve_overload(&signatures, &[JsValue::Boolean(true)]).unwrap_err();
        assert!(err.to_string().contains("No overload"));
    }

    #[test]
    fn signature_display() {
        let signature = Signature::variadic(vec![ParamType::String], ParamType::Any);
        assert_eq!(signature.to_string(), "(String, Any...)");
    }

    #[test]
    fn host_function_reports_chosen_overload() {
        let mut interp = Interpreter::new(RuntimeConfig::default());
        let host = HostFunction::new("pick", string_callable_overloads(), |_, overload, _, _| {
            Ok(JsValue::Number(overload as f64))
        });
        assert_eq!(host.arity(), 0);
        let result = host
            .invoke(&mut interp, JsValue::Undefined, &[JsValue::from("a")])
            .unwrap();
        assert_eq!(result, JsValue::Number(0.0));
    }

    #[test]
    fn bound_functions_drop_bound_parameters() {
        let mut interp = Interpreter::new(RuntimeConfig::default());
        let host = HostFunction::new(
            "pair",
            vec![Signature::fixed(vec![ParamType::String, ParamType::Number])],
            |_, _, _, _| Ok(JsValue::Undefined),
        );
        let f = interp.create_host_function(host);
        let bound = crate::interpreter::create_bound_function(f, JsValue::Undefined, vec![JsValue::from("x")]);
        let signatures = interp.function_signatures(&JsValue::Object(bound)).unwrap();
        assert_eq!(signatures, vec![Signature::fixed(vec![ParamType::Number])]);
    }
}

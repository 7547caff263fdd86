//! Embeddable ECMAScript engine
//!
//! Source goes through the lexer and parser into an AST, is lowered to a
//! function-template IR, and runs either by walking that IR directly or as
//! register bytecode compiled from it. Both tiers share one object model and one
//! call protocol and must be observably identical.
//!
//! # Example
//!
//! ```
//! use jsrun::{JsValue, Runtime};
//!
//! let mut runtime = Runtime::new();
//! let result = runtime.eval("1 + 2 * 3").unwrap();
//! assert_eq!(result, JsValue::Number(7.0));
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod interop;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod prelude;
pub mod string_dict;
pub mod value;

pub use config::{LanguageVersion, OptimizationTier, RuntimeConfig};
pub use error::JsError;
pub use interop::{AdapterFactory, HostFunction, ParamType, Signature};
pub use interpreter::{Interpreter, Realm};
pub use value::{CheapClone, JsString, JsValue};

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ir::FunctionTemplate;

/// A compiled script, ready to run in any realm of the runtime that compiled it
#[derive(Debug, Clone)]
pub struct Script {
    template: Rc<FunctionTemplate>,
    source_name: String,
    tier: OptimizationTier,
}

impl Script {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Tier the script was compiled for
    pub fn tier(&self) -> OptimizationTier {
        self.tier
    }
}

/// Cooperative cancellation for running scripts
///
/// Cloneable and `Send`, so another thread can trip it; the engine polls it at
/// loop back-edges and call boundaries.
#[derive(Debug, Clone)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    /// Make the running script unwind with `JsError::Interrupted`
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Re-arm after an interruption so scripts can run again
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// The main entry point: a configured engine plus its default realm
pub struct Runtime {
    interpreter: Interpreter,
}

impl Runtime {
    /// Create a runtime with the default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            interpreter: Interpreter::new(config),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.interpreter.config()
    }

    /// Direct access to the interpreter, for host functions and embedders
    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// A fresh global scope with its own standard objects
    pub fn init_standard_objects(&mut self) -> Realm {
        self.interpreter.create_realm()
    }

    /// The realm created with the runtime
    pub fn global_realm(&self) -> Realm {
        self.interpreter.realm().cheap_clone()
    }

    /// Parse and lower `source`; with the compiled tier the bytecode is built too
    pub fn compile(
        &mut self,
        source: &str,
        source_name: &str,
        line: u32,
    ) -> Result<Script, JsError> {
        let template = self.interpreter.compile_source(source, source_name, line)?;
        log::debug!("compiled {} for the {:?} tier", source_name, self.config().tier);
        Ok(Script {
            template,
            source_name: source_name.to_string(),
            tier: self.config().tier,
        })
    }

    /// Run a compiled script with `realm` as its global scope
    pub fn evaluate(&mut self, script: &Script, realm: &Realm) -> Result<JsValue, JsError> {
        self.interpreter.run_script(&script.template, realm)
    }

    pub fn evaluate_string(
        &mut self,
        realm: &Realm,
        source: &str,
        source_name: &str,
        line: u32,
    ) -> Result<JsValue, JsError> {
        let script = self.compile(source, source_name, line)?;
        self.evaluate(&script, realm)
    }

    /// Evaluate `source` in the default realm
    pub fn eval(&mut self, source: &str) -> Result<JsValue, JsError> {
        let realm = self.global_realm();
        self.evaluate_string(&realm, source, "<eval>", 1)
    }

    /// Call the global function `name` of `realm`
    pub fn call_function(
        &mut self,
        realm: &Realm,
        name: &str,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let callee = self.get_global(realm, name)?;
        if !callee.is_callable() {
            return Err(JsError::type_error(format!("{} is not a function", name)));
        }
        self.interpreter
            .with_realm(realm, |interp| interp.call_function(&callee, JsValue::Undefined, args))
    }

    pub fn get_global(&mut self, realm: &Realm, name: &str) -> Result<JsValue, JsError> {
        let global = JsValue::Object(realm.global().cheap_clone());
        self.interpreter.get_named(&global, name)
    }

    pub fn set_global(&mut self, realm: &Realm, name: &str, value: JsValue) -> Result<(), JsError> {
        let global = JsValue::Object(realm.global().cheap_clone());
        let key = self.interpreter.key(name);
        self.interpreter.set(&global, key, value, true)
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(self.interpreter.interrupt_flag())
    }

    /// Install a host function as a global of `realm`
    pub fn register_host_function(&mut self, realm: &Realm, host: HostFunction) {
        let name = host.name().to_string();
        self.interpreter.with_realm(realm, |interp| {
            let f = interp.create_host_function(host);
            interp.define_global(&name, JsValue::Object(f));
        });
    }

    /// Strict-diagnostic warnings recorded so far
    pub fn warnings(&self) -> &[String] {
        self.interpreter.warnings()
    }

    /// Build objects and arrays of the default realm from a JSON tree
    pub fn create_value_from_json(&mut self, json: &serde_json::Value) -> JsValue {
        interpreter::builtins::json_to_js_value(&mut self.interpreter, json)
    }

    /// Convert a value to JSON with `JSON.stringify` rules
    pub fn value_to_json(&mut self, value: &JsValue) -> Result<serde_json::Value, JsError> {
        interpreter::builtins::js_value_to_json(&mut self.interpreter, value)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_arithmetic() {
        let mut runtime = Runtime::new();
        let result = runtime.eval("1 + 2 * 3").unwrap();
        assert_eq!(result, JsValue::Number(7.0));
    }

    #[test]
    fn test_script_records_tier() {
        let config = RuntimeConfig::default().with_tier(OptimizationTier::Interpreted);
        let mut runtime = Runtime::with_config(config);
        let script = runtime.compile("40 + 2", "answer.js", 1).unwrap();
        assert_eq!(script.tier(), OptimizationTier::Interpreted);
        assert_eq!(script.source_name(), "answer.js");
        let realm = runtime.global_realm();
        assert_eq!(runtime.evaluate(&script, &realm).unwrap(), JsValue::Number(42.0));
    }

    #[test]
    fn test_realms_are_isolated() {
        let mut runtime = Runtime::new();
        let first = runtime.global_realm();
        let second = runtime.init_standard_objects();
        runtime.evaluate_string(&first, "var x = 1;", "a.js", 1).unwrap();
        let result = runtime.evaluate_string(&second, "typeof x", "b.js", 1).unwrap();
        assert_eq!(result, JsValue::from("undefined"));
    }

    #[test]
    fn test_call_global_function() {
        let mut runtime = Runtime::new();
        let realm = runtime.global_realm();
        runtime
            .evaluate_string(&realm, "function add(a, b) { return a + b; }", "add.js", 1)
            .unwrap();
        let result = runtime
            .call_function(&realm, "add", &[JsValue::Number(1.0), JsValue::Number(2.0)])
            .unwrap();
        assert_eq!(result, JsValue::Number(3.0));
    }

    #[test]
    fn test_interrupt_handle_reset() {
        let mut runtime = Runtime::new();
        let handle = runtime.interrupt_handle();
        handle.interrupt();
        assert!(matches!(runtime.eval("while (true) {}"), Err(JsError::Interrupted)));
        handle.reset();
        assert_eq!(runtime.eval("1").unwrap(), JsValue::Number(1.0));
    }

    #[test]
    fn test_create_value_from_json() {
        let mut runtime = Runtime::new();
        let json = serde_json::json!({"b": [1, "two"], "a": null});
        let value = runtime.create_value_from_json(&json);
        let realm = runtime.global_realm();
        runtime.set_global(&realm, "data", value).unwrap();
        let keys = runtime.eval("Object.keys(data).join(',')").unwrap();
        assert_eq!(keys, JsValue::from("b,a"));
        let data = runtime.eval("data").unwrap();
        assert_eq!(runtime.value_to_json(&data).unwrap(), json);
    }
}

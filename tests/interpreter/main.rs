//! Integration tests for the interpreter, organized by feature
//!
//! Every helper runs the source once per optimization tier and asserts that the
//! tiers agree, so each test below is also a parity test:
//!
//! ```bash
//! cargo test --test interpreter
//! ```

mod array;
mod basics;
mod class;
mod control_flow;
mod date;
mod destructuring;
mod error;
mod function;
mod generator;
mod interop;
mod json;
mod map;
mod object;
mod regexp;
mod runtime;
mod set;
mod strict;
mod string;
mod template;

use jsrun::{JsError, JsValue, OptimizationTier, Runtime, RuntimeConfig};

/// Fresh runtime for one tier
pub fn runtime_for(tier: OptimizationTier) -> Runtime {
    Runtime::with_config(RuntimeConfig::default().with_tier(tier))
}

/// Evaluate in a single tier
pub fn eval_in(tier: OptimizationTier, source: &str) -> Result<JsValue, JsError> {
    runtime_for(tier).eval(source)
}

/// Evaluate in every tier, asserting the tiers produce the same outcome
pub fn eval_result(source: &str) -> Result<JsValue, JsError> {
    let mut outcomes = OptimizationTier::ALL
        .iter()
        .map(|tier| (*tier, eval_in(*tier, source)));
    let Some((first_tier, first)) = outcomes.next() else {
        return Err(JsError::internal_error("no tiers"));
    };
    let render = |r: &Result<JsValue, JsError>| match r {
        Ok(v) => format!("ok {:?}", v),
        Err(e) => format!("err {}", e),
    };
    for (tier, outcome) in outcomes {
        assert_eq!(
            render(&first),
            render(&outcome),
            "{:?} and {:?} disagree on:\n{}",
            first_tier,
            tier,
            source
        );
    }
    first
}

/// Evaluate in every tier and return the value
#[allow(clippy::expect_used)]
pub fn eval(source: &str) -> JsValue {
    eval_result(source).expect("eval failed")
}

/// Evaluate in every tier, expecting an error
#[allow(clippy::panic)]
pub fn eval_err(source: &str) -> JsError {
    match eval_result(source) {
        Ok(v) => panic!("expected an error, got {:?}", v),
        Err(e) => e,
    }
}

/// Whether evaluation throws an error whose rendering contains `needle`
pub fn throws_error(source: &str, needle: &str) -> bool {
    match eval_result(source) {
        Err(e) => e.to_string().contains(needle),
        Ok(_) => false,
    }
}

pub fn s(value: &str) -> JsValue {
    JsValue::from(value)
}

//! Host functions, overload resolution from script, signature introspection

use jsrun::interop::{InterfaceDescription, InterfaceMethod, MethodTableAdapter};
use jsrun::{AdapterFactory, HostFunction, JsValue, OptimizationTier, ParamType, Signature};

use super::runtime_for;

fn format_host() -> HostFunction {
    HostFunction::new(
        "format",
        vec![
            Signature::variadic(vec![], ParamType::String),
            Signature::fixed(vec![ParamType::String, ParamType::Callable]),
        ],
        |interp, overload, _this, args| match overload {
            0 => {
                let mut parts = Vec::new();
                for value in args {
                    parts.push(interp.to_js_string(value)?.to_string());
                }
                Ok(JsValue::from(parts.join("+")))
            }
            _ => {
                let text = args.first().cloned().unwrap_or(JsValue::Undefined);
                let callback = args.get(1).cloned().unwrap_or(JsValue::Undefined);
                interp.call_function(&callback, JsValue::Undefined, &[text])
            }
        },
    )
}

#[test]
fn test_host_overloads_from_script() {
    for tier in OptimizationTier::ALL {
        let mut runtime = runtime_for(tier);
        let realm = runtime.global_realm();
        runtime.register_host_function(&realm, format_host());
        assert_eq!(
            runtime.eval("format('a', 'b', 'c')").ok(),
            Some(JsValue::from("a+b+c")),
            "{:?}",
            tier
        );
        assert_eq!(
            runtime.eval("format('shout', s => s.toUpperCase() + '!')").ok(),
            Some(JsValue::from("SHOUT!")),
            "{:?}",
            tier
        );
        assert_eq!(runtime.eval("format()").ok(), Some(JsValue::from("")));
        assert_eq!(
            runtime.eval("typeof format + ':' + format.name + ':' + format.length").ok(),
            Some(JsValue::from("function:format:0"))
        );
    }
}

#[test]
fn test_host_mismatch_is_catchable_type_error() {
    let mut runtime = runtime_for(OptimizationTier::Compiled);
    let realm = runtime.global_realm();
    runtime.register_host_function(&realm, format_host());
    let result = runtime.eval("try { format(1); } catch (e) { e instanceof TypeError && e.message; }");
    let Some(JsValue::String(message)) = result.ok() else {
        panic!("expected a caught TypeError");
    };
    assert!(message.as_str().starts_with("format: No overload matches"), "{}", message);
}

#[test]
fn test_host_functions_are_per_realm() {
    let mut runtime = runtime_for(OptimizationTier::Interpreted);
    let first = runtime.global_realm();
    let second = runtime.init_standard_objects();
    runtime.register_host_function(&first, format_host());
    assert_eq!(
        runtime.evaluate_string(&second, "typeof format", "second.js", 1).ok(),
        Some(JsValue::from("undefined"))
    );
}

#[test]
fn test_function_signatures_introspection() {
    for tier in OptimizationTier::ALL {
        let mut runtime = runtime_for(tier);
        let realm = runtime.global_realm();
        runtime.register_host_function(&realm, format_host());

        let script = runtime.eval("(function (a, b, c = 1) {})").unwrap_or(JsValue::Undefined);
        let signatures = runtime.interpreter().function_signatures(&script).unwrap_or_default();
        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures.first().map(Signature::arity), Some(2));

        let bound = runtime
            .eval("(function (a, b, c) {}).bind(null, 1)")
            .unwrap_or(JsValue::Undefined);
        let signatures = runtime.interpreter().function_signatures(&bound).unwrap_or_default();
        assert_eq!(signatures.first().map(Signature::arity), Some(2));

        let host = runtime.eval("format").unwrap_or(JsValue::Undefined);
        let signatures = runtime.interpreter().function_signatures(&host).unwrap_or_default();
        let rendered: Vec<String> = signatures.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["(String...)", "(String, Callable)"]);

        let bound_host = runtime.eval("format.bind(null, 'x')").unwrap_or(JsValue::Undefined);
        let signatures = runtime.interpreter().function_signatures(&bound_host).unwrap_or_default();
        let rendered: Vec<String> = signatures.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["(String...)", "(Callable)"]);

        assert!(runtime.interpreter().function_signatures(&JsValue::Number(1.0)).is_err());
    }
}

#[test]
fn test_method_table_adapter() {
    let mut runtime = runtime_for(OptimizationTier::Compiled);
    let implementation = runtime
        .eval("({ prefix: '> ', render(text) { return this.prefix + text; } })")
        .unwrap_or(JsValue::Undefined);
    let Some(implementation) = implementation.as_object().cloned() else {
        panic!("expected an object");
    };
    let interface = InterfaceDescription {
        name: "Renderer".to_string(),
        methods: vec![InterfaceMethod {
            name: "render".to_string(),
            signatures: vec![Signature::fixed(vec![ParamType::String])],
        }],
    };
    let adapter = MethodTableAdapter
        .create_adapter(runtime.interpreter(), &interface, &implementation)
        .unwrap_or(JsValue::Undefined);
    let realm = runtime.global_realm();
    assert!(runtime.set_global(&realm, "adapter", adapter).is_ok());
    assert_eq!(runtime.eval("adapter.render('hi')").ok(), Some(JsValue::from("> hi")));
    assert!(runtime.eval("adapter.render(1)").is_err());

    let incomplete = runtime.eval("({})").unwrap_or(JsValue::Undefined);
    let Some(incomplete) = incomplete.as_object().cloned() else {
        panic!("expected an object");
    };
    let err = MethodTableAdapter
        .create_adapter(runtime.interpreter(), &interface, &incomplete)
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.contains("does not implement Renderer.render"), "{}", err);
}

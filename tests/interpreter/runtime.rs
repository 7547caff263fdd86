//! Embedding surface: realms, scripts, globals, interruption, configuration

use super::runtime_for;
use jsrun::{JsError, JsValue, LanguageVersion, OptimizationTier, Runtime, RuntimeConfig};

#[test]
fn test_compile_once_run_in_many_realms() {
    for tier in OptimizationTier::ALL {
        let mut runtime = runtime_for(tier);
        let script = runtime.compile("var counter = (typeof counter === 'number' ? counter : 0) + 1; counter", "count.js", 1);
        let Ok(script) = script else {
            panic!("compile failed");
        };
        let first = runtime.global_realm();
        let second = runtime.init_standard_objects();
        assert_eq!(runtime.evaluate(&script, &first).ok(), Some(JsValue::Number(1.0)));
        assert_eq!(runtime.evaluate(&script, &first).ok(), Some(JsValue::Number(2.0)));
        assert_eq!(runtime.evaluate(&script, &second).ok(), Some(JsValue::Number(1.0)), "{:?}", tier);
    }
}

#[test]
fn test_realms_have_separate_intrinsics() {
    let mut runtime = Runtime::new();
    let first = runtime.global_realm();
    let second = runtime.init_standard_objects();
    assert!(runtime.evaluate_string(&first, "Array.prototype.extra = 1;", "a.js", 1).is_ok());
    assert_eq!(
        runtime.evaluate_string(&second, "typeof [].extra", "b.js", 1).ok(),
        Some(JsValue::from("undefined"))
    );
}

#[test]
fn test_global_lexical_bindings_persist_between_scripts() {
    for tier in OptimizationTier::ALL {
        let mut runtime = runtime_for(tier);
        assert!(runtime.eval("let shared = 'lexical'; const fixed = 1; class Later {}").is_ok());
        assert_eq!(runtime.eval("shared + ':' + typeof Later").ok(), Some(JsValue::from("lexical:function")));
        assert_eq!(runtime.eval("'shared' in globalThis").ok(), Some(JsValue::Boolean(false)));
        assert!(matches!(runtime.eval("fixed = 2"), Err(JsError::TypeError { .. })));
        assert!(runtime.eval("let shared = 2;").is_err());
    }
}

#[test]
fn test_get_and_set_globals() {
    let mut runtime = Runtime::new();
    let realm = runtime.global_realm();
    assert!(runtime.set_global(&realm, "answer", JsValue::Number(42.0)).is_ok());
    assert_eq!(runtime.eval("answer / 2").ok(), Some(JsValue::Number(21.0)));
    assert!(runtime.eval("var fromScript = 'yes';").is_ok());
    assert_eq!(runtime.get_global(&realm, "fromScript").ok(), Some(JsValue::from("yes")));
    assert_eq!(runtime.get_global(&realm, "nothing").ok(), Some(JsValue::Undefined));
}

#[test]
fn test_call_function_errors() {
    let mut runtime = Runtime::new();
    let realm = runtime.global_realm();
    assert!(runtime.eval("var notFn = 1; function fails() { throw new RangeError('nope'); }").is_ok());
    assert!(matches!(
        runtime.call_function(&realm, "notFn", &[]),
        Err(JsError::TypeError { .. })
    ));
    let err = runtime.call_function(&realm, "fails", &[]).err().map(|e| e.to_string());
    assert_eq!(err.as_deref(), Some("RangeError: nope"));
}

#[test]
fn test_interrupt_from_another_thread() {
    for tier in OptimizationTier::ALL {
        let mut runtime = runtime_for(tier);
        let handle = runtime.interrupt_handle();
        let remote = handle.clone();
        let trigger = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            remote.interrupt();
        });
        let result = runtime.eval("var n = 0; for (;;) { n++; }");
        assert!(trigger.join().is_ok());
        assert!(matches!(result, Err(JsError::Interrupted)), "{:?}", tier);
        handle.reset();
        assert_eq!(runtime.eval("n > 0").ok(), Some(JsValue::Boolean(true)));
    }
}

#[test]
fn test_interrupt_is_not_catchable() {
    let mut runtime = Runtime::new();
    let handle = runtime.interrupt_handle();
    handle.interrupt();
    let result = runtime.eval("var caught = false; try { while (true) {} } catch (e) { caught = true; } finally { caught = 'finally'; }");
    assert!(matches!(result, Err(JsError::Interrupted)));
    handle.reset();
    assert_eq!(runtime.eval("caught").ok(), Some(JsValue::Boolean(false)));
}

#[test]
fn test_language_version_applies_to_compile() {
    let mut runtime = Runtime::with_config(RuntimeConfig::default().with_language_version(LanguageVersion::Es5));
    assert!(matches!(runtime.eval("let x = 1;"), Err(JsError::SyntaxError { .. })));
    assert_eq!(runtime.eval("var x = 1; x + 1").ok(), Some(JsValue::Number(2.0)));
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: RuntimeConfig = serde_json::from_str(r#"{"tier": "interpreted", "max_call_depth": 32}"#)
        .unwrap_or_default();
    assert_eq!(config.tier, OptimizationTier::Interpreted);
    assert_eq!(config.max_call_depth, 32);
    assert_eq!(config.language_version, LanguageVersion::Latest);
}

#[test]
fn test_print_and_console_do_not_fail() {
    let mut runtime = Runtime::new();
    assert_eq!(
        runtime.eval("console.log('a', 1, {}); console.error('e'); print('p'); 'done'").ok(),
        Some(JsValue::from("done"))
    );
}

#[test]
fn test_interrupt_unwinds_nested_calls() {
    for tier in OptimizationTier::ALL {
        let mut runtime = runtime_for(tier);
        runtime
            .eval("function spin(n) { if (n === 0) { for (;;) {} } return spin(n - 1); }")
            .unwrap();
        let handle = runtime.interrupt_handle();
        let remote = handle.clone();
        let trigger = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            remote.interrupt();
        });
        let result = runtime.eval("spin(200)");
        assert!(trigger.join().is_ok());
        assert!(matches!(result, Err(JsError::Interrupted)), "{:?}", tier);
        handle.reset();
        // Every interrupted frame released its share of the call depth
        let depth = runtime
            .eval("function down(n) { return n === 0 ? 0 : 1 + down(n - 1); } down(9500)")
            .unwrap();
        assert_eq!(depth, JsValue::Number(9500.0), "{:?}", tier);
    }
}

#[test]
fn test_deeply_nested_source_is_a_syntax_error() {
    // Dropping a long left-leaning chain recurses once per operand
    let worker = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            for tier in OptimizationTier::ALL {
                let mut runtime = runtime_for(tier);
                let parens = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
                let err = runtime.eval(&parens).unwrap_err();
                assert!(matches!(err, JsError::SyntaxError { .. }), "{:?}", err);
                assert!(err.to_string().contains("Maximum nesting depth exceeded"), "{}", err);

                let chain = vec!["1"; 5_000].join(" + ");
                let err = runtime.eval(&chain).unwrap_err();
                assert!(matches!(err, JsError::SyntaxError { .. }), "{:?}", err);
                assert!(err.to_string().contains("Expression nested too deeply"), "{}", err);

                let sum = vec!["1"; 1_000].join(" + ");
                assert_eq!(runtime.eval(&sum).unwrap(), JsValue::Number(1000.0), "{:?}", tier);
            }
        });
    assert!(worker.is_ok_and(|handle| handle.join().is_ok()));
}

//! Tests for the bytecode compiler
//!
//! These tests lower source to function templates and check the register bytecode
//! the compiler produces for them.

use std::rc::Rc;

use jsrun::compiler::{BytecodeChunk, Compiler, Constant, Op, compile_tree};
use jsrun::config::ParseOptions;
use jsrun::ir::{FunctionTemplate, lower_program};
use jsrun::parser::Parser;
use jsrun::string_dict::StringDict;

#[allow(clippy::expect_used)]
fn lower(source: &str) -> Rc<FunctionTemplate> {
    let mut dict = StringDict::new();
    let program = Parser::new(source, &mut dict, ParseOptions::default())
        .parse_program()
        .expect("parse failed");
    lower_program(&program, source).expect("lowering failed")
}

#[allow(clippy::expect_used)]
fn compile(source: &str) -> BytecodeChunk {
    Compiler::compile_template(&lower(source)).expect("compile failed")
}

fn contains_op<F: Fn(&Op) -> bool>(chunk: &BytecodeChunk, predicate: F) -> bool {
    chunk.code.iter().any(predicate)
}

#[test]
fn test_small_integers_skip_the_constant_pool() {
    let chunk = compile("42");
    assert!(
        contains_op(&chunk, |op| matches!(op, Op::LoadInt { value: 42, .. })),
        "Expected LoadInt for 42, got {:?}",
        chunk.code
    );
}

#[test]
fn test_other_numbers_use_the_constant_pool() {
    let chunk = compile("1000.5");
    assert!(contains_op(&chunk, |op| matches!(op, Op::LoadConst { .. })));
    assert!(
        chunk
            .constants
            .iter()
            .any(|c| matches!(c, Constant::Number(n) if *n == 1000.5))
    );
}

#[test]
fn test_string_literal_constant() {
    let chunk = compile("'hello'");
    assert!(
        chunk
            .constants
            .iter()
            .any(|c| matches!(c, Constant::String(s) if s.as_str() == "hello")),
        "Expected 'hello' in constants"
    );
}

#[test]
fn test_script_declares_globals() {
    let chunk = compile("var a = 1; let b = 2;");
    assert!(contains_op(&chunk, |op| matches!(op, Op::DeclareGlobals { .. })));
    assert!(contains_op(&chunk, |op| matches!(op, Op::InitGlobalLexical { .. })));
}

#[test]
fn test_loops_poll_for_interruption() {
    for source in ["while (x) {}", "for (;;) { break; }", "do {} while (x);"] {
        let chunk = compile(source);
        assert!(contains_op(&chunk, |op| matches!(op, Op::LoopHint)), "{}", source);
    }
}

#[test]
fn test_conditional_jumps() {
    let chunk = compile("if (x) { y; } else { z; }");
    assert!(contains_op(&chunk, |op| matches!(op, Op::JumpIfFalse { .. })));
    assert!(contains_op(&chunk, |op| matches!(op, Op::Jump { .. })));
}

#[test]
fn test_try_installs_a_handler() {
    let chunk = compile("try { f(); } catch (e) { g(e); }");
    assert!(contains_op(&chunk, |op| matches!(op, Op::PushHandler { .. })));
    assert!(contains_op(&chunk, |op| matches!(op, Op::PopHandler)));
}

#[test]
fn test_literals_and_calls() {
    let chunk = compile("var o = {a: [1, 2]}; o.f(3);");
    assert!(contains_op(&chunk, |op| matches!(op, Op::NewObject { .. })));
    assert!(contains_op(&chunk, |op| matches!(op, Op::NewArray { .. })));
    assert!(contains_op(&chunk, |op| matches!(op, Op::Call { .. })));
}

#[test]
fn test_compile_tree_covers_nested_functions() {
    let script = lower("function outer() { return function inner() { return 1; }; }");
    compile_tree(&script);
    assert!(script.chunk.get().is_some());
    let mut pending = script.nested_templates();
    let mut seen = 0;
    while let Some(template) = pending.pop() {
        assert!(template.chunk.get().is_some(), "{} was not compiled", template.name);
        pending.extend(template.nested_templates());
        seen += 1;
    }
    assert_eq!(seen, 2);
}

#[test]
fn test_generator_chunks_record_block_offsets() {
    let script = lower("function* g() { yield 1; yield 2; }");
    compile_tree(&script);
    let generator = script.nested_templates().into_iter().find(|t| t.generator);
    let chunk = generator.and_then(|t| t.chunk.get().cloned());
    assert!(chunk.is_some_and(|c| c.block_offsets.len() > 1));
}

//! Bytecode compiler for the compiled tier
//!
//! Translates lowered [`FunctionTemplate`]s into register bytecode. Name resolution,
//! destructuring and generator state machines were already settled by lowering, so
//! the compiler only linearizes control flow: structured statements become jumps,
//! `try` becomes handler instructions, and `finally` becomes a completion record
//! (kind and value registers) dispatched after the finally body.

mod builder;
mod bytecode;
mod compile_expr;
mod compile_stmt;

pub use builder::{BytecodeBuilder, JumpPlaceholder};
pub use bytecode::{BytecodeChunk, Constant, ConstantIndex, JumpTarget, Op, Register};

use std::rc::Rc;

use crate::error::JsError;
use crate::ir::{Body, FunctionTemplate, LabelId};
use crate::value::CheapClone;

/// Completion kinds stored in a finally region's kind register
const COMPLETION_NORMAL: i32 = 0;
const COMPLETION_THROW: i32 = 1;
const COMPLETION_RETURN: i32 = 2;
/// First kind used for break/continue routed through a finally block
const COMPLETION_JUMP: i32 = 3;

/// Compile `template` and every template nested in it. Templates that already have
/// bytecode are skipped; a template that cannot be compiled keeps running on the
/// interpreted tier.
pub fn compile_tree(template: &Rc<FunctionTemplate>) {
    let mut pending = vec![template.cheap_clone()];
    while let Some(current) = pending.pop() {
        if current.chunk.get().is_some() {
            continue;
        }
        pending.extend(current.nested_templates());
        match Compiler::compile_template(&current) {
            Ok(chunk) => {
                let _ = current.chunk.set(Rc::new(chunk));
            }
            Err(err) => {
                log::warn!("'{}' stays interpreted: {}", current.name, err);
            }
        }
    }
}

/// Compiler state for one function template
pub struct Compiler {
    builder: BytecodeBuilder,

    /// Break/continue targets, innermost last
    labels: Vec<LabelContext>,

    /// Regions that must run code when control leaves them early
    cleanups: Vec<Cleanup>,

    /// Runtime scopes pushed by the code being compiled
    scope_depth: u32,

    /// Handlers pushed by the code being compiled
    handler_depth: u32,
}

/// Context for a break/continue target
struct LabelContext {
    label: LabelId,
    /// Jump placeholders for break statements
    break_jumps: Vec<JumpPlaceholder>,
    /// Jump placeholders for continue statements
    continue_jumps: Vec<JumpPlaceholder>,
    scope_depth: u32,
    handler_depth: u32,
    cleanup_depth: usize,
}

enum Cleanup {
    /// A `for-of` loop: leaving it early closes the iterator
    IteratorClose { record: Register },
    Finally(FinallyContext),
}

/// A `try` statement with a finally block, while its protected part is compiled
struct FinallyContext {
    kind: Register,
    value: Register,
    /// Jumps into the finally body
    entry_jumps: Vec<JumpPlaceholder>,
    /// break/continue targets routed through the finally body, by kind offset
    routes: Vec<(LabelId, bool)>,
    scope_depth: u32,
    handler_depth: u32,
}

impl Compiler {
    fn new(template: &FunctionTemplate) -> Self {
        Self {
            builder: BytecodeBuilder::new(template.temp_count),
            labels: Vec::new(),
            cleanups: Vec::new(),
            scope_depth: 0,
            handler_depth: 0,
        }
    }

    /// Compile one template. Generators get their prologue at offset 0 and one
    /// entry per state machine block, each ending in `EndBlock`.
    pub fn compile_template(template: &FunctionTemplate) -> Result<BytecodeChunk, JsError> {
        let mut compiler = Compiler::new(template);
        compiler.compile_statements(&template.prologue)?;
        match &template.body {
            Body::Statements(body) => {
                compiler.compile_statements(body)?;
                let undefined = compiler.builder.alloc_register()?;
                compiler.builder.emit(Op::LoadUndefined { dst: undefined });
                compiler.builder.emit(Op::Return { src: undefined });
            }
            Body::StateMachine(machine) => {
                compiler.builder.emit(Op::EndBlock);
                for block in &machine.blocks {
                    compiler.builder.mark_block();
                    compiler.compile_statements(&block.body)?;
                    compiler.builder.emit(Op::EndBlock);
                }
            }
        }
        Ok(compiler.builder.finish())
    }

    // ============ LEAVING REGIONS EARLY ============

    fn emit_pops(&mut self, scope_depth: u32, handler_depth: u32) {
        for _ in scope_depth..self.scope_depth {
            self.builder.emit(Op::PopScope);
        }
        for _ in handler_depth..self.handler_depth {
            self.builder.emit(Op::PopHandler);
        }
    }

    /// `break`/`continue`: run the cleanups between here and the target, then jump
    fn emit_label_jump(&mut self, label: LabelId, is_continue: bool) -> Result<(), JsError> {
        let index = self
            .labels
            .iter()
            .rposition(|l| l.label == label)
            .ok_or_else(|| JsError::internal_error("jump to an unknown label"))?;
        let (cleanup_depth, scope_depth, handler_depth) = match self.labels.get(index) {
            Some(l) => (l.cleanup_depth, l.scope_depth, l.handler_depth),
            None => return Err(JsError::internal_error("jump to an unknown label")),
        };

        let mut i = self.cleanups.len();
        while i > cleanup_depth {
            i -= 1;
            match self.cleanups.get(i) {
                Some(Cleanup::IteratorClose { record }) => {
                    let record = *record;
                    self.builder.emit(Op::IteratorClose { record });
                }
                Some(Cleanup::Finally(fin)) => {
                    let (kind, scope, handlers) = (fin.kind, fin.scope_depth, fin.handler_depth);
                    let route = fin.routes.iter().position(|r| *r == (label, is_continue));
                    let offset = match route {
                        Some(offset) => offset,
                        None => {
                            let Some(Cleanup::Finally(fin)) = self.cleanups.get_mut(i) else {
                                return Err(JsError::internal_error("finally context vanished"));
                            };
                            fin.routes.push((label, is_continue));
                            fin.routes.len() - 1
                        }
                    };
                    self.emit_pops(scope, handlers);
                    self.builder.emit(Op::LoadInt {
                        dst: kind,
                        value: COMPLETION_JUMP + offset as i32,
                    });
                    self.jump_into_finally(i)?;
                    return Ok(());
                }
                None => {}
            }
        }

        self.emit_pops(scope_depth, handler_depth);
        let jump = self.builder.emit_jump();
        let Some(target) = self.labels.get_mut(index) else {
            return Err(JsError::internal_error("jump to an unknown label"));
        };
        if is_continue {
            target.continue_jumps.push(jump);
        } else {
            target.break_jumps.push(jump);
        }
        Ok(())
    }

    /// `return`: close iterators and run finally blocks on the way out
    fn emit_return(&mut self, value: Register) -> Result<(), JsError> {
        let mut i = self.cleanups.len();
        while i > 0 {
            i -= 1;
            match self.cleanups.get(i) {
                Some(Cleanup::IteratorClose { record }) => {
                    let record = *record;
                    self.builder.emit(Op::IteratorClose { record });
                }
                Some(Cleanup::Finally(fin)) => {
                    let (kind, slot, scope, handlers) =
                        (fin.kind, fin.value, fin.scope_depth, fin.handler_depth);
                    self.builder.emit(Op::Move { dst: slot, src: value });
                    self.emit_pops(scope, handlers);
                    self.builder.emit(Op::LoadInt {
                        dst: kind,
                        value: COMPLETION_RETURN,
                    });
                    self.jump_into_finally(i)?;
                    return Ok(());
                }
                None => {}
            }
        }
        self.builder.emit(Op::Return { src: value });
        Ok(())
    }

    fn jump_into_finally(&mut self, index: usize) -> Result<(), JsError> {
        let jump = self.builder.emit_jump();
        match self.cleanups.get_mut(index) {
            Some(Cleanup::Finally(fin)) => {
                fin.entry_jumps.push(jump);
                Ok(())
            }
            _ => Err(JsError::internal_error("finally context vanished")),
        }
    }

    /// Push a break/continue target at the current depths
    fn push_label(&mut self, label: LabelId) {
        self.labels.push(LabelContext {
            label,
            break_jumps: Vec::new(),
            continue_jumps: Vec::new(),
            scope_depth: self.scope_depth,
            handler_depth: self.handler_depth,
            cleanup_depth: self.cleanups.len(),
        });
    }

    /// Pop the innermost label, patching its continue jumps to `continue_target`.
    /// Break jumps are returned for the caller to patch.
    fn pop_label(&mut self, continue_target: Option<usize>) -> Result<Vec<JumpPlaceholder>, JsError> {
        let context = self
            .labels
            .pop()
            .ok_or_else(|| JsError::internal_error("label stack underflow"))?;
        match continue_target {
            Some(target) => {
                for jump in context.continue_jumps {
                    self.builder.patch_jump_to(jump, target as JumpTarget);
                }
            }
            None if !context.continue_jumps.is_empty() => {
                return Err(JsError::internal_error("continue to a non-loop label"));
            }
            None => {}
        }
        Ok(context.break_jumps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;
    use crate::ir::lower_program;
    use crate::parser::Parser;
    use crate::string_dict::StringDict;

    fn compile(source: &str) -> Rc<FunctionTemplate> {
        let mut dict = StringDict::new();
        let program = Parser::new(source, &mut dict, ParseOptions::default())
            .parse_program().unwrap();
        let template = lower_program(&program, source).unwrap();
        compile_tree(&template);
        template
    }

    #[test]
    fn compiles_nested_functions() {
        let template = compile("function f() { return function g() { return 1; }; }");
        assert!(template.chunk.get().is_some());
        for nested in template.nested_templates() {
            assert!(nested.chunk.get().is_some());
            for inner in nested.nested_templates() {
                assert!(inner.chunk.get().is_some());
            }
        }
    }

    #[test]
    fn generator_blocks_end_in_end_block() {
        let template = compile("function* g() { const x = yield 1; yield x; }");
        let generator = template.nested_templates().into_iter().next().unwrap();
        let chunk = generator.chunk.get().unwrap();
        assert!(!chunk.block_offsets.is_empty());
        for offset in &chunk.block_offsets {
            let end = chunk.code[*offset..]
                .iter()
                .position(|op| matches!(op, Op::EndBlock));
            assert!(end.is_some());
        }
    }

    #[test]
    fn registers_cover_temps() {
        let template = compile("let [a, b] = [1, 2];");
        let chunk = template.chunk.get().unwrap();
        assert!(chunk.register_count >= template.temp_count);
    }
}

//! BytecodeBuilder - helper for emitting bytecode instructions
//!
//! Provides register allocation, constant pooling and jump patching for the
//! compiler.

use super::bytecode::{BytecodeChunk, Constant, ConstantIndex, JumpTarget, Op, Register};
use crate::error::JsError;
use crate::value::{CheapClone, JsString};
use rustc_hash::FxHashMap;

/// Placeholder for a jump that needs to be patched later
#[derive(Debug, Clone, Copy)]
pub struct JumpPlaceholder {
    /// Index of the jump instruction in the code
    pub instruction_index: usize,
}

/// Stack-ordered register allocator. Registers below `base` are the function's
/// temps and are never handed out.
#[derive(Debug)]
pub struct RegisterAllocator {
    /// Next available register
    next: u32,

    /// Stack of saved positions (for nested expressions)
    saved: Vec<u32>,

    /// Maximum register used (for determining register_count)
    max_used: u32,
}

impl RegisterAllocator {
    pub fn new(base: u32) -> Self {
        Self {
            next: base,
            saved: Vec::new(),
            max_used: base,
        }
    }

    /// Allocate a register
    pub fn alloc(&mut self) -> Result<Register, JsError> {
        self.reserve_range(1)
    }

    /// Reserve consecutive registers (call arguments, class keys)
    pub fn reserve_range(&mut self, count: u32) -> Result<Register, JsError> {
        let end = self.next + count;
        if end > u32::from(Register::MAX) {
            return Err(JsError::internal_error(format!(
                "Too many registers needed (max {})",
                Register::MAX
            )));
        }
        let start = self.next as Register;
        self.next = end;
        self.max_used = self.max_used.max(end);
        Ok(start)
    }

    /// Save current allocation state (for nested expressions)
    pub fn save(&mut self) {
        self.saved.push(self.next);
    }

    /// Release every register allocated since the matching `save`
    pub fn restore(&mut self) {
        if let Some(pos) = self.saved.pop() {
            self.next = pos;
        }
    }

    pub fn max_used(&self) -> u32 {
        self.max_used
    }
}

/// Builder for constructing bytecode chunks
pub struct BytecodeBuilder {
    /// Bytecode instructions
    code: Vec<Op>,

    /// Constant pool
    constants: Vec<Constant>,

    /// String constant deduplication map
    string_map: FxHashMap<JsString, ConstantIndex>,

    /// Number constant deduplication map
    number_map: FxHashMap<u64, ConstantIndex>,

    registers: RegisterAllocator,

    block_offsets: Vec<usize>,
}

impl BytecodeBuilder {
    /// Create a builder whose scratch registers start after `temp_count` temps
    pub fn new(temp_count: u32) -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            string_map: FxHashMap::default(),
            number_map: FxHashMap::default(),
            registers: RegisterAllocator::new(temp_count),
            block_offsets: Vec::new(),
        }
    }

    /// Get access to the register allocator
    pub fn registers(&mut self) -> &mut RegisterAllocator {
        &mut self.registers
    }

    /// Emit an instruction and return its index
    pub fn emit(&mut self, op: Op) -> usize {
        let index = self.code.len();
        self.code.push(op);
        index
    }

    fn placeholder(&mut self, op: Op) -> JumpPlaceholder {
        JumpPlaceholder {
            instruction_index: self.emit(op),
        }
    }

    /// Emit a jump instruction with a placeholder target
    pub fn emit_jump(&mut self) -> JumpPlaceholder {
        self.placeholder(Op::Jump { target: 0 })
    }

    /// Emit a conditional jump (if true) with a placeholder target
    pub fn emit_jump_if_true(&mut self, cond: Register) -> JumpPlaceholder {
        self.placeholder(Op::JumpIfTrue { cond, target: 0 })
    }

    /// Emit a conditional jump (if false) with a placeholder target
    pub fn emit_jump_if_false(&mut self, cond: Register) -> JumpPlaceholder {
        self.placeholder(Op::JumpIfFalse { cond, target: 0 })
    }

    /// Emit a conditional jump (if NOT nullish) with a placeholder target
    pub fn emit_jump_if_not_nullish(&mut self, cond: Register) -> JumpPlaceholder {
        self.placeholder(Op::JumpIfNotNullish { cond, target: 0 })
    }

    pub fn emit_jump_if_int(&mut self, src: Register, value: i32) -> JumpPlaceholder {
        self.placeholder(Op::JumpIfInt {
            src,
            value,
            target: 0,
        })
    }

    /// Emit a handler with a placeholder target
    pub fn emit_push_handler(&mut self, exception: Register, finally: bool) -> JumpPlaceholder {
        self.placeholder(Op::PushHandler {
            target: 0,
            exception,
            finally,
        })
    }

    /// Emit a jump to a known target
    pub fn emit_jump_to(&mut self, target: usize) {
        self.emit(Op::Jump {
            target: target as JumpTarget,
        });
    }

    /// Patch a jump placeholder to jump to the current position
    pub fn patch_jump(&mut self, placeholder: JumpPlaceholder) {
        let target = self.code.len() as JumpTarget;
        self.patch_jump_to(placeholder, target);
    }

    /// Patch a jump placeholder to jump to a specific target
    pub fn patch_jump_to(&mut self, placeholder: JumpPlaceholder, target: JumpTarget) {
        if let Some(op) = self.code.get_mut(placeholder.instruction_index) {
            match op {
                Op::Jump { target: t }
                | Op::JumpIfTrue { target: t, .. }
                | Op::JumpIfFalse { target: t, .. }
                | Op::JumpIfNotNullish { target: t, .. }
                | Op::JumpIfInt { target: t, .. }
                | Op::PushHandler { target: t, .. } => *t = target,
                _ => {}
            }
        }
    }

    /// Get the current instruction offset (for jump targets)
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Record the entry of the next state machine block
    pub fn mark_block(&mut self) {
        self.block_offsets.push(self.code.len());
    }

    /// Add a string constant to the pool (with deduplication)
    pub fn add_string(&mut self, s: JsString) -> Result<ConstantIndex, JsError> {
        if let Some(&idx) = self.string_map.get(&s) {
            return Ok(idx);
        }

        let idx = self.add_constant(Constant::String(s.cheap_clone()))?;
        self.string_map.insert(s, idx);
        Ok(idx)
    }

    /// Add a number constant to the pool (with deduplication)
    pub fn add_number(&mut self, n: f64) -> Result<ConstantIndex, JsError> {
        let bits = n.to_bits();
        if let Some(&idx) = self.number_map.get(&bits) {
            return Ok(idx);
        }

        let idx = self.add_constant(Constant::Number(n))?;
        self.number_map.insert(bits, idx);
        Ok(idx)
    }

    /// Add a constant to the pool
    pub fn add_constant(&mut self, constant: Constant) -> Result<ConstantIndex, JsError> {
        let idx = ConstantIndex::try_from(self.constants.len())
            .map_err(|_| JsError::internal_error("Too many constants"))?;
        self.constants.push(constant);
        Ok(idx)
    }

    /// Emit LoadConst for a string
    pub fn emit_load_string(&mut self, dst: Register, s: JsString) -> Result<(), JsError> {
        let idx = self.add_string(s)?;
        self.emit(Op::LoadConst { dst, idx });
        Ok(())
    }

    /// Emit LoadConst for a number
    pub fn emit_load_number(&mut self, dst: Register, n: f64) -> Result<(), JsError> {
        // Small integers skip the pool; -0 must not
        if n.fract() == 0.0 && (-128.0..=127.0).contains(&n) && !(n == 0.0 && n.is_sign_negative()) {
            self.emit(Op::LoadInt {
                dst,
                value: n as i32,
            });
            return Ok(());
        }

        let idx = self.add_number(n)?;
        self.emit(Op::LoadConst { dst, idx });
        Ok(())
    }

    /// Finish building and return the bytecode chunk
    pub fn finish(self) -> BytecodeChunk {
        BytecodeChunk {
            code: self.code,
            constants: self.constants,
            register_count: self.registers.max_used(),
            block_offsets: self.block_offsets,
        }
    }

    /// Allocate a register
    pub fn alloc_register(&mut self) -> Result<Register, JsError> {
        self.registers.alloc()
    }

    /// Reserve a range of consecutive registers
    pub fn reserve_registers(&mut self, count: u32) -> Result<Register, JsError> {
        self.registers.reserve_range(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_registers_start_after_temps() {
        let mut builder = BytecodeBuilder::new(3);
        assert_eq!(builder.alloc_register().unwrap(), 3);
        builder.registers().save();
        assert_eq!(builder.reserve_registers(2).unwrap(), 4);
        builder.registers().restore();
        assert_eq!(builder.alloc_register().unwrap(), 4);
        assert_eq!(builder.finish().register_count, 6);
    }

    #[test]
    fn negative_zero_goes_through_the_pool() {
        let mut builder = BytecodeBuilder::new(0);
        builder.emit_load_number(0, -0.0).unwrap();
        builder.emit_load_number(0, 7.0).unwrap();
        let chunk = builder.finish();
        assert!(matches!(chunk.code.first(), Some(Op::LoadConst { .. })));
        assert!(matches!(chunk.code.get(1), Some(Op::LoadInt { value: 7, .. })));
    }

    #[test]
    fn patches_forward_jumps() {
        let mut builder = BytecodeBuilder::new(0);
        let jump = builder.emit_jump();
        builder.emit(Op::LoopHint);
        builder.patch_jump(jump);
        let chunk = builder.finish();
        assert!(matches!(chunk.code.first(), Some(Op::Jump { target: 2 })));
    }
}

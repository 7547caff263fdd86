//! Bytecode instruction set and chunk format
//!
//! Register-based: registers `0..temp_count` alias the lowered function's temps, so a
//! generator frame suspended by the state machine driver keeps its values in the
//! same place whichever tier resumes it. Scratch registers follow the temps.

use std::rc::Rc;

use crate::ast::{BinaryOp, UnaryOp};
use crate::ir::{Binding, ClassDef, FunctionTemplate, MethodKind, TemplateSite, WriteMode};
use crate::value::{JsString, PropertyKey};

/// Virtual register index
pub type Register = u16;

/// Constant pool index
pub type ConstantIndex = u32;

/// Jump target (instruction offset)
pub type JumpTarget = u32;

/// Bytecode instruction
#[derive(Debug, Clone)]
pub enum Op {
    // ═══════════════════════════════════════════════════════════════════════════════
    // Constants & Register Operations
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Load constant from pool: r[dst] = constants[idx]
    LoadConst { dst: Register, idx: ConstantIndex },

    /// Load undefined: r[dst] = undefined
    LoadUndefined { dst: Register },

    /// Load null: r[dst] = null
    LoadNull { dst: Register },

    /// Load boolean: r[dst] = value
    LoadBool { dst: Register, value: bool },

    /// Load integer (small numbers without constant pool): r[dst] = value
    LoadInt { dst: Register, value: i32 },

    /// Move register: r[dst] = r[src]
    Move { dst: Register, src: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Read a scope slot: r[dst] = scope[binding]
    GetLocal { dst: Register, binding: ConstantIndex },

    /// Write a scope slot: scope[binding] = r[src]
    SetLocal {
        src: Register,
        binding: ConstantIndex,
        mode: WriteMode,
    },

    /// Read a global: r[dst] = globals[name]
    GetGlobal { dst: Register, name: ConstantIndex },

    /// Write a global: globals[name] = r[src]
    SetGlobal { src: Register, name: ConstantIndex },

    /// Initialize a top-level lexical declaration
    InitGlobalLexical { src: Register, name: ConstantIndex },

    /// `typeof name` that tolerates unresolvable names
    TypeofGlobal { dst: Register, name: ConstantIndex },

    /// `delete name`: r[dst] = deleted
    DeleteGlobal { dst: Register, name: ConstantIndex },

    /// Create the global bindings of a script
    DeclareGlobals { idx: ConstantIndex },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Frame Values
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Load `this`: r[dst] = this
    LoadThis { dst: Register },

    /// Load `new.target`: r[dst] = new.target
    LoadNewTarget { dst: Register },

    /// Load a positional argument: r[dst] = arguments[index]
    LoadArg { dst: Register, index: u32 },

    /// Arguments from `from` on as an array
    RestArgs { dst: Register, from: u32 },

    /// Materialize the `arguments` object
    ArgumentsObject { dst: Register },

    /// Load the running function
    LoadCallee { dst: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Functions, Classes & Literals
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Create a closure over the current scope: r[dst] = closure(templates[template])
    Closure { dst: Register, template: ConstantIndex },

    /// Evaluate a class definition. Member keys sit in `keys..keys + members`.
    DefineClass {
        dst: Register,
        class: ConstantIndex,
        heritage: Option<Register>,
        keys: Register,
    },

    /// Create an empty array: r[dst] = []
    NewArray { dst: Register },

    /// Append a value: r[array].push(r[value])
    ArrayPush { array: Register, value: Register },

    /// Append a hole
    ArrayHole { array: Register },

    /// Append every value of an iterable: r[array].push(...r[iterable])
    ArraySpread { array: Register, iterable: Register },

    /// Create an empty object: r[dst] = {}
    NewObject { dst: Register },

    /// Define a data property: r[object][r[key]] = r[value]
    DefineField {
        object: Register,
        key: Register,
        value: Register,
    },

    /// Define a method, getter or setter on an object literal
    DefineMethod {
        object: Register,
        key: Register,
        template: ConstantIndex,
        kind: MethodKind,
    },

    /// Copy own enumerable properties: { ...r[source] }
    ObjectSpread { object: Register, source: Register },

    /// `__proto__: value` in an object literal
    SetProto { object: Register, value: Register },

    /// Name an anonymous function after a computed key
    NameFunction { value: Register, key: Register },

    /// String concatenation for templates: r[dst] = r[dst] + ToString(r[value])
    ToStringAppend { dst: Register, value: Register },

    /// Site object of a tagged template
    GetTemplateObject { dst: Register, site: ConstantIndex },

    /// Regular expression literal
    RegExp {
        dst: Register,
        pattern: ConstantIndex,
        flags: ConstantIndex,
    },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Unary operator: r[dst] = op r[src]
    Unary {
        dst: Register,
        op: UnaryOp,
        src: Register,
    },

    /// Type of value: r[dst] = typeof r[src]
    Typeof { dst: Register, src: Register },

    /// Binary operator: r[dst] = r[left] op r[right]
    Binary {
        dst: Register,
        op: BinaryOp,
        left: Register,
        right: Register,
    },

    /// `++`/`--`: r[old] = ToNumeric(r[src]), r[new] = r[old] +/- 1
    Update {
        old: Register,
        new: Register,
        src: Register,
        increment: bool,
    },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Control Flow
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Unconditional jump
    Jump { target: JumpTarget },

    /// Jump if truthy
    JumpIfTrue { cond: Register, target: JumpTarget },

    /// Jump if falsy
    JumpIfFalse { cond: Register, target: JumpTarget },

    /// Jump unless null or undefined
    JumpIfNotNullish { cond: Register, target: JumpTarget },

    /// Jump if r[src] holds the integer `value` (completion dispatch after `finally`)
    JumpIfInt {
        src: Register,
        value: i32,
        target: JumpTarget,
    },

    /// Loop back-edge: honors interrupt requests
    LoopHint,

    // ═══════════════════════════════════════════════════════════════════════════════
    // Property Access
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Get property with a computed key: r[dst] = r[object][r[key]]
    GetProp {
        dst: Register,
        object: Register,
        key: Register,
    },

    /// Get property with a constant key: r[dst] = r[object].key
    GetNamed {
        dst: Register,
        object: Register,
        key: ConstantIndex,
    },

    /// Set property with a computed key: r[object][r[key]] = r[value]
    SetProp {
        object: Register,
        key: Register,
        value: Register,
    },

    /// Set property with a constant key: r[object].key = r[value]
    SetNamed {
        object: Register,
        key: ConstantIndex,
        value: Register,
    },

    /// Delete property: r[dst] = delete r[object][r[key]]
    DeleteProp {
        dst: Register,
        object: Register,
        key: Register,
    },

    /// r[dst] = ToPropertyKey(r[src]) as a string or symbol
    ToPropertyKey { dst: Register, src: Register },

    /// `super[r[key]]` read with receiver r[this]
    SuperGet {
        dst: Register,
        key: Register,
        this: Register,
    },

    /// `super[r[key]] = r[value]` with receiver r[this]
    SuperSet {
        key: Register,
        this: Register,
        value: Register,
    },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Call: r[dst] = r[callee].call(r[this], r[args..args + argc]).
    /// `name` renders the callee in "is not a function" errors, followed by the
    /// computed member key in r[key] when present.
    Call {
        dst: Register,
        callee: Register,
        this: Register,
        args: Register,
        argc: u16,
        name: ConstantIndex,
        key: Option<Register>,
    },

    /// Call with the arguments collected in the array r[args]
    CallSpread {
        dst: Register,
        callee: Register,
        this: Register,
        args: Register,
        name: ConstantIndex,
        key: Option<Register>,
    },

    /// Construct: r[dst] = new r[callee](r[args..args + argc])
    New {
        dst: Register,
        callee: Register,
        args: Register,
        argc: u16,
        name: ConstantIndex,
    },

    /// Construct with the arguments collected in the array r[args]
    NewSpread {
        dst: Register,
        callee: Register,
        args: Register,
        name: ConstantIndex,
    },

    /// `super(...args)` in a derived constructor; binds `this` at `binding`
    SuperCall {
        dst: Register,
        args: Register,
        new_target: Register,
        active: Register,
        binding: ConstantIndex,
    },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Iteration
    // ═══════════════════════════════════════════════════════════════════════════════
    /// r[dst] = iterator record of r[src]
    GetIterator { dst: Register, src: Register },

    /// r[dst] = for-in key record of r[src]
    ForInIterator { dst: Register, src: Register },

    /// r[dst] = next value of record r[record], undefined when exhausted
    IteratorStep { dst: Register, record: Register },

    /// r[dst] = remaining values of r[record] as an array
    IteratorRest { dst: Register, record: Register },

    /// r[dst] = whether r[record] is exhausted
    IteratorDone { dst: Register, record: Register },

    /// Call `return` on r[record] unless it is exhausted
    IteratorClose { record: Register },

    /// Like `IteratorClose`, but errors from `return` are dropped
    IteratorCloseQuiet { record: Register },

    /// r[dst] = copy of r[source] without the keys in the array r[excluded]
    ObjectRest {
        dst: Register,
        source: Register,
        excluded: Register,
    },

    /// TypeError when r[src] is null or undefined, else r[dst] = r[src]
    RequireObjectCoercible { dst: Register, src: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Scopes
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Enter a child scope with `slots` uninitialized slots
    PushScope { slots: u32 },

    /// Return to the parent scope
    PopScope,

    /// Replace the current scope with a copy (per-iteration bindings)
    CopyScope,

    /// Put slots of the current scope back into the temporal dead zone
    Uninitialize { slots: ConstantIndex },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Exceptions & Completion
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Route catchable errors to `target`. A catch handler stores the thrown value in
    /// r[exception]; a finally handler parks the error itself for `Rethrow`.
    PushHandler {
        target: JumpTarget,
        exception: Register,
        finally: bool,
    },

    /// Drop the innermost handler
    PopHandler,

    /// Throw r[src]
    Throw { src: Register },

    /// Resume the error parked for r[src] by a finally handler
    Rethrow { src: Register },

    /// Return r[src] from the function
    Return { src: Register },

    /// End of a generator prologue or state machine block
    EndBlock,
}

/// A compiled function body
#[derive(Debug, Clone, Default)]
pub struct BytecodeChunk {
    /// The bytecode instructions
    pub code: Vec<Op>,

    /// Constant pool
    pub constants: Vec<Constant>,

    /// Number of registers needed, temps included
    pub register_count: u32,

    /// Entry offset of every state machine block (generators only)
    pub block_offsets: Vec<usize>,
}

/// Constants that can be stored in the pool
#[derive(Debug, Clone)]
pub enum Constant {
    String(JsString),
    Number(f64),
    /// Property key, loaded as its string or symbol value
    Key(PropertyKey),
    Binding(Binding),
    Template(Rc<FunctionTemplate>),
    Class(Rc<ClassDef>),
    Site(Rc<TemplateSite>),
    Slots(Vec<u32>),
    Globals {
        vars: Vec<JsString>,
        lexicals: Vec<(JsString, bool)>,
    },
}

impl BytecodeChunk {
    /// Get the instruction at the given offset
    pub fn get(&self, offset: usize) -> Option<&Op> {
        self.code.get(offset)
    }

    /// Get a constant from the pool
    pub fn get_constant(&self, idx: ConstantIndex) -> Option<&Constant> {
        self.constants.get(idx as usize)
    }
}

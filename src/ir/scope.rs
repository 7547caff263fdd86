//! Compile-time scopes
//!
//! Each function owns one runtime scope holding its parameters, `var`s and top-level
//! lexical declarations. Blocks get a runtime scope of their own only when they declare
//! lexical bindings that a closure could capture; otherwise their bindings take extra
//! slots in the nearest runtime scope and are reset on block entry.

use crate::ir::Binding;
use crate::prelude::FxHashMap;
use crate::value::{CheapClone, JsString};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclKind {
    Var,
    Let,
    Const,
    Function,
    Param,
    Class,
    CatchParam,
    /// Engine-provided binding (`this`, `arguments`, `new.target`)
    Implicit,
    /// Name of a function expression, visible inside its own body
    CalleeName,
}

impl DeclKind {
    pub(crate) fn is_lexical(self) -> bool {
        matches!(self, DeclKind::Let | DeclKind::Const | DeclKind::Class)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Declared {
    pub slot: u32,
    pub kind: DeclKind,
}

#[derive(Debug)]
struct CompileScope {
    names: FxHashMap<JsString, Declared>,
    materialized: bool,
    slot_count: u32,
    /// Script top level: user declarations live on the global object instead
    global: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ScopeChain {
    scopes: Vec<CompileScope>,
}

impl ScopeChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, materialized: bool) {
        self.scopes.push(CompileScope {
            names: FxHashMap::default(),
            materialized,
            slot_count: 0,
            global: false,
        });
    }

    pub(crate) fn push_global(&mut self) {
        self.push(true);
        if let Some(scope) = self.scopes.last_mut() {
            scope.global = true;
        }
    }

    /// Pop the innermost scope, returning its slot count when it had a runtime scope
    pub(crate) fn pop(&mut self) -> u32 {
        self.scopes
            .pop()
            .map(|scope| if scope.materialized { scope.slot_count } else { 0 })
            .unwrap_or(0)
    }

    pub(crate) fn is_global_level(&self) -> bool {
        self.scopes.last().is_some_and(|s| s.global)
    }

    /// Declared in the innermost scope
    pub(crate) fn lookup_local(&self, name: &str) -> Option<Declared> {
        self.scopes.last()?.names.get(name).copied()
    }

    /// Declare `name` in the innermost scope, allocating its slot in the nearest
    /// runtime scope. Redeclaring returns the existing slot.
    pub(crate) fn declare(&mut self, name: &JsString, kind: DeclKind) -> u32 {
        if let Some(existing) = self.lookup_local(name.as_str()) {
            if let Some(scope) = self.scopes.last_mut() {
                if let Some(entry) = scope.names.get_mut(name.as_str()) {
                    if kind == DeclKind::Function {
                        entry.kind = kind;
                    }
                }
            }
            return existing.slot;
        }
        let slot = self.allocate_slot();
        if let Some(scope) = self.scopes.last_mut() {
            scope
                .names
                .insert(name.cheap_clone(), Declared { slot, kind });
        }
        slot
    }

    fn allocate_slot(&mut self) -> u32 {
        for scope in self.scopes.iter_mut().rev() {
            if scope.materialized {
                let slot = scope.slot_count;
                scope.slot_count += 1;
                return slot;
            }
        }
        0
    }

    /// Resolve a name to a slot, or `None` when it must be looked up globally
    pub(crate) fn resolve(&self, name: &str) -> Option<(Binding, DeclKind)> {
        let mut hops = 0;
        for scope in self.scopes.iter().rev() {
            if let Some(declared) = scope.names.get(name) {
                return Some((
                    Binding {
                        name: JsString::from(name),
                        hops,
                        slot: declared.slot,
                    },
                    declared.kind,
                ));
            }
            if scope.materialized {
                hops += 1;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_blocks_allocate_in_the_enclosing_runtime_scope() {
        let mut chain = ScopeChain::new();
        chain.push(true);
        let a = chain.declare(&JsString::from("a"), DeclKind::Var);
        chain.push(false);
        let b = chain.declare(&JsString::from("b"), DeclKind::Let);
        let (binding, kind) = chain.resolve("a").unwrap();
        assert_eq!((binding.hops, binding.slot), (0, a));
        assert_eq!(kind, DeclKind::Var);
        assert_eq!(b, 1);
        assert_eq!(chain.pop(), 0);
        assert_eq!(chain.pop(), 2);
    }

    #[test]
    fn hops_count_runtime_scopes_only() {
        let mut chain = ScopeChain::new();
        chain.push(true);
        chain.declare(&JsString::from("outer"), DeclKind::Let);
        chain.push(false);
        chain.push(true);
        chain.declare(&JsString::from("inner"), DeclKind::Const);
        let (outer, _) = chain.resolve("outer").unwrap();
        let (inner, kind) = chain.resolve("inner").unwrap();
        assert_eq!(outer.hops, 1);
        assert_eq!(inner.hops, 0);
        assert_eq!(kind, DeclKind::Const);
        assert!(chain.resolve("missing").is_none());
    }
}

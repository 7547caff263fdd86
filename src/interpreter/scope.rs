//! Runtime scopes
//!
//! A scope is a fixed array of slots allocated by lowering; `None` marks a binding
//! still in its temporary dead zone. Closures hold an `Rc` to the scope they were
//! created in, which keeps the whole parent chain alive.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::JsError;
use crate::ir::{Binding, WriteMode};
use crate::value::{CheapClone, JsValue};

pub type ScopeRef = Rc<Scope>;

pub struct Scope {
    slots: RefCell<Vec<Option<JsValue>>>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn new(parent: Option<ScopeRef>, slot_count: u32) -> ScopeRef {
        Rc::new(Scope {
            slots: RefCell::new(vec![None; slot_count as usize]),
            parent,
        })
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    /// Sibling with the same parent and a snapshot of the current slot values
    pub fn copy(&self) -> ScopeRef {
        Rc::new(Scope {
            slots: RefCell::new(self.slots.borrow().clone()),
            parent: self.parent.clone(),
        })
    }

    fn ancestor(&self, hops: u32) -> Result<&Scope, JsError> {
        let mut scope = self;
        for _ in 0..hops {
            scope = scope
                .parent
                .as_deref()
                .ok_or_else(|| JsError::internal_error("scope chain shorter than binding depth"))?;
        }
        Ok(scope)
    }

    pub fn get(&self, binding: &Binding) -> Result<JsValue, JsError> {
        let scope = self.ancestor(binding.hops)?;
        let slots = scope.slots.borrow();
        match slots.get(binding.slot as usize) {
            Some(Some(value)) => Ok(value.cheap_clone()),
            Some(None) => Err(uninitialized(binding)),
            None => Err(JsError::internal_error(format!(
                "slot {} out of range for '{}'",
                binding.slot, binding.name
            ))),
        }
    }

    pub fn is_initialized(&self, binding: &Binding) -> Result<bool, JsError> {
        let scope = self.ancestor(binding.hops)?;
        let slots = scope.slots.borrow();
        Ok(matches!(slots.get(binding.slot as usize), Some(Some(_))))
    }

    pub fn set(&self, binding: &Binding, value: JsValue, mode: WriteMode) -> Result<(), JsError> {
        let scope = self.ancestor(binding.hops)?;
        let mut slots = scope.slots.borrow_mut();
        let slot = slots.get_mut(binding.slot as usize).ok_or_else(|| {
            JsError::internal_error(format!(
                "slot {} out of range for '{}'",
                binding.slot, binding.name
            ))
        })?;
        match mode {
            WriteMode::Init => *slot = Some(value),
            WriteMode::Assign => match slot {
                Some(current) => *current = value,
                None => return Err(uninitialized(binding)),
            },
            WriteMode::Const => {
                return Err(match slot {
                    Some(_) => JsError::type_error("Assignment to constant variable."),
                    None => uninitialized(binding),
                });
            }
        }
        Ok(())
    }

    /// Initialize a slot of this scope directly
    pub fn init_slot(&self, slot: u32, value: JsValue) {
        if let Some(entry) = self.slots.borrow_mut().get_mut(slot as usize) {
            *entry = Some(value);
        }
    }

    /// Put slots of this scope back into the temporal dead zone
    pub fn uninitialize(&self, slots: &[u32]) {
        let mut current = self.slots.borrow_mut();
        for slot in slots {
            if let Some(entry) = current.get_mut(*slot as usize) {
                *entry = None;
            }
        }
    }
}

fn uninitialized(binding: &Binding) -> JsError {
    JsError::reference_error_with_message(format!(
        "Cannot access '{}' before initialization",
        binding.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::JsString;

    fn binding(hops: u32, slot: u32) -> Binding {
        Binding {
            name: JsString::from("x"),
            hops,
            slot,
        }
    }

    #[test]
    fn reads_before_initialization_fail() {
        let scope = Scope::new(None, 1);
        let err = scope.get(&binding(0, 0)).unwrap_err();
        assert!(err.to_string().contains("before initialization"));
        scope.set(&binding(0, 0), JsValue::from(1), WriteMode::Init).unwrap();
        assert_eq!(scope.get(&binding(0, 0)).unwrap(), JsValue::from(1));
    }

    #[test]
    fn const_writes_are_rejected_after_init() {
        let scope = Scope::new(None, 1);
        scope.set(&binding(0, 0), JsValue::from(1), WriteMode::Init).unwrap();
        let err = scope
            .set(&binding(0, 0), JsValue::from(2), WriteMode::Const)
            .unwrap_err();
        assert!(matches!(err, JsError::TypeError { .. }));
    }

    #[test]
    fn copies_do_not_share_slots() {
        let parent = Scope::new(None, 1);
        parent.init_slot(0, JsValue::from("outer"));
        let child = Scope::new(Some(parent), 1);
        child.init_slot(0, JsValue::from(1));
        let copy = child.copy();
        copy.set(&binding(0, 0), JsValue::from(2), WriteMode::Assign).unwrap();
        assert_eq!(child.get(&binding(0, 0)).unwrap(), JsValue::from(1));
        assert_eq!(copy.get(&binding(1, 0)).unwrap(), JsValue::from("outer"));
    }
}

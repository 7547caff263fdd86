//! Collection aliases and stack helpers shared across the crate
//!
//! Engine-internal tables (scope resolution, interning, template sites) are keyed by
//! strings the engine controls or by small integers, so they use the fast Fx hasher.
//! Script-controlled property keys never go through these aliases; they live in
//! [`crate::object::PropertyMap`], which uses a randomly seeded hasher.

pub use rustc_hash::{FxHashMap, FxHashSet};

/// Insertion-ordered set with the Fx hasher
pub type IndexSet<T> = indexmap::IndexSet<T, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// Remaining stack below which [`grow_stack`] switches to a fresh segment
const STACK_RED_ZONE: usize = 256 * 1024;
/// Size of each segment [`grow_stack`] allocates
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Run `f`, moving to a new heap-allocated stack segment first when the current one
/// is nearly exhausted. Every recursive walk over script-controlled structure
/// (parsing, lowering, compiling, calls, serialization) goes through here, so depth
/// is bounded by the engine's own limits rather than the thread's stack size.
#[inline]
pub fn grow_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}

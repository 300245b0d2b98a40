//! Shared freeze flag and iteration guard
//!
//! Both primitives are reference-counted cells so that every handle cloned
//! from the same container observes the same state. Freezing is one-way:
//! once the flag is set it can never be cleared again.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{ValueError, ValueResult};

/// One-way mutability flag shared by every handle into the same value graph.
///
/// Containers hand a clone of their flag to every child they allocate, so
/// setting the flag at the root is visible through the whole subgraph.
#[derive(Debug, Clone, Default)]
pub struct FreezeFlag(Rc<Cell<bool>>);

impl FreezeFlag {
    /// Create a fresh, unfrozen flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Irreversible.
    pub fn freeze(&self) {
        self.0.set(true);
    }

    /// Whether the flag has been set
    pub fn is_frozen(&self) -> bool {
        self.0.get()
    }

    /// Reject the operation if the flag is set
    pub fn check(&self, op: &'static str) -> ValueResult<()> {
        if self.is_frozen() {
            Err(ValueError::Immutable { op })
        } else {
            Ok(())
        }
    }

    /// Whether two handles share the same underlying cell
    pub fn ptr_eq(&self, other: &FreezeFlag) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Live-iterator counter for a single container.
///
/// Iterators hold an [`IterScope`] for as long as they are alive; structural
/// mutation is rejected while the count is nonzero.
#[derive(Debug, Clone, Default)]
pub struct IterCounter(Rc<Cell<usize>>);

impl IterCounter {
    /// Create a counter with no live iterators
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live iterator and return its scope guard
    pub fn enter(&self) -> IterScope {
        self.0.set(self.0.get() + 1);
        IterScope(Rc::clone(&self.0))
    }

    /// Whether any iterator is currently live
    pub fn active(&self) -> bool {
        self.0.get() > 0
    }

    /// Reject the operation if an iterator is live
    pub fn check(&self, op: &'static str) -> ValueResult<()> {
        if self.active() {
            Err(ValueError::ConcurrentMutation { op })
        } else {
            Ok(())
        }
    }
}

/// RAII guard released when an iterator is dropped
#[derive(Debug)]
pub struct IterScope(Rc<Cell<usize>>);

impl Drop for IterScope {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

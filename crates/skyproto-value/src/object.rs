//! Foreign object seam
//!
//! Host components expose their own value types to scripts by implementing
//! [`ScriptObject`]. The value model treats them uniformly: it can name,
//! display, freeze, and compare them without knowing the concrete type, and
//! consumers that do know the type recover it through `as_any`.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::error::{ValueError, ValueResult};

/// A host-defined value participating in the script value model.
pub trait ScriptObject: fmt::Debug {
    /// Script-visible type name, e.g. `"message"`
    fn type_name(&self) -> &'static str;

    /// Downcast hook for consumers that know the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Make this object and everything reachable from it immutable
    fn freeze(&self);

    /// Whether the object has been frozen
    fn is_frozen(&self) -> bool;

    /// Whether the object may be used as a dict key
    fn is_hashable(&self) -> bool {
        false
    }

    /// Structural equality against another object.
    ///
    /// Implementations may fail instead of answering, e.g. when the two
    /// operands belong to unrelated schema types.
    fn try_eq(&self, other: &dyn ScriptObject) -> ValueResult<bool>;

    /// Ordering against another object. Unordered by default.
    fn try_compare(&self, other: &dyn ScriptObject) -> ValueResult<Ordering> {
        Err(ValueError::Incomparable {
            left: self.type_name(),
            right: other.type_name(),
        })
    }

    /// Write the script display form
    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// Shared handle to a foreign object
pub type ObjectRef = Rc<dyn ScriptObject>;

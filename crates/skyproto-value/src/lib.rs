//! skyproto-value - Dynamic value model for the skyproto bridge
//!
//! This crate defines the script-side half of the bridge: a closed dynamic
//! value type ([`ScriptValue`]), plain list/dict containers with the
//! interpreter's mutability contract (freeze-once-shared, no structural
//! mutation during iteration), the [`ScriptObject`] seam through which host
//! proxies enter the value model, and the script comparison order.
//!
//! It knows nothing about schemas or wire formats; the `skyproto` crate
//! builds the typed-message proxies on top of these primitives.

#![warn(missing_docs)]

mod compare;
mod dict;
mod error;
mod freeze;
mod list;
mod object;
mod value;

pub use compare::compare;
pub use dict::{ScriptDict, ScriptDictIter};
pub use error::{ValueError, ValueResult};
pub use freeze::{FreezeFlag, IterCounter, IterScope};
pub use list::{ScriptList, ScriptListIter};
pub use object::{ObjectRef, ScriptObject};
pub use value::ScriptValue;

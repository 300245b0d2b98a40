//! Repeated field proxy
//!
//! A mutable, iterable, indexable view over one repeated field. Negative
//! indexes resolve against the current length. Range-like positions clamp
//! to the valid range; element addressing errors when out of range. Every
//! mutating verb first checks the freeze flag, the live-iterator count, and
//! the owning record's validity, in that order.

use std::any::Any;
use std::fmt;

use prost_reflect::FieldDescriptor;
use skyproto_value::{IterScope, ScriptList, ScriptObject, ScriptValue, ValueResult};

use crate::convert;
use crate::error::{Error, Result};
use crate::record::{FieldValue, ListHandle};

/// A repeated field exposed as a script sequence.
///
/// Cloning the proxy aliases the same storage.
#[derive(Debug, Clone)]
pub struct RepeatedProxy {
    handle: ListHandle,
    field: FieldDescriptor,
}

/// Resolve a possibly negative index to an element position
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    usize::try_from(resolved).ok().filter(|&i| i < len)
}

/// Resolve a possibly negative position, clamping into `[0, len]`
fn clamp_index(index: i64, len: usize) -> usize {
    let resolved = if index < 0 { index + len as i64 } else { index };
    resolved.clamp(0, len as i64) as usize
}

impl RepeatedProxy {
    pub(crate) fn from_parts(handle: ListHandle, field: FieldDescriptor) -> Self {
        RepeatedProxy { handle, field }
    }

    /// The repeated field this proxy views
    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    /// The shared storage handle
    pub fn handle(&self) -> &ListHandle {
        &self.handle
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.handle.len()
    }

    /// Check if the field is empty
    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// Element at index, negative indexes allowed
    pub fn get(&self, index: i64) -> Result<ScriptValue> {
        let i = resolve_index(index, self.len()).ok_or(Error::OutOfRange {
            index,
            len: self.len(),
        })?;
        Ok(convert::element_to_script(
            &self.field,
            self.handle.get(i).expect("index checked against length"),
        ))
    }

    /// Replace the element at index
    pub fn set(&self, index: i64, value: &ScriptValue) -> Result<()> {
        self.handle.check_mutable("assign to index")?;
        let i = resolve_index(index, self.len()).ok_or(Error::OutOfRange {
            index,
            len: self.len(),
        })?;
        self.handle
            .set_raw(i, convert::element_to_field(&self.field, value)?);
        Ok(())
    }

    /// Append one element
    pub fn append(&self, value: &ScriptValue) -> Result<()> {
        self.handle.check_mutable("append")?;
        self.handle
            .push_raw(convert::element_to_field(&self.field, value)?);
        Ok(())
    }

    /// Insert an element at a position. Positions at or beyond the current
    /// length append.
    pub fn insert(&self, index: i64, value: &ScriptValue) -> Result<()> {
        self.handle.check_mutable("insert")?;
        let i = clamp_index(index, self.len());
        self.handle
            .insert_raw(i, convert::element_to_field(&self.field, value)?);
        Ok(())
    }

    /// Remove and return the element at index, the last by default
    pub fn pop(&self, index: Option<i64>) -> Result<ScriptValue> {
        self.handle.check_mutable("pop")?;
        let index = index.unwrap_or(-1);
        let i = resolve_index(index, self.len()).ok_or(Error::OutOfRange {
            index,
            len: self.len(),
        })?;
        Ok(convert::element_to_script(
            &self.field,
            self.handle.remove_raw(i),
        ))
    }

    /// Remove the first element structurally equal to the value
    pub fn remove(&self, value: &ScriptValue) -> Result<()> {
        self.handle.check_mutable("remove")?;
        match self.find(value, 0, self.len())? {
            Some(i) => {
                self.handle.remove_raw(i);
                Ok(())
            }
            None => Err(Error::MissingValue {
                value: value.to_string(),
            }),
        }
    }

    /// Append every element of an iterable: a plain list or another
    /// repeated field
    pub fn extend(&self, values: &ScriptValue) -> Result<()> {
        self.handle.check_mutable("extend")?;
        let elements: Vec<ScriptValue> = if let Some(list) = values.as_list() {
            list.to_vec()
        } else if let Some(other) = values.downcast_object::<RepeatedProxy>() {
            other
                .handle
                .to_vec()
                .into_iter()
                .map(|element| convert::element_to_script(&other.field, element))
                .collect()
        } else {
            return Err(Error::Conversion {
                field: self.field.full_name().to_string(),
                kind: "iterable".to_string(),
                got: values.type_name().to_string(),
            });
        };
        for element in &elements {
            self.handle
                .push_raw(convert::element_to_field(&self.field, element)?);
        }
        Ok(())
    }

    /// Remove all elements
    pub fn clear(&self) -> Result<()> {
        self.handle.check_mutable("clear")?;
        self.handle.clear_raw();
        Ok(())
    }

    /// Position of the first element structurally equal to the value,
    /// searched within clamped `[start, end)` bounds
    pub fn index(&self, value: &ScriptValue, start: Option<i64>, end: Option<i64>) -> Result<i64> {
        let len = self.len();
        let start = clamp_index(start.unwrap_or(0), len);
        let end = clamp_index(end.unwrap_or(len as i64), len);
        match self.find(value, start, end)? {
            Some(i) => Ok(i as i64),
            None => Err(Error::MissingValue {
                value: value.to_string(),
            }),
        }
    }

    fn find(&self, value: &ScriptValue, start: usize, end: usize) -> Result<Option<usize>> {
        let elements = self.handle.to_vec();
        for (i, element) in elements.iter().enumerate().take(end).skip(start) {
            let script = convert::element_to_script(&self.field, element.clone());
            if script.equals(value)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Copy a clamped `[start, end)` range into a plain list. Slices are
    /// snapshots, never live aliases.
    pub fn slice(&self, start: Option<i64>, end: Option<i64>) -> ScriptList {
        let len = self.len();
        let start = clamp_index(start.unwrap_or(0), len);
        let end = clamp_index(end.unwrap_or(len as i64), len).max(start);
        let elements = self.handle.to_vec()[start..end].to_vec();
        convert::elements_to_script_list(&self.field, elements)
    }

    /// Iterate over elements. Structural mutation is rejected while the
    /// iterator is alive.
    pub fn iter(&self) -> RepeatedIter {
        RepeatedIter {
            _scope: self.handle.enter_iter(),
            proxy: self.clone(),
            index: 0,
        }
    }

    /// Freeze the field and every reachable submessage. Irreversible.
    pub fn freeze(&self) {
        let mut seen = Vec::new();
        self.handle.freeze_walk(&mut seen);
    }

    /// Whether the field is frozen
    pub fn is_frozen(&self) -> bool {
        self.handle.is_frozen()
    }

    /// Elementwise structural equality
    pub fn equals(&self, other: &RepeatedProxy) -> bool {
        self.handle.equals(&other.handle)
    }
}

impl ScriptObject for RepeatedProxy {
    fn type_name(&self) -> &'static str {
        "repeated"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn freeze(&self) {
        RepeatedProxy::freeze(self);
    }

    fn is_frozen(&self) -> bool {
        self.handle.is_frozen()
    }

    fn try_eq(&self, other: &dyn ScriptObject) -> ValueResult<bool> {
        match other.as_any().downcast_ref::<RepeatedProxy>() {
            Some(other) => Ok(self.equals(other)),
            None => Ok(false),
        }
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for RepeatedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, element) in self.handle.to_vec().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", convert::element_to_script(&self.field, element))?;
        }
        write!(f, "]")
    }
}

/// Live iterator over a [`RepeatedProxy`]
#[derive(Debug)]
pub struct RepeatedIter {
    proxy: RepeatedProxy,
    index: usize,
    _scope: IterScope,
}

impl Iterator for RepeatedIter {
    type Item = ScriptValue;

    fn next(&mut self) -> Option<ScriptValue> {
        let element = self.proxy.handle.get(self.index)?;
        self.index += 1;
        Some(convert::element_to_script(&self.proxy.field, element))
    }
}

//! Map field proxy
//!
//! A mutable associative view over one map field. Keys convert through the
//! key field descriptor; values through the value field descriptor.
//! Enumeration order is not storage order: `keys`, `values`, and `items`
//! recompute a copy sorted by the script comparison order over keys on
//! every call. Mutation is guarded exactly like the repeated field proxy.

use std::any::Any;
use std::fmt;

use prost_reflect::{FieldDescriptor, Kind};
use skyproto_value::{compare, IterScope, ScriptObject, ScriptValue, ValueResult};

use crate::convert;
use crate::error::{Error, Result};
use crate::record::{MapHandle, MapKeyValue};

/// A map field exposed as a script mapping.
///
/// Cloning the proxy aliases the same storage.
#[derive(Debug, Clone)]
pub struct MapProxy {
    handle: MapHandle,
    field: FieldDescriptor,
}

impl MapProxy {
    pub(crate) fn from_parts(handle: MapHandle, field: FieldDescriptor) -> Self {
        MapProxy { handle, field }
    }

    /// The map field this proxy views
    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    /// The shared storage handle
    pub fn handle(&self) -> &MapHandle {
        &self.handle
    }

    /// The key field descriptor of the map entry
    pub fn key_field(&self) -> FieldDescriptor {
        match self.field.kind() {
            Kind::Message(entry) => entry.map_entry_key_field(),
            kind => panic!(
                "schema inconsistency: map field {} of kind {}",
                self.field.full_name(),
                convert::kind_name(&kind)
            ),
        }
    }

    /// The value field descriptor of the map entry
    pub fn value_field(&self) -> FieldDescriptor {
        match self.field.kind() {
            Kind::Message(entry) => entry.map_entry_value_field(),
            kind => panic!(
                "schema inconsistency: map field {} of kind {}",
                self.field.full_name(),
                convert::kind_name(&kind)
            ),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.handle.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// Value for a key, or a default, or the absence value
    pub fn get(&self, key: &ScriptValue, default: Option<&ScriptValue>) -> Result<ScriptValue> {
        let key = convert::to_map_key(&self.key_field(), key)?;
        Ok(match self.handle.get(&key) {
            Some(value) => convert::element_to_script(&self.value_field(), value),
            None => default.cloned().unwrap_or(ScriptValue::None),
        })
    }

    /// Whether the key is present
    pub fn contains(&self, key: &ScriptValue) -> Result<bool> {
        let key = convert::to_map_key(&self.key_field(), key)?;
        Ok(self.handle.contains(&key))
    }

    /// Insert or replace an entry
    pub fn set(&self, key: &ScriptValue, value: &ScriptValue) -> Result<()> {
        self.handle.check_mutable("assign to key")?;
        let key = convert::to_map_key(&self.key_field(), key)?;
        let value = convert::element_to_field(&self.value_field(), value)?;
        self.handle.insert_raw(key, value);
        Ok(())
    }

    /// Value for a key, inserting the default first when absent
    pub fn setdefault(&self, key: &ScriptValue, default: &ScriptValue) -> Result<ScriptValue> {
        self.handle.check_mutable("setdefault")?;
        let converted_key = convert::to_map_key(&self.key_field(), key)?;
        if let Some(existing) = self.handle.get(&converted_key) {
            return Ok(convert::element_to_script(&self.value_field(), existing));
        }
        let value = convert::element_to_field(&self.value_field(), default)?;
        self.handle.insert_raw(converted_key.clone(), value);
        Ok(convert::element_to_script(
            &self.value_field(),
            self.handle.get(&converted_key).expect("entry just inserted"),
        ))
    }

    /// Remove an entry and return its value; a missing key returns the
    /// default instead, or fails without one
    pub fn pop(&self, key: &ScriptValue, default: Option<&ScriptValue>) -> Result<ScriptValue> {
        self.handle.check_mutable("pop")?;
        let converted_key = convert::to_map_key(&self.key_field(), key)?;
        match self.handle.remove_raw(&converted_key) {
            Some(value) => Ok(convert::element_to_script(&self.value_field(), value)),
            None => match default {
                Some(value) => Ok(value.clone()),
                None => Err(Error::MissingKey {
                    key: key.to_string(),
                }),
            },
        }
    }

    /// Delete an entry; a missing key is an error
    pub fn remove(&self, key: &ScriptValue) -> Result<()> {
        self.handle.check_mutable("remove")?;
        let converted_key = convert::to_map_key(&self.key_field(), key)?;
        match self.handle.remove_raw(&converted_key) {
            Some(_) => Ok(()),
            None => Err(Error::MissingKey {
                key: key.to_string(),
            }),
        }
    }

    /// Remove all entries
    pub fn clear(&self) -> Result<()> {
        self.handle.check_mutable("clear")?;
        self.handle.clear_raw();
        Ok(())
    }

    /// A fresh copy of the entries, sorted by script key order.
    ///
    /// Recomputed on every call; nothing is cached across mutations.
    pub fn sorted_entries(&self) -> Result<Vec<(ScriptValue, ScriptValue)>> {
        let value_fd = self.value_field();
        let mut entries: Vec<(ScriptValue, ScriptValue)> = self
            .handle
            .entries()
            .into_iter()
            .map(|(key, value)| {
                (
                    convert::map_key_to_script(&key),
                    convert::element_to_script(&value_fd, value),
                )
            })
            .collect();
        let mut failure = None;
        entries.sort_by(|a, b| match compare(&a.0, &b.0) {
            Ok(ordering) => ordering,
            Err(err) => {
                failure.get_or_insert(err);
                std::cmp::Ordering::Equal
            }
        });
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(entries),
        }
    }

    /// Keys sorted by script order, freshly computed
    pub fn keys(&self) -> Result<Vec<ScriptValue>> {
        Ok(self.sorted_entries()?.into_iter().map(|(k, _)| k).collect())
    }

    /// Values in sorted-key order, freshly computed
    pub fn values(&self) -> Result<Vec<ScriptValue>> {
        Ok(self.sorted_entries()?.into_iter().map(|(_, v)| v).collect())
    }

    /// Key/value pairs in sorted-key order, freshly computed
    pub fn items(&self) -> Result<Vec<(ScriptValue, ScriptValue)>> {
        self.sorted_entries()
    }

    /// Iterate over keys in sorted order. Structural mutation is rejected
    /// while the iterator is alive.
    pub fn iter(&self) -> Result<MapIter> {
        let keys = self.keys()?;
        Ok(MapIter {
            _scope: self.handle.enter_iter(),
            keys: keys.into_iter(),
        })
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

    /// Entrywise structural equality
    pub fn equals(&self, other: &MapProxy) -> bool {
        self.handle.equals(&other.handle)
    }
}

impl ScriptObject for MapProxy {
    fn type_name(&self) -> &'static str {
        "map"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn freeze(&self) {
        MapProxy::freeze(self);
    }

    fn is_frozen(&self) -> bool {
        self.handle.is_frozen()
    }

    fn try_eq(&self, other: &dyn ScriptObject) -> ValueResult<bool> {
        match other.as_any().downcast_ref::<MapProxy>() {
            Some(other) => Ok(self.equals(other)),
            None => Ok(false),
        }
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for MapProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value_fd = self.value_field();
        write!(f, "{{")?;
        for (i, (key, value)) in self.handle.entries().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}: {}",
                convert::map_key_to_script(&key),
                convert::element_to_script(&value_fd, value)
            )?;
        }
        write!(f, "}}")
    }
}

/// Live iterator over a [`MapProxy`]'s keys in sorted order
#[derive(Debug)]
pub struct MapIter {
    keys: std::vec::IntoIter<ScriptValue>,
    _scope: IterScope,
}

impl Iterator for MapIter {
    type Item = ScriptValue;

    fn next(&mut self) -> Option<ScriptValue> {
        self.keys.next()
    }
}

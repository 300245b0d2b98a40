//! Plain script dict
//!
//! Shared-handle mutable mapping with insertion-ordered enumeration, the
//! interpreter's dict semantics. Lookup is structural equality over keys,
//! so an int key and a float key with the same numeric value collide, and
//! only hashable values are accepted as keys.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{ValueError, ValueResult};
use crate::freeze::{FreezeFlag, IterCounter, IterScope};
use crate::value::ScriptValue;

/// A mutable script mapping. Cloning the handle aliases the same storage.
#[derive(Debug, Clone, Default)]
pub struct ScriptDict {
    inner: Rc<DictInner>,
}

#[derive(Debug, Default)]
struct DictInner {
    entries: RefCell<Vec<(ScriptValue, ScriptValue)>>,
    frozen: FreezeFlag,
    iters: IterCounter,
}

impl ScriptDict {
    /// Create an empty dict
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dict from key/value pairs. Later duplicates win.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (ScriptValue, ScriptValue)>,
    ) -> ValueResult<Self> {
        let dict = ScriptDict::new();
        for (key, value) in pairs {
            dict.insert(key, value)?;
        }
        Ok(dict)
    }

    fn check_mutable(&self, op: &'static str) -> ValueResult<()> {
        self.inner.frozen.check(op)?;
        self.inner.iters.check(op)
    }

    fn position(&self, key: &ScriptValue) -> ValueResult<Option<usize>> {
        let entries = self.inner.entries.borrow();
        for (i, (k, _)) in entries.iter().enumerate() {
            if k.equals(key)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Check if the dict is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a value by key
    pub fn get(&self, key: &ScriptValue) -> ValueResult<Option<ScriptValue>> {
        Ok(self
            .position(key)?
            .map(|i| self.inner.entries.borrow()[i].1.clone()))
    }

    /// Whether the key is present
    pub fn contains(&self, key: &ScriptValue) -> ValueResult<bool> {
        Ok(self.position(key)?.is_some())
    }

    /// Insert or replace an entry
    pub fn insert(&self, key: ScriptValue, value: ScriptValue) -> ValueResult<()> {
        self.check_mutable("insert")?;
        if !key.is_hashable() {
            return Err(ValueError::UnhashableKey {
                type_name: key.type_name(),
            });
        }
        match self.position(&key)? {
            Some(i) => self.inner.entries.borrow_mut()[i].1 = value,
            None => self.inner.entries.borrow_mut().push((key, value)),
        }
        Ok(())
    }

    /// Remove an entry, returning its value if present
    pub fn remove(&self, key: &ScriptValue) -> ValueResult<Option<ScriptValue>> {
        self.check_mutable("remove")?;
        Ok(self
            .position(key)?
            .map(|i| self.inner.entries.borrow_mut().remove(i).1))
    }

    /// Remove all entries
    pub fn clear(&self) -> ValueResult<()> {
        self.check_mutable("clear")?;
        self.inner.entries.borrow_mut().clear();
        Ok(())
    }

    /// Keys in insertion order
    pub fn keys(&self) -> Vec<ScriptValue> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Key/value pairs in insertion order
    pub fn entries(&self) -> Vec<(ScriptValue, ScriptValue)> {
        self.inner.entries.borrow().clone()
    }

    /// Iterate over key/value pairs, blocking mutation while live
    pub fn iter(&self) -> ScriptDictIter {
        ScriptDictIter {
            dict: self.clone(),
            index: 0,
            _scope: self.inner.iters.enter(),
        }
    }

    /// Freeze the dict and every key and value
    pub fn freeze(&self) {
        if self.inner.frozen.is_frozen() {
            return;
        }
        self.inner.frozen.freeze();
        for (key, value) in self.inner.entries.borrow().iter() {
            key.freeze();
            value.freeze();
        }
    }

    /// Whether the dict is frozen
    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.is_frozen()
    }

    /// Structural equality, order-insensitive
    pub fn equals(&self, other: &ScriptDict) -> ValueResult<bool> {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return Ok(true);
        }
        if self.len() != other.len() {
            return Ok(false);
        }
        for (key, value) in self.entries() {
            match other.get(&key)? {
                Some(theirs) if value.equals(&theirs)? => continue,
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Whether two handles alias the same storage
    pub fn ptr_eq(&self, other: &ScriptDict) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for ScriptDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.inner.entries.borrow().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Live iterator over a [`ScriptDict`]
#[derive(Debug)]
pub struct ScriptDictIter {
    dict: ScriptDict,
    index: usize,
    _scope: IterScope,
}

impl Iterator for ScriptDictIter {
    type Item = (ScriptValue, ScriptValue);

    fn next(&mut self) -> Option<(ScriptValue, ScriptValue)> {
        let entry = self.dict.inner.entries.borrow().get(self.index).cloned();
        if entry.is_some() {
            self.index += 1;
        }
        entry
    }
}

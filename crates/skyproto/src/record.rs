//! Typed record storage
//!
//! A [`Record`] is the mutable, schema-addressed storage behind one message
//! proxy. Storage cells are reference counted so that a child handle (a
//! submessage record, a repeated field, a map field) is a live alias into
//! its owner: mutation through the child is visible to the owner and to
//! every other handle over the same cell.
//!
//! Each record carries the freeze flag for its subgraph. Handles allocated
//! through the record share the owner's flag, so freezing the root is
//! immediately visible along the ownership path; `freeze` additionally
//! walks the reachable graph so that foreign subgraphs spliced in by
//! assignment freeze as well.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor};
use skyproto_value::{FreezeFlag, IterCounter, IterScope};

use crate::error::{Error, Result};

// ============================================================================
// Field values
// ============================================================================

/// A single stored field value, mirroring the declared field kinds.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// bool
    Bool(bool),
    /// int32, sint32, sfixed32
    I32(i32),
    /// int64, sint64, sfixed64
    I64(i64),
    /// uint32, fixed32
    U32(u32),
    /// uint64, fixed64
    U64(u64),
    /// float
    F32(f32),
    /// double
    F64(f64),
    /// string
    String(String),
    /// bytes
    Bytes(Bytes),
    /// enum, stored by number (open-enum: any number is representable)
    Enum(i32),
    /// A submessage, held by live alias
    Message(Record),
    /// A repeated field, held by live alias
    List(ListHandle),
    /// A map field, held by live alias
    Map(MapHandle),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &FieldValue) -> bool {
        use FieldValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (U32(a), U32(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            (F32(a), F32(b)) => a == b,
            (F64(a), F64(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (Message(a), Message(b)) => a.equals(b),
            (List(a), List(b)) => a.equals(b),
            (Map(a), Map(b)) => a.equals(b),
            _ => false,
        }
    }
}

/// A map key. Key kinds are always scalar: bool, the integer kinds, or
/// string. Ordered so map storage is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKeyValue {
    /// bool key
    Bool(bool),
    /// int32, sint32, sfixed32 key
    I32(i32),
    /// int64, sint64, sfixed64 key
    I64(i64),
    /// uint32, fixed32 key
    U32(u32),
    /// uint64, fixed64 key
    U64(u64),
    /// string key
    String(String),
}

impl fmt::Display for MapKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKeyValue::Bool(b) => write!(f, "{}", b),
            MapKeyValue::I32(v) => write!(f, "{}", v),
            MapKeyValue::I64(v) => write!(f, "{}", v),
            MapKeyValue::U32(v) => write!(f, "{}", v),
            MapKeyValue::U64(v) => write!(f, "{}", v),
            MapKeyValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// The zero value for a field of the given descriptor.
///
/// Rendered fresh on every call. Repeated and map fields default to empty
/// free-standing handles; singular message kinds produce a detached
/// read-only placeholder.
pub fn default_field_value(fd: &FieldDescriptor) -> FieldValue {
    if fd.is_map() {
        return FieldValue::Map(MapHandle::new());
    }
    if fd.is_list() {
        return FieldValue::List(ListHandle::new());
    }
    match fd.kind() {
        Kind::Bool => FieldValue::Bool(false),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => FieldValue::I32(0),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => FieldValue::I64(0),
        Kind::Uint32 | Kind::Fixed32 => FieldValue::U32(0),
        Kind::Uint64 | Kind::Fixed64 => FieldValue::U64(0),
        Kind::Float => FieldValue::F32(0.0),
        Kind::Double => FieldValue::F64(0.0),
        Kind::String => FieldValue::String(String::new()),
        Kind::Bytes => FieldValue::Bytes(Bytes::new()),
        Kind::Enum(ed) => FieldValue::Enum(ed.default_value().number()),
        Kind::Message(md) => FieldValue::Message(Record::detached(md)),
    }
}

// ============================================================================
// Record
// ============================================================================

/// Reference-counted storage for one message instance.
///
/// Cloning the handle aliases the same storage.
#[derive(Debug, Clone)]
pub struct Record {
    inner: Rc<RecordInner>,
}

#[derive(Debug)]
struct RecordInner {
    desc: MessageDescriptor,
    fields: RefCell<BTreeMap<u32, FieldValue>>,
    frozen: FreezeFlag,
    valid: bool,
}

impl Record {
    /// Create an empty, mutable record
    pub fn new(desc: MessageDescriptor) -> Self {
        Record {
            inner: Rc::new(RecordInner {
                desc,
                fields: RefCell::new(BTreeMap::new()),
                frozen: FreezeFlag::new(),
                valid: true,
            }),
        }
    }

    /// Create a detached read-only zero value.
    ///
    /// Reads yield defaults; every mutation fails with `InvalidRecord`.
    pub fn detached(desc: MessageDescriptor) -> Self {
        Record {
            inner: Rc::new(RecordInner {
                desc,
                fields: RefCell::new(BTreeMap::new()),
                frozen: FreezeFlag::new(),
                valid: false,
            }),
        }
    }

    /// Create an empty record whose freeze flag is shared with an owner
    pub(crate) fn with_flag(desc: MessageDescriptor, frozen: FreezeFlag) -> Self {
        Record {
            inner: Rc::new(RecordInner {
                desc,
                fields: RefCell::new(BTreeMap::new()),
                frozen,
                valid: true,
            }),
        }
    }

    /// The message descriptor this record stores
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.inner.desc
    }

    /// Whether this record accepts mutation at all
    pub fn is_valid(&self) -> bool {
        self.inner.valid
    }

    /// Whether the freeze flag has been set
    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.is_frozen()
    }

    /// The freeze flag shared with handles allocated through this record
    pub(crate) fn freeze_flag(&self) -> &FreezeFlag {
        &self.inner.frozen
    }

    /// Whether two handles alias the same storage
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reject the operation if this record may not be mutated
    pub fn check_mutable(&self, op: &str) -> Result<()> {
        if self.inner.frozen.is_frozen() {
            return Err(Error::Immutable { op: op.to_string() });
        }
        if !self.inner.valid {
            return Err(Error::InvalidRecord { op: op.to_string() });
        }
        Ok(())
    }

    /// The stored value for a field, if set
    pub fn stored(&self, fd: &FieldDescriptor) -> Option<FieldValue> {
        self.inner.fields.borrow().get(&fd.number()).cloned()
    }

    /// The effective value for a field: stored, or the default
    pub fn get(&self, fd: &FieldDescriptor) -> FieldValue {
        self.stored(fd).unwrap_or_else(|| default_field_value(fd))
    }

    /// Whether a field is populated.
    ///
    /// Repeated and map fields count as populated only when non-empty.
    pub fn has(&self, fd: &FieldDescriptor) -> bool {
        match self.stored(fd) {
            Some(FieldValue::List(h)) => !h.is_empty(),
            Some(FieldValue::Map(h)) => !h.is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    /// Store a field value. Setting a oneof member clears its siblings.
    pub fn set(&self, fd: &FieldDescriptor, value: FieldValue) -> Result<()> {
        self.check_mutable("set field")?;
        let mut fields = self.inner.fields.borrow_mut();
        if let Some(oneof) = fd.containing_oneof() {
            for sibling in oneof.fields() {
                if sibling.number() != fd.number() {
                    fields.remove(&sibling.number());
                }
            }
        }
        fields.insert(fd.number(), value);
        Ok(())
    }

    /// Clear a field
    pub fn clear(&self, fd: &FieldDescriptor) -> Result<()> {
        self.check_mutable("clear field")?;
        self.inner.fields.borrow_mut().remove(&fd.number());
        Ok(())
    }

    /// Get-or-allocate the live list handle for a repeated field.
    ///
    /// On a frozen or detached record the handle is not stored; it simply
    /// carries the record's flags so mutation through it keeps failing.
    pub fn mutable_list(&self, fd: &FieldDescriptor) -> ListHandle {
        if let Some(FieldValue::List(handle)) = self.stored(fd) {
            return handle;
        }
        let handle = ListHandle::with_flags(self.inner.frozen.clone(), self.inner.valid);
        if self.inner.valid && !self.inner.frozen.is_frozen() {
            self.inner
                .fields
                .borrow_mut()
                .insert(fd.number(), FieldValue::List(handle.clone()));
        }
        handle
    }

    /// Get-or-allocate the live map handle for a map field
    pub fn mutable_map(&self, fd: &FieldDescriptor) -> MapHandle {
        if let Some(FieldValue::Map(handle)) = self.stored(fd) {
            return handle;
        }
        let handle = MapHandle::with_flags(self.inner.frozen.clone(), self.inner.valid);
        if self.inner.valid && !self.inner.frozen.is_frozen() {
            self.inner
                .fields
                .borrow_mut()
                .insert(fd.number(), FieldValue::Map(handle.clone()));
        }
        handle
    }

    /// Get-or-allocate the live submessage record for a message field.
    ///
    /// Unlike lists and maps, allocating a submessage marks the field
    /// populated, so this is only used on write paths.
    pub fn mutable_message(&self, fd: &FieldDescriptor) -> Result<Record> {
        if let Some(FieldValue::Message(record)) = self.stored(fd) {
            return Ok(record);
        }
        self.check_mutable("allocate submessage")?;
        let md = match fd.kind() {
            Kind::Message(md) => md,
            kind => {
                return Err(Error::mismatch(
                    "message field",
                    crate::convert::kind_name(&kind),
                ));
            }
        };
        let record = Record::with_flag(md, self.inner.frozen.clone());
        self.set(fd, FieldValue::Message(record.clone()))?;
        Ok(record)
    }

    /// The populated member of a oneof, if any
    pub fn which_oneof(&self, oneof: &OneofDescriptor) -> Option<FieldDescriptor> {
        oneof.fields().find(|fd| self.has(fd))
    }

    /// Freeze this record and everything reachable from it. Irreversible.
    pub fn freeze(&self) {
        let mut seen = Vec::new();
        self.freeze_walk(&mut seen);
    }

    fn freeze_walk(&self, seen: &mut Vec<*const ()>) {
        let ptr = Rc::as_ptr(&self.inner) as *const ();
        if seen.contains(&ptr) {
            return;
        }
        seen.push(ptr);
        self.inner.frozen.freeze();
        for value in self.inner.fields.borrow().values() {
            match value {
                FieldValue::Message(record) => record.freeze_walk(seen),
                FieldValue::List(handle) => handle.freeze_walk(seen),
                FieldValue::Map(handle) => handle.freeze_walk(seen),
                _ => {}
            }
        }
    }

    /// Structural deep equality.
    ///
    /// Scalars, lists, and maps compare by effective value, so an absent
    /// field equals one explicitly set to its default. Submessages compare
    /// presence first, then recurse.
    pub fn equals(&self, other: &Record) -> bool {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        if self.inner.desc != other.inner.desc {
            return false;
        }
        for fd in self.inner.desc.fields() {
            let equal = if matches!(fd.kind(), Kind::Message(_)) && !fd.is_list() && !fd.is_map()
            {
                match (self.has(&fd), other.has(&fd)) {
                    (false, false) => true,
                    (true, true) => self.get(&fd) == other.get(&fd),
                    _ => false,
                }
            } else {
                self.get(&fd) == other.get(&fd)
            };
            if !equal {
                return false;
            }
        }
        true
    }

    /// Write `name = value, ...` for every declared field in descriptor
    /// order, with effective values
    pub fn fmt_fields(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fd) in self.inner.desc.fields().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = ", fd.name())?;
            fmt_field_value(f, &fd, &self.get(&fd))?;
        }
        Ok(())
    }
}

fn fmt_field_value(f: &mut fmt::Formatter<'_>, fd: &FieldDescriptor, value: &FieldValue) -> fmt::Result {
    match value {
        FieldValue::Bool(true) => write!(f, "True"),
        FieldValue::Bool(false) => write!(f, "False"),
        FieldValue::I32(v) => write!(f, "{}", v),
        FieldValue::I64(v) => write!(f, "{}", v),
        FieldValue::U32(v) => write!(f, "{}", v),
        FieldValue::U64(v) => write!(f, "{}", v),
        FieldValue::F32(v) => write!(f, "{}", v),
        FieldValue::F64(v) => write!(f, "{}", v),
        FieldValue::String(s) => write!(f, "{:?}", s),
        FieldValue::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
        FieldValue::Enum(n) => match fd.kind() {
            Kind::Enum(ed) => match ed.get_value(*n) {
                Some(v) => write!(f, "{}", v.name()),
                None => write!(f, "{}", n),
            },
            _ => write!(f, "{}", n),
        },
        FieldValue::Message(record) => {
            if record.is_valid() {
                write!(f, "{}(", record.descriptor().name())?;
                record.fmt_fields(f)?;
                write!(f, ")")
            } else {
                write!(f, "none")
            }
        }
        FieldValue::List(handle) => {
            write!(f, "[")?;
            for (i, item) in handle.to_vec().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_field_value(f, fd, item)?;
            }
            write!(f, "]")
        }
        FieldValue::Map(handle) => {
            let value_fd = match fd.kind() {
                Kind::Message(entry) => entry.map_entry_value_field(),
                _ => return write!(f, "{{..}}"),
            };
            write!(f, "{{")?;
            for (i, (key, item)) in handle.entries().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: ", key)?;
                fmt_field_value(f, &value_fd, item)?;
            }
            write!(f, "}}")
        }
    }
}

// ============================================================================
// List handle
// ============================================================================

/// Reference-counted storage for one repeated field.
///
/// Cloning the handle aliases the same storage. The handle carries the
/// owning record's freeze flag and validity, plus the live-iterator counter
/// that blocks structural mutation mid-iteration.
#[derive(Debug, Clone)]
pub struct ListHandle {
    inner: Rc<ListInner>,
}

#[derive(Debug)]
struct ListInner {
    items: RefCell<Vec<FieldValue>>,
    frozen: FreezeFlag,
    iters: IterCounter,
    valid: bool,
}

impl ListHandle {
    /// Create a free-standing list with its own freeze flag
    pub fn new() -> Self {
        Self::with_flags(FreezeFlag::new(), true)
    }

    pub(crate) fn with_flags(frozen: FreezeFlag, valid: bool) -> Self {
        ListHandle {
            inner: Rc::new(ListInner {
                items: RefCell::new(Vec::new()),
                frozen,
                iters: IterCounter::new(),
                valid,
            }),
        }
    }

    /// Reject the operation if the list may not be structurally mutated
    pub fn check_mutable(&self, op: &str) -> Result<()> {
        if self.inner.frozen.is_frozen() {
            return Err(Error::Immutable { op: op.to_string() });
        }
        if self.inner.iters.active() {
            return Err(Error::ConcurrentMutation { op: op.to_string() });
        }
        if !self.inner.valid {
            return Err(Error::InvalidRecord { op: op.to_string() });
        }
        Ok(())
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at index
    pub fn get(&self, index: usize) -> Option<FieldValue> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Replace the element at index. Callers check mutability first.
    pub(crate) fn set_raw(&self, index: usize, value: FieldValue) {
        self.inner.items.borrow_mut()[index] = value;
    }

    /// Append an element. Callers check mutability first.
    pub(crate) fn push_raw(&self, value: FieldValue) {
        self.inner.items.borrow_mut().push(value);
    }

    /// Insert an element at index. Callers check mutability first.
    pub(crate) fn insert_raw(&self, index: usize, value: FieldValue) {
        self.inner.items.borrow_mut().insert(index, value);
    }

    /// Remove and return the element at index. Callers check mutability
    /// first.
    pub(crate) fn remove_raw(&self, index: usize) -> FieldValue {
        self.inner.items.borrow_mut().remove(index)
    }

    /// Remove all elements. Callers check mutability first.
    pub(crate) fn clear_raw(&self) {
        self.inner.items.borrow_mut().clear();
    }

    /// Copy the elements into a plain vector
    pub fn to_vec(&self) -> Vec<FieldValue> {
        self.inner.items.borrow().clone()
    }

    /// Register a live iterator
    pub(crate) fn enter_iter(&self) -> IterScope {
        self.inner.iters.enter()
    }

    /// Whether the list is frozen
    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.is_frozen()
    }

    /// Whether the owning record accepts mutation
    pub fn is_valid(&self) -> bool {
        self.inner.valid
    }

    /// Whether two handles alias the same storage
    pub fn ptr_eq(&self, other: &ListHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn freeze_walk(&self, seen: &mut Vec<*const ()>) {
        self.inner.frozen.freeze();
        for value in self.inner.items.borrow().iter() {
            if let FieldValue::Message(record) = value {
                record.freeze_walk(seen);
            }
        }
    }

    /// Elementwise structural equality
    pub fn equals(&self, other: &ListHandle) -> bool {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        let lhs = self.inner.items.borrow();
        let rhs = other.inner.items.borrow();
        lhs.len() == rhs.len() && lhs.iter().zip(rhs.iter()).all(|(a, b)| a == b)
    }
}

impl Default for ListHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Map handle
// ============================================================================

/// Reference-counted storage for one map field.
///
/// Entries live in a `BTreeMap`, so storage order is deterministic and wire
/// emission can be as well; script-visible enumeration order is still
/// recomputed from the script comparison order on every call.
#[derive(Debug, Clone)]
pub struct MapHandle {
    inner: Rc<MapInner>,
}

#[derive(Debug)]
struct MapInner {
    entries: RefCell<BTreeMap<MapKeyValue, FieldValue>>,
    frozen: FreezeFlag,
    iters: IterCounter,
    valid: bool,
}

impl MapHandle {
    /// Create a free-standing map with its own freeze flag
    pub fn new() -> Self {
        Self::with_flags(FreezeFlag::new(), true)
    }

    pub(crate) fn with_flags(frozen: FreezeFlag, valid: bool) -> Self {
        MapHandle {
            inner: Rc::new(MapInner {
                entries: RefCell::new(BTreeMap::new()),
                frozen,
                iters: IterCounter::new(),
                valid,
            }),
        }
    }

    /// Reject the operation if the map may not be structurally mutated
    pub fn check_mutable(&self, op: &str) -> Result<()> {
        if self.inner.frozen.is_frozen() {
            return Err(Error::Immutable { op: op.to_string() });
        }
        if self.inner.iters.active() {
            return Err(Error::ConcurrentMutation { op: op.to_string() });
        }
        if !self.inner.valid {
            return Err(Error::InvalidRecord { op: op.to_string() });
        }
        Ok(())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for a key
    pub fn get(&self, key: &MapKeyValue) -> Option<FieldValue> {
        self.inner.entries.borrow().get(key).cloned()
    }

    /// Whether the key is present
    pub fn contains(&self, key: &MapKeyValue) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    /// Insert or replace an entry. Callers check mutability first.
    pub(crate) fn insert_raw(&self, key: MapKeyValue, value: FieldValue) {
        self.inner.entries.borrow_mut().insert(key, value);
    }

    /// Remove an entry. Callers check mutability first.
    pub(crate) fn remove_raw(&self, key: &MapKeyValue) -> Option<FieldValue> {
        self.inner.entries.borrow_mut().remove(key)
    }

    /// Remove all entries. Callers check mutability first.
    pub(crate) fn clear_raw(&self) {
        self.inner.entries.borrow_mut().clear();
    }

    /// Copy the entries in storage (key) order
    pub fn entries(&self) -> Vec<(MapKeyValue, FieldValue)> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Register a live iterator
    pub(crate) fn enter_iter(&self) -> IterScope {
        self.inner.iters.enter()
    }

    /// Whether the map is frozen
    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.is_frozen()
    }

    /// Whether the owning record accepts mutation
    pub fn is_valid(&self) -> bool {
        self.inner.valid
    }

    /// Whether two handles alias the same storage
    pub fn ptr_eq(&self, other: &MapHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn freeze_walk(&self, seen: &mut Vec<*const ()>) {
        self.inner.frozen.freeze();
        for value in self.inner.entries.borrow().values() {
            if let FieldValue::Message(record) = value {
                record.freeze_walk(seen);
            }
        }
    }

    /// Entrywise structural equality
    pub fn equals(&self, other: &MapHandle) -> bool {
        if Rc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        let lhs = self.inner.entries.borrow();
        let rhs = other.inner.entries.borrow();
        lhs.len() == rhs.len()
            && lhs
                .iter()
                .zip(rhs.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
    }
}

impl Default for MapHandle {
    fn default() -> Self {
        Self::new()
    }
}

//! Message proxy
//!
//! The central bridge type: one script object wrapping one typed record.
//! Attribute reads resolve field and oneof names against the descriptor,
//! returning scalars by value and lists, maps, and populated submessages by
//! live alias. Attribute writes convert through the declared field kind and
//! store into the shared record, so every alias observes the change.

use std::any::Any;
use std::fmt;

use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor};
use skyproto_value::{ScriptObject, ScriptValue, ValueError, ValueResult};

use crate::convert;
use crate::error::{Error, Result};
use crate::list::RepeatedProxy;
use crate::map::MapProxy;
use crate::record::{FieldValue, Record};

/// A typed message exposed as a script object.
///
/// Cloning the proxy aliases the same record.
#[derive(Debug, Clone)]
pub struct MessageProxy {
    record: Record,
}

impl MessageProxy {
    /// Create the zero value of a message type
    pub fn new(desc: MessageDescriptor) -> Self {
        MessageProxy {
            record: Record::new(desc),
        }
    }

    /// Wrap an existing record
    pub fn from_record(record: Record) -> Self {
        MessageProxy { record }
    }

    /// Construct from script call arguments.
    ///
    /// Either keyword arguments alone, or exactly one positional
    /// initializer alone: another message of the identical type (shallow
    /// field-by-field copy) or a dict applied through `set_field`.
    pub fn construct(
        desc: MessageDescriptor,
        args: &[ScriptValue],
        kwargs: &[(String, ScriptValue)],
    ) -> Result<Self> {
        match args {
            [] => {
                let message = MessageProxy::new(desc);
                for (name, value) in kwargs {
                    message.set_field(name, value)?;
                }
                Ok(message)
            }
            [init] if kwargs.is_empty() => Self::from_initializer(desc, init),
            [_] => Err(Error::construction(
                "cannot mix a positional initializer with keyword arguments",
            )),
            more => Err(Error::construction(format!(
                "expected at most 1 positional argument, got {}",
                more.len()
            ))),
        }
    }

    fn from_initializer(desc: MessageDescriptor, init: &ScriptValue) -> Result<Self> {
        if let Some(other) = init.downcast_object::<MessageProxy>() {
            if other.record.descriptor() != &desc {
                return Err(Error::mismatch(
                    desc.full_name(),
                    other.record.descriptor().full_name(),
                ));
            }
            let message = MessageProxy::new(desc.clone());
            for fd in desc.fields() {
                if let Some(stored) = other.record.stored(&fd) {
                    message.record.set(&fd, stored)?;
                }
            }
            return Ok(message);
        }
        if let ScriptValue::Dict(dict) = init {
            let message = MessageProxy::new(desc);
            for (key, value) in dict.entries() {
                match key.as_str() {
                    Some(name) => message.set_field(name, &value)?,
                    None => {
                        return Err(Error::construction(format!(
                            "initializer keys must be strings, got {}",
                            key.type_name()
                        )))
                    }
                }
            }
            return Ok(message);
        }
        Err(Error::construction(format!(
            "cannot initialize {} from {}",
            desc.full_name(),
            init.type_name()
        )))
    }

    /// The message descriptor
    pub fn descriptor(&self) -> &MessageDescriptor {
        self.record.descriptor()
    }

    /// The underlying record
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Whether this proxy wraps live storage rather than a detached
    /// read-only placeholder
    pub fn is_valid(&self) -> bool {
        self.record.is_valid()
    }

    fn field(&self, name: &str) -> Option<FieldDescriptor> {
        self.record.descriptor().get_field_by_name(name)
    }

    fn oneof(&self, name: &str) -> Option<OneofDescriptor> {
        self.record.descriptor().oneofs().find(|o| o.name() == name)
    }

    fn unknown_attribute(&self, name: &str) -> Error {
        Error::UnknownAttribute {
            type_name: self.record.descriptor().full_name().to_string(),
            attr: name.to_string(),
        }
    }

    /// Resolve an attribute name to its value.
    ///
    /// Declared fields resolve first, then oneof union names, which yield
    /// the populated member's value or the absence value. List and map
    /// fields and populated submessages come back as live aliases; scalars
    /// and unset submessages come back as fresh snapshots.
    pub fn attr(&self, name: &str) -> Result<ScriptValue> {
        if let Some(fd) = self.field(name) {
            return Ok(self.field_value(&fd));
        }
        if let Some(oneof) = self.oneof(name) {
            return Ok(match self.record.which_oneof(&oneof) {
                Some(fd) => self.field_value(&fd),
                None => ScriptValue::None,
            });
        }
        Err(self.unknown_attribute(name))
    }

    fn field_value(&self, fd: &FieldDescriptor) -> ScriptValue {
        if fd.is_map() {
            return ScriptValue::object(MapProxy::from_parts(
                self.record.mutable_map(fd),
                fd.clone(),
            ));
        }
        if fd.is_list() {
            return ScriptValue::object(RepeatedProxy::from_parts(
                self.record.mutable_list(fd),
                fd.clone(),
            ));
        }
        if let Kind::Message(md) = fd.kind() {
            return match self.record.stored(fd) {
                Some(FieldValue::Message(record)) => {
                    ScriptValue::object(MessageProxy::from_record(record))
                }
                _ => ScriptValue::object(MessageProxy::from_record(Record::detached(md))),
            };
        }
        convert::element_to_script(fd, self.record.get(fd))
    }

    /// Assign a field by name.
    ///
    /// The absence value clears the field; anything else converts against
    /// the declared kind and is stored. Oneof union names are not
    /// assignable, only their members.
    pub fn set_field(&self, name: &str, value: &ScriptValue) -> Result<()> {
        let fd = self.field(name).ok_or_else(|| self.unknown_attribute(name))?;
        self.record.check_mutable("set field")?;
        if value.is_none() {
            return self.record.clear(&fd);
        }
        let converted = convert::to_field(&fd, value)?;
        self.record.set(&fd, converted)
    }

    /// Whether a field, or any member of a oneof, is populated
    pub fn has(&self, name: &str) -> Result<bool> {
        if let Some(fd) = self.field(name) {
            return Ok(self.record.has(&fd));
        }
        if let Some(oneof) = self.oneof(name) {
            return Ok(self.record.which_oneof(&oneof).is_some());
        }
        Err(self.unknown_attribute(name))
    }

    /// Clear a field, or whichever member of a oneof is populated
    pub fn clear(&self, name: &str) -> Result<()> {
        if let Some(fd) = self.field(name) {
            return self.record.clear(&fd);
        }
        if let Some(oneof) = self.oneof(name) {
            if let Some(fd) = self.record.which_oneof(&oneof) {
                return self.record.clear(&fd);
            }
            return Ok(());
        }
        Err(self.unknown_attribute(name))
    }

    /// Attribute names: declared fields and oneof union names, sorted
    pub fn dir(&self) -> Vec<String> {
        let desc = self.record.descriptor();
        let mut names: Vec<String> = desc.fields().map(|f| f.name().to_string()).collect();
        names.extend(desc.oneofs().map(|o| o.name().to_string()));
        names.sort();
        names
    }

    /// Structural equality against another message of the same type.
    ///
    /// Comparing across message types is an error, not `false`.
    pub fn equals(&self, other: &MessageProxy) -> Result<bool> {
        if self.record.descriptor() != other.record.descriptor() {
            return Err(Error::mismatch(
                self.record.descriptor().full_name(),
                other.record.descriptor().full_name(),
            ));
        }
        Ok(self.record.equals(&other.record))
    }

    /// Freeze this message and its entire reachable subgraph. Irreversible.
    pub fn freeze(&self) {
        self.record.freeze();
    }

    /// Whether the message is frozen
    pub fn is_frozen(&self) -> bool {
        self.record.is_frozen()
    }
}

impl ScriptObject for MessageProxy {
    fn type_name(&self) -> &'static str {
        "message"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn freeze(&self) {
        self.record.freeze();
    }

    fn is_frozen(&self) -> bool {
        self.record.is_frozen()
    }

    fn try_eq(&self, other: &dyn ScriptObject) -> ValueResult<bool> {
        match other.as_any().downcast_ref::<MessageProxy>() {
            Some(other) => self.equals(other).map_err(|err| match err {
                Error::TypeMismatch { expected, actual } => ValueError::TypeMismatch {
                    expected,
                    got: actual,
                },
                other => ValueError::TypeMismatch {
                    expected: "comparable messages".to_string(),
                    got: other.to_string(),
                },
            }),
            None => Ok(false),
        }
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for MessageProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.record.is_valid() {
            return write!(f, "none");
        }
        write!(f, "{}(", self.record.descriptor().name())?;
        self.record.fmt_fields(f)?;
        write!(f, ")")
    }
}

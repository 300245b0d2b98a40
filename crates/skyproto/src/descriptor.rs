//! Descriptor proxy
//!
//! Wraps one schema descriptor (file, message, enum, service, or method)
//! as a script object. Children resolve through a lazily built name-sorted
//! index; the descriptors themselves are immutable from construction, so
//! the index is computed at most once and shared by every clone. Calling a
//! message descriptor constructs a message; calling an enum descriptor
//! resolves one of its values; nothing else is callable.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use prost_reflect::{
    EnumDescriptor, FileDescriptor, MessageDescriptor, MethodDescriptor, ServiceDescriptor,
};
use skyproto_value::{ScriptObject, ScriptValue, ValueResult};

use crate::enums::EnumProxy;
use crate::error::{Error, Result};
use crate::message::MessageProxy;

/// The descriptor kinds the bridge knows how to wrap
#[derive(Debug, Clone)]
pub enum DescriptorRef {
    /// A file descriptor
    File(FileDescriptor),
    /// A message descriptor
    Message(MessageDescriptor),
    /// An enum descriptor
    Enum(EnumDescriptor),
    /// A service descriptor
    Service(ServiceDescriptor),
    /// A method descriptor
    Method(MethodDescriptor),
}

#[derive(Debug, Clone)]
enum Child {
    Node(DescriptorProxy),
    EnumValue(EnumProxy),
}

#[derive(Debug)]
struct DescriptorInner {
    kind: DescriptorRef,
    index: OnceCell<BTreeMap<String, Child>>,
}

/// A schema descriptor exposed as a script object.
///
/// Cheap to clone; immutable and freely shareable once constructed.
#[derive(Debug, Clone)]
pub struct DescriptorProxy {
    inner: Arc<DescriptorInner>,
}

impl DescriptorProxy {
    /// Wrap a descriptor
    pub fn new(kind: DescriptorRef) -> Self {
        DescriptorProxy {
            inner: Arc::new(DescriptorInner {
                kind,
                index: OnceCell::new(),
            }),
        }
    }

    /// Wrap a file descriptor
    pub fn from_file(fd: FileDescriptor) -> Self {
        Self::new(DescriptorRef::File(fd))
    }

    /// Wrap a message descriptor
    pub fn from_message(md: MessageDescriptor) -> Self {
        Self::new(DescriptorRef::Message(md))
    }

    /// Wrap an enum descriptor
    pub fn from_enum(ed: EnumDescriptor) -> Self {
        Self::new(DescriptorRef::Enum(ed))
    }

    /// The wrapped descriptor
    pub fn descriptor(&self) -> &DescriptorRef {
        &self.inner.kind
    }

    /// The short name of the wrapped descriptor
    pub fn name(&self) -> &str {
        match &self.inner.kind {
            DescriptorRef::File(d) => d.name(),
            DescriptorRef::Message(d) => d.name(),
            DescriptorRef::Enum(d) => d.name(),
            DescriptorRef::Service(d) => d.name(),
            DescriptorRef::Method(d) => d.name(),
        }
    }

    /// The fully qualified name, or the path for file descriptors
    pub fn full_name(&self) -> String {
        match &self.inner.kind {
            DescriptorRef::File(d) => d.name().to_string(),
            DescriptorRef::Message(d) => d.full_name().to_string(),
            DescriptorRef::Enum(d) => d.full_name().to_string(),
            DescriptorRef::Service(d) => d.full_name().to_string(),
            DescriptorRef::Method(d) => d.full_name().to_string(),
        }
    }

    fn index(&self) -> &BTreeMap<String, Child> {
        self.inner.index.get_or_init(|| {
            let mut index = BTreeMap::new();
            match &self.inner.kind {
                DescriptorRef::File(fd) => {
                    for message in fd.messages() {
                        index.insert(
                            message.name().to_string(),
                            Child::Node(DescriptorProxy::from_message(message)),
                        );
                    }
                    for enumeration in fd.enums() {
                        index.insert(
                            enumeration.name().to_string(),
                            Child::Node(DescriptorProxy::from_enum(enumeration)),
                        );
                    }
                    for service in fd.services() {
                        index.insert(
                            service.name().to_string(),
                            Child::Node(DescriptorProxy::new(DescriptorRef::Service(service))),
                        );
                    }
                }
                DescriptorRef::Message(md) => {
                    for nested in md.child_messages() {
                        // Synthetic map entry types are an encoding detail,
                        // not script-visible declarations
                        if nested.is_map_entry() {
                            continue;
                        }
                        index.insert(
                            nested.name().to_string(),
                            Child::Node(DescriptorProxy::from_message(nested)),
                        );
                    }
                    for nested in md.child_enums() {
                        index.insert(
                            nested.name().to_string(),
                            Child::Node(DescriptorProxy::from_enum(nested)),
                        );
                    }
                }
                DescriptorRef::Enum(ed) => {
                    for value in ed.values() {
                        index.insert(
                            value.name().to_string(),
                            Child::EnumValue(EnumProxy::from_number(ed.clone(), value.number())),
                        );
                    }
                }
                DescriptorRef::Service(sd) => {
                    for method in sd.methods() {
                        index.insert(
                            method.name().to_string(),
                            Child::Node(DescriptorProxy::new(DescriptorRef::Method(method))),
                        );
                    }
                }
                DescriptorRef::Method(_) => {}
            }
            index
        })
    }

    /// Resolve a child declaration by name.
    ///
    /// Enum values come back as enum proxies directly; every other child
    /// wraps as another descriptor proxy.
    pub fn attr(&self, name: &str) -> Result<ScriptValue> {
        match self.index().get(name) {
            Some(Child::Node(proxy)) => Ok(ScriptValue::object(proxy.clone())),
            Some(Child::EnumValue(value)) => Ok(ScriptValue::object(value.clone())),
            None => Err(Error::UnknownAttribute {
                type_name: self.full_name(),
                attr: name.to_string(),
            }),
        }
    }

    /// Child declaration names, sorted
    pub fn dir(&self) -> Vec<String> {
        self.index().keys().cloned().collect()
    }

    /// Call the descriptor.
    ///
    /// Message descriptors construct a new message; enum descriptors
    /// resolve one value from a single positional argument; file, service,
    /// and method descriptors are not callable.
    pub fn call(
        &self,
        args: &[ScriptValue],
        kwargs: &[(String, ScriptValue)],
    ) -> Result<ScriptValue> {
        match &self.inner.kind {
            DescriptorRef::Message(md) => Ok(ScriptValue::object(MessageProxy::construct(
                md.clone(),
                args,
                kwargs,
            )?)),
            DescriptorRef::Enum(ed) => {
                if args.len() != 1 || !kwargs.is_empty() {
                    return Err(Error::construction(format!(
                        "{} expects exactly one positional argument",
                        ed.full_name()
                    )));
                }
                Ok(ScriptValue::object(EnumProxy::resolve(
                    ed.clone(),
                    &args[0],
                )?))
            }
            other => Err(Error::construction(format!(
                "{} descriptors are not callable",
                match other {
                    DescriptorRef::File(_) => "file",
                    DescriptorRef::Service(_) => "service",
                    DescriptorRef::Method(_) => "method",
                    _ => unreachable!(),
                }
            ))),
        }
    }
}

impl ScriptObject for DescriptorProxy {
    fn type_name(&self) -> &'static str {
        match &self.inner.kind {
            DescriptorRef::File(_) => "file_descriptor",
            DescriptorRef::Message(_) => "message_descriptor",
            DescriptorRef::Enum(_) => "enum_descriptor",
            DescriptorRef::Service(_) => "service_descriptor",
            DescriptorRef::Method(_) => "method_descriptor",
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn freeze(&self) {}

    fn is_frozen(&self) -> bool {
        true
    }

    fn try_eq(&self, other: &dyn ScriptObject) -> ValueResult<bool> {
        match other.as_any().downcast_ref::<DescriptorProxy>() {
            Some(other) => {
                Ok(self.type_name() == other.type_name() && self.full_name() == other.full_name())
            }
            None => Ok(false),
        }
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.type_name(), self.full_name())
    }
}

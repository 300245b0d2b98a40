//! skyproto - Schema-described protobuf messages as native script values
//!
//! This crate bridges the skyproto-value dynamic value model to
//! descriptor-driven protobuf messages. Scripts construct, read, mutate,
//! marshal, unmarshal, compare, and introspect typed messages as if they
//! were native dynamic objects, while both sides' contracts hold at once:
//! the value model's freeze-once-shared and iteration rules, and the typed
//! system's requirement that stored values match their declared kind.
//!
//! The pieces, bottom up:
//!
//! - [`record`]: reference-counted typed storage. Child handles are live
//!   aliases, so mutation through a submessage, repeated field, or map
//!   field is visible to every other handle over the same storage.
//! - [`convert`]: the pure conversion layer between script values and
//!   field values, dispatching on declared field kinds.
//! - [`MessageProxy`], [`RepeatedProxy`], [`MapProxy`], [`EnumProxy`]:
//!   the script objects wrapping typed storage.
//! - [`DescriptorProxy`] and [`ProtoLibrary`]: schema introspection and
//!   construction entry points.
//! - [`codec`]: binary, JSON, and text marshal/unmarshal, invoked as
//!   opaque synchronous stages.
//!
//! Nothing here is thread-safe by design: message graphs are confined to
//! one script thread, and freezing is the only supported publication
//! mechanism. Descriptor proxies are immutable and freely shareable.

#![warn(missing_docs)]

pub mod codec;
pub mod convert;
mod descriptor;
mod enums;
mod error;
mod library;
mod list;
mod map;
mod message;
pub mod record;

pub use codec::{
    marshal, marshal_json, marshal_text, unmarshal, unmarshal_json, unmarshal_text,
    JsonMarshalOptions, JsonUnmarshalOptions, MarshalOptions, TextMarshalOptions,
    TextUnmarshalOptions, UnmarshalOptions,
};
pub use descriptor::{DescriptorProxy, DescriptorRef};
pub use enums::EnumProxy;
pub use error::{Error, Result};
pub use list::{RepeatedIter, RepeatedProxy};
pub use map::{MapIter, MapProxy};
pub use library::ProtoLibrary;
pub use message::MessageProxy;
pub use record::{FieldValue, ListHandle, MapHandle, MapKeyValue, Record};

pub use prost_reflect;
pub use skyproto_value::{ScriptDict, ScriptList, ScriptObject, ScriptValue};

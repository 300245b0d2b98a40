//! Value conversion layer
//!
//! Pure functions mapping field values to script values and back. The
//! typed-to-script direction dispatches on the stored runtime variant,
//! because enum, message, list, and map values need wrapping rather than
//! unwrapping. The script-to-typed direction dispatches on the declared
//! field kind and tries every source representation that kind accepts;
//! anything else is a conversion error, never a silent coercion.

use bytes::Bytes;
use prost_reflect::{FieldDescriptor, Kind};
use skyproto_value::{ScriptList, ScriptValue};

use crate::enums::EnumProxy;
use crate::error::{Error, Result};
use crate::list::RepeatedProxy;
use crate::map::MapProxy;
use crate::message::MessageProxy;
use crate::record::{
    default_field_value, FieldValue, ListHandle, MapHandle, MapKeyValue, Record,
};

/// Human-readable name for a declared kind, used in error messages
pub(crate) fn kind_name(kind: &Kind) -> String {
    match kind {
        Kind::Double => "double".to_string(),
        Kind::Float => "float".to_string(),
        Kind::Int32 => "int32".to_string(),
        Kind::Int64 => "int64".to_string(),
        Kind::Uint32 => "uint32".to_string(),
        Kind::Uint64 => "uint64".to_string(),
        Kind::Sint32 => "sint32".to_string(),
        Kind::Sint64 => "sint64".to_string(),
        Kind::Fixed32 => "fixed32".to_string(),
        Kind::Fixed64 => "fixed64".to_string(),
        Kind::Sfixed32 => "sfixed32".to_string(),
        Kind::Sfixed64 => "sfixed64".to_string(),
        Kind::Bool => "bool".to_string(),
        Kind::String => "string".to_string(),
        Kind::Bytes => "bytes".to_string(),
        Kind::Message(md) => md.full_name().to_string(),
        Kind::Enum(ed) => ed.full_name().to_string(),
    }
}

fn conversion_error(fd: &FieldDescriptor, got: &ScriptValue) -> Error {
    let kind = if fd.is_map() {
        "map".to_string()
    } else if fd.is_list() {
        format!("repeated {}", kind_name(&fd.kind()))
    } else {
        kind_name(&fd.kind())
    };
    Error::Conversion {
        field: fd.full_name().to_string(),
        kind,
        got: got.type_name().to_string(),
    }
}

fn range_error(fd: &FieldDescriptor, got: &ScriptValue) -> Error {
    Error::Conversion {
        field: fd.full_name().to_string(),
        kind: kind_name(&fd.kind()),
        got: format!("out of range value {}", got),
    }
}

// ============================================================================
// Typed to script
// ============================================================================

/// Convert a full field value into a script value.
///
/// List and map values wrap as live proxies sharing the handle; everything
/// else goes through [`element_to_script`].
pub fn field_to_script(fd: &FieldDescriptor, value: FieldValue) -> ScriptValue {
    match value {
        FieldValue::List(handle) => {
            ScriptValue::object(RepeatedProxy::from_parts(handle, fd.clone()))
        }
        FieldValue::Map(handle) => ScriptValue::object(MapProxy::from_parts(handle, fd.clone())),
        other => element_to_script(fd, other),
    }
}

/// Convert one element (a scalar, enum, or message) into a script value.
///
/// Scalars copy by value; enum and message values wrap as proxies. The
/// stored variant always matches the declared kind, so a disagreement here
/// is a broken schema build and aborts.
pub fn element_to_script(fd: &FieldDescriptor, value: FieldValue) -> ScriptValue {
    match value {
        FieldValue::Bool(b) => ScriptValue::Bool(b),
        FieldValue::I32(v) => ScriptValue::Int(v.into()),
        FieldValue::I64(v) => ScriptValue::Int(v),
        FieldValue::U32(v) => ScriptValue::Int(v.into()),
        FieldValue::U64(v) => match i64::try_from(v) {
            Ok(v) => ScriptValue::Int(v),
            Err(_) => ScriptValue::Uint(v),
        },
        FieldValue::F32(v) => ScriptValue::Float(v.into()),
        FieldValue::F64(v) => ScriptValue::Float(v),
        FieldValue::String(s) => ScriptValue::String(s),
        FieldValue::Bytes(b) => ScriptValue::Bytes(b.to_vec()),
        FieldValue::Enum(n) => match fd.kind() {
            Kind::Enum(ed) => ScriptValue::object(EnumProxy::from_number(ed, n)),
            kind => panic!(
                "schema inconsistency: enum value stored in {} field {}",
                kind_name(&kind),
                fd.full_name()
            ),
        },
        FieldValue::Message(record) => ScriptValue::object(MessageProxy::from_record(record)),
        FieldValue::List(_) | FieldValue::Map(_) => panic!(
            "schema inconsistency: container value in element position for field {}",
            fd.full_name()
        ),
    }
}

/// The script rendering of an absent field, computed per call
pub fn default_script(fd: &FieldDescriptor) -> ScriptValue {
    field_to_script(fd, default_field_value(fd))
}

/// Convert a map key back into a script value
pub fn map_key_to_script(key: &MapKeyValue) -> ScriptValue {
    match key {
        MapKeyValue::Bool(b) => ScriptValue::Bool(*b),
        MapKeyValue::I32(v) => ScriptValue::Int((*v).into()),
        MapKeyValue::I64(v) => ScriptValue::Int(*v),
        MapKeyValue::U32(v) => ScriptValue::Int((*v).into()),
        MapKeyValue::U64(v) => match i64::try_from(*v) {
            Ok(v) => ScriptValue::Int(v),
            Err(_) => ScriptValue::Uint(*v),
        },
        MapKeyValue::String(s) => ScriptValue::String(s.clone()),
    }
}

// ============================================================================
// Script to typed
// ============================================================================

/// Convert a script value into a full field value for the declared field.
///
/// Repeated and map targets accept a plain container (converted per
/// element) or an existing proxy of exactly matching field descriptor,
/// which moves the handle without touching elements.
pub fn to_field(fd: &FieldDescriptor, value: &ScriptValue) -> Result<FieldValue> {
    if fd.is_map() {
        to_map_field(fd, value)
    } else if fd.is_list() {
        to_list_field(fd, value)
    } else {
        element_to_field(fd, value)
    }
}

fn to_list_field(fd: &FieldDescriptor, value: &ScriptValue) -> Result<FieldValue> {
    if let Some(proxy) = value.downcast_object::<RepeatedProxy>() {
        if proxy.field() == fd {
            return Ok(FieldValue::List(proxy.handle().clone()));
        }
        // A proxy of another repeated field converts per element
        let handle = ListHandle::new();
        for element in proxy.handle().to_vec() {
            let script = element_to_script(proxy.field(), element);
            handle.push_raw(element_to_field(fd, &script)?);
        }
        return Ok(FieldValue::List(handle));
    }
    match value {
        ScriptValue::List(list) => {
            let handle = ListHandle::new();
            for element in list.to_vec() {
                handle.push_raw(element_to_field(fd, &element)?);
            }
            Ok(FieldValue::List(handle))
        }
        other => Err(conversion_error(fd, other)),
    }
}

fn to_map_field(fd: &FieldDescriptor, value: &ScriptValue) -> Result<FieldValue> {
    let entry = match fd.kind() {
        Kind::Message(entry) => entry,
        kind => panic!(
            "schema inconsistency: map field {} of kind {}",
            fd.full_name(),
            kind_name(&kind)
        ),
    };
    let key_fd = entry.map_entry_key_field();
    let value_fd = entry.map_entry_value_field();

    if let Some(proxy) = value.downcast_object::<MapProxy>() {
        if proxy.field() == fd {
            return Ok(FieldValue::Map(proxy.handle().clone()));
        }
        let handle = MapHandle::new();
        for (key, element) in proxy.handle().entries() {
            let script = element_to_script(&proxy.value_field(), element);
            handle.insert_raw(key, element_to_field(&value_fd, &script)?);
        }
        return Ok(FieldValue::Map(handle));
    }
    match value {
        ScriptValue::Dict(dict) => {
            let handle = MapHandle::new();
            for (key, element) in dict.entries() {
                handle.insert_raw(
                    to_map_key(&key_fd, &key)?,
                    element_to_field(&value_fd, &element)?,
                );
            }
            Ok(FieldValue::Map(handle))
        }
        other => Err(conversion_error(fd, other)),
    }
}

/// Convert one script value into a single element of the declared kind
pub fn element_to_field(fd: &FieldDescriptor, value: &ScriptValue) -> Result<FieldValue> {
    match fd.kind() {
        Kind::Bool => match value {
            ScriptValue::Bool(b) => Ok(FieldValue::Bool(*b)),
            other => Err(conversion_error(fd, other)),
        },
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => match value {
            ScriptValue::Int(_) | ScriptValue::Uint(_) => value
                .as_int()
                .and_then(|v| i32::try_from(v).ok())
                .map(FieldValue::I32)
                .ok_or_else(|| range_error(fd, value)),
            other => Err(conversion_error(fd, other)),
        },
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => match value {
            ScriptValue::Int(_) | ScriptValue::Uint(_) => value
                .as_int()
                .map(FieldValue::I64)
                .ok_or_else(|| range_error(fd, value)),
            other => Err(conversion_error(fd, other)),
        },
        Kind::Uint32 | Kind::Fixed32 => match value {
            ScriptValue::Int(_) | ScriptValue::Uint(_) => value
                .as_uint()
                .and_then(|v| u32::try_from(v).ok())
                .map(FieldValue::U32)
                .ok_or_else(|| range_error(fd, value)),
            other => Err(conversion_error(fd, other)),
        },
        Kind::Uint64 | Kind::Fixed64 => match value {
            ScriptValue::Int(_) | ScriptValue::Uint(_) => value
                .as_uint()
                .map(FieldValue::U64)
                .ok_or_else(|| range_error(fd, value)),
            other => Err(conversion_error(fd, other)),
        },
        Kind::Float => match value {
            ScriptValue::Float(v) => Ok(FieldValue::F32(*v as f32)),
            ScriptValue::Int(v) => Ok(FieldValue::F32(*v as f32)),
            ScriptValue::Uint(v) => Ok(FieldValue::F32(*v as f32)),
            other => Err(conversion_error(fd, other)),
        },
        Kind::Double => match value {
            ScriptValue::Float(v) => Ok(FieldValue::F64(*v)),
            ScriptValue::Int(v) => Ok(FieldValue::F64(*v as f64)),
            ScriptValue::Uint(v) => Ok(FieldValue::F64(*v as f64)),
            other => Err(conversion_error(fd, other)),
        },
        Kind::String => match value {
            ScriptValue::String(s) => Ok(FieldValue::String(s.clone())),
            other => Err(conversion_error(fd, other)),
        },
        Kind::Bytes => match value {
            ScriptValue::Bytes(b) => Ok(FieldValue::Bytes(Bytes::from(b.clone()))),
            ScriptValue::String(s) => Ok(FieldValue::Bytes(Bytes::from(s.clone().into_bytes()))),
            other => Err(conversion_error(fd, other)),
        },
        Kind::Enum(ed) => {
            let proxy = EnumProxy::resolve(ed, value)?;
            Ok(FieldValue::Enum(proxy.number()))
        }
        Kind::Message(md) => {
            if let Some(proxy) = value.downcast_object::<MessageProxy>() {
                if proxy.descriptor() != &md {
                    return Err(Error::mismatch(
                        md.full_name(),
                        proxy.descriptor().full_name(),
                    ));
                }
                // A detached placeholder stands for the zero value; splice
                // in a fresh empty record instead of the read-only one.
                if proxy.record().is_valid() {
                    return Ok(FieldValue::Message(proxy.record().clone()));
                }
                return Ok(FieldValue::Message(Record::new(md)));
            }
            if let ScriptValue::Dict(dict) = value {
                let message = MessageProxy::new(md);
                for (key, element) in dict.entries() {
                    match key.as_str() {
                        Some(name) => message.set_field(name, &element)?,
                        None => {
                            return Err(Error::construction(format!(
                                "message initializer keys must be strings, got {}",
                                key.type_name()
                            )))
                        }
                    }
                }
                return Ok(FieldValue::Message(message.record().clone()));
            }
            Err(conversion_error(fd, value))
        }
    }
}

/// Convert a script value into a map key for the declared key field.
///
/// Key kinds are always scalar, so the key field descriptor alone fully
/// determines the conversion.
pub fn to_map_key(key_fd: &FieldDescriptor, value: &ScriptValue) -> Result<MapKeyValue> {
    let converted = element_to_field(key_fd, value)?;
    Ok(match converted {
        FieldValue::Bool(b) => MapKeyValue::Bool(b),
        FieldValue::I32(v) => MapKeyValue::I32(v),
        FieldValue::I64(v) => MapKeyValue::I64(v),
        FieldValue::U32(v) => MapKeyValue::U32(v),
        FieldValue::U64(v) => MapKeyValue::U64(v),
        FieldValue::String(s) => MapKeyValue::String(s),
        _ => {
            return Err(Error::Conversion {
                field: key_fd.full_name().to_string(),
                kind: "map key".to_string(),
                got: value.type_name().to_string(),
            })
        }
    })
}

/// Slice a snapshot of repeated elements into a plain script list
pub(crate) fn elements_to_script_list(fd: &FieldDescriptor, elements: Vec<FieldValue>) -> ScriptList {
    ScriptList::from_vec(
        elements
            .into_iter()
            .map(|element| element_to_script(fd, element))
            .collect(),
    )
}

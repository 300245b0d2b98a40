//! Marshal and unmarshal entry points
//!
//! The bridge does not define a wire format. Records are translated to and
//! from reflective dynamic messages at this boundary, and the binary, JSON,
//! and text codecs are invoked as opaque, synchronous stages. Unmarshal
//! writes through the target's record in place, so existing aliases observe
//! the new contents.

use std::collections::HashMap;

use prost::Message as _;
use prost_reflect::text_format::FormatOptions;
use prost_reflect::{
    Cardinality, DeserializeOptions, DynamicMessage, FieldDescriptor, Kind, MapKey,
    ReflectMessage, SerializeOptions, Value,
};
use serde_json::ser::PrettyFormatter;

use crate::error::{Error, Result};
use crate::message::MessageProxy;
use crate::record::{FieldValue, MapKeyValue, Record};

// ============================================================================
// Options
// ============================================================================

/// Options for binary marshal
#[derive(Debug, Clone, Default)]
pub struct MarshalOptions {
    /// Permit messages with unpopulated required fields
    pub allow_partial: bool,
    /// Emit map entries in sorted key order. Entries already flow from
    /// sorted storage, so this is accepted for compatibility.
    pub deterministic: bool,
}

/// Options for binary unmarshal
#[derive(Debug, Clone, Default)]
pub struct UnmarshalOptions {
    /// Permit messages with unpopulated required fields
    pub allow_partial: bool,
    /// Merge into the existing contents instead of replacing them
    pub merge: bool,
    /// Silently drop unknown fields instead of retaining them through the
    /// codec stage
    pub discard_unknown: bool,
}

/// Options for JSON marshal
#[derive(Debug, Clone, Default)]
pub struct JsonMarshalOptions {
    /// Pretty-print with the given indent width
    pub indent: Option<usize>,
    /// Use declared field names instead of lowerCamelCase names
    pub use_proto_names: bool,
    /// Emit enum values as numbers instead of names
    pub use_enum_numbers: bool,
    /// Emit fields holding their default value
    pub emit_unpopulated: bool,
}

/// Options for JSON unmarshal
#[derive(Debug, Clone, Default)]
pub struct JsonUnmarshalOptions {
    /// Merge into the existing contents instead of replacing them
    pub merge: bool,
    /// Ignore unknown fields instead of failing
    pub discard_unknown: bool,
}

/// Options for text format marshal
#[derive(Debug, Clone, Default)]
pub struct TextMarshalOptions {
    /// One field per line instead of a single line
    pub multiline: bool,
}

/// Options for text format unmarshal
#[derive(Debug, Clone, Default)]
pub struct TextUnmarshalOptions {
    /// Merge into the existing contents instead of replacing them
    pub merge: bool,
}

// ============================================================================
// Record to dynamic message
// ============================================================================

fn record_to_dynamic(record: &Record) -> DynamicMessage {
    let mut message = DynamicMessage::new(record.descriptor().clone());
    for fd in record.descriptor().fields() {
        if let Some(stored) = record.stored(&fd) {
            if let Some(value) = field_value_to_prost(&stored) {
                message.set_field(&fd, value);
            }
        }
    }
    message
}

fn field_value_to_prost(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::List(handle) => {
            if handle.is_empty() {
                return None;
            }
            Some(Value::List(
                handle
                    .to_vec()
                    .iter()
                    .map(|element| element_to_prost(element))
                    .collect(),
            ))
        }
        FieldValue::Map(handle) => {
            if handle.is_empty() {
                return None;
            }
            let mut entries = HashMap::new();
            for (key, element) in handle.entries() {
                entries.insert(map_key_to_prost(&key), element_to_prost(&element));
            }
            Some(Value::Map(entries))
        }
        FieldValue::Message(record) if !record.is_valid() => None,
        element => Some(element_to_prost(element)),
    }
}

fn element_to_prost(value: &FieldValue) -> Value {
    match value {
        FieldValue::Bool(v) => Value::Bool(*v),
        FieldValue::I32(v) => Value::I32(*v),
        FieldValue::I64(v) => Value::I64(*v),
        FieldValue::U32(v) => Value::U32(*v),
        FieldValue::U64(v) => Value::U64(*v),
        FieldValue::F32(v) => Value::F32(*v),
        FieldValue::F64(v) => Value::F64(*v),
        FieldValue::String(v) => Value::String(v.clone()),
        FieldValue::Bytes(v) => Value::Bytes(v.clone()),
        FieldValue::Enum(v) => Value::EnumNumber(*v),
        FieldValue::Message(record) => Value::Message(record_to_dynamic(record)),
        FieldValue::List(_) | FieldValue::Map(_) => {
            panic!("schema inconsistency: container value in element position")
        }
    }
}

fn map_key_to_prost(key: &MapKeyValue) -> MapKey {
    match key {
        MapKeyValue::Bool(v) => MapKey::Bool(*v),
        MapKeyValue::I32(v) => MapKey::I32(*v),
        MapKeyValue::I64(v) => MapKey::I64(*v),
        MapKeyValue::U32(v) => MapKey::U32(*v),
        MapKeyValue::U64(v) => MapKey::U64(*v),
        MapKeyValue::String(v) => MapKey::String(v.clone()),
    }
}

// ============================================================================
// Dynamic message to record
// ============================================================================

fn dynamic_to_record(message: &DynamicMessage, record: &Record, merge: bool) -> Result<()> {
    if !merge {
        // Replace in place: existing list and map handles are emptied, not
        // discarded, so aliases held by the script observe the new contents
        for fd in record.descriptor().fields() {
            match record.stored(&fd) {
                Some(FieldValue::List(handle)) => {
                    handle.check_mutable("unmarshal")?;
                    handle.clear_raw();
                }
                Some(FieldValue::Map(handle)) => {
                    handle.check_mutable("unmarshal")?;
                    handle.clear_raw();
                }
                Some(_) => record.clear(&fd)?,
                None => {}
            }
        }
    }
    for fd in message.descriptor().fields() {
        if !message.has_field(&fd) {
            continue;
        }
        let value = message.get_field(&fd);
        store_prost_field(record, &fd, &value, merge)?;
    }
    Ok(())
}

fn store_prost_field(
    record: &Record,
    fd: &FieldDescriptor,
    value: &Value,
    merge: bool,
) -> Result<()> {
    match value {
        Value::List(elements) => {
            let handle = record.mutable_list(fd);
            handle.check_mutable("unmarshal")?;
            for element in elements {
                handle.push_raw(prost_to_element(record, fd, element)?);
            }
            Ok(())
        }
        Value::Map(entries) => {
            let handle = record.mutable_map(fd);
            handle.check_mutable("unmarshal")?;
            let value_fd = match fd.kind() {
                Kind::Message(entry) => entry.map_entry_value_field(),
                _ => {
                    return Err(Error::Codec {
                        format: "binary",
                        reason: format!("map value for non-map field {}", fd.full_name()),
                    })
                }
            };
            for (key, element) in entries {
                handle.insert_raw(
                    prost_to_map_key(key),
                    prost_to_element(record, &value_fd, element)?,
                );
            }
            Ok(())
        }
        Value::Message(child) => {
            // Get-or-allocate keeps an existing child aliased for merges
            // and allocates a fresh one otherwise
            let child_record = record.mutable_message(fd)?;
            dynamic_to_record(child, &child_record, merge)
        }
        scalar => record.set(fd, prost_scalar_to_field(scalar)),
    }
}

fn prost_to_element(record: &Record, fd: &FieldDescriptor, value: &Value) -> Result<FieldValue> {
    match value {
        Value::Message(child) => {
            let child_record =
                Record::with_flag(child.descriptor().clone(), record.freeze_flag().clone());
            dynamic_to_record(child, &child_record, false)?;
            Ok(FieldValue::Message(child_record))
        }
        Value::List(_) | Value::Map(_) => Err(Error::Codec {
            format: "binary",
            reason: format!("nested container for field {}", fd.full_name()),
        }),
        scalar => Ok(prost_scalar_to_field(scalar)),
    }
}

fn prost_scalar_to_field(value: &Value) -> FieldValue {
    match value {
        Value::Bool(v) => FieldValue::Bool(*v),
        Value::I32(v) => FieldValue::I32(*v),
        Value::I64(v) => FieldValue::I64(*v),
        Value::U32(v) => FieldValue::U32(*v),
        Value::U64(v) => FieldValue::U64(*v),
        Value::F32(v) => FieldValue::F32(*v),
        Value::F64(v) => FieldValue::F64(*v),
        Value::String(v) => FieldValue::String(v.clone()),
        Value::Bytes(v) => FieldValue::Bytes(v.clone()),
        Value::EnumNumber(v) => FieldValue::Enum(*v),
        Value::Message(_) | Value::List(_) | Value::Map(_) => {
            panic!("schema inconsistency: container value in scalar position")
        }
    }
}

fn prost_to_map_key(key: &MapKey) -> MapKeyValue {
    match key {
        MapKey::Bool(v) => MapKeyValue::Bool(*v),
        MapKey::I32(v) => MapKeyValue::I32(*v),
        MapKey::I64(v) => MapKeyValue::I64(*v),
        MapKey::U32(v) => MapKeyValue::U32(*v),
        MapKey::U64(v) => MapKeyValue::U64(*v),
        MapKey::String(v) => MapKeyValue::String(v.clone()),
    }
}

// ============================================================================
// Required field checking
// ============================================================================

fn check_required(record: &Record, format: &'static str) -> Result<()> {
    for fd in record.descriptor().fields() {
        if fd.cardinality() == Cardinality::Required && !record.has(&fd) {
            return Err(Error::Codec {
                format,
                reason: format!("required field {} is not set", fd.full_name()),
            });
        }
        match record.stored(&fd) {
            Some(FieldValue::Message(child)) => check_required(&child, format)?,
            Some(FieldValue::List(handle)) => {
                for element in handle.to_vec() {
                    if let FieldValue::Message(child) = element {
                        check_required(&child, format)?;
                    }
                }
            }
            Some(FieldValue::Map(handle)) => {
                for (_, element) in handle.entries() {
                    if let FieldValue::Message(child) = element {
                        check_required(&child, format)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// Entry points
// ============================================================================

/// Marshal a message to the binary wire format
pub fn marshal(message: &MessageProxy, options: &MarshalOptions) -> Result<Vec<u8>> {
    if !options.allow_partial {
        check_required(message.record(), "binary")?;
    }
    Ok(record_to_dynamic(message.record()).encode_to_vec())
}

/// Unmarshal binary wire data into a message, in place
pub fn unmarshal(message: &MessageProxy, data: &[u8], options: &UnmarshalOptions) -> Result<()> {
    message.record().check_mutable("unmarshal")?;
    let decoded = DynamicMessage::decode(message.descriptor().clone(), data).map_err(|err| {
        Error::Codec {
            format: "binary",
            reason: err.to_string(),
        }
    })?;
    dynamic_to_record(&decoded, message.record(), options.merge)?;
    if !options.allow_partial {
        check_required(message.record(), "binary")?;
    }
    Ok(())
}

/// Marshal a message to JSON
pub fn marshal_json(message: &MessageProxy, options: &JsonMarshalOptions) -> Result<String> {
    let dynamic = record_to_dynamic(message.record());
    let serialize_options = SerializeOptions::new()
        .use_proto_field_name(options.use_proto_names)
        .use_enum_numbers(options.use_enum_numbers)
        .skip_default_fields(!options.emit_unpopulated);
    let json_error = |err: serde_json::Error| Error::Codec {
        format: "json",
        reason: err.to_string(),
    };

    let mut buf = Vec::new();
    match options.indent {
        Some(width) => {
            let indent = vec![b' '; width];
            let formatter = PrettyFormatter::with_indent(&indent);
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            dynamic
                .serialize_with_options(&mut serializer, &serialize_options)
                .map_err(json_error)?;
        }
        None => {
            let mut serializer = serde_json::Serializer::new(&mut buf);
            dynamic
                .serialize_with_options(&mut serializer, &serialize_options)
                .map_err(json_error)?;
        }
    }
    String::from_utf8(buf).map_err(|err| Error::Codec {
        format: "json",
        reason: err.to_string(),
    })
}

/// Unmarshal JSON into a message, in place
pub fn unmarshal_json(
    message: &MessageProxy,
    data: &str,
    options: &JsonUnmarshalOptions,
) -> Result<()> {
    message.record().check_mutable("unmarshal")?;
    let deserialize_options = DeserializeOptions::new().deny_unknown_fields(!options.discard_unknown);
    let mut deserializer = serde_json::Deserializer::from_str(data);
    let decoded = DynamicMessage::deserialize_with_options(
        message.descriptor().clone(),
        &mut deserializer,
        &deserialize_options,
    )
    .map_err(|err| Error::Codec {
        format: "json",
        reason: err.to_string(),
    })?;
    deserializer.end().map_err(|err| Error::Codec {
        format: "json",
        reason: err.to_string(),
    })?;
    dynamic_to_record(&decoded, message.record(), options.merge)
}

/// Marshal a message to the text format
pub fn marshal_text(message: &MessageProxy, options: &TextMarshalOptions) -> Result<String> {
    let format_options = FormatOptions::new().pretty(options.multiline);
    Ok(record_to_dynamic(message.record()).to_text_format_with_options(&format_options))
}

/// Unmarshal text format data into a message, in place
pub fn unmarshal_text(
    message: &MessageProxy,
    data: &str,
    options: &TextUnmarshalOptions,
) -> Result<()> {
    message.record().check_mutable("unmarshal")?;
    let decoded = DynamicMessage::parse_text_format(message.descriptor().clone(), data).map_err(
        |err| Error::Codec {
            format: "text",
            reason: err.to_string(),
        },
    )?;
    dynamic_to_record(&decoded, message.record(), options.merge)
}

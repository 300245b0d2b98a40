//! Enum proxy
//!
//! Wraps one enum value as a script object. The proxy is immutable and
//! hashable. Numbers outside the declared value set are carried as
//! unrecognized values rather than rejected, matching the typed system's
//! forward-compatibility contract; unknown names, in contrast, are hard
//! errors. Ordering and equality require the two operands to belong to the
//! same enum type.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

use prost_reflect::{EnumDescriptor, EnumValueDescriptor};
use skyproto_value::{ScriptObject, ScriptValue, ValueError, ValueResult};

use crate::error::{Error, Result};

/// One enum value, possibly unrecognized, of a specific enum type.
#[derive(Debug, Clone)]
pub struct EnumProxy {
    desc: EnumDescriptor,
    number: i32,
}

impl EnumProxy {
    /// Wrap a number. Unknown numbers are carried as unrecognized values.
    pub fn from_number(desc: EnumDescriptor, number: i32) -> Self {
        EnumProxy { desc, number }
    }

    /// Resolve a declared value name. Unknown names are errors.
    pub fn from_name(desc: EnumDescriptor, name: &str) -> Result<Self> {
        match desc.get_value_by_name(name) {
            Some(value) => Ok(EnumProxy {
                number: value.number(),
                desc,
            }),
            None => Err(Error::Conversion {
                field: desc.full_name().to_string(),
                kind: "enum".to_string(),
                got: format!("unknown value name {:?}", name),
            }),
        }
    }

    /// Resolve a script value against a target enum type.
    ///
    /// Accepts a declared name, a number, or another enum value of the same
    /// enum type.
    pub fn resolve(desc: EnumDescriptor, value: &ScriptValue) -> Result<Self> {
        match value {
            ScriptValue::Int(_) | ScriptValue::Uint(_) => match value
                .as_int()
                .and_then(|n| i32::try_from(n).ok())
            {
                Some(n) => Ok(EnumProxy::from_number(desc, n)),
                None => Err(Error::Conversion {
                    field: desc.full_name().to_string(),
                    kind: "enum".to_string(),
                    got: format!("out of range number {}", value),
                }),
            },
            ScriptValue::String(name) => EnumProxy::from_name(desc, name),
            ScriptValue::Object(_) => match value.downcast_object::<EnumProxy>() {
                Some(other) => {
                    if other.desc == desc {
                        Ok(other.clone())
                    } else {
                        Err(Error::mismatch(
                            desc.full_name(),
                            other.desc.full_name(),
                        ))
                    }
                }
                None => Err(Error::Conversion {
                    field: desc.full_name().to_string(),
                    kind: "enum".to_string(),
                    got: value.type_name().to_string(),
                }),
            },
            other => Err(Error::Conversion {
                field: desc.full_name().to_string(),
                kind: "enum".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// The enum type this value belongs to
    pub fn parent(&self) -> &EnumDescriptor {
        &self.desc
    }

    /// The numeric value
    pub fn number(&self) -> i32 {
        self.number
    }

    /// The declared value descriptor, absent for unrecognized numbers
    pub fn value_descriptor(&self) -> Option<EnumValueDescriptor> {
        self.desc.get_value(self.number)
    }

    /// The declared name, absent for unrecognized numbers
    pub fn name(&self) -> Option<String> {
        self.value_descriptor().map(|v| v.name().to_string())
    }

    /// Whether the number is one of the declared values
    pub fn is_recognized(&self) -> bool {
        self.value_descriptor().is_some()
    }

    fn require_same_parent(&self, other: &EnumProxy) -> Result<()> {
        if self.desc == other.desc {
            Ok(())
        } else {
            Err(Error::mismatch(
                self.desc.full_name(),
                other.desc.full_name(),
            ))
        }
    }

    /// Equality by number. Mismatched enum types are an error, not `false`.
    pub fn equals(&self, other: &EnumProxy) -> Result<bool> {
        self.require_same_parent(other)?;
        Ok(self.number == other.number)
    }

    /// Ordering by declared number, same enum type required
    pub fn compare(&self, other: &EnumProxy) -> Result<Ordering> {
        self.require_same_parent(other)?;
        Ok(self.number.cmp(&other.number))
    }
}

impl ScriptObject for EnumProxy {
    fn type_name(&self) -> &'static str {
        "enum"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn freeze(&self) {}

    fn is_frozen(&self) -> bool {
        true
    }

    fn is_hashable(&self) -> bool {
        true
    }

    fn try_eq(&self, other: &dyn ScriptObject) -> ValueResult<bool> {
        match other.as_any().downcast_ref::<EnumProxy>() {
            Some(other) => self.equals(other).map_err(lower),
            None => Ok(false),
        }
    }

    fn try_compare(&self, other: &dyn ScriptObject) -> ValueResult<Ordering> {
        match other.as_any().downcast_ref::<EnumProxy>() {
            Some(other) => self.compare(other).map_err(lower),
            None => Err(ValueError::Incomparable {
                left: self.type_name(),
                right: other.type_name(),
            }),
        }
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn lower(err: Error) -> ValueError {
    match err {
        Error::TypeMismatch { expected, actual } => ValueError::TypeMismatch {
            expected,
            got: actual,
        },
        other => ValueError::TypeMismatch {
            expected: "comparable enum values".to_string(),
            got: other.to_string(),
        },
    }
}

impl fmt::Display for EnumProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}.{}", self.desc.name(), name),
            None => write!(f, "{}({})", self.desc.name(), self.number),
        }
    }
}

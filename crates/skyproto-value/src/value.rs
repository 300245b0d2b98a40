//! ScriptValue, the closed dynamic value type
//!
//! Every value a script can hand to the bridge, or receive from it, is one
//! of these variants. Keeping the set closed means conversions dispatch over
//! an exhaustive match instead of an open runtime type switch.

use std::fmt;
use std::rc::Rc;

use crate::dict::ScriptDict;
use crate::error::ValueResult;
use crate::list::ScriptList;
use crate::object::{ObjectRef, ScriptObject};

/// A dynamic script value.
///
/// Scalars are owned copies; `List`, `Dict`, and `Object` are shared handles
/// with reference-aliasing semantics, so cloning a `ScriptValue` never deep
/// copies a container.
#[derive(Debug, Clone, Default)]
pub enum ScriptValue {
    /// The absence value
    #[default]
    None,
    /// A boolean
    Bool(bool),
    /// A signed integer
    Int(i64),
    /// An unsigned integer beyond the signed range. Scripts still see one
    /// integer type: `Uint` only appears for values above `i64::MAX`, and
    /// equality, ordering, and hashing treat it numerically.
    Uint(u64),
    /// A floating point number
    Float(f64),
    /// A text string
    String(String),
    /// A byte string
    Bytes(Vec<u8>),
    /// A mutable sequence
    List(ScriptList),
    /// A mutable insertion-ordered mapping
    Dict(ScriptDict),
    /// A host-defined object
    Object(ObjectRef),
}

impl ScriptValue {
    /// Wrap a host object
    pub fn object(obj: impl ScriptObject + 'static) -> Self {
        ScriptValue::Object(Rc::new(obj))
    }

    /// Script-visible type name
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::None => "NoneType",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int(_) | ScriptValue::Uint(_) => "int",
            ScriptValue::Float(_) => "float",
            ScriptValue::String(_) => "string",
            ScriptValue::Bytes(_) => "bytes",
            ScriptValue::List(_) => "list",
            ScriptValue::Dict(_) => "dict",
            ScriptValue::Object(o) => o.type_name(),
        }
    }

    /// Check if this is the absence value
    pub fn is_none(&self) -> bool {
        matches!(self, ScriptValue::None)
    }

    /// Get as bool if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an int within the signed range
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(i) => Some(*i),
            ScriptValue::Uint(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Get as u64 if this is a non-negative int
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            ScriptValue::Int(i) => u64::try_from(*i).ok(),
            ScriptValue::Uint(u) => Some(*u),
            _ => None,
        }
    }

    /// Get as f64 if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ScriptValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as bytes if this is a byte string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ScriptValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get the list handle if this is a list
    pub fn as_list(&self) -> Option<&ScriptList> {
        match self {
            ScriptValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get the dict handle if this is a dict
    pub fn as_dict(&self) -> Option<&ScriptDict> {
        match self {
            ScriptValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Get the object handle if this is a host object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            ScriptValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Downcast a host object to a concrete type
    pub fn downcast_object<T: 'static>(&self) -> Option<&T> {
        self.as_object().and_then(|o| o.as_any().downcast_ref())
    }

    /// Whether this value may be used as a dict key
    pub fn is_hashable(&self) -> bool {
        match self {
            ScriptValue::None
            | ScriptValue::Bool(_)
            | ScriptValue::Int(_)
            | ScriptValue::Uint(_)
            | ScriptValue::Float(_)
            | ScriptValue::String(_)
            | ScriptValue::Bytes(_) => true,
            ScriptValue::List(_) | ScriptValue::Dict(_) => false,
            ScriptValue::Object(o) => o.is_hashable(),
        }
    }

    /// Make this value and everything reachable from it immutable.
    ///
    /// Scalars are unaffected; containers and objects propagate recursively.
    pub fn freeze(&self) {
        match self {
            ScriptValue::List(l) => l.freeze(),
            ScriptValue::Dict(d) => d.freeze(),
            ScriptValue::Object(o) => o.freeze(),
            _ => {}
        }
    }

    /// Whether this value is frozen. Scalars are always frozen.
    pub fn is_frozen(&self) -> bool {
        match self {
            ScriptValue::List(l) => l.is_frozen(),
            ScriptValue::Dict(d) => d.is_frozen(),
            ScriptValue::Object(o) => o.is_frozen(),
            _ => true,
        }
    }

    /// Structural equality.
    ///
    /// Ints and floats compare numerically across the two variants. Object
    /// comparisons delegate to the object and may fail, e.g. across
    /// unrelated schema types.
    pub fn equals(&self, other: &ScriptValue) -> ValueResult<bool> {
        use ScriptValue::*;
        match (self, other) {
            (None, None) => Ok(true),
            (Bool(a), Bool(b)) => Ok(a == b),
            (Int(a), Int(b)) => Ok(a == b),
            (Uint(a), Uint(b)) => Ok(a == b),
            (Int(a), Uint(b)) | (Uint(b), Int(a)) => {
                Ok(u64::try_from(*a).map(|a| a == *b).unwrap_or(false))
            }
            (Float(a), Float(b)) => Ok(a == b),
            (Int(a), Float(b)) | (Float(b), Int(a)) => Ok(*a as f64 == *b),
            (Uint(a), Float(b)) | (Float(b), Uint(a)) => Ok(*a as f64 == *b),
            (String(a), String(b)) => Ok(a == b),
            (Bytes(a), Bytes(b)) => Ok(a == b),
            (List(a), List(b)) => a.equals(b),
            (Dict(a), Dict(b)) => a.equals(b),
            (Object(a), Object(b)) => a.try_eq(b.as_ref()),
            _ => Ok(false),
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        ScriptValue::Int(i)
    }
}

impl From<f64> for ScriptValue {
    fn from(f: f64) -> Self {
        ScriptValue::Float(f)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl From<Vec<u8>> for ScriptValue {
    fn from(b: Vec<u8>) -> Self {
        ScriptValue::Bytes(b)
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::None => write!(f, "None"),
            ScriptValue::Bool(true) => write!(f, "True"),
            ScriptValue::Bool(false) => write!(f, "False"),
            ScriptValue::Int(i) => write!(f, "{}", i),
            ScriptValue::Uint(u) => write!(f, "{}", u),
            ScriptValue::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            ScriptValue::String(s) => write!(f, "{:?}", s),
            ScriptValue::Bytes(b) => {
                write!(f, "b\"")?;
                for byte in b {
                    match byte {
                        b'"' => write!(f, "\\\"")?,
                        b'\\' => write!(f, "\\\\")?,
                        0x20..=0x7e => write!(f, "{}", *byte as char)?,
                        _ => write!(f, "\\x{:02x}", byte)?,
                    }
                }
                write!(f, "\"")
            }
            ScriptValue::List(l) => fmt::Display::fmt(l, f),
            ScriptValue::Dict(d) => fmt::Display::fmt(d, f),
            ScriptValue::Object(o) => o.display(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(ScriptValue::None.type_name(), "NoneType");
        assert_eq!(ScriptValue::Bool(true).type_name(), "bool");
        assert_eq!(ScriptValue::Int(1).type_name(), "int");
        assert_eq!(ScriptValue::Float(1.0).type_name(), "float");
        assert_eq!(ScriptValue::from("x").type_name(), "string");
        assert_eq!(ScriptValue::Bytes(vec![]).type_name(), "bytes");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(ScriptValue::Int(42).as_int(), Some(42));
        assert_eq!(ScriptValue::Int(42).as_bool(), None);
        assert_eq!(ScriptValue::Bool(true).as_bool(), Some(true));
        assert_eq!(ScriptValue::from("hi").as_str(), Some("hi"));
        assert!(ScriptValue::None.is_none());
    }

    #[test]
    fn test_numeric_equality_across_variants() {
        let one_int = ScriptValue::Int(1);
        let one_float = ScriptValue::Float(1.0);
        assert_eq!(one_int.equals(&one_float), Ok(true));
        assert_eq!(one_float.equals(&one_int), Ok(true));
        assert_eq!(one_int.equals(&ScriptValue::Float(1.5)), Ok(false));
        assert_eq!(ScriptValue::Uint(1).equals(&one_int), Ok(true));
        assert_eq!(
            ScriptValue::Uint(u64::MAX).equals(&ScriptValue::Int(-1)),
            Ok(false)
        );
    }

    #[test]
    fn test_cross_type_equality_is_false() {
        assert_eq!(ScriptValue::Int(0).equals(&ScriptValue::None), Ok(false));
        assert_eq!(
            ScriptValue::from("1").equals(&ScriptValue::Int(1)),
            Ok(false)
        );
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(ScriptValue::None.to_string(), "None");
        assert_eq!(ScriptValue::Bool(true).to_string(), "True");
        assert_eq!(ScriptValue::Int(-3).to_string(), "-3");
        assert_eq!(ScriptValue::Float(2.0).to_string(), "2.0");
        assert_eq!(ScriptValue::Float(2.5).to_string(), "2.5");
        assert_eq!(ScriptValue::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(
            ScriptValue::Bytes(vec![b'h', b'i', 0x01]).to_string(),
            "b\"hi\\x01\""
        );
    }

    #[test]
    fn test_hashability() {
        assert!(ScriptValue::Int(1).is_hashable());
        assert!(ScriptValue::from("k").is_hashable());
        assert!(!ScriptValue::List(ScriptList::new()).is_hashable());
        assert!(!ScriptValue::Dict(ScriptDict::new()).is_hashable());
    }

    #[test]
    fn test_scalars_are_always_frozen() {
        assert!(ScriptValue::Int(1).is_frozen());
        assert!(ScriptValue::None.is_frozen());
        let list = ScriptValue::List(ScriptList::new());
        assert!(!list.is_frozen());
        list.freeze();
        assert!(list.is_frozen());
    }
}

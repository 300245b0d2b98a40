//! Bridge errors
//!
//! Every failure a script can observe is one of these variants; all of them
//! are returned to the caller as catchable errors. The bridge never
//! recovers internally, and the only non-recoverable condition (a schema
//! descriptor kind the bridge does not know) aborts construction outright.

use skyproto_value::ValueError;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the proto bridge
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// Two schema types that may not be mixed, e.g. messages of different
    /// full names or enum values of different parent enums
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type
        expected: String,
        /// Actual type
        actual: String,
    },

    /// A dynamic value that cannot represent the declared field kind
    #[error("cannot convert {got} to {kind} for field {field}")]
    Conversion {
        /// Full name of the target field
        field: String,
        /// Declared kind of the target field
        kind: String,
        /// Description of the offending value
        got: String,
    },

    /// Mutation attempted on a frozen value
    #[error("cannot {op}: value is frozen")]
    Immutable {
        /// The mutating operation that was rejected
        op: String,
    },

    /// Structural mutation attempted while an iterator is live
    #[error("cannot {op} during iteration")]
    ConcurrentMutation {
        /// The mutating operation that was rejected
        op: String,
    },

    /// Operation on a detached read-only placeholder message
    #[error("cannot {op}: message is a read-only placeholder")]
    InvalidRecord {
        /// The operation that was rejected
        op: String,
    },

    /// No field, oneof, or nested declaration with the given name
    #[error("{type_name} has no attribute {attr:?}")]
    UnknownAttribute {
        /// Type the lookup ran against
        type_name: String,
        /// The missing attribute name
        attr: String,
    },

    /// Malformed constructor arguments
    #[error("construction failed: {reason}")]
    Construction {
        /// What was wrong with the arguments
        reason: String,
    },

    /// Index outside the valid range of a sequence
    #[error("index {index} out of range for length {len}")]
    OutOfRange {
        /// The requested index
        index: i64,
        /// Current sequence length
        len: usize,
    },

    /// Lookup of a map key that is not present
    #[error("key {key} not found")]
    MissingKey {
        /// Display form of the missing key
        key: String,
    },

    /// A value that is not present in a sequence
    #[error("value {value} not found")]
    MissingValue {
        /// Display form of the missing value
        value: String,
    },

    /// Marshal or unmarshal failure reported by a codec
    #[error("{format} codec: {reason}")]
    Codec {
        /// Codec name: "binary", "json", or "text"
        format: &'static str,
        /// Underlying failure
        reason: String,
    },

    /// A descriptor the resolver could not supply
    #[error("unknown descriptor: {symbol}")]
    Descriptor {
        /// The path or full name that failed to resolve
        symbol: String,
    },
}

impl Error {
    /// Shorthand for a type mismatch error
    pub(crate) fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Shorthand for a constructor argument error
    pub(crate) fn construction(reason: impl Into<String>) -> Self {
        Error::Construction {
            reason: reason.into(),
        }
    }
}

impl From<ValueError> for Error {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::Immutable { op } => Error::Immutable { op: op.to_string() },
            ValueError::ConcurrentMutation { op } => Error::ConcurrentMutation {
                op: op.to_string(),
            },
            ValueError::Incomparable { left, right } => {
                Error::mismatch(left.to_string(), right.to_string())
            }
            ValueError::TypeMismatch { expected, got } => Error::mismatch(expected, got),
            ValueError::UnhashableKey { type_name } => Error::Conversion {
                field: String::new(),
                kind: "map key".to_string(),
                got: type_name.to_string(),
            },
            ValueError::IndexOutOfRange { index, len } => Error::OutOfRange { index, len },
        }
    }
}

//! Error types for the script value model

/// Result type for value operations
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors raised by the script value model itself.
///
/// The bridge crate lowers these into its own error taxonomy; inside this
/// crate they are the complete set of failure modes a plain value can hit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Mutation attempted on a frozen value
    #[error("cannot {op}: value is frozen")]
    Immutable {
        /// The mutating operation that was rejected
        op: &'static str,
    },

    /// Structural mutation attempted while an iterator is live
    #[error("cannot {op} during iteration")]
    ConcurrentMutation {
        /// The mutating operation that was rejected
        op: &'static str,
    },

    /// Two values have no defined ordering
    #[error("values of type {left} and {right} are not comparable")]
    Incomparable {
        /// Type name of the left operand
        left: &'static str,
        /// Type name of the right operand
        right: &'static str,
    },

    /// Type mismatch during a value operation
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// A value that cannot be used as a dict key
    #[error("unhashable type: {type_name}")]
    UnhashableKey {
        /// Type name of the offending key
        type_name: &'static str,
    },

    /// Index outside the valid range of a sequence
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The resolved index
        index: i64,
        /// Current sequence length
        len: usize,
    },
}

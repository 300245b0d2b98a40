//! Script ordering
//!
//! The comparison order scripts observe: numbers compare numerically across
//! int and float, every other type only against itself. Comparing across
//! unrelated types is an error rather than an arbitrary total order.

use std::cmp::Ordering;

use crate::error::{ValueError, ValueResult};
use crate::value::ScriptValue;

/// Compare two script values in script order.
///
/// Returns `Incomparable` for operands with no defined ordering, including
/// NaN floats and cross-type pairs.
pub fn compare(left: &ScriptValue, right: &ScriptValue) -> ValueResult<Ordering> {
    use ScriptValue::*;

    let incomparable = || ValueError::Incomparable {
        left: left.type_name(),
        right: right.type_name(),
    };

    match (left, right) {
        (None, None) => Ok(Ordering::Equal),
        (Bool(a), Bool(b)) => Ok(a.cmp(b)),
        (Int(a), Int(b)) => Ok(a.cmp(b)),
        (Uint(a), Uint(b)) => Ok(a.cmp(b)),
        (Int(a), Uint(b)) => Ok(match u64::try_from(*a) {
            Ok(a) => a.cmp(b),
            Err(_) => Ordering::Less,
        }),
        (Uint(a), Int(b)) => Ok(match u64::try_from(*b) {
            Ok(b) => a.cmp(&b),
            Err(_) => Ordering::Greater,
        }),
        (Float(a), Float(b)) => a.partial_cmp(b).ok_or_else(incomparable),
        (Int(a), Float(b)) => (*a as f64).partial_cmp(b).ok_or_else(incomparable),
        (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)).ok_or_else(incomparable),
        (Uint(a), Float(b)) => (*a as f64).partial_cmp(b).ok_or_else(incomparable),
        (Float(a), Uint(b)) => a.partial_cmp(&(*b as f64)).ok_or_else(incomparable),
        (String(a), String(b)) => Ok(a.cmp(b)),
        (Bytes(a), Bytes(b)) => Ok(a.cmp(b)),
        (List(a), List(b)) => {
            let lhs = a.to_vec();
            let rhs = b.to_vec();
            for (x, y) in lhs.iter().zip(rhs.iter()) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(lhs.len().cmp(&rhs.len()))
        }
        (Object(a), Object(b)) => a.try_compare(b.as_ref()),
        _ => Err(incomparable()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::ScriptList;

    #[test]
    fn test_numeric_ordering_across_variants() {
        assert_eq!(
            compare(&ScriptValue::Int(1), &ScriptValue::Float(1.5)),
            Ok(Ordering::Less)
        );
        assert_eq!(
            compare(&ScriptValue::Float(2.0), &ScriptValue::Int(2)),
            Ok(Ordering::Equal)
        );
    }

    #[test]
    fn test_string_ordering() {
        assert_eq!(
            compare(&ScriptValue::from("a"), &ScriptValue::from("b")),
            Ok(Ordering::Less)
        );
    }

    #[test]
    fn test_cross_type_is_an_error() {
        let err = compare(&ScriptValue::Int(1), &ScriptValue::from("1")).unwrap_err();
        assert_eq!(
            err,
            ValueError::Incomparable {
                left: "int",
                right: "string"
            }
        );
    }

    #[test]
    fn test_nan_is_incomparable() {
        assert!(compare(&ScriptValue::Float(f64::NAN), &ScriptValue::Float(1.0)).is_err());
    }

    #[test]
    fn test_list_ordering_is_elementwise() {
        let a = ScriptList::from_vec(vec![ScriptValue::Int(1), ScriptValue::Int(2)]);
        let b = ScriptList::from_vec(vec![ScriptValue::Int(1), ScriptValue::Int(3)]);
        let c = ScriptList::from_vec(vec![ScriptValue::Int(1)]);
        assert_eq!(
            compare(&ScriptValue::List(a.clone()), &ScriptValue::List(b)),
            Ok(Ordering::Less)
        );
        assert_eq!(
            compare(&ScriptValue::List(a), &ScriptValue::List(c)),
            Ok(Ordering::Greater)
        );
    }
}

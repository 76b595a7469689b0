use std::cmp::Ordering;

use crate::error::{Error, Result};

use super::atomic_core::Atomic;

/// Compare two atomics after untyped coercion.
///
/// Returns `None` for incomparable numerics (NaN); callers treat that as
/// false for every operator except `!=`.
pub fn compare_atomics(left: &Atomic, right: &Atomic) -> Result<Option<Ordering>> {
    use Atomic::*;
    match (left, right) {
        // untyped data takes the type of the other operand; two untyped
        // values compare as strings
        (Untyped(a), Untyped(b)) => Ok(Some(a.as_ref().cmp(b.as_ref()))),
        (Untyped(_), Integer(_) | Decimal(_)) => {
            let number = left.to_number()?;
            compare_numbers(number, right.to_number()?)
        }
        (Integer(_) | Decimal(_), Untyped(_)) => {
            let number = right.to_number()?;
            compare_numbers(left.to_number()?, number)
        }
        (Untyped(a), String(b)) | (String(a), Untyped(b)) => Ok(Some(a.as_ref().cmp(b.as_ref()))),
        (Untyped(_), Boolean(b)) => {
            let value = left.effective_boolean_value()?;
            Ok(Some(value.cmp(b)))
        }
        (Boolean(a), Untyped(_)) => {
            let value = right.effective_boolean_value()?;
            Ok(Some(a.cmp(&value)))
        }

        (String(a), String(b)) => Ok(Some(a.as_ref().cmp(b.as_ref()))),
        (Boolean(a), Boolean(b)) => Ok(Some(a.cmp(b))),
        (Integer(a), Integer(b)) => Ok(Some(a.cmp(b))),
        (Integer(_) | Decimal(_), Integer(_) | Decimal(_)) => {
            compare_numbers(left.to_number()?, right.to_number()?)
        }
        (Date(a), Date(b)) => Ok(Some(a.cmp(b))),
        (DateTime(a), DateTime(b)) => Ok(Some(a.cmp(b))),
        (Binary(a), Binary(b)) => Ok(Some(a.as_ref().cmp(b.as_ref()))),
        _ => Err(Error::type_error(format!(
            "cannot compare {} with {}",
            left.type_label(),
            right.type_label()
        ))),
    }
}

fn compare_numbers(left: f64, right: f64) -> Result<Option<Ordering>> {
    Ok(left.partial_cmp(&right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untyped_against_number() {
        let result = compare_atomics(&Atomic::Untyped("4".into()), &Atomic::Integer(4)).unwrap();
        assert_eq!(result, Some(Ordering::Equal));
    }

    #[test]
    fn test_untyped_against_string() {
        let result = compare_atomics(&Atomic::Untyped("a".into()), &Atomic::from("b")).unwrap();
        assert_eq!(result, Some(Ordering::Less));
    }

    #[test]
    fn test_nan_is_incomparable() {
        let result =
            compare_atomics(&Atomic::Decimal(f64::NAN), &Atomic::Decimal(1.0)).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_mixed_types_fail() {
        assert!(compare_atomics(&Atomic::from("a"), &Atomic::Integer(1)).is_err());
    }
}

use crate::error::{Error, Result};

use super::atomic_core::Atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

/// Arithmetic over two atomized operands.
///
/// Integer pairs stay integral (except division); everything else is carried
/// out in f64. Division and modulo by zero raise the zero error kind.
pub fn op_arithmetic(op: ArithOp, left: &Atomic, right: &Atomic) -> Result<Atomic> {
    if let (Atomic::Integer(a), Atomic::Integer(b)) = (left, right) {
        match op {
            ArithOp::Add => {
                if let Some(value) = a.checked_add(*b) {
                    return Ok(Atomic::Integer(value));
                }
            }
            ArithOp::Subtract => {
                if let Some(value) = a.checked_sub(*b) {
                    return Ok(Atomic::Integer(value));
                }
            }
            ArithOp::Multiply => {
                if let Some(value) = a.checked_mul(*b) {
                    return Ok(Atomic::Integer(value));
                }
            }
            ArithOp::Modulo => {
                if *b == 0 {
                    return Err(Error::zero("modulo by zero"));
                }
                // the remainder takes the sign of the left operand
                return Ok(Atomic::Integer(a % b));
            }
            ArithOp::Divide => {}
        }
    }
    let a = left.to_number()?;
    let b = right.to_number()?;
    let value = match op {
        ArithOp::Add => a + b,
        ArithOp::Subtract => a - b,
        ArithOp::Multiply => a * b,
        ArithOp::Divide => {
            if b == 0.0 {
                return Err(Error::zero("division by zero"));
            }
            a / b
        }
        ArithOp::Modulo => {
            if b == 0.0 {
                return Err(Error::zero("modulo by zero"));
            }
            a % b
        }
    };
    Ok(Atomic::Decimal(value))
}

pub fn op_unary_minus(operand: &Atomic) -> Result<Atomic> {
    match operand {
        Atomic::Integer(i) => Ok(Atomic::Integer(-i)),
        Atomic::Decimal(d) => Ok(Atomic::Decimal(-d)),
        Atomic::Untyped(_) => Ok(Atomic::Decimal(-operand.to_number()?)),
        other => Err(Error::type_error(format!(
            "cannot negate {}",
            other.type_label()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(
            op_arithmetic(ArithOp::Add, &Atomic::Integer(2), &Atomic::Integer(3)).unwrap(),
            Atomic::Integer(5)
        );
        assert_eq!(
            op_arithmetic(ArithOp::Multiply, &Atomic::Integer(4), &Atomic::Integer(5)).unwrap(),
            Atomic::Integer(20)
        );
    }

    #[test]
    fn test_division_is_decimal() {
        assert_eq!(
            op_arithmetic(ArithOp::Divide, &Atomic::Integer(3), &Atomic::Integer(2)).unwrap(),
            Atomic::Decimal(1.5)
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err =
            op_arithmetic(ArithOp::Divide, &Atomic::Integer(1), &Atomic::Integer(0)).unwrap_err();
        assert_eq!(err.cause(), Some(crate::error::EvaluationCause::Zero));
    }

    #[test]
    fn test_mod_sign_follows_left() {
        assert_eq!(
            op_arithmetic(ArithOp::Modulo, &Atomic::Integer(-7), &Atomic::Integer(3)).unwrap(),
            Atomic::Integer(-1)
        );
        assert_eq!(
            op_arithmetic(ArithOp::Modulo, &Atomic::Integer(7), &Atomic::Integer(-3)).unwrap(),
            Atomic::Integer(1)
        );
    }

    #[test]
    fn test_untyped_operands_are_numbers() {
        assert_eq!(
            op_arithmetic(
                ArithOp::Add,
                &Atomic::Untyped("2".into()),
                &Atomic::Untyped("0.5".into())
            )
            .unwrap(),
            Atomic::Decimal(2.5)
        );
    }

    #[test]
    fn test_overflow_promotes() {
        let result = op_arithmetic(
            ArithOp::Multiply,
            &Atomic::Integer(i64::MAX),
            &Atomic::Integer(2),
        )
        .unwrap();
        assert!(matches!(result, Atomic::Decimal(_)));
    }
}

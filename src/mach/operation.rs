use super::Val;
use crate::error;
use crate::lang::token::Operator;
use crate::lang::{Error, TypeSet};
use std::cmp::Ordering;

type Result<T> = std::result::Result<T, Error>;

pub struct Operation {}

impl Operation {
    /// Promotes the operands the way every binary operator expects them,
    /// then applies `op`.
    pub fn binary(op: Operator, lhs: Val, rhs: Val) -> Result<Val> {
        let (lhs, rhs) = Operation::promote(op.accepts(), lhs, rhs)?;
        use Operator::*;
        match op {
            Power => Operation::power(lhs, rhs),
            Multiply => Operation::multiply(lhs, rhs),
            Divide => Operation::divide(lhs, rhs),
            DivideInt => Operation::divide_int(lhs, rhs),
            Modulus => Operation::modulus(lhs, rhs),
            Plus => Operation::sum(lhs, rhs),
            Minus => Operation::subtract(lhs, rhs),
            ShiftLeft => Operation::shift_left(lhs, rhs),
            ShiftRight => Operation::shift_right(lhs, rhs),
            Equal => Operation::compare(lhs, rhs, |o| o == Ordering::Equal),
            NotEqual => Operation::compare(lhs, rhs, |o| o != Ordering::Equal),
            Less => Operation::compare(lhs, rhs, |o| o == Ordering::Less),
            LessEqual => Operation::compare(lhs, rhs, |o| o != Ordering::Greater),
            Greater => Operation::compare(lhs, rhs, |o| o == Ordering::Greater),
            GreaterEqual => Operation::compare(lhs, rhs, |o| o != Ordering::Less),
            And => Operation::bitwise(lhs, rhs, |l, r| l & r),
            Or => Operation::bitwise(lhs, rhs, |l, r| l | r),
            Xor => Operation::bitwise(lhs, rhs, |l, r| l ^ r),
            Not | Inv => Err(error!(InternalError; "UNARY OPERATOR")),
        }
    }

    fn promote(accepts: TypeSet, lhs: Val, rhs: Val) -> Result<(Val, Val)> {
        use Val::*;
        match (lhs, rhs) {
            (String(l), String(r)) if accepts.contains(TypeSet::STRING) => {
                Ok((String(l), String(r)))
            }
            (String(_), _) | (_, String(_)) => Err(error!(TypeMismatch)),
            (l, r) if !accepts.contains(TypeSet::FLOAT) => {
                Ok((Integer(i64::try_from(l)?), Integer(i64::try_from(r)?)))
            }
            (Integer(l), Integer(r)) => Ok((Integer(l), Integer(r))),
            (l, r) => Ok((Float(f64::try_from(l)?), Float(f64::try_from(r)?))),
        }
    }

    pub fn negate(val: Val) -> Result<Val> {
        use Val::*;
        match val {
            Integer(n) => match n.checked_neg() {
                Some(n) => Ok(Integer(n)),
                None => Err(error!(Overflow)),
            },
            Float(n) => Ok(Float(-n)),
            String(_) => Err(error!(TypeMismatch)),
        }
    }

    /// Logical negation: 1 for zero, otherwise 0.
    pub fn not(val: Val) -> Result<Val> {
        Ok(Val::Integer(!val.is_true()? as i64))
    }

    pub fn inv(val: Val) -> Result<Val> {
        Ok(Val::Integer(!i64::try_from(val)?))
    }

    pub fn power(lhs: Val, rhs: Val) -> Result<Val> {
        use Val::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) if r >= 0 => {
                match u32::try_from(r).ok().and_then(|r| l.checked_pow(r)) {
                    Some(n) => Ok(Integer(n)),
                    None => Err(error!(Overflow)),
                }
            }
            (Integer(l), Integer(r)) => Ok(Float((l as f64).powf(r as f64))),
            (Float(l), Float(r)) => Ok(Float(l.powf(r))),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn multiply(lhs: Val, rhs: Val) -> Result<Val> {
        use Val::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) => match l.checked_mul(r) {
                Some(i) => Ok(Integer(i)),
                None => Err(error!(Overflow)),
            },
            (Float(l), Float(r)) => Ok(Float(l * r)),
            _ => Err(error!(TypeMismatch)),
        }
    }

    /// Always a float result.
    pub fn divide(lhs: Val, rhs: Val) -> Result<Val> {
        let l = f64::try_from(lhs)?;
        let r = f64::try_from(rhs)?;
        if r == 0.0 {
            return Err(error!(DivisionByZero));
        }
        Ok(Val::Float(l / r))
    }

    pub fn divide_int(lhs: Val, rhs: Val) -> Result<Val> {
        Operation::integer(lhs, rhs, i64::checked_div)
    }

    pub fn modulus(lhs: Val, rhs: Val) -> Result<Val> {
        Operation::integer(lhs, rhs, i64::checked_rem)
    }

    fn integer(lhs: Val, rhs: Val, f: fn(i64, i64) -> Option<i64>) -> Result<Val> {
        let l = i64::try_from(lhs)?;
        let r = i64::try_from(rhs)?;
        match f(l, r) {
            Some(n) => Ok(Val::Integer(n)),
            None if r == 0 => Err(error!(DivisionByZero)),
            None => Err(error!(Overflow)),
        }
    }

    pub fn sum(lhs: Val, rhs: Val) -> Result<Val> {
        use Val::*;
        match (lhs, rhs) {
            (String(mut l), String(r)) => {
                if l.len() + r.len() > super::MAX_STRING {
                    return Err(error!(StringTooLong));
                }
                l.extend_from_slice(&r);
                Ok(String(l))
            }
            (Integer(l), Integer(r)) => match l.checked_add(r) {
                Some(i) => Ok(Integer(i)),
                None => Err(error!(Overflow)),
            },
            (Float(l), Float(r)) => Ok(Float(l + r)),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn subtract(lhs: Val, rhs: Val) -> Result<Val> {
        use Val::*;
        match (lhs, rhs) {
            (Integer(l), Integer(r)) => match l.checked_sub(r) {
                Some(i) => Ok(Integer(i)),
                None => Err(error!(Overflow)),
            },
            (Float(l), Float(r)) => Ok(Float(l - r)),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub fn shift_left(lhs: Val, rhs: Val) -> Result<Val> {
        Operation::shift(lhs, rhs, i64::checked_shl)
    }

    pub fn shift_right(lhs: Val, rhs: Val) -> Result<Val> {
        Operation::shift(lhs, rhs, i64::checked_shr)
    }

    fn shift(lhs: Val, rhs: Val, f: fn(i64, u32) -> Option<i64>) -> Result<Val> {
        let l = i64::try_from(lhs)?;
        let r = i64::try_from(rhs)?;
        match u32::try_from(r).ok().and_then(|r| f(l, r)) {
            Some(n) => Ok(Val::Integer(n)),
            None => Err(error!(Overflow)),
        }
    }

    fn compare(lhs: Val, rhs: Val, test: fn(Ordering) -> bool) -> Result<Val> {
        use Val::*;
        let ordering = match (lhs, rhs) {
            (String(l), String(r)) => l.cmp(&r),
            (Integer(l), Integer(r)) => l.cmp(&r),
            (Float(l), Float(r)) => match l.partial_cmp(&r) {
                Some(o) => o,
                None => return Ok(Integer(0)),
            },
            _ => return Err(error!(TypeMismatch)),
        };
        Ok(Integer(test(ordering) as i64))
    }

    fn bitwise(lhs: Val, rhs: Val, f: fn(i64, i64) -> i64) -> Result<Val> {
        Ok(Val::Integer(f(i64::try_from(lhs)?, i64::try_from(rhs)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use Operator::*;

    #[test]
    fn test_promotion() {
        assert_eq!(Operation::binary(Plus, Val::Integer(5), Val::Float(2.5)), Ok(Val::Float(7.5)));
        assert_eq!(Operation::binary(Plus, Val::Integer(5), Val::Integer(2)), Ok(Val::Integer(7)));
        assert_eq!(Operation::binary(DivideInt, Val::Float(7.6), Val::Integer(2)), Ok(Val::Integer(4)));
        assert_eq!(Operation::binary(Divide, Val::Integer(7), Val::Integer(2)), Ok(Val::Float(3.5)));
    }

    #[test]
    fn test_strings_never_mix() {
        assert!(Operation::binary(Plus, Val::from("a"), Val::Integer(1)).is_err());
        assert!(Operation::binary(Multiply, Val::from("a"), Val::from("b")).is_err());
        assert_eq!(Operation::binary(Plus, Val::from("a"), Val::from("b")), Ok(Val::from("ab")));
        assert_eq!(Operation::binary(Less, Val::from("a"), Val::from("b")), Ok(Val::Integer(1)));
    }

    #[test]
    fn test_errors() {
        let err = Operation::binary(Multiply, Val::Integer(i64::MAX), Val::Integer(2)).unwrap_err();
        assert_eq!(err.code(), crate::lang::ErrorCode::Overflow);
        let err = Operation::binary(Modulus, Val::Integer(1), Val::Integer(0)).unwrap_err();
        assert_eq!(err.code(), crate::lang::ErrorCode::DivisionByZero);
        assert!(Operation::binary(Divide, Val::Float(1.0), Val::Integer(0)).is_err());
    }

    #[test]
    fn test_power_and_unary() {
        assert_eq!(Operation::binary(Power, Val::Integer(2), Val::Integer(10)), Ok(Val::Integer(1024)));
        assert_eq!(Operation::binary(Power, Val::Integer(2), Val::Integer(-1)), Ok(Val::Float(0.5)));
        assert_eq!(Operation::not(Val::Integer(0)), Ok(Val::Integer(1)));
        assert_eq!(Operation::not(Val::Float(2.0)), Ok(Val::Integer(0)));
        assert_eq!(Operation::inv(Val::Integer(0)), Ok(Val::Integer(-1)));
        assert_eq!(Operation::negate(Val::Integer(3)), Ok(Val::Integer(-3)));
    }

    proptest! {
        #[test]
        fn mixed_operands_promote_to_float(a in -1000i64..1000, b in -1000.0f64..1000.0) {
            for op in [Plus, Minus, Multiply, Less, Equal, GreaterEqual] {
                let mixed = Operation::binary(op, Val::Integer(a), Val::Float(b));
                let float = Operation::binary(op, Val::Float(a as f64), Val::Float(b));
                prop_assert_eq!(mixed, float);
                let mixed = Operation::binary(op, Val::Float(b), Val::Integer(a));
                let float = Operation::binary(op, Val::Float(b), Val::Float(a as f64));
                prop_assert_eq!(mixed, float);
            }
        }
    }
}

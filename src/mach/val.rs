use crate::error;
use crate::lang::{Error, Type};

type Result<T> = std::result::Result<T, Error>;

pub const MAX_STRING: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Float(f64),
    Integer(i64),
    String(Vec<u8>),
}

impl Val {
    pub fn zero(ty: Type) -> Val {
        match ty {
            Type::Float => Val::Float(0.0),
            Type::Integer => Val::Integer(0),
            Type::String => Val::String(vec![]),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Val::Float(_) => Type::Float,
            Val::Integer(_) => Type::Integer,
            Val::String(_) => Type::String,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Val::String(_))
    }

    /// Converts within the numeric family; strings only convert to strings.
    pub fn convert(self, ty: Type) -> Result<Val> {
        match ty {
            Type::Float => Ok(Val::Float(f64::try_from(self)?)),
            Type::Integer => Ok(Val::Integer(i64::try_from(self)?)),
            Type::String => match self {
                Val::String(s) => Ok(Val::String(s)),
                _ => Err(error!(TypeMismatch)),
            },
        }
    }

    pub fn is_true(&self) -> Result<bool> {
        match self {
            Val::Float(n) => Ok(*n != 0.0),
            Val::Integer(n) => Ok(*n != 0),
            Val::String(_) => Err(error!(TypeMismatch)),
        }
    }

    pub fn text(&self) -> String {
        match self {
            Val::String(s) => String::from_utf8_lossy(s).into_owned(),
            _ => self.to_string(),
        }
    }
}

/// Rounds half away from zero, the way every float becomes an integer.
pub fn float_to_int(n: f64) -> Result<i64> {
    let r = n.round();
    if r.is_nan() || r < i64::MIN as f64 || r >= i64::MAX as f64 {
        Err(error!(Overflow))
    } else {
        Ok(r as i64)
    }
}

impl TryFrom<Val> for f64 {
    type Error = Error;
    fn try_from(val: Val) -> Result<f64> {
        match val {
            Val::Float(n) => Ok(n),
            Val::Integer(n) => Ok(n as f64),
            Val::String(_) => Err(error!(TypeMismatch)),
        }
    }
}

impl TryFrom<Val> for i64 {
    type Error = Error;
    fn try_from(val: Val) -> Result<i64> {
        match val {
            Val::Float(n) => float_to_int(n),
            Val::Integer(n) => Ok(n),
            Val::String(_) => Err(error!(TypeMismatch)),
        }
    }
}

impl TryFrom<Val> for Vec<u8> {
    type Error = Error;
    fn try_from(val: Val) -> Result<Vec<u8>> {
        match val {
            Val::String(s) => Ok(s),
            _ => Err(error!(TypeMismatch)),
        }
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Val {
        Val::String(s.as_bytes().to_vec())
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Val::Float(n) => write!(f, "{}", super::format::float(*n)),
            Val::Integer(n) => write!(f, "{}", n),
            Val::String(s) => write!(f, "{}", String::from_utf8_lossy(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_rounds() {
        assert_eq!(Val::Float(2.5).convert(Type::Integer).unwrap(), Val::Integer(3));
        assert_eq!(Val::Float(-2.5).convert(Type::Integer).unwrap(), Val::Integer(-3));
        assert_eq!(Val::Integer(7).convert(Type::Float).unwrap(), Val::Float(7.0));
    }

    #[test]
    fn test_string_never_mixes() {
        assert!(Val::from("1").convert(Type::Integer).is_err());
        assert!(Val::Integer(1).convert(Type::String).is_err());
        assert!(Val::Float(1e300).convert(Type::Integer).is_err());
    }
}

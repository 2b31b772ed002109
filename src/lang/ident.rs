// Used by the tokenizer, the evaluator and the variable table

use bitflags::bitflags;

pub const MAX_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Float,
    Integer,
    String,
}

bitflags! {
    /// The set of types an operator, argument or assignment will take.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeSet: u8 {
        const FLOAT = 0b001;
        const INTEGER = 0b010;
        const STRING = 0b100;
        const NUMBER = Self::FLOAT.bits() | Self::INTEGER.bits();
        const ANY = Self::NUMBER.bits() | Self::STRING.bits();
    }
}

impl Type {
    pub fn from_suffix(ch: u8) -> Option<Type> {
        match ch {
            b'$' => Some(Type::String),
            b'%' => Some(Type::Integer),
            b'!' => Some(Type::Float),
            _ => None,
        }
    }

    /// `INTEGER`, `FLOAT` and `STRING` as written after `AS` or `OPTION DEFAULT`.
    pub fn from_word(word: &[u8]) -> Option<Type> {
        if word.eq_ignore_ascii_case(b"INTEGER") {
            Some(Type::Integer)
        } else if word.eq_ignore_ascii_case(b"FLOAT") {
            Some(Type::Float)
        } else if word.eq_ignore_ascii_case(b"STRING") {
            Some(Type::String)
        } else {
            None
        }
    }

    pub fn set(self) -> TypeSet {
        match self {
            Type::Float => TypeSet::FLOAT,
            Type::Integer => TypeSet::INTEGER,
            Type::String => TypeSet::STRING,
        }
    }

    pub fn is_numeric(self) -> bool {
        self != Type::String
    }

    /// Float and integer convert into each other; strings convert to nothing.
    pub fn compatible(self, other: Type) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Type::Float => write!(f, "FLOAT"),
            Type::Integer => write!(f, "INTEGER"),
            Type::String => write!(f, "STRING"),
        }
    }
}

pub fn is_name_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

pub fn is_name_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'.'
}

pub fn is_suffix(ch: u8) -> bool {
    ch == b'$' || ch == b'%' || ch == b'!'
}

/// Length of the name (without suffix) starting at `s[0]`.
pub fn name_len(s: &[u8]) -> usize {
    match s.first() {
        Some(ch) if is_name_start(*ch) => s.iter().take_while(|ch| is_name_char(**ch)).count(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_len() {
        assert_eq!(name_len(b"ABC$ = 1"), 3);
        assert_eq!(name_len(b"MM.ERRNO"), 8);
        assert_eq!(name_len(b"1ABC"), 0);
        assert_eq!(name_len(b"_X1"), 3);
    }

    #[test]
    fn test_compatible() {
        assert!(Type::Float.compatible(Type::Integer));
        assert!(!Type::String.compatible(Type::Integer));
        assert!(TypeSet::NUMBER.contains(Type::Integer.set()));
    }
}

use super::{Cursor, Kind, Lookup, Operation, Runtime, Val};
use crate::error;
use crate::lang::token::{Keyword, Operator, Token};
use crate::lang::{name_len, Error, Type, TypeSet};

type Result<T> = std::result::Result<T, Error>;

/// Sub-expressions open at once, counted across nested function calls.
pub const MAX_NESTING: usize = 200;

/// Largest power of ten that is exact as an f64.
const EXACT_POWERS: i32 = 22;
const POWERS: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

impl Runtime {
    /// Evaluates a whole expression. What follows it must be a comma,
    /// a closing parenthesis, a semicolon, a keyword or the end.
    pub(super) fn evaluate(&mut self, cursor: &mut Cursor, expected: TypeSet) -> Result<Val> {
        let val = self.evaluate_partial(cursor, expected)?;
        cursor.skip_spaces();
        match cursor.peek() {
            0 | b',' | b')' | b';' | b'\'' => Ok(val),
            _ if matches!(cursor.peek_token(), Some(Token::Keyword(_))) => Ok(val),
            _ => Err(error!(SyntaxError; "UNEXPECTED TEXT AFTER EXPRESSION")),
        }
    }

    /// Evaluates as far as the expression goes and leaves the rest alone.
    pub(super) fn evaluate_partial(&mut self, cursor: &mut Cursor, expected: TypeSet) -> Result<Val> {
        let val = self.expression(cursor, 0)?;
        coerce(val, expected)
    }

    pub(super) fn eval_integer(&mut self, cursor: &mut Cursor) -> Result<i64> {
        match self.evaluate(cursor, TypeSet::INTEGER)? {
            Val::Integer(n) => Ok(n),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub(super) fn eval_float(&mut self, cursor: &mut Cursor) -> Result<f64> {
        match self.evaluate(cursor, TypeSet::FLOAT)? {
            Val::Float(n) => Ok(n),
            _ => Err(error!(TypeMismatch)),
        }
    }

    pub(super) fn eval_string(&mut self, cursor: &mut Cursor) -> Result<Vec<u8>> {
        match self.evaluate(cursor, TypeSet::STRING)? {
            Val::String(s) => Ok(s),
            _ => Err(error!(TypeMismatch)),
        }
    }

    /// Precedence climbing: operators binding tighter than `min` are
    /// folded into the right operand first.
    fn expression(&mut self, cursor: &mut Cursor, min: u8) -> Result<Val> {
        if self.nesting >= MAX_NESTING {
            return Err(error!(StackOverflow; "EXPRESSION TOO COMPLEX"));
        }
        self.nesting += 1;
        let result = self.climb(cursor, min);
        self.nesting -= 1;
        result
    }

    fn climb(&mut self, cursor: &mut Cursor, min: u8) -> Result<Val> {
        let mut lhs = self.getvalue(cursor)?;
        loop {
            let op = match cursor.peek_token() {
                Some(Token::Operator(op)) if !op.is_unary() && op.precedence() >= min => op,
                _ => return Ok(lhs),
            };
            cursor.advance(1);
            let rhs = self.expression(cursor, op.precedence() + 1)?;
            lhs = Operation::binary(op, lhs, rhs)?;
        }
    }

    /// One primary value.
    pub(super) fn getvalue(&mut self, cursor: &mut Cursor) -> Result<Val> {
        cursor.skip_spaces();
        let ch = cursor.peek();
        if let Some(token) = Token::from_byte(ch) {
            cursor.advance(1);
            return match token {
                Token::Operator(Operator::Minus) => Operation::negate(self.getvalue(cursor)?),
                Token::Operator(Operator::Plus) => match self.getvalue(cursor)? {
                    Val::String(_) => Err(error!(TypeMismatch)),
                    val => Ok(val),
                },
                Token::Operator(Operator::Not) => Operation::not(self.getvalue(cursor)?),
                Token::Operator(Operator::Inv) => Operation::inv(self.getvalue(cursor)?),
                Token::Builtin(builtin) => {
                    let args = if Token::name(ch).ends_with('(') {
                        self.arguments(cursor)?
                    } else if cursor.peek() == b'(' && builtin.arity().contains(&1) {
                        cursor.advance(1);
                        self.arguments(cursor)?
                    } else {
                        vec![]
                    };
                    self.builtin(builtin, args)
                }
                _ => Err(error!(SyntaxError; "EXPECTED A VALUE")),
            };
        }
        match ch {
            b'(' => {
                cursor.advance(1);
                let val = self.expression(cursor, 0)?;
                cursor.expect(b')')?;
                Ok(val)
            }
            b'"' => {
                cursor.advance(1);
                let mut s = vec![];
                loop {
                    match cursor.next() {
                        b'"' | 0 => break,
                        ch => s.push(ch),
                    }
                }
                Ok(Val::String(s))
            }
            b'0'..=b'9' | b'.' | b'&' => match literal(cursor.rest()) {
                Some((val, len)) => {
                    cursor.advance(len);
                    Ok(val)
                }
                None => Err(error!(SyntaxError; "INVALID NUMBER")),
            },
            _ if name_len(cursor.rest()) > 0 => self.name_value(cursor),
            _ => Err(error!(SyntaxError; "EXPECTED A VALUE")),
        }
    }

    /// A user function call or a variable.
    fn name_value(&mut self, cursor: &mut Cursor) -> Result<Val> {
        let len = name_len(cursor.rest());
        let name = String::from_utf8_lossy(&cursor.rest()[..len]).to_ascii_uppercase();
        let link = self.link.clone();
        match link.get(&name) {
            Some(def) if def.kind == Kind::Function => {
                cursor.advance(len);
                if let Some(suffix) = Type::from_suffix(cursor.peek()) {
                    cursor.advance(1);
                    if def.ty.map_or(false, |ty| ty != suffix) {
                        return Err(error!(TypeMismatch; name));
                    }
                }
                let args = if cursor.peek() == b'(' {
                    cursor.advance(1);
                    self.arguments(cursor)?
                } else {
                    vec![]
                };
                match self.call(def, Kind::Function, args, cursor.pos())? {
                    Some(val) => Ok(val),
                    None => Err(error!(NotAFunction; name)),
                }
            }
            Some(def) if def.kind != Kind::Label => Err(error!(NotAFunction; name)),
            _ => {
                let slot = self.find_var(cursor, Lookup::empty(), &Default::default())?;
                self.vars.load(&self.heap, slot)
            }
        }
    }

    /// Splits an argument list whose `(` was just consumed. The raw text is
    /// staged in a heap temporary that lives until the statement ends.
    pub(super) fn arguments(&mut self, cursor: &mut Cursor) -> Result<Vec<Cursor>> {
        let close = cursor.closing_paren()?;
        let raw = cursor.code().slice(cursor.pos(), close).to_vec();
        cursor.set_pos(close + 1);
        let handle = self.heap.temp(raw.len(), self.level)?;
        self.heap.get_mut(handle)?[..raw.len()].copy_from_slice(&raw);
        let staged = Cursor::over(&self.heap.get(handle)?[..raw.len()]);
        Ok(staged.split_args())
    }

    /// True when the text is nothing but a variable or array reference,
    /// which is what a call can bind by reference.
    pub(super) fn is_reference(&self, cursor: &Cursor) -> bool {
        let mut probe = cursor.clone();
        probe.skip_spaces();
        let len = name_len(probe.rest());
        if len == 0 {
            return false;
        }
        let name = String::from_utf8_lossy(&probe.rest()[..len]).to_ascii_uppercase();
        if self.link.get(&name).map_or(false, |def| def.kind != Kind::Label) {
            return false;
        }
        probe.advance(len);
        if Type::from_suffix(probe.peek()).is_some() {
            probe.advance(1);
        }
        if probe.peek() == b'(' {
            probe.advance(1);
            match probe.closing_paren() {
                Ok(close) => probe.set_pos(close + 1),
                Err(_) => return false,
            }
        }
        probe.at_end()
    }
}

/// Applies the float and integer conversions an expected type allows.
pub fn coerce(val: Val, expected: TypeSet) -> Result<Val> {
    if expected.contains(val.ty().set()) {
        Ok(val)
    } else if val.is_string() {
        Err(error!(TypeMismatch))
    } else if expected.contains(TypeSet::INTEGER) {
        val.convert(Type::Integer)
    } else if expected.contains(TypeSet::FLOAT) {
        val.convert(Type::Float)
    } else {
        Err(error!(TypeMismatch))
    }
}

/// Numeric literal at the start of `s` and the bytes it takes.
/// Literals without a point or exponent are integers unless they overflow.
pub fn literal(s: &[u8]) -> Option<(Val, usize)> {
    if s.first() == Some(&b'&') {
        return based(s);
    }
    let mut pos = 0;
    let mut numerator: u64 = 0;
    let mut digits = 0;
    let mut fraction: i32 = 0;
    let mut float = false;
    let mut point = false;
    while let Some(ch) = s.get(pos) {
        match ch {
            b'0'..=b'9' => {
                if numerator != 0 || *ch != b'0' {
                    digits += 1;
                }
                numerator = numerator.wrapping_mul(10).wrapping_add((ch - b'0') as u64);
                if point {
                    fraction += 1;
                }
            }
            b'.' if !point => {
                point = true;
                float = true;
            }
            _ => break,
        }
        pos += 1;
    }
    let mantissa_end = pos;
    if mantissa_end == 0 || (mantissa_end == 1 && point) {
        return None;
    }
    let mut exponent: i32 = 0;
    if matches!(s.get(pos), Some(b'E') | Some(b'e')) {
        let mut at = pos + 1;
        let negative = match s.get(at) {
            Some(b'-') => {
                at += 1;
                true
            }
            Some(b'+') => {
                at += 1;
                false
            }
            _ => false,
        };
        let start = at;
        while let Some(ch) = s.get(at).filter(|ch| ch.is_ascii_digit()) {
            exponent = exponent.saturating_mul(10).saturating_add((ch - b'0') as i32);
            at += 1;
        }
        if at > start {
            float = true;
            if negative {
                exponent = -exponent;
            }
            pos = at;
        }
    }
    let text = std::str::from_utf8(&s[..pos]).ok()?;
    if !float {
        return match text.parse::<i64>() {
            Ok(n) => Some((Val::Integer(n), pos)),
            Err(_) => text.parse::<f64>().ok().map(|n| (Val::Float(n), pos)),
        };
    }
    let scale = exponent - fraction;
    if digits <= 15 && scale.abs() <= EXACT_POWERS {
        let n = numerator as f64;
        let n = if scale < 0 {
            n / POWERS[(-scale) as usize]
        } else {
            n * POWERS[scale as usize]
        };
        return Some((Val::Float(n), pos));
    }
    text.parse::<f64>().ok().map(|n| (Val::Float(n), pos))
}

fn based(s: &[u8]) -> Option<(Val, usize)> {
    let radix = match s.get(1).map(|ch| ch.to_ascii_uppercase()) {
        Some(b'H') => 16,
        Some(b'O') => 8,
        Some(b'B') => 2,
        _ => return None,
    };
    let len = s[2..]
        .iter()
        .take_while(|ch| (**ch as char).is_digit(radix))
        .count();
    let text = std::str::from_utf8(&s[2..2 + len]).ok()?;
    let n = u64::from_str_radix(text, radix).ok()?;
    Some((Val::Integer(n as i64), 2 + len))
}

/// A number as typed into INPUT or written in DATA: optional spaces and sign.
pub fn signed(s: &[u8]) -> Option<(Val, usize)> {
    let mut pos = s.iter().take_while(|ch| **ch == b' ').count();
    let negative = match s.get(pos) {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };
    let (val, len) = literal(&s[pos..])?;
    let val = if negative { Operation::negate(val).ok()? } else { val };
    Some((val, pos + len))
}

/// Exact number text for INPUT and READ targets.
pub fn number_text(s: &[u8]) -> Result<Val> {
    let trimmed = trim(s);
    match signed(trimmed) {
        Some((val, len)) if len == trimmed.len() => Ok(val),
        _ if trimmed.is_empty() => Ok(Val::Integer(0)),
        _ => Err(error!(TypeMismatch; "EXPECTED A NUMBER")),
    }
}

pub fn trim(s: &[u8]) -> &[u8] {
    let start = s.iter().take_while(|ch| **ch == b' ').count();
    let end = s.len() - s[start..].iter().rev().take_while(|ch| **ch == b' ').count();
    &s[start..end]
}

pub fn keyword_byte(keyword: Keyword) -> u8 {
    Token::Keyword(keyword).byte()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_literals() {
        assert_eq!(literal(b"42+1"), Some((Val::Integer(42), 2)));
        assert_eq!(literal(b"&HFF"), Some((Val::Integer(255), 4)));
        assert_eq!(literal(b"&B101"), Some((Val::Integer(5), 5)));
        assert_eq!(literal(b"&O17"), Some((Val::Integer(15), 4)));
        assert_eq!(literal(b"99999999999999999999"), Some((Val::Float(1e20), 20)));
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(literal(b"2.5"), Some((Val::Float(2.5), 3)));
        assert_eq!(literal(b".5)"), Some((Val::Float(0.5), 2)));
        assert_eq!(literal(b"1.5E-3"), Some((Val::Float(0.0015), 6)));
        assert_eq!(literal(b"0.1"), Some((Val::Float(0.1), 3)));
        assert_eq!(literal(b"1E400").map(|(v, _)| v), Some(Val::Float(f64::INFINITY)));
        assert_eq!(literal(b"3E"), Some((Val::Integer(3), 1)));
        assert_eq!(literal(b"."), None);
    }

    #[test]
    fn test_signed_and_text() {
        assert_eq!(signed(b"  -12abc"), Some((Val::Integer(-12), 5)));
        assert_eq!(number_text(b" 7.25 "), Ok(Val::Float(7.25)));
        assert!(number_text(b"seven").is_err());
        assert_eq!(number_text(b""), Ok(Val::Integer(0)));
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce(Val::Float(2.5), TypeSet::INTEGER), Ok(Val::Integer(3)));
        assert_eq!(coerce(Val::Integer(2), TypeSet::NUMBER), Ok(Val::Integer(2)));
        assert!(coerce(Val::from("x"), TypeSet::NUMBER).is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let mut rt = Runtime::default();
        let shallow = format!("{}1{}", "(".repeat(MAX_NESTING - 1), ")".repeat(MAX_NESTING - 1));
        assert_eq!(rt.evaluate(&mut Cursor::over(shallow.as_bytes()), TypeSet::ANY), Ok(Val::Integer(1)));
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let err = rt.evaluate(&mut Cursor::over(deep.as_bytes()), TypeSet::ANY).unwrap_err();
        assert_eq!(err.code(), crate::lang::ErrorCode::StackOverflow);
        assert_eq!(rt.nesting, 0);
    }
}

use super::eval::{signed, trim};
use super::format;
use super::{Cursor, Lookup, Runtime, Val, MAX_STRING};
use crate::error;
use crate::lang::token::Builtin;
use crate::lang::{Error, TypeSet};
use rand::Rng;

type Result<T> = std::result::Result<T, Error>;

pub struct Function {}

impl Function {
    pub fn abs(val: Val) -> Result<Val> {
        match val {
            Val::Integer(n) => n.checked_abs().map(Val::Integer).ok_or_else(|| error!(Overflow)),
            Val::Float(n) => Ok(Val::Float(n.abs())),
            Val::String(_) => Err(error!(TypeMismatch)),
        }
    }

    pub fn sgn(val: Val) -> Result<Val> {
        match val {
            Val::Integer(n) => Ok(Val::Integer(n.signum())),
            Val::Float(n) if n > 0.0 => Ok(Val::Integer(1)),
            Val::Float(n) if n < 0.0 => Ok(Val::Integer(-1)),
            Val::Float(_) => Ok(Val::Integer(0)),
            Val::String(_) => Err(error!(TypeMismatch)),
        }
    }

    /// Largest whole number not above the value.
    pub fn int(val: Val) -> Result<Val> {
        match val {
            Val::Float(n) => Ok(Val::Float(n.floor())),
            Val::Integer(n) => Ok(Val::Integer(n)),
            Val::String(_) => Err(error!(TypeMismatch)),
        }
    }

    /// Drops the fraction, rounding toward zero.
    pub fn fix(val: Val) -> Result<Val> {
        match val {
            Val::Float(n) => Ok(Val::Float(n.trunc())),
            Val::Integer(n) => Ok(Val::Integer(n)),
            Val::String(_) => Err(error!(TypeMismatch)),
        }
    }

    pub fn sqr(n: f64) -> Result<Val> {
        if n < 0.0 {
            return Err(error!(IllegalFunctionCall; "NEGATIVE SQUARE ROOT"));
        }
        Ok(Val::Float(n.sqrt()))
    }

    pub fn log(n: f64) -> Result<Val> {
        if n <= 0.0 {
            return Err(error!(IllegalFunctionCall; "LOG OF A NUMBER <= 0"));
        }
        Ok(Val::Float(n.ln()))
    }

    /// MAX and MIN stay integer when every argument is.
    pub fn extreme(vals: Vec<Val>, max: bool) -> Result<Val> {
        if vals.iter().all(|v| matches!(v, Val::Integer(_))) {
            let ints = vals.into_iter().map(i64::try_from).collect::<Result<Vec<_>>>()?;
            let best = if max { ints.iter().max() } else { ints.iter().min() };
            return best.map(|n| Val::Integer(*n)).ok_or_else(|| error!(ArgumentList));
        }
        let mut best: Option<f64> = None;
        for val in vals {
            let n = f64::try_from(val)?;
            best = Some(match best {
                None => n,
                Some(b) if max => b.max(n),
                Some(b) => b.min(n),
            });
        }
        best.map(Val::Float).ok_or_else(|| error!(ArgumentList))
    }

    pub fn left(s: Vec<u8>, n: i64) -> Result<Val> {
        let n = usize::try_from(n).map_err(|_| error!(IllegalFunctionCall))?;
        Ok(Val::String(s[..n.min(s.len())].to_vec()))
    }

    pub fn right(s: Vec<u8>, n: i64) -> Result<Val> {
        let n = usize::try_from(n).map_err(|_| error!(IllegalFunctionCall))?;
        Ok(Val::String(s[s.len() - n.min(s.len())..].to_vec()))
    }

    /// MID$ counts from 1; a missing length takes the rest.
    pub fn mid(s: Vec<u8>, start: i64, len: Option<i64>) -> Result<Val> {
        if start < 1 {
            return Err(error!(IllegalFunctionCall; "START MUST BE 1 OR MORE"));
        }
        let from = ((start - 1) as usize).min(s.len());
        let count = match len {
            Some(n) => usize::try_from(n).map_err(|_| error!(IllegalFunctionCall))?,
            None => s.len(),
        };
        let to = from.saturating_add(count).min(s.len());
        Ok(Val::String(s[from..to].to_vec()))
    }

    /// 1 based position of `find` in `s` at or after `start`, else 0.
    pub fn instr(start: i64, s: &[u8], find: &[u8]) -> Result<Val> {
        if start < 1 {
            return Err(error!(IllegalFunctionCall; "START MUST BE 1 OR MORE"));
        }
        let from = (start - 1) as usize;
        if from > s.len() {
            return Ok(Val::Integer(0));
        }
        if find.is_empty() {
            return Ok(Val::Integer(start));
        }
        let at = s[from..]
            .windows(find.len())
            .position(|w| w == find)
            .map_or(0, |i| (from + i + 1) as i64);
        Ok(Val::Integer(at))
    }

    pub fn chr(n: i64) -> Result<Val> {
        match u8::try_from(n) {
            Ok(byte) => Ok(Val::String(vec![byte])),
            Err(_) => Err(error!(IllegalFunctionCall; "CHARACTER OUT OF RANGE")),
        }
    }

    pub fn asc(s: &[u8]) -> Val {
        Val::Integer(s.first().map_or(0, |ch| *ch as i64))
    }

    /// Leading number of the text, 0 when there is none.
    pub fn val(s: &[u8]) -> Val {
        match signed(trim(s)) {
            Some((val, _)) => val,
            None => Val::Integer(0),
        }
    }

    pub fn repeat(n: i64, ch: u8) -> Result<Val> {
        let n = usize::try_from(n).map_err(|_| error!(IllegalFunctionCall))?;
        if n > MAX_STRING {
            return Err(error!(StringTooLong));
        }
        Ok(Val::String(vec![ch; n]))
    }
}

impl Runtime {
    /// Evaluates the arguments a builtin needs and applies it.
    pub(super) fn builtin(&mut self, builtin: Builtin, mut args: Vec<Cursor>) -> Result<Val> {
        if !builtin.arity().contains(&args.len()) {
            return Err(error!(ArgumentList));
        }
        match builtin {
            Builtin::Abs => Function::abs(self.number_arg(&mut args, 0)?),
            Builtin::Sgn => Function::sgn(self.number_arg(&mut args, 0)?),
            Builtin::Int => Function::int(self.number_arg(&mut args, 0)?),
            Builtin::Fix => Function::fix(self.number_arg(&mut args, 0)?),
            Builtin::Cint => Ok(Val::Integer(self.integer_arg(&mut args, 0)?)),
            Builtin::Sqr => Function::sqr(self.float_arg(&mut args, 0)?),
            Builtin::Sin => Ok(Val::Float(self.float_arg(&mut args, 0)?.sin())),
            Builtin::Cos => Ok(Val::Float(self.float_arg(&mut args, 0)?.cos())),
            Builtin::Tan => Ok(Val::Float(self.float_arg(&mut args, 0)?.tan())),
            Builtin::Atn => Ok(Val::Float(self.float_arg(&mut args, 0)?.atan())),
            Builtin::Exp => Ok(Val::Float(self.float_arg(&mut args, 0)?.exp())),
            Builtin::Log => Function::log(self.float_arg(&mut args, 0)?),
            Builtin::Pi => Ok(Val::Float(std::f64::consts::PI)),
            Builtin::Rnd => {
                if !args.is_empty() {
                    self.float_arg(&mut args, 0)?;
                }
                Ok(Val::Float(self.rng.gen::<f64>()))
            }
            Builtin::Max | Builtin::Min => {
                let mut vals = Vec::with_capacity(args.len());
                for index in 0..args.len() {
                    vals.push(self.number_arg(&mut args, index)?);
                }
                Function::extreme(vals, builtin == Builtin::Max)
            }
            Builtin::Len => Ok(Val::Integer(self.string_arg(&mut args, 0)?.len() as i64)),
            Builtin::Left => {
                let s = self.string_arg(&mut args, 0)?;
                Function::left(s, self.integer_arg(&mut args, 1)?)
            }
            Builtin::Right => {
                let s = self.string_arg(&mut args, 0)?;
                Function::right(s, self.integer_arg(&mut args, 1)?)
            }
            Builtin::Mid => {
                let s = self.string_arg(&mut args, 0)?;
                let start = self.integer_arg(&mut args, 1)?;
                let len = match args.len() {
                    3 => Some(self.integer_arg(&mut args, 2)?),
                    _ => None,
                };
                Function::mid(s, start, len)
            }
            Builtin::Instr => {
                let (start, first) = match args.len() {
                    3 => (self.integer_arg(&mut args, 0)?, 1),
                    _ => (1, 0),
                };
                let s = self.string_arg(&mut args, first)?;
                let find = self.string_arg(&mut args, first + 1)?;
                Function::instr(start, &s, &find)
            }
            Builtin::Ucase => Ok(Val::String(self.string_arg(&mut args, 0)?.to_ascii_uppercase())),
            Builtin::Lcase => Ok(Val::String(self.string_arg(&mut args, 0)?.to_ascii_lowercase())),
            Builtin::Chr => Function::chr(self.integer_arg(&mut args, 0)?),
            Builtin::Asc => Ok(Function::asc(&self.string_arg(&mut args, 0)?)),
            Builtin::Val => Ok(Function::val(&self.string_arg(&mut args, 0)?)),
            Builtin::Str => self.str(&mut args),
            Builtin::Hex | Builtin::Oct | Builtin::Bin => {
                let n = self.integer_arg(&mut args, 0)?;
                let digits = match args.len() {
                    2 => Some(
                        usize::try_from(self.integer_arg(&mut args, 1)?)
                            .map_err(|_| error!(IllegalFunctionCall))?,
                    ),
                    _ => None,
                };
                let radix = match builtin {
                    Builtin::Hex => 16,
                    Builtin::Oct => 8,
                    _ => 2,
                };
                Ok(Val::from(format::radix(n, radix, digits)?.as_str()))
            }
            Builtin::Space => Function::repeat(self.integer_arg(&mut args, 0)?, b' '),
            Builtin::String => {
                let n = self.integer_arg(&mut args, 0)?;
                let ch = match self.evaluate(&mut args[1], TypeSet::ANY)? {
                    Val::String(s) => s.first().copied().unwrap_or(b' '),
                    val => u8::try_from(i64::try_from(val)?)
                        .map_err(|_| error!(IllegalFunctionCall; "CHARACTER OUT OF RANGE"))?,
                };
                Function::repeat(n, ch)
            }
            Builtin::Bound => self.bound(&mut args),
            Builtin::Inkey => {
                let key = match self.pending_key.take() {
                    Some(key) => Some(key),
                    None => self.console.read_key(),
                };
                Ok(Val::String(key.map(|k| k.to_string().into_bytes()).unwrap_or_default()))
            }
            Builtin::Timer => Ok(Val::Float(self.started.elapsed().as_secs_f64() * 1000.0)),
            Builtin::Date => Ok(Val::from(chrono::Local::now().format("%d-%m-%Y").to_string().as_str())),
            Builtin::Time => Ok(Val::from(chrono::Local::now().format("%H:%M:%S").to_string().as_str())),
            Builtin::ErrNo => Ok(Val::Integer(
                self.last_error.as_ref().map_or(0, |e| e.code().number() as i64),
            )),
            Builtin::ErrMsg => Ok(Val::from(
                self.last_error.as_ref().map(|e| e.to_string()).unwrap_or_default().as_str(),
            )),
        }
    }

    fn number_arg(&mut self, args: &mut [Cursor], index: usize) -> Result<Val> {
        match args.get_mut(index) {
            Some(arg) => self.evaluate(arg, TypeSet::NUMBER),
            None => Err(error!(ArgumentList)),
        }
    }

    fn float_arg(&mut self, args: &mut [Cursor], index: usize) -> Result<f64> {
        f64::try_from(self.number_arg(args, index)?)
    }

    fn integer_arg(&mut self, args: &mut [Cursor], index: usize) -> Result<i64> {
        i64::try_from(self.number_arg(args, index)?)
    }

    fn string_arg(&mut self, args: &mut [Cursor], index: usize) -> Result<Vec<u8>> {
        match args.get_mut(index) {
            Some(arg) => self.eval_string(arg),
            None => Err(error!(ArgumentList)),
        }
    }

    /// `STR$(n [, width [, places [, pad$]]])`
    fn str(&mut self, args: &mut [Cursor]) -> Result<Val> {
        let val = self.number_arg(args, 0)?;
        let width = match args.len() {
            n if n >= 2 => Some(
                usize::try_from(self.integer_arg(args, 1)?)
                    .map_err(|_| error!(IllegalFunctionCall))?,
            ),
            _ => None,
        };
        let places = match args.len() {
            n if n >= 3 => Some(
                i32::try_from(self.integer_arg(args, 2)?).map_err(|_| error!(IllegalFunctionCall))?,
            ),
            _ => None,
        };
        let pad = match args.len() {
            4 => self.string_arg(args, 3)?.first().copied().unwrap_or(b' '),
            _ => b' ',
        };
        let text = format::number(&val, width, places, pad)?;
        if text.len() > MAX_STRING {
            return Err(error!(StringTooLong));
        }
        Ok(Val::from(text.as_str()))
    }

    /// `BOUND(a() [, dim])`. Dimension 0 reads the base.
    fn bound(&mut self, args: &mut [Cursor]) -> Result<Val> {
        let slot = self.find_var(&mut args[0], Lookup::EMPTY_ARRAY | Lookup::EXISTING, &Default::default())?;
        args[0].expect_end()?;
        let dim = match args.len() {
            2 => self.integer_arg(args, 1)?,
            _ => 1,
        };
        let entry = self.vars.entry(slot.var)?;
        if !entry.is_array() || slot.element.is_some() {
            return Err(error!(NotAnArray));
        }
        match dim {
            0 => Ok(Val::Integer(entry.base)),
            d if d >= 1 && (d as usize) <= entry.dims.len() => {
                Ok(Val::Integer(entry.dims[d as usize - 1]))
            }
            _ => Err(error!(IllegalFunctionCall; "NO SUCH DIMENSION")),
        }
    }
}

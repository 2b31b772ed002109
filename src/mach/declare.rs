use super::call::type_word;
use super::exec::Flow;
use super::lookup::{Declaration, Name, STATIC_SEPARATOR};
use super::var::Storage;
use super::{Cursor, Lookup, Operation, Runtime, Slot, Val};
use crate::error;
use crate::lang::token::{Keyword, Operator};
use crate::lang::{is_name_start, name_len, Error, Type, TypeSet};

type Result<T> = std::result::Result<T, Error>;

fn assignable(ty: Type) -> TypeSet {
    match ty {
        Type::String => TypeSet::STRING,
        _ => TypeSet::NUMBER,
    }
}

/// `DIM INTEGER a, b` puts the type before the names.
fn leading_type(cursor: &mut Cursor) -> Option<Type> {
    let mut probe = cursor.clone();
    probe.skip_spaces();
    let len = name_len(probe.rest());
    let ty = Type::from_word(&probe.rest()[..len])?;
    probe.advance(len);
    probe.skip_spaces();
    if is_name_start(probe.peek()) {
        *cursor = probe;
        Some(ty)
    } else {
        None
    }
}

impl Runtime {
    pub(super) fn let_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let slot = self.find_var(cursor, Lookup::empty(), &Default::default())?;
        cursor.expect_operator(Operator::Equal)?;
        let val = self.evaluate(cursor, assignable(slot.ty))?;
        cursor.expect_end()?;
        self.vars.assign(&mut self.heap, slot, val)?;
        Ok(Flow::Next)
    }

    /// `AS type`, `LENGTH n` and `= value` after a declared name.
    fn declaration(&mut self, cursor: &mut Cursor, lead: Option<Type>) -> Result<(Declaration, Option<Cursor>)> {
        let mut decl = Declaration { ty: lead, str_len: None };
        if cursor.eat_keyword(Keyword::As) {
            let ty = type_word(cursor)?;
            if lead.map_or(false, |lead| lead != ty) {
                return Err(error!(TypeMismatch; "CONFLICTING TYPES"));
            }
            decl.ty = Some(ty);
        }
        if cursor.eat_word(b"LENGTH") {
            let len = i64::try_from(self.getvalue(cursor)?)?;
            if !(1..=crate::mach::MAX_STRING as i64).contains(&len) {
                return Err(error!(StringTooLong; "INVALID STRING LENGTH"));
            }
            decl.str_len = Some(len as usize);
        }
        if cursor.eat_operator(Operator::Equal) {
            Ok((decl, Some(cursor.clone())))
        } else {
            cursor.expect_end()?;
            Ok((decl, None))
        }
    }

    fn initialize(&mut self, slot: Slot, init: Option<Cursor>) -> Result<()> {
        let mut init = match init {
            Some(init) => init,
            None => return Ok(()),
        };
        if slot.element.is_none() && self.vars.entry(slot.var)?.is_array() {
            return Err(error!(InvalidHere; "CANNOT INITIALIZE AN ARRAY"));
        }
        let val = self.evaluate(&mut init, assignable(slot.ty))?;
        init.expect_end()?;
        self.vars.store(&mut self.heap, slot, val)
    }

    /// DIM declares in the enclosing SUB or FUNCTION, LOCAL at the current level.
    pub(super) fn dim_statement(&mut self, cursor: &mut Cursor, local: bool) -> Result<Flow> {
        if local && self.level == 0 {
            return Err(error!(InvalidHere; "LOCAL OUTSIDE A SUB OR FUNCTION"));
        }
        let lead = leading_type(cursor);
        let items = cursor.split_args();
        if items.is_empty() {
            return Err(error!(SyntaxError; "EXPECTED A NAME"));
        }
        let flags = if local {
            Lookup::NEW | Lookup::LOCAL
        } else {
            Lookup::NEW
        };
        for item in items {
            let mut probe = item.clone();
            self.var_name(&mut probe)?;
            if probe.peek() == b'(' {
                probe.advance(1);
                let close = probe.closing_paren()?;
                probe.set_pos(close + 1);
            }
            let mut target = item.range(item.pos(), probe.pos());
            let (decl, init) = self.declaration(&mut probe, lead)?;
            let slot = self.find_var(&mut target, flags, &decl)?;
            self.initialize(slot, init)?;
        }
        Ok(Flow::Next)
    }

    /// A STATIC variable is a hidden global named after its SUB, seen
    /// inside the SUB through an alias made on every entry.
    pub(super) fn static_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let scope = self
            .scope_name()
            .ok_or_else(|| error!(InvalidHere; "STATIC OUTSIDE A SUB OR FUNCTION"))?;
        let level = self.scope_level();
        let lead = leading_type(cursor);
        for item in cursor.split_args() {
            let mut probe = item.clone();
            let name = self.var_name(&mut probe)?;
            let dims = self.bounds(&mut probe)?;
            let (decl, init) = self.declaration(&mut probe, lead)?;
            if self.vars.find(&name.name, level).is_some() {
                continue;
            }
            if self.link.get(&name.name).is_some() {
                return Err(error!(NameConflict; name.name));
            }
            let hidden = format!("{}{}{}", scope, STATIC_SEPARATOR, name.name);
            let id = match self.vars.find(&hidden, 0) {
                Some(id) => id,
                None => {
                    let owner = Name {
                        name: hidden,
                        suffix: name.suffix,
                    };
                    let id = self.declare(&owner, dims, 0, Lookup::NEW, &decl)?;
                    self.initialize(self.vars.slot(id, None)?, init)?;
                    id
                }
            };
            let slot = self.vars.slot(id, None)?;
            if name.suffix.map_or(false, |suffix| suffix != slot.ty) {
                return Err(error!(TypeMismatch; name.name));
            }
            self.vars.alias(&name.name, level, slot)?;
        }
        Ok(Flow::Next)
    }

    pub(super) fn const_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let items = cursor.split_args();
        if items.is_empty() {
            return Err(error!(SyntaxError; "EXPECTED A NAME"));
        }
        for mut item in items {
            let name = self.var_name(&mut item)?;
            item.expect_operator(Operator::Equal)?;
            let val = self.evaluate(&mut item, TypeSet::ANY)?;
            item.expect_end()?;
            let decl = Declaration {
                ty: Some(name.suffix.unwrap_or_else(|| val.ty())),
                str_len: None,
            };
            let id = self.declare(&name, vec![], self.scope_level(), Lookup::NEW, &decl)?;
            let slot = self.vars.slot(id, None)?;
            self.vars.store(&mut self.heap, slot, val)?;
            self.vars.entry_mut(id)?.constant = true;
        }
        Ok(Flow::Next)
    }

    pub(super) fn erase_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        for mut item in cursor.split_args() {
            let name = self.var_name(&mut item)?;
            if item.eat(b'(') {
                item.expect(b')')?;
            }
            item.expect_end()?;
            let id = self
                .lookup(&name.name, Lookup::empty())
                .ok_or_else(|| error!(NotDeclared; name.name.clone()))?;
            let aliased = self
                .vars
                .iter()
                .any(|(_, e)| matches!(e.storage, Storage::Alias { target, .. } if target == id));
            if aliased {
                return Err(error!(InvalidHere; format!("{} IS IN USE", name.name)));
            }
            self.vars.remove(id, &mut self.heap)?;
        }
        Ok(Flow::Next)
    }

    pub(super) fn clear_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        if self.level > 0 {
            return Err(error!(InvalidHere; "CLEAR INSIDE A SUB OR GOSUB"));
        }
        self.vars.clear(&mut self.heap)?;
        self.heap.reset();
        self.fors.clear();
        self.dos.clear();
        Ok(Flow::Next)
    }

    /// `INC var [, amount]`; strings take an amount and append it.
    pub(super) fn inc_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let mut args = cursor.split_args();
        if args.is_empty() || args.len() > 2 {
            return Err(error!(ArgumentList));
        }
        let slot = self.find_var(&mut args[0], Lookup::empty(), &Default::default())?;
        args[0].expect_end()?;
        let amount = match args.get_mut(1) {
            Some(arg) => {
                let val = self.evaluate(arg, assignable(slot.ty))?;
                arg.expect_end()?;
                val
            }
            None if slot.ty == Type::String => return Err(error!(ArgumentList)),
            None => Val::Integer(1),
        };
        let val = Operation::binary(Operator::Plus, self.vars.load(&self.heap, slot)?, amount)?;
        self.vars.assign(&mut self.heap, slot, val)?;
        Ok(Flow::Next)
    }

    pub(super) fn option_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        if cursor.eat_word(b"BASE") {
            let base = self.eval_integer(cursor)?;
            if base != 0 && base != 1 {
                return Err(error!(IllegalFunctionCall; "BASE MUST BE 0 OR 1"));
            }
            if self.vars.iter().any(|(_, e)| e.is_array()) {
                return Err(error!(InvalidHere; "ARRAYS ALREADY DECLARED"));
            }
            self.options.base = base;
        } else if cursor.eat_word(b"EXPLICIT") {
            self.options.explicit = true;
        } else if cursor.eat_word(b"DEFAULT") {
            self.options.default_type = if cursor.eat_word(b"NONE") {
                None
            } else {
                Some(type_word(cursor)?)
            };
        } else {
            return Err(error!(SyntaxError; "UNKNOWN OPTION"));
        }
        cursor.expect_end()?;
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use crate::lang::ErrorCode;
    use crate::mach::{Recorder, Runtime, Val};

    fn runtime() -> Runtime {
        Runtime::new(Recorder::new())
    }

    #[test]
    fn test_dim_forms() {
        let mut r = runtime();
        r.enter("DIM INTEGER A, B(3)").unwrap();
        r.enter("DIM C AS STRING LENGTH 4 = \"ABCD\"").unwrap();
        assert_eq!(r.variable("A"), Some(Val::Integer(0)));
        assert_eq!(r.variable("C$"), Some(Val::String(b"ABCD".to_vec())));
        let err = r.enter("C = \"ABCDE\"").unwrap_err();
        assert_eq!(err.code(), ErrorCode::StringTooLong);
        let err = r.enter("DIM A").unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyDeclared);
    }

    #[test]
    fn test_const() {
        let mut r = runtime();
        r.enter("CONST LIMIT = 10").unwrap();
        assert_eq!(r.variable("LIMIT"), Some(Val::Integer(10)));
        let err = r.enter("LIMIT = 11").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConstantAssignment);
    }

    #[test]
    fn test_inc_and_erase() {
        let mut r = runtime();
        r.enter("A = 1 : INC A : INC A, 2.5").unwrap();
        assert_eq!(r.variable("A"), Some(Val::Float(4.5)));
        r.enter("S$ = \"AB\" : INC S$, \"C\"").unwrap();
        assert_eq!(r.variable("S$"), Some(Val::String(b"ABC".to_vec())));
        r.enter("ERASE A").unwrap();
        assert_eq!(r.variable("A"), None);
    }

    #[test]
    fn test_option_base_and_explicit() {
        let mut r = runtime();
        r.enter("OPTION BASE 1 : DIM A(2) : A(1) = 5").unwrap();
        let err = r.enter("A(0) = 1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::SubscriptOutOfRange);
        r.enter("OPTION EXPLICIT").unwrap();
        let err = r.enter("B = 1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotDeclared);
        let err = r.enter("OPTION BASE 2").unwrap_err();
        assert_eq!(err.code(), ErrorCode::IllegalFunctionCall);
    }

    #[test]
    fn test_local_needs_a_sub() {
        let err = runtime().enter("LOCAL A").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidHere);
        let err = runtime().enter("STATIC A").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidHere);
    }
}

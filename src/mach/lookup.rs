use super::{CallKind, Cursor, Runtime, Slot, VarId, DEFAULT_STRING_LENGTH};
use crate::error;
use crate::lang::{name_len, Error, Type, TypeSet, MAX_NAME_LEN};
use bitflags::bitflags;

type Result<T> = std::result::Result<T, Error>;

/// Joins a subroutine name and a STATIC variable name into the hidden global.
pub const STATIC_SEPARATOR: char = '\u{1e}';

bitflags! {
    /// How `find_var` treats a name. No flags is find or create.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lookup: u8 {
        /// The variable must already exist.
        const EXISTING = 0b00001;
        /// Declaration: the variable must not exist at its scope yet.
        const NEW = 0b00010;
        /// `name()` refers to the whole array.
        const EMPTY_ARRAY = 0b00100;
        /// Only the current level; never falls back to globals.
        const LOCAL = 0b01000;
        /// The variable may share the name of a function.
        const RETURN_SLOT = 0b10000;
    }
}

/// What a declaring statement says about the names it introduces.
#[derive(Debug, Clone, Default)]
pub struct Declaration {
    pub ty: Option<Type>,
    pub str_len: Option<usize>,
}

/// A variable name as written: upper case, suffix split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub name: String,
    pub suffix: Option<Type>,
}

enum Subscript {
    None,
    Whole,
    Indices(Vec<i64>),
}

impl Runtime {
    pub(super) fn var_name(&self, cursor: &mut Cursor) -> Result<Name> {
        cursor.skip_spaces();
        let len = name_len(cursor.rest());
        if len == 0 {
            return Err(error!(SyntaxError; "EXPECTED A NAME"));
        }
        let name = String::from_utf8_lossy(&cursor.rest()[..len]).to_ascii_uppercase();
        if len > MAX_NAME_LEN {
            return Err(error!(NameTooLong; name));
        }
        cursor.advance(len);
        let suffix = Type::from_suffix(cursor.peek());
        if suffix.is_some() {
            cursor.advance(1);
        }
        Ok(Name { name, suffix })
    }

    fn subscript(&mut self, cursor: &mut Cursor) -> Result<Subscript> {
        if cursor.peek() != b'(' {
            return Ok(Subscript::None);
        }
        cursor.advance(1);
        let close = cursor.closing_paren()?;
        let inner = cursor.range(cursor.pos(), close);
        cursor.set_pos(close + 1);
        let args = inner.split_args();
        if args.is_empty() {
            return Ok(Subscript::Whole);
        }
        let mut indices = Vec::with_capacity(args.len());
        for mut arg in args {
            let index = self.evaluate(&mut arg, TypeSet::INTEGER)?;
            arg.expect_end()?;
            indices.push(i64::try_from(index)?);
        }
        Ok(Subscript::Indices(indices))
    }

    /// Upper bounds written after a name being declared; empty for a scalar.
    pub(super) fn bounds(&mut self, cursor: &mut Cursor) -> Result<Vec<i64>> {
        match self.subscript(cursor)? {
            Subscript::None => Ok(vec![]),
            Subscript::Whole => Err(error!(Dimensions; "MISSING BOUNDS")),
            Subscript::Indices(bounds) => Ok(bounds),
        }
    }

    /// Level DIM declares at: the innermost subroutine or function, else global.
    pub(super) fn scope_level(&self) -> usize {
        self.calls
            .iter()
            .rev()
            .find(|frame| frame.name.is_some() && frame.kind != CallKind::Gosub)
            .map_or(0, |frame| frame.level + 1)
    }

    /// Name of the subroutine or function whose body is running.
    pub(super) fn scope_name(&self) -> Option<String> {
        self.calls
            .iter()
            .rev()
            .find(|frame| frame.name.is_some() && frame.kind != CallKind::Gosub)
            .and_then(|frame| frame.name.clone())
    }

    /// Resolves the variable reference at the cursor, creating or declaring
    /// it as `flags` allow. The cursor is left after the reference.
    pub(super) fn find_var(
        &mut self,
        cursor: &mut Cursor,
        flags: Lookup,
        decl: &Declaration,
    ) -> Result<Slot> {
        let name = self.var_name(cursor)?;
        let subscript = self.subscript(cursor)?;
        if flags.contains(Lookup::NEW) {
            let dims = match subscript {
                Subscript::None => vec![],
                Subscript::Whole => return Err(error!(Dimensions; "MISSING BOUNDS")),
                Subscript::Indices(bounds) => bounds,
            };
            let level = if flags.contains(Lookup::LOCAL) {
                self.level
            } else {
                self.scope_level()
            };
            let id = self.declare(&name, dims, level, flags, decl)?;
            return self.vars.slot(id, None);
        }
        let id = match self.lookup(&name.name, flags) {
            Some(id) => id,
            None if flags.contains(Lookup::EXISTING) => {
                return Err(error!(NotDeclared; name.name));
            }
            None if !matches!(subscript, Subscript::None) => {
                return Err(error!(NotDeclared; format!("{} IS NOT DIMENSIONED", name.name)));
            }
            None if self.options.explicit => return Err(error!(NotDeclared; name.name)),
            None => {
                let level = if flags.contains(Lookup::LOCAL) { self.level } else { 0 };
                self.declare(&name, vec![], level, flags, decl)?
            }
        };
        let entry = self.vars.entry(id)?;
        if let Some(suffix) = name.suffix {
            if suffix != entry.ty {
                return Err(error!(TypeMismatch; name.name));
            }
        }
        let whole_array = entry.is_array();
        match subscript {
            Subscript::None if whole_array => Err(error!(Dimensions; "ARRAY NEEDS AN INDEX")),
            Subscript::None => self.vars.slot(id, None),
            Subscript::Whole if !flags.contains(Lookup::EMPTY_ARRAY) => {
                Err(error!(Dimensions; "MISSING INDEX"))
            }
            Subscript::Whole if !whole_array => Err(error!(NotAnArray; name.name)),
            Subscript::Whole => self.vars.slot(id, None),
            Subscript::Indices(indices) => self.vars.slot(id, Some(&indices)),
        }
    }

    /// Current level first, then globals.
    pub(super) fn lookup(&self, name: &str, flags: Lookup) -> Option<VarId> {
        match self.vars.find(name, self.level) {
            Some(id) => Some(id),
            None if self.level > 0 && !flags.contains(Lookup::LOCAL) => self.vars.find(name, 0),
            None => None,
        }
    }

    /// Resolves the type of a new variable and creates it at `level`.
    pub(super) fn declare(
        &mut self,
        name: &Name,
        dims: Vec<i64>,
        level: usize,
        flags: Lookup,
        decl: &Declaration,
    ) -> Result<VarId> {
        if self.vars.find(&name.name, level).is_some() {
            return Err(error!(AlreadyDeclared; name.name.clone()));
        }
        if !flags.contains(Lookup::RETURN_SLOT) && self.link.get(&name.name).is_some() {
            return Err(error!(NameConflict; name.name.clone()));
        }
        let ty = match (name.suffix, decl.ty) {
            (Some(suffix), Some(ty)) if suffix != ty => {
                return Err(error!(TypeMismatch; name.name.clone()))
            }
            (Some(ty), _) | (None, Some(ty)) => ty,
            (None, None) => match self.default_type() {
                Some(ty) => ty,
                None => return Err(error!(NotDeclared; format!("NO TYPE FOR {}", name.name))),
            },
        };
        let str_len = match ty {
            Type::String => decl.str_len.unwrap_or(self.options.string_length),
            _ => DEFAULT_STRING_LENGTH,
        };
        let base = self.options.base;
        self.vars
            .create(&mut self.heap, &name.name, ty, level, dims, base, str_len)
    }
}

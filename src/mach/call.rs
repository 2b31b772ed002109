use super::exec::Flow;
use super::lookup::{Declaration, Name};
use super::{Address, Cursor, Definition, Kind, Lookup, Runtime, Slot, Val};
use crate::error;
use crate::lang::token::{Command, Keyword};
use crate::lang::{name_len, Error, Type};
use tracing::debug;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Gosub,
    Sub,
    Function,
    Interrupt,
}

/// One GOSUB, call or interrupt in progress.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub kind: CallKind,
    /// Where execution resumes when the frame is popped.
    pub ret: Address,
    /// Line of the caller, restored for error reporting.
    pub line: Address,
    /// Variable level of the caller.
    pub level: usize,
    pub name: Option<String>,
}

/// Runs the machine code of a CSUB. `words` follow the entry offset as
/// written in the program; `args` are written back to reference arguments.
pub trait ForeignCode {
    fn call(&mut self, name: &str, entry: usize, words: &[u32], args: &mut [Val]) -> Result<()>;
}

/// Refuses every foreign call.
#[derive(Debug, Default, Clone, Copy)]
pub struct Refuse;

impl ForeignCode for Refuse {
    fn call(&mut self, name: &str, _: usize, _: &[u32], _: &mut [Val]) -> Result<()> {
        Err(error!(ForeignCode; format!("CANNOT RUN {}", name)))
    }
}

#[derive(Debug)]
struct Param {
    name: Name,
    array: bool,
    ty: Option<Type>,
}

enum Binding {
    Alias(Slot),
    Value(Val),
    Default,
}

/// `INTEGER`, `FLOAT` or `STRING`.
pub(super) fn type_word(cursor: &mut Cursor) -> Result<Type> {
    cursor.skip_spaces();
    let len = name_len(cursor.rest());
    match Type::from_word(&cursor.rest()[..len]) {
        Some(ty) => {
            cursor.advance(len);
            Ok(ty)
        }
        None => Err(error!(SyntaxError; "EXPECTED INTEGER, FLOAT OR STRING")),
    }
}

impl Runtime {
    /// Parameter list of a definition and the type after a closing `) AS`.
    fn params(&self, def: &Definition) -> Result<(Vec<Param>, Option<Type>)> {
        let end = self.code.element_end(def.params);
        let mut cursor = Cursor::new(self.code.clone(), def.params, end);
        let mut returns = None;
        if cursor.eat(b'(') {
            let close = cursor.closing_paren()?;
            let mut tail = cursor.range(close + 1, end);
            if tail.eat_keyword(Keyword::As) {
                returns = Some(type_word(&mut tail)?);
            }
            tail.expect_end()?;
            cursor.set_end(close);
        } else if def.kind == Kind::Function && !cursor.at_end() {
            return Err(error!(ArgumentList; def.name.clone()));
        }
        let mut params = vec![];
        for mut item in cursor.split_args() {
            let name = self
                .var_name(&mut item)
                .map_err(|_| error!(ArgumentList; def.name.clone()))?;
            let array = item.eat(b'(');
            if array && !item.eat(b')') {
                return Err(error!(ArgumentList; def.name.clone()));
            }
            let declared = if item.eat_keyword(Keyword::As) {
                Some(type_word(&mut item)?)
            } else {
                None
            };
            if !item.at_end() {
                return Err(error!(ArgumentList; def.name.clone()));
            }
            let ty = match (name.suffix, declared) {
                (Some(a), Some(b)) if a != b => return Err(error!(TypeMismatch; name.name)),
                (a, b) => a.or(b).or_else(|| self.default_type()),
            };
            params.push(Param { name, array, ty });
        }
        Ok((params, returns))
    }

    fn bind(&mut self, param: &Param, arg: Option<&Cursor>) -> Result<Binding> {
        let mut arg = match arg {
            Some(arg) => arg.clone(),
            None => return Ok(Binding::Default),
        };
        if arg.at_end() {
            return Ok(Binding::Default);
        }
        let ty = param
            .ty
            .ok_or_else(|| error!(NotDeclared; format!("NO TYPE FOR {}", param.name.name)))?;
        if param.array {
            if !self.is_reference(&arg) {
                return Err(error!(ArrayArgument; param.name.name.clone()));
            }
            let slot = self.find_var(&mut arg, Lookup::EXISTING | Lookup::EMPTY_ARRAY, &Default::default())?;
            let whole = slot.element.is_none() && self.vars.entry(slot.var)?.is_array();
            if !whole || slot.ty != ty {
                return Err(error!(ArrayArgument; param.name.name.clone()));
            }
            return Ok(Binding::Alias(slot));
        }
        if self.is_reference(&arg) {
            let slot = self.find_var(&mut arg, Lookup::empty(), &Default::default())?;
            if slot.ty == ty {
                return Ok(Binding::Alias(slot));
            }
            if !slot.ty.compatible(ty) {
                return Err(error!(TypeMismatch; param.name.name.clone()));
            }
            let val = self.vars.load(&self.heap, slot)?;
            return Ok(Binding::Value(val.convert(ty)?));
        }
        let val = self.evaluate(&mut arg, ty.set())?;
        arg.expect_end()?;
        Ok(Binding::Value(val.convert(ty)?))
    }

    fn create_param(&mut self, param: &Param, binding: Binding) -> Result<()> {
        let level = self.level;
        match binding {
            Binding::Alias(slot) => {
                if self.vars.find(&param.name.name, level).is_some() {
                    return Err(error!(AlreadyDeclared; param.name.name.clone()));
                }
                self.vars.alias(&param.name.name, level, slot)?;
            }
            Binding::Value(val) => {
                let decl = Declaration { ty: param.ty, str_len: None };
                let id = self.declare(&param.name, vec![], level, Lookup::NEW | Lookup::LOCAL, &decl)?;
                let slot = self.vars.slot(id, None)?;
                self.vars.store(&mut self.heap, slot, val)?;
            }
            Binding::Default if param.array => {
                return Err(error!(ArgumentList; param.name.name.clone()));
            }
            Binding::Default => {
                let decl = Declaration { ty: param.ty, str_len: None };
                self.declare(&param.name, vec![], level, Lookup::NEW | Lookup::LOCAL, &decl)?;
            }
        }
        Ok(())
    }

    /// Enters a SUB, FUNCTION or CSUB. Arguments are bound in the caller's
    /// scope. A function runs to its END FUNCTION here and yields its value;
    /// a SUB leaves a frame that `ret` returns to.
    pub(super) fn call(
        &mut self,
        def: &Definition,
        kind: Kind,
        args: Vec<Cursor>,
        ret: Address,
    ) -> Result<Option<Val>> {
        match (kind, def.kind) {
            (Kind::Function, Kind::Function) | (Kind::Sub, Kind::Sub) | (Kind::Sub, Kind::Csub) => {}
            (Kind::Function, _) => return Err(error!(NotAFunction; def.name.clone())),
            _ => return Err(error!(NotASubroutine; def.name.clone())),
        }
        if def.kind == Kind::Csub {
            self.csub(def, args)?;
            return Ok(None);
        }
        if self.calls.len() >= self.options.call_depth {
            return Err(error!(TooManyCalls));
        }
        let (params, returns) = self.params(def)?;
        if args.len() > params.len() {
            return Err(error!(ArgumentList; def.name.clone()));
        }
        let mut bindings = Vec::with_capacity(params.len());
        for (index, param) in params.iter().enumerate() {
            bindings.push(self.bind(param, args.get(index))?);
        }
        let depth = self.calls.len();
        self.calls.push(CallFrame {
            kind: if def.kind == Kind::Function { CallKind::Function } else { CallKind::Sub },
            ret,
            line: self.line,
            level: self.level,
            name: Some(def.name.clone()),
        })?;
        self.level += 1;
        debug!(name = %def.name, level = self.level, "call");
        if let Err(error) = self.enter_frame(def, &params, bindings, returns) {
            self.unwind_to(depth)?;
            return Err(error);
        }
        if def.kind != Kind::Function {
            return Ok(None);
        }
        let line = self.line;
        let skip_else = self.skip_else.take();
        self.line = def.line;
        let result = self.execute(def.body).and_then(|_| self.function_value(def));
        self.unwind_to(depth)?;
        self.line = line;
        self.skip_else = skip_else;
        result.map(Some)
    }

    fn enter_frame(
        &mut self,
        def: &Definition,
        params: &[Param],
        bindings: Vec<Binding>,
        returns: Option<Type>,
    ) -> Result<()> {
        for (param, binding) in params.iter().zip(bindings) {
            self.create_param(param, binding)?;
        }
        if def.kind == Kind::Function {
            let ty = match (def.ty, returns) {
                (Some(a), Some(b)) if a != b => return Err(error!(TypeMismatch; def.name.clone())),
                (a, b) => a.or(b).or_else(|| self.default_type()),
            };
            let decl = Declaration { ty, str_len: None };
            let name = Name { name: def.name.clone(), suffix: None };
            let flags = Lookup::NEW | Lookup::LOCAL | Lookup::RETURN_SLOT;
            self.declare(&name, vec![], self.level, flags, &decl)?;
        }
        Ok(())
    }

    fn function_value(&mut self, def: &Definition) -> Result<Val> {
        let id = self
            .vars
            .find(&def.name, self.level)
            .ok_or_else(|| error!(InternalError; "LOST FUNCTION RESULT"))?;
        let slot = self.vars.slot(id, None)?;
        self.vars.load(&self.heap, slot)
    }

    /// Hands a CSUB's hex words to the foreign code runner. Arguments are
    /// passed by value and copied back into the variables they named.
    fn csub(&mut self, def: &Definition, args: Vec<Cursor>) -> Result<()> {
        let mut words = vec![];
        let mut closed = false;
        for (command, stmt) in self.statements(def.body) {
            if command == Some(Command::EndCsub) {
                closed = true;
                break;
            }
            for word in String::from_utf8_lossy(stmt.rest()).split_whitespace() {
                let word = u32::from_str_radix(word, 16)
                    .map_err(|_| error!(SyntaxError; format!("INVALID HEX {}", word)))?;
                words.push(word);
            }
        }
        if !closed {
            return Err(error!(SyntaxError; "MISSING END CSUB"));
        }
        let (entry, words) = match words.split_first() {
            Some((entry, words)) => (*entry as usize, words),
            None => return Err(error!(ForeignCode; format!("{} HAS NO CODE", def.name))),
        };
        let mut values = Vec::with_capacity(args.len());
        let mut targets = Vec::with_capacity(args.len());
        for mut arg in args {
            if self.is_reference(&arg) {
                let slot = self.find_var(&mut arg, Lookup::empty(), &Default::default())?;
                values.push(self.vars.load(&self.heap, slot)?);
                targets.push(Some(slot));
            } else {
                values.push(self.evaluate(&mut arg, crate::lang::TypeSet::ANY)?);
                arg.expect_end()?;
                targets.push(None);
            }
        }
        debug!(name = %def.name, entry, words = words.len(), "foreign call");
        self.foreign.call(&def.name, entry, words, &mut values)?;
        for (slot, val) in targets.into_iter().zip(values) {
            if let Some(slot) = slot {
                self.vars.assign(&mut self.heap, slot, val.convert(slot.ty)?)?;
            }
        }
        Ok(())
    }

    /// `CALL name, args` or `CALL "name", args`.
    pub(super) fn call_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.skip_spaces();
        let len = name_len(cursor.rest());
        let word = String::from_utf8_lossy(&cursor.rest()[..len]).to_ascii_uppercase();
        let link = self.link.clone();
        let def = match link.get(&word) {
            Some(def) if len > 0 && def.kind != Kind::Label => {
                cursor.advance(len);
                def
            }
            _ => {
                let name = self.evaluate_partial(cursor, crate::lang::TypeSet::STRING)?;
                let name = name.text().to_ascii_uppercase();
                match link.get(&name) {
                    Some(def) if def.kind != Kind::Label => def,
                    _ => return Err(error!(UnknownCommand; name)),
                }
            }
        };
        let args = if cursor.eat(b',') {
            cursor.split_args()
        } else {
            cursor.expect_end()?;
            vec![]
        };
        if def.kind == Kind::Function {
            self.call(def, Kind::Function, args, cursor.end())?;
            return Ok(Flow::Next);
        }
        self.invoke(def, args, cursor)
    }

    /// Starts a SUB or runs a CSUB from a statement.
    pub(super) fn invoke(&mut self, def: &Definition, args: Vec<Cursor>, cursor: &Cursor) -> Result<Flow> {
        let ret = self.after(cursor);
        self.call(def, Kind::Sub, args, ret)?;
        if def.kind == Kind::Csub {
            return Ok(Flow::Next);
        }
        self.line = def.line;
        Ok(Flow::Jump(def.body))
    }
}

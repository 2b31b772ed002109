use super::call::{CallFrame, CallKind};
use super::eval::keyword_byte;
use super::exec::Flow;
use super::program::{Walk, Walker};
use super::{Address, Code, Cursor, Kind, Lookup, Operation, Runtime, Slot, Val};
use crate::error;
use crate::lang::token::{Command, Keyword, Operator, Token, ERASED, T_NEWLINE};
use crate::lang::{name_len, Error, LineNumber, TypeSet};
use std::time::{Duration, Instant};
use tracing::trace;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Abort,
    Ignore,
    /// Errors in the next n statements are ignored.
    Skip(usize),
}

#[derive(Debug, Clone)]
pub struct ForFrame {
    pub slot: Slot,
    pub level: usize,
    pub limit: Val,
    pub step: Val,
    /// Terminator of the FOR statement; NEXT jumps here to loop.
    pub body: Address,
    /// Terminator of the closing NEXT.
    pub next: Address,
    /// Names that NEXT closes beyond this loop, when it lists more.
    pub rest: Option<Address>,
}

/// DO/LOOP and WHILE/WEND. Looping jumps back to `start` so the opening
/// statement re-tests its condition and reuses this frame.
#[derive(Debug, Clone, Copy)]
pub struct DoFrame {
    pub start: Address,
    pub exit: Address,
    pub level: usize,
    pub wend: bool,
}

/// Where an interrupt enters: a label, a line or a SUB without parameters.
#[derive(Debug, Clone)]
pub struct Target {
    pub addr: Address,
    pub line: Address,
    pub sub: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Tick {
    pub period: Duration,
    pub due: Instant,
    pub target: Target,
}

#[derive(Debug, Default)]
pub struct Interrupts {
    pub ticks: [Option<Tick>; 4],
    pub key: Option<Target>,
}

/// Statement-initial commands from an address to the end of the program,
/// each with a cursor just past its command token.
pub struct Statements {
    code: Code,
    walker: Walker,
}

impl Iterator for Statements {
    type Item = (Option<Command>, Cursor);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Walk::Statement { start, end } = self.walker.next()? {
                let mut cursor = Cursor::new(self.code.clone(), start, end);
                cursor.skip_spaces();
                let command = self.code.command(cursor.pos());
                if command.is_some() {
                    cursor.advance(2);
                }
                return Some((command, cursor));
            }
        }
    }
}

/// Finds a single byte token from `pos`, stepping over strings, comments and
/// command tokens. `command` says whether `pos` is at a statement start.
pub fn seek_token(
    code: &Code,
    mut pos: Address,
    mut command: bool,
    token: u8,
    whole_line: bool,
) -> Option<Address> {
    let then = keyword_byte(Keyword::Then);
    let otherwise = keyword_byte(Keyword::Else);
    loop {
        let ch = code.at(pos);
        match ch {
            0 => {
                if !whole_line || matches!(code.at(pos + 1), 0 | T_NEWLINE | ERASED) {
                    return None;
                }
                pos += 1;
                command = true;
            }
            b' ' => pos += 1,
            _ if command => {
                command = false;
                match code.command(pos) {
                    Some(Command::Rem) => return None,
                    Some(Command::Data) => pos = code.element_end(pos),
                    Some(_) => pos += 2,
                    None => {}
                }
            }
            b'"' => {
                pos += 1;
                while !matches!(code.at(pos), b'"' | 0) {
                    pos += 1;
                }
                if code.at(pos) == b'"' {
                    pos += 1;
                }
            }
            b'\'' => pos = code.element_end(pos),
            _ if ch == token => return Some(pos),
            _ => {
                if ch == then || ch == otherwise {
                    command = true;
                }
                pos += 1;
            }
        }
    }
}

fn for_done(value: &Val, limit: &Val, step: &Val) -> Result<bool> {
    let value = f64::try_from(value.clone())?;
    let limit = f64::try_from(limit.clone())?;
    if f64::try_from(step.clone())? >= 0.0 {
        Ok(value > limit)
    } else {
        Ok(value < limit)
    }
}

impl Runtime {
    pub(super) fn statements(&self, from: Address) -> Statements {
        Statements {
            code: self.code.clone(),
            walker: Walker::new(self.code.clone(), from),
        }
    }

    fn condition(&mut self, mut cursor: Cursor) -> Result<bool> {
        let val = self.evaluate(&mut cursor, TypeSet::NUMBER)?;
        cursor.expect_end()?;
        val.is_true()
    }

    fn find_then(&self, cursor: &Cursor) -> Result<Address> {
        match seek_token(cursor.code(), cursor.pos(), false, keyword_byte(Keyword::Then), false) {
            Some(then) if then < cursor.end() => Ok(then),
            _ => Err(error!(SyntaxError; "EXPECTED THEN")),
        }
    }

    /// An IF whose THEN ends the statement opens a block.
    fn is_block_if(&self, cursor: &Cursor) -> bool {
        match self.find_then(cursor) {
            Ok(then) => cursor.range(then + 1, cursor.end()).at_end(),
            Err(_) => false,
        }
    }

    fn line_ref(&self, cursor: &mut Cursor) -> Result<LineNumber> {
        cursor.skip_spaces();
        let len = cursor.rest().iter().take_while(|ch| ch.is_ascii_digit()).count();
        let text = String::from_utf8_lossy(&cursor.rest()[..len]).into_owned();
        cursor.advance(len);
        text.parse::<LineNumber>()
            .map_err(|_| error!(UndefinedLine; text))
    }

    /// A line number or label to jump to.
    pub(super) fn target(&mut self, cursor: &mut Cursor) -> Result<Address> {
        cursor.skip_spaces();
        if cursor.peek().is_ascii_digit() {
            let number = self.line_ref(cursor)?;
            return self
                .link
                .line(number)
                .ok_or_else(|| error!(UndefinedLine; number.to_string()));
        }
        let len = name_len(cursor.rest());
        if len == 0 {
            return Err(error!(SyntaxError; "EXPECTED A LINE NUMBER OR LABEL"));
        }
        let name = String::from_utf8_lossy(&cursor.rest()[..len]).to_ascii_uppercase();
        cursor.advance(len);
        match self.link.get(&name) {
            Some(def) if def.kind == Kind::Label => Ok(def.line),
            _ => Err(error!(UndefinedLine; name)),
        }
    }

    /// An interrupt handler; `None` for a literal 0.
    fn interrupt_target(&mut self, cursor: &mut Cursor) -> Result<Option<Target>> {
        cursor.skip_spaces();
        if cursor.peek().is_ascii_digit() {
            let number = self.line_ref(cursor)?;
            if number == 0 {
                return Ok(None);
            }
            let addr = self
                .link
                .line(number)
                .ok_or_else(|| error!(UndefinedLine; number.to_string()))?;
            return Ok(Some(Target { addr, line: addr, sub: None }));
        }
        let len = name_len(cursor.rest());
        let name = String::from_utf8_lossy(&cursor.rest()[..len]).to_ascii_uppercase();
        cursor.advance(len);
        match self.link.get(&name) {
            Some(def) if def.kind == Kind::Label => Ok(Some(Target {
                addr: def.line,
                line: def.line,
                sub: None,
            })),
            Some(def) if def.kind == Kind::Sub => Ok(Some(Target {
                addr: def.body,
                line: def.line,
                sub: Some(def.name.clone()),
            })),
            _ => Err(error!(UndefinedLine; name)),
        }
    }

    fn goto_line(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let addr = self.target(cursor)?;
        cursor.expect_end()?;
        Ok(Flow::Jump(addr))
    }

    pub(super) fn if_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let then = self.find_then(cursor)?;
        let truth = self.condition(cursor.range(cursor.pos(), then))?;
        let mut rest = cursor.range(then + 1, cursor.end());
        if rest.at_end() {
            return self.block_if(truth, cursor.end());
        }
        let else_at = seek_token(cursor.code(), then + 1, true, keyword_byte(Keyword::Else), true);
        if truth {
            if rest.peek().is_ascii_digit() {
                if let Some(at) = else_at {
                    rest.set_end(at.min(rest.end()));
                }
                return self.goto_line(&mut rest);
            }
            self.skip_else = else_at;
            return Ok(Flow::Jump(rest.pos()));
        }
        match else_at {
            Some(at) => {
                let mut rest = Cursor::new(cursor.code().clone(), at + 1, cursor.code().element_end(at));
                rest.skip_spaces();
                if rest.peek().is_ascii_digit() {
                    self.goto_line(&mut rest)
                } else {
                    Ok(Flow::Jump(at + 1))
                }
            }
            None => Ok(Flow::SkipLine),
        }
    }

    fn block_if(&mut self, truth: bool, from: Address) -> Result<Flow> {
        if truth {
            return Ok(Flow::Next);
        }
        let mut depth = 0usize;
        for (command, stmt) in self.statements(from) {
            match command {
                Some(Command::If) if self.is_block_if(&stmt) => depth += 1,
                Some(Command::EndIf) if depth == 0 => return Ok(Flow::Jump(stmt.end())),
                Some(Command::EndIf) => depth -= 1,
                Some(Command::Else) if depth == 0 => return Ok(Flow::Jump(stmt.end())),
                Some(Command::ElseIf) if depth == 0 => {
                    let then = self.find_then(&stmt)?;
                    if self.condition(stmt.range(stmt.pos(), then))? {
                        return Ok(Flow::Jump(stmt.end()));
                    }
                }
                _ => {}
            }
        }
        Err(error!(IfWithoutEndIf))
    }

    /// ELSE or ELSEIF reached from a branch that ran: continue after ENDIF.
    pub(super) fn skip_to_endif(&mut self, from: Address) -> Result<Flow> {
        let mut depth = 0usize;
        for (command, stmt) in self.statements(from) {
            match command {
                Some(Command::If) if self.is_block_if(&stmt) => depth += 1,
                Some(Command::EndIf) if depth == 0 => return Ok(Flow::Jump(stmt.end())),
                Some(Command::EndIf) => depth -= 1,
                _ => {}
            }
        }
        Err(error!(IfWithoutEndIf))
    }

    pub(super) fn select_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let value = self.evaluate(cursor, TypeSet::ANY)?;
        cursor.expect_end()?;
        let mut depth = 0usize;
        for (command, stmt) in self.statements(cursor.end()) {
            match command {
                Some(Command::SelectCase) => depth += 1,
                Some(Command::EndSelect) if depth == 0 => return Ok(Flow::Jump(stmt.end())),
                Some(Command::EndSelect) => depth -= 1,
                Some(Command::CaseElse) if depth == 0 => return Ok(Flow::Jump(stmt.end())),
                Some(Command::Case) if depth == 0 => {
                    if self.case_matches(&value, &stmt)? {
                        return Ok(Flow::Jump(stmt.end()));
                    }
                }
                _ => {}
            }
        }
        Err(error!(SelectWithoutEnd))
    }

    /// `CASE 1, 3 TO 5, IS > 9`
    fn case_matches(&mut self, value: &Val, stmt: &Cursor) -> Result<bool> {
        for mut item in stmt.split_args() {
            let hit = if item.eat_word(b"IS") {
                let op = match item.peek_token() {
                    Some(Token::Operator(op))
                        if matches!(
                            op,
                            Operator::Equal
                                | Operator::NotEqual
                                | Operator::Less
                                | Operator::LessEqual
                                | Operator::Greater
                                | Operator::GreaterEqual
                        ) =>
                    {
                        op
                    }
                    _ => return Err(error!(SyntaxError; "EXPECTED A COMPARISON")),
                };
                item.advance(1);
                let other = self.evaluate(&mut item, TypeSet::ANY)?;
                Operation::binary(op, value.clone(), other)?.is_true()?
            } else {
                let low = self.evaluate(&mut item, TypeSet::ANY)?;
                if item.eat_keyword(Keyword::To) {
                    let high = self.evaluate(&mut item, TypeSet::ANY)?;
                    Operation::binary(Operator::GreaterEqual, value.clone(), low)?.is_true()?
                        && Operation::binary(Operator::LessEqual, value.clone(), high)?.is_true()?
                } else {
                    Operation::binary(Operator::Equal, value.clone(), low)?.is_true()?
                }
            };
            item.expect_end()?;
            if hit {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// CASE reached from the end of a branch that ran.
    pub(super) fn skip_select(&mut self, from: Address) -> Result<Flow> {
        let mut depth = 0usize;
        for (command, stmt) in self.statements(from) {
            match command {
                Some(Command::SelectCase) => depth += 1,
                Some(Command::EndSelect) if depth == 0 => return Ok(Flow::Jump(stmt.end())),
                Some(Command::EndSelect) => depth -= 1,
                _ => {}
            }
        }
        Err(error!(SelectWithoutEnd))
    }

    pub(super) fn for_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let slot = self.find_var(cursor, Lookup::empty(), &Default::default())?;
        if !slot.ty.is_numeric() {
            return Err(error!(TypeMismatch; "FOR NEEDS A NUMBER"));
        }
        cursor.expect_operator(Operator::Equal)?;
        let start = self.evaluate(cursor, TypeSet::NUMBER)?;
        if !cursor.eat_keyword(Keyword::To) {
            return Err(error!(SyntaxError; "EXPECTED TO"));
        }
        let limit = self.evaluate(cursor, TypeSet::NUMBER)?;
        let step = if cursor.eat_keyword(Keyword::Step) {
            self.evaluate(cursor, TypeSet::NUMBER)?
        } else {
            Val::Integer(1)
        };
        cursor.expect_end()?;
        let level = self.level;
        if let Some(index) = self.fors.rposition(|f| f.slot == slot && f.level == level) {
            self.fors.truncate(index);
        }
        self.vars.assign(&mut self.heap, slot, start)?;
        let (next, rest) = self.seek_next(cursor.end())?;
        let value = self.vars.load(&self.heap, slot)?;
        if for_done(&value, &limit, &step)? {
            return self.leave_for(next, rest);
        }
        self.fors.push(ForFrame {
            slot,
            level,
            limit,
            step,
            body: cursor.end(),
            next,
            rest,
        })?;
        Ok(Flow::Next)
    }

    /// Terminator of the NEXT that closes a FOR, and where its names for
    /// enclosing loops start. `NEXT a, b` closes two.
    fn seek_next(&self, from: Address) -> Result<(Address, Option<Address>)> {
        let mut depth = 1usize;
        for (command, stmt) in self.statements(from) {
            match command {
                Some(Command::For) => depth += 1,
                Some(Command::Next) => {
                    let args = stmt.split_args();
                    let names = args.len().max(1);
                    if names >= depth {
                        return Ok((stmt.end(), args.get(depth).map(|arg| arg.pos())));
                    }
                    depth -= names;
                }
                _ => {}
            }
        }
        Err(error!(ForWithoutNext))
    }

    /// Continues after a loop that ended without its own NEXT running.
    /// Enclosing loops named on that NEXT still step.
    fn leave_for(&mut self, next: Address, rest: Option<Address>) -> Result<Flow> {
        let rest = match rest {
            Some(rest) => rest,
            None => return Ok(Flow::Jump(next)),
        };
        let mut names = Cursor::new(self.code.clone(), rest, next);
        match self.next_statement(&mut names)? {
            Flow::Next => Ok(Flow::Jump(next)),
            flow => Ok(flow),
        }
    }

    pub(super) fn next_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let level = self.level;
        let names = cursor.split_args();
        if names.is_empty() {
            let index = match self.fors.len().checked_sub(1) {
                Some(index) if self.fors.get(index).map_or(false, |f| f.level == level) => index,
                _ => return Err(error!(NextWithoutFor)),
            };
            return self.next_loop(index);
        }
        for mut name in names {
            let slot = self.find_var(&mut name, Lookup::empty(), &Default::default())?;
            name.expect_end()?;
            let index = self
                .fors
                .rposition(|f| f.slot == slot && f.level == level)
                .ok_or_else(|| error!(NextWithoutFor))?;
            if let Flow::Jump(body) = self.next_loop(index)? {
                return Ok(Flow::Jump(body));
            }
        }
        Ok(Flow::Next)
    }

    fn next_loop(&mut self, index: usize) -> Result<Flow> {
        self.fors.truncate(index + 1);
        let frame = match self.fors.last() {
            Some(frame) => frame.clone(),
            None => return Err(error!(NextWithoutFor)),
        };
        let current = self.vars.load(&self.heap, frame.slot)?;
        let value = Operation::binary(Operator::Plus, current, frame.step.clone())?;
        self.vars.store(&mut self.heap, frame.slot, value)?;
        let value = self.vars.load(&self.heap, frame.slot)?;
        if for_done(&value, &frame.limit, &frame.step)? {
            self.fors.pop()?;
            Ok(Flow::Next)
        } else {
            Ok(Flow::Jump(frame.body))
        }
    }

    fn seek_close(&self, from: Address, open: Command, close: Command) -> Option<Address> {
        let mut depth = 0usize;
        for (command, stmt) in self.statements(from) {
            if command == Some(open) {
                depth += 1;
            } else if command == Some(close) {
                if depth == 0 {
                    return Some(stmt.end());
                }
                depth -= 1;
            }
        }
        None
    }

    /// `WHILE cond`, `UNTIL cond` or nothing. True keeps looping.
    fn loop_condition(&mut self, cursor: &mut Cursor) -> Result<bool> {
        let run = if cursor.eat_keyword(Keyword::While) {
            self.evaluate(cursor, TypeSet::NUMBER)?.is_true()?
        } else if cursor.eat_keyword(Keyword::Until) {
            !self.evaluate(cursor, TypeSet::NUMBER)?.is_true()?
        } else {
            true
        };
        cursor.expect_end()?;
        Ok(run)
    }

    /// Existing frame for the loop starting at `start`, else a forward search.
    fn loop_exit(&mut self, cursor: &Cursor, start: Address, wend: bool) -> Result<Address> {
        let level = self.level;
        if let Some(index) = self.dos.rposition(|f| f.start == start && f.level == level) {
            let exit = self.dos.get(index).map(|f| f.exit);
            self.dos.truncate(index);
            if let Some(exit) = exit {
                return Ok(exit);
            }
        }
        if wend {
            self.seek_close(cursor.end(), Command::While, Command::Wend)
                .ok_or_else(|| error!(WhileWithoutWend))
        } else {
            self.seek_close(cursor.end(), Command::Do, Command::Loop)
                .ok_or_else(|| error!(DoWithoutLoop))
        }
    }

    pub(super) fn do_statement(&mut self, cursor: &mut Cursor, start: Address) -> Result<Flow> {
        let exit = self.loop_exit(cursor, start, false)?;
        if !self.loop_condition(cursor)? {
            return Ok(Flow::Jump(exit));
        }
        self.dos.push(DoFrame {
            start,
            exit,
            level: self.level,
            wend: false,
        })?;
        Ok(Flow::Next)
    }

    pub(super) fn while_statement(&mut self, cursor: &mut Cursor, start: Address) -> Result<Flow> {
        let exit = self.loop_exit(cursor, start, true)?;
        let run = self.evaluate(cursor, TypeSet::NUMBER)?.is_true()?;
        cursor.expect_end()?;
        if !run {
            return Ok(Flow::Jump(exit));
        }
        self.dos.push(DoFrame {
            start,
            exit,
            level: self.level,
            wend: true,
        })?;
        Ok(Flow::Next)
    }

    fn innermost_loop(&self, wend: bool) -> Option<usize> {
        let level = self.level;
        self.dos.rposition(|f| f.level == level && f.wend == wend)
    }

    pub(super) fn loop_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let index = self.innermost_loop(false).ok_or_else(|| error!(LoopWithoutDo))?;
        self.dos.truncate(index + 1);
        let frame = *self.dos.last().ok_or_else(|| error!(LoopWithoutDo))?;
        if self.loop_condition(cursor)? {
            Ok(Flow::Jump(frame.start))
        } else {
            self.dos.pop()?;
            Ok(Flow::Next)
        }
    }

    pub(super) fn wend_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        let index = self.innermost_loop(true).ok_or_else(|| error!(WendWithoutWhile))?;
        self.dos.truncate(index + 1);
        let frame = *self.dos.last().ok_or_else(|| error!(WendWithoutWhile))?;
        Ok(Flow::Jump(frame.start))
    }

    pub(super) fn exit_do(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        let index = self
            .innermost_loop(false)
            .ok_or_else(|| error!(InvalidHere; "EXIT DO OUTSIDE A LOOP"))?;
        let exit = self.dos.get(index).map(|f| f.exit);
        self.dos.truncate(index);
        exit.map(Flow::Jump)
            .ok_or_else(|| error!(InvalidHere; "EXIT DO OUTSIDE A LOOP"))
    }

    pub(super) fn exit_for(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        let level = self.level;
        let index = self
            .fors
            .rposition(|f| f.level == level)
            .ok_or_else(|| error!(InvalidHere; "EXIT FOR OUTSIDE A LOOP"))?;
        let (next, rest) = match self.fors.get(index) {
            Some(frame) => (frame.next, frame.rest),
            None => return Err(error!(InvalidHere; "EXIT FOR OUTSIDE A LOOP")),
        };
        self.fors.truncate(index);
        self.leave_for(next, rest)
    }

    pub(super) fn goto_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        self.goto_line(cursor)
    }

    pub(super) fn gosub_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let addr = self.target(cursor)?;
        cursor.expect_end()?;
        let ret = self.after(cursor);
        self.gosub(addr, ret)
    }

    fn gosub(&mut self, addr: Address, ret: Address) -> Result<Flow> {
        self.calls.push(CallFrame {
            kind: CallKind::Gosub,
            ret,
            line: self.line,
            level: self.level,
            name: None,
        })?;
        self.level += 1;
        Ok(Flow::Jump(addr))
    }

    pub(super) fn return_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        match self.calls.last() {
            Some(frame) if frame.kind == CallKind::Gosub => {}
            _ => return Err(error!(ReturnWithoutGosub)),
        }
        let frame = self.unwind()?;
        Ok(Flow::Jump(frame.ret))
    }

    pub(super) fn on_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        if cursor.eat_word(b"ERROR") {
            return self.on_error(cursor);
        }
        if cursor.eat_word(b"KEY") {
            self.interrupts.key = self.interrupt_target(cursor)?;
            cursor.expect_end()?;
            return Ok(Flow::Next);
        }
        let n = i64::try_from(self.evaluate_partial(cursor, TypeSet::INTEGER)?)?;
        let gosub = if cursor.eat_word(b"GOTO") {
            false
        } else if cursor.eat_word(b"GOSUB") {
            true
        } else {
            return Err(error!(SyntaxError; "EXPECTED GOTO OR GOSUB"));
        };
        if !(0..=255).contains(&n) {
            return Err(error!(IllegalFunctionCall; "ON INDEX OUT OF RANGE"));
        }
        let mut targets = cursor.split_args();
        let index = n as usize;
        if index == 0 || index > targets.len() {
            return Ok(Flow::Next);
        }
        let target = &mut targets[index - 1];
        let addr = self.target(target)?;
        target.expect_end()?;
        if gosub {
            let ret = self.after(cursor);
            self.gosub(addr, ret)
        } else {
            Ok(Flow::Jump(addr))
        }
    }

    fn on_error(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        if cursor.eat_word(b"ABORT") {
            self.policy = ErrorPolicy::Abort;
        } else if cursor.eat_word(b"IGNORE") {
            self.policy = ErrorPolicy::Ignore;
        } else if cursor.eat_word(b"SKIP") {
            let n = if cursor.at_end() { 1 } else { self.eval_integer(cursor)? };
            let n = usize::try_from(n).map_err(|_| error!(IllegalFunctionCall))?;
            self.policy = ErrorPolicy::Skip(n);
            self.policy_fresh = true;
        } else if cursor.eat_word(b"CLEAR") {
            self.last_error = None;
        } else {
            return Err(error!(SyntaxError; "EXPECTED ABORT, IGNORE, SKIP OR CLEAR"));
        }
        cursor.expect_end()?;
        Ok(Flow::Next)
    }

    pub(super) fn error_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        if cursor.at_end() {
            return Err(error!(UserError));
        }
        let message = self.eval_string(cursor)?;
        cursor.expect_end()?;
        Err(error!(UserError; String::from_utf8_lossy(&message).into_owned()))
    }

    /// `SETTICK period, target [, slot]`. A period of 0 stops the timer.
    pub(super) fn settick_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let mut args = cursor.split_args();
        if args.len() < 2 || args.len() > 3 {
            return Err(error!(ArgumentList));
        }
        let period = self.eval_integer(&mut args[0])?;
        let slot = match args.len() {
            3 => self.eval_integer(&mut args[2])?,
            _ => 1,
        };
        if period < 0 || !(1..=4).contains(&slot) {
            return Err(error!(IllegalFunctionCall));
        }
        let index = slot as usize - 1;
        if period == 0 {
            self.interrupts.ticks[index] = None;
            return Ok(Flow::Next);
        }
        let target = self
            .interrupt_target(&mut args[1])?
            .ok_or_else(|| error!(UndefinedLine; "0"))?;
        args[1].expect_end()?;
        let period = Duration::from_millis(period as u64);
        self.interrupts.ticks[index] = Some(Tick {
            period,
            due: Instant::now() + period,
            target,
        });
        Ok(Flow::Next)
    }

    pub(super) fn ireturn_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        match self.calls.last() {
            Some(frame) if frame.kind == CallKind::Interrupt => {}
            _ => return Err(error!(InvalidHere; "NOT IN AN INTERRUPT")),
        }
        let frame = self.unwind()?;
        Ok(Flow::Jump(frame.ret))
    }

    pub(super) fn pause_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let ms = self.eval_float(cursor)?;
        if ms < 0.0 || !ms.is_finite() {
            return Err(error!(IllegalFunctionCall));
        }
        let until = Instant::now() + Duration::from_secs_f64(ms / 1000.0);
        loop {
            self.poll_break()?;
            let now = Instant::now();
            if now >= until {
                return Ok(Flow::Next);
            }
            std::thread::sleep((until - now).min(Duration::from_millis(10)));
        }
    }

    /// END SUB and EXIT SUB; also leave a SUB entered as an interrupt.
    pub(super) fn end_sub(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        match self.calls.last() {
            Some(frame) if frame.kind == CallKind::Sub => {}
            Some(frame) if frame.kind == CallKind::Interrupt && frame.name.is_some() => {}
            _ => return Err(error!(EndWithoutCall)),
        }
        let frame = self.unwind()?;
        Ok(Flow::Jump(frame.ret))
    }

    /// The caller of a function unwinds its frame.
    pub(super) fn end_function(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        match self.calls.last() {
            Some(frame) if frame.kind == CallKind::Function => Ok(Flow::Return),
            _ => Err(error!(EndWithoutCall)),
        }
    }

    /// A definition met in normal flow is stepped over.
    pub(super) fn skip_definition(&mut self, from: Address, close: Command) -> Result<Flow> {
        for (command, stmt) in self.statements(from) {
            if command == Some(close) {
                return Ok(Flow::Jump(stmt.end()));
            }
        }
        Err(error!(SyntaxError; format!("MISSING {}", Command::name(close.bytes()[0], close.bytes()[1]))))
    }

    /// Pops the top call frame and everything that lived above it.
    pub(super) fn unwind(&mut self) -> Result<CallFrame> {
        let frame = self.calls.pop()?;
        let level = frame.level;
        self.vars.drop_level(level + 1, &mut self.heap)?;
        self.heap.clear_temps(level + 1);
        self.fors.retain(|f| f.level <= level);
        self.dos.retain(|f| f.level <= level);
        self.level = level;
        self.line = frame.line;
        trace!(kind = ?frame.kind, level, "unwind");
        Ok(frame)
    }

    pub(super) fn unwind_to(&mut self, depth: usize) -> Result<()> {
        while self.calls.len() > depth {
            self.unwind()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::Line;

    fn code(lines: &[&str]) -> Code {
        let mut bytes = vec![];
        for line in lines {
            bytes.extend_from_slice(Line::from_str(line).unwrap().image());
        }
        bytes.extend_from_slice(&[0, 0]);
        Code::new(bytes)
    }

    #[test]
    fn test_seek_else_skips_strings_and_commands() {
        let code = code(&[r#"IF A THEN PRINT "ELSE" ELSE PRINT 2"#]);
        let otherwise = keyword_byte(Keyword::Else);
        let at = seek_token(&code, 1, true, otherwise, true).unwrap();
        assert_eq!(code.at(at), otherwise);
        assert!(String::from_utf8_lossy(code.slice(0, at)).contains("\"ELSE\""));
    }

    #[test]
    fn test_seek_token_stops_at_line_end() {
        let code = code(&["IF A THEN B = 1", "ELSE"]);
        let otherwise = keyword_byte(Keyword::Else);
        assert_eq!(seek_token(&code, 1, true, otherwise, true), None);
    }

    #[test]
    fn test_seek_token_crosses_separators() {
        let code = code(&["IF A THEN B = 1 : C = 2 ELSE D = 3"]);
        let otherwise = keyword_byte(Keyword::Else);
        assert!(seek_token(&code, 1, true, otherwise, false).is_none());
        assert!(seek_token(&code, 1, true, otherwise, true).is_some());
    }

    #[test]
    fn test_for_direction() {
        let one = Val::Integer(1);
        assert!(!for_done(&Val::Integer(5), &Val::Integer(5), &one).unwrap());
        assert!(for_done(&Val::Integer(6), &Val::Integer(5), &one).unwrap());
        assert!(!for_done(&Val::Integer(1), &Val::Integer(1), &Val::Integer(-1)).unwrap());
        assert!(for_done(&Val::Float(0.5), &Val::Integer(1), &Val::Float(-0.5)).unwrap());
    }
}

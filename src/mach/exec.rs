use super::call::{CallFrame, CallKind};
use super::flow::ErrorPolicy;
use super::program::{mark, Mark};
use super::{Address, Cursor, Kind, Runtime};
use crate::error;
use crate::lang::token::{Command, ERASED, T_NEWLINE};
use crate::lang::{is_suffix, name_len, Error};
use std::time::Instant;
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, Error>;

/// What a statement asks the executor to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    Jump(Address),
    /// Abandon the rest of the physical line.
    SkipLine,
    /// Leave the innermost `execute`, ending a function body.
    Return,
}

impl Runtime {
    /// Runs statements from `from` until the program ends, an error is not
    /// recovered, or a function body returns.
    pub(super) fn execute(&mut self, from: Address) -> Result<()> {
        let mut pos = from;
        loop {
            match mark(&self.code, pos) {
                Mark::End => return Ok(()),
                Mark::Skip(next) => pos = next,
                Mark::Line(next) => {
                    self.line = pos;
                    self.skip_else = None;
                    if self.trace && !self.is_direct(pos) {
                        if let Some(number) = self.line_number() {
                            self.print(&format!("[{}]", number));
                        }
                    }
                    pos = next;
                }
                Mark::Statement(end) => {
                    if let Err(error) = self.poll_break() {
                        return Err(self.locate(error));
                    }
                    let mut cursor = Cursor::new(self.code.clone(), pos, end);
                    let pending = self.skip_else.take();
                    let clipped = match pending {
                        Some(at) if at >= pos && at < end => {
                            cursor.set_end(at);
                            true
                        }
                        _ => false,
                    };
                    let result = self.statement(&mut cursor, pos);
                    self.heap.clear_temps(self.level);
                    let flow = match result {
                        Ok(flow) => flow,
                        Err(error) => self.recover(error, end)?,
                    };
                    self.count_statement();
                    let next = match flow {
                        Flow::Next if clipped => self.skip_line(end),
                        Flow::Next => {
                            if self.skip_else.is_none() {
                                self.skip_else = pending;
                            }
                            end
                        }
                        Flow::Jump(addr) => {
                            self.follow(addr);
                            addr
                        }
                        Flow::SkipLine => self.skip_line(end),
                        Flow::Return => return Ok(()),
                    };
                    pos = match self.interrupt(next)? {
                        Some(addr) => addr,
                        None => next,
                    };
                }
            }
        }
    }

    /// Loop-backs and exits land mid-line, past the header that sets `line`.
    fn follow(&mut self, addr: Address) {
        self.line = if self.is_direct(addr) {
            self.direct
        } else {
            self.link.line_start(addr).unwrap_or(self.line)
        };
    }

    pub(super) fn locate(&self, error: Error) -> Error {
        match self.location() {
            Some(location) => error.in_location(location),
            None => error,
        }
    }

    /// Applies the ON ERROR policy. Recovered errors continue after the
    /// failing statement and are remembered for MM.ERRNO.
    fn recover(&mut self, error: Error, end: Address) -> Result<Flow> {
        let error = self.locate(error).resume_at(end);
        if error.is_unwind() {
            return Err(error);
        }
        self.last_error = Some(error.clone());
        match self.policy {
            ErrorPolicy::Abort => Err(error),
            ErrorPolicy::Ignore | ErrorPolicy::Skip(_) => {
                debug!(%error, "error ignored");
                Ok(Flow::Jump(end))
            }
        }
    }

    fn count_statement(&mut self) {
        if self.policy_fresh {
            self.policy_fresh = false;
        } else if let ErrorPolicy::Skip(n) = self.policy {
            self.policy = if n <= 1 {
                ErrorPolicy::Abort
            } else {
                ErrorPolicy::Skip(n - 1)
            };
        }
    }

    /// Enters a due SETTICK or ON KEY handler. None nest, and nothing
    /// interrupts the direct line or a THEN part in progress.
    fn interrupt(&mut self, resume: Address) -> Result<Option<Address>> {
        if self.is_direct(resume)
            || self.skip_else.is_some()
            || self.calls.iter().any(|frame| frame.kind == CallKind::Interrupt)
        {
            return Ok(None);
        }
        let now = Instant::now();
        let mut fired = None;
        for tick in self.interrupts.ticks.iter_mut().flatten() {
            if now >= tick.due {
                tick.due = now + tick.period;
                fired = Some(tick.target.clone());
                break;
            }
        }
        if fired.is_none() && self.pending_key.is_none() {
            if let Some(target) = self.interrupts.key.clone() {
                if let Some(key) = self.console.read_key() {
                    self.pending_key = Some(key);
                    fired = Some(target);
                }
            }
        }
        let target = match fired {
            Some(target) => target,
            None => return Ok(None),
        };
        trace!(addr = target.addr, "interrupt");
        self.calls.push(CallFrame {
            kind: CallKind::Interrupt,
            ret: resume,
            line: self.line,
            level: self.level,
            name: target.sub,
        })?;
        self.level += 1;
        self.line = target.line;
        Ok(Some(target.addr))
    }

    /// Where a statement returns to: the next statement, or the next line
    /// when a THEN part cut the statement short.
    pub(super) fn after(&self, cursor: &Cursor) -> Address {
        if self.code.at(cursor.end()) == 0 {
            cursor.end()
        } else {
            self.skip_line(cursor.end())
        }
    }

    /// Terminator of the last element on the line holding `pos`.
    pub(super) fn skip_line(&self, mut pos: Address) -> Address {
        loop {
            pos = self.code.element_end(pos);
            if matches!(self.code.at(pos + 1), T_NEWLINE | 0 | ERASED) || pos >= self.code.len() {
                return pos;
            }
            pos += 1;
        }
    }

    fn statement(&mut self, cursor: &mut Cursor, start: Address) -> Result<Flow> {
        cursor.skip_spaces();
        let command = match self.code.command(cursor.pos()) {
            Some(command) => command,
            None => return self.sub_statement(cursor),
        };
        cursor.advance(2);
        let end = cursor.end();
        match command {
            Command::ImpliedLet | Command::Let => self.let_statement(cursor),
            Command::Print => self.print_statement(cursor),
            Command::Rem | Command::Data | Command::EndCsub => Ok(Flow::Next),
            Command::Dim => self.dim_statement(cursor, false),
            Command::Local => self.dim_statement(cursor, true),
            Command::Static => self.static_statement(cursor),
            Command::Const => self.const_statement(cursor),
            Command::If => self.if_statement(cursor),
            Command::Else | Command::ElseIf => self.skip_to_endif(end),
            Command::EndIf | Command::EndSelect => {
                cursor.expect_end()?;
                Ok(Flow::Next)
            }
            Command::For => self.for_statement(cursor),
            Command::Next => self.next_statement(cursor),
            Command::Do => self.do_statement(cursor, start),
            Command::Loop => self.loop_statement(cursor),
            Command::While => self.while_statement(cursor, start),
            Command::Wend => self.wend_statement(cursor),
            Command::ExitFor => self.exit_for(cursor),
            Command::ExitDo => self.exit_do(cursor),
            Command::ExitSub | Command::EndSub => self.end_sub(cursor),
            Command::ExitFunction | Command::EndFunction => self.end_function(cursor),
            Command::Goto => self.goto_statement(cursor),
            Command::Gosub => self.gosub_statement(cursor),
            Command::Return => self.return_statement(cursor),
            Command::Sub => self.skip_definition(end, Command::EndSub),
            Command::Function => self.skip_definition(end, Command::EndFunction),
            Command::Csub => self.skip_definition(end, Command::EndCsub),
            Command::Call => self.call_statement(cursor),
            Command::End => {
                cursor.expect_end()?;
                Err(error!(Halt))
            }
            Command::On => self.on_statement(cursor),
            Command::Error => self.error_statement(cursor),
            Command::Option => self.option_statement(cursor),
            Command::Erase => self.erase_statement(cursor),
            Command::Clear => self.clear_statement(cursor),
            Command::Inc => self.inc_statement(cursor),
            Command::Read => self.read_statement(cursor),
            Command::Restore => self.restore_statement(cursor),
            Command::SetTick => self.settick_statement(cursor),
            Command::IReturn => self.ireturn_statement(cursor),
            Command::Trace => self.trace_statement(cursor),
            Command::Run => self.run_statement(cursor),
            Command::New => self.new_statement(cursor),
            Command::List => self.list_statement(cursor),
            Command::Input => self.input_statement(cursor),
            Command::LineInput => self.line_input_statement(cursor),
            Command::SelectCase => self.select_statement(cursor),
            Command::Case | Command::CaseElse => self.skip_select(end),
            Command::Pause => self.pause_statement(cursor),
            Command::Randomize => self.randomize_statement(cursor),
        }
    }

    /// A statement without a command word names a SUB. Parentheses around
    /// the whole argument list are optional.
    fn sub_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        if cursor.at_end() {
            return Ok(Flow::Next);
        }
        let len = name_len(cursor.rest());
        if len == 0 {
            return Err(error!(SyntaxError; "UNKNOWN STATEMENT"));
        }
        let name = String::from_utf8_lossy(&cursor.rest()[..len]).to_ascii_uppercase();
        let link = self.link.clone();
        let def = match link.get(&name) {
            Some(def) if def.kind != Kind::Label => def,
            _ => return Err(error!(UnknownCommand; name)),
        };
        cursor.advance(len);
        if is_suffix(cursor.peek()) {
            cursor.advance(1);
        }
        cursor.skip_spaces();
        let mut list = cursor.clone();
        if list.peek() == b'(' {
            let mut inner = list.clone();
            inner.advance(1);
            let close = inner.closing_paren()?;
            if list.range(close + 1, list.end()).at_end() {
                list = list.range(list.pos() + 1, close);
            }
        }
        let args = list.split_args();
        if def.kind == Kind::Function {
            self.call(def, Kind::Function, args, cursor.end())?;
            return Ok(Flow::Next);
        }
        self.invoke(def, args, cursor)
    }
}

use super::call::{CallFrame, ForeignCode, Refuse};
use super::flow::{DoFrame, ErrorPolicy, ForFrame, Interrupts};
use super::link::header_number;
use super::{Address, Code, Console, Heap, Link, Options, Program, Recorder, Stack, Val, VarTable};
use crate::lang::{Error, Line, Location, Type};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

type Result<T> = std::result::Result<T, Error>;

/// ## Interpreter state
///
/// Everything one interpreter owns. Statement handlers in the sibling
/// modules are `impl Runtime` blocks working on this state.
pub struct Runtime {
    pub(super) options: Options,
    initial: Options,
    pub(super) heap: Heap,
    pub(super) vars: VarTable,
    pub(super) program: Program,
    pub(super) code: Code,
    pub(super) link: Rc<Link>,
    /// Start of the direct line inside `code`; everything before it is program.
    pub(super) direct: Address,
    /// Start of the line holding the running statement.
    pub(super) line: Address,
    pub(super) level: usize,
    /// Expressions being evaluated right now.
    pub(super) nesting: usize,
    pub(super) fors: Stack<ForFrame>,
    pub(super) dos: Stack<DoFrame>,
    pub(super) calls: Stack<CallFrame>,
    pub(super) console: Box<dyn Console>,
    pub(super) foreign: Box<dyn ForeignCode>,
    pub(super) policy: ErrorPolicy,
    /// Set by `ON ERROR` so the statement that installs a policy doesn't count against it.
    pub(super) policy_fresh: bool,
    pub(super) last_error: Option<Error>,
    /// Remaining items of the DATA statement being read.
    pub(super) data: Option<(Address, Address)>,
    /// Where the next DATA search begins.
    pub(super) data_from: Address,
    pub(super) interrupts: Interrupts,
    pub(super) pending_key: Option<char>,
    pub(super) skip_else: Option<Address>,
    pub(super) trace: bool,
    pub(super) column: usize,
    pub(super) rng: StdRng,
    pub(super) started: Instant,
    break_flag: Arc<AtomicBool>,
}

impl Default for Runtime {
    fn default() -> Runtime {
        Runtime::with_options(Options::default())
    }
}

impl Runtime {
    pub fn new<C: Console + 'static>(console: C) -> Runtime {
        Runtime::default().with_console(console)
    }

    pub fn with_options(options: Options) -> Runtime {
        Runtime {
            heap: Heap::new(options.heap_pages),
            fors: Stack::new("TOO MANY NESTED FOR LOOPS", options.for_depth),
            dos: Stack::new("TOO MANY NESTED DO OR WHILE LOOPS", options.do_depth),
            calls: Stack::new("TOO MANY NESTED GOSUBS OR CALLS", options.gosub_depth),
            initial: options.clone(),
            options,
            vars: VarTable::new(),
            program: Program::new(),
            code: Code::default(),
            link: Rc::new(Link::new()),
            direct: 0,
            line: 0,
            level: 0,
            nesting: 0,
            console: Box::new(Recorder::new()),
            foreign: Box::new(Refuse),
            policy: ErrorPolicy::Abort,
            policy_fresh: false,
            last_error: None,
            data: None,
            data_from: 0,
            interrupts: Interrupts::default(),
            pending_key: None,
            skip_else: None,
            trace: false,
            column: 0,
            rng: StdRng::from_entropy(),
            started: Instant::now(),
            break_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_console<C: Console + 'static>(mut self, console: C) -> Runtime {
        self.console = Box::new(console);
        self
    }

    pub fn with_foreign_code<F: ForeignCode + 'static>(mut self, foreign: F) -> Runtime {
        self.foreign = Box::new(foreign);
        self
    }

    /// Setting the flag stops the running program at the next statement.
    pub fn break_flag(&self) -> Arc<AtomicBool> {
        self.break_flag.clone()
    }

    pub(super) fn poll_break(&self) -> Result<()> {
        if self.break_flag.swap(false, Ordering::SeqCst) {
            Err(crate::error!(Break))
        } else {
            Ok(())
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Numbered lines are stored, anything else runs immediately.
    /// `END` is a normal finish; other errors come back for the caller to show.
    pub fn enter(&mut self, text: &str) -> Result<()> {
        let line = Line::from_str(text)?;
        if !line.is_direct() {
            self.program.insert(line);
            return Ok(());
        }
        if line.is_empty() {
            return Ok(());
        }
        let (code, link) = self.program.image()?;
        let mut bytes = code.bytes().to_vec();
        self.direct = bytes.len();
        bytes.extend_from_slice(line.image());
        bytes.extend_from_slice(&[0, 0]);
        self.code = Code::new(bytes);
        self.link = link;
        self.line = self.direct;
        let result = self.execute(self.direct);
        self.reset_stacks();
        match result {
            Err(error) if error.is_halt() => Ok(()),
            result => result,
        }
    }

    /// Replaces the program with `text`, one source line per line.
    pub fn load(&mut self, text: &str) -> Result<()> {
        self.new_program();
        for (index, source) in text.lines().enumerate() {
            let line = Line::from_str(source).map_err(|e| e.in_location(Location::Ordinal(index + 1)))?;
            match line.number() {
                Some(_) => self.program.insert(line),
                None if line.is_empty() => {}
                None => self.program.push(line),
            }
        }
        debug!(lines = self.program.lines().len(), "program loaded");
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        self.enter("RUN")
    }

    /// Value of a global scalar, looked up the way a program would.
    pub fn variable(&self, name: &str) -> Option<Val> {
        let name = name.to_ascii_uppercase();
        let bare = name.trim_end_matches(|c| c == '$' || c == '%' || c == '!');
        let id = self.vars.find(bare, 0)?;
        let slot = self.vars.slot(id, None).ok()?;
        self.vars.load(&self.heap, slot).ok()
    }

    pub fn var_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .vars
            .iter()
            .filter(|(_, e)| !e.name.contains(super::lookup::STATIC_SEPARATOR))
            .map(|(_, e)| e.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub(super) fn is_direct(&self, addr: Address) -> bool {
        addr >= self.direct
    }

    /// Where an error on the current line is reported.
    pub(super) fn location(&self) -> Option<Location> {
        if self.is_direct(self.line) {
            None
        } else {
            Some(self.link.location(&self.code, self.line))
        }
    }

    pub(super) fn line_number(&self) -> Option<u16> {
        header_number(&self.code, self.line)
    }

    pub(super) fn default_type(&self) -> Option<Type> {
        self.options.default_type
    }

    /// Drops every call level back to the prompt. Globals survive.
    pub(super) fn reset_stacks(&mut self) {
        if self.vars.drop_level(1, &mut self.heap).is_err() {
            tracing::warn!("local variables already released");
        }
        self.heap.clear_temps(0);
        self.fors.clear();
        self.dos.clear();
        self.calls.clear();
        self.level = 0;
        self.skip_else = None;
    }

    /// Forgets variables and run state, keeping the program.
    pub(super) fn clear_state(&mut self) {
        self.reset_stacks();
        if self.vars.clear(&mut self.heap).is_err() {
            tracing::warn!("variables already released");
        }
        self.heap.reset();
        self.options = self.initial.clone();
        self.policy = ErrorPolicy::Abort;
        self.policy_fresh = false;
        self.last_error = None;
        self.data = None;
        self.data_from = 0;
        self.interrupts = Interrupts::default();
        self.pending_key = None;
    }

    pub(super) fn new_program(&mut self) {
        self.clear_state();
        self.program.clear();
        self.code = Code::default();
        self.link = Rc::new(Link::new());
        self.direct = 0;
        self.line = 0;
        self.trace = false;
    }

    /// Console output with column tracking for PRINT's comma zones.
    pub(super) fn print(&mut self, s: &str) {
        match s.rfind('\n') {
            Some(index) => self.column = s.len() - index - 1,
            None => self.column += s.len(),
        }
        self.console.write_str(s);
    }
}

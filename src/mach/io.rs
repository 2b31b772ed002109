use super::eval::{number_text, trim};
use super::exec::Flow;
use super::{Address, Code, Cursor, Lookup, Runtime, Slot, Val, MAX_STRING};
use crate::error;
use crate::lang::token::Command;
use crate::lang::{Error, Type, TypeSet};
use rand::rngs::StdRng;
use rand::SeedableRng;

type Result<T> = std::result::Result<T, Error>;

const ZONE: usize = 8;

/// Splits an INPUT reply at commas outside quotes. Quotes around a field
/// are removed.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = vec![];
    let mut field = String::new();
    let mut quoted = false;
    for ch in line.chars() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

/// One DATA item starting at `pos` and where the next one starts, if any.
fn data_item(code: &Code, mut pos: Address, end: Address) -> (Vec<u8>, Option<Address>) {
    while pos < end && code.at(pos) == b' ' {
        pos += 1;
    }
    let mut item = vec![];
    let mut quoted = false;
    while pos < end {
        match code.at(pos) {
            b'"' => quoted = !quoted,
            b',' if !quoted => return (trim(&item).to_vec(), Some(pos + 1)),
            b'\'' | 0 if !quoted => break,
            ch => item.push(ch),
        }
        pos += 1;
    }
    (trim(&item).to_vec(), None)
}

impl Runtime {
    pub(super) fn print_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let mut newline = true;
        while !cursor.at_end() {
            if cursor.eat(b';') {
                newline = false;
            } else if cursor.eat(b',') {
                let pad = ZONE - self.column % ZONE;
                self.print(&" ".repeat(pad));
                newline = false;
            } else {
                let val = self.evaluate_partial(cursor, TypeSet::ANY)?;
                self.print(&val.text());
                newline = true;
            }
        }
        if newline {
            self.print("\n");
        }
        Ok(Flow::Next)
    }

    /// A leading `"text";` or `"text",`. INPUT adds `? ` after a semicolon.
    fn prompt(&mut self, cursor: &mut Cursor, question: bool) -> Result<Option<String>> {
        cursor.skip_spaces();
        if cursor.peek() != b'"' {
            return Ok(None);
        }
        let text = self.getvalue(cursor)?.text();
        if cursor.eat(b';') {
            Ok(Some(if question { text + "? " } else { text }))
        } else if cursor.eat(b',') {
            Ok(Some(text))
        } else {
            Err(error!(SyntaxError; "EXPECTED ; OR ,"))
        }
    }

    fn read_input(&mut self) -> Result<String> {
        self.poll_break()?;
        let line = self.console.read_line().unwrap_or_default();
        self.column = 0;
        self.poll_break()?;
        Ok(line)
    }

    fn input_value(&self, slot: Slot, text: &str) -> Result<Val> {
        if slot.ty == Type::String {
            let limit = self.vars.entry(slot.var)?.str_len.min(MAX_STRING);
            let mut bytes = text.as_bytes().to_vec();
            bytes.truncate(limit);
            Ok(Val::String(bytes))
        } else {
            number_text(text.as_bytes())
        }
    }

    /// Fields missing from the reply leave their variables alone.
    pub(super) fn input_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let prompt = self.prompt(cursor, true)?.unwrap_or_else(|| "? ".to_string());
        let targets = cursor.split_args();
        if targets.is_empty() {
            return Err(error!(SyntaxError; "EXPECTED A VARIABLE"));
        }
        let mut slots = Vec::with_capacity(targets.len());
        for mut target in targets {
            slots.push(self.find_var(&mut target, Lookup::empty(), &Default::default())?);
            target.expect_end()?;
        }
        self.print(&prompt);
        let line = self.read_input()?;
        for (slot, field) in slots.into_iter().zip(split_fields(&line)) {
            let val = self.input_value(slot, &field)?;
            self.vars.assign(&mut self.heap, slot, val)?;
        }
        Ok(Flow::Next)
    }

    pub(super) fn line_input_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let prompt = self.prompt(cursor, false)?;
        let slot = self.find_var(cursor, Lookup::empty(), &Default::default())?;
        cursor.expect_end()?;
        if slot.ty != Type::String {
            return Err(error!(TypeMismatch; "LINE INPUT NEEDS A STRING"));
        }
        if let Some(prompt) = prompt {
            self.print(&prompt);
        }
        let line = self.read_input()?;
        let val = self.input_value(slot, &line)?;
        self.vars.assign(&mut self.heap, slot, val)?;
        Ok(Flow::Next)
    }

    pub(super) fn read_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        let targets = cursor.split_args();
        if targets.is_empty() {
            return Err(error!(SyntaxError; "EXPECTED A VARIABLE"));
        }
        for mut target in targets {
            let slot = self.find_var(&mut target, Lookup::empty(), &Default::default())?;
            target.expect_end()?;
            let item = self.next_data()?;
            let val = match slot.ty {
                Type::String => Val::String(item),
                _ => number_text(&item)?,
            };
            self.vars.assign(&mut self.heap, slot, val)?;
        }
        Ok(Flow::Next)
    }

    fn next_data(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some((pos, end)) = self.data {
                let (item, next) = data_item(&self.code, pos, end);
                self.data = next.map(|next| (next, end));
                return Ok(item);
            }
            let found = self
                .statements(self.data_from)
                .find(|(command, stmt)| *command == Some(Command::Data) && !self.is_direct(stmt.pos()));
            let mut stmt = match found {
                Some((_, stmt)) => stmt,
                None => return Err(error!(OutOfData)),
            };
            self.data_from = stmt.end();
            if !stmt.at_end() {
                self.data = Some((stmt.pos(), stmt.end()));
            }
        }
    }

    pub(super) fn restore_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        self.data_from = if cursor.at_end() {
            0
        } else {
            let addr = self.target(cursor)?;
            cursor.expect_end()?;
            addr
        };
        self.data = None;
        Ok(Flow::Next)
    }

    pub(super) fn list_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        let listing: Vec<String> = self.program.lines().iter().map(|line| line.to_string()).collect();
        for line in listing {
            self.print(&line);
            self.print("\n");
        }
        Ok(Flow::Next)
    }

    pub(super) fn randomize_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        self.rng = if cursor.at_end() {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(self.eval_integer(cursor)? as u64)
        };
        Ok(Flow::Next)
    }

    pub(super) fn run_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        self.clear_state();
        Ok(Flow::Jump(0))
    }

    pub(super) fn new_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        cursor.expect_end()?;
        self.new_program();
        Err(error!(Halt))
    }

    pub(super) fn trace_statement(&mut self, cursor: &mut Cursor) -> Result<Flow> {
        self.trace = if cursor.eat_word(b"ON") {
            true
        } else if cursor.eat_word(b"OFF") {
            false
        } else {
            return Err(error!(SyntaxError; "EXPECTED ON OR OFF"));
        };
        cursor.expect_end()?;
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;
    use crate::mach::Recorder;

    #[test]
    fn test_split_fields() {
        assert_eq!(split_fields(" 1, \"a,b\" ,x"), vec!["1", "a,b", "x"]);
        assert_eq!(split_fields(""), vec![""]);
    }

    #[test]
    fn test_data_item() {
        let code = Code::new(b" \"A, B\" , 12 ' note".to_vec());
        let (item, next) = data_item(&code, 0, code.len());
        assert_eq!(item, b"A, B");
        let (item, next) = data_item(&code, next.unwrap(), code.len());
        assert_eq!(item, b"12");
        assert_eq!(next, None);
    }

    #[test]
    fn test_print_zones() {
        let console = Recorder::new();
        let mut runtime = Runtime::new(console.clone());
        runtime.enter("PRINT 1, 22; \"X\";").unwrap();
        runtime.enter("PRINT").unwrap();
        assert_eq!(console.output(), "1       22X\n");
    }

    #[test]
    fn test_input_prompt_and_fields() {
        let console = Recorder::new();
        console.push_line("3, HELLO");
        let mut runtime = Runtime::new(console.clone());
        runtime.enter("INPUT \"VALUES\"; A, B$, C").unwrap();
        assert_eq!(console.output(), "VALUES? 3, HELLO\n");
        assert_eq!(runtime.variable("A"), Some(Val::Float(3.0)));
        assert_eq!(runtime.variable("B$"), Some(Val::String(b"HELLO".to_vec())));
        assert_eq!(runtime.variable("C"), Some(Val::Float(0.0)));
    }

    #[test]
    fn test_out_of_data() {
        let mut runtime = Runtime::new(Recorder::new());
        runtime.load("DATA 1\nREAD A, B\n").unwrap();
        let err = runtime.run().unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfData);
        assert_eq!(runtime.variable("A"), Some(Val::Float(1.0)));
    }
}

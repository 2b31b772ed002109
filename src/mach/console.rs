use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Where PRINT goes and INPUT comes from.
pub trait Console {
    fn write_str(&mut self, s: &str);
    /// Blocks for one line of input without its newline. `None` at end of input.
    fn read_line(&mut self) -> Option<String>;
    /// Returns immediately with a pending key press, if any.
    fn read_key(&mut self) -> Option<char>;
}

#[derive(Debug, Default)]
struct Tape {
    output: String,
    lines: VecDeque<String>,
    keys: VecDeque<char>,
}

/// In-memory console. Clones share the same tape, so a copy kept outside
/// the runtime sees everything written to it.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    tape: Rc<RefCell<Tape>>,
}

impl Recorder {
    pub fn new() -> Recorder {
        Recorder::default()
    }

    pub fn output(&self) -> String {
        self.tape.borrow().output.clone()
    }

    pub fn take_output(&self) -> String {
        std::mem::take(&mut self.tape.borrow_mut().output)
    }

    pub fn push_line(&self, line: &str) {
        self.tape.borrow_mut().lines.push_back(line.to_string());
    }

    pub fn push_key(&self, key: char) {
        self.tape.borrow_mut().keys.push_back(key);
    }
}

impl Console for Recorder {
    fn write_str(&mut self, s: &str) {
        self.tape.borrow_mut().output.push_str(s);
    }

    fn read_line(&mut self) -> Option<String> {
        let line = self.tape.borrow_mut().lines.pop_front()?;
        let mut tape = self.tape.borrow_mut();
        tape.output.push_str(&line);
        tape.output.push('\n');
        Some(line)
    }

    fn read_key(&mut self) -> Option<char> {
        self.tape.borrow_mut().keys.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_tape() {
        let recorder = Recorder::new();
        let mut console: Box<dyn Console> = Box::new(recorder.clone());
        console.write_str("hello");
        recorder.push_line("42");
        assert_eq!(console.read_line().as_deref(), Some("42"));
        assert_eq!(recorder.take_output(), "hello42\n");
        assert_eq!(recorder.output(), "");
    }
}

use super::{Address, Code, Link};
use crate::lang::token::{ERASED, T_NEWLINE};
use crate::lang::{skip_header, Error, Line};
use std::rc::Rc;
use tracing::debug;

type Result<T> = std::result::Result<T, Error>;

/// What the byte at an address starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    End,
    /// A line header; statements begin at the address given.
    Line(Address),
    /// An element terminator; the next element begins at the address given.
    Skip(Address),
    /// A statement ending at the terminator given.
    Statement(Address),
}

pub fn mark(code: &Code, pos: Address) -> Mark {
    match code.at(pos) {
        0 => {
            if code.at(pos + 1) == 0 {
                Mark::End
            } else {
                Mark::Skip(pos + 1)
            }
        }
        ERASED => Mark::End,
        T_NEWLINE => Mark::Line(skip_header(code.bytes(), pos)),
        _ => Mark::Statement(code.element_end(pos)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Line(Address),
    Statement { start: Address, end: Address },
}

/// Visits lines and statements from an address to the end of the program.
pub struct Walker {
    code: Code,
    pos: Address,
}

impl Walker {
    pub fn new(code: Code, pos: Address) -> Walker {
        Walker { code, pos }
    }
}

impl Iterator for Walker {
    type Item = Walk;

    fn next(&mut self) -> Option<Walk> {
        loop {
            match mark(&self.code, self.pos) {
                Mark::End => return None,
                Mark::Skip(next) => self.pos = next,
                Mark::Line(next) => {
                    let line = self.pos;
                    self.pos = next;
                    return Some(Walk::Line(line));
                }
                Mark::Statement(end) => {
                    let start = self.pos;
                    self.pos = end;
                    return Some(Walk::Statement { start, end });
                }
            }
        }
    }
}

/// ## Program source
///
/// Tokenized lines in program order. The image handed to the executor and
/// the link table over it are rebuilt only after the lines change.
#[derive(Debug, Default)]
pub struct Program {
    lines: Vec<Line>,
    image: Option<(Code, Rc<Link>)>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.image = None;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Adds, replaces or (when it has no statements) deletes a numbered line.
    pub fn insert(&mut self, line: Line) {
        self.image = None;
        let number = match line.number() {
            Some(number) => number,
            None => return self.push(line),
        };
        let found = self
            .lines
            .iter()
            .position(|l| l.number().map_or(false, |n| n >= number));
        match found {
            Some(index) if self.lines[index].number() == Some(number) => {
                if line.is_empty() {
                    self.lines.remove(index);
                } else {
                    self.lines[index] = line;
                }
            }
            _ if line.is_empty() => {}
            Some(index) => self.lines.insert(index, line),
            None => self.lines.push(line),
        }
    }

    pub fn push(&mut self, line: Line) {
        self.image = None;
        self.lines.push(line);
    }

    pub fn image(&mut self) -> Result<(Code, Rc<Link>)> {
        if let Some((code, link)) = &self.image {
            return Ok((code.clone(), link.clone()));
        }
        let mut bytes = vec![];
        for line in &self.lines {
            bytes.extend_from_slice(line.image());
        }
        bytes.extend_from_slice(&[0, 0]);
        let code = Code::new(bytes);
        let link = Rc::new(Link::build(&code)?);
        debug!(lines = self.lines.len(), bytes = code.len(), "program prepared");
        self.image = Some((code.clone(), link.clone()));
        Ok((code, link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Line {
        Line::from_str(s).unwrap()
    }

    #[test]
    fn test_insert_orders_and_deletes() {
        let mut program = Program::new();
        program.insert(line("20 print 2"));
        program.insert(line("10 print 1"));
        program.insert(line("30 print 3"));
        program.insert(line("20"));
        let numbers: Vec<_> = program.lines().iter().map(|l| l.number()).collect();
        assert_eq!(numbers, vec![Some(10), Some(30)]);
        program.insert(line("10 end"));
        assert_eq!(program.lines()[0].to_string(), "10 END");
    }

    #[test]
    fn test_walker_visits_lines_and_statements() {
        let mut program = Program::new();
        program.push(line("a=1:b=2"));
        program.push(line("here:"));
        program.push(line("print a"));
        let (code, _) = program.image().unwrap();
        let walk: Vec<_> = Walker::new(code.clone(), 0).collect();
        let lines = walk.iter().filter(|w| matches!(w, Walk::Line(_))).count();
        let statements = walk.len() - lines;
        assert_eq!(lines, 3);
        assert_eq!(statements, 3);
        assert_eq!(code.at(code.len() - 1), 0);
        assert_eq!(code.at(code.len() - 2), 0);
    }
}

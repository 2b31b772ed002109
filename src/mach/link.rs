use super::program::{Walk, Walker};
use super::{Address, Code, Cursor};
use crate::error;
use crate::lang::token::{Command, T_LABEL, T_LINENBR};
use crate::lang::{is_suffix, name_len, Error, LineNumber, Location, Type};
use std::collections::{BTreeMap, HashMap};

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Label,
    Sub,
    Function,
    Csub,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub kind: Kind,
    /// Type pinned by a suffix on the name.
    pub ty: Option<Type>,
    /// Start of the defining line.
    pub line: Address,
    /// First byte after the name, where a parameter list would start.
    pub params: Address,
    /// Terminator of the defining element; the body follows it.
    pub body: Address,
}

/// ## Name and line number linking
///
/// Built by one forward scan over a program image and discarded with it.
#[derive(Debug, Default)]
pub struct Link {
    definitions: HashMap<String, Definition>,
    lines: BTreeMap<LineNumber, Address>,
    starts: Vec<Address>,
}

impl Link {
    pub fn new() -> Link {
        Link::default()
    }

    pub fn build(code: &Code) -> Result<Link> {
        let mut link = Link::new();
        let mut line = 0;
        for walk in Walker::new(code.clone(), 0) {
            match walk {
                Walk::Line(addr) => {
                    line = addr;
                    link.starts.push(addr);
                    if let Some(number) = header_number(code, addr) {
                        link.lines.insert(number, addr);
                    }
                    if let Some(name) = header_label(code, addr) {
                        let def = Definition {
                            name,
                            kind: Kind::Label,
                            ty: None,
                            line: addr,
                            params: addr,
                            body: addr,
                        };
                        link.define(code, def)?;
                    }
                }
                Walk::Statement { start, end } => {
                    let mut cursor = Cursor::new(code.clone(), start, end);
                    cursor.skip_spaces();
                    let kind = match code.command(cursor.pos()) {
                        Some(Command::Sub) => Kind::Sub,
                        Some(Command::Function) => Kind::Function,
                        Some(Command::Csub) => Kind::Csub,
                        _ => continue,
                    };
                    cursor.advance(2);
                    cursor.skip_spaces();
                    let len = name_len(cursor.rest());
                    if len == 0 {
                        let error = error!(SyntaxError; "MISSING NAME");
                        return Err(error.in_location(link.location(code, line)));
                    }
                    let name = String::from_utf8_lossy(&cursor.rest()[..len]).into_owned();
                    cursor.advance(len);
                    let ty = match cursor.peek() {
                        ch if is_suffix(ch) => {
                            cursor.advance(1);
                            Type::from_suffix(ch)
                        }
                        _ => None,
                    };
                    let def = Definition {
                        name,
                        kind,
                        ty,
                        line,
                        params: cursor.pos(),
                        body: end,
                    };
                    link.define(code, def)?;
                }
            }
        }
        Ok(link)
    }

    fn define(&mut self, code: &Code, def: Definition) -> Result<()> {
        if self.definitions.contains_key(&def.name) {
            let error = error!(AlreadyDeclared; def.name.clone());
            return Err(error.in_location(self.location(code, def.line)));
        }
        self.definitions.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn line(&self, number: LineNumber) -> Option<Address> {
        self.lines.get(&number).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// One based position of the line starting at `addr`.
    pub fn ordinal(&self, addr: Address) -> usize {
        match self.starts.binary_search(&addr) {
            Ok(index) => index + 1,
            Err(index) => index,
        }
    }

    /// Start of the program line holding `addr`.
    pub fn line_start(&self, addr: Address) -> Option<Address> {
        match self.starts.binary_search(&addr) {
            Ok(index) => self.starts.get(index).copied(),
            Err(0) => None,
            Err(index) => self.starts.get(index - 1).copied(),
        }
    }

    /// How an error on the line starting at `addr` is reported.
    pub fn location(&self, code: &Code, addr: Address) -> Location {
        if let Some(number) = header_number(code, addr) {
            Location::Line(number)
        } else if let Some(label) = header_label(code, addr) {
            Location::Label(label)
        } else {
            Location::Ordinal(self.ordinal(addr))
        }
    }
}

pub fn header_number(code: &Code, addr: Address) -> Option<LineNumber> {
    if code.at(addr + 1) == T_LINENBR {
        Some(u16::from_be_bytes([code.at(addr + 2), code.at(addr + 3)]))
    } else {
        None
    }
}

pub fn header_label(code: &Code, addr: Address) -> Option<String> {
    let mut pos = addr + 1;
    if code.at(pos) == T_LINENBR {
        pos += 3;
    }
    if code.at(pos) != T_LABEL {
        return None;
    }
    let len = code.at(pos + 1) as usize;
    Some(String::from_utf8_lossy(code.slice(pos + 2, pos + 2 + len)).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mach::Program;
    use crate::lang::Line;

    fn build(lines: &[&str]) -> Result<(Code, std::rc::Rc<Link>)> {
        let mut program = Program::new();
        for line in lines {
            program.push(Line::from_str(line).unwrap());
        }
        program.image()
    }

    #[test]
    fn test_definitions() {
        let (_, link) = build(&["10 print 1", "sub hello(a)", "end sub", "function f$(x)", "top:"]).unwrap();
        assert_eq!(link.get("HELLO").map(|d| d.kind), Some(Kind::Sub));
        let f = link.get("F").unwrap();
        assert_eq!(f.kind, Kind::Function);
        assert_eq!(f.ty, Some(Type::String));
        assert_eq!(link.get("TOP").map(|d| d.kind), Some(Kind::Label));
        assert!(link.line(10).is_some());
        assert!(link.line(20).is_none());
    }

    #[test]
    fn test_duplicate_definition() {
        let err = build(&["sub a", "end sub", "sub a", "end sub"]).unwrap_err();
        assert_eq!(err.to_string(), "ALREADY DECLARED IN LINE 3; A");
    }

    #[test]
    fn test_locations() {
        let (code, link) = build(&["print", "20 print", "here: print"]).unwrap();
        let starts: Vec<Address> = link.starts.clone();
        assert_eq!(link.location(&code, starts[0]), Location::Ordinal(1));
        assert_eq!(link.location(&code, starts[1]), Location::Line(20));
        assert_eq!(link.location(&code, starts[2]), Location::Label("HERE".into()));
        assert_eq!(link.line_start(starts[1]), Some(starts[1]));
        assert_eq!(link.line_start(starts[1] + 5), Some(starts[1]));
        assert_eq!(link.line_start(starts[2] + 3), Some(starts[2]));
    }
}

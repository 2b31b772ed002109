use super::Address;
use crate::error;
use crate::lang::token::{Command, Keyword, Operator, Token, C_BASETOKEN};
use crate::lang::{is_name_char, Error};
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Shared, read only program image. Reads past the end give a terminator.
#[derive(Debug, Clone)]
pub struct Code(Rc<[u8]>);

impl Code {
    pub fn new(bytes: Vec<u8>) -> Code {
        Code(bytes.into())
    }

    pub fn at(&self, addr: Address) -> u8 {
        self.0.get(addr).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn slice(&self, start: Address, end: Address) -> &[u8] {
        let end = end.min(self.0.len());
        &self.0[start.min(end)..end]
    }

    /// Address of the terminator that ends the element at `addr`.
    pub fn element_end(&self, mut addr: Address) -> Address {
        while addr < self.0.len() && self.0[addr] != 0 {
            addr += 1;
        }
        addr
    }

    /// Command token at `addr`, if there is one.
    pub fn command(&self, addr: Address) -> Option<Command> {
        Command::from_bytes(self.at(addr), self.at(addr + 1))
    }
}

impl Default for Code {
    fn default() -> Code {
        Code::new(vec![0, 0])
    }
}

/// A position inside one element of the program image.
#[derive(Debug, Clone)]
pub struct Cursor {
    code: Code,
    pos: Address,
    end: Address,
}

impl Cursor {
    pub fn new(code: Code, pos: Address, end: Address) -> Cursor {
        Cursor { code, pos, end }
    }

    /// Cursor over standalone text, used for staged arguments and input.
    pub fn over(bytes: &[u8]) -> Cursor {
        let mut v = bytes.to_vec();
        v.push(0);
        let end = bytes.len();
        Cursor::new(Code::new(v), 0, end)
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn pos(&self) -> Address {
        self.pos
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn set_pos(&mut self, pos: Address) {
        self.pos = pos;
    }

    pub fn set_end(&mut self, end: Address) {
        self.end = end;
    }

    /// A cursor over `pos..end` of the same image.
    pub fn range(&self, pos: Address, end: Address) -> Cursor {
        Cursor::new(self.code.clone(), pos, end)
    }

    pub fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    pub fn peek_at(&self, n: usize) -> u8 {
        if self.pos + n >= self.end {
            0
        } else {
            self.code.at(self.pos + n)
        }
    }

    pub fn next(&mut self) -> u8 {
        let ch = self.peek();
        if self.pos < self.end {
            self.pos += 1;
        }
        ch
    }

    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.end);
    }

    pub fn skip_spaces(&mut self) {
        while self.peek() == b' ' {
            self.pos += 1;
        }
    }

    pub fn rest(&self) -> &[u8] {
        self.code.slice(self.pos, self.end)
    }

    /// Nothing but spaces or a comment left.
    pub fn at_end(&mut self) -> bool {
        self.skip_spaces();
        matches!(self.peek(), 0 | b'\'')
    }

    pub fn expect_end(&mut self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(error!(SyntaxError; "UNEXPECTED TEXT"))
        }
    }

    pub fn eat(&mut self, ch: u8) -> bool {
        self.skip_spaces();
        if self.peek() == ch {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, ch: u8) -> Result<()> {
        if self.eat(ch) {
            Ok(())
        } else {
            Err(error!(SyntaxError; format!("EXPECTED {}", ch as char)))
        }
    }

    pub fn peek_token(&mut self) -> Option<Token> {
        self.skip_spaces();
        Token::from_byte(self.peek())
    }

    pub fn eat_token(&mut self, token: Token) -> bool {
        if self.peek_token() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat_token(Token::Keyword(keyword))
    }

    pub fn eat_operator(&mut self, op: Operator) -> bool {
        self.eat_token(Token::Operator(op))
    }

    pub fn expect_operator(&mut self, op: Operator) -> Result<()> {
        if self.eat_operator(op) {
            Ok(())
        } else {
            Err(error!(SyntaxError; format!("EXPECTED {}", Token::name(Token::Operator(op).byte()))))
        }
    }

    /// Matches an untokenized word such as `GOTO` or `LENGTH`.
    pub fn eat_word(&mut self, word: &[u8]) -> bool {
        self.skip_spaces();
        let rest = self.rest();
        if rest.len() >= word.len()
            && rest[..word.len()].eq_ignore_ascii_case(word)
            && !rest.get(word.len()).map_or(false, |ch| is_name_char(*ch))
        {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    /// Position of the `)` closing a list that starts at the cursor,
    /// honoring nesting and quotes.
    pub fn closing_paren(&self) -> Result<Address> {
        let mut depth = 1usize;
        let mut quoted = false;
        let mut pos = self.pos;
        while pos < self.end {
            let ch = self.code.at(pos);
            if ch == 0 {
                break;
            }
            match ch {
                b'"' => quoted = !quoted,
                b'(' if !quoted => depth += 1,
                b')' if !quoted => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(pos);
                    }
                }
                _ if ch >= C_BASETOKEN && !quoted => {
                    // builtin names include their opening parenthesis
                    if Token::name(ch).ends_with('(') {
                        depth += 1;
                    }
                }
                _ => {}
            }
            pos += 1;
        }
        Err(error!(SyntaxError; "MISSING )"))
    }

    /// Splits `pos..end` at top level commas.
    pub fn split_args(&self) -> Vec<Cursor> {
        let mut args = vec![];
        let mut depth = 0usize;
        let mut quoted = false;
        let mut start = self.pos;
        let mut pos = self.pos;
        while pos < self.end && self.code.at(pos) != 0 {
            let ch = self.code.at(pos);
            match ch {
                b'"' => quoted = !quoted,
                b'(' if !quoted => depth += 1,
                b')' if !quoted => depth = depth.saturating_sub(1),
                b',' if !quoted && depth == 0 => {
                    args.push(self.range(start, pos));
                    start = pos + 1;
                }
                _ if ch >= C_BASETOKEN && !quoted && Token::name(ch).ends_with('(') => {
                    depth += 1
                }
                _ => {}
            }
            pos += 1;
        }
        let mut last = self.range(start, pos);
        if !args.is_empty() || !last.at_end() {
            last.set_pos(start);
            args.push(last);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_past_end_are_terminators() {
        let code = Code::new(vec![b'A', b'B']);
        assert_eq!(code.at(5), 0);
        let mut cursor = Cursor::new(code, 0, 1);
        assert_eq!(cursor.next(), b'A');
        assert_eq!(cursor.next(), 0);
        assert_eq!(cursor.pos(), 1);
    }

    #[test]
    fn test_split_args() {
        let cursor = Cursor::over(br#"1, "a,b", (2, 3)"#);
        let args = cursor.split_args();
        assert_eq!(args.len(), 3);
        assert_eq!(args[1].rest(), br#" "a,b""#);
        assert!(Cursor::over(b"  ").split_args().is_empty());
    }

    #[test]
    fn test_closing_paren() {
        let cursor = Cursor::over(br#"(1), ")"), 2) + 1"#);
        assert_eq!(cursor.closing_paren().unwrap(), 8);
    }

    #[test]
    fn test_eat_word() {
        let mut cursor = Cursor::over(b" goto 10");
        assert!(!cursor.eat_word(b"GO"));
        assert!(cursor.eat_word(b"GOTO"));
        assert_eq!(cursor.rest(), b" 10");
    }
}

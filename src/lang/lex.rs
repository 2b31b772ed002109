use super::ident::{is_name_char, is_name_start, is_suffix};
use super::token::*;
use super::{Error, LineNumber};
use crate::error;

type Result<T> = std::result::Result<T, Error>;

/// Longest source line accepted, counted after unprintable characters go.
pub const MAX_LINE_LEN: usize = 255;

/// Convert one line of source text into its program buffer form.
pub fn tokenize(s: &str) -> Result<Vec<u8>> {
    let tokenizer = Tokenizer::new(s);
    if tokenizer.src.len() > MAX_LINE_LEN {
        return Err(error!(SyntaxError; "LINE TOO LONG"));
    }
    tokenizer.tokenize()
}

/// Convert one tokenized line back to source text.
pub fn detokenize(bytes: &[u8]) -> String {
    let mut s = String::new();
    let mut pos = 0;
    if bytes.first() == Some(&T_NEWLINE) {
        pos += 1;
    }
    if bytes.get(pos) == Some(&T_LINENBR) {
        let number = u16::from_be_bytes([at(bytes, pos + 1), at(bytes, pos + 2)]);
        s.push_str(&number.to_string());
        s.push(' ');
        pos += 3;
    }
    if bytes.get(pos) == Some(&T_LABEL) {
        let len = at(bytes, pos + 1) as usize;
        let end = (pos + 2 + len).min(bytes.len());
        s.push_str(&String::from_utf8_lossy(&bytes[pos + 2..end]));
        s.push(':');
        pos = end;
        if at(bytes, pos) != 0 {
            s.push(' ');
        }
    }
    let mut command = true;
    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch == 0 {
            if at(bytes, pos + 1) == 0 || pos + 1 >= bytes.len() {
                break;
            }
            s.push(':');
            command = true;
            pos += 1;
            continue;
        }
        if command && ch >= C_BASETOKEN && at(bytes, pos + 1) >= C_BASETOKEN {
            s.push_str(Command::name(ch, bytes[pos + 1]));
            let rem = Command::from_bytes(ch, bytes[pos + 1]) == Some(Command::Rem);
            pos += 2;
            command = false;
            if rem {
                while at(bytes, pos) != 0 {
                    s.push(bytes[pos] as char);
                    pos += 1;
                }
            }
            continue;
        }
        command = false;
        if ch >= C_BASETOKEN {
            s.push_str(Token::name(ch));
            if let Some(Token::Keyword(Keyword::Then)) | Some(Token::Keyword(Keyword::Else)) =
                Token::from_byte(ch)
            {
                command = true;
                if at(bytes, pos + 1) != 0 {
                    s.push(' ');
                }
            }
            pos += 1;
            continue;
        }
        if ch == b'"' {
            s.push('"');
            pos += 1;
            while pos < bytes.len() && bytes[pos] != 0 {
                s.push(bytes[pos] as char);
                pos += 1;
                if bytes[pos - 1] == b'"' {
                    break;
                }
            }
            continue;
        }
        if ch == b'\'' {
            while at(bytes, pos) != 0 {
                s.push(bytes[pos] as char);
                pos += 1;
            }
            continue;
        }
        s.push(ch as char);
        pos += 1;
    }
    s
}

/// Line number of a tokenized line.
pub fn line_number(bytes: &[u8]) -> Option<LineNumber> {
    if at(bytes, 0) == T_NEWLINE && at(bytes, 1) == T_LINENBR {
        Some(u16::from_be_bytes([at(bytes, 2), at(bytes, 3)]))
    } else {
        None
    }
}

/// Position of the first statement byte after the line header at `pos`.
pub fn skip_header(bytes: &[u8], mut pos: usize) -> usize {
    if at(bytes, pos) == T_NEWLINE {
        pos += 1;
    }
    if at(bytes, pos) == T_LINENBR {
        pos += 3;
    }
    if at(bytes, pos) == T_LABEL {
        pos += 2 + at(bytes, pos + 1) as usize;
    }
    pos
}

/// True for a line with a header but no statements.
pub fn is_blank(bytes: &[u8]) -> bool {
    let pos = skip_header(bytes, 0);
    bytes[pos.min(bytes.len())..].iter().all(|ch| *ch == 0)
}

fn at(bytes: &[u8], pos: usize) -> u8 {
    bytes.get(pos).copied().unwrap_or(0)
}

fn is_hex_line(src: &[u8]) -> bool {
    src.len() >= 8
        && src[..8].iter().all(|ch| ch.is_ascii_hexdigit())
        && src.get(8).map_or(true, |ch| *ch == b' ')
}

struct Tokenizer {
    src: Vec<u8>,
    pos: usize,
    out: Vec<u8>,
    header: usize,
    command: bool,
    terminated: bool,
}

impl Tokenizer {
    fn new(s: &str) -> Tokenizer {
        let src = s
            .chars()
            .filter_map(|ch| match ch {
                '\t' => Some(b' '),
                ' '..='~' => Some(ch as u8),
                _ => None,
            })
            .skip_while(|ch| *ch == b' ')
            .collect();
        Tokenizer {
            src,
            pos: 0,
            out: vec![T_NEWLINE],
            header: 1,
            command: true,
            terminated: false,
        }
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> u8 {
        self.src.get(self.pos + n).copied().unwrap_or(0)
    }

    fn rest(&self) -> &[u8] {
        &self.src[self.pos.min(self.src.len())..]
    }

    fn skip_spaces(&mut self) {
        while self.peek() == b' ' {
            self.pos += 1;
        }
    }

    fn copy_rest(&mut self) {
        while self.pos < self.src.len() {
            self.out.push(self.src[self.pos]);
            self.pos += 1;
        }
    }

    fn tokenize(mut self) -> Result<Vec<u8>> {
        if is_hex_line(&self.src) {
            self.copy_rest();
            return Ok(self.finish());
        }
        self.line_number()?;
        self.label();
        self.header = self.out.len();
        while self.pos < self.src.len() {
            if self.command {
                self.skip_spaces();
                if self.pos >= self.src.len() {
                    break;
                }
                if self.statement_start() {
                    break;
                }
                continue;
            }
            self.element();
        }
        Ok(self.finish())
    }

    fn finish(mut self) -> Vec<u8> {
        while self.out.len() > self.header && self.out.last() == Some(&b' ') && !self.terminated {
            self.out.pop();
        }
        if !self.terminated {
            self.out.push(0);
        }
        self.out.extend_from_slice(&[0, 0]);
        self.out
    }

    fn line_number(&mut self) -> Result<()> {
        let digits = self.src.iter().take_while(|ch| ch.is_ascii_digit()).count();
        if digits == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.src[..digits]).into_owned();
        let number = match text.parse::<u32>() {
            Ok(n) if (1..=LineNumber::MAX as u32).contains(&n) => n as LineNumber,
            _ => return Err(error!(Overflow; "INVALID LINE NUMBER")),
        };
        self.out.push(T_LINENBR);
        self.out.extend_from_slice(&number.to_be_bytes());
        self.pos = digits;
        self.skip_spaces();
        Ok(())
    }

    fn label(&mut self) {
        let rest = self.rest();
        if rest.is_empty() || !is_name_start(rest[0]) {
            return;
        }
        let len = rest.iter().take_while(|ch| is_name_char(**ch)).count();
        if rest.get(len) != Some(&b':') || len > u8::MAX as usize {
            return;
        }
        if let Some((_, n)) = match_command(rest) {
            if n == len {
                return;
            }
        }
        let name: Vec<u8> = rest[..len].iter().map(|ch| ch.to_ascii_uppercase()).collect();
        self.out.push(T_LABEL);
        self.out.push(len as u8);
        self.out.extend_from_slice(&name);
        self.pos += len + 1;
        self.skip_spaces();
    }

    /// Returns true when the rest of the line was consumed verbatim.
    fn statement_start(&mut self) -> bool {
        if self.peek() == b':' {
            self.separator();
            return false;
        }
        self.terminated = false;
        if let Some((index, len)) = match_command(self.rest()) {
            self.out.extend_from_slice(&encode_command(index));
            self.pos += len;
            self.command = false;
            match COMMANDS[index].1 {
                Command::Rem => {
                    self.copy_rest();
                    return true;
                }
                Command::Data => self.data(),
                _ => {}
            }
            return false;
        }
        self.command = false;
        if is_name_start(self.peek()) && self.implied_let() {
            self.out.extend_from_slice(&Command::ImpliedLet.bytes());
        }
        false
    }

    fn implied_let(&self) -> bool {
        let rest = self.rest();
        let mut i = rest.iter().take_while(|ch| is_name_char(**ch)).count();
        if rest.get(i).map_or(false, |ch| is_suffix(*ch)) {
            i += 1;
        }
        while rest.get(i) == Some(&b' ') {
            i += 1;
        }
        if rest.get(i) == Some(&b'(') {
            let mut depth = 0;
            let mut quoted = false;
            while let Some(ch) = rest.get(i) {
                i += 1;
                match ch {
                    b'"' => quoted = !quoted,
                    b'(' if !quoted => depth += 1,
                    b')' if !quoted => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            while rest.get(i) == Some(&b' ') {
                i += 1;
            }
        }
        rest.get(i) == Some(&b'=')
    }

    /// DATA items are kept as written up to the next separator.
    fn data(&mut self) {
        let mut quoted = false;
        while self.pos < self.src.len() {
            let ch = self.src[self.pos];
            if ch == b'"' {
                quoted = !quoted;
            } else if !quoted && (ch == b':' || ch == b'\'') {
                break;
            }
            self.out.push(ch);
            self.pos += 1;
        }
    }

    fn separator(&mut self) {
        if self.out.last() == Some(&0) && self.terminated {
            self.out.push(b' ');
        }
        self.out.push(0);
        self.pos += 1;
        self.command = true;
        self.terminated = true;
    }

    fn element(&mut self) {
        let ch = self.peek();
        match ch {
            b'"' => self.string(),
            b'\'' => self.copy_rest(),
            b':' => self.separator(),
            b'0'..=b'9' => self.number(),
            b'.' if self.peek_at(1).is_ascii_digit() => self.number(),
            b'&' if matches!(self.peek_at(1).to_ascii_uppercase(), b'H' | b'O' | b'B') => {
                self.based()
            }
            _ => {
                if let Some((byte, len)) = match_token(self.rest()) {
                    self.out.push(byte);
                    self.pos += len;
                    if let Some(Token::Keyword(Keyword::Then)) | Some(Token::Keyword(Keyword::Else)) =
                        Token::from_byte(byte)
                    {
                        self.command = true;
                    }
                } else if is_name_start(ch) {
                    self.name();
                } else {
                    self.out.push(ch);
                    self.pos += 1;
                }
            }
        }
    }

    fn string(&mut self) {
        self.out.push(b'"');
        self.pos += 1;
        while self.pos < self.src.len() {
            let ch = self.src[self.pos];
            self.pos += 1;
            if ch == b'"' {
                break;
            }
            self.out.push(ch);
        }
        self.out.push(b'"');
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() || self.peek() == b'.' {
            self.out.push(self.peek());
            self.pos += 1;
        }
        if self.peek().to_ascii_uppercase() == b'E' {
            let sign = matches!(self.peek_at(1), b'+' | b'-');
            let digit = if sign { self.peek_at(2) } else { self.peek_at(1) };
            if digit.is_ascii_digit() {
                self.out.push(b'E');
                self.pos += 1;
                if sign {
                    self.out.push(self.peek());
                    self.pos += 1;
                }
                while self.peek().is_ascii_digit() {
                    self.out.push(self.peek());
                    self.pos += 1;
                }
            }
        }
    }

    fn based(&mut self) {
        self.out.push(b'&');
        self.out.push(self.peek_at(1).to_ascii_uppercase());
        self.pos += 2;
        while self.peek().is_ascii_alphanumeric() {
            self.out.push(self.peek().to_ascii_uppercase());
            self.pos += 1;
        }
    }

    fn name(&mut self) {
        while is_name_char(self.peek()) {
            self.out.push(self.peek().to_ascii_uppercase());
            self.pos += 1;
        }
        if is_suffix(self.peek()) {
            self.out.push(self.peek());
            self.pos += 1;
        }
    }
}

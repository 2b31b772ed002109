use super::lex::{detokenize, is_blank, line_number, skip_header, tokenize};
use super::token::{T_LABEL, T_NEWLINE};
use super::{Error, LineNumber};

/// One tokenized line as it is stored in the program buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    bytes: Vec<u8>,
}

impl Line {
    pub fn from_str(s: &str) -> Result<Line, Error> {
        Ok(Line { bytes: tokenize(s)? })
    }

    pub fn number(&self) -> Option<LineNumber> {
        line_number(&self.bytes)
    }

    pub fn label(&self) -> Option<String> {
        let mut pos = 1;
        if self.bytes.get(pos) == Some(&super::token::T_LINENBR) {
            pos += 3;
        }
        if self.bytes.get(pos) != Some(&T_LABEL) {
            return None;
        }
        let len = *self.bytes.get(pos + 1)? as usize;
        let name = self.bytes.get(pos + 2..pos + 2 + len)?;
        Some(String::from_utf8_lossy(name).into_owned())
    }

    pub fn is_direct(&self) -> bool {
        self.number().is_none()
    }

    /// A numbered line with nothing after the number deletes that line.
    pub fn is_empty(&self) -> bool {
        is_blank(&self.bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The line as it sits inside a program image: one element terminator,
    /// without the end of program marker.
    pub fn image(&self) -> &[u8] {
        let body = skip_header(&self.bytes, 0);
        let mut end = self.bytes.len();
        while end > body + 1 && self.bytes[end - 1] == 0 && self.bytes[end - 2] == 0 {
            end -= 1;
        }
        debug_assert!(self.bytes.first() == Some(&T_NEWLINE));
        &self.bytes[..end.max(body)]
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", detokenize(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_line() {
        let line = Line::from_str("100 print 1").unwrap();
        assert_eq!(line.number(), Some(100));
        assert!(!line.is_direct());
        assert_eq!(line.to_string(), "100 PRINT 1");
    }

    #[test]
    fn test_label() {
        let line = Line::from_str("start: print").unwrap();
        assert_eq!(line.label().as_deref(), Some("START"));
        let line = Line::from_str("10 again:").unwrap();
        assert_eq!(line.label().as_deref(), Some("AGAIN"));
    }

    #[test]
    fn test_image_keeps_one_terminator() {
        let line = Line::from_str("a=1").unwrap();
        let image = line.image();
        assert_eq!(image.last(), Some(&0));
        assert_ne!(image[image.len() - 2], 0);
        let line = Line::from_str("10").unwrap();
        assert!(line.is_empty());
        assert_eq!(line.image().last(), Some(&0));
    }
}

/*!
# Rust Language Module

This Rust module converts BASIC source lines to and from the tokenized
program buffer format.

*/

#[macro_use]
mod error;
mod ident;
mod lex;
mod line;
pub mod token;

pub use error::{Error, ErrorCode, ErrorKind, Location};
pub use ident::{is_name_char, is_name_start, is_suffix, name_len, Type, TypeSet, MAX_NAME_LEN};
pub use lex::{detokenize, line_number, skip_header, tokenize, MAX_LINE_LEN};
pub use line::Line;

pub type LineNumber = u16;

/*!
## Rust Machine Module

This Rust module executes tokenized BASIC programs directly from the
program buffer. Statement handlers are spread over the sibling modules
as `impl Runtime` blocks.

*/

pub type Address = usize;

mod call;
mod console;
mod cursor;
mod declare;
mod eval;
mod exec;
mod flow;
mod format;
mod function;
mod heap;
mod io;
mod link;
mod lookup;
mod operation;
mod options;
mod program;
mod runtime;
mod stack;
mod val;
mod var;

pub use call::{CallKind, ForeignCode, Refuse};
pub use console::{Console, Recorder};
pub use cursor::{Code, Cursor};
pub use exec::Flow;
pub use function::Function;
pub use heap::{Handle, Heap};
pub use link::{Definition, Kind, Link};
pub use lookup::{Declaration, Lookup};
pub use operation::Operation;
pub use options::Options;
pub use program::Program;
pub use runtime::Runtime;
pub use stack::Stack;
pub use val::{Val, MAX_STRING};
pub use var::{Slot, VarId, VarTable, DEFAULT_STRING_LENGTH};

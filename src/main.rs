//! # BASIC
//!
//! Terminal front end for the MMBasic engine. An optional program file
//! given on the command line is loaded and run before the prompt.

mod term;

fn main() {
    term::main()
}

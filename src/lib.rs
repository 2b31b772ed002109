//! # MMBasic engine
//!
//! A tokenizing BASIC interpreter in the MMBasic dialect. Source lines are
//! converted to a compact program buffer by [`lang`] and executed in place
//! by [`mach`].
//!
//! ```
//! use basic::mach::{Recorder, Runtime};
//!
//! let console = Recorder::new();
//! let mut runtime = Runtime::new(console.clone());
//! runtime.load("FOR I = 1 TO 3\nPRINT I;\nNEXT\n").unwrap();
//! runtime.run().unwrap();
//! assert_eq!(console.output(), "123");
//! ```

pub mod lang;
pub mod mach;

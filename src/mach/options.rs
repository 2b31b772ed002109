use crate::lang::Type;

/// Interpreter settings. `OPTION` statements change the running copy;
/// `RUN` and `NEW` restore the ones the runtime was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Type of names without a suffix or declaration. `None` is `OPTION DEFAULT NONE`.
    pub default_type: Option<Type>,
    pub base: i64,
    pub explicit: bool,
    pub string_length: usize,
    pub heap_pages: usize,
    pub for_depth: usize,
    pub do_depth: usize,
    pub gosub_depth: usize,
    pub call_depth: usize,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            default_type: Some(Type::Float),
            base: 0,
            explicit: false,
            string_length: 255,
            heap_pages: 1024,
            for_depth: 20,
            do_depth: 20,
            gosub_depth: 50,
            call_depth: 50,
        }
    }
}

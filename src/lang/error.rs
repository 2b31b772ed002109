use super::LineNumber;

/// Where an error was raised, as far as the program text can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Line(LineNumber),
    Label(String),
    /// Physical line of a program that has neither numbers nor labels.
    Ordinal(usize),
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Location::Line(n) => write!(f, "{}", n),
            Location::Label(s) => write!(f, "{}", s),
            Location::Ordinal(n) => write!(f, "LINE {}", n),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Error {
    code: ErrorCode,
    location: Option<Location>,
    source_name: Option<String>,
    message: String,
    resume: Option<usize>,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message($msg)
    };
    ($err:ident, $loc:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).in_location($loc)
    };
    ($err:ident, $loc:expr; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_location($loc)
            .message($msg)
    };
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code,
            location: None,
            source_name: None,
            message: String::new(),
            resume: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.message
    }

    /// Break and END travel as errors so they can unwind nested calls,
    /// but no error policy may swallow them.
    pub fn is_unwind(&self) -> bool {
        matches!(self.code.kind(), ErrorKind::Unwind)
    }

    pub fn is_halt(&self) -> bool {
        self.code == ErrorCode::Halt
    }

    pub fn is_direct(&self) -> bool {
        self.location.is_none()
    }

    /// Keeps the first location attached; errors report where they started.
    pub fn in_location(mut self, location: Location) -> Error {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn in_source(mut self, name: &str) -> Error {
        self.source_name = Some(name.to_string());
        self
    }

    pub fn message<S: Into<String>>(mut self, message: S) -> Error {
        debug_assert!(self.message.is_empty());
        self.message = message.into();
        self
    }

    pub fn resume(&self) -> Option<usize> {
        self.resume
    }

    pub fn resume_at(mut self, address: usize) -> Error {
        if self.resume.is_none() {
            self.resume = Some(address);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Type,
    Scope,
    Bounds,
    Resource,
    Internal,
    Unwind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NextWithoutFor = 1,
    SyntaxError = 2,
    ReturnWithoutGosub = 3,
    OutOfData = 4,
    IllegalFunctionCall = 5,
    Overflow = 6,
    OutOfMemory = 7,
    UndefinedLine = 8,
    SubscriptOutOfRange = 9,
    AlreadyDeclared = 10,
    DivisionByZero = 11,
    IllegalDirect = 12,
    TypeMismatch = 13,
    TooManyTemporaries = 14,
    StringTooLong = 15,
    UnknownCommand = 18,
    NotDeclared = 19,
    NameTooLong = 20,
    NameConflict = 21,
    NotAFunction = 22,
    NotASubroutine = 23,
    ArgumentList = 24,
    TooManyCalls = 25,
    ForWithoutNext = 26,
    StackOverflow = 27,
    DoWithoutLoop = 28,
    WhileWithoutWend = 29,
    WendWithoutWhile = 30,
    LoopWithoutDo = 31,
    EndWithoutCall = 32,
    ConstantAssignment = 33,
    Dimensions = 34,
    InvalidHere = 35,
    IfWithoutEndIf = 36,
    SelectWithoutEnd = 37,
    NotAnArray = 38,
    ArrayArgument = 39,
    UserError = 40,
    ForeignCode = 41,
    InternalError = 51,
    Break = 90,
    Halt = 91,
}

impl ErrorCode {
    pub fn kind(self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            SyntaxError | NextWithoutFor | ReturnWithoutGosub | ForWithoutNext | DoWithoutLoop
            | WhileWithoutWend | WendWithoutWhile | LoopWithoutDo | EndWithoutCall
            | IfWithoutEndIf | SelectWithoutEnd | UndefinedLine | OutOfData | ArgumentList
            | IllegalFunctionCall | IllegalDirect | UserError => ErrorKind::Syntax,
            TypeMismatch | ArrayArgument | NotAnArray => ErrorKind::Type,
            AlreadyDeclared | NotDeclared | NameConflict | NotAFunction | NotASubroutine
            | UnknownCommand | ConstantAssignment | InvalidHere => ErrorKind::Scope,
            SubscriptOutOfRange | StringTooLong | NameTooLong | TooManyCalls | StackOverflow
            | Dimensions | Overflow | DivisionByZero => ErrorKind::Bounds,
            OutOfMemory | TooManyTemporaries | ForeignCode => ErrorKind::Resource,
            InternalError => ErrorKind::Internal,
            Break | Halt => ErrorKind::Unwind,
        }
    }

    pub fn number(self) -> u16 {
        self as u16
    }

    fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            NextWithoutFor => "NEXT WITHOUT FOR",
            SyntaxError => "SYNTAX ERROR",
            ReturnWithoutGosub => "RETURN WITHOUT GOSUB",
            OutOfData => "OUT OF DATA",
            IllegalFunctionCall => "ILLEGAL FUNCTION CALL",
            Overflow => "OVERFLOW",
            OutOfMemory => "OUT OF MEMORY",
            UndefinedLine => "UNDEFINED LINE",
            SubscriptOutOfRange => "SUBSCRIPT OUT OF RANGE",
            AlreadyDeclared => "ALREADY DECLARED",
            DivisionByZero => "DIVISION BY ZERO",
            IllegalDirect => "ILLEGAL DIRECT",
            TypeMismatch => "TYPE MISMATCH",
            TooManyTemporaries => "TOO MANY TEMPORARIES",
            StringTooLong => "STRING TOO LONG",
            UnknownCommand => "UNKNOWN COMMAND",
            NotDeclared => "NOT DECLARED",
            NameTooLong => "NAME TOO LONG",
            NameConflict => "NAME CONFLICT",
            NotAFunction => "NOT A FUNCTION",
            NotASubroutine => "NOT A SUBROUTINE",
            ArgumentList => "ARGUMENT LIST",
            TooManyCalls => "TOO MANY NESTED CALLS",
            ForWithoutNext => "FOR WITHOUT NEXT",
            StackOverflow => "STACK OVERFLOW",
            DoWithoutLoop => "DO WITHOUT LOOP",
            WhileWithoutWend => "WHILE WITHOUT WEND",
            WendWithoutWhile => "WEND WITHOUT WHILE",
            LoopWithoutDo => "LOOP WITHOUT DO",
            EndWithoutCall => "END WITHOUT CALL",
            ConstantAssignment => "CONSTANT ASSIGNMENT",
            Dimensions => "DIMENSIONS",
            InvalidHere => "INVALID HERE",
            IfWithoutEndIf => "IF WITHOUT ENDIF",
            SelectWithoutEnd => "SELECT WITHOUT END SELECT",
            NotAnArray => "NOT AN ARRAY",
            ArrayArgument => "ARRAY ARGUMENT",
            UserError => "ERROR",
            ForeignCode => "FOREIGN CODE",
            InternalError => "INTERNAL ERROR",
            Break => "BREAK",
            Halt => "END",
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut suffix = String::new();
        if let Some(location) = &self.location {
            suffix.push_str(&format!(" IN {}", location));
        }
        if let Some(name) = &self.source_name {
            suffix.push_str(&format!(" OF \"{}\"", name));
        }
        if !self.message.is_empty() {
            suffix.push_str(&format!("; {}", self.message));
        }
        write!(f, "{}{}", self.code.as_str(), suffix)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = error!(UndefinedLine, Location::Line(10); "99");
        assert_eq!(error.to_string(), "UNDEFINED LINE IN 10; 99");
        let error = error!(SyntaxError).in_location(Location::Ordinal(3)).in_source("demo.bas");
        assert_eq!(error.to_string(), "SYNTAX ERROR IN LINE 3 OF \"demo.bas\"");
        assert_eq!(error!(Break).to_string(), "BREAK");
    }

    #[test]
    fn test_first_location_wins() {
        let error = error!(Overflow)
            .in_location(Location::Label("INNER".to_string()))
            .in_location(Location::Line(5));
        assert_eq!(error.location(), Some(&Location::Label("INNER".to_string())));
        assert_eq!(error.kind(), ErrorKind::Bounds);
        assert!(error!(Halt).is_unwind());
    }
}

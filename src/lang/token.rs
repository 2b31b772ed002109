use super::ident::{is_name_char, TypeSet};

/// Starts every line of the program buffer.
pub const T_NEWLINE: u8 = 0x01;
/// Followed by a big endian line number.
pub const T_LINENBR: u8 = 0x02;
/// Followed by a length byte and the upper case label name.
pub const T_LABEL: u8 = 0x03;
pub const C_BASETOKEN: u8 = 0x80;
/// Erased storage, read as the end of the program.
pub const ERASED: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ImpliedLet,
    Call,
    Case,
    CaseElse,
    Clear,
    Const,
    Csub,
    Data,
    Dim,
    Do,
    Else,
    ElseIf,
    End,
    EndCsub,
    EndFunction,
    EndIf,
    EndSelect,
    EndSub,
    Erase,
    Error,
    ExitDo,
    ExitFor,
    ExitFunction,
    ExitSub,
    For,
    Function,
    Gosub,
    Goto,
    If,
    Inc,
    Input,
    IReturn,
    Let,
    LineInput,
    List,
    Local,
    Loop,
    New,
    Next,
    On,
    Option,
    Pause,
    Print,
    Randomize,
    Read,
    Rem,
    Restore,
    Return,
    Run,
    SelectCase,
    SetTick,
    Static,
    Sub,
    Trace,
    Wend,
    While,
}

/// Command names. A token's index in this table is what the program buffer
/// stores, so entries are only ever appended.
pub const COMMANDS: &[(&str, Command)] = &[
    ("", Command::ImpliedLet),
    ("PRINT", Command::Print),
    ("?", Command::Print),
    ("LET", Command::Let),
    ("REM", Command::Rem),
    ("'", Command::Rem),
    ("DIM", Command::Dim),
    ("LOCAL", Command::Local),
    ("STATIC", Command::Static),
    ("CONST", Command::Const),
    ("IF", Command::If),
    ("ELSEIF", Command::ElseIf),
    ("ELSE IF", Command::ElseIf),
    ("ELSE", Command::Else),
    ("ENDIF", Command::EndIf),
    ("END IF", Command::EndIf),
    ("FOR", Command::For),
    ("NEXT", Command::Next),
    ("DO", Command::Do),
    ("LOOP", Command::Loop),
    ("WHILE", Command::While),
    ("WEND", Command::Wend),
    ("EXIT FOR", Command::ExitFor),
    ("EXIT DO", Command::ExitDo),
    ("EXIT SUB", Command::ExitSub),
    ("EXIT FUNCTION", Command::ExitFunction),
    ("GOTO", Command::Goto),
    ("GOSUB", Command::Gosub),
    ("RETURN", Command::Return),
    ("SUB", Command::Sub),
    ("END SUB", Command::EndSub),
    ("FUNCTION", Command::Function),
    ("END FUNCTION", Command::EndFunction),
    ("CALL", Command::Call),
    ("CSUB", Command::Csub),
    ("END CSUB", Command::EndCsub),
    ("END", Command::End),
    ("ON", Command::On),
    ("ERROR", Command::Error),
    ("OPTION", Command::Option),
    ("ERASE", Command::Erase),
    ("CLEAR", Command::Clear),
    ("INC", Command::Inc),
    ("DATA", Command::Data),
    ("READ", Command::Read),
    ("RESTORE", Command::Restore),
    ("SETTICK", Command::SetTick),
    ("IRETURN", Command::IReturn),
    ("TRACE", Command::Trace),
    ("RUN", Command::Run),
    ("NEW", Command::New),
    ("LIST", Command::List),
    ("INPUT", Command::Input),
    ("LINE INPUT", Command::LineInput),
    ("SELECT CASE", Command::SelectCase),
    ("CASE ELSE", Command::CaseElse),
    ("CASE", Command::Case),
    ("END SELECT", Command::EndSelect),
    ("PAUSE", Command::Pause),
    ("RANDOMIZE", Command::Randomize),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Power,
    Multiply,
    Divide,
    DivideInt,
    Modulus,
    Plus,
    Minus,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Xor,
    Not,
    Inv,
}

impl Operator {
    pub fn precedence(self) -> u8 {
        use Operator::*;
        match self {
            Power => 7,
            Multiply | Divide | DivideInt | Modulus => 6,
            Plus | Minus => 5,
            ShiftLeft | ShiftRight => 4,
            Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => 3,
            And | Or | Xor => 2,
            Not | Inv => 8,
        }
    }

    pub fn accepts(self) -> TypeSet {
        use Operator::*;
        match self {
            Power | Multiply | Divide | Minus | Not => TypeSet::NUMBER,
            DivideInt | Modulus | ShiftLeft | ShiftRight | And | Or | Xor | Inv => {
                TypeSet::INTEGER
            }
            Plus | Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => TypeSet::ANY,
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Not | Operator::Inv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Then,
    Else,
    To,
    Step,
    As,
    While,
    Until,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Sgn,
    Int,
    Fix,
    Cint,
    Sqr,
    Sin,
    Cos,
    Tan,
    Atn,
    Exp,
    Log,
    Pi,
    Rnd,
    Max,
    Min,
    Len,
    Left,
    Right,
    Mid,
    Instr,
    Ucase,
    Lcase,
    Chr,
    Asc,
    Val,
    Str,
    Hex,
    Oct,
    Bin,
    Space,
    String,
    Bound,
    Inkey,
    Timer,
    Date,
    Time,
    ErrNo,
    ErrMsg,
}

impl Builtin {
    /// Builtins written with an opening parenthesis take an argument list.
    pub fn arity(self) -> std::ops::RangeInclusive<usize> {
        use Builtin::*;
        match self {
            Pi | Inkey | Timer | Date | Time | ErrNo | ErrMsg => 0..=0,
            Rnd => 0..=1,
            Abs | Sgn | Int | Fix | Cint | Sqr | Sin | Cos | Tan | Atn | Exp | Log | Len
            | Ucase | Lcase | Chr | Asc | Val | Space => 1..=1,
            Left | Right | String => 2..=2,
            Hex | Oct | Bin | Bound => 1..=2,
            Mid | Instr => 2..=3,
            Str => 1..=4,
            Max | Min => 1..=255,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Operator(Operator),
    Keyword(Keyword),
    Builtin(Builtin),
}

/// Single byte tokens, stored as `C_BASETOKEN + index`.
pub const TOKENS: &[(&str, Token)] = &[
    ("^", Token::Operator(Operator::Power)),
    ("*", Token::Operator(Operator::Multiply)),
    ("/", Token::Operator(Operator::Divide)),
    ("\\", Token::Operator(Operator::DivideInt)),
    ("MOD", Token::Operator(Operator::Modulus)),
    ("+", Token::Operator(Operator::Plus)),
    ("-", Token::Operator(Operator::Minus)),
    ("<<", Token::Operator(Operator::ShiftLeft)),
    (">>", Token::Operator(Operator::ShiftRight)),
    ("=", Token::Operator(Operator::Equal)),
    ("<>", Token::Operator(Operator::NotEqual)),
    ("<", Token::Operator(Operator::Less)),
    ("<=", Token::Operator(Operator::LessEqual)),
    (">", Token::Operator(Operator::Greater)),
    (">=", Token::Operator(Operator::GreaterEqual)),
    ("AND", Token::Operator(Operator::And)),
    ("OR", Token::Operator(Operator::Or)),
    ("XOR", Token::Operator(Operator::Xor)),
    ("NOT", Token::Operator(Operator::Not)),
    ("INV", Token::Operator(Operator::Inv)),
    ("THEN", Token::Keyword(Keyword::Then)),
    ("ELSE", Token::Keyword(Keyword::Else)),
    ("TO", Token::Keyword(Keyword::To)),
    ("STEP", Token::Keyword(Keyword::Step)),
    ("AS", Token::Keyword(Keyword::As)),
    ("WHILE", Token::Keyword(Keyword::While)),
    ("UNTIL", Token::Keyword(Keyword::Until)),
    ("ABS(", Token::Builtin(Builtin::Abs)),
    ("SGN(", Token::Builtin(Builtin::Sgn)),
    ("INT(", Token::Builtin(Builtin::Int)),
    ("FIX(", Token::Builtin(Builtin::Fix)),
    ("CINT(", Token::Builtin(Builtin::Cint)),
    ("SQR(", Token::Builtin(Builtin::Sqr)),
    ("SIN(", Token::Builtin(Builtin::Sin)),
    ("COS(", Token::Builtin(Builtin::Cos)),
    ("TAN(", Token::Builtin(Builtin::Tan)),
    ("ATN(", Token::Builtin(Builtin::Atn)),
    ("EXP(", Token::Builtin(Builtin::Exp)),
    ("LOG(", Token::Builtin(Builtin::Log)),
    ("PI", Token::Builtin(Builtin::Pi)),
    ("RND", Token::Builtin(Builtin::Rnd)),
    ("MAX(", Token::Builtin(Builtin::Max)),
    ("MIN(", Token::Builtin(Builtin::Min)),
    ("LEN(", Token::Builtin(Builtin::Len)),
    ("LEFT$(", Token::Builtin(Builtin::Left)),
    ("RIGHT$(", Token::Builtin(Builtin::Right)),
    ("MID$(", Token::Builtin(Builtin::Mid)),
    ("INSTR(", Token::Builtin(Builtin::Instr)),
    ("UCASE$(", Token::Builtin(Builtin::Ucase)),
    ("LCASE$(", Token::Builtin(Builtin::Lcase)),
    ("CHR$(", Token::Builtin(Builtin::Chr)),
    ("ASC(", Token::Builtin(Builtin::Asc)),
    ("VAL(", Token::Builtin(Builtin::Val)),
    ("STR$(", Token::Builtin(Builtin::Str)),
    ("HEX$(", Token::Builtin(Builtin::Hex)),
    ("OCT$(", Token::Builtin(Builtin::Oct)),
    ("BIN$(", Token::Builtin(Builtin::Bin)),
    ("SPACE$(", Token::Builtin(Builtin::Space)),
    ("STRING$(", Token::Builtin(Builtin::String)),
    ("BOUND(", Token::Builtin(Builtin::Bound)),
    ("INKEY$", Token::Builtin(Builtin::Inkey)),
    ("TIMER", Token::Builtin(Builtin::Timer)),
    ("DATE$", Token::Builtin(Builtin::Date)),
    ("TIME$", Token::Builtin(Builtin::Time)),
    ("MM.ERRNO", Token::Builtin(Builtin::ErrNo)),
    ("MM.ERRMSG$", Token::Builtin(Builtin::ErrMsg)),
];

impl Token {
    pub fn from_byte(byte: u8) -> Option<Token> {
        if byte < C_BASETOKEN {
            return None;
        }
        TOKENS
            .get((byte - C_BASETOKEN) as usize)
            .map(|(_, token)| *token)
    }

    pub fn byte(self) -> u8 {
        let index = TOKENS.iter().position(|(_, t)| *t == self).unwrap_or(0);
        C_BASETOKEN + index as u8
    }

    pub fn name(byte: u8) -> &'static str {
        match byte.checked_sub(C_BASETOKEN) {
            Some(index) => TOKENS.get(index as usize).map_or("", |(name, _)| name),
            None => "",
        }
    }
}

impl Command {
    /// Reads a two byte command token.
    pub fn from_bytes(lo: u8, hi: u8) -> Option<Command> {
        if lo < C_BASETOKEN || hi < C_BASETOKEN {
            return None;
        }
        let index = (lo & 0x7f) as usize | ((hi & 0x7f) as usize) << 7;
        COMMANDS.get(index).map(|(_, command)| *command)
    }

    pub fn bytes(self) -> [u8; 2] {
        let index = COMMANDS.iter().position(|(_, c)| *c == self).unwrap_or(0);
        encode_command(index)
    }

    pub fn name(lo: u8, hi: u8) -> &'static str {
        let index = (lo & 0x7f) as usize | ((hi & 0x7f) as usize) << 7;
        COMMANDS.get(index).map_or("", |(name, _)| name)
    }
}

pub fn encode_command(index: usize) -> [u8; 2] {
    [
        C_BASETOKEN | (index & 0x7f) as u8,
        C_BASETOKEN | (index >> 7) as u8,
    ]
}

/// Number of source bytes `name` matches at the start of `src`, if it does.
/// A space inside a name matches any run of spaces. A name ending in a
/// letter or digit does not match the front of a longer identifier.
fn match_name(name: &str, src: &[u8]) -> Option<usize> {
    let mut pos = 0;
    for ch in name.bytes() {
        if ch == b' ' {
            if src.get(pos) != Some(&b' ') {
                return None;
            }
            while src.get(pos) == Some(&b' ') {
                pos += 1;
            }
            continue;
        }
        match src.get(pos) {
            Some(s) if s.eq_ignore_ascii_case(&ch) => pos += 1,
            _ => return None,
        }
    }
    let last = name.bytes().last()?;
    if last.is_ascii_alphanumeric() {
        if let Some(next) = src.get(pos) {
            if is_name_char(*next) || *next == b'$' || *next == b'%' || *next == b'!' {
                return None;
            }
        }
    }
    Some(pos)
}

fn longest<T: Copy>(table: &[(&str, T)], src: &[u8]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, usize)> = None;
    for (index, (name, _)) in table.iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        if let Some(len) = match_name(name, src) {
            let better = match best {
                None => true,
                Some((_, best_len, best_name)) => {
                    len > best_len || (len == best_len && name.len() > best_name)
                }
            };
            if better {
                best = Some((index, len, name.len()));
            }
        }
    }
    best.map(|(index, len, _)| (index, len))
}

/// Longest command name at the start of `src`: table index and bytes consumed.
pub fn match_command(src: &[u8]) -> Option<(usize, usize)> {
    longest(COMMANDS, src)
}

/// Longest single byte token at the start of `src`: token byte and bytes consumed.
pub fn match_token(src: &[u8]) -> Option<(u8, usize)> {
    longest(TOKENS, src).map(|(index, len)| (C_BASETOKEN + index as u8, len))
}

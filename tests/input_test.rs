mod common;
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_input_fields() {
    let mut m = Machine::new();
    m.console.push_line("4, \"A, B\"");
    m.load("INPUT N, S$\nPRINT N * 2; S$\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "? 4, \"A, B\"\n8A, B\n");
}

#[test]
fn test_input_prompt_with_comma() {
    let mut m = Machine::new();
    m.console.push_line("7");
    m.load("INPUT \"NUMBER: \", N\nPRINT N\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "NUMBER: 7\n7\n");
}

#[test]
fn test_input_not_a_number() {
    let mut m = Machine::new();
    m.console.push_line("SEVEN");
    m.load("INPUT N\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "? SEVEN\n?TYPE MISMATCH IN LINE 1; EXPECTED A NUMBER\n");
}

#[test]
fn test_line_input() {
    let mut m = Machine::new();
    m.console.push_line("Hello, world");
    m.load("LINE INPUT \"NAME: \", N$\nPRINT LEN(N$)\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "NAME: Hello, world\n12\n");
}

#[test]
fn test_read_data_restore() {
    let program = "\
DATA 1, \"TWO, 2\", 3
FOR I = 1 TO 3
READ A$
PRINT A$
NEXT
RESTORE
READ X
PRINT X
";
    assert_eq!(run(program), "1\nTWO, 2\n3\n1\n");
}

#[test]
fn test_restore_to_label() {
    let program = "\
DATA 1, 2
SECOND:
DATA 3
RESTORE SECOND
READ A
PRINT A
";
    assert_eq!(run(program), "3\n");
}

#[test]
fn test_data_spans_statements() {
    let program = "\
READ A, B, C
PRINT A + B + C
DATA 1 : DATA 2
DATA 3
";
    assert_eq!(run(program), "6\n");
    assert_eq!(run("READ A\n"), "?OUT OF DATA IN LINE 1\n");
}

mod common;
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_on_error_ignore() {
    let program = "\
ON ERROR IGNORE
A = 1 / 0
PRINT MM.ERRNO
PRINT MM.ERRMSG$
ON ERROR CLEAR
PRINT MM.ERRNO
";
    assert_eq!(run(program), "11\nDIVISION BY ZERO IN LINE 2\n0\n");
}

#[test]
fn test_on_error_abort() {
    let program = "\
ON ERROR IGNORE
A = 1 / 0
ON ERROR ABORT
PRINT \"BEFORE\"
B = 1 / 0
PRINT \"AFTER\"
";
    assert_eq!(run(program), "BEFORE\n?DIVISION BY ZERO IN LINE 5\n");
}

#[test]
fn test_on_error_skip() {
    let program = "\
ON ERROR SKIP 2
A = 1 / 0
B = 1 / 0
PRINT \"SKIPPED\"
C = 1 / 0
";
    assert_eq!(run(program), "SKIPPED\n?DIVISION BY ZERO IN LINE 5\n");
}

#[test]
fn test_error_statement() {
    assert_eq!(run("ERROR \"BOOM\"\n"), "?ERROR IN LINE 1; BOOM\n");
    assert_eq!(run("10 ERROR\n"), "?ERROR IN 10\n");
    let program = "\
ON ERROR IGNORE
ERROR \"SOFT\"
PRINT MM.ERRNO; \" \"; MM.ERRMSG$
";
    assert_eq!(run(program), "40 ERROR IN LINE 2; SOFT\n");
}

#[test]
fn test_unterminated_string_is_closed() {
    let mut m = Machine::new();
    m.load("PRINT 1\nPRINT \"OPEN\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "1\nOPEN\n");
}

#[test]
fn test_type_mismatch() {
    assert_eq!(run("A = \"TEXT\"\n"), "?TYPE MISMATCH IN LINE 1\n");
    assert_eq!(run("A$ = 1\n"), "?TYPE MISMATCH IN LINE 1\n");
}

#[test]
fn test_constant_assignment() {
    assert_eq!(run("CONST K = 3\nPRINT K\nK = 4\n"), "3\n?CONSTANT ASSIGNMENT IN LINE 3\n");
}

#[test]
fn test_error_inside_loop_body() {
    let program = "\
10 FOR I = 1 TO 2 : X = 1 / (I - 2)
20 NEXT I
";
    assert_eq!(run(program), "?DIVISION BY ZERO IN 10\n");
    let program = "\
10 I = 0
20 DO : I = I + 1 : X = 1 / (I - 2)
30 LOOP
";
    assert_eq!(run(program), "?DIVISION BY ZERO IN 20\n");
    let program = "\
10 WHILE 1 : I = I + 1 : PRINT 1 / (I - 2);
20 WEND
";
    assert_eq!(run(program), "-1?DIVISION BY ZERO IN 10\n");
}

mod common;
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_bounds() {
    let program = "\
DIM A(5)
A(0) = 1
A(5) = 2
PRINT A(0); A(5)
A(6) = 3
";
    assert_eq!(run(program), "12\n?SUBSCRIPT OUT OF RANGE IN LINE 5; 6 IS OUT OF BOUNDS\n");
}

#[test]
fn test_redim_is_an_error() {
    assert_eq!(
        run("DIM A(2)\nDIM A(3)\n"),
        "?ALREADY DECLARED IN LINE 2; A\n"
    );
}

#[test]
fn test_huge_arrays() {
    assert_eq!(
        run("DIM A(9223372036854775807)\n"),
        "?OUT OF MEMORY IN LINE 1; ARRAY TOO LARGE\n"
    );
    assert_eq!(
        run("DIM A(100000, 100000, 100000, 100000, 100000)\n"),
        "?OUT OF MEMORY IN LINE 1; ARRAY TOO LARGE\n"
    );
    assert_eq!(run("DIM A(100000, 100000)\n"), "?OUT OF MEMORY IN LINE 1\n");
    assert_eq!(run("DIM A(10)\nA(10) = 4\nPRINT A(10)\n"), "4\n");
}

#[test]
fn test_undimensioned_array() {
    assert_eq!(run("PRINT Q(1)\n"), "?NOT DECLARED IN LINE 1; Q IS NOT DIMENSIONED\n");
}

#[test]
fn test_two_dimensions() {
    let program = "\
DIM INTEGER M(2, 3)
FOR I = 0 TO 2
FOR J = 0 TO 3
M(I, J) = I * 10 + J
NEXT J, I
PRINT M(2, 3); \" \"; M(1, 0); \" \"; BOUND(M(), 2)
";
    assert_eq!(run(program), "23 10 3\n");
}

#[test]
fn test_option_base() {
    let program = "\
OPTION BASE 1
DIM A(3)
A(1) = 5
PRINT A(1); BOUND(A(), 0)
A(0) = 1
";
    assert_eq!(run(program), "51\n?SUBSCRIPT OUT OF RANGE IN LINE 5; 0 IS OUT OF BOUNDS\n");
    assert_eq!(
        run("DIM A(1)\nOPTION BASE 1\n"),
        "?INVALID HERE IN LINE 2; ARRAYS ALREADY DECLARED\n"
    );
}

#[test]
fn test_string_arrays_and_erase() {
    let program = "\
DIM S$(2) LENGTH 4
S$(1) = \"ABCD\"
PRINT S$(1); LEN(S$(0))
ERASE S$
DIM S$(1)
PRINT LEN(S$(1))
";
    assert_eq!(run(program), "ABCD0\n0\n");
}

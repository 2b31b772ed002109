mod common;
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_sub_arguments_by_reference() {
    let program = "\
SUB BUMP(X)
X = X + 1
END SUB
A = 1
BUMP A
BUMP A + 0
B% = 5
BUMP B%
PRINT A; \" \"; B%
";
    assert_eq!(run(program), "2 5\n");
}

#[test]
fn test_call_statement() {
    let program = "\
SUB SHOW(A$, N)
PRINT A$; N
END SUB
CALL SHOW, \"N=\", 3
SHOW \"M=\", 4
CALL \"SH\" + \"OW\", \"K=\", 5
";
    assert_eq!(run(program), "N=3\nM=4\nK=5\n");
}

#[test]
fn test_function_recursion() {
    let program = "\
FUNCTION FACT(N)
IF N <= 1 THEN FACT = 1 ELSE FACT = N * FACT(N - 1)
END FUNCTION
PRINT FACT(5)
";
    assert_eq!(run(program), "120\n");
}

#[test]
fn test_typed_functions() {
    let program = "\
FUNCTION JOIN$(A$, B$)
JOIN$ = A$ + \"-\" + B$
END FUNCTION
FUNCTION HALF(X) AS INTEGER
HALF = X / 2
END FUNCTION
PRINT JOIN$(\"X\", \"Y\")
PRINT HALF(9)
";
    assert_eq!(run(program), "X-Y\n5\n");
}

#[test]
fn test_missing_arguments_default() {
    let program = "\
FUNCTION ADD(A, B)
ADD = A + B
END FUNCTION
PRINT ADD(1)
";
    assert_eq!(run(program), "1\n");
}

#[test]
fn test_local_and_static() {
    let program = "\
SUB COUNTER
STATIC N
LOCAL A
A = 5
N = N + 1
PRINT N;
END SUB
A = 1
COUNTER
COUNTER
PRINT A
";
    assert_eq!(run(program), "121\n");
}

#[test]
fn test_array_argument() {
    let program = "\
SUB FILL(A())
A(2) = 9
END SUB
DIM B(3)
FILL B()
PRINT B(2)
";
    assert_eq!(run(program), "9\n");
    let program = "\
SUB FILL(A())
END SUB
X = 1
FILL X
";
    assert_eq!(run(program), "?ARRAY ARGUMENT IN LINE 4; A\n");
}

#[test]
fn test_call_errors() {
    assert_eq!(
        run("SUB S\nEND SUB\nA = S(1)\n"),
        "?NOT A FUNCTION IN LINE 3; S\n"
    );
    assert_eq!(
        run("SUB S(A)\nEND SUB\nS 1, 2\n"),
        "?ARGUMENT LIST IN LINE 3; S\n"
    );
    assert_eq!(run("SUB S\nEND SUB\nS = 1\n"), "?NAME CONFLICT IN LINE 3; S\n");
    let mut m = Machine::new();
    m.enter("END SUB");
    assert_eq!(exec(&mut m), "?END WITHOUT CALL\n");
}

#[test]
fn test_sub_sees_globals() {
    let program = "\
SUB SHOW
PRINT G
G = 2
END SUB
G = 1
SHOW
PRINT G
";
    assert_eq!(run(program), "1\n2\n");
}

mod common;
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_for_counts() {
    assert_eq!(run("FOR I = 1 TO 3\nPRINT I\nNEXT I\n"), "1\n2\n3\n");
    assert_eq!(run("FOR I = 3 TO 1 STEP -1 : PRINT I; : NEXT\nPRINT\n"), "321\n");
    assert_eq!(run("FOR I = 1 TO 0 : PRINT I : NEXT\nPRINT \"DONE\"\n"), "DONE\n");
}

#[test]
fn test_for_count_table() {
    let program = "\
N = 0 : FOR I = 1 TO 5 : N = N + 1 : NEXT : PRINT N
N = 0 : FOR I = 1 TO 10 STEP 2 : N = N + 1 : NEXT : PRINT N
N = 0 : FOR I = 5 TO 1 : N = N + 1 : NEXT : PRINT N
";
    assert_eq!(run(program), "5\n5\n0\n");
}

#[test]
fn test_nested_for_with_shared_next() {
    let program = "\
FOR Y = 1 TO 2
FOR X = 8 TO 9
PRINT Y; X; \" \";
NEXT X, Y
PRINT
";
    assert_eq!(run(program), "18 19 28 29 \n");
}

#[test]
fn test_leaving_for_with_goto() {
    let program = "\
10 FOR Y = 1 TO 2
20 FOR X = 8 TO 9
30 PRINT Y; X
40 GOTO 60
50 NEXT
60 NEXT Y
";
    assert_eq!(run(program), "18\n28\n");
}

#[test]
fn test_exit_for() {
    let program = "\
FOR I = 1 TO 10
IF I = 3 THEN EXIT FOR
NEXT
PRINT I
";
    assert_eq!(run(program), "3\n");
}

#[test]
fn test_skipped_loop_steps_outer_next() {
    let program = "\
FOR Y = 1 TO 2
FOR X = 5 TO 1
NEXT X, Y
PRINT Y
";
    assert_eq!(run(program), "3\n");
    let program = "\
FOR Y = 1 TO 3
FOR X = 1 TO 5
IF X = 2 THEN EXIT FOR
NEXT X, Y
PRINT Y; \" \"; X
";
    assert_eq!(run(program), "4 2\n");
}

#[test]
fn test_next_without_for() {
    assert_eq!(run("PRINT 1\nNEXT\n"), "1\n?NEXT WITHOUT FOR IN LINE 2\n");
}

#[test]
fn test_do_loops() {
    let program = "\
I = 0
DO WHILE I < 3
I = I + 1
LOOP
PRINT I
DO
I = I - 1
LOOP UNTIL I = 0
PRINT I
DO
I = I + 1
IF I = 4 THEN EXIT DO
LOOP
PRINT I
";
    assert_eq!(run(program), "3\n0\n4\n");
}

#[test]
fn test_while_wend() {
    let program = "\
I = 1
WHILE I < 100
I = I * 2
WEND
PRINT I
";
    assert_eq!(run(program), "128\n");
}

#[test]
fn test_block_if() {
    let program = "\
FOR I = 1 TO 4
IF I = 1 THEN
PRINT \"ONE\"
ELSEIF I = 2 THEN
PRINT \"TWO\"
ELSE IF I = 3 THEN
PRINT \"THREE\"
ELSE
PRINT \"MANY\"
ENDIF
NEXT
";
    assert_eq!(run(program), "ONE\nTWO\nTHREE\nMANY\n");
}

#[test]
fn test_nested_block_if() {
    let program = "\
A = 0 : B = 1
IF A THEN
IF B THEN
PRINT \"INNER\"
END IF
ELSE
PRINT \"OUTER ELSE\"
END IF
";
    assert_eq!(run(program), "OUTER ELSE\n");
}

#[test]
fn test_single_line_if_with_line_numbers() {
    let program = "\
10 A = 2
20 IF A = 2 THEN 50 ELSE 40
30 PRINT \"NOT HERE\"
40 PRINT \"ELSE\" : END
50 PRINT \"THEN\"
";
    assert_eq!(run(program), "THEN\n");
}

#[test]
fn test_select_case() {
    let program = "\
FOR I = 1 TO 5
SELECT CASE I
CASE 1
PRINT \"A\";
CASE 2, 3
PRINT \"B\";
CASE IS > 4
PRINT \"C\";
CASE ELSE
PRINT \"D\";
END SELECT
NEXT
PRINT
SELECT CASE \"PEAR\"
CASE \"APPLE\" TO \"ORANGE\"
PRINT \"MIDDLE\"
END SELECT
";
    assert_eq!(run(program), "ABBDC\nMIDDLE\n");
}

#[test]
fn test_gosub_and_labels() {
    let program = "\
GOSUB SHOW
GOSUB SHOW
PRINT \"END\"
END
SHOW:
N = N + 1
PRINT N
RETURN
";
    assert_eq!(run(program), "1\n2\nEND\n");
}

#[test]
fn test_return_without_gosub() {
    assert_eq!(run("RETURN\n"), "?RETURN WITHOUT GOSUB IN LINE 1\n");
}

#[test]
fn test_on_goto_and_gosub() {
    let program = "\
10 FOR I = 0 TO 3
20 ON I GOSUB 100, 200
30 NEXT
40 ON 2 GOTO 60, 70
60 PRINT \"SIXTY\"
70 PRINT \"SEVENTY\" : END
100 PRINT \"A\" : RETURN
200 PRINT \"B\" : RETURN
";
    assert_eq!(run(program), "A\nB\nSEVENTY\n");
}

#[test]
fn test_undefined_line() {
    assert_eq!(run("10 GOTO 99\n"), "?UNDEFINED LINE IN 10; 99\n");
}

#[test]
fn test_end_stops_quietly() {
    assert_eq!(run("PRINT 1\nEND\nPRINT 2\n"), "1\n");
}

#[test]
fn test_direct_mode() {
    let mut m = Machine::new();
    m.enter("A = 5: B = 2.5: PRINT A + B");
    assert_eq!(exec(&mut m), "7.5\n");
    m.enter("PRINT A * B");
    assert_eq!(exec(&mut m), "12.5\n");
    m.enter("PRINT 1 / 0");
    assert_eq!(exec(&mut m), "?DIVISION BY ZERO\n");
}

#[test]
fn test_program_entry_and_list() {
    let mut m = Machine::new();
    m.enter("20 PRINT \"WORLD\"");
    m.enter("10 PRINT \"HELLO\";");
    m.enter("30 PRINT \"GONE\"");
    m.enter("30");
    m.enter("LIST");
    assert_eq!(exec(&mut m), "10 PRINT \"HELLO\";\n20 PRINT \"WORLD\"\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "HELLOWORLD\n");
    m.enter("NEW");
    m.enter("LIST");
    assert_eq!(exec(&mut m), "");
}

#[test]
fn test_run_clears_variables() {
    let mut m = Machine::new();
    m.enter("10 PRINT A : A = 7");
    m.enter("RUN");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "0\n0\n");
    assert_eq!(m.runtime.variable("A"), Some(basic::mach::Val::Float(7.0)));
}

#[test]
fn test_trace() {
    let program = "10 TRACE ON\n20 A = 1\n30 TRACE OFF\n40 PRINT A\n";
    assert_eq!(run(program), "[20][30]1\n");
}

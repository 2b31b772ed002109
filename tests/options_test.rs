mod common;
use basic::lang::Type;
use basic::mach::{Options, Recorder, Runtime};
use common::*;
use pretty_assertions::assert_eq;

fn machine(options: Options) -> Machine {
    let console = Recorder::new();
    Machine {
        runtime: Runtime::with_options(options).with_console(console.clone()),
        console,
    }
}

#[test]
fn test_for_depth() {
    let mut m = machine(Options {
        for_depth: 1,
        ..Options::default()
    });
    m.enter("FOR I = 1 TO 2 : FOR J = 1 TO 2 : NEXT : NEXT");
    assert_eq!(exec(&mut m), "?STACK OVERFLOW; TOO MANY NESTED FOR LOOPS\n");
}

#[test]
fn test_default_type() {
    let mut m = machine(Options {
        default_type: Some(Type::Integer),
        ..Options::default()
    });
    m.enter("A = 7 / 2 : PRINT A");
    assert_eq!(exec(&mut m), "4\n");
}

#[test]
fn test_option_statements_reset_on_run() {
    let mut m = Machine::new();
    m.load("PRINT 5 / 2\nOPTION DEFAULT INTEGER\nB = 5 / 2\nPRINT B\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "2.5\n3\n");
    m.enter("C = 1.5 : PRINT C");
    assert_eq!(exec(&mut m), "2\n");
    m.enter("RUN");
    m.enter("D = 0.5 : PRINT D");
    assert_eq!(exec(&mut m), "2.5\n3\n1\n");
}

#[test]
fn test_option_explicit() {
    let mut m = Machine::new();
    m.load("OPTION EXPLICIT\nDIM A = 1\nPRINT A\nPRINT B\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "1\n?NOT DECLARED IN LINE 4; B\n");
}

#[test]
fn test_call_depth() {
    let mut m = machine(Options {
        call_depth: 3,
        ..Options::default()
    });
    m.load("SUB DEEP(N)\nPRINT N;\nDEEP N + 1\nEND SUB\nDEEP 1\n");
    m.enter("RUN");
    assert_eq!(exec(&mut m), "123?TOO MANY NESTED CALLS IN LINE 3\n");
}

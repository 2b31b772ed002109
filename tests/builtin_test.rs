mod common;
use common::*;
use pretty_assertions::assert_eq;

fn print(expr: &str) -> String {
    let mut m = Machine::new();
    m.enter(&format!("PRINT {}", expr));
    exec(&mut m)
}

#[test]
fn test_arithmetic() {
    assert_eq!(print("1 + 2 * 3"), "7\n");
    assert_eq!(print("(1 + 2) * 3"), "9\n");
    assert_eq!(print("7 \\ 2"), "3\n");
    assert_eq!(print("7 MOD 3"), "1\n");
    assert_eq!(print("2 ^ 10"), "1024\n");
    assert_eq!(print("-3 + 1"), "-2\n");
    assert_eq!(print("10 / 4"), "2.5\n");
}

#[test]
fn test_comparison_and_logic() {
    assert_eq!(print("3 > 2"), "1\n");
    assert_eq!(print("3 <> 3"), "0\n");
    assert_eq!(print("\"A\" < \"B\""), "1\n");
    assert_eq!(print("1 AND 0"), "0\n");
    assert_eq!(print("NOT 0"), "1\n");
    assert_eq!(print("6 XOR 3"), "5\n");
}

#[test]
fn test_string_functions() {
    assert_eq!(print("LEFT$(\"HELLO\", 2)"), "HE\n");
    assert_eq!(print("RIGHT$(\"HELLO\", 3)"), "LLO\n");
    assert_eq!(print("MID$(\"HELLO\", 2, 3)"), "ELL\n");
    assert_eq!(print("INSTR(\"BANANA\", \"NA\")"), "3\n");
    assert_eq!(print("UCASE$(\"abc\") + LCASE$(\"DEF\")"), "ABCdef\n");
    assert_eq!(print("LEN(\"\")"), "0\n");
    assert_eq!(print("CHR$(65) + STRING$(3, \"*\")"), "A***\n");
    assert_eq!(print("ASC(\"A\")"), "65\n");
    assert_eq!(print("VAL(\"12.5\") * 2"), "25\n");
    assert_eq!(print("HEX$(255) + \" \" + BIN$(5, 8)"), "FF 00000101\n");
}

#[test]
fn test_numeric_functions() {
    assert_eq!(print("ABS(-4)"), "4\n");
    assert_eq!(print("SGN(-2.5)"), "-1\n");
    assert_eq!(print("INT(-2.5)"), "-3\n");
    assert_eq!(print("FIX(-2.5)"), "-2\n");
    assert_eq!(print("SQR(16)"), "4\n");
    assert_eq!(print("MAX(1, 5, 3)"), "5\n");
    assert_eq!(print("MIN(2.5, 1)"), "1\n");
    assert_eq!(print("SQR(-1)"), "?ILLEGAL FUNCTION CALL; NEGATIVE SQUARE ROOT\n");
}

#[test]
fn test_rnd_is_seeded() {
    let mut a = Machine::new();
    a.enter("RANDOMIZE 7 : PRINT RND");
    let mut b = Machine::new();
    b.enter("RANDOMIZE 7 : PRINT RND");
    assert_eq!(exec(&mut a), exec(&mut b));
}

#[test]
fn test_string_results_stay_short() {
    assert_eq!(print("LEN(HEX$(1, 255))"), "255\n");
    assert_eq!(print("LEN(HEX$(1, 300))"), "?STRING TOO LONG\n");
    assert_eq!(print("LEN(BIN$(1, 100000000))"), "?STRING TOO LONG\n");
    assert_eq!(print("STR$(1, 1, 2000000000)"), "?STRING TOO LONG\n");
    assert_eq!(print("STR$(1, 300)"), "?STRING TOO LONG\n");
    assert_eq!(print("STR$(2.5, 3, 2, \"0\")"), "002.50\n");
}

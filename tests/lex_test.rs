use basic::lang::{detokenize, line_number, tokenize, Line, MAX_LINE_LEN};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[A-Z][0-9]{0,3}[$%!]?"
}

fn term() -> impl Strategy<Value = String> {
    prop_oneof![name(), (0u32..100_000).prop_map(|n| n.to_string()), "\"[a-z :,]{0,8}\""]
}

fn expression() -> impl Strategy<Value = String> {
    let op = prop_oneof![Just("+"), Just("-"), Just("*"), Just("AND"), Just("<>"), Just("MOD")];
    (term(), prop::collection::vec((op, term()), 0..4)).prop_map(|(first, rest)| {
        let mut s = first;
        for (op, t) in rest {
            s.push_str(&format!(" {} {}", op, t));
        }
        s
    })
}

fn statement() -> impl Strategy<Value = String> {
    prop_oneof![
        expression().prop_map(|e| format!("PRINT {}", e)),
        (name(), expression()).prop_map(|(n, e)| format!("{} = {}", n, e)),
        (expression(), name(), expression())
            .prop_map(|(c, n, e)| format!("IF {} THEN {} = {}", c, n, e)),
    ]
}

proptest! {
    #[test]
    fn listing_tokenizes_to_the_same_bytes(
        number in prop::option::of(1u16..=u16::MAX),
        statements in prop::collection::vec(statement(), 1..4),
    ) {
        let mut source = statements.join(" : ");
        if let Some(number) = number {
            source = format!("{} {}", number, source);
        }
        prop_assume!(source.len() < MAX_LINE_LEN - 32);
        let once = tokenize(&source).unwrap();
        let listed = detokenize(&once);
        prop_assert_eq!(tokenize(&listed).unwrap(), once.clone());
        prop_assert_eq!(line_number(&once), number);
    }
}

#[test]
fn test_listing_is_upper_case() {
    let line = Line::from_str("10 for i = 1 to 3 step 2: print \"mixed Case\"; i: next").unwrap();
    assert_eq!(line.to_string(), "10 FOR I = 1 TO 3 STEP 2:PRINT \"mixed Case\"; I:NEXT");
}

#[test]
fn test_line_too_long() {
    let fits = format!("PRINT {}", "1".repeat(MAX_LINE_LEN - 6));
    assert!(tokenize(&fits).is_ok());
    let long = format!("PRINT {}1{}", "(".repeat(50_000), ")".repeat(50_000));
    assert_eq!(tokenize(&long).unwrap_err().to_string(), "SYNTAX ERROR; LINE TOO LONG");
}

#[test]
fn test_data_is_kept_verbatim() {
    let line = Line::from_str("data  1, two , \"x:y\" : print").unwrap();
    assert_eq!(line.to_string(), "DATA  1, two , \"x:y\" :PRINT");
}

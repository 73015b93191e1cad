//! COPY member inclusion: resolution, recursion detection, and charging
//! diagnostics to the member's own file.

use super::{analyze,expect_codes,opencode_diags,abs_value,codes,member_uri};
use crate::lang::server::Analysis;

#[test]
fn copy_member_defines_symbols() {
    let analyzer = expect_codes("\
         COPY  DEFS
TOTAL    EQU   ONE+TWO
         END",&[
        ("DEFS","\
ONE      EQU   1
TWO      EQU   2")
    ],&[]);
    assert_eq!(abs_value(&analyzer,"TOTAL"),Some(3));
}

#[test]
fn copy_member_not_found() {
    expect_codes("\
         COPY  NOSUCH
         END",&[],&["E058"]);
}

#[test]
fn direct_recursion() {
    let analyzer = analyze("\
         COPY  X
DONE     EQU   1
         END",&[
        ("X","\
XVAL     EQU   5
         COPY  X")
    ]);
    // the error lands on the member, the including file continues
    assert_eq!(codes(&analyzer.get_diags(&member_uri("X"))),vec!["E062"]);
    assert_eq!(codes(&opencode_diags(&analyzer)),Vec::<String>::new());
    assert_eq!(abs_value(&analyzer,"DONE"),Some(1));
    assert_eq!(abs_value(&analyzer,"XVAL"),Some(5));
}

#[test]
fn indirect_recursion_through_two_members() {
    let analyzer = analyze("\
         COPY  A
         END",&[
        ("A","         COPY  B"),
        ("B","         COPY  A")
    ]);
    assert_eq!(codes(&analyzer.get_diags(&member_uri("B"))),vec!["E062"]);
}

#[test]
fn nested_copies_unwind_in_order() {
    let analyzer = expect_codes("\
         COPY  OUTER
LAST     EQU   3
         END",&[
        ("OUTER","\
FIRST    EQU   1
         COPY  INNER"),
        ("INNER","SECOND   EQU   2")
    ],&[]);
    assert_eq!(abs_value(&analyzer,"FIRST"),Some(1));
    assert_eq!(abs_value(&analyzer,"SECOND"),Some(2));
    assert_eq!(abs_value(&analyzer,"LAST"),Some(3));
}

#[test]
fn bad_copy_operand() {
    expect_codes("\
         COPY  A+B
         END",&[],&["E058"]);
}

#[test]
fn copy_inside_macro_definition() {
    let analyzer = expect_codes("\
         MACRO
         WRAP
         COPY  BODY
         MEND
         WRAP
         END",&[
        ("BODY","INSIDE   EQU   9")
    ],&[]);
    assert_eq!(abs_value(&analyzer,"INSIDE"),Some(9));
}

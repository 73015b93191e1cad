//! Conditional assembly: SET symbols, branching, the branch counter,
//! string expressions, and model statement realization.

use super::{expect_codes,abs_value};

#[test]
fn seta_through_model_statement() {
    let analyzer = expect_codes("\
&A       SETA  2
&B       SETA  &A*10+4
RES      EQU   &B
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"RES"),Some(24));
}

#[test]
fn setc_concat_and_substring() {
    let analyzer = expect_codes("\
&S       SETC  'ABCDEF'(2,3)
&T       SETC  '&S.XY'
RES&T    EQU   7
         END",&[],&[]);
    // &S is BCD, &T is BCDXY, the label realizes to RESBCDXY
    assert_eq!(abs_value(&analyzer,"RESBCDXY"),Some(7));
}

#[test]
fn setb_relations() {
    let analyzer = expect_codes("\
&X       SETA  5
&B1      SETB  (&X EQ 5)
&B2      SETB  (NOT &B1 OR &X LT 3)
R1       EQU   &B1
R2       EQU   &B2
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"R1"),Some(1));
    assert_eq!(abs_value(&analyzer,"R2"),Some(0));
}

#[test]
fn subscripted_set_extends_symbol() {
    let analyzer = expect_codes("\
         LCLA  &ARR(5)
&ARR(2)  SETA  10,20,30
&N       SETA  N'&ARR
R1       EQU   &ARR(2)
R2       EQU   &ARR(4)
R3       EQU   &N
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"R1"),Some(10));
    assert_eq!(abs_value(&analyzer,"R2"),Some(30));
    assert_eq!(abs_value(&analyzer,"R3"),Some(4));
}

#[test]
fn set_subscript_out_of_range() {
    expect_codes("\
         LCLA  &ARR(5)
&ARR(0)  SETA  1
         END",&[],&["E020"]);
}

#[test]
fn empty_set_operand_leaves_value() {
    let analyzer = expect_codes("\
         LCLA  &ARR(5)
&ARR(1)  SETA  7,8
&ARR(1)  SETA  ,9
R1       EQU   &ARR(1)
R2       EQU   &ARR(2)
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"R1"),Some(7));
    assert_eq!(abs_value(&analyzer,"R2"),Some(9));
}

#[test]
fn open_code_loop_with_backward_ago() {
    let analyzer = expect_codes("\
&I       SETA  0
.LOOP    ANOP
&I       SETA  &I+1
         AIF   (&I LT 5).LOOP
RES      EQU   &I
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"RES"),Some(5));
}

#[test]
fn actr_limit_terminates_loop() {
    expect_codes("\
         ACTR  2
&I       SETA  0
.LOOP    ANOP
&I       SETA  &I+1
         AIF   (&I LT 100).LOOP
         END",&[],&["W063"]);
}

#[test]
fn computed_ago_selects_target() {
    let analyzer = expect_codes("\
&N       SETA  2
         AGO   (&N).ONE,.TWO
.ONE     ANOP
BAD      EQU   1
.TWO     ANOP
GOOD     EQU   2
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"GOOD"),Some(2));
    assert!(analyzer.symbol("BAD").map(|s| s.abs.is_none()).unwrap_or(true));
}

#[test]
fn computed_ago_out_of_range() {
    expect_codes("\
         AGO   (3).A,.B
.A       ANOP
.B       ANOP
         END",&[],&["E020"]);
}

#[test]
fn division_by_zero_yields_zero() {
    let analyzer = expect_codes("\
&Z       SETA  10/0
RES      EQU   &Z
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"RES"),Some(0));
}

#[test]
fn undefined_sequence_symbol_in_macro() {
    expect_codes("\
         MACRO
         JUMPER
         AGO   .MISSING
         MEND
         JUMPER
         END",&[],&["E047"]);
}

#[test]
fn mend_outside_definition() {
    expect_codes("\
         MEND
         END",&[],&["E046"]);
}

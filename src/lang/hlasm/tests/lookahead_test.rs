//! Lookahead: attribute references to symbols defined further down, forward
//! sequence branches in open code, and the fade annotations they produce.

use super::{analyze,expect_codes,opencode_diags,abs_value,codes};
use super::analyzer::opencode_uri;
use crate::lang::server::Analysis;

#[test]
fn length_attribute_through_deferred_equ() {
    let analyzer = expect_codes("\
A        EQU   L'B
B        DS    CL4
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"A"),Some(4));
}

#[test]
fn aif_attribute_triggers_lookahead() {
    let analyzer = expect_codes("\
         AIF   (L'B EQ 4).OK
BAD      EQU   1
.OK      ANOP
GOOD     EQU   2
B        DS    CL4
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"GOOD"),Some(2));
    assert!(analyzer.symbol("BAD").is_none());
}

#[test]
fn type_attribute_of_later_definition() {
    let analyzer = expect_codes("\
&T       SETC  T'FLD
         AIF   ('&T' EQ 'F').YES
.YES     ANOP
FLD      DC    F'0'
RES      EQU   1
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"RES"),Some(1));
}

#[test]
fn defined_attribute_defaults_after_failed_lookahead() {
    let analyzer = expect_codes("\
&D       SETB  (D'NOWHERE)
RES      EQU   &D
         END",&[],&[]);
    // the symbol is nowhere in the source, the lookahead fails and D' is 0
    assert_eq!(abs_value(&analyzer,"RES"),Some(0));
}

#[test]
fn length_attribute_defaults_after_failed_lookahead() {
    let analyzer = expect_codes("\
&L       SETA  L'GHOST
RES      EQU   &L
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"RES"),Some(1));
}

#[test]
fn forward_branch_fades_skipped_statements() {
    let analyzer = analyze("\
         AGO   .DONE
SKIPPED  EQU   1
ALSO     EQU   2
.DONE    ANOP
KEPT     EQU   3
         END",&[]);
    assert_eq!(codes(&opencode_diags(&analyzer)),Vec::<String>::new());
    assert_eq!(abs_value(&analyzer,"KEPT"),Some(3));
    assert!(analyzer.symbol("SKIPPED").is_none());
    let fades = analyzer.get_fades(&opencode_uri());
    assert_eq!(fades.len(),2);
    assert_eq!(fades[0].start.line,1);
    assert_eq!(fades[1].start.line,2);
}

#[test]
fn forward_branch_without_target() {
    expect_codes("\
         AGO   .NOWHERE
LIVE     EQU   1
         END",&[],&["E047"]);
}

#[test]
fn lookahead_sees_through_copy_members() {
    let analyzer = expect_codes("\
         AIF   (L'BUF EQ 8).OK
.OK      ANOP
         COPY  DEFS
         END",&[
        ("DEFS","BUF      DS    CL8")
    ],&[]);
    assert_eq!(analyzer.symbol("BUF").map(|s| s.length),Some(8));
}

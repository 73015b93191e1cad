//! Assembler instructions: EQU, storage layout, sections, ORG, OPSYN,
//! USING bookkeeping, MNOTE, and AINSERT.

use lsp_types as lsp;
use super::{analyze,expect_codes,opencode_diags,abs_value,reloc_offset};

#[test]
fn simple_equ_chain() {
    let analyzer = expect_codes("\
A        EQU   1
B        EQU   A+A-10
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"A"),Some(1));
    assert_eq!(abs_value(&analyzer,"B"),Some(-8));
}

#[test]
fn equ_forward_reference_resolves() {
    let analyzer = expect_codes("\
B        EQU   A+A-10
A        EQU   1
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"B"),Some(-8));
}

#[test]
fn equ_cycle_is_reported() {
    expect_codes("\
A        EQU   B
B        EQU   A
         END",&[],&["E033","E010"]);
}

#[test]
fn equ_redefinition() {
    expect_codes("\
A        EQU   1
A        EQU   2
         END",&[],&["E031"]);
}

#[test]
fn equ_length_bounds() {
    let analyzer = expect_codes("\
A        EQU   1,0
B        EQU   1,65535
C        EQU   1,65536
         END",&[],&["A132"]);
    assert_eq!(analyzer.symbol("A").map(|s| s.length),Some(0));
    assert_eq!(analyzer.symbol("B").map(|s| s.length),Some(65535));
    // the out-of-range operand falls back to the default
    assert_eq!(analyzer.symbol("C").map(|s| s.length),Some(1));
}

#[test]
fn equ_type_bounds() {
    expect_codes("\
A        EQU   1,1,0
B        EQU   1,1,255
C        EQU   1,1,256
         END",&[],&["A244"]);
}

#[test]
fn equ_length_from_leftmost_term() {
    let analyzer = expect_codes("\
DATA     CSECT
F1       DC    F'1'
A        EQU   F1+8
         END",&[],&[]);
    assert_eq!(analyzer.symbol("A").map(|s| s.length),Some(4));
}

#[test]
fn storage_layout_and_alignment() {
    let analyzer = expect_codes("\
DATA     CSECT
F1       DC    F'1'
H1       DC    H'2'
C1       DC    CL3'ABC'
X1       DC    XL2'FFFF'
         END",&[],&[]);
    assert_eq!(reloc_offset(&analyzer,"F1"),Some(0));
    assert_eq!(reloc_offset(&analyzer,"H1"),Some(4));
    assert_eq!(reloc_offset(&analyzer,"C1"),Some(6));
    assert_eq!(reloc_offset(&analyzer,"X1"),Some(9));
    assert_eq!(analyzer.section_extents(),&[("DATA".to_string(),11)]);
    assert_eq!(analyzer.symbol("C1").map(|s| s.length),Some(3));
    assert_eq!(analyzer.symbol("F1").map(|s| s.type_attr),Some(b'F'));
}

#[test]
fn deferred_storage_length() {
    let analyzer = expect_codes("\
DATA     CSECT
BUF      DS    CL(LEN)
LEN      EQU   8
SIZE     EQU   *-BUF
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"SIZE"),Some(8));
    assert_eq!(analyzer.section_extents(),&[("DATA".to_string(),8)]);
}

#[test]
fn duplication_factor_scales_storage() {
    let analyzer = expect_codes("\
DATA     CSECT
TAB      DS    10F
NEXT     DS    F
         END",&[],&[]);
    assert_eq!(reloc_offset(&analyzer,"NEXT"),Some(40));
}

#[test]
fn section_kind_clash() {
    expect_codes("\
NAME     CSECT
NAME     DSECT
         END",&[],&["E031"]);
}

#[test]
fn loctr_resumes_in_its_section() {
    let analyzer = expect_codes("\
CODE     CSECT
A1       DS    F
SUB      LOCTR
B1       DS    H
         END",&[],&[]);
    assert_eq!(reloc_offset(&analyzer,"A1"),Some(0));
    assert_eq!(reloc_offset(&analyzer,"B1"),Some(0));
    assert_eq!(analyzer.section_extents(),&[("CODE".to_string(),6)]);
}

#[test]
fn org_moves_back_and_resets() {
    let analyzer = expect_codes("\
CODE     CSECT
A1       DS    XL8
         ORG   A1+2
B1       DS    X
         ORG
         END",&[],&[]);
    assert_eq!(reloc_offset(&analyzer,"B1"),Some(2));
    assert_eq!(analyzer.section_extents(),&[("CODE".to_string(),8)]);
}

#[test]
fn org_underflow() {
    expect_codes("\
CODE     CSECT
A1       DS    XL8
         ORG   A1-1
         END",&[],&["E068"]);
}

#[test]
fn org_boundary_out_of_range() {
    expect_codes("\
CODE     CSECT
A1       DS    XL8
         ORG   A1,8192
         END",&[],&["A116"]);
}

#[test]
fn opsyn_delete_leaves_tombstone() {
    expect_codes("\
LR       OPSYN ,
         LR    1,2
         END",&[],&["E049"]);
}

#[test]
fn opsyn_alias_dispatches() {
    let analyzer = expect_codes("\
EQUATE   OPSYN EQU
A        EQUATE 5
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"A"),Some(5));
}

#[test]
fn pop_using_below_initial_depth() {
    expect_codes("\
TEST     CSECT
         USING TEST,12
         PUSH  USING
         DROP  12
         POP   USING
         POP   USING
         END",&[],&["E045"]);
}

#[test]
fn mnote_severity_mapping() {
    let analyzer = analyze("\
         MNOTE 8,'SOMETHING BROKE'
         MNOTE 2,'JUST SAYING'
         END",&[]);
    let diags = opencode_diags(&analyzer);
    assert_eq!(diags.len(),2);
    assert_eq!(diags[0].severity,Some(lsp::DiagnosticSeverity::ERROR));
    assert!(diags[0].message.contains("SOMETHING BROKE"));
    assert_eq!(diags[1].severity,Some(lsp::DiagnosticSeverity::INFORMATION));
}

#[test]
fn ainsert_runs_before_open_code_continues() {
    let analyzer = expect_codes("\
         AINSERT 'Q        EQU   7',BACK
NEXT     EQU   1
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"Q"),Some(7));
    assert_eq!(abs_value(&analyzer,"NEXT"),Some(1));
}

#[test]
fn machine_instruction_defines_label() {
    let analyzer = expect_codes("\
CODE     CSECT
HERE     LR    1,2
THERE    L     3,DATA
DATA     DS    F
         END",&[],&[]);
    assert_eq!(reloc_offset(&analyzer,"HERE"),Some(0));
    assert_eq!(reloc_offset(&analyzer,"THERE"),Some(2));
    assert_eq!(analyzer.symbol("HERE").map(|s| (s.type_attr,s.length)),Some((b'I',2)));
    assert_eq!(reloc_offset(&analyzer,"DATA"),Some(8));
}

#[test]
fn missing_machine_operand() {
    expect_codes("\
         LR    1,
         END",&[],&["A010"]);
}

#[test]
fn literal_pool_at_ltorg() {
    let analyzer = expect_codes("\
CODE     CSECT
         L     1,=F'100'
         LTORG
         END",&[],&[]);
    assert_eq!(reloc_offset(&analyzer,"=F'100'"),Some(4));
    assert_eq!(analyzer.symbol("=F'100'").map(|s| s.length),Some(4));
}

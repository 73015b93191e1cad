//! Macro definition, invocation, parameter binding, system variables,
//! OPSYN interplay, and the library macro cache.

use lsp_types as lsp;
use super::{analyze,expect_codes,opencode_diags,abs_value,codes};
use super::analyzer::opencode_uri;
use crate::lang::Document;
use crate::lang::server::Analysis;

#[test]
fn define_and_expand() {
    let analyzer = expect_codes("\
         MACRO
&L       DOUBLE &X,&K=4
&L       EQU   &X+&X+&K
         MEND
R        DOUBLE 3,K=2
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"R"),Some(8));
}

#[test]
fn keyword_defaults_apply() {
    let analyzer = expect_codes("\
         MACRO
&L       DOUBLE &X,&K=4
&L       EQU   &X+&X+&K
         MEND
R        DOUBLE 3
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"R"),Some(10));
}

#[test]
fn duplicate_keyword_argument() {
    expect_codes("\
         MACRO
&L       DOUBLE &X,&K=4
&L       EQU   &X+&X+&K
         MEND
R        DOUBLE 3,K=2,K=9
         END",&[],&["E011"]);
}

#[test]
fn unknown_keyword_passes_positionally() {
    expect_codes("\
         MACRO
&L       DOUBLE &X,&K=4
&L       EQU   &X+&X+&K
         MEND
R        DOUBLE 3,Z=9
         END",&[],&["W014"]);
}

#[test]
fn sysndx_increments_per_invocation() {
    let analyzer = expect_codes("\
         MACRO
         COUNTER
N&SYSNDX EQU   1
         MEND
         COUNTER
         COUNTER
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"N0001"),Some(1));
    assert_eq!(abs_value(&analyzer,"N0002"),Some(1));
}

#[test]
fn syslist_addresses_positional_arguments() {
    let analyzer = expect_codes("\
         MACRO
         PICK
&V       SETA  &SYSLIST(2)
RES      EQU   &V
         MEND
         PICK  10,20,30
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"RES"),Some(20));
}

#[test]
fn sublist_arguments() {
    let analyzer = expect_codes("\
         MACRO
         FIRST &P
&V       SETA  &P(1)
RES      EQU   &V
         MEND
         FIRST (7,8,9)
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"RES"),Some(7));
}

#[test]
fn mexit_stops_expansion() {
    let analyzer = expect_codes("\
         MACRO
         PARTIAL
GOOD     EQU   1
         MEXIT
BAD      EQU   2
         MEND
         PARTIAL
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"GOOD"),Some(1));
    assert!(analyzer.symbol("BAD").is_none());
}

#[test]
fn undefined_macro() {
    let analyzer = analyze("\
         MAC
         END",&[]);
    let diags = opencode_diags(&analyzer);
    assert_eq!(codes(&diags),vec!["E049"]);
    // the diagnostic points at the operation field
    assert_eq!(diags[0].range.start.character,9);
}

#[test]
fn opsyn_synonym_starts_definition() {
    expect_codes("\
J        OPSYN MACRO
         J
&L       INNER &P
         MEND
         END",&[],&[]);
}

#[test]
fn nested_definition_at_replay() {
    let analyzer = expect_codes("\
         MACRO
         OUTER
         MACRO
         INNER
DEEP     EQU   42
         MEND
         MEND
         OUTER
         INNER
         END",&[],&[]);
    assert_eq!(abs_value(&analyzer,"DEEP"),Some(42));
}

#[test]
fn library_macro_resolves_and_caches() {
    let member = "\
         MACRO
&L       ADDER &A,&B
&L       EQU   &A+&B
         MEND";
    let mut analyzer = analyze("\
X        ADDER 1,2
         END",&[("ADDER",member)]);
    assert_eq!(codes(&opencode_diags(&analyzer)),Vec::<String>::new());
    assert_eq!(abs_value(&analyzer,"X"),Some(3));
    assert_eq!(analyzer.macro_cache_len(),1);
    // the second pass adopts the cached body and reproduces the expansion
    let doc = Document::new(opencode_uri(),"\
X        ADDER 1,2
         END".to_string());
    analyzer.analyze(&doc).expect("second pass");
    assert_eq!(abs_value(&analyzer,"X"),Some(3));
    assert_eq!(analyzer.macro_cache_len(),1);
}

#[test]
fn unused_macro_fades() {
    let analyzer = expect_codes("\
         MACRO
         NEVER
         MEND
         END",&[],&[]);
    let fades = analyzer.get_fades(&opencode_uri());
    assert_eq!(fades.len(),1);
}

#[test]
fn aread_consumes_raw_line() {
    let analyzer = analyze("\
         MACRO
         GETLINE
&LINE    AREAD
         MNOTE 0,'&LINE'
         MEND
         GETLINE
RAW TEXT LINE
         END",&[]);
    let diags = opencode_diags(&analyzer);
    assert_eq!(diags.len(),1);
    assert!(diags[0].message.contains("RAW TEXT LINE"));
    assert_eq!(diags[0].severity,Some(lsp::DiagnosticSeverity::HINT));
}

#[test]
fn aread_outside_macro() {
    expect_codes("\
&L       AREAD
         END",&[],&["E070"]);
}

//! Tests of the HLASM analyzer.
//!
//! Sources are embedded strings in the fixed column format: the name field
//! starts in column 1, everything else is indented.  Library members are
//! supplied as in-memory documents, the same path the server uses for
//! unsaved editor buffers.

use lsp_types as lsp;
use super::analyzer::{self,Analyzer};
use crate::lang::server::Analysis;

mod ca_test;
mod asm_test;
mod macro_test;
mod copy_test;
mod lookahead_test;
mod workspace_test;

/// analyze open code against in-memory library members
fn analyze(src: &str, members: &[(&str,&str)]) -> Analyzer {
    analyzer::analyze_string(src,members)
}

fn opencode_diags(analyzer: &Analyzer) -> Vec<lsp::Diagnostic> {
    analyzer.get_diags(&analyzer::opencode_uri())
}

fn member_uri(name: &str) -> lsp::Url {
    lsp::Url::parse(&format!("hlasm://library/{}",name)).expect("member uri")
}

fn codes(diags: &[lsp::Diagnostic]) -> Vec<String> {
    diags.iter().map(|d| match &d.code {
        Some(lsp::NumberOrString::String(s)) => s.clone(),
        _ => String::new()
    }).collect()
}

/// assert the analysis produced exactly these diagnostic codes, in order
fn expect_codes(src: &str, members: &[(&str,&str)], expected: &[&str]) -> Analyzer {
    let analyzer = analyze(src,members);
    let diags = opencode_diags(&analyzer);
    assert_eq!(codes(&diags),expected.to_vec(),"diagnostics were {:?}",diags);
    analyzer
}

fn abs_value(analyzer: &Analyzer, name: &str) -> Option<i64> {
    analyzer.symbol(name).and_then(|s| s.abs)
}

fn reloc_offset(analyzer: &Analyzer, name: &str) -> Option<i64> {
    analyzer.symbol(name).and_then(|s| s.reloc.as_ref().map(|(_,off)| *off))
}

//! Diagnostic collection.
//!
//! Diagnostics are values, the instruction handlers record one or more and
//! continue, nothing in the pass unwinds on user-input errors.  Diagnostics
//! and fade (inactive code) annotations are charged to the file named by the
//! context's processing stack, which is the copy member or macro library
//! file when one is active, not the including file.
//!
//! Suppression is purely an output filter: when a file accumulates more
//! diagnostics than the configured limit, `publishable` replaces the list
//! with a single `SUP` entry, the stored set is untouched.

use std::collections::HashMap;
use lsp_types as lsp;
use crate::lang::server::{basic_diag,coded_diag};

/// the one diagnostic emitted in place of a suppressed list
pub const SUPPRESSED: &str = "SUP";

#[derive(Clone)]
pub struct DiagnosticSet {
    sets: HashMap<String,Vec<lsp::Diagnostic>>,
    fades: HashMap<String,Vec<lsp::Range>>,
    counts: [usize;3]
}

impl DiagnosticSet {
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
            fades: HashMap::new(),
            counts: [0,0,0]
        }
    }
    pub fn push(&mut self, file: &str, diag: lsp::Diagnostic) {
        match diag.severity {
            Some(lsp::DiagnosticSeverity::ERROR) => self.counts[0] += 1,
            Some(lsp::DiagnosticSeverity::WARNING) => self.counts[1] += 1,
            _ => self.counts[2] += 1
        }
        match self.sets.get_mut(file) {
            Some(v) => v.push(diag),
            None => {
                self.sets.insert(file.to_string(),vec![diag]);
            }
        }
    }
    /// record a coded diagnostic, severity derives from the code
    pub fn add(&mut self, file: &str, range: lsp::Range, code: &str, mess: &str) {
        self.push(file,coded_diag(range,code,mess));
    }
    /// MNOTE severity is the user's numeric level, 8 and above is an error
    pub fn mnote(&mut self, file: &str, range: lsp::Range, level: i64, mess: &str) {
        let severity = match level {
            l if l >= 8 => lsp::DiagnosticSeverity::ERROR,
            l if l >= 4 => lsp::DiagnosticSeverity::WARNING,
            l if l >= 1 => lsp::DiagnosticSeverity::INFORMATION,
            _ => lsp::DiagnosticSeverity::HINT
        };
        let mut diag = basic_diag(range,mess,severity);
        diag.code = Some(lsp::NumberOrString::String("MNOTE".to_string()));
        self.push(file,diag);
    }
    /// mark a range as inactive, drives the client's dimming
    pub fn fade(&mut self, file: &str, range: lsp::Range) {
        match self.fades.get_mut(file) {
            Some(v) => v.push(range),
            None => {
                self.fades.insert(file.to_string(),vec![range]);
            }
        }
    }
    pub fn stored(&self, file: &str) -> Vec<lsp::Diagnostic> {
        self.sets.get(file).cloned().unwrap_or_default()
    }
    pub fn fades_for(&self, file: &str) -> Vec<lsp::Range> {
        self.fades.get(file).cloned().unwrap_or_default()
    }
    pub fn files(&self) -> Vec<String> {
        let mut ans: Vec<String> = self.sets.keys().chain(self.fades.keys()).cloned().collect();
        ans.sort();
        ans.dedup();
        ans
    }
    pub fn counts(&self) -> [usize;3] {
        self.counts
    }
    /// The publishable list for a file.  Exceeding the suppression limit
    /// collapses the list to a single `SUP` diagnostic.
    pub fn publishable(&self, file: &str, limit: Option<usize>) -> Vec<lsp::Diagnostic> {
        let stored = self.stored(file);
        if let Some(limit) = limit {
            if stored.len() > limit {
                let mut sup = basic_diag(crate::lang::range(0,0,0),
                    &format!("{} diagnostics suppressed, the limit for this file is {}",stored.len(),limit),
                    lsp::DiagnosticSeverity::INFORMATION);
                sup.code = Some(lsp::NumberOrString::String(SUPPRESSED.to_string()));
                return vec![sup];
            }
        }
        stored
    }
}

//! # Language Module
//!
//! Generic document plumbing shared by the CLI and the language server.
//! The HLASM specific machinery is in the `hlasm` submodule, while objects
//! that help answer typical language client requests are in `server`.

pub mod server;
pub mod hlasm;

use lsp_types as lsp;
use thiserror::Error;
use crate::DYNERR;

#[derive(Error,Debug)]
pub enum LanguageError {
    #[error("Syntax error")]
    Syntax,
    #[error("Document could not be read")]
    Document,
    #[error("Line out of range")]
    LineRange,
}

/// A document the analyzer can process.  The text is a full snapshot,
/// incremental edits are applied by the client or server front end.
#[derive(Clone)]
pub struct Document {
    pub uri: lsp::Url,
    pub version: Option<i32>,
    pub text: String
}

impl Document {
    pub fn new(uri: lsp::Url, text: String) -> Self {
        Self {
            uri,
            version: None,
            text
        }
    }
    /// Create a document from a file path.  Invalid UTF-8 sequences are
    /// sanitized so they can be safely echoed in diagnostics.
    pub fn from_file_path(path: &std::path::Path) -> Result<Self,DYNERR> {
        let raw = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&raw).into_owned();
        match lsp::Url::from_file_path(path) {
            Ok(uri) => Ok(Self { uri, version: None, text }),
            Err(_) => Err(Box::new(LanguageError::Document))
        }
    }
    /// get a line without its terminator, if it exists
    pub fn line(&self,row: usize) -> Option<String> {
        self.text.lines().nth(row).map(|x| x.to_string())
    }
}

/// Split text into logical lines accepting any of the usual terminators.
/// The final line is produced whether or not it is terminated.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut ans = Vec::new();
    let mut curr = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                ans.push(curr);
                curr = String::new();
            },
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                ans.push(curr);
                curr = String::new();
            },
            _ => curr.push(c)
        }
    }
    if curr.len() > 0 {
        ans.push(curr);
    }
    ans
}

/// build an LSP range confined to one row
pub fn range(row: u32, beg: u32, end: u32) -> lsp::Range {
    lsp::Range::new(lsp::Position::new(row,beg),lsp::Position::new(row,end))
}

/// Normalize a URI furnished by the client.
/// Lower cases any drive letter, which resolves inconsistencies on Windows.
pub fn normalize_client_uri(uri: lsp::Url) -> lsp::Url {
    let s = uri.to_string();
    let norm = hlasm::workspace::resource::ResourceLocation::new(&s).to_string();
    match lsp::Url::parse(&norm) {
        Ok(parsed) => parsed,
        Err(_) => uri
    }
}

pub fn update_json_bool(parent: &serde_json::Value, key: &str, setting: &mut bool) {
    if let Some(val) = parent.get(key) {
        if let Some(b) = val.as_bool() {
            *setting = b;
        }
    }
}

pub fn update_json_i64(parent: &serde_json::Value, key: &str, setting: &mut i64) {
    if let Some(val) = parent.get(key) {
        if let Some(i) = val.as_i64() {
            *setting = i;
        }
    }
}

pub fn update_json_string(parent: &serde_json::Value, key: &str, setting: &mut String) {
    if let Some(val) = parent.get(key) {
        if let Some(s) = val.as_str() {
            *setting = s.to_string();
        }
    }
}

pub fn update_json_severity(parent: &serde_json::Value, key: &str, setting: &mut Option<lsp::DiagnosticSeverity>) {
    if let Some(val) = parent.get(key) {
        *setting = match val.as_str() {
            Some("error") => Some(lsp::DiagnosticSeverity::ERROR),
            Some("warn") => Some(lsp::DiagnosticSeverity::WARNING),
            Some("info") => Some(lsp::DiagnosticSeverity::INFORMATION),
            Some("hint") => Some(lsp::DiagnosticSeverity::HINT),
            Some("ignore") => None,
            _ => *setting
        };
    }
}

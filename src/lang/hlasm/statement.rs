//! Statement records produced by the statement-field parser.
//!
//! Operand fields are kept as raw text with ranges, the family processors
//! parse them on dispatch since the required operand grammar depends on the
//! resolved operation code.  Statements are modeled as plain values, a
//! deferred statement must never retain references into the live context.

use lsp_types as lsp;

/// the name field of a statement
#[derive(Clone,PartialEq,Debug)]
pub enum LabelField {
    Empty,
    /// ordinary symbol candidate
    Name(String),
    /// sequence symbol, stored without the leading dot
    Sequence(String),
    /// variable symbol target such as `&A` or `&A(2)`, stored with the ampersand
    Variable(String)
}

impl LabelField {
    pub fn is_empty(&self) -> bool {
        matches!(self,LabelField::Empty)
    }
}

#[derive(Clone,Debug)]
pub struct OperandToken {
    pub text: String,
    pub range: lsp::Range
}

/// One logical statement after continuation merging.
#[derive(Clone,Debug)]
pub struct Statement {
    /// the logical line as written, the replay and AREAD form
    pub text: String,
    /// uri string of the file holding the statement text
    pub file: String,
    pub row: u32,
    /// number of physical rows consumed, 1 unless continued
    pub row_count: u32,
    /// range of the whole statement on its first row
    pub range: lsp::Range,
    pub label: LabelField,
    pub label_range: lsp::Range,
    pub instr: String,
    pub instr_range: lsp::Range,
    pub operands: Vec<OperandToken>,
    pub operand_range: lsp::Range,
    pub remarks: Option<String>,
    /// true if any field contained a variable reference before substitution
    pub model: bool,
    /// comment or blank line
    pub empty: bool
}

impl Statement {
    pub fn empty_line(file: &str, row: u32) -> Self {
        let rng = crate::lang::range(row,0,0);
        Self {
            text: String::new(),
            file: file.to_string(),
            row,
            row_count: 1,
            range: rng,
            label: LabelField::Empty,
            label_range: rng,
            instr: String::new(),
            instr_range: rng,
            operands: Vec::new(),
            operand_range: rng,
            remarks: None,
            model: false,
            empty: true
        }
    }
    /// operand field as one string, commas restored
    pub fn operand_text(&self) -> String {
        self.operands.iter().map(|op| op.text.as_str()).collect::<Vec<&str>>().join(",")
    }
    pub fn location(&self) -> Option<lsp::Location> {
        match lsp::Url::parse(&self.file) {
            Ok(uri) => Some(lsp::Location::new(uri,self.range)),
            Err(_) => None
        }
    }
}

/// A raw stored line, the replay form used for macro bodies and copy members.
/// Replay re-parses the text, which also realizes model statements.
#[derive(Clone,Debug)]
pub struct StoredStatement {
    pub text: String,
    pub file: String,
    pub row: u32
}

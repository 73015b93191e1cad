//! Statement-field parser.
//!
//! HLASM source is a fixed 80 column format: a comment begins with `*` (or
//! `.*`) in column 1, a non-blank in column 72 continues the statement with
//! the continued text starting at column 16, and columns 73 and beyond hold
//! an ignored sequence field.  The parser merges continuations into logical
//! lines and splits each into name, operation, operand, and remark fields.
//!
//! The parser is reentrant: a model statement is realized by substituting
//! its variable references and feeding the resulting text back through
//! `reparse`, which relocates every range to the original statement so that
//! diagnostics land on the source the user actually wrote.

use super::statement::{Statement,LabelField,OperandToken};

/// 0-based index of the continuation column (column 72)
const CONT_COLUMN: usize = 71;
/// 0-based index where continued text resumes (column 16)
const CONT_START: usize = 15;

#[derive(Clone,Debug)]
pub struct LogicalLine {
    pub text: String,
    pub row: u32,
    pub row_count: u32,
    pub comment: bool
}

fn is_continued(line: &str) -> bool {
    match line.chars().nth(CONT_COLUMN) {
        Some(c) => c != ' ',
        None => false
    }
}

fn statement_text(line: &str) -> &str {
    let end = line.char_indices().nth(CONT_COLUMN).map(|(i,_)| i).unwrap_or(line.len());
    &line[..end]
}

/// Merge raw source rows into logical lines starting at `row`.
pub fn logical_lines(lines: &[String], first_row: u32) -> Vec<LogicalLine> {
    let mut ans: Vec<LogicalLine> = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let row = first_row + i as u32;
        if line.starts_with('*') || line.starts_with(".*") {
            ans.push(LogicalLine { text: line.clone(), row, row_count: 1, comment: true });
            i += 1;
            continue;
        }
        let mut text = statement_text(line).trim_end().to_string();
        let mut count = 1;
        let mut continued = is_continued(line);
        while continued && i + count < lines.len() {
            let next = &lines[i + count];
            let resumed: String = next.chars().skip(CONT_START).collect();
            let resumed = statement_text(&resumed).trim_end().to_string();
            text += &resumed;
            continued = is_continued(next);
            count += 1;
        }
        ans.push(LogicalLine { text, row, row_count: count as u32, comment: false });
        i += count;
    }
    ans
}

/// True when the apostrophe at `pos` is a data attribute operator such as
/// `L'SYM` rather than a string delimiter.  The attribute letter must begin
/// its own token.
fn is_attribute_quote(chars: &[char], pos: usize) -> bool {
    if pos == 0 {
        return false;
    }
    let letter = chars[pos-1].to_ascii_uppercase();
    if !matches!(letter,'L'|'K'|'N'|'T'|'I'|'S'|'D'|'O') {
        return false;
    }
    if pos < 2 {
        return true;
    }
    let before = chars[pos-2];
    !(before.is_ascii_alphanumeric() || before=='_' || before=='$' || before=='#' || before=='@' || before=='\'')
}

/// Find the end of the operand field: the first blank that is outside any
/// quoted string and outside parentheses.
fn operand_field_end(chars: &[char], start: usize) -> usize {
    let mut in_string = false;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\'' {
                if i + 1 < chars.len() && chars[i+1] == '\'' {
                    i += 2;
                    continue;
                }
                in_string = false;
            }
        } else if c == '\'' && !is_attribute_quote(chars,i) {
            in_string = true;
        } else if c == ' ' {
            return i;
        }
        i += 1;
    }
    chars.len()
}

/// Split an operand field on top level commas, respecting parentheses and
/// quoted strings.  Empty slots are preserved, `A,,B` yields three tokens.
pub fn split_operands(field: &str, row: u32, start_col: u32) -> Vec<OperandToken> {
    let chars: Vec<char> = field.chars().collect();
    let mut ans = Vec::new();
    if chars.is_empty() {
        return ans;
    }
    let mut depth = 0;
    let mut in_string = false;
    let mut tok_start = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if c == '\'' {
                if i + 1 < chars.len() && chars[i+1] == '\'' {
                    i += 2;
                    continue;
                }
                in_string = false;
            }
        } else {
            match c {
                '\'' if !is_attribute_quote(&chars,i) => in_string = true,
                '(' => depth += 1,
                ')' => depth -= (depth > 0) as i32,
                ',' if depth == 0 => {
                    let text: String = chars[tok_start..i].iter().collect();
                    ans.push(OperandToken {
                        text,
                        range: crate::lang::range(row,start_col + tok_start as u32,start_col + i as u32)
                    });
                    tok_start = i + 1;
                },
                _ => {}
            }
        }
        i += 1;
    }
    let text: String = chars[tok_start..].iter().collect();
    ans.push(OperandToken {
        text,
        range: crate::lang::range(row,start_col + tok_start as u32,start_col + chars.len() as u32)
    });
    ans
}

fn classify_label(token: &str) -> LabelField {
    if token.is_empty() {
        LabelField::Empty
    } else if let Some(seq) = token.strip_prefix('.') {
        LabelField::Sequence(seq.to_string())
    } else if token.starts_with('&') {
        LabelField::Variable(token.to_string())
    } else {
        LabelField::Name(token.to_string())
    }
}

/// any single ampersand marks a model statement
pub fn has_variable(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '&' {
            if i + 1 < chars.len() && chars[i+1] == '&' {
                i += 2;
                continue;
            }
            return true;
        }
        i += 1;
    }
    false
}

/// Parse one logical line into a statement record.
pub fn parse_statement(line: &LogicalLine, file: &str) -> Statement {
    if line.comment || line.text.trim().is_empty() {
        let mut stmt = Statement::empty_line(file,line.row);
        stmt.row_count = line.row_count;
        stmt.text = line.text.clone();
        return stmt;
    }
    let chars: Vec<char> = line.text.chars().collect();
    let row = line.row;
    let mut i = 0;

    // name field, present only when column 1 is non-blank
    let label_start = 0;
    if chars[0] != ' ' {
        while i < chars.len() && chars[i] != ' ' {
            i += 1;
        }
    }
    let label_text: String = chars[label_start..i].iter().collect();
    let label_range = crate::lang::range(row,label_start as u32,i as u32);

    while i < chars.len() && chars[i] == ' ' {
        i += 1;
    }

    // operation field
    let instr_start = i;
    while i < chars.len() && chars[i] != ' ' {
        i += 1;
    }
    let instr: String = chars[instr_start..i].iter().collect();
    let instr_range = crate::lang::range(row,instr_start as u32,i as u32);

    while i < chars.len() && chars[i] == ' ' {
        i += 1;
    }

    // operand field, a blank outside strings and parens ends it
    let op_start = i;
    let op_end = operand_field_end(&chars,op_start);
    let op_field: String = chars[op_start..op_end].iter().collect();
    let operand_range = crate::lang::range(row,op_start as u32,op_end as u32);
    let operands = match op_field.is_empty() {
        true => Vec::new(),
        false => split_operands(&op_field,row,op_start as u32)
    };

    let remarks: String = chars[op_end..].iter().collect();
    let remarks = match remarks.trim() {
        "" => None,
        r => Some(r.to_string())
    };

    let model = has_variable(&label_text) || has_variable(&instr) || has_variable(&op_field);

    Statement {
        text: line.text.clone(),
        file: file.to_string(),
        row,
        row_count: line.row_count,
        range: crate::lang::range(row,0,chars.len() as u32),
        label: classify_label(&label_text),
        label_range,
        instr,
        instr_range,
        operands,
        operand_range,
        remarks,
        model,
        empty: false
    }
}

/// Re-parse substituted text in place of an original statement, relocating
/// every range back to the original so diagnostics stay anchored.
pub fn reparse(text: &str, original: &Statement) -> Statement {
    let line = LogicalLine {
        text: text.to_string(),
        row: original.row,
        row_count: original.row_count,
        comment: text.starts_with('*') || text.starts_with(".*")
    };
    let mut stmt = parse_statement(&line,&original.file);
    stmt.range = original.range;
    stmt.label_range = original.range;
    stmt.instr_range = original.instr_range;
    stmt.operand_range = original.operand_range;
    for op in stmt.operands.iter_mut() {
        op.range = original.operand_range;
    }
    stmt.model = false;
    stmt
}

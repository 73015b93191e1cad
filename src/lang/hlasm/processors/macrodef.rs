//! Macro definition processor.
//!
//! Accumulates the raw statements between MACRO and the matching MEND into
//! a fresh macro definition.  The first statement is the prototype: its name
//! field may be a variable parameter, its operand field is a comma separated
//! parameter list with optional `NAME=default` keyword syntax.  Nested
//! MACRO/MEND pairs are stored verbatim, they define inner macros when the
//! outer body is replayed.  An in-macro COPY pulls the member's statements
//! through the copy provider so they land in the body like any others.

use std::collections::{HashMap,HashSet};
use lsp_types as lsp;
use super::{Pass,resolve_copy_member};
use super::super::context::{MacroDef,ResolvedOp};
use super::super::ids::Id;
use super::super::opcodes::InstructionKind;
use super::super::statement::{Statement,LabelField,StoredStatement};
use super::super::variables::MacroParamSpec;
use super::super::parser;
use std::sync::Arc;

pub struct MacroDefState {
    awaiting_prototype: bool,
    /// nested MACRO depth inside the body
    nest: usize,
    id: Option<Id>,
    label_param: Option<Id>,
    params: Vec<MacroParamSpec>,
    body: Vec<StoredStatement>,
    labels: HashMap<Id,usize>,
    copy_members_used: HashSet<String>,
    file: String,
    start_range: lsp::Range,
    location: Option<lsp::Location>
}

impl MacroDefState {
    pub fn new(macro_stmt: &Statement) -> Self {
        Self {
            awaiting_prototype: true,
            nest: 0,
            id: None,
            label_param: None,
            params: Vec::new(),
            body: Vec::new(),
            labels: HashMap::new(),
            copy_members_used: HashSet::new(),
            file: macro_stmt.file.clone(),
            start_range: macro_stmt.range,
            location: macro_stmt.location()
        }
    }

    pub fn file(&self) -> String {
        self.file.clone()
    }
    /// record a copy member pulled in at definition time
    pub fn note_copy_member(&mut self, uri: String) {
        self.copy_members_used.insert(uri);
    }
    pub fn start_range(&self) -> lsp::Range {
        self.start_range
    }

    fn prototype(&mut self, pass: &mut Pass, stmt: &Statement) {
        self.awaiting_prototype = false;
        match &stmt.label {
            LabelField::Variable(text) => {
                let name = text.trim_start_matches('&');
                self.label_param = Some(pass.ctx.intern(name));
            },
            LabelField::Empty => {},
            _ => {
                pass.diags.add(&stmt.file,stmt.label_range,"E074",
                    "macro prototype name field must be a variable parameter or blank");
            }
        }
        if stmt.instr.is_empty() {
            pass.diags.add(&stmt.file,stmt.range,"E074","macro prototype requires a name");
            return;
        }
        self.id = Some(pass.ctx.intern(&stmt.instr));
        self.location = stmt.location();
        for op in stmt.operands.iter() {
            let text = op.text.trim();
            if text.is_empty() {
                continue;
            }
            let Some(rest) = text.strip_prefix('&') else {
                pass.diags.add(&stmt.file,op.range,"E074",
                    &format!("macro prototype parameter {} must begin with an ampersand",text));
                continue;
            };
            match rest.split_once('=') {
                Some((name,default)) => self.params.push(MacroParamSpec {
                    name: pass.ctx.intern(name),
                    keyword: true,
                    default: Some(default.to_string())
                }),
                None => self.params.push(MacroParamSpec {
                    name: pass.ctx.intern(rest),
                    keyword: false,
                    default: None
                })
            }
        }
    }

    /// Process a body statement.  Returns true when the definition closed.
    pub fn process(&mut self, pass: &mut Pass, stmt: &Statement) -> bool {
        if self.awaiting_prototype {
            if stmt.empty {
                return false;
            }
            self.prototype(pass,stmt);
            return false;
        }
        if stmt.text.starts_with(".*") {
            return false;
        }
        // mnemonics resolve through the overlay, an OPSYN alias of MACRO or
        // MEND behaves like the real thing
        let canon = match stmt.instr.is_empty() || parser::has_variable(&stmt.instr) {
            true => None,
            false => {
                let id = pass.ctx.intern(&stmt.instr);
                match pass.ctx.resolve_op(&id) {
                    ResolvedOp::Op(op) if op.kind == InstructionKind::Ca || op.kind == InstructionKind::Assembler =>
                        Some(pass.ctx.pool.string(&op.canon)),
                    _ => None
                }
            }
        };
        match canon.as_deref() {
            Some("MACRO") => {
                self.nest += 1;
            },
            Some("MEND") => {
                if self.nest == 0 {
                    self.finish(pass);
                    return true;
                }
                self.nest -= 1;
            },
            Some("COPY") if self.nest == 0 => {
                // performed at definition time, the member's statements
                // stream into the body through the copy provider
                let name = stmt.operand_text();
                let name = name.trim();
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c,'_'|'$'|'#'|'@')) {
                    pass.diags.add(&stmt.file,stmt.operand_range,"E058","COPY requires a single member name");
                    return false;
                }
                let id = pass.ctx.intern(name);
                if pass.ctx.copy_active(&id) {
                    pass.diags.add(&stmt.file,stmt.range,"E062",
                        &format!("recursive COPY of member {}",name));
                    return false;
                }
                if let Some(member) = resolve_copy_member(pass,name,stmt) {
                    self.copy_members_used.insert(member.file.clone());
                    pass.ctx.enter_copy(member);
                }
                return false;
            },
            _ => {}
        }
        if self.nest == 0 {
            if let LabelField::Sequence(name) = &stmt.label {
                let id = pass.ctx.intern(name);
                self.labels.insert(id,self.body.len());
            }
        }
        self.body.push(StoredStatement {
            text: stmt.text.clone(),
            file: stmt.file.clone(),
            row: stmt.row
        });
        false
    }

    fn finish(&mut self, pass: &mut Pass) {
        let Some(id) = self.id else {
            return;
        };
        let def = MacroDef {
            id,
            label_param: self.label_param,
            params: std::mem::take(&mut self.params),
            body: std::mem::take(&mut self.body),
            labels: std::mem::take(&mut self.labels),
            location: self.location.clone(),
            copy_members_used: std::mem::take(&mut self.copy_members_used)
        };
        log::debug!("defined macro {} with {} statements",pass.ctx.pool.string(&id),def.body.len());
        pass.ctx.macros.insert(id,Arc::new(def));
    }
}

//! Statement processors.
//!
//! Exactly one processor is active at a time.  The ordinary processor
//! dispatches statements to the instruction families; the macro definition
//! processor accumulates statements between MACRO and its matching MEND;
//! the lookahead processor scans ahead for attribute-affecting definitions
//! or a forward sequence symbol without ordinary side effects.  Transitions
//! are driven by the active instruction and surface here as `Interrupt`
//! values so the manager alone mutates the processor stack.
//!
//! Copy member processing reuses the ordinary handlers; entering a member
//! records a copy frame so diagnostics are charged to the member's file.

pub mod macrodef;
pub mod lookahead;

use std::sync::Arc;
use super::context::{HlasmContext,ResolvedOp,ProcessingKind,ProcessingFrame,SeqSymbol,CopyMember};
use super::statement::{Statement,LabelField};
use super::parser;
use super::expressions::ca::{self,CaError};
use super::diagnostics::DiagnosticSet;
use super::instructions;
use super::opcodes::InstructionKind;
use super::workspace::libraries::LibraryProvider;
use macrodef::MacroDefState;
use lookahead::{LookaheadState,LookaheadGoal,Outcome};

/// Everything one analysis pass owns.  Deliberately a plain value bundle,
/// instruction handlers receive `&mut Pass` and nothing else.
pub struct Pass<'a> {
    pub ctx: HlasmContext,
    pub diags: DiagnosticSet,
    pub libs: &'a mut dyn LibraryProvider
}

/// a processor's request to change the processing state
pub enum Interrupt {
    /// MACRO seen under ordinary processing
    MacroDef(Statement),
    /// an attribute or forward branch needs a side pass
    Lookahead(LookaheadGoal),
    /// END was processed
    EndPass
}

enum Processor {
    Ordinary,
    MacroDef(MacroDefState),
    Lookahead(LookaheadState)
}

pub struct Manager {
    stack: Vec<Processor>
}

impl Manager {
    pub fn new() -> Self {
        Self { stack: vec![Processor::Ordinary] }
    }

    pub fn in_lookahead(&self) -> bool {
        matches!(self.stack.last(),Some(Processor::Lookahead(_)))
    }

    /// Feed one statement to the active processor.
    /// Returns false when the pass is over.
    pub fn process(&mut self, pass: &mut Pass, stmt: Statement) -> bool {
        let active = self.stack.last_mut().expect("processor stack never empty");
        match active {
            Processor::Ordinary => {
                match process_ordinary(pass,stmt) {
                    Some(Interrupt::MacroDef(macro_stmt)) => {
                        pass.ctx.processing_stack.push(ProcessingFrame {
                            kind: ProcessingKind::MacroDef,
                            file: macro_stmt.file.clone()
                        });
                        self.stack.push(Processor::MacroDef(MacroDefState::new(&macro_stmt)));
                    },
                    Some(Interrupt::Lookahead(goal)) => {
                        // lookahead never runs two simultaneous instances
                        let state = LookaheadState::start(pass,goal);
                        pass.ctx.processing_stack.push(ProcessingFrame {
                            kind: ProcessingKind::Lookahead,
                            file: pass.ctx.current_file()
                        });
                        self.stack.push(Processor::Lookahead(state));
                    },
                    Some(Interrupt::EndPass) => return false,
                    None => {}
                }
            },
            Processor::MacroDef(state) => {
                if state.process(pass,&stmt) {
                    pass.ctx.processing_stack.pop();
                    self.stack.pop();
                }
            },
            Processor::Lookahead(state) => {
                match state.process(pass,&stmt) {
                    Outcome::Continue => {},
                    Outcome::Finished { retry } => {
                        pass.ctx.processing_stack.pop();
                        self.stack.pop();
                        if let Some(stmt) = retry {
                            // nested attribute queries are answered with
                            // defaults, so this cannot recurse unboundedly
                            return self.process(pass,stmt);
                        }
                    }
                }
            }
        }
        true
    }

    /// The providers ran dry.  An active lookahead winds back to where it
    /// started; true means the caller should keep pulling statements.
    pub fn end_of_source(&mut self, pass: &mut Pass) -> bool {
        match self.stack.last_mut() {
            Some(Processor::Lookahead(state)) => {
                let retry = state.abandon(pass);
                pass.ctx.processing_stack.pop();
                self.stack.pop();
                if let Some(stmt) = retry {
                    self.process(pass,stmt);
                }
                true
            },
            Some(Processor::MacroDef(state)) => {
                pass.diags.add(&state.file(),state.start_range(),"E046","MACRO definition is never closed by MEND");
                pass.ctx.processing_stack.pop();
                self.stack.pop();
                true
            },
            _ => false
        }
    }
}

/// translate a CA evaluation failure into a diagnostic or a lookahead
pub fn report_ca(pass: &mut Pass, stmt: &Statement, err: CaError) -> Option<Interrupt> {
    match err {
        CaError::Need(name) => {
            let symbol = pass.ctx.intern(&name);
            Some(Interrupt::Lookahead(LookaheadGoal::SymbolAttrs {
                symbol,
                retry: stmt.clone()
            }))
        },
        CaError::Msg(code,mess) => {
            pass.diags.add(&stmt.file,stmt.operand_range,code,&mess);
            None
        }
    }
}

/// Fetch a copy member by name, from the context cache or the library
/// resolver.  Returns None (with a diagnostic) when no library has it.
pub fn resolve_copy_member(pass: &mut Pass, name: &str, stmt: &Statement) -> Option<Arc<CopyMember>> {
    let id = pass.ctx.intern(name);
    if let Some(member) = pass.ctx.copy_members.get(&id) {
        return Some(member.clone());
    }
    match pass.libs.get_member(name) {
        Some(doc) => {
            let raw = crate::lang::split_lines(&doc.text);
            let member = Arc::new(CopyMember {
                id,
                file: doc.uri.to_string(),
                lines: parser::logical_lines(&raw,0)
            });
            pass.ctx.copy_members.insert(id,member.clone());
            Some(member)
        },
        None => {
            pass.diags.add(&stmt.file,stmt.operand_range,"E058",
                &format!("copy member {} not found in any library",name));
            None
        }
    }
}

/// The ordinary path: register sequence labels, realize model statements,
/// resolve the operation code, dispatch to the instruction family.
fn process_ordinary(pass: &mut Pass, stmt: Statement) -> Option<Interrupt> {
    if stmt.empty {
        return None;
    }
    let mut stmt = stmt;
    // a sequence symbol in open code records the position right after itself
    if let LabelField::Sequence(name) = &stmt.label {
        if !pass.ctx.is_in_macro() {
            let id = pass.ctx.intern(name);
            let snap = pass.ctx.snapshot();
            pass.ctx.current_scope_mut().sequence_symbols.entry(id).or_insert(SeqSymbol::Opencode(snap));
        }
    }
    // the operation field itself may need substitution
    if parser::has_variable(&stmt.instr) {
        match ca::substitute(&stmt.instr,&pass.ctx) {
            Ok(subst) => stmt.instr = subst.trim().to_string(),
            Err(err) => return report_ca(pass,&stmt,err)
        }
    }
    if stmt.instr.is_empty() {
        return None;
    }
    let op_id = pass.ctx.intern(&stmt.instr);
    let mut resolved = pass.ctx.resolve_op(&op_id);
    // realize a model statement; conditional assembly reads its operands raw
    let is_ca = matches!(&resolved,ResolvedOp::Op(op) if op.kind == InstructionKind::Ca);
    if stmt.model && !is_ca {
        match ca::substitute(&stmt.text,&pass.ctx) {
            Ok(new_text) => {
                stmt = parser::reparse(&new_text,&stmt);
                if stmt.empty || stmt.instr.is_empty() {
                    return None;
                }
                let op_id = pass.ctx.intern(&stmt.instr);
                resolved = pass.ctx.resolve_op(&op_id);
            },
            Err(err) => return report_ca(pass,&stmt,err)
        }
    }
    match resolved {
        ResolvedOp::Op(op) => match op.kind {
            InstructionKind::Ca => instructions::ca::process(pass,&stmt,&op),
            InstructionKind::Assembler => instructions::asm::process(pass,&stmt,&op),
            InstructionKind::Machine | InstructionKind::Mnemonic => {
                instructions::mach::process(pass,&stmt,&op);
                None
            },
            _ => None
        },
        ResolvedOp::Macro(mac) => instructions::macro_call::process(pass,&stmt,mac),
        ResolvedOp::Undefined => {
            // the name may be a library macro that was never needed before
            if instructions::macro_call::load_library_macro(pass,&stmt.instr) {
                let op_id = pass.ctx.intern(&stmt.instr);
                if let ResolvedOp::Macro(mac) = pass.ctx.resolve_op(&op_id) {
                    return instructions::macro_call::process(pass,&stmt,mac);
                }
            }
            pass.diags.add(&stmt.file,stmt.instr_range,"E049",
                &format!("undefined operation code {}",stmt.instr));
            None
        }
    }
}

//! Lookahead processor.
//!
//! A temporary side pass with two triggers: an attribute reference needs a
//! symbol that is not defined yet, or a forward AIF/AGO branch in open code
//! names a sequence symbol not seen yet.  The scan collects *only*
//! attribute-affecting definitions (EQU, DC, DS, section statements,
//! machine labels) into a side table, it never touches the location
//! counters or the ordinary symbol values.
//!
//! An attribute lookahead winds back to its starting snapshot and retries
//! the triggering statement.  A branch lookahead continues from the found
//! label and fades everything it skipped.  Only one instance ever runs:
//! attribute queries raised while scanning are answered with defaults.

use super::Pass;
use super::super::context::{Snapshot,SeqSymbol,ResolvedOp};
use super::super::ids::Id;
use super::super::opcodes::InstructionKind;
use super::super::statement::{Statement,LabelField};
use super::super::context::ordinary::SymbolAttrs;
use super::super::data_def::DataDef;
use super::super::parser;

#[derive(Clone,Debug)]
pub enum LookaheadGoal {
    /// find attribute data for a symbol, then retry the statement
    SymbolAttrs { symbol: Id, retry: Statement },
    /// skip forward to a sequence symbol
    SeqBranch { target: Id }
}

pub enum Outcome {
    Continue,
    /// lookahead over; the statement, if any, re-enters ordinary processing
    Finished { retry: Option<Statement> }
}

pub struct LookaheadState {
    goal: LookaheadGoal,
    snapshot: Snapshot,
    /// MACRO nest depth, definitions are opaque to the scan
    nest: usize
}

impl LookaheadState {
    pub fn start(pass: &mut Pass, goal: LookaheadGoal) -> Self {
        log::trace!("start lookahead");
        Self {
            goal,
            snapshot: pass.ctx.snapshot(),
            nest: 0
        }
    }

    /// end of source reached, unwind according to the goal
    pub fn abandon(&mut self, pass: &mut Pass) -> Option<Statement> {
        match &self.goal {
            LookaheadGoal::SymbolAttrs { symbol, retry } => {
                pass.ctx.lookahead_failed.insert(*symbol);
                pass.ctx.restore(&self.snapshot);
                Some(retry.clone())
            },
            LookaheadGoal::SeqBranch { target } => {
                let name = pass.ctx.pool.string(target);
                let file = pass.ctx.current_file();
                pass.diags.add(&file,crate::lang::range(0,0,0),"E047",
                    &format!("undefined sequence symbol .{}",name));
                pass.ctx.restore(&self.snapshot);
                None
            }
        }
    }

    pub fn process(&mut self, pass: &mut Pass, stmt: &Statement) -> Outcome {
        if stmt.empty {
            return Outcome::Continue;
        }
        let branching = matches!(&self.goal,LookaheadGoal::SeqBranch {..});
        let canon = self.canon_op(pass,stmt);
        match canon.as_deref() {
            Some("MACRO") => {
                self.nest += 1;
                if branching {
                    pass.diags.fade(&stmt.file,stmt.range);
                }
                return Outcome::Continue;
            },
            Some("MEND") if self.nest > 0 => {
                self.nest -= 1;
                if branching {
                    pass.diags.fade(&stmt.file,stmt.range);
                }
                return Outcome::Continue;
            },
            _ => {}
        }
        if self.nest > 0 {
            if branching {
                pass.diags.fade(&stmt.file,stmt.range);
            }
            return Outcome::Continue;
        }
        // the landing statement of a branch is handed back to the ordinary
        // processor unfaded, everything passed over dims
        if let LookaheadGoal::SeqBranch { target } = &self.goal {
            if let LabelField::Sequence(name) = &stmt.label {
                let id = pass.ctx.intern(name);
                if id == *target {
                    log::trace!("lookahead found sequence symbol");
                    return Outcome::Finished { retry: Some(stmt.clone()) };
                }
                if !pass.ctx.is_in_macro() {
                    let snap = pass.ctx.snapshot();
                    pass.ctx.current_scope_mut().sequence_symbols.entry(id).or_insert(SeqSymbol::Opencode(snap));
                }
            }
            pass.diags.fade(&stmt.file,stmt.range);
        }
        self.collect(pass,stmt,canon.as_deref());
        match canon.as_deref() {
            Some("COPY") => {
                let name = stmt.operand_text();
                let name = name.trim().to_string();
                if !name.is_empty() {
                    let id = pass.ctx.intern(&name);
                    if !pass.ctx.copy_active(&id) {
                        if let Some(member) = super::resolve_copy_member(pass,&name,stmt) {
                            pass.ctx.enter_copy(member);
                        }
                    }
                }
            },
            Some("END") => {
                return match &self.goal {
                    LookaheadGoal::SymbolAttrs { symbol, retry } => {
                        pass.ctx.lookahead_failed.insert(*symbol);
                        pass.ctx.restore(&self.snapshot);
                        Outcome::Finished { retry: Some(retry.clone()) }
                    },
                    LookaheadGoal::SeqBranch { target } => {
                        let name = pass.ctx.pool.string(target);
                        pass.diags.add(&stmt.file,stmt.range,"E047",
                            &format!("undefined sequence symbol .{}",name));
                        pass.ctx.restore(&self.snapshot);
                        Outcome::Finished { retry: None }
                    }
                };
            },
            _ => {}
        }
        // did the scan satisfy an attribute goal
        if let LookaheadGoal::SymbolAttrs { symbol, retry } = &self.goal {
            if pass.ctx.lookahead_attrs.contains_key(symbol) || pass.ctx.ord.defined(symbol) {
                log::trace!("lookahead found symbol attributes");
                let retry = retry.clone();
                pass.ctx.restore(&self.snapshot);
                return Outcome::Finished { retry: Some(retry) };
            }
        }
        Outcome::Continue
    }

    /// canonical name of the operation, through the OPSYN overlay
    fn canon_op(&self, pass: &mut Pass, stmt: &Statement) -> Option<String> {
        if stmt.instr.is_empty() || parser::has_variable(&stmt.instr) {
            return None;
        }
        let id = pass.ctx.intern(&stmt.instr);
        match pass.ctx.resolve_op(&id) {
            ResolvedOp::Op(op) => Some(pass.ctx.pool.string(&op.canon)),
            _ => None
        }
    }

    /// harvest attribute data without ordinary side effects
    fn collect(&self, pass: &mut Pass, stmt: &Statement, canon: Option<&str>) {
        let LabelField::Name(name) = &stmt.label else {
            return;
        };
        if parser::has_variable(name) {
            return;
        }
        let id = pass.ctx.intern(name);
        if pass.ctx.ord.defined(&id) || pass.ctx.lookahead_attrs.contains_key(&id) {
            return;
        }
        let attrs = match canon {
            Some("EQU") => {
                let length = stmt.operands.get(1)
                    .and_then(|op| op.text.trim().parse::<u16>().ok())
                    .unwrap_or(1);
                let type_attr = stmt.operands.get(2)
                    .and_then(|op| op.text.trim().parse::<u8>().ok())
                    .unwrap_or(b'U');
                Some(SymbolAttrs::with_type(type_attr,length))
            },
            Some("DC") | Some("DS") | Some("DXD") => {
                match stmt.operands.first().map(|op| DataDef::parse(&op.text)) {
                    Some(Ok(def)) => Some(SymbolAttrs::with_type(def.type_letter as u8,def.length_attr())),
                    _ => None
                }
            },
            Some("CSECT") | Some("DSECT") | Some("RSECT") | Some("COM") | Some("LOCTR") | Some("START") =>
                Some(SymbolAttrs::with_type(b'J',1)),
            Some("CNOP") | Some("CCW") | Some("CCW0") | Some("CCW1") => Some(SymbolAttrs::with_type(b'I',2)),
            _ => {
                // a machine instruction label has type I and the encoded size
                let op_id = pass.ctx.intern(&stmt.instr);
                match pass.ctx.resolve_op(&op_id) {
                    ResolvedOp::Op(op) if matches!(op.kind,InstructionKind::Machine | InstructionKind::Mnemonic) => {
                        let size = op.mach.map(|m| m.format.size()).unwrap_or(2);
                        Some(SymbolAttrs::with_type(b'I',size.clamp(0,65535) as u16))
                    },
                    _ => None
                }
            }
        };
        if let Some(attrs) = attrs {
            pass.ctx.lookahead_attrs.insert(id,attrs);
        }
    }
}

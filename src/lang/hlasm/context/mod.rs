//! HLASM context module used for analysis.
//!
//! This owns everything a single pass mutates: the identifier pool, the
//! OPSYN overlay, variable and ordinary symbol tables, macro and copy member
//! storage, and three containment stacks:
//!
//! 1. Scope stack - one frame per active macro invocation plus the open code frame
//! 2. Source stack - the chain of files being processed, AINSERT buffers nest on top
//! 3. Copy stack - active COPY invocations inside each source
//!
//! Two contexts never exchange identifiers, each owns its pool.

pub mod ordinary;

use std::collections::{HashMap,HashSet};
use std::sync::Arc;
use lsp_types as lsp;
use super::ids::{Id,IdPool};
use super::opcodes::{self,Opcode,OpcodeRef,OpsynLayer};
use super::variables::{VarSym,SetSymbol,MacroParamData,MacroParamSpec,CaValue};
use super::statement::StoredStatement;
use super::parser::LogicalLine;
use super::{DEFAULT_ACTR,DEFAULT_SYSNDX_LIMIT};
use ordinary::OrdinaryContext;

#[derive(Clone,Debug)]
pub struct MacroDef {
    pub id: Id,
    /// name field parameter of the prototype
    pub label_param: Option<Id>,
    pub params: Vec<MacroParamSpec>,
    pub body: Vec<StoredStatement>,
    /// sequence symbol to body index
    pub labels: HashMap<Id,usize>,
    pub location: Option<lsp::Location>,
    /// uri strings of every copy member the definition pulled in
    pub copy_members_used: HashSet<String>
}

#[derive(Clone,Debug)]
pub struct CopyMember {
    pub id: Id,
    pub file: String,
    pub lines: Vec<LogicalLine>
}

/// where a sequence symbol points
#[derive(Clone,Debug)]
pub enum SeqSymbol {
    /// index into the enclosing macro body
    MacroBody(usize),
    /// open code position to restore on a backward branch
    Opencode(Snapshot)
}

/// positions of the source and copy stacks, used by sequence symbols and
/// by the lookahead processor to return to where it started
#[derive(Clone,PartialEq,Debug)]
pub struct Snapshot {
    /// position per source frame, bottom first
    pub source_pos: Vec<usize>,
    /// copy stack of the top source frame: member and position
    pub copy_pos: Vec<(Id,usize)>,
    /// replay position per scope frame, open code first (no entry for it)
    pub macro_pos: Vec<usize>
}

#[derive(Clone,Debug)]
pub struct MacroInvocation {
    pub id: Id,
    /// replay position in the body
    pub pos: usize,
    pub sysndx: usize
}

pub struct CodeScope {
    pub variables: HashMap<Id,VarSym>,
    /// names that resolve to the shared globals table
    pub global_names: HashSet<Id>,
    pub sequence_symbols: HashMap<Id,SeqSymbol>,
    /// ACTR counter, decremented by every AIF/AGO branch taken
    pub branch_counter: i64,
    pub branch_limit_hit: bool,
    pub invocation: Option<MacroInvocation>
}

impl CodeScope {
    pub fn new(invocation: Option<MacroInvocation>) -> Self {
        Self {
            variables: HashMap::new(),
            global_names: HashSet::new(),
            sequence_symbols: HashMap::new(),
            branch_counter: DEFAULT_ACTR,
            branch_limit_hit: false,
            invocation
        }
    }
}

#[derive(Clone,Debug)]
pub struct CopyFrame {
    pub member: Id,
    pub file: String,
    pub pos: usize,
    /// the frame was re-entered after a lookahead return
    pub reenter: bool
}

pub struct SourceFrame {
    pub file: String,
    pub lines: Vec<LogicalLine>,
    pub pos: usize,
    /// true for AINSERT virtual buffers
    pub ainsert: bool,
    pub copy_stack: Vec<CopyFrame>
}

impl SourceFrame {
    pub fn new(file: String, lines: Vec<LogicalLine>, ainsert: bool) -> Self {
        Self {
            file,
            lines,
            pos: 0,
            ainsert,
            copy_stack: Vec::new()
        }
    }
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum ProcessingKind {
    Ordinary,
    MacroDef,
    Lookahead,
    Copy
}

#[derive(Clone,Debug)]
pub struct ProcessingFrame {
    pub kind: ProcessingKind,
    pub file: String
}

#[derive(Clone,Debug,Default)]
pub struct AsmOptions {
    pub sysparm: String,
    pub profile: String,
    pub optable: String,
    pub goff: bool,
    pub xobject: bool
}

/// what a name means as an operation code right now
#[derive(Clone,PartialEq,Debug)]
pub enum ResolvedOp {
    Op(Opcode),
    Macro(Id),
    Undefined
}

pub struct HlasmContext {
    pub pool: IdPool,
    pub opsyn: OpsynLayer,
    pub globals: HashMap<Id,SetSymbol>,
    pub macros: HashMap<Id,Arc<MacroDef>>,
    pub copy_members: HashMap<Id,Arc<CopyMember>>,
    pub scope_stack: Vec<CodeScope>,
    pub source_stack: Vec<SourceFrame>,
    pub processing_stack: Vec<ProcessingFrame>,
    pub ord: OrdinaryContext,
    pub sysndx: usize,
    /// MHELP-settable invocation ceiling
    pub sysndx_limit: usize,
    pub asm_options: AsmOptions,
    pub opencode_file: String,
    pub visited_files: HashSet<String>,
    /// symbols a completed lookahead failed to find, they answer with defaults
    pub lookahead_failed: HashSet<Id>,
    /// attributes gathered by lookahead, consulted after the symbol table
    pub lookahead_attrs: HashMap<Id,ordinary::SymbolAttrs>,
    /// macros that were actually invoked, never-invoked ones fade
    pub invoked_macros: HashSet<Id>,
    sysdate: String,
    systime: String
}

impl HlasmContext {
    pub fn new(file: String, lines: Vec<LogicalLine>, asm_options: AsmOptions) -> Self {
        log::debug!("create context for {}",file);
        let now = chrono::Local::now();
        let mut visited_files = HashSet::new();
        visited_files.insert(file.clone());
        Self {
            pool: IdPool::new(),
            opsyn: OpsynLayer::new(),
            globals: HashMap::new(),
            macros: HashMap::new(),
            copy_members: HashMap::new(),
            scope_stack: vec![CodeScope::new(None)],
            source_stack: vec![SourceFrame::new(file.clone(),lines,false)],
            processing_stack: vec![ProcessingFrame { kind: ProcessingKind::Ordinary, file: file.clone() }],
            ord: OrdinaryContext::new(),
            sysndx: 0,
            sysndx_limit: DEFAULT_SYSNDX_LIMIT,
            asm_options,
            opencode_file: file,
            visited_files,
            lookahead_failed: HashSet::new(),
            lookahead_attrs: HashMap::new(),
            invoked_macros: HashSet::new(),
            sysdate: now.format("%m/%d/%y").to_string(),
            systime: now.format("%H.%M").to_string()
        }
    }

    pub fn intern(&mut self, s: &str) -> Id {
        self.pool.intern(s)
    }

    /// Resolve a name as an operation code: OPSYN overlay first, then macro
    /// storage, then the immutable base table.  A tombstone in the overlay
    /// answers Undefined even when the base table knows the name.
    pub fn resolve_op(&self, id: &Id) -> ResolvedOp {
        match self.opsyn.lookup(id) {
            Some(Some(OpcodeRef::Op(op))) => return ResolvedOp::Op(op),
            Some(Some(OpcodeRef::Macro(mac))) => return ResolvedOp::Macro(mac),
            Some(None) => return ResolvedOp::Undefined,
            None => {}
        }
        if self.macros.contains_key(id) {
            return ResolvedOp::Macro(*id);
        }
        match opcodes::base_table().get(id) {
            Some(op) => ResolvedOp::Op(*op),
            None => ResolvedOp::Undefined
        }
    }

    /// printable resolution of a name, the macro cache compares these
    pub fn op_repr(&self, name: &str) -> String {
        match self.pool.find(name) {
            Some(id) => match self.resolve_op(&id) {
                ResolvedOp::Op(op) => format!("O:{}",self.pool.string(&op.canon)),
                ResolvedOp::Macro(mac) => format!("M:{}",self.pool.string(&mac)),
                ResolvedOp::Undefined => "U".to_string()
            },
            None => "U".to_string()
        }
    }

    /// the opcode state restricted to the given names, the macro cache key
    pub fn restrict_opcodes(&self, names: &[Id]) -> Vec<(Id,ResolvedOp)> {
        let mut ans: Vec<(Id,ResolvedOp)> = names.iter().map(|id| (*id,self.resolve_op(id))).collect();
        ans.sort_by(|a,b| a.0.cmp(&b.0));
        ans
    }

    pub fn current_scope(&self) -> &CodeScope {
        self.scope_stack.last().expect("scope stack never empty")
    }
    pub fn current_scope_mut(&mut self) -> &mut CodeScope {
        self.scope_stack.last_mut().expect("scope stack never empty")
    }
    pub fn is_in_macro(&self) -> bool {
        self.scope_stack.len() > 1
    }
    pub fn this_macro(&self) -> Option<&MacroInvocation> {
        self.current_scope().invocation.as_ref()
    }

    /// look up a variable in the current scope, falling through to globals
    /// for names declared GBL here
    pub fn get_var(&self, id: &Id) -> Option<VarSym> {
        let scope = self.current_scope();
        if let Some(v) = scope.variables.get(id) {
            return Some(v.clone());
        }
        if scope.global_names.contains(id) {
            if let Some(g) = self.globals.get(id) {
                return Some(VarSym::Set(g.clone()));
            }
        }
        None
    }

    /// values of the system variable symbols that read as plain strings
    pub fn system_var(&self, name: &str) -> Option<CaValue> {
        match name {
            "SYSNDX" => {
                let n = self.this_macro().map(|m| m.sysndx).unwrap_or(0);
                Some(CaValue::C(format!("{:04}",n)))
            },
            "SYSECT" => {
                let sect = self.ord.curr_section.map(|s| self.ord.section(s).name);
                match sect.flatten() {
                    Some(id) => Some(CaValue::C(self.pool.string(&id))),
                    None => Some(CaValue::C(String::new()))
                }
            },
            "SYSMAC" => {
                match self.this_macro() {
                    Some(m) => Some(CaValue::C(self.pool.string(&m.id))),
                    None => Some(CaValue::C("OPEN CODE".to_string()))
                }
            },
            "SYSPARM" => Some(CaValue::C(self.asm_options.sysparm.clone())),
            "SYSDATE" => Some(CaValue::C(self.sysdate.clone())),
            "SYSTIME" => Some(CaValue::C(self.systime.clone())),
            "SYSNEST" => Some(CaValue::A(self.scope_stack.len() as i64 - 1)),
            _ => None
        }
    }

    /// Enter a macro: push a scope with the parameter bindings, a fresh
    /// branch counter, and SYSLIST built from the positional arguments.
    pub fn enter_macro(&mut self, def: Arc<MacroDef>, label_data: MacroParamData,
        bindings: Vec<(Id,MacroParamData)>, syslist: Vec<MacroParamData>) {
        self.sysndx += 1;
        let mut scope = CodeScope::new(Some(MacroInvocation {
            id: def.id,
            pos: 0,
            sysndx: self.sysndx
        }));
        if let Some(label_param) = def.label_param {
            scope.variables.insert(label_param,VarSym::Param(label_data.clone()));
        }
        for (name,data) in bindings {
            scope.variables.insert(name,VarSym::Param(data));
        }
        let syslist_id = self.pool.intern("SYSLIST");
        let mut items = vec![label_data];
        items.extend(syslist);
        scope.variables.insert(syslist_id,VarSym::Param(MacroParamData::List(items)));
        for (label,idx) in def.labels.iter() {
            scope.sequence_symbols.insert(*label,SeqSymbol::MacroBody(*idx));
        }
        log::trace!("enter macro {}",self.pool.string(&def.id));
        self.invoked_macros.insert(def.id);
        self.scope_stack.push(scope);
    }

    pub fn leave_macro(&mut self) {
        if self.scope_stack.len() > 1 {
            self.scope_stack.pop();
        }
    }

    /// push a copy frame on the current source, recursion must be rejected
    /// by the caller through `copy_active`
    pub fn enter_copy(&mut self, member: Arc<CopyMember>) {
        self.visited_files.insert(member.file.clone());
        let frame = CopyFrame {
            member: member.id,
            file: member.file.clone(),
            pos: 0,
            reenter: false
        };
        self.processing_stack.push(ProcessingFrame {
            kind: ProcessingKind::Copy,
            file: member.file.clone()
        });
        if let Some(src) = self.source_stack.last_mut() {
            src.copy_stack.push(frame);
        }
    }

    pub fn leave_copy(&mut self) {
        if let Some(src) = self.source_stack.last_mut() {
            if src.copy_stack.pop().is_some() {
                if self.processing_stack.len() > 1 {
                    self.processing_stack.pop();
                }
            }
        }
    }

    /// is the member active anywhere in the copy nest
    pub fn copy_active(&self, member: &Id) -> bool {
        self.source_stack.iter().any(|src| src.copy_stack.iter().any(|f| f.member == *member))
    }

    /// the file diagnostics should be charged to right now
    pub fn current_file(&self) -> String {
        match self.source_stack.last() {
            Some(src) => match src.copy_stack.last() {
                Some(frame) => frame.file.clone(),
                None => src.file.clone()
            },
            None => self.opencode_file.clone()
        }
    }

    /// Queue an AINSERT record.  The virtual buffer nests above the current
    /// source, FRONT inserts at the consumption point, BACK appends.
    pub fn ainsert(&mut self, text: String, front: bool) {
        let line = LogicalLine { text, row: 0, row_count: 1, comment: false };
        let on_top = self.source_stack.last().map(|s| s.ainsert).unwrap_or(false);
        if on_top {
            let frame = self.source_stack.last_mut().expect("checked above");
            match front {
                true => frame.lines.insert(frame.pos,line),
                false => frame.lines.push(line)
            }
        } else {
            let file = self.current_file();
            self.source_stack.push(SourceFrame::new(file,vec![line],true));
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let source_pos = self.source_stack.iter().map(|s| s.pos).collect();
        let copy_pos = match self.source_stack.last() {
            Some(src) => src.copy_stack.iter().map(|f| (f.member,f.pos)).collect(),
            None => Vec::new()
        };
        let macro_pos = self.scope_stack.iter().filter_map(|s| s.invocation.as_ref().map(|i| i.pos)).collect();
        Snapshot { source_pos, copy_pos, macro_pos }
    }

    /// Return the stacks to a snapshot.  Frames opened after the snapshot
    /// are dropped, surviving frames get their positions back.
    pub fn restore(&mut self, snap: &Snapshot) {
        self.source_stack.truncate(snap.source_pos.len().max(1));
        for (frame,pos) in self.source_stack.iter_mut().zip(snap.source_pos.iter()) {
            frame.pos = *pos;
        }
        if let Some(src) = self.source_stack.last_mut() {
            src.copy_stack.truncate(snap.copy_pos.len());
            for (frame,(member,pos)) in src.copy_stack.iter_mut().zip(snap.copy_pos.iter()) {
                frame.reenter = frame.member == *member;
                frame.pos = *pos;
            }
        }
        let mut saved = snap.macro_pos.iter();
        for scope in self.scope_stack.iter_mut() {
            if let Some(inv) = scope.invocation.as_mut() {
                if let Some(pos) = saved.next() {
                    inv.pos = *pos;
                }
            }
        }
    }

    pub fn decrement_branch_counter(&mut self) -> bool {
        let scope = self.current_scope_mut();
        scope.branch_counter -= 1;
        scope.branch_counter > 0
    }
}

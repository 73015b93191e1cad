//! Ordinary assembly context: sections, location counters, symbols, and the
//! incremental dependency solver.
//!
//! A location counter advances monotonically in terms of *spaces*: when an
//! emission length depends on a not-yet-resolved expression, a space is
//! posted and carried symbolically by every address issued afterwards.
//! Resolving a space substitutes a concrete length everywhere it appears.
//!
//! Statements that cannot be evaluated yet are postponed with the set of
//! symbols they need and a snapshot of the evaluation environment.  Defining
//! a symbol re-examines the postponed list, so one definition can unblock a
//! chain.  A dependency cycle among deferred definitions is reported as E033
//! at the point the closing edge is added.

use std::collections::HashMap;
use lsp_types as lsp;
use super::super::ids::{Id,IdPool};
use super::super::expressions::mach;
use super::super::diagnostics::DiagnosticSet;

pub type SectionId = usize;
pub type LoctrId = usize;
pub type SpaceId = usize;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum SectionKind {
    Executable,
    ReadOnly,
    Dummy,
    Common,
    ExternalDummy
}

impl SectionKind {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Executable => "CSECT",
            Self::ReadOnly => "RSECT",
            Self::Dummy => "DSECT",
            Self::Common => "COM",
            Self::ExternalDummy => "DXD"
        }
    }
}

/// A relocatable value: an offset from the owning section's origin plus any
/// spaces still pending at the time the value was issued.
#[derive(Clone,PartialEq,Debug)]
pub struct RelocValue {
    pub section: SectionId,
    pub loctr: LoctrId,
    pub offset: i64,
    pub spaces: Vec<SpaceId>
}

impl RelocValue {
    pub fn resolved(&self) -> bool {
        self.spaces.is_empty()
    }
}

#[derive(Clone,PartialEq,Debug)]
pub enum SymbolValue {
    Undefined,
    Absolute(i64),
    Relocatable(RelocValue)
}

/// symbolic names accepted by the fifth EQU operand
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum AsmTypeAttr {
    None,
    Ar,
    Cr,
    Cr32,
    Cr64,
    Fpr,
    Gr,
    Gr32,
    Gr64,
    Vr
}

impl AsmTypeAttr {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AR" => Some(Self::Ar),
            "CR" => Some(Self::Cr),
            "CR32" => Some(Self::Cr32),
            "CR64" => Some(Self::Cr64),
            "FPR" => Some(Self::Fpr),
            "GR" => Some(Self::Gr),
            "GR32" => Some(Self::Gr32),
            "GR64" => Some(Self::Gr64),
            "VR" => Some(Self::Vr),
            _ => None
        }
    }
}

#[derive(Clone,Copy,PartialEq,Debug)]
pub struct SymbolAttrs {
    /// type attribute, an EBCDIC category letter, 'U' when unknown
    pub type_attr: u8,
    pub length: u16,
    pub scale: i16,
    pub integer: i16,
    pub prog_type: u32,
    pub asm_type: AsmTypeAttr
}

impl SymbolAttrs {
    pub fn undefined() -> Self {
        Self {
            type_attr: b'U',
            length: 1,
            scale: 0,
            integer: 0,
            prog_type: 0,
            asm_type: AsmTypeAttr::None
        }
    }
    pub fn with_type(type_attr: u8, length: u16) -> Self {
        Self {
            type_attr,
            length,
            ..Self::undefined()
        }
    }
}

#[derive(Clone,Debug)]
pub struct OrdSymbol {
    pub id: Id,
    pub value: SymbolValue,
    pub attrs: SymbolAttrs,
    /// definition site once defined
    pub origin: Option<lsp::Location>,
    /// every reference, recorded whether or not the symbol was defined yet
    pub refs: Vec<lsp::Location>
}

#[derive(Clone,Debug)]
struct Space {
    loctr: LoctrId,
    resolved: Option<i64>
}

#[derive(Clone,Debug)]
pub struct Loctr {
    pub name: Option<Id>,
    pub section: SectionId,
    /// resolved portion of the current offset
    pub offset: i64,
    /// spaces pending between the origin and the current offset
    pub spaces: Vec<SpaceId>,
    /// high water mark of resolved emissions, ORG may not go below zero
    /// nor above unresolved territory
    pub max_emitted: i64
}

#[derive(Clone,Debug)]
pub struct Section {
    pub name: Option<Id>,
    pub kind: SectionKind,
    pub loctrs: Vec<LoctrId>,
    pub curr_loctr: LoctrId
}

#[derive(Clone,Copy,PartialEq,Debug)]
pub enum Dep {
    Sym(Id),
    Space(SpaceId)
}

#[derive(Clone,Debug)]
pub enum PostponedKind {
    /// deferred EQU, attrs re-derived when the value settles
    Equ { target: Id, value_expr: String, length: Option<u16>, type_attr: Option<u8> },
    /// deferred operand of a machine or assembler instruction, re-checked only
    Check { expr: String },
    /// chunk length of a storage definition
    SpaceLen { space: SpaceId, expr: String }
}

#[derive(Clone,Debug)]
pub struct Postponed {
    pub kind: PostponedKind,
    pub deps: Vec<Dep>,
    pub file: String,
    pub range: lsp::Range,
    /// snapshot of `*` at the original statement
    pub here: Option<RelocValue>
}

#[derive(Clone,Debug)]
pub struct UsingEntry {
    pub reg: i64,
    pub base: RelocValue,
    pub range_len: i64
}

#[derive(Clone,Debug)]
pub struct Literal {
    pub name: Id,
    pub text: String,
    pub size: i64,
    pub align: i64,
    pub type_attr: u8,
    pub length_attr: u16,
    pub file: String,
    pub range: lsp::Range
}

pub struct OrdinaryContext {
    pub symbols: HashMap<Id,OrdSymbol>,
    sections: Vec<Section>,
    loctrs: Vec<Loctr>,
    spaces: Vec<Space>,
    pub curr_section: Option<SectionId>,
    postponed: Vec<Postponed>,
    pending_literals: Vec<Literal>,
    pub using_active: Vec<UsingEntry>,
    using_saved: Vec<Vec<UsingEntry>>
}

impl OrdinaryContext {
    pub fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            sections: Vec::new(),
            loctrs: Vec::new(),
            spaces: Vec::new(),
            curr_section: None,
            postponed: Vec::new(),
            pending_literals: Vec::new(),
            using_active: Vec::new(),
            using_saved: Vec::new()
        }
    }

    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id]
    }
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }
    pub fn loctr(&self, id: LoctrId) -> &Loctr {
        &self.loctrs[id]
    }

    /// Switch to a section, creating it if needed.  A name clash with a
    /// different kind, or with a non-section symbol, is answered with Err.
    pub fn ensure_section(&mut self, name: Option<Id>, kind: SectionKind, origin: Option<lsp::Location>) -> Result<SectionId,()> {
        for (i,sect) in self.sections.iter().enumerate() {
            if sect.name == name {
                if name.is_none() && (kind == SectionKind::Dummy || sect.kind != kind) {
                    continue;
                }
                if sect.kind != kind {
                    return Err(());
                }
                self.curr_section = Some(i);
                return Ok(i);
            }
        }
        if let Some(id) = name {
            if let Some(sym) = self.symbols.get(&id) {
                if sym.value != SymbolValue::Undefined {
                    return Err(());
                }
            }
        }
        let sect_id = self.sections.len();
        let loctr_id = self.loctrs.len();
        self.loctrs.push(Loctr {
            name,
            section: sect_id,
            offset: 0,
            spaces: Vec::new(),
            max_emitted: 0
        });
        self.sections.push(Section {
            name,
            kind,
            loctrs: vec![loctr_id],
            curr_loctr: loctr_id
        });
        self.curr_section = Some(sect_id);
        if let Some(id) = name {
            let value = SymbolValue::Relocatable(RelocValue {
                section: sect_id,
                loctr: loctr_id,
                offset: 0,
                spaces: Vec::new()
            });
            let _ = self.define(id,value,SymbolAttrs::with_type(b'J',1),origin);
        }
        Ok(sect_id)
    }

    /// `LOCTR`: resume a named location counter wherever it lives, or open a
    /// new one in the current section.  Err when there is no section yet or
    /// the name is taken by something else.
    pub fn ensure_loctr(&mut self, name: Id, origin: Option<lsp::Location>) -> Result<LoctrId,()> {
        for (i,loctr) in self.loctrs.iter().enumerate() {
            if loctr.name == Some(name) {
                self.curr_section = Some(loctr.section);
                self.sections[loctr.section].curr_loctr = i;
                return Ok(i);
            }
        }
        let sect_id = match self.curr_section {
            Some(s) => s,
            None => return Err(())
        };
        if let Some(sym) = self.symbols.get(&name) {
            if sym.value != SymbolValue::Undefined {
                return Err(());
            }
        }
        let loctr_id = self.loctrs.len();
        self.loctrs.push(Loctr {
            name: Some(name),
            section: sect_id,
            offset: 0,
            spaces: Vec::new(),
            max_emitted: 0
        });
        self.sections[sect_id].loctrs.push(loctr_id);
        self.sections[sect_id].curr_loctr = loctr_id;
        let value = SymbolValue::Relocatable(RelocValue {
            section: sect_id,
            loctr: loctr_id,
            offset: 0,
            spaces: Vec::new()
        });
        let _ = self.define(name,value,SymbolAttrs::with_type(b'J',1),origin);
        Ok(loctr_id)
    }

    /// current value of `*`, None before the first section
    pub fn here(&self) -> Option<RelocValue> {
        let sect = self.curr_section?;
        let loctr_id = self.sections[sect].curr_loctr;
        let loctr = &self.loctrs[loctr_id];
        Some(RelocValue {
            section: sect,
            loctr: loctr_id,
            offset: loctr.offset,
            spaces: loctr.spaces.clone()
        })
    }

    /// Align then reserve storage, returning the address of the reservation.
    /// Creates a default private section on demand, machine instructions and
    /// data definitions are legal before any section statement.
    pub fn reserve(&mut self, len: i64, align: i64) -> RelocValue {
        if self.curr_section.is_none() {
            // cannot clash: unnamed executable sections are shared
            let _ = self.ensure_section(None,SectionKind::Executable,None);
        }
        let sect = self.curr_section.unwrap_or(0);
        let loctr_id = self.sections[sect].curr_loctr;
        let loctr = &mut self.loctrs[loctr_id];
        if align > 1 && loctr.offset % align != 0 {
            loctr.offset += align - loctr.offset % align;
        }
        let ans = RelocValue {
            section: sect,
            loctr: loctr_id,
            offset: loctr.offset,
            spaces: loctr.spaces.clone()
        };
        loctr.offset += len;
        if loctr.spaces.is_empty() && loctr.offset > loctr.max_emitted {
            loctr.max_emitted = loctr.offset;
        }
        ans
    }

    /// post a space for an emission whose length is not yet known
    pub fn post_space(&mut self) -> Option<SpaceId> {
        let sect = self.curr_section?;
        let loctr_id = self.sections[sect].curr_loctr;
        let space_id = self.spaces.len();
        self.spaces.push(Space {
            loctr: loctr_id,
            resolved: None
        });
        self.loctrs[loctr_id].spaces.push(space_id);
        Some(space_id)
    }

    pub fn space_resolved(&self, id: SpaceId) -> bool {
        self.spaces.get(id).map(|s| s.resolved.is_some()).unwrap_or(false)
    }

    /// Substitute a concrete length for a space, cascading into every
    /// location counter and symbol value that carried it.
    pub fn resolve_space(&mut self, id: SpaceId, len: i64) {
        if id >= self.spaces.len() || self.spaces[id].resolved.is_some() {
            return;
        }
        self.spaces[id].resolved = Some(len);
        let owner = self.spaces[id].loctr;
        let loctr = &mut self.loctrs[owner];
        if let Some(pos) = loctr.spaces.iter().position(|s| *s == id) {
            loctr.spaces.remove(pos);
            loctr.offset += len;
            if loctr.spaces.is_empty() && loctr.offset > loctr.max_emitted {
                loctr.max_emitted = loctr.offset;
            }
        }
        for sym in self.symbols.values_mut() {
            if let SymbolValue::Relocatable(reloc) = &mut sym.value {
                if let Some(pos) = reloc.spaces.iter().position(|s| *s == id) {
                    reloc.spaces.remove(pos);
                    reloc.offset += len;
                }
            }
        }
    }

    /// Verify the location counters after space substitution, a negative
    /// resolved offset means some deferred length was contradictory.
    pub fn check_loctr_dependencies(&self, diags: &mut DiagnosticSet, file: &str, range: lsp::Range) {
        for loctr in self.loctrs.iter() {
            if loctr.offset < 0 {
                diags.add(file,range,"E068","location counter underflow after resolving deferred lengths");
            }
        }
    }

    /// `ORG` to a target in the same location counter.  No operand resets to
    /// the high water mark.
    pub fn org(&mut self, target: Option<RelocValue>) -> Result<(),&'static str> {
        let sect = match self.curr_section {
            Some(s) => s,
            None => return Err("no current section")
        };
        let loctr_id = self.sections[sect].curr_loctr;
        match target {
            None => {
                let loctr = &mut self.loctrs[loctr_id];
                loctr.offset = loctr.max_emitted;
                Ok(())
            },
            Some(reloc) => {
                if reloc.loctr != loctr_id {
                    return Err("target address belongs to another location counter");
                }
                let loctr = &mut self.loctrs[loctr_id];
                if reloc.offset < 0 {
                    return Err("underflow");
                }
                if !reloc.spaces.iter().all(|s| loctr.spaces.contains(s)) {
                    return Err("target depends on unresolved storage");
                }
                loctr.offset = reloc.offset;
                Ok(())
            }
        }
    }

    /// Record a reference, creating an undefined symbol on first sight so
    /// the reference list survives a later definition.
    pub fn register_ref(&mut self, id: Id, loc: Option<lsp::Location>) {
        let sym = self.symbols.entry(id).or_insert(OrdSymbol {
            id,
            value: SymbolValue::Undefined,
            attrs: SymbolAttrs::undefined(),
            origin: None,
            refs: Vec::new()
        });
        if let Some(loc) = loc {
            sym.refs.push(loc);
        }
    }

    /// Define or complete a symbol.  Err means E031: the name already has a
    /// value of a different provenance.
    pub fn define(&mut self, id: Id, value: SymbolValue, attrs: SymbolAttrs, origin: Option<lsp::Location>) -> Result<(),()> {
        match self.symbols.get_mut(&id) {
            Some(sym) => {
                if sym.value != SymbolValue::Undefined {
                    return Err(());
                }
                sym.value = value;
                sym.attrs = attrs;
                sym.origin = origin;
                Ok(())
            },
            None => {
                self.symbols.insert(id,OrdSymbol {
                    id,
                    value,
                    attrs,
                    origin,
                    refs: Vec::new()
                });
                Ok(())
            }
        }
    }

    pub fn defined(&self, id: &Id) -> bool {
        match self.symbols.get(id) {
            Some(sym) => sym.value != SymbolValue::Undefined,
            None => false
        }
    }

    fn dep_ready(&self, dep: &Dep) -> bool {
        match dep {
            Dep::Sym(id) => self.defined(id),
            Dep::Space(s) => self.space_resolved(*s)
        }
    }

    /// True if making `target` depend on `deps` closes a cycle through the
    /// already-postponed definitions.
    pub fn creates_cycle(&self, target: Id, deps: &[Dep]) -> bool {
        let mut edges: HashMap<Id,Vec<Id>> = HashMap::new();
        for p in self.postponed.iter() {
            if let PostponedKind::Equ { target: t, .. } = &p.kind {
                let list = p.deps.iter().filter_map(|d| match d {
                    Dep::Sym(id) => Some(*id),
                    _ => None
                }).collect();
                edges.insert(*t,list);
            }
        }
        let start: Vec<Id> = deps.iter().filter_map(|d| match d {
            Dep::Sym(id) => Some(*id),
            _ => None
        }).collect();
        let mut stack = start;
        let mut seen: Vec<Id> = Vec::new();
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if seen.contains(&node) {
                continue;
            }
            seen.push(node);
            if let Some(next) = edges.get(&node) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    pub fn postpone(&mut self, p: Postponed) {
        self.postponed.push(p);
    }

    pub fn postponed_count(&self) -> usize {
        self.postponed.len()
    }

    /// symbols that were referenced but never defined
    pub fn undefined_refs(&self) -> Vec<&OrdSymbol> {
        self.symbols.values().filter(|s| s.value == SymbolValue::Undefined && !s.refs.is_empty()).collect()
    }

    pub fn add_literal(&mut self, lit: Literal) {
        if !self.pending_literals.iter().any(|l| l.name == lit.name) {
            self.pending_literals.push(lit);
        }
    }

    /// Pour the pending literal pool at `LTORG` or `END`, largest alignment
    /// first so no padding is wasted.
    pub fn pour_literals(&mut self) {
        let mut pending = std::mem::take(&mut self.pending_literals);
        pending.sort_by(|a,b| b.align.cmp(&a.align));
        for lit in pending {
            let addr = self.reserve(lit.size,lit.align);
            let _ = self.define(lit.name,
                SymbolValue::Relocatable(addr),
                SymbolAttrs::with_type(lit.type_attr,lit.length_attr),
                None);
        }
    }

    pub fn using_push(&mut self) {
        self.using_saved.push(self.using_active.clone());
    }
    pub fn using_pop(&mut self) -> bool {
        match self.using_saved.pop() {
            Some(saved) => {
                self.using_active = saved;
                true
            },
            None => false
        }
    }

    /// total resolved extent of a section, for reporting and tests
    pub fn section_extent(&self, sect: SectionId) -> i64 {
        self.sections[sect].loctrs.iter().map(|l| self.loctrs[*l].offset.max(self.loctrs[*l].max_emitted)).sum()
    }
}

/// Re-examine the postponed list until no entry is ready.  Each resolved
/// entry may define further symbols or spaces, which is why this loops.
pub fn resolve_ready(ord: &mut OrdinaryContext, pool: &mut IdPool, diags: &mut DiagnosticSet) {
    loop {
        let idx = ord.postponed.iter().position(|p| p.deps.iter().all(|d| ord.dep_ready(d)));
        let p = match idx {
            Some(i) => ord.postponed.remove(i),
            None => return
        };
        process_postponed(ord,pool,diags,p);
    }
}

/// Force the remaining postponed statements at `END`.  Anything still
/// blocked names a symbol that never got defined.
pub fn finish(ord: &mut OrdinaryContext, pool: &mut IdPool, diags: &mut DiagnosticSet) {
    resolve_ready(ord,pool,diags);
    let remaining = std::mem::take(&mut ord.postponed);
    for p in remaining {
        let missing: Vec<String> = p.deps.iter().filter(|d| !ord.dep_ready(d)).filter_map(|d| match d {
            Dep::Sym(id) => Some(pool.string(id)),
            Dep::Space(_) => None
        }).collect();
        if missing.is_empty() {
            process_postponed(ord,pool,diags,p);
        } else {
            diags.add(&p.file,p.range,"E010",
                &format!("statement depends on undefined symbols: {}",missing.join(", ")));
        }
    }
}

fn process_postponed(ord: &mut OrdinaryContext, pool: &mut IdPool, diags: &mut DiagnosticSet, p: Postponed) {
    match &p.kind {
        PostponedKind::Equ { target, value_expr, length, type_attr } => {
            let outcome = mach::eval_expr(value_expr,&mut mach::MachEnv {
                symbols: &ord.symbols,
                pool,
                here: p.here.clone()
            });
            match outcome {
                Ok(mach::MachEval::Value(value)) => {
                    let attr_len = length.unwrap_or(1);
                    let attr_type = type_attr.unwrap_or(b'U');
                    let value = match value {
                        mach::MachValue::Abs(v) => SymbolValue::Absolute(v),
                        mach::MachValue::Reloc(r) => SymbolValue::Relocatable(r)
                    };
                    if ord.define(*target,value,SymbolAttrs::with_type(attr_type,attr_len),None).is_err() {
                        diags.add(&p.file,p.range,"E031",
                            &format!("symbol {} is already defined",pool.string(target)));
                    }
                },
                Ok(mach::MachEval::Deferred(deps)) => {
                    // a dependency settled but uncovered another one
                    let deps: Vec<Dep> = deps.into_iter().map(Dep::Sym).collect();
                    ord.postpone(Postponed { deps, ..p.clone() });
                },
                Err(mess) => {
                    diags.add(&p.file,p.range,"A115",&mess);
                }
            }
        },
        PostponedKind::Check { expr } => {
            let outcome = mach::eval_expr(expr,&mut mach::MachEnv {
                symbols: &ord.symbols,
                pool,
                here: p.here.clone()
            });
            if let Err(mess) = outcome {
                diags.add(&p.file,p.range,"A115",&mess);
            }
        },
        PostponedKind::SpaceLen { space, expr } => {
            let outcome = mach::eval_expr(expr,&mut mach::MachEnv {
                symbols: &ord.symbols,
                pool,
                here: p.here.clone()
            });
            match outcome {
                Ok(mach::MachEval::Value(mach::MachValue::Abs(len))) if len >= 0 => {
                    ord.resolve_space(*space,len);
                    ord.check_loctr_dependencies(diags,&p.file,p.range);
                },
                Ok(mach::MachEval::Value(_)) => {
                    diags.add(&p.file,p.range,"A115","storage length must be absolute and non-negative");
                },
                Ok(mach::MachEval::Deferred(deps)) => {
                    let deps: Vec<Dep> = deps.into_iter().map(Dep::Sym).collect();
                    ord.postpone(Postponed { deps, ..p.clone() });
                },
                Err(mess) => {
                    diags.add(&p.file,p.range,"A115",&mess);
                }
            }
        }
    }
}

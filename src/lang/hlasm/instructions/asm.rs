//! Assembler instruction family.
//!
//! Every handler shares a preamble: the statement was already rebuilt if
//! model substitution produced new fields, and the label is resolved through
//! `define_label`, which reports E031 when the name is taken and walks the
//! postponed statements after every successful definition.
//!
//! Layout statements drive the location counters of the ordinary context;
//! statements whose operands cannot be evaluated yet are postponed with
//! their dependency sets, cycles are rejected with E033 on the spot.

use std::sync::OnceLock;
use lsp_types as lsp;
use super::HandlerMap;
use super::super::processors::{Pass,Interrupt,resolve_copy_member};
use super::super::statement::{Statement,LabelField};
use super::super::expressions::{Scanner,mach};
use super::super::context::ordinary::{self,SectionKind,SymbolValue,SymbolAttrs,AsmTypeAttr,RelocValue,
    Postponed,PostponedKind,Dep,UsingEntry,Literal};
use super::super::data_def::{DataDef,Modifier};
use super::super::ids::Id;
use super::super::opcodes::{Opcode,OpcodeRef};
use super::super::context::ResolvedOp;

type AsmHandler = fn(&mut Pass,&Statement) -> Option<Interrupt>;

static TABLE: OnceLock<HandlerMap<AsmHandler>> = OnceLock::new();

fn table() -> &'static HandlerMap<AsmHandler> {
    TABLE.get_or_init(|| HandlerMap::new(&[
        ("CSECT",process_csect as AsmHandler),
        ("DSECT",process_dsect),
        ("RSECT",process_rsect),
        ("COM",process_com),
        ("START",process_start),
        ("LOCTR",process_loctr),
        ("EQU",process_equ),
        ("DC",process_dc),
        ("DS",process_ds),
        ("DXD",process_dxd),
        ("COPY",process_copy),
        ("EXTRN",process_extrn),
        ("WXTRN",process_extrn),
        ("ORG",process_org),
        ("OPSYN",process_opsyn),
        ("AINSERT",process_ainsert),
        ("CCW",process_ccw),
        ("CCW0",process_ccw),
        ("CCW1",process_ccw),
        ("CNOP",process_cnop),
        ("ALIAS",process_alias),
        ("END",process_end),
        ("LTORG",process_ltorg),
        ("USING",process_using),
        ("DROP",process_drop),
        ("PUSH",process_push),
        ("POP",process_pop),
        ("MNOTE",process_mnote),
        ("CXD",process_cxd),
        ("TITLE",process_title),
        ("PUNCH",process_punch),
        ("CATTR",process_cattr),
        ("XATTR",process_xattr),
        ("SPACE",process_listing),
        ("EJECT",process_listing),
        ("PRINT",process_listing),
        ("AMODE",process_listing),
        ("RMODE",process_listing)
    ]))
}

pub fn process(pass: &mut Pass, stmt: &Statement, op: &Opcode) -> Option<Interrupt> {
    match table().find(&op.canon) {
        Some(handler) => handler(pass,stmt),
        None => None
    }
}

/// the ordinary symbol named in the label field, if any
fn find_label_symbol(pass: &mut Pass, stmt: &Statement) -> Option<Id> {
    match &stmt.label {
        LabelField::Name(name) => Some(pass.ctx.intern(name)),
        _ => None
    }
}

fn label_location(stmt: &Statement) -> Option<lsp::Location> {
    match lsp::Url::parse(&stmt.file) {
        Ok(uri) => Some(lsp::Location::new(uri,stmt.label_range)),
        Err(_) => None
    }
}

/// Define a symbol and cascade the dependency solver, E031 on a clash.
fn define_label(pass: &mut Pass, stmt: &Statement, id: Id, value: SymbolValue, attrs: SymbolAttrs) {
    if pass.ctx.ord.define(id,value,attrs,label_location(stmt)).is_err() {
        pass.diags.add(&stmt.file,stmt.label_range,"E031",
            &format!("symbol {} is already defined",pass.ctx.pool.string(&id)));
        return;
    }
    ordinary::resolve_ready(&mut pass.ctx.ord,&mut pass.ctx.pool,&mut pass.diags);
}

/// Evaluate an ordinary expression against the live symbol table, recording
/// a reference for every symbol touched.
fn eval_operand(pass: &mut Pass, stmt: &Statement, range: lsp::Range, text: &str) -> Result<mach::MachEval,()> {
    let here = pass.ctx.ord.here();
    let ctx = &mut pass.ctx;
    let outcome = mach::eval_with_refs(text,&mut mach::MachEnv {
        symbols: &ctx.ord.symbols,
        pool: &mut ctx.pool,
        here
    });
    match outcome {
        Ok((eval,refs)) => {
            let loc = match lsp::Url::parse(&stmt.file) {
                Ok(uri) => Some(lsp::Location::new(uri,range)),
                Err(_) => None
            };
            for id in refs {
                ctx.ord.register_ref(id,loc.clone());
            }
            Ok(eval)
        },
        Err(mess) => {
            pass.diags.add(&stmt.file,range,"A115",&mess);
            Err(())
        }
    }
}

/// absolute value within bounds, None when absent, deferred, or diagnosed
fn eval_bounded(pass: &mut Pass, stmt: &Statement, idx: usize, lo: i64, hi: i64, code: &str, what: &str) -> Option<i64> {
    let op = stmt.operands.get(idx)?;
    let text = op.text.trim().to_string();
    if text.is_empty() {
        return None;
    }
    match eval_operand(pass,stmt,op.range,&text) {
        Ok(mach::MachEval::Value(mach::MachValue::Abs(v))) => {
            if v < lo || v > hi {
                pass.diags.add(&stmt.file,op.range,code,
                    &format!("{} {} is out of range {}..{}",what,v,lo,hi));
                return None;
            }
            Some(v)
        },
        Ok(mach::MachEval::Value(_)) => {
            pass.diags.add(&stmt.file,op.range,code,&format!("{} must be absolute",what));
            None
        },
        Ok(mach::MachEval::Deferred(_)) => None,
        Err(()) => None
    }
}

fn process_sect_kind(pass: &mut Pass, stmt: &Statement, kind: SectionKind) -> Option<Interrupt> {
    let name = find_label_symbol(pass,stmt);
    let origin = label_location(stmt);
    if pass.ctx.ord.ensure_section(name,kind,origin).is_err() {
        pass.diags.add(&stmt.file,stmt.label_range,"E031",
            &format!("section name conflicts with an existing definition of another kind ({})",kind.verb()));
    } else {
        ordinary::resolve_ready(&mut pass.ctx.ord,&mut pass.ctx.pool,&mut pass.diags);
    }
    None
}

fn process_csect(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_sect_kind(pass,stmt,SectionKind::Executable)
}
fn process_dsect(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_sect_kind(pass,stmt,SectionKind::Dummy)
}
fn process_rsect(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_sect_kind(pass,stmt,SectionKind::ReadOnly)
}
fn process_com(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_sect_kind(pass,stmt,SectionKind::Common)
}

fn process_start(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    // the start address only matters for listings, evaluate for diagnostics
    let _ = eval_bounded(pass,stmt,0,0,i64::MAX,"A115","START address");
    process_sect_kind(pass,stmt,SectionKind::Executable)
}

fn process_loctr(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let Some(name) = find_label_symbol(pass,stmt) else {
        pass.diags.add(&stmt.file,stmt.range,"E054","LOCTR requires a name");
        return None;
    };
    let origin = label_location(stmt);
    if pass.ctx.ord.ensure_loctr(name,origin).is_err() {
        pass.diags.add(&stmt.file,stmt.label_range,"E031",
            "LOCTR name conflicts with an existing definition");
    }
    None
}

fn process_equ(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let Some(target) = find_label_symbol(pass,stmt) else {
        pass.diags.add(&stmt.file,stmt.range,"E054","EQU requires a name");
        return None;
    };
    let Some(value_op) = stmt.operands.first().map(|op| (op.text.trim().to_string(),op.range)) else {
        pass.diags.add(&stmt.file,stmt.range,"A010","EQU requires a value operand");
        return None;
    };
    // the optional attribute operands are evaluated eagerly
    let length = eval_bounded(pass,stmt,1,0,65535,"A132","EQU length attribute").map(|v| v as u16);
    let type_attr = eval_bounded(pass,stmt,2,0,255,"A244","EQU type attribute").map(|v| v as u8);
    let prog_type = eval_bounded(pass,stmt,3,0,u32::MAX as i64,"A245","EQU program type").map(|v| v as u32);
    let asm_type = match stmt.operands.get(4).map(|op| op.text.trim().to_string()) {
        Some(text) if !text.is_empty() => match AsmTypeAttr::parse(&text) {
            Some(a) => Some(a),
            None => {
                pass.diags.add(&stmt.file,stmt.operands[4].range,"A246",
                    &format!("{} is not an assembler type",text));
                None
            }
        },
        _ => None
    };
    let outcome = match eval_operand(pass,stmt,value_op.1,&value_op.0) {
        Ok(outcome) => outcome,
        Err(()) => return None
    };
    match outcome {
        mach::MachEval::Value(value) => {
            // length defaults to the leftmost term of the value expression
            let length = match length {
                Some(l) => l,
                None => {
                    let ctx = &mut pass.ctx;
                    mach::leftmost_length(&value_op.0,&mut mach::MachEnv {
                        symbols: &ctx.ord.symbols,
                        pool: &mut ctx.pool,
                        here: None
                    }).unwrap_or(1)
                }
            };
            let mut attrs = SymbolAttrs::with_type(type_attr.unwrap_or(b'U'),length);
            attrs.prog_type = prog_type.unwrap_or(0);
            attrs.asm_type = asm_type.unwrap_or(AsmTypeAttr::None);
            let value = match value {
                mach::MachValue::Abs(v) => SymbolValue::Absolute(v),
                mach::MachValue::Reloc(r) => SymbolValue::Relocatable(r)
            };
            define_label(pass,stmt,target,value,attrs);
        },
        mach::MachEval::Deferred(deps) => {
            let deps: Vec<Dep> = deps.into_iter().map(Dep::Sym).collect();
            if pass.ctx.ord.creates_cycle(target,&deps) {
                pass.diags.add(&stmt.file,stmt.range,"E033",
                    &format!("cyclic symbol dependency through {}",pass.ctx.pool.string(&target)));
                return None;
            }
            // the symbol exists with a deferred value from here on
            pass.ctx.ord.register_ref(target,label_location(stmt));
            pass.ctx.ord.postpone(Postponed {
                kind: PostponedKind::Equ {
                    target,
                    value_expr: value_op.0,
                    length,
                    type_attr
                },
                deps,
                file: stmt.file.clone(),
                range: stmt.range,
                here: pass.ctx.ord.here()
            });
        }
    }
    None
}

/// Storage layout shared by DC and DS.  Consecutive operands are laid out
/// in order; an operand with a deferred length posts a space so following
/// addresses stay symbolic until it resolves.
fn process_storage(pass: &mut Pass, stmt: &Statement, reserve_data: bool) -> Option<Interrupt> {
    let label = find_label_symbol(pass,stmt);
    let mut first_addr: Option<RelocValue> = None;
    let mut first_attrs = SymbolAttrs::undefined();
    for (i,op) in stmt.operands.iter().enumerate() {
        let text = op.text.trim();
        if text.is_empty() {
            continue;
        }
        let def = match DataDef::parse(text) {
            Ok(def) => def,
            Err(mess) => {
                pass.diags.add(&stmt.file,op.range,"A010",&mess);
                continue;
            }
        };
        if i == 0 {
            first_attrs = SymbolAttrs::with_type(def.type_letter as u8,def.length_attr());
        }
        // address type nominals may reference forward symbols
        if reserve_data {
            for expr in def.exprs.iter() {
                if let Ok(mach::MachEval::Deferred(deps)) = eval_operand(pass,stmt,op.range,expr) {
                    let deps: Vec<Dep> = deps.into_iter().map(Dep::Sym).collect();
                    pass.ctx.ord.postpone(Postponed {
                        kind: PostponedKind::Check { expr: expr.clone() },
                        deps,
                        file: stmt.file.clone(),
                        range: op.range,
                        here: pass.ctx.ord.here()
                    });
                }
            }
        }
        match def.total_size() {
            Some(size) => {
                let addr = pass.ctx.ord.reserve(size,def.alignment());
                if first_addr.is_none() {
                    first_addr = Some(addr);
                }
            },
            None => {
                // align, then carry the unknown extent as a space
                let addr = pass.ctx.ord.reserve(0,def.alignment());
                if first_addr.is_none() {
                    first_addr = Some(addr);
                }
                let Some(space) = pass.ctx.ord.post_space() else {
                    continue;
                };
                let expr = deferred_size_expr(&def);
                match eval_operand(pass,stmt,op.range,&expr) {
                    Ok(mach::MachEval::Value(mach::MachValue::Abs(len))) if len >= 0 => {
                        pass.ctx.ord.resolve_space(space,len);
                    },
                    Ok(mach::MachEval::Deferred(deps)) => {
                        let deps: Vec<Dep> = deps.into_iter().map(Dep::Sym).collect();
                        pass.ctx.ord.postpone(Postponed {
                            kind: PostponedKind::SpaceLen { space, expr },
                            deps,
                            file: stmt.file.clone(),
                            range: op.range,
                            here: pass.ctx.ord.here()
                        });
                    },
                    Ok(_) => {
                        pass.diags.add(&stmt.file,op.range,"A115","storage length must be absolute and non-negative");
                    },
                    Err(()) => {}
                }
            }
        }
    }
    if let (Some(id),Some(addr)) = (label,first_addr) {
        define_label(pass,stmt,id,SymbolValue::Relocatable(addr),first_attrs);
    }
    None
}

/// total size of a data definition as an expression over its modifiers
fn deferred_size_expr(def: &DataDef) -> String {
    let dup = match &def.dup {
        Some(Modifier::Fixed(v)) => v.to_string(),
        Some(Modifier::Expr(e)) => format!("({})",e),
        None => "1".to_string()
    };
    let len = match &def.length {
        Some(Modifier::Fixed(v)) => v.to_string(),
        Some(Modifier::Expr(e)) => format!("({})",e),
        None => def.implied_length().to_string()
    };
    format!("{}*{}*{}",dup,len,def.value_count())
}

fn process_dc(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_storage(pass,stmt,true)
}
fn process_ds(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_storage(pass,stmt,false)
}

fn process_dxd(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let Some(id) = find_label_symbol(pass,stmt) else {
        pass.diags.add(&stmt.file,stmt.range,"E054","DXD requires a name");
        return None;
    };
    let attrs = match stmt.operands.first().map(|op| DataDef::parse(op.text.trim())) {
        Some(Ok(def)) => SymbolAttrs::with_type(def.type_letter as u8,def.length_attr()),
        Some(Err(mess)) => {
            pass.diags.add(&stmt.file,stmt.operand_range,"A010",&mess);
            SymbolAttrs::undefined()
        },
        None => {
            pass.diags.add(&stmt.file,stmt.range,"A010","DXD requires a data definition operand");
            SymbolAttrs::undefined()
        }
    };
    define_label(pass,stmt,id,SymbolValue::Absolute(0),attrs);
    None
}

fn process_copy(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let name = stmt.operand_text();
    let name = name.trim().to_string();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c,'_'|'$'|'#'|'@')) {
        pass.diags.add(&stmt.file,stmt.operand_range,"E058","COPY requires a single member name");
        return None;
    }
    let id = pass.ctx.intern(&name);
    if pass.ctx.copy_active(&id) {
        pass.diags.add(&stmt.file,stmt.range,"E062",
            &format!("recursive COPY of member {}",name));
        return None;
    }
    if let Some(member) = resolve_copy_member(pass,&name,stmt) {
        pass.ctx.enter_copy(member);
    }
    None
}

fn process_extrn(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    for op in stmt.operands.iter() {
        let name = op.text.trim();
        if name.is_empty() {
            continue;
        }
        // PART(name) form of GOFF objects
        let name = name.strip_prefix("PART(").and_then(|t| t.strip_suffix(')')).unwrap_or(name);
        let id = pass.ctx.intern(name);
        if pass.ctx.ord.define(id,SymbolValue::Absolute(0),SymbolAttrs::with_type(b'T',1),label_location(stmt)).is_err() {
            pass.diags.add(&stmt.file,op.range,"E031",
                &format!("symbol {} is already defined",name));
        }
    }
    ordinary::resolve_ready(&mut pass.ctx.ord,&mut pass.ctx.pool,&mut pass.diags);
    None
}

fn process_org(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let target_text = stmt.operands.first().map(|op| op.text.trim().to_string()).unwrap_or_default();
    let boundary = eval_bounded(pass,stmt,1,2,4096,"A116","ORG boundary");
    if let Some(b) = boundary {
        if b.count_ones() != 1 {
            pass.diags.add(&stmt.file,stmt.operands[1].range,"A116",
                &format!("ORG boundary {} is not a power of 2",b));
        }
    }
    let offset = eval_bounded(pass,stmt,2,i64::MIN+1,i64::MAX,"A115","ORG offset");
    let target = match target_text.is_empty() {
        true => None,
        false => {
            let range = stmt.operands[0].range;
            match eval_operand(pass,stmt,range,&target_text) {
                Ok(mach::MachEval::Value(mach::MachValue::Reloc(mut r))) => {
                    if let Some(b) = boundary {
                        if b.count_ones() == 1 && r.offset % b != 0 {
                            r.offset += b - r.offset % b;
                        }
                    }
                    r.offset += offset.unwrap_or(0);
                    Some(r)
                },
                Ok(mach::MachEval::Value(_)) => {
                    pass.diags.add(&stmt.file,range,"A115","ORG target must be relocatable");
                    return None;
                },
                Ok(mach::MachEval::Deferred(_)) => {
                    pass.diags.add(&stmt.file,range,"A115","ORG target must be fully resolved");
                    return None;
                },
                Err(()) => return None
            }
        }
    };
    if let Err(mess) = pass.ctx.ord.org(target) {
        let code = match mess {
            "underflow" => "E068",
            _ => "A115"
        };
        pass.diags.add(&stmt.file,stmt.range,code,&format!("ORG failed: {}",mess));
    }
    None
}

fn process_opsyn(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let Some(new_name) = find_label_symbol(pass,stmt) else {
        pass.diags.add(&stmt.file,stmt.range,"E054","OPSYN requires a name field");
        return None;
    };
    let old = stmt.operands.first().map(|op| op.text.trim().to_string()).unwrap_or_default();
    if old.is_empty() || old == "," {
        log::debug!("OPSYN delete {}",pass.ctx.pool.string(&new_name));
        pass.ctx.opsyn.delete(new_name);
        return None;
    }
    let old_id = pass.ctx.intern(&old);
    match pass.ctx.resolve_op(&old_id) {
        ResolvedOp::Op(op) => pass.ctx.opsyn.alias(new_name,OpcodeRef::Op(op)),
        ResolvedOp::Macro(mac) => pass.ctx.opsyn.alias(new_name,OpcodeRef::Macro(mac)),
        ResolvedOp::Undefined => {
            pass.diags.add(&stmt.file,stmt.operand_range,"E049",
                &format!("{} is not an operation code",old));
        }
    }
    None
}

fn quoted_operand(text: &str) -> Option<String> {
    let mut scan = Scanner::new(text.trim());
    if !scan.eat('\'') {
        return None;
    }
    let body = scan.quoted_body()?;
    match scan.done() {
        true => Some(body),
        false => None
    }
}

fn process_ainsert(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let Some(record) = stmt.operands.first().and_then(|op| quoted_operand(&op.text)) else {
        pass.diags.add(&stmt.file,stmt.operand_range,"A010","AINSERT requires a quoted record");
        return None;
    };
    let front = match stmt.operands.get(1).map(|op| op.text.trim().to_ascii_uppercase()) {
        Some(dir) if dir == "FRONT" => true,
        Some(dir) if dir == "BACK" => false,
        _ => {
            pass.diags.add(&stmt.file,stmt.operand_range,"A010","AINSERT requires FRONT or BACK");
            return None;
        }
    };
    pass.ctx.ainsert(record,front);
    None
}

fn process_ccw(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let addr = pass.ctx.ord.reserve(8,8);
    if let Some(id) = find_label_symbol(pass,stmt) {
        define_label(pass,stmt,id,SymbolValue::Relocatable(addr),SymbolAttrs::with_type(b'W',8));
    }
    if stmt.operands.len() != 4 {
        pass.diags.add(&stmt.file,stmt.operand_range,"A010","CCW requires four operands");
        return None;
    }
    for op in stmt.operands.iter() {
        if let Ok(mach::MachEval::Deferred(deps)) = eval_operand(pass,stmt,op.range,op.text.trim()) {
            let deps: Vec<Dep> = deps.into_iter().map(Dep::Sym).collect();
            pass.ctx.ord.postpone(Postponed {
                kind: PostponedKind::Check { expr: op.text.trim().to_string() },
                deps,
                file: stmt.file.clone(),
                range: op.range,
                here: pass.ctx.ord.here()
            });
        }
    }
    None
}

fn process_cnop(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let b = eval_bounded(pass,stmt,0,0,6,"A010","CNOP byte offset").unwrap_or(0);
    let w = eval_bounded(pass,stmt,1,4,8,"A010","CNOP boundary").unwrap_or(4);
    if w != 4 && w != 8 {
        pass.diags.add(&stmt.file,stmt.operand_range,"A010","CNOP boundary must be 4 or 8");
        return None;
    }
    let addr = pass.ctx.ord.reserve(0,2);
    if addr.resolved() {
        let pad = ((b - addr.offset % w) % w + w) % w;
        let _ = pass.ctx.ord.reserve(pad,1);
    }
    if let Some(id) = find_label_symbol(pass,stmt) {
        let here = pass.ctx.ord.here();
        if let Some(here) = here {
            define_label(pass,stmt,id,SymbolValue::Relocatable(here),SymbolAttrs::with_type(b'I',2));
        }
    }
    None
}

fn process_alias(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let Some(id) = find_label_symbol(pass,stmt) else {
        pass.diags.add(&stmt.file,stmt.range,"E054","ALIAS requires a name");
        return None;
    };
    pass.ctx.ord.register_ref(id,label_location(stmt));
    let ok = stmt.operands.first().map(|op| {
        let text = op.text.trim();
        (text.starts_with("C'") || text.starts_with("X'")) && text.ends_with('\'')
    }).unwrap_or(false);
    if !ok {
        pass.diags.add(&stmt.file,stmt.operand_range,"A010","ALIAS operand must be a C or X string");
    }
    None
}

fn process_end(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if let Some(op) = stmt.operands.first() {
        if !op.text.trim().is_empty() {
            let _ = eval_operand(pass,stmt,op.range,op.text.trim());
        }
    }
    pass.ctx.ord.pour_literals();
    ordinary::finish(&mut pass.ctx.ord,&mut pass.ctx.pool,&mut pass.diags);
    Some(Interrupt::EndPass)
}

fn process_ltorg(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if let Some(id) = find_label_symbol(pass,stmt) {
        let here = pass.ctx.ord.reserve(0,8);
        define_label(pass,stmt,id,SymbolValue::Relocatable(here),SymbolAttrs::with_type(b'U',1));
    }
    pass.ctx.ord.pour_literals();
    ordinary::resolve_ready(&mut pass.ctx.ord,&mut pass.ctx.pool,&mut pass.diags);
    None
}

fn process_using(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if stmt.operands.len() < 2 {
        pass.diags.add(&stmt.file,stmt.operand_range,"A010","USING requires a base and at least one register");
        return None;
    }
    // the range form (base,end) contributes its first expression
    let base_text = {
        let t = stmt.operands[0].text.trim().to_string();
        match t.starts_with('(') {
            true => t.trim_start_matches('(').split(',').next().unwrap_or("").to_string(),
            false => t
        }
    };
    let base = match eval_operand(pass,stmt,stmt.operands[0].range,&base_text) {
        Ok(mach::MachEval::Value(mach::MachValue::Reloc(r))) => Some(r),
        Ok(mach::MachEval::Value(mach::MachValue::Abs(_))) => None,
        Ok(mach::MachEval::Deferred(deps)) => {
            let deps: Vec<Dep> = deps.into_iter().map(Dep::Sym).collect();
            pass.ctx.ord.postpone(Postponed {
                kind: PostponedKind::Check { expr: base_text.clone() },
                deps,
                file: stmt.file.clone(),
                range: stmt.operands[0].range,
                here: pass.ctx.ord.here()
            });
            None
        },
        Err(()) => return None
    };
    for op in stmt.operands.iter().skip(1) {
        let Some(reg) = eval_reg(pass,stmt,op.range,op.text.trim()) else {
            continue;
        };
        if let Some(base) = base.clone() {
            pass.ctx.ord.using_active.retain(|e| e.reg != reg);
            pass.ctx.ord.using_active.push(UsingEntry {
                reg,
                base,
                range_len: 4096
            });
        }
    }
    None
}

fn eval_reg(pass: &mut Pass, stmt: &Statement, range: lsp::Range, text: &str) -> Option<i64> {
    match eval_operand(pass,stmt,range,text) {
        Ok(mach::MachEval::Value(mach::MachValue::Abs(v))) if (0..16).contains(&v) => Some(v),
        Ok(mach::MachEval::Value(_)) => {
            pass.diags.add(&stmt.file,range,"A010","register must be an absolute value 0 through 15");
            None
        },
        _ => None
    }
}

fn process_drop(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if stmt.operands.is_empty() || stmt.operand_text().trim().is_empty() {
        pass.ctx.ord.using_active.clear();
        return None;
    }
    for op in stmt.operands.iter() {
        if let Some(reg) = eval_reg(pass,stmt,op.range,op.text.trim()) {
            pass.ctx.ord.using_active.retain(|e| e.reg != reg);
        }
    }
    None
}

fn process_push(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    for op in stmt.operands.iter() {
        match op.text.trim().to_ascii_uppercase().as_str() {
            "USING" => pass.ctx.ord.using_push(),
            "PRINT" | "NOPRINT" | "" => {},
            other => {
                pass.diags.add(&stmt.file,op.range,"A010",
                    &format!("PUSH does not accept {}",other));
            }
        }
    }
    None
}

fn process_pop(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    for op in stmt.operands.iter() {
        match op.text.trim().to_ascii_uppercase().as_str() {
            "USING" => {
                if !pass.ctx.ord.using_pop() {
                    pass.diags.add(&stmt.file,op.range,"E045",
                        "POP USING without a corresponding PUSH USING");
                }
            },
            "PRINT" | "NOPRINT" | "" => {},
            other => {
                pass.diags.add(&stmt.file,op.range,"A010",
                    &format!("POP does not accept {}",other));
            }
        }
    }
    None
}

fn process_mnote(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let (level,message_idx) = match stmt.operands.first().map(|op| op.text.trim().to_string()) {
        Some(first) if first == "*" => (0,1),
        Some(first) if first.chars().all(|c| c.is_ascii_digit()) && !first.is_empty() =>
            (first.parse::<i64>().unwrap_or(0),1),
        _ => (0,0)
    };
    let message = stmt.operands.get(message_idx)
        .and_then(|op| quoted_operand(&op.text))
        .unwrap_or_else(|| stmt.operand_text());
    pass.diags.mnote(&stmt.file,stmt.range,level,&message);
    None
}

fn process_cxd(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let addr = pass.ctx.ord.reserve(4,4);
    if let Some(id) = find_label_symbol(pass,stmt) {
        define_label(pass,stmt,id,SymbolValue::Relocatable(addr),SymbolAttrs::with_type(b'A',4));
    }
    None
}

fn process_title(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    match stmt.operands.first().and_then(|op| quoted_operand(&op.text)) {
        Some(text) if text.chars().count() <= 100 => {},
        Some(_) => {
            pass.diags.add(&stmt.file,stmt.operand_range,"A010","TITLE text is limited to 100 characters");
        },
        None => {
            pass.diags.add(&stmt.file,stmt.operand_range,"A010","TITLE requires a quoted string");
        }
    }
    None
}

fn process_punch(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    match stmt.operands.first().and_then(|op| quoted_operand(&op.text)) {
        Some(text) if text.chars().count() <= 80 => {},
        Some(_) => {
            pass.diags.add(&stmt.file,stmt.operand_range,"A010","PUNCH text is limited to 80 characters");
        },
        None => {
            pass.diags.add(&stmt.file,stmt.operand_range,"A010","PUNCH requires a quoted string");
        }
    }
    None
}

fn process_cattr(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let Some(id) = find_label_symbol(pass,stmt) else {
        pass.diags.add(&stmt.file,stmt.range,"E054","CATTR requires a class name");
        return None;
    };
    // re-entering an existing class is allowed
    if !pass.ctx.ord.defined(&id) {
        define_label(pass,stmt,id,SymbolValue::Absolute(0),SymbolAttrs::with_type(b'J',1));
    } else {
        pass.ctx.ord.register_ref(id,label_location(stmt));
    }
    None
}

fn process_xattr(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let Some(id) = find_label_symbol(pass,stmt) else {
        pass.diags.add(&stmt.file,stmt.range,"E054","XATTR requires a name");
        return None;
    };
    pass.ctx.ord.register_ref(id,label_location(stmt));
    // operands such as PSECT(name) reference other symbols; the named
    // section's kind is not checked here
    for op in stmt.operands.iter() {
        let text = op.text.trim();
        if let Some(inner) = text.split_once('(').map(|(_,rest)| rest.trim_end_matches(')')) {
            if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c,'_'|'$'|'#'|'@')) {
                let rid = pass.ctx.intern(inner);
                let loc = match lsp::Url::parse(&stmt.file) {
                    Ok(uri) => Some(lsp::Location::new(uri,op.range)),
                    Err(_) => None
                };
                pass.ctx.ord.register_ref(rid,loc);
            }
        }
    }
    None
}

fn process_listing(_pass: &mut Pass, _stmt: &Statement) -> Option<Interrupt> {
    None
}

/// register a literal operand against the current location counter, the
/// machine processor calls this for every `=` operand it sees
pub fn register_literal(pass: &mut Pass, stmt: &Statement, range: lsp::Range, text: &str) {
    let body = text.trim_start_matches('=');
    let def = match DataDef::parse(body) {
        Ok(def) => def,
        Err(mess) => {
            pass.diags.add(&stmt.file,range,"A010",&format!("bad literal: {}",mess));
            return;
        }
    };
    let Some(size) = def.total_size() else {
        pass.diags.add(&stmt.file,range,"A010","literal length must be self-evident");
        return;
    };
    let name = pass.ctx.intern(text.trim());
    let lit = Literal {
        name,
        text: text.trim().to_string(),
        size,
        align: def.alignment(),
        type_attr: def.type_letter as u8,
        length_attr: def.length_attr(),
        file: stmt.file.clone(),
        range
    };
    pass.ctx.ord.add_literal(lit);
}

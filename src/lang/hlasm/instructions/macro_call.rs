//! Macro call family.
//!
//! Invoking a macro binds the prototype parameters: `NAME=value` operands
//! bind keywords (a duplicate keyword is E011, an unknown one is W014 and
//! falls through positionally), everything else parses as a balanced-paren
//! sublist and binds positionally.  SYSLIST collects the name field and the
//! positional arguments.  A name that is no macro yet is looked up in the
//! libraries and defined through the macro cache first.

use std::collections::VecDeque;
use super::super::processors::{Pass,Interrupt,resolve_copy_member};
use super::super::processors::macrodef::MacroDefState;
use super::super::statement::{Statement,LabelField};
use super::super::variables::{MacroParamData,MacroParamSpec};
use super::super::context::{MacroDef,ResolvedOp};
use super::super::macro_cache::CachedMacro;
use super::super::statement::StoredStatement;
use super::super::ids::Id;
use super::super::opcodes::InstructionKind;
use super::super::parser;
use std::sync::Arc;

pub fn process(pass: &mut Pass, stmt: &Statement, mac: Id) -> Option<Interrupt> {
    if pass.ctx.sysndx + 1 > pass.ctx.sysndx_limit {
        pass.diags.add(&stmt.file,stmt.range,"E072",
            "macro invocation limit exceeded");
        return None;
    }
    let def = match pass.ctx.macros.get(&mac) {
        Some(def) => def.clone(),
        None => {
            pass.diags.add(&stmt.file,stmt.instr_range,"E049",
                &format!("undefined operation code {}",stmt.instr));
            return None;
        }
    };
    // an ordinary symbol in the name field becomes a zero length reference
    let label_data = match &stmt.label {
        LabelField::Name(name) => {
            let id = pass.ctx.intern(name);
            let loc = match lsp_types::Url::parse(&stmt.file) {
                Ok(uri) => Some(lsp_types::Location::new(uri,stmt.label_range)),
                Err(_) => None
            };
            pass.ctx.ord.register_ref(id,loc);
            MacroParamData::Leaf(name.clone())
        },
        _ => MacroParamData::empty()
    };
    let (bindings,positional) = bind_arguments(pass,stmt,&def.params);
    pass.ctx.enter_macro(def,label_data,bindings,positional);
    None
}

/// split a top level `NAME=value` operand, respecting that `=` may also
/// begin a literal inside the value
fn keyword_split(text: &str) -> Option<(&str,&str)> {
    let eq = text.find('=')?;
    let name = &text[..eq];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c,'_'|'$'|'#'|'@')) {
        return None;
    }
    if name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        return None;
    }
    Some((name,&text[eq+1..]))
}

fn bind_arguments(pass: &mut Pass, stmt: &Statement, params: &[MacroParamSpec])
    -> (Vec<(Id,MacroParamData)>,Vec<MacroParamData>) {
    let mut bindings: Vec<(Id,MacroParamData)> = Vec::new();
    let mut positional: Vec<MacroParamData> = Vec::new();
    for op in stmt.operands.iter() {
        let text = op.text.trim();
        if let Some((name,value)) = keyword_split(text) {
            let id = pass.ctx.intern(name);
            if params.iter().any(|p| p.keyword && p.name == id) {
                if bindings.iter().any(|(b,_)| *b == id) {
                    pass.diags.add(&stmt.file,op.range,"E011",
                        &format!("keyword argument {} appears twice",name));
                    continue;
                }
                bindings.push((id,MacroParamData::parse(value)));
                continue;
            }
            pass.diags.add(&stmt.file,op.range,"W014",
                &format!("{} is not a keyword parameter, argument is passed positionally",name));
        }
        positional.push(MacroParamData::parse(text));
    }
    // positional parameters bind in prototype order, keywords get defaults
    let mut next = 0usize;
    for spec in params.iter() {
        if spec.keyword {
            if !bindings.iter().any(|(b,_)| *b == spec.name) {
                let default = spec.default.clone().unwrap_or_default();
                bindings.push((spec.name,MacroParamData::parse(&default)));
            }
            continue;
        }
        let data = match positional.get(next) {
            Some(d) => d.clone(),
            None => MacroParamData::empty()
        };
        next += 1;
        bindings.push((spec.name,data));
    }
    (bindings,positional)
}

/// Try to define `name` from the libraries.  True when a macro definition
/// landed in the context, through the cache when the opcode state allows.
pub fn load_library_macro(pass: &mut Pass, name: &str) -> bool {
    let doc = match pass.libs.get_member(name) {
        Some(doc) => doc,
        None => return false
    };
    let uri = doc.uri.to_string();
    pass.ctx.visited_files.insert(uri.clone());
    let raw = crate::lang::split_lines(&doc.text);
    let lines = parser::logical_lines(&raw,0);
    // The fingerprint is every mnemonic the body consults.  The macro's own
    // name is excluded, its resolution changes by definition.
    let own = name.to_ascii_uppercase();
    let mut names: Vec<String> = Vec::new();
    for line in lines.iter() {
        if line.comment {
            continue;
        }
        let stmt = parser::parse_statement(line,&uri);
        if !stmt.instr.is_empty() && !parser::has_variable(&stmt.instr) {
            let upper = stmt.instr.to_ascii_uppercase();
            if upper != own && !names.contains(&upper) {
                names.push(upper);
            }
        }
    }
    let cached = {
        let ctx = &pass.ctx;
        let libs = &mut *pass.libs;
        libs.cached_macro(&uri,&|n| ctx.op_repr(n))
    };
    if let Some(entry) = cached {
        install_cached(pass,&entry);
        return true;
    }
    if !define_from_lines(pass,&uri,lines) {
        return false;
    }
    // freshly defined, remember it under the current opcode restriction
    let id = pass.ctx.pool.find(name);
    let def = id.and_then(|id| pass.ctx.macros.get(&id)).cloned();
    if let Some(def) = def {
        let entry = cache_entry(pass,&uri,&def,names);
        pass.libs.store_macro(&uri,entry);
        return true;
    }
    false
}

/// Feed a library file through the macro definition processor.  COPY is
/// spliced inline so the statement queue stays self contained.
fn define_from_lines(pass: &mut Pass, uri: &str, lines: Vec<parser::LogicalLine>) -> bool {
    let mut queue: VecDeque<(parser::LogicalLine,String)> =
        lines.into_iter().map(|l| (l,uri.to_string())).collect();
    let mut state: Option<MacroDefState> = None;
    while let Some((line,file)) = queue.pop_front() {
        let stmt = parser::parse_statement(&line,&file);
        if stmt.empty {
            continue;
        }
        let canon = canon_of(pass,&stmt);
        match state.as_mut() {
            None => {
                if canon.as_deref() == Some("MACRO") {
                    state = Some(MacroDefState::new(&stmt));
                }
            },
            Some(st) => {
                if canon.as_deref() == Some("COPY") {
                    let member = stmt.operand_text().trim().to_string();
                    if !member.is_empty() {
                        if let Some(copy) = resolve_copy_member(pass,&member,&stmt) {
                            st.note_copy_member(copy.file.clone());
                            for line in copy.lines.iter().rev() {
                                queue.push_front((line.clone(),copy.file.clone()));
                            }
                        }
                    }
                    continue;
                }
                if st.process(pass,&stmt) {
                    return true;
                }
            }
        }
    }
    false
}

fn canon_of(pass: &mut Pass, stmt: &Statement) -> Option<String> {
    if stmt.instr.is_empty() || parser::has_variable(&stmt.instr) {
        return None;
    }
    let id = pass.ctx.intern(&stmt.instr);
    match pass.ctx.resolve_op(&id) {
        ResolvedOp::Op(op) if matches!(op.kind,InstructionKind::Ca | InstructionKind::Assembler) =>
            Some(pass.ctx.pool.string(&op.canon)),
        _ => None
    }
}

fn cache_entry(pass: &Pass, uri: &str, def: &Arc<MacroDef>, names: Vec<String>) -> CachedMacro {
    let pool = &pass.ctx.pool;
    let mut files = vec![uri.to_string()];
    files.extend(def.copy_members_used.iter().cloned());
    CachedMacro {
        name: pool.string(&def.id),
        label_param: def.label_param.map(|id| pool.string(&id)),
        params: def.params.iter().map(|p| (pool.string(&p.name),p.keyword,p.default.clone())).collect(),
        body: def.body.iter().map(|s| (s.text.clone(),s.file.clone(),s.row)).collect(),
        labels: def.labels.iter().map(|(id,idx)| (pool.string(id),*idx)).collect(),
        fingerprint: names.into_iter().map(|n| {
            let repr = pass.ctx.op_repr(&n);
            (n,repr)
        }).collect(),
        files
    }
}

fn install_cached(pass: &mut Pass, entry: &CachedMacro) {
    let id = pass.ctx.intern(&entry.name);
    let label_param = entry.label_param.as_ref().map(|n| pass.ctx.intern(n));
    let params = entry.params.iter().map(|(n,k,d)| MacroParamSpec {
        name: pass.ctx.intern(n),
        keyword: *k,
        default: d.clone()
    }).collect();
    let body = entry.body.iter().map(|(text,file,row)| StoredStatement {
        text: text.clone(),
        file: file.clone(),
        row: *row
    }).collect();
    let labels = entry.labels.iter().map(|(n,idx)| (pass.ctx.intern(n),*idx)).collect();
    for file in entry.files.iter() {
        pass.ctx.visited_files.insert(file.clone());
    }
    let def = MacroDef {
        id,
        label_param,
        params,
        body,
        labels,
        location: None,
        copy_members_used: entry.files.iter().skip(1).cloned().collect()
    };
    log::debug!("adopted cached macro {}",entry.name);
    pass.ctx.macros.insert(id,Arc::new(def));
}

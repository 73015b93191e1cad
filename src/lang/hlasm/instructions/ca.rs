//! Conditional assembly instruction family.
//!
//! SET symbols, scope declarations, branching, the branch counter, and the
//! macro definition delimiters.  Branch targets are sequence symbols: in a
//! macro they must exist in the stored body, in open code a forward target
//! starts a branching lookahead and a backward target restores the saved
//! source position.

use std::sync::OnceLock;
use super::HandlerMap;
use super::super::processors::{Pass,Interrupt,report_ca};
use super::super::processors::lookahead::LookaheadGoal;
use super::super::statement::{Statement,LabelField};
use super::super::expressions::{Scanner,ca as ca_expr};
use super::super::expressions::ca::CaError;
use super::super::variables::{VarSym,SetKind,SetSymbol,CaValue,MAX_SET_SUBSCRIPT};
use super::super::context::SeqSymbol;
use super::super::opcodes::Opcode;
use super::super::providers;
use super::super::MAX_SETC_LENGTH;

type CaHandler = fn(&mut Pass,&Statement) -> Option<Interrupt>;

static TABLE: OnceLock<HandlerMap<CaHandler>> = OnceLock::new();

fn table() -> &'static HandlerMap<CaHandler> {
    TABLE.get_or_init(|| HandlerMap::new(&[
        ("SETA",process_seta as CaHandler),
        ("SETB",process_setb),
        ("SETC",process_setc),
        ("LCLA",process_lcla),
        ("LCLB",process_lclb),
        ("LCLC",process_lclc),
        ("GBLA",process_gbla),
        ("GBLB",process_gblb),
        ("GBLC",process_gblc),
        ("ANOP",process_anop),
        ("AIF",process_aif),
        ("AGO",process_ago),
        ("ACTR",process_actr),
        ("AREAD",process_aread),
        ("ASPACE",process_noop),
        ("AEJECT",process_noop),
        ("MACRO",process_macro),
        ("MEND",process_mend),
        ("MEXIT",process_mexit),
        ("MHELP",process_mhelp)
    ]))
}

pub fn process(pass: &mut Pass, stmt: &Statement, op: &Opcode) -> Option<Interrupt> {
    match table().find(&op.canon) {
        Some(handler) => handler(pass,stmt),
        None => None
    }
}

/// the SET target named in the label field: id, subscript, had a subscript
fn set_target(pass: &mut Pass, stmt: &Statement) -> Option<(super::super::ids::Id,usize,bool)> {
    let text = match &stmt.label {
        LabelField::Variable(text) => text.clone(),
        _ => {
            pass.diags.add(&stmt.file,stmt.label_range,"E010","SET requires a variable symbol in the name field");
            return None;
        }
    };
    let mut scan = Scanner::new(text.trim_start_matches('&'));
    let name = scan.name();
    if name.is_empty() {
        pass.diags.add(&stmt.file,stmt.label_range,"S0003","bad variable symbol");
        return None;
    }
    let mut subscript = 0usize;
    let mut subscripted = false;
    if scan.eat('(') {
        match ca_expr::arith_expr(&mut scan,&pass.ctx) {
            Ok(v) => {
                if v < 1 || v > MAX_SET_SUBSCRIPT as i64 {
                    pass.diags.add(&stmt.file,stmt.label_range,"E020",
                        &format!("subscript {} is out of range",v));
                    return None;
                }
                subscript = v as usize;
                subscripted = true;
            },
            Err(CaError::Msg(code,mess)) => {
                pass.diags.add(&stmt.file,stmt.label_range,code,&mess);
                return None;
            },
            Err(CaError::Need(_)) => {
                pass.diags.add(&stmt.file,stmt.label_range,"E020","subscript must be evaluable");
                return None;
            }
        }
    }
    Some((pass.ctx.intern(&name),subscript,subscripted))
}

/// evaluate one SET operand in the kind's own grammar
fn set_operand(pass: &Pass, kind: SetKind, text: &str) -> Result<CaValue,CaError> {
    match kind {
        SetKind::A => ca_expr::eval_arith(text,&pass.ctx).map(CaValue::A),
        SetKind::B => ca_expr::eval_bool(text,&pass.ctx).map(CaValue::B),
        SetKind::C => ca_expr::eval_char(text,&pass.ctx).map(|mut s| {
            s.truncate(MAX_SETC_LENGTH);
            CaValue::C(s)
        })
    }
}

fn process_set(pass: &mut Pass, stmt: &Statement, kind: SetKind) -> Option<Interrupt> {
    let (id,subscript,subscripted) = set_target(pass,stmt)?;
    // locate or create the symbol, globals win for names declared GBL here
    let is_global = pass.ctx.current_scope().global_names.contains(&id);
    {
        let existing = match is_global {
            true => pass.ctx.globals.get(&id).map(|s| (s.kind,true)),
            false => match pass.ctx.current_scope().variables.get(&id) {
                Some(VarSym::Set(s)) => Some((s.kind,false)),
                Some(VarSym::Param(_)) => {
                    pass.diags.add(&stmt.file,stmt.label_range,"E052",
                        "a macro parameter cannot be the target of SET");
                    return None;
                },
                None => None
            }
        };
        if let Some((have,_)) = existing {
            if have != kind {
                pass.diags.add(&stmt.file,stmt.label_range,"E051",
                    "SET kind does not match the symbol's declaration");
                return None;
            }
        }
    }
    // evaluate all operands before storing any, empty slots stay unchanged
    let mut values: Vec<(usize,CaValue)> = Vec::new();
    for (i,op) in stmt.operands.iter().enumerate() {
        if op.text.trim().is_empty() {
            continue;
        }
        match set_operand(pass,kind,&op.text) {
            Ok(v) => values.push((i,v)),
            Err(err) => return report_ca(pass,stmt,err)
        }
    }
    let scalar_store = !subscripted;
    if is_global {
        let sym = pass.ctx.globals.entry(id).or_insert(SetSymbol::new(kind,scalar_store,true));
        store_values(sym,subscript,subscripted,values);
    } else {
        let scope = pass.ctx.current_scope_mut();
        let entry = scope.variables.entry(id).or_insert(VarSym::Set(SetSymbol::new(kind,scalar_store,false)));
        if let VarSym::Set(sym) = entry {
            store_values(sym,subscript,subscripted,values);
        }
    }
    None
}

fn store_values(sym: &mut SetSymbol, subscript: usize, subscripted: bool, values: Vec<(usize,CaValue)>) {
    for (i,v) in values {
        let idx = match (sym.scalar,subscripted) {
            (true,_) => 0,
            (false,true) => subscript + i,
            (false,false) => 1 + i
        };
        sym.set(idx,v);
    }
}

fn process_seta(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_set(pass,stmt,SetKind::A)
}
fn process_setb(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_set(pass,stmt,SetKind::B)
}
fn process_setc(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    process_set(pass,stmt,SetKind::C)
}

/// LCL*/GBL* operand: `&NAME` or `&NAME(dim)`, dim makes it subscripted
fn declare(pass: &mut Pass, stmt: &Statement, kind: SetKind, global: bool) -> Option<Interrupt> {
    for op in stmt.operands.iter() {
        let text = op.text.trim();
        if text.is_empty() {
            continue;
        }
        let Some(rest) = text.strip_prefix('&') else {
            pass.diags.add(&stmt.file,op.range,"E010",
                &format!("{} requires variable symbols",stmt.instr));
            continue;
        };
        let mut scan = Scanner::new(rest);
        let name = scan.name();
        if name.is_empty() {
            pass.diags.add(&stmt.file,op.range,"S0003","bad variable symbol");
            continue;
        }
        let scalar = !scan.eat('(');
        let id = pass.ctx.intern(&name);
        if global {
            pass.ctx.current_scope_mut().global_names.insert(id);
            // first declaration creates the shared symbol, later ones adopt it
            let sym = pass.ctx.globals.entry(id).or_insert(SetSymbol::new(kind,scalar,true));
            if sym.kind != kind {
                pass.diags.add(&stmt.file,op.range,"E051",
                    &format!("&{} is already a global of another kind",name));
                pass.ctx.current_scope_mut().global_names.remove(&id);
            }
        } else {
            let scope = pass.ctx.current_scope_mut();
            match scope.variables.get(&id) {
                Some(VarSym::Set(have)) if have.kind != kind => {
                    pass.diags.add(&stmt.file,op.range,"E051",
                        &format!("&{} is already declared with another kind",name));
                },
                Some(_) => {},
                None => {
                    scope.variables.insert(id,VarSym::Set(SetSymbol::new(kind,scalar,false)));
                }
            }
        }
    }
    None
}

fn process_lcla(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    declare(pass,stmt,SetKind::A,false)
}
fn process_lclb(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    declare(pass,stmt,SetKind::B,false)
}
fn process_lclc(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    declare(pass,stmt,SetKind::C,false)
}
fn process_gbla(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    declare(pass,stmt,SetKind::A,true)
}
fn process_gblb(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    declare(pass,stmt,SetKind::B,true)
}
fn process_gblc(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    declare(pass,stmt,SetKind::C,true)
}

fn process_anop(_pass: &mut Pass, _stmt: &Statement) -> Option<Interrupt> {
    None
}

fn process_noop(_pass: &mut Pass, _stmt: &Statement) -> Option<Interrupt> {
    None
}

fn process_actr(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let text = stmt.operand_text();
    match ca_expr::eval_arith(&text,&pass.ctx) {
        Ok(v) => {
            pass.ctx.current_scope_mut().branch_counter = v;
            None
        },
        Err(err) => report_ca(pass,stmt,err)
    }
}

fn process_mhelp(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    let text = stmt.operand_text();
    match ca_expr::eval_arith(&text,&pass.ctx) {
        Ok(v) if v >= 0 => {
            pass.ctx.sysndx_limit = v as usize;
            None
        },
        Ok(_) => {
            pass.diags.add(&stmt.file,stmt.operand_range,"E020","MHELP limit must not be negative");
            None
        },
        Err(err) => report_ca(pass,stmt,err)
    }
}

/// Take a branch to a sequence symbol.  The ACTR counter guards every taken
/// branch; exhausting it warns W063 and terminates the containing macro.
fn branch(pass: &mut Pass, stmt: &Statement, target: &str) -> Option<Interrupt> {
    if !pass.ctx.decrement_branch_counter() {
        if !pass.ctx.current_scope().branch_limit_hit {
            pass.ctx.current_scope_mut().branch_limit_hit = true;
            pass.diags.add(&stmt.file,stmt.range,"W063",
                "ACTR branch limit exceeded, conditional assembly terminated");
        }
        if pass.ctx.is_in_macro() {
            pass.ctx.leave_macro();
        }
        return None;
    }
    let id = pass.ctx.intern(target);
    let seq = pass.ctx.current_scope().sequence_symbols.get(&id).cloned();
    match seq {
        Some(SeqSymbol::MacroBody(idx)) => {
            if let Some(inv) = pass.ctx.current_scope_mut().invocation.as_mut() {
                inv.pos = idx;
            }
            None
        },
        Some(SeqSymbol::Opencode(snap)) => {
            pass.ctx.restore(&snap);
            None
        },
        None => {
            if pass.ctx.is_in_macro() {
                // macro body labels are known in full at definition time
                pass.diags.add(&stmt.file,stmt.operand_range,"E047",
                    &format!("undefined sequence symbol .{}",target));
                return None;
            }
            Some(Interrupt::Lookahead(LookaheadGoal::SeqBranch { target: id }))
        }
    }
}

/// split `(expr).TARGET` into the parenthesized text and the target name
fn split_cond_target(text: &str) -> Option<(String,String)> {
    let chars: Vec<char> = text.trim().chars().collect();
    if chars.first() != Some(&'(') {
        return None;
    }
    let mut depth = 0;
    let mut in_string = false;
    for (i,c) in chars.iter().enumerate() {
        if in_string {
            if *c == '\'' {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' if i > 0 && !chars[i-1].is_ascii_alphanumeric() => in_string = true,
            '\'' if i > 0 && matches!(chars[i-1].to_ascii_uppercase(),'L'|'K'|'N'|'T'|'I'|'S'|'D'|'O')
                && (i < 2 || !chars[i-2].is_ascii_alphanumeric()) => {},
            '\'' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let inner: String = chars[1..i].iter().collect();
                    let rest: String = chars[i+1..].iter().collect();
                    let target = rest.trim().strip_prefix('.')?.to_string();
                    return Some((inner,target));
                }
            },
            _ => {}
        }
    }
    None
}

fn process_aif(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if stmt.operands.is_empty() {
        pass.diags.add(&stmt.file,stmt.range,"A010","AIF requires an operand");
        return None;
    }
    // extended AIF evaluates each (condition).target until one is true
    for op in stmt.operands.iter() {
        let Some((cond,target)) = split_cond_target(&op.text) else {
            pass.diags.add(&stmt.file,op.range,"A010",
                "AIF operand must be a parenthesized condition followed by a sequence symbol");
            continue;
        };
        match ca_expr::eval_bool(&cond,&pass.ctx) {
            Ok(true) => return branch(pass,stmt,&target),
            Ok(false) => {},
            Err(err) => return report_ca(pass,stmt,err)
        }
    }
    None
}

fn process_ago(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if stmt.operands.is_empty() {
        pass.diags.add(&stmt.file,stmt.range,"A010","AGO requires an operand");
        return None;
    }
    let first = stmt.operands[0].text.trim().to_string();
    // computed AGO: (expr).T1,.T2,... jumps to the Nth target
    if first.starts_with('(') {
        let Some((expr,first_target)) = split_cond_target(&first) else {
            pass.diags.add(&stmt.file,stmt.operands[0].range,"A010","bad computed AGO operand");
            return None;
        };
        let n = match ca_expr::eval_arith(&expr,&pass.ctx) {
            Ok(v) => v,
            Err(err) => return report_ca(pass,stmt,err)
        };
        let mut targets = vec![first_target];
        for op in stmt.operands.iter().skip(1) {
            match op.text.trim().strip_prefix('.') {
                Some(t) => targets.push(t.to_string()),
                None => {
                    pass.diags.add(&stmt.file,op.range,"A010","computed AGO targets must be sequence symbols");
                    return None;
                }
            }
        }
        if n < 1 || n as usize > targets.len() {
            pass.diags.add(&stmt.file,stmt.operand_range,"E020",
                &format!("computed AGO selector {} is out of range",n));
            return None;
        }
        let target = targets[(n-1) as usize].clone();
        return branch(pass,stmt,&target);
    }
    match first.strip_prefix('.') {
        Some(target) => branch(pass,stmt,&target.to_string()),
        None => {
            pass.diags.add(&stmt.file,stmt.operand_range,"A010","AGO target must be a sequence symbol");
            None
        }
    }
}

fn process_aread(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if !pass.ctx.is_in_macro() {
        pass.diags.add(&stmt.file,stmt.range,"E070","AREAD is only valid inside a macro");
        return None;
    }
    let option = stmt.operands.first().map(|op| op.text.trim().to_ascii_uppercase()).unwrap_or_default();
    let value = match option.as_str() {
        // both clock forms read one timestamp, fields cannot straddle midnight
        "CLOCKB" => {
            let now = chrono::Local::now();
            let centis = now.time().signed_duration_since(chrono::NaiveTime::MIN).num_milliseconds() / 10;
            format!("{:08}",centis)
        },
        "CLOCKD" => {
            let now = chrono::Local::now();
            let centis = now.time().signed_duration_since(chrono::NaiveTime::MIN).num_milliseconds() / 10;
            format!("{}{:02}",now.format("%H%M%S"),centis % 100)
        },
        _ => providers::read_raw_line(&mut pass.ctx).unwrap_or_default()
    };
    let (id,subscript,subscripted) = set_target(pass,stmt)?;
    let scope = pass.ctx.current_scope_mut();
    let entry = scope.variables.entry(id).or_insert(VarSym::Set(SetSymbol::new(SetKind::C,!subscripted,false)));
    if let VarSym::Set(sym) = entry {
        if sym.kind == SetKind::C {
            let idx = match sym.scalar {
                true => 0,
                false => subscript.max(1)
            };
            sym.set(idx,CaValue::C(value));
        } else {
            pass.diags.add(&stmt.file,stmt.label_range,"E051","AREAD target must be a SETC symbol");
        }
    } else {
        pass.diags.add(&stmt.file,stmt.label_range,"E052","AREAD target cannot be a macro parameter");
    }
    None
}

fn process_macro(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if !stmt.label.is_empty() {
        pass.diags.add(&stmt.file,stmt.label_range,"E044","MACRO must not have a name field");
    }
    Some(Interrupt::MacroDef(stmt.clone()))
}

fn process_mend(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    // during replay MEND ends the invocation, in open code it is unmatched
    if pass.ctx.is_in_macro() {
        pass.ctx.leave_macro();
    } else {
        pass.diags.add(&stmt.file,stmt.range,"E046","MEND is not inside a macro definition");
    }
    None
}

fn process_mexit(pass: &mut Pass, stmt: &Statement) -> Option<Interrupt> {
    if pass.ctx.is_in_macro() {
        pass.ctx.leave_macro();
    } else {
        pass.diags.add(&stmt.file,stmt.range,"E046","MEXIT is not inside a macro definition");
    }
    None
}

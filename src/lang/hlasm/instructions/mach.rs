//! Machine instruction family.
//!
//! A recognized machine or mnemonic opcode reserves storage equal to its
//! encoded size on a halfword boundary and defines the label, if any, with
//! type I and the instruction size as its length.  Operand expressions with
//! unresolved symbols are deferred for a later check; literals are
//! registered against the current location counter.

use super::super::processors::Pass;
use super::super::statement::{Statement,LabelField};
use super::super::expressions::mach;
use super::super::context::ordinary::{self,SymbolValue,SymbolAttrs,Postponed,PostponedKind,Dep};
use super::super::opcodes::Opcode;
use super::asm::register_literal;

pub fn process(pass: &mut Pass, stmt: &Statement, op: &Opcode) {
    let Some(desc) = op.mach else {
        return;
    };
    let size = desc.format.size();
    let addr = pass.ctx.ord.reserve(size,2);
    if let LabelField::Name(name) = &stmt.label {
        let id = pass.ctx.intern(name);
        let loc = match lsp_types::Url::parse(&stmt.file) {
            Ok(uri) => Some(lsp_types::Location::new(uri,stmt.label_range)),
            Err(_) => None
        };
        if pass.ctx.ord.define(id,
            SymbolValue::Relocatable(addr),
            SymbolAttrs::with_type(b'I',size.clamp(0,65535) as u16),
            loc).is_err() {
            pass.diags.add(&stmt.file,stmt.label_range,"E031",
                &format!("symbol {} is already defined",name));
        } else {
            ordinary::resolve_ready(&mut pass.ctx.ord,&mut pass.ctx.pool,&mut pass.diags);
        }
    }
    let count = match stmt.operands.len() {
        1 if stmt.operands[0].text.trim().is_empty() => 0,
        n => n
    };
    if count < desc.min_operands || count > desc.max_operands {
        pass.diags.add(&stmt.file,stmt.operand_range,"A010",
            &format!("{} expects {} to {} operands, found {}",
                stmt.instr.to_ascii_uppercase(),desc.min_operands,desc.max_operands,count));
    }
    for op in stmt.operands.iter() {
        let text = op.text.trim();
        if text.is_empty() {
            if count > 0 {
                pass.diags.add(&stmt.file,op.range,"A010","operand expected");
            }
            continue;
        }
        if text.starts_with('=') {
            register_literal(pass,stmt,op.range,text);
            continue;
        }
        check_operand(pass,stmt,op.range,text);
    }
}

/// Evaluate the leading expression of an operand.  The displacement of a
/// `D(X,B)` form is the text before the top level parenthesis.
fn check_operand(pass: &mut Pass, stmt: &Statement, range: lsp_types::Range, text: &str) {
    let expr = leading_expr(text);
    if expr.is_empty() {
        return;
    }
    let here = pass.ctx.ord.here();
    let outcome = {
        let ctx = &mut pass.ctx;
        mach::eval_with_refs(&expr,&mut mach::MachEnv {
            symbols: &ctx.ord.symbols,
            pool: &mut ctx.pool,
            here
        })
    };
    match outcome {
        Ok((mach::MachEval::Value(_),refs)) => {
            register_refs(pass,stmt,range,refs);
        },
        Ok((mach::MachEval::Deferred(deps),refs)) => {
            register_refs(pass,stmt,range,refs);
            let deps: Vec<Dep> = deps.into_iter().map(Dep::Sym).collect();
            pass.ctx.ord.postpone(Postponed {
                kind: PostponedKind::Check { expr },
                deps,
                file: stmt.file.clone(),
                range,
                here: pass.ctx.ord.here()
            });
        },
        Err(mess) => {
            pass.diags.add(&stmt.file,range,"A010",&mess);
        }
    }
}

fn register_refs(pass: &mut Pass, stmt: &Statement, range: lsp_types::Range, refs: Vec<super::super::ids::Id>) {
    let loc = match lsp_types::Url::parse(&stmt.file) {
        Ok(uri) => Some(lsp_types::Location::new(uri,range)),
        Err(_) => None
    };
    for id in refs {
        pass.ctx.ord.register_ref(id,loc.clone());
    }
}

fn leading_expr(text: &str) -> String {
    let mut depth = 0;
    let mut in_string = false;
    let chars: Vec<char> = text.chars().collect();
    for (i,c) in chars.iter().enumerate() {
        if in_string {
            if *c == '\'' {
                in_string = false;
            }
            continue;
        }
        match c {
            '\'' if i > 0 && chars[i-1].is_ascii_alphabetic() => in_string = true,
            '(' if depth == 0 => return chars[..i].iter().collect(),
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    text.to_string()
}

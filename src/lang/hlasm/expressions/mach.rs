//! Ordinary assembly expression evaluation.
//!
//! Terms are decimal numbers, self-defining terms (`X'1F'`, `B'101'`,
//! `C'AB'`), ordinary symbols, the location counter `*`, and the `L'`
//! length attribute.  The evaluator collects the undefined symbols it
//! touches and reports them as dependencies instead of failing, which is
//! what lets the dependency solver re-run the same text later.

use std::collections::HashMap;
use super::Scanner;
use super::super::ids::{Id,IdPool};
use super::super::context::ordinary::{OrdSymbol,SymbolValue,RelocValue};

#[derive(Clone,PartialEq,Debug)]
pub enum MachValue {
    Abs(i64),
    Reloc(RelocValue)
}

#[derive(Clone,PartialEq,Debug)]
pub enum MachEval {
    Value(MachValue),
    Deferred(Vec<Id>)
}

pub struct MachEnv<'a> {
    pub symbols: &'a HashMap<Id,OrdSymbol>,
    pub pool: &'a mut IdPool,
    /// value of `*` at the statement being evaluated
    pub here: Option<RelocValue>
}

struct Eval<'a,'b> {
    scan: Scanner,
    env: &'a mut MachEnv<'b>,
    deps: Vec<Id>,
    /// every symbol consulted, defined or not
    refs: Vec<Id>
}

type EvalResult = Result<MachValue,String>;

impl<'a,'b> Eval<'a,'b> {
    fn new(text: &str, env: &'a mut MachEnv<'b>) -> Self {
        Self {
            scan: Scanner::new(text),
            env,
            deps: Vec::new(),
            refs: Vec::new()
        }
    }
    fn symbol_term(&mut self, name: &str) -> MachValue {
        let id = self.env.pool.intern(name);
        self.refs.push(id);
        match self.env.symbols.get(&id) {
            Some(sym) => match &sym.value {
                SymbolValue::Absolute(v) => MachValue::Abs(*v),
                SymbolValue::Relocatable(r) => MachValue::Reloc(r.clone()),
                SymbolValue::Undefined => {
                    self.deps.push(id);
                    MachValue::Abs(0)
                }
            },
            None => {
                self.deps.push(id);
                MachValue::Abs(0)
            }
        }
    }
    fn length_attr(&mut self, name: &str) -> MachValue {
        let id = self.env.pool.intern(name);
        self.refs.push(id);
        match self.env.symbols.get(&id) {
            Some(sym) if sym.value != SymbolValue::Undefined => MachValue::Abs(sym.attrs.length as i64),
            _ => {
                self.deps.push(id);
                MachValue::Abs(0)
            }
        }
    }
    fn term(&mut self) -> EvalResult {
        self.scan.skip_blanks();
        match self.scan.peek() {
            Some('(') => {
                self.scan.next();
                let v = self.expr()?;
                if !self.scan.eat(')') {
                    return Err("missing closing parenthesis".to_string());
                }
                Ok(v)
            },
            Some('*') => {
                self.scan.next();
                match self.env.here.clone() {
                    Some(r) => Ok(MachValue::Reloc(r)),
                    None => Err("location counter reference outside any section".to_string())
                }
            },
            Some('=') => Err("literal is not valid in this expression".to_string()),
            Some(c) if c.is_ascii_digit() => {
                match self.scan.number() {
                    Some(v) => Ok(MachValue::Abs(v)),
                    None => Err("bad number".to_string())
                }
            },
            Some(c) if Scanner::is_symbol_char(c) => {
                // self-defining term, length attribute, or symbol
                let type_letter = c.to_ascii_uppercase();
                if self.scan.peek_at(1) == Some('\'') {
                    if type_letter == 'L' {
                        self.scan.next();
                        self.scan.next();
                        let name = self.scan.name();
                        if name.is_empty() {
                            return Err("L' requires a symbol".to_string());
                        }
                        return Ok(self.length_attr(&name));
                    }
                    if matches!(type_letter,'X'|'B'|'C') {
                        self.scan.next();
                        self.scan.next();
                        let body = match self.scan.quoted_body() {
                            Some(b) => b,
                            None => return Err("unterminated self-defining term".to_string())
                        };
                        return match super::self_defining(type_letter,&body) {
                            Some(v) => Ok(MachValue::Abs(v)),
                            None => Err(format!("bad {}-type self-defining term",type_letter))
                        };
                    }
                }
                let name = self.scan.name();
                Ok(self.symbol_term(&name))
            },
            _ => Err("expression term expected".to_string())
        }
    }
    fn unary(&mut self) -> EvalResult {
        self.scan.skip_blanks();
        if self.scan.eat('-') {
            let v = self.unary()?;
            return match v {
                MachValue::Abs(a) => Ok(MachValue::Abs(-a)),
                MachValue::Reloc(_) => Err("cannot negate a relocatable value".to_string())
            };
        }
        if self.scan.eat('+') {
            return self.unary();
        }
        self.term()
    }
    fn product(&mut self) -> EvalResult {
        let mut lhs = self.unary()?;
        loop {
            self.scan.skip_blanks();
            match self.scan.peek() {
                Some('*') => {
                    self.scan.next();
                    let rhs = self.unary()?;
                    lhs = match (lhs,rhs) {
                        (MachValue::Abs(a),MachValue::Abs(b)) => MachValue::Abs(a.wrapping_mul(b)),
                        _ => return Err("relocatable value in multiplication".to_string())
                    };
                },
                Some('/') => {
                    self.scan.next();
                    let rhs = self.unary()?;
                    lhs = match (lhs,rhs) {
                        // division by zero yields zero by definition
                        (MachValue::Abs(_),MachValue::Abs(0)) => MachValue::Abs(0),
                        (MachValue::Abs(a),MachValue::Abs(b)) => MachValue::Abs(a / b),
                        _ => return Err("relocatable value in division".to_string())
                    };
                },
                _ => return Ok(lhs)
            }
        }
    }
    fn expr(&mut self) -> EvalResult {
        let mut lhs = self.product()?;
        loop {
            self.scan.skip_blanks();
            match self.scan.peek() {
                Some('+') => {
                    self.scan.next();
                    let rhs = self.product()?;
                    lhs = add(lhs,rhs)?;
                },
                Some('-') => {
                    self.scan.next();
                    let rhs = self.product()?;
                    lhs = sub(lhs,rhs)?;
                },
                _ => return Ok(lhs)
            }
        }
    }
}

fn add(lhs: MachValue, rhs: MachValue) -> EvalResult {
    match (lhs,rhs) {
        (MachValue::Abs(a),MachValue::Abs(b)) => Ok(MachValue::Abs(a.wrapping_add(b))),
        (MachValue::Reloc(mut r),MachValue::Abs(b)) | (MachValue::Abs(b),MachValue::Reloc(mut r)) => {
            r.offset += b;
            Ok(MachValue::Reloc(r))
        },
        (MachValue::Reloc(_),MachValue::Reloc(_)) => Err("sum of two relocatable values".to_string())
    }
}

fn sub(lhs: MachValue, rhs: MachValue) -> EvalResult {
    match (lhs,rhs) {
        (MachValue::Abs(a),MachValue::Abs(b)) => Ok(MachValue::Abs(a.wrapping_sub(b))),
        (MachValue::Reloc(mut r),MachValue::Abs(b)) => {
            r.offset -= b;
            Ok(MachValue::Reloc(r))
        },
        (MachValue::Abs(_),MachValue::Reloc(_)) => Err("cannot subtract a relocatable value from an absolute one".to_string()),
        (MachValue::Reloc(a),MachValue::Reloc(b)) => {
            if a.loctr != b.loctr || a.spaces != b.spaces {
                return Err("difference of addresses from different location counters".to_string());
            }
            Ok(MachValue::Abs(a.offset - b.offset))
        }
    }
}

/// Evaluate an expression.  `Deferred` lists the undefined symbols that
/// stopped the evaluation, `Err` is a malformed expression.
pub fn eval_expr(text: &str, env: &mut MachEnv) -> Result<MachEval,String> {
    let (eval,_) = eval_with_refs(text,env)?;
    Ok(eval)
}

/// Same as `eval_expr` but also reports every symbol the expression touched
/// so the caller can maintain the cross reference.
pub fn eval_with_refs(text: &str, env: &mut MachEnv) -> Result<(MachEval,Vec<Id>),String> {
    if text.trim().is_empty() {
        return Err("expression is empty".to_string());
    }
    let mut eval = Eval::new(text.trim(),env);
    let value = eval.expr()?;
    eval.scan.skip_blanks();
    if !eval.scan.done() {
        return Err("unexpected text after expression".to_string());
    }
    let refs = eval.refs;
    match eval.deps.is_empty() {
        true => Ok((MachEval::Value(value),refs)),
        false => {
            let mut deps = eval.deps;
            deps.dedup();
            Ok((MachEval::Deferred(deps),refs))
        }
    }
}

/// the length attribute of the leftmost term, used for the EQU default
pub fn leftmost_length(text: &str, env: &mut MachEnv) -> Option<u16> {
    let mut scan = Scanner::new(text.trim());
    scan.skip_blanks();
    while scan.eat('(') || scan.eat('+') || scan.eat('-') {
        scan.skip_blanks();
    }
    match scan.peek() {
        Some(c) if c.is_ascii_alphabetic() || matches!(c,'_'|'$'|'#'|'@') => {
            if scan.peek_at(1) == Some('\'') {
                return None;
            }
            let name = scan.name();
            let id = env.pool.intern(&name);
            match env.symbols.get(&id) {
                Some(sym) if sym.value != SymbolValue::Undefined => Some(sym.attrs.length),
                _ => None
            }
        },
        _ => None
    }
}

//! Conditional assembly expression evaluation.
//!
//! SETA expressions accept decimal numbers, self-defining terms, variable
//! references, and the numeric data attributes.  SETB expressions accept
//! relations over arithmetic or character comparands joined by NOT, AND, OR.
//! SETC expressions concatenate quoted strings (with substitution inside),
//! variable references, substrings, and duplication factors.
//!
//! An attribute reference to an ordinary symbol that is not defined yet does
//! not fail, it reports `CaError::Need` so the processor can run a lookahead
//! and evaluate the statement again.  After a lookahead that found nothing
//! the attribute answers its default, `L'` of such a symbol is 1.

use super::Scanner;
use super::super::context::HlasmContext;
use super::super::context::ordinary::SymbolValue;
use super::super::variables::{CaValue,VarSym,MacroParamData};

#[derive(Clone,PartialEq,Debug)]
pub enum CaError {
    /// an attribute needs a symbol that may be defined further down
    Need(String),
    /// diagnosable failure: code and message
    Msg(&'static str,String)
}

pub type CaResult<T> = Result<T,CaError>;

fn msg<T>(code: &'static str, mess: impl Into<String>) -> CaResult<T> {
    Err(CaError::Msg(code,mess.into()))
}

/// Read a variable reference, cursor past the ampersand.  Returns the value
/// and consumes an optional subscript list and dot terminator.
fn var_ref(scan: &mut Scanner, ctx: &HlasmContext, eat_dot: bool) -> CaResult<CaValue> {
    let name = scan.name();
    if name.is_empty() {
        return msg("S0003","ampersand must begin a variable symbol");
    }
    let mut subs: Vec<i64> = Vec::new();
    if scan.peek() == Some('(') {
        let start = scan.pos();
        scan.next();
        loop {
            let v = arith_expr(scan,ctx)?;
            subs.push(v);
            if scan.eat(',') {
                continue;
            }
            break;
        }
        if !scan.eat(')') {
            // not a subscript after all, some pseudo-ops take &VAR(...) literally
            scan.set_pos(start);
            subs.clear();
        }
    }
    if eat_dot {
        scan.eat('.');
    }
    var_value(ctx,&name,&subs)
}

/// value of a variable by name, subscripts already evaluated
pub fn var_value(ctx: &HlasmContext, name: &str, subs: &[i64]) -> CaResult<CaValue> {
    let upper = name.to_ascii_uppercase();
    if upper == "SYSLIST" {
        let id = match ctx.pool.find("SYSLIST") {
            Some(id) => id,
            None => return msg("E010","SYSLIST is only defined inside a macro")
        };
        match ctx.current_scope().variables.get(&id) {
            Some(VarSym::Param(data)) => {
                // entry 0 is the name field, positionals start at 1
                let mut idx: Vec<usize> = subs.iter().map(|v| (*v).max(0) as usize).collect();
                if let Some(first) = idx.first_mut() {
                    *first += 1;
                }
                return Ok(CaValue::C(data.index(&idx).to_text()));
            },
            _ => return msg("E010","SYSLIST is only defined inside a macro")
        }
    }
    if let Some(v) = ctx.system_var(&upper) {
        return Ok(v);
    }
    let id = match ctx.pool.find(&upper) {
        Some(id) => id,
        None => return msg("E010",format!("undefined variable symbol &{}",upper))
    };
    match ctx.get_var(&id) {
        Some(VarSym::Set(sym)) => {
            let idx = match sym.scalar {
                true => 0,
                false => subs.first().copied().unwrap_or(1).max(0) as usize
            };
            Ok(sym.get(idx))
        },
        Some(VarSym::Param(data)) => {
            let idx: Vec<usize> = subs.iter().map(|v| (*v).max(0) as usize).collect();
            Ok(CaValue::C(data.index(&idx).to_text()))
        },
        None => msg("E010",format!("undefined variable symbol &{}",upper))
    }
}

/// type attribute of a macro parameter value
fn value_type(data: &MacroParamData) -> char {
    match data {
        MacroParamData::Leaf(s) if s.is_empty() => 'O',
        MacroParamData::Leaf(s) if s.chars().all(|c| c.is_ascii_digit()) => 'N',
        _ => 'U'
    }
}

/// attribute of an ordinary symbol by name, `Need` when a lookahead could help
fn ordinary_attr(ctx: &HlasmContext, attr: char, name: &str) -> CaResult<CaValue> {
    let id = ctx.pool.find(name);
    let attrs = match id {
        Some(id) => match ctx.ord.symbols.get(&id) {
            Some(sym) if sym.value != SymbolValue::Undefined => Some(sym.attrs),
            _ => ctx.lookahead_attrs.get(&id).copied()
        },
        None => None
    };
    let attrs = match attrs {
        Some(attrs) => attrs,
        None => {
            let failed = match id {
                Some(id) => ctx.lookahead_failed.contains(&id),
                None => false
            };
            if !failed {
                return Err(CaError::Need(name.to_string()));
            }
            // defaults after an unsuccessful lookahead
            return Ok(match attr {
                'L' => CaValue::A(1),
                'D' => CaValue::B(false),
                'T' => CaValue::C("U".to_string()),
                _ => CaValue::A(0)
            });
        }
    };
    Ok(match attr {
        'L' => CaValue::A(attrs.length as i64),
        'D' => CaValue::B(true),
        'T' => CaValue::C((attrs.type_attr as char).to_string()),
        'I' => CaValue::A(attrs.integer as i64),
        'S' => CaValue::A(attrs.scale as i64),
        _ => CaValue::A(0)
    })
}

/// evaluate any attribute reference, cursor is on the attribute letter
fn attribute(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<CaValue> {
    let letter = scan.next().map(|c| c.to_ascii_uppercase()).unwrap_or(' ');
    scan.next(); // the apostrophe
    if scan.eat('&') {
        let name = scan.name();
        let mut subs: Vec<i64> = Vec::new();
        if scan.eat('(') {
            loop {
                subs.push(arith_expr(scan,ctx)?);
                if scan.eat(',') {
                    continue;
                }
                break;
            }
            if !scan.eat(')') {
                return msg("S0011","unbalanced subscript");
            }
        }
        let value = var_value(ctx,&name,&subs)?;
        return match letter {
            'K' => Ok(CaValue::A(value.as_c().chars().count() as i64)),
            'N' => {
                let upper = name.to_ascii_uppercase();
                let idx: Vec<usize> = subs.iter().map(|v| (*v).max(0) as usize).collect();
                let count = match ctx.pool.find(&upper).and_then(|id| ctx.get_var(&id)) {
                    // N' of SYSLIST itself counts positionals, not the name field
                    Some(VarSym::Param(data)) if upper == "SYSLIST" && idx.is_empty() =>
                        data.count().saturating_sub(1),
                    Some(VarSym::Param(data)) => data.index(&idx).count(),
                    Some(VarSym::Set(sym)) => sym.count(),
                    None => 0
                };
                Ok(CaValue::A(count as i64))
            },
            'T' => Ok(CaValue::C(value_type(&MacroParamData::Leaf(value.as_c())).to_string())),
            'L' | 'D' | 'I' | 'S' => {
                // attribute forwarded to the symbol the value names
                let text = value.as_c();
                match text.chars().all(|c| Scanner::is_symbol_char(c)) && !text.is_empty() {
                    true => ordinary_attr(ctx,letter,&text),
                    false => Ok(match letter {
                        'L' => CaValue::A(1),
                        'D' => CaValue::B(false),
                        _ => CaValue::A(0)
                    })
                }
            },
            _ => msg("S0011",format!("unknown data attribute {}'",letter))
        };
    }
    // attribute of an ordinary symbol or an operation code
    let name = scan.name();
    if name.is_empty() {
        return msg("S0011",format!("{}' requires a symbol",letter));
    }
    match letter {
        'O' => {
            let kind = match ctx.pool.find(&name) {
                Some(id) => match ctx.resolve_op(&id) {
                    super::super::context::ResolvedOp::Op(op) => match op.kind {
                        super::super::opcodes::InstructionKind::Machine => 'O',
                        super::super::opcodes::InstructionKind::Mnemonic => 'E',
                        _ => 'A'
                    },
                    super::super::context::ResolvedOp::Macro(_) => 'M',
                    super::super::context::ResolvedOp::Undefined => 'U'
                },
                None => 'U'
            };
            Ok(CaValue::C(kind.to_string()))
        },
        'K' | 'N' => msg("S0011",format!("{}' applies to variable symbols",letter)),
        _ => ordinary_attr(ctx,letter,&name)
    }
}

fn is_attr_start(scan: &Scanner) -> bool {
    match (scan.peek(),scan.peek_at(1)) {
        (Some(c),Some('\'')) => matches!(c.to_ascii_uppercase(),'L'|'K'|'N'|'T'|'I'|'S'|'D'|'O'),
        _ => false
    }
}

fn arith_term(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<i64> {
    scan.skip_blanks();
    if scan.eat('(') {
        let v = arith_expr(scan,ctx)?;
        if !scan.eat(')') {
            return msg("S0011","missing closing parenthesis");
        }
        return Ok(v);
    }
    if scan.eat('&') {
        let v = var_ref(scan,ctx,false)?;
        return match v.as_a() {
            Some(a) => Ok(a),
            None => msg("E052",format!("value '{}' is not arithmetic",v.as_c()))
        };
    }
    if is_attr_start(scan) {
        let v = attribute(scan,ctx)?;
        return match v.as_a() {
            Some(a) => Ok(a),
            None => msg("E052","attribute value is not arithmetic")
        };
    }
    if let Some(c) = scan.peek() {
        if matches!(c.to_ascii_uppercase(),'X'|'B'|'C') && scan.peek_at(1) == Some('\'') {
            let letter = c.to_ascii_uppercase();
            scan.next();
            scan.next();
            let body = match scan.quoted_body() {
                Some(b) => b,
                None => return msg("S0005","unterminated self-defining term")
            };
            return match super::self_defining(letter,&body) {
                Some(v) => Ok(v),
                None => msg("S0005",format!("bad {}-type self-defining term",letter))
            };
        }
        if c.is_ascii_digit() {
            return match scan.number() {
                Some(v) => Ok(v),
                None => msg("S0003","bad number")
            };
        }
    }
    msg("S0003","arithmetic term expected")
}

fn arith_unary(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<i64> {
    scan.skip_blanks();
    if scan.eat('-') {
        return Ok(-arith_unary(scan,ctx)?);
    }
    if scan.eat('+') {
        return arith_unary(scan,ctx);
    }
    arith_term(scan,ctx)
}

fn arith_product(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<i64> {
    let mut lhs = arith_unary(scan,ctx)?;
    loop {
        match scan.peek() {
            Some('*') => {
                scan.next();
                lhs = lhs.wrapping_mul(arith_unary(scan,ctx)?);
            },
            Some('/') => {
                let rhs = {
                    scan.next();
                    arith_unary(scan,ctx)?
                };
                // division by zero yields zero by definition
                lhs = match rhs {
                    0 => 0,
                    _ => lhs / rhs
                };
            },
            _ => return Ok(lhs)
        }
    }
}

pub fn arith_expr(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<i64> {
    let mut lhs = arith_product(scan,ctx)?;
    loop {
        match scan.peek() {
            Some('+') => {
                scan.next();
                lhs = lhs.wrapping_add(arith_product(scan,ctx)?);
            },
            Some('-') => {
                scan.next();
                lhs = lhs.wrapping_sub(arith_product(scan,ctx)?);
            },
            _ => return Ok(lhs)
        }
    }
}

/// one comparand of a relation: a character piece or an arithmetic expression
fn comparand(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<CaValue> {
    scan.skip_blanks();
    match scan.peek() {
        Some('\'') => Ok(CaValue::C(char_expr(scan,ctx)?)),
        Some('T') | Some('t') if scan.peek_at(1) == Some('\'') => attribute(scan,ctx),
        Some('O') | Some('o') if scan.peek_at(1) == Some('\'') => attribute(scan,ctx),
        _ => Ok(CaValue::A(arith_expr(scan,ctx)?))
    }
}

fn relation_keyword(scan: &mut Scanner) -> Option<&'static str> {
    scan.skip_blanks();
    let start = scan.pos();
    let word = scan.name().to_ascii_uppercase();
    for test in ["EQ","NE","LT","GT","LE","GE"] {
        if word == test {
            return Some(test);
        }
    }
    scan.set_pos(start);
    None
}

fn compare(op: &str, lhs: &CaValue, rhs: &CaValue) -> CaResult<bool> {
    let ord = match (lhs.kind(),rhs.kind()) {
        (super::super::variables::SetKind::C,_) | (_,super::super::variables::SetKind::C) =>
            lhs.as_c().cmp(&rhs.as_c()),
        _ => {
            let a = lhs.as_a().unwrap_or(0);
            let b = rhs.as_a().unwrap_or(0);
            a.cmp(&b)
        }
    };
    Ok(match op {
        "EQ" => ord.is_eq(),
        "NE" => ord.is_ne(),
        "LT" => ord.is_lt(),
        "GT" => ord.is_gt(),
        "LE" => ord.is_le(),
        _ => ord.is_ge()
    })
}

fn bool_prim(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<bool> {
    scan.skip_blanks();
    if scan.peek() == Some('(') {
        // could be a logical group or a parenthesized arithmetic comparand
        let start = scan.pos();
        scan.next();
        if let Ok(v) = bool_or(scan,ctx) {
            if scan.eat(')') && relation_keyword(scan).is_none() {
                return Ok(v);
            }
        }
        scan.set_pos(start);
    }
    let lhs = comparand(scan,ctx)?;
    match relation_keyword(scan) {
        Some(op) => {
            scan.skip_blanks();
            let rhs = comparand(scan,ctx)?;
            compare(op,&lhs,&rhs)
        },
        None => match lhs.as_b() {
            Some(b) => Ok(b),
            None => msg("E052","value is not boolean")
        }
    }
}

fn bool_not(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<bool> {
    scan.skip_blanks();
    let start = scan.pos();
    let word = scan.name().to_ascii_uppercase();
    if word == "NOT" {
        return Ok(!bool_not(scan,ctx)?);
    }
    scan.set_pos(start);
    bool_prim(scan,ctx)
}

fn bool_and(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<bool> {
    let mut lhs = bool_not(scan,ctx)?;
    loop {
        scan.skip_blanks();
        let start = scan.pos();
        let word = scan.name().to_ascii_uppercase();
        if word == "AND" {
            let rhs = bool_not(scan,ctx)?;
            lhs = lhs && rhs;
        } else {
            scan.set_pos(start);
            return Ok(lhs);
        }
    }
}

fn bool_or(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<bool> {
    let mut lhs = bool_and(scan,ctx)?;
    loop {
        scan.skip_blanks();
        let start = scan.pos();
        let word = scan.name().to_ascii_uppercase();
        if word == "OR" {
            let rhs = bool_and(scan,ctx)?;
            lhs = lhs || rhs;
        } else {
            scan.set_pos(start);
            return Ok(lhs);
        }
    }
}

/// body of a quoted string with substitution, cursor past the opening quote
fn string_body(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<String> {
    let mut ans = String::new();
    loop {
        match scan.next() {
            Some('\'') => {
                if scan.peek() == Some('\'') {
                    ans.push('\'');
                    scan.next();
                    continue;
                }
                return Ok(ans);
            },
            Some('&') => {
                if scan.peek() == Some('&') {
                    ans.push('&');
                    scan.next();
                    continue;
                }
                let v = var_ref(scan,ctx,true)?;
                ans += &v.as_c();
            },
            Some(c) => ans.push(c),
            None => return msg("S0005","unterminated string")
        }
    }
}

/// a character expression: concatenated pieces with optional duplication
/// factor and substring notation
pub fn char_expr(scan: &mut Scanner, ctx: &HlasmContext) -> CaResult<String> {
    scan.skip_blanks();
    let mut dup: Option<i64> = None;
    if scan.peek() == Some('(') {
        // duplication factor only when a quote follows the closing paren
        let start = scan.pos();
        scan.next();
        match arith_expr(scan,ctx) {
            Ok(v) if scan.eat(')') && scan.peek() == Some('\'') => dup = Some(v),
            _ => {
                scan.set_pos(start);
            }
        }
    }
    let mut ans = String::new();
    loop {
        match scan.peek() {
            Some('\'') => {
                scan.next();
                let mut piece = string_body(scan,ctx)?;
                // substring notation
                if scan.peek() == Some('(') {
                    let start = scan.pos();
                    scan.next();
                    let e1 = arith_expr(scan,ctx)?;
                    if scan.eat(',') {
                        let e2 = match scan.eat('*') {
                            true => piece.chars().count() as i64 - e1 + 1,
                            false => arith_expr(scan,ctx)?
                        };
                        if scan.eat(')') {
                            let chars: Vec<char> = piece.chars().collect();
                            let beg = (e1.max(1) - 1) as usize;
                            let len = e2.max(0) as usize;
                            piece = chars.iter().skip(beg).take(len).collect();
                        } else {
                            return msg("S0011","unbalanced substring notation");
                        }
                    } else {
                        scan.set_pos(start);
                    }
                }
                ans += &piece;
            },
            Some('&') => {
                scan.next();
                if scan.eat('&') {
                    ans.push('&');
                    continue;
                }
                let v = var_ref(scan,ctx,true)?;
                ans += &v.as_c();
            },
            Some(c) if matches!(c.to_ascii_uppercase(),'T'|'O') && scan.peek_at(1) == Some('\'') => {
                let v = attribute(scan,ctx)?;
                ans += &v.as_c();
            },
            _ => break
        }
    }
    if let Some(dup) = dup {
        ans = ans.repeat(dup.max(0) as usize);
    }
    Ok(ans)
}

/// full-text entry points, the whole operand must be consumed

pub fn eval_arith(text: &str, ctx: &HlasmContext) -> CaResult<i64> {
    let mut scan = Scanner::new(text.trim());
    let v = arith_expr(&mut scan,ctx)?;
    scan.skip_blanks();
    match scan.done() {
        true => Ok(v),
        false => msg("S0003","unexpected text after expression")
    }
}

pub fn eval_bool(text: &str, ctx: &HlasmContext) -> CaResult<bool> {
    let mut scan = Scanner::new(text.trim());
    let v = bool_or(&mut scan,ctx)?;
    scan.skip_blanks();
    match scan.done() {
        true => Ok(v),
        false => msg("S0003","unexpected text after expression")
    }
}

pub fn eval_char(text: &str, ctx: &HlasmContext) -> CaResult<String> {
    let mut scan = Scanner::new(text.trim());
    let v = char_expr(&mut scan,ctx)?;
    scan.skip_blanks();
    match scan.done() {
        true => Ok(v),
        false => msg("S0003","unexpected text after expression")
    }
}

/// Textual substitution for model statements.  Every variable reference is
/// replaced by its character value, `&&` survives for the string scanner,
/// a dot after a reference is consumed.
pub fn substitute(text: &str, ctx: &HlasmContext) -> CaResult<String> {
    let mut scan = Scanner::new(text);
    let mut ans = String::new();
    while let Some(c) = scan.next() {
        if c != '&' {
            ans.push(c);
            continue;
        }
        if scan.peek() == Some('&') {
            ans.push_str("&&");
            scan.next();
            continue;
        }
        let v = var_ref(&mut scan,ctx,true)?;
        ans += &v.as_c();
    }
    Ok(ans)
}

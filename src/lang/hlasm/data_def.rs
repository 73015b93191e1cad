//! Data definition operands for DC, DS, DXD, and literals.
//!
//! An operand is `[dup]T[ext][Ln][Ss][Ee][Pp]` followed by a nominal value:
//! a quoted body (numeric types pack several values separated by commas into
//! one quote pair) or a parenthesized expression list for address types.
//! Duplication factor and explicit length may themselves be parenthesized
//! expressions, in which case the owning chunk is laid out through a space
//! until they resolve.

use super::expressions::Scanner;

#[derive(Clone,PartialEq,Debug)]
pub enum Modifier {
    /// literal number in the operand text
    Fixed(i64),
    /// parenthesized expression, may need the dependency solver
    Expr(String)
}

#[derive(Clone,Debug)]
pub struct DataDef {
    pub dup: Option<Modifier>,
    pub type_letter: char,
    pub type_extension: Option<char>,
    pub length: Option<Modifier>,
    pub scale: Option<i64>,
    pub exponent: Option<i64>,
    pub prog_type: Option<i64>,
    /// body of the quoted nominal, without the quotes
    pub quoted: Option<String>,
    /// items of a parenthesized nominal, raw expression text
    pub exprs: Vec<String>
}

fn signed_number(scan: &mut Scanner) -> Option<i64> {
    let neg = scan.eat('-');
    if !neg {
        scan.eat('+');
    }
    scan.number().map(|v| if neg { -v } else { v })
}

fn paren_text(scan: &mut Scanner) -> Option<String> {
    if !scan.eat('(') {
        return None;
    }
    let mut depth = 1;
    let mut ans = String::new();
    while let Some(c) = scan.next() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(ans);
                }
            },
            _ => {}
        }
        ans.push(c);
    }
    None
}

impl DataDef {
    pub fn parse(text: &str) -> Result<Self,String> {
        let mut scan = Scanner::new(text.trim());
        let mut ans = Self {
            dup: None,
            type_letter: ' ',
            type_extension: None,
            length: None,
            scale: None,
            exponent: None,
            prog_type: None,
            quoted: None,
            exprs: Vec::new()
        };
        // duplication factor
        if let Some(c) = scan.peek() {
            if c.is_ascii_digit() {
                ans.dup = scan.number().map(Modifier::Fixed);
            } else if c == '(' {
                ans.dup = paren_text(&mut scan).map(Modifier::Expr);
                if ans.dup.is_none() {
                    return Err("unbalanced duplication factor".to_string());
                }
            }
        }
        // type
        match scan.next() {
            Some(c) if c.is_ascii_alphabetic() => ans.type_letter = c.to_ascii_uppercase(),
            _ => return Err("data type expected".to_string())
        }
        // type extension, the modifier letters are reserved
        if let Some(c) = scan.peek() {
            if c.is_ascii_alphabetic() && !matches!(c.to_ascii_uppercase(),'L'|'S'|'E'|'P') {
                ans.type_extension = Some(c.to_ascii_uppercase());
                scan.next();
            }
        }
        // modifiers in any order
        loop {
            match scan.peek().map(|c| c.to_ascii_uppercase()) {
                Some('L') if ans.length.is_none() => {
                    scan.next();
                    if scan.peek() == Some('(') {
                        match paren_text(&mut scan) {
                            Some(t) => ans.length = Some(Modifier::Expr(t)),
                            None => return Err("unbalanced length modifier".to_string())
                        }
                    } else {
                        match scan.number() {
                            Some(v) => ans.length = Some(Modifier::Fixed(v)),
                            None => return Err("length modifier requires a value".to_string())
                        }
                    }
                },
                Some('S') if ans.scale.is_none() && matches!(scan.peek_at(1),Some(c) if c.is_ascii_digit() || c=='-' || c=='+') => {
                    scan.next();
                    ans.scale = signed_number(&mut scan);
                },
                Some('E') if ans.exponent.is_none() && matches!(scan.peek_at(1),Some(c) if c.is_ascii_digit() || c=='-' || c=='+') => {
                    scan.next();
                    ans.exponent = signed_number(&mut scan);
                },
                Some('P') if ans.prog_type.is_none() && matches!(scan.peek_at(1),Some(c) if c.is_ascii_digit()) => {
                    scan.next();
                    ans.prog_type = scan.number();
                },
                _ => break
            }
        }
        // nominal value
        match scan.peek() {
            Some('\'') => {
                scan.next();
                match scan.quoted_body() {
                    Some(body) => ans.quoted = Some(body),
                    None => return Err("unterminated nominal value".to_string())
                }
            },
            Some('(') => {
                match paren_text(&mut scan) {
                    Some(body) => {
                        let mut depth = 0;
                        let mut item = String::new();
                        for c in body.chars() {
                            match c {
                                '(' => { depth += 1; item.push(c); },
                                ')' => { depth -= 1; item.push(c); },
                                ',' if depth == 0 => {
                                    ans.exprs.push(item.clone());
                                    item.clear();
                                },
                                _ => item.push(c)
                            }
                        }
                        ans.exprs.push(item);
                    },
                    None => return Err("unbalanced nominal value".to_string())
                }
            },
            None => {},
            Some(c) => return Err(format!("unexpected character '{}' in data definition",c))
        }
        if !scan.done() {
            return Err("unexpected text after data definition".to_string())
        }
        Ok(ans)
    }

    /// natural alignment, an explicit length modifier forces byte alignment
    pub fn alignment(&self) -> i64 {
        if self.length.is_some() {
            return 1;
        }
        match self.type_letter {
            'H' | 'Y' | 'S' => 2,
            'F' | 'E' | 'A' | 'V' => 4,
            'D' | 'L' | 'Q' => 8,
            _ => 1
        }
    }

    /// implied length per value in bytes
    pub fn implied_length(&self) -> i64 {
        match self.type_letter {
            'C' => match &self.quoted {
                Some(body) => {
                    let n = unescape_len(body);
                    match n {
                        0 => 1,
                        n => n
                    }
                },
                None => 1
            },
            'X' => match &self.quoted {
                Some(body) => {
                    let digits = body.chars().filter(|c| !c.is_whitespace() && *c != ',').count() as i64;
                    ((digits + 1) / 2).max(1)
                },
                None => 1
            },
            'B' => match &self.quoted {
                Some(body) => {
                    let bits = body.chars().filter(|c| *c=='0' || *c=='1').count() as i64;
                    ((bits + 7) / 8).max(1)
                },
                None => 1
            },
            'P' => match first_value_len(&self.quoted) {
                Some(digits) => (digits as i64 + 2) / 2,
                None => 1
            },
            'Z' => match first_value_len(&self.quoted) {
                Some(digits) => digits.max(1) as i64,
                None => 1
            },
            'H' | 'Y' | 'S' => 2,
            'F' | 'E' | 'A' | 'V' => 4,
            'D' | 'Q' => 8,
            'L' => 16,
            _ => 1
        }
    }

    /// how many values the nominal supplies
    pub fn value_count(&self) -> i64 {
        if !self.exprs.is_empty() {
            return self.exprs.len() as i64;
        }
        match (&self.quoted,self.type_letter) {
            // a character body is one value no matter the commas
            (Some(_),'C') => 1,
            (Some(_),'X') | (Some(_),'B') => 1,
            (Some(body),_) => body.split(',').count() as i64,
            (None,_) => 1
        }
    }

    /// total byte size when every modifier is fixed, None when deferred
    pub fn total_size(&self) -> Option<i64> {
        let per = match &self.length {
            Some(Modifier::Fixed(v)) => *v,
            Some(Modifier::Expr(_)) => return None,
            None => self.implied_length()
        };
        let dup = match &self.dup {
            Some(Modifier::Fixed(v)) => *v,
            Some(Modifier::Expr(_)) => return None,
            None => 1
        };
        Some(dup.max(0) * per * self.value_count())
    }

    /// length attribute the defined label receives
    pub fn length_attr(&self) -> u16 {
        let per = match &self.length {
            Some(Modifier::Fixed(v)) => *v,
            _ => self.implied_length()
        };
        per.clamp(0,65535) as u16
    }
}

/// character count of a C-type body after collapsing doubled quotes and
/// doubled ampersands
fn unescape_len(body: &str) -> i64 {
    let mut count: i64 = 0;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if (c == '\'' || c == '&') && chars.peek() == Some(&c) {
            chars.next();
        }
        count += 1;
    }
    count
}

fn first_value_len(quoted: &Option<String>) -> Option<usize> {
    match quoted {
        Some(body) => body.split(',').next().map(|v| v.trim().trim_start_matches(['+','-']).chars().count()),
        None => None
    }
}

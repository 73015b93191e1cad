//! Variable symbols of the conditional assembly language.
//!
//! A variable is either a SET symbol (arithmetic, boolean, character, scalar
//! or subscripted, local or global) or a macro parameter bound to a
//! `MacroParamData` tree.  Parameter trees are nested sublists, a leaf is a
//! plain string, and the canonical text form round-trips through `parse`.

use std::collections::HashMap;
use super::ids::Id;

/// subscripts above this are rejected per scope
pub const MAX_SET_SUBSCRIPT: usize = 32767;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum SetKind {
    A,
    B,
    C
}

/// a conditional assembly value, the result of any CA expression
#[derive(Clone,PartialEq,Debug)]
pub enum CaValue {
    A(i64),
    B(bool),
    C(String)
}

impl CaValue {
    pub fn kind(&self) -> SetKind {
        match self {
            CaValue::A(_) => SetKind::A,
            CaValue::B(_) => SetKind::B,
            CaValue::C(_) => SetKind::C
        }
    }
    pub fn default_of(kind: SetKind) -> Self {
        match kind {
            SetKind::A => CaValue::A(0),
            SetKind::B => CaValue::B(false),
            SetKind::C => CaValue::C(String::new())
        }
    }
    /// arithmetic view, a character value must be a decimal self-defining term
    pub fn as_a(&self) -> Option<i64> {
        match self {
            CaValue::A(v) => Some(*v),
            CaValue::B(b) => Some(*b as i64),
            CaValue::C(s) => s.trim().parse::<i64>().ok()
        }
    }
    pub fn as_b(&self) -> Option<bool> {
        match self {
            CaValue::A(v) => Some(*v != 0),
            CaValue::B(b) => Some(*b),
            CaValue::C(s) => match s.as_str() {
                "0" => Some(false),
                "1" => Some(true),
                _ => None
            }
        }
    }
    pub fn as_c(&self) -> String {
        match self {
            CaValue::A(v) => v.to_string(),
            CaValue::B(b) => match b {
                true => "1".to_string(),
                false => "0".to_string()
            },
            CaValue::C(s) => s.clone()
        }
    }
    /// convert to the kind a SET target expects
    pub fn coerce(&self, kind: SetKind) -> Option<CaValue> {
        match kind {
            SetKind::A => self.as_a().map(CaValue::A),
            SetKind::B => self.as_b().map(CaValue::B),
            SetKind::C => Some(CaValue::C(self.as_c()))
        }
    }
}

/// SET symbol with a sparse value store, scalars live at subscript 0
#[derive(Clone,Debug)]
pub struct SetSymbol {
    pub kind: SetKind,
    pub scalar: bool,
    pub global: bool,
    values: HashMap<usize,CaValue>
}

impl SetSymbol {
    pub fn new(kind: SetKind, scalar: bool, global: bool) -> Self {
        Self {
            kind,
            scalar,
            global,
            values: HashMap::new()
        }
    }
    pub fn set(&mut self, subscript: usize, val: CaValue) {
        self.values.insert(subscript,val);
    }
    /// missing elements read as the kind's default
    pub fn get(&self, subscript: usize) -> CaValue {
        match self.values.get(&subscript) {
            Some(v) => v.clone(),
            None => CaValue::default_of(self.kind)
        }
    }
    /// N' of a subscripted symbol is the highest subscript ever set
    pub fn count(&self) -> usize {
        self.values.keys().copied().max().unwrap_or(0)
    }
}

/// Recursive macro parameter data: a leaf string or an ordered sublist.
#[derive(Clone,PartialEq,Debug)]
pub enum MacroParamData {
    Leaf(String),
    List(Vec<MacroParamData>)
}

impl MacroParamData {
    pub fn empty() -> Self {
        MacroParamData::Leaf(String::new())
    }
    /// canonical text form, sublists are parenthesized and comma separated
    pub fn to_text(&self) -> String {
        match self {
            MacroParamData::Leaf(s) => s.clone(),
            MacroParamData::List(items) => {
                let inner = items.iter().map(|x| x.to_text()).collect::<Vec<String>>().join(",");
                format!("({})",inner)
            }
        }
    }
    /// Parse the text form.  A fully parenthesized, balanced argument is a
    /// sublist, anything else is a leaf.  Inverse of `to_text`.
    pub fn parse(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() < 2 || chars[0] != '(' || chars[chars.len()-1] != ')' {
            return MacroParamData::Leaf(text.to_string());
        }
        // the outer parens must match each other
        let mut depth = 0;
        for (i,c) in chars.iter().enumerate() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 && i != chars.len()-1 {
                        return MacroParamData::Leaf(text.to_string());
                    }
                },
                _ => {}
            }
        }
        if depth != 0 {
            return MacroParamData::Leaf(text.to_string());
        }
        let inner = &chars[1..chars.len()-1];
        let mut items = Vec::new();
        let mut start = 0;
        let mut depth = 0;
        for (i,c) in inner.iter().enumerate() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    let piece: String = inner[start..i].iter().collect();
                    items.push(MacroParamData::parse(&piece));
                    start = i + 1;
                },
                _ => {}
            }
        }
        let piece: String = inner[start..].iter().collect();
        items.push(MacroParamData::parse(&piece));
        MacroParamData::List(items)
    }
    /// N' attribute: sublist item count, 1 for a present scalar, 0 for omitted
    pub fn count(&self) -> usize {
        match self {
            MacroParamData::List(items) => items.len(),
            MacroParamData::Leaf(s) => match s.is_empty() {
                true => 0,
                false => 1
            }
        }
    }
    /// K' attribute: length of the text form
    pub fn length(&self) -> usize {
        self.to_text().chars().count()
    }
    /// Subscript addressing, indices are 1-based.  Subscripting a leaf with
    /// 1 yields the leaf itself, any deeper index yields the empty value.
    pub fn index(&self, subscripts: &[usize]) -> MacroParamData {
        if subscripts.is_empty() {
            return self.clone();
        }
        let idx = subscripts[0];
        match self {
            MacroParamData::List(items) => match idx >= 1 && idx <= items.len() {
                true => items[idx-1].index(&subscripts[1..]),
                false => MacroParamData::empty()
            },
            MacroParamData::Leaf(_) => match idx == 1 {
                true => self.index(&subscripts[1..]),
                false => MacroParamData::empty()
            }
        }
    }
}

/// a bound variable in some code scope
#[derive(Clone,Debug)]
pub enum VarSym {
    Set(SetSymbol),
    Param(MacroParamData)
}

/// prototype parameter of a macro definition
#[derive(Clone,Debug)]
pub struct MacroParamSpec {
    pub name: Id,
    pub keyword: bool,
    pub default: Option<String>
}

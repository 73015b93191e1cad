//! # Identifier pool
//!
//! Identifiers are the central value type of the analyzer, they key every
//! per-context table.  An `Id` stores its payload inline when it fits the
//! buffer, longer names are held by index into the owning pool.  Short names
//! are *always* inline, so two `Id`s built from equal strings compare equal
//! whether either went through the pool or not.
//!
//! Profiling of the original implementation showed hashing and equality of
//! identifiers dominating, hence the flat byte representation and the
//! compressed form used by the instruction dispatch tables.

use std::collections::HashMap;

/// names of this many bytes or fewer are stored inline
pub const ID_INLINE: usize = 15;

#[derive(Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Debug)]
enum Repr {
    Inline { len: u8, buf: [u8; ID_INLINE] },
    Pooled(u32)
}

/// Interned, case-folded identifier.  Equality, ordering and hashing are
/// value based and never consult the pool.
#[derive(Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Debug)]
pub struct Id {
    repr: Repr
}

impl Id {
    pub const fn empty() -> Self {
        Self { repr: Repr::Inline { len: 0, buf: [0; ID_INLINE] } }
    }
    /// Inline id from a short name, case is folded.
    /// Returns None if the name does not fit the buffer, such names
    /// have to go through `IdPool::intern`.
    pub fn inline(s: &str) -> Option<Self> {
        if s.len() > ID_INLINE {
            return None;
        }
        let mut buf = [0u8; ID_INLINE];
        for (i,b) in s.as_bytes().iter().enumerate() {
            buf[i] = b.to_ascii_uppercase();
        }
        Some(Self { repr: Repr::Inline { len: s.len() as u8, buf } })
    }
    pub fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Inline { len: 0, .. })
    }
    /// Pack an inline id of up to 7 bytes into a single word.
    /// This keys the instruction dispatch maps, every dispatchable
    /// mnemonic fits.  Longer or pooled ids return None.
    pub fn compressed(&self) -> Option<u64> {
        match self.repr {
            Repr::Inline { len, buf } if len < 8 => {
                let mut packed = [0u8; 8];
                packed[..7].copy_from_slice(&buf[..7]);
                packed[7] = len;
                Some(u64::from_le_bytes(packed))
            },
            _ => None
        }
    }
    /// the inline text, None if pooled
    fn inline_text(&self) -> Option<&str> {
        match &self.repr {
            Repr::Inline { len, buf } => std::str::from_utf8(&buf[..*len as usize]).ok(),
            Repr::Pooled(_) => None
        }
    }
}

/// Owns the long names.  One pool per context, two contexts never
/// exchange ids.
pub struct IdPool {
    long: Vec<String>,
    index: HashMap<String,u32>
}

impl IdPool {
    pub fn new() -> Self {
        Self {
            long: Vec::new(),
            index: HashMap::new()
        }
    }
    /// Intern any name.  Short names come back inline without touching
    /// the pool, long names are deduplicated by index.
    pub fn intern(&mut self, s: &str) -> Id {
        if let Some(id) = Id::inline(s) {
            return id;
        }
        let folded = s.to_ascii_uppercase();
        if let Some(idx) = self.index.get(&folded) {
            return Id { repr: Repr::Pooled(*idx) };
        }
        let idx = self.long.len() as u32;
        self.long.push(folded.clone());
        self.index.insert(folded,idx);
        Id { repr: Repr::Pooled(idx) }
    }
    /// Look up a name without interning it, useful from read-only contexts.
    /// Short names always answer, a long name answers only if seen before.
    pub fn find(&self, s: &str) -> Option<Id> {
        if let Some(id) = Id::inline(s) {
            return Some(id);
        }
        self.index.get(&s.to_ascii_uppercase()).map(|idx| Id { repr: Repr::Pooled(*idx) })
    }
    /// borrow the text of any id produced by this pool
    pub fn text<'a>(&'a self, id: &'a Id) -> &'a str {
        match &id.repr {
            Repr::Inline {..} => id.inline_text().unwrap_or(""),
            Repr::Pooled(idx) => match self.long.get(*idx as usize) {
                Some(s) => s.as_str(),
                None => ""
            }
        }
    }
    pub fn string(&self, id: &Id) -> String {
        self.text(id).to_string()
    }
}

//! Instruction family handlers.
//!
//! Each family keeps a compact precomputed map from the compressed inline
//! form of the canonical mnemonic to a handler function.  The arrays are
//! small, a linear scan over packed words beats hashing at this size, and
//! every dispatchable mnemonic fits the compressed form.

pub mod ca;
pub mod asm;
pub mod mach;
pub mod macro_call;

use super::ids::Id;

pub struct HandlerMap<H: Copy> {
    ids: Vec<u64>,
    handlers: Vec<H>
}

impl<H: Copy> HandlerMap<H> {
    /// Panics on a name that cannot compress, which would be a table bug.
    pub fn new(entries: &[(&str,H)]) -> Self {
        let mut ids = Vec::with_capacity(entries.len());
        let mut handlers = Vec::with_capacity(entries.len());
        for (name,handler) in entries {
            let id = Id::inline(name).and_then(|id| id.compressed())
                .expect("handler mnemonic must fit the compressed form");
            ids.push(id);
            handlers.push(*handler);
        }
        Self { ids, handlers }
    }
    pub fn find(&self, id: &Id) -> Option<H> {
        let key = id.compressed()?;
        self.ids.iter().position(|k| *k == key).map(|i| self.handlers[i])
    }
}

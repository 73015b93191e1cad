//! Macro cache keyed by the OPSYN state.
//!
//! When a library macro is first defined, the cache records the flattened
//! body (copy members already spliced in), the set of files it came from,
//! and an opcode-state fingerprint: the resolution of every mnemonic the
//! body consulted.  A later request adopts the cached definition only when
//! the requesting context's opcode state, restricted to those names, is
//! identical; unrelated OPSYN changes never invalidate an entry.
//!
//! Entries hold plain strings, never `Id`s: identifiers are private to one
//! context and the cache outlives many.

use std::collections::HashMap;

#[derive(Clone,Debug)]
pub struct CachedMacro {
    pub name: String,
    pub label_param: Option<String>,
    /// (name, keyword?, default)
    pub params: Vec<(String,bool,Option<String>)>,
    /// (text, file uri, row)
    pub body: Vec<(String,String,u32)>,
    /// (sequence symbol, body index)
    pub labels: Vec<(String,usize)>,
    /// (mnemonic, resolution) pairs that must match to reuse the entry
    pub fingerprint: Vec<(String,String)>,
    /// uri of the defining file plus every copy member pulled in
    pub files: Vec<String>
}

pub struct MacroCache {
    entries: HashMap<String,Vec<CachedMacro>>
}

impl MacroCache {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Find an entry for the library file whose fingerprint matches the
    /// current opcode state, as rendered by `resolve`.
    pub fn lookup(&self, uri: &str, resolve: &dyn Fn(&str) -> String) -> Option<CachedMacro> {
        let candidates = self.entries.get(uri)?;
        for entry in candidates {
            if entry.fingerprint.iter().all(|(name,repr)| resolve(name) == *repr) {
                log::debug!("macro cache hit for {}",uri);
                return Some(entry.clone());
            }
        }
        None
    }

    pub fn store(&mut self, uri: &str, entry: CachedMacro) {
        let list = self.entries.entry(uri.to_string()).or_default();
        // an identical fingerprint replaces the older entry
        list.retain(|e| e.fingerprint != entry.fingerprint);
        list.push(entry);
    }

    /// a file changed, drop every entry that read it
    pub fn invalidate(&mut self, uri: &str) {
        self.entries.remove(uri);
        for list in self.entries.values_mut() {
            list.retain(|e| !e.files.iter().any(|f| f == uri));
        }
        self.entries.retain(|_,list| !list.is_empty());
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }
}

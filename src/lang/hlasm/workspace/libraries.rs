//! Library resolution.
//!
//! A library is a local directory, optionally reached through a glob
//! pattern expanded at configuration time.  Member lookup is by name: the
//! first library in group order that holds a member with that name wins,
//! and results are cached so later lookups are constant time.

use std::collections::HashMap;
use std::path::PathBuf;
use crate::lang::Document;
use super::super::macro_cache::CachedMacro;

/// The seam between the analysis pass and the workspace: a pass suspends on
/// an uncached member and the provider satisfies the request, possibly by
/// reading files.  The macro cache hooks default to no caching.
pub trait LibraryProvider {
    fn get_member(&mut self, name: &str) -> Option<Document>;
    fn cached_macro(&mut self, _uri: &str, _resolve: &dyn Fn(&str) -> String) -> Option<CachedMacro> {
        None
    }
    fn store_macro(&mut self, _uri: &str, _entry: CachedMacro) {}
}

/// a provider with no libraries at all, every lookup misses
pub struct NoLibraries;

impl LibraryProvider for NoLibraries {
    fn get_member(&mut self, _name: &str) -> Option<Document> {
        None
    }
}

pub struct Library {
    pub root: PathBuf,
    pub optional: bool,
    /// extensions that qualify a file as a member, besides none at all
    pub extensions: Vec<String>,
    members: HashMap<String,PathBuf>
}

impl Library {
    /// Enumerate the members of one directory.  A member is a file whose
    /// stem is a valid symbol name; the stem, upper cased, is the key.
    pub fn scan(root: PathBuf, optional: bool, extensions: Vec<String>) -> Self {
        let mut members = HashMap::new();
        if let Ok(listing) = std::fs::read_dir(&root) {
            for entry in listing.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let ext_ok = match path.extension().and_then(|e| e.to_str()) {
                    None => true,
                    Some(ext) => extensions.is_empty() || extensions.iter().any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
                };
                if !ext_ok {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    members.insert(stem.to_ascii_uppercase(),path.clone());
                }
            }
        } else if !optional {
            log::error!("library directory {} could not be read",root.display());
        }
        Self {
            root,
            optional,
            extensions,
            members
        }
    }
    pub fn member(&self, name: &str) -> Option<&PathBuf> {
        self.members.get(&name.to_ascii_uppercase())
    }
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// the ordered libraries of one processor group with a lookup cache
pub struct LibrarySet {
    libraries: Vec<Library>,
    cache: HashMap<String,Option<Document>>
}

impl LibrarySet {
    pub fn new(libraries: Vec<Library>) -> Self {
        Self {
            libraries,
            cache: HashMap::new()
        }
    }

    /// Expand a path or glob pattern into libraries, in deterministic order.
    pub fn from_specs(specs: &[(String,bool,Vec<String>)]) -> Self {
        let mut libraries = Vec::new();
        for (pattern,optional,extensions) in specs {
            if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
                match glob::glob(pattern) {
                    Ok(paths) => {
                        let mut dirs: Vec<PathBuf> = paths.flatten().filter(|p| p.is_dir()).collect();
                        dirs.sort();
                        for dir in dirs {
                            libraries.push(Library::scan(dir,*optional,extensions.clone()));
                        }
                    },
                    Err(e) => log::error!("bad library pattern {}: {}",pattern,e)
                }
            } else {
                libraries.push(Library::scan(PathBuf::from(pattern),*optional,extensions.clone()));
            }
        }
        Self::new(libraries)
    }

    /// First hit in group order wins; hits and misses are both cached.
    pub fn lookup(&mut self, name: &str) -> Option<Document> {
        let key = name.to_ascii_uppercase();
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let mut found = None;
        for lib in self.libraries.iter() {
            if let Some(path) = lib.member(&key) {
                match Document::from_file_path(path) {
                    Ok(doc) => {
                        found = Some(doc);
                        break;
                    },
                    Err(e) => log::error!("member {} could not be read: {}",path.display(),e)
                }
            }
        }
        self.cache.insert(key,found.clone());
        found
    }

    /// the directory listing changed, forget everything
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }
}

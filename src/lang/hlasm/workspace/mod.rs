//! Workspace configuration and library resolution.
//!
//! Two JSON documents in `.hlasmplugin` govern analysis: `proc_grps.json`
//! names the processor groups and their libraries, `pgm_conf.json` maps
//! programs to groups.  Per-file settings consult exact program entries
//! first, then wildcard entries, then a `.bridge.json` in the file's
//! directory, and finally the default group.  `*NOPROC*` disables
//! processing for the file entirely.

pub mod resource;
pub mod config;
pub mod libraries;

use std::collections::HashMap;
use std::path::{Path,PathBuf};
use globset::{Glob,GlobMatcher};
use config::{ProcessorGroup,AsmOptionsJson,NOPROC};
use libraries::LibrarySet;
use super::context::AsmOptions;

/// configuration files live in this directory under the workspace root
pub const CONFIG_DIR: &str = ".hlasmplugin";

/// how a program resolved to a processor group
pub enum GroupChoice {
    Group(String,AsmOptions),
    /// mapped to *NOPROC*, the file is not analyzed
    NoProc,
    /// no mapping at all, analyzed with no libraries
    Unmapped
}

pub struct WorkspaceConfig {
    groups: HashMap<String,ProcessorGroup>,
    exact: Vec<(String,String,AsmOptionsJson)>,
    wildcards: Vec<(GlobMatcher,String,AsmOptionsJson)>,
    pub suppress_limit: Option<usize>,
    /// `${config:...}` keys that did not resolve, reported as W0007
    pub unresolved: Vec<String>,
    root: Option<PathBuf>
}

impl WorkspaceConfig {
    pub fn empty() -> Self {
        Self {
            groups: HashMap::new(),
            exact: Vec::new(),
            wildcards: Vec::new(),
            suppress_limit: None,
            unresolved: Vec::new(),
            root: None
        }
    }

    /// Read the configuration documents beneath a workspace root.  Missing
    /// files leave the respective part empty, malformed ones are logged.
    pub fn load(root: &Path, settings: &serde_json::Value) -> Self {
        let mut ans = Self::empty();
        ans.root = Some(root.to_path_buf());
        let dir = root.join(CONFIG_DIR);
        let mut unresolved = Vec::new();
        if let Ok(text) = std::fs::read_to_string(dir.join("proc_grps.json")) {
            match config::parse_proc_grps(&text,settings,&mut unresolved) {
                Ok(parsed) => {
                    for group in parsed.pgroups {
                        ans.groups.insert(group.name.clone(),group);
                    }
                },
                Err(e) => log::error!("proc_grps.json did not parse: {}",e)
            }
        }
        if let Ok(text) = std::fs::read_to_string(dir.join("pgm_conf.json")) {
            match config::parse_pgm_conf(&text,settings,&mut unresolved) {
                Ok(parsed) => {
                    ans.suppress_limit = parsed.diagnostics_suppress_limit;
                    for pgm in parsed.pgms {
                        let is_pattern = pgm.program.contains('*') || pgm.program.contains('?');
                        if is_pattern {
                            match Glob::new(&pgm.program) {
                                Ok(glob) => ans.wildcards.push((glob.compile_matcher(),pgm.pgroup,pgm.asm_options)),
                                Err(e) => log::error!("bad program pattern {}: {}",pgm.program,e)
                            }
                        } else {
                            ans.exact.push((pgm.program,pgm.pgroup,pgm.asm_options));
                        }
                    }
                },
                Err(e) => log::error!("pgm_conf.json did not parse: {}",e)
            }
        }
        ans.unresolved = unresolved;
        log::debug!("workspace configuration: {} groups, {} programs, {} patterns",
            ans.groups.len(),ans.exact.len(),ans.wildcards.len());
        ans
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut ans: Vec<String> = self.groups.keys().cloned().collect();
        ans.sort();
        ans
    }

    fn base_options(&self, group: &str, overrides: &AsmOptionsJson) -> AsmOptions {
        let mut opts = AsmOptions::default();
        if let Some(g) = self.groups.get(group) {
            g.asm_options.apply(&mut opts);
        }
        overrides.apply(&mut opts);
        opts
    }

    fn choose(&self, group: String, overrides: &AsmOptionsJson) -> GroupChoice {
        if group == NOPROC {
            return GroupChoice::NoProc;
        }
        let opts = self.base_options(&group,overrides);
        GroupChoice::Group(group,opts)
    }

    /// the candidate strings a program entry may match
    fn candidates(&self, file: &Path) -> Vec<String> {
        let mut ans = Vec::new();
        ans.push(file.to_string_lossy().into_owned());
        if let Some(name) = file.file_name().and_then(|n| n.to_str()) {
            ans.push(name.to_string());
        }
        if let Some(root) = &self.root {
            if let Ok(rel) = file.strip_prefix(root) {
                ans.push(rel.to_string_lossy().replace('\\',"/"));
            }
        }
        ans
    }

    /// Resolve a file to its processor group: exact entries, wildcard
    /// entries, the directory's B4G bridge, then nothing.
    pub fn group_for(&self, file: &Path) -> GroupChoice {
        let candidates = self.candidates(file);
        for (program,group,overrides) in self.exact.iter() {
            if candidates.iter().any(|c| c == program) {
                return self.choose(group.clone(),overrides);
            }
        }
        for (matcher,group,overrides) in self.wildcards.iter() {
            if candidates.iter().any(|c| matcher.is_match(c)) {
                return self.choose(group.clone(),overrides);
            }
        }
        // B4G bridge mapping in the file's own directory
        if let Some(parent) = file.parent() {
            if let Ok(text) = std::fs::read_to_string(parent.join(".bridge.json")) {
                if let Ok(bridge) = config::parse_b4g(&text) {
                    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_ascii_uppercase();
                    if let Some(elem) = bridge.elements.get(&stem) {
                        return self.choose(elem.processor_group.clone(),&AsmOptionsJson::default());
                    }
                    if let Some(default) = bridge.default_processor_group {
                        return self.choose(default,&AsmOptionsJson::default());
                    }
                }
            }
        }
        GroupChoice::Unmapped
    }

    /// materialize the ordered library set of a group
    pub fn build_libraries(&self, group: &str) -> LibrarySet {
        let specs: Vec<(String,bool,Vec<String>)> = match self.groups.get(group) {
            Some(g) => g.libs.iter().map(|lib| {
                let mut path = lib.path().to_string();
                if let Some(root) = &self.root {
                    if !Path::new(&path).is_absolute() {
                        path = root.join(&path).to_string_lossy().into_owned();
                    }
                }
                (path,lib.optional(),lib.macro_extensions())
            }).collect(),
            None => Vec::new()
        };
        LibrarySet::from_specs(&specs)
    }
}

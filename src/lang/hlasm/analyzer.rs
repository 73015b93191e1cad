//! HLASM analyzer.
//!
//! Drives one coordinated pass per open code document: statements flow from
//! the providers through the processor stack, diagnostics and fade messages
//! accumulate per file, and the dependency solver reaches its fixed point
//! at END (or at end of source when END is missing).
//!
//! The analyzer owns the workspace configuration, the per-group library
//! sets, and the macro cache, which all outlive individual passes.  The
//! pass context itself is discarded when the pass ends, and discarded
//! without publishing anything when the pass is cancelled.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool,Ordering};
use lsp_types as lsp;
use crate::lang::{Document,split_lines};
use crate::lang::server::Analysis;
use crate::STDRESULT;
use super::context::{HlasmContext,AsmOptions};
use super::context::ordinary;
use super::diagnostics::DiagnosticSet;
use super::macro_cache::{MacroCache,CachedMacro};
use super::parser;
use super::processors::{Manager,Pass};
use super::providers;
use super::workspace::{WorkspaceConfig,GroupChoice};
use super::workspace::libraries::{LibraryProvider,LibrarySet};

/// suppression threshold for files with no configuration
const DEFAULT_SUPPRESS_LIMIT: usize = 10;

/// snapshot of one ordinary symbol, kept after the pass context is gone
#[derive(Clone,Debug)]
pub struct SymbolInfo {
    pub name: String,
    /// absolute value when the symbol settled to one
    pub abs: Option<i64>,
    /// (section name or empty, offset) for relocatable symbols
    pub reloc: Option<(String,i64)>,
    pub length: u16,
    pub type_attr: u8
}

/// satisfies a pass's library requests from volatile documents, the group's
/// libraries, and the macro cache
struct Resolver<'a> {
    libs: Option<&'a mut LibrarySet>,
    volatile: &'a HashMap<String,Document>,
    cache: &'a mut MacroCache
}

impl LibraryProvider for Resolver<'_> {
    fn get_member(&mut self, name: &str) -> Option<Document> {
        if let Some(doc) = self.volatile.get(&name.to_ascii_uppercase()) {
            return Some(doc.clone());
        }
        self.libs.as_mut()?.lookup(name)
    }
    fn cached_macro(&mut self, uri: &str, resolve: &dyn Fn(&str) -> String) -> Option<CachedMacro> {
        self.cache.lookup(uri,resolve)
    }
    fn store_macro(&mut self, uri: &str, entry: CachedMacro) {
        self.cache.store(uri,entry);
    }
}

pub struct Analyzer {
    config: WorkspaceConfig,
    settings: serde_json::Value,
    macro_cache: MacroCache,
    library_sets: HashMap<String,LibrarySet>,
    /// in-memory members keyed by upper cased name, mostly for tests and
    /// unsaved editor buffers
    volatile: HashMap<String,Document>,
    diags: DiagnosticSet,
    visited: Vec<String>,
    symbols: Vec<SymbolInfo>,
    section_extents: Vec<(String,i64)>,
    suppress_limit: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
    ws_root: Option<PathBuf>
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            config: WorkspaceConfig::empty(),
            settings: serde_json::Value::Null,
            macro_cache: MacroCache::new(),
            library_sets: HashMap::new(),
            volatile: HashMap::new(),
            diags: DiagnosticSet::new(),
            visited: Vec::new(),
            symbols: Vec::new(),
            section_extents: Vec::new(),
            suppress_limit: None,
            cancel: None,
            ws_root: None
        }
    }

    /// the named ordinary symbol from the last pass
    pub fn symbol(&self, name: &str) -> Option<&SymbolInfo> {
        let upper = name.to_ascii_uppercase();
        self.symbols.iter().find(|s| s.name == upper)
    }

    /// (section name, resolved extent) pairs from the last pass
    pub fn section_extents(&self) -> &[(String,i64)] {
        &self.section_extents
    }

    /// cancellation is checked at every statement boundary
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    /// a file changed on disk or in the editor, drop what depends on it
    pub fn invalidate_file(&mut self, uri: &str) {
        self.macro_cache.invalidate(uri);
        for set in self.library_sets.values_mut() {
            set.invalidate();
        }
    }

    /// the watched configuration files changed, reload on next analysis
    pub fn reload_config(&mut self) {
        if let Some(root) = self.ws_root.clone() {
            self.config = WorkspaceConfig::load(&root,&self.settings);
            self.library_sets.clear();
            self.macro_cache = MacroCache::new();
        }
    }

    pub fn macro_cache_len(&self) -> usize {
        self.macro_cache.len()
    }

    /// fade entire bodies of macros that were defined but never invoked
    fn fade_unused_macros(ctx: &HlasmContext, diags: &mut DiagnosticSet) {
        let mut unused: Vec<(String,u32,u32)> = Vec::new();
        for (id,def) in ctx.macros.iter() {
            if ctx.invoked_macros.contains(id) {
                continue;
            }
            let Some(loc) = &def.location else {
                continue;
            };
            let start = loc.range.start.line;
            let end = def.body.iter().map(|s| s.row).max().unwrap_or(start) + 1;
            unused.push((loc.uri.to_string(),start,end));
        }
        unused.sort();
        for (file,start,end) in unused {
            diags.fade(&file,lsp::Range::new(
                lsp::Position::new(start.saturating_sub(1),0),
                lsp::Position::new(end,0)));
        }
    }
}

impl Analysis for Analyzer {
    fn init_workspace(&mut self, source_dirs: Vec<lsp::Url>, volatile_docs: Vec<Document>) -> STDRESULT {
        if let Some(first) = source_dirs.first() {
            if let Ok(root) = first.to_file_path() {
                self.config = WorkspaceConfig::load(&root,&self.settings);
                self.ws_root = Some(root);
                self.library_sets.clear();
            }
        }
        self.volatile.clear();
        for doc in volatile_docs {
            let stem = PathBuf::from(doc.uri.path())
                .file_stem().and_then(|s| s.to_str().map(|s| s.to_ascii_uppercase()));
            if let Some(stem) = stem {
                self.volatile.insert(stem,doc);
            }
        }
        Ok(())
    }

    fn analyze(&mut self, doc: &Document) -> STDRESULT {
        let uri = doc.uri.to_string();
        log::debug!("analyze {}",uri);
        // program to group resolution decides libraries and options
        let choice = match doc.uri.to_file_path() {
            Ok(path) => self.config.group_for(&path),
            Err(_) => GroupChoice::Unmapped
        };
        let (group,options) = match choice {
            GroupChoice::NoProc => {
                log::debug!("{} is mapped to *NOPROC*",uri);
                self.diags = DiagnosticSet::new();
                self.visited = vec![uri];
                self.suppress_limit = None;
                return Ok(());
            },
            GroupChoice::Group(name,options) => {
                self.suppress_limit = None;
                (Some(name),options)
            },
            GroupChoice::Unmapped => {
                self.suppress_limit = Some(self.config.suppress_limit.unwrap_or(DEFAULT_SUPPRESS_LIMIT));
                (None,AsmOptions::default())
            }
        };
        if let Some(name) = &group {
            if !self.library_sets.contains_key(name) {
                self.library_sets.insert(name.clone(),self.config.build_libraries(name));
            }
        }
        let raw = split_lines(&doc.text);
        let lines = parser::logical_lines(&raw,0);
        let ctx = HlasmContext::new(uri.clone(),lines,options);
        let cancel = self.cancel.clone();
        let mut resolver = Resolver {
            libs: match &group {
                Some(name) => self.library_sets.get_mut(name),
                None => None
            },
            volatile: &self.volatile,
            cache: &mut self.macro_cache
        };
        let mut pass = Pass {
            ctx,
            diags: DiagnosticSet::new(),
            libs: &mut resolver
        };
        for key in self.config.unresolved.iter() {
            pass.diags.add(&uri,crate::lang::range(0,0,0),"W0007",
                &format!("configuration placeholder ${{config:{}}} did not resolve",key));
        }
        let mut manager = Manager::new();
        let mut saw_end = false;
        loop {
            let cancelled = cancel.as_ref().map(|f| f.load(Ordering::Relaxed)).unwrap_or(false);
            if cancelled {
                log::debug!("pass cancelled, discarding context");
                return Ok(());
            }
            match providers::next_statement(&mut pass.ctx) {
                Some((stmt,_prov)) => {
                    if !manager.process(&mut pass,stmt) {
                        saw_end = true;
                        break;
                    }
                },
                None => {
                    if !manager.end_of_source(&mut pass) {
                        break;
                    }
                }
            }
        }
        if !saw_end {
            // a missing END still forces the fixed point
            pass.ctx.ord.pour_literals();
            ordinary::finish(&mut pass.ctx.ord,&mut pass.ctx.pool,&mut pass.diags);
        }
        Self::fade_unused_macros(&pass.ctx,&mut pass.diags);
        let mut visited: Vec<String> = pass.ctx.visited_files.iter().cloned().collect();
        visited.sort();
        self.visited = visited;
        self.symbols = snapshot_symbols(&pass.ctx);
        self.section_extents = snapshot_sections(&pass.ctx);
        self.diags = pass.diags;
        Ok(())
    }

    fn update_config(&mut self, json_str: &str) -> STDRESULT {
        self.settings = serde_json::from_str::<serde_json::Value>(json_str)?;
        self.reload_config();
        Ok(())
    }

    fn get_diags(&self, uri: &lsp::Url) -> Vec<lsp::Diagnostic> {
        self.diags.publishable(&uri.to_string(),self.suppress_limit)
    }

    fn get_fades(&self, uri: &lsp::Url) -> Vec<lsp::Range> {
        self.diags.fades_for(&uri.to_string())
    }

    fn visited_files(&self) -> Vec<lsp::Url> {
        self.visited.iter().filter_map(|s| lsp::Url::parse(s).ok()).collect()
    }

    fn err_warn_info_counts(&self) -> [usize;3] {
        self.diags.counts()
    }
}

fn snapshot_symbols(ctx: &HlasmContext) -> Vec<SymbolInfo> {
    use super::context::ordinary::SymbolValue;
    let mut ans: Vec<SymbolInfo> = ctx.ord.symbols.values().map(|sym| {
        let (abs,reloc) = match &sym.value {
            SymbolValue::Absolute(v) => (Some(*v),None),
            SymbolValue::Relocatable(r) => {
                let sect = ctx.ord.section(r.section).name
                    .map(|id| ctx.pool.string(&id)).unwrap_or_default();
                (None,Some((sect,r.offset)))
            },
            SymbolValue::Undefined => (None,None)
        };
        SymbolInfo {
            name: ctx.pool.string(&sym.id),
            abs,
            reloc,
            length: sym.attrs.length,
            type_attr: sym.attrs.type_attr
        }
    }).collect();
    ans.sort_by(|a,b| a.name.cmp(&b.name));
    ans
}

fn snapshot_sections(ctx: &HlasmContext) -> Vec<(String,i64)> {
    (0..ctx.ord.sections().len()).map(|i| {
        let name = ctx.ord.section(i).name.map(|id| ctx.pool.string(&id)).unwrap_or_default();
        (name,ctx.ord.section_extent(i))
    }).collect()
}

/// Convenience for tests and the CLI: analyze a source string with a set of
/// in-memory library members, returning the analyzer afterwards.
pub fn analyze_string(source: &str, members: &[(&str,&str)]) -> Analyzer {
    let mut analyzer = Analyzer::new();
    let volatile: Vec<Document> = members.iter().map(|(name,text)| {
        let uri = lsp::Url::parse(&format!("hlasm://library/{}",name)).expect("member uri");
        Document::new(uri,text.to_string())
    }).collect();
    analyzer.init_workspace(Vec::new(),volatile).expect("workspace init");
    let uri = lsp::Url::parse("hlasm://opencode/MAIN.hlasm").expect("open code uri");
    let doc = Document::new(uri,source.to_string());
    analyzer.analyze(&doc).expect("analysis failed");
    analyzer
}

/// the open code uri used by `analyze_string`
pub fn opencode_uri() -> lsp::Url {
    lsp::Url::parse("hlasm://opencode/MAIN.hlasm").expect("open code uri")
}

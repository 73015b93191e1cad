//! Workspace configuration documents.
//!
//! `proc_grps.json` enumerates processor groups: ordered library lists,
//! assembler options, and a preprocessor chain.  `pgm_conf.json` maps
//! program names or wildcards to groups with per-program option overrides.
//! A `.bridge.json` file supplies directory level mappings.  Both JSON
//! documents accept `${config:...}` substitutions against the client
//! settings; an unresolved placeholder is reported as W0007.

use serde::Deserialize;
use std::collections::HashMap;
use super::super::context::AsmOptions;
use crate::DYNERR;

pub const NOPROC: &str = "*NOPROC*";

#[derive(Clone,Deserialize,Debug)]
#[serde(untagged)]
pub enum LibSpec {
    Path(String),
    Full {
        path: String,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        macro_extensions: Vec<String>,
        #[serde(default)]
        prefer_alternate_root: bool
    }
}

impl LibSpec {
    pub fn path(&self) -> &str {
        match self {
            LibSpec::Path(p) => p,
            LibSpec::Full { path, .. } => path
        }
    }
    pub fn optional(&self) -> bool {
        match self {
            LibSpec::Path(_) => false,
            LibSpec::Full { optional, .. } => *optional
        }
    }
    pub fn macro_extensions(&self) -> Vec<String> {
        match self {
            LibSpec::Path(_) => Vec::new(),
            LibSpec::Full { macro_extensions, .. } => macro_extensions.clone()
        }
    }
}

#[derive(Clone,Deserialize,Debug,Default)]
pub struct AsmOptionsJson {
    #[serde(rename = "SYSPARM")]
    pub sysparm: Option<String>,
    #[serde(rename = "PROFILE")]
    pub profile: Option<String>,
    #[serde(rename = "OPTABLE")]
    pub optable: Option<String>,
    #[serde(rename = "GOFF")]
    pub goff: Option<bool>,
    #[serde(rename = "XOBJECT")]
    pub xobject: Option<bool>
}

impl AsmOptionsJson {
    /// overlay these options onto a base set
    pub fn apply(&self, base: &mut AsmOptions) {
        if let Some(v) = &self.sysparm {
            base.sysparm = v.clone();
        }
        if let Some(v) = &self.profile {
            base.profile = v.clone();
        }
        if let Some(v) = &self.optable {
            base.optable = v.clone();
        }
        if let Some(v) = self.goff {
            base.goff = v;
        }
        if let Some(v) = self.xobject {
            base.xobject = v;
        }
    }
}

#[derive(Clone,Deserialize,Debug)]
pub struct ProcessorGroup {
    pub name: String,
    #[serde(default)]
    pub libs: Vec<LibSpec>,
    #[serde(default)]
    pub asm_options: AsmOptionsJson,
    /// accepted as a string, an object, or a list; the chain itself is an
    /// external collaborator
    #[serde(default)]
    pub preprocessor: Option<serde_json::Value>
}

#[derive(Clone,Deserialize,Debug)]
pub struct ProcGrps {
    #[serde(default)]
    pub pgroups: Vec<ProcessorGroup>
}

#[derive(Clone,Deserialize,Debug)]
pub struct PgmEntry {
    pub program: String,
    pub pgroup: String,
    #[serde(default)]
    pub asm_options: AsmOptionsJson
}

#[derive(Clone,Deserialize,Debug)]
pub struct PgmConf {
    #[serde(default)]
    pub pgms: Vec<PgmEntry>,
    #[serde(rename = "diagnosticsSuppressLimit")]
    pub diagnostics_suppress_limit: Option<usize>
}

#[derive(Clone,Deserialize,Debug)]
pub struct B4gElem {
    #[serde(rename = "processorGroup")]
    pub processor_group: String
}

#[derive(Clone,Deserialize,Debug)]
pub struct B4gMap {
    #[serde(default)]
    pub elements: HashMap<String,B4gElem>,
    #[serde(rename = "defaultProcessorGroup")]
    pub default_processor_group: Option<String>,
    #[serde(rename = "fileExtension")]
    pub file_extension: Option<String>
}

/// Replace `${config:key.path}` placeholders from the client settings.
/// Unresolved placeholders are left in place and reported.
pub fn substitute_config(text: &str, settings: &serde_json::Value, unresolved: &mut Vec<String>) -> String {
    let mut ans = String::new();
    let mut rest = text;
    while let Some(start) = rest.find("${config:") {
        ans += &rest[..start];
        let after = &rest[start+9..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match lookup_setting(settings,key) {
                    Some(value) => ans += &value,
                    None => {
                        unresolved.push(key.to_string());
                        ans += &rest[start..start+9+end+1];
                    }
                }
                rest = &after[end+1..];
            },
            None => {
                ans += &rest[start..];
                rest = "";
            }
        }
    }
    ans += rest;
    ans
}

fn lookup_setting(settings: &serde_json::Value, key: &str) -> Option<String> {
    let mut node = settings;
    for part in key.split('.') {
        node = node.get(part)?;
    }
    match node {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None
    }
}

pub fn parse_proc_grps(text: &str, settings: &serde_json::Value, unresolved: &mut Vec<String>) -> Result<ProcGrps,DYNERR> {
    let substituted = substitute_config(text,settings,unresolved);
    Ok(serde_json::from_str::<ProcGrps>(&substituted)?)
}

pub fn parse_pgm_conf(text: &str, settings: &serde_json::Value, unresolved: &mut Vec<String>) -> Result<PgmConf,DYNERR> {
    let substituted = substitute_config(text,settings,unresolved);
    Ok(serde_json::from_str::<PgmConf>(&substituted)?)
}

pub fn parse_b4g(text: &str) -> Result<B4gMap,DYNERR> {
    Ok(serde_json::from_str::<B4gMap>(text)?)
}

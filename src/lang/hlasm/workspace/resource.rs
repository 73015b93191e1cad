//! Resource locations.
//!
//! A `ResourceLocation` carries the canonical form of a URI.  Canonical
//! means: dot segments removed from the path (RFC 3986 remove_dot_segments),
//! a lower case drive letter in `file:` URIs, and no trailing slash noise.
//! Normalization is idempotent, and joining a normalized base with a
//! reference relative to it reproduces the normalized target.

use lsp_types as lsp;

#[derive(Clone,PartialEq,Eq,Hash,Debug)]
pub struct ResourceLocation {
    uri: String
}

/// RFC 3986 §5.2.4 remove_dot_segments over one path component
fn remove_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "." | "" => {},
            ".." => {
                out.pop();
            },
            _ => out.push(seg)
        }
    }
    let mut ans = String::new();
    if absolute {
        ans.push('/');
    }
    ans += &out.join("/");
    if path.ends_with('/') && !ans.ends_with('/') {
        ans.push('/');
    }
    ans
}

/// fold the drive letter of `file:///C:/...` to lower case
fn fold_drive(uri: &str) -> String {
    if let Some(rest) = uri.strip_prefix("file:///") {
        let chars: Vec<char> = rest.chars().collect();
        if chars.len() >= 2 && chars[0].is_ascii_uppercase() && chars[1] == ':' {
            return format!("file:///{}{}",chars[0].to_ascii_lowercase(),&rest[1..]);
        }
    }
    uri.to_string()
}

impl ResourceLocation {
    /// canonicalize any URI-like string
    pub fn new(uri: &str) -> Self {
        let folded = fold_drive(uri.trim());
        // normalize only the path component, query and fragment are opaque
        let (head,path,tail) = split_uri(&folded);
        Self {
            uri: format!("{}{}{}",head,remove_dot_segments(&path),tail)
        }
    }

    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        match lsp::Url::from_file_path(path) {
            Ok(url) => Some(Self::new(url.as_str())),
            Err(_) => None
        }
    }

    /// already canonical, applying normalization again is a no-op
    pub fn lexically_normal(&self) -> Self {
        Self::new(&self.uri)
    }

    /// RFC 3986 §5 reference resolution against this location
    pub fn join(&self, reference: &str) -> Self {
        if reference.contains("://") {
            return Self::new(reference);
        }
        match lsp::Url::parse(&self.uri) {
            Ok(base) => match base.join(reference) {
                Ok(joined) => Self::new(joined.as_str()),
                Err(_) => self.clone()
            },
            Err(_) => self.clone()
        }
    }

    /// the reference that reproduces `other` when joined onto this base
    pub fn relative_to(&self, other: &ResourceLocation) -> Option<String> {
        let base = match self.uri.ends_with('/') {
            true => self.uri.clone(),
            false => format!("{}/",self.uri)
        };
        other.uri.strip_prefix(&base).map(|s| s.to_string())
    }

    /// displayable local path, the URI itself when not a file
    pub fn to_local_path(&self) -> String {
        match lsp::Url::parse(&self.uri) {
            Ok(url) => match url.to_file_path() {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(_) => self.uri.clone()
            },
            Err(_) => self.uri.clone()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

impl std::fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,"{}",self.uri)
    }
}

/// split a URI into (scheme+authority, path, query+fragment)
fn split_uri(uri: &str) -> (String,String,String) {
    let (prefix,rest) = match uri.find("://") {
        Some(i) => {
            let after = &uri[i+3..];
            match after.find('/') {
                Some(j) => (uri[..i+3+j].to_string(),after[j..].to_string()),
                None => (uri.to_string(),String::new())
            }
        },
        None => (String::new(),uri.to_string())
    };
    let (path,tail) = match rest.find(|c| c=='?' || c=='#') {
        Some(i) => (rest[..i].to_string(),rest[i..].to_string()),
        None => (rest,String::new())
    };
    (prefix,path,tail)
}

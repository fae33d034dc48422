//! Package descriptor parsing and caching.
//!
//! A [`PackageJson`] is the parsed, dependency-relevant subset of a
//! `package.json`. Descriptors are cached by file path for the lifetime of
//! the resolver and invalidated explicitly when the watcher reports a
//! change.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use bale_core::ResolveError;

/// The `sideEffects` field: absent (assume effects), a boolean, or a glob
/// list naming the files that do have effects.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SideEffects {
    Flag(bool),
    Globs(Vec<String>),
}

impl SideEffects {
    /// Whether a module at `relative_path` (relative to the package root,
    /// `/` separators) may have side effects under this declaration.
    pub fn allows_side_effects(&self, relative_path: &str) -> bool {
        match self {
            SideEffects::Flag(flag) => *flag,
            SideEffects::Globs(globs) => globs.iter().any(|g| glob_match(g, relative_path)),
        }
    }
}

/// Parsed contents of a `package.json`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    pub module: Option<String>,
    /// Kept as raw JSON: the string form is honoured for browser builds,
    /// the object form is ignored.
    #[serde(default)]
    pub browser: Option<serde_json::Value>,
    /// The `exports` tree, untouched; resolution walks it lazily.
    #[serde(default)]
    pub exports: Option<serde_json::Value>,
    pub side_effects: Option<SideEffects>,
    #[serde(rename = "type")]
    pub package_type: Option<String>,
    /// Directory containing this package.json.
    #[serde(skip)]
    pub root: PathBuf,
}

impl PackageJson {
    /// Read and parse a `package.json` file.
    pub fn load(path: &Path) -> Result<Arc<Self>, ResolveError> {
        let text = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut parsed: PackageJson =
            serde_json::from_str(&text).map_err(|e| ResolveError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
        parsed.root = path.parent().unwrap_or(Path::new("/")).to_path_buf();
        Ok(Arc::new(parsed))
    }

    /// The `browser` field when it is the simple string form.
    pub fn browser_entry(&self) -> Option<&str> {
        match &self.browser {
            Some(serde_json::Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether a module inside this package may have side effects.
    ///
    /// Absent metadata assumes effects are present; that is the
    /// conservative default tree shaking relies on.
    pub fn module_has_side_effects(&self, module_path: &Path) -> bool {
        let Some(side_effects) = &self.side_effects else {
            return true;
        };
        let relative = module_path
            .strip_prefix(&self.root)
            .unwrap_or(module_path)
            .to_string_lossy()
            .replace('\\', "/");
        side_effects.allows_side_effects(&relative)
    }
}

/// Minimal glob matching for `sideEffects` lists: `**` crosses directory
/// separators, `*` does not, everything else is literal.
fn glob_match(pattern: &str, path: &str) -> bool {
    // Leading "./" in patterns is optional in the wild.
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let path = path.strip_prefix("./").unwrap_or(path);
    glob_inner(pattern.as_bytes(), path.as_bytes())
}

fn glob_inner(pattern: &[u8], path: &[u8]) -> bool {
    if pattern.is_empty() {
        return path.is_empty();
    }
    if pattern.starts_with(b"**") {
        let rest = if pattern.get(2) == Some(&b'/') {
            &pattern[3..]
        } else {
            &pattern[2..]
        };
        (0..=path.len()).any(|i| glob_inner(rest, &path[i..]))
    } else if pattern[0] == b'*' {
        let rest = &pattern[1..];
        (0..=path.len())
            .take_while(|&i| i == 0 || path[i - 1] != b'/')
            .any(|i| glob_inner(rest, &path[i..]))
    } else {
        !path.is_empty() && pattern[0] == path[0] && glob_inner(&pattern[1..], &path[1..])
    }
}

/// Extract the package name from a bare specifier.
///
/// Scoped packages keep their scope: `@scope/pkg/sub` -> `@scope/pkg`,
/// `pkg/sub` -> `pkg`.
pub fn package_name(specifier: &str) -> &str {
    if specifier.starts_with('@') {
        if let Some(first) = specifier.find('/') {
            if let Some(second) = specifier[first + 1..].find('/') {
                return &specifier[..first + 1 + second];
            }
        }
        return specifier;
    }
    match specifier.find('/') {
        Some(idx) => &specifier[..idx],
        None => specifier,
    }
}

/// The subpath of a bare specifier after the package name, as an
/// `exports`-style key: `"."` for the root, `"./sub/path"` otherwise.
pub fn package_subpath(specifier: &str) -> String {
    let name = package_name(specifier);
    let rest = &specifier[name.len()..];
    if rest.is_empty() {
        ".".to_string()
    } else {
        format!(".{rest}")
    }
}

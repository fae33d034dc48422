//! Module identifiers.
//!
//! Inside a build, modules live in an arena and are addressed by a small
//! integer [`ModuleId`]; every edge is id -> id. The string form emitted
//! into bundles is derived separately from the root-relative path so that
//! output is stable across machines.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Arena handle for a module within a single build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ModuleId(u32);

impl ModuleId {
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Stable string id for a module, used in emitted registries and the
/// manifest: the path relative to the project root with `/` separators.
///
/// Paths outside the root (linked packages, absolute externals) fall back
/// to the full normalised path.
pub fn stable_module_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut id = String::new();
    for component in relative.components() {
        if !id.is_empty() {
            id.push('/');
        }
        id.push_str(&component.as_os_str().to_string_lossy());
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn stable_ids_are_root_relative() {
        let root = PathBuf::from("/project");
        assert_eq!(
            stable_module_id(&root, &root.join("src/app.ts")),
            "src/app.ts"
        );
    }

    #[test]
    fn paths_outside_root_keep_full_path() {
        let root = PathBuf::from("/project");
        let outside = PathBuf::from("/other/lib.js");
        assert_eq!(stable_module_id(&root, &outside), "/other/lib.js");
    }

    #[test]
    fn ids_order_by_index() {
        let a = ModuleId::from_index(1);
        let b = ModuleId::from_index(2);
        assert!(a < b);
        assert_eq!(a.to_string(), "m1");
    }
}

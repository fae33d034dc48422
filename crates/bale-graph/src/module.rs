//! Module records and dependency edges.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use bale_core::plugin::Loader;
use bale_core::{ContentHash, ModuleId};
use bale_parser::{ImportKind, ParseOutput};

/// Classified module kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    /// Uses `import`/`export` syntax.
    Esm,
    /// Plain script (possibly CommonJS `require`).
    Script,
}

/// Classification flags from the scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFlags {
    pub has_jsx: bool,
    pub has_typescript: bool,
    pub has_dynamic_import: bool,
    pub has_top_level_await: bool,
}

/// How an edge participates in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    Static,
    Dynamic,
    ReExport,
    SideEffect,
}

impl DependencyKind {
    pub fn from_import(kind: ImportKind) -> Self {
        match kind {
            ImportKind::StaticFrom | ImportKind::RequireCall => DependencyKind::Static,
            ImportKind::SideEffect => DependencyKind::SideEffect,
            ImportKind::DynamicCall => DependencyKind::Dynamic,
            ImportKind::ReExport | ImportKind::ReExportAll => DependencyKind::ReExport,
        }
    }

    pub fn is_static(&self) -> bool {
        !matches!(self, DependencyKind::Dynamic)
    }
}

/// What an edge points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyTarget {
    /// Another module in the graph.
    Internal(ModuleId),
    /// Satisfied by the host environment at load time.
    External(String),
}

/// One resolved dependency edge. `Module::dependencies` is index-aligned
/// with the import table of the module's transformed text, which is what
/// lets the emitter rewrite each import with its resolved target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub specifier: String,
    pub kind: DependencyKind,
    pub target: DependencyTarget,
}

impl Dependency {
    pub fn internal_target(&self) -> Option<ModuleId> {
        match self.target {
            DependencyTarget::Internal(id) => Some(id),
            DependencyTarget::External(_) => None,
        }
    }
}

/// A recorded type-only edge: kept for tooling, never keeps its target
/// alive, never emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeOnlyImport {
    pub specifier: String,
    pub target: Option<ModuleId>,
}

/// A discovered module. Exactly one exists per absolute path in a build.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    /// Root-relative string id used in emitted registries.
    pub stable_id: String,
    /// Digest of the on-disk source.
    pub hash: ContentHash,
    pub loader: Loader,
    pub kind: ModuleKind,
    pub flags: ModuleFlags,
    /// Original source text (for source maps).
    pub source: String,
    /// Transformed text, after plugin post-processing.
    pub code: String,
    /// Lines the transformer prepended to `code` (JSX runtime import).
    pub prepended_lines: u32,
    /// Tables of `code`; spans index into `code`.
    pub parse: ParseOutput,
    /// Index-aligned with `parse.imports`.
    pub dependencies: Vec<Dependency>,
    pub type_only: Vec<TypeOnlyImport>,
    /// Declared export names (no `export *` expansion).
    pub exported_names: Vec<String>,
    pub has_side_effects: bool,
    pub is_entry: bool,
    /// Chunk index, assigned by the chunker after tree shaking.
    pub chunk: Option<usize>,
}

impl Module {
    /// Ordered static edges (including re-exports and side-effect imports).
    pub fn static_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| d.kind.is_static())
    }

    /// Ordered dynamic edges: code-split root candidates.
    pub fn dynamic_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Dynamic)
    }

    /// Internal module ids this module references, static and dynamic.
    pub fn internal_targets(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.dependencies.iter().filter_map(|d| d.internal_target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_kind_mapping() {
        assert_eq!(
            DependencyKind::from_import(ImportKind::StaticFrom),
            DependencyKind::Static
        );
        assert_eq!(
            DependencyKind::from_import(ImportKind::RequireCall),
            DependencyKind::Static
        );
        assert_eq!(
            DependencyKind::from_import(ImportKind::DynamicCall),
            DependencyKind::Dynamic
        );
        assert_eq!(
            DependencyKind::from_import(ImportKind::ReExportAll),
            DependencyKind::ReExport
        );
        assert!(DependencyKind::Static.is_static());
        assert!(!DependencyKind::Dynamic.is_static());
    }
}

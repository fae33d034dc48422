//! The scanner's output tables.
//!
//! Only the statement-level shape of a module matters to the bundler, so
//! the scanner emits these tables directly instead of building an AST.
//! Spans are byte ranges into the scanned text; the emitter splices its
//! rewrites at exactly these ranges.

use serde::{Deserialize, Serialize};

/// Byte range of a statement or expression in the scanned source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Mechanism by which a dependency is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    /// `import … from 'mod'`
    StaticFrom,
    /// `import 'mod'`
    SideEffect,
    /// `import('mod')` with a literal argument
    DynamicCall,
    /// `require('mod')`
    RequireCall,
    /// `export { a, b as c } from 'mod'` / `export * as ns from 'mod'`
    ReExport,
    /// `export * from 'mod'`
    ReExportAll,
}

impl ImportKind {
    /// Static edges participate in chunk-internal ordering; dynamic edges
    /// mark code-split roots.
    pub fn is_static(&self) -> bool {
        !matches!(self, ImportKind::DynamicCall)
    }
}

/// A local binding introduced by an import, or a forwarded name pair for a
/// re-export (`imported` in the source module, `local` as seen here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    Default { local: String },
    Named { imported: String, local: String },
    Namespace { local: String },
}

impl Binding {
    /// The name this binding introduces (or forwards) in the importing
    /// module.
    pub fn local(&self) -> &str {
        match self {
            Binding::Default { local }
            | Binding::Named { local, .. }
            | Binding::Namespace { local } => local,
        }
    }
}

/// One import-like statement or expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// The literal specifier text.
    pub specifier: String,
    pub kind: ImportKind,
    /// Bindings introduced; for re-exports these are the forwarded pairs.
    pub bindings: Vec<Binding>,
    /// TypeScript `import type` / `export type` - recorded, never alive.
    pub type_only: bool,
    /// Full statement for statements, call expression for dynamic/require.
    pub span: Span,
}

impl ImportRecord {
    /// `import 'mod'` - keeps the target alive regardless of its package's
    /// `sideEffects` declaration.
    pub fn is_side_effect_only(&self) -> bool {
        matches!(self.kind, ImportKind::SideEffect)
    }

    /// Whether this record makes named/default/namespace use of the target.
    pub fn binds_names(&self) -> bool {
        !self.bindings.is_empty()
    }
}

/// One export statement that the emitter must rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportStatement {
    /// `export const x = …`, `export function f() {}`, `export class C {}`
    /// - `span` covers the `export` keyword (plus trailing space) only.
    Declaration { names: Vec<String>, span: Span },
    /// `export default …` - `span` covers the `export default` prefix.
    Default {
        span: Span,
        /// Declared name for `export default function f` style defaults.
        name_hint: Option<String>,
    },
    /// `export { a, b as c };` (no `from`) - `span` covers the whole
    /// statement. Pairs are `(local, exported)`.
    NamedList {
        names: Vec<(String, String)>,
        span: Span,
    },
}

/// A scanner-level syntax problem, located for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Everything the scanner learned about one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutput {
    pub imports: Vec<ImportRecord>,
    pub exports: Vec<ExportStatement>,
    pub has_jsx: bool,
    pub has_typescript: bool,
    pub has_dynamic_import: bool,
    pub has_top_level_await: bool,
    pub errors: Vec<SyntaxIssue>,
}

impl ParseOutput {
    /// The declared export names of this module, in declaration order,
    /// excluding `export *` forwards (those need graph knowledge to
    /// expand).
    pub fn exported_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for statement in &self.exports {
            match statement {
                ExportStatement::Declaration { names: declared, .. } => {
                    names.extend(declared.iter().cloned())
                }
                ExportStatement::Default { .. } => names.push("default".to_string()),
                ExportStatement::NamedList { names: pairs, .. } => {
                    names.extend(pairs.iter().map(|(_, exported)| exported.clone()))
                }
            }
        }
        for record in &self.imports {
            if record.kind == ImportKind::ReExport && !record.type_only {
                for binding in &record.bindings {
                    names.push(binding.local().to_string());
                }
            }
        }
        names
    }

    /// Specifiers re-exported with `export *`.
    pub fn star_reexports(&self) -> impl Iterator<Item = &ImportRecord> {
        self.imports
            .iter()
            .filter(|r| r.kind == ImportKind::ReExportAll)
    }
}

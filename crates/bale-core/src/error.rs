//! Error taxonomy for the bale pipeline.
//!
//! Expected failures are values, never panics. Each pipeline phase has its
//! own error enum; [`BuildError`] is the top-level sum that crosses crate
//! boundaries, and [`Diagnostics`] aggregates every error from a build so
//! that a one-shot build can report all of them at once and write nothing.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

/// Module resolution failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A specifier could not be mapped to a file or an external.
    #[error("cannot resolve '{specifier}' from {}", .importer.display())]
    NotFound {
        specifier: String,
        importer: PathBuf,
    },

    /// A package `exports` field exists but matched no subpath/condition.
    #[error("package exports of {} do not match '{specifier}'", .candidate.display())]
    Ambiguous {
        specifier: String,
        candidate: PathBuf,
    },

    /// A symlink cycle was detected while walking `node_modules`.
    #[error("symlink cycle while walking packages under {}", .dir.display())]
    PackageCycle { dir: PathBuf },

    /// A resolve plugin callback failed; wrapped with the plugin name.
    #[error("plugin '{plugin}' failed to resolve '{specifier}': {message}")]
    Plugin {
        plugin: String,
        specifier: String,
        message: String,
    },

    /// Filesystem failure during a probe.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File-level syntax failures from the scanner.
#[derive(Debug, Error)]
#[error("{}:{line}:{column}: {message}", .file.display())]
pub struct ParseError {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Transformation failures.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The transform rejected its input.
    #[error("transform failed for {}: {message}", .file.display())]
    Failure { file: PathBuf, message: String },

    /// A load or transform plugin callback failed; wrapped with its name.
    #[error("plugin '{plugin}' failed on {}: {message}", .file.display())]
    Plugin {
        plugin: String,
        file: PathBuf,
        message: String,
    },
}

/// Graph construction failures not attributable to a single file.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A file could not be read during discovery.
    #[error("cannot read module {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Module source was not valid UTF-8.
    #[error("module {} is not valid UTF-8", .path.display())]
    InvalidUtf8 { path: PathBuf },
}

/// Emission failures.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration failures.
///
/// In dev mode a configuration change terminates the process by design;
/// callers match on this variant family to decide that.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no entry points configured")]
    NoEntries,

    #[error("entry point not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    #[error("invalid value for '{field}': {value} ({hint})")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration changed while the dev server was running; restart bale")]
    ChangedWhileRunning,
}

/// Top-level error for any pipeline phase.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BuildError {
    /// Returns `true` when the error must terminate a running dev server
    /// rather than wait for the next watcher event.
    pub fn is_fatal_in_dev(&self) -> bool {
        matches!(self, BuildError::Config(_))
    }
}

/// Ordered collection of every error a build produced.
///
/// A one-shot build either succeeds completely or reports all of these and
/// writes no output.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<BuildError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: impl Into<BuildError>) {
        self.errors.push(error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildError> {
        self.errors.iter()
    }

    /// Consume the collection; `Ok(())` when no error was recorded.
    pub fn into_result(self) -> Result<(), Diagnostics> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "build failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            writeln!(f, "  {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl From<BuildError> for Diagnostics {
    fn from(error: BuildError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

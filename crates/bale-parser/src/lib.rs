//! # bale-parser
//!
//! Statement-level scanning and syntactic lowering for the bale bundler.
//!
//! Two halves, both scanners rather than parsers - only the statement-level
//! shape of a module matters to the bundler:
//!
//! - [`parse`] extracts the import/export tables (with byte spans precise
//!   enough to drive the emitter's rewrites), classification flags, and a
//!   scope-accurate top-level-await answer.
//! - [`transform`] erases TypeScript, lowers JSX to factory calls, and
//!   applies compile-time `define` substitution, preserving line counts so
//!   source maps stay line-accurate.
//!
//! The round trip is deliberate: the graph builder parses the transformed
//! text, so the tables it records are the same tables the emitter rewrites
//! from.

mod define;
mod jsx;
mod scanner;
mod strip;
mod tables;
mod transform;

pub use scanner::{line_col, parse};
pub use tables::{
    Binding, ExportStatement, ImportKind, ImportRecord, ParseOutput, Span, SyntaxIssue,
};
pub use transform::{transform, TransformOptions, TransformOutput};

//! # bale-graph
//!
//! Module graph discovery for the bale bundler.
//!
//! The [`GraphBuilder`] seeds a work queue with the entry files, fans
//! read/transform/scan work out across blocking workers, and assembles the
//! results into a [`ModuleGraph`]: an arena of [`Module`] records addressed
//! by small integer ids, with every edge an id-to-id link. A
//! content-addressed [`TransformCache`] keyed on `(source hash, option
//! fingerprint)` makes rediscovery of unchanged modules cheap, optionally
//! persisting across runs.

mod builder;
mod cache;
mod graph;
mod module;

pub use builder::GraphBuilder;
pub use cache::{
    file_fingerprint, options_fingerprint, CacheKey, CachedTransform, TransformCache,
};
pub use graph::ModuleGraph;
pub use module::{
    Dependency, DependencyKind, DependencyTarget, Module, ModuleFlags, ModuleKind, TypeOnlyImport,
};

//! # bale-core
//!
//! Foundation crate for the bale bundler workspace.
//!
//! This crate owns the types every other bale crate agrees on: the error
//! taxonomy, the build configuration, content hashing, stable module
//! identifiers, the plugin interface, and logging setup. It depends on no
//! other bale crate, breaking the cyclic dependency chain.

pub mod config;
pub mod error;
pub mod hash;
pub mod ids;
pub mod logging;
pub mod plugin;

pub use config::{
    BuildOptions, JsxOptions, JsxRuntime, OutputFormat, SourceMapMode, Target,
};
pub use error::{
    BuildError, ConfigError, Diagnostics, EmitError, GraphError, ParseError, ResolveError, Result,
    TransformError,
};
pub use hash::ContentHash;
pub use ids::{stable_module_id, ModuleId};
pub use plugin::{
    Loaded, Loader, Plugin, PluginBuild, PluginDriver, ResolveArgs, ResolveOutcome,
};

//! # bale-bundler
//!
//! The back half of the bale pipeline: tree shaking, chunk assignment,
//! deterministic code emission with the embedded runtime, and the
//! [`Bundler`] driver that strings the whole build together.
//!
//! ```no_run
//! use bale_bundler::Bundler;
//! use bale_core::BuildOptions;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bundler = Bundler::new(BuildOptions::new("src/main.ts"))?;
//! let output = bundler.build().await?;
//! bundler.write_output(&output)?;
//! # Ok(()) }
//! ```

mod build;
mod chunk;
mod emit;
mod manifest;
mod minify;
mod rewrite;
mod runtime;
mod shake;
mod source_map;

pub use build::{BuildOutput, Bundler};
pub use chunk::{assign_chunks, Chunk, ChunkGraph};
pub use emit::{star_export_names, EmittedChunk, Emitter};
pub use manifest::{BuildStats, BundleManifest, ChunkMetadata};
pub use minify::{BasicMinifier, Minify};
pub use shake::tree_shake;

//! The build pipeline.
//!
//! [`Bundler`] owns the long-lived pieces - resolver, plugin driver,
//! transform cache - and drives one build end to end:
//! discover → shake → chunk → emit → post-process. A build either
//! succeeds completely or reports every diagnostic and produces nothing;
//! writing to disk is a separate, explicitly requested step.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use bale_core::plugin::{Plugin, PluginDriver};
use bale_core::{BuildOptions, ConfigError, Diagnostics, EmitError};
use bale_graph::{GraphBuilder, ModuleGraph, TransformCache};
use bale_resolver::Resolver;

use crate::chunk::{assign_chunks, ChunkGraph};
use crate::emit::{EmittedChunk, Emitter};
use crate::manifest::{BuildStats, BundleManifest};
use crate::minify::{BasicMinifier, Minify};
use crate::shake::tree_shake;

/// Everything one successful build produced, in memory.
pub struct BuildOutput {
    pub chunks: Vec<EmittedChunk>,
    pub manifest: BundleManifest,
    pub stats: BuildStats,
    pub graph: ModuleGraph,
    pub chunk_graph: ChunkGraph,
}

pub struct Bundler {
    options: Arc<BuildOptions>,
    plugins: Arc<PluginDriver>,
    resolver: Arc<Resolver>,
    cache: Arc<TransformCache>,
    minifier: Box<dyn Minify>,
}

impl Bundler {
    /// Validate options and set up the long-lived build environment.
    pub fn new(options: BuildOptions) -> Result<Self, ConfigError> {
        Self::with_plugins(options, Vec::new())
    }

    pub fn with_plugins(
        options: BuildOptions,
        plugins: Vec<Arc<dyn Plugin>>,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let options = Arc::new(options);
        let plugins = Arc::new(PluginDriver::new(&plugins));
        let resolver = Arc::new(Resolver::new(&options, plugins.clone()));
        let cache = match &options.cache_dir {
            Some(dir) => Arc::new(TransformCache::with_store(dir.clone())),
            None => Arc::new(TransformCache::new()),
        };
        Ok(Self {
            options,
            plugins,
            resolver,
            cache,
            minifier: Box::new(BasicMinifier),
        })
    }

    /// Swap the minification post-processor.
    pub fn with_minifier(mut self, minifier: Box<dyn Minify>) -> Self {
        self.minifier = minifier;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// The resolver, shared so the dev layer can invalidate its caches.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Run one complete build.
    pub async fn build(&self) -> Result<BuildOutput, Diagnostics> {
        let started = Instant::now();
        self.plugins.start();

        let result = self.build_inner().await;

        // `onEnd` runs on success and failure alike.
        self.plugins.end();

        let output = result?;
        let elapsed = started.elapsed().as_millis() as u64;
        info!(
            modules = output.stats.total_modules,
            chunks = output.stats.total_chunks,
            bytes = output.stats.total_bytes,
            duration_ms = elapsed,
            "build finished"
        );
        Ok(output)
    }

    async fn build_inner(&self) -> Result<BuildOutput, Diagnostics> {
        let started = Instant::now();

        let builder = GraphBuilder::new(
            self.options.clone(),
            self.resolver.clone(),
            self.plugins.clone(),
            self.cache.clone(),
        );
        let mut graph = builder.build().await?;

        let survivors = tree_shake(&graph, self.options.treeshake);
        let chunk_graph = assign_chunks(&mut graph, &survivors, self.options.splitting);

        let emitter = Emitter::new(&graph, &chunk_graph, &self.options);
        let mut chunks = emitter.emit_all();

        if self.options.minify {
            for chunk in &mut chunks {
                chunk.code = self.minifier.minify(&chunk.code);
                chunk.hash = bale_core::ContentHash::of(chunk.code.as_bytes());
                // Line-level maps do not survive whitespace collapse.
                chunk.source_map = None;
                chunk.map_file_name = None;
            }
        }

        let manifest = BundleManifest::from_chunks(&chunks);
        let (hits, misses) = self.cache.stats();
        let stats = BuildStats {
            total_modules: survivors.len(),
            total_chunks: chunks.len(),
            total_bytes: chunks.iter().map(|c| c.code.len()).sum(),
            duration_ms: started.elapsed().as_millis() as u64,
            cache_hit_rate: BuildStats::hit_rate(hits, misses),
        };

        Ok(BuildOutput {
            chunks,
            manifest,
            stats,
            graph,
            chunk_graph,
        })
    }

    /// Write a successful build to the configured outdir: every chunk,
    /// external source maps, and `manifest.json`.
    pub fn write_output(&self, output: &BuildOutput) -> Result<(), EmitError> {
        let outdir = &self.options.outdir;
        std::fs::create_dir_all(outdir).map_err(|source| EmitError::Io {
            path: outdir.clone(),
            source,
        })?;
        for chunk in &output.chunks {
            let path = outdir.join(&chunk.file_name);
            std::fs::write(&path, &chunk.code)
                .map_err(|source| EmitError::Io { path, source })?;
            if let (Some(map), Some(map_file)) = (&chunk.source_map, &chunk.map_file_name) {
                let path = outdir.join(map_file);
                std::fs::write(&path, map).map_err(|source| EmitError::Io { path, source })?;
            }
        }
        let manifest_path = outdir.join("manifest.json");
        std::fs::write(&manifest_path, output.manifest.to_json()).map_err(|source| {
            EmitError::Io {
                path: manifest_path,
                source,
            }
        })?;
        Ok(())
    }
}
